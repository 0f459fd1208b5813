use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema, SchemaRef};
use stq_client::expr::{avg, col, count_star, gt, lit_i64};
use stq_client::{CommandContext, CommandExecutor, StreamCompiler};
use stq_common::{BatchContext, Result, Row, StqError, StreamConfig, Value};
use stq_planner::{AggregateMode, LogicalPlan, Optimizer, OptimizerConfig, WindowSpec};

fn clicks_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("user_id", DataType::Int64, false),
        Field::new("page", DataType::Utf8, true),
        Field::new("latency", DataType::Int64, true),
    ]))
}

fn compiler() -> StreamCompiler {
    let compiler = StreamCompiler::new(StreamConfig::default()).expect("compiler");
    compiler.register_table("clicks", LogicalPlan::stream_scan("clicks_topic", clicks_schema()));
    compiler
}

#[test]
fn register_lookup_unregister_roundtrip() {
    let compiler = compiler();
    let plan = LogicalPlan::stream_scan("other_topic", clicks_schema());
    assert!(!compiler.register_table("other", plan.clone()));
    assert_eq!(compiler.lookup_table("other").expect("lookup"), plan);

    let replacement = LogicalPlan::table("clicks");
    assert!(compiler.register_table("other", replacement.clone()));
    assert_eq!(compiler.lookup_table("other").expect("lookup"), replacement);

    assert!(compiler.unregister_table("other"));
    assert!(!compiler.unregister_table("other"));
    assert!(matches!(
        compiler.lookup_table("other"),
        Err(StqError::NotFound(_))
    ));
    assert!(matches!(
        compiler.lookup_table("never_registered"),
        Err(StqError::NotFound(_))
    ));
}

#[test]
fn windowed_query_compiles_to_incremental_aggregate() {
    let view = compiler()
        .compile_query(
            "SELECT page, COUNT(*) AS hits FROM clicks OVER (WINDOW 10 SECONDS, SLIDE 5 SECONDS) \
             GROUP BY page",
        )
        .expect("compile");
    let text = view.explain();
    assert!(
        text.contains("Aggregate mode=incremental sliding(10000ms, slide=5000ms)"),
        "{text}"
    );
    assert!(
        text.contains("StreamScan source=clicks_topic fields=3 window=sliding(10000ms, slide=5000ms)"),
        "{text}"
    );
    let schema = view.schema().expect("schema");
    assert_eq!(schema.field(0).name(), "page");
    assert_eq!(schema.field(1).name(), "hits");
}

#[test]
fn plain_sql_compiles_through_generic_dialect() {
    let compiler = compiler();
    let parsed = compiler
        .parse("SELECT page FROM clicks WHERE latency > 100 LIMIT 5")
        .expect("parse");
    assert!(parsed.windows().is_empty());
    let view = compiler
        .compile_query("SELECT page FROM clicks WHERE latency > 100 LIMIT 5")
        .expect("compile");
    assert!(view.explain().contains("pushed_filters=1"), "{}", view.explain());
}

#[test]
fn malformed_text_reports_generic_error_and_streaming_note() {
    let err = compiler()
        .compile_query("SELECT page FROM clicks OVER (WINDOW 5 FORTNIGHTS)")
        .expect_err("bad unit");
    let p = match err {
        StqError::Parse(p) => p,
        other => panic!("expected parse error, got {other:?}"),
    };
    assert!(p.position.is_some(), "{p:?}");
    assert!(p.streaming_note.is_some_and(|n| n.contains("unknown time unit")));
}

#[test]
fn unknown_table_names_the_symbol_and_compiler_stays_usable() {
    let compiler = compiler();
    let err = compiler
        .compile_query("SELECT a FROM missing")
        .expect_err("unknown table");
    assert_eq!(err.symbol(), Some("missing"));
    compiler
        .compile_query("SELECT page FROM clicks")
        .expect("still compiles");
}

#[test]
fn resolve_and_optimize_is_idempotent() {
    let compiler = compiler();
    let plan = compiler
        .parse("SELECT page, AVG(latency) AS l FROM clicks OVER (WINDOW 2 SECONDS) GROUP BY page")
        .expect("parse");
    let once = compiler.resolve_and_optimize(plan).expect("once");
    let twice = compiler.resolve_and_optimize(once.clone()).expect("twice");
    assert_eq!(once, twice);
}

#[test]
fn execute_command_is_deterministic_for_unchanged_catalog() {
    let compiler = compiler();
    compiler.register_table("a_first", LogicalPlan::table("clicks"));
    let first = compiler.execute_command("SHOW TABLES").expect("show");
    let second = compiler.execute_command("SHOW TABLES").expect("show");
    assert_eq!(first, "[a_first]\n[clicks]");
    assert_eq!(first, second);

    let described = compiler.execute_command("DESCRIBE a_first").expect("describe");
    assert_eq!(
        described,
        "user_id,Int64,false\npage,Utf8,true\nlatency,Int64,true"
            .lines()
            .map(|l| format!("[{l}]"))
            .collect::<Vec<_>>()
            .join("\n")
    );

    assert_eq!(compiler.execute_command("DROP TABLE a_first").expect("drop"), "");
    assert_eq!(compiler.table_names(), vec!["clicks"]);
}

struct EchoCommands;

impl CommandExecutor for EchoCommands {
    fn execute(&self, command: &str, ctx: &CommandContext<'_>) -> Result<Vec<Row>> {
        let tables = ctx.catalog().len() as i64;
        Ok(vec![
            Row::new(vec![Value::Utf8(command.to_string())]),
            Row::new(vec![Value::Int64(tables)]),
        ])
    }
}

#[test]
fn injected_collaborators_are_used() {
    let compiler = StreamCompiler::builder(StreamConfig::default())
        .command_executor(Arc::new(EchoCommands))
        .optimizer(Arc::new(Optimizer::with_config(OptimizerConfig {
            predicate_pushdown: false,
        })))
        .build()
        .expect("compiler");
    compiler.register_table("clicks", LogicalPlan::stream_scan("clicks_topic", clicks_schema()));

    assert_eq!(
        compiler.execute_command("VACUUM everything").expect("echo"),
        "[VACUUM everything]\n[1]"
    );
    let text = compiler
        .compile_query("SELECT page FROM clicks WHERE latency > 1")
        .expect("compile")
        .explain();
    assert!(text.contains("Filter"), "{text}");
    assert!(!text.contains("pushed_filters"), "{text}");
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let err = StreamCompiler::new(StreamConfig {
        batch_interval_ms: 0,
        ..StreamConfig::default()
    })
    .expect_err("zero interval");
    assert!(matches!(err, StqError::InvalidConfig(_)));
}

#[test]
fn composed_view_becomes_incremental_after_optimize() {
    let compiler = compiler();
    let view = compiler
        .table("clicks")
        .expect("table")
        .filter(gt(col("latency"), lit_i64(0)))
        .window(WindowSpec::tumbling(2_000))
        .group_by(vec![col("page")])
        .agg(vec![
            (count_star(), "n".to_string()),
            (avg(col("latency")), "avg_latency".to_string()),
        ])
        .optimize()
        .expect("optimize");

    let LogicalPlan::Projection { input, .. } = view.plan() else {
        panic!("expected avg projection:\n{}", view.explain());
    };
    assert!(matches!(
        input.as_ref(),
        LogicalPlan::Aggregate {
            mode: AggregateMode::Incremental { .. },
            ..
        }
    ));
    let schema = view.schema().expect("schema");
    let names: Vec<_> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    assert_eq!(names, vec!["page", "n", "avg_latency"]);
}

#[test]
fn batch_plan_emits_when_window_closes() {
    let compiler = compiler();
    let view = compiler
        .compile_query("SELECT page, COUNT(*) AS n FROM clicks OVER (WINDOW 2 SECONDS) GROUP BY page")
        .expect("compile");
    let closing = view.batch_plan(&BatchContext::new(4, 4_000)).expect("batch");
    assert!(closing.emit);
    assert_eq!(closing.plan, *view.plan());
    let open = view.batch_plan(&BatchContext::new(3, 3_000)).expect("batch");
    assert!(!open.emit);

    let unwindowed = compiler.compile_query("SELECT page FROM clicks").expect("compile");
    assert!(unwindowed
        .batch_plan(&BatchContext::new(3, 3_000))
        .expect("batch")
        .emit);
}

#[test]
fn registered_view_is_usable_as_a_source() {
    let compiler = compiler();
    let slow = compiler
        .compile_query("SELECT user_id, page FROM clicks WHERE latency > 500")
        .expect("compile");
    assert!(!slow.register_as_table("slow_clicks"));
    let view = compiler
        .compile_query("SELECT s.page FROM slow_clicks AS s OVER (WINDOW 1 SECOND)")
        .expect("compile");
    assert_eq!(view.plan().windows(), vec![WindowSpec::tumbling(1_000)]);
    assert!(view.explain().contains("window=tumbling(1000ms)"), "{}", view.explain());
}

#[test]
fn joins_across_compilers_are_rejected() {
    let a = compiler();
    let b = compiler();
    let left = a.table("clicks").expect("table");
    let err = left
        .clone()
        .join(b.table("clicks").expect("table"), vec![("user_id".into(), "user_id".into())])
        .expect_err("different sessions");
    assert!(matches!(err, StqError::Analysis { .. }));

    let users = a.local_relation(
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, false),
        ])),
        vec![Row::new(vec![Value::Int64(1), Value::Utf8("ann".into())])],
    );
    let joined = left
        .join(users, vec![("user_id".into(), "id".into())])
        .expect("same session")
        .window(WindowSpec::tumbling(3_000))
        .optimize()
        .expect("optimize");
    let text = joined.explain();
    assert!(text.contains("window=tumbling(3000ms)"), "{text}");
    assert!(text.contains("LocalRelation fields=2 rows=1"), "{text}");
}
