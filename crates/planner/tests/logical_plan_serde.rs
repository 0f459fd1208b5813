use std::collections::HashMap;
use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};
use stq_common::{Row, Value};
use stq_planner::{
    parse_query, Analyzer, LogicalPlan, Optimizer, WindowOptimizer,
};

#[test]
fn compiled_streaming_plan_is_serializable() {
    let schema = Arc::new(Schema::new(vec![
        Field::new("word", DataType::Utf8, true),
        Field::new("n", DataType::Int64, true),
    ]));
    let mut relations = HashMap::new();
    relations.insert(
        "words".to_string(),
        LogicalPlan::stream_scan("words_topic", schema.clone()),
    );
    let relations = Relations(relations);

    let parsed = parse_query(
        "SELECT word, AVG(n) AS avg_n FROM words OVER (WINDOW 4 SECONDS, SLIDE 2 SECONDS) GROUP BY word",
        &HashMap::new(),
    )
    .expect("parse");
    let analyzed = Analyzer::new()
        .analyze(parsed.plan, &relations)
        .expect("analyze");
    let plan = WindowOptimizer::new(1_000)
        .rewrite(Optimizer::new().optimize(analyzed).expect("optimize"))
        .expect("rewrite");

    let s = serde_json::to_string(&plan).expect("serialize");
    let back: LogicalPlan = serde_json::from_str(&s).expect("deserialize");
    assert_eq!(back, plan);
}

#[test]
fn local_relation_rows_survive_serde() {
    let plan = LogicalPlan::LocalRelation {
        schema: Arc::new(Schema::new(vec![Field::new("x", DataType::Int64, true)])),
        rows: Arc::new(vec![
            Row::new(vec![Value::Int64(1)]),
            Row::new(vec![Value::Null]),
        ]),
    };
    let s = serde_json::to_string(&plan).expect("serialize");
    let back: LogicalPlan = serde_json::from_str(&s).expect("deserialize");
    assert_eq!(back, plan);
}

struct Relations(HashMap<String, LogicalPlan>);

impl stq_planner::RelationProvider for Relations {
    fn relation_plan(&self, name: &str) -> stq_common::Result<LogicalPlan> {
        self.0
            .get(name)
            .cloned()
            .ok_or_else(|| stq_common::StqError::NotFound(name.to_string()))
    }
}
