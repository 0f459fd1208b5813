use std::collections::HashMap;

use arrow_schema::DataType;
use sqlparser::ast::{
    BinaryOperator as SqlBinaryOp, DataType as SqlDataType, Expr as SqlExpr, FunctionArg,
    FunctionArgExpr, FunctionArguments, GroupByExpr, Ident, JoinConstraint, JoinOperator,
    ObjectName, Query, SelectItem, SetExpr, Statement, TableAlias, TableFactor, TableWithJoins,
    Value,
};
use stq_common::{Result, StqError};
use stq_sql::{StreamParse, StreamWindowClause};
use tracing::debug;

use crate::logical_plan::{
    AggExpr, AggregateMode, BinaryOp, Expr, JoinType, LiteralValue, LogicalPlan, WindowSpec,
};

/// Which dialect produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Streaming,
    Generic,
}

/// Result of [`parse_query`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    pub plan: LogicalPlan,
    pub dialect: Dialect,
}

/// Parse query text: streaming dialect first, generic dialect on fallthrough.
///
/// Resolution order:
/// 1. the streaming dialect scans for table windows; text it recognizes and can
///    convert is returned as [`Dialect::Streaming`]
/// 2. text it does not recognize, or fails on, is parsed by the generic dialect,
///    whose result wins when it succeeds
/// 3. when both fail the generic error is returned, carrying the streaming
///    dialect's complaint as a note
pub fn parse_query(sql: &str, params: &HashMap<String, LiteralValue>) -> Result<ParsedQuery> {
    let streaming_failure = match stq_sql::scan_stream_windows(sql) {
        StreamParse::NotApplicable => None,
        StreamParse::Malformed(e) => Some(e.to_string()),
        StreamParse::Recognized { sql: stripped, windows } => {
            match stream_sql_to_logical(&stripped, params, &windows) {
                Ok(plan) => {
                    return Ok(ParsedQuery {
                        plan,
                        dialect: Dialect::Streaming,
                    })
                }
                Err(StqError::Parse(p)) => Some(p.to_string()),
                Err(e) => Some(e.to_string()),
            }
        }
    };

    resolve_dialects(sql_to_logical(sql, params), streaming_failure)
}

/// The generic dialect's outcome wins; a streaming failure is kept as a note on any error.
fn resolve_dialects(
    generic: Result<LogicalPlan>,
    streaming_failure: Option<String>,
) -> Result<ParsedQuery> {
    match (generic, streaming_failure) {
        (Ok(plan), note) => {
            if let Some(note) = &note {
                debug!(note = %note, "streaming dialect rejected query; generic dialect accepted it");
            }
            Ok(ParsedQuery {
                plan,
                dialect: Dialect::Generic,
            })
        }
        (Err(e), Some(note)) => Err(e.with_streaming_note(note)),
        (Err(e), None) => Err(e),
    }
}

/// Convert a SQL string into a LogicalPlan with the generic dialect, binding named
/// parameters (like :k).
pub fn sql_to_logical(sql: &str, params: &HashMap<String, LiteralValue>) -> Result<LogicalPlan> {
    let stmts = stq_sql::parse_sql(sql)?;
    single_statement_to_logical(&stmts, params, &HashMap::new())
}

fn stream_sql_to_logical(
    stripped: &str,
    params: &HashMap<String, LiteralValue>,
    clauses: &[StreamWindowClause],
) -> Result<LogicalPlan> {
    let stmts = stq_sql::parse_sql(stripped)?;
    let windows: HashMap<String, WindowSpec> = clauses
        .iter()
        .map(|c| (c.relation.clone(), WindowSpec::new(c.size_ms, c.slide_ms)))
        .collect();
    let mut ctx = FrontendCtx {
        params,
        windows: &windows,
        bound: vec![],
    };
    let plan = match stmts.as_slice() {
        [Statement::Query(q)] => query_to_logical(q, &mut ctx)?,
        _ => {
            return Err(StqError::Unsupported(
                "stream windows are only supported in a single SELECT".to_string(),
            ))
        }
    };
    if let Some(unbound) = windows.keys().find(|k| !ctx.bound.contains(k)) {
        return Err(StqError::unresolved("windowed relation", unbound.clone()));
    }
    Ok(plan)
}

fn single_statement_to_logical(
    stmts: &[Statement],
    params: &HashMap<String, LiteralValue>,
    windows: &HashMap<String, WindowSpec>,
) -> Result<LogicalPlan> {
    if stmts.len() != 1 {
        return Err(StqError::Unsupported(
            "only single-statement SQL is supported".to_string(),
        ));
    }
    let mut ctx = FrontendCtx {
        params,
        windows,
        bound: vec![],
    };
    statement_to_logical(&stmts[0], &mut ctx)
}

struct FrontendCtx<'a> {
    params: &'a HashMap<String, LiteralValue>,
    windows: &'a HashMap<String, WindowSpec>,
    /// Window keys attached to a relation so far.
    bound: Vec<String>,
}

fn statement_to_logical(stmt: &Statement, ctx: &mut FrontendCtx<'_>) -> Result<LogicalPlan> {
    match stmt {
        Statement::Query(q) => query_to_logical(q, ctx),
        _ => Err(StqError::Unsupported(
            "only SELECT queries can be compiled; use execute_command for other statements"
                .to_string(),
        )),
    }
}

fn query_to_logical(q: &Query, ctx: &mut FrontendCtx<'_>) -> Result<LogicalPlan> {
    if q.with.is_some() {
        return Err(StqError::Unsupported(
            "WITH clauses are not supported".to_string(),
        ));
    }
    let select = match &*q.body {
        SetExpr::Select(s) => s.as_ref(),
        SetExpr::Query(inner) => return query_to_logical(inner, ctx),
        _ => {
            return Err(StqError::Unsupported(
                "only simple SELECT is supported (no UNION/EXCEPT/INTERSECT)".to_string(),
            ))
        }
    };
    if select.having.is_some() {
        return Err(StqError::Unsupported("HAVING is not supported".to_string()));
    }

    // FROM + JOINs
    let mut plan = from_to_plan(&select.from, ctx)?;

    // WHERE
    if let Some(selection) = &select.selection {
        let pred = sql_expr_to_expr(selection, ctx.params)?;
        plan = LogicalPlan::Filter {
            predicate: pred,
            input: Box::new(plan),
        };
    }

    // GROUP BY
    let group_exprs = group_by_exprs(&select.group_by, ctx.params)?;
    let mut agg_exprs: Vec<(AggExpr, String)> = vec![];
    let mut proj_exprs: Vec<(Expr, String)> = vec![];
    let mut wildcard = false;

    let mut saw_agg = false;
    for item in &select.projection {
        match item {
            SelectItem::UnnamedExpr(e) => {
                if let Some((agg, name)) = try_parse_agg(e, ctx.params)? {
                    saw_agg = true;
                    agg_exprs.push((agg, name.clone()));
                    proj_exprs.push((Expr::Column(name.clone()), name));
                } else {
                    let expr = sql_expr_to_expr(e, ctx.params)?;
                    let name = expr_to_name_fallback(&expr);
                    proj_exprs.push((expr, name));
                }
            }
            SelectItem::ExprWithAlias { expr, alias } => {
                let alias_name = alias.value.clone();
                if let Some((agg, _)) = try_parse_agg(expr, ctx.params)? {
                    saw_agg = true;
                    agg_exprs.push((agg, alias_name.clone()));
                    proj_exprs.push((Expr::Column(alias_name.clone()), alias_name));
                } else {
                    let expr = sql_expr_to_expr(expr, ctx.params)?;
                    proj_exprs.push((expr, alias_name));
                }
            }
            SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(..) => {
                wildcard = true;
            }
        }
    }

    let needs_agg = saw_agg || !group_exprs.is_empty();
    if wildcard && (needs_agg || !proj_exprs.is_empty()) {
        return Err(StqError::Unsupported(
            "SELECT * cannot be combined with other select items or aggregation".to_string(),
        ));
    }
    if needs_agg {
        plan = LogicalPlan::Aggregate {
            group_exprs,
            aggr_exprs: agg_exprs,
            input: Box::new(plan),
            mode: AggregateMode::PerBatch,
        };
    }
    if !wildcard {
        plan = LogicalPlan::Projection {
            exprs: proj_exprs,
            input: Box::new(plan),
        };
    }

    // LIMIT
    if let Some(limit_expr) = &q.limit {
        let limit_val = sql_limit_to_usize(limit_expr, ctx.params)?;
        plan = LogicalPlan::Limit {
            n: limit_val,
            input: Box::new(plan),
        };
    }

    Ok(plan)
}

fn from_to_plan(from: &[TableWithJoins], ctx: &mut FrontendCtx<'_>) -> Result<LogicalPlan> {
    if from.len() != 1 {
        return Err(StqError::Unsupported(
            "exactly one FROM source is supported (use JOIN for more)".to_string(),
        ));
    }
    let twj = &from[0];

    let mut left = table_factor_to_plan(&twj.relation, ctx)?;

    for j in &twj.joins {
        let right = table_factor_to_plan(&j.relation, ctx)?;
        match &j.join_operator {
            JoinOperator::Inner(constraint) => {
                let on_pairs = join_constraint_to_on_pairs(constraint)?;
                left = LogicalPlan::Join {
                    left: Box::new(left),
                    right: Box::new(right),
                    on: on_pairs,
                    join_type: JoinType::Inner,
                };
            }
            _ => {
                return Err(StqError::Unsupported(
                    "only INNER JOIN is supported".to_string(),
                ))
            }
        }
    }

    Ok(left)
}

fn table_factor_to_plan(tf: &TableFactor, ctx: &mut FrontendCtx<'_>) -> Result<LogicalPlan> {
    let (plan, visible) = match tf {
        TableFactor::Table { name, alias, .. } => {
            let table = object_name_to_string(name);
            let scan = LogicalPlan::TableScan {
                table: table.clone(),
            };
            match alias_name(alias) {
                Some(a) => (
                    LogicalPlan::SubqueryAlias {
                        alias: a.clone(),
                        input: Box::new(scan),
                    },
                    a,
                ),
                None => {
                    let last = name.0.last().map(|i| i.value.clone()).unwrap_or(table);
                    (scan, last)
                }
            }
        }
        TableFactor::Derived {
            subquery, alias, ..
        } => {
            let alias = alias_name(alias).ok_or_else(|| {
                StqError::Unsupported("subquery in FROM requires an alias".to_string())
            })?;
            let inner = query_to_logical(subquery, ctx)?;
            (
                LogicalPlan::SubqueryAlias {
                    alias: alias.clone(),
                    input: Box::new(inner),
                },
                alias,
            )
        }
        _ => {
            return Err(StqError::Unsupported(
                "only table names and aliased subqueries are supported in FROM".to_string(),
            ))
        }
    };

    match ctx.windows.get(&visible) {
        Some(spec) => {
            ctx.bound.push(visible);
            Ok(LogicalPlan::Window {
                spec: *spec,
                input: Box::new(plan),
            })
        }
        None => Ok(plan),
    }
}

fn alias_name(alias: &Option<TableAlias>) -> Option<String> {
    alias.as_ref().map(|a| a.name.value.clone())
}

fn join_constraint_to_on_pairs(constraint: &JoinConstraint) -> Result<Vec<(String, String)>> {
    match constraint {
        JoinConstraint::On(expr) => {
            let mut pairs = vec![];
            collect_equi_join_pairs(expr, &mut pairs)?;
            if pairs.is_empty() {
                return Err(StqError::Unsupported(
                    "JOIN ... ON must be an equi-join (a=b)".to_string(),
                ));
            }
            Ok(pairs)
        }
        _ => Err(StqError::Unsupported("JOIN requires ON ...".to_string())),
    }
}

fn collect_equi_join_pairs(expr: &SqlExpr, out: &mut Vec<(String, String)>) -> Result<()> {
    match expr {
        SqlExpr::BinaryOp { left, op, right } => {
            if *op == SqlBinaryOp::Eq {
                let l = sql_ident_expr_to_col(left)?;
                let r = sql_ident_expr_to_col(right)?;
                out.push((l, r));
                return Ok(());
            }
            // allow AND of equi conditions: a=b AND c=d
            if *op == SqlBinaryOp::And {
                collect_equi_join_pairs(left, out)?;
                collect_equi_join_pairs(right, out)?;
                return Ok(());
            }
            Ok(())
        }
        SqlExpr::Nested(inner) => collect_equi_join_pairs(inner, out),
        _ => Ok(()),
    }
}

fn group_by_exprs(g: &GroupByExpr, params: &HashMap<String, LiteralValue>) -> Result<Vec<Expr>> {
    match g {
        GroupByExpr::Expressions(es, _mods) => {
            es.iter().map(|e| sql_expr_to_expr(e, params)).collect()
        }
        GroupByExpr::All(_mods) => Err(StqError::Unsupported(
            "GROUP BY ALL is not supported".to_string(),
        )),
    }
}

fn first_function_arg(func: &sqlparser::ast::Function) -> Option<&FunctionArg> {
    match &func.args {
        FunctionArguments::List(list) => list.args.first(),
        _ => None,
    }
}

fn try_parse_agg(
    e: &SqlExpr,
    params: &HashMap<String, LiteralValue>,
) -> Result<Option<(AggExpr, String)>> {
    let func = match e {
        SqlExpr::Function(f) => f,
        _ => return Ok(None),
    };

    let fname = object_name_to_string(&func.name).to_uppercase();
    let arg0 = first_function_arg(func);

    let agg = match fname.as_str() {
        "COUNT" => match arg0 {
            Some(FunctionArg::Unnamed(FunctionArgExpr::Wildcard)) => {
                AggExpr::Count(Expr::Literal(LiteralValue::Int64(1)))
            }
            Some(a0) => AggExpr::Count(function_arg_to_expr(a0, params)?),
            None => {
                return Err(StqError::Unsupported(
                    "COUNT() requires an argument".to_string(),
                ))
            }
        },
        "SUM" => AggExpr::Sum(function_arg_to_expr(required_arg(arg0, "SUM")?, params)?),
        "MIN" => AggExpr::Min(function_arg_to_expr(required_arg(arg0, "MIN")?, params)?),
        "MAX" => AggExpr::Max(function_arg_to_expr(required_arg(arg0, "MAX")?, params)?),
        "AVG" => AggExpr::Avg(function_arg_to_expr(required_arg(arg0, "AVG")?, params)?),
        _ => {
            return Err(StqError::Unsupported(format!(
                "unsupported function: {fname}"
            )))
        }
    };

    let arg_text = arg0.map(|a| a.to_string()).unwrap_or_default();
    Ok(Some((agg, format!("{fname}({arg_text})"))))
}

fn required_arg<'a>(a: Option<&'a FunctionArg>, name: &str) -> Result<&'a FunctionArg> {
    a.ok_or_else(|| StqError::Unsupported(format!("{name}() requires one argument")))
}

fn function_arg_to_expr(a: &FunctionArg, params: &HashMap<String, LiteralValue>) -> Result<Expr> {
    match a {
        FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => sql_expr_to_expr(e, params),
        FunctionArg::Unnamed(FunctionArgExpr::Wildcard) => Err(StqError::Unsupported(
            "* is only supported as COUNT(*)".to_string(),
        )),
        _ => Err(StqError::Unsupported(
            "unsupported function argument form".to_string(),
        )),
    }
}

fn sql_expr_to_expr(e: &SqlExpr, params: &HashMap<String, LiteralValue>) -> Result<Expr> {
    match e {
        SqlExpr::Identifier(id) => Ok(Expr::Column(id.value.clone())),
        SqlExpr::CompoundIdentifier(parts) => Ok(Expr::Column(compound_ident_to_string(parts))),
        SqlExpr::Value(v) => sql_value_to_literal(v, params),
        SqlExpr::Nested(inner) => sql_expr_to_expr(inner, params),
        SqlExpr::IsNull(inner) => Ok(Expr::IsNull(Box::new(sql_expr_to_expr(inner, params)?))),
        SqlExpr::IsNotNull(inner) => Ok(Expr::IsNotNull(Box::new(sql_expr_to_expr(
            inner, params,
        )?))),
        SqlExpr::Cast {
            expr, data_type, ..
        } => Ok(Expr::Cast {
            expr: Box::new(sql_expr_to_expr(expr, params)?),
            to_type: sql_type_to_arrow(data_type)?,
        }),
        SqlExpr::BinaryOp { left, op, right } => {
            // AND/OR are represented as BinaryOp too
            if *op == SqlBinaryOp::And {
                return Ok(Expr::And(
                    Box::new(sql_expr_to_expr(left, params)?),
                    Box::new(sql_expr_to_expr(right, params)?),
                ));
            }
            if *op == SqlBinaryOp::Or {
                return Ok(Expr::Or(
                    Box::new(sql_expr_to_expr(left, params)?),
                    Box::new(sql_expr_to_expr(right, params)?),
                ));
            }

            let bop = sql_binop_to_binop(op)?;
            Ok(Expr::BinaryOp {
                left: Box::new(sql_expr_to_expr(left, params)?),
                op: bop,
                right: Box::new(sql_expr_to_expr(right, params)?),
            })
        }
        SqlExpr::UnaryOp { op, expr } => match op.to_string().to_uppercase().as_str() {
            "NOT" => Ok(Expr::Not(Box::new(sql_expr_to_expr(expr, params)?))),
            "-" => match sql_expr_to_expr(expr, params)? {
                Expr::Literal(LiteralValue::Int64(i)) => Ok(Expr::Literal(LiteralValue::Int64(-i))),
                Expr::Literal(LiteralValue::Float64(f)) => {
                    Ok(Expr::Literal(LiteralValue::Float64(-f)))
                }
                other => Ok(Expr::BinaryOp {
                    left: Box::new(Expr::Literal(LiteralValue::Int64(0))),
                    op: BinaryOp::Minus,
                    right: Box::new(other),
                }),
            },
            "+" => sql_expr_to_expr(expr, params),
            _ => Err(StqError::Unsupported(format!("unsupported unary op: {op}"))),
        },
        SqlExpr::Function(_) => Err(StqError::Unsupported(format!(
            "aggregate functions are only supported as top-level select items: {e}"
        ))),
        _ => Err(StqError::Unsupported(format!(
            "unsupported SQL expression: {e}"
        ))),
    }
}

fn sql_value_to_literal(v: &Value, params: &HashMap<String, LiteralValue>) -> Result<Expr> {
    match v {
        Value::Number(s, _) => {
            if s.contains('.') || s.contains('e') || s.contains('E') {
                let f: f64 = s
                    .parse()
                    .map_err(|_| StqError::analysis(format!("bad number: {s}")))?;
                Ok(Expr::Literal(LiteralValue::Float64(f)))
            } else {
                let i: i64 = s
                    .parse()
                    .map_err(|_| StqError::analysis(format!("bad number: {s}")))?;
                Ok(Expr::Literal(LiteralValue::Int64(i)))
            }
        }
        Value::SingleQuotedString(s) => Ok(Expr::Literal(LiteralValue::Utf8(s.clone()))),
        Value::Boolean(b) => Ok(Expr::Literal(LiteralValue::Boolean(*b))),
        Value::Null => Ok(Expr::Literal(LiteralValue::Null)),
        Value::Placeholder(ph) => {
            let key = normalize_placeholder_key(ph);
            match params.get(&key) {
                Some(v) => Ok(Expr::Literal(v.clone())),
                None => Err(StqError::Analysis {
                    message: format!("missing SQL parameter :{key} (placeholder={ph})"),
                    symbol: Some(key),
                }),
            }
        }
        _ => Err(StqError::Unsupported(format!("unsupported SQL literal: {v}"))),
    }
}

fn sql_type_to_arrow(dt: &SqlDataType) -> Result<DataType> {
    let text = dt.to_string().to_ascii_uppercase();
    let base = text.split('(').next().unwrap_or_default().trim();
    Ok(match base {
        "INT" | "INTEGER" | "INT4" => DataType::Int32,
        "BIGINT" | "LONG" | "INT8" | "INT64" => DataType::Int64,
        "DOUBLE" | "DOUBLE PRECISION" | "FLOAT" | "FLOAT8" | "REAL" | "FLOAT64" => {
            DataType::Float64
        }
        "BOOLEAN" | "BOOL" => DataType::Boolean,
        "STRING" | "TEXT" | "VARCHAR" | "CHAR" | "CHARACTER VARYING" => DataType::Utf8,
        _ => {
            return Err(StqError::Unsupported(format!(
                "unsupported CAST target type: {dt}"
            )))
        }
    })
}

fn sql_limit_to_usize(e: &SqlExpr, params: &HashMap<String, LiteralValue>) -> Result<usize> {
    let expr = sql_expr_to_expr(e, params)?;
    match expr {
        Expr::Literal(LiteralValue::Int64(i)) => {
            if i < 0 {
                Err(StqError::analysis("LIMIT must be non-negative"))
            } else {
                Ok(i as usize)
            }
        }
        Expr::Literal(LiteralValue::Float64(_)) => {
            Err(StqError::analysis("LIMIT must be an integer"))
        }
        _ => Err(StqError::analysis(
            "LIMIT must be a literal integer or bound parameter",
        )),
    }
}

fn sql_binop_to_binop(op: &SqlBinaryOp) -> Result<BinaryOp> {
    Ok(match op {
        SqlBinaryOp::Eq => BinaryOp::Eq,
        SqlBinaryOp::NotEq => BinaryOp::NotEq,
        SqlBinaryOp::Lt => BinaryOp::Lt,
        SqlBinaryOp::LtEq => BinaryOp::LtEq,
        SqlBinaryOp::Gt => BinaryOp::Gt,
        SqlBinaryOp::GtEq => BinaryOp::GtEq,
        SqlBinaryOp::Plus => BinaryOp::Plus,
        SqlBinaryOp::Minus => BinaryOp::Minus,
        SqlBinaryOp::Multiply => BinaryOp::Multiply,
        SqlBinaryOp::Divide => BinaryOp::Divide,
        _ => {
            return Err(StqError::Unsupported(format!(
                "unsupported binary operator: {op}"
            )))
        }
    })
}

fn object_name_to_string(n: &ObjectName) -> String {
    n.0.iter()
        .map(|i| i.value.clone())
        .collect::<Vec<_>>()
        .join(".")
}

fn compound_ident_to_string(parts: &[Ident]) -> String {
    parts
        .iter()
        .map(|i| i.value.clone())
        .collect::<Vec<_>>()
        .join(".")
}

fn sql_ident_expr_to_col(e: &SqlExpr) -> Result<String> {
    match e {
        SqlExpr::Identifier(id) => Ok(id.value.clone()),
        SqlExpr::CompoundIdentifier(parts) => Ok(compound_ident_to_string(parts)),
        _ => Err(StqError::Unsupported(
            "JOIN keys must be column identifiers".to_string(),
        )),
    }
}

fn normalize_placeholder_key(ph: &str) -> String {
    let s = ph.trim();
    let s = s.strip_prefix(':').unwrap_or(s);
    s.to_string()
}

fn expr_to_name_fallback(e: &Expr) -> String {
    match e {
        Expr::Column(c) => c.rsplit('.').next().unwrap_or(c).to_string(),
        Expr::Literal(_) => "lit".to_string(),
        _ => "expr".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_params() -> HashMap<String, LiteralValue> {
        HashMap::new()
    }

    #[test]
    fn streaming_note_survives_non_parse_generic_errors() {
        let generic = Err(StqError::Unsupported("HAVING is not supported".to_string()));
        let err = resolve_dialects(generic, Some("unknown time unit FOO".to_string()))
            .expect_err("both dialects failed");
        match err {
            StqError::Unsupported(m) => {
                assert!(m.starts_with("HAVING is not supported"), "{m}");
                assert!(m.contains("streaming dialect: unknown time unit FOO"), "{m}");
            }
            other => panic!("expected unsupported, got {other:?}"),
        }

        let generic = Err(StqError::unresolved("column", "x"));
        let err = resolve_dialects(generic, Some("bad slide".to_string())).expect_err("fails");
        assert_eq!(err.symbol(), Some("x"));
        assert!(err.to_string().contains("bad slide"), "{err}");
    }

    #[test]
    fn windowed_query_uses_streaming_dialect() {
        let parsed = parse_query(
            "SELECT word, COUNT(*) AS n FROM words OVER (WINDOW '30' SECONDS, SLIDE '10' SECONDS) GROUP BY word",
            &no_params(),
        )
        .expect("parse");
        assert_eq!(parsed.dialect, Dialect::Streaming);
        let LogicalPlan::Projection { input, .. } = parsed.plan else {
            panic!("expected projection root");
        };
        let LogicalPlan::Aggregate { input, .. } = *input else {
            panic!("expected aggregate");
        };
        assert_eq!(
            *input,
            LogicalPlan::Window {
                spec: WindowSpec::new(30_000, 10_000),
                input: Box::new(LogicalPlan::table("words")),
            }
        );
    }

    #[test]
    fn plain_sql_falls_back_to_generic_dialect() {
        let parsed =
            parse_query("SELECT a FROM t WHERE a > 1 LIMIT 5", &no_params()).expect("parse");
        assert_eq!(parsed.dialect, Dialect::Generic);
        assert!(matches!(parsed.plan, LogicalPlan::Limit { n: 5, .. }));
    }

    #[test]
    fn malformed_in_both_dialects_reports_generic_error_with_note() {
        let err = parse_query("SELECT a FROM t OVER (WINDOW 5 FORTNIGHTS)", &no_params())
            .expect_err("must fail");
        match err {
            StqError::Parse(p) => {
                let note = p.streaming_note.expect("streaming note kept");
                assert!(note.contains("unknown time unit"), "{note}");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn garbage_text_is_a_parse_error() {
        let err = parse_query("SELEC nothing", &no_params()).expect_err("must fail");
        assert!(matches!(err, StqError::Parse(_)), "{err:?}");
    }

    #[test]
    fn alias_and_derived_table_become_subquery_alias() {
        let plan = sql_to_logical(
            "SELECT s.a FROM (SELECT a FROM t) AS s JOIN u AS x ON s.a = x.a",
            &no_params(),
        )
        .expect("parse");
        let LogicalPlan::Projection { input, .. } = plan else {
            panic!("expected projection");
        };
        let LogicalPlan::Join { left, right, on, .. } = *input else {
            panic!("expected join");
        };
        assert!(matches!(*left, LogicalPlan::SubqueryAlias { ref alias, .. } if alias == "s"));
        assert!(matches!(*right, LogicalPlan::SubqueryAlias { ref alias, .. } if alias == "x"));
        assert_eq!(on, vec![("s.a".to_string(), "x.a".to_string())]);
    }

    #[test]
    fn select_star_has_no_projection() {
        let plan = sql_to_logical("SELECT * FROM t WHERE x IS NOT NULL", &no_params())
            .expect("parse");
        assert!(matches!(plan, LogicalPlan::Filter { .. }));
    }

    #[test]
    fn count_star_and_default_agg_names() {
        let plan = sql_to_logical("SELECT COUNT(*), SUM(v) FROM t", &no_params()).expect("parse");
        let LogicalPlan::Projection { exprs, input } = plan else {
            panic!("expected projection");
        };
        let names: Vec<_> = exprs.iter().map(|(_, n)| n.as_str()).collect();
        assert_eq!(names, vec!["COUNT(*)", "SUM(v)"]);
        assert!(matches!(*input, LogicalPlan::Aggregate { .. }));
    }

    #[test]
    fn window_binds_to_alias_not_table_name() {
        let parsed = parse_query(
            "SELECT c.x FROM clicks AS c OVER (WINDOW 2 SECONDS) JOIN users ON c.x = users.x",
            &no_params(),
        )
        .expect("parse");
        assert_eq!(parsed.dialect, Dialect::Streaming);
        let LogicalPlan::Projection { input, .. } = parsed.plan else {
            panic!("expected projection");
        };
        let LogicalPlan::Join { left, right, .. } = *input else {
            panic!("expected join");
        };
        assert!(matches!(
            *left,
            LogicalPlan::Window { spec, ref input }
                if spec == WindowSpec::tumbling(2_000)
                    && matches!(**input, LogicalPlan::SubqueryAlias { ref alias, .. } if alias == "c")
        ));
        assert_eq!(*right, LogicalPlan::table("users"));
    }

    #[test]
    fn placeholder_binding() {
        let mut params = HashMap::new();
        params.insert("k".to_string(), LiteralValue::Int64(3));
        let plan = sql_to_logical("SELECT a FROM t LIMIT :k", &params).expect("parse");
        assert!(matches!(plan, LogicalPlan::Limit { n: 3, .. }));
    }
}
