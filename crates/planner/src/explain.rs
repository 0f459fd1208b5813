use crate::logical_plan::{AggExpr, AggregateMode, Expr, LogicalPlan, WindowSpec};

/// Render logical plan as human-readable multiline text.
pub fn explain_logical(plan: &LogicalPlan) -> String {
    let mut s = String::new();
    fmt_plan(plan, 0, &mut s);
    s
}

fn fmt_plan(plan: &LogicalPlan, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    match plan {
        LogicalPlan::TableScan { table } => {
            out.push_str(&format!("{pad}TableScan table={table}\n"));
        }
        LogicalPlan::StreamScan {
            source,
            schema,
            projection,
            filters,
            window,
        } => {
            out.push_str(&format!(
                "{pad}StreamScan source={source} fields={} window={}\n",
                schema.fields().len(),
                window.map(fmt_window).unwrap_or_else(|| "none".to_string())
            ));
            if let Some(cols) = projection {
                out.push_str(&format!("{pad}  projection={cols:?}\n"));
            }
            if !filters.is_empty() {
                out.push_str(&format!("{pad}  pushed_filters={}\n", filters.len()));
                for f in filters {
                    out.push_str(&format!("{pad}    {}\n", fmt_expr(f)));
                }
            }
        }
        LogicalPlan::LocalRelation { schema, rows } => {
            out.push_str(&format!(
                "{pad}LocalRelation fields={} rows={}\n",
                schema.fields().len(),
                rows.len()
            ));
        }
        LogicalPlan::SubqueryAlias { alias, input } => {
            out.push_str(&format!("{pad}SubqueryAlias {alias}\n"));
            fmt_plan(input, indent + 1, out);
        }
        LogicalPlan::Filter { predicate, input } => {
            out.push_str(&format!("{pad}Filter {}\n", fmt_expr(predicate)));
            fmt_plan(input, indent + 1, out);
        }
        LogicalPlan::Projection { exprs, input } => {
            out.push_str(&format!("{pad}Projection\n"));
            for (e, name) in exprs {
                out.push_str(&format!("{pad}  {name} := {}\n", fmt_expr(e)));
            }
            fmt_plan(input, indent + 1, out);
        }
        LogicalPlan::Aggregate {
            group_exprs,
            aggr_exprs,
            input,
            mode,
        } => {
            let mode = match mode {
                AggregateMode::PerBatch => "per_batch".to_string(),
                AggregateMode::Incremental { window } => {
                    format!("incremental {}", fmt_window(*window))
                }
            };
            out.push_str(&format!("{pad}Aggregate mode={mode}\n"));
            out.push_str(&format!("{pad}  group_by={}\n", group_exprs.len()));
            for g in group_exprs {
                out.push_str(&format!("{pad}    {}\n", fmt_expr(g)));
            }
            out.push_str(&format!("{pad}  aggs={}\n", aggr_exprs.len()));
            for (a, name) in aggr_exprs {
                out.push_str(&format!("{pad}    {name} := {}\n", fmt_agg(a)));
            }
            fmt_plan(input, indent + 1, out);
        }
        LogicalPlan::Join {
            on,
            join_type,
            left,
            right,
        } => {
            out.push_str(&format!("{pad}Join type={join_type:?}\n"));
            out.push_str(&format!("{pad}  on={:?}\n", on));
            out.push_str(&format!("{pad}  left:\n"));
            fmt_plan(left, indent + 2, out);
            out.push_str(&format!("{pad}  right:\n"));
            fmt_plan(right, indent + 2, out);
        }
        LogicalPlan::Limit { n, input } => {
            out.push_str(&format!("{pad}Limit n={n}\n"));
            fmt_plan(input, indent + 1, out);
        }
        LogicalPlan::Window { spec, input } => {
            out.push_str(&format!("{pad}Window {}\n", fmt_window(*spec)));
            fmt_plan(input, indent + 1, out);
        }
    }
}

fn fmt_window(w: WindowSpec) -> String {
    if w.size_ms == w.slide_ms {
        format!("tumbling({}ms)", w.size_ms)
    } else {
        format!("sliding({}ms, slide={}ms)", w.size_ms, w.slide_ms)
    }
}

fn fmt_agg(a: &AggExpr) -> String {
    match a {
        AggExpr::Count(e) => format!("count({})", fmt_expr(e)),
        AggExpr::Sum(e) => format!("sum({})", fmt_expr(e)),
        AggExpr::Min(e) => format!("min({})", fmt_expr(e)),
        AggExpr::Max(e) => format!("max({})", fmt_expr(e)),
        AggExpr::Avg(e) => format!("avg({})", fmt_expr(e)),
    }
}

fn fmt_expr(e: &Expr) -> String {
    match e {
        Expr::Column(c) => c.clone(),
        Expr::ColumnRef { name, index } => format!("{name}#{index}"),
        Expr::Literal(v) => format!("{v:?}"),
        Expr::Cast { expr, to_type } => format!("cast({} as {to_type:?})", fmt_expr(expr)),
        Expr::Not(x) => format!("NOT ({})", fmt_expr(x)),
        Expr::IsNull(x) => format!("({}) IS NULL", fmt_expr(x)),
        Expr::IsNotNull(x) => format!("({}) IS NOT NULL", fmt_expr(x)),
        Expr::And(a, b) => format!("({}) AND ({})", fmt_expr(a), fmt_expr(b)),
        Expr::Or(a, b) => format!("({}) OR ({})", fmt_expr(a), fmt_expr(b)),
        Expr::BinaryOp { left, op, right } => {
            format!("({}) {:?} ({})", fmt_expr(left), op, fmt_expr(right))
        }
    }
}
