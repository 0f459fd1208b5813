//! Streaming rewrite that adapts windowed plans to repeated per-batch evaluation.
//!
//! Runs after the generic optimizer on analyzed plans:
//! 1. every window is validated against the batch interval;
//! 2. `Window` nodes are pushed down onto the stream scans they cover, stopping at
//!    operators that do not commute with windowing (`Aggregate`, `Limit`);
//! 3. aggregates over windowed input switch to incremental mode, with `AVG` split into
//!    mergeable `SUM`/`COUNT` partials.
//!
//! The rewrite is idempotent.

use arrow_schema::DataType;
use stq_common::{Result, StqError};
use tracing::debug;

use crate::analyzer::expr_name;
use crate::logical_plan::{AggExpr, AggregateMode, BinaryOp, Expr, LogicalPlan, WindowSpec};
use crate::optimizer::try_map_children;

const AVG_SUM_PREFIX: &str = "__avg_sum_";
const AVG_COUNT_PREFIX: &str = "__avg_count_";

#[derive(Debug, Clone, Copy)]
pub struct WindowOptimizer {
    batch_interval_ms: u64,
}

impl WindowOptimizer {
    pub fn new(batch_interval_ms: u64) -> Self {
        Self { batch_interval_ms }
    }

    pub fn batch_interval_ms(&self) -> u64 {
        self.batch_interval_ms
    }

    pub fn rewrite(&self, plan: LogicalPlan) -> Result<LogicalPlan> {
        self.validate(&plan)?;
        let plan = push_windows(plan)?;
        mark_incremental(plan)
    }

    /// Check size/slide of every window in `plan` against the batch interval.
    pub fn validate(&self, plan: &LogicalPlan) -> Result<()> {
        match plan {
            LogicalPlan::Window { spec, input } => {
                self.validate_spec(*spec, &relation_name(input))?
            }
            LogicalPlan::StreamScan {
                source,
                window: Some(spec),
                ..
            } => self.validate_spec(*spec, source)?,
            _ => {}
        }
        plan.inputs().into_iter().try_for_each(|p| self.validate(p))
    }

    fn validate_spec(&self, spec: WindowSpec, relation: &str) -> Result<()> {
        let interval = self.batch_interval_ms;
        let problem = if spec.size_ms == 0 || spec.slide_ms == 0 {
            Some("window size and slide must be positive".to_string())
        } else if spec.slide_ms > spec.size_ms {
            Some(format!(
                "slide {}ms exceeds window size {}ms",
                spec.slide_ms, spec.size_ms
            ))
        } else if interval == 0 {
            Some("batch interval must be positive".to_string())
        } else if spec.size_ms % interval != 0 || spec.slide_ms % interval != 0 {
            Some(format!(
                "window {}ms / slide {}ms is not a multiple of the {interval}ms batch interval",
                spec.size_ms, spec.slide_ms
            ))
        } else {
            None
        };
        match problem {
            Some(p) => Err(StqError::Analysis {
                message: format!("invalid stream window on {relation}: {p}"),
                symbol: Some(relation.to_string()),
            }),
            None => Ok(()),
        }
    }
}

/// Name a window's target for error messages.
fn relation_name(plan: &LogicalPlan) -> String {
    match plan {
        LogicalPlan::SubqueryAlias { alias, .. } => alias.clone(),
        LogicalPlan::StreamScan { source, .. } => source.clone(),
        LogicalPlan::TableScan { table } => table.clone(),
        other => other
            .inputs()
            .first()
            .map(|p| relation_name(p))
            .unwrap_or_else(|| "<local>".to_string()),
    }
}

fn push_windows(plan: LogicalPlan) -> Result<LogicalPlan> {
    match plan {
        LogicalPlan::Window { spec, input } => {
            let input = push_windows(*input)?;
            apply_window(spec, input)
        }
        other => try_map_children(other, push_windows),
    }
}

fn apply_window(spec: WindowSpec, plan: LogicalPlan) -> Result<LogicalPlan> {
    match plan {
        LogicalPlan::StreamScan {
            source,
            schema,
            projection,
            filters,
            window,
        } => {
            if let Some(existing) = window {
                if existing != spec {
                    return Err(StqError::Unsupported(format!(
                        "nested stream windows on {source}: {}ms/{}ms inside {}ms/{}ms",
                        existing.size_ms, existing.slide_ms, spec.size_ms, spec.slide_ms
                    )));
                }
            } else {
                debug!(source = %source, size_ms = spec.size_ms, slide_ms = spec.slide_ms, "attached stream window");
            }
            Ok(LogicalPlan::StreamScan {
                source,
                schema,
                projection,
                filters,
                window: Some(spec),
            })
        }
        local @ LogicalPlan::LocalRelation { .. } => Ok(local),
        LogicalPlan::Window {
            spec: inner,
            input,
        } => {
            if inner != spec {
                return Err(StqError::Unsupported(format!(
                    "nested stream windows: {}ms/{}ms inside {}ms/{}ms",
                    inner.size_ms, inner.slide_ms, spec.size_ms, spec.slide_ms
                )));
            }
            Ok(LogicalPlan::Window { spec, input })
        }
        stop @ (LogicalPlan::Aggregate { .. }
        | LogicalPlan::Limit { .. }
        | LogicalPlan::TableScan { .. }) => Ok(LogicalPlan::Window {
            spec,
            input: Box::new(stop),
        }),
        other => try_map_children(other, |p| apply_window(spec, p)),
    }
}

fn mark_incremental(plan: LogicalPlan) -> Result<LogicalPlan> {
    let plan = try_map_children(plan, mark_incremental)?;
    let (group_exprs, aggr_exprs, input) = match plan {
        LogicalPlan::Aggregate {
            group_exprs,
            aggr_exprs,
            input,
            mode: AggregateMode::PerBatch,
        } => (group_exprs, aggr_exprs, input),
        other => return Ok(other),
    };

    let window = match input_window(&input)? {
        Some(w) => w,
        None => {
            return Ok(LogicalPlan::Aggregate {
                group_exprs,
                aggr_exprs,
                input,
                mode: AggregateMode::PerBatch,
            })
        }
    };
    debug!(
        size_ms = window.size_ms,
        slide_ms = window.slide_ms,
        "aggregate switched to incremental mode"
    );
    let mode = AggregateMode::Incremental { window };

    if !aggr_exprs.iter().any(|(a, _)| matches!(a, AggExpr::Avg(_))) {
        return Ok(LogicalPlan::Aggregate {
            group_exprs,
            aggr_exprs,
            input,
            mode,
        });
    }

    // Output columns of the aggregate: grouping fields first, then aggregates.
    let mut out_exprs: Vec<(Expr, String)> = group_exprs
        .iter()
        .enumerate()
        .map(|(i, g)| {
            let name = expr_name(g).to_string();
            (
                Expr::ColumnRef {
                    name: name.clone(),
                    index: i,
                },
                name,
            )
        })
        .collect();

    let mut partial_aggs = Vec::with_capacity(aggr_exprs.len() + 1);
    for (agg, name) in aggr_exprs {
        match agg {
            AggExpr::Avg(e) => {
                let sum_name = format!("{AVG_SUM_PREFIX}{name}");
                let count_name = format!("{AVG_COUNT_PREFIX}{name}");
                let sum_ref = column_ref(&sum_name, group_exprs.len() + partial_aggs.len());
                partial_aggs.push((AggExpr::Sum(e.clone()), sum_name));
                let count_ref = column_ref(&count_name, group_exprs.len() + partial_aggs.len());
                partial_aggs.push((AggExpr::Count(e), count_name));
                out_exprs.push((
                    Expr::BinaryOp {
                        left: Box::new(cast_f64(sum_ref)),
                        op: BinaryOp::Divide,
                        right: Box::new(cast_f64(count_ref)),
                    },
                    name,
                ));
            }
            other => {
                let r = column_ref(&name, group_exprs.len() + partial_aggs.len());
                partial_aggs.push((other, name.clone()));
                out_exprs.push((r, name));
            }
        }
    }

    Ok(LogicalPlan::Projection {
        exprs: out_exprs,
        input: Box::new(LogicalPlan::Aggregate {
            group_exprs,
            aggr_exprs: partial_aggs,
            input,
            mode,
        }),
    })
}

/// The single window covering an aggregate's input, if any.
fn input_window(input: &LogicalPlan) -> Result<Option<WindowSpec>> {
    let windows = input.windows();
    match windows.as_slice() {
        [] => Ok(None),
        [w] => Ok(Some(*w)),
        _ => Err(StqError::Unsupported(
            "aggregate over inputs with different stream windows".to_string(),
        )),
    }
}

fn column_ref(name: &str, index: usize) -> Expr {
    Expr::ColumnRef {
        name: name.to_string(),
        index,
    }
}

fn cast_f64(e: Expr) -> Expr {
    Expr::Cast {
        expr: Box::new(e),
        to_type: DataType::Float64,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_schema::{Field, Schema};

    use super::*;

    fn scan() -> LogicalPlan {
        LogicalPlan::stream_scan(
            "clicks",
            Arc::new(Schema::new(vec![
                Field::new("user", DataType::Utf8, true),
                Field::new("ms", DataType::Int64, true),
            ])),
        )
    }

    fn windowed_avg(spec: WindowSpec) -> LogicalPlan {
        LogicalPlan::Aggregate {
            group_exprs: vec![column_ref("user", 0)],
            aggr_exprs: vec![(AggExpr::Avg(column_ref("ms", 1)), "avg_ms".to_string())],
            input: Box::new(LogicalPlan::Window {
                spec,
                input: Box::new(LogicalPlan::Filter {
                    predicate: Expr::IsNotNull(Box::new(column_ref("user", 0))),
                    input: Box::new(LogicalPlan::SubqueryAlias {
                        alias: "c".to_string(),
                        input: Box::new(scan()),
                    }),
                }),
            }),
            mode: AggregateMode::PerBatch,
        }
    }

    #[test]
    fn window_reaches_scan_and_avg_is_decomposed() {
        let spec = WindowSpec::new(10_000, 5_000);
        let out = WindowOptimizer::new(1_000)
            .rewrite(windowed_avg(spec))
            .expect("rewrite");

        let LogicalPlan::Projection { exprs, input } = &out else {
            panic!("expected finishing projection: {out:?}");
        };
        assert_eq!(exprs[0].1, "user");
        assert_eq!(exprs[1].1, "avg_ms");
        let LogicalPlan::Aggregate {
            aggr_exprs, mode, ..
        } = input.as_ref()
        else {
            panic!("expected aggregate");
        };
        assert_eq!(*mode, AggregateMode::Incremental { window: spec });
        let names: Vec<_> = aggr_exprs.iter().map(|(_, n)| n.as_str()).collect();
        assert_eq!(names, vec!["__avg_sum_avg_ms", "__avg_count_avg_ms"]);
        assert_eq!(out.windows(), vec![spec]);
    }

    #[test]
    fn rewrite_is_idempotent() {
        let opt = WindowOptimizer::new(1_000);
        let once = opt
            .rewrite(windowed_avg(WindowSpec::tumbling(3_000)))
            .expect("first");
        let twice = opt.rewrite(once.clone()).expect("second");
        assert_eq!(once, twice);
    }

    #[test]
    fn misaligned_window_names_relation() {
        let err = WindowOptimizer::new(1_000)
            .rewrite(windowed_avg(WindowSpec::new(2_500, 2_500)))
            .expect_err("misaligned");
        assert_eq!(err.symbol(), Some("c"));

        let err = WindowOptimizer::new(1_000)
            .rewrite(windowed_avg(WindowSpec::new(2_000, 4_000)))
            .expect_err("slide > size");
        assert!(err.to_string().contains("exceeds"), "{err}");
    }

    #[test]
    fn window_stops_at_limit() {
        let spec = WindowSpec::tumbling(1_000);
        let plan = LogicalPlan::Window {
            spec,
            input: Box::new(LogicalPlan::Limit {
                n: 5,
                input: Box::new(scan()),
            }),
        };
        let out = WindowOptimizer::new(1_000).rewrite(plan.clone()).expect("ok");
        assert_eq!(out, plan);
    }

    #[test]
    fn nested_different_windows_are_unsupported() {
        let plan = LogicalPlan::Window {
            spec: WindowSpec::tumbling(2_000),
            input: Box::new(LogicalPlan::Window {
                spec: WindowSpec::tumbling(1_000),
                input: Box::new(scan()),
            }),
        };
        let err = WindowOptimizer::new(1_000).rewrite(plan).expect_err("nested");
        assert!(matches!(err, StqError::Unsupported(_)), "{err:?}");
    }

    #[test]
    fn plans_without_windows_pass_through() {
        let plan = LogicalPlan::Aggregate {
            group_exprs: vec![],
            aggr_exprs: vec![(AggExpr::Avg(column_ref("ms", 1)), "a".to_string())],
            input: Box::new(scan()),
            mode: AggregateMode::PerBatch,
        };
        let out = WindowOptimizer::new(1_000).rewrite(plan.clone()).expect("ok");
        assert_eq!(out, plan);
    }
}
