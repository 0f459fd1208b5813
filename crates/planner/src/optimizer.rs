use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use stq_common::Result;
use tracing::debug;

use crate::logical_plan::{BinaryOp, Expr, LiteralValue, LogicalPlan};

/// Configuration knobs for rule-based optimization.
#[derive(Debug, Clone, Copy)]
pub struct OptimizerConfig {
    /// Move filters below aliases/windows and into stream scans.
    pub predicate_pushdown: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            predicate_pushdown: true,
        }
    }
}

/// Pluggable generic optimization step of the compile pipeline.
pub trait PlanOptimizer: Send + Sync {
    /// Rewrite an analyzed plan into an equivalent one.
    fn optimize(&self, plan: LogicalPlan) -> Result<LogicalPlan>;
}

/// Custom optimizer rule hook.
pub trait OptimizerRule: Send + Sync {
    /// Stable rule name used by registry.
    fn name(&self) -> &str;
    /// Rewrite input plan and return transformed plan.
    fn rewrite(&self, plan: LogicalPlan, cfg: OptimizerConfig) -> Result<LogicalPlan>;
}

/// Rule-based optimizer for analyzed logical plans.
///
/// Rewrites preserve the output schema and column indices of every operator they
/// move, so the plan stays valid for the window rewrite and for re-analysis.
pub struct Optimizer {
    config: OptimizerConfig,
    custom_rules: RwLock<HashMap<String, Arc<dyn OptimizerRule>>>,
}

impl std::fmt::Debug for Optimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .custom_rules
            .read()
            .map(|m| m.len())
            .unwrap_or_default();
        f.debug_struct("Optimizer")
            .field("config", &self.config)
            .field("custom_rules", &count)
            .finish()
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer {
    /// Create a new optimizer with default configuration.
    pub fn new() -> Self {
        Self::with_config(OptimizerConfig::default())
    }

    pub fn with_config(config: OptimizerConfig) -> Self {
        Self {
            config,
            custom_rules: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> OptimizerConfig {
        self.config
    }

    /// Register or replace a custom optimizer rule.
    ///
    /// Returns `true` when an existing rule with the same name was replaced.
    pub fn register_rule(&self, rule: Arc<dyn OptimizerRule>) -> bool {
        self.custom_rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(rule.name().to_string(), rule)
            .is_some()
    }

    /// Deregister a custom optimizer rule by name.
    ///
    /// Returns `true` when an existing rule was removed.
    pub fn deregister_rule(&self, name: &str) -> bool {
        self.custom_rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    /// Apply the rule pipeline to an analyzed logical plan.
    ///
    /// Pass order is fixed:
    /// 1. constant folding
    /// 2. filter merge, dropping always-true filters
    /// 3. limit merge
    /// 4. predicate pushdown (when enabled)
    /// 5. user-registered rules, ordered by name
    pub fn optimize(&self, plan: LogicalPlan) -> Result<LogicalPlan> {
        let plan = rewrite_plan_exprs(plan, &fold_constants_expr);
        let plan = merge_filters(plan);
        let plan = merge_limits(plan);
        let mut plan = if self.config.predicate_pushdown {
            predicate_pushdown(plan)
        } else {
            plan
        };

        let mut rules = self
            .custom_rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect::<Vec<_>>();
        rules.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, rule) in rules {
            debug!(rule = %name, "applying custom optimizer rule");
            plan = rule.rewrite(plan, self.config)?;
        }

        Ok(plan)
    }
}

impl PlanOptimizer for Optimizer {
    fn optimize(&self, plan: LogicalPlan) -> Result<LogicalPlan> {
        Optimizer::optimize(self, plan)
    }
}

// -----------------------------
// 1) Constant folding
// -----------------------------

fn fold_constants_expr(e: Expr) -> Expr {
    match e {
        Expr::Not(inner) => match *inner {
            Expr::Literal(LiteralValue::Boolean(b)) => Expr::Literal(LiteralValue::Boolean(!b)),
            other => Expr::Not(Box::new(other)),
        },
        Expr::And(a, b) => match (*a, *b) {
            (Expr::Literal(LiteralValue::Boolean(false)), _)
            | (_, Expr::Literal(LiteralValue::Boolean(false))) => {
                Expr::Literal(LiteralValue::Boolean(false))
            }
            (Expr::Literal(LiteralValue::Boolean(true)), other)
            | (other, Expr::Literal(LiteralValue::Boolean(true))) => other,
            (a, b) => Expr::And(Box::new(a), Box::new(b)),
        },
        Expr::Or(a, b) => match (*a, *b) {
            (Expr::Literal(LiteralValue::Boolean(true)), _)
            | (_, Expr::Literal(LiteralValue::Boolean(true))) => {
                Expr::Literal(LiteralValue::Boolean(true))
            }
            (Expr::Literal(LiteralValue::Boolean(false)), other)
            | (other, Expr::Literal(LiteralValue::Boolean(false))) => other,
            (a, b) => Expr::Or(Box::new(a), Box::new(b)),
        },
        Expr::BinaryOp { left, op, right } => {
            if let (Expr::Literal(lv), Expr::Literal(rv)) = (left.as_ref(), right.as_ref()) {
                if let Some(out) = eval_binary(lv.clone(), op, rv.clone()) {
                    return Expr::Literal(out);
                }
            }
            Expr::BinaryOp { left, op, right }
        }
        other => other,
    }
}

fn eval_binary(l: LiteralValue, op: BinaryOp, r: LiteralValue) -> Option<LiteralValue> {
    use LiteralValue::*;
    match (l, op, r) {
        (Boolean(a), BinaryOp::Eq, Boolean(b)) => Some(Boolean(a == b)),
        (Boolean(a), BinaryOp::NotEq, Boolean(b)) => Some(Boolean(a != b)),

        (Int64(a), BinaryOp::Plus, Int64(b)) => a.checked_add(b).map(Int64),
        (Int64(a), BinaryOp::Minus, Int64(b)) => a.checked_sub(b).map(Int64),
        (Int64(a), BinaryOp::Multiply, Int64(b)) => a.checked_mul(b).map(Int64),
        (Int64(a), BinaryOp::Eq, Int64(b)) => Some(Boolean(a == b)),
        (Int64(a), BinaryOp::NotEq, Int64(b)) => Some(Boolean(a != b)),
        (Int64(a), BinaryOp::Lt, Int64(b)) => Some(Boolean(a < b)),
        (Int64(a), BinaryOp::LtEq, Int64(b)) => Some(Boolean(a <= b)),
        (Int64(a), BinaryOp::Gt, Int64(b)) => Some(Boolean(a > b)),
        (Int64(a), BinaryOp::GtEq, Int64(b)) => Some(Boolean(a >= b)),

        (Float64(a), BinaryOp::Plus, Float64(b)) => Some(Float64(a + b)),
        (Float64(a), BinaryOp::Minus, Float64(b)) => Some(Float64(a - b)),
        (Float64(a), BinaryOp::Multiply, Float64(b)) => Some(Float64(a * b)),
        (Float64(a), BinaryOp::Divide, Float64(b)) if b != 0.0 => Some(Float64(a / b)),
        (Float64(a), BinaryOp::Eq, Float64(b)) => Some(Boolean(a == b)),
        (Float64(a), BinaryOp::NotEq, Float64(b)) => Some(Boolean(a != b)),
        (Float64(a), BinaryOp::Lt, Float64(b)) => Some(Boolean(a < b)),
        (Float64(a), BinaryOp::LtEq, Float64(b)) => Some(Boolean(a <= b)),
        (Float64(a), BinaryOp::Gt, Float64(b)) => Some(Boolean(a > b)),
        (Float64(a), BinaryOp::GtEq, Float64(b)) => Some(Boolean(a >= b)),

        (Utf8(a), BinaryOp::Eq, Utf8(b)) => Some(Boolean(a == b)),
        (Utf8(a), BinaryOp::NotEq, Utf8(b)) => Some(Boolean(a != b)),
        _ => None,
    }
}

// -----------------------------
// 2) Filter merge
// -----------------------------

fn merge_filters(plan: LogicalPlan) -> LogicalPlan {
    match plan {
        LogicalPlan::Filter { predicate, input } => {
            let input = merge_filters(*input);
            if predicate == Expr::Literal(LiteralValue::Boolean(true)) {
                return input;
            }
            if let LogicalPlan::Filter {
                predicate: inner_pred,
                input: inner_input,
            } = input
            {
                // Filter(Filter(x)) => Filter(x) with merged predicate
                LogicalPlan::Filter {
                    predicate: Expr::And(Box::new(inner_pred), Box::new(predicate)),
                    input: inner_input,
                }
            } else {
                LogicalPlan::Filter {
                    predicate,
                    input: Box::new(input),
                }
            }
        }
        other => map_children(other, merge_filters),
    }
}

// -----------------------------
// 3) Limit merge
// -----------------------------

fn merge_limits(plan: LogicalPlan) -> LogicalPlan {
    match plan {
        LogicalPlan::Limit { n, input } => match merge_limits(*input) {
            LogicalPlan::Limit { n: inner, input } => LogicalPlan::Limit {
                n: n.min(inner),
                input,
            },
            other => LogicalPlan::Limit {
                n,
                input: Box::new(other),
            },
        },
        other => map_children(other, merge_limits),
    }
}

// -----------------------------
// 4) Predicate pushdown
// -----------------------------

/// Filters move through nodes that keep their input's columns in place: aliases and
/// stream windows. A filter directly above an unprojected stream scan becomes a scan
/// filter.
fn predicate_pushdown(plan: LogicalPlan) -> LogicalPlan {
    match plan {
        LogicalPlan::Filter { predicate, input } => {
            let input = predicate_pushdown(*input);
            push_filter(predicate, input)
        }
        other => map_children(other, predicate_pushdown),
    }
}

fn push_filter(predicate: Expr, input: LogicalPlan) -> LogicalPlan {
    match input {
        LogicalPlan::StreamScan {
            source,
            schema,
            projection: None,
            mut filters,
            window,
        } => {
            filters.extend(split_conjuncts(predicate));
            LogicalPlan::StreamScan {
                source,
                schema,
                projection: None,
                filters,
                window,
            }
        }
        LogicalPlan::SubqueryAlias { alias, input } => LogicalPlan::SubqueryAlias {
            alias,
            input: Box::new(push_filter(predicate, *input)),
        },
        LogicalPlan::Window { spec, input } => LogicalPlan::Window {
            spec,
            input: Box::new(push_filter(predicate, *input)),
        },
        LogicalPlan::Filter {
            predicate: inner,
            input,
        } => push_filter(Expr::And(Box::new(inner), Box::new(predicate)), *input),
        other => LogicalPlan::Filter {
            predicate,
            input: Box::new(other),
        },
    }
}

// -----------------------------
// Tree helpers
// -----------------------------

pub(crate) fn map_children(plan: LogicalPlan, f: impl Fn(LogicalPlan) -> LogicalPlan) -> LogicalPlan {
    match plan {
        LogicalPlan::SubqueryAlias { alias, input } => LogicalPlan::SubqueryAlias {
            alias,
            input: Box::new(f(*input)),
        },
        LogicalPlan::Filter { predicate, input } => LogicalPlan::Filter {
            predicate,
            input: Box::new(f(*input)),
        },
        LogicalPlan::Projection { exprs, input } => LogicalPlan::Projection {
            exprs,
            input: Box::new(f(*input)),
        },
        LogicalPlan::Aggregate {
            group_exprs,
            aggr_exprs,
            input,
            mode,
        } => LogicalPlan::Aggregate {
            group_exprs,
            aggr_exprs,
            input: Box::new(f(*input)),
            mode,
        },
        LogicalPlan::Join {
            left,
            right,
            on,
            join_type,
        } => LogicalPlan::Join {
            left: Box::new(f(*left)),
            right: Box::new(f(*right)),
            on,
            join_type,
        },
        LogicalPlan::Limit { n, input } => LogicalPlan::Limit {
            n,
            input: Box::new(f(*input)),
        },
        LogicalPlan::Window { spec, input } => LogicalPlan::Window {
            spec,
            input: Box::new(f(*input)),
        },
        leaf @ (LogicalPlan::TableScan { .. }
        | LogicalPlan::StreamScan { .. }
        | LogicalPlan::LocalRelation { .. }) => leaf,
    }
}

pub(crate) fn try_map_children(
    plan: LogicalPlan,
    f: impl Fn(LogicalPlan) -> Result<LogicalPlan>,
) -> Result<LogicalPlan> {
    Ok(match plan {
        LogicalPlan::SubqueryAlias { alias, input } => LogicalPlan::SubqueryAlias {
            alias,
            input: Box::new(f(*input)?),
        },
        LogicalPlan::Filter { predicate, input } => LogicalPlan::Filter {
            predicate,
            input: Box::new(f(*input)?),
        },
        LogicalPlan::Projection { exprs, input } => LogicalPlan::Projection {
            exprs,
            input: Box::new(f(*input)?),
        },
        LogicalPlan::Aggregate {
            group_exprs,
            aggr_exprs,
            input,
            mode,
        } => LogicalPlan::Aggregate {
            group_exprs,
            aggr_exprs,
            input: Box::new(f(*input)?),
            mode,
        },
        LogicalPlan::Join {
            left,
            right,
            on,
            join_type,
        } => LogicalPlan::Join {
            left: Box::new(f(*left)?),
            right: Box::new(f(*right)?),
            on,
            join_type,
        },
        LogicalPlan::Limit { n, input } => LogicalPlan::Limit {
            n,
            input: Box::new(f(*input)?),
        },
        LogicalPlan::Window { spec, input } => LogicalPlan::Window {
            spec,
            input: Box::new(f(*input)?),
        },
        leaf @ (LogicalPlan::TableScan { .. }
        | LogicalPlan::StreamScan { .. }
        | LogicalPlan::LocalRelation { .. }) => leaf,
    })
}

fn rewrite_plan_exprs(plan: LogicalPlan, rewrite: &dyn Fn(Expr) -> Expr) -> LogicalPlan {
    match plan {
        LogicalPlan::Filter { predicate, input } => LogicalPlan::Filter {
            predicate: rewrite_expr(predicate, rewrite),
            input: Box::new(rewrite_plan_exprs(*input, rewrite)),
        },
        LogicalPlan::Projection { exprs, input } => LogicalPlan::Projection {
            exprs: exprs
                .into_iter()
                .map(|(e, n)| (rewrite_expr(e, rewrite), n))
                .collect(),
            input: Box::new(rewrite_plan_exprs(*input, rewrite)),
        },
        LogicalPlan::Aggregate {
            group_exprs,
            aggr_exprs,
            input,
            mode,
        } => LogicalPlan::Aggregate {
            group_exprs: group_exprs
                .into_iter()
                .map(|e| rewrite_expr(e, rewrite))
                .collect(),
            aggr_exprs,
            input: Box::new(rewrite_plan_exprs(*input, rewrite)),
            mode,
        },
        LogicalPlan::StreamScan {
            source,
            schema,
            projection,
            filters,
            window,
        } => LogicalPlan::StreamScan {
            source,
            schema,
            projection,
            filters: filters
                .into_iter()
                .map(|e| rewrite_expr(e, rewrite))
                .collect(),
            window,
        },
        other => map_children(other, |p| rewrite_plan_exprs(p, rewrite)),
    }
}

fn rewrite_expr(e: Expr, rewrite: &dyn Fn(Expr) -> Expr) -> Expr {
    let e = match e {
        Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
            left: Box::new(rewrite_expr(*left, rewrite)),
            op,
            right: Box::new(rewrite_expr(*right, rewrite)),
        },
        Expr::And(a, b) => Expr::And(
            Box::new(rewrite_expr(*a, rewrite)),
            Box::new(rewrite_expr(*b, rewrite)),
        ),
        Expr::Or(a, b) => Expr::Or(
            Box::new(rewrite_expr(*a, rewrite)),
            Box::new(rewrite_expr(*b, rewrite)),
        ),
        Expr::Not(x) => Expr::Not(Box::new(rewrite_expr(*x, rewrite))),
        Expr::IsNull(x) => Expr::IsNull(Box::new(rewrite_expr(*x, rewrite))),
        Expr::IsNotNull(x) => Expr::IsNotNull(Box::new(rewrite_expr(*x, rewrite))),
        Expr::Cast { expr, to_type } => Expr::Cast {
            expr: Box::new(rewrite_expr(*expr, rewrite)),
            to_type,
        },
        other => other,
    };
    rewrite(e)
}

fn split_conjuncts(e: Expr) -> Vec<Expr> {
    match e {
        Expr::And(a, b) => {
            let mut v = split_conjuncts(*a);
            v.extend(split_conjuncts(*b));
            v
        }
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_schema::{DataType, Field, Schema};

    use super::*;

    fn col(i: usize, name: &str) -> Expr {
        Expr::ColumnRef {
            name: name.to_string(),
            index: i,
        }
    }

    fn gt(l: Expr, v: i64) -> Expr {
        Expr::BinaryOp {
            left: Box::new(l),
            op: BinaryOp::Gt,
            right: Box::new(Expr::Literal(LiteralValue::Int64(v))),
        }
    }

    fn scan() -> LogicalPlan {
        LogicalPlan::stream_scan(
            "events",
            Arc::new(Schema::new(vec![Field::new("v", DataType::Int64, true)])),
        )
    }

    #[test]
    fn folds_constants_and_drops_true_filter() {
        let plan = LogicalPlan::Filter {
            predicate: Expr::BinaryOp {
                left: Box::new(Expr::Literal(LiteralValue::Int64(2))),
                op: BinaryOp::Gt,
                right: Box::new(Expr::Literal(LiteralValue::Int64(1))),
            },
            input: Box::new(scan()),
        };
        assert_eq!(Optimizer::new().optimize(plan).expect("optimize"), scan());
    }

    #[test]
    fn filter_moves_through_alias_and_window_into_scan() {
        let spec = crate::logical_plan::WindowSpec::tumbling(1_000);
        let plan = LogicalPlan::Filter {
            predicate: gt(col(0, "v"), 1),
            input: Box::new(LogicalPlan::Window {
                spec,
                input: Box::new(LogicalPlan::SubqueryAlias {
                    alias: "e".to_string(),
                    input: Box::new(LogicalPlan::Filter {
                        predicate: gt(col(0, "v"), 0),
                        input: Box::new(scan()),
                    }),
                }),
            }),
        };
        let out = Optimizer::new().optimize(plan).expect("optimize");
        let LogicalPlan::Window { input, .. } = out else {
            panic!("expected window on top: {out:?}");
        };
        let LogicalPlan::SubqueryAlias { input, .. } = *input else {
            panic!("expected alias");
        };
        let LogicalPlan::StreamScan { filters, .. } = *input else {
            panic!("expected scan");
        };
        assert_eq!(filters, vec![gt(col(0, "v"), 0), gt(col(0, "v"), 1)]);
    }

    #[test]
    fn pushdown_can_be_disabled() {
        let plan = LogicalPlan::Filter {
            predicate: gt(col(0, "v"), 1),
            input: Box::new(scan()),
        };
        let opt = Optimizer::with_config(OptimizerConfig {
            predicate_pushdown: false,
        });
        assert!(matches!(
            opt.optimize(plan).expect("optimize"),
            LogicalPlan::Filter { .. }
        ));
    }

    #[test]
    fn nested_limits_keep_smaller_bound() {
        let plan = LogicalPlan::Limit {
            n: 10,
            input: Box::new(LogicalPlan::Limit {
                n: 3,
                input: Box::new(scan()),
            }),
        };
        assert_eq!(
            Optimizer::new().optimize(plan).expect("optimize"),
            LogicalPlan::Limit {
                n: 3,
                input: Box::new(scan()),
            }
        );
    }
}
