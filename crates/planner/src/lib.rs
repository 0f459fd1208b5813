//! Query planning for streaming micro-batch queries.
//!
//! Pipeline: [`sql_frontend::parse_query`] (streaming dialect, then generic dialect) →
//! [`Analyzer`] → [`Optimizer`] → [`WindowOptimizer`]. Analyzer and optimizer sit behind
//! the [`PlanAnalyzer`] / [`PlanOptimizer`] traits so callers can inject their own.

pub mod analyzer;
pub mod explain;
pub mod logical_plan;
pub mod optimizer;
pub mod sql_frontend;
pub mod window_optimizer;

pub use analyzer::{Analyzer, PlanAnalyzer, RelationProvider};
pub use explain::explain_logical;
pub use logical_plan::*;
pub use optimizer::{Optimizer, OptimizerConfig, OptimizerRule, PlanOptimizer};
pub use sql_frontend::{parse_query, sql_to_logical, Dialect, ParsedQuery};
pub use window_optimizer::WindowOptimizer;
