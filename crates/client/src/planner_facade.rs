use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arrow_schema::SchemaRef;
use stq_common::Result;
use stq_planner::{
    parse_query, Analyzer, LiteralValue, LogicalPlan, Optimizer, OptimizerConfig, PlanAnalyzer,
    PlanOptimizer, RelationProvider, WindowOptimizer,
};
use tracing::debug;

/// Parse → analyze → optimize → window rewrite, with swappable analyzer and optimizer.
#[derive(Clone)]
pub(crate) struct PlannerFacade {
    analyzer: Arc<dyn PlanAnalyzer>,
    optimizer: Arc<dyn PlanOptimizer>,
    window_optimizer: WindowOptimizer,
}

impl PlannerFacade {
    pub(crate) fn new(
        analyzer: Arc<dyn PlanAnalyzer>,
        optimizer: Arc<dyn PlanOptimizer>,
        batch_interval_ms: u64,
    ) -> Self {
        Self {
            analyzer,
            optimizer,
            window_optimizer: WindowOptimizer::new(batch_interval_ms),
        }
    }

    pub(crate) fn default_analyzer() -> Arc<dyn PlanAnalyzer> {
        Arc::new(Analyzer::new())
    }

    pub(crate) fn default_optimizer(predicate_pushdown: bool) -> Arc<dyn PlanOptimizer> {
        Arc::new(Optimizer::with_config(OptimizerConfig { predicate_pushdown }))
    }

    pub(crate) fn analyzer(&self) -> &dyn PlanAnalyzer {
        self.analyzer.as_ref()
    }

    pub(crate) fn plan_sql(
        &self,
        sql: &str,
        params: &HashMap<String, LiteralValue>,
    ) -> Result<LogicalPlan> {
        let parsed = parse_query(sql, params)?;
        debug!(dialect = ?parsed.dialect, "parsed query");
        Ok(parsed.plan)
    }

    /// Full post-parse pipeline. `relations` must stay unchanged for the duration of the call.
    pub(crate) fn resolve_and_optimize(
        &self,
        plan: LogicalPlan,
        relations: &dyn RelationProvider,
    ) -> Result<LogicalPlan> {
        let analyzed = self.analyzer.analyze(plan, relations)?;
        let optimized = self.optimizer.optimize(analyzed)?;
        let rewritten = self.window_optimizer.rewrite(optimized)?;
        debug!(
            windows = rewritten.windows().len(),
            batch_interval_ms = self.window_optimizer.batch_interval_ms(),
            "resolved and optimized plan"
        );
        Ok(rewritten)
    }

    pub(crate) fn output_schema(
        &self,
        plan: LogicalPlan,
        relations: &dyn RelationProvider,
    ) -> Result<SchemaRef> {
        let analyzed = self.analyzer.analyze(plan, relations)?;
        self.analyzer.output_schema(&analyzed)
    }
}

impl fmt::Debug for PlannerFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannerFacade")
            .field("window_optimizer", &self.window_optimizer)
            .finish_non_exhaustive()
    }
}
