use std::sync::Arc;

use arrow_schema::SchemaRef;
use stq_common::{BatchContext, Result, StqError};
use stq_planner::{
    explain_logical, AggExpr, AggregateMode, Expr, JoinType, LogicalPlan, WindowSpec,
};
use tracing::debug;

use crate::session::SharedSession;

/// A query plan bound to the compiler session that produced it.
///
/// Composition methods only build plans; names are resolved by [`StreamingView::optimize`],
/// [`StreamingView::schema`] and [`StreamingView::batch_plan`] against the session catalog
/// as it is at that moment.
#[derive(Debug, Clone)]
pub struct StreamingView {
    session: SharedSession,
    plan: LogicalPlan,
}

/// What to evaluate for one micro-batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlan {
    pub batch: BatchContext,
    pub plan: LogicalPlan,
    /// True when every window in the plan closes at this batch time (always true for
    /// unwindowed plans).
    pub emit: bool,
}

impl StreamingView {
    pub(crate) fn new(session: SharedSession, plan: LogicalPlan) -> Self {
        Self { session, plan }
    }

    pub fn plan(&self) -> &LogicalPlan {
        &self.plan
    }

    pub fn into_plan(self) -> LogicalPlan {
        self.plan
    }

    /// Register this view's plan under `name` in the owning session's catalog.
    /// Returns `true` when an existing entry was replaced.
    pub fn register_as_table(&self, name: impl Into<String>) -> bool {
        self.session.catalog_mut().register(name, self.plan.clone())
    }

    pub fn schema(&self) -> Result<SchemaRef> {
        self.session.output_schema(&self.plan)
    }

    pub fn explain(&self) -> String {
        explain_logical(&self.plan)
    }

    pub fn filter(self, predicate: Expr) -> Self {
        let plan = LogicalPlan::Filter {
            predicate,
            input: Box::new(self.plan),
        };
        Self::new(self.session, plan)
    }

    /// Inner equi-join; `on` pairs are `(left_column, right_column)`.
    pub fn join(self, right: StreamingView, on: Vec<(String, String)>) -> Result<Self> {
        if !Arc::ptr_eq(&self.session, &right.session) {
            return Err(StqError::analysis(
                "cannot join views from different compiler sessions",
            ));
        }
        let plan = LogicalPlan::Join {
            left: Box::new(self.plan),
            right: Box::new(right.plan),
            on,
            join_type: JoinType::Inner,
        };
        Ok(Self::new(self.session, plan))
    }

    pub fn group_by(self, keys: Vec<Expr>) -> GroupedView {
        GroupedView {
            session: self.session,
            input: self.plan,
            keys,
        }
    }

    /// Evaluate over a time window of batches instead of the current batch only.
    pub fn window(self, spec: WindowSpec) -> Self {
        let plan = LogicalPlan::Window {
            spec,
            input: Box::new(self.plan),
        };
        Self::new(self.session, plan)
    }

    pub fn limit(self, n: usize) -> Self {
        let plan = LogicalPlan::Limit {
            n,
            input: Box::new(self.plan),
        };
        Self::new(self.session, plan)
    }

    /// Resolve and optimize the composed plan, as `compile_query` does for SQL.
    pub fn optimize(&self) -> Result<Self> {
        let plan = self.session.resolve_and_optimize(self.plan.clone())?;
        Ok(Self::new(Arc::clone(&self.session), plan))
    }

    pub fn batch_plan(&self, batch: &BatchContext) -> Result<BatchPlan> {
        let plan = self.session.resolve_and_optimize(self.plan.clone())?;
        let emit = plan
            .windows()
            .iter()
            .all(|w| w.fires_at(batch.batch_time_ms));
        debug!(%batch, emit, "planned batch");
        Ok(BatchPlan {
            batch: *batch,
            plan,
            emit,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GroupedView {
    session: SharedSession,
    input: LogicalPlan,
    keys: Vec<Expr>,
}

impl GroupedView {
    pub fn agg(self, aggs: Vec<(AggExpr, String)>) -> StreamingView {
        let plan = LogicalPlan::Aggregate {
            group_exprs: self.keys,
            aggr_exprs: aggs,
            input: Box::new(self.input),
            mode: AggregateMode::PerBatch,
        };
        StreamingView::new(self.session, plan)
    }
}
