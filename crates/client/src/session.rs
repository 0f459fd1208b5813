use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

use arrow_schema::SchemaRef;
use stq_common::{Result, StreamConfig};
use stq_planner::LogicalPlan;
use stq_storage::Catalog;

use crate::command::{CommandContext, CommandExecutor};
use crate::planner_facade::PlannerFacade;

pub(crate) type SharedSession = Arc<Session>;

/// State shared by a compiler and every view it hands out.
pub(crate) struct Session {
    pub(crate) config: StreamConfig,
    pub(crate) catalog: RwLock<Catalog>,
    pub(crate) planner: PlannerFacade,
    pub(crate) commands: Arc<dyn CommandExecutor>,
}

impl Session {
    pub(crate) fn new(
        config: StreamConfig,
        planner: PlannerFacade,
        commands: Arc<dyn CommandExecutor>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            catalog: RwLock::new(Catalog::new()),
            planner,
            commands,
        })
    }

    pub(crate) fn catalog(&self) -> RwLockReadGuard<'_, Catalog> {
        self.catalog.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn catalog_mut(&self) -> RwLockWriteGuard<'_, Catalog> {
        self.catalog.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Analysis sees one catalog snapshot: the read lock is held for the whole pipeline.
    pub(crate) fn resolve_and_optimize(&self, plan: LogicalPlan) -> Result<LogicalPlan> {
        let catalog = self.catalog();
        self.planner.resolve_and_optimize(plan, &*catalog)
    }

    pub(crate) fn output_schema(&self, plan: &LogicalPlan) -> Result<SchemaRef> {
        let catalog = self.catalog();
        self.planner.output_schema(plan.clone(), &*catalog)
    }

    pub(crate) fn command_context(&self) -> CommandContext<'_> {
        CommandContext {
            catalog: &self.catalog,
            analyzer: self.planner.analyzer(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Session");
        d.field("config", &self.config);
        match self.catalog.try_read() {
            Ok(catalog) => d.field("tables", &catalog.len()),
            Err(TryLockError::Poisoned(p)) => d.field("tables", &p.into_inner().len()),
            Err(TryLockError::WouldBlock) => d.field("tables", &format_args!("<locked>")),
        };
        d.field("planner", &self.planner).finish_non_exhaustive()
    }
}
