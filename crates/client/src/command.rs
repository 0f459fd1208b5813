//! Boundary to the engine that runs non-query commands.
//!
//! The compiler hands command text to a [`CommandExecutor`] and renders the rows it
//! returns. [`CatalogCommands`] is the built-in executor; it only knows about the
//! session catalog.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use sqlparser::ast::{ObjectName, ObjectType, Statement};
use stq_common::{Result, Row, StqError, Value};
use stq_planner::{LogicalPlan, PlanAnalyzer};
use stq_storage::Catalog;
use tracing::{debug, info};

/// What an executor may touch while running one command.
pub struct CommandContext<'a> {
    pub catalog: &'a RwLock<Catalog>,
    pub analyzer: &'a dyn PlanAnalyzer,
}

impl CommandContext<'_> {
    pub fn catalog(&self) -> RwLockReadGuard<'_, Catalog> {
        self.catalog.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn catalog_mut(&self) -> RwLockWriteGuard<'_, Catalog> {
        self.catalog.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs a command to completion and returns all of its rows.
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, command: &str, ctx: &CommandContext<'_>) -> Result<Vec<Row>>;
}

/// Catalog maintenance commands:
/// - `SHOW TABLES`: one row per registered name, sorted
/// - `DROP TABLE [IF EXISTS] name[, ...]`: no rows; unregistered names are skipped
/// - `DESCRIBE [TABLE] name`: one `[column, type, nullable]` row per output field
#[derive(Debug, Default, Clone, Copy)]
pub struct CatalogCommands;

impl CommandExecutor for CatalogCommands {
    fn execute(&self, command: &str, ctx: &CommandContext<'_>) -> Result<Vec<Row>> {
        let stmts = stq_sql::parse_sql(command)?;
        let stmt = match stmts.as_slice() {
            [stmt] => stmt,
            _ => {
                return Err(StqError::Unsupported(format!(
                    "expected exactly one command, got {}",
                    stmts.len()
                )))
            }
        };
        match stmt {
            Statement::ShowTables { .. } => {
                let names = ctx.catalog().table_names();
                Ok(names
                    .into_iter()
                    .map(|n| Row::new(vec![Value::Utf8(n)]))
                    .collect())
            }
            Statement::Drop {
                object_type: ObjectType::Table | ObjectType::View,
                names,
                ..
            } => {
                let mut catalog = ctx.catalog_mut();
                for name in names.iter().map(catalog_name) {
                    if catalog.unregister(&name) {
                        info!(table = %name, "dropped table");
                    } else {
                        debug!(table = %name, "drop of unregistered table ignored");
                    }
                }
                Ok(vec![])
            }
            Statement::ExplainTable { table_name, .. } => {
                describe(&catalog_name(table_name), ctx)
            }
            other => Err(StqError::Unsupported(format!("command: {other}"))),
        }
    }
}

fn describe(name: &str, ctx: &CommandContext<'_>) -> Result<Vec<Row>> {
    let catalog = ctx.catalog();
    catalog.lookup(name)?;
    let analyzed = ctx.analyzer.analyze(LogicalPlan::table(name), &*catalog)?;
    let schema = ctx.analyzer.output_schema(&analyzed)?;
    Ok(schema
        .fields()
        .iter()
        .map(|f| {
            Row::new(vec![
                Value::Utf8(f.name().clone()),
                Value::Utf8(f.data_type().to_string()),
                Value::Boolean(f.is_nullable()),
            ])
        })
        .collect())
}

fn catalog_name(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|i| i.value.as_str())
        .collect::<Vec<_>>()
        .join(".")
}
