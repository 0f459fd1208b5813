use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arrow_schema::{Schema, SchemaRef};
use stq_common::{Result, Row, StreamConfig};
use stq_planner::{LiteralValue, LogicalPlan, PlanAnalyzer, PlanOptimizer};
use stq_storage::json::{infer_schema, read_json_lines, InferOptions, JsonRowConverter};
use stq_storage::StreamRecord;
use tracing::{debug, info};

use crate::command::{CatalogCommands, CommandExecutor};
use crate::planner_facade::PlannerFacade;
use crate::session::{Session, SharedSession};
use crate::StreamingView;

/// Compiles streaming SQL into plans that are re-evaluated once per micro-batch.
///
/// Cloning is cheap; clones share one catalog.
#[derive(Debug, Clone)]
pub struct StreamCompiler {
    session: SharedSession,
}

/// Builds a [`StreamCompiler`] with injected collaborators.
pub struct StreamCompilerBuilder {
    config: StreamConfig,
    analyzer: Option<Arc<dyn PlanAnalyzer>>,
    optimizer: Option<Arc<dyn PlanOptimizer>>,
    commands: Option<Arc<dyn CommandExecutor>>,
}

impl StreamCompilerBuilder {
    pub fn analyzer(mut self, analyzer: Arc<dyn PlanAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn optimizer(mut self, optimizer: Arc<dyn PlanOptimizer>) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    pub fn command_executor(mut self, commands: Arc<dyn CommandExecutor>) -> Self {
        self.commands = Some(commands);
        self
    }

    /// Fails with `InvalidConfig` when the config does not validate.
    pub fn build(self) -> Result<StreamCompiler> {
        let analyzer = self.analyzer.unwrap_or_else(PlannerFacade::default_analyzer);
        let optimizer = self
            .optimizer
            .unwrap_or_else(|| PlannerFacade::default_optimizer(self.config.predicate_pushdown));
        let commands = self
            .commands
            .unwrap_or_else(|| Arc::new(CatalogCommands));
        let planner = PlannerFacade::new(analyzer, optimizer, self.config.batch_interval_ms);
        let session = Session::new(self.config, planner, commands)?;
        Ok(StreamCompiler {
            session: Arc::new(session),
        })
    }
}

impl StreamCompiler {
    pub fn new(config: StreamConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: StreamConfig) -> StreamCompilerBuilder {
        StreamCompilerBuilder {
            config,
            analyzer: None,
            optimizer: None,
            commands: None,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.session.config
    }

    /// Parse query text, streaming dialect first. No catalog access.
    pub fn parse(&self, sql: &str) -> Result<LogicalPlan> {
        self.session.planner.plan_sql(sql, &HashMap::new())
    }

    /// [`StreamCompiler::parse`] with `:name` placeholders bound from `params`.
    pub fn parse_with_params(
        &self,
        sql: &str,
        params: &HashMap<String, LiteralValue>,
    ) -> Result<LogicalPlan> {
        self.session.planner.plan_sql(sql, params)
    }

    /// Analyze against the catalog, then run the generic and window optimizers.
    pub fn resolve_and_optimize(&self, plan: LogicalPlan) -> Result<LogicalPlan> {
        self.session.resolve_and_optimize(plan)
    }

    pub fn compile_query(&self, sql: &str) -> Result<StreamingView> {
        self.compile_query_with_params(sql, &HashMap::new())
    }

    pub fn compile_query_with_params(
        &self,
        sql: &str,
        params: &HashMap<String, LiteralValue>,
    ) -> Result<StreamingView> {
        let parsed = self.parse_with_params(sql, params)?;
        let plan = self.resolve_and_optimize(parsed)?;
        Ok(StreamingView::new(self.session.clone(), plan))
    }

    /// Run a non-query command through the command executor and render its rows,
    /// one per line. Blocks until the executor returns.
    pub fn execute_command(&self, command: &str) -> Result<String> {
        let ctx = self.session.command_context();
        let rows = self.session.commands.execute(command, &ctx)?;
        debug!(rows = rows.len(), "executed command");
        Ok(rows
            .iter()
            .map(Row::to_string)
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Insert or replace `name`. Returns `true` when an entry was replaced.
    pub fn register_table(&self, name: impl Into<String>, plan: LogicalPlan) -> bool {
        let name = name.into();
        let replaced = self.session.catalog_mut().register(name.clone(), plan);
        info!(table = %name, replaced, "registered table");
        replaced
    }

    pub fn unregister_table(&self, name: &str) -> bool {
        self.session.catalog_mut().unregister(name)
    }

    pub fn lookup_table(&self, name: &str) -> Result<LogicalPlan> {
        self.session.catalog().lookup(name).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.session.catalog().table_names()
    }

    /// View over a registered table. Fails with `NotFound` for unknown names.
    pub fn table(&self, name: &str) -> Result<StreamingView> {
        self.session.catalog().lookup(name)?;
        Ok(StreamingView::new(
            self.session.clone(),
            LogicalPlan::table(name),
        ))
    }

    /// View over a raw source whose rows follow `schema`.
    pub fn stream(&self, source: impl Into<String>, schema: SchemaRef) -> StreamingView {
        StreamingView::new(
            self.session.clone(),
            LogicalPlan::stream_scan(source, schema),
        )
    }

    /// [`StreamCompiler::stream`] with the schema taken from a record type.
    pub fn record_stream<R: StreamRecord>(&self, source: impl Into<String>) -> StreamingView {
        self.stream(source, Arc::new(R::schema()))
    }

    /// Static rows, identical in every batch.
    pub fn local_relation(&self, schema: SchemaRef, rows: Vec<Row>) -> StreamingView {
        StreamingView::new(
            self.session.clone(),
            LogicalPlan::LocalRelation {
                schema,
                rows: Arc::new(rows),
            },
        )
    }

    /// Infer a schema from JSON records with the configured sampling ratio and seed.
    pub fn infer_json_schema<I, S>(&self, records: I) -> Result<Schema>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        infer_schema(records, &InferOptions::from(&self.session.config))
    }

    /// Reads the whole JSON-lines file. Blocking.
    pub fn infer_json_schema_from_path(&self, path: impl AsRef<Path>) -> Result<Schema> {
        let lines = read_json_lines(path)?;
        self.infer_json_schema(&lines)
    }

    /// Convert raw JSON records; malformed ones land in the configured corrupt-record column.
    pub fn json_rows<I, S>(&self, records: I, schema: &Schema) -> Vec<Row>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        JsonRowConverter::new(schema, self.session.config.corrupt_record_column.as_str())
            .convert_batch(records)
    }

    /// Infer a schema from `sample` and register a stream over `source` as `name`.
    pub fn register_json_stream<I, S>(
        &self,
        name: impl Into<String>,
        source: impl Into<String>,
        sample: I,
    ) -> Result<SchemaRef>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let schema: SchemaRef = Arc::new(self.infer_json_schema(sample)?);
        self.register_table(name, LogicalPlan::stream_scan(source, schema.clone()));
        Ok(schema)
    }
}
