use std::sync::Arc;

use arrow_schema::{DataType, SchemaRef};
use serde::{Deserialize, Serialize};
use stq_common::Row;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Unresolved column reference (`name` or `relation.name`).
    Column(String),
    /// Column bound by the analyzer to a position in the input schema.
    ColumnRef { name: String, index: usize },
    Literal(LiteralValue),
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Cast {
        expr: Box<Expr>,
        to_type: DataType,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    IsNull(Box<Expr>),
    IsNotNull(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    Int64(i64),
    Float64(f64),
    Utf8(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
}

/// Time window over a stream, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowSpec {
    pub size_ms: u64,
    pub slide_ms: u64,
}

impl WindowSpec {
    /// Sliding window.
    pub fn new(size_ms: u64, slide_ms: u64) -> Self {
        Self { size_ms, slide_ms }
    }

    /// Non-overlapping window: slide equals size.
    pub fn tumbling(size_ms: u64) -> Self {
        Self::new(size_ms, size_ms)
    }

    /// Number of micro-batches covered by one window.
    pub fn batches_per_window(&self, batch_interval_ms: u64) -> u64 {
        self.size_ms / batch_interval_ms.max(1)
    }

    /// Whether a window ends at `batch_time_ms` and its result should be emitted.
    pub fn fires_at(&self, batch_time_ms: u64) -> bool {
        self.slide_ms != 0 && batch_time_ms % self.slide_ms == 0
    }
}

/// How an aggregate is evaluated across micro-batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AggregateMode {
    /// Aggregate over the rows of the current batch only.
    #[default]
    PerBatch,
    /// Keep mergeable partial state across the batches of `window`.
    Incremental { window: WindowSpec },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogicalPlan {
    /// Catalog relation referenced by name; replaced by the analyzer.
    TableScan { table: String },
    /// Rows of one micro-batch (or one window of batches) of a raw source.
    StreamScan {
        source: String,
        schema: SchemaRef,
        projection: Option<Vec<String>>,
        filters: Vec<Expr>,
        window: Option<WindowSpec>,
    },
    /// Static rows, identical for every batch.
    LocalRelation { schema: SchemaRef, rows: Arc<Vec<Row>> },
    SubqueryAlias {
        alias: String,
        input: Box<LogicalPlan>,
    },
    Projection {
        exprs: Vec<(Expr, String)>,
        input: Box<LogicalPlan>,
    },
    Filter {
        predicate: Expr,
        input: Box<LogicalPlan>,
    },
    Join {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
        on: Vec<(String, String)>,
        join_type: JoinType,
    },
    Aggregate {
        group_exprs: Vec<Expr>,
        aggr_exprs: Vec<(AggExpr, String)>,
        input: Box<LogicalPlan>,
        mode: AggregateMode,
    },
    Limit {
        n: usize,
        input: Box<LogicalPlan>,
    },
    /// Stream window as written in the query; consumed by the window optimizer.
    Window {
        spec: WindowSpec,
        input: Box<LogicalPlan>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AggExpr {
    Count(Expr),
    Sum(Expr),
    Min(Expr),
    Max(Expr),
    Avg(Expr),
}

impl LogicalPlan {
    /// Leaf over a named raw source with a known schema.
    pub fn stream_scan(source: impl Into<String>, schema: SchemaRef) -> Self {
        LogicalPlan::StreamScan {
            source: source.into(),
            schema,
            projection: None,
            filters: vec![],
            window: None,
        }
    }

    pub fn table(table: impl Into<String>) -> Self {
        LogicalPlan::TableScan {
            table: table.into(),
        }
    }

    /// Direct children, left to right.
    pub fn inputs(&self) -> Vec<&LogicalPlan> {
        match self {
            LogicalPlan::TableScan { .. }
            | LogicalPlan::StreamScan { .. }
            | LogicalPlan::LocalRelation { .. } => vec![],
            LogicalPlan::SubqueryAlias { input, .. }
            | LogicalPlan::Projection { input, .. }
            | LogicalPlan::Filter { input, .. }
            | LogicalPlan::Aggregate { input, .. }
            | LogicalPlan::Limit { input, .. }
            | LogicalPlan::Window { input, .. } => vec![input.as_ref()],
            LogicalPlan::Join { left, right, .. } => vec![left.as_ref(), right.as_ref()],
        }
    }

    /// Windows attached to stream leaves or still pending as `Window` nodes.
    pub fn windows(&self) -> Vec<WindowSpec> {
        let mut out = vec![];
        collect_windows(self, &mut out);
        out
    }
}

fn collect_windows(plan: &LogicalPlan, out: &mut Vec<WindowSpec>) {
    match plan {
        LogicalPlan::StreamScan {
            window: Some(w), ..
        }
        | LogicalPlan::Window { spec: w, .. } => {
            if !out.contains(w) {
                out.push(*w);
            }
        }
        _ => {}
    }
    for child in plan.inputs() {
        collect_windows(child, out);
    }
}
