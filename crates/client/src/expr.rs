//! Shorthand constructors for view composition.

use stq_planner::{AggExpr, BinaryOp, Expr, LiteralValue};

/// Unresolved column reference (`name` or `relation.name`).
pub fn col(name: &str) -> Expr {
    Expr::Column(name.to_string())
}

pub fn lit_i64(v: i64) -> Expr {
    Expr::Literal(LiteralValue::Int64(v))
}

pub fn lit_f64(v: f64) -> Expr {
    Expr::Literal(LiteralValue::Float64(v))
}

pub fn lit_str(v: &str) -> Expr {
    Expr::Literal(LiteralValue::Utf8(v.to_string()))
}

pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    Expr::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

pub fn eq(left: Expr, right: Expr) -> Expr {
    binary(left, BinaryOp::Eq, right)
}

pub fn gt(left: Expr, right: Expr) -> Expr {
    binary(left, BinaryOp::Gt, right)
}

pub fn lt(left: Expr, right: Expr) -> Expr {
    binary(left, BinaryOp::Lt, right)
}

pub fn and(left: Expr, right: Expr) -> Expr {
    Expr::And(Box::new(left), Box::new(right))
}

pub fn is_not_null(e: Expr) -> Expr {
    Expr::IsNotNull(Box::new(e))
}

/// `COUNT(*)`, counted as a non-null literal per row.
pub fn count_star() -> AggExpr {
    AggExpr::Count(lit_i64(1))
}

pub fn sum(e: Expr) -> AggExpr {
    AggExpr::Sum(e)
}

pub fn avg(e: Expr) -> AggExpr {
    AggExpr::Avg(e)
}
