//! SQL text entry points: the generic relational dialect and the streaming dialect's
//! table-window clauses.

pub mod stream;

use stq_common::{ParseError, Result};
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

pub use stream::{scan_stream_windows, StreamParse, StreamWindowClause};

/// Parse SQL with the generic dialect.
pub fn parse_sql(sql: &str) -> Result<Vec<Statement>> {
    let dialect = GenericDialect {};
    Parser::parse_sql(&dialect, sql).map_err(|e| ParseError::new(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stq_common::StqError;

    #[test]
    fn generic_error_keeps_position() {
        let err = parse_sql("SELECT a FROM t u v").expect_err("trailing token");
        match err {
            StqError::Parse(p) => assert!(p.position.is_some(), "{p:?}"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn parses_single_select() {
        let stmts = parse_sql("SELECT word, COUNT(*) FROM words GROUP BY word").expect("parse");
        assert_eq!(stmts.len(), 1);
    }
}
