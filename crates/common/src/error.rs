use std::fmt;

use thiserror::Error;

/// Canonical STQ error taxonomy used across crates.
///
/// Classification guidance:
/// - [`StqError::Parse`]: query text rejected by every SQL dialect
/// - [`StqError::Analysis`]: name/type resolution failures discovered before execution
/// - [`StqError::NotFound`]: catalog lookup of a name with no entry
/// - [`StqError::InvalidConfig`]: config/option contract violations
/// - [`StqError::Unsupported`]: syntactically valid but intentionally unimplemented behavior
/// - [`StqError::Execution`]: failures reported by an external command engine
/// - [`StqError::Io`]: raw filesystem IO failures from std APIs
///
/// Malformed input records are never reported through this type; row conversion turns
/// them into corrupt-record rows instead.
#[derive(Debug, Error)]
pub enum StqError {
    /// Query text is not valid in any dialect.
    #[error("parse error: {0}")]
    Parse(ParseError),

    /// Query planning/analyzer failures.
    ///
    /// Examples:
    /// - unknown table/column (`symbol` names it)
    /// - type mismatch in expressions or join keys
    /// - stream window not aligned to the batch interval
    #[error("analysis error: {message}")]
    Analysis {
        /// Unresolved table/column name, when the failure is about one.
        symbol: Option<String>,
        /// Human-readable description.
        message: String,
    },

    /// Catalog lookup of an unregistered name.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid or inconsistent configuration.
    ///
    /// Examples:
    /// - sampling ratio outside `(0, 1]`
    /// - zero batch interval
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failure reported by the command engine while running a command.
    #[error("execution error: {0}")]
    Execution(String),

    /// Transparent std IO failures.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Valid request for a feature/shape not implemented in current version.
    ///
    /// Examples:
    /// - SQL constructs outside the supported SELECT subset
    /// - nested stream windows over one source
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl StqError {
    /// Analysis failure that is not about a single symbol.
    pub fn analysis(message: impl Into<String>) -> Self {
        Self::Analysis {
            symbol: None,
            message: message.into(),
        }
    }

    /// Analysis failure for an unresolved table/column reference.
    pub fn unresolved(kind: &str, symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        Self::Analysis {
            message: format!("unknown {kind}: {symbol}"),
            symbol: Some(symbol),
        }
    }

    /// Attach the streaming dialect's complaint about the same query text.
    ///
    /// `Io` errors never come from parsing and are returned unchanged.
    pub fn with_streaming_note(self, note: impl Into<String>) -> Self {
        let note = note.into();
        let noted = |m: String| format!("{m} (streaming dialect: {note})");
        match self {
            Self::Parse(p) => Self::Parse(p.with_streaming_note(note.clone())),
            Self::Analysis { symbol, message } => Self::Analysis {
                symbol,
                message: noted(message),
            },
            Self::NotFound(m) => Self::NotFound(noted(m)),
            Self::InvalidConfig(m) => Self::InvalidConfig(noted(m)),
            Self::Execution(m) => Self::Execution(noted(m)),
            Self::Unsupported(m) => Self::Unsupported(noted(m)),
            Self::Io(e) => Self::Io(e),
        }
    }

    /// The unresolved symbol carried by an analysis error, if any.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::Analysis { symbol, .. } => symbol.as_deref(),
            _ => None,
        }
    }
}

/// Line/column location of a syntax error (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: u64,
    pub column: u64,
}

impl Position {
    /// Extract a trailing `Line: N, Column: M` location from a parser message.
    pub fn from_message(message: &str) -> Option<Self> {
        let (_, tail) = message.rsplit_once("Line: ")?;
        let (line, tail) = tail.split_once(", Column: ")?;
        let column: String = tail.chars().take_while(|c| c.is_ascii_digit()).collect();
        Some(Self {
            line: line.trim().parse().ok()?,
            column: column.parse().ok()?,
        })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Syntax error from the authoritative parser.
///
/// `streaming_note` keeps the streaming dialect's own complaint when that dialect
/// recognized the text but failed on it before the generic dialect also failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub position: Option<Position>,
    pub streaming_note: Option<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            position: Position::from_message(&message),
            message,
            streaming_note: None,
        }
    }

    pub fn with_streaming_note(mut self, note: impl Into<String>) -> Self {
        self.streaming_note = Some(note.into());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(note) = &self.streaming_note {
            write!(f, " (streaming dialect: {note})")?;
        }
        Ok(())
    }
}

impl From<ParseError> for StqError {
    fn from(e: ParseError) -> Self {
        StqError::Parse(e)
    }
}

/// Standard STQ result alias.
pub type Result<T> = std::result::Result<T, StqError>;
