//! Shared configuration, error types, IDs, and row values for STQ crates.
//!
//! Architecture role:
//! - defines session configuration passed across layers
//! - provides common [`StqError`] / [`Result`] contracts
//! - hosts the [`Row`]/[`Value`] model produced by JSON conversion and command output
//!
//! Key modules:
//! - [`config`]
//! - [`error`]
//! - [`ids`]
//! - [`value`]

pub mod config;
pub mod error;
pub mod ids;
pub mod value;

pub use config::{validate_sampling_ratio, StreamConfig};
pub use error::{ParseError, Position, Result, StqError};
pub use ids::*;
pub use value::{Row, Value};
