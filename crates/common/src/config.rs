use serde::{Deserialize, Serialize};

use crate::error::{Result, StqError};

/// Compiler/session configuration shared by planner, storage and client layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Micro-batch interval; stream windows must be multiples of it.
    pub batch_interval_ms: u64,
    /// Fraction of records examined by JSON schema inference, in `(0, 1]`.
    pub schema_sampling_ratio: f64,
    /// Seed for sampled schema inference.
    pub sampling_seed: u64,
    /// Column that receives the raw text of records that fail conversion.
    pub corrupt_record_column: String,
    /// Enables filter pushdown in the generic optimizer.
    pub predicate_pushdown: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            batch_interval_ms: 1_000,
            schema_sampling_ratio: 1.0,
            sampling_seed: 1,
            corrupt_record_column: "_corrupt_record".to_string(),
            predicate_pushdown: true,
        }
    }
}

impl StreamConfig {
    /// Check option contracts before a session is built from this config.
    pub fn validate(&self) -> Result<()> {
        if self.batch_interval_ms == 0 {
            return Err(StqError::InvalidConfig(
                "batch_interval_ms must be > 0".to_string(),
            ));
        }
        validate_sampling_ratio(self.schema_sampling_ratio)?;
        if self.corrupt_record_column.is_empty() {
            return Err(StqError::InvalidConfig(
                "corrupt_record_column must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sampling ratio must lie in `(0, 1]`.
pub fn validate_sampling_ratio(ratio: f64) -> Result<()> {
    if ratio > 0.0 && ratio <= 1.0 {
        Ok(())
    } else {
        Err(StqError::InvalidConfig(format!(
            "sampling ratio must be in (0, 1], got {ratio}"
        )))
    }
}
