//! Relation catalog and record-source plumbing.
//!
//! - [`Catalog`]: session-scoped name → logical plan map, the analyzer's relation source
//! - [`json`]: schema inference and corrupt-tolerant row conversion for JSON text records
//! - [`StreamRecord`]: explicit schema description for typed record shapes

pub mod catalog;
pub mod json;
pub mod record;

pub use catalog::Catalog;
pub use json::{
    convert_record, infer_schema, read_json_lines, with_corrupt_field, InferOptions,
    JsonRowConverter,
};
pub use record::{to_rows, StreamRecord};
