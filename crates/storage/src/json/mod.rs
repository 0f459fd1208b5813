//! JSON text records: schema inference over samples and per-record row conversion.

pub mod convert;
pub mod infer;

pub use convert::{convert_record, read_json_lines, with_corrupt_field, JsonRowConverter};
pub use infer::{infer_schema, InferOptions};
