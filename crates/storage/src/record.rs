use arrow_schema::Schema;
use stq_common::Row;

/// A statically typed record shape usable as a stream source.
///
/// `to_row` must return values in the order of the fields of `schema()`.
///
/// ```
/// use arrow_schema::{DataType, Field, Schema};
/// use stq_common::{Row, Value};
/// use stq_storage::StreamRecord;
///
/// struct Click {
///     user: String,
///     ms: i64,
/// }
///
/// impl StreamRecord for Click {
///     fn schema() -> Schema {
///         Schema::new(vec![
///             Field::new("user", DataType::Utf8, false),
///             Field::new("ms", DataType::Int64, false),
///         ])
///     }
///
///     fn to_row(&self) -> Row {
///         Row::new(vec![Value::Utf8(self.user.clone()), Value::Int64(self.ms)])
///     }
/// }
/// ```
pub trait StreamRecord {
    fn schema() -> Schema;
    fn to_row(&self) -> Row;
}

/// Rows of a batch of typed records.
pub fn to_rows<R: StreamRecord>(records: &[R]) -> Vec<Row> {
    records.iter().map(StreamRecord::to_row).collect()
}
