use std::fs;
use std::path::Path;
use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema, SchemaRef};
use serde_json::Value as JsonValue;
use stq_common::{Result, Row, Value};
use tracing::{debug, warn};

/// Convert one raw JSON text record into a row laid out by `schema`.
///
/// Never fails: text that does not parse as an object, or that violates the schema,
/// yields the corrupt row (every field null except `corrupt_field`, which holds the raw
/// text). Extra JSON keys are ignored.
pub fn convert_record(text: &str, schema: &Schema, corrupt_field: &str) -> Row {
    convert_checked(text, schema, corrupt_field).0
}

/// Conversion plus a flag telling whether the record was corrupt.
fn convert_checked(text: &str, schema: &Schema, corrupt_field: &str) -> (Row, bool) {
    match try_convert(text, schema, corrupt_field) {
        Some(row) => (row, false),
        None => (corrupt_row(text, schema, corrupt_field), true),
    }
}

fn try_convert(text: &str, schema: &Schema, corrupt_field: &str) -> Option<Row> {
    let obj = match serde_json::from_str::<JsonValue>(text).ok()? {
        JsonValue::Object(obj) => obj,
        _ => return None,
    };
    schema
        .fields()
        .iter()
        .map(|f| {
            if f.name() == corrupt_field {
                Some(Value::Null)
            } else {
                convert_field(obj.get(f.name()), f)
            }
        })
        .collect::<Option<Vec<_>>>()
        .map(Row::new)
}

fn corrupt_row(text: &str, schema: &Schema, corrupt_field: &str) -> Row {
    let mut values = Row::nulls(schema.fields().len()).into_values();
    match schema.index_of(corrupt_field) {
        Ok(idx) => values[idx] = Value::Utf8(text.to_string()),
        Err(_) => warn!(
            corrupt_field,
            "malformed record dropped to all-null row; schema has no corrupt-record field"
        ),
    }
    Row::new(values)
}

fn convert_field(v: Option<&JsonValue>, field: &Field) -> Option<Value> {
    match v {
        None | Some(JsonValue::Null) => field.is_nullable().then_some(Value::Null),
        Some(v) => coerce(v, field.data_type()),
    }
}

fn coerce(v: &JsonValue, dt: &DataType) -> Option<Value> {
    match dt {
        DataType::Null => Some(Value::Null),
        DataType::Utf8 | DataType::LargeUtf8 => Some(Value::Utf8(match v {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        })),
        DataType::Int32 => v
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .map(Value::Int32),
        DataType::Int64 => v.as_i64().map(Value::Int64),
        DataType::Float64 => v.as_f64().map(Value::Float64),
        DataType::Boolean => v.as_bool().map(Value::Boolean),
        DataType::Struct(fields) => {
            let obj = v.as_object()?;
            fields
                .iter()
                .map(|f| convert_field(obj.get(f.name()), f))
                .collect::<Option<Vec<_>>>()
                .map(Value::Struct)
        }
        DataType::List(item) => v
            .as_array()?
            .iter()
            .map(|e| convert_field(Some(e), item))
            .collect::<Option<Vec<_>>>()
            .map(Value::List),
        _ => None,
    }
}

/// `schema` with a trailing nullable string field `name`, unless already present.
pub fn with_corrupt_field(schema: &Schema, name: &str) -> Schema {
    if schema.index_of(name).is_ok() {
        return schema.clone();
    }
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| (**f).clone()).collect();
    fields.push(Field::new(name, DataType::Utf8, true));
    Schema::new(fields)
}

/// Non-blank lines of a JSON-lines file.
pub fn read_json_lines(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let text = fs::read_to_string(path.as_ref())?;
    Ok(text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect())
}

/// Converts batches of raw records against one schema.
#[derive(Debug, Clone)]
pub struct JsonRowConverter {
    schema: SchemaRef,
    corrupt_field: String,
}

impl JsonRowConverter {
    /// The converter's schema is `schema` with the corrupt-record field ensured.
    pub fn new(schema: &Schema, corrupt_field: impl Into<String>) -> Self {
        let corrupt_field = corrupt_field.into();
        Self {
            schema: Arc::new(with_corrupt_field(schema, &corrupt_field)),
            corrupt_field,
        }
    }

    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    pub fn corrupt_field(&self) -> &str {
        &self.corrupt_field
    }

    pub fn convert(&self, text: &str) -> Row {
        convert_record(text, &self.schema, &self.corrupt_field)
    }

    pub fn convert_batch<I, S>(&self, records: I) -> Vec<Row>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut corrupt = 0usize;
        let rows: Vec<Row> = records
            .into_iter()
            .map(|r| {
                let (row, bad) = convert_checked(r.as_ref(), &self.schema, &self.corrupt_field);
                corrupt += usize::from(bad);
                row
            })
            .collect();
        if corrupt > 0 {
            warn!(rows = rows.len(), corrupt, "batch contained malformed records");
        } else {
            debug!(rows = rows.len(), "converted batch");
        }
        rows
    }
}
