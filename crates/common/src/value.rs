use serde::{Deserialize, Serialize};
use std::fmt;

/// One field value of a [`Row`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Utf8(String),
    /// Elements of an array field.
    List(Vec<Value>),
    /// Positional values of a struct field.
    Struct(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Utf8(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v:?}"),
            Value::Utf8(s) => f.write_str(s),
            Value::List(items) | Value::Struct(items) => write_bracketed(f, items),
        }
    }
}

fn write_bracketed(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    f.write_str("[")?;
    for (i, v) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{v}")?;
    }
    f.write_str("]")
}

/// Ordered values positionally aligned to a schema's fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row(Vec<Value>);

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Row of `n` nulls.
    pub fn nulls(n: usize) -> Self {
        Self(vec![Value::Null; n])
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.0.get(idx)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

/// Stable rendering used for command output: `[v1,v2,...]` in schema order.
impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_bracketed(f, &self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_renders_in_field_order() {
        let row = Row::new(vec![
            Value::Utf8("spark".to_string()),
            Value::Int64(3),
            Value::Null,
            Value::Float64(2.0),
            Value::List(vec![Value::Int32(1), Value::Int32(2)]),
        ]);
        assert_eq!(row.to_string(), "[spark,3,null,2.0,[1,2]]");
    }

    #[test]
    fn nulls_row_has_requested_width() {
        let row = Row::nulls(3);
        assert_eq!(row.len(), 3);
        assert!(row.values().iter().all(Value::is_null));
    }
}
