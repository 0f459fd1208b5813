use std::sync::Arc;

use arrow_schema::{DataType, Field, Fields, Schema};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value as JsonValue};
use stq_common::{validate_sampling_ratio, Result, StreamConfig};
use tracing::debug;

/// Options of [`infer_schema`].
#[derive(Debug, Clone, PartialEq)]
pub struct InferOptions {
    /// Fraction of records examined, in `(0, 1]`.
    pub sampling_ratio: f64,
    /// Seed of the Bernoulli sampler; a fixed seed makes sampling reproducible.
    pub seed: u64,
    /// Appended as a nullable string field when any examined record is malformed.
    pub corrupt_record_column: Option<String>,
}

impl Default for InferOptions {
    fn default() -> Self {
        Self::from(&StreamConfig::default())
    }
}

impl From<&StreamConfig> for InferOptions {
    fn from(cfg: &StreamConfig) -> Self {
        Self {
            sampling_ratio: cfg.schema_sampling_ratio,
            seed: cfg.sampling_seed,
            corrupt_record_column: Some(cfg.corrupt_record_column.clone()),
        }
    }
}

/// Infer one schema covering the sampled JSON object records.
///
/// Field order follows first appearance. A field missing from, or null in, any examined
/// record is nullable. Fields never seen with a non-null value become nullable strings.
pub fn infer_schema<I, S>(records: I, opts: &InferOptions) -> Result<Schema>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    validate_sampling_ratio(opts.sampling_ratio)?;
    let mut rng = StdRng::seed_from_u64(opts.seed);

    let mut acc = Accumulator::default();
    let mut first: Option<S> = None;
    let mut total = 0usize;
    for record in records {
        total += 1;
        let selected = opts.sampling_ratio >= 1.0 || rng.gen_bool(opts.sampling_ratio);
        if selected {
            acc.observe(record.as_ref());
        } else if total == 1 {
            first = Some(record);
        }
    }
    if acc.examined == 0 {
        if let Some(record) = first {
            acc.observe(record.as_ref());
        }
    }
    debug!(
        total,
        examined = acc.examined,
        corrupt = acc.corrupt,
        "inferred JSON schema"
    );

    let mut fields: Vec<Field> = acc
        .fields
        .unwrap_or_default()
        .into_iter()
        .map(|(name, f)| f.into_field(name))
        .collect();
    if let Some(corrupt) = &opts.corrupt_record_column {
        if acc.corrupt > 0 && !fields.iter().any(|f| f.name() == corrupt) {
            fields.push(Field::new(corrupt, DataType::Utf8, true));
        }
    }
    Ok(Schema::new(fields))
}

#[derive(Default)]
struct Accumulator {
    /// `None` until the first well-formed object is seen.
    fields: Option<Vec<(String, InferredField)>>,
    examined: usize,
    corrupt: usize,
}

impl Accumulator {
    fn observe(&mut self, text: &str) {
        self.examined += 1;
        let obj = match serde_json::from_str::<JsonValue>(text) {
            Ok(JsonValue::Object(obj)) => obj,
            _ => {
                self.corrupt += 1;
                return;
            }
        };
        let seen = object_fields(&obj);
        self.fields = Some(match self.fields.take() {
            None => seen,
            Some(acc) => merge_fields(acc, seen),
        });
    }
}

/// Inferred type lattice: `Int < Long < Double < Str`; `Null` is the bottom.
#[derive(Debug, Clone, PartialEq)]
enum Inferred {
    Null,
    Bool,
    Int,
    Long,
    Double,
    Str,
    Struct(Vec<(String, InferredField)>),
    List(Box<Inferred>),
}

#[derive(Debug, Clone, PartialEq)]
struct InferredField {
    ty: Inferred,
    nullable: bool,
}

impl InferredField {
    fn into_field(self, name: String) -> Field {
        let nullable = self.nullable || self.ty == Inferred::Null;
        Field::new(name, self.ty.into_data_type(), nullable)
    }
}

impl Inferred {
    fn of(v: &JsonValue) -> Self {
        match v {
            JsonValue::Null => Inferred::Null,
            JsonValue::Bool(_) => Inferred::Bool,
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) if i32::try_from(i).is_ok() => Inferred::Int,
                Some(_) => Inferred::Long,
                None => Inferred::Double,
            },
            JsonValue::String(_) => Inferred::Str,
            JsonValue::Array(items) => Inferred::List(Box::new(
                items
                    .iter()
                    .map(Inferred::of)
                    .fold(Inferred::Null, merge_types),
            )),
            JsonValue::Object(obj) => Inferred::Struct(object_fields(obj)),
        }
    }

    fn numeric_rank(&self) -> Option<u8> {
        match self {
            Inferred::Int => Some(1),
            Inferred::Long => Some(2),
            Inferred::Double => Some(3),
            _ => None,
        }
    }

    /// Null placeholders that survive merging become strings.
    fn into_data_type(self) -> DataType {
        match self {
            Inferred::Null | Inferred::Str => DataType::Utf8,
            Inferred::Bool => DataType::Boolean,
            Inferred::Int => DataType::Int32,
            Inferred::Long => DataType::Int64,
            Inferred::Double => DataType::Float64,
            Inferred::Struct(fields) => DataType::Struct(Fields::from(
                fields
                    .into_iter()
                    .map(|(name, f)| f.into_field(name))
                    .collect::<Vec<_>>(),
            )),
            Inferred::List(item) => {
                DataType::List(Arc::new(Field::new("item", item.into_data_type(), true)))
            }
        }
    }
}

fn object_fields(obj: &Map<String, JsonValue>) -> Vec<(String, InferredField)> {
    obj.iter()
        .map(|(k, v)| {
            (
                k.clone(),
                InferredField {
                    ty: Inferred::of(v),
                    nullable: v.is_null(),
                },
            )
        })
        .collect()
}

fn merge_types(a: Inferred, b: Inferred) -> Inferred {
    match (a, b) {
        (Inferred::Null, x) | (x, Inferred::Null) => x,
        (a, b) if a == b => a,
        (Inferred::Struct(a), Inferred::Struct(b)) => Inferred::Struct(merge_fields(a, b)),
        (Inferred::List(a), Inferred::List(b)) => Inferred::List(Box::new(merge_types(*a, *b))),
        (a, b) => match (a.numeric_rank(), b.numeric_rank()) {
            (Some(ra), Some(rb)) => {
                if ra >= rb {
                    a
                } else {
                    b
                }
            }
            _ => Inferred::Str,
        },
    }
}

/// Merge by name keeping first-seen order; a side missing a field makes it nullable.
fn merge_fields(
    acc: Vec<(String, InferredField)>,
    mut seen: Vec<(String, InferredField)>,
) -> Vec<(String, InferredField)> {
    let mut out = Vec::with_capacity(acc.len().max(seen.len()));
    for (name, f) in acc {
        match seen.iter().position(|(n, _)| *n == name) {
            Some(pos) => {
                let (_, other) = seen.remove(pos);
                out.push((
                    name,
                    InferredField {
                        ty: merge_types(f.ty, other.ty),
                        nullable: f.nullable || other.nullable,
                    },
                ));
            }
            None => out.push((
                name,
                InferredField {
                    ty: f.ty,
                    nullable: true,
                },
            )),
        }
    }
    out.extend(seen.into_iter().map(|(name, f)| {
        (
            name,
            InferredField {
                ty: f.ty,
                nullable: true,
            },
        )
    }));
    out
}
