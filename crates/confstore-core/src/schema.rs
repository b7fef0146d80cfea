//! JSON Schema validation and schema comparison.

use jsonschema::JSONSchema;
use serde_json::Value;

use crate::{Error, Result};

/// Check `input` against `schema`.
///
/// Returns `Ok(false)` when `input` is not valid JSON or violates the schema.
/// A schema that is not valid JSON, or not a valid JSON Schema document, is
/// reported as [`Error::Validation`].
pub fn validate(schema: &str, input: &str) -> Result<bool> {
  let schema: Value = serde_json::from_str(schema)
    .map_err(|e| Error::Validation(format!("schema is not valid JSON: {e}")))?;

  let compiled = JSONSchema::compile(&schema)
    .map_err(|e| Error::Validation(format!("malformed schema: {e}")))?;

  let Ok(document) = serde_json::from_str::<Value>(input) else {
    tracing::debug!("input is not valid JSON");
    return Ok(false);
  };

  let result = compiled.validate(&document);
  if let Err(errors) = result {
    for e in errors {
      tracing::debug!(path = %e.instance_path, "input does not match schema: {e}");
    }
    return Ok(false);
  }
  Ok(true)
}

/// Structural equality of two schema documents, ignoring key order and
/// whitespace. Numbers compare by value, so `1` equals `1.0`. Malformed input
/// on either side compares unequal.
pub fn schemas_equal(a: &str, b: &str) -> bool {
  match (
    serde_json::from_str::<Value>(a),
    serde_json::from_str::<Value>(b),
  ) {
    (Ok(a), Ok(b)) => same_value(&a, &b),
    _ => false,
  }
}

fn same_value(a: &Value, b: &Value) -> bool {
  match (a, b) {
    (Value::Number(x), Value::Number(y)) => x == y || x.as_f64() == y.as_f64(),
    (Value::Array(x), Value::Array(y)) => {
      x.len() == y.len() && x.iter().zip(y).all(|(x, y)| same_value(x, y))
    }
    (Value::Object(x), Value::Object(y)) => {
      x.len() == y.len()
        && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| same_value(v, w)))
    }
    _ => a == b,
  }
}
