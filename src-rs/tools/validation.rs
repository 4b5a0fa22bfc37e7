use serde_json::{Map, Number, Value};

use super::schema::{FieldSpec, FieldType, InputSchema};
use crate::error::{FieldViolation, ValidationError};

/// Checks raw model-supplied arguments against a tool's schema.
///
/// Returns a fresh argument map holding only declared fields, with integer
/// coercion and defaults applied. `null` counts as omitted; undeclared keys
/// are dropped.
pub fn validate(tool: &str, schema: &InputSchema, raw: &Value) -> Result<Value, ValidationError> {
    let empty = Map::new();
    let input = match raw {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => {
            return Err(ValidationError {
                tool: tool.to_string(),
                violations: vec![FieldViolation {
                    field: "arguments".to_string(),
                    reason: "expected an object".to_string(),
                }],
            })
        }
    };

    let mut output = Map::new();
    let mut violations = Vec::new();

    for field in &schema.fields {
        match input.get(&field.name) {
            None | Some(Value::Null) => {
                if let Some(default) = &field.default {
                    output.insert(field.name.clone(), default.clone());
                } else if field.required {
                    violations.push(violation(field, "missing required field".to_string()));
                }
            }
            Some(value) => match check_field(field, value) {
                Ok(checked) => {
                    output.insert(field.name.clone(), checked);
                }
                Err(reason) => violations.push(violation(field, reason)),
            },
        }
    }

    if violations.is_empty() {
        Ok(Value::Object(output))
    } else {
        Err(ValidationError {
            tool: tool.to_string(),
            violations,
        })
    }
}

fn violation(field: &FieldSpec, reason: String) -> FieldViolation {
    FieldViolation {
        field: field.name.clone(),
        reason,
    }
}

fn check_field(field: &FieldSpec, value: &Value) -> Result<Value, String> {
    let checked = match field.kind {
        FieldType::String => match value {
            Value::String(_) => value.clone(),
            other => return Err(type_mismatch(field, other)),
        },
        FieldType::Boolean => match value {
            Value::Bool(_) => value.clone(),
            other => return Err(type_mismatch(field, other)),
        },
        FieldType::Number => match value {
            Value::Number(_) => value.clone(),
            other => return Err(type_mismatch(field, other)),
        },
        FieldType::Integer => Value::Number(coerce_integer(field, value)?),
    };

    if let (Some(allowed), Value::String(s)) = (&field.allowed, &checked) {
        if !allowed.iter().any(|a| a == s) {
            return Err(format!(
                "invalid value '{}', must be one of: {}",
                s,
                allowed.join(", ")
            ));
        }
    }

    if let Some(n) = checked.as_i64() {
        let below = field.minimum.map_or(false, |min| n < min);
        let above = field.maximum.map_or(false, |max| n > max);
        if below || above {
            return Err(match (field.minimum, field.maximum) {
                (Some(min), Some(max)) => format!("must be between {} and {}", min, max),
                (Some(min), None) => format!("must be at least {}", min),
                (None, Some(max)) => format!("must be at most {}", max),
                (None, None) => unreachable!(),
            });
        }
    }

    Ok(checked)
}

/// Whole floats become the integer; fractional floats truncate toward zero.
fn coerce_integer(field: &FieldSpec, value: &Value) -> Result<Number, String> {
    let number = match value {
        Value::Number(n) => n,
        other => return Err(type_mismatch(field, other)),
    };
    if let Some(i) = number.as_i64() {
        return Ok(Number::from(i));
    }
    if let Some(u) = number.as_u64() {
        return i64::try_from(u)
            .map(Number::from)
            .map_err(|_| "integer out of range".to_string());
    }
    match number.as_f64() {
        Some(f) if f.is_finite() && f.trunc() >= i64::MIN as f64 && f.trunc() <= i64::MAX as f64 => {
            Ok(Number::from(f.trunc() as i64))
        }
        _ => Err("integer out of range".to_string()),
    }
}

fn type_mismatch(field: &FieldSpec, value: &Value) -> String {
    let got = match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    format!("expected {}, got {}", field.kind.as_str(), got)
}
