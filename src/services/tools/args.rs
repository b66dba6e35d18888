//! Validation of `tools/call` arguments against the catalogue.

use super::ToolError;
use super::catalog::{ParamDefault, ParamKind, ParamSpec, ToolSpec};
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
enum ArgValue {
    String(String),
    Integer(i64),
    Boolean(bool),
}

/// Arguments after validation and default filling
///
/// Every declared parameter with a non-null default is always present, so
/// the typed accessors only fall back when asked for an undeclared name.
#[derive(Debug, Clone, Default)]
pub struct ToolArgs {
    values: HashMap<&'static str, ArgValue>,
}

impl ToolArgs {
    pub fn parse(spec: &ToolSpec, raw: Option<Map<String, Value>>) -> Result<Self, ToolError> {
        let mut raw = raw.unwrap_or_default();
        let mut values = HashMap::new();

        for param in spec.params {
            let supplied = raw.remove(param.name).filter(|v| {
                // Explicit null on an optional filter means "not given"
                !(v.is_null() && param.default == ParamDefault::Null)
            });

            let value = match supplied {
                Some(value) => Some(coerce(spec.name, param, value)?),
                None => match param.default {
                    ParamDefault::Required => {
                        return Err(invalid(spec.name, format!("missing required argument '{}'", param.name)));
                    }
                    ParamDefault::Null => None,
                    ParamDefault::Integer(n) => Some(ArgValue::Integer(n)),
                    ParamDefault::Boolean(b) => Some(ArgValue::Boolean(b)),
                },
            };

            if let Some(value) = value {
                values.insert(param.name, value);
            }
        }

        // Extra arguments are ignored, matching how schema-generated servers behave
        Ok(Self { values })
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> i64 {
        match self.values.get(name) {
            Some(ArgValue::Integer(n)) => *n,
            _ => 0,
        }
    }

    pub fn bool(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(ArgValue::Boolean(true)))
    }
}

fn invalid(tool: &str, message: String) -> ToolError {
    ToolError::InvalidArguments {
        tool: tool.to_string(),
        message,
    }
}

fn coerce(tool: &str, param: &ParamSpec, value: Value) -> Result<ArgValue, ToolError> {
    let mismatch = |value: &Value| {
        invalid(
            tool,
            format!(
                "argument '{}' must be of type {}, got {}",
                param.name,
                param.kind.json_type(),
                json_type_name(value)
            ),
        )
    };

    match param.kind {
        ParamKind::String => match value {
            Value::String(s) => Ok(ArgValue::String(s)),
            other => Err(mismatch(&other)),
        },
        ParamKind::Integer | ParamKind::Count => {
            let number = match &value {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.is_finite()).map(|f| f as i64)),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            let number = number.ok_or_else(|| mismatch(&value))?;
            if param.kind == ParamKind::Count && number < 0 {
                return Err(invalid(
                    tool,
                    format!("argument '{}' must not be negative", param.name),
                ));
            }
            Ok(ArgValue::Integer(number))
        }
        ParamKind::Boolean => match &value {
            Value::Bool(b) => Ok(ArgValue::Boolean(*b)),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(ArgValue::Boolean(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(ArgValue::Boolean(false)),
            other => Err(mismatch(other)),
        },
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
