//! JSON bridge
//!
//! Lossless in both directions for JSON's type system; the integer/float
//! distinction survives a round trip. Objects carrying XML-flavored state
//! serialize attributes under `@`-prefixed keys so nothing silently drops.

use serde_json::Value;

use crate::error::{Diagnostic, ErrorKind, Position, Span};
use crate::udm::{coerce, ObjectBuilder, Udm};

#[derive(Debug, Clone)]
pub struct JsonOptions {
    pub pretty: bool,
    pub indent: usize,
}

impl Default for JsonOptions {
    fn default() -> Self {
        JsonOptions {
            pretty: false,
            indent: 2,
        }
    }
}

pub fn parse(bytes: &[u8], _options: &JsonOptions) -> Result<Udm, Diagnostic> {
    let text = std::str::from_utf8(bytes).map_err(|_| {
        Diagnostic::new(ErrorKind::FormatParse, "JSON input is not valid UTF-8")
    })?;
    if text.trim().is_empty() {
        return Err(Diagnostic::new(
            ErrorKind::FormatParse,
            "empty input is not valid JSON",
        ));
    }
    let value: Value = serde_json::from_str(text).map_err(|err| {
        let position = Position {
            line: err.line().saturating_sub(1),
            column: err.column().saturating_sub(1),
            offset: 0,
        };
        Diagnostic::new(ErrorKind::FormatParse, format!("invalid JSON: {}", err))
            .with_span(Span::point(position))
    })?;
    Ok(value_to_udm(&value))
}

pub fn serialize(value: &Udm, options: &JsonOptions) -> Result<Vec<u8>, Diagnostic> {
    let json = udm_to_value(value)?;
    let rendered = if options.pretty {
        let indent = b" ".repeat(options.indent.clamp(0, 16));
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent);
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        serde::Serialize::serialize(&json, &mut serializer).map_err(|err| {
            Diagnostic::new(ErrorKind::FormatSerialize, format!("JSON serialization failed: {}", err))
        })?;
        out
    } else {
        serde_json::to_vec(&json).map_err(|err| {
            Diagnostic::new(ErrorKind::FormatSerialize, format!("JSON serialization failed: {}", err))
        })?
    };
    Ok(rendered)
}

/// Lift a serde value into UDM, preserving the integer/float distinction
pub fn value_to_udm(value: &Value) -> Udm {
    match value {
        Value::Null => Udm::Null,
        Value::Bool(b) => Udm::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Udm::Int(i)
            } else {
                Udm::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => Udm::string(s.clone()),
        Value::Array(items) => Udm::Array(items.iter().map(value_to_udm).collect()),
        Value::Object(map) => {
            let mut builder = ObjectBuilder::new();
            for (key, item) in map {
                // `@`-prefixed keys round-trip into the attribute table
                if let Some(attr) = key.strip_prefix('@') {
                    if let Value::String(s) = item {
                        builder.attribute(attr, s.clone());
                        continue;
                    }
                }
                builder.property(key.clone(), value_to_udm(item));
            }
            builder.build()
        }
    }
}

/// Lower UDM into a serde value. Fails (with a path) on values JSON cannot
/// represent, such as lambdas and non-finite numbers.
pub fn udm_to_value(value: &Udm) -> Result<Value, Diagnostic> {
    let mut path = Vec::new();
    to_value(value, &mut path)
}

fn to_value(value: &Udm, path: &mut Vec<String>) -> Result<Value, Diagnostic> {
    // Text-only elements serialize as their text
    let value = coerce::unwrap_text(value);
    match value {
        Udm::Null => Ok(Value::Null),
        Udm::Bool(b) => Ok(Value::Bool(*b)),
        Udm::Int(n) => Ok(Value::Number((*n).into())),
        Udm::Float(n) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .ok_or_else(|| serialize_error("non-finite number", path)),
        Udm::Str(s) => Ok(Value::String(s.clone())),
        Udm::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                path.push(format!("[{}]", i));
                out.push(to_value(item, path)?);
                path.pop();
            }
            Ok(Value::Array(out))
        }
        Udm::Object(obj) => {
            let mut map = serde_json::Map::new();
            for (key, attr) in &obj.attributes {
                map.insert(format!("@{}", key), Value::String(attr.clone()));
            }
            for (key, item) in &obj.properties {
                path.push(key.clone());
                map.insert(key.clone(), to_value(item, path)?);
                path.pop();
            }
            Ok(Value::Object(map))
        }
        Udm::DateTime(_) | Udm::Date(_) | Udm::LocalDateTime(_) | Udm::Time(_) => {
            Ok(Value::String(coerce::to_display_string(value)))
        }
        Udm::Binary { bytes, .. } => {
            use base64::Engine;
            Ok(Value::String(
                base64::engine::general_purpose::STANDARD.encode(bytes),
            ))
        }
        Udm::Lambda(_) => Err(serialize_error("a lambda", path)),
    }
}

fn serialize_error(what: &str, path: &[String]) -> Diagnostic {
    let location = if path.is_empty() {
        "the root value".to_string()
    } else {
        format!("$.{}", path.join("."))
    };
    Diagnostic::new(
        ErrorKind::FormatSerialize,
        format!("JSON cannot represent {} at {}", what, location),
    )
}
