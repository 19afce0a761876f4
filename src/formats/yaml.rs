//! YAML bridge
//!
//! Built on serde_yaml. A multi-document stream lifts to an Array with one
//! element per document; a single document lifts to its value directly.

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::{Diagnostic, ErrorKind, Position, Span};
use crate::udm::{coerce, ObjectBuilder, Udm};

#[derive(Debug, Clone, Default)]
pub struct YamlOptions {
    /// Serialize an Array as a multi-document stream instead of a sequence
    pub multi_document: bool,
}

pub fn parse(bytes: &[u8], _options: &YamlOptions) -> Result<Udm, Diagnostic> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| Diagnostic::new(ErrorKind::FormatParse, "YAML input is not valid UTF-8"))?;

    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document).map_err(|err| {
            let mut diag =
                Diagnostic::new(ErrorKind::FormatParse, format!("invalid YAML: {}", err));
            if let Some(location) = err.location() {
                diag = diag.with_span(Span::point(Position {
                    line: location.line().saturating_sub(1),
                    column: location.column().saturating_sub(1),
                    offset: location.index(),
                }));
            }
            diag
        })?;
        documents.push(value_to_udm(&value));
    }

    match documents.len() {
        0 => Ok(Udm::Null),
        1 => Ok(documents.pop().expect("length checked")),
        _ => Ok(Udm::Array(documents)),
    }
}

pub fn serialize(value: &Udm, options: &YamlOptions) -> Result<Vec<u8>, Diagnostic> {
    if options.multi_document {
        if let Udm::Array(documents) = coerce::unwrap_text(value) {
            let mut out = String::new();
            for document in documents {
                out.push_str("---\n");
                out.push_str(&render_document(document)?);
            }
            return Ok(out.into_bytes());
        }
    }
    Ok(render_document(value)?.into_bytes())
}

fn render_document(value: &Udm) -> Result<String, Diagnostic> {
    let yaml = udm_to_value(value)?;
    serde_yaml::to_string(&yaml).map_err(|err| {
        Diagnostic::new(
            ErrorKind::FormatSerialize,
            format!("YAML serialization failed: {}", err),
        )
    })
}

fn value_to_udm(value: &Value) -> Udm {
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
        Value::Sequence(items) => Udm::Array(items.iter().map(value_to_udm).collect()),
        Value::Mapping(map) => {
            let mut builder = ObjectBuilder::new();
            for (key, item) in map {
                let key = match key {
                    Value::String(s) => s.clone(),
                    other => coerce::to_display_string(&value_to_udm(other)),
                };
                builder.property(key, value_to_udm(item));
            }
            builder.build()
        }
        Value::Tagged(tagged) => value_to_udm(&tagged.value),
    }
}

fn udm_to_value(value: &Udm) -> Result<Value, Diagnostic> {
    let value = coerce::unwrap_text(value);
    match value {
        Udm::Null => Ok(Value::Null),
        Udm::Bool(b) => Ok(Value::Bool(*b)),
        Udm::Int(n) => Ok(Value::Number((*n).into())),
        Udm::Float(n) => Ok(Value::Number((*n).into())),
        Udm::Str(s) => Ok(Value::String(s.clone())),
        Udm::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(udm_to_value(item)?);
            }
            Ok(Value::Sequence(out))
        }
        Udm::Object(obj) => {
            let mut map = serde_yaml::Mapping::new();
            for (key, attr) in &obj.attributes {
                map.insert(
                    Value::String(format!("@{}", key)),
                    Value::String(attr.clone()),
                );
            }
            for (key, item) in &obj.properties {
                map.insert(Value::String(key.clone()), udm_to_value(item)?);
            }
            Ok(Value::Mapping(map))
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
        Udm::Lambda(_) => Err(Diagnostic::new(
            ErrorKind::FormatSerialize,
            "YAML cannot represent a lambda",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> YamlOptions {
        YamlOptions::default()
    }

    #[test]
    fn test_scalars_and_types() {
        let parsed = parse(
            b"count: 3\nprice: 4.5\nactive: true\nnote: null\nname: widget\n",
            &options(),
        )
        .unwrap();
        let obj = parsed.as_object().unwrap();
        assert_eq!(obj.properties.get("count"), Some(&Udm::Int(3)));
        assert_eq!(obj.properties.get("price"), Some(&Udm::Float(4.5)));
        assert_eq!(obj.properties.get("active"), Some(&Udm::Bool(true)));
        assert_eq!(obj.properties.get("note"), Some(&Udm::Null));
        assert_eq!(obj.properties.get("name"), Some(&Udm::string("widget")));
    }

    #[test]
    fn test_multi_document_stream_becomes_array() {
        let parsed = parse(b"---\na: 1\n---\na: 2\n", &options()).unwrap();
        match parsed {
            Udm::Array(docs) => assert_eq!(docs.len(), 2),
            other => panic!("expected array of documents, got {:?}", other),
        }
    }

    #[test]
    fn test_block_scalar_multiline_string() {
        let parsed = parse(b"text: |\n  line one\n  line two\n", &options()).unwrap();
        let obj = parsed.as_object().unwrap();
        assert_eq!(
            obj.properties.get("text"),
            Some(&Udm::string("line one\nline two\n"))
        );
    }

    #[test]
    fn test_round_trip() {
        let source = b"items:\n- id: 1\n  tags:\n  - a\n  - b\n- id: 2\n";
        let parsed = parse(source, &options()).unwrap();
        let rendered = serialize(&parsed, &options()).unwrap();
        let reparsed = parse(&rendered, &options()).unwrap();
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn test_multi_document_serialize() {
        let docs = Udm::Array(vec![Udm::Int(1), Udm::Int(2)]);
        let opts = YamlOptions {
            multi_document: true,
        };
        let rendered = String::from_utf8(serialize(&docs, &opts).unwrap()).unwrap();
        assert_eq!(rendered.matches("---").count(), 2);
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let err = parse(b"a: [unclosed\n", &options()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FormatParse);
    }
}
