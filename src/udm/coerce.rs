//! Coercion boundary
//!
//! Two rules live here and nowhere else:
//!
//! - **Automatic unwrapping**: an Object whose only structured content is
//!   the reserved text property is treated as that scalar. Every
//!   scalar-demanding boundary (stringification, arithmetic, comparison)
//!   calls [`unwrap_text`] instead of re-implementing the check.
//! - **Numeric fidelity**: a float whose value equals its truncation
//!   renders in integer form. All value-to-string conversion routes through
//!   [`to_display_string`], so no serializer can reintroduce a trailing
//!   `.0` on integer-valued attributes.

use super::Udm;

/// Unwrap a text-only Object to its text value. Anything else passes
/// through untouched.
pub fn unwrap_text(value: &Udm) -> &Udm {
    if let Udm::Object(obj) = value {
        if obj.is_text_only() {
            if let Some(text) = obj.text() {
                return text;
            }
        }
    }
    value
}

/// Render a float the way the language prints numbers: integer form when
/// the value is a whole number, shortest round-trip decimal otherwise.
pub fn format_float(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// The single value-to-string coercion used by serializers, string concat,
/// and string-demanding stdlib functions. `null` renders empty.
pub fn to_display_string(value: &Udm) -> String {
    match unwrap_text(value) {
        Udm::Null => String::new(),
        Udm::Bool(b) => b.to_string(),
        Udm::Int(n) => n.to_string(),
        Udm::Float(n) => format_float(*n),
        Udm::Str(s) => s.clone(),
        Udm::Array(items) => items
            .iter()
            .map(to_display_string)
            .collect::<Vec<_>>()
            .join(","),
        Udm::Object(_) => String::from("[object]"),
        Udm::DateTime(dt) => dt.to_rfc3339(),
        Udm::Date(d) => d.format("%Y-%m-%d").to_string(),
        Udm::LocalDateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
        Udm::Time(t) => t.format("%H:%M:%S").to_string(),
        Udm::Binary { bytes, .. } => String::from_utf8_lossy(bytes).into_owned(),
        Udm::Lambda(_) => String::from("[lambda]"),
    }
}

/// Numeric reading through the unwrapping boundary. Strings holding bare
/// numeric text answer too, which is what lets `<Qty>2</Qty>` take part in
/// arithmetic.
pub fn to_number(value: &Udm) -> Option<Udm> {
    match unwrap_text(value) {
        Udm::Int(n) => Some(Udm::Int(*n)),
        Udm::Float(n) => Some(Udm::Float(*n)),
        Udm::Str(s) => parse_number(s.trim()),
        _ => None,
    }
}

/// Parse numeric text, keeping the integer/float distinction
pub fn parse_number(text: &str) -> Option<Udm> {
    if text.is_empty() {
        return None;
    }
    if !text.contains(['.', 'e', 'E']) {
        if let Ok(n) = text.parse::<i64>() {
            return Some(Udm::Int(n));
        }
    }
    text.parse::<f64>().ok().filter(|n| n.is_finite()).map(Udm::Float)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::udm::{ObjectBuilder, TEXT_PROPERTY};

    fn text_element(text: &str) -> Udm {
        let mut builder = ObjectBuilder::named("q");
        builder.property(TEXT_PROPERTY, Udm::string(text));
        builder.build()
    }

    #[test]
    fn test_unwrap_text_only_object() {
        let element = text_element("2");
        assert_eq!(unwrap_text(&element), &Udm::string("2"));
    }

    #[test]
    fn test_unwrap_leaves_structured_objects() {
        let mut builder = ObjectBuilder::new();
        builder.property(TEXT_PROPERTY, Udm::string("x"));
        builder.property("child", Udm::Int(1));
        let value = builder.build();
        assert_eq!(unwrap_text(&value), &value);
    }

    #[test]
    fn test_unwrap_allows_attributes() {
        let mut builder = ObjectBuilder::named("Qty");
        builder.attribute("unit", "kg");
        builder.property(TEXT_PROPERTY, Udm::string("2"));
        let element = builder.build();
        assert_eq!(unwrap_text(&element), &Udm::string("2"));
    }

    #[test]
    fn test_integer_valued_float_renders_without_fraction() {
        assert_eq!(to_display_string(&Udm::Float(42.0)), "42");
        assert_eq!(to_display_string(&Udm::Float(42.5)), "42.5");
        assert_eq!(to_display_string(&Udm::Int(42)), "42");
        assert_eq!(to_display_string(&Udm::Float(-3.0)), "-3");
    }

    #[test]
    fn test_null_renders_empty() {
        assert_eq!(to_display_string(&Udm::Null), "");
    }

    #[test]
    fn test_to_number_through_unwrapping() {
        let element = text_element("2");
        assert_eq!(to_number(&element), Some(Udm::Int(2)));
        assert_eq!(to_number(&Udm::string("3.5")), Some(Udm::Float(3.5)));
        assert_eq!(to_number(&Udm::string("abc")), None);
    }

    #[test]
    fn test_parse_number_keeps_distinction() {
        assert_eq!(parse_number("7"), Some(Udm::Int(7)));
        assert_eq!(parse_number("7.0"), Some(Udm::Float(7.0)));
        assert_eq!(parse_number("1e3"), Some(Udm::Float(1000.0)));
    }
}
