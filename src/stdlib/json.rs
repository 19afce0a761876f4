//! JSON functions: parse, render, and RFC 8785 canonicalization

use crate::error::{Diagnostic, ErrorKind, Span};
use crate::formats::json::{udm_to_value, value_to_udm};
use crate::interpreter::Evaluator;
use crate::udm::{coerce, Udm};

use super::{arg_error, want_str};

pub fn parse_json(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let text = want_str("parseJson", &args[0])?;
    let value: serde_json::Value = serde_json::from_str(&text).map_err(|err| {
        Diagnostic::new(
            ErrorKind::FunctionArgument,
            format!("`parseJson` received invalid JSON: {}", err),
        )
    })?;
    Ok(value_to_udm(&value))
}

pub fn render_json(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let value = udm_to_value(&args[0]).map_err(|mut diag| {
        diag.message = format!("`renderJson` cannot serialize: {}", diag.message);
        diag
    })?;
    let pretty = args
        .get(1)
        .map(|flag| matches!(coerce::unwrap_text(flag), Udm::Bool(true)))
        .unwrap_or(false);
    let rendered = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    };
    rendered.map(Udm::Str).map_err(|err| {
        Diagnostic::new(ErrorKind::FormatSerialize, format!("JSON rendering failed: {}", err))
    })
}

/// RFC 8785 canonical form: key sort by Unicode code point, no whitespace,
/// minimal string escapes, ECMAScript number rendering. NaN and infinities
/// are rejected.
pub fn canonicalize_json(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    // A string argument is parsed first, so canonicalizing serialized JSON
    // and canonicalizing the value agree
    let value = match &args[0] {
        Udm::Str(text) => {
            let parsed: serde_json::Value = serde_json::from_str(text).map_err(|err| {
                Diagnostic::new(
                    ErrorKind::FunctionArgument,
                    format!("`canonicalizeJson` received invalid JSON: {}", err),
                )
            })?;
            value_to_udm(&parsed)
        }
        other => other.clone(),
    };
    let mut out = String::new();
    write_canonical(&value, &mut out)?;
    Ok(Udm::Str(out))
}

fn write_canonical(value: &Udm, out: &mut String) -> Result<(), Diagnostic> {
    match coerce::unwrap_text(value) {
        Udm::Null => out.push_str("null"),
        Udm::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Udm::Int(n) => out.push_str(&n.to_string()),
        Udm::Float(n) => out.push_str(&es_number(*n)?),
        Udm::Str(s) => write_canonical_string(s, out),
        Udm::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        Udm::Object(obj) => {
            let mut keys: Vec<&String> = obj.properties.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical_string(key, out);
                out.push(':');
                write_canonical(&obj.properties[key.as_str()], out)?;
            }
            out.push('}');
        }
        Udm::DateTime(_) | Udm::Date(_) | Udm::LocalDateTime(_) | Udm::Time(_) => {
            write_canonical_string(&coerce::to_display_string(value), out)
        }
        other => {
            return Err(arg_error(
                "canonicalizeJson",
                "a JSON-representable value",
                other,
            ))
        }
    }
    Ok(())
}

/// JSON.stringify's string escaping: the two-character escapes where they
/// exist, \u00XX for other control characters, everything else literal
fn write_canonical_string(s: &str, out: &mut String) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{0009}' => out.push_str("\\t"),
            '\u{000A}' => out.push_str("\\n"),
            '\u{000C}' => out.push_str("\\f"),
            '\u{000D}' => out.push_str("\\r"),
            ch if (ch as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", ch as u32));
            }
            ch => out.push(ch),
        }
    }
    out.push('"');
}

/// ECMAScript Number::toString(10): plain decimal within [1e-6, 1e21),
/// exponent notation outside, never a trailing `.0`
fn es_number(v: f64) -> Result<String, Diagnostic> {
    if !v.is_finite() {
        return Err(Diagnostic::new(
            ErrorKind::FunctionArgument,
            "`canonicalizeJson` cannot represent NaN or infinity",
        ));
    }
    if v == 0.0 {
        return Ok("0".to_string());
    }
    let negative = v < 0.0;
    // Shortest round-trip digits via exponent formatting: "d.ddde±x"
    let formatted = format!("{:e}", v.abs());
    let (mantissa, exponent) = formatted
        .split_once('e')
        .expect("exponent formatting always contains `e`");
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let exponent: i32 = exponent.parse().expect("exponent is an integer");
    let k = digits.len() as i32;
    let n = exponent + 1; // value = 0.digits × 10^n

    let body = if k <= n && n <= 21 {
        // Integer with trailing zeros
        let mut s = digits.clone();
        for _ in 0..(n - k) {
            s.push('0');
        }
        s
    } else if 0 < n && n <= 21 {
        format!("{}.{}", &digits[..n as usize], &digits[n as usize..])
    } else if -6 < n && n <= 0 {
        let mut s = String::from("0.");
        for _ in 0..(-n) {
            s.push('0');
        }
        s.push_str(&digits);
        s
    } else {
        // Exponent form, ECMAScript style with an explicit sign
        let exp = n - 1;
        let sign = if exp >= 0 { "+" } else { "-" };
        if digits.len() == 1 {
            format!("{}e{}{}", digits, sign, exp.abs())
        } else {
            format!("{}.{}e{}{}", &digits[..1], &digits[1..], sign, exp.abs())
        }
    };
    Ok(if negative { format!("-{}", body) } else { body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Position;
    use crate::interpreter::EvalOptions;
    use crate::parser::ast::TemplateDef;
    use crate::udm::ObjectBuilder;

    fn ev() -> Evaluator<'static> {
        static NO_TEMPLATES: &[TemplateDef] = &[];
        Evaluator::new(NO_TEMPLATES, &EvalOptions::default())
    }

    fn span() -> Span {
        Span::point(Position::start())
    }

    #[test]
    fn test_parse_render_round_trip() {
        let mut e = ev();
        let parsed = parse_json(
            &mut e,
            vec![Udm::string(r#"{"a":1,"b":[true,null,"x"],"c":2.5}"#)],
            span(),
        )
        .unwrap();
        let rendered = render_json(&mut e, vec![parsed.clone()], span()).unwrap();
        let reparsed = parse_json(&mut e, vec![rendered], span()).unwrap();
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn test_canonical_key_order_is_independent_of_insertion() {
        let mut e = ev();
        let mut x = ObjectBuilder::new();
        x.property("b", Udm::Int(2));
        x.property("a", Udm::Int(1));
        let mut y = ObjectBuilder::new();
        y.property("a", Udm::Int(1));
        y.property("b", Udm::Int(2));
        let cx = canonicalize_json(&mut e, vec![x.build()], span()).unwrap();
        let cy = canonicalize_json(&mut e, vec![y.build()], span()).unwrap();
        assert_eq!(cx, cy);
        assert_eq!(cx, Udm::string(r#"{"a":1,"b":2}"#));
    }

    #[test]
    fn test_canonical_numbers_follow_ecmascript() {
        let mut e = ev();
        let mut check = |value: Udm, expected: &str| {
            let result = canonicalize_json(&mut e, vec![value], span()).unwrap();
            assert_eq!(result, Udm::string(expected));
        };
        check(Udm::Float(42.0), "42");
        check(Udm::Float(0.5), "0.5");
        check(Udm::Float(-0.0025), "-0.0025");
        check(Udm::Float(1e21), "1e+21");
        check(Udm::Float(1.25e-7), "1.25e-7");
        check(Udm::Float(100.0), "100");
    }

    #[test]
    fn test_canonical_rejects_nan() {
        let mut e = ev();
        assert!(canonicalize_json(&mut e, vec![Udm::Float(f64::NAN)], span()).is_err());
        assert!(canonicalize_json(&mut e, vec![Udm::Float(f64::INFINITY)], span()).is_err());
    }

    #[test]
    fn test_canonical_string_escapes() {
        let mut e = ev();
        let result =
            canonicalize_json(&mut e, vec![Udm::string("a\"b\\c\nd\u{0001}")], span()).unwrap();
        assert_eq!(result, Udm::string(r#""a\"b\\c\nd\u0001""#));
    }

    #[test]
    fn test_empty_containers() {
        let mut e = ev();
        assert_eq!(
            canonicalize_json(&mut e, vec![Udm::Array(vec![])], span()).unwrap(),
            Udm::string("[]")
        );
        assert_eq!(
            canonicalize_json(&mut e, vec![ObjectBuilder::new().build()], span()).unwrap(),
            Udm::string("{}")
        );
    }
}
