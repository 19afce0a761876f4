//! Encoding and binary functions

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS, NON_ALPHANUMERIC};

use crate::error::{Diagnostic, ErrorKind, Span};
use crate::interpreter::Evaluator;
use crate::udm::{coerce, Udm};

use super::{arg_error, want_int, want_str};

/// Unreserved characters stay as-is when encoding a URI component
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Whole-URL encoding touches only characters that can never appear raw
const FULL_URL: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^');

/// Bytes of a binary, or the UTF-8 bytes of a string
pub(super) fn want_bytes(func: &str, value: &Udm) -> Result<Vec<u8>, Diagnostic> {
    match coerce::unwrap_text(value) {
        Udm::Binary { bytes, .. } => Ok(bytes.clone()),
        Udm::Str(s) => Ok(s.as_bytes().to_vec()),
        other => Err(arg_error(func, "a string or binary", other)),
    }
}

pub fn encode_base64(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let bytes = want_bytes("encodeBase64", &args[0])?;
    Ok(Udm::Str(BASE64.encode(bytes)))
}

pub fn decode_base64(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let text = want_str("decodeBase64", &args[0])?;
    let bytes = BASE64.decode(text.trim()).map_err(|err| {
        Diagnostic::new(
            ErrorKind::FunctionArgument,
            format!("`decodeBase64` received invalid base64: {}", err),
        )
    })?;
    Ok(Udm::Binary {
        bytes,
        encoding: None,
    })
}

pub fn decode_base64_to_string(
    ev: &mut Evaluator,
    args: Vec<Udm>,
    span: Span,
) -> Result<Udm, Diagnostic> {
    match decode_base64(ev, args, span)? {
        Udm::Binary { bytes, .. } => String::from_utf8(bytes).map(Udm::Str).map_err(|_| {
            Diagnostic::new(
                ErrorKind::FunctionArgument,
                "`decodeBase64ToString` decoded bytes that are not valid UTF-8",
            )
        }),
        _ => unreachable!("decodeBase64 returns binary"),
    }
}

pub fn encode_hex(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let bytes = want_bytes("encodeHex", &args[0])?;
    Ok(Udm::Str(hex::encode(bytes)))
}

pub fn decode_hex(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let text = want_str("decodeHex", &args[0])?;
    let bytes = hex::decode(text.trim()).map_err(|err| {
        Diagnostic::new(
            ErrorKind::FunctionArgument,
            format!("`decodeHex` received invalid hex: {}", err),
        )
    })?;
    Ok(Udm::Binary {
        bytes,
        encoding: None,
    })
}

pub fn encode_url(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let text = want_str("encodeUrl", &args[0])?;
    Ok(Udm::Str(utf8_percent_encode(&text, FULL_URL).to_string()))
}

pub fn encode_url_component(
    _ev: &mut Evaluator,
    args: Vec<Udm>,
    _span: Span,
) -> Result<Udm, Diagnostic> {
    let text = want_str("encodeUrlComponent", &args[0])?;
    Ok(Udm::Str(utf8_percent_encode(&text, COMPONENT).to_string()))
}

pub fn decode_url(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let text = want_str("decodeUrl", &args[0])?;
    percent_decode_str(&text)
        .decode_utf8()
        .map(|decoded| Udm::Str(decoded.into_owned()))
        .map_err(|_| {
            Diagnostic::new(
                ErrorKind::FunctionArgument,
                "`decodeUrl` decoded bytes that are not valid UTF-8",
            )
        })
}

pub fn to_binary(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let text = want_str("toBinary", &args[0])?;
    Ok(Udm::Binary {
        bytes: text.into_bytes(),
        encoding: Some("utf-8".to_string()),
    })
}

pub fn from_binary(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    match coerce::unwrap_text(&args[0]) {
        Udm::Binary { bytes, .. } => String::from_utf8(bytes.clone())
            .map(Udm::Str)
            .map_err(|_| {
                Diagnostic::new(
                    ErrorKind::FunctionArgument,
                    "`fromBinary` received bytes that are not valid UTF-8",
                )
            }),
        other => Err(arg_error("fromBinary", "a binary", other)),
    }
}

pub fn binary_length(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    match coerce::unwrap_text(&args[0]) {
        Udm::Binary { bytes, .. } => Ok(Udm::Int(bytes.len() as i64)),
        other => Err(arg_error("binaryLength", "a binary", other)),
    }
}

pub fn binary_concat(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let mut out = Vec::new();
    for arg in &args {
        out.extend(want_bytes("binaryConcat", arg)?);
    }
    Ok(Udm::Binary {
        bytes: out,
        encoding: None,
    })
}

pub fn binary_slice(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let bytes = match coerce::unwrap_text(&args[0]) {
        Udm::Binary { bytes, .. } => bytes.clone(),
        other => return Err(arg_error("binarySlice", "a binary", other)),
    };
    let len = bytes.len() as i64;
    let clamp = |idx: i64| -> usize {
        let resolved = if idx < 0 { len + idx } else { idx };
        resolved.clamp(0, len) as usize
    };
    let start = clamp(want_int("binarySlice", &args[1])?);
    let end = if args.len() > 2 {
        clamp(want_int("binarySlice", &args[2])?)
    } else {
        len as usize
    };
    let slice = if start >= end {
        Vec::new()
    } else {
        bytes[start..end].to_vec()
    };
    Ok(Udm::Binary {
        bytes: slice,
        encoding: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Position;
    use crate::interpreter::EvalOptions;
    use crate::parser::ast::TemplateDef;

    fn ev() -> Evaluator<'static> {
        static NO_TEMPLATES: &[TemplateDef] = &[];
        Evaluator::new(NO_TEMPLATES, &EvalOptions::default())
    }

    fn span() -> Span {
        Span::point(Position::start())
    }

    #[test]
    fn test_base64_round_trip() {
        let mut e = ev();
        let encoded = encode_base64(&mut e, vec![Udm::string("hello")], span()).unwrap();
        assert_eq!(encoded, Udm::string("aGVsbG8="));
        let decoded = decode_base64_to_string(&mut e, vec![encoded], span()).unwrap();
        assert_eq!(decoded, Udm::string("hello"));
    }

    #[test]
    fn test_hex_round_trip() {
        let mut e = ev();
        let encoded = encode_hex(&mut e, vec![Udm::string("AB")], span()).unwrap();
        assert_eq!(encoded, Udm::string("4142"));
        let decoded = decode_hex(&mut e, vec![encoded], span()).unwrap();
        assert_eq!(
            decoded,
            Udm::Binary {
                bytes: vec![0x41, 0x42],
                encoding: None
            }
        );
    }

    #[test]
    fn test_url_component_encoding() {
        let mut e = ev();
        assert_eq!(
            encode_url_component(&mut e, vec![Udm::string("a b&c")], span()).unwrap(),
            Udm::string("a%20b%26c")
        );
        assert_eq!(
            decode_url(&mut e, vec![Udm::string("a%20b%26c")], span()).unwrap(),
            Udm::string("a b&c")
        );
    }

    #[test]
    fn test_full_url_encoding_keeps_reserved() {
        let mut e = ev();
        assert_eq!(
            encode_url(
                &mut e,
                vec![Udm::string("https://example.com/a b?q=1&r=2")],
                span()
            )
            .unwrap(),
            Udm::string("https://example.com/a%20b?q=1&r=2")
        );
    }

    #[test]
    fn test_binary_slice() {
        let mut e = ev();
        let bin = Udm::Binary {
            bytes: vec![1, 2, 3, 4, 5],
            encoding: None,
        };
        let sliced = binary_slice(&mut e, vec![bin, Udm::Int(1), Udm::Int(4)], span()).unwrap();
        assert_eq!(
            sliced,
            Udm::Binary {
                bytes: vec![2, 3, 4],
                encoding: None
            }
        );
    }

    #[test]
    fn test_invalid_base64_is_function_argument_error() {
        let mut e = ev();
        let err = decode_base64(&mut e, vec![Udm::string("!!!")], span()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FunctionArgument);
    }
}
