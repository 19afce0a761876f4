//! String functions

use regex::Regex;

use crate::error::{Diagnostic, Span};
use crate::interpreter::Evaluator;
use crate::udm::{coerce, Udm};

use super::{arg_error, want_int, want_str};

/// Generic size probe: characters of a string, elements of an array,
/// properties of an object, bytes of a binary
pub fn length(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    match coerce::unwrap_text(&args[0]) {
        Udm::Str(s) => Ok(Udm::Int(s.chars().count() as i64)),
        Udm::Array(items) => Ok(Udm::Int(items.len() as i64)),
        Udm::Object(obj) => Ok(Udm::Int(obj.properties.len() as i64)),
        Udm::Binary { bytes, .. } => Ok(Udm::Int(bytes.len() as i64)),
        other => Err(arg_error("length", "a string, array, object, or binary", other)),
    }
}

pub fn upper(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Str(want_str("upper", &args[0])?.to_uppercase()))
}

pub fn lower(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Str(want_str("lower", &args[0])?.to_lowercase()))
}

pub fn trim(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Str(want_str("trim", &args[0])?.trim().to_string()))
}

pub fn ltrim(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Str(want_str("ltrim", &args[0])?.trim_start().to_string()))
}

pub fn rtrim(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Str(want_str("rtrim", &args[0])?.trim_end().to_string()))
}

pub fn capitalize(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let s = want_str("capitalize", &args[0])?;
    let mut chars = s.chars();
    let result = match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    };
    Ok(Udm::Str(result))
}

pub fn split(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let s = want_str("split", &args[0])?;
    let sep = want_str("split", &args[1])?;
    let parts = if sep.is_empty() {
        s.chars().map(|c| Udm::Str(c.to_string())).collect()
    } else {
        s.split(sep.as_str()).map(Udm::string).collect()
    };
    Ok(Udm::Array(parts))
}

pub fn join(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let items = match coerce::unwrap_text(&args[0]) {
        Udm::Array(items) => items.clone(),
        other => return Err(arg_error("join", "an array", other)),
    };
    let sep = if args.len() > 1 {
        want_str("join", &args[1])?
    } else {
        String::new()
    };
    let joined = items
        .iter()
        .map(coerce::to_display_string)
        .collect::<Vec<_>>()
        .join(&sep);
    Ok(Udm::Str(joined))
}

pub fn replace(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let s = want_str("replace", &args[0])?;
    let find = want_str("replace", &args[1])?;
    let with = want_str("replace", &args[2])?;
    Ok(Udm::Str(s.replace(find.as_str(), &with)))
}

/// Membership test: substring of a string, or element of an array
pub fn contains(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    match coerce::unwrap_text(&args[0]) {
        Udm::Str(s) => {
            let needle = want_str("contains", &args[1])?;
            Ok(Udm::Bool(s.contains(needle.as_str())))
        }
        Udm::Array(items) => Ok(Udm::Bool(
            items.iter().any(|item| crate::udm::deep_equal(item, &args[1])),
        )),
        other => Err(arg_error("contains", "a string or array", other)),
    }
}

pub fn starts_with(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let s = want_str("startsWith", &args[0])?;
    let prefix = want_str("startsWith", &args[1])?;
    Ok(Udm::Bool(s.starts_with(prefix.as_str())))
}

pub fn ends_with(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let s = want_str("endsWith", &args[0])?;
    let suffix = want_str("endsWith", &args[1])?;
    Ok(Udm::Bool(s.ends_with(suffix.as_str())))
}

/// Character index of the first occurrence, -1 when absent
pub fn index_of(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let s = want_str("indexOf", &args[0])?;
    let needle = want_str("indexOf", &args[1])?;
    match s.find(needle.as_str()) {
        Some(byte_idx) => Ok(Udm::Int(s[..byte_idx].chars().count() as i64)),
        None => Ok(Udm::Int(-1)),
    }
}

pub fn last_index_of(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let s = want_str("lastIndexOf", &args[0])?;
    let needle = want_str("lastIndexOf", &args[1])?;
    match s.rfind(needle.as_str()) {
        Some(byte_idx) => Ok(Udm::Int(s[..byte_idx].chars().count() as i64)),
        None => Ok(Udm::Int(-1)),
    }
}

/// Character-indexed substring; negative indices count from the end
pub fn substring(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let s = want_str("substring", &args[0])?;
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len() as i64;
    let clamp = |idx: i64| -> usize {
        let resolved = if idx < 0 { len + idx } else { idx };
        resolved.clamp(0, len) as usize
    };
    let start = clamp(want_int("substring", &args[1])?);
    let end = if args.len() > 2 {
        clamp(want_int("substring", &args[2])?)
    } else {
        len as usize
    };
    if start >= end {
        return Ok(Udm::Str(String::new()));
    }
    Ok(Udm::Str(chars[start..end].iter().collect()))
}

pub fn substring_after(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let s = want_str("substringAfter", &args[0])?;
    let sep = want_str("substringAfter", &args[1])?;
    let result = s
        .find(sep.as_str())
        .map(|i| s[i + sep.len()..].to_string())
        .unwrap_or_default();
    Ok(Udm::Str(result))
}

pub fn substring_before(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let s = want_str("substringBefore", &args[0])?;
    let sep = want_str("substringBefore", &args[1])?;
    let result = s.find(sep.as_str()).map(|i| s[..i].to_string()).unwrap_or_default();
    Ok(Udm::Str(result))
}

pub fn substring_after_last(
    _ev: &mut Evaluator,
    args: Vec<Udm>,
    _span: Span,
) -> Result<Udm, Diagnostic> {
    let s = want_str("substringAfterLast", &args[0])?;
    let sep = want_str("substringAfterLast", &args[1])?;
    let result = s
        .rfind(sep.as_str())
        .map(|i| s[i + sep.len()..].to_string())
        .unwrap_or_default();
    Ok(Udm::Str(result))
}

pub fn substring_before_last(
    _ev: &mut Evaluator,
    args: Vec<Udm>,
    _span: Span,
) -> Result<Udm, Diagnostic> {
    let s = want_str("substringBeforeLast", &args[0])?;
    let sep = want_str("substringBeforeLast", &args[1])?;
    let result = s.rfind(sep.as_str()).map(|i| s[..i].to_string()).unwrap_or_default();
    Ok(Udm::Str(result))
}

pub fn pad_left(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    pad("padLeft", args, true)
}

pub fn pad_right(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    pad("padRight", args, false)
}

fn pad(func: &str, args: Vec<Udm>, left: bool) -> Result<Udm, Diagnostic> {
    let s = want_str(func, &args[0])?;
    let width = want_int(func, &args[1])?.max(0) as usize;
    let fill = if args.len() > 2 {
        want_str(func, &args[2])?
    } else {
        " ".to_string()
    };
    let current = s.chars().count();
    if current >= width || fill.is_empty() {
        return Ok(Udm::Str(s));
    }
    let mut padding = String::new();
    let fill_chars: Vec<char> = fill.chars().collect();
    for i in 0..(width - current) {
        padding.push(fill_chars[i % fill_chars.len()]);
    }
    let result = if left { padding + &s } else { s + &padding };
    Ok(Udm::Str(result))
}

pub fn repeat(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let s = want_str("repeat", &args[0])?;
    let times = want_int("repeat", &args[1])?.max(0) as usize;
    Ok(Udm::Str(s.repeat(times)))
}

/// Reverse a string's characters or an array's elements
pub fn reverse(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    match coerce::unwrap_text(&args[0]) {
        Udm::Str(s) => Ok(Udm::Str(s.chars().rev().collect())),
        Udm::Array(items) => Ok(Udm::Array(items.iter().rev().cloned().collect())),
        other => Err(arg_error("reverse", "a string or array", other)),
    }
}

pub fn char_at(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let s = want_str("charAt", &args[0])?;
    let idx = want_int("charAt", &args[1])?;
    match s.chars().nth(idx.max(0) as usize) {
        Some(ch) => Ok(Udm::Str(ch.to_string())),
        None => Ok(Udm::Str(String::new())),
    }
}

pub fn code_point_at(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let s = want_str("codePointAt", &args[0])?;
    let idx = want_int("codePointAt", &args[1])?;
    match s.chars().nth(idx.max(0) as usize) {
        Some(ch) => Ok(Udm::Int(ch as i64)),
        None => Ok(Udm::Null),
    }
}

/// The shared display coercion as a callable
pub fn to_string(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Str(coerce::to_display_string(&args[0])))
}

pub fn is_blank(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    match coerce::unwrap_text(&args[0]) {
        Udm::Null => Ok(Udm::Bool(true)),
        Udm::Str(s) => Ok(Udm::Bool(s.trim().is_empty())),
        other => Err(arg_error("isBlank", "a string or null", other)),
    }
}

pub fn matches(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let s = want_str("matches", &args[0])?;
    let re = compile_regex("matches", &args[1])?;
    Ok(Udm::Bool(re.is_match(&s)))
}

pub fn replace_regex(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let s = want_str("replaceRegex", &args[0])?;
    let re = compile_regex("replaceRegex", &args[1])?;
    let with = want_str("replaceRegex", &args[2])?;
    Ok(Udm::Str(re.replace_all(&s, with.as_str()).into_owned()))
}

pub fn split_regex(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let s = want_str("splitRegex", &args[0])?;
    let re = compile_regex("splitRegex", &args[1])?;
    Ok(Udm::Array(re.split(&s).map(Udm::string).collect()))
}

/// First capture groups of the first match, or null
pub fn scan(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let s = want_str("scan", &args[0])?;
    let re = compile_regex("scan", &args[1])?;
    let mut rows = Vec::new();
    for captures in re.captures_iter(&s) {
        let row = captures
            .iter()
            .map(|group| match group {
                Some(m) => Udm::string(m.as_str()),
                None => Udm::Null,
            })
            .collect();
        rows.push(Udm::Array(row));
    }
    Ok(Udm::Array(rows))
}

fn compile_regex(func: &str, value: &Udm) -> Result<Regex, Diagnostic> {
    let pattern = want_str(func, value)?;
    Regex::new(&pattern).map_err(|err| {
        Diagnostic::new(
            crate::error::ErrorKind::FunctionArgument,
            format!("`{}` received an invalid regex: {}", func, err),
        )
    })
}

pub fn camelize(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let s = want_str("camelize", &args[0])?;
    let mut result = String::with_capacity(s.len());
    let mut upper_next = false;
    for (i, ch) in s.chars().enumerate() {
        if ch == '_' || ch == '-' || ch == ' ' {
            upper_next = i > 0;
        } else if upper_next {
            result.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            result.push(ch);
        }
    }
    Ok(Udm::Str(result))
}

pub fn dasherize(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Str(decamelize(
        &want_str("dasherize", &args[0])?,
        '-',
    )))
}

pub fn underscore(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Str(decamelize(
        &want_str("underscore", &args[0])?,
        '_',
    )))
}

fn decamelize(s: &str, sep: char) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_lower = false;
    for ch in s.chars() {
        if ch == '_' || ch == '-' || ch == ' ' {
            result.push(sep);
            prev_lower = false;
        } else if ch.is_uppercase() {
            if prev_lower {
                result.push(sep);
            }
            result.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            result.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::EvalOptions;
    use crate::parser::ast::TemplateDef;

    fn ev() -> Evaluator<'static> {
        static NO_TEMPLATES: &[TemplateDef] = &[];
        Evaluator::new(NO_TEMPLATES, &EvalOptions::default())
    }

    fn span() -> Span {
        Span::point(crate::error::Position::start())
    }

    #[test]
    fn test_case_functions() {
        let mut e = ev();
        assert_eq!(
            upper(&mut e, vec![Udm::string("abc")], span()).unwrap(),
            Udm::string("ABC")
        );
        assert_eq!(
            capitalize(&mut e, vec![Udm::string("hello world")], span()).unwrap(),
            Udm::string("Hello world")
        );
    }

    #[test]
    fn test_split_and_join() {
        let mut e = ev();
        let parts = split(&mut e, vec![Udm::string("a,b,c"), Udm::string(",")], span()).unwrap();
        assert_eq!(
            parts,
            Udm::Array(vec![Udm::string("a"), Udm::string("b"), Udm::string("c")])
        );
        let joined = join(&mut e, vec![parts, Udm::string("-")], span()).unwrap();
        assert_eq!(joined, Udm::string("a-b-c"));
    }

    #[test]
    fn test_substring_negative_indices() {
        let mut e = ev();
        assert_eq!(
            substring(
                &mut e,
                vec![Udm::string("hello"), Udm::Int(-3), Udm::Int(5)],
                span()
            )
            .unwrap(),
            Udm::string("llo")
        );
    }

    #[test]
    fn test_substring_before_after() {
        let mut e = ev();
        assert_eq!(
            substring_after(&mut e, vec![Udm::string("a=b=c"), Udm::string("=")], span()).unwrap(),
            Udm::string("b=c")
        );
        assert_eq!(
            substring_before_last(&mut e, vec![Udm::string("a=b=c"), Udm::string("=")], span())
                .unwrap(),
            Udm::string("a=b")
        );
    }

    #[test]
    fn test_pad() {
        let mut e = ev();
        assert_eq!(
            pad_left(&mut e, vec![Udm::string("7"), Udm::Int(3), Udm::string("0")], span())
                .unwrap(),
            Udm::string("007")
        );
        assert_eq!(
            pad_right(&mut e, vec![Udm::string("ab"), Udm::Int(4)], span()).unwrap(),
            Udm::string("ab  ")
        );
    }

    #[test]
    fn test_regex_functions() {
        let mut e = ev();
        assert_eq!(
            matches(
                &mut e,
                vec![Udm::string("order-42"), Udm::string(r"^order-\d+$")],
                span()
            )
            .unwrap(),
            Udm::Bool(true)
        );
        assert_eq!(
            replace_regex(
                &mut e,
                vec![
                    Udm::string("a1b22c"),
                    Udm::string(r"\d+"),
                    Udm::string("#")
                ],
                span()
            )
            .unwrap(),
            Udm::string("a#b#c")
        );
    }

    #[test]
    fn test_invalid_regex_is_function_argument_error() {
        let mut e = ev();
        let err = matches(
            &mut e,
            vec![Udm::string("x"), Udm::string("(unclosed")],
            span(),
        )
        .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::FunctionArgument);
        assert!(err.message.contains("matches"));
    }

    #[test]
    fn test_name_style_conversions() {
        let mut e = ev();
        assert_eq!(
            camelize(&mut e, vec![Udm::string("order_line_item")], span()).unwrap(),
            Udm::string("orderLineItem")
        );
        assert_eq!(
            underscore(&mut e, vec![Udm::string("orderLineItem")], span()).unwrap(),
            Udm::string("order_line_item")
        );
        assert_eq!(
            dasherize(&mut e, vec![Udm::string("orderLineItem")], span()).unwrap(),
            Udm::string("order-line-item")
        );
    }

    #[test]
    fn test_unwraps_text_elements() {
        let mut e = ev();
        let mut element = crate::udm::ObjectBuilder::named("Name");
        element.property(crate::udm::TEXT_PROPERTY, Udm::string("bob"));
        assert_eq!(
            upper(&mut e, vec![element.build()], span()).unwrap(),
            Udm::string("BOB")
        );
    }
}
