//! Standard library
//!
//! A static table of pure functions, keyed by canonical name plus aliases.
//! The table is built once into the root environment frame; registration
//! order is invisible to user programs. Every evaluator receives a flat
//! vector of UDM arguments and answers in UDM; shape problems raise
//! `FunctionArgumentException` naming the function and the offending type.

pub mod arrays;
pub mod crypto;
pub mod datetime;
pub mod encoding;
pub mod json;
pub mod math;
pub mod misc;
pub mod objects;
pub mod strings;
pub mod types;

use crate::error::{Diagnostic, ErrorKind, Span};
use crate::interpreter::Evaluator;
use crate::udm::{coerce, Udm};

pub type StdlibFn = fn(&mut Evaluator, Vec<Udm>, Span) -> Result<Udm, Diagnostic>;

#[derive(Debug)]
pub struct StdlibEntry {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub min_args: usize,
    /// None for variadic entries
    pub max_args: Option<usize>,
    pub func: StdlibFn,
}

/// The full registry, in category order
pub fn registry() -> &'static [StdlibEntry] {
    REGISTRY
}

/// Look up a single entry by canonical name or alias
pub fn find(name: &str) -> Option<&'static StdlibEntry> {
    REGISTRY
        .iter()
        .find(|entry| entry.name == name || entry.aliases.contains(&name))
}

// ----------------------------------------------------------------------
// Shared argument readers
// ----------------------------------------------------------------------

pub(crate) fn arg_error(func: &str, expected: &str, actual: &Udm) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::FunctionArgument,
        format!("`{}` expects {}, got {}", func, expected, actual.type_of()),
    )
}

pub(crate) fn want_str(func: &str, value: &Udm) -> Result<String, Diagnostic> {
    match coerce::unwrap_text(value) {
        Udm::Str(s) => Ok(s.clone()),
        other => Err(arg_error(func, "a string", other)),
    }
}

pub(crate) fn want_int(func: &str, value: &Udm) -> Result<i64, Diagnostic> {
    match coerce::unwrap_text(value) {
        Udm::Int(n) => Ok(*n),
        Udm::Float(n) if n.fract() == 0.0 => Ok(*n as i64),
        other => Err(arg_error(func, "an integer", other)),
    }
}

pub(crate) fn want_f64(func: &str, value: &Udm) -> Result<f64, Diagnostic> {
    match coerce::unwrap_text(value) {
        Udm::Int(n) => Ok(*n as f64),
        Udm::Float(n) => Ok(*n),
        other => Err(arg_error(func, "a number", other)),
    }
}

pub(crate) fn want_lambda(func: &str, value: &Udm) -> Result<(), Diagnostic> {
    match value {
        Udm::Lambda(_) => Ok(()),
        other => Err(arg_error(func, "a lambda", other)),
    }
}

// ----------------------------------------------------------------------
// The table
// ----------------------------------------------------------------------

macro_rules! entry {
    ($name:literal, $func:path, $min:literal) => {
        StdlibEntry {
            name: $name,
            aliases: &[],
            min_args: $min,
            max_args: Some($min),
            func: $func,
        }
    };
    ($name:literal, $func:path, $min:literal, $max:literal) => {
        StdlibEntry {
            name: $name,
            aliases: &[],
            min_args: $min,
            max_args: Some($max),
            func: $func,
        }
    };
    ($name:literal, $func:path, $min:literal, variadic) => {
        StdlibEntry {
            name: $name,
            aliases: &[],
            min_args: $min,
            max_args: None,
            func: $func,
        }
    };
    ($name:literal, $func:path, $min:literal, $max:literal, aliases: $aliases:expr) => {
        StdlibEntry {
            name: $name,
            aliases: $aliases,
            min_args: $min,
            max_args: Some($max),
            func: $func,
        }
    };
}

static REGISTRY: &[StdlibEntry] = &[
    // Strings
    entry!("length", strings::length, 1, 1, aliases: &["sizeOf", "count"]),
    entry!("upper", strings::upper, 1),
    entry!("lower", strings::lower, 1),
    entry!("trim", strings::trim, 1),
    entry!("ltrim", strings::ltrim, 1),
    entry!("rtrim", strings::rtrim, 1),
    entry!("capitalize", strings::capitalize, 1),
    entry!("split", strings::split, 2),
    entry!("join", strings::join, 1, 2),
    entry!("replace", strings::replace, 3),
    entry!("contains", strings::contains, 2),
    entry!("startsWith", strings::starts_with, 2),
    entry!("endsWith", strings::ends_with, 2),
    entry!("indexOf", strings::index_of, 2),
    entry!("lastIndexOf", strings::last_index_of, 2),
    entry!("substring", strings::substring, 2, 3),
    entry!("substringAfter", strings::substring_after, 2),
    entry!("substringBefore", strings::substring_before, 2),
    entry!("substringAfterLast", strings::substring_after_last, 2),
    entry!("substringBeforeLast", strings::substring_before_last, 2),
    entry!("padLeft", strings::pad_left, 2, 3),
    entry!("padRight", strings::pad_right, 2, 3),
    entry!("repeat", strings::repeat, 2),
    entry!("reverse", strings::reverse, 1),
    entry!("charAt", strings::char_at, 2),
    entry!("codePointAt", strings::code_point_at, 2),
    entry!("toString", strings::to_string, 1),
    entry!("isBlank", strings::is_blank, 1),
    entry!("matches", strings::matches, 2),
    entry!("replaceRegex", strings::replace_regex, 3),
    entry!("splitRegex", strings::split_regex, 2),
    entry!("scan", strings::scan, 2),
    entry!("camelize", strings::camelize, 1),
    entry!("dasherize", strings::dasherize, 1),
    entry!("underscore", strings::underscore, 1),
    // Arrays
    entry!("map", arrays::map, 2),
    entry!("filter", arrays::filter, 2),
    entry!("reduce", arrays::reduce, 3),
    entry!("flatMap", arrays::flat_map, 2),
    entry!("flatten", arrays::flatten, 1, 2),
    entry!("sum", arrays::sum, 1),
    entry!("avg", arrays::avg, 1),
    entry!("min", arrays::min, 1),
    entry!("max", arrays::max, 1),
    entry!("first", arrays::first, 1, 1, aliases: &["head"]),
    entry!("last", arrays::last, 1),
    entry!("tail", arrays::tail, 1),
    entry!("take", arrays::take, 2),
    entry!("drop", arrays::drop, 2),
    entry!("slice", arrays::slice, 2, 3),
    entry!("sort", arrays::sort, 1),
    entry!("sortBy", arrays::sort_by, 2),
    entry!("distinct", arrays::distinct, 1),
    entry!("distinctBy", arrays::distinct_by, 2),
    entry!("groupBy", arrays::group_by, 2),
    entry!("zip", arrays::zip, 2),
    entry!("unzip", arrays::unzip, 1),
    entry!("indexOfItem", arrays::index_of_item, 2),
    entry!("find", arrays::find, 2),
    entry!("findIndex", arrays::find_index, 2),
    entry!("every", arrays::every, 2),
    entry!("some", arrays::some, 2),
    entry!("range", arrays::range, 2, 3),
    entry!("chunk", arrays::chunk, 2),
    entry!("append", arrays::append, 2),
    entry!("prepend", arrays::prepend, 2),
    entry!("concat", arrays::concat, 1, variadic),
    // Objects
    entry!("keys", objects::keys, 1),
    entry!("values", objects::values, 1),
    entry!("entries", objects::entries, 1),
    entry!("fromEntries", objects::from_entries, 1),
    entry!("merge", objects::merge, 1, variadic),
    entry!("pick", objects::pick, 2),
    entry!("omit", objects::omit, 2),
    entry!("hasKey", objects::has_key, 2),
    entry!("get", objects::get, 2, 3),
    entry!("mapValues", objects::map_values, 2),
    entry!("filterKeys", objects::filter_keys, 2),
    entry!("removeKey", objects::remove_key, 2),
    // Math
    entry!("abs", math::abs, 1),
    entry!("ceil", math::ceil, 1),
    entry!("floor", math::floor, 1),
    entry!("round", math::round, 1, 2),
    entry!("trunc", math::trunc, 1),
    entry!("sqrt", math::sqrt, 1),
    entry!("pow", math::pow, 2),
    entry!("exp", math::exp, 1),
    entry!("log", math::log, 1),
    entry!("log10", math::log10, 1),
    entry!("sign", math::sign, 1),
    entry!("clamp", math::clamp, 3),
    entry!("random", math::random, 0),
    entry!("randomInt", math::random_int, 1),
    entry!("isNaN", math::is_nan, 1),
    entry!("toNumber", math::to_number, 1),
    // Dates and times
    entry!("now", datetime::now, 0),
    entry!("today", datetime::today, 0),
    entry!("parseDate", datetime::parse_date, 1),
    entry!("parseDateTime", datetime::parse_date_time, 1),
    entry!("parseTime", datetime::parse_time, 1),
    entry!("formatDateTime", datetime::format_date_time, 2, 2, aliases: &["formatDate"]),
    entry!("addDays", datetime::add_days, 2),
    entry!("addHours", datetime::add_hours, 2),
    entry!("addMinutes", datetime::add_minutes, 2),
    entry!("addSeconds", datetime::add_seconds, 2),
    entry!("diffDays", datetime::diff_days, 2),
    entry!("year", datetime::year, 1),
    entry!("month", datetime::month, 1),
    entry!("day", datetime::day, 1),
    entry!("dayOfWeek", datetime::day_of_week, 1),
    entry!("hour", datetime::hour, 1),
    entry!("minute", datetime::minute, 1),
    entry!("second", datetime::second, 1),
    entry!("toEpochMillis", datetime::to_epoch_millis, 1),
    entry!("fromEpochMillis", datetime::from_epoch_millis, 1),
    // Types and logic
    entry!("typeOf", types::type_of, 1),
    entry!("isString", types::is_string, 1),
    entry!("isNumber", types::is_number, 1),
    entry!("isInteger", types::is_integer, 1),
    entry!("isBoolean", types::is_boolean, 1),
    entry!("isNull", types::is_null, 1),
    entry!("isArray", types::is_array, 1),
    entry!("isObject", types::is_object, 1),
    entry!("isDate", types::is_date, 1),
    entry!("isBinary", types::is_binary, 1),
    entry!("isLambda", types::is_lambda, 1),
    entry!("isEmpty", types::is_empty, 1),
    entry!("default", types::default, 2),
    entry!("not", types::not, 1),
    entry!("and", types::and, 2, variadic),
    entry!("or", types::or, 2, variadic),
    entry!("allTrue", types::all_true, 1),
    entry!("anyTrue", types::any_true, 1),
    // Encoding and binary
    entry!("encodeBase64", encoding::encode_base64, 1),
    entry!("decodeBase64", encoding::decode_base64, 1),
    entry!("decodeBase64ToString", encoding::decode_base64_to_string, 1),
    entry!("encodeHex", encoding::encode_hex, 1),
    entry!("decodeHex", encoding::decode_hex, 1),
    entry!("encodeUrl", encoding::encode_url, 1),
    entry!("encodeUrlComponent", encoding::encode_url_component, 1, 1, aliases: &["urlEncode"]),
    entry!("decodeUrl", encoding::decode_url, 1, 1, aliases: &["urlDecode"]),
    entry!("toBinary", encoding::to_binary, 1),
    entry!("fromBinary", encoding::from_binary, 1),
    entry!("binaryLength", encoding::binary_length, 1),
    entry!("binaryConcat", encoding::binary_concat, 1, variadic),
    entry!("binarySlice", encoding::binary_slice, 2, 3),
    // Hashing and crypto
    entry!("md5", crypto::md5, 1),
    entry!("sha1", crypto::sha1, 1),
    entry!("sha256", crypto::sha256, 1),
    entry!("sha512", crypto::sha512, 1),
    entry!("md5Base64", crypto::md5_base64, 1),
    entry!("sha1Base64", crypto::sha1_base64, 1),
    entry!("sha256Base64", crypto::sha256_base64, 1),
    entry!("sha512Base64", crypto::sha512_base64, 1),
    entry!("hmacSha1", crypto::hmac_sha1, 2),
    entry!("hmacSha256", crypto::hmac_sha256, 2),
    entry!("hmacSha512", crypto::hmac_sha512, 2),
    entry!("hmacSha1Base64", crypto::hmac_sha1_base64, 2),
    entry!("hmacSha256Base64", crypto::hmac_sha256_base64, 2),
    entry!("hmacSha512Base64", crypto::hmac_sha512_base64, 2),
    entry!("encryptAES128CBC", crypto::encrypt_aes128_cbc, 3, 3, aliases: &["encryptAES128"]),
    entry!("decryptAES128CBC", crypto::decrypt_aes128_cbc, 3, 3, aliases: &["decryptAES128"]),
    // JSON
    entry!("parseJson", json::parse_json, 1),
    entry!("renderJson", json::render_json, 1, 2),
    entry!("canonicalizeJson", json::canonicalize_json, 1, 1, aliases: &["canonicalizeJSON"]),
    // Identifiers, tokens, URLs
    entry!("generateUuid", misc::generate_uuid, 0),
    entry!("generateUuidV7", misc::generate_uuid_v7, 0),
    entry!("decodeJwt", misc::decode_jwt, 1, 1, aliases: &["decodeJWT"]),
    entry!("parseUrl", misc::parse_url, 1),
    // CSV helpers
    entry!("parseCsv", misc::parse_csv, 1, 2),
    entry!("renderCsv", misc::render_csv, 1, 2),
    // XML navigation
    entry!("elementName", misc::element_name, 1),
    entry!("localName", misc::local_name, 1),
    entry!("attributesOf", misc::attributes_of, 1),
    entry!("withElementName", misc::with_element_name, 2),
    // Debugging
    entry!("debug", misc::debug, 1),
    entry!("trace", misc::trace, 2),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_size() {
        assert!(REGISTRY.len() >= 150, "registry has {} entries", REGISTRY.len());
    }

    #[test]
    fn test_names_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for entry in REGISTRY {
            assert!(seen.insert(entry.name), "duplicate name {}", entry.name);
            for alias in entry.aliases {
                assert!(seen.insert(alias), "duplicate alias {}", alias);
            }
        }
    }

    #[test]
    fn test_find_by_name_and_alias() {
        assert!(find("map").is_some());
        assert!(find("sizeOf").is_some());
        assert!(find("canonicalizeJSON").is_some());
        assert!(find("definitelyNot").is_none());
    }

    #[test]
    fn test_arity_ranges_are_sane() {
        for entry in REGISTRY {
            if let Some(max) = entry.max_args {
                assert!(entry.min_args <= max, "{} has inverted arity", entry.name);
            }
        }
    }
}
