//! Format bridges
//!
//! Each bridge lifts bytes to UDM and lowers UDM back to bytes. This
//! module owns the bridge dispatch, the translation of a directive's
//! option map into per-bridge option structs, and the `auto` sniffer the
//! CLI relies on.

pub mod csv;
pub mod json;
pub mod udm;
pub mod xml;
pub mod yaml;

use crate::error::{Diagnostic, ErrorKind};
use crate::parser::ast::{DirectiveValue, OptionsMap};
use crate::udm::Udm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Xml,
    Json,
    Yaml,
    Csv,
    /// Sniffed from the payload at parse time; JSON on the way out
    Auto,
}

impl std::str::FromStr for Format {
    type Err = Diagnostic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xml" => Ok(Format::Xml),
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            "csv" => Ok(Format::Csv),
            "auto" => Ok(Format::Auto),
            other => Err(Diagnostic::new(
                ErrorKind::FormatParse,
                format!("unknown format `{}`", other),
            )),
        }
    }
}

/// Lift input bytes into UDM per the declared format and options
pub fn parse(format: Format, bytes: &[u8], options: &OptionsMap) -> Result<Udm, Diagnostic> {
    match format {
        Format::Json => json::parse(bytes, &json_options(options)),
        Format::Xml => xml::parse(bytes, &xml_options(options)),
        Format::Yaml => yaml::parse(bytes, &yaml_options(options)),
        Format::Csv => csv::parse(bytes, &csv_options(options)),
        Format::Auto => parse(sniff(bytes), bytes, options),
    }
}

/// Lower UDM to output bytes per the declared format and options
pub fn serialize(format: Format, value: &Udm, options: &OptionsMap) -> Result<Vec<u8>, Diagnostic> {
    match format {
        Format::Json => json::serialize(value, &json_options(options)),
        Format::Xml => xml::serialize(value, &xml_options(options)),
        Format::Yaml => yaml::serialize(value, &yaml_options(options)),
        Format::Csv => csv::serialize(value, &csv_options(options)),
        Format::Auto => json::serialize(value, &json_options(options)),
    }
}

/// Guess a payload's format: XML by its opening angle bracket, JSON by its
/// first structural character, CSV by a delimiter in the first line, YAML
/// otherwise.
pub fn sniff(bytes: &[u8]) -> Format {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim_start();
    if trimmed.starts_with('<') {
        return Format::Xml;
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Format::Json;
    }
    let first_line = trimmed.lines().next().unwrap_or("");
    if first_line.contains(',') && !first_line.contains(':') {
        return Format::Csv;
    }
    Format::Yaml
}

// ----------------------------------------------------------------------
// Option maps
// ----------------------------------------------------------------------

fn bool_option(options: &OptionsMap, key: &str, default: bool) -> bool {
    options
        .get(key)
        .and_then(DirectiveValue::as_bool)
        .unwrap_or(default)
}

fn json_options(options: &OptionsMap) -> json::JsonOptions {
    let defaults = json::JsonOptions::default();
    json::JsonOptions {
        pretty: bool_option(options, "pretty", defaults.pretty),
        indent: options
            .get("indent")
            .and_then(DirectiveValue::as_int)
            .map(|n| n.clamp(0, 16) as usize)
            .unwrap_or(defaults.indent),
    }
}

fn xml_options(options: &OptionsMap) -> xml::XmlOptions {
    let defaults = xml::XmlOptions::default();
    let empty_style = options
        .get("emptyElements")
        .and_then(DirectiveValue::as_str)
        .and_then(xml::EmptyStyle::from_name)
        .unwrap_or(defaults.empty_style);
    let mut namespaces = indexmap::IndexMap::new();
    if let Some(DirectiveValue::Map(map)) = options.get("namespaces") {
        for (prefix, uri) in map {
            if let DirectiveValue::Str(uri) = uri {
                namespaces.insert(prefix.clone(), uri.clone());
            }
        }
    }
    xml::XmlOptions {
        declaration: bool_option(options, "declaration", defaults.declaration),
        empty_style,
        namespaces,
        soap_envelope: bool_option(options, "soapEnvelope", false),
        root_name: options
            .get("rootName")
            .and_then(DirectiveValue::as_str)
            .map(str::to_string),
    }
}

fn yaml_options(options: &OptionsMap) -> yaml::YamlOptions {
    yaml::YamlOptions {
        multi_document: bool_option(options, "multiDocument", false),
    }
}

fn csv_options(options: &OptionsMap) -> csv::CsvOptions {
    let defaults = csv::CsvOptions::default();
    let byte_option = |key: &str, default: u8| {
        options
            .get(key)
            .and_then(DirectiveValue::as_str)
            .and_then(|s| s.bytes().next())
            .unwrap_or(default)
    };
    csv::CsvOptions {
        headers: bool_option(options, "headers", defaults.headers),
        delimiter: byte_option("delimiter", defaults.delimiter),
        quote: byte_option("quote", defaults.quote),
        escape: options
            .get("escape")
            .and_then(DirectiveValue::as_str)
            .and_then(|s| s.bytes().next()),
        skip_empty_lines: bool_option(options, "skipEmptyLines", defaults.skip_empty_lines),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniffing() {
        assert_eq!(sniff(b"  <a/>"), Format::Xml);
        assert_eq!(sniff(b"{\"a\":1}"), Format::Json);
        assert_eq!(sniff(b"[1,2]"), Format::Json);
        assert_eq!(sniff(b"name,age\nA,1\n"), Format::Csv);
        assert_eq!(sniff(b"name: A\nage: 1\n"), Format::Yaml);
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("yml".parse::<Format>().unwrap(), Format::Yaml);
        assert_eq!("json".parse::<Format>().unwrap(), Format::Json);
        assert!("toml".parse::<Format>().is_err());
    }

    #[test]
    fn test_option_translation() {
        let mut map = OptionsMap::new();
        map.insert("pretty".to_string(), DirectiveValue::Bool(true));
        map.insert("indent".to_string(), DirectiveValue::Int(4));
        let opts = json_options(&map);
        assert!(opts.pretty);
        assert_eq!(opts.indent, 4);

        let mut map = OptionsMap::new();
        map.insert(
            "delimiter".to_string(),
            DirectiveValue::Str(";".to_string()),
        );
        map.insert("headers".to_string(), DirectiveValue::Bool(false));
        let opts = csv_options(&map);
        assert_eq!(opts.delimiter, b';');
        assert!(!opts.headers);
    }

    #[test]
    fn test_xml_namespace_option() {
        let mut inner = OptionsMap::new();
        inner.insert(
            "po".to_string(),
            DirectiveValue::Str("http://example.com/po".to_string()),
        );
        let mut map = OptionsMap::new();
        map.insert("namespaces".to_string(), DirectiveValue::Map(inner));
        let opts = xml_options(&map);
        assert_eq!(
            opts.namespaces.get("po").map(String::as_str),
            Some("http://example.com/po")
        );
    }
}
