//! CSV bridge
//!
//! Parsing with headers on yields an Array of Objects, one per row, with
//! bare numeric and boolean text lifted to typed scalars; with headers off
//! it yields an Array of Arrays. Serialization takes an Array of Objects
//! (or Arrays); the header row is the union of keys in order of first
//! appearance.

use crate::error::{Diagnostic, ErrorKind, Position, Span};
use crate::udm::{coerce, ObjectBuilder, Udm};

#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub headers: bool,
    pub delimiter: u8,
    pub quote: u8,
    /// Escape byte; quote doubling when absent
    pub escape: Option<u8>,
    pub skip_empty_lines: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions {
            headers: true,
            delimiter: b',',
            quote: b'"',
            escape: None,
            skip_empty_lines: true,
        }
    }
}

pub fn parse(bytes: &[u8], options: &CsvOptions) -> Result<Udm, Diagnostic> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(options.headers)
        .delimiter(options.delimiter)
        .quote(options.quote)
        .escape(options.escape)
        .double_quote(options.escape.is_none())
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = if options.headers {
        reader
            .headers()
            .map_err(csv_parse_error)?
            .iter()
            .map(str::to_string)
            .collect()
    } else {
        Vec::new()
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_parse_error)?;
        if options.skip_empty_lines && record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        if options.headers {
            let mut builder = ObjectBuilder::new();
            for (i, header) in headers.iter().enumerate() {
                let field = record.get(i).unwrap_or("");
                builder.property(header.clone(), lift_field(field));
            }
            rows.push(builder.build());
        } else {
            rows.push(Udm::Array(record.iter().map(lift_field).collect()));
        }
    }
    Ok(Udm::Array(rows))
}

pub fn serialize(value: &Udm, options: &CsvOptions) -> Result<Vec<u8>, Diagnostic> {
    let rows = match coerce::unwrap_text(value) {
        Udm::Array(rows) => rows.clone(),
        other => {
            return Err(Diagnostic::new(
                ErrorKind::FormatSerialize,
                format!(
                    "CSV needs an array of objects at the root, got {}",
                    other.type_of()
                ),
            ))
        }
    };

    let mut builder = csv::WriterBuilder::new();
    builder.delimiter(options.delimiter).quote(options.quote);
    if let Some(escape) = options.escape {
        builder.double_quote(false).escape(escape);
    }
    let mut writer = builder.from_writer(Vec::new());

    // Array-of-arrays writes plain records with no header row
    if rows.iter().all(|row| matches!(row, Udm::Array(_))) && !rows.is_empty() {
        for row in &rows {
            let fields: Vec<String> = match row {
                Udm::Array(items) => items.iter().map(coerce::to_display_string).collect(),
                _ => unreachable!("shape checked above"),
            };
            writer.write_record(&fields).map_err(csv_serialize_error)?;
        }
        return finish(writer);
    }

    // Header order: union of keys by first appearance
    let mut headers: Vec<String> = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        let Udm::Object(obj) = row else {
            return Err(Diagnostic::new(
                ErrorKind::FormatSerialize,
                format!("CSV needs objects for every row; row at $[{}] is {}", index, row.type_of()),
            ));
        };
        for key in obj.properties.keys() {
            if !headers.iter().any(|h| h == key) {
                headers.push(key.clone());
            }
        }
    }

    if options.headers {
        writer.write_record(&headers).map_err(csv_serialize_error)?;
    }
    for row in &rows {
        let obj = row.as_object().expect("shape checked above");
        let fields: Vec<String> = headers
            .iter()
            .map(|header| {
                obj.properties
                    .get(header)
                    .map(coerce::to_display_string)
                    .unwrap_or_default()
            })
            .collect();
        writer.write_record(&fields).map_err(csv_serialize_error)?;
    }
    finish(writer)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, Diagnostic> {
    writer.into_inner().map_err(|err| {
        Diagnostic::new(
            ErrorKind::FormatSerialize,
            format!("CSV serialization failed: {}", err),
        )
    })
}

/// Bare numeric and boolean text lifts to typed scalars; everything else
/// stays a string
fn lift_field(field: &str) -> Udm {
    match field {
        "true" => return Udm::Bool(true),
        "false" => return Udm::Bool(false),
        _ => {}
    }
    match coerce::parse_number(field) {
        Some(number) => number,
        None => Udm::string(field),
    }
}

fn csv_parse_error(err: csv::Error) -> Diagnostic {
    let mut diag = Diagnostic::new(ErrorKind::FormatParse, format!("invalid CSV: {}", err));
    if let Some(position) = err.position() {
        diag = diag.with_span(Span::point(Position {
            line: position.line().saturating_sub(1) as usize,
            column: 0,
            offset: position.byte() as usize,
        }));
    }
    diag
}

fn csv_serialize_error(err: csv::Error) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::FormatSerialize,
        format!("CSV serialization failed: {}", err),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> CsvOptions {
        CsvOptions::default()
    }

    #[test]
    fn test_parse_with_headers() {
        let parsed = parse(b"name,age\nA,1\nB,2\n", &options()).unwrap();
        let rows = parsed.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        let first = rows[0].as_object().unwrap();
        assert_eq!(first.properties.get("name"), Some(&Udm::string("A")));
        assert_eq!(first.properties.get("age"), Some(&Udm::Int(1)));
    }

    #[test]
    fn test_parse_without_headers() {
        let opts = CsvOptions {
            headers: false,
            ..CsvOptions::default()
        };
        let parsed = parse(b"1,a\n2,b\n", &opts).unwrap();
        let rows = parsed.as_array().unwrap();
        assert_eq!(
            rows[0],
            Udm::Array(vec![Udm::Int(1), Udm::string("a")])
        );
    }

    #[test]
    fn test_custom_delimiter() {
        let opts = CsvOptions {
            delimiter: b';',
            ..CsvOptions::default()
        };
        let parsed = parse(b"a;b\n1;2\n", &opts).unwrap();
        let rows = parsed.as_array().unwrap();
        let first = rows[0].as_object().unwrap();
        assert_eq!(first.properties.get("b"), Some(&Udm::Int(2)));
    }

    #[test]
    fn test_skip_empty_lines() {
        let parsed = parse(b"a,b\n1,2\n,\n3,4\n", &options()).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_serialize_header_union_in_first_appearance_order() {
        let mut first = ObjectBuilder::new();
        first.property("name", Udm::string("A"));
        first.property("age", Udm::Int(1));
        let mut second = ObjectBuilder::new();
        second.property("name", Udm::string("B"));
        second.property("city", Udm::string("Oslo"));
        let rows = Udm::Array(vec![first.build(), second.build()]);

        let rendered = String::from_utf8(serialize(&rows, &options()).unwrap()).unwrap();
        assert_eq!(rendered, "name,age,city\nA,1,\nB,,Oslo\n");
    }

    #[test]
    fn test_escape_option_instead_of_quote_doubling() {
        let opts = CsvOptions {
            escape: Some(b'\\'),
            ..CsvOptions::default()
        };
        let parsed = parse(b"note\n\"a \\\"quoted\\\" field\"\n", &opts).unwrap();
        let rows = parsed.as_array().unwrap();
        let first = rows[0].as_object().unwrap();
        assert_eq!(
            first.properties.get("note"),
            Some(&Udm::string("a \"quoted\" field"))
        );
    }

    #[test]
    fn test_fields_with_delimiters_are_quoted() {
        let mut row = ObjectBuilder::new();
        row.property("note", Udm::string("a,b \"quoted\""));
        let rows = Udm::Array(vec![row.build()]);
        let rendered = String::from_utf8(serialize(&rows, &options()).unwrap()).unwrap();
        assert_eq!(rendered, "note\n\"a,b \"\"quoted\"\"\"\n");
    }

    #[test]
    fn test_serialize_rejects_scalars() {
        let err = serialize(&Udm::Int(1), &options()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FormatSerialize);
    }

    #[test]
    fn test_round_trip() {
        let source = b"name,qty\nwidget,2\ngadget,5\n";
        let parsed = parse(source, &options()).unwrap();
        let rendered = serialize(&parsed, &options()).unwrap();
        assert_eq!(rendered, source.to_vec());
    }
}
