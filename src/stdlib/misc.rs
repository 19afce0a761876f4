//! UUIDs, JWT decoding, URL parsing, CSV helpers, XML navigation, debug

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;

use crate::error::{Diagnostic, ErrorKind, Span};
use crate::formats::csv::{self, CsvOptions};
use crate::interpreter::Evaluator;
use crate::udm::{coerce, ObjectBuilder, Udm};

use super::{arg_error, want_str};

/// Version 4 UUID drawn from the evaluator's (seedable) random source
pub fn generate_uuid(ev: &mut Evaluator, _args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let bytes: [u8; 16] = ev.rng.gen();
    let id = uuid::Builder::from_random_bytes(bytes).into_uuid();
    Ok(Udm::Str(id.to_string()))
}

/// Version 7 UUID: 48-bit millisecond timestamp from the run's clock
/// snapshot, version nibble 7, variant bits `10`. A counter in the rand_a
/// field keeps batches monotonic within one millisecond.
pub fn generate_uuid_v7(ev: &mut Evaluator, _args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let millis = ev.now.timestamp_millis().max(0) as u64;
    let (last_millis, counter) = ev.uuid_state;
    let counter = if millis == last_millis {
        (counter + 1) & 0x0FFF
    } else {
        0
    };
    ev.uuid_state = (millis, counter);

    let mut bytes = [0u8; 16];
    bytes[..6].copy_from_slice(&millis.to_be_bytes()[2..8]);
    bytes[6] = 0x70 | ((counter >> 8) as u8 & 0x0F);
    bytes[7] = (counter & 0xFF) as u8;
    let tail: [u8; 8] = ev.rng.gen();
    bytes[8..].copy_from_slice(&tail);
    bytes[8] = (bytes[8] & 0x3F) | 0x80;

    let id = uuid::Uuid::from_bytes(bytes);
    Ok(Udm::Str(id.to_string()))
}

/// Decode-only JWT inspection. The signature is never checked, and the
/// result says so: `verified` is always false.
pub fn decode_jwt(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let token = want_str("decodeJwt", &args[0])?;
    let mut parts = token.split('.');
    let (header, payload, signature) = match (parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s)) if parts.next().is_none() => (h, p, s),
        _ => {
            return Err(arg_error(
                "decodeJwt",
                "a three-part JWT token",
                coerce::unwrap_text(&args[0]),
            ))
        }
    };

    let decode_json = |part: &str, what: &str| -> Result<Udm, Diagnostic> {
        let raw = URL_SAFE_NO_PAD.decode(part).map_err(|_| {
            Diagnostic::new(
                ErrorKind::FunctionArgument,
                format!("`decodeJwt` could not base64-decode the {}", what),
            )
        })?;
        let value: serde_json::Value = serde_json::from_slice(&raw).map_err(|_| {
            Diagnostic::new(
                ErrorKind::FunctionArgument,
                format!("`decodeJwt` found invalid JSON in the {}", what),
            )
        })?;
        Ok(crate::formats::json::value_to_udm(&value))
    };

    let mut builder = ObjectBuilder::new();
    builder.property("header", decode_json(header, "header")?);
    builder.property("payload", decode_json(payload, "payload")?);
    builder.property("signature", Udm::string(signature));
    builder.property("verified", Udm::Bool(false));
    Ok(builder.build())
}

/// Break a URL into its components
pub fn parse_url(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let text = want_str("parseUrl", &args[0])?;
    let parsed = url::Url::parse(&text).map_err(|err| {
        Diagnostic::new(
            ErrorKind::FunctionArgument,
            format!("`parseUrl` received an invalid URL: {}", err),
        )
    })?;
    let mut builder = ObjectBuilder::new();
    builder.property("scheme", Udm::string(parsed.scheme()));
    builder.property(
        "host",
        parsed
            .host_str()
            .map(Udm::string)
            .unwrap_or(Udm::Null),
    );
    builder.property(
        "port",
        parsed
            .port_or_known_default()
            .map(|p| Udm::Int(p as i64))
            .unwrap_or(Udm::Null),
    );
    builder.property("path", Udm::string(parsed.path()));
    builder.property(
        "query",
        parsed.query().map(Udm::string).unwrap_or(Udm::Null),
    );
    builder.property(
        "fragment",
        parsed.fragment().map(Udm::string).unwrap_or(Udm::Null),
    );
    Ok(builder.build())
}

/// `parseCsv(text)` / `parseCsv(text, {headers: false, delimiter: ";"})`
pub fn parse_csv(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let text = want_str("parseCsv", &args[0])?;
    let options = csv_options_from(args.get(1))?;
    csv::parse(text.as_bytes(), &options)
}

pub fn render_csv(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let options = csv_options_from(args.get(1))?;
    let bytes = csv::serialize(&args[0], &options)?;
    String::from_utf8(bytes).map(Udm::Str).map_err(|_| {
        Diagnostic::new(ErrorKind::FormatSerialize, "CSV output was not valid UTF-8")
    })
}

fn csv_options_from(value: Option<&Udm>) -> Result<CsvOptions, Diagnostic> {
    let mut options = CsvOptions::default();
    let Some(Udm::Object(obj)) = value else {
        return Ok(options);
    };
    if let Some(Udm::Bool(headers)) = obj.properties.get("headers") {
        options.headers = *headers;
    }
    if let Some(Udm::Str(delim)) = obj.properties.get("delimiter") {
        if let Some(byte) = delim.bytes().next() {
            options.delimiter = byte;
        }
    }
    if let Some(Udm::Str(quote)) = obj.properties.get("quote") {
        if let Some(byte) = quote.bytes().next() {
            options.quote = byte;
        }
    }
    if let Some(Udm::Str(escape)) = obj.properties.get("escape") {
        options.escape = escape.bytes().next();
    }
    if let Some(Udm::Bool(skip)) = obj.properties.get("skipEmptyLines") {
        options.skip_empty_lines = *skip;
    }
    Ok(options)
}

/// Full hinted element name, e.g. `soap:Body`
pub fn element_name(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    match &args[0] {
        Udm::Object(obj) => Ok(obj.name.as_deref().map(Udm::string).unwrap_or(Udm::Null)),
        other => Err(arg_error("elementName", "an object", other)),
    }
}

/// Element name with any namespace prefix stripped
pub fn local_name(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    match &args[0] {
        Udm::Object(obj) => Ok(obj
            .name
            .as_deref()
            .map(|name| Udm::string(name.rsplit(':').next().unwrap_or(name)))
            .unwrap_or(Udm::Null)),
        other => Err(arg_error("localName", "an object", other)),
    }
}

/// The attribute side-table as an ordinary object
pub fn attributes_of(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    match &args[0] {
        Udm::Object(obj) => {
            let mut builder = ObjectBuilder::new();
            for (key, value) in &obj.attributes {
                builder.property(key.clone(), Udm::string(value.clone()));
            }
            Ok(builder.build())
        }
        other => Err(arg_error("attributesOf", "an object", other)),
    }
}

/// Copy of an object with its element-name hint replaced; lets scripts
/// choose the XML root element name
pub fn with_element_name(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let name = want_str("withElementName", &args[1])?;
    match &args[0] {
        Udm::Object(obj) => {
            let mut renamed = obj.clone();
            renamed.name = Some(name);
            Ok(Udm::Object(renamed))
        }
        other => Err(arg_error("withElementName", "an object", other)),
    }
}

/// Identity with a stderr note; handy in pipelines
pub fn debug(_ev: &mut Evaluator, mut args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let value = args.remove(0);
    eprintln!("[debug] {}", coerce::to_display_string(&value));
    Ok(value)
}

pub fn trace(_ev: &mut Evaluator, mut args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let label = want_str("trace", &args[0])?;
    let value = args.remove(1);
    eprintln!("[trace:{}] {}", label, coerce::to_display_string(&value));
    Ok(value)
}
