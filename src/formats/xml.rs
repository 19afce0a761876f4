//! XML bridge
//!
//! Parsing walks quick-xml's event stream and lifts each element into an
//! Object: XML attributes into the attribute side-table, the element's own
//! text into the reserved text property, the element name into the name
//! hint. Repeated sibling elements promote to an array-valued property.
//! Serialization reverses all of that; every value-to-text conversion goes
//! through the shared display coercion, which is what keeps integer-valued
//! attributes free of trailing `.0`.

use indexmap::IndexMap;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Diagnostic, ErrorKind, Position, Span};
use crate::udm::{coerce, ObjectBuilder, Udm, TEXT_PROPERTY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyStyle {
    #[default]
    SelfClosing,
    Explicit,
    Nil,
    Omit,
}

impl EmptyStyle {
    pub fn from_name(name: &str) -> Option<EmptyStyle> {
        match name {
            "self-closing" => Some(EmptyStyle::SelfClosing),
            "explicit" => Some(EmptyStyle::Explicit),
            "nil" => Some(EmptyStyle::Nil),
            "omit" => Some(EmptyStyle::Omit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct XmlOptions {
    /// Emit the `<?xml ... ?>` declaration
    pub declaration: bool,
    pub empty_style: EmptyStyle,
    /// prefix → URI declarations injected on the root element
    pub namespaces: IndexMap<String, String>,
    /// Wrap the document in a SOAP 1.1 envelope
    pub soap_envelope: bool,
    /// Root element name when the value does not carry one
    pub root_name: Option<String>,
}

impl Default for XmlOptions {
    fn default() -> Self {
        XmlOptions {
            declaration: true,
            empty_style: EmptyStyle::default(),
            namespaces: IndexMap::new(),
            soap_envelope: false,
            root_name: None,
        }
    }
}

const SOAP_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

// ----------------------------------------------------------------------
// Parsing
// ----------------------------------------------------------------------

struct PendingElement {
    name: String,
    builder: ObjectBuilder,
    texts: Vec<String>,
}

impl PendingElement {
    fn new(name: String) -> Self {
        PendingElement {
            builder: ObjectBuilder::named(name.clone()),
            name,
            texts: Vec::new(),
        }
    }

    fn finish(mut self) -> (String, Udm) {
        match self.texts.len() {
            0 => {}
            1 => {
                self.builder
                    .property(TEXT_PROPERTY, Udm::string(self.texts.remove(0)));
            }
            // Mixed content keeps its interleaved fragments as an array
            _ => {
                self.builder.property(
                    TEXT_PROPERTY,
                    Udm::Array(self.texts.drain(..).map(Udm::string).collect()),
                );
            }
        }
        (self.name, self.builder.build())
    }
}

/// Parse an XML document into a wrapper object holding the root element
/// under its name: `<Order/>` becomes `{Order: {...}}`.
pub fn parse(bytes: &[u8], _options: &XmlOptions) -> Result<Udm, Diagnostic> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| Diagnostic::new(ErrorKind::FormatParse, "XML input is not valid UTF-8"))?;
    if text.trim().is_empty() {
        return Err(Diagnostic::new(
            ErrorKind::FormatParse,
            "empty input is not valid XML",
        ));
    }

    let mut reader = Reader::from_str(text);
    let mut stack: Vec<PendingElement> = vec![PendingElement::new(String::new())];

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let mut pending = PendingElement::new(decode_name(start.name().as_ref()));
                read_attributes(&start, &mut pending.builder, text, &reader)?;
                stack.push(pending);
            }
            Ok(Event::Empty(start)) => {
                let mut pending = PendingElement::new(decode_name(start.name().as_ref()));
                read_attributes(&start, &mut pending.builder, text, &reader)?;
                let (name, element) = pending.finish();
                attach(&mut stack, name, element);
            }
            Ok(Event::End(_)) => {
                let pending = stack.pop().expect("well-formed XML closes what it opened");
                let (name, element) = pending.finish();
                attach(&mut stack, name, element);
            }
            Ok(Event::Text(t)) => {
                let fragment = t.unescape().map_err(|err| {
                    parse_error(format!("invalid text content: {}", err), text, &reader)
                })?;
                let trimmed = fragment.trim();
                if !trimmed.is_empty() {
                    if let Some(top) = stack.last_mut() {
                        top.texts.push(trimmed.to_string());
                    }
                }
            }
            Ok(Event::CData(cdata)) => {
                let fragment = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                if let Some(top) = stack.last_mut() {
                    top.texts.push(fragment);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {} // declaration, comments, processing instructions
            Err(err) => {
                return Err(parse_error(format!("invalid XML: {}", err), text, &reader));
            }
        }
    }

    if stack.len() != 1 {
        return Err(Diagnostic::new(
            ErrorKind::FormatParse,
            "XML document ended with unclosed elements",
        ));
    }
    let (_, wrapper) = stack.pop().unwrap().finish();
    match &wrapper {
        Udm::Object(obj) if !obj.properties.is_empty() => Ok(strip_name(wrapper)),
        _ => Err(Diagnostic::new(
            ErrorKind::FormatParse,
            "XML document has no root element",
        )),
    }
}

/// The synthetic wrapper itself carries no element name
fn strip_name(value: Udm) -> Udm {
    match value {
        Udm::Object(mut obj) => {
            obj.name = None;
            Udm::Object(obj)
        }
        other => other,
    }
}

fn attach(stack: &mut [PendingElement], name: String, element: Udm) {
    if let Some(parent) = stack.last_mut() {
        parent.builder.append_property(name, element);
    }
}

fn decode_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn read_attributes(
    start: &quick_xml::events::BytesStart<'_>,
    builder: &mut ObjectBuilder,
    text: &str,
    reader: &Reader<&[u8]>,
) -> Result<(), Diagnostic> {
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| {
            parse_error(format!("invalid attribute: {}", err), text, reader)
        })?;
        let key = decode_name(attribute.key.as_ref());
        let value = attribute.unescape_value().map_err(|err| {
            parse_error(format!("invalid attribute value: {}", err), text, reader)
        })?;
        builder.attribute(key, value.into_owned());
    }
    Ok(())
}

fn parse_error(message: String, text: &str, reader: &Reader<&[u8]>) -> Diagnostic {
    let offset = reader.buffer_position() as usize;
    let consumed = &text[..offset.min(text.len())];
    let line = consumed.matches('\n').count();
    let column = consumed.rsplit('\n').next().map(str::len).unwrap_or(0);
    Diagnostic::new(ErrorKind::FormatParse, message).with_span(Span::point(Position {
        line,
        column,
        offset,
    }))
}

// ----------------------------------------------------------------------
// Serialization
// ----------------------------------------------------------------------

pub fn serialize(value: &Udm, options: &XmlOptions) -> Result<Vec<u8>, Diagnostic> {
    let mut out = String::new();
    if options.declaration {
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
    }

    let (root_name, root_value) = pick_root(value, options);

    if options.soap_envelope {
        out.push_str("<soap:Envelope xmlns:soap=\"");
        out.push_str(SOAP_NS);
        out.push_str("\"><soap:Body>");
        write_element(&mut out, &root_name, root_value, options, false)?;
        out.push_str("</soap:Body></soap:Envelope>");
    } else {
        write_element(&mut out, &root_name, root_value, options, true)?;
    }
    Ok(out.into_bytes())
}

/// Root selection: an element name hint wins; otherwise a single
/// object-valued property names the root; otherwise the configured or
/// fallback wrapper name.
fn pick_root<'v>(value: &'v Udm, options: &XmlOptions) -> (String, &'v Udm) {
    if let Udm::Object(obj) = value {
        if let Some(name) = &obj.name {
            return (name.clone(), value);
        }
        if obj.properties.len() == 1 && obj.attributes.is_empty() {
            let (key, inner) = obj.properties.first().expect("length checked");
            if matches!(inner, Udm::Object(_)) {
                return (key.clone(), inner);
            }
        }
    }
    let name = options
        .root_name
        .clone()
        .unwrap_or_else(|| "root".to_string());
    (name, value)
}

fn write_element(
    out: &mut String,
    name: &str,
    value: &Udm,
    options: &XmlOptions,
    is_root: bool,
) -> Result<(), Diagnostic> {
    // Repeated siblings for array-valued properties
    if let Udm::Array(items) = value {
        for item in items {
            write_element(out, name, item, options, is_root)?;
        }
        return Ok(());
    }

    match value {
        Udm::Object(obj) => {
            let mut open = String::new();
            open.push('<');
            open.push_str(name);
            if is_root {
                for (prefix, uri) in &options.namespaces {
                    open.push_str(&format!(" xmlns:{}=\"{}\"", prefix, escape_attr(uri)));
                }
                if options.empty_style == EmptyStyle::Nil {
                    open.push_str(&format!(" xmlns:xsi=\"{}\"", XSI_NS));
                }
            }
            for (key, attr) in &obj.attributes {
                open.push_str(&format!(" {}=\"{}\"", key, escape_attr(attr)));
            }

            let mut body = String::new();
            for (key, child) in &obj.properties {
                if key == TEXT_PROPERTY {
                    match child {
                        Udm::Array(fragments) => {
                            for fragment in fragments {
                                body.push_str(&escape_text(&coerce::to_display_string(fragment)));
                            }
                        }
                        other => body.push_str(&escape_text(&coerce::to_display_string(other))),
                    }
                } else {
                    write_element(&mut body, key, child, options, false)?;
                }
            }

            if body.is_empty() {
                write_empty(out, &open, name, options, obj.attributes.is_empty());
            } else {
                out.push_str(&open);
                out.push('>');
                out.push_str(&body);
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
        }
        Udm::Null => {
            let open = format!("<{}", name);
            write_empty(out, &open, name, options, true);
        }
        Udm::Lambda(_) => {
            return Err(Diagnostic::new(
                ErrorKind::FormatSerialize,
                format!("XML cannot represent a lambda at element `{}`", name),
            ));
        }
        scalar => {
            let text = coerce::to_display_string(scalar);
            if text.is_empty() {
                let open = format!("<{}", name);
                write_empty(out, &open, name, options, true);
            } else {
                out.push('<');
                out.push_str(name);
                out.push('>');
                out.push_str(&escape_text(&text));
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
        }
    }
    Ok(())
}

fn write_empty(out: &mut String, open: &str, name: &str, options: &XmlOptions, omittable: bool) {
    match options.empty_style {
        EmptyStyle::SelfClosing => {
            out.push_str(open);
            out.push_str("/>");
        }
        EmptyStyle::Explicit => {
            out.push_str(open);
            out.push_str("></");
            out.push_str(name);
            out.push('>');
        }
        EmptyStyle::Nil => {
            out.push_str(open);
            out.push_str(" xsi:nil=\"true\"/>");
        }
        EmptyStyle::Omit => {
            // Attribute-bearing elements still matter; drop only truly
            // empty ones
            if !omittable {
                out.push_str(open);
                out.push_str("/>");
            }
        }
    }
}

/// XML 1.0 text escaping
fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

/// XML 1.0 attribute escaping, quotes included
fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> XmlOptions {
        XmlOptions {
            declaration: false,
            ..XmlOptions::default()
        }
    }

    fn render(value: &Udm, options: &XmlOptions) -> String {
        String::from_utf8(serialize(value, options).unwrap()).unwrap()
    }

    #[test]
    fn test_parse_attributes_and_text() {
        let parsed = parse(br#"<Order id="A"><Qty>2</Qty></Order>"#, &options()).unwrap();
        let root = parsed.as_object().unwrap();
        let order = root.properties.get("Order").unwrap().as_object().unwrap();
        assert_eq!(order.name.as_deref(), Some("Order"));
        assert_eq!(order.attributes.get("id").map(String::as_str), Some("A"));
        let qty = order.properties.get("Qty").unwrap();
        assert_eq!(coerce::unwrap_text(qty), &Udm::string("2"));
    }

    #[test]
    fn test_repeated_elements_promote_to_array() {
        let parsed = parse(
            b"<Order><item>a</item><item>b</item><item>c</item></Order>",
            &options(),
        )
        .unwrap();
        let root = parsed.as_object().unwrap();
        let order = root.properties.get("Order").unwrap().as_object().unwrap();
        match order.properties.get("item") {
            Some(Udm::Array(items)) => assert_eq!(items.len(), 3),
            other => panic!("expected an array, got {:?}", other),
        }
    }

    #[test]
    fn test_mixed_content_keeps_fragments() {
        let parsed = parse(b"<p>before<b>bold</b>after</p>", &options()).unwrap();
        let root = parsed.as_object().unwrap();
        let p = root.properties.get("p").unwrap().as_object().unwrap();
        match p.properties.get(TEXT_PROPERTY) {
            Some(Udm::Array(fragments)) => {
                assert_eq!(fragments.len(), 2);
                assert_eq!(fragments[0], Udm::string("before"));
            }
            other => panic!("expected fragment array, got {:?}", other),
        }
    }

    #[test]
    fn test_namespace_prefixes_preserved() {
        let parsed = parse(
            br#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body/></soap:Envelope>"#,
            &options(),
        )
        .unwrap();
        let root = parsed.as_object().unwrap();
        assert!(root.properties.contains_key("soap:Envelope"));
    }

    #[test]
    fn test_integer_attribute_fidelity() {
        // The historical trailing-`.0` bug: a float-valued attribute that
        // is a whole number must serialize in integer form
        let mut boxed = ObjectBuilder::named("Box");
        boxed.attribute("q", coerce::to_display_string(&Udm::Float(42.0)));
        let rendered = render(&boxed.build(), &options());
        assert_eq!(rendered, r#"<Box q="42"/>"#);

        let mut fractional = ObjectBuilder::named("Box");
        fractional.attribute("q", coerce::to_display_string(&Udm::Float(42.5)));
        assert_eq!(render(&fractional.build(), &options()), r#"<Box q="42.5"/>"#);
    }

    #[test]
    fn test_escaping() {
        let mut element = ObjectBuilder::named("m");
        element.attribute("a", "x\"y<z&'");
        element.property(TEXT_PROPERTY, Udm::string("a < b & c > d"));
        let rendered = render(&element.build(), &options());
        assert_eq!(
            rendered,
            r#"<m a="x&quot;y&lt;z&amp;&apos;">a &lt; b &amp; c &gt; d</m>"#
        );
    }

    #[test]
    fn test_empty_element_styles() {
        let element = ObjectBuilder::named("e").build();
        let style = |empty_style| XmlOptions {
            declaration: false,
            empty_style,
            ..XmlOptions::default()
        };
        assert_eq!(render(&element, &style(EmptyStyle::SelfClosing)), "<e/>");
        assert_eq!(render(&element, &style(EmptyStyle::Explicit)), "<e></e>");
        assert_eq!(
            render(&element, &style(EmptyStyle::Nil)),
            format!(r#"<e xmlns:xsi="{}" xsi:nil="true"/>"#, XSI_NS)
        );
    }

    #[test]
    fn test_namespace_injection() {
        let mut opts = options();
        opts.namespaces
            .insert("po".to_string(), "http://example.com/po".to_string());
        let element = ObjectBuilder::named("po:Order").build();
        assert_eq!(
            render(&element, &opts),
            r#"<po:Order xmlns:po="http://example.com/po"/>"#
        );
    }

    #[test]
    fn test_soap_envelope_emission() {
        let mut opts = options();
        opts.soap_envelope = true;
        let mut element = ObjectBuilder::named("Ping");
        element.property(TEXT_PROPERTY, Udm::string("ok"));
        let rendered = render(&element.build(), &opts);
        assert!(rendered.starts_with("<soap:Envelope xmlns:soap="));
        assert!(rendered.contains("<soap:Body><Ping>ok</Ping></soap:Body>"));
    }

    #[test]
    fn test_round_trip() {
        let source = br#"<Order id="A"><Qty unit="kg">2</Qty><note/></Order>"#;
        let parsed = parse(source, &options()).unwrap();
        let rendered = serialize(&parsed, &options()).unwrap();
        let reparsed = parse(&rendered, &options()).unwrap();
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn test_wrapper_root_for_plain_objects() {
        let mut plain = ObjectBuilder::new();
        plain.property("a", Udm::Int(1));
        plain.property("b", Udm::Int(2));
        let rendered = render(&plain.build(), &options());
        assert_eq!(rendered, "<root><a>1</a><b>2</b></root>");
    }

    #[test]
    fn test_single_object_property_names_root() {
        let mut inner = ObjectBuilder::new();
        inner.attribute("q", "42");
        let mut wrapper = ObjectBuilder::new();
        wrapper.property("Box", inner.build());
        let rendered = render(&wrapper.build(), &options());
        assert_eq!(rendered, r#"<Box q="42"/>"#);
    }

    #[test]
    fn test_malformed_xml_carries_position() {
        let err = parse(b"<a><b></a>", &options()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FormatParse);
        assert!(err.span.is_some());
    }
}
