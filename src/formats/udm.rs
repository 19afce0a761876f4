//! UDM text format
//!
//! A full-fidelity serialization of UDM used for fixtures and
//! inter-runtime diffing. Everything the engine can produce except lambdas
//! round-trips exactly: `parse(serialize(u)) == u`. The syntax reuses the
//! language's own token grammar; object keys are always quoted, the name
//! hint appears as `$name`, attributes as `@"key"`, metadata as `$meta`.
//!
//! ```text
//! {$name: "Order", @"id": "A1", "Qty": {$name: "Qty", "_text": "2"}}
//! ```

use crate::error::{Diagnostic, ErrorKind};
use crate::lexer::{tokenize, Token, TokenKind};
use crate::udm::{ObjectBuilder, Udm};

pub fn serialize(value: &Udm) -> Result<Vec<u8>, Diagnostic> {
    let mut out = String::new();
    write_value(value, &mut out)?;
    Ok(out.into_bytes())
}

pub fn parse(bytes: &[u8]) -> Result<Udm, Diagnostic> {
    let text = std::str::from_utf8(bytes).map_err(|_| {
        Diagnostic::new(ErrorKind::FormatParse, "UDM input is not valid UTF-8")
    })?;
    let tokens = tokenize(text).map_err(|diag| retag(diag))?;
    let mut parser = UdmParser { tokens, pos: 0 };
    let value = parser.value()?;
    parser.expect_eof()?;
    Ok(value)
}

fn retag(mut diag: Diagnostic) -> Diagnostic {
    diag.kind = ErrorKind::FormatParse;
    diag
}

// ----------------------------------------------------------------------
// Writer
// ----------------------------------------------------------------------

fn write_value(value: &Udm, out: &mut String) -> Result<(), Diagnostic> {
    match value {
        Udm::Null => out.push_str("null"),
        Udm::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Udm::Int(n) => out.push_str(&n.to_string()),
        Udm::Float(n) => write_float(*n, out),
        Udm::Str(s) => write_string(s, out),
        Udm::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(item, out)?;
            }
            out.push(']');
        }
        Udm::Object(obj) => {
            out.push('{');
            let mut first = true;
            let mut sep = |out: &mut String| {
                if first {
                    first = false;
                } else {
                    out.push_str(", ");
                }
            };
            if let Some(name) = &obj.name {
                sep(out);
                out.push_str("$name: ");
                write_string(name, out);
            }
            for (key, attr) in &obj.attributes {
                sep(out);
                out.push('@');
                write_string(key, out);
                out.push_str(": ");
                write_string(attr, out);
            }
            if !obj.metadata.is_empty() {
                sep(out);
                out.push_str("$meta: {");
                for (i, (key, item)) in obj.metadata.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    write_string(key, out);
                    out.push_str(": ");
                    write_string(item, out);
                }
                out.push('}');
            }
            for (key, item) in &obj.properties {
                sep(out);
                write_string(key, out);
                out.push_str(": ");
                write_value(item, out)?;
            }
            out.push('}');
        }
        Udm::DateTime(dt) => {
            out.push_str("datetime(");
            write_string(&dt.to_rfc3339(), out);
            out.push(')');
        }
        Udm::Date(d) => {
            out.push_str("date(");
            write_string(&d.format("%Y-%m-%d").to_string(), out);
            out.push(')');
        }
        Udm::LocalDateTime(dt) => {
            out.push_str("localdatetime(");
            write_string(&dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(), out);
            out.push(')');
        }
        Udm::Time(t) => {
            out.push_str("time(");
            write_string(&t.format("%H:%M:%S%.f").to_string(), out);
            out.push(')');
        }
        Udm::Binary { bytes, encoding } => {
            out.push_str("binary(");
            write_string(&hex::encode(bytes), out);
            if let Some(encoding) = encoding {
                out.push_str(", ");
                write_string(encoding, out);
            }
            out.push(')');
        }
        Udm::Lambda(_) => {
            return Err(Diagnostic::new(
                ErrorKind::FormatSerialize,
                "the UDM text format cannot represent a lambda",
            ))
        }
    }
    Ok(())
}

/// Floats always carry a decimal point or a tag, so the integer/float
/// distinction survives reparsing
fn write_float(n: f64, out: &mut String) {
    if n.is_nan() {
        out.push_str("float(\"nan\")");
    } else if n.is_infinite() {
        out.push_str(if n > 0.0 {
            "float(\"inf\")"
        } else {
            "float(\"-inf\")"
        });
    } else if n.fract() == 0.0 {
        out.push_str(&format!("{:.1}", n));
    } else {
        out.push_str(&format!("{}", n));
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            ch if (ch as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", ch as u32)),
            ch => out.push(ch),
        }
    }
    out.push('"');
}

// ----------------------------------------------------------------------
// Reader
// ----------------------------------------------------------------------

struct UdmParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl UdmParser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), Diagnostic> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {}, found {}",
                what,
                self.peek().kind.describe()
            )))
        }
    }

    fn expect_eof(&mut self) -> Result<(), Diagnostic> {
        self.expect(&TokenKind::Eof, "end of input")
    }

    fn error(&self, message: String) -> Diagnostic {
        Diagnostic::new(ErrorKind::FormatParse, message).with_span(self.peek().span)
    }

    fn string(&mut self, what: &str) -> Result<String, Diagnostic> {
        match self.peek().kind.clone() {
            TokenKind::Str(s) => {
                self.advance();
                Ok(s)
            }
            other => Err(self.error(format!("expected {}, found {}", what, other.describe()))),
        }
    }

    fn value(&mut self) -> Result<Udm, Diagnostic> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Null => {
                self.advance();
                Ok(Udm::Null)
            }
            TokenKind::True => {
                self.advance();
                Ok(Udm::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Udm::Bool(false))
            }
            TokenKind::Int(n) => {
                self.advance();
                Ok(Udm::Int(n))
            }
            TokenKind::Float(n) => {
                self.advance();
                Ok(Udm::Float(n))
            }
            TokenKind::Str(ref s) => {
                let s = s.clone();
                self.advance();
                Ok(Udm::Str(s))
            }
            TokenKind::Minus => {
                self.advance();
                match self.advance().kind {
                    TokenKind::Int(n) => Ok(Udm::Int(-n)),
                    TokenKind::Float(n) => Ok(Udm::Float(-n)),
                    other => Err(self.error(format!(
                        "expected a number after `-`, found {}",
                        other.describe()
                    ))),
                }
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                while !matches!(self.peek().kind, TokenKind::RBracket | TokenKind::Eof) {
                    items.push(self.value()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RBracket, "`]`")?;
                Ok(Udm::Array(items))
            }
            TokenKind::LBrace => self.object(),
            TokenKind::Ident(ref tag) => {
                let tag = tag.clone();
                self.advance();
                self.tagged(&tag)
            }
            other => Err(self.error(format!("expected a value, found {}", other.describe()))),
        }
    }

    fn object(&mut self) -> Result<Udm, Diagnostic> {
        self.expect(&TokenKind::LBrace, "`{`")?;
        let mut builder = ObjectBuilder::new();
        loop {
            match self.peek().kind.clone() {
                TokenKind::RBrace | TokenKind::Eof => break,
                TokenKind::Dollar => {
                    self.advance();
                    match self.advance().kind {
                        TokenKind::Ident(marker) if marker == "name" => {
                            self.expect(&TokenKind::Colon, "`:`")?;
                            let name = self.string("the element name")?;
                            builder.set_name(name);
                        }
                        TokenKind::Ident(marker) if marker == "meta" => {
                            self.expect(&TokenKind::Colon, "`:`")?;
                            self.expect(&TokenKind::LBrace, "`{`")?;
                            while !matches!(self.peek().kind, TokenKind::RBrace | TokenKind::Eof) {
                                let key = self.string("a metadata key")?;
                                self.expect(&TokenKind::Colon, "`:`")?;
                                let item = self.string("a metadata value")?;
                                builder.metadata(key, item);
                                if !self.eat(&TokenKind::Comma) {
                                    break;
                                }
                            }
                            self.expect(&TokenKind::RBrace, "`}`")?;
                        }
                        other => {
                            return Err(self.error(format!(
                                "expected `$name` or `$meta`, found {}",
                                other.describe()
                            )))
                        }
                    }
                }
                TokenKind::At => {
                    self.advance();
                    let key = self.string("an attribute key")?;
                    self.expect(&TokenKind::Colon, "`:`")?;
                    let attr = self.string("an attribute value")?;
                    builder.attribute(key, attr);
                }
                _ => {
                    let key = self.string("a property key")?;
                    self.expect(&TokenKind::Colon, "`:`")?;
                    let item = self.value()?;
                    builder.property(key, item);
                }
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace, "`}`")?;
        Ok(builder.build())
    }

    fn tagged(&mut self, tag: &str) -> Result<Udm, Diagnostic> {
        self.expect(&TokenKind::LParen, "`(`")?;
        let text = self.string("a tagged literal")?;
        let value = match tag {
            "datetime" => chrono::DateTime::parse_from_rfc3339(&text)
                .map(Udm::DateTime)
                .map_err(|err| self.error(format!("invalid datetime literal: {}", err)))?,
            "date" => chrono::NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                .map(Udm::Date)
                .map_err(|err| self.error(format!("invalid date literal: {}", err)))?,
            "localdatetime" => {
                chrono::NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(Udm::LocalDateTime)
                    .map_err(|err| self.error(format!("invalid localdatetime literal: {}", err)))?
            }
            "time" => chrono::NaiveTime::parse_from_str(&text, "%H:%M:%S%.f")
                .map(Udm::Time)
                .map_err(|err| self.error(format!("invalid time literal: {}", err)))?,
            "float" => match text.as_str() {
                "nan" => Udm::Float(f64::NAN),
                "inf" => Udm::Float(f64::INFINITY),
                "-inf" => Udm::Float(f64::NEG_INFINITY),
                other => {
                    return Err(self.error(format!("unknown float tag value `{}`", other)))
                }
            },
            "binary" => {
                let bytes = hex::decode(&text)
                    .map_err(|err| self.error(format!("invalid binary hex: {}", err)))?;
                let encoding = if self.eat(&TokenKind::Comma) {
                    Some(self.string("an encoding name")?)
                } else {
                    None
                };
                self.expect(&TokenKind::RParen, "`)`")?;
                return Ok(Udm::Binary { bytes, encoding });
            }
            other => return Err(self.error(format!("unknown value tag `{}`", other))),
        };
        self.expect(&TokenKind::RParen, "`)`")?;
        Ok(value)
    }
}
