//! Character-precise scanner for UTL-X source text
//!
//! Walks a char vector with line/column/byte bookkeeping and produces the
//! spanned token stream the parser consumes. Whitespace and comments are
//! skipped here and never become tokens.

use crate::error::{Diagnostic, ErrorKind, Position, Span};

use super::tokens::{Token, TokenKind};

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    offset: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            line: 0,
            column: 0,
            offset: 0,
        }
    }

    /// Tokenize the whole input. Stops at the first malformed lexeme.
    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            if self.is_at_end() {
                let here = self.current_position();
                tokens.push(Token::new(TokenKind::Eof, Span::point(here)));
                return Ok(tokens);
            }
            let token = self.next_token()?;
            tokens.push(token);
        }
    }

    fn next_token(&mut self) -> Result<Token, Diagnostic> {
        let start = self.current_position();
        let ch = self.peek().unwrap();

        // `---` separator at the start of a line
        if ch == '-' && self.column == 0 && self.lookahead_is("---") {
            self.advance();
            self.advance();
            self.advance();
            return Ok(self.spanned(TokenKind::Separator, start));
        }

        if ch == '%' && self.lookahead_is("%utlx") {
            return self.read_version_directive();
        }

        if ch.is_ascii_digit() {
            return self.read_number();
        }

        if ch == '"' || ch == '\'' {
            return self.read_string(ch);
        }

        if ch.is_alphabetic() || ch == '_' {
            return Ok(self.read_identifier());
        }

        self.read_operator()
    }

    fn read_version_directive(&mut self) -> Result<Token, Diagnostic> {
        let start = self.current_position();
        for _ in 0.."%utlx".len() {
            self.advance();
        }
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.advance();
        }
        let major = self.read_version_component(start)?;
        if self.peek() != Some('.') {
            return Err(self.error_at(start, "malformed version directive, expected `%utlx <major>.<minor>`"));
        }
        self.advance();
        let minor = self.read_version_component(start)?;
        Ok(self.spanned(TokenKind::Version { major, minor }, start))
    }

    fn read_version_component(&mut self, start: Position) -> Result<u32, Diagnostic> {
        let mut digits = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        digits
            .parse::<u32>()
            .map_err(|_| self.error_at(start, "malformed version directive, expected `%utlx <major>.<minor>`"))
    }

    fn read_number(&mut self) -> Result<Token, Diagnostic> {
        let start = self.current_position();
        let mut text = String::new();
        let mut is_float = false;

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // A dot begins a fraction only when a digit follows; `1.foo` stays
        // an integer followed by member access
        if self.peek() == Some('.') && self.peek_at(1).map(|c| c.is_ascii_digit()).unwrap_or(false) {
            is_float = true;
            text.push('.');
            self.advance();
            while let Some(ch) = self.peek() {
                if ch.is_ascii_digit() {
                    text.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
        }

        if matches!(self.peek(), Some('e') | Some('E')) {
            let mut lookahead = 1;
            if matches!(self.peek_at(1), Some('+') | Some('-')) {
                lookahead = 2;
            }
            if self.peek_at(lookahead).map(|c| c.is_ascii_digit()).unwrap_or(false) {
                is_float = true;
                for _ in 0..lookahead {
                    text.push(self.peek().unwrap());
                    self.advance();
                }
                while let Some(ch) = self.peek() {
                    if ch.is_ascii_digit() {
                        text.push(ch);
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
        }

        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| self.error_at(start, format!("malformed number `{}`", text)))?;
            Ok(self.spanned(TokenKind::Float(value), start))
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| self.error_at(start, format!("integer literal `{}` out of range", text)))?;
            Ok(self.spanned(TokenKind::Int(value), start))
        }
    }

    fn read_string(&mut self, quote: char) -> Result<Token, Diagnostic> {
        let start = self.current_position();
        self.advance();
        let mut value = String::new();

        loop {
            match self.peek() {
                None => return Err(self.error_at(start, "unterminated string literal")),
                Some('\n') => return Err(self.error_at(start, "unterminated string literal")),
                Some(ch) if ch == quote => {
                    self.advance();
                    return Ok(self.spanned(TokenKind::Str(value), start));
                }
                Some('\\') => {
                    self.advance();
                    let escape = self
                        .peek()
                        .ok_or_else(|| self.error_at(start, "unterminated string literal"))?;
                    self.advance();
                    match escape {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '"' => value.push('"'),
                        '\'' => value.push('\''),
                        '\\' => value.push('\\'),
                        'u' => {
                            let mut code = 0u32;
                            for _ in 0..4 {
                                let digit = self
                                    .peek()
                                    .and_then(|c| c.to_digit(16))
                                    .ok_or_else(|| {
                                        self.error_at(start, "malformed \\uXXXX escape, expected 4 hex digits")
                                    })?;
                                code = code * 16 + digit;
                                self.advance();
                            }
                            let decoded = char::from_u32(code).ok_or_else(|| {
                                self.error_at(start, format!("\\u{:04X} is not a valid character", code))
                            })?;
                            value.push(decoded);
                        }
                        other => {
                            return Err(
                                self.error_at(start, format!("unknown escape sequence `\\{}`", other))
                            )
                        }
                    }
                }
                Some(ch) => {
                    value.push(ch);
                    self.advance();
                }
            }
        }
    }

    fn read_identifier(&mut self) -> Token {
        let start = self.current_position();
        let mut name = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        let kind = TokenKind::keyword(&name).unwrap_or(TokenKind::Ident(name));
        self.spanned(kind, start)
    }

    fn read_operator(&mut self) -> Result<Token, Diagnostic> {
        let start = self.current_position();
        let ch = self.peek().unwrap();

        let (kind, len) = match (ch, self.peek_at(1)) {
            ('=', Some('=')) => (TokenKind::EqEq, 2),
            ('=', Some('>')) => (TokenKind::FatArrow, 2),
            ('=', _) => (TokenKind::Assign, 1),
            ('!', Some('=')) => (TokenKind::NotEq, 2),
            ('!', _) => (TokenKind::Bang, 1),
            ('<', Some('=')) => (TokenKind::Le, 2),
            ('<', _) => (TokenKind::Lt, 1),
            ('>', Some('=')) => (TokenKind::Ge, 2),
            ('>', _) => (TokenKind::Gt, 1),
            ('&', Some('&')) => (TokenKind::AndAnd, 2),
            ('|', Some('|')) => (TokenKind::OrOr, 2),
            ('|', Some('>')) => (TokenKind::Pipeline, 2),
            ('?', Some('?')) => (TokenKind::QuestionQuestion, 2),
            ('.', Some('.')) => (TokenKind::DotDot, 2),
            ('.', _) => (TokenKind::Dot, 1),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('*', _) => (TokenKind::Star, 1),
            ('/', _) => (TokenKind::Slash, 1),
            ('%', _) => (TokenKind::Percent, 1),
            ('{', _) => (TokenKind::LBrace, 1),
            ('}', _) => (TokenKind::RBrace, 1),
            ('[', _) => (TokenKind::LBracket, 1),
            (']', _) => (TokenKind::RBracket, 1),
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            (',', _) => (TokenKind::Comma, 1),
            (':', _) => (TokenKind::Colon, 1),
            (';', _) => (TokenKind::Semicolon, 1),
            ('@', _) => (TokenKind::At, 1),
            ('$', _) => (TokenKind::Dollar, 1),
            _ => return Err(self.error_at(start, format!("unrecognized character `{}`", ch))),
        };
        for _ in 0..len {
            self.advance();
        }
        Ok(self.spanned(kind, start))
    }

    /// Skip whitespace and comments. Block comments do not nest.
    fn skip_trivia(&mut self) -> Result<(), Diagnostic> {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(ch) = self.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let start = self.current_position();
                    self.advance();
                    self.advance();
                    loop {
                        match (self.peek(), self.peek_at(1)) {
                            (Some('*'), Some('/')) => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            (None, _) => {
                                return Err(self.error_at(start, "unterminated block comment"))
                            }
                            _ => {
                                self.advance();
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn lookahead_is(&self, text: &str) -> bool {
        text.chars()
            .enumerate()
            .all(|(i, expected)| self.peek_at(i) == Some(expected))
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.input.get(self.position + n).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.peek() {
            self.position += 1;
            self.offset += ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn current_position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
            offset: self.offset,
        }
    }

    fn spanned(&self, kind: TokenKind, start: Position) -> Token {
        Token::new(kind, Span::new(start, self.current_position()))
    }

    fn error_at(&self, start: Position, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(ErrorKind::Lex, message)
            .with_span(Span::new(start, self.current_position()))
    }
}

/// Tokenize UTL-X source text
pub fn tokenize(input: &str) -> Result<Vec<Token>, Diagnostic> {
    Lexer::new(input).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_version_directive() {
        let tokens = kinds("%utlx 1.0");
        assert_eq!(
            tokens,
            vec![TokenKind::Version { major: 1, minor: 0 }, TokenKind::Eof]
        );
    }

    #[test]
    fn test_integer_and_float_distinguished() {
        assert_eq!(kinds("42"), vec![TokenKind::Int(42), TokenKind::Eof]);
        assert_eq!(kinds("42.0"), vec![TokenKind::Float(42.0), TokenKind::Eof]);
        assert_eq!(kinds("1e3"), vec![TokenKind::Float(1000.0), TokenKind::Eof]);
    }

    #[test]
    fn test_dot_after_integer_is_member_access() {
        assert_eq!(
            kinds("1.max"),
            vec![
                TokenKind::Int(1),
                TokenKind::Dot,
                TokenKind::Ident("max".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\nb\t\"c\" A""#),
            vec![TokenKind::Str("a\nb\t\"c\" A".to_string()), TokenKind::Eof]
        );
        assert_eq!(
            kinds(r#"'single \' quote'"#),
            vec![TokenKind::Str("single ' quote".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_string_fails() {
        let err = tokenize("\"abc").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Lex);
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a |> f ?? b || c"),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Pipeline,
                TokenKind::Ident("f".to_string()),
                TokenKind::QuestionQuestion,
                TokenKind::Ident("b".to_string()),
                TokenKind::OrOr,
                TokenKind::Ident("c".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_recursive_descent_tokens() {
        assert_eq!(
            kinds("$input..item"),
            vec![
                TokenKind::Dollar,
                TokenKind::Input,
                TokenKind::DotDot,
                TokenKind::Ident("item".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_comments_do_not_produce_tokens() {
        assert_eq!(
            kinds("1 // line comment\n/* block\ncomment */ 2"),
            vec![TokenKind::Int(1), TokenKind::Int(2), TokenKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_block_comment_fails() {
        let err = tokenize("/* never ends").unwrap_err();
        assert!(err.message.contains("unterminated block comment"));
    }

    #[test]
    fn test_separator_at_line_start() {
        let tokens = kinds("%utlx 1.0\n---\n1");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Version { major: 1, minor: 0 },
                TokenKind::Separator,
                TokenKind::Int(1),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_keywords_vs_identifiers() {
        assert_eq!(
            kinds("let input x iffy"),
            vec![
                TokenKind::Let,
                TokenKind::Input,
                TokenKind::Ident("x".to_string()),
                TokenKind::Ident("iffy".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_spans_track_lines() {
        let tokens = tokenize("a\n  b").unwrap();
        assert_eq!(tokens[0].span.start.line, 0);
        assert_eq!(tokens[1].span.start.line, 1);
        assert_eq!(tokens[1].span.start.column, 2);
    }

    #[test]
    fn test_unrecognized_character() {
        let err = tokenize("a # b").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Lex);
        assert!(err.message.contains("unrecognized"));
    }
}
