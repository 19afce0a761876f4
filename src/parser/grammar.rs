//! Recursive-descent parser for UTL-X
//!
//! Consumes the token stream and builds the AST. Parse errors carry the
//! span, what was expected, and what was found; the parser recovers at
//! object-entry and definition boundaries so one pass can report several
//! diagnostics.

use crate::error::{Diagnostic, Diagnostics, ErrorKind, Span};
use crate::lexer::{tokenize, Token, TokenKind};

use super::ast::{
    BinaryOp, DirectiveValue, Expr, FunctionDef, InputDecl, LetBinding, MatchCase, ObjectEntry,
    OptionsMap, OutputDecl, Param, Pattern, Program, TemplateDef, UnaryOp,
};

const FORMATS: &[&str] = &["xml", "json", "yaml", "yml", "csv", "auto"];

/// Parse a complete program: directives, `---`, definitions, body
pub fn parse_program(source: &str) -> Result<Program, Diagnostics> {
    let tokens = tokenize(source).map_err(Diagnostics::from)?;
    Parser::new(tokens).parse_document(source)
}

/// Parse a single expression; used by tests and the selector engine
pub fn parse_expression(source: &str) -> Result<Expr, Diagnostics> {
    let tokens = tokenize(source).map_err(Diagnostics::from)?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expr().map_err(|diag| {
        parser.diagnostics.push(diag);
        Diagnostics {
            items: parser.diagnostics.clone(),
        }
    })?;
    parser
        .expect_kind(&TokenKind::Eof, "end of input")
        .map_err(Diagnostics::from)?;
    Ok(expr)
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Document structure
    // ------------------------------------------------------------------

    pub fn parse_document(mut self, source: &str) -> Result<Program, Diagnostics> {
        let result = self.parse_document_inner(source);
        match result {
            Ok(program) if self.diagnostics.is_empty() => Ok(program),
            Ok(_) => Err(Diagnostics {
                items: self.diagnostics,
            }),
            Err(diag) => {
                self.diagnostics.push(diag);
                Err(Diagnostics {
                    items: self.diagnostics,
                })
            }
        }
    }

    fn parse_document_inner(&mut self, source: &str) -> Result<Program, Diagnostic> {
        let version = match self.peek().kind.clone() {
            TokenKind::Version { major, minor } => {
                self.advance();
                (major, minor)
            }
            _ => {
                return Err(self.err_here("expected `%utlx <major>.<minor>` version directive"));
            }
        };

        let mut inputs = Vec::new();
        while matches!(self.peek().kind, TokenKind::Input) {
            inputs.push(self.parse_input_decl()?);
        }
        if inputs.is_empty() {
            return Err(self.err_here("expected at least one `input` directive"));
        }

        let output = self.parse_output_decl()?;

        self.expect_kind(&TokenKind::Separator, "`---`")?;

        let mut functions = Vec::new();
        let mut templates = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::Function => match self.parse_function_def() {
                    Ok(def) => functions.push(def),
                    Err(diag) => {
                        self.diagnostics.push(diag);
                        self.synchronize_toplevel();
                    }
                },
                TokenKind::Template => match self.parse_template_def() {
                    Ok(def) => templates.push(def),
                    Err(diag) => {
                        self.diagnostics.push(diag);
                        self.synchronize_toplevel();
                    }
                },
                _ => break,
            }
        }

        let body = self.parse_block()?;
        self.expect_kind(&TokenKind::Eof, "end of input")?;

        Ok(Program {
            version,
            inputs,
            output,
            functions,
            templates,
            body,
            source: source.to_string(),
        })
    }

    fn parse_input_decl(&mut self) -> Result<InputDecl, Diagnostic> {
        let start = self.peek().span;
        self.advance(); // `input`

        let first = self.expect_ident("input format or name")?;
        // Two identifiers in a row: the first is the input's name
        let (name, format) = if let TokenKind::Ident(_) = self.peek().kind {
            let second = self.expect_ident("input format")?;
            (Some(first.0), second.0)
        } else {
            (None, first.0)
        };

        if !FORMATS.contains(&format.as_str()) {
            return Err(Diagnostic::new(
                ErrorKind::Parse,
                format!(
                    "unknown input format `{}`, expected one of xml, json, yaml, yml, csv, auto",
                    format
                ),
            )
            .with_span(first.1));
        }

        let options = if matches!(self.peek().kind, TokenKind::LBrace) {
            self.parse_options_map()?
        } else {
            OptionsMap::new()
        };

        Ok(InputDecl {
            name,
            format,
            options,
            span: start.merge(self.prev_span()),
        })
    }

    fn parse_output_decl(&mut self) -> Result<OutputDecl, Diagnostic> {
        let start = self.peek().span;
        self.expect_kind(&TokenKind::Output, "`output` directive")?;
        let (format, format_span) = self.expect_ident("output format")?;
        if !FORMATS.contains(&format.as_str()) {
            return Err(Diagnostic::new(
                ErrorKind::Parse,
                format!(
                    "unknown output format `{}`, expected one of xml, json, yaml, yml, csv, auto",
                    format
                ),
            )
            .with_span(format_span));
        }
        let options = if matches!(self.peek().kind, TokenKind::LBrace) {
            self.parse_options_map()?
        } else {
            OptionsMap::new()
        };
        Ok(OutputDecl {
            format,
            options,
            span: start.merge(self.prev_span()),
        })
    }

    fn parse_options_map(&mut self) -> Result<OptionsMap, Diagnostic> {
        self.expect_kind(&TokenKind::LBrace, "`{`")?;
        let mut map = OptionsMap::new();
        loop {
            if matches!(self.peek().kind, TokenKind::RBrace) {
                break;
            }
            let key = self.expect_key("option name")?;
            self.expect_kind(&TokenKind::Colon, "`:`")?;
            let value = self.parse_directive_value()?;
            map.insert(key, value);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect_kind(&TokenKind::RBrace, "`}`")?;
        Ok(map)
    }

    fn parse_directive_value(&mut self) -> Result<DirectiveValue, Diagnostic> {
        let token = self.peek().clone();
        let value = match token.kind {
            TokenKind::Int(n) => {
                self.advance();
                DirectiveValue::Int(n)
            }
            TokenKind::Float(n) => {
                self.advance();
                DirectiveValue::Float(n)
            }
            TokenKind::Str(s) => {
                self.advance();
                DirectiveValue::Str(s)
            }
            TokenKind::True => {
                self.advance();
                DirectiveValue::Bool(true)
            }
            TokenKind::False => {
                self.advance();
                DirectiveValue::Bool(false)
            }
            TokenKind::Null => {
                self.advance();
                DirectiveValue::Null
            }
            TokenKind::Minus => {
                self.advance();
                match self.peek().kind.clone() {
                    TokenKind::Int(n) => {
                        self.advance();
                        DirectiveValue::Int(-n)
                    }
                    TokenKind::Float(n) => {
                        self.advance();
                        DirectiveValue::Float(-n)
                    }
                    _ => return Err(self.err_here("expected a number after `-`")),
                }
            }
            TokenKind::LBrace => {
                let nested = self.parse_options_map()?;
                DirectiveValue::Map(nested)
            }
            _ => {
                return Err(self.err_expected("a literal option value", &token));
            }
        };
        Ok(value)
    }

    fn parse_function_def(&mut self) -> Result<FunctionDef, Diagnostic> {
        let start = self.peek().span;
        self.advance(); // `function`
        let (name, _) = self.expect_ident("function name")?;
        self.expect_kind(&TokenKind::LParen, "`(`")?;
        let params = self.parse_params()?;
        self.expect_kind(&TokenKind::RParen, "`)`")?;
        let return_type = if self.eat(&TokenKind::Colon) {
            Some(self.expect_ident("return type")?.0)
        } else {
            None
        };
        self.expect_kind(&TokenKind::Assign, "`=`")?;
        let body = self.parse_block()?;
        Ok(FunctionDef {
            name,
            params,
            return_type,
            body,
            span: start.merge(self.prev_span()),
        })
    }

    fn parse_template_def(&mut self) -> Result<TemplateDef, Diagnostic> {
        let start = self.peek().span;
        self.advance(); // `template`
        let pattern = self.parse_pattern()?;
        let guard = if self.eat(&TokenKind::When) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect_kind(&TokenKind::FatArrow, "`=>`")?;
        let body = self.parse_expr()?;
        Ok(TemplateDef {
            pattern,
            guard,
            body,
            span: start.merge(self.prev_span()),
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, Diagnostic> {
        let mut params = Vec::new();
        if matches!(self.peek().kind, TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            let (name, span) = self.expect_ident("parameter name")?;
            let ty = if self.eat(&TokenKind::Colon) {
                Some(self.expect_ident("parameter type")?.0)
            } else {
                None
            };
            params.push(Param { name, ty, span });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(params)
    }

    /// A block: zero or more `let` bindings, then the result expression.
    /// Every binding must be terminated by `;` or `,` unless the next token
    /// starts another `let`; without the terminator `let y = 20` followed by
    /// `[x]` on the next line would parse as an index of `20`.
    fn parse_block(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.peek().span;
        let mut lets = Vec::new();
        while matches!(self.peek().kind, TokenKind::Let) {
            let binding = self.parse_let_binding()?;
            lets.push(binding);
            if self.eat(&TokenKind::Semicolon) || self.eat(&TokenKind::Comma) {
                continue;
            }
            if matches!(self.peek().kind, TokenKind::Let) {
                continue;
            }
            return Err(self
                .err_here("expected `;` or `,` after let binding")
                .with_hint("insert `;` to separate the binding from the result expression"));
        }
        let value = self.parse_expr()?;
        if lets.is_empty() {
            Ok(value)
        } else {
            let span = start.merge(value.span());
            Ok(Expr::Block {
                lets,
                value: Box::new(value),
                span,
            })
        }
    }

    fn parse_let_binding(&mut self) -> Result<LetBinding, Diagnostic> {
        let start = self.peek().span;
        self.advance(); // `let`
        let (name, _) = self.expect_ident("binding name")?;
        let ty = if self.eat(&TokenKind::Colon) {
            Some(self.expect_ident("type name")?.0)
        } else {
            None
        };
        self.expect_kind(&TokenKind::Assign, "`=`")?;
        let value = self.parse_expr()?;
        let span = start.merge(value.span());
        Ok(LetBinding {
            name,
            ty,
            value,
            span,
        })
    }

    // ------------------------------------------------------------------
    // Patterns
    // ------------------------------------------------------------------

    fn parse_pattern(&mut self) -> Result<Pattern, Diagnostic> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Int(n) => {
                self.advance();
                Ok(Pattern::Literal(Expr::Int(n, token.span)))
            }
            TokenKind::Float(n) => {
                self.advance();
                Ok(Pattern::Literal(Expr::Float(n, token.span)))
            }
            TokenKind::Str(ref s) => {
                self.advance();
                Ok(Pattern::Literal(Expr::Str(s.clone(), token.span)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Pattern::Literal(Expr::Bool(true, token.span)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Pattern::Literal(Expr::Bool(false, token.span)))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Pattern::Literal(Expr::Null(token.span)))
            }
            TokenKind::Minus => {
                self.advance();
                match self.peek().kind.clone() {
                    TokenKind::Int(n) => {
                        let span = self.peek().span;
                        self.advance();
                        Ok(Pattern::Literal(Expr::Int(-n, span)))
                    }
                    TokenKind::Float(n) => {
                        let span = self.peek().span;
                        self.advance();
                        Ok(Pattern::Literal(Expr::Float(-n, span)))
                    }
                    _ => Err(self.err_here("expected a number after `-` in pattern")),
                }
            }
            TokenKind::Ident(ref name) if name == "_" => {
                self.advance();
                Ok(Pattern::Wildcard)
            }
            TokenKind::Ident(ref name) => {
                let name = name.clone();
                self.advance();
                Ok(Pattern::Binding(name))
            }
            TokenKind::LBrace => {
                self.advance();
                let mut fields = Vec::new();
                loop {
                    if matches!(self.peek().kind, TokenKind::RBrace) {
                        break;
                    }
                    let key = self.expect_key("pattern key")?;
                    self.expect_kind(&TokenKind::Colon, "`:`")?;
                    let pattern = self.parse_pattern()?;
                    fields.push((key, pattern));
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect_kind(&TokenKind::RBrace, "`}`")?;
                Ok(Pattern::Object(fields))
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                loop {
                    if matches!(self.peek().kind, TokenKind::RBracket) {
                        break;
                    }
                    items.push(self.parse_pattern()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect_kind(&TokenKind::RBracket, "`]`")?;
                Ok(Pattern::Array(items))
            }
            _ => Err(self.err_expected("a pattern", &token)),
        }
    }

    // ------------------------------------------------------------------
    // Expressions, precedence ladder
    // ------------------------------------------------------------------

    pub fn parse_expr(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_pipeline()
    }

    fn parse_pipeline(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_default()?;
        while self.eat(&TokenKind::Pipeline) {
            let right = self.parse_default()?;
            left = rewrite_pipeline(left, right);
        }
        Ok(left)
    }

    fn parse_default(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_and()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::OrOr => BinaryOp::Default,
                TokenKind::QuestionQuestion => BinaryOp::Coalesce,
                TokenKind::Or => BinaryOp::Or,
                _ => break,
            };
            self.advance();
            let right = self.parse_and()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_equality()?;
        while matches!(self.peek().kind, TokenKind::AndAnd | TokenKind::And) {
            self.advance();
            let right = self.parse_equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                let span = token.span.merge(operand.span());
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                    span,
                })
            }
            TokenKind::Bang | TokenKind::Not => {
                self.advance();
                let operand = self.parse_unary()?;
                let span = token.span.merge(operand.span());
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                    span,
                })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek().kind.clone() {
                TokenKind::Dot => {
                    self.advance();
                    match self.peek().kind.clone() {
                        TokenKind::At => {
                            self.advance();
                            let (name, span) = self.expect_ident("attribute name")?;
                            let span = expr.span().merge(span);
                            expr = Expr::Attribute {
                                target: Box::new(expr),
                                name,
                                span,
                            };
                        }
                        TokenKind::Star => {
                            let star_span = self.peek().span;
                            self.advance();
                            let span = expr.span().merge(star_span);
                            expr = Expr::Wildcard {
                                target: Box::new(expr),
                                span,
                            };
                        }
                        _ => {
                            let (name, span) = self.expect_member_name()?;
                            let span = expr.span().merge(span);
                            expr = Expr::Member {
                                target: Box::new(expr),
                                name,
                                span,
                            };
                        }
                    }
                }
                TokenKind::DotDot => {
                    self.advance();
                    let (name, span) = self.expect_ident("property name after `..`")?;
                    let span = expr.span().merge(span);
                    expr = Expr::RecursiveDescent {
                        target: Box::new(expr),
                        name,
                        span,
                    };
                }
                // Index and call postfixes bind only on the same line, so a
                // block's `[...]` result expression on its own line is not
                // swallowed as an index of the binding above it
                TokenKind::LBracket if self.same_line() => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect_kind(&TokenKind::RBracket, "`]`")?;
                    let span = expr.span().merge(self.prev_span());
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                        span,
                    };
                }
                TokenKind::LParen if self.same_line() => {
                    self.advance();
                    let args = self.parse_args()?;
                    self.expect_kind(&TokenKind::RParen, "`)`")?;
                    let span = expr.span().merge(self.prev_span());
                    expr = build_call(expr, args, span);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, Diagnostic> {
        let mut args = Vec::new();
        if matches!(self.peek().kind, TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Int(n) => {
                self.advance();
                Ok(Expr::Int(n, token.span))
            }
            TokenKind::Float(n) => {
                self.advance();
                Ok(Expr::Float(n, token.span))
            }
            TokenKind::Str(ref s) => {
                self.advance();
                Ok(Expr::Str(s.clone(), token.span))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Bool(true, token.span))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Bool(false, token.span))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Null(token.span))
            }
            TokenKind::Ident(ref name) => {
                let name = name.clone();
                self.advance();
                // `x => body` is a single-parameter lambda
                if matches!(self.peek().kind, TokenKind::FatArrow) {
                    self.advance();
                    let body = self.parse_expr()?;
                    let span = token.span.merge(body.span());
                    return Ok(Expr::Lambda {
                        params: vec![Param {
                            name,
                            ty: None,
                            span: token.span,
                        }],
                        body: Box::new(body),
                        span,
                    });
                }
                Ok(Expr::Ident(name, token.span))
            }
            TokenKind::Dollar => {
                self.advance();
                match self.peek().kind.clone() {
                    TokenKind::Ident(name) => {
                        let span = token.span.merge(self.peek().span);
                        self.advance();
                        Ok(Expr::InputRef(name, span))
                    }
                    TokenKind::Input => {
                        let span = token.span.merge(self.peek().span);
                        self.advance();
                        Ok(Expr::InputRef("input".to_string(), span))
                    }
                    _ => Err(self.err_here("expected an input name after `$`")),
                }
            }
            // Historical scripts write the single input bare
            TokenKind::Input => {
                self.advance();
                Ok(Expr::InputRef("input".to_string(), token.span))
            }
            TokenKind::Dot => {
                self.advance();
                match self.peek().kind.clone() {
                    TokenKind::At => {
                        self.advance();
                        let (name, span) = self.expect_ident("attribute name")?;
                        let span = token.span.merge(span);
                        Ok(Expr::Attribute {
                            target: Box::new(Expr::CurrentNode(token.span)),
                            name,
                            span,
                        })
                    }
                    TokenKind::Star => {
                        let span = token.span.merge(self.peek().span);
                        self.advance();
                        Ok(Expr::Wildcard {
                            target: Box::new(Expr::CurrentNode(token.span)),
                            span,
                        })
                    }
                    TokenKind::Ident(_) => {
                        let (name, span) = self.expect_ident("property name")?;
                        let span = token.span.merge(span);
                        Ok(Expr::Member {
                            target: Box::new(Expr::CurrentNode(token.span)),
                            name,
                            span,
                        })
                    }
                    _ => Ok(Expr::CurrentNode(token.span)),
                }
            }
            TokenKind::DotDot => {
                self.advance();
                let (name, span) = self.expect_ident("property name after `..`")?;
                let span = token.span.merge(span);
                Ok(Expr::RecursiveDescent {
                    target: Box::new(Expr::CurrentNode(token.span)),
                    name,
                    span,
                })
            }
            TokenKind::At => {
                self.advance();
                let (name, span) = self.expect_ident("attribute name")?;
                let span = token.span.merge(span);
                Ok(Expr::Attribute {
                    target: Box::new(Expr::CurrentNode(token.span)),
                    name,
                    span,
                })
            }
            TokenKind::LParen => self.parse_paren_or_lambda(),
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_object_literal(),
            TokenKind::If => self.parse_if(),
            TokenKind::Match => self.parse_match(),
            // `and`/`or` double as library functions when called directly
            TokenKind::And | TokenKind::Or
                if matches!(
                    self.tokens.get(self.pos + 1).map(|t| &t.kind),
                    Some(TokenKind::LParen)
                ) =>
            {
                let name = if token.kind == TokenKind::And { "and" } else { "or" };
                self.advance();
                Ok(Expr::Ident(name.to_string(), token.span))
            }
            _ => Err(self.err_expected("an expression", &token)),
        }
    }

    /// `(` begins either a grouped expression or a parenthesized lambda
    /// parameter list; a scan to the matching `)` looking for `=>` decides.
    fn parse_paren_or_lambda(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.peek().span;
        if self.lambda_params_ahead() {
            self.advance(); // `(`
            let params = self.parse_params()?;
            self.expect_kind(&TokenKind::RParen, "`)`")?;
            self.expect_kind(&TokenKind::FatArrow, "`=>`")?;
            let body = self.parse_expr()?;
            let span = start.merge(body.span());
            return Ok(Expr::Lambda {
                params,
                body: Box::new(body),
                span,
            });
        }
        self.advance(); // `(`
        let expr = self.parse_expr()?;
        self.expect_kind(&TokenKind::RParen, "`)`")?;
        Ok(expr)
    }

    fn lambda_params_ahead(&self) -> bool {
        let mut depth = 0usize;
        let mut i = self.pos;
        while let Some(token) = self.tokens.get(i) {
            match token.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return matches!(
                            self.tokens.get(i + 1).map(|t| &t.kind),
                            Some(TokenKind::FatArrow)
                        );
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
            i += 1;
        }
        false
    }

    fn parse_array_literal(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.peek().span;
        self.advance(); // `[`
        let mut items = Vec::new();
        loop {
            if matches!(self.peek().kind, TokenKind::RBracket) {
                break;
            }
            items.push(self.parse_expr()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect_kind(&TokenKind::RBracket, "`]`")?;
        Ok(Expr::Array(items, start.merge(self.prev_span())))
    }

    fn parse_object_literal(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.peek().span;
        self.advance(); // `{`
        let mut entries = Vec::new();
        loop {
            if matches!(self.peek().kind, TokenKind::RBrace | TokenKind::Eof) {
                break;
            }
            match self.parse_object_entry() {
                Ok(entry) => entries.push(entry),
                Err(diag) => {
                    self.diagnostics.push(diag);
                    self.synchronize_object_entry();
                }
            }
            if self.eat(&TokenKind::Comma) || self.eat(&TokenKind::Semicolon) {
                continue;
            }
            break;
        }
        self.expect_kind(&TokenKind::RBrace, "`}`")?;
        Ok(Expr::Object(entries, start.merge(self.prev_span())))
    }

    fn parse_object_entry(&mut self) -> Result<ObjectEntry, Diagnostic> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Let => {
                let binding = self.parse_let_binding()?;
                Ok(ObjectEntry::Let(binding))
            }
            TokenKind::At => {
                self.advance();
                let key = self.expect_key("attribute name")?;
                self.expect_kind(&TokenKind::Colon, "`:`")?;
                let value = self.parse_expr()?;
                let span = token.span.merge(value.span());
                Ok(ObjectEntry::Attribute { key, value, span })
            }
            _ => {
                let key = self.expect_key("property name")?;
                self.expect_kind(&TokenKind::Colon, "`:`")?;
                let value = self.parse_expr()?;
                let span = token.span.merge(value.span());
                Ok(ObjectEntry::Property { key, value, span })
            }
        }
    }

    fn parse_if(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.peek().span;
        self.advance(); // `if`
        self.expect_kind(&TokenKind::LParen, "`(`")?;
        let cond = self.parse_expr()?;
        self.expect_kind(&TokenKind::RParen, "`)`")?;
        let then_branch = self.parse_expr()?;
        self.expect_kind(&TokenKind::Else, "`else`")?;
        let else_branch = self.parse_expr()?;
        let span = start.merge(else_branch.span());
        Ok(Expr::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
            span,
        })
    }

    fn parse_match(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.peek().span;
        self.advance(); // `match`
        let scrutinee = self.parse_expr()?;
        self.expect_kind(&TokenKind::LBrace, "`{`")?;
        let mut cases = Vec::new();
        loop {
            if matches!(self.peek().kind, TokenKind::RBrace | TokenKind::Eof) {
                break;
            }
            let case_start = self.peek().span;
            let pattern = self.parse_pattern()?;
            let guard = if self.eat(&TokenKind::When) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            self.expect_kind(&TokenKind::FatArrow, "`=>`")?;
            let body = self.parse_expr()?;
            let span = case_start.merge(body.span());
            cases.push(MatchCase {
                pattern,
                guard,
                body,
                span,
            });
            if self.eat(&TokenKind::Comma) || self.eat(&TokenKind::Semicolon) {
                continue;
            }
            break;
        }
        self.expect_kind(&TokenKind::RBrace, "`}`")?;
        if cases.is_empty() {
            return Err(Diagnostic::new(ErrorKind::Parse, "`match` needs at least one case")
                .with_span(start));
        }
        let span = start.merge(self.prev_span());
        Ok(Expr::Match {
            scrutinee: Box::new(scrutinee),
            cases,
            span,
        })
    }

    // ------------------------------------------------------------------
    // Recovery
    // ------------------------------------------------------------------

    fn synchronize_toplevel(&mut self) {
        loop {
            match self.peek().kind {
                TokenKind::Function | TokenKind::Template | TokenKind::Separator | TokenKind::Eof => {
                    break
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Skip to the next entry separator or closing brace, balancing nesting
    fn synchronize_object_entry(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek().kind {
                TokenKind::Eof => break,
                TokenKind::LBrace | TokenKind::LBracket | TokenKind::LParen => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::RBrace | TokenKind::RBracket | TokenKind::RParen => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    self.advance();
                }
                TokenKind::Comma | TokenKind::Semicolon if depth == 0 => break,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Token plumbing
    // ------------------------------------------------------------------

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

    fn prev_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }

    /// True when the upcoming token starts on the same line the previous
    /// token ended on
    fn same_line(&self) -> bool {
        if self.pos == 0 {
            return true;
        }
        self.tokens[self.pos].span.start.line == self.tokens[self.pos - 1].span.end.line
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_kind(&mut self, kind: &TokenKind, what: &str) -> Result<Token, Diagnostic> {
        if &self.peek().kind == kind {
            Ok(self.advance())
        } else {
            let found = self.peek().clone();
            Err(self.err_expected(what, &found))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, Span), Diagnostic> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok((name, token.span))
            }
            _ => Err(self.err_expected(what, &token)),
        }
    }

    /// Member names admit identifiers plus the keywords that double as
    /// ordinary property names in data (`input`, `output`)
    fn expect_member_name(&mut self) -> Result<(String, Span), Diagnostic> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok((name, token.span))
            }
            TokenKind::Input => {
                self.advance();
                Ok(("input".to_string(), token.span))
            }
            TokenKind::Output => {
                self.advance();
                Ok(("output".to_string(), token.span))
            }
            _ => Err(self.err_expected("property name", &token)),
        }
    }

    /// Object keys: identifiers or string literals
    fn expect_key(&mut self, what: &str) -> Result<String, Diagnostic> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.err_expected(what, &token)),
        }
    }

    fn err_here(&self, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(ErrorKind::Parse, message).with_span(self.peek().span)
    }

    fn err_expected(&self, what: &str, found: &Token) -> Diagnostic {
        Diagnostic::new(
            ErrorKind::Parse,
            format!("expected {}, found {}", what, found.kind.describe()),
        )
        .with_span(found.span)
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let span = left.span().merge(right.span());
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
        span,
    }
}

/// `x |> f(a, b)` becomes `f(x, a, b)`; `x |> (p => body)` applies the
/// lambda to `x`; anything else becomes a unary call.
fn rewrite_pipeline(value: Expr, stage: Expr) -> Expr {
    let span = value.span().merge(stage.span());
    match stage {
        Expr::Call { callee, mut args, .. } => {
            args.insert(0, value);
            build_call(*callee, args, span)
        }
        Expr::Apply { .. } | Expr::Lambda { .. } => Expr::Call {
            callee: Box::new(stage),
            args: vec![value],
            span,
        },
        other => Expr::Call {
            callee: Box::new(other),
            args: vec![value],
            span,
        },
    }
}

/// Calls to the `apply` name become the dedicated template-dispatch node
fn build_call(callee: Expr, args: Vec<Expr>, span: Span) -> Expr {
    if let Expr::Ident(name, _) = &callee {
        if name == "apply" && args.len() == 1 {
            let selector = args.into_iter().next().unwrap();
            return Expr::Apply {
                selector: Box::new(selector),
                span,
            };
        }
    }
    Expr::Call {
        callee: Box::new(callee),
        args,
        span,
    }
}
