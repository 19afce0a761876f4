//! Abstract syntax tree for UTL-X programs
//!
//! A closed set of node kinds, every one carrying its source span. The
//! pipeline operator is rewritten into a plain call during parsing, so the
//! evaluator never sees it.

use indexmap::IndexMap;

use crate::error::Span;

/// A typed parameter in a function or lambda definition. Type annotations
/// are parsed and carried but not enforced in v1.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-`
    Neg,
    /// `!` or `not`
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// `&&` / `and`, short-circuit, boolean operands
    And,
    /// `or`, short-circuit, boolean operands
    Or,
    /// `||`: left operand unless it is null, undefined, or the empty string
    Default,
    /// `??`: left operand unless it is null or undefined
    Coalesce,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "or",
            BinaryOp::Default => "||",
            BinaryOp::Coalesce => "??",
        }
    }
}

/// One entry of an object literal
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectEntry {
    /// `key: expr`
    Property { key: String, value: Expr, span: Span },
    /// `@key: expr` — lands in the attribute side-table
    Attribute { key: String, value: Expr, span: Span },
    /// `let name = expr` — visible to later siblings, never emitted
    Let(LetBinding),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LetBinding {
    pub name: String,
    pub ty: Option<String>,
    pub value: Expr,
    pub span: Span,
}

/// A `match` case or template pattern
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// Literal pattern, compared with language equality
    Literal(Expr),
    /// Binds the scrutinee to a name
    Binding(String),
    /// Subset match on object properties
    Object(Vec<(String, Pattern)>),
    /// Fixed-length array match
    Array(Vec<Pattern>),
    /// `_`
    Wildcard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchCase {
    pub pattern: Pattern,
    /// Optional `when` guard, evaluated with pattern bindings in scope
    pub guard: Option<Expr>,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null(Span),
    Bool(bool, Span),
    Int(i64, Span),
    Float(f64, Span),
    Str(String, Span),
    Array(Vec<Expr>, Span),
    Object(Vec<ObjectEntry>, Span),
    /// Identifier reference
    Ident(String, Span),
    /// `$name`; the single unnamed input is `$input`
    InputRef(String, Span),
    /// `.` — the current node inside templates and predicates
    CurrentNode(Span),
    /// `target.name`
    Member {
        target: Box<Expr>,
        name: String,
        span: Span,
    },
    /// `target.@name`
    Attribute {
        target: Box<Expr>,
        name: String,
        span: Span,
    },
    /// `target[expr]` — index or predicate, decided by the evaluated value
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    /// `target..name`
    RecursiveDescent {
        target: Box<Expr>,
        name: String,
        span: Span,
    },
    /// `target.*`
    Wildcard { target: Box<Expr>, span: Span },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    Lambda {
        params: Vec<Param>,
        body: Box<Expr>,
        span: Span,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
        span: Span,
    },
    Match {
        scrutinee: Box<Expr>,
        cases: Vec<MatchCase>,
        span: Span,
    },
    /// `apply(selector)` — template dispatch
    Apply { selector: Box<Expr>, span: Span },
    /// Let bindings followed by a result expression
    Block {
        lets: Vec<LetBinding>,
        value: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Null(span)
            | Expr::Bool(_, span)
            | Expr::Int(_, span)
            | Expr::Float(_, span)
            | Expr::Str(_, span)
            | Expr::Array(_, span)
            | Expr::Object(_, span)
            | Expr::Ident(_, span)
            | Expr::InputRef(_, span)
            | Expr::CurrentNode(span) => *span,
            Expr::Member { span, .. }
            | Expr::Attribute { span, .. }
            | Expr::Index { span, .. }
            | Expr::RecursiveDescent { span, .. }
            | Expr::Wildcard { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Call { span, .. }
            | Expr::Lambda { span, .. }
            | Expr::If { span, .. }
            | Expr::Match { span, .. }
            | Expr::Apply { span, .. }
            | Expr::Block { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<String>,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDef {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Expr,
    pub span: Span,
}

/// A literal value in a directive options map
#[derive(Debug, Clone, PartialEq)]
pub enum DirectiveValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Map(IndexMap<String, DirectiveValue>),
}

impl DirectiveValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DirectiveValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DirectiveValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            DirectiveValue::Int(n) => Some(*n),
            _ => None,
        }
    }
}

pub type OptionsMap = IndexMap<String, DirectiveValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct InputDecl {
    /// None for the single unnamed input, referenced as `$input`
    pub name: Option<String>,
    pub format: String,
    pub options: OptionsMap,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputDecl {
    pub format: String,
    pub options: OptionsMap,
    pub span: Span,
}

/// A compiled program: directives, definitions, and the body expression
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub version: (u32, u32),
    pub inputs: Vec<InputDecl>,
    pub output: OutputDecl,
    pub functions: Vec<FunctionDef>,
    pub templates: Vec<TemplateDef>,
    pub body: Expr,
    /// Retained for diagnostics and fingerprinting
    pub source: String,
}
