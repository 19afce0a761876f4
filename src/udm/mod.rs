//! Universal Data Model
//!
//! The format-agnostic value type every other part of the engine speaks.
//! Format bridges lift external bytes into [`Udm`], the interpreter
//! manipulates it, and serializers lower it back out. Values are
//! semantically immutable: anything that "modifies" a value builds a new
//! one, sharing substructure where it can.

pub mod builder;
pub mod coerce;
pub mod compare;

pub use builder::ObjectBuilder;
pub use compare::{compare, deep_equal};

use indexmap::IndexMap;
use std::rc::Rc;

use crate::interpreter::environment::Env;
use crate::parser::ast::{Expr, Param};

/// Name of the reserved property holding an XML element's own text.
///
/// The language never exposes this name directly: selecting an element whose
/// only structured content is this property yields the text itself (see
/// [`coerce::unwrap_text`]).
pub const TEXT_PROPERTY: &str = "_text";

/// An object value: insertion-ordered properties, a side-table of string
/// attributes, an optional element-name hint, and opaque metadata.
///
/// `properties` and `attributes` are disjoint namespaces; an attribute named
/// `id` never collides with a child property `id`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Object {
    /// Element-name hint, set by the XML bridge and honored on the way out
    pub name: Option<String>,
    /// XML-style attributes, insertion-ordered
    pub attributes: IndexMap<String, String>,
    /// Child values, insertion-ordered
    pub properties: IndexMap<String, Udm>,
    /// Opaque to the interpreter; parsers may populate (source file, line,
    /// schema hints), serializers may consume or ignore
    pub metadata: IndexMap<String, String>,
}

impl Object {
    pub fn new() -> Self {
        Object::default()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.attributes.is_empty()
    }

    /// True when the only property is the reserved text property
    pub fn is_text_only(&self) -> bool {
        self.properties.len() == 1 && self.properties.contains_key(TEXT_PROPERTY)
    }

    pub fn text(&self) -> Option<&Udm> {
        self.properties.get(TEXT_PROPERTY)
    }
}

/// A user-written function value: parameter list, body, and the captured
/// environment chain. The chain is shared by reference; values are immutable
/// so this is safe, and no cycles can form because a lambda never captures
/// its own frame before the frame closes.
#[derive(Debug)]
pub struct LambdaValue {
    pub params: Vec<Param>,
    pub body: Expr,
    pub env: Env,
    /// Function name when defined with `function`, for back-traces
    pub name: Option<String>,
}

/// The universal value: a closed tagged sum.
///
/// `Int` and `Float` are distinct variants so a number that was an integer
/// in the source round-trips as an integer. `Null` is a value in its own
/// right, not absence; absence is a `SelectorFailure`.
#[derive(Debug, Clone)]
pub enum Udm {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Udm>),
    Object(Object),
    DateTime(chrono::DateTime<chrono::FixedOffset>),
    Date(chrono::NaiveDate),
    LocalDateTime(chrono::NaiveDateTime),
    Time(chrono::NaiveTime),
    Binary {
        bytes: Vec<u8>,
        encoding: Option<String>,
    },
    Lambda(Rc<LambdaValue>),
}

impl Udm {
    pub fn string(s: impl Into<String>) -> Udm {
        Udm::Str(s.into())
    }

    pub fn array(items: impl IntoIterator<Item = Udm>) -> Udm {
        Udm::Array(items.into_iter().collect())
    }

    pub fn binary(bytes: Vec<u8>) -> Udm {
        Udm::Binary {
            bytes,
            encoding: None,
        }
    }

    /// Canonical type name, as reported by the `typeOf` stdlib function
    pub fn type_of(&self) -> &'static str {
        match self {
            Udm::Null => "null",
            Udm::Bool(_) => "boolean",
            Udm::Int(_) | Udm::Float(_) => "number",
            Udm::Str(_) => "string",
            Udm::Array(_) => "array",
            Udm::Object(_) => "object",
            Udm::DateTime(_) | Udm::LocalDateTime(_) => "datetime",
            Udm::Date(_) => "date",
            Udm::Time(_) => "time",
            Udm::Binary { .. } => "binary",
            Udm::Lambda(_) => "lambda",
        }
    }

    /// Cheap emptiness probe for container variants; scalars are never empty
    /// except the empty string
    pub fn is_empty(&self) -> bool {
        match self {
            Udm::Null => true,
            Udm::Str(s) => s.is_empty(),
            Udm::Array(items) => items.is_empty(),
            Udm::Object(obj) => obj.is_empty(),
            Udm::Binary { bytes, .. } => bytes.is_empty(),
            _ => false,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Udm::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Udm]> {
        match self {
            Udm::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Udm::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Udm::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric reading: integers and floats both answer
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Udm::Int(n) => Some(*n as f64),
            Udm::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Udm::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Structural equality. Int and Float are *different* here (`42 != 42.0`);
/// the language's `==` goes through [`compare::deep_equal`], which honors
/// numeric equivalence. Lambdas compare by identity.
impl PartialEq for Udm {
    fn eq(&self, other: &Udm) -> bool {
        match (self, other) {
            (Udm::Null, Udm::Null) => true,
            (Udm::Bool(a), Udm::Bool(b)) => a == b,
            (Udm::Int(a), Udm::Int(b)) => a == b,
            (Udm::Float(a), Udm::Float(b)) => a == b,
            (Udm::Str(a), Udm::Str(b)) => a == b,
            (Udm::Array(a), Udm::Array(b)) => a == b,
            (Udm::Object(a), Udm::Object(b)) => a == b,
            (Udm::DateTime(a), Udm::DateTime(b)) => a == b,
            (Udm::Date(a), Udm::Date(b)) => a == b,
            (Udm::LocalDateTime(a), Udm::LocalDateTime(b)) => a == b,
            (Udm::Time(a), Udm::Time(b)) => a == b,
            (
                Udm::Binary { bytes: a, .. },
                Udm::Binary { bytes: b, .. },
            ) => a == b,
            (Udm::Lambda(a), Udm::Lambda(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_float_structurally_distinct() {
        assert_ne!(Udm::Int(42), Udm::Float(42.0));
        assert_eq!(Udm::Int(42), Udm::Int(42));
    }

    #[test]
    fn test_null_is_a_value() {
        let mut obj = Object::new();
        obj.properties.insert("a".to_string(), Udm::Null);
        assert_eq!(obj.properties.get("a"), Some(&Udm::Null));
        assert!(obj.properties.get("b").is_none());
    }

    #[test]
    fn test_type_of_names() {
        assert_eq!(Udm::Int(1).type_of(), "number");
        assert_eq!(Udm::Float(1.5).type_of(), "number");
        assert_eq!(Udm::Str("x".into()).type_of(), "string");
        assert_eq!(Udm::Null.type_of(), "null");
        assert_eq!(Udm::Array(vec![]).type_of(), "array");
        assert_eq!(Udm::Object(Object::new()).type_of(), "object");
        assert_eq!(Udm::binary(vec![1]).type_of(), "binary");
    }

    #[test]
    fn test_attribute_property_namespaces_disjoint() {
        let mut obj = Object::new();
        obj.attributes.insert("id".to_string(), "A1".to_string());
        obj.properties.insert("id".to_string(), Udm::Int(7));
        assert_eq!(obj.attributes.get("id").map(String::as_str), Some("A1"));
        assert_eq!(obj.properties.get("id"), Some(&Udm::Int(7)));
    }

    #[test]
    fn test_is_empty() {
        assert!(Udm::Null.is_empty());
        assert!(Udm::Str(String::new()).is_empty());
        assert!(!Udm::Str("a".into()).is_empty());
        assert!(Udm::Array(vec![]).is_empty());
        assert!(Udm::Object(Object::new()).is_empty());
        assert!(!Udm::Int(0).is_empty());
    }

    #[test]
    fn test_text_only_object() {
        let mut obj = Object::new();
        obj.properties
            .insert(TEXT_PROPERTY.to_string(), Udm::string("2"));
        assert!(obj.is_text_only());
        obj.properties.insert("child".to_string(), Udm::Int(1));
        assert!(!obj.is_text_only());
    }
}
