//! Pattern matching for `match` cases and template dispatch

use crate::parser::ast::{Expr, Pattern};
use crate::udm::{deep_equal, Udm};

/// Try a pattern against a value. `Some(bindings)` on success, where the
/// bindings are introduced into the case body's frame.
pub fn match_pattern(pattern: &Pattern, value: &Udm) -> Option<Vec<(String, Udm)>> {
    match pattern {
        Pattern::Wildcard => Some(Vec::new()),
        Pattern::Binding(name) => Some(vec![(name.clone(), value.clone())]),
        Pattern::Literal(literal) => {
            let expected = literal_value(literal)?;
            if deep_equal(&expected, value) {
                Some(Vec::new())
            } else {
                None
            }
        }
        Pattern::Object(fields) => {
            let obj = value.as_object()?;
            let mut bindings = Vec::new();
            for (key, sub) in fields {
                let found = obj.properties.get(key)?;
                bindings.extend(match_pattern(sub, found)?);
            }
            Some(bindings)
        }
        Pattern::Array(items) => {
            let arr = value.as_array()?;
            if arr.len() != items.len() {
                return None;
            }
            let mut bindings = Vec::new();
            for (sub, element) in items.iter().zip(arr) {
                bindings.extend(match_pattern(sub, element)?);
            }
            Some(bindings)
        }
    }
}

/// Template patterns get one extra rule: a string literal also matches an
/// Object whose element-name hint equals the string, which is how XML
/// elements are routed by name.
pub fn template_matches(pattern: &Pattern, value: &Udm) -> Option<Vec<(String, Udm)>> {
    if let Pattern::Literal(Expr::Str(name, _)) = pattern {
        if let Udm::Object(obj) = value {
            if obj.name.as_deref() == Some(name.as_str()) {
                return Some(Vec::new());
            }
        }
    }
    match_pattern(pattern, value)
}

/// Evaluate a literal pattern expression without an environment
fn literal_value(expr: &Expr) -> Option<Udm> {
    match expr {
        Expr::Null(_) => Some(Udm::Null),
        Expr::Bool(b, _) => Some(Udm::Bool(*b)),
        Expr::Int(n, _) => Some(Udm::Int(*n)),
        Expr::Float(n, _) => Some(Udm::Float(*n)),
        Expr::Str(s, _) => Some(Udm::string(s.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Position, Span};
    use crate::udm::ObjectBuilder;

    fn span() -> Span {
        Span::point(Position::start())
    }

    #[test]
    fn test_literal_pattern_numeric_equivalence() {
        let pattern = Pattern::Literal(Expr::Int(42, span()));
        assert!(match_pattern(&pattern, &Udm::Float(42.0)).is_some());
        assert!(match_pattern(&pattern, &Udm::Int(41)).is_none());
    }

    #[test]
    fn test_binding_pattern() {
        let pattern = Pattern::Binding("x".to_string());
        let bindings = match_pattern(&pattern, &Udm::Int(5)).unwrap();
        assert_eq!(bindings, vec![("x".to_string(), Udm::Int(5))]);
    }

    #[test]
    fn test_object_subset_pattern() {
        let mut builder = ObjectBuilder::new();
        builder.property("type", Udm::string("Product"));
        builder.property("sku", Udm::string("a-1"));
        let value = builder.build();

        let pattern = Pattern::Object(vec![(
            "type".to_string(),
            Pattern::Literal(Expr::Str("Product".to_string(), span())),
        )]);
        assert!(match_pattern(&pattern, &value).is_some());

        let wrong = Pattern::Object(vec![(
            "type".to_string(),
            Pattern::Literal(Expr::Str("Service".to_string(), span())),
        )]);
        assert!(match_pattern(&wrong, &value).is_none());
    }

    #[test]
    fn test_array_pattern_fixed_length() {
        let pattern = Pattern::Array(vec![
            Pattern::Binding("a".to_string()),
            Pattern::Binding("b".to_string()),
        ]);
        let two = Udm::Array(vec![Udm::Int(1), Udm::Int(2)]);
        let three = Udm::Array(vec![Udm::Int(1), Udm::Int(2), Udm::Int(3)]);
        assert_eq!(match_pattern(&pattern, &two).unwrap().len(), 2);
        assert!(match_pattern(&pattern, &three).is_none());
    }

    #[test]
    fn test_template_string_pattern_matches_name_hint() {
        let product = ObjectBuilder::named("Product").build();
        let pattern = Pattern::Literal(Expr::Str("Product".to_string(), span()));
        assert!(template_matches(&pattern, &product).is_some());
        let other = ObjectBuilder::named("Service").build();
        assert!(template_matches(&pattern, &other).is_none());
    }
}
