//! Selector engine: navigation primitives over UDM
//!
//! Called by the evaluator for path expressions and directly by stdlib
//! functions that take path arguments. Everything here is deterministic:
//! results come back in document order (depth-first, then insertion order
//! of properties), so two runs over the same UDM serialize identically.

use crate::error::{Diagnostic, ErrorKind, Span};
use crate::parser::ast::Expr;
use crate::udm::Udm;

/// `.name` — property access. Objects answer from `properties`; arrays
/// broadcast over their elements (auto-map) and flatten one level. An
/// element where the property is absent drops out of the broadcast result,
/// node-set style; see [`broadcast`] for the exact contract.
pub fn member(value: &Udm, name: &str, span: Span) -> Result<Udm, Diagnostic> {
    match value {
        Udm::Object(obj) => match obj.properties.get(name) {
            Some(found) => Ok(found.clone()),
            None => Err(undefined(
                format!("property `{}` not found", name),
                span,
            )),
        },
        Udm::Array(items) => Ok(Udm::Array(broadcast(items, |item| {
            member(item, name, span)
        })?)),
        other => Err(type_mismatch(
            format!("cannot access property `{}` on {}", name, other.type_of()),
            span,
        )),
    }
}

/// `.@name` — attribute access, same broadcast rule as properties
pub fn attribute(value: &Udm, name: &str, span: Span) -> Result<Udm, Diagnostic> {
    match value {
        Udm::Object(obj) => match obj.attributes.get(name) {
            Some(found) => Ok(Udm::Str(found.clone())),
            None => Err(undefined(
                format!("attribute `{}` not found", name),
                span,
            )),
        },
        Udm::Array(items) => Ok(Udm::Array(broadcast(items, |item| {
            attribute(item, name, span)
        })?)),
        other => Err(type_mismatch(
            format!("cannot access attribute `{}` on {}", name, other.type_of()),
            span,
        )),
    }
}

/// `[n]` — integer indexing, 0-based, negative counts from the end
pub fn index(value: &Udm, idx: i64, span: Span) -> Result<Udm, Diagnostic> {
    match value {
        Udm::Array(items) => {
            let len = items.len() as i64;
            let resolved = if idx < 0 { len + idx } else { idx };
            if resolved < 0 || resolved >= len {
                Err(undefined(
                    format!("index {} out of bounds for array of length {}", idx, len),
                    span,
                ))
            } else {
                Ok(items[resolved as usize].clone())
            }
        }
        other => Err(type_mismatch(
            format!("cannot index into {}", other.type_of()),
            span,
        )),
    }
}

/// `..name` — pre-order recursive descent, collecting the value of every
/// `name` property, nested matches included
pub fn recursive_descent(value: &Udm, name: &str) -> Udm {
    let mut found = Vec::new();
    descend(value, name, &mut found);
    Udm::Array(found)
}

fn descend(value: &Udm, name: &str, found: &mut Vec<Udm>) {
    match value {
        Udm::Object(obj) => {
            if let Some(hit) = obj.properties.get(name) {
                found.push(hit.clone());
            }
            for child in obj.properties.values() {
                descend(child, name, found);
            }
        }
        Udm::Array(items) => {
            for item in items {
                descend(item, name, found);
            }
        }
        _ => {}
    }
}

/// `.*` — direct child values of an Object, or the array itself
pub fn wildcard(value: &Udm, span: Span) -> Result<Udm, Diagnostic> {
    match value {
        Udm::Object(obj) => Ok(Udm::Array(obj.properties.values().cloned().collect())),
        Udm::Array(items) => Ok(Udm::Array(items.clone())),
        other => Err(type_mismatch(
            format!("cannot enumerate children of {}", other.type_of()),
            span,
        )),
    }
}

/// Broadcast a selector over array elements, flattening one level.
///
/// An element where navigation comes back undefined (`SelectorFailure`)
/// drops out of the result, the way a node-set selection over a
/// heterogeneous document narrows to the nodes that have the step. Any
/// other failure, a `TypeMismatch` on a scalar element included, aborts
/// the whole broadcast.
fn broadcast<F>(items: &[Udm], mut access: F) -> Result<Vec<Udm>, Diagnostic>
where
    F: FnMut(&Udm) -> Result<Udm, Diagnostic>,
{
    let mut results = Vec::new();
    for item in items {
        match access(item) {
            Ok(Udm::Array(nested)) => results.extend(nested),
            Ok(single) => results.push(single),
            Err(diag) if diag.kind == ErrorKind::SelectorFailure => {}
            Err(diag) => return Err(diag),
        }
    }
    Ok(results)
}

/// Does the expression mention the current node (`.`)? Decides whether a
/// bracket expression is a predicate or an index.
pub fn uses_current_node(expr: &Expr) -> bool {
    match expr {
        Expr::CurrentNode(_) => true,
        Expr::Null(_)
        | Expr::Bool(_, _)
        | Expr::Int(_, _)
        | Expr::Float(_, _)
        | Expr::Str(_, _)
        | Expr::Ident(_, _)
        | Expr::InputRef(_, _) => false,
        Expr::Array(items, _) => items.iter().any(uses_current_node),
        Expr::Object(entries, _) => entries.iter().any(|entry| match entry {
            crate::parser::ast::ObjectEntry::Property { value, .. }
            | crate::parser::ast::ObjectEntry::Attribute { value, .. } => uses_current_node(value),
            crate::parser::ast::ObjectEntry::Let(binding) => uses_current_node(&binding.value),
        }),
        Expr::Member { target, .. }
        | Expr::Attribute { target, .. }
        | Expr::RecursiveDescent { target, .. }
        | Expr::Wildcard { target, .. } => uses_current_node(target),
        Expr::Index { target, index, .. } => uses_current_node(target) || uses_current_node(index),
        Expr::Unary { operand, .. } => uses_current_node(operand),
        Expr::Binary { left, right, .. } => uses_current_node(left) || uses_current_node(right),
        Expr::Call { callee, args, .. } => {
            uses_current_node(callee) || args.iter().any(uses_current_node)
        }
        Expr::Lambda { body, .. } => uses_current_node(body),
        Expr::If {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            uses_current_node(cond)
                || uses_current_node(then_branch)
                || uses_current_node(else_branch)
        }
        Expr::Match { scrutinee, cases, .. } => {
            uses_current_node(scrutinee)
                || cases.iter().any(|case| {
                    uses_current_node(&case.body)
                        || case.guard.as_ref().map(uses_current_node).unwrap_or(false)
                })
        }
        Expr::Apply { selector, .. } => uses_current_node(selector),
        Expr::Block { lets, value, .. } => {
            lets.iter().any(|binding| uses_current_node(&binding.value)) || uses_current_node(value)
        }
    }
}

fn undefined(message: String, span: Span) -> Diagnostic {
    Diagnostic::new(ErrorKind::SelectorFailure, message).with_span(span)
}

fn type_mismatch(message: String, span: Span) -> Diagnostic {
    Diagnostic::new(ErrorKind::TypeMismatch, message).with_span(span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::udm::ObjectBuilder;

    fn span() -> Span {
        Span::point(crate::error::Position::start())
    }

    fn order() -> Udm {
        let mut item1 = ObjectBuilder::new();
        item1.property("sku", Udm::string("a"));
        item1.property("qty", Udm::Int(2));
        let mut item2 = ObjectBuilder::new();
        item2.property("sku", Udm::string("b"));
        item2.property("qty", Udm::Int(5));
        let mut order = ObjectBuilder::named("Order");
        order.attribute("id", "A1");
        order.property("item", Udm::Array(vec![item1.build(), item2.build()]));
        order.build()
    }

    #[test]
    fn test_member_access() {
        let value = order();
        let items = member(&value, "item", span()).unwrap();
        assert_eq!(items.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_member_missing_is_selector_failure() {
        let err = member(&order(), "nope", span()).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::SelectorFailure);
    }

    #[test]
    fn test_member_on_scalar_is_type_mismatch() {
        let err = member(&Udm::Int(3), "x", span()).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_auto_map_over_array() {
        let value = order();
        let items = member(&value, "item", span()).unwrap();
        let skus = member(&items, "sku", span()).unwrap();
        assert_eq!(
            skus,
            Udm::Array(vec![Udm::string("a"), Udm::string("b")])
        );
    }

    #[test]
    fn test_broadcast_skips_missing_properties() {
        // An element lacking the property narrows the result, node-set
        // style; the shape change is the documented contract
        let mut with_a = ObjectBuilder::new();
        with_a.property("a", Udm::Int(1));
        let mut without_a = ObjectBuilder::new();
        without_a.property("b", Udm::Int(2));
        let mut with_a_again = ObjectBuilder::new();
        with_a_again.property("a", Udm::Int(3));
        let rows = Udm::Array(vec![with_a.build(), without_a.build(), with_a_again.build()]);
        assert_eq!(
            member(&rows, "a", span()).unwrap(),
            Udm::Array(vec![Udm::Int(1), Udm::Int(3)])
        );
    }

    #[test]
    fn test_broadcast_surfaces_type_errors() {
        // A scalar element is not "missing the property", it is the wrong
        // shape entirely; that aborts the broadcast
        let mut with_a = ObjectBuilder::new();
        with_a.property("a", Udm::Int(1));
        let rows = Udm::Array(vec![with_a.build(), Udm::Int(5)]);
        let err = member(&rows, "a", span()).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_attribute_access() {
        let id = attribute(&order(), "id", span()).unwrap();
        assert_eq!(id, Udm::string("A1"));
    }

    #[test]
    fn test_negative_index() {
        let value = Udm::Array(vec![Udm::Int(1), Udm::Int(2), Udm::Int(3)]);
        assert_eq!(index(&value, -1, span()).unwrap(), Udm::Int(3));
        assert_eq!(index(&value, 0, span()).unwrap(), Udm::Int(1));
        assert!(index(&value, 3, span()).is_err());
    }

    #[test]
    fn test_recursive_descent_collects_in_document_order() {
        let hits = recursive_descent(&order(), "sku");
        assert_eq!(
            hits,
            Udm::Array(vec![Udm::string("a"), Udm::string("b")])
        );
    }

    #[test]
    fn test_wildcard_on_object_and_array() {
        let value = order();
        let children = wildcard(&value, span()).unwrap();
        assert_eq!(children.as_array().unwrap().len(), 1);
        let arr = Udm::Array(vec![Udm::Int(1)]);
        assert_eq!(wildcard(&arr, span()).unwrap(), arr);
    }

    #[test]
    fn test_uses_current_node() {
        let pred = crate::parser::parse_expression(".qty > 3").unwrap();
        assert!(uses_current_node(&pred));
        let idx = crate::parser::parse_expression("1 + 2").unwrap();
        assert!(!uses_current_node(&idx));
    }
}
