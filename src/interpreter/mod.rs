//! Evaluation: AST over an environment, producing UDM

pub mod environment;
pub mod eval;
pub mod pattern;
pub mod selector;
pub mod template;

pub use environment::{Binding, Env, Frame};
pub use eval::{evaluate_program, CancelToken, EvalOptions, Evaluator};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::parser::parse_program;
    use crate::udm::{ObjectBuilder, Udm};

    fn run_body(body: &str, input: Udm) -> Result<Udm, crate::error::Diagnostic> {
        let source = format!("%utlx 1.0\ninput json\noutput json\n---\n{}", body);
        let program = parse_program(&source).unwrap();
        evaluate_program(
            &program,
            &[("input".to_string(), input)],
            &EvalOptions::default(),
        )
    }

    fn items_input() -> Udm {
        let prices = [10, 20, 30]
            .iter()
            .map(|p| {
                let mut item = ObjectBuilder::new();
                item.property("p", Udm::Int(*p));
                item.build()
            })
            .collect::<Vec<_>>();
        let mut root = ObjectBuilder::new();
        root.property("items", Udm::Array(prices));
        root.build()
    }

    #[test]
    fn test_arithmetic_keeps_integers() {
        assert_eq!(run_body("1 + 2 * 3", Udm::Null).unwrap(), Udm::Int(7));
        assert_eq!(run_body("7 / 2", Udm::Null).unwrap(), Udm::Int(3));
        assert_eq!(run_body("7.0 / 2", Udm::Null).unwrap(), Udm::Float(3.5));
    }

    #[test]
    fn test_division_by_zero() {
        let err = run_body("1 / 0", Udm::Null).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DivisionByZero);
        let err = run_body("1 % 0", Udm::Null).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DivisionByZero);
    }

    #[test]
    fn test_string_concat() {
        assert_eq!(
            run_body("\"n=\" + 42.0", Udm::Null).unwrap(),
            Udm::string("n=42")
        );
    }

    #[test]
    fn test_pipeline_with_map_and_sum() {
        let result = run_body("sum($input.items |> map(x => x.p))", items_input()).unwrap();
        assert_eq!(result, Udm::Int(60));
    }

    #[test]
    fn test_if_requires_boolean() {
        let err = run_body("if (1) 2 else 3", Udm::Null).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
        assert_eq!(run_body("if (true) 2 else 3", Udm::Null).unwrap(), Udm::Int(2));
    }

    #[test]
    fn test_default_operator_coalesces_null_undefined_empty() {
        let mut input = ObjectBuilder::new();
        input.property("a", Udm::Null);
        input.property("b", Udm::string(""));
        input.property("c", Udm::Int(5));
        let input = input.build();

        assert_eq!(
            run_body("$input.a || 1", input.clone()).unwrap(),
            Udm::Int(1)
        );
        assert_eq!(
            run_body("$input.b || 2", input.clone()).unwrap(),
            Udm::Int(2)
        );
        assert_eq!(
            run_body("$input.missing || 3", input.clone()).unwrap(),
            Udm::Int(3)
        );
        assert_eq!(run_body("$input.c || 4", input).unwrap(), Udm::Int(5));
    }

    #[test]
    fn test_coalesce_keeps_empty_string() {
        let mut input = ObjectBuilder::new();
        input.property("b", Udm::string(""));
        let input = input.build();
        assert_eq!(
            run_body("$input.b ?? \"fallback\"", input.clone()).unwrap(),
            Udm::string("")
        );
        assert_eq!(
            run_body("$input.missing ?? \"fallback\"", input).unwrap(),
            Udm::string("fallback")
        );
    }

    #[test]
    fn test_null_vs_missing() {
        let mut input = ObjectBuilder::new();
        input.property("a", Udm::Null);
        let input = input.build();
        assert_eq!(run_body("$input.a", input.clone()).unwrap(), Udm::Null);
        let err = run_body("$input.nope", input).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SelectorFailure);
    }

    #[test]
    fn test_match_with_guard() {
        let result = run_body(
            "match 7 { n when n > 5 => \"big\", _ => \"small\" }",
            Udm::Null,
        )
        .unwrap();
        assert_eq!(result, Udm::string("big"));
    }

    #[test]
    fn test_object_literal_lets_visible_to_siblings() {
        let result = run_body("{let n = 6; double: n * 2}", Udm::Null).unwrap();
        match result {
            Udm::Object(obj) => {
                assert_eq!(obj.properties.get("double"), Some(&Udm::Int(12)));
                assert!(obj.properties.get("n").is_none());
            }
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn test_attribute_entry_numeric_fidelity() {
        let result = run_body("{Box: {@q: 42.0}}", Udm::Null).unwrap();
        match result {
            Udm::Object(root) => match root.properties.get("Box") {
                Some(Udm::Object(inner)) => {
                    assert_eq!(inner.attributes.get("q").map(String::as_str), Some("42"));
                }
                other => panic!("unexpected Box: {:?}", other),
            },
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn test_user_function_recursion() {
        let source = "%utlx 1.0\ninput json\noutput json\n---\nfunction fact(n: Number): Number = if (n <= 1) 1 else n * fact(n - 1)\nfact(5)";
        let program = parse_program(source).unwrap();
        let result = evaluate_program(
            &program,
            &[("input".to_string(), Udm::Null)],
            &EvalOptions::default(),
        )
        .unwrap();
        assert_eq!(result, Udm::Int(120));
    }

    #[test]
    fn test_backtrace_carries_function_names() {
        let source = "%utlx 1.0\ninput json\noutput json\n---\nfunction boom(n: Number): Number = n + {}\nboom(1)";
        let program = parse_program(source).unwrap();
        let err = evaluate_program(
            &program,
            &[("input".to_string(), Udm::Null)],
            &EvalOptions::default(),
        )
        .unwrap_err();
        assert!(err.frames.iter().any(|f| f.name == "boom"));
    }

    #[test]
    fn test_predicate_filter() {
        let result = run_body("$input.items[.p > 15]", items_input()).unwrap();
        match result {
            Udm::Array(kept) => assert_eq!(kept.len(), 2),
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn test_index_negative() {
        let result = run_body("$input.items[-1].p", items_input()).unwrap();
        assert_eq!(result, Udm::Int(30));
    }

    #[test]
    fn test_cancellation() {
        let source = "%utlx 1.0\ninput json\noutput json\n---\nsum($input.items |> map(x => x.p))";
        let program = parse_program(source).unwrap();
        let options = EvalOptions::default();
        options.cancel.cancel();
        let err = evaluate_program(
            &program,
            &[("input".to_string(), items_input())],
            &options,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cancelled);
    }

    #[test]
    fn test_template_dispatch_in_input_order() {
        let source = "%utlx 1.0\ninput json\noutput json\n---\ntemplate {kind: \"product\"} => \"P\"\ntemplate _ => \"other\"\napply($input.items)";
        let program = parse_program(source).unwrap();

        let mut product = ObjectBuilder::new();
        product.property("kind", Udm::string("product"));
        let mut service = ObjectBuilder::new();
        service.property("kind", Udm::string("service"));
        let mut input = ObjectBuilder::new();
        input.property(
            "items",
            Udm::Array(vec![product.build(), service.build()]),
        );

        let result = evaluate_program(
            &program,
            &[("input".to_string(), input.build())],
            &EvalOptions::default(),
        )
        .unwrap();
        assert_eq!(
            result,
            Udm::Array(vec![Udm::string("P"), Udm::string("other")])
        );
    }

    #[test]
    fn test_no_template_match() {
        let source = "%utlx 1.0\ninput json\noutput json\n---\ntemplate {kind: \"product\"} => \"P\"\napply($input.items)";
        let program = parse_program(source).unwrap();
        let mut odd = ObjectBuilder::new();
        odd.property("kind", Udm::string("mystery"));
        let mut input = ObjectBuilder::new();
        input.property("items", Udm::Array(vec![odd.build()]));
        let err = evaluate_program(
            &program,
            &[("input".to_string(), input.build())],
            &EvalOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoTemplateMatch);
    }
}
