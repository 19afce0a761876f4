//! Selector semantics through whole programs: auto-map broadcasting,
//! predicates, recursive descent, wildcards, and the determinism the
//! engine guarantees for all of them.

use std::collections::HashMap;

use utlx::api::{compile, run, RunOptions};

fn eval(body: &str, input: &str) -> String {
    let source = format!("%utlx 1.0\ninput json\noutput json\n---\n{}", body);
    let program = compile(&source).expect("program should compile");
    let mut inputs = HashMap::new();
    inputs.insert("input".to_string(), input.as_bytes().to_vec());
    let output = run(&program, &inputs, &RunOptions::default()).expect("program should run");
    String::from_utf8(output).expect("output should be UTF-8")
}

const ORDER: &str = r#"{
    "Order": {
        "@id": "A1",
        "items": [
            {"sku": "a", "qty": 2, "price": 10},
            {"sku": "b", "qty": 1, "price": 25},
            {"sku": "c", "qty": 7, "price": 3}
        ],
        "meta": {"price": 0}
    }
}"#;

#[test]
fn test_member_then_auto_map() {
    assert_eq!(
        eval("$input.Order.items.sku", ORDER),
        r#"["a","b","c"]"#
    );
}

#[test]
fn test_attribute_access() {
    assert_eq!(eval("$input.Order.@id", ORDER), r#""A1""#);
}

#[test]
fn test_index_and_negative_index() {
    assert_eq!(eval("$input.Order.items[0].sku", ORDER), r#""a""#);
    assert_eq!(eval("$input.Order.items[-1].sku", ORDER), r#""c""#);
}

#[test]
fn test_predicate_filter_with_current_node() {
    assert_eq!(
        eval("$input.Order.items[.qty > 1].sku", ORDER),
        r#"["a","c"]"#
    );
}

#[test]
fn test_lambda_predicate_in_brackets() {
    assert_eq!(
        eval("let keep = x => x.price < 20;\n$input.Order.items[keep].sku", ORDER),
        r#"["a","c"]"#
    );
}

#[test]
fn test_recursive_descent_document_order() {
    assert_eq!(eval("$input..price", ORDER), "[10,25,3,0]");
}

#[test]
fn test_wildcard_children() {
    assert_eq!(
        eval("length($input.Order.*)", ORDER),
        "2" // items and meta
    );
}

#[test]
fn test_auto_map_skips_elements_without_property() {
    let input = r#"{"rows":[{"a":1},{"b":2},{"a":3}]}"#;
    assert_eq!(eval("$input.rows.a", input), "[1,3]");
}

#[test]
fn test_selector_results_are_stable_across_runs() {
    let source = format!(
        "%utlx 1.0\ninput json\noutput json\n---\n{}",
        "{prices: $input..price, children: $input.Order.*, skus: $input.Order.items.sku}"
    );
    let program = compile(&source).unwrap();
    let mut inputs = HashMap::new();
    inputs.insert("input".to_string(), ORDER.as_bytes().to_vec());
    let first = run(&program, &inputs, &RunOptions::default()).unwrap();
    let second = run(&program, &inputs, &RunOptions::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_template_dispatch_is_deterministic() {
    let source = "%utlx 1.0\ninput json\noutput json\n---\n\
                  template {sku: \"a\"} => \"first\"\n\
                  template _ => \"rest\"\n\
                  apply($input.Order.items)";
    let program = compile(source).unwrap();
    let mut inputs = HashMap::new();
    inputs.insert("input".to_string(), ORDER.as_bytes().to_vec());
    let first = run(&program, &inputs, &RunOptions::default()).unwrap();
    let second = run(&program, &inputs, &RunOptions::default()).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        String::from_utf8(first).unwrap(),
        r#"["first","rest","rest"]"#
    );
}

#[test]
fn test_automatic_unwrapping_in_comparisons() {
    // Elements whose only structured content is text behave as that text
    let source = "%utlx 1.0\ninput xml\noutput json\n---\n\
                  {eq: $input.Order.Qty == \"2\", sum: toNumber($input.Order.Qty) + 1}";
    let program = compile(source).unwrap();
    let mut inputs = HashMap::new();
    inputs.insert(
        "input".to_string(),
        br#"<Order><Qty>2</Qty></Order>"#.to_vec(),
    );
    let output = run(&program, &inputs, &RunOptions::default()).unwrap();
    assert_eq!(
        String::from_utf8(output).unwrap(),
        r#"{"eq":true,"sum":3}"#
    );
}
