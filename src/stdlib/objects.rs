//! Object functions

use crate::error::{Diagnostic, Span};
use crate::interpreter::Evaluator;
use crate::udm::{coerce, Object, ObjectBuilder, Udm};

use super::{arg_error, want_lambda, want_str};

fn want_object(func: &str, value: &Udm) -> Result<Object, Diagnostic> {
    match value {
        Udm::Object(obj) => Ok(obj.clone()),
        other => Err(arg_error(func, "an object", other)),
    }
}

pub fn keys(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let obj = want_object("keys", &args[0])?;
    Ok(Udm::Array(
        obj.properties.keys().cloned().map(Udm::Str).collect(),
    ))
}

pub fn values(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let obj = want_object("values", &args[0])?;
    Ok(Udm::Array(obj.properties.values().cloned().collect()))
}

/// `[{key, value}]` pairs in insertion order
pub fn entries(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let obj = want_object("entries", &args[0])?;
    let mut out = Vec::with_capacity(obj.properties.len());
    for (key, value) in &obj.properties {
        let mut entry = ObjectBuilder::new();
        entry.property("key", Udm::string(key.clone()));
        entry.property("value", value.clone());
        out.push(entry.build());
    }
    Ok(Udm::Array(out))
}

pub fn from_entries(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let pairs = match &args[0] {
        Udm::Array(items) => items.clone(),
        other => return Err(arg_error("fromEntries", "an array of {key, value} objects", other)),
    };
    let mut builder = ObjectBuilder::new();
    for pair in pairs {
        let obj = want_object("fromEntries", &pair)?;
        let key = match obj.properties.get("key") {
            Some(k) => coerce::to_display_string(k),
            None => return Err(arg_error("fromEntries", "entries with a `key` property", &pair)),
        };
        let value = obj.properties.get("value").cloned().unwrap_or(Udm::Null);
        builder.property(key, value);
    }
    Ok(builder.build())
}

/// Shallow merge, later arguments winning; attributes merge the same way
pub fn merge(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let mut builder = ObjectBuilder::new();
    for arg in &args {
        let obj = want_object("merge", arg)?;
        for (key, value) in obj.properties {
            builder.property(key, value);
        }
        for (key, value) in obj.attributes {
            builder.attribute(key, value);
        }
    }
    Ok(builder.build())
}

pub fn pick(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let obj = want_object("pick", &args[0])?;
    let wanted = key_list("pick", &args[1])?;
    let mut builder = ObjectBuilder::new();
    for (key, value) in obj.properties {
        if wanted.iter().any(|w| w == &key) {
            builder.property(key, value);
        }
    }
    Ok(builder.build())
}

pub fn omit(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let obj = want_object("omit", &args[0])?;
    let unwanted = key_list("omit", &args[1])?;
    let mut builder = ObjectBuilder::new();
    for (key, value) in obj.properties {
        if !unwanted.iter().any(|w| w == &key) {
            builder.property(key, value);
        }
    }
    Ok(builder.build())
}

pub fn has_key(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let obj = want_object("hasKey", &args[0])?;
    let key = want_str("hasKey", &args[1])?;
    Ok(Udm::Bool(obj.properties.contains_key(&key)))
}

/// Property lookup with an optional default instead of a failure
pub fn get(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let obj = want_object("get", &args[0])?;
    let key = want_str("get", &args[1])?;
    match obj.properties.get(&key) {
        Some(value) => Ok(value.clone()),
        None => Ok(args.get(2).cloned().unwrap_or(Udm::Null)),
    }
}

pub fn map_values(ev: &mut Evaluator, args: Vec<Udm>, span: Span) -> Result<Udm, Diagnostic> {
    let obj = want_object("mapValues", &args[0])?;
    want_lambda("mapValues", &args[1])?;
    let mut builder = ObjectBuilder::new();
    if let Some(name) = &obj.name {
        builder.set_name(name.clone());
    }
    for (key, value) in obj.attributes {
        builder.attribute(key, value);
    }
    for (key, value) in obj.properties {
        ev.check_cancel(span)?;
        let mapped = ev.call_function(&args[1], vec![value, Udm::string(key.clone())], span)?;
        builder.property(key, mapped);
    }
    Ok(builder.build())
}

/// Keep the properties whose key satisfies the predicate; a two-parameter
/// predicate also receives the value. Name hint and attributes carry over.
pub fn filter_keys(ev: &mut Evaluator, args: Vec<Udm>, span: Span) -> Result<Udm, Diagnostic> {
    let obj = want_object("filterKeys", &args[0])?;
    want_lambda("filterKeys", &args[1])?;
    let wants_value = matches!(&args[1], Udm::Lambda(lambda) if lambda.params.len() >= 2);
    let mut builder = ObjectBuilder::new();
    if let Some(name) = &obj.name {
        builder.set_name(name.clone());
    }
    for (key, value) in obj.attributes {
        builder.attribute(key, value);
    }
    for (key, value) in obj.properties {
        ev.check_cancel(span)?;
        let verdict = if wants_value {
            ev.call_function(
                &args[1],
                vec![Udm::string(key.clone()), value.clone()],
                span,
            )?
        } else {
            ev.call_function(&args[1], vec![Udm::string(key.clone())], span)?
        };
        match coerce::unwrap_text(&verdict) {
            Udm::Bool(true) => {
                builder.property(key, value);
            }
            Udm::Bool(false) => {}
            other => {
                return Err(arg_error("filterKeys", "a boolean from its predicate", other));
            }
        }
    }
    Ok(builder.build())
}

pub fn remove_key(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let obj = want_object("removeKey", &args[0])?;
    let key = want_str("removeKey", &args[1])?;
    let mut builder = ObjectBuilder::new();
    if let Some(name) = &obj.name {
        builder.set_name(name.clone());
    }
    for (k, v) in obj.attributes {
        builder.attribute(k, v);
    }
    for (k, v) in obj.properties {
        if k != key {
            builder.property(k, v);
        }
    }
    Ok(builder.build())
}

fn key_list(func: &str, value: &Udm) -> Result<Vec<String>, Diagnostic> {
    match value {
        Udm::Array(items) => items.iter().map(|item| want_str(func, item)).collect(),
        Udm::Str(s) => Ok(vec![s.clone()]),
        other => Err(arg_error(func, "a key or array of keys", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Position;
    use crate::interpreter::EvalOptions;
    use crate::parser::ast::TemplateDef;

    fn ev() -> Evaluator<'static> {
        static NO_TEMPLATES: &[TemplateDef] = &[];
        Evaluator::new(NO_TEMPLATES, &EvalOptions::default())
    }

    fn span() -> Span {
        Span::point(Position::start())
    }

    fn sample() -> Udm {
        let mut b = ObjectBuilder::new();
        b.property("a", Udm::Int(1));
        b.property("b", Udm::Int(2));
        b.property("c", Udm::Int(3));
        b.build()
    }

    #[test]
    fn test_keys_in_insertion_order() {
        let mut e = ev();
        assert_eq!(
            keys(&mut e, vec![sample()], span()).unwrap(),
            Udm::Array(vec![Udm::string("a"), Udm::string("b"), Udm::string("c")])
        );
    }

    #[test]
    fn test_entries_round_trip() {
        let mut e = ev();
        let listed = entries(&mut e, vec![sample()], span()).unwrap();
        let rebuilt = from_entries(&mut e, vec![listed], span()).unwrap();
        assert!(crate::udm::deep_equal(&rebuilt, &sample()));
    }

    #[test]
    fn test_merge_later_wins() {
        let mut e = ev();
        let mut other = ObjectBuilder::new();
        other.property("b", Udm::Int(9));
        other.property("d", Udm::Int(4));
        let merged = merge(&mut e, vec![sample(), other.build()], span()).unwrap();
        let obj = merged.as_object().unwrap();
        assert_eq!(obj.properties.get("b"), Some(&Udm::Int(9)));
        assert_eq!(obj.properties.get("d"), Some(&Udm::Int(4)));
        let keys: Vec<&str> = obj.properties.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_pick_and_omit() {
        let mut e = ev();
        let picked = pick(
            &mut e,
            vec![sample(), Udm::Array(vec![Udm::string("a"), Udm::string("c")])],
            span(),
        )
        .unwrap();
        let keys: Vec<&str> = picked
            .as_object()
            .unwrap()
            .properties
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["a", "c"]);

        let omitted = omit(&mut e, vec![sample(), Udm::string("b")], span()).unwrap();
        assert!(!omitted.as_object().unwrap().properties.contains_key("b"));
    }

    #[test]
    fn test_filter_keys_by_predicate() {
        let mut e = ev();
        let predicate = make_lambda("k", "startsWith(k, \"a\")");
        let mut obj = ObjectBuilder::new();
        obj.property("alpha", Udm::Int(1));
        obj.property("beta", Udm::Int(2));
        obj.property("arc", Udm::Int(3));
        let kept = filter_keys(&mut e, vec![obj.build(), predicate], span()).unwrap();
        let keys: Vec<&str> = kept
            .as_object()
            .unwrap()
            .properties
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["alpha", "arc"]);
    }

    fn make_lambda(param: &str, body: &str) -> Udm {
        use crate::interpreter::Frame;
        use crate::udm::LambdaValue;
        let body = crate::parser::parse_expression(body).unwrap();
        Udm::Lambda(std::rc::Rc::new(LambdaValue {
            params: vec![crate::parser::ast::Param {
                name: param.to_string(),
                ty: None,
                span: span(),
            }],
            body,
            env: {
                let root = Frame::root();
                for entry in crate::stdlib::registry() {
                    root.define(entry.name, crate::interpreter::Binding::Stdlib(entry));
                }
                root
            },
            name: None,
        }))
    }

    #[test]
    fn test_get_with_default() {
        let mut e = ev();
        assert_eq!(
            get(&mut e, vec![sample(), Udm::string("a")], span()).unwrap(),
            Udm::Int(1)
        );
        assert_eq!(
            get(&mut e, vec![sample(), Udm::string("zz"), Udm::Int(0)], span()).unwrap(),
            Udm::Int(0)
        );
    }
}
