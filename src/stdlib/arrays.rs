//! Array functions
//!
//! The higher-order entries (`map`, `filter`, `reduce`, `flatMap`) require
//! an actual array: unlike selectors, they never lift a single value to a
//! singleton, and fail with `TypeMismatch` instead. Reducers check the
//! cancellation token at every loop head.

use indexmap::IndexMap;

use crate::error::{Diagnostic, ErrorKind, Span};
use crate::interpreter::Evaluator;
use crate::udm::{coerce, compare, deep_equal, ObjectBuilder, Udm};

use super::{arg_error, want_int, want_lambda};

/// Strict array reading for the higher-order functions: `TypeMismatch` on
/// anything else, by contract
fn want_array_strict(func: &str, value: &Udm) -> Result<Vec<Udm>, Diagnostic> {
    match coerce::unwrap_text(value) {
        Udm::Array(items) => Ok(items.clone()),
        other => Err(Diagnostic::new(
            ErrorKind::TypeMismatch,
            format!("`{}` needs an array, found {}", func, other.type_of()),
        )),
    }
}

fn want_array(func: &str, value: &Udm) -> Result<Vec<Udm>, Diagnostic> {
    match coerce::unwrap_text(value) {
        Udm::Array(items) => Ok(items.clone()),
        other => Err(arg_error(func, "an array", other)),
    }
}

pub fn map(ev: &mut Evaluator, args: Vec<Udm>, span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array_strict("map", &args[0])?;
    want_lambda("map", &args[1])?;
    let mut results = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        ev.check_cancel(span)?;
        let mapped = if mapper_arity(&args[1]) >= 2 {
            ev.call_function(&args[1], vec![item, Udm::Int(i as i64)], span)?
        } else {
            ev.call_function(&args[1], vec![item], span)?
        };
        results.push(mapped);
    }
    Ok(Udm::Array(results))
}

pub fn filter(ev: &mut Evaluator, args: Vec<Udm>, span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array_strict("filter", &args[0])?;
    want_lambda("filter", &args[1])?;
    let mut kept = Vec::new();
    for (i, item) in items.into_iter().enumerate() {
        ev.check_cancel(span)?;
        let verdict = if mapper_arity(&args[1]) >= 2 {
            ev.call_function(&args[1], vec![item.clone(), Udm::Int(i as i64)], span)?
        } else {
            ev.call_function(&args[1], vec![item.clone()], span)?
        };
        match coerce::unwrap_text(&verdict) {
            Udm::Bool(true) => kept.push(item),
            Udm::Bool(false) => {}
            other => {
                return Err(arg_error("filter", "a boolean from its predicate", other));
            }
        }
    }
    Ok(Udm::Array(kept))
}

pub fn reduce(ev: &mut Evaluator, args: Vec<Udm>, span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array_strict("reduce", &args[0])?;
    want_lambda("reduce", &args[1])?;
    let mut acc = args[2].clone();
    for item in items {
        ev.check_cancel(span)?;
        acc = ev.call_function(&args[1], vec![acc, item], span)?;
    }
    Ok(acc)
}

pub fn flat_map(ev: &mut Evaluator, args: Vec<Udm>, span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array_strict("flatMap", &args[0])?;
    want_lambda("flatMap", &args[1])?;
    let mut results = Vec::new();
    for item in items {
        ev.check_cancel(span)?;
        let mapped = ev.call_function(&args[1], vec![item], span)?;
        match mapped {
            Udm::Array(nested) => results.extend(nested),
            single => results.push(single),
        }
    }
    Ok(Udm::Array(results))
}

/// Flatten nested arrays one level, or `n` levels when given
pub fn flatten(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array("flatten", &args[0])?;
    let depth = if args.len() > 1 {
        want_int("flatten", &args[1])?.max(0)
    } else {
        1
    };
    fn go(items: Vec<Udm>, depth: i64) -> Vec<Udm> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Udm::Array(nested) if depth > 0 => out.extend(go(nested, depth - 1)),
                other => out.push(other),
            }
        }
        out
    }
    Ok(Udm::Array(go(items, depth)))
}

pub fn sum(ev: &mut Evaluator, args: Vec<Udm>, span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array("sum", &args[0])?;
    let mut int_total: i64 = 0;
    let mut float_total: f64 = 0.0;
    let mut saw_float = false;
    for item in &items {
        ev.check_cancel(span)?;
        match coerce::unwrap_text(item) {
            Udm::Int(n) => int_total += n,
            Udm::Float(n) => {
                saw_float = true;
                float_total += n;
            }
            other => return Err(arg_error("sum", "an array of numbers", other)),
        }
    }
    if saw_float {
        Ok(Udm::Float(float_total + int_total as f64))
    } else {
        Ok(Udm::Int(int_total))
    }
}

pub fn avg(ev: &mut Evaluator, args: Vec<Udm>, span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array("avg", &args[0])?;
    if items.is_empty() {
        return Ok(Udm::Null);
    }
    let count = items.len() as f64;
    let total = match sum(ev, vec![Udm::Array(items)], span)? {
        Udm::Int(n) => n as f64,
        Udm::Float(n) => n,
        _ => unreachable!("sum returns a number"),
    };
    Ok(Udm::Float(total / count))
}

pub fn min(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    extremum("min", &args[0], std::cmp::Ordering::Less)
}

pub fn max(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    extremum("max", &args[0], std::cmp::Ordering::Greater)
}

fn extremum(func: &str, value: &Udm, keep: std::cmp::Ordering) -> Result<Udm, Diagnostic> {
    let items = want_array(func, value)?;
    let mut best: Option<Udm> = None;
    for item in items {
        let candidate = coerce::unwrap_text(&item).clone();
        best = Some(match best {
            None => candidate,
            Some(current) => {
                if compare(&candidate, &current) == keep {
                    candidate
                } else {
                    current
                }
            }
        });
    }
    Ok(best.unwrap_or(Udm::Null))
}

pub fn first(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array("first", &args[0])?;
    Ok(items.into_iter().next().unwrap_or(Udm::Null))
}

pub fn last(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array("last", &args[0])?;
    Ok(items.into_iter().next_back().unwrap_or(Udm::Null))
}

pub fn tail(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array("tail", &args[0])?;
    Ok(Udm::Array(items.into_iter().skip(1).collect()))
}

pub fn take(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array("take", &args[0])?;
    let n = want_int("take", &args[1])?.max(0) as usize;
    Ok(Udm::Array(items.into_iter().take(n).collect()))
}

pub fn drop(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array("drop", &args[0])?;
    let n = want_int("drop", &args[1])?.max(0) as usize;
    Ok(Udm::Array(items.into_iter().skip(n).collect()))
}

pub fn slice(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array("slice", &args[0])?;
    let len = items.len() as i64;
    let clamp = |idx: i64| -> usize {
        let resolved = if idx < 0 { len + idx } else { idx };
        resolved.clamp(0, len) as usize
    };
    let start = clamp(want_int("slice", &args[1])?);
    let end = if args.len() > 2 {
        clamp(want_int("slice", &args[2])?)
    } else {
        len as usize
    };
    if start >= end {
        return Ok(Udm::Array(Vec::new()));
    }
    Ok(Udm::Array(items[start..end].to_vec()))
}

/// Stable sort by the natural ordering
pub fn sort(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let mut items = want_array("sort", &args[0])?;
    items.sort_by(compare);
    Ok(Udm::Array(items))
}

/// Stable sort by a key function: equal keys keep their input order
pub fn sort_by(ev: &mut Evaluator, args: Vec<Udm>, span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array("sortBy", &args[0])?;
    want_lambda("sortBy", &args[1])?;
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        ev.check_cancel(span)?;
        let key = ev.call_function(&args[1], vec![item.clone()], span)?;
        keyed.push((key, item));
    }
    keyed.sort_by(|(a, _), (b, _)| compare(a, b));
    Ok(Udm::Array(keyed.into_iter().map(|(_, item)| item).collect()))
}

/// First-occurrence order is preserved
pub fn distinct(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array("distinct", &args[0])?;
    let mut seen: Vec<Udm> = Vec::new();
    for item in items {
        if !seen.iter().any(|prior| deep_equal(prior, &item)) {
            seen.push(item);
        }
    }
    Ok(Udm::Array(seen))
}

pub fn distinct_by(ev: &mut Evaluator, args: Vec<Udm>, span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array("distinctBy", &args[0])?;
    want_lambda("distinctBy", &args[1])?;
    let mut seen_keys: Vec<Udm> = Vec::new();
    let mut kept = Vec::new();
    for item in items {
        ev.check_cancel(span)?;
        let key = ev.call_function(&args[1], vec![item.clone()], span)?;
        if !seen_keys.iter().any(|prior| deep_equal(prior, &key)) {
            seen_keys.push(key);
            kept.push(item);
        }
    }
    Ok(Udm::Array(kept))
}

/// Group into an object; key order and in-group order both follow first
/// appearance
pub fn group_by(ev: &mut Evaluator, args: Vec<Udm>, span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array("groupBy", &args[0])?;
    want_lambda("groupBy", &args[1])?;
    let mut groups: IndexMap<String, Vec<Udm>> = IndexMap::new();
    for item in items {
        ev.check_cancel(span)?;
        let key = ev.call_function(&args[1], vec![item.clone()], span)?;
        let key = coerce::to_display_string(&key);
        groups.entry(key).or_default().push(item);
    }
    let mut builder = ObjectBuilder::new();
    for (key, members) in groups {
        builder.property(key, Udm::Array(members));
    }
    Ok(builder.build())
}

pub fn zip(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let left = want_array("zip", &args[0])?;
    let right = want_array("zip", &args[1])?;
    let pairs = left
        .into_iter()
        .zip(right)
        .map(|(a, b)| Udm::Array(vec![a, b]))
        .collect();
    Ok(Udm::Array(pairs))
}

pub fn unzip(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let pairs = want_array("unzip", &args[0])?;
    let mut lefts = Vec::with_capacity(pairs.len());
    let mut rights = Vec::with_capacity(pairs.len());
    for pair in pairs {
        match pair {
            Udm::Array(items) if items.len() == 2 => {
                let mut it = items.into_iter();
                lefts.push(it.next().unwrap());
                rights.push(it.next().unwrap());
            }
            other => return Err(arg_error("unzip", "an array of pairs", &other)),
        }
    }
    Ok(Udm::Array(vec![Udm::Array(lefts), Udm::Array(rights)]))
}

/// Index of the first element equal to the given value, -1 when absent;
/// the value-based sibling of the predicate-based `findIndex`
pub fn index_of_item(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array("indexOfItem", &args[0])?;
    for (i, item) in items.iter().enumerate() {
        if deep_equal(item, &args[1]) {
            return Ok(Udm::Int(i as i64));
        }
    }
    Ok(Udm::Int(-1))
}

pub fn find(ev: &mut Evaluator, args: Vec<Udm>, span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array("find", &args[0])?;
    want_lambda("find", &args[1])?;
    for item in items {
        ev.check_cancel(span)?;
        let verdict = ev.call_function(&args[1], vec![item.clone()], span)?;
        if matches!(coerce::unwrap_text(&verdict), Udm::Bool(true)) {
            return Ok(item);
        }
    }
    Ok(Udm::Null)
}

pub fn find_index(ev: &mut Evaluator, args: Vec<Udm>, span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array("findIndex", &args[0])?;
    want_lambda("findIndex", &args[1])?;
    for (i, item) in items.into_iter().enumerate() {
        ev.check_cancel(span)?;
        let verdict = ev.call_function(&args[1], vec![item], span)?;
        if matches!(coerce::unwrap_text(&verdict), Udm::Bool(true)) {
            return Ok(Udm::Int(i as i64));
        }
    }
    Ok(Udm::Int(-1))
}

pub fn every(ev: &mut Evaluator, args: Vec<Udm>, span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array("every", &args[0])?;
    want_lambda("every", &args[1])?;
    for item in items {
        ev.check_cancel(span)?;
        let verdict = ev.call_function(&args[1], vec![item], span)?;
        if !matches!(coerce::unwrap_text(&verdict), Udm::Bool(true)) {
            return Ok(Udm::Bool(false));
        }
    }
    Ok(Udm::Bool(true))
}

pub fn some(ev: &mut Evaluator, args: Vec<Udm>, span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array("some", &args[0])?;
    want_lambda("some", &args[1])?;
    for item in items {
        ev.check_cancel(span)?;
        let verdict = ev.call_function(&args[1], vec![item], span)?;
        if matches!(coerce::unwrap_text(&verdict), Udm::Bool(true)) {
            return Ok(Udm::Bool(true));
        }
    }
    Ok(Udm::Bool(false))
}

/// Half-open integer range with an optional step
pub fn range(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let start = want_int("range", &args[0])?;
    let end = want_int("range", &args[1])?;
    let step = if args.len() > 2 {
        want_int("range", &args[2])?
    } else {
        1
    };
    if step == 0 {
        return Err(arg_error("range", "a non-zero step", &args[2]));
    }
    let mut out = Vec::new();
    let mut current = start;
    while (step > 0 && current < end) || (step < 0 && current > end) {
        out.push(Udm::Int(current));
        current += step;
    }
    Ok(Udm::Array(out))
}

pub fn chunk(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array("chunk", &args[0])?;
    let size = want_int("chunk", &args[1])?;
    if size <= 0 {
        return Err(arg_error("chunk", "a positive chunk size", &args[1]));
    }
    let chunks = items
        .chunks(size as usize)
        .map(|window| Udm::Array(window.to_vec()))
        .collect();
    Ok(Udm::Array(chunks))
}

pub fn append(_ev: &mut Evaluator, mut args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let mut items = want_array("append", &args[0])?;
    items.push(args.remove(1));
    Ok(Udm::Array(items))
}

pub fn prepend(_ev: &mut Evaluator, mut args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let items = want_array("prepend", &args[0])?;
    let mut out = vec![args.remove(1)];
    out.extend(items);
    Ok(Udm::Array(out))
}

/// Concatenate any number of arrays
pub fn concat(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let mut out = Vec::new();
    for arg in &args {
        out.extend(want_array("concat", arg)?);
    }
    Ok(Udm::Array(out))
}

/// Parameter count of a lambda value, 0 for anything else; lets `map` pass
/// the element index to two-parameter mappers
fn mapper_arity(value: &Udm) -> usize {
    match value {
        Udm::Lambda(lambda) => lambda.params.len(),
        _ => 0,
    }
}
