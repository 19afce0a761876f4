//! Deep comparison over UDM values
//!
//! The language's `==` and the ordering used by `sort`/`sortBy` live here.
//! Unlike the structural `PartialEq` impl, `deep_equal` honors numeric
//! equivalence: an integer `42` equals a floating-point `42.0`.

use std::cmp::Ordering;

use super::Udm;

/// Language-level equality: numeric-equivalent, order-sensitive for arrays,
/// insertion-order-insensitive for object keys (two objects are equal when
/// they hold equal values under the same key set, whatever the order).
pub fn deep_equal(a: &Udm, b: &Udm) -> bool {
    match (a, b) {
        (Udm::Int(x), Udm::Float(y)) | (Udm::Float(y), Udm::Int(x)) => (*x as f64) == *y,
        (Udm::Array(xs), Udm::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| deep_equal(x, y))
        }
        (Udm::Object(x), Udm::Object(y)) => {
            x.attributes == y.attributes
                && x.properties.len() == y.properties.len()
                && x.properties.iter().all(|(key, value)| {
                    y.properties
                        .get(key)
                        .map(|other| deep_equal(value, other))
                        .unwrap_or(false)
                })
        }
        _ => a == b,
    }
}

/// Total-enough ordering for sorting. Values of different types order by a
/// fixed type rank so `sort` never panics on mixed arrays.
pub fn compare(a: &Udm, b: &Udm) -> Ordering {
    match (a, b) {
        (Udm::Int(x), Udm::Int(y)) => x.cmp(y),
        (Udm::Int(x), Udm::Float(y)) => cmp_f64(*x as f64, *y),
        (Udm::Float(x), Udm::Int(y)) => cmp_f64(*x, *y as f64),
        (Udm::Float(x), Udm::Float(y)) => cmp_f64(*x, *y),
        (Udm::Str(x), Udm::Str(y)) => x.cmp(y),
        (Udm::Bool(x), Udm::Bool(y)) => x.cmp(y),
        (Udm::DateTime(x), Udm::DateTime(y)) => x.cmp(y),
        (Udm::Date(x), Udm::Date(y)) => x.cmp(y),
        (Udm::LocalDateTime(x), Udm::LocalDateTime(y)) => x.cmp(y),
        (Udm::Time(x), Udm::Time(y)) => x.cmp(y),
        (Udm::Array(xs), Udm::Array(ys)) => {
            for (x, y) in xs.iter().zip(ys.iter()) {
                match compare(x, y) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            xs.len().cmp(&ys.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn cmp_f64(x: f64, y: f64) -> Ordering {
    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
}

fn type_rank(value: &Udm) -> u8 {
    match value {
        Udm::Null => 0,
        Udm::Bool(_) => 1,
        Udm::Int(_) | Udm::Float(_) => 2,
        Udm::Str(_) => 3,
        Udm::Date(_) => 4,
        Udm::Time(_) => 5,
        Udm::LocalDateTime(_) => 6,
        Udm::DateTime(_) => 7,
        Udm::Binary { .. } => 8,
        Udm::Array(_) => 9,
        Udm::Object(_) => 10,
        Udm::Lambda(_) => 11,
    }
}
