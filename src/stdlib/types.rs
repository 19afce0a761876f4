//! Type probes and logical helpers

use crate::error::{Diagnostic, Span};
use crate::interpreter::Evaluator;
use crate::udm::{coerce, Udm};

use super::arg_error;

pub fn type_of(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::string(args[0].type_of()))
}

pub fn is_string(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Bool(matches!(
        coerce::unwrap_text(&args[0]),
        Udm::Str(_)
    )))
}

pub fn is_number(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Bool(matches!(
        coerce::unwrap_text(&args[0]),
        Udm::Int(_) | Udm::Float(_)
    )))
}

pub fn is_integer(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Bool(matches!(
        coerce::unwrap_text(&args[0]),
        Udm::Int(_)
    )))
}

pub fn is_boolean(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Bool(matches!(
        coerce::unwrap_text(&args[0]),
        Udm::Bool(_)
    )))
}

pub fn is_null(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Bool(matches!(args[0], Udm::Null)))
}

pub fn is_array(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Bool(matches!(args[0], Udm::Array(_))))
}

pub fn is_object(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Bool(matches!(args[0], Udm::Object(_))))
}

pub fn is_date(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Bool(matches!(
        args[0],
        Udm::Date(_) | Udm::DateTime(_) | Udm::LocalDateTime(_) | Udm::Time(_)
    )))
}

pub fn is_binary(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Bool(matches!(args[0], Udm::Binary { .. })))
}

pub fn is_lambda(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Bool(matches!(args[0], Udm::Lambda(_))))
}

pub fn is_empty(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Bool(coerce::unwrap_text(&args[0]).is_empty()))
}

/// The explicit form of `||`: the second argument when the first is null or
/// an empty string
pub fn default(_ev: &mut Evaluator, mut args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let fallback = args.remove(1);
    let value = args.remove(0);
    let empty = matches!(coerce::unwrap_text(&value), Udm::Null)
        || matches!(coerce::unwrap_text(&value), Udm::Str(s) if s.is_empty());
    Ok(if empty { fallback } else { value })
}

pub fn not(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    match coerce::unwrap_text(&args[0]) {
        Udm::Bool(b) => Ok(Udm::Bool(!b)),
        other => Err(arg_error("not", "a boolean", other)),
    }
}

/// Function form of `and`; arguments are already evaluated, so unlike the
/// operator there is no short-circuiting
pub fn and(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let mut result = true;
    for arg in &args {
        match coerce::unwrap_text(arg) {
            Udm::Bool(b) => result = result && *b,
            other => return Err(arg_error("and", "boolean arguments", other)),
        }
    }
    Ok(Udm::Bool(result))
}

/// Function form of `or`
pub fn or(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let mut result = false;
    for arg in &args {
        match coerce::unwrap_text(arg) {
            Udm::Bool(b) => result = result || *b,
            other => return Err(arg_error("or", "boolean arguments", other)),
        }
    }
    Ok(Udm::Bool(result))
}

pub fn all_true(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    bool_fold("allTrue", &args[0], true)
}

pub fn any_true(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    bool_fold("anyTrue", &args[0], false)
}

fn bool_fold(func: &str, value: &Udm, all: bool) -> Result<Udm, Diagnostic> {
    let items = match value {
        Udm::Array(items) => items,
        other => return Err(arg_error(func, "an array of booleans", other)),
    };
    let mut result = all;
    for item in items {
        match coerce::unwrap_text(item) {
            Udm::Bool(b) => {
                if all {
                    result = result && *b;
                } else {
                    result = result || *b;
                }
            }
            other => return Err(arg_error(func, "an array of booleans", other)),
        }
    }
    Ok(Udm::Bool(result))
}
