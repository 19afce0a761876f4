//! Math functions
//!
//! Integer inputs stay integers wherever the operation is closed over the
//! integers; anything that can produce a fraction answers in floating
//! point.

use rand::Rng;

use crate::error::{Diagnostic, Span};
use crate::interpreter::Evaluator;
use crate::udm::{coerce, Udm};

use super::{arg_error, want_f64, want_int};

pub fn abs(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    match coerce::unwrap_text(&args[0]) {
        Udm::Int(n) => Ok(Udm::Int(n.abs())),
        Udm::Float(n) => Ok(Udm::Float(n.abs())),
        other => Err(arg_error("abs", "a number", other)),
    }
}

pub fn ceil(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    match coerce::unwrap_text(&args[0]) {
        Udm::Int(n) => Ok(Udm::Int(*n)),
        Udm::Float(n) => Ok(Udm::Int(n.ceil() as i64)),
        other => Err(arg_error("ceil", "a number", other)),
    }
}

pub fn floor(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    match coerce::unwrap_text(&args[0]) {
        Udm::Int(n) => Ok(Udm::Int(*n)),
        Udm::Float(n) => Ok(Udm::Int(n.floor() as i64)),
        other => Err(arg_error("floor", "a number", other)),
    }
}

/// Round half away from zero, optionally to a number of decimal places
pub fn round(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let places = if args.len() > 1 {
        want_int("round", &args[1])?
    } else {
        0
    };
    match coerce::unwrap_text(&args[0]) {
        Udm::Int(n) => Ok(Udm::Int(*n)),
        Udm::Float(n) => {
            if places == 0 {
                Ok(Udm::Int(n.round() as i64))
            } else {
                let factor = 10f64.powi(places as i32);
                Ok(Udm::Float((n * factor).round() / factor))
            }
        }
        other => Err(arg_error("round", "a number", other)),
    }
}

pub fn trunc(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    match coerce::unwrap_text(&args[0]) {
        Udm::Int(n) => Ok(Udm::Int(*n)),
        Udm::Float(n) => Ok(Udm::Int(n.trunc() as i64)),
        other => Err(arg_error("trunc", "a number", other)),
    }
}

pub fn sqrt(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Float(want_f64("sqrt", &args[0])?.sqrt()))
}

pub fn pow(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let base = coerce::unwrap_text(&args[0]).clone();
    let exponent = coerce::unwrap_text(&args[1]).clone();
    match (&base, &exponent) {
        (Udm::Int(b), Udm::Int(e)) if *e >= 0 && *e <= u32::MAX as i64 => {
            match b.checked_pow(*e as u32) {
                Some(n) => Ok(Udm::Int(n)),
                None => Ok(Udm::Float((*b as f64).powf(*e as f64))),
            }
        }
        _ => {
            let b = want_f64("pow", &base)?;
            let e = want_f64("pow", &exponent)?;
            Ok(Udm::Float(b.powf(e)))
        }
    }
}

pub fn exp(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Float(want_f64("exp", &args[0])?.exp()))
}

pub fn log(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Float(want_f64("log", &args[0])?.ln()))
}

pub fn log10(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Float(want_f64("log10", &args[0])?.log10()))
}

pub fn sign(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    match coerce::unwrap_text(&args[0]) {
        Udm::Int(n) => Ok(Udm::Int(n.signum())),
        Udm::Float(n) => Ok(Udm::Int(if *n > 0.0 {
            1
        } else if *n < 0.0 {
            -1
        } else {
            0
        })),
        other => Err(arg_error("sign", "a number", other)),
    }
}

pub fn clamp(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let value = want_f64("clamp", &args[0])?;
    let low = want_f64("clamp", &args[1])?;
    let high = want_f64("clamp", &args[2])?;
    if low > high {
        return Err(arg_error("clamp", "a low bound not above the high bound", &args[1]));
    }
    let clamped = value.clamp(low, high);
    // Keep the integer kind when all three operands were integers
    let all_int = args
        .iter()
        .all(|a| matches!(coerce::unwrap_text(a), Udm::Int(_)));
    if all_int {
        Ok(Udm::Int(clamped as i64))
    } else {
        Ok(Udm::Float(clamped))
    }
}

/// Uniform float in [0, 1); seedable through the run options
pub fn random(ev: &mut Evaluator, _args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Float(ev.rng.gen::<f64>()))
}

/// Uniform integer in [0, n)
pub fn random_int(ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let bound = want_int("randomInt", &args[0])?;
    if bound <= 0 {
        return Err(arg_error("randomInt", "a positive bound", &args[0]));
    }
    Ok(Udm::Int(ev.rng.gen_range(0..bound)))
}

/// True only for a floating-point NaN; integers are never NaN
pub fn is_nan(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    match coerce::unwrap_text(&args[0]) {
        Udm::Int(_) => Ok(Udm::Bool(false)),
        Udm::Float(n) => Ok(Udm::Bool(n.is_nan())),
        other => Err(arg_error("isNaN", "a number", other)),
    }
}

/// Parse numeric text (or pass numbers through), keeping the int/float
/// distinction
pub fn to_number(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    match coerce::to_number(&args[0]) {
        Some(n) => Ok(n),
        None => Err(arg_error(
            "toNumber",
            "a number or numeric string",
            coerce::unwrap_text(&args[0]),
        )),
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

    fn seeded(seed: u64) -> Evaluator<'static> {
        static NO_TEMPLATES: &[TemplateDef] = &[];
        let options = EvalOptions {
            seed: Some(seed),
            ..EvalOptions::default()
        };
        Evaluator::new(NO_TEMPLATES, &options)
    }

    fn span() -> Span {
        Span::point(Position::start())
    }

    #[test]
    fn test_rounding_family() {
        let mut e = ev();
        assert_eq!(ceil(&mut e, vec![Udm::Float(1.2)], span()).unwrap(), Udm::Int(2));
        assert_eq!(floor(&mut e, vec![Udm::Float(1.8)], span()).unwrap(), Udm::Int(1));
        assert_eq!(round(&mut e, vec![Udm::Float(2.5)], span()).unwrap(), Udm::Int(3));
        assert_eq!(trunc(&mut e, vec![Udm::Float(-1.9)], span()).unwrap(), Udm::Int(-1));
        assert_eq!(
            round(&mut e, vec![Udm::Float(3.14159), Udm::Int(2)], span()).unwrap(),
            Udm::Float(3.14)
        );
    }

    #[test]
    fn test_pow_integer_closure() {
        let mut e = ev();
        assert_eq!(
            pow(&mut e, vec![Udm::Int(2), Udm::Int(10)], span()).unwrap(),
            Udm::Int(1024)
        );
        assert_eq!(
            pow(&mut e, vec![Udm::Int(4), Udm::Float(0.5)], span()).unwrap(),
            Udm::Float(2.0)
        );
    }

    #[test]
    fn test_to_number() {
        let mut e = ev();
        assert_eq!(
            to_number(&mut e, vec![Udm::string("42")], span()).unwrap(),
            Udm::Int(42)
        );
        assert_eq!(
            to_number(&mut e, vec![Udm::string("4.5")], span()).unwrap(),
            Udm::Float(4.5)
        );
        assert!(to_number(&mut e, vec![Udm::string("x")], span()).is_err());
    }

    #[test]
    fn test_is_nan() {
        let mut e = ev();
        assert_eq!(
            is_nan(&mut e, vec![Udm::Float(f64::NAN)], span()).unwrap(),
            Udm::Bool(true)
        );
        assert_eq!(
            is_nan(&mut e, vec![Udm::Float(0.5)], span()).unwrap(),
            Udm::Bool(false)
        );
        assert_eq!(
            is_nan(&mut e, vec![Udm::Int(7)], span()).unwrap(),
            Udm::Bool(false)
        );
        assert!(is_nan(&mut e, vec![Udm::string("x")], span()).is_err());
    }

    #[test]
    fn test_seeded_random_is_reproducible() {
        let mut a = seeded(7);
        let mut b = seeded(7);
        assert_eq!(
            random(&mut a, vec![], span()).unwrap(),
            random(&mut b, vec![], span()).unwrap()
        );
        assert_eq!(
            random_int(&mut a, vec![Udm::Int(1000)], span()).unwrap(),
            random_int(&mut b, vec![Udm::Int(1000)], span()).unwrap()
        );
    }
}
