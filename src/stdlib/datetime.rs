//! Date and time functions
//!
//! `now` and `today` read the evaluator's per-run snapshot, so every call
//! within one evaluation answers the same instant.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};

use crate::error::{Diagnostic, Span};
use crate::interpreter::Evaluator;
use crate::udm::{coerce, Udm};

use super::{arg_error, want_int, want_str};

pub fn now(ev: &mut Evaluator, _args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::DateTime(ev.now))
}

pub fn today(ev: &mut Evaluator, _args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Date(ev.now.date_naive()))
}

pub fn parse_date(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let text = want_str("parseDate", &args[0])?;
    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .map(Udm::Date)
        .map_err(|_| arg_error("parseDate", "an ISO-8601 date", &args[0]))
}

/// Accepts an RFC 3339 instant, or a local date-time without an offset
pub fn parse_date_time(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let text = want_str("parseDateTime", &args[0])?;
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(&text) {
        return Ok(Udm::DateTime(dt));
    }
    if let Ok(local) = NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Udm::LocalDateTime(local));
    }
    Err(arg_error(
        "parseDateTime",
        "an ISO-8601 date-time",
        &args[0],
    ))
}

pub fn parse_time(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let text = want_str("parseTime", &args[0])?;
    NaiveTime::parse_from_str(&text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(&text, "%H:%M"))
        .map(Udm::Time)
        .map_err(|_| arg_error("parseTime", "an ISO-8601 time", &args[0]))
}

/// strftime-style formatting for any temporal variant
pub fn format_date_time(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let pattern = want_str("formatDateTime", &args[1])?;
    let formatted = match coerce::unwrap_text(&args[0]) {
        Udm::DateTime(dt) => dt.format(&pattern).to_string(),
        Udm::Date(d) => d.format(&pattern).to_string(),
        Udm::LocalDateTime(dt) => dt.format(&pattern).to_string(),
        Udm::Time(t) => t.format(&pattern).to_string(),
        other => return Err(arg_error("formatDateTime", "a date or date-time", other)),
    };
    Ok(Udm::Str(formatted))
}

pub fn add_days(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    shift("addDays", args, |n| Duration::days(n))
}

pub fn add_hours(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    shift("addHours", args, |n| Duration::hours(n))
}

pub fn add_minutes(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    shift("addMinutes", args, |n| Duration::minutes(n))
}

pub fn add_seconds(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    shift("addSeconds", args, |n| Duration::seconds(n))
}

fn shift(
    func: &str,
    args: Vec<Udm>,
    to_duration: impl Fn(i64) -> Duration,
) -> Result<Udm, Diagnostic> {
    let amount = want_int(func, &args[1])?;
    let delta = to_duration(amount);
    match coerce::unwrap_text(&args[0]) {
        Udm::DateTime(dt) => Ok(Udm::DateTime(*dt + delta)),
        Udm::LocalDateTime(dt) => Ok(Udm::LocalDateTime(*dt + delta)),
        Udm::Date(d) => Ok(Udm::Date(*d + delta)),
        other => Err(arg_error(func, "a date or date-time", other)),
    }
}

/// Whole days from the first date to the second
pub fn diff_days(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let from = as_naive_date("diffDays", &args[0])?;
    let to = as_naive_date("diffDays", &args[1])?;
    Ok(Udm::Int((to - from).num_days()))
}

fn as_naive_date(func: &str, value: &Udm) -> Result<NaiveDate, Diagnostic> {
    match coerce::unwrap_text(value) {
        Udm::Date(d) => Ok(*d),
        Udm::DateTime(dt) => Ok(dt.date_naive()),
        Udm::LocalDateTime(dt) => Ok(dt.date()),
        other => Err(arg_error(func, "a date or date-time", other)),
    }
}

pub fn year(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Int(as_naive_date("year", &args[0])?.year() as i64))
}

pub fn month(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Int(as_naive_date("month", &args[0])?.month() as i64))
}

pub fn day(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Int(as_naive_date("day", &args[0])?.day() as i64))
}

/// ISO weekday: Monday = 1 through Sunday = 7
pub fn day_of_week(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let date = as_naive_date("dayOfWeek", &args[0])?;
    Ok(Udm::Int(date.weekday().number_from_monday() as i64))
}

pub fn hour(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    time_component("hour", &args[0], |t| t.hour())
}

pub fn minute(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    time_component("minute", &args[0], |t| t.minute())
}

pub fn second(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    time_component("second", &args[0], |t| t.second())
}

fn time_component(
    func: &str,
    value: &Udm,
    extract: impl Fn(NaiveTime) -> u32,
) -> Result<Udm, Diagnostic> {
    let time = match coerce::unwrap_text(value) {
        Udm::DateTime(dt) => dt.time(),
        Udm::LocalDateTime(dt) => dt.time(),
        Udm::Time(t) => *t,
        other => return Err(arg_error(func, "a time or date-time", other)),
    };
    Ok(Udm::Int(extract(time) as i64))
}

pub fn to_epoch_millis(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    match coerce::unwrap_text(&args[0]) {
        Udm::DateTime(dt) => Ok(Udm::Int(dt.timestamp_millis())),
        Udm::LocalDateTime(dt) => Ok(Udm::Int(dt.and_utc().timestamp_millis())),
        other => Err(arg_error("toEpochMillis", "a date-time", other)),
    }
}

pub fn from_epoch_millis(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let millis = want_int("fromEpochMillis", &args[0])?;
    match Utc.timestamp_millis_opt(millis).single() {
        Some(dt) => Ok(Udm::DateTime(dt.fixed_offset())),
        None => Err(arg_error(
            "fromEpochMillis",
            "a representable millisecond timestamp",
            &args[0],
        )),
    }
}
