//! Mapping of schema default values onto Python source literals.

use std::fmt;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use serde_json::Value;

use crate::error::ArtifactError;

/// A default value ready to be placed into generated source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MappedDefault {
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Already quoted; the text is the literal.
    Str(String),
    /// Constructor or prefixed literal, e.g. `datetime.date(2020, 1, 1)`.
    Literal(String),
}

impl fmt::Display for MappedDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappedDefault::Int(value) => write!(f, "{}", value),
            MappedDefault::Float(value) => write!(f, "{:?}", value),
            MappedDefault::Bool(true) => f.write_str("True"),
            MappedDefault::Bool(false) => f.write_str("False"),
            MappedDefault::Str(text) | MappedDefault::Literal(text) => f.write_str(text),
        }
    }
}

/// Map a raw default for a property of the given type and format.
///
/// Returns `Ok(None)` when there is no default. Strings outside the
/// `date`/`date-time` formats are JSON-quoted so that quotes and control
/// characters survive emission; `binary` strings become byte literals.
///
/// # Errors
///
/// `ArtifactError::UnsupportedDefault` when the `(type, format)` pair has no
/// mapping and `ArtifactError::InvalidDefault` when the value cannot be
/// converted to that type.
pub fn map_default(
    open_api_type: &str,
    format: Option<&str>,
    raw: Option<&Value>,
) -> Result<Option<MappedDefault>, ArtifactError> {
    let Some(raw) = raw.filter(|value| !value.is_null()) else {
        return Ok(None);
    };

    let mapped = match (open_api_type, format) {
        ("string", Some("binary")) => MappedDefault::Literal(format!("b{}", json_quote(raw))),
        ("string", Some("date")) => {
            let date = parse_date(raw).ok_or_else(|| invalid(raw, open_api_type, "expected an ISO date"))?;
            MappedDefault::Literal(date_literal(&date))
        }
        ("string", Some("date-time")) => {
            let literal = datetime_literal(raw)
                .ok_or_else(|| invalid(raw, open_api_type, "expected an ISO date-time"))?;
            MappedDefault::Literal(literal)
        }
        ("string", _) => MappedDefault::Str(json_quote(raw)),
        ("integer", None | Some("int32") | Some("int64")) => MappedDefault::Int(to_int(raw)?),
        ("number", None | Some("float") | Some("double")) => MappedDefault::Float(to_float(raw)?),
        ("boolean", None) => match raw {
            Value::Bool(value) => MappedDefault::Bool(*value),
            _ => return Err(invalid(raw, open_api_type, "expected true or false")),
        },
        _ => {
            return Err(ArtifactError::UnsupportedDefault {
                open_api_type: open_api_type.to_string(),
                format: format.map(String::from),
            })
        }
    };
    Ok(Some(mapped))
}

/// Serialize as JSON with every non-ASCII character escaped.
fn json_quote(value: &Value) -> String {
    let mut quoted = String::new();
    for ch in value.to_string().chars() {
        if ch.is_ascii() {
            quoted.push(ch);
        } else {
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                quoted.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    quoted
}

fn invalid(raw: &Value, open_api_type: &str, message: &str) -> ArtifactError {
    ArtifactError::InvalidDefault {
        value: raw.to_string(),
        open_api_type: open_api_type.to_string(),
        message: message.to_string(),
    }
}

fn to_int(raw: &Value) -> Result<i64, ArtifactError> {
    let converted = match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| fits_i64(*f)).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    converted.ok_or_else(|| invalid(raw, "integer", "expected an integer"))
}

// Whole numbers only; the upper bound is exclusive since i64::MAX rounds up as f64.
fn fits_i64(f: f64) -> bool {
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

fn to_float(raw: &Value) -> Result<f64, ArtifactError> {
    let converted = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    converted.ok_or_else(|| invalid(raw, "number", "expected a number"))
}

fn parse_date(raw: &Value) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.as_str()?, "%Y-%m-%d").ok()
}

fn date_literal(date: &NaiveDate) -> String {
    format!("datetime.date({}, {}, {})", date.year(), date.month(), date.day())
}

fn datetime_literal(raw: &Value) -> Option<String> {
    let text = raw.as_str()?;
    if let Ok(aware) = DateTime::parse_from_rfc3339(text) {
        let tz = timezone_literal(aware.offset());
        return Some(naive_datetime_literal(&aware.naive_local(), Some(&tz)));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|pattern| NaiveDateTime::parse_from_str(text, pattern).ok())
        .map(|naive| naive_datetime_literal(&naive, None))
}

fn naive_datetime_literal(value: &NaiveDateTime, tz: Option<&str>) -> String {
    let mut parts = vec![
        value.year().to_string(),
        value.month().to_string(),
        value.day().to_string(),
        value.hour().to_string(),
        value.minute().to_string(),
    ];
    let micros = value.nanosecond() / 1_000;
    if value.second() != 0 || micros != 0 {
        parts.push(value.second().to_string());
    }
    if micros != 0 {
        parts.push(micros.to_string());
    }
    if let Some(tz) = tz {
        parts.push(format!("tzinfo={}", tz));
    }
    format!("datetime.datetime({})", parts.join(", "))
}

fn timezone_literal(offset: &FixedOffset) -> String {
    let seconds = offset.local_minus_utc();
    if seconds == 0 {
        return "datetime.timezone.utc".to_string();
    }
    let delta = if seconds < 0 {
        format!("days=-1, seconds={}", 86_400 + seconds)
    } else {
        format!("seconds={}", seconds)
    };
    format!("datetime.timezone(datetime.timedelta({}))", delta)
}
