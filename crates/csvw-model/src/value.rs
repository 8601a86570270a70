//! Typed cell values.
//!
//! Every atomic type parses a lexical string into one of the variants of
//! [`Value`]; formatting goes the other way. `Display` renders the generic
//! lexical form used when no explicit format is configured.

use std::cmp::Ordering;
use std::fmt;

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::Decimal;

/// A decimal cell value.
///
/// The CSVW number grammar admits the special tokens `INF`, `-INF` and
/// `NaN`, which have no representation in a plain decimal, so the value is
/// a tagged variant rather than a bare [`Decimal`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecimalValue {
    Finite(Decimal),
    PosInf,
    NegInf,
    NaN,
}

/// Ordering used for minimum/maximum facet checks. `NaN` is incomparable.
impl PartialOrd for DecimalValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::NaN, _) | (_, Self::NaN) => None,
            (Self::Finite(a), Self::Finite(b)) => Some(a.cmp(b)),
            (Self::PosInf, Self::PosInf) | (Self::NegInf, Self::NegInf) => Some(Ordering::Equal),
            (Self::PosInf, _) => Some(Ordering::Greater),
            (_, Self::PosInf) => Some(Ordering::Less),
            (Self::NegInf, _) => Some(Ordering::Less),
            (_, Self::NegInf) => Some(Ordering::Greater),
        }
    }
}

impl fmt::Display for DecimalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finite(d) => write!(f, "{d}"),
            Self::PosInf => write!(f, "INF"),
            Self::NegInf => write!(f, "-INF"),
            Self::NaN => write!(f, "NaN"),
        }
    }
}

/// An ISO 8601 duration, component by component.
///
/// Components keep their collected precision; only the components that were
/// present in the lexical value are set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IsoDuration {
    pub negative: bool,
    pub years: Option<f64>,
    pub months: Option<f64>,
    /// Weeks cannot be combined with the other components.
    pub weeks: Option<f64>,
    pub days: Option<f64>,
    pub hours: Option<f64>,
    pub minutes: Option<f64>,
    pub seconds: Option<f64>,
}

fn duration_component(value: f64, suffix: &str) -> String {
    if value.fract() == 0.0 {
        format!("{}{}", value as i64, suffix)
    } else {
        format!("{value}{suffix}")
    }
}

impl fmt::Display for IsoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-")?;
        }
        write!(f, "P")?;
        if let Some(weeks) = self.weeks {
            return write!(f, "{}", duration_component(weeks, "W"));
        }
        let mut has_date = false;
        if let Some(years) = self.years {
            write!(f, "{}", duration_component(years, "Y"))?;
            has_date = true;
        }
        if let Some(months) = self.months {
            write!(f, "{}", duration_component(months, "M"))?;
            has_date = true;
        }
        if let Some(days) = self.days {
            write!(f, "{}", duration_component(days, "D"))?;
            has_date = true;
        }
        let has_time = self.hours.is_some() || self.minutes.is_some() || self.seconds.is_some();
        if has_time {
            write!(f, "T")?;
            if let Some(hours) = self.hours {
                write!(f, "{}", duration_component(hours, "H"))?;
            }
            if let Some(minutes) = self.minutes {
                write!(f, "{}", duration_component(minutes, "M"))?;
            }
            if let Some(seconds) = self.seconds {
                write!(f, "{}", duration_component(seconds, "S"))?;
            }
        }
        if !has_date && !has_time {
            write!(f, "0D")?;
        }
        Ok(())
    }
}

/// A date/time with an optional UTC offset, as produced by a format with a
/// timezone marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DateTimeValue {
    pub value: NaiveDateTime,
    pub offset: Option<FixedOffset>,
}

/// A time-of-day with an optional UTC offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeValue {
    pub value: NaiveTime,
    pub offset: Option<FixedOffset>,
}

pub(crate) fn render_offset(offset: FixedOffset) -> String {
    let total = offset.local_minus_utc();
    let sign = if total < 0 { '-' } else { '+' };
    let abs = total.abs();
    format!("{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60)
}

fn render_fraction(micro: u32) -> String {
    if micro == 0 {
        return String::new();
    }
    let digits = format!("{micro:06}");
    format!(".{}", digits.trim_end_matches('0'))
}

impl fmt::Display for DateTimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            self.value.format("%Y-%m-%dT%H:%M:%S"),
            render_fraction(self.value.nanosecond() / 1_000)
        )?;
        if let Some(offset) = self.offset {
            write!(f, "{}", render_offset(offset))?;
        }
        Ok(())
    }
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            self.value.format("%H:%M:%S"),
            render_fraction(self.value.nanosecond() / 1_000)
        )?;
        if let Some(offset) = self.offset {
            write!(f, "{}", render_offset(offset))?;
        }
        Ok(())
    }
}

/// A typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    /// An `anyURI` cell; kept lexical, resolution is not this layer's job.
    Uri(String),
    Boolean(bool),
    Decimal(DecimalValue),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    DateTime(DateTimeValue),
    Time(TimeValue),
    Duration(IsoDuration),
    /// Validated binary content; the value keeps the lexical (ASCII) bytes.
    Binary(Vec<u8>),
    Json(serde_json::Value),
}

impl Value {
    /// The length used for `length`/`minLength`/`maxLength` facet checks,
    /// for values that have one.
    pub fn length(&self) -> Option<usize> {
        match self {
            Self::String(s) | Self::Uri(s) => Some(s.chars().count()),
            Self::Binary(b) => Some(b.len()),
            Self::Json(serde_json::Value::String(s)) => Some(s.chars().count()),
            Self::Json(serde_json::Value::Array(a)) => Some(a.len()),
            Self::Json(serde_json::Value::Object(o)) => Some(o.len()),
            _ => None,
        }
    }

    /// Ordering between two values of the same kind, used for bound facet
    /// checks on numeric and date/time values.
    pub fn partial_cmp_ordered(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Decimal(a), Self::Decimal(b)) => a.partial_cmp(b),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            (Self::DateTime(a), Self::DateTime(b)) => Some(a.value.cmp(&b.value)),
            (Self::Time(a), Self::Time(b)) => Some(a.value.cmp(&b.value)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) | Self::Uri(s) => write!(f, "{s}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::DateTime(dt) => write!(f, "{dt}"),
            Self::Time(t) => write!(f, "{t}"),
            Self::Duration(d) => write!(f, "{d}"),
            Self::Binary(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_special_ordering() {
        let five = DecimalValue::Finite(Decimal::from(5));
        assert_eq!(
            DecimalValue::PosInf.partial_cmp(&five),
            Some(Ordering::Greater)
        );
        assert_eq!(DecimalValue::NegInf.partial_cmp(&five), Some(Ordering::Less));
        assert_eq!(DecimalValue::NaN.partial_cmp(&five), None);
    }

    #[test]
    fn duration_roundtrip_display() {
        let dur = IsoDuration {
            years: Some(2.0),
            months: Some(3.0),
            days: Some(14.0),
            ..IsoDuration::default()
        };
        assert_eq!(dur.to_string(), "P2Y3M14D");

        let weeks = IsoDuration {
            weeks: Some(4.5),
            ..IsoDuration::default()
        };
        assert_eq!(weeks.to_string(), "P4.5W");

        assert_eq!(IsoDuration::default().to_string(), "P0D");
    }

    #[test]
    fn datetime_display_includes_offset() {
        let dt = DateTimeValue {
            value: NaiveDate::from_ymd_opt(2015, 3, 22)
                .unwrap()
                .and_hms_opt(22, 5, 0)
                .unwrap(),
            offset: FixedOffset::east_opt(3 * 3600),
        };
        assert_eq!(dt.to_string(), "2015-03-22T22:05:00+03:00");
    }
}
