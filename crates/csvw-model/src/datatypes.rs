//! The atomic datatype registry.
//!
//! The CSVW datatype hierarchy is a closed set: a flat name table maps each
//! registered name to its type tag, with the derivation parent recorded for
//! documentation only. Dispatch is always on the leaf tag, never on a
//! derivation chain.

use base64::Engine as _;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive as _;

use crate::datatype::Format;
use crate::datetime::{self, DateTimeFormat};
use crate::error::{DatatypeError, Result};
use crate::value::{DateTimeValue, DecimalValue, TimeValue, Value};

/// Tag for one atomic datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Basetype {
    Any,
    String,
    AnyUri,
    QName,
    GDay,
    GMonth,
    GMonthDay,
    GYear,
    GYearMonth,
    Xml,
    Html,
    Json,
    Boolean,
    DateTime,
    Date,
    DateTimeStamp,
    Time,
    Duration,
    Decimal,
    Integer,
    Float,
    Number,
    Base64Binary,
    HexBinary,
}

/// Registered name, type tag, and derivation parent (documentation only).
const REGISTRY: &[(&str, Basetype, Option<&str>)] = &[
    ("any", Basetype::Any, None),
    ("string", Basetype::String, Some("any")),
    ("anyURI", Basetype::AnyUri, Some("string")),
    ("QName", Basetype::QName, Some("string")),
    ("gDay", Basetype::GDay, Some("string")),
    ("gMonth", Basetype::GMonth, Some("string")),
    ("gMonthDay", Basetype::GMonthDay, Some("string")),
    ("gYear", Basetype::GYear, Some("string")),
    ("gYearMonth", Basetype::GYearMonth, Some("string")),
    ("xml", Basetype::Xml, Some("string")),
    ("html", Basetype::Html, Some("string")),
    ("json", Basetype::Json, Some("string")),
    ("boolean", Basetype::Boolean, Some("any")),
    ("datetime", Basetype::DateTime, Some("any")),
    ("date", Basetype::Date, Some("datetime")),
    ("dateTimeStamp", Basetype::DateTimeStamp, Some("datetime")),
    ("time", Basetype::Time, Some("datetime")),
    ("duration", Basetype::Duration, Some("any")),
    ("decimal", Basetype::Decimal, Some("any")),
    ("integer", Basetype::Integer, Some("decimal")),
    ("float", Basetype::Float, Some("any")),
    ("number", Basetype::Number, Some("float")),
    ("binary", Basetype::Base64Binary, Some("any")),
    ("hexBinary", Basetype::HexBinary, Some("any")),
];

/// Parse parameters derived from a datatype description, resolved once at
/// construction.
#[derive(Debug, Clone)]
pub enum ParseSpec {
    None,
    /// Anchored regex for the string family's `format` property.
    Pattern(Regex),
    /// Boolean lexical tokens; the first of each set is the canonical one.
    Boolean {
        true_tokens: Vec<String>,
        false_tokens: Vec<String>,
    },
    /// Number facets.
    Number {
        // TODO: honor the number pattern when parsing and formatting;
        // it is currently stored only.
        pattern: Option<String>,
        decimal_char: Option<String>,
        group_char: Option<String>,
    },
    /// Compiled date/time format; `None` falls back to generic ISO parsing.
    DateTime(Option<DateTimeFormat>),
    /// Optional head-anchored pattern checked before duration parsing.
    Duration(Option<Regex>),
}

impl Basetype {
    /// Look up a registered datatype name. `dateTime` is accepted as an
    /// alias for the registered `datetime`.
    pub fn from_name(name: &str) -> Result<Self> {
        if name == "dateTime" {
            return Ok(Self::DateTime);
        }
        REGISTRY
            .iter()
            .find(|(n, _, _)| *n == name)
            .map(|(_, tag, _)| *tag)
            .ok_or_else(|| DatatypeError::UnknownDatatype(name.to_string()))
    }

    /// The canonical registered name.
    pub fn name(self) -> &'static str {
        match REGISTRY.iter().find(|(_, tag, _)| *tag == self) {
            Some((name, _, _)) => name,
            None => "any",
        }
    }

    /// Whether minimum/maximum bound facets apply to this type.
    pub fn minmax(self) -> bool {
        matches!(
            self,
            Self::Decimal
                | Self::Integer
                | Self::Float
                | Self::Number
                | Self::DateTime
                | Self::Date
                | Self::DateTimeStamp
                | Self::Time
        )
    }

    fn is_string_family(self) -> bool {
        matches!(
            self,
            Self::String
                | Self::AnyUri
                | Self::QName
                | Self::GDay
                | Self::GMonth
                | Self::GMonthDay
                | Self::GYear
                | Self::GYearMonth
                | Self::Xml
                | Self::Html
                | Self::Json
        )
    }

    /// Resolve the `format` property into this type's parse parameters.
    pub fn derived_description(self, format: Option<&Format>) -> Result<ParseSpec> {
        match self {
            Self::Any | Self::Float | Self::Number | Self::Base64Binary | Self::HexBinary => {
                Ok(ParseSpec::None)
            }
            _ if self.is_string_family() => match format {
                None => Ok(ParseSpec::None),
                Some(Format::Pattern(pattern)) => {
                    // Wrap the format regex in a group and anchor both ends
                    // so partial matches are rejected.
                    let regex = Regex::new(&format!("^({pattern})$")).map_err(|e| {
                        DatatypeError::config(format!("invalid format pattern {pattern}: {e}"))
                    })?;
                    Ok(ParseSpec::Pattern(regex))
                }
                Some(Format::Number { .. }) => Err(DatatypeError::config(format!(
                    "{} does not take a number format",
                    self.name()
                ))),
            },
            Self::Boolean => match format {
                None => Ok(ParseSpec::Boolean {
                    true_tokens: vec!["true".into(), "1".into()],
                    false_tokens: vec!["false".into(), "0".into()],
                }),
                Some(Format::Pattern(tokens)) => match tokens.split_once('|') {
                    Some((t, f)) if !t.contains('|') && !f.contains('|') => {
                        Ok(ParseSpec::Boolean {
                            true_tokens: vec![t.to_string()],
                            false_tokens: vec![f.to_string()],
                        })
                    }
                    _ => Err(DatatypeError::config(format!(
                        "invalid boolean format: {tokens}"
                    ))),
                },
                Some(Format::Number { .. }) => {
                    Err(DatatypeError::config("invalid boolean format".to_string()))
                }
            },
            Self::Decimal | Self::Integer => Ok(match format {
                None => ParseSpec::Number {
                    pattern: None,
                    decimal_char: None,
                    group_char: None,
                },
                Some(Format::Pattern(pattern)) => ParseSpec::Number {
                    pattern: Some(pattern.clone()),
                    decimal_char: None,
                    group_char: None,
                },
                Some(Format::Number {
                    pattern,
                    decimal_char,
                    group_char,
                }) => ParseSpec::Number {
                    pattern: pattern.clone(),
                    decimal_char: decimal_char.clone(),
                    group_char: group_char.clone(),
                },
            }),
            Self::DateTime => Ok(ParseSpec::DateTime(match pattern_format(self, format)? {
                Some(pattern) => Some(datetime::compile(pattern, false)?),
                None => None,
            })),
            Self::Date => {
                let pattern = pattern_format(self, format)?.unwrap_or("yyyy-MM-dd");
                Ok(ParseSpec::DateTime(Some(datetime::compile(pattern, false)?)))
            }
            Self::DateTimeStamp => {
                let pattern =
                    pattern_format(self, format)?.unwrap_or("yyyy-MM-ddTHH:mm:ss.SSSSSSXXX");
                let compiled = datetime::compile(pattern, false)?;
                if compiled.tz_marker.is_none() {
                    return Err(DatatypeError::config(
                        "dateTimeStamp must have timezone marker".to_string(),
                    ));
                }
                Ok(ParseSpec::DateTime(Some(compiled)))
            }
            Self::Time => {
                let pattern = pattern_format(self, format)?.unwrap_or("HH:mm:ss");
                Ok(ParseSpec::DateTime(Some(datetime::compile(pattern, true)?)))
            }
            Self::Duration => match pattern_format(self, format)? {
                None => Ok(ParseSpec::Duration(None)),
                Some(pattern) => {
                    let regex = Regex::new(&format!("^(?:{pattern})")).map_err(|e| {
                        DatatypeError::config(format!("invalid duration format {pattern}: {e}"))
                    })?;
                    Ok(ParseSpec::Duration(Some(regex)))
                }
            },
            _ => Ok(ParseSpec::None),
        }
    }

    /// Convert a lexical string to a typed value.
    pub fn parse(self, value: &str, spec: &ParseSpec) -> Result<Value> {
        let invalid = || DatatypeError::invalid_lexical(self.name(), value);
        match self {
            Self::Any => Ok(Value::String(value.to_string())),
            Self::Json => {
                // The format regex is not applied to json values; the
                // lexical form must simply be well-formed JSON.
                let parsed: serde_json::Value =
                    serde_json::from_str(value).map_err(|_| invalid())?;
                Ok(Value::Json(parsed))
            }
            Self::String
            | Self::AnyUri
            | Self::QName
            | Self::GDay
            | Self::GMonth
            | Self::GMonthDay
            | Self::GYear
            | Self::GYearMonth
            | Self::Xml
            | Self::Html => {
                if let ParseSpec::Pattern(regex) = spec
                    && !regex.is_match(value)
                {
                    return Err(invalid());
                }
                if self == Self::AnyUri {
                    Ok(Value::Uri(value.to_string()))
                } else {
                    Ok(Value::String(value.to_string()))
                }
            }
            Self::Boolean => match spec {
                ParseSpec::Boolean {
                    true_tokens,
                    false_tokens,
                } => {
                    if true_tokens.iter().any(|t| t == value) {
                        Ok(Value::Boolean(true))
                    } else if false_tokens.iter().any(|t| t == value) {
                        Ok(Value::Boolean(false))
                    } else {
                        Err(invalid())
                    }
                }
                _ => Err(invalid()),
            },
            Self::Decimal => parse_decimal(value, spec).map(Value::Decimal).ok_or_else(invalid),
            Self::Integer => match parse_decimal(value, spec) {
                Some(DecimalValue::Finite(d)) => {
                    d.trunc().to_i64().map(Value::Integer).ok_or_else(invalid)
                }
                _ => Err(invalid()),
            },
            Self::Float | Self::Number => {
                value.parse::<f64>().map(Value::Float).map_err(|_| invalid())
            }
            Self::DateTime | Self::DateTimeStamp => match spec {
                ParseSpec::DateTime(Some(format)) => {
                    let parts = datetime::parse_parts(value, format).ok_or_else(invalid)?;
                    let date = parts.date.ok_or_else(invalid)?;
                    let time = parts.time.unwrap_or(chrono::NaiveTime::MIN);
                    Ok(Value::DateTime(DateTimeValue {
                        value: chrono::NaiveDateTime::new(date, time),
                        offset: parts.offset,
                    }))
                }
                _ => datetime::parse_generic(value)
                    .map(Value::DateTime)
                    .ok_or_else(invalid),
            },
            Self::Date => match spec {
                ParseSpec::DateTime(Some(format)) => {
                    let parts = datetime::parse_parts(value, format).ok_or_else(invalid)?;
                    parts.date.map(Value::Date).ok_or_else(invalid)
                }
                _ => Err(invalid()),
            },
            Self::Time => match spec {
                ParseSpec::DateTime(Some(format)) => {
                    let parts = datetime::parse_parts(value, format).ok_or_else(invalid)?;
                    let time = parts.time.ok_or_else(invalid)?;
                    Ok(Value::Time(TimeValue {
                        value: time,
                        offset: parts.offset,
                    }))
                }
                _ => Err(invalid()),
            },
            Self::Duration => {
                if let ParseSpec::Duration(Some(regex)) = spec
                    && !regex.is_match(value)
                {
                    return Err(invalid());
                }
                datetime::parse_duration(value)
                    .map(Value::Duration)
                    .ok_or_else(invalid)
            }
            Self::Base64Binary => {
                if !value.is_ascii() {
                    return Err(DatatypeError::invalid_lexical(
                        self.name(),
                        &truncate(value, 10),
                    ));
                }
                base64::engine::general_purpose::STANDARD
                    .decode(value)
                    .map_err(|_| invalid())?;
                Ok(Value::Binary(value.as_bytes().to_vec()))
            }
            Self::HexBinary => {
                if !value.is_ascii() {
                    return Err(DatatypeError::invalid_lexical(
                        self.name(),
                        &truncate(value, 10),
                    ));
                }
                hex::decode(value).map_err(|_| invalid())?;
                Ok(Value::Binary(value.as_bytes().to_vec()))
            }
        }
    }

    /// Convert a typed value back to its lexical form.
    pub fn format(self, value: &Value, spec: &ParseSpec) -> String {
        match (self, value) {
            (Self::Boolean, Value::Boolean(b)) => match spec {
                ParseSpec::Boolean {
                    true_tokens,
                    false_tokens,
                } => {
                    let tokens = if *b { true_tokens } else { false_tokens };
                    tokens.first().cloned().unwrap_or_else(|| b.to_string())
                }
                _ => b.to_string(),
            },
            (Self::Decimal, Value::Decimal(d)) => match spec {
                ParseSpec::Number {
                    decimal_char,
                    group_char,
                    ..
                } => format_decimal(d, decimal_char.as_deref(), group_char.as_deref()),
                _ => d.to_string(),
            },
            (Self::Integer, Value::Integer(i)) => match spec {
                ParseSpec::Number {
                    decimal_char,
                    group_char,
                    ..
                } => decorate_number(&i.to_string(), decimal_char.as_deref(), group_char.as_deref()),
                _ => i.to_string(),
            },
            (Self::DateTime | Self::DateTimeStamp, Value::DateTime(dt)) => match spec {
                ParseSpec::DateTime(Some(format)) => datetime::format_parts(
                    format,
                    Some(dt.value.date()),
                    Some(dt.value.time()),
                    dt.offset,
                ),
                _ => dt.to_string(),
            },
            (Self::Date, Value::Date(date)) => match spec {
                ParseSpec::DateTime(Some(format)) => {
                    datetime::format_parts(format, Some(*date), None, None)
                }
                _ => date.format("%Y-%m-%d").to_string(),
            },
            (Self::Time, Value::Time(t)) => match spec {
                ParseSpec::DateTime(Some(format)) => {
                    datetime::format_parts(format, None, Some(t.value), t.offset)
                }
                _ => t.to_string(),
            },
            (Self::Json, Value::Json(v)) => serde_json::to_string(v).unwrap_or_default(),
            _ => value.to_string(),
        }
    }
}

fn pattern_format(basetype: Basetype, format: Option<&Format>) -> Result<Option<&str>> {
    match format {
        None => Ok(None),
        Some(Format::Pattern(p)) => Ok(Some(p.as_str())),
        Some(Format::Number { .. }) => Err(DatatypeError::config(format!(
            "{} does not take a number format",
            basetype.name()
        ))),
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

fn parse_decimal(value: &str, spec: &ParseSpec) -> Option<DecimalValue> {
    match value {
        "INF" => return Some(DecimalValue::PosInf),
        "-INF" => return Some(DecimalValue::NegInf),
        "NaN" => return Some(DecimalValue::NaN),
        _ => {}
    }
    let mut lexical = value.to_string();
    if let ParseSpec::Number {
        decimal_char,
        group_char,
        ..
    } = spec
    {
        if let Some(group) = group_char {
            lexical = lexical.replace(group.as_str(), "");
        }
        if let Some(dec) = decimal_char
            && dec != "."
        {
            lexical = lexical.replace(dec.as_str(), ".");
        }
    }
    lexical.parse::<Decimal>().ok().map(DecimalValue::Finite)
}

fn format_decimal(
    value: &DecimalValue,
    decimal_char: Option<&str>,
    group_char: Option<&str>,
) -> String {
    match value {
        DecimalValue::Finite(d) => decorate_number(&d.to_string(), decimal_char, group_char),
        special => special.to_string(),
    }
}

/// Apply grouping and decimal-character substitution to a plain numeric
/// lexical (`-1234.5` with group `.` and decimal `,` becomes `-1.234,5`).
fn decorate_number(lexical: &str, decimal_char: Option<&str>, group_char: Option<&str>) -> String {
    if decimal_char.is_none() && group_char.is_none() {
        return lexical.to_string();
    }
    let (sign, digits) = match lexical.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", lexical),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };

    let mut out = String::from(sign);
    match group_char {
        Some(group) => {
            let chars: Vec<char> = int_part.chars().collect();
            for (i, c) in chars.iter().enumerate() {
                if i > 0 && (chars.len() - i) % 3 == 0 {
                    out.push_str(group);
                }
                out.push(*c);
            }
        }
        None => out.push_str(int_part),
    }
    if let Some(frac) = frac_part {
        out.push_str(decimal_char.unwrap_or("."));
        out.push_str(frac);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec_for(basetype: Basetype) -> ParseSpec {
        basetype.derived_description(None).unwrap()
    }

    #[test]
    fn registry_lookup() {
        assert_eq!(Basetype::from_name("integer").unwrap(), Basetype::Integer);
        assert_eq!(Basetype::from_name("binary").unwrap(), Basetype::Base64Binary);
        assert_eq!(Basetype::from_name("datetime").unwrap(), Basetype::DateTime);
        assert_eq!(Basetype::from_name("dateTime").unwrap(), Basetype::DateTime);
        assert!(matches!(
            Basetype::from_name("nope"),
            Err(DatatypeError::UnknownDatatype(_))
        ));
    }

    #[test]
    fn registry_names_unique() {
        for (i, (name, _, _)) in REGISTRY.iter().enumerate() {
            assert!(
                REGISTRY.iter().skip(i + 1).all(|(n, _, _)| n != name),
                "duplicate registry name: {name}"
            );
        }
    }

    #[test]
    fn boolean_tokens() {
        let spec = spec_for(Basetype::Boolean);
        assert_eq!(
            Basetype::Boolean.parse("true", &spec).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            Basetype::Boolean.parse("0", &spec).unwrap(),
            Value::Boolean(false)
        );
        assert!(Basetype::Boolean.parse("J", &spec).is_err());
        assert_eq!(
            Basetype::Boolean.format(&Value::Boolean(true), &spec),
            "true"
        );
    }

    #[test]
    fn decimal_specials_roundtrip() {
        let spec = spec_for(Basetype::Decimal);
        for token in ["INF", "-INF", "NaN"] {
            let parsed = Basetype::Decimal.parse(token, &spec).unwrap();
            assert_eq!(Basetype::Decimal.format(&parsed, &spec), token);
        }
    }

    #[test]
    fn decimal_group_and_decimal_chars() {
        let spec = ParseSpec::Number {
            pattern: None,
            decimal_char: Some(",".into()),
            group_char: Some(".".into()),
        };
        let parsed = Basetype::Decimal.parse("1.234,5", &spec).unwrap();
        assert_eq!(
            parsed,
            Value::Decimal(DecimalValue::Finite("1234.5".parse().unwrap()))
        );
        assert_eq!(Basetype::Decimal.format(&parsed, &spec), "1.234,5");
    }

    #[test]
    fn integer_truncates_like_int() {
        let spec = spec_for(Basetype::Integer);
        assert_eq!(
            Basetype::Integer.parse("5.9", &spec).unwrap(),
            Value::Integer(5)
        );
        assert!(Basetype::Integer.parse("INF", &spec).is_err());
        assert!(Basetype::Integer.parse("abc", &spec).is_err());
    }

    #[test]
    fn binary_validation() {
        let spec = spec_for(Basetype::Base64Binary);
        let parsed = Basetype::Base64Binary
            .parse("aGVsbG8gd29ybGQ=", &spec)
            .unwrap();
        assert_eq!(
            Basetype::Base64Binary.format(&parsed, &spec),
            "aGVsbG8gd29ybGQ="
        );
        assert!(Basetype::Base64Binary.parse("äöü", &spec).is_err());
        assert!(Basetype::Base64Binary.parse("abc", &spec).is_err());

        let hex_spec = spec_for(Basetype::HexBinary);
        assert!(Basetype::HexBinary.parse("deadbeef", &hex_spec).is_ok());
        assert!(Basetype::HexBinary.parse("xyz", &hex_spec).is_err());
    }

    #[test]
    fn string_format_is_anchored() {
        let spec = Basetype::String
            .derived_description(Some(&Format::Pattern("ab*".into())))
            .unwrap();
        assert!(Basetype::String.parse("abbb", &spec).is_ok());
        assert!(Basetype::String.parse("abc", &spec).is_err());
    }

    #[test]
    fn json_parse_ignores_format() {
        let spec = spec_for(Basetype::Json);
        let parsed = Basetype::Json.parse("{\"a\": 5}", &spec).unwrap();
        assert_eq!(parsed, Value::Json(serde_json::json!({"a": 5})));
        assert!(Basetype::Json.parse("{nope", &spec).is_err());
    }

    #[test]
    fn datetimestamp_requires_marker() {
        assert!(Basetype::DateTimeStamp.derived_description(None).is_ok());
        assert!(
            Basetype::DateTimeStamp
                .derived_description(Some(&Format::Pattern("yyyy-MM-dd".into())))
                .is_err()
        );
    }

    #[test]
    fn duration_with_pattern() {
        let spec = Basetype::Duration
            .derived_description(Some(&Format::Pattern("P[0-9]+D".into())))
            .unwrap();
        assert!(Basetype::Duration.parse("P3D", &spec).is_ok());
        assert!(Basetype::Duration.parse("PT3H", &spec).is_err());
    }
}
