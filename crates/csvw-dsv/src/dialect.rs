//! Dialect descriptions for delimited files.
//!
//! A dialect captures the syntax of a delimited file: delimiter, quoting,
//! header presence, comment prefix, row/column skipping, and the trim
//! policy. Tables and table groups reference a dialect; this crate owns it.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Cell whitespace trimming policy. The CSVW `trim` property is either a
/// boolean or one of `"start"`/`"end"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trim {
    True,
    #[default]
    False,
    Start,
    End,
}

impl Trim {
    pub(crate) fn apply(self, cell: &str) -> &str {
        match self {
            Self::True => cell.trim(),
            Self::False => cell,
            Self::Start => cell.trim_start(),
            Self::End => cell.trim_end(),
        }
    }
}

impl Serialize for Trim {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::True => serializer.serialize_bool(true),
            Self::False => serializer.serialize_bool(false),
            Self::Start => serializer.serialize_str("start"),
            Self::End => serializer.serialize_str("end"),
        }
    }
}

impl<'de> Deserialize<'de> for Trim {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TrimVisitor;

        impl Visitor<'_> for TrimVisitor {
            type Value = Trim;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a boolean or one of \"true\", \"false\", \"start\", \"end\"")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Trim, E> {
                Ok(if v { Trim::True } else { Trim::False })
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Trim, E> {
                match v {
                    "true" => Ok(Trim::True),
                    "false" => Ok(Trim::False),
                    "start" => Ok(Trim::Start),
                    "end" => Ok(Trim::End),
                    _ => Err(E::invalid_value(de::Unexpected::Str(v), &self)),
                }
            }
        }

        deserializer.deserialize_any(TrimVisitor)
    }
}

/// The delimited-file syntax configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct Dialect {
    pub comment_prefix: char,
    pub delimiter: char,
    pub double_quote: bool,
    /// Whether the file starts with a header row.
    pub header: bool,
    /// Number of header rows; only meaningful when `header` is set.
    pub header_row_count: u32,
    pub quote_char: Option<char>,
    pub skip_blank_rows: bool,
    pub skip_columns: u32,
    pub skip_initial_space: bool,
    pub skip_rows: u32,
    pub trim: Trim,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            comment_prefix: '#',
            delimiter: ',',
            double_quote: true,
            header: true,
            header_row_count: 1,
            quote_char: Some('"'),
            skip_blank_rows: false,
            skip_columns: 0,
            skip_initial_space: false,
            skip_rows: 0,
            trim: Trim::False,
        }
    }
}

impl Dialect {
    /// The trim policy with `skipInitialSpace` folded in.
    pub(crate) fn effective_trim(&self) -> Trim {
        if self.trim == Trim::False && self.skip_initial_space {
            Trim::Start
        } else {
            self.trim
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let dialect = Dialect::default();
        assert_eq!(dialect.delimiter, ',');
        assert!(dialect.header);
        assert_eq!(dialect.quote_char, Some('"'));
    }

    #[test]
    fn deserializes_camel_case() {
        let dialect: Dialect =
            serde_json::from_str(r#"{"header": false, "delimiter": ";", "skipRows": 1}"#).unwrap();
        assert!(!dialect.header);
        assert_eq!(dialect.delimiter, ';');
        assert_eq!(dialect.skip_rows, 1);
    }

    #[test]
    fn rejects_unknown_properties() {
        assert!(serde_json::from_str::<Dialect>(r#"{"nope": 1}"#).is_err());
    }

    #[test]
    fn trim_accepts_bool_and_string() {
        let d: Dialect = serde_json::from_str(r#"{"trim": true}"#).unwrap();
        assert_eq!(d.trim, Trim::True);
        let d: Dialect = serde_json::from_str(r#"{"trim": "start"}"#).unwrap();
        assert_eq!(d.trim, Trim::Start);
        assert!(serde_json::from_str::<Dialect>(r#"{"trim": "sideways"}"#).is_err());
    }
}
