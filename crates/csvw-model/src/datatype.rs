//! Datatype descriptions: a base type plus constraining facets.

use std::cmp::Ordering;

use serde_json::Value as Json;

use crate::datatypes::{Basetype, ParseSpec};
use crate::error::{DatatypeError, Result};
use crate::properties::{self, Properties};
use crate::value::Value;

/// The `format` facet. Numbers may carry a nested facet object instead of
/// a bare pattern string.
#[derive(Debug, Clone, PartialEq)]
pub enum Format {
    Pattern(String),
    Number {
        pattern: Option<String>,
        decimal_char: Option<String>,
        group_char: Option<String>,
    },
}

impl Format {
    fn from_json(value: &Json) -> Result<Self> {
        match value {
            Json::String(s) => Ok(Self::Pattern(s.clone())),
            Json::Object(obj) => {
                let mut pattern = None;
                let mut decimal_char = None;
                let mut group_char = None;
                for (key, value) in obj {
                    let text = value.as_str().map(str::to_string).ok_or_else(|| {
                        DatatypeError::config(format!("format property {key} must be a string"))
                    })?;
                    match key.as_str() {
                        "pattern" => pattern = Some(text),
                        "decimalChar" => decimal_char = Some(text),
                        "groupChar" => group_char = Some(text),
                        _ => {
                            return Err(DatatypeError::config(format!(
                                "unknown format property: {key}"
                            )));
                        }
                    }
                }
                Ok(Self::Number {
                    pattern,
                    decimal_char,
                    group_char,
                })
            }
            other => Err(DatatypeError::config(format!(
                "invalid format value: {other}"
            ))),
        }
    }

    fn to_json(&self) -> Json {
        match self {
            Self::Pattern(p) => Json::String(p.clone()),
            Self::Number {
                pattern,
                decimal_char,
                group_char,
            } => {
                let mut obj = serde_json::Map::new();
                if let Some(p) = pattern {
                    obj.insert("pattern".into(), Json::String(p.clone()));
                }
                if let Some(d) = decimal_char {
                    obj.insert("decimalChar".into(), Json::String(d.clone()));
                }
                if let Some(g) = group_char {
                    obj.insert("groupChar".into(), Json::String(g.clone()));
                }
                Json::Object(obj)
            }
        }
    }
}

/// A datatype description: base type name plus facets.
///
/// Facet consistency is checked at construction; the derived parse
/// parameters are resolved once and are immutable afterwards.
#[derive(Debug, Clone)]
pub struct Datatype {
    pub base: Basetype,
    pub format: Option<Format>,
    pub length: Option<usize>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Bound facets are kept in their raw JSON form and parsed through the
    /// datatype itself when checked.
    pub minimum: Option<Json>,
    pub maximum: Option<Json>,
    /// Stored and serialized, but not enforced by `validate`.
    pub min_inclusive: Option<Json>,
    pub max_inclusive: Option<Json>,
    pub min_exclusive: Option<Json>,
    pub max_exclusive: Option<Json>,
    pub props: Properties,
    spec: ParseSpec,
}

impl Datatype {
    /// A bare datatype with no facets.
    pub fn new(base: Basetype) -> Result<Self> {
        Self::build(base, None, Facets::default(), Properties::default())
    }

    /// Build from a metadata value: a bare type-name string, or a
    /// description object.
    pub fn from_value(value: &Json) -> Result<Self> {
        match value {
            Json::String(name) => Self::new(Basetype::from_name(name)?),
            Json::Object(obj) => {
                let (props, declared) = properties::partition(obj);
                let mut base = None;
                let mut format = None;
                let mut facets = Facets::default();
                for (key, value) in &declared {
                    match key.as_str() {
                        "base" => {
                            let name = value.as_str().ok_or_else(|| {
                                DatatypeError::config(format!("invalid base: {value}"))
                            })?;
                            base = Some(Basetype::from_name(name)?);
                        }
                        "format" => format = Some(Format::from_json(value)?),
                        "length" => facets.length = Some(facet_int(key, value)?),
                        "minLength" => facets.min_length = Some(facet_int(key, value)?),
                        "maxLength" => facets.max_length = Some(facet_int(key, value)?),
                        "minimum" => facets.minimum = Some(value.clone()),
                        "maximum" => facets.maximum = Some(value.clone()),
                        "minInclusive" => facets.min_inclusive = Some(value.clone()),
                        "maxInclusive" => facets.max_inclusive = Some(value.clone()),
                        "minExclusive" => facets.min_exclusive = Some(value.clone()),
                        "maxExclusive" => facets.max_exclusive = Some(value.clone()),
                        _ => {
                            return Err(DatatypeError::config(format!(
                                "unknown datatype property: {key}"
                            )));
                        }
                    }
                }
                let base =
                    base.ok_or_else(|| DatatypeError::config("datatype requires a base"))?;
                Self::build(base, format, facets, props)
            }
            other => Err(DatatypeError::config(format!(
                "invalid datatype description: {other}"
            ))),
        }
    }

    fn build(
        base: Basetype,
        format: Option<Format>,
        facets: Facets,
        props: Properties,
    ) -> Result<Self> {
        if let Some(length) = facets.length {
            if let Some(min) = facets.min_length
                && length < min
            {
                return Err(DatatypeError::config("length is less than minLength"));
            }
            if let Some(max) = facets.max_length
                && length > max
            {
                return Err(DatatypeError::config("length is greater than maxLength"));
            }
        }
        if let (Some(min), Some(max)) = (facets.min_length, facets.max_length)
            && min > max
        {
            return Err(DatatypeError::config("minLength is greater than maxLength"));
        }
        let spec = base.derived_description(format.as_ref())?;
        Ok(Self {
            base,
            format,
            length: facets.length,
            min_length: facets.min_length,
            max_length: facets.max_length,
            minimum: facets.minimum,
            maximum: facets.maximum,
            min_inclusive: facets.min_inclusive,
            max_inclusive: facets.max_inclusive,
            min_exclusive: facets.min_exclusive,
            max_exclusive: facets.max_exclusive,
            props,
            spec,
        })
    }

    /// Convert a lexical string to a typed value.
    pub fn parse(&self, value: &str) -> Result<Value> {
        self.base.parse(value, &self.spec)
    }

    /// Check facet constraints on an already parsed value.
    pub fn validate(&self, value: &Value) -> Result<()> {
        if let Some(len) = value.length() {
            if let Some(length) = self.length
                && len != length
            {
                return Err(self.violation("length", value));
            }
            if let Some(min) = self.min_length
                && len < min
            {
                return Err(self.violation("minLength", value));
            }
            if let Some(max) = self.max_length
                && len > max
            {
                return Err(self.violation("maxLength", value));
            }
        }
        if self.base.minmax() {
            if let Some(bound) = self.bound(self.minimum.as_ref())
                && value.partial_cmp_ordered(&bound) == Some(Ordering::Less)
            {
                return Err(self.violation("minimum", value));
            }
            if let Some(bound) = self.bound(self.maximum.as_ref())
                && value.partial_cmp_ordered(&bound) == Some(Ordering::Greater)
            {
                return Err(self.violation("maximum", value));
            }
        }
        Ok(())
    }

    /// Parse and validate: the single entry point used by row processing.
    pub fn read(&self, value: &str) -> Result<Value> {
        let parsed = self.parse(value)?;
        self.validate(&parsed)?;
        Ok(parsed)
    }

    /// Convert a typed value back to its lexical form.
    pub fn formatted(&self, value: &Value) -> String {
        self.base.format(value, &self.spec)
    }

    fn violation(&self, facet: &'static str, value: &Value) -> DatatypeError {
        DatatypeError::ConstraintViolation {
            facet,
            value: value.to_string(),
        }
    }

    /// A bound facet parsed through this datatype's own grammar.
    fn bound(&self, raw: Option<&Json>) -> Option<Value> {
        let raw = raw?;
        let lexical = match raw {
            Json::String(s) => s.clone(),
            other => other.to_string(),
        };
        self.parse(&lexical).ok()
    }

    /// Serialize back to the metadata shape; a datatype that is nothing but
    /// a base name collapses to the bare string.
    pub fn to_json(&self) -> Json {
        let mut obj = serde_json::Map::new();
        for (key, value) in self.props.entries() {
            obj.insert(key, value);
        }
        obj.insert("base".into(), Json::String(self.base.name().to_string()));
        if let Some(format) = &self.format {
            obj.insert("format".into(), format.to_json());
        }
        for (key, facet) in [
            ("length", self.length),
            ("minLength", self.min_length),
            ("maxLength", self.max_length),
        ] {
            if let Some(v) = facet {
                obj.insert(key.into(), Json::from(v as u64));
            }
        }
        for (key, facet) in [
            ("minimum", &self.minimum),
            ("maximum", &self.maximum),
            ("minInclusive", &self.min_inclusive),
            ("maxInclusive", &self.max_inclusive),
            ("minExclusive", &self.min_exclusive),
            ("maxExclusive", &self.max_exclusive),
        ] {
            if let Some(v) = facet {
                obj.insert(key.into(), v.clone());
            }
        }
        if obj.len() == 1 {
            return Json::String(self.base.name().to_string());
        }
        Json::Object(obj)
    }
}

#[derive(Debug, Default)]
struct Facets {
    length: Option<usize>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    minimum: Option<Json>,
    maximum: Option<Json>,
    min_inclusive: Option<Json>,
    max_inclusive: Option<Json>,
    min_exclusive: Option<Json>,
    max_exclusive: Option<Json>,
}

fn facet_int(key: &str, value: &Json) -> Result<usize> {
    match value {
        Json::Number(n) => n
            .as_u64()
            .map(|v| v as usize)
            .ok_or_else(|| DatatypeError::config(format!("invalid {key}: {value}"))),
        Json::String(s) => s
            .parse()
            .map_err(|_| DatatypeError::config(format!("invalid {key}: {value}"))),
        _ => Err(DatatypeError::config(format!("invalid {key}: {value}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_bare_string() {
        let dt = Datatype::from_value(&json!("integer")).unwrap();
        assert_eq!(dt.parse("5").unwrap(), Value::Integer(5));
        assert_eq!(dt.formatted(&Value::Integer(5)), "5");
    }

    #[test]
    fn from_object_with_props() {
        let dt =
            Datatype::from_value(&json!({"base": "string", "length": 5, "@id": "x", "dc:type": ""}))
                .unwrap();
        assert_eq!(dt.props.at.get("id"), Some(&json!("x")));
        assert!(dt.validate(&Value::String("abcde".into())).is_ok());
        assert!(dt.validate(&Value::String("abc".into())).is_err());
    }

    #[test]
    fn facet_consistency_enforced() {
        assert!(Datatype::from_value(&json!({"base": "string", "length": 5, "minLength": 6})).is_err());
        assert!(Datatype::from_value(&json!({"base": "string", "length": 5, "maxLength": 4})).is_err());
        assert!(
            Datatype::from_value(&json!({"base": "string", "minLength": 6, "maxLength": 5}))
                .is_err()
        );
        assert!(Datatype::from_value(&json!(5)).is_err());
    }

    #[test]
    fn min_max_bounds() {
        let dt = Datatype::from_value(&json!({"base": "integer", "minimum": 5, "maximum": 10}))
            .unwrap();
        let v = dt.parse("3").unwrap();
        assert!(dt.validate(&v).is_err());
        assert_eq!(dt.formatted(&v), "3");
        assert!(dt.validate(&Value::Integer(12)).is_err());
        assert!(dt.validate(&Value::Integer(7)).is_ok());
    }

    #[test]
    fn length_facets_skip_numbers() {
        let dt = Datatype::from_value(&json!({"base": "integer", "minLength": 3})).unwrap();
        // Numbers have no length; the facet silently does not apply.
        assert!(dt.validate(&Value::Integer(5)).is_ok());
    }

    #[test]
    fn boolean_custom_tokens() {
        let dt = Datatype::from_value(&json!({"base": "boolean", "format": "J|N"})).unwrap();
        assert_eq!(dt.parse("J").unwrap(), Value::Boolean(true));
        assert_eq!(dt.formatted(&Value::Boolean(true)), "J");
        assert!(dt.parse("true").is_err());
    }

    #[test]
    fn float_and_json() {
        let dt = Datatype::from_value(&json!({"base": "float"})).unwrap();
        assert_eq!(dt.parse("3.5").unwrap(), Value::Float(3.5));
        assert_eq!(dt.formatted(&Value::Float(3.5)), "3.5");

        let dt = Datatype::from_value(&json!({"base": "json"})).unwrap();
        let v = dt.parse("{\"a\": 5}").unwrap();
        assert_eq!(v, Value::Json(json!({"a": 5})));
        assert_eq!(dt.formatted(&v), "{\"a\":5}");
    }

    #[test]
    fn date_with_custom_format_roundtrip() {
        let dt = Datatype::from_value(&json!({"base": "date", "format": "d.M.yyyy"})).unwrap();
        let v = dt.read("22.3.2015").unwrap();
        assert_eq!(
            v,
            Value::Date(chrono::NaiveDate::from_ymd_opt(2015, 3, 22).unwrap())
        );
        assert_eq!(dt.formatted(&v), "22.3.2015");
    }

    #[test]
    fn datetime_with_marker_formats_offset() {
        let dt = Datatype::from_value(&json!({"base": "datetime", "format": "d.M.yyyy HH:mm X"}))
            .unwrap();
        let v = dt.read("22.3.2015 22:05 +03:00").unwrap();
        assert_eq!(dt.formatted(&v), "22.3.2015 22:05 +03");

        let dt = Datatype::from_value(&json!({"base": "datetime", "format": "d.M.yyyy HH:mm XXX"}))
            .unwrap();
        let v = dt.read("22.3.2015 22:05 +03:30").unwrap();
        assert_eq!(dt.formatted(&v), "22.3.2015 22:05 +03:30");
    }

    #[test]
    fn unknown_base_rejected() {
        assert!(matches!(
            Datatype::from_value(&json!({"base": "nope"})),
            Err(DatatypeError::UnknownDatatype(_))
        ));
        assert!(Datatype::from_value(&json!({"base": "string", "junk": 1})).is_err());
    }

    #[test]
    fn serialization_collapses_bare_base() {
        let dt = Datatype::from_value(&json!("integer")).unwrap();
        assert_eq!(dt.to_json(), json!("integer"));

        let dt = Datatype::from_value(&json!({"base": "string", "length": 5})).unwrap();
        assert_eq!(dt.to_json(), json!({"base": "string", "length": 5}));
    }
}
