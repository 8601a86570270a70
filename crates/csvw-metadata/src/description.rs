//! Building blocks shared by all description objects: link and URI-template
//! properties, natural-language labels, and the inherited property set.

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::Value as Json;

use csvw_model::Datatype;

use crate::error::{MetadataError, Result};

/// A URI template property. Stored verbatim; template expansion is out of
/// scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate(pub String);

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A link property: a path relative to the metadata document's directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link(pub String);

impl Link {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve against a base directory, if one is known.
    pub fn resolve(&self, base: Option<&Path>) -> PathBuf {
        match base {
            Some(base) => base.join(&self.0),
            None => PathBuf::from(&self.0),
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A natural-language property: strings per language tag, where the
/// untagged entry is keyed by `None` and serialized as `und`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NaturalLanguage {
    entries: IndexMap<Option<String>, Vec<String>>,
}

impl NaturalLanguage {
    /// A single untagged string.
    pub fn from_string(value: impl Into<String>) -> Self {
        let mut entries = IndexMap::new();
        entries.insert(None, vec![value.into()]);
        Self { entries }
    }

    /// Build from the metadata shapes: a string, an array of strings, or a
    /// map from language tag to string(s).
    pub fn from_json(value: &Json) -> Result<Self> {
        let mut entries = IndexMap::new();
        match value {
            Json::String(s) => {
                entries.insert(None, vec![s.clone()]);
            }
            Json::Array(items) => {
                let strings = items
                    .iter()
                    .map(|item| {
                        item.as_str().map(str::to_string).ok_or_else(|| {
                            MetadataError::invalid(format!("invalid language value: {item}"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                entries.insert(None, strings);
            }
            Json::Object(obj) => {
                for (lang, v) in obj {
                    let strings = match v {
                        Json::String(s) => vec![s.clone()],
                        Json::Array(items) => items
                            .iter()
                            .map(|item| {
                                item.as_str().map(str::to_string).ok_or_else(|| {
                                    MetadataError::invalid(format!(
                                        "invalid language value: {item}"
                                    ))
                                })
                            })
                            .collect::<Result<Vec<_>>>()?,
                        other => {
                            return Err(MetadataError::invalid(format!(
                                "invalid language value: {other}"
                            )));
                        }
                    };
                    entries.insert(Some(lang.clone()), strings);
                }
            }
            other => {
                return Err(MetadataError::invalid(format!(
                    "invalid natural language value: {other}"
                )));
            }
        }
        Ok(Self { entries })
    }

    /// First string for a language tag (`None` for the untagged entry).
    pub fn getfirst(&self, lang: Option<&str>) -> Option<&str> {
        let key = lang.map(str::to_string);
        self.entries
            .get(&key)
            .and_then(|strings| strings.first())
            .map(String::as_str)
    }

    /// The display string: the untagged entry, else the first of any tag.
    pub fn first(&self) -> Option<&str> {
        self.getfirst(None).or_else(|| {
            self.entries
                .values()
                .next()
                .and_then(|strings| strings.first())
                .map(String::as_str)
        })
    }

    pub fn add(&mut self, string: impl Into<String>, lang: Option<&str>) {
        self.entries
            .entry(lang.map(str::to_string))
            .or_default()
            .push(string.into());
    }

    /// Serialize to the most compact metadata shape.
    pub fn to_json(&self) -> Json {
        if self.entries.len() == 1
            && let Some(strings) = self.entries.get(&None)
        {
            if strings.len() == 1 {
                return Json::String(strings[0].clone());
            }
            return Json::Array(strings.iter().cloned().map(Json::String).collect());
        }
        let mut obj = serde_json::Map::new();
        for (lang, strings) in &self.entries {
            let key = lang.clone().unwrap_or_else(|| "und".to_string());
            let value = if strings.len() == 1 {
                Json::String(strings[0].clone())
            } else {
                Json::Array(strings.iter().cloned().map(Json::String).collect())
            };
            obj.insert(key, value);
        }
        Json::Object(obj)
    }
}

impl fmt::Display for NaturalLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first().unwrap_or(""))
    }
}

/// The inherited properties of a description.
///
/// `datatype`, `required`, and `separator` fall back through the enclosing
/// schema, table, and table group when unset; `default`, `lang`, and `null`
/// carry their specification defaults from construction on.
#[derive(Debug, Clone)]
pub struct Inherited {
    pub about_url: Option<UriTemplate>,
    pub datatype: Option<Datatype>,
    pub default: String,
    pub lang: String,
    pub null: String,
    pub ordered: Option<bool>,
    pub property_url: Option<UriTemplate>,
    pub required: Option<bool>,
    pub separator: Option<String>,
    pub text_direction: Option<String>,
    pub value_url: Option<UriTemplate>,
}

impl Default for Inherited {
    fn default() -> Self {
        Self {
            about_url: None,
            datatype: None,
            default: String::new(),
            lang: "und".to_string(),
            null: String::new(),
            ordered: None,
            property_url: None,
            required: None,
            separator: None,
            text_direction: None,
            value_url: None,
        }
    }
}

impl Inherited {
    /// Consume the inherited keys out of a partitioned declared-field map;
    /// whatever remains is for the specific description to interpret.
    pub(crate) fn consume(declared: &mut IndexMap<String, Json>) -> Result<Self> {
        let mut inherited = Self::default();
        if let Some(v) = declared.shift_remove("aboutUrl") {
            inherited.about_url = Some(UriTemplate(expect_str("aboutUrl", &v)?));
        }
        if let Some(v) = declared.shift_remove("datatype") {
            inherited.datatype = Some(Datatype::from_value(&v)?);
        }
        if let Some(v) = declared.shift_remove("default") {
            inherited.default = expect_str("default", &v)?;
        }
        if let Some(v) = declared.shift_remove("lang") {
            inherited.lang = expect_str("lang", &v)?;
        }
        if let Some(v) = declared.shift_remove("null") {
            inherited.null = expect_str("null", &v)?;
        }
        if let Some(v) = declared.shift_remove("ordered") {
            inherited.ordered = Some(expect_bool("ordered", &v)?);
        }
        if let Some(v) = declared.shift_remove("propertyUrl") {
            inherited.property_url = Some(UriTemplate(expect_str("propertyUrl", &v)?));
        }
        if let Some(v) = declared.shift_remove("required") {
            inherited.required = Some(expect_bool("required", &v)?);
        }
        if let Some(v) = declared.shift_remove("separator") {
            inherited.separator = Some(expect_str("separator", &v)?);
        }
        if let Some(v) = declared.shift_remove("textDirection") {
            inherited.text_direction = Some(expect_str("textDirection", &v)?);
        }
        if let Some(v) = declared.shift_remove("valueUrl") {
            inherited.value_url = Some(UriTemplate(expect_str("valueUrl", &v)?));
        }
        Ok(inherited)
    }

    /// Serialized entries in declaration order, skipping unset values and,
    /// with `omit_defaults`, the specification defaults.
    pub(crate) fn entries(&self, omit_defaults: bool) -> Vec<(String, Json)> {
        let mut out = Vec::new();
        if let Some(u) = &self.about_url {
            out.push(("aboutUrl".to_string(), Json::String(u.0.clone())));
        }
        if let Some(dt) = &self.datatype {
            out.push(("datatype".to_string(), dt.to_json()));
        }
        if !(omit_defaults && self.default.is_empty()) {
            out.push(("default".to_string(), Json::String(self.default.clone())));
        }
        if !(omit_defaults && self.lang == "und") {
            out.push(("lang".to_string(), Json::String(self.lang.clone())));
        }
        if !(omit_defaults && self.null.is_empty()) {
            out.push(("null".to_string(), Json::String(self.null.clone())));
        }
        if let Some(b) = self.ordered {
            out.push(("ordered".to_string(), Json::Bool(b)));
        }
        if let Some(u) = &self.property_url {
            out.push(("propertyUrl".to_string(), Json::String(u.0.clone())));
        }
        if let Some(b) = self.required {
            out.push(("required".to_string(), Json::Bool(b)));
        }
        if let Some(s) = &self.separator {
            out.push(("separator".to_string(), Json::String(s.clone())));
        }
        if let Some(s) = &self.text_direction {
            out.push(("textDirection".to_string(), Json::String(s.clone())));
        }
        if let Some(u) = &self.value_url {
            out.push(("valueUrl".to_string(), Json::String(u.0.clone())));
        }
        out
    }
}

pub(crate) fn expect_str(key: &str, value: &Json) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| MetadataError::invalid(format!("{key} must be a string, got {value}")))
}

pub(crate) fn expect_bool(key: &str, value: &Json) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| MetadataError::invalid(format!("{key} must be a boolean, got {value}")))
}

/// A column-reference-like value: a bare string is promoted to a
/// one-element list.
pub(crate) fn string_list(key: &str, value: &Json) -> Result<Vec<String>> {
    match value {
        Json::String(s) => Ok(vec![s.clone()]),
        Json::Array(items) => items
            .iter()
            .map(|item| expect_str(key, item))
            .collect(),
        other => Err(MetadataError::invalid(format!(
            "{key} must be a string or list of strings, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn natural_language_shapes() {
        let l = NaturalLanguage::from_json(&json!("abc")).unwrap();
        assert_eq!(l.getfirst(None), Some("abc"));
        assert_eq!(l.to_string(), "abc");

        let l = NaturalLanguage::from_json(&json!(["abc", "def"])).unwrap();
        assert_eq!(l.getfirst(None), Some("abc"));
        assert_eq!(l.to_json(), json!(["abc", "def"]));

        let l = NaturalLanguage::from_json(&json!({"en": ["abc", "def"], "de": "äöü"})).unwrap();
        assert_eq!(l.getfirst(Some("de")), Some("äöü"));
        assert_eq!(l.getfirst(Some("en")), Some("abc"));
        assert_eq!(l.to_string(), "abc");

        assert!(NaturalLanguage::from_json(&json!(1)).is_err());
    }

    #[test]
    fn natural_language_add_and_serialize() {
        let mut l = NaturalLanguage::from_string("ä");
        assert_eq!(l.to_json(), json!("ä"));
        l.add("a", None);
        assert_eq!(l.to_json(), json!(["ä", "a"]));
        l.add("ö", Some("de"));
        assert_eq!(l.to_json(), json!({"und": ["ä", "a"], "de": "ö"}));
    }

    #[test]
    fn link_resolution() {
        let link = Link("a.csv".to_string());
        assert_eq!(link.resolve(None), PathBuf::from("a.csv"));
        assert_eq!(
            link.resolve(Some(Path::new("/data"))),
            PathBuf::from("/data/a.csv")
        );
    }

    #[test]
    fn inherited_consume_rejects_bad_types() {
        let obj = json!({"separator": 5});
        let (_, mut declared) = csvw_model::properties::partition(obj.as_object().unwrap());
        assert!(Inherited::consume(&mut declared).is_err());
    }

    #[test]
    fn inherited_entries_omit_defaults() {
        let inherited = Inherited::default();
        assert!(inherited.entries(true).is_empty());
        let keys: Vec<String> = inherited
            .entries(false)
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["default", "lang", "null"]);
    }
}
