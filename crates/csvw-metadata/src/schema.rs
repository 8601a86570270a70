//! Column and schema descriptions.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value as Json;

use csvw_model::Properties;
use csvw_model::properties;

use crate::description::{
    Inherited, Link, NaturalLanguage, expect_bool, expect_str, string_list,
};
use crate::error::{MetadataError, Result};

/// RFC 6570 level-1 variable names: the shape a column `name` must have.
fn varname_regex() -> &'static Regex {
    static VARNAME: OnceLock<Regex> = OnceLock::new();
    VARNAME.get_or_init(|| {
        Regex::new(r"^([a-zA-Z0-9_]|%[a-fA-F0-9]{2})(\.?([a-zA-Z0-9_]|%[a-fA-F0-9]{2}))*$")
            .expect("varname pattern is valid")
    })
}

/// A column description: a named, typed cell specification.
#[derive(Debug, Clone, Default)]
pub struct Column {
    pub name: Option<String>,
    pub suppress_output: bool,
    pub titles: Option<NaturalLanguage>,
    /// Virtual columns do not correspond to a cell in the file.
    pub is_virtual: bool,
    /// 1-based position, assigned exactly once by the owning schema.
    pub number: usize,
    pub inherited: Inherited,
    pub props: Properties,
}

impl Column {
    pub fn from_json(value: &Json) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| MetadataError::invalid(format!("invalid column description: {value}")))?;
        let (props, mut declared) = properties::partition(obj);
        let inherited = Inherited::consume(&mut declared)?;
        let mut column = Self {
            inherited,
            props,
            ..Self::default()
        };
        for (key, value) in &declared {
            match key.as_str() {
                "name" => {
                    let name = expect_str("name", value)?;
                    if !varname_regex().is_match(&name) {
                        return Err(MetadataError::invalid(format!(
                            "invalid column name: {name}"
                        )));
                    }
                    column.name = Some(name);
                }
                "suppressOutput" => column.suppress_output = expect_bool(key, value)?,
                "titles" => column.titles = Some(NaturalLanguage::from_json(value)?),
                "virtual" => column.is_virtual = expect_bool(key, value)?,
                _ => {
                    return Err(MetadataError::invalid(format!(
                        "unknown column property: {key}"
                    )));
                }
            }
        }
        Ok(column)
    }

    /// The name a cell of this column resolves to: `name`, else the first
    /// title, else `_col.<number>`.
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        if let Some(title) = self.titles.as_ref().and_then(|t| t.first()) {
            return title.to_string();
        }
        format!("_col.{}", self.number)
    }

    pub fn to_json(&self, omit_defaults: bool) -> Json {
        let mut obj = serde_json::Map::new();
        for (key, value) in self.props.entries() {
            obj.insert(key, value);
        }
        for (key, value) in self.inherited.entries(omit_defaults) {
            obj.insert(key, value);
        }
        if let Some(name) = &self.name {
            obj.insert("name".into(), Json::String(name.clone()));
        }
        if !(omit_defaults && !self.suppress_output) {
            obj.insert("suppressOutput".into(), Json::Bool(self.suppress_output));
        }
        if let Some(titles) = &self.titles {
            obj.insert("titles".into(), titles.to_json());
        }
        if !(omit_defaults && !self.is_virtual) {
            obj.insert("virtual".into(), Json::Bool(self.is_virtual));
        }
        Json::Object(obj)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// The referenced side of a foreign key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reference {
    pub resource: Option<Link>,
    pub schema_reference: Option<Link>,
    pub column_reference: Vec<String>,
}

impl Reference {
    fn from_json(value: &Json) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            MetadataError::invalid(format!("invalid foreign key reference: {value}"))
        })?;
        let mut reference = Self::default();
        for (key, value) in obj {
            match key.as_str() {
                "resource" => reference.resource = Some(Link(expect_str(key, value)?)),
                "schemaReference" => {
                    reference.schema_reference = Some(Link(expect_str(key, value)?));
                }
                "columnReference" => reference.column_reference = string_list(key, value)?,
                _ => {
                    return Err(MetadataError::invalid(format!(
                        "unknown reference property: {key}"
                    )));
                }
            }
        }
        Ok(reference)
    }

    fn to_json(&self) -> Json {
        let mut obj = serde_json::Map::new();
        if let Some(resource) = &self.resource {
            obj.insert("resource".into(), Json::String(resource.0.clone()));
        }
        if let Some(schema) = &self.schema_reference {
            obj.insert("schemaReference".into(), Json::String(schema.0.clone()));
        }
        if !self.column_reference.is_empty() {
            obj.insert(
                "columnReference".into(),
                Json::Array(
                    self.column_reference
                        .iter()
                        .cloned()
                        .map(Json::String)
                        .collect(),
                ),
            );
        }
        Json::Object(obj)
    }
}

/// A declared reference from this table's column(s) to another table's.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForeignKey {
    pub column_reference: Vec<String>,
    pub reference: Reference,
}

impl ForeignKey {
    pub fn from_json(value: &Json) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| MetadataError::invalid(format!("invalid foreign key: {value}")))?;
        let mut column_reference = Vec::new();
        let mut reference = None;
        for (key, value) in obj {
            match key.as_str() {
                "columnReference" => column_reference = string_list(key, value)?,
                "reference" => reference = Some(Reference::from_json(value)?),
                _ => {
                    return Err(MetadataError::invalid(format!(
                        "unknown foreign key property: {key}"
                    )));
                }
            }
        }
        let reference = reference
            .ok_or_else(|| MetadataError::invalid("foreign key requires a reference"))?;
        Ok(Self {
            column_reference,
            reference,
        })
    }

    pub fn to_json(&self) -> Json {
        let mut obj = serde_json::Map::new();
        if !self.column_reference.is_empty() {
            obj.insert(
                "columnReference".into(),
                Json::Array(
                    self.column_reference
                        .iter()
                        .cloned()
                        .map(Json::String)
                        .collect(),
                ),
            );
        }
        obj.insert("reference".into(), self.reference.to_json());
        Json::Object(obj)
    }
}

/// A table schema: ordered columns plus key declarations.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub columns: Vec<Column>,
    pub foreign_keys: Vec<ForeignKey>,
    pub primary_key: Option<Vec<String>>,
    pub row_titles: Vec<String>,
    pub inherited: Inherited,
    pub props: Properties,
}

impl Schema {
    /// A schema over the given columns, numbering them 1-based.
    pub fn new(columns: Vec<Column>) -> Self {
        let mut schema = Self {
            columns,
            ..Self::default()
        };
        schema.number_columns();
        schema
    }

    pub fn from_json(value: &Json) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| MetadataError::invalid(format!("invalid schema description: {value}")))?;
        let (props, mut declared) = properties::partition(obj);
        let inherited = Inherited::consume(&mut declared)?;
        let mut schema = Self {
            inherited,
            props,
            ..Self::default()
        };
        for (key, value) in &declared {
            match key.as_str() {
                "columns" => {
                    let items = value.as_array().ok_or_else(|| {
                        MetadataError::invalid(format!("columns must be a list, got {value}"))
                    })?;
                    schema.columns = items
                        .iter()
                        .map(Column::from_json)
                        .collect::<Result<Vec<_>>>()?;
                }
                "foreignKeys" => {
                    if value.is_null() {
                        continue;
                    }
                    let items = value.as_array().ok_or_else(|| {
                        MetadataError::invalid(format!("foreignKeys must be a list, got {value}"))
                    })?;
                    schema.foreign_keys = items
                        .iter()
                        .map(ForeignKey::from_json)
                        .collect::<Result<Vec<_>>>()?;
                }
                "primaryKey" => schema.primary_key = Some(string_list(key, value)?),
                "rowTitles" => schema.row_titles = string_list(key, value)?,
                _ => {
                    return Err(MetadataError::invalid(format!(
                        "unknown schema property: {key}"
                    )));
                }
            }
        }
        schema.number_columns();
        Ok(schema)
    }

    /// Column numbering is 1-based and assigned exactly once, here.
    fn number_columns(&mut self) {
        for (index, column) in self.columns.iter_mut().enumerate() {
            column.number = index + 1;
        }
    }

    /// Look up a column by its resolved display name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|col| col.display_name() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
            && self.foreign_keys.is_empty()
            && self.primary_key.is_none()
            && self.row_titles.is_empty()
            && self.props.is_empty()
    }

    pub fn to_json(&self, omit_defaults: bool) -> Json {
        let mut obj = serde_json::Map::new();
        for (key, value) in self.props.entries() {
            obj.insert(key, value);
        }
        for (key, value) in self.inherited.entries(omit_defaults) {
            obj.insert(key, value);
        }
        if !self.columns.is_empty() {
            obj.insert(
                "columns".into(),
                Json::Array(
                    self.columns
                        .iter()
                        .map(|col| col.to_json(omit_defaults))
                        .collect(),
                ),
            );
        }
        if !self.foreign_keys.is_empty() {
            obj.insert(
                "foreignKeys".into(),
                Json::Array(self.foreign_keys.iter().map(ForeignKey::to_json).collect()),
            );
        }
        if let Some(pk) = &self.primary_key {
            obj.insert(
                "primaryKey".into(),
                Json::Array(pk.iter().cloned().map(Json::String).collect()),
            );
        }
        if !self.row_titles.is_empty() {
            obj.insert(
                "rowTitles".into(),
                Json::Array(self.row_titles.iter().cloned().map(Json::String).collect()),
            );
        }
        Json::Object(obj)
    }

    /// Parse the `tableSchema` property: absent or null means an empty
    /// schema.
    pub(crate) fn from_optional_json(value: Option<&Json>) -> Result<Self> {
        match value {
            None | Some(Json::Null) => Ok(Self::default()),
            Some(value) => Self::from_json(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn column_names_are_validated() {
        assert!(Column::from_json(&json!({"name": "col_1"})).is_ok());
        assert!(Column::from_json(&json!({"name": "a.b"})).is_ok());
        assert!(Column::from_json(&json!({"name": "with space"})).is_err());
        assert!(Column::from_json(&json!({"name": ""})).is_err());
    }

    #[test]
    fn display_name_fallbacks() {
        let schema = Schema::from_json(&json!({"columns": [
            {"name": "a"},
            {"titles": "Second Column"},
            {},
        ]}))
        .unwrap();
        let names: Vec<String> = schema
            .columns
            .iter()
            .map(Column::display_name)
            .collect();
        assert_eq!(names, vec!["a", "Second Column", "_col.3"]);
    }

    #[test]
    fn columns_numbered_once() {
        let schema = Schema::from_json(&json!({"columns": [{}, {}, {}]})).unwrap();
        let numbers: Vec<usize> = schema.columns.iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn foreign_key_promotes_bare_strings() {
        let fk = ForeignKey::from_json(&json!({
            "columnReference": "ref",
            "reference": {"resource": "b.csv", "columnReference": "id"},
        }))
        .unwrap();
        assert_eq!(fk.column_reference, vec!["ref"]);
        assert_eq!(fk.reference.column_reference, vec!["id"]);
        assert_eq!(fk.reference.resource, Some(Link("b.csv".to_string())));

        assert!(ForeignKey::from_json(&json!({"columnReference": "ref"})).is_err());
    }

    #[test]
    fn unknown_properties_rejected() {
        assert!(Column::from_json(&json!({"nope": 1})).is_err());
        assert!(Schema::from_json(&json!({"nope": 1})).is_err());
    }

    #[test]
    fn schema_roundtrip() {
        let doc = json!({
            "columns": [{"name": "a", "datatype": "integer"}],
            "primaryKey": ["a"],
        });
        let schema = Schema::from_json(&doc).unwrap();
        assert_eq!(schema.to_json(true), doc);
    }
}
