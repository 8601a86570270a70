//! Tables and table groups: the persisted metadata document and typed row
//! access to the described files.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use indexmap::IndexMap;
use serde_json::Value as Json;

use csvw_dsv::Dialect;
use csvw_model::{Datatype, Properties, Value, properties};

use crate::description::{Inherited, Link, expect_bool, expect_str};
use crate::error::{MetadataError, Result};
use crate::json;
use crate::schema::{Column, Schema};

/// A processed cell: a typed value, an explicit null, or a list produced
/// by a `separator` column.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Value(Value),
    List(Vec<Cell>),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Cell]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Value(v) => write!(f, "{v}"),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

/// A processed row: resolved column name to cell, in column order.
pub type Row = IndexMap<String, Cell>;

/// A column's effective description: the inherited properties resolved
/// through the Column -> Schema -> Table -> TableGroup chain.
#[derive(Debug, Clone)]
pub struct CellSpec {
    pub name: String,
    pub datatype: Option<Datatype>,
    pub default: String,
    pub lang: String,
    pub null: String,
    pub required: bool,
    pub separator: Option<String>,
}

impl CellSpec {
    fn resolve(column: &Column, schema: &Schema, table: &Table, group: &TableGroup) -> Self {
        let chain = [
            &column.inherited,
            &schema.inherited,
            &table.inherited,
            &group.inherited,
        ];
        Self {
            name: column.display_name(),
            datatype: chain.iter().find_map(|i| i.datatype.clone()),
            default: column.inherited.default.clone(),
            lang: column.inherited.lang.clone(),
            null: column.inherited.null.clone(),
            required: chain.iter().find_map(|i| i.required).unwrap_or(false),
            separator: chain.iter().find_map(|i| i.separator.clone()),
        }
    }

    fn read_atom(&self, lexical: String) -> Result<Cell> {
        match &self.datatype {
            Some(datatype) => Ok(Cell::Value(datatype.read(&lexical)?)),
            None => Ok(Cell::Value(Value::String(lexical))),
        }
    }

    /// The per-cell decision procedure. The order of the steps (empty
    /// handling first for every column, the null-token check only in the
    /// non-separator branch) is part of the contract.
    pub(crate) fn process(&self, raw: String) -> Result<Cell> {
        let mut raw = raw;
        if raw.is_empty() {
            if self.required {
                return Err(MetadataError::MissingRequiredValue {
                    column: self.name.clone(),
                });
            }
            raw = self.default.clone();
        }

        if let Some(separator) = &self.separator {
            if raw.is_empty() {
                return Ok(Cell::List(Vec::new()));
            }
            if raw == self.null {
                return Ok(Cell::Null);
            }
            let mut items = Vec::new();
            for piece in raw.split(separator.as_str()) {
                let piece = if piece.is_empty() {
                    self.default.clone()
                } else {
                    piece.to_string()
                };
                if piece == self.null {
                    items.push(Cell::Null);
                } else {
                    items.push(self.read_atom(piece)?);
                }
            }
            return Ok(Cell::List(items));
        }

        if raw == self.null {
            if self.required {
                return Err(MetadataError::MissingRequiredValue {
                    column: self.name.clone(),
                });
            }
            return Ok(Cell::Null);
        }
        self.read_atom(raw)
    }
}

/// Effective cell specs keyed by column display name (and first title).
pub type ColSpec = IndexMap<String, CellSpec>;

/// Lazy iterator over a table's processed rows.
pub struct RowIterator<'a> {
    rows: csvw_dsv::Rows,
    header: Vec<String>,
    colspec: &'a ColSpec,
}

impl Iterator for RowIterator<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = match self.rows.next()? {
            Ok(row) => row,
            Err(e) => return Some(Err(e.into())),
        };
        let mut row = Row::new();
        for (name, value) in self.header.iter().zip(raw) {
            match self.colspec.get(name) {
                Some(spec) => {
                    let cell = match spec.process(value) {
                        Ok(cell) => cell,
                        Err(e) => return Some(Err(e)),
                    };
                    row.insert(spec.name.clone(), cell);
                }
                None => {
                    row.insert(name.clone(), Cell::Value(Value::String(value)));
                }
            }
        }
        Some(Ok(row))
    }
}

/// Fields shared by tables and table groups.
#[derive(Debug, Default)]
struct TableLike {
    dialect: Option<Dialect>,
    notes: Vec<Json>,
    table_direction: String,
    schema: Schema,
    transformations: Vec<Json>,
}

fn consume_table_like(declared: &mut IndexMap<String, Json>) -> Result<TableLike> {
    let mut parts = TableLike {
        table_direction: "auto".to_string(),
        ..TableLike::default()
    };
    if let Some(v) = declared.shift_remove("dialect") {
        parts.dialect = Some(
            serde_json::from_value(v)
                .map_err(|e| MetadataError::invalid(format!("invalid dialect: {e}")))?,
        );
    }
    if let Some(v) = declared.shift_remove("notes") {
        parts.notes = match v {
            Json::Array(items) => items,
            other => vec![other],
        };
    }
    if let Some(v) = declared.shift_remove("tableDirection") {
        let direction = expect_str("tableDirection", &v)?;
        if !["rtl", "ltr", "auto"].contains(&direction.as_str()) {
            return Err(MetadataError::invalid(format!(
                "invalid tableDirection: {direction}"
            )));
        }
        parts.table_direction = direction;
    }
    if let Some(v) = declared.shift_remove("tableSchema") {
        parts.schema = Schema::from_optional_json(Some(&v))?;
    }
    if let Some(v) = declared.shift_remove("transformations") {
        parts.transformations = match v {
            Json::Array(items) => items,
            other => vec![other],
        };
    }
    Ok(parts)
}

fn dialect_to_json(dialect: &Dialect, omit_defaults: bool) -> Json {
    let value = serde_json::to_value(dialect).unwrap_or(Json::Null);
    if !omit_defaults {
        return value;
    }
    let defaults = serde_json::to_value(Dialect::default()).unwrap_or(Json::Null);
    match (value, defaults) {
        (Json::Object(obj), Json::Object(defaults)) => Json::Object(
            obj.into_iter()
                .filter(|(key, value)| defaults.get(key) != Some(value))
                .collect(),
        ),
        (value, _) => value,
    }
}

/// Insert a serialized property, dropping unset and empty values the way
/// the document serialization always does.
fn insert_nonempty(obj: &mut serde_json::Map<String, Json>, key: &str, value: Json) {
    let empty = match &value {
        Json::Null => true,
        Json::Array(items) => items.is_empty(),
        Json::Object(map) => map.is_empty(),
        _ => false,
    };
    if !empty {
        obj.insert(key.to_string(), value);
    }
}

/// One delimited file plus its schema.
#[derive(Debug)]
pub struct Table {
    pub url: Link,
    pub suppress_output: bool,
    pub dialect: Option<Dialect>,
    pub schema: Schema,
    pub notes: Vec<Json>,
    pub table_direction: String,
    pub transformations: Vec<Json>,
    pub inherited: Inherited,
    pub props: Properties,
    /// Memoized effective column specs. Computed on first row iteration
    /// and never invalidated: mutations after that can observe stale
    /// inherited values.
    colspec: OnceLock<ColSpec>,
}

impl Table {
    /// A table over a data file, with an empty schema.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Link(url.into()),
            suppress_output: false,
            dialect: None,
            schema: Schema::default(),
            notes: Vec::new(),
            table_direction: "auto".to_string(),
            transformations: Vec::new(),
            inherited: Inherited::default(),
            props: Properties::default(),
            colspec: OnceLock::new(),
        }
    }

    pub fn from_json(value: &Json) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| MetadataError::invalid(format!("invalid table description: {value}")))?;
        let (props, mut declared) = properties::partition(obj);
        let inherited = Inherited::consume(&mut declared)?;
        let parts = consume_table_like(&mut declared)?;
        let mut url = None;
        let mut suppress_output = false;
        for (key, value) in &declared {
            match key.as_str() {
                "url" => url = Some(Link(expect_str("url", value)?)),
                "suppressOutput" => suppress_output = expect_bool(key, value)?,
                _ => {
                    return Err(MetadataError::invalid(format!(
                        "unknown table property: {key}"
                    )));
                }
            }
        }
        let url = url.ok_or_else(|| MetadataError::invalid("table requires a url"))?;
        Ok(Self {
            url,
            suppress_output,
            dialect: parts.dialect,
            schema: parts.schema,
            notes: parts.notes,
            table_direction: parts.table_direction,
            transformations: parts.transformations,
            inherited,
            props,
            colspec: OnceLock::new(),
        })
    }

    /// The name rows of this table are registered under.
    pub fn local_name(&self) -> &str {
        self.url.as_str()
    }

    /// The effective per-column specs, keyed by display name and first
    /// title. Memoized per table instance.
    pub fn colspec(&self, group: &TableGroup) -> &ColSpec {
        self.colspec.get_or_init(|| {
            let mut spec = ColSpec::new();
            for column in &self.schema.columns {
                let cell = CellSpec::resolve(column, &self.schema, self, group);
                spec.insert(column.display_name(), cell.clone());
                if let Some(title) = column.titles.as_ref().and_then(|t| t.first()) {
                    spec.entry(title.to_string()).or_insert(cell);
                }
            }
            spec
        })
    }

    /// Iterate the table's data file, applying per-column rules to produce
    /// typed rows.
    pub fn rows<'a>(&'a self, group: &'a TableGroup) -> Result<RowIterator<'a>> {
        let dialect = self
            .dialect
            .clone()
            .or_else(|| group.dialect.clone())
            .unwrap_or_default();
        let path = self.url.resolve(group.base());
        tracing::debug!(
            url = %self.url,
            path = %path.display(),
            header = dialect.header,
            "iterating table"
        );
        let mut rows = csvw_dsv::reader(&path, &dialect)?;
        let header = if dialect.header {
            let mut header = None;
            for _ in 0..dialect.header_row_count.max(1) {
                match rows.next() {
                    None => break,
                    Some(Err(e)) => return Err(e.into()),
                    Some(Ok(row)) => {
                        if header.is_none() {
                            header = Some(row);
                        }
                    }
                }
            }
            header.unwrap_or_default()
        } else {
            self.schema
                .columns
                .iter()
                .filter(|column| !column.is_virtual)
                .map(Column::display_name)
                .collect()
        };
        Ok(RowIterator {
            rows,
            header,
            colspec: self.colspec(group),
        })
    }

    pub fn to_json(&self, omit_defaults: bool) -> Json {
        let mut obj = serde_json::Map::new();
        for (key, value) in self.props.entries() {
            obj.insert(key, value);
        }
        for (key, value) in self.inherited.entries(omit_defaults) {
            obj.insert(key, value);
        }
        if let Some(dialect) = &self.dialect {
            insert_nonempty(&mut obj, "dialect", dialect_to_json(dialect, omit_defaults));
        }
        insert_nonempty(&mut obj, "notes", Json::Array(self.notes.clone()));
        if !(omit_defaults && self.table_direction == "auto") {
            obj.insert(
                "tableDirection".into(),
                Json::String(self.table_direction.clone()),
            );
        }
        insert_nonempty(&mut obj, "tableSchema", self.schema.to_json(omit_defaults));
        insert_nonempty(
            &mut obj,
            "transformations",
            Json::Array(self.transformations.clone()),
        );
        obj.insert("url".into(), Json::String(self.url.0.clone()));
        if !(omit_defaults && !self.suppress_output) {
            obj.insert("suppressOutput".into(), Json::Bool(self.suppress_output));
        }
        Json::Object(obj)
    }
}

/// The root of a metadata document: a group of tables with shared
/// defaults.
#[derive(Debug)]
pub struct TableGroup {
    /// The metadata file this group was loaded from; relative table urls
    /// resolve against its directory.
    path: Option<PathBuf>,
    pub url: Option<String>,
    pub tables: Vec<Table>,
    pub dialect: Option<Dialect>,
    pub schema: Schema,
    pub notes: Vec<Json>,
    pub table_direction: String,
    pub transformations: Vec<Json>,
    pub inherited: Inherited,
    pub props: Properties,
}

impl Default for TableGroup {
    fn default() -> Self {
        Self {
            path: None,
            url: None,
            tables: Vec::new(),
            dialect: None,
            schema: Schema::default(),
            notes: Vec::new(),
            table_direction: "auto".to_string(),
            transformations: Vec::new(),
            inherited: Inherited::default(),
            props: Properties::default(),
        }
    }
}

impl TableGroup {
    /// Load a metadata document and build the full object graph.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let doc = json::load(path)?;
        let mut group = Self::from_json(&doc)?;
        group.path = Some(path.to_path_buf());
        Ok(group)
    }

    pub fn from_json(value: &Json) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            MetadataError::invalid(format!("invalid table group description: {value}"))
        })?;
        let (props, mut declared) = properties::partition(obj);
        let inherited = Inherited::consume(&mut declared)?;
        let parts = consume_table_like(&mut declared)?;
        let mut group = Self {
            dialect: parts.dialect,
            schema: parts.schema,
            notes: parts.notes,
            table_direction: parts.table_direction,
            transformations: parts.transformations,
            inherited,
            props,
            ..Self::default()
        };
        for (key, value) in &declared {
            match key.as_str() {
                "url" => group.url = Some(expect_str("url", value)?),
                "tables" => {
                    let items = value.as_array().ok_or_else(|| {
                        MetadataError::invalid(format!("tables must be a list, got {value}"))
                    })?;
                    group.tables = items
                        .iter()
                        .map(Table::from_json)
                        .collect::<Result<Vec<_>>>()?;
                }
                _ => {
                    return Err(MetadataError::invalid(format!(
                        "unknown table group property: {key}"
                    )));
                }
            }
        }
        Ok(group)
    }

    /// The directory relative table urls resolve against.
    pub fn base(&self) -> Option<&Path> {
        self.path.as_deref().and_then(Path::parent)
    }

    /// Look up a table by its url string.
    pub fn table(&self, local_name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|table| table.local_name() == local_name)
    }

    /// Iterate one of this group's tables.
    pub fn rows<'a>(&'a self, table: &'a Table) -> Result<RowIterator<'a>> {
        table.rows(self)
    }

    /// Check that every declared foreign key of every table matches a row
    /// in the referenced table.
    ///
    /// Materializes all rows of all tables first; the scan itself is a
    /// plain linear search per key.
    pub fn check_referential_integrity(&self) -> Result<()> {
        let mut data: IndexMap<&str, Vec<Row>> = IndexMap::new();
        for table in &self.tables {
            let rows = table.rows(self)?.collect::<Result<Vec<_>>>()?;
            data.insert(table.local_name(), rows);
        }
        tracing::debug!(tables = data.len(), "checking referential integrity");

        for table in &self.tables {
            for fk in &table.schema.foreign_keys {
                let resource = fk.reference.resource.as_ref().ok_or_else(|| {
                    MetadataError::invalid("foreign key reference requires a resource")
                })?;
                let referenced = data.get(resource.as_str()).ok_or_else(|| {
                    MetadataError::invalid(format!("referenced table not found: {resource}"))
                })?;
                let rows = data.get(table.local_name()).map(Vec::as_slice).unwrap_or(&[]);
                for row in rows {
                    let key = cell_tuple(row, &fk.column_reference, table.local_name())?;
                    let found = referenced.iter().any(|candidate| {
                        cell_tuple(candidate, &fk.reference.column_reference, resource.as_str())
                            .map(|candidate_key| candidate_key == key)
                            .unwrap_or(false)
                    });
                    if !found {
                        return Err(MetadataError::KeyNotFound {
                            key: key.iter().map(|cell| cell.to_string()).collect(),
                            table: resource.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn to_json(&self, omit_defaults: bool) -> Json {
        let mut obj = serde_json::Map::new();
        for (key, value) in self.props.entries() {
            obj.insert(key, value);
        }
        for (key, value) in self.inherited.entries(omit_defaults) {
            obj.insert(key, value);
        }
        if let Some(dialect) = &self.dialect {
            insert_nonempty(&mut obj, "dialect", dialect_to_json(dialect, omit_defaults));
        }
        insert_nonempty(&mut obj, "notes", Json::Array(self.notes.clone()));
        if !(omit_defaults && self.table_direction == "auto") {
            obj.insert(
                "tableDirection".into(),
                Json::String(self.table_direction.clone()),
            );
        }
        insert_nonempty(&mut obj, "tableSchema", self.schema.to_json(omit_defaults));
        insert_nonempty(
            &mut obj,
            "transformations",
            Json::Array(self.transformations.clone()),
        );
        if let Some(url) = &self.url {
            obj.insert("url".into(), Json::String(url.clone()));
        }
        insert_nonempty(
            &mut obj,
            "tables",
            Json::Array(
                self.tables
                    .iter()
                    .map(|table| table.to_json(omit_defaults))
                    .collect(),
            ),
        );
        Json::Object(obj)
    }

    /// Serialize the group back to a metadata document.
    pub fn to_file(&self, path: impl AsRef<Path>, omit_defaults: bool) -> Result<()> {
        json::dump(&self.to_json(omit_defaults), path.as_ref())
    }
}

fn cell_tuple<'a>(row: &'a Row, columns: &[String], table: &str) -> Result<Vec<&'a Cell>> {
    columns
        .iter()
        .map(|name| {
            row.get(name).ok_or_else(|| {
                MetadataError::invalid(format!("column {name} not found in table {table}"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(required: bool, null: &str, separator: Option<&str>) -> CellSpec {
        CellSpec {
            name: "c".to_string(),
            datatype: None,
            default: String::new(),
            lang: "und".to_string(),
            null: null.to_string(),
            required,
            separator: separator.map(str::to_string),
        }
    }

    #[test]
    fn empty_required_cell_is_missing() {
        let err = spec(true, "", None).process(String::new()).unwrap_err();
        assert!(matches!(err, MetadataError::MissingRequiredValue { .. }));
    }

    #[test]
    fn null_token_on_required_column_is_missing() {
        let err = spec(true, "abc", None)
            .process("abc".to_string())
            .unwrap_err();
        assert!(matches!(err, MetadataError::MissingRequiredValue { .. }));
    }

    #[test]
    fn empty_cell_with_separator_is_empty_list() {
        let cell = spec(false, "", Some(" ")).process(String::new()).unwrap();
        assert_eq!(cell, Cell::List(Vec::new()));
    }

    #[test]
    fn separator_splits_and_substitutes_null() {
        let cell = spec(false, "a", Some(" "))
            .process("a".to_string())
            .unwrap();
        assert_eq!(cell, Cell::Null);

        let cell = spec(false, "b", Some(","))
            .process("a,b,c".to_string())
            .unwrap();
        assert_eq!(
            cell,
            Cell::List(vec![
                Cell::Value(Value::String("a".to_string())),
                Cell::Null,
                Cell::Value(Value::String("c".to_string())),
            ])
        );
    }

    #[test]
    fn empty_list_elements_become_null_via_default() {
        // '' -> default ('') -> equals the null token ('') -> Null.
        let cell = spec(false, "", Some(","))
            .process("a,,b".to_string())
            .unwrap();
        assert_eq!(
            cell,
            Cell::List(vec![
                Cell::Value(Value::String("a".to_string())),
                Cell::Null,
                Cell::Value(Value::String("b".to_string())),
            ])
        );
    }

    #[test]
    fn plain_null_token_yields_null() {
        let cell = spec(false, "NA", None).process("NA".to_string()).unwrap();
        assert_eq!(cell, Cell::Null);
        let cell = spec(false, "NA", None).process("x".to_string()).unwrap();
        assert_eq!(cell, Cell::Value(Value::String("x".to_string())));
    }
}
