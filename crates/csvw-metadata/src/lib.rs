//! CSVW tabular-metadata documents.
//!
//! Implements the table-description subset of the W3C "Metadata Vocabulary
//! for Tabular Data": description objects with property inheritance,
//! schemas and columns, and typed, validating row access to the described
//! delimited files.
//!
//! The entry point is [`TableGroup::from_file`], which loads a JSON
//! metadata document and builds the full object graph.

pub mod description;
pub mod error;
pub mod json;
pub mod schema;
pub mod table;

pub use description::{Inherited, Link, NaturalLanguage, UriTemplate};
pub use error::MetadataError;
pub use schema::{Column, ForeignKey, Reference, Schema};
pub use table::{Cell, CellSpec, ColSpec, Row, RowIterator, Table, TableGroup};
