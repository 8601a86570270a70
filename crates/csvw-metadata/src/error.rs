use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading a metadata document or reading its tables.
///
/// All failures abort the whole operation; row iteration has no partial-row
/// recovery.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON {path}: {message}")]
    Json { path: PathBuf, message: String },

    /// A description object with the wrong shape: unknown plain keys, bad
    /// value types, an invalid column name, a missing `url`.
    #[error("invalid description: {message}")]
    InvalidDescription { message: String },

    /// An empty (or null-token) cell in a required column.
    #[error("required column value is missing: {column}")]
    MissingRequiredValue { column: String },

    /// A foreign-key tuple with no matching row in the referenced table.
    #[error("key {key:?} not found in table {table}")]
    KeyNotFound { key: Vec<String>, table: String },

    #[error(transparent)]
    Datatype(#[from] csvw_model::DatatypeError),

    #[error(transparent)]
    Dsv(#[from] csvw_dsv::DsvError),
}

impl MetadataError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidDescription {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MetadataError>;
