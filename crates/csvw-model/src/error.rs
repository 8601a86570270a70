use thiserror::Error;

/// Errors raised by the datatype layer.
///
/// All variants abort the operation that produced them; there is no
/// recovery at this level.
#[derive(Debug, Clone, Error)]
pub enum DatatypeError {
    /// A lexical string does not conform to its atomic type's grammar.
    #[error("invalid lexical value for {datatype}: {value}")]
    InvalidLexicalValue {
        datatype: &'static str,
        value: String,
    },

    /// A `base` name that is absent from the registry.
    #[error("unknown datatype: {0}")]
    UnknownDatatype(String),

    /// A facet combination that contradicts itself, or a format the base
    /// type cannot compile.
    #[error("invalid datatype description: {message}")]
    InvalidConfiguration { message: String },

    /// A successfully parsed value that violates a length or bound facet.
    #[error("value violates {facet} facet: {value}")]
    ConstraintViolation { facet: &'static str, value: String },
}

impl DatatypeError {
    pub(crate) fn invalid_lexical(datatype: &'static str, value: &str) -> Self {
        Self::InvalidLexicalValue {
            datatype,
            value: value.to_string(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DatatypeError>;
