//! CSVW atomic datatypes and datatype descriptions.
//!
//! This crate implements the datatype half of the W3C "CSV on the Web"
//! metadata model: a closed registry of atomic types with lexical
//! parse/format rules, a date/time pattern compiler, and the [`Datatype`]
//! facet bundle used by column descriptions.

pub mod datatype;
pub mod datatypes;
pub mod datetime;
pub mod error;
pub mod properties;
pub mod value;

pub use datatype::{Datatype, Format};
pub use datatypes::{Basetype, ParseSpec};
pub use datetime::{DateTimeFormat, TzMarker};
pub use error::DatatypeError;
pub use properties::Properties;
pub use value::{DateTimeValue, DecimalValue, IsoDuration, TimeValue, Value};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_roundtrip() {
        let dt = Datatype::from_value(&json!("integer")).unwrap();
        let parsed = dt.parse("5").unwrap();
        assert_eq!(dt.formatted(&parsed), "5");
    }

    #[test]
    fn datetime_roundtrip_with_explicit_format() {
        let dt =
            Datatype::from_value(&json!({"base": "date", "format": "yyyy-MM-dd"})).unwrap();
        let parsed = dt.read("2015-03-22").unwrap();
        assert_eq!(dt.formatted(&parsed), "2015-03-22");
    }
}
