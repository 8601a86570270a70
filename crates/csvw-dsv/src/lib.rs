//! Delimited-file reading and writing for CSVW tables.
//!
//! The metadata layer describes *what* the cells mean; this crate only
//! deals with *how* the file is cut into rows and cells, as configured by
//! a [`Dialect`].

pub mod dialect;
pub mod error;
pub mod reader;

pub use dialect::{Dialect, Trim};
pub use error::DsvError;
pub use reader::{DictRows, Rows, dict_reader, reader, write};
