//! Dialect-driven reading and writing of delimited files.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::dialect::{Dialect, Trim};
use crate::error::{DsvError, Result};

/// Lazy iterator over the rows of a delimited file.
///
/// Comment lines, skipped rows/columns, blank-row suppression, and the
/// trim policy are already applied; header handling is the caller's job.
pub struct Rows {
    records: csv::StringRecordsIntoIter<std::fs::File>,
    path: PathBuf,
    trim: Trim,
    skip_columns: usize,
    skip_blank_rows: bool,
    rows_to_skip: usize,
}

impl std::fmt::Debug for Rows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rows")
            .field("path", &self.path)
            .field("trim", &self.trim)
            .field("skip_columns", &self.skip_columns)
            .field("skip_blank_rows", &self.skip_blank_rows)
            .field("rows_to_skip", &self.rows_to_skip)
            .finish_non_exhaustive()
    }
}

impl Iterator for Rows {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(DsvError::csv(&self.path, e.to_string()))),
            };
            if self.rows_to_skip > 0 {
                self.rows_to_skip -= 1;
                continue;
            }
            let row: Vec<String> = record
                .iter()
                .skip(self.skip_columns)
                .map(|cell| self.trim.apply(cell).to_string())
                .collect();
            if self.skip_blank_rows && row.iter().all(|cell| cell.is_empty()) {
                continue;
            }
            return Some(Ok(row));
        }
    }
}

/// Open a delimited file for row-wise reading.
pub fn reader(path: impl AsRef<Path>, dialect: &Dialect) -> Result<Rows> {
    let path = path.as_ref();
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .flexible(true)
        .delimiter(dialect.delimiter as u8)
        .double_quote(dialect.double_quote)
        .comment(Some(dialect.comment_prefix as u8));
    match dialect.quote_char {
        Some(quote) => {
            builder.quote(quote as u8);
        }
        None => {
            builder.quoting(false);
        }
    }
    let reader = builder.from_path(path).map_err(|e| {
        let message = e.to_string();
        match e.into_kind() {
            csv::ErrorKind::Io(err) => DsvError::io(path, err),
            _ => DsvError::csv(path, message),
        }
    })?;
    tracing::debug!(
        path = %path.display(),
        delimiter = %dialect.delimiter,
        header = dialect.header,
        "reading delimited file"
    );
    Ok(Rows {
        records: reader.into_records(),
        path: path.to_path_buf(),
        trim: dialect.effective_trim(),
        skip_columns: dialect.skip_columns as usize,
        skip_blank_rows: dialect.skip_blank_rows,
        rows_to_skip: dialect.skip_rows as usize,
    })
}

/// Iterator over rows keyed by the file's header row.
pub struct DictRows {
    header: Vec<String>,
    rows: Rows,
}

impl DictRows {
    pub fn header(&self) -> &[String] {
        &self.header
    }
}

impl Iterator for DictRows {
    type Item = Result<IndexMap<String, String>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.rows.next()? {
            Err(e) => Some(Err(e)),
            Ok(row) => Some(Ok(self
                .header
                .iter()
                .cloned()
                .zip(row)
                .collect())),
        }
    }
}

/// Open a delimited file, consuming the first row as the header.
pub fn dict_reader(path: impl AsRef<Path>, dialect: &Dialect) -> Result<DictRows> {
    let mut rows = reader(path, dialect)?;
    let header = match rows.next() {
        None => Vec::new(),
        Some(Err(e)) => return Err(e),
        Some(Ok(header)) => header,
    };
    Ok(DictRows { header, rows })
}

/// Write rows to a delimited file using a dialect's syntax.
pub fn write<I>(path: impl AsRef<Path>, dialect: &Dialect, rows: I) -> Result<()>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let path = path.as_ref();
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(dialect.delimiter as u8)
        .double_quote(dialect.double_quote);
    if let Some(quote) = dialect.quote_char {
        builder.quote(quote as u8);
    }
    let mut writer = builder
        .from_path(path)
        .map_err(|e| DsvError::csv(path, e.to_string()))?;
    for row in rows {
        writer
            .write_record(&row)
            .map_err(|e| DsvError::csv(path, e.to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| DsvError::io(path, e))
}
