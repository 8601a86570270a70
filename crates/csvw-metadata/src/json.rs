//! JSON document loading and dumping.

use std::path::Path;

use serde::Serialize as _;
use serde_json::Value as Json;

use crate::error::{MetadataError, Result};

/// Load a JSON document.
pub fn load(path: &Path) -> Result<Json> {
    let text = std::fs::read_to_string(path).map_err(|e| MetadataError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&text).map_err(|e| MetadataError::Json {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Dump a JSON document, pretty-printed with 4-space indentation.
pub fn dump(value: &Json, path: &Path) -> Result<()> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer).map_err(|e| MetadataError::Json {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    std::fs::write(path, buf).map_err(|e| MetadataError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn load_dump_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let doc = json!({"tables": [{"url": "a.csv"}]});
        dump(&doc, &path).unwrap();
        assert_eq!(load(&path).unwrap(), doc);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("    \"tables\""));
    }

    #[test]
    fn load_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, "{nope").unwrap();
        assert!(matches!(
            load(&path),
            Err(MetadataError::Json { .. })
        ));
    }
}
