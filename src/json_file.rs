//! JSON file helpers

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{EtcError, Result};

/// Read a file holding a JSON object.
pub fn read_object(path: &Path) -> Result<Map<String, Value>> {
    let bytes = fs::read(path).map_err(|e| EtcError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| EtcError::json(path, e))
}

/// Write a value as indented JSON, replacing the file.
pub fn write_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value).map_err(|e| EtcError::json(path, e))?;
    json.push('\n');
    fs::write(path, json).map_err(|e| EtcError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        write_pretty(&path, &json!({"a": {"b": 1}})).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"a\""), "output should be indented");

        let map = read_object(&path).unwrap();
        assert_eq!(map["a"]["b"], 1);
    }

    #[test]
    fn test_read_non_object_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(read_object(&path), Err(EtcError::Json { .. })));
    }

    #[test]
    fn test_read_missing_fails() {
        let temp = TempDir::new().unwrap();
        let err = read_object(&temp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, EtcError::Io { .. }));
    }
}
