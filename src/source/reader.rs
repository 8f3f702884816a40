use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Which decoding produced the parsed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    Latin1,
}

/// Read and parse one JSON document. A document that is not valid UTF-8
/// JSON is retried once as Latin-1 before the error is returned.
pub fn read_document(path: &Path) -> Result<(Value, SourceEncoding)> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse_document(&bytes).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn parse_document(bytes: &[u8]) -> Result<(Value, SourceEncoding)> {
    let utf8 = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match serde_json::from_slice(utf8) {
        Ok(value) => Ok((value, SourceEncoding::Utf8)),
        Err(utf8_error) => {
            let latin1: String = bytes.iter().map(|&b| char::from(b)).collect();
            let value = serde_json::from_str(&latin1)
                .with_context(|| format!("not valid as UTF-8 ({}) or Latin-1 JSON", utf8_error))?;
            Ok((value, SourceEncoding::Latin1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_utf8_with_and_without_bom() {
        let (value, encoding) = parse_document(br#"{"data": {"a": 1}}"#).unwrap();
        assert_eq!(value, json!({"data": {"a": 1}}));
        assert_eq!(encoding, SourceEncoding::Utf8);

        let mut with_bom = UTF8_BOM.to_vec();
        with_bom.extend_from_slice(br#"{"ok": true}"#);
        let (value, encoding) = parse_document(&with_bom).unwrap();
        assert_eq!(value, json!({"ok": true}));
        assert_eq!(encoding, SourceEncoding::Utf8);
    }

    #[test]
    fn test_latin1_fallback() {
        // "Café" with the e-acute as a single Latin-1 byte.
        let bytes = b"{\"name\": \"Caf\xE9\"}";
        let (value, encoding) = parse_document(bytes).unwrap();
        assert_eq!(encoding, SourceEncoding::Latin1);
        assert_eq!(value["name"], json!("Caf\u{e9}"));
    }

    #[test]
    fn test_garbage_fails_after_retry() {
        let err = parse_document(b"not json at all").unwrap_err();
        assert!(format!("{:#}", err).contains("Latin-1"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(read_document(&tmp.path().join("absent.json")).is_err());
    }
}
