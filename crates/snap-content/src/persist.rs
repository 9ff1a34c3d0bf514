//! File helpers shared by the content and menu stores.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tokio::fs;

use crate::error::{ContentError, ContentResult};

/// Pretty-printed JSON with two-space indentation.
pub(crate) fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> ContentResult<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|e| ContentError::Serialization(e.to_string()))
}

/// Read and parse a JSON file. A missing file is [`ContentError::NotFound`].
pub(crate) async fn read_json(path: &Path) -> ContentResult<Value> {
    let text = read_text(path).await?;
    serde_json::from_str(&text).map_err(|e| ContentError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

pub(crate) async fn read_text(path: &Path) -> ContentResult<String> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(ContentError::NotFound(path.display().to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Sibling path with `suffix` appended to the file name.
pub(crate) fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Replace `path` with `bytes` by writing a sibling temp file and renaming
/// it over the target.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8], suffix: &str) -> ContentResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let temp = sibling(path, suffix);
    if let Err(e) = fs::write(&temp, bytes).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pretty_json_uses_two_spaces() {
        let bytes = to_pretty_json(&json!({ "a": [1] })).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "{\n  \"a\": [\n    1\n  ]\n}");
    }

    #[test]
    fn sibling_appends_suffix() {
        assert_eq!(
            sibling(Path::new("/d/site-content.json"), ".tmp"),
            PathBuf::from("/d/site-content.json.tmp")
        );
    }

    #[tokio::test]
    async fn read_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_json(&dir.path().join("nope.json")).await.unwrap_err();
        assert!(matches!(err, ContentError::NotFound(_)));
    }

    #[tokio::test]
    async fn read_invalid_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ nope").await.unwrap();
        assert!(matches!(read_json(&path).await, Err(ContentError::Parse { .. })));
    }

    #[tokio::test]
    async fn atomic_write_creates_parents_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.json");
        write_atomic(&path, b"{}", ".tmp").await.unwrap();
        assert_eq!(fs::read(&path).await.unwrap(), b"{}");
        assert!(!sibling(&path, ".tmp").exists());
    }
}
