//! The document value passed through the pipeline.
//!
//! A [`Document`] is produced by the assembler (or read from an existing
//! file), transformed by the patch engine, and written exactly once at the
//! end of a run. Nothing in between touches the filesystem.

use serde::Serialize;
use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("IO error reading {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("IO error writing {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Full document text owned by one run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct Document {
    text: String,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Read an existing document from disk.
    pub fn read(path: &Path) -> Result<Self, DocumentError> {
        std::fs::read_to_string(path)
            .map(Self::new)
            .map_err(|source| DocumentError::Read {
                path: path.display().to_string(),
                source,
            })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Write the document to `path`, replacing any previous content atomically.
    pub fn write(&self, path: &Path) -> Result<(), DocumentError> {
        write_atomic(path, self.text.as_bytes()).map_err(|source| DocumentError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Write `bytes` to a temp file next to `path`, then rename it into place.
///
/// Readers never observe a half-written file. Parent directories are created.
/// An existing file keeps its permissions; a new file gets `0644` minus the
/// process umask, like a plain `fs::write`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o644));
    }
    let mut tmp = builder.tempfile_in(dir)?;
    if let Ok(existing) = std::fs::metadata(path) {
        tmp.as_file().set_permissions(existing.permissions())?;
    }

    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("site/out/index.html");
        Document::new("<p>hi</p>").write(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<p>hi</p>");
    }

    #[test]
    fn write_overwrites_previous_output() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.html");
        std::fs::write(&path, "old content that is longer").unwrap();
        Document::new("new").write(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn write_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.html");
        Document::new("x").write(&path).unwrap();
        let entries: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[cfg(unix)]
    fn mode(path: &Path) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[cfg(unix)]
    fn set_mode(path: &Path, mode: u32) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn write_preserves_existing_mode() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.html");
        for expected in [0o644, 0o664, 0o600] {
            std::fs::write(&path, "old").unwrap();
            set_mode(&path, expected);
            Document::new("new").write(&path).unwrap();
            assert_eq!(mode(&path), expected, "mode {expected:o} not preserved");
        }
    }

    #[cfg(unix)]
    #[test]
    fn new_file_is_not_owner_only() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.html");
        // Reference: what a plain write produces under the current umask.
        let reference = tmp.path().join("reference.html");
        std::fs::write(&reference, "x").unwrap();

        Document::new("x").write(&path).unwrap();
        assert_eq!(mode(&path), mode(&reference) & 0o644);
    }

    #[test]
    fn read_missing_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = Document::read(&tmp.path().join("missing.html"));
        assert!(matches!(result, Err(DocumentError::Read { .. })));
    }

    #[test]
    fn read_roundtrips_written_text() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.html");
        let doc = Document::new("<body>é</body>");
        doc.write(&path).unwrap();
        assert_eq!(Document::read(&path).unwrap(), doc);
    }
}
