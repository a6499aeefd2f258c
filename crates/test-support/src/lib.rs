use std::{
    io,
    path::{Path, PathBuf},
};

use tempfile::TempDir;

/// A SQLite database file inside a temporary directory. The directory and
/// the database are removed when this is dropped.
pub struct TempDatabase {
    _dir: TempDir,
    path: PathBuf,
}

impl TempDatabase {
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("todo-test-").tempdir()?;
        let path = dir.path().join("test.sqlite3");
        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Connection string that creates the file on first connect.
    pub fn url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.path.to_string_lossy())
    }

    /// Connection string for the same file opened read-only. The file must
    /// already exist.
    pub fn read_only_url(&self) -> String {
        format!("sqlite://{}?mode=ro", self.path.to_string_lossy())
    }
}
