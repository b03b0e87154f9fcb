//! The file-system capability the engine consumes.
//!
//! The engine never touches `std::fs` directly — callers hand it a
//! [`FileSystem`] so the same matching core runs against the real disk, a
//! sandbox overlay, or an in-memory tree in tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

use crate::error::EditError;

pub trait FileSystem {
    fn exists(&self, path: &str) -> bool;
    /// Read as UTF-8. A missing path or a directory is `FileNotFound`.
    fn read(&self, path: &str) -> Result<String, EditError>;
    fn read_binary(&self, path: &str) -> Result<Vec<u8>, EditError>;
    fn write(&self, path: &str, content: &str) -> Result<(), EditError>;
    fn delete(&self, path: &str) -> Result<(), EditError>;
    fn mkdir(&self, path: &str) -> Result<(), EditError>;
}

// ── Real disk ─────────────────────────────────────────────────────────────────

/// `std::fs`-backed implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn read(&self, path: &str) -> Result<String, EditError> {
        let p = Path::new(path);
        if !p.is_file() {
            return Err(EditError::FileNotFound { path: path.to_string() });
        }
        std::fs::read_to_string(p).map_err(|e| EditError::io(format!("cannot read '{path}'"), e))
    }

    fn read_binary(&self, path: &str) -> Result<Vec<u8>, EditError> {
        let p = Path::new(path);
        if !p.is_file() {
            return Err(EditError::FileNotFound { path: path.to_string() });
        }
        std::fs::read(p).map_err(|e| EditError::io(format!("cannot read '{path}'"), e))
    }

    fn write(&self, path: &str, content: &str) -> Result<(), EditError> {
        std::fs::write(path, content)
            .map_err(|e| EditError::io(format!("cannot write '{path}'"), e))
    }

    fn delete(&self, path: &str) -> Result<(), EditError> {
        std::fs::remove_file(path)
            .map_err(|e| EditError::io(format!("cannot delete '{path}'"), e))
    }

    fn mkdir(&self, path: &str) -> Result<(), EditError> {
        std::fs::create_dir_all(path)
            .map_err(|e| EditError::io(format!("cannot create directory '{path}'"), e))
    }
}

// ── In-memory tree ────────────────────────────────────────────────────────────

/// HashMap-backed file system for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: RefCell<HashMap<String, String>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(path: &str, content: &str) -> Self {
        let fs = Self::new();
        fs.files.borrow_mut().insert(path.to_string(), content.to_string());
        fs
    }

    pub fn insert(&self, path: &str, content: &str) {
        self.files.borrow_mut().insert(path.to_string(), content.to_string());
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.files.borrow().get(path).cloned()
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &str) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn read(&self, path: &str) -> Result<String, EditError> {
        self.get(path).ok_or_else(|| EditError::FileNotFound { path: path.to_string() })
    }

    fn read_binary(&self, path: &str) -> Result<Vec<u8>, EditError> {
        self.read(path).map(String::into_bytes)
    }

    fn write(&self, path: &str, content: &str) -> Result<(), EditError> {
        self.insert(path, content);
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), EditError> {
        self.files
            .borrow_mut()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| EditError::FileNotFound { path: path.to_string() })
    }

    fn mkdir(&self, _path: &str) -> Result<(), EditError> {
        Ok(())
    }
}
