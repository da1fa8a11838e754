//! File Provider
//!
//! Abstracts file-system access so an encrypting implementation can be
//! swapped in without the WAL noticing.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use crate::error::Result;

/// A file opened for appending
pub trait WritableFile: Write + Send {
    /// Push written data down to stable storage
    fn sync(&mut self) -> Result<()>;
}

impl WritableFile for File {
    fn sync(&mut self) -> Result<()> {
        self.sync_data()?;
        Ok(())
    }
}

/// File-system operations used by the WAL
pub trait FileProvider: Send + Sync {
    /// Create a directory and all missing parents
    fn create_dir_all(&self, dir: &Path) -> Result<()>;

    /// Create (or truncate) a file for writing
    fn create_file(&self, path: &Path) -> Result<Box<dyn WritableFile>>;

    /// Open an existing file for sequential reading
    fn open_file(&self, path: &Path) -> Result<Box<dyn Read + Send>>;

    fn delete_file(&self, path: &Path) -> Result<()>;

    /// Atomically replace `to` with `from`
    fn rename_file(&self, from: &Path, to: &Path) -> Result<()>;

    /// File names (not paths) of the regular files directly under `dir`
    fn list_dir(&self, dir: &Path) -> Result<Vec<String>>;
}

/// Plain, unencrypted local file system
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileProvider;

impl LocalFileProvider {
    pub fn new() -> Self {
        Self
    }

    /// Persist directory entries (creations, renames, removals)
    fn sync_dir(dir: &Path) -> Result<()> {
        #[cfg(unix)]
        {
            File::open(dir)?.sync_all()?;
        }
        #[cfg(not(unix))]
        {
            let _ = dir;
        }
        Ok(())
    }
}

impl FileProvider for LocalFileProvider {
    fn create_dir_all(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        Ok(())
    }

    fn create_file(&self, path: &Path) -> Result<Box<dyn WritableFile>> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        if let Some(parent) = path.parent() {
            Self::sync_dir(parent)?;
        }
        Ok(Box::new(file))
    }

    fn open_file(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(path)?))
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    fn rename_file(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to)?;
        if let Some(parent) = to.parent() {
            Self::sync_dir(parent)?;
        }
        Ok(())
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }
}
