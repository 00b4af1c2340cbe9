//! Filesystem page store.

use std::fs;
use std::path::{Path, PathBuf};

use crate::store::{PageStore, StorageError, StorageErrorKind};

const BACKEND: &str = "Fs";
const EXTENSION: &str = "md";

/// Pages stored as `{root}/{name}.md`.
///
/// The directory is read flat; subdirectories and non-markdown files are
/// ignored.
#[derive(Debug, Clone)]
pub struct FsPageStore {
    root: PathBuf,
}

impl FsPageStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory the pages live in.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn page_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        let invalid = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0']);
        if invalid {
            return Err(StorageError::new(StorageErrorKind::InvalidName)
                .with_page(name)
                .with_backend(BACKEND));
        }
        Ok(self.root.join(format!("{name}.{EXTENSION}")))
    }
}

impl PageStore for FsPageStore {
    fn list_page_names(&self) -> Result<Vec<String>, StorageError> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| StorageError::io(e, &self.root).with_backend(BACKEND))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(e, &self.root).with_backend(BACKEND))?;
            let path = entry.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_owned());
            } else {
                tracing::warn!(path = %path.display(), "Skipping page with non UTF-8 name");
            }
        }
        names.sort();
        Ok(names)
    }

    fn get_page(&self, name: &str) -> Result<String, StorageError> {
        let path = self.page_path(name)?;
        fs::read_to_string(&path).map_err(|e| {
            StorageError::io(e, path)
                .with_page(name)
                .with_backend(BACKEND)
        })
    }

    fn page_exists(&self, name: &str) -> bool {
        self.page_path(name).is_ok_and(|path| path.is_file())
    }
}
