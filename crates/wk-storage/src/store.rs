//! Page store trait and its error type.

use std::path::PathBuf;

/// What went wrong while talking to a page store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageErrorKind {
    /// The page does not exist.
    NotFound,
    /// The backend refused access.
    PermissionDenied,
    /// The page name cannot be mapped onto the backend.
    InvalidName,
    /// The backend cannot be reached right now.
    Unavailable,
    /// Anything else.
    Other,
}

/// Storage failure with a semantic kind and optional page/path context.
#[derive(Debug)]
pub struct StorageError {
    /// Semantic error category.
    pub kind: StorageErrorKind,
    /// Page the operation targeted, if any.
    pub page: Option<String>,
    /// Backend location involved, if any.
    pub path: Option<PathBuf>,
    /// Backend identifier (e.g. "Fs", "Mock").
    pub backend: Option<&'static str>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StorageError {
    #[must_use]
    pub fn new(kind: StorageErrorKind) -> Self {
        Self {
            kind,
            page: None,
            path: None,
            backend: None,
            source: None,
        }
    }

    /// Page not found.
    #[must_use]
    pub fn not_found(page: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::NotFound).with_page(page)
    }

    /// Map an I/O error onto a storage error.
    #[must_use]
    pub fn io(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => StorageErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => StorageErrorKind::PermissionDenied,
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted => {
                StorageErrorKind::Unavailable
            }
            _ => StorageErrorKind::Other,
        };
        Self::new(kind).with_path(path).with_source(err)
    }

    #[must_use]
    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_backend(mut self, backend: &'static str) -> Self {
        self.backend = Some(backend);
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(backend) = self.backend {
            write!(f, "[{backend}] ")?;
        }

        let kind = match self.kind {
            StorageErrorKind::NotFound => "Page not found",
            StorageErrorKind::PermissionDenied => "Permission denied",
            StorageErrorKind::InvalidName => "Invalid page name",
            StorageErrorKind::Unavailable => "Storage unavailable",
            StorageErrorKind::Other => "Storage error",
        };
        write!(f, "{kind}")?;

        if let Some(page) = &self.page {
            write!(f, " '{page}'")?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Read access to wiki pages.
///
/// Page names are the wiki-visible names (`"Welcome"`, `"Plugin"`), not
/// backend paths. Implementations must be usable from several threads since
/// link-graph rebuilds load pages in parallel.
pub trait PageStore: Send + Sync {
    /// Names of every page currently stored.
    fn list_page_names(&self) -> Result<Vec<String>, StorageError>;

    /// Raw markup of one page.
    fn get_page(&self, name: &str) -> Result<String, StorageError>;

    /// Whether a page exists.
    fn page_exists(&self, name: &str) -> bool {
        self.get_page(name).is_ok()
    }
}
