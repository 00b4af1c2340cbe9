//! In-memory page store for tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::store::{PageStore, StorageError, StorageErrorKind};

/// Page store backed by a sorted map.
///
/// # Example
///
/// ```ignore
/// use wk_storage::{MockPageStore, PageStore};
///
/// let store = MockPageStore::new()
///     .with_page("Welcome", "See [About]")
///     .with_page("About", "");
/// assert_eq!(store.list_page_names().unwrap(), vec!["About", "Welcome"]);
/// ```
#[derive(Debug, Default)]
pub struct MockPageStore {
    pages: RwLock<BTreeMap<String, String>>,
    fail_listing: AtomicBool,
    reads: AtomicUsize,
}

impl MockPageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page.
    #[must_use]
    pub fn with_page(self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.put_page(name, content);
        self
    }

    /// Make `list_page_names` fail with [`StorageErrorKind::Unavailable`].
    #[must_use]
    pub fn with_failing_listing(self) -> Self {
        self.fail_listing.store(true, Ordering::SeqCst);
        self
    }

    /// Insert or replace a page.
    pub fn put_page(&self, name: impl Into<String>, content: impl Into<String>) {
        self.pages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), content.into());
    }

    /// Delete a page.
    pub fn delete_page(&self, name: &str) {
        self.pages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }

    /// Toggle listing failures at runtime.
    pub fn set_failing_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Number of `get_page` calls served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl PageStore for MockPageStore {
    fn list_page_names(&self) -> Result<Vec<String>, StorageError> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(StorageError::new(StorageErrorKind::Unavailable).with_backend("Mock"));
        }
        Ok(self
            .pages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect())
    }

    fn get_page(&self, name: &str) -> Result<String, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.pages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::not_found(name).with_backend("Mock"))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_builder_and_mutation() {
        let store = MockPageStore::new()
            .with_page("Welcome", "hello")
            .with_page("About", "about");

        assert_eq!(store.list_page_names().unwrap(), vec!["About", "Welcome"]);

        store.put_page("Welcome", "changed");
        store.delete_page("About");

        assert_eq!(store.get_page("Welcome").unwrap(), "changed");
        assert_eq!(
            store.get_page("About").unwrap_err().kind,
            StorageErrorKind::NotFound
        );
        assert_eq!(store.read_count(), 2);
    }

    #[test]
    fn test_failing_listing() {
        let store = MockPageStore::new().with_failing_listing();
        assert_eq!(
            store.list_page_names().unwrap_err().kind,
            StorageErrorKind::Unavailable
        );

        store.set_failing_listing(false);
        assert!(store.list_page_names().unwrap().is_empty());
    }
}
