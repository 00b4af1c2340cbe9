//! Page storage abstraction for wk.
//!
//! Rendering and link-graph maintenance read pages through the
//! [`PageStore`] trait and never touch the backing medium directly.
//!
//! # Implementations
//!
//! - [`FsPageStore`]: a directory of `*.md` files, one page per file
//! - `MockPageStore`: in-memory pages for tests (requires the `mock` feature)
//!
//! # Example
//!
//! ```no_run
//! use wk_storage::{FsPageStore, PageStore};
//!
//! let store = FsPageStore::new("pages");
//! for name in store.list_page_names()? {
//!     let content = store.get_page(&name)?;
//!     println!("{name}: {} bytes", content.len());
//! }
//! # Ok::<(), wk_storage::StorageError>(())
//! ```

mod fs;
#[cfg(feature = "mock")]
mod mock;
mod store;

pub use fs::FsPageStore;
#[cfg(feature = "mock")]
pub use mock::MockPageStore;
pub use store::{PageStore, StorageError, StorageErrorKind};
