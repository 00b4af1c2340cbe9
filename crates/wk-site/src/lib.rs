//! A wiki over one page store: rendering plus backlinks.
//!
//! [`Wiki`] wires the renderer crate together for a [`PageStore`]: it
//! registers the built-in syntax handlers, keeps the plural-aware page-name
//! index current, and maintains the [`LinkGraph`] the `ReferringPagesPlugin`
//! and the orphan report read from.
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(FsPageStore::new("pages"));
//! let wiki = Wiki::builder(store).config(config).build()?;
//! wiki.rebuild_link_graph()?;
//! let rendered = wiki.render_page("Home", &ParseContext::new("Home"))?;
//! println!("{}", rendered.html);
//! ```
//!
//! [`PageStore`]: wk_storage::PageStore

mod error;
mod link_graph;
mod wiki;

pub use error::SiteError;
pub use link_graph::{LinkGraph, SharedLinkGraph, scan_links};
pub use wiki::{RebuildSummary, Wiki, WikiBuilder};
