use wk_renderer::{HandlerError, RegistryError, RenderError};
use wk_storage::StorageError;

/// Error returned by [`Wiki`](crate::Wiki) operations.
#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    InterWiki(#[from] HandlerError),
    /// The handler chain, and with it InterWiki support, is switched off.
    #[error("InterWiki links are not enabled")]
    InterWikiDisabled,
    /// A concurrent rebuild this call waited for failed.
    #[error("Link graph rebuild failed: {0}")]
    RebuildFailed(String),
}
