//! Error types for handlers, the handler chain and rendering.

use crate::plugin::PluginError;

/// Failure of one handler, either for a single match or for a whole pass.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Unknown InterWiki site: {0}")]
    UnknownSite(String),
    #[error("Unsafe InterWiki URL generated: {0}")]
    UnsafeUrl(String),
    #[error("Invalid InterWiki site {name}: {reason}")]
    InvalidSite { name: String, reason: String },
    #[error(transparent)]
    Plugin(#[from] PluginError),
    #[error("Invalid syntax: {0}")]
    InvalidSyntax(String),
    #[error("Initialization failed: {0}")]
    Initialization(String),
}

/// Handler registration problem.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Handler {0} is already registered")]
    DuplicateId(String),
    #[error("Handler {handler} requires unavailable collaborator {dependency}")]
    MissingDependency { handler: String, dependency: String },
}

/// Failure of a rendering strategy.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Handler chain is not initialized")]
    NotInitialized,
    #[error("Handler {id} failed: {source}")]
    Handler {
        id: String,
        #[source]
        source: HandlerError,
    },
}
