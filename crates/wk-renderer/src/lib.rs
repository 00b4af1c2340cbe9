//! Wiki markup to HTML.
//!
//! Markup is a markdown superset with `[Page]` links, `[Site:Page]`
//! InterWiki links, `[{$variable}]` and `[{Plugin}]` macros, JSPWiki tables
//! and `[[...]` escapes. Two strategies render it:
//!
//! - [`HandlerChain`]: pluggable [`SyntaxHandler`]s run in descending
//!   priority, then markdown conversion.
//! - [`LegacyPipeline`]: a fixed sequence of passes with plural-aware link
//!   resolution.
//!
//! [`WikiRenderer`] picks the chain when it is ready and falls back to the
//! legacy pipeline when the chain fails.
//!
//! # Example
//!
//! ```ignore
//! let renderer = WikiRenderer::new(config.rendering.clone(), legacy, alerts)
//!     .with_chain(chain);
//! let rendered = renderer.render("See [Main Page]", &ParseContext::new("Home"))?;
//! ```

pub mod alert;
mod chain;
mod context;
mod error;
mod handler;
pub mod handlers;
mod html;
mod legacy;
mod link;
mod macros;
mod markdown;
mod names;
mod orchestrator;
pub mod plugin;
mod protect;
pub mod tables;

pub use alert::{AlertKind, AlertSink, MemoryAlertSink, PerformanceAlert, TracingAlertSink};
pub use chain::{HandlerChain, HandlerStats};
pub use context::{ANONYMOUS, ASSERTED, LoginStatus, ParseContext, RequestInfo, UserContext};
pub use error::{HandlerError, RegistryError, RenderError};
pub use handler::{
    HandlerMetadata, HandlerOutput, InitContext, SyntaxHandler, SyntaxMatch, collect_matches,
    replace_matches,
};
pub use html::{encode_component, escape_html};
pub use legacy::LegacyPipeline;
pub use link::{Anchor, LinkParams, LinkRoutes, LinkTarget};
pub use macros::{MacroExpander, SystemInfo, format_uptime, parse_plugin_call};
pub use markdown::to_html as markdown_to_html;
pub use names::{PageNameIndex, PageNameMatcher, PageNames};
pub use orchestrator::{Rendered, Strategy, StrategyOutcome, WikiRenderer};
pub use plugin::{
    Plugin, PluginContext, PluginError, PluginExecutor, PluginParams, PluginRegistry,
    ReferrerLookup,
};
pub use protect::{ProtectedRegions, ProtectionScope};
