//! Plugins invoked through `[{Name key=value}]` macros.
//!
//! The renderer only needs a [`PluginExecutor`]; [`PluginRegistry`] is the
//! stock implementation, resolving names case-insensitively with or without
//! the `Plugin` suffix.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;

use crate::context::ParseContext;
use crate::link::{Anchor, LinkRoutes, WIKIPAGE_CLASS};

/// Parsed `key=value` parameters of one plugin call.
pub type PluginParams = BTreeMap<String, String>;

/// Plugin failure. Rendered inline as `[Error: ...]` by the caller.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Plugin not found: {0}")]
    NotFound(String),
    #[error("Plugin {name} failed: {message}")]
    Failed { name: String, message: String },
}

/// Source of backlinks for plugins that list them.
pub trait ReferrerLookup: Send + Sync {
    /// Pages linking to `page`, sorted.
    fn referring_pages(&self, page: &str) -> Vec<String>;
}

/// What a plugin sees of the render in progress.
#[derive(Clone, Copy)]
pub struct PluginContext<'a> {
    pub page_name: &'a str,
    pub parse: &'a ParseContext,
    pub referrers: Option<&'a dyn ReferrerLookup>,
}

/// Dispatches plugin calls by name.
pub trait PluginExecutor: Send + Sync {
    fn execute(
        &self,
        name: &str,
        params: &PluginParams,
        ctx: &PluginContext<'_>,
    ) -> Result<String, PluginError>;
}

/// One named plugin.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn execute(&self, params: &PluginParams, ctx: &PluginContext<'_>)
    -> Result<String, PluginError>;
}

/// Name-indexed set of plugins.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, Arc<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in plugins.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ReferringPagesPlugin);
        registry
    }

    /// Add `plugin`, replacing any plugin of the same name.
    pub fn register(&mut self, plugin: impl Plugin + 'static) {
        let name = plugin.name().to_owned();
        tracing::debug!(plugin = %name, "Registered plugin");
        self.plugins.insert(name, Arc::new(plugin));
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }

    /// Find by exact name, then case-insensitively, then with the `Plugin`
    /// suffix added or removed.
    pub fn find(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        if let Some(plugin) = self.plugins.get(name) {
            return Some(plugin);
        }
        let lower = name.to_lowercase();
        let alternate = match lower.strip_suffix("plugin") {
            Some(stem) => stem.to_owned(),
            None => format!("{lower}plugin"),
        };
        [lower, alternate].iter().find_map(|candidate| {
            self.plugins
                .iter()
                .find(|(key, _)| key.to_lowercase() == *candidate)
                .map(|(_, plugin)| plugin)
        })
    }
}

impl PluginExecutor for PluginRegistry {
    fn execute(
        &self,
        name: &str,
        params: &PluginParams,
        ctx: &PluginContext<'_>,
    ) -> Result<String, PluginError> {
        let plugin = self
            .find(name)
            .ok_or_else(|| PluginError::NotFound(name.to_owned()))?;
        plugin.execute(params, ctx)
    }
}

/// Lists the pages linking to the current page.
///
/// Parameters: `max` (default 10) limits the list, `show=count` prints only
/// the number of referrers.
pub struct ReferringPagesPlugin;

impl Plugin for ReferringPagesPlugin {
    fn name(&self) -> &str {
        "ReferringPagesPlugin"
    }

    fn description(&self) -> &str {
        "Lists pages that refer to the current page"
    }

    fn execute(
        &self,
        params: &PluginParams,
        ctx: &PluginContext<'_>,
    ) -> Result<String, PluginError> {
        let referring = ctx
            .referrers
            .map(|lookup| lookup.referring_pages(ctx.page_name))
            .unwrap_or_default();

        if params.get("show").is_some_and(|show| show == "count") {
            return Ok(referring.len().to_string());
        }

        let max = match params.get("max") {
            Some(value) => value.parse::<usize>().map_err(|_| PluginError::Failed {
                name: self.name().to_owned(),
                message: format!("invalid max '{value}'"),
            })?,
            None => 10,
        };

        if referring.is_empty() {
            return Ok(String::new());
        }
        let routes = LinkRoutes::default();
        let mut html = String::from("<ul>");
        for page in referring.iter().take(max) {
            let anchor = Anchor::new(routes.view(page), page.as_str()).class(WIKIPAGE_CLASS);
            let _ = write!(html, "<li>{}</li>", anchor.to_html());
        }
        html.push_str("</ul>");
        Ok(html)
    }
}
