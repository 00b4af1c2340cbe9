//! The [`Wiki`] facade: rendering plus link-graph maintenance over one
//! page store.
//!
//! # Thread Safety
//!
//! `Wiki` is shared behind an `Arc`:
//! - renders read the page-name index and link graph through short locks
//! - graph writers (rebuild, update, removal) are serialized by one mutex
//! - a rebuild requested while another runs waits for it and returns its
//!   result instead of starting a second one

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use wk_cache::{Cache, MemoryCache, NullCache};
use wk_config::{Config, InterWikiSiteConfig};
use wk_renderer::handlers::{
    EscapedSyntaxHandler, InterWikiLinkHandler, MacroHandler, SiteSource, TableHandler,
    WikiLinkHandler,
};
use wk_renderer::{
    AlertSink, HandlerChain, InitContext, LegacyPipeline, LinkRoutes, MacroExpander,
    PageNameMatcher, PageNames, ParseContext, PluginExecutor, PluginRegistry, ReferrerLookup,
    Rendered, SystemInfo, TracingAlertSink, WikiRenderer,
};
use wk_storage::PageStore;

use crate::error::SiteError;
use crate::link_graph::{LinkGraph, SharedLinkGraph};

/// Outcome of a full link-graph rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildSummary {
    /// Pages listed by the store.
    pub pages: usize,
    /// Pages whose content could not be loaded.
    pub skipped: usize,
    /// Graph entries, including link-only targets.
    pub entries: usize,
    pub elapsed: Duration,
}

#[derive(Default)]
struct RebuildState {
    in_flight: bool,
    /// Completed rebuilds.
    generation: u64,
    last: Option<Result<RebuildSummary, String>>,
}

/// Builder for [`Wiki`].
pub struct WikiBuilder {
    store: Arc<dyn PageStore>,
    config: Config,
    plugins: Option<Arc<dyn PluginExecutor>>,
    alerts: Option<Arc<dyn AlertSink>>,
    cache: Option<Arc<dyn Cache>>,
}

impl WikiBuilder {
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Plugin dispatcher; defaults to the built-in [`PluginRegistry`].
    #[must_use]
    pub fn plugins(mut self, plugins: Arc<dyn PluginExecutor>) -> Self {
        self.plugins = Some(plugins);
        self
    }

    /// Alert receiver; defaults to logging.
    #[must_use]
    pub fn alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    /// Handler result cache; defaults to an in-memory cache sized by
    /// `[handlers]`, or none when `cache_enabled` is off.
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Wire the renderer and initialize the handler chain.
    pub fn build(self) -> Result<Wiki, SiteError> {
        let Self {
            store,
            config,
            plugins,
            alerts,
            cache,
        } = self;

        let page_names = Arc::new(PageNames::new(PageNameMatcher::new(
            config.links.match_english_plurals,
        )));
        let graph = Arc::new(SharedLinkGraph::new());
        let alerts = alerts.unwrap_or_else(|| Arc::new(TracingAlertSink));
        let plugins = plugins.unwrap_or_else(|| Arc::new(PluginRegistry::with_builtins()));
        let routes = LinkRoutes::from_config(&config.links);

        let expander = Arc::new(
            MacroExpander::new(
                SystemInfo::from_config(&config.site),
                Arc::clone(&page_names),
                plugins,
            )
            .with_referrers(Arc::clone(&graph) as Arc<dyn ReferrerLookup>),
        );
        let legacy = LegacyPipeline::new(
            Arc::clone(&expander),
            Arc::clone(&page_names),
            routes.clone(),
        );
        let mut renderer = WikiRenderer::new(config.rendering.clone(), legacy, Arc::clone(&alerts));

        let mut interwiki = None;
        if config.rendering.use_advanced_parser {
            let cache: Arc<dyn Cache> = match cache {
                Some(cache) => cache,
                None if config.handlers.cache_enabled => Arc::new(MemoryCache::new(
                    Duration::from_secs(config.handlers.cache_ttl_secs),
                    config.handlers.cache_max_entries,
                )),
                None => Arc::new(NullCache),
            };
            let interwiki_handler = Arc::new(InterWikiLinkHandler::new(cache.bucket("handlers")));

            let mut chain = HandlerChain::from_config(&config.handlers, alerts);
            chain.register(EscapedSyntaxHandler::new())?;
            chain.register(MacroHandler::new(expander))?;
            chain.register(Arc::clone(&interwiki_handler))?;
            chain.register(TableHandler::new())?;
            chain.register(WikiLinkHandler::new(routes))?;

            chain.initialize(&InitContext {
                store: store.as_ref(),
                config: &config,
            });
            for id in &config.handlers.disabled {
                if !chain.set_enabled(id, false) {
                    tracing::warn!(handler = %id, "Unknown handler in disabled list");
                }
            }

            renderer = renderer.with_chain(Arc::new(chain));
            interwiki = Some(interwiki_handler);
        }

        Ok(Wiki {
            store,
            config,
            page_names,
            graph,
            renderer,
            interwiki,
            graph_writer: Mutex::new(()),
            rebuild: Mutex::new(RebuildState::default()),
            rebuild_done: Condvar::new(),
        })
    }
}

/// Rendering and backlinks for one wiki.
pub struct Wiki {
    store: Arc<dyn PageStore>,
    config: Config,
    page_names: Arc<PageNames>,
    graph: Arc<SharedLinkGraph>,
    renderer: WikiRenderer,
    interwiki: Option<Arc<InterWikiLinkHandler>>,
    /// Held by every graph writer.
    graph_writer: Mutex<()>,
    rebuild: Mutex<RebuildState>,
    rebuild_done: Condvar,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Wiki {
    pub fn builder(store: Arc<dyn PageStore>) -> WikiBuilder {
        WikiBuilder {
            store,
            config: Config::default(),
            plugins: None,
            alerts: None,
            cache: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn renderer(&self) -> &WikiRenderer {
        &self.renderer
    }

    pub fn store(&self) -> &dyn PageStore {
        self.store.as_ref()
    }

    /// Render markup for the page named in `ctx`.
    pub fn render(&self, content: &str, ctx: &ParseContext) -> Result<Rendered, SiteError> {
        Ok(self.renderer.render(content, ctx)?)
    }

    /// Load a page from the store and render it.
    pub fn render_page(&self, name: &str, ctx: &ParseContext) -> Result<Rendered, SiteError> {
        let content = self.store.get_page(name)?;
        self.render(&content, ctx)
    }

    /// Pages linking to `page`, sorted.
    pub fn referring_pages(&self, page: &str) -> Vec<String> {
        self.graph.read(|graph| graph.referring_pages(page))
    }

    /// Known pages nothing else links to.
    pub fn orphaned_pages(&self) -> Vec<String> {
        self.graph.read(LinkGraph::orphaned_pages)
    }

    /// Copy of the current graph.
    pub fn link_graph(&self) -> LinkGraph {
        self.graph.snapshot()
    }

    /// Names currently known to link resolution.
    pub fn page_names(&self) -> Vec<String> {
        self.page_names.snapshot().names().to_vec()
    }

    /// An existing page that `name` would collide with through plural
    /// matching, e.g. `Widgets` when `Widget` exists.
    pub fn find_page_name_conflict(&self, name: &str) -> Option<String> {
        let index = self.page_names.snapshot();
        index
            .matcher()
            .find_conflict(name, index.names())
            .map(str::to_owned)
    }

    /// Rebuild the graph from every page in the store.
    ///
    /// Page contents load in parallel; a page that fails to load is logged
    /// and left out. Afterwards handlers reload their page names.
    pub fn rebuild_link_graph(&self) -> Result<RebuildSummary, SiteError> {
        {
            let mut state = lock(&self.rebuild);
            if state.in_flight {
                let awaited = state.generation + 1;
                while state.generation < awaited {
                    state = self
                        .rebuild_done
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                tracing::debug!("Reused concurrent link graph rebuild");
                return match state.last.clone() {
                    Some(Ok(summary)) => Ok(summary),
                    Some(Err(message)) => Err(SiteError::RebuildFailed(message)),
                    None => Err(SiteError::RebuildFailed("no result".to_owned())),
                };
            }
            state.in_flight = true;
        }

        let result = self.rebuild_now();

        let mut state = lock(&self.rebuild);
        state.in_flight = false;
        state.generation += 1;
        state.last = Some(match &result {
            Ok(summary) => Ok(summary.clone()),
            Err(e) => Err(e.to_string()),
        });
        drop(state);
        self.rebuild_done.notify_all();
        result
    }

    fn rebuild_now(&self) -> Result<RebuildSummary, SiteError> {
        let _writer = lock(&self.graph_writer);
        let started = Instant::now();

        let names = self.store.list_page_names()?;
        self.page_names.replace(names.clone());
        let index = self.page_names.snapshot();

        let store = self.store.as_ref();
        let loaded: Vec<(&str, Option<String>)> = names
            .par_iter()
            .map(|name| match store.get_page(name) {
                Ok(content) => (name.as_str(), Some(content)),
                Err(e) => {
                    tracing::warn!(page = %name, error = %e, "Skipping page in link graph");
                    (name.as_str(), None)
                }
            })
            .collect();

        let skipped = loaded.iter().filter(|(_, content)| content.is_none()).count();
        let graph = LinkGraph::build(
            loaded
                .iter()
                .filter_map(|(name, content)| content.as_deref().map(|c| (*name, c))),
            &index,
        );
        let summary = RebuildSummary {
            pages: names.len(),
            skipped,
            entries: graph.len(),
            elapsed: started.elapsed(),
        };
        self.graph.replace(graph);

        if let Some(chain) = self.renderer.chain() {
            chain.refresh_page_names(self.store.as_ref());
        }
        tracing::info!(
            pages = summary.pages,
            skipped = summary.skipped,
            entries = summary.entries,
            elapsed_ms = summary.elapsed.as_millis(),
            "Link graph rebuilt"
        );
        Ok(summary)
    }

    /// Re-scan one saved page.
    pub fn update_page_in_link_graph(&self, page: &str, content: &str) {
        let _writer = lock(&self.graph_writer);
        let index = self.page_names.snapshot();
        self.graph.update(|graph| graph.update_page(page, content, &index));
        tracing::debug!(page, "Link graph updated");
    }

    /// Drop a deleted page from the graph and from link resolution.
    pub fn remove_page_from_link_graph(&self, page: &str) {
        let _writer = lock(&self.graph_writer);
        self.graph.update(|graph| graph.remove_page(page));
        self.page_names.remove(page);
        if let Some(chain) = self.renderer.chain() {
            chain.remove_page_name(page);
        }
        tracing::debug!(page, "Page removed from link graph");
    }

    /// Make a newly created page resolvable. The graph is not touched.
    pub fn add_page_to_cache(&self, page: &str) {
        self.page_names.insert(page);
        if let Some(chain) = self.renderer.chain() {
            chain.add_page_name(page);
        }
    }

    fn interwiki(&self) -> Result<&InterWikiLinkHandler, SiteError> {
        self.interwiki.as_deref().ok_or(SiteError::InterWikiDisabled)
    }

    pub fn interwiki_sites(&self) -> Result<Vec<(String, InterWikiSiteConfig)>, SiteError> {
        Ok(self.interwiki()?.available_sites().into_iter().collect())
    }

    pub fn add_interwiki_site(&self, name: &str, site: InterWikiSiteConfig) -> Result<(), SiteError> {
        Ok(self.interwiki()?.add_site(name, site)?)
    }

    pub fn remove_interwiki_site(&self, name: &str) -> Result<bool, SiteError> {
        Ok(self.interwiki()?.remove_site(name))
    }

    pub fn reload_interwiki_sites(&self) -> Result<SiteSource, SiteError> {
        Ok(self.interwiki()?.reload())
    }
}
