//! `[Site:Page]` links to external wikis.
//!
//! The site table is loaded from `interwiki.toml`, falling back to the
//! `[interwiki.sites]` section of the main config and then to a built-in
//! set. Generated links are cached per matched text and render context,
//! with the context bucketed by hour.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::{LazyLock, PoisonError, RwLock, RwLockReadGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use url::{Host, Url};
use wk_cache::{CacheBucket, CacheBucketExt};
use wk_config::{
    ConfigError, InterWikiConfig, InterWikiFile, InterWikiSiteConfig, default_sites,
};

use crate::context::ParseContext;
use crate::error::HandlerError;
use crate::handler::{HandlerMetadata, HandlerOutput, InitContext, SyntaxHandler, SyntaxMatch};
use crate::html::{encode_component, escape_html};

static INTERWIKI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([A-Za-z0-9]+):([^|\]]+)(?:\|([^\]]+))?\]").expect("invalid interwiki regex")
});

/// Page name substituted into a site template when checking it.
const PROBE_PAGE: &str = "Test";

/// Where the site table was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteSource {
    File,
    MainConfig,
    Defaults,
}

#[derive(Debug, Default)]
struct Sources {
    file: Option<PathBuf>,
    main_config: BTreeMap<String, InterWikiSiteConfig>,
}

#[derive(Debug)]
struct SiteTable {
    sites: BTreeMap<String, InterWikiSiteConfig>,
    show_icons: bool,
}

impl SiteTable {
    fn load(sources: &Sources) -> (Self, SiteSource) {
        if let Some(path) = &sources.file {
            match InterWikiFile::load(path) {
                Ok(file) => {
                    let sites: BTreeMap<_, _> = file
                        .enabled_sites()
                        .map(|(name, site)| (name.clone(), site.clone()))
                        .collect();
                    if !sites.is_empty() {
                        let table = Self {
                            sites,
                            show_icons: file.options.add_icon_indicator,
                        };
                        return (table, SiteSource::File);
                    }
                    tracing::info!(path = %path.display(), "InterWiki file defines no enabled sites");
                }
                Err(ConfigError::NotFound(_)) => {
                    tracing::debug!(path = %path.display(), "No InterWiki file");
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to load InterWiki file");
                }
            }
        }

        if !sources.main_config.is_empty() {
            let table = Self {
                sites: sources.main_config.clone(),
                show_icons: true,
            };
            return (table, SiteSource::MainConfig);
        }

        let table = Self {
            sites: default_sites(),
            show_icons: true,
        };
        (table, SiteSource::Defaults)
    }

    /// Exact name first, then case-insensitive.
    fn find(&self, name: &str) -> Option<&InterWikiSiteConfig> {
        self.sites.get(name).or_else(|| {
            self.sites
                .iter()
                .find(|(site, _)| site.eq_ignore_ascii_case(name))
                .map(|(_, config)| config)
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextKey<'a> {
    page_name: &'a str,
    user_name: &'a str,
    time_bucket: u64,
}

/// Converts `[Site:Page]` and `[Site:Page|Text]` into external links.
pub struct InterWikiLinkHandler {
    metadata: HandlerMetadata,
    sources: RwLock<Sources>,
    table: RwLock<SiteTable>,
    cache: Box<dyn CacheBucket>,
}

impl InterWikiLinkHandler {
    pub const ID: &'static str = "InterWikiLinkHandler";
    pub const PRIORITY: i32 = 80;

    /// Handler using the built-in sites until [`SyntaxHandler::initialize`]
    /// loads the configured ones.
    pub fn new(cache: Box<dyn CacheBucket>) -> Self {
        let sources = Sources::default();
        let (table, _) = SiteTable::load(&sources);
        Self {
            metadata: HandlerMetadata::new(Self::ID, INTERWIKI.as_str(), Self::PRIORITY)
                .with_description("Links to external wikis through [Site:Page]")
                .with_dependencies(&["Config"]),
            sources: RwLock::new(sources),
            table: RwLock::new(table),
            cache,
        }
    }

    /// Names and settings of every known site.
    pub fn available_sites(&self) -> BTreeMap<String, InterWikiSiteConfig> {
        self.read_table().sites.clone()
    }

    /// Add or replace a site after checking its template.
    ///
    /// An empty description becomes `"{name} Wiki"`.
    pub fn add_site(
        &self,
        name: &str,
        mut site: InterWikiSiteConfig,
    ) -> Result<(), HandlerError> {
        let invalid = |reason: &str| HandlerError::InvalidSite {
            name: name.to_owned(),
            reason: reason.to_owned(),
        };
        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if site.url.is_empty() {
            return Err(invalid("url is empty"));
        }
        if !site.url.contains("%s") {
            tracing::warn!(site = name, url = %site.url, "InterWiki URL has no %s placeholder");
        }
        let probe = expand_template(&site.url, PROBE_PAGE);
        if !is_url_safe(&probe) {
            return Err(invalid("template generates unsafe URLs"));
        }
        if site.description.is_empty() {
            site.description = format!("{name} Wiki");
        }

        self.table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .sites
            .insert(name.to_owned(), site);
        self.cache.clear();
        tracing::info!(site = name, "Added InterWiki site");
        Ok(())
    }

    /// Remove a site by exact name. Returns whether it existed.
    pub fn remove_site(&self, name: &str) -> bool {
        let removed = self
            .table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .sites
            .remove(name)
            .is_some();
        if removed {
            self.cache.clear();
            tracing::info!(site = name, "Removed InterWiki site");
        }
        removed
    }

    /// Load the site table again from the configured sources.
    pub fn reload(&self) -> SiteSource {
        let (table, source) = {
            let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);
            SiteTable::load(&sources)
        };
        tracing::info!(source = ?source, sites = table.sites.len(), "Loaded InterWiki sites");
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = table;
        self.cache.clear();
        source
    }

    fn read_table(&self) -> RwLockReadGuard<'_, SiteTable> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// `handler:{id}:{content hash}:{context hash}`, so fragments for
    /// different pages or users live side by side.
    fn cache_key(&self, m: &SyntaxMatch, ctx: &ParseContext) -> String {
        let digest = Sha256::digest(m.full_match.as_bytes());
        format!(
            "handler:{}:{}:{}",
            self.id(),
            hex::encode(digest),
            context_hash(ctx)
        )
    }

    fn render_link(&self, m: &SyntaxMatch) -> Result<String, HandlerError> {
        let site_name = m.group(1).unwrap_or_default();
        let page = m.group(2).unwrap_or_default();

        let table = self.read_table();
        let site = table
            .find(site_name)
            .ok_or_else(|| HandlerError::UnknownSite(site_name.to_owned()))?;

        let url = expand_template(&site.url, page);
        if !is_url_safe(&url) {
            return Err(HandlerError::UnsafeUrl(url));
        }

        let display = m
            .group(3)
            .map_or_else(|| format!("{site_name}:{page}"), str::to_owned);

        let mut html = format!(
            r#"<a href="{}" class="interwiki-link interwiki-{}""#,
            escape_html(&url),
            escape_html(&site_name.to_lowercase())
        );
        if site.open_in_new_window {
            html.push_str(r#" target="_blank" rel="noopener noreferrer""#);
        }
        if !site.description.is_empty() {
            let _ = write!(
                html,
                r#" title="{}: {}""#,
                escape_html(&site.description),
                escape_html(&display)
            );
        }
        html.push('>');
        if let Some(icon) = site.icon.as_deref().filter(|_| table.show_icons) {
            let _ = write!(
                html,
                r#"<img src="/icons/{}" alt="{}" class="interwiki-icon"> "#,
                escape_html(icon),
                escape_html(site_name)
            );
        }
        html.push_str(&escape_html(&display));
        html.push_str("</a>");
        Ok(html)
    }
}

impl SyntaxHandler for InterWikiLinkHandler {
    fn metadata(&self) -> &HandlerMetadata {
        &self.metadata
    }

    fn pattern(&self) -> &Regex {
        &INTERWIKI
    }

    fn initialize(&self, ctx: &InitContext<'_>) -> Result<(), HandlerError> {
        let interwiki: InterWikiConfig = ctx.property("interwiki", ctx.config.interwiki.clone());
        *self.sources.write().unwrap_or_else(PoisonError::into_inner) = Sources {
            main_config: interwiki.site_configs(),
            file: interwiki.file,
        };
        self.reload();
        Ok(())
    }

    fn handle_match(
        &self,
        m: &SyntaxMatch,
        ctx: &ParseContext,
    ) -> Result<HandlerOutput, HandlerError> {
        // `[text](url)` and bracketed URLs such as `[http://host/]`
        if m.following == Some('(') || m.group(2).is_some_and(|page| page.starts_with("//")) {
            return Ok(HandlerOutput::Skip);
        }

        let key = self.cache_key(m, ctx);
        if let Some(html) = self.cache.get_string(&key, "") {
            return Ok(HandlerOutput::Replace(html));
        }

        let html = self.render_link(m)?;
        self.cache.set_string(&key, "", &html);
        Ok(HandlerOutput::Replace(html))
    }

    fn on_error(&self, m: &SyntaxMatch, error: &HandlerError) -> Option<String> {
        Some(format!(
            "<!-- InterWiki Error: {} - {} -->",
            m.group(1).unwrap_or_default(),
            error
        ))
    }
}

/// Substitute the encoded page name for every `%s` in `template`.
pub fn expand_template(template: &str, page: &str) -> String {
    template.replace("%s", &encode_component(page))
}

/// Only `http`/`https` URLs to hosts other than loopback, `localhost`, or
/// names containing `..`.
pub fn is_url_safe(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    match parsed.host() {
        Some(Host::Domain(domain)) => !domain.contains("..") && !domain.contains("localhost"),
        Some(Host::Ipv4(ip)) => !ip.is_loopback(),
        Some(Host::Ipv6(ip)) => !ip.is_loopback(),
        None => false,
    }
}

/// Context hash that only changes per page, user and hour.
fn context_hash(ctx: &ParseContext) -> String {
    let hour = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs() / 3600);
    let key = ContextKey {
        page_name: &ctx.page_name,
        user_name: &ctx.user_name,
        time_bucket: hour,
    };
    let json = serde_json::to_string(&key).unwrap_or_default();
    hex::encode(Sha256::digest(json.as_bytes()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use wk_cache::{Cache, MemoryCache, NullCacheBucket};
    use wk_config::Config;
    use wk_storage::MockPageStore;

    use super::*;

    fn handler() -> InterWikiLinkHandler {
        InterWikiLinkHandler::new(Box::new(NullCacheBucket))
    }

    fn render(handler: &InterWikiLinkHandler, input: &str) -> String {
        handler.process(input, &ParseContext::new("Home")).unwrap()
    }

    #[test]
    fn test_default_site_link() {
        let out = render(&handler(), "See [Wikipedia:Rust (language)].");

        assert_eq!(
            out,
            "See <a href=\"https://en.wikipedia.org/wiki/Rust%20(language)\" \
             class=\"interwiki-link interwiki-wikipedia\" target=\"_blank\" rel=\"noopener noreferrer\" \
             title=\"Wikipedia, the free encyclopedia: Wikipedia:Rust (language)\">Wikipedia:Rust (language)</a>."
        );
    }

    #[test]
    fn test_case_insensitive_site_and_display_text() {
        let out = render(&handler(), "[wikipedia:Ferris|the crab]");

        assert!(out.contains("href=\"https://en.wikipedia.org/wiki/Ferris\""), "{out}");
        assert!(out.contains("class=\"interwiki-link interwiki-wikipedia\""), "{out}");
        assert!(out.ends_with(">the crab</a>"), "{out}");
    }

    #[test]
    fn test_unknown_site_becomes_comment() {
        let out = render(&handler(), "x [Evil:../../etc/passwd] y");

        assert_eq!(
            out,
            "x <!-- InterWiki Error: Evil - Unknown InterWiki site: Evil --> y"
        );
    }

    #[test]
    fn test_markdown_links_and_urls_are_skipped() {
        let input = "[Wikipedia:Rust](https://example.com) and [http://example.com]";

        assert_eq!(render(&handler(), input), input);
    }

    #[test]
    fn test_url_safety() {
        assert!(is_url_safe("https://en.wikipedia.org/wiki/X"));
        assert!(!is_url_safe("ftp://example.com/X"));
        assert!(!is_url_safe("javascript:alert(1)"));
        assert!(!is_url_safe("http://localhost:8080/X"));
        assert!(!is_url_safe("http://127.0.0.1/X"));
        assert!(!is_url_safe("http://[::1]/X"));
        assert!(!is_url_safe("not a url"));
    }

    #[test]
    fn test_add_and_remove_site() {
        let handler = handler();

        let err = handler
            .add_site("Local", InterWikiSiteConfig::new("http://localhost/%s", ""))
            .unwrap_err();
        assert!(matches!(err, HandlerError::InvalidSite { .. }));
        assert!(handler.add_site("", InterWikiSiteConfig::new("https://a.b/%s", "")).is_err());

        handler
            .add_site("Docs", InterWikiSiteConfig::new("https://docs.example.org/%s", ""))
            .unwrap();
        assert_eq!(handler.available_sites()["Docs"].description, "Docs Wiki");
        assert!(render(&handler, "[Docs:Intro]").contains("https://docs.example.org/Intro"));

        assert!(handler.remove_site("Docs"));
        assert!(!handler.remove_site("Docs"));
        assert!(render(&handler, "[Docs:Intro]").starts_with("<!-- InterWiki Error: Docs"));
    }

    #[test]
    fn test_icons_and_same_window() {
        let handler = handler();
        let mut site = InterWikiSiteConfig::new("https://meta.example.org/%s", "Meta");
        site.icon = Some("meta.png".to_owned());
        site.open_in_new_window = false;
        handler.add_site("Meta", site).unwrap();

        assert_eq!(
            render(&handler, "[Meta:Page]"),
            "<a href=\"https://meta.example.org/Page\" class=\"interwiki-link interwiki-meta\" \
             title=\"Meta: Meta:Page\"><img src=\"/icons/meta.png\" alt=\"Meta\" class=\"interwiki-icon\"> Meta:Page</a>"
        );
    }

    #[test]
    fn test_initialize_source_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = MockPageStore::new();
        let mut config = Config::default();
        config.interwiki.file = Some(dir.path().join("interwiki.toml"));
        config
            .interwiki
            .sites
            .insert("Corp".to_owned(), "https://corp.example.com/wiki/%s".to_owned());

        let handler = handler();
        handler
            .initialize(&InitContext { store: &store, config: &config })
            .unwrap();
        assert_eq!(handler.available_sites().keys().collect::<Vec<_>>(), vec!["Corp"]);

        std::fs::write(
            dir.path().join("interwiki.toml"),
            "[sites.Team]\nurl = \"https://team.example.com/%s\"\ndescription = \"Team\"\n\n\
             [sites.Old]\nurl = \"https://old.example.com/%s\"\nenabled = false\n",
        )
        .unwrap();
        assert_eq!(handler.reload(), SiteSource::File);
        assert_eq!(handler.available_sites().keys().collect::<Vec<_>>(), vec!["Team"]);

        config.interwiki.sites.clear();
        config.interwiki.file = None;
        handler
            .initialize(&InitContext { store: &store, config: &config })
            .unwrap();
        assert!(handler.available_sites().contains_key("Wikipedia"));
    }

    #[test]
    fn test_initialize_reads_main_config_by_key() {
        let mut config = Config::from_toml(
            "[interwiki]\nopen_in_new_window = false\n\n\
             [interwiki.sites]\nCorp = \"https://corp.example.com/%s\"\n",
        )
        .unwrap();
        config.interwiki.file = None;
        let store = MockPageStore::new();
        let ctx = InitContext { store: &store, config: &config };
        assert_eq!(
            ctx.property("interwiki.sites.Corp", String::new()),
            "https://corp.example.com/%s"
        );

        let handler = handler();
        handler.initialize(&ctx).unwrap();
        let out = render(&handler, "[Corp:Home]");

        assert!(out.contains("href=\"https://corp.example.com/Home\""), "{out}");
        assert!(!out.contains("target="), "{out}");
    }

    #[test]
    fn test_results_are_cached_per_match() {
        let cache = MemoryCache::new(Duration::from_secs(60), 100);
        let handler = InterWikiLinkHandler::new(cache.bucket("handlers"));

        let first = render(&handler, "[Wikipedia:Cache]");
        let second = render(&handler, "[Wikipedia:Cache]");

        assert_eq!(first, second);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_cache_keeps_one_entry_per_context() {
        let cache = MemoryCache::new(Duration::from_secs(60), 100);
        let handler = InterWikiLinkHandler::new(cache.bucket("handlers"));

        let outputs: Vec<String> = ["A", "B", "A", "B"]
            .into_iter()
            .map(|page| {
                handler
                    .process("[Wikipedia:Rust]", &ParseContext::new(page))
                    .unwrap()
            })
            .collect();

        assert!(outputs.iter().all(|html| html == &outputs[0]));
        let stats = cache.stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits, 2);
    }
}
