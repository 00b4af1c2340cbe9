//! Backlink graph: for every page, the pages linking to it.
//!
//! Two link forms create edges: markdown links `[text](Target)` and wiki
//! links `[Target]` / `[Text|Target|params]`. Wiki targets are resolved
//! through the plural-aware page-name index, so `[Plugins]` counts as a
//! reference to `Plugin`. URLs, absolute paths and `search` never create
//! edges.
//!
//! Every known page has an entry, possibly empty. Targets that are not
//! pages keep an entry only while something links to them, so applying
//! [`LinkGraph::update_page`] yields the same graph as a full rebuild.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{LazyLock, PoisonError, RwLock};

use regex::Regex;
use wk_renderer::{PageNameIndex, ReferrerLookup, collect_matches};

static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("invalid link regex"));
static WIKI_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([a-zA-Z0-9\s_.()-]+)(?:\|([a-zA-Z0-9\s_().:?=&/-]+))?(?:\|([^|\]]+))?\]")
        .expect("invalid link regex")
});

fn is_excluded(target: &str) -> bool {
    target.is_empty()
        || target.contains("://")
        || target.starts_with('/')
        || target.eq_ignore_ascii_case("search")
}

/// Target page names referenced by `content`, deduplicated, sorted.
pub fn scan_links(content: &str, index: &PageNameIndex) -> BTreeSet<String> {
    let mut targets = BTreeSet::new();

    for m in collect_matches(&MARKDOWN_LINK, content) {
        if let Some(target) = m.group(2).map(str::trim).filter(|t| !is_excluded(t)) {
            targets.insert(target.to_owned());
        }
    }

    for m in collect_matches(&WIKI_LINK, content) {
        // The bracket half of a markdown link was counted above.
        if m.following == Some('(') {
            continue;
        }
        let Some(target) = m.group(2).or(m.group(1)).map(str::trim) else {
            continue;
        };
        if is_excluded(target) {
            continue;
        }
        let resolved = index.find(target).unwrap_or(target);
        targets.insert(resolved.to_owned());
    }

    targets
}

/// Page name to sorted referrers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkGraph {
    referrers: BTreeMap<String, BTreeSet<String>>,
    pages: BTreeSet<String>,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(page, content)` pairs.
    pub fn build<'a, I>(pages: I, index: &PageNameIndex) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut graph = Self::new();
        for (page, content) in pages {
            graph.add_page(page, content, index);
        }
        graph
    }

    fn add_page(&mut self, page: &str, content: &str, index: &PageNameIndex) {
        self.pages.insert(page.to_owned());
        self.referrers.entry(page.to_owned()).or_default();
        for target in scan_links(content, index) {
            self.referrers
                .entry(target)
                .or_default()
                .insert(page.to_owned());
        }
    }

    /// Replace the outgoing links of `page` after it was saved.
    pub fn update_page(&mut self, page: &str, content: &str, index: &PageNameIndex) {
        self.drop_referrer(page);
        self.add_page(page, content, index);
    }

    /// Forget a deleted page as a target and as a referrer.
    pub fn remove_page(&mut self, page: &str) {
        self.pages.remove(page);
        self.referrers.remove(page);
        self.drop_referrer(page);
    }

    fn drop_referrer(&mut self, page: &str) {
        for referrers in self.referrers.values_mut() {
            referrers.remove(page);
        }
        let pages = &self.pages;
        self.referrers
            .retain(|target, referrers| !referrers.is_empty() || pages.contains(target));
    }

    /// Pages linking to `page`, sorted.
    pub fn referring_pages(&self, page: &str) -> Vec<String> {
        self.referrers
            .get(page)
            .map(|referrers| referrers.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Known pages that no other page links to.
    pub fn orphaned_pages(&self) -> Vec<String> {
        self.pages
            .iter()
            .filter(|page| {
                self.referrers
                    .get(*page)
                    .is_none_or(|referrers| referrers.iter().all(|r| r == *page))
            })
            .cloned()
            .collect()
    }

    pub fn contains(&self, page: &str) -> bool {
        self.referrers.contains_key(page)
    }

    /// Number of entries, pages and link-only targets together.
    pub fn len(&self) -> usize {
        self.referrers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.referrers.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.referrers.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A [`LinkGraph`] shared between the renderer and its maintainers.
#[derive(Debug, Default)]
pub struct SharedLinkGraph {
    graph: RwLock<LinkGraph>,
}

impl SharedLinkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, graph: LinkGraph) {
        *self.graph.write().unwrap_or_else(PoisonError::into_inner) = graph;
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut LinkGraph) -> R) -> R {
        f(&mut self.graph.write().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn read<R>(&self, f: impl FnOnce(&LinkGraph) -> R) -> R {
        f(&self.graph.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn snapshot(&self) -> LinkGraph {
        self.read(LinkGraph::clone)
    }
}

impl ReferrerLookup for SharedLinkGraph {
    fn referring_pages(&self, page: &str) -> Vec<String> {
        self.read(|graph| graph.referring_pages(page))
    }
}
