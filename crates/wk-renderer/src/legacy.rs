//! The legacy rendering strategy: a fixed sequence of text passes.
//!
//! 1. protect code and `[[...]` escapes
//! 2. expand macros
//! 3. convert JSPWiki tables
//! 4. rewrite wiki links with plural-aware page lookup
//! 5. restore protected regions
//! 6. convert markdown to HTML
//! 7. resolve table markers into styled tables

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::context::ParseContext;
use crate::handler::{collect_matches, replace_matches};
use crate::handlers::WIKI_LINK_PATTERN;
use crate::link::{Anchor, LinkParams, LinkRoutes, LinkTarget, RED_LINK_CLASS, WIKIPAGE_CLASS};
use crate::macros::MacroExpander;
use crate::markdown;
use crate::names::{PageNameIndex, PageNames};
use crate::protect::{ProtectedRegions, ProtectionScope};
use crate::tables;

static WIKI_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(WIKI_LINK_PATTERN).expect("invalid wiki link regex"));

/// Renders without the handler chain.
pub struct LegacyPipeline {
    expander: Arc<MacroExpander>,
    page_names: Arc<PageNames>,
    routes: LinkRoutes,
}

impl LegacyPipeline {
    pub fn new(expander: Arc<MacroExpander>, page_names: Arc<PageNames>, routes: LinkRoutes) -> Self {
        Self {
            expander,
            page_names,
            routes,
        }
    }

    pub fn render(&self, content: &str, ctx: &ParseContext) -> String {
        let (text, regions) = ProtectedRegions::protect(content, ProtectionScope::CodeAndEscapes);
        let text = self.expander.expand_all(&text, ctx);
        let text = tables::convert_tables(&text);
        let text = self.rewrite_links(&text);
        let html = markdown::to_html(&regions.restore(&text));
        tables::post_process_tables(&html)
    }

    /// Replace wiki links with anchors, resolving pages through the shared
    /// name index. With no known pages every target counts as existing.
    pub fn rewrite_links(&self, content: &str) -> String {
        let index = self.page_names.snapshot();
        let matches = collect_matches(&WIKI_LINK, content);
        replace_matches(content, &matches, |m| {
            let text = m.group(1)?;
            if m.following == Some('(') || text.trim().is_empty() {
                return None;
            }
            let params = LinkParams::parse(m.group(3));
            let target = match m.group(2).map(LinkTarget::classify) {
                Some(LinkTarget::Page(target)) => target,
                Some(fixed) => return fixed.fixed_anchor(text, &params).map(|a| a.to_html()),
                None => text,
            };
            Some(self.page_anchor(&index, target, text).with_params(&params).to_html())
        })
    }

    fn page_anchor(&self, index: &PageNameIndex, target: &str, text: &str) -> Anchor {
        let found = if index.is_empty() {
            Some(target)
        } else {
            index.find(target)
        };
        match found {
            Some(page) => Anchor::new(self.routes.view(page), text).class(WIKIPAGE_CLASS),
            None => Anchor::new(self.routes.create(target), text)
                .class(RED_LINK_CLASS)
                .title(format!("Create page: {target}")),
        }
    }
}
