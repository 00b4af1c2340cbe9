//! `[Text]`, `[Text|Target]` and `[Text|Target|params]` internal links.

use std::collections::HashSet;
use std::sync::{LazyLock, PoisonError, RwLock};

use regex::Regex;
use wk_storage::PageStore;

use crate::context::ParseContext;
use crate::error::HandlerError;
use crate::handler::{HandlerMetadata, HandlerOutput, InitContext, SyntaxHandler, SyntaxMatch};
use crate::link::{Anchor, LinkParams, LinkRoutes, LinkTarget, RED_LINK_CLASS, WIKIPAGE_CLASS};

/// Group 1 is the text, 2 the optional target, 3 the optional parameters.
pub const WIKI_LINK_PATTERN: &str =
    r"\[([a-zA-Z0-9_\- ]+)(?:\|([a-zA-Z0-9_\-/ .:?=&]+))?(?:\|([^|\]]+))?\]";

static WIKI_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(WIKI_LINK_PATTERN).expect("invalid wiki link regex"));

/// Resolves internal links against its own copy of the page names.
///
/// Lookup is case-sensitive. While the name list is unknown or empty every
/// target is assumed to exist, so no red links are produced.
pub struct WikiLinkHandler {
    metadata: HandlerMetadata,
    routes: LinkRoutes,
    page_names: RwLock<Option<HashSet<String>>>,
}

impl WikiLinkHandler {
    pub const ID: &'static str = "WikiLinkHandler";
    pub const PRIORITY: i32 = 50;

    pub fn new(routes: LinkRoutes) -> Self {
        Self {
            metadata: HandlerMetadata::new(Self::ID, WIKI_LINK_PATTERN, Self::PRIORITY)
                .with_description("Resolves internal wiki links and red links")
                .with_dependencies(&["PageStore"]),
            routes,
            page_names: RwLock::new(None),
        }
    }

    /// Number of cached names, `None` when unknown.
    pub fn known_pages(&self) -> Option<usize> {
        self.page_names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(HashSet::len)
    }

    fn load_page_names(&self, store: &dyn PageStore) {
        let names = match store.list_page_names() {
            Ok(names) => {
                tracing::debug!(count = names.len(), "Loaded page names for link resolution");
                Some(names.into_iter().collect())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Page names unavailable, treating all links as existing");
                None
            }
        };
        *self.page_names.write().unwrap_or_else(PoisonError::into_inner) = names;
    }

    fn page_exists(&self, name: &str) -> bool {
        match &*self.page_names.read().unwrap_or_else(PoisonError::into_inner) {
            Some(names) if !names.is_empty() => names.contains(name),
            _ => true,
        }
    }
}

impl SyntaxHandler for WikiLinkHandler {
    fn metadata(&self) -> &HandlerMetadata {
        &self.metadata
    }

    fn pattern(&self) -> &Regex {
        &WIKI_LINK
    }

    fn initialize(&self, ctx: &InitContext<'_>) -> Result<(), HandlerError> {
        self.load_page_names(ctx.store);
        Ok(())
    }

    fn handle_match(
        &self,
        m: &SyntaxMatch,
        _ctx: &ParseContext,
    ) -> Result<HandlerOutput, HandlerError> {
        let text = m.group(1).unwrap_or_default();
        if m.following == Some('(') || text.trim().is_empty() {
            return Ok(HandlerOutput::Skip);
        }
        let params = LinkParams::parse(m.group(3));

        let target = match m.group(2).map(LinkTarget::classify) {
            Some(LinkTarget::Page(target)) => target,
            Some(fixed) => {
                return Ok(match fixed.fixed_anchor(text, &params) {
                    Some(anchor) => HandlerOutput::Replace(anchor.to_html()),
                    None => HandlerOutput::Skip,
                });
            }
            None => text,
        };

        let anchor = if self.page_exists(target) {
            Anchor::new(self.routes.view(target), text).class(WIKIPAGE_CLASS)
        } else {
            Anchor::new(self.routes.create(target), text)
                .class(RED_LINK_CLASS)
                .title(format!("Create page: {target}"))
        };
        Ok(HandlerOutput::Replace(anchor.with_params(&params).to_html()))
    }

    fn refresh_page_names(&self, store: &dyn PageStore) {
        self.load_page_names(store);
    }

    fn add_page_name(&self, name: &str) {
        if let Some(names) = self
            .page_names
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            names.insert(name.to_owned());
        }
    }

    fn remove_page_name(&self, name: &str) {
        if let Some(names) = self
            .page_names
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            names.remove(name);
        }
    }
}
