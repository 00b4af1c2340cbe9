//! The syntax handler contract.
//!
//! A handler owns one regex and rewrites every match of it in the content it
//! is given. The default [`SyntaxHandler::process`] collects all matches of a
//! pass up front and then replaces them from the last offset to the first, so
//! a replacement never shifts the offsets of matches not yet applied.

use std::sync::Arc;

use regex::Regex;
use serde::de::DeserializeOwned;
use wk_config::Config;
use wk_storage::PageStore;

use crate::context::ParseContext;
use crate::error::HandlerError;

/// Descriptive data of a handler.
///
/// Handlers run in descending `priority`; equal priorities keep registration
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerMetadata {
    pub id: String,
    /// Regex source the handler matches with.
    pub pattern: String,
    pub priority: i32,
    pub description: String,
    pub version: String,
    /// Collaborators that must be present in the [`InitContext`].
    pub dependencies: Vec<String>,
    /// Soft ceiling for one `process` call. `None` uses the chain default.
    pub timeout_ms: Option<u64>,
}

impl HandlerMetadata {
    #[must_use]
    pub fn new(id: impl Into<String>, pattern: impl Into<String>, priority: i32) -> Self {
        Self {
            id: id.into(),
            pattern: pattern.into(),
            priority,
            description: String::new(),
            version: "1.0.0".to_owned(),
            dependencies: Vec::new(),
            timeout_ms: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_dependencies(mut self, dependencies: &[&str]) -> Self {
        self.dependencies = dependencies.iter().map(|&d| d.to_owned()).collect();
        self
    }

    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// One regex hit, captured before any replacement of the pass happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxMatch {
    pub full_match: String,
    /// Capture groups 1..n; `None` for groups that did not participate.
    pub groups: Vec<Option<String>>,
    /// Byte offset of the match in the scanned content.
    pub start: usize,
    /// Byte length of the match.
    pub len: usize,
    /// Character directly after the match, if any.
    pub following: Option<char>,
}

impl SyntaxMatch {
    /// Capture group `index` (1-based, like regex group numbers).
    pub fn group(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.groups.get(i))
            .and_then(Option::as_deref)
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Result of handling one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutput {
    /// Replace the match with this text.
    Replace(String),
    /// Leave the match untouched.
    Skip,
}

/// Collaborators available while handlers initialize.
pub struct InitContext<'a> {
    pub store: &'a dyn PageStore,
    pub config: &'a Config,
}

impl InitContext<'_> {
    /// Collaborator names handlers may list as dependencies.
    pub const PROVIDED: &'static [&'static str] = &["PageStore", "Config"];

    pub fn provides(&self, dependency: &str) -> bool {
        Self::PROVIDED.contains(&dependency)
    }

    /// Configuration value by dotted key, `default` when absent or mistyped.
    pub fn property<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.config.property(key, default)
    }
}

/// Scan `content` once and snapshot every match with its absolute offset.
pub fn collect_matches(pattern: &Regex, content: &str) -> Vec<SyntaxMatch> {
    pattern
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let groups = (1..caps.len())
                .map(|i| caps.get(i).map(|g| g.as_str().to_owned()))
                .collect();
            Some(SyntaxMatch {
                full_match: whole.as_str().to_owned(),
                groups,
                start: whole.start(),
                len: whole.len(),
                following: content[whole.end()..].chars().next(),
            })
        })
        .collect()
}

/// Apply replacements for `matches` from the highest offset to the lowest.
///
/// `replace` returns `None` to keep a match as it is. `matches` must come
/// from a single scan of `content`.
pub fn replace_matches<F>(content: &str, matches: &[SyntaxMatch], mut replace: F) -> String
where
    F: FnMut(&SyntaxMatch) -> Option<String>,
{
    let mut output = content.to_owned();
    for m in matches.iter().rev() {
        if let Some(replacement) = replace(m) {
            output.replace_range(m.start..m.end(), &replacement);
        }
    }
    output
}

/// One pluggable unit of markup transformation.
///
/// Implementations are shared across threads and reused for every render,
/// so per-request state must not live in the handler. Instance-level caches
/// (known page names, site tables) use interior mutability.
pub trait SyntaxHandler: Send + Sync {
    fn metadata(&self) -> &HandlerMetadata;

    /// Compiled form of `metadata().pattern`.
    fn pattern(&self) -> &Regex;

    /// Produce the replacement for one match.
    fn handle_match(
        &self,
        m: &SyntaxMatch,
        ctx: &ParseContext,
    ) -> Result<HandlerOutput, HandlerError>;

    fn id(&self) -> &str {
        &self.metadata().id
    }

    fn priority(&self) -> i32 {
        self.metadata().priority
    }

    /// One-time setup, e.g. loading page names or site tables.
    fn initialize(&self, _ctx: &InitContext<'_>) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Text substituted for a match whose handling failed; `None` keeps the
    /// original text.
    fn on_error(&self, _m: &SyntaxMatch, _error: &HandlerError) -> Option<String> {
        None
    }

    /// Transform `content`. A failing match never aborts the pass.
    fn process(&self, content: &str, ctx: &ParseContext) -> Result<String, HandlerError> {
        if content.is_empty() {
            return Ok(String::new());
        }
        let matches = collect_matches(self.pattern(), content);
        if matches.is_empty() {
            return Ok(content.to_owned());
        }
        Ok(replace_matches(content, &matches, |m| {
            match self.handle_match(m, ctx) {
                Ok(HandlerOutput::Replace(replacement)) => Some(replacement),
                Ok(HandlerOutput::Skip) => None,
                Err(e) => {
                    tracing::warn!(
                        handler = self.id(),
                        page = %ctx.page_name,
                        text = %m.full_match,
                        error = %e,
                        "Syntax handler failed on match"
                    );
                    self.on_error(m, &e)
                }
            }
        }))
    }

    /// Reload the set of known page names after a link-graph rebuild.
    fn refresh_page_names(&self, _store: &dyn PageStore) {}

    /// A page was created.
    fn add_page_name(&self, _name: &str) {}

    /// A page was deleted.
    fn remove_page_name(&self, _name: &str) {}
}

impl<T: SyntaxHandler + ?Sized> SyntaxHandler for Arc<T> {
    fn metadata(&self) -> &HandlerMetadata {
        (**self).metadata()
    }

    fn pattern(&self) -> &Regex {
        (**self).pattern()
    }

    fn handle_match(
        &self,
        m: &SyntaxMatch,
        ctx: &ParseContext,
    ) -> Result<HandlerOutput, HandlerError> {
        (**self).handle_match(m, ctx)
    }

    fn initialize(&self, ctx: &InitContext<'_>) -> Result<(), HandlerError> {
        (**self).initialize(ctx)
    }

    fn on_error(&self, m: &SyntaxMatch, error: &HandlerError) -> Option<String> {
        (**self).on_error(m, error)
    }

    fn process(&self, content: &str, ctx: &ParseContext) -> Result<String, HandlerError> {
        (**self).process(content, ctx)
    }

    fn refresh_page_names(&self, store: &dyn PageStore) {
        (**self).refresh_page_names(store);
    }

    fn add_page_name(&self, name: &str) {
        (**self).add_page_name(name);
    }

    fn remove_page_name(&self, name: &str) {
        (**self).remove_page_name(name);
    }
}
