//! `[[...]` escapes: the inner text is shown literally.

use std::sync::LazyLock;

use regex::Regex;

use crate::context::ParseContext;
use crate::error::HandlerError;
use crate::handler::{HandlerMetadata, HandlerOutput, SyntaxHandler, SyntaxMatch};

static ESCAPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]]+)\]").expect("invalid escape regex"));

/// Turns `[[{$pagename}]` into `&#91;{$pagename}&#93;`.
///
/// Runs first so no later handler sees the escaped syntax.
pub struct EscapedSyntaxHandler {
    metadata: HandlerMetadata,
}

impl EscapedSyntaxHandler {
    pub const ID: &'static str = "EscapedSyntaxHandler";
    pub const PRIORITY: i32 = 100;

    pub fn new() -> Self {
        Self {
            metadata: HandlerMetadata::new(Self::ID, ESCAPED.as_str(), Self::PRIORITY)
                .with_description("Shows [[...] escaped markup as literal text"),
        }
    }
}

impl Default for EscapedSyntaxHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntaxHandler for EscapedSyntaxHandler {
    fn metadata(&self) -> &HandlerMetadata {
        &self.metadata
    }

    fn pattern(&self) -> &Regex {
        &ESCAPED
    }

    fn handle_match(
        &self,
        m: &SyntaxMatch,
        _ctx: &ParseContext,
    ) -> Result<HandlerOutput, HandlerError> {
        let inner = m
            .group(1)
            .ok_or_else(|| HandlerError::InvalidSyntax(m.full_match.clone()))?;
        Ok(HandlerOutput::Replace(format!("&#91;{inner}&#93;")))
    }
}
