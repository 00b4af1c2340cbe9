//! JSPWiki tables inside the handler chain.

use std::sync::LazyLock;

use regex::Regex;

use crate::context::ParseContext;
use crate::error::HandlerError;
use crate::handler::{HandlerMetadata, HandlerOutput, SyntaxHandler, SyntaxMatch};
use crate::tables;

static TABLE_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)%%table-striped|\[\{Table\s").expect("invalid table regex"));

/// Converts `%%table-striped` blocks and `[{Table}]` tables as a whole pass.
pub struct TableHandler {
    metadata: HandlerMetadata,
}

impl TableHandler {
    pub const ID: &'static str = "TableHandler";
    pub const PRIORITY: i32 = 70;

    pub fn new() -> Self {
        Self {
            metadata: HandlerMetadata::new(Self::ID, TABLE_START.as_str(), Self::PRIORITY)
                .with_description("Converts JSPWiki tables to pipe tables"),
        }
    }
}

impl Default for TableHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntaxHandler for TableHandler {
    fn metadata(&self) -> &HandlerMetadata {
        &self.metadata
    }

    fn pattern(&self) -> &Regex {
        &TABLE_START
    }

    fn handle_match(
        &self,
        _m: &SyntaxMatch,
        _ctx: &ParseContext,
    ) -> Result<HandlerOutput, HandlerError> {
        Ok(HandlerOutput::Skip)
    }

    fn process(&self, content: &str, _ctx: &ParseContext) -> Result<String, HandlerError> {
        if !TABLE_START.is_match(content) {
            return Ok(content.to_owned());
        }
        Ok(tables::convert_tables(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_only_when_present() {
        let handler = TableHandler::new();
        let ctx = ParseContext::new("Home");

        assert_eq!(handler.process("| a | b |", &ctx).unwrap(), "| a | b |");

        let out = handler
            .process("%%TABLE-STRIPED\n|| A\n| 1\n/%\n", &ctx)
            .unwrap();
        assert!(out.starts_with("<!-- TABLE_METADATA:"), "{out}");
        assert!(out.contains("| A|\n|---|\n| 1|"), "{out}");
    }
}
