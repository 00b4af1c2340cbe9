//! Macro expansion as a chain handler.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::context::ParseContext;
use crate::error::HandlerError;
use crate::handler::{HandlerMetadata, HandlerOutput, SyntaxHandler, SyntaxMatch};
use crate::macros::{MACRO_PATTERN, MacroExpander, error_marker};

static MACRO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(MACRO_PATTERN).expect("invalid macro regex"));

/// Expands `[{$variable}]` and `[{Plugin ...}]` with the same rules as the
/// legacy pipeline. `[{Table ...}]` headers pass through to the table handler.
pub struct MacroHandler {
    metadata: HandlerMetadata,
    expander: Arc<MacroExpander>,
}

impl MacroHandler {
    pub const ID: &'static str = "MacroHandler";
    pub const PRIORITY: i32 = 90;

    pub fn new(expander: Arc<MacroExpander>) -> Self {
        Self {
            metadata: HandlerMetadata::new(Self::ID, MACRO.as_str(), Self::PRIORITY)
                .with_description("Expands system variables and plugin calls")
                .with_dependencies(&["PageStore"]),
            expander,
        }
    }
}

impl SyntaxHandler for MacroHandler {
    fn metadata(&self) -> &HandlerMetadata {
        &self.metadata
    }

    fn pattern(&self) -> &Regex {
        &MACRO
    }

    fn handle_match(
        &self,
        m: &SyntaxMatch,
        ctx: &ParseContext,
    ) -> Result<HandlerOutput, HandlerError> {
        let inner = m.group(1).unwrap_or_default();
        Ok(match self.expander.expand(inner, ctx)? {
            Some(replacement) => HandlerOutput::Replace(replacement),
            None => HandlerOutput::Skip,
        })
    }

    fn on_error(&self, m: &SyntaxMatch, _error: &HandlerError) -> Option<String> {
        Some(error_marker(m.group(1).unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::macros::SystemInfo;
    use crate::names::{PageNameMatcher, PageNames};
    use crate::plugin::PluginRegistry;

    fn handler() -> MacroHandler {
        let system = SystemInfo {
            application_name: "wk".to_owned(),
            version: "0.1.0".to_owned(),
            base_url: "http://localhost:3000".to_owned(),
            started_at: Instant::now(),
        };
        let expander = MacroExpander::new(
            system,
            Arc::new(PageNames::new(PageNameMatcher::default())),
            Arc::new(PluginRegistry::with_builtins()),
        );
        MacroHandler::new(Arc::new(expander))
    }

    #[test]
    fn test_expands_and_marks_errors() {
        let handler = handler();
        let ctx = ParseContext::new("Main");

        let out = handler
            .process("[{$pagename}] / [{NoSuchPlugin x=1}] / [{$applicationname}]", &ctx)
            .unwrap();

        assert_eq!(out, "Main / &#91;Error: NoSuchPlugin x=1&#93; / wk");
    }

    #[test]
    fn test_leaves_table_header() {
        let handler = handler();
        let ctx = ParseContext::new("Main");
        let input = "[{Table style:'width: 100%'}]\n| a |\n";

        assert_eq!(handler.process(input, &ctx).unwrap(), input);
    }
}
