//! Placeholder protection for regions later phases must not touch.
//!
//! Code (fenced, JSPWiki `'''` blocks, inline) and escaped `[[...]` text is
//! swapped for `PROTECTED{n}PROTECTED` tokens before macro, table and link
//! expansion run, and swapped back once they are done.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static FENCED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("invalid protection regex"));
static JSPWIKI_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)'''.*?'''").expect("invalid protection regex"));
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`[^`]*`").expect("invalid protection regex"));
static ESCAPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]]+)\]").expect("invalid protection regex"));
static JSPWIKI_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^'''[ \t]*\n?").expect("invalid protection regex"));
static JSPWIKI_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n?[ \t]*'''$").expect("invalid protection regex"));

/// Which regions to protect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionScope {
    /// Code regions only.
    Code,
    /// Code regions and `[[...]` escapes.
    CodeAndEscapes,
}

/// Regions taken out of the content, in token order.
#[derive(Debug, Default)]
pub struct ProtectedRegions {
    regions: Vec<String>,
}

fn token(index: usize) -> String {
    format!("PROTECTED{index}PROTECTED")
}

impl ProtectedRegions {
    /// Replace protected regions of `content` with tokens.
    pub fn protect(content: &str, scope: ProtectionScope) -> (String, Self) {
        let mut regions = Self::default();

        let text = regions.swap_out(&FENCED, content, |caps| caps[0].to_owned());
        let text = regions.swap_out(&JSPWIKI_CODE, &text, |caps| {
            let opened = JSPWIKI_OPEN.replace(&caps[0], "```\n");
            JSPWIKI_CLOSE.replace(&opened, "\n```").into_owned()
        });
        let mut text = regions.swap_out(&INLINE_CODE, &text, |caps| caps[0].to_owned());
        if scope == ProtectionScope::CodeAndEscapes {
            text = regions.swap_out(&ESCAPED, &text, |caps| {
                format!("&#91;{}&#93;", &caps[1])
            });
        }

        (text, regions)
    }

    fn swap_out<F>(&mut self, pattern: &Regex, content: &str, original: F) -> String
    where
        F: Fn(&Captures<'_>) -> String,
    {
        pattern
            .replace_all(content, |caps: &Captures<'_>| {
                self.regions.push(original(caps));
                token(self.regions.len() - 1)
            })
            .into_owned()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Put every region back, each exactly once.
    ///
    /// Later tokens are restored first, since a later region may enclose an
    /// earlier token. Tokens that went missing are logged and dropped.
    pub fn restore(self, content: &str) -> String {
        let mut output = content.to_owned();
        for (index, region) in self.regions.iter().enumerate().rev() {
            let token = token(index);
            if let Some(position) = output.find(&token) {
                output.replace_range(position..position + token.len(), region);
            } else {
                tracing::warn!(token, "Protected region placeholder missing from output");
            }
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_protects_and_restores_code() {
        let input = "a `[{$pagename}]` b\n\n```\n[Link]\n```\n";
        let (text, regions) = ProtectedRegions::protect(input, ProtectionScope::Code);

        assert_eq!(text, "a PROTECTED1PROTECTED b\n\nPROTECTED0PROTECTED\n");
        assert_eq!(regions.len(), 2);
        assert_eq!(regions.restore(&text), input);
    }

    #[test]
    fn test_jspwiki_code_becomes_fence() {
        let (text, regions) =
            ProtectedRegions::protect("'''\nlet x = 1;\n'''", ProtectionScope::Code);

        assert_eq!(text, "PROTECTED0PROTECTED");
        assert_eq!(regions.restore(&text), "```\nlet x = 1;\n```");
    }

    #[test]
    fn test_escapes_only_in_full_scope() {
        let input = "[[{UptimePlugin}] and [[Page]";

        let (code_only, _) = ProtectedRegions::protect(input, ProtectionScope::Code);
        assert_eq!(code_only, input);

        let (text, regions) = ProtectedRegions::protect(input, ProtectionScope::CodeAndEscapes);
        assert_eq!(text, "PROTECTED0PROTECTED and PROTECTED1PROTECTED");
        assert_eq!(
            regions.restore(&text),
            "&#91;{UptimePlugin}&#93; and &#91;Page&#93;"
        );
    }

    #[test]
    fn test_nested_token_restored() {
        let input = "```\nfence\n``` `a` ` spans ```x``` `";
        let (text, regions) = ProtectedRegions::protect(input, ProtectionScope::Code);
        assert_eq!(regions.restore(&text), input);
    }

    #[test]
    fn test_missing_token_is_dropped_not_duplicated() {
        let (_, regions) = ProtectedRegions::protect("`a` `b`", ProtectionScope::Code);
        assert_eq!(regions.restore("PROTECTED1PROTECTED only"), "`b` only");
    }
}
