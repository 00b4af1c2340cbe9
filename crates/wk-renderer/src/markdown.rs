//! Base markdown to HTML conversion.

use pulldown_cmark::{Options, Parser, html};

/// GitHub-flavored extensions enabled for wiki pages.
pub fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_GFM
}

/// Convert markdown to HTML. Raw inline HTML passes through unchanged.
pub fn to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, markdown_options());
    let mut output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut output, parser);
    output
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_basic_markdown() {
        assert_eq!(to_html("# Title\n\n**bold**"), "<h1>Title</h1>\n<p><strong>bold</strong></p>\n");
    }

    #[test]
    fn test_gfm_table() {
        let html = to_html("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.starts_with("<table>"), "{html}");
        assert!(html.contains("<td>2</td>"), "{html}");
    }

    #[test]
    fn test_inline_html_and_entities() {
        assert_eq!(
            to_html(r#"See <a href="/wiki/X">X</a> and &#91;y&#93;"#),
            "<p>See <a href=\"/wiki/X\">X</a> and [y]</p>\n"
        );
    }
}
