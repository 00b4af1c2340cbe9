//! Anchor construction shared by the wiki link handler and the legacy
//! link rewriter.

use std::fmt::Write;
use std::sync::LazyLock;

use regex::Regex;
use wk_config::LinksConfig;

use crate::html::{encode_component, escape_html};

static TARGET_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"target=['"]([^'"]+)['"]"#).expect("invalid link param regex"));
static CLASS_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"class=['"]([^'"]+)['"]"#).expect("invalid link param regex"));
static TITLE_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"title=['"]([^'"]+)['"]"#).expect("invalid link param regex"));

/// Class of links to existing pages.
pub const WIKIPAGE_CLASS: &str = "wikipage";
/// Class of links to pages that do not exist yet.
pub const RED_LINK_CLASS: &str = "red-link";

/// Class of links leaving the wiki.
pub const EXTERNAL_CLASS: &str = "external-link";

/// What the explicit target of `[Text|Target]` points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTarget<'a> {
    /// A URL or an absolute path, used verbatim.
    External(&'a str),
    /// The reserved `search` target.
    Search,
    Page(&'a str),
}

impl<'a> LinkTarget<'a> {
    pub fn classify(target: &'a str) -> Self {
        if target.contains("://") || target.starts_with('/') {
            Self::External(target)
        } else if target.eq_ignore_ascii_case("search") {
            Self::Search
        } else {
            Self::Page(target)
        }
    }

    /// Anchor for targets that need no page lookup.
    pub fn fixed_anchor(self, text: &str, params: &LinkParams) -> Option<Anchor> {
        match self {
            Self::External(url) => {
                let anchor = Anchor::new(url, text);
                let anchor = if params.class.is_none() {
                    anchor.class(EXTERNAL_CLASS)
                } else {
                    anchor
                };
                Some(anchor.with_params(params))
            }
            Self::Search => Some(Anchor::new("/search", text).class("nav-link").with_params(params)),
            Self::Page(_) => None,
        }
    }
}

/// Route prefixes for page links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRoutes {
    pub view: String,
    pub create: String,
}

impl Default for LinkRoutes {
    fn default() -> Self {
        Self::from_config(&LinksConfig::default())
    }
}

impl LinkRoutes {
    pub fn from_config(config: &LinksConfig) -> Self {
        Self {
            view: config.view_route.clone(),
            create: config.create_route.clone(),
        }
    }

    pub fn view(&self, page: &str) -> String {
        format!("{}{}", self.view, encode_component(page))
    }

    pub fn create(&self, page: &str) -> String {
        format!("{}{}", self.create, encode_component(page))
    }
}

/// Attributes from the third segment of `[Text|Target|params]`.
///
/// Values must be quoted: `target='_blank' class="x" title='Hint'`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkParams {
    pub target: Option<String>,
    pub class: Option<String>,
    pub title: Option<String>,
}

impl LinkParams {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };
        let capture = |pattern: &Regex| {
            pattern
                .captures(raw)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_owned())
        };
        Self {
            target: capture(&TARGET_PARAM),
            class: capture(&CLASS_PARAM),
            title: capture(&TITLE_PARAM),
        }
    }
}

/// An `<a>` element; every attribute and the text are escaped on output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Anchor {
    href: String,
    text: String,
    classes: Vec<String>,
    title: Option<String>,
    target: Option<String>,
    rel: Option<String>,
}

impl Anchor {
    pub fn new(href: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Open in a new window with a safe `rel`.
    #[must_use]
    pub fn new_window(mut self) -> Self {
        self.target = Some("_blank".to_owned());
        self.rel = Some("noopener noreferrer".to_owned());
        self
    }

    /// Merge user parameters: classes are appended, a title replaces the
    /// generated one, `target="_blank"` adds `rel`.
    #[must_use]
    pub fn with_params(mut self, params: &LinkParams) -> Self {
        if let Some(target) = &params.target {
            if target == "_blank" {
                self = self.new_window();
            } else {
                self.target = Some(target.clone());
            }
        }
        if let Some(class) = &params.class {
            self.classes.push(class.clone());
        }
        if let Some(title) = &params.title {
            self.title = Some(title.clone());
        }
        self
    }

    pub fn to_html(&self) -> String {
        let mut html = format!(r#"<a href="{}""#, escape_html(&self.href));
        if !self.classes.is_empty() {
            let _ = write!(html, r#" class="{}""#, escape_html(&self.classes.join(" ")));
        }
        for (name, value) in [
            ("title", &self.title),
            ("target", &self.target),
            ("rel", &self.rel),
        ] {
            if let Some(value) = value {
                let _ = write!(html, r#" {name}="{}""#, escape_html(value));
            }
        }
        let _ = write!(html, ">{}</a>", escape_html(&self.text));
        html
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_params() {
        let params = LinkParams::parse(Some(r#"target='_blank' class="big" title='Go there'"#));

        assert_eq!(params.target.as_deref(), Some("_blank"));
        assert_eq!(params.class.as_deref(), Some("big"));
        assert_eq!(params.title.as_deref(), Some("Go there"));
        assert_eq!(LinkParams::parse(Some("target=_blank")), LinkParams::default());
        assert_eq!(LinkParams::parse(None), LinkParams::default());
    }

    #[test]
    fn test_anchor_escapes_everything() {
        let html = Anchor::new("/wiki/a\"b", "<b>&</b>")
            .class(WIKIPAGE_CLASS)
            .with_params(&LinkParams {
                target: Some("_blank".to_owned()),
                class: Some("x\"y".to_owned()),
                title: Some("'t'".to_owned()),
            })
            .to_html();

        assert_eq!(
            html,
            "<a href=\"/wiki/a&quot;b\" class=\"wikipage x&quot;y\" title=\"&#39;t&#39;\" \
             target=\"_blank\" rel=\"noopener noreferrer\">&lt;b&gt;&amp;&lt;/b&gt;</a>"
        );
    }

    #[test]
    fn test_user_title_replaces_generated() {
        let html = Anchor::new("/edit/X", "X")
            .class(RED_LINK_CLASS)
            .title("Create page: X")
            .with_params(&LinkParams {
                title: Some("Soon".to_owned()),
                target: Some("main".to_owned()),
                ..LinkParams::default()
            })
            .to_html();

        assert_eq!(
            html,
            r#"<a href="/edit/X" class="red-link" title="Soon" target="main">X</a>"#
        );
    }

    #[test]
    fn test_classify_targets() {
        let params = LinkParams::default();

        assert_eq!(LinkTarget::classify("https://a.b"), LinkTarget::External("https://a.b"));
        assert_eq!(LinkTarget::classify("/about"), LinkTarget::External("/about"));
        assert_eq!(LinkTarget::classify("Search"), LinkTarget::Search);
        assert_eq!(LinkTarget::classify("Home"), LinkTarget::Page("Home"));
        assert_eq!(
            LinkTarget::classify("https://a.b").fixed_anchor("A", &params).unwrap().to_html(),
            r#"<a href="https://a.b" class="external-link">A</a>"#
        );
        let styled = LinkParams {
            class: Some("btn".to_owned()),
            ..LinkParams::default()
        };
        assert_eq!(
            LinkTarget::classify("/x").fixed_anchor("X", &styled).unwrap().to_html(),
            r#"<a href="/x" class="btn">X</a>"#
        );
        assert_eq!(
            LinkTarget::Search.fixed_anchor("Find", &params).unwrap().to_html(),
            r#"<a href="/search" class="nav-link">Find</a>"#
        );
        assert!(LinkTarget::classify("Home").fixed_anchor("H", &params).is_none());
    }

    #[test]
    fn test_routes_encode_names() {
        let routes = LinkRoutes::default();

        assert_eq!(routes.view("Main Page"), "/wiki/Main%20Page");
        assert_eq!(routes.create("A/B"), "/edit/A%2FB");
    }
}
