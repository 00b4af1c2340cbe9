//! Dedicated InterWiki site table (`interwiki.toml`).
//!
//! ```toml
//! [options]
//! add_icon_indicator = true
//!
//! [sites.Wikipedia]
//! url = "https://en.wikipedia.org/wiki/%s"
//! description = "Wikipedia, the free encyclopedia"
//! icon = "wikipedia.png"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One external wiki reachable through `[Site:Page]` links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterWikiSiteConfig {
    /// URL template; every `%s` is replaced by the encoded page name.
    pub url: String,
    pub description: String,
    pub enabled: bool,
    pub open_in_new_window: bool,
    /// Icon file served from `/icons/`.
    pub icon: Option<String>,
}

impl Default for InterWikiSiteConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            description: String::new(),
            enabled: true,
            open_in_new_window: true,
            icon: None,
        }
    }
}

impl InterWikiSiteConfig {
    /// Site with the given template and description, all other fields default.
    #[must_use]
    pub fn new(url: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: description.into(),
            ..Self::default()
        }
    }
}

/// Presentation options shared by all sites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterWikiOptions {
    /// Render the configured icon in front of the link text.
    pub add_icon_indicator: bool,
}

impl Default for InterWikiOptions {
    fn default() -> Self {
        Self {
            add_icon_indicator: true,
        }
    }
}

/// Parsed contents of the dedicated site file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterWikiFile {
    pub options: InterWikiOptions,
    pub sites: BTreeMap<String, InterWikiSiteConfig>,
}

impl InterWikiFile {
    /// Read and parse a site file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let file: Self = toml::from_str(&content)?;
        for (name, site) in &file.sites {
            if site.url.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "interwiki site {name} has an empty url"
                )));
            }
        }
        Ok(file)
    }

    /// Sites that are not switched off.
    pub fn enabled_sites(&self) -> impl Iterator<Item = (&String, &InterWikiSiteConfig)> {
        self.sites.iter().filter(|(_, site)| site.enabled)
    }
}

/// Sites available when no other source provides any.
#[must_use]
pub fn default_sites() -> BTreeMap<String, InterWikiSiteConfig> {
    BTreeMap::from([
        (
            "Wikipedia".to_owned(),
            InterWikiSiteConfig::new(
                "https://en.wikipedia.org/wiki/%s",
                "Wikipedia, the free encyclopedia",
            ),
        ),
        (
            "JSPWiki".to_owned(),
            InterWikiSiteConfig::new(
                "https://jspwiki-wiki.apache.org/Wiki.jsp?page=%s",
                "Apache JSPWiki Documentation",
            ),
        ),
        (
            "MeatBall".to_owned(),
            InterWikiSiteConfig::new("http://www.usemod.com/cgi-bin/mb.pl?%s", "MeatBall Wiki"),
        ),
    ])
}
