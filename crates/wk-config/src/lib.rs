//! Configuration management for wk.
//!
//! Parses `wiki.toml` with serde and discovers it in the current directory
//! or any parent. Every section is optional; missing keys fall back to the
//! defaults below.
//!
//! ```toml
//! [rendering]
//! use_advanced_parser = true
//! fallback_to_legacy = true
//!
//! [links]
//! match_english_plurals = true
//!
//! [interwiki.sites]
//! Wikipedia = "https://en.wikipedia.org/wiki/%s"
//! ```
//!
//! ## Environment Variable Expansion
//!
//! `site.base_url`, `site.pages_dir` and `interwiki.file` accept `${VAR}`
//! and `${VAR:-default}` references.

mod expand;
mod interwiki;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use interwiki::{InterWikiFile, InterWikiOptions, InterWikiSiteConfig, default_sites};

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "wiki.toml";

/// Command-line overrides applied after the file is loaded.
#[derive(Debug, Default)]
pub struct CliSettings {
    pub pages_dir: Option<PathBuf>,
    pub use_advanced_parser: Option<bool>,
    pub match_english_plurals: Option<bool>,
}

/// Application configuration.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rendering: RenderingConfig,
    pub links: LinksConfig,
    pub handlers: HandlersConfig,
    pub site: SiteConfig,
    pub interwiki: InterWikiConfig,

    /// Path of the loaded file, if any.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Parsing strategy selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderingConfig {
    /// Render through the handler chain when it is initialized.
    pub use_advanced_parser: bool,
    /// Retry with the legacy pipeline when the handler chain fails.
    pub fallback_to_legacy: bool,
    /// Time both strategies and alert when they diverge.
    pub performance_comparison: bool,
    /// Milliseconds of divergence that trigger a comparison alert.
    pub comparison_threshold_ms: u64,
    /// Log which strategy served each render.
    pub log_parsing_method: bool,
}

impl Default for RenderingConfig {
    fn default() -> Self {
        Self {
            use_advanced_parser: true,
            fallback_to_legacy: true,
            performance_comparison: false,
            comparison_threshold_ms: 50,
            log_parsing_method: true,
        }
    }
}

/// Internal link resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinksConfig {
    /// Resolve `[Widgets]` to `Widget` and vice versa.
    pub match_english_plurals: bool,
    /// Route prefix for existing pages.
    pub view_route: String,
    /// Route prefix for red links.
    pub create_route: String,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            match_english_plurals: true,
            view_route: "/wiki/".to_owned(),
            create_route: "/edit/".to_owned(),
        }
    }
}

/// Handler chain tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlersConfig {
    /// Soft per-handler ceiling; exceeding it raises a performance alert.
    pub default_timeout_ms: u64,
    pub cache_enabled: bool,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
    /// Handler ids to leave out of the chain.
    pub disabled: Vec<String>,
}

impl Default for HandlersConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 5000,
            cache_enabled: true,
            cache_ttl_secs: 600,
            cache_max_entries: 2000,
            disabled: Vec::new(),
        }
    }
}

/// Values surfaced through system variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub application_name: String,
    pub base_url: String,
    /// Page directory, relative to the config file.
    pub pages_dir: PathBuf,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            application_name: "wk".to_owned(),
            base_url: "http://localhost:3000".to_owned(),
            pages_dir: PathBuf::from("pages"),
        }
    }
}

/// InterWiki settings from the main config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterWikiConfig {
    /// Dedicated site table, relative to the config file.
    pub file: Option<PathBuf>,
    pub open_in_new_window: bool,
    /// Site name to URL template.
    pub sites: BTreeMap<String, String>,
}

impl Default for InterWikiConfig {
    fn default() -> Self {
        Self {
            file: Some(PathBuf::from("interwiki.toml")),
            open_in_new_window: true,
            sites: BTreeMap::new(),
        }
    }
}

impl InterWikiConfig {
    /// Main-config sites in the shape of the dedicated file's entries.
    pub fn site_configs(&self) -> BTreeMap<String, InterWikiSiteConfig> {
        self.sites
            .iter()
            .filter(|(_, url)| !url.is_empty())
            .map(|(name, url)| {
                let site = InterWikiSiteConfig {
                    url: url.clone(),
                    description: format!("{name} Wiki"),
                    enabled: true,
                    open_in_new_window: self.open_in_new_window,
                    icon: None,
                };
                (name.clone(), site)
            })
            .collect()
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
    #[error("Environment variable error in {field}: {message}")]
    EnvVar { field: String, message: String },
}

fn require_route(value: &str, field: &str) -> Result<(), ConfigError> {
    if !value.starts_with('/') || !value.ends_with('/') {
        return Err(ConfigError::Validation(format!(
            "{field} must start and end with '/'"
        )));
    }
    Ok(())
}

fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit `config_path` must exist. Without one, `wiki.toml` is
    /// searched for upwards from the current directory, and defaults are used
    /// when nothing is found. CLI settings win over file values.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            tracing::debug!("No {CONFIG_FILENAME} found, using defaults");
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    /// Parse configuration text without touching the filesystem.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.expand_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(pages_dir) = &settings.pages_dir {
            self.site.pages_dir.clone_from(pages_dir);
        }
        if let Some(advanced) = settings.use_advanced_parser {
            self.rendering.use_advanced_parser = advanced;
        }
        if let Some(plurals) = settings.match_english_plurals {
            self.links.match_english_plurals = plurals;
        }
    }

    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        if self.site.pages_dir.is_relative() {
            self.site.pages_dir = base.join(&self.site.pages_dir);
        }
        if let Some(file) = &self.interwiki.file
            && file.is_relative()
        {
            self.interwiki.file = Some(base.join(file));
        }
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.site.base_url = expand::expand_env(&self.site.base_url, "site.base_url")?;

        let pages_dir = self.site.pages_dir.to_string_lossy();
        self.site.pages_dir = PathBuf::from(expand::expand_env(&pages_dir, "site.pages_dir")?);

        if let Some(file) = &self.interwiki.file {
            let expanded = expand::expand_env(&file.to_string_lossy(), "interwiki.file")?;
            self.interwiki.file = Some(PathBuf::from(expanded));
        }
        Ok(())
    }

    /// Check value ranges and formats.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_route(&self.links.view_route, "links.view_route")?;
        require_route(&self.links.create_route, "links.create_route")?;
        require_http_url(&self.site.base_url, "site.base_url")?;

        if self.handlers.default_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "handlers.default_timeout_ms must be greater than 0".to_owned(),
            ));
        }
        if self.handlers.cache_enabled && self.handlers.cache_max_entries == 0 {
            return Err(ConfigError::Validation(
                "handlers.cache_max_entries must be greater than 0".to_owned(),
            ));
        }
        for (name, url) in &self.interwiki.sites {
            if !url.is_empty() {
                require_http_url(url, &format!("interwiki.sites.{name}"))?;
            }
        }
        Ok(())
    }

    /// Look up a value by dotted key, e.g. `"rendering.fallback_to_legacy"`.
    ///
    /// Returns `default` when the key is absent or has a different type.
    pub fn property<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let Ok(root) = toml::Value::try_from(self) else {
            return default;
        };
        let mut value = &root;
        for segment in key.split('.') {
            match value.get(segment) {
                Some(next) => value = next,
                None => return default,
            }
        }
        value.clone().try_into().unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert!(config.rendering.use_advanced_parser);
        assert!(config.rendering.fallback_to_legacy);
        assert!(!config.rendering.performance_comparison);
        assert!(config.links.match_english_plurals);
        assert_eq!(config.links.view_route, "/wiki/");
        assert_eq!(config.links.create_route, "/edit/");
        assert_eq!(config.handlers.cache_ttl_secs, 600);
        assert_eq!(config.handlers.cache_max_entries, 2000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml(
            r#"
            [rendering]
            use_advanced_parser = false

            [interwiki.sites]
            C2 = "https://wiki.c2.com/?%s"
            "#,
        )
        .unwrap();

        assert!(!config.rendering.use_advanced_parser);
        assert!(config.rendering.fallback_to_legacy);

        let sites = config.interwiki.site_configs();
        assert_eq!(sites["C2"].description, "C2 Wiki");
        assert!(sites["C2"].open_in_new_window);
    }

    #[test]
    fn test_rejects_bad_route() {
        let err = Config::from_toml("[links]\nview_route = \"wiki\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_rejects_non_http_site() {
        let err = Config::from_toml("[interwiki.sites]\nEvil = \"file:///%s\"\n").unwrap_err();
        assert!(err.to_string().contains("interwiki.sites.Evil"));
    }

    #[test]
    fn test_property_lookup() {
        let config = Config::from_toml("[site]\napplication_name = \"Team Wiki\"\n").unwrap();

        assert_eq!(
            config.property("site.application_name", String::new()),
            "Team Wiki"
        );
        assert!(config.property("rendering.fallback_to_legacy", false));
        assert_eq!(config.property("handlers.default_timeout_ms", 0_u64), 5000);
        assert_eq!(config.property("missing.key", 7_u32), 7);
        assert_eq!(config.property("site.base_url", 3_u32), 3);
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[site]\npages_dir = \"content\"\n").unwrap();

        let config = Config::load(Some(&path), None).unwrap();

        assert_eq!(config.site.pages_dir, dir.path().join("content"));
        assert_eq!(
            config.interwiki.file,
            Some(dir.path().join("interwiki.toml"))
        );
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_cli_settings_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "").unwrap();
        let settings = CliSettings {
            pages_dir: Some(PathBuf::from("/srv/pages")),
            use_advanced_parser: Some(false),
            match_english_plurals: Some(false),
        };

        let config = Config::load(Some(&path), Some(&settings)).unwrap();

        assert_eq!(config.site.pages_dir, PathBuf::from("/srv/pages"));
        assert!(!config.rendering.use_advanced_parser);
        assert!(!config.links.match_english_plurals);
    }

    #[test]
    fn test_explicit_missing_file() {
        let err = Config::load(Some(Path::new("/nonexistent/wiki.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
