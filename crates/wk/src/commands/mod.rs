//! CLI command implementations.

mod backlinks;
mod orphans;
mod render;
mod sites;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use wk_config::{CliSettings, Config};
use wk_site::Wiki;
use wk_storage::FsPageStore;

use crate::error::CliError;

pub(crate) use backlinks::BacklinksArgs;
pub(crate) use orphans::orphans;
pub(crate) use render::RenderArgs;
pub(crate) use sites::sites;

/// Options shared by every command.
#[derive(Args)]
pub(crate) struct GlobalArgs {
    /// Path to configuration file (default: auto-discover wiki.toml).
    #[arg(short, long, global = true, env = "WK_CONFIG")]
    config: Option<PathBuf>,

    /// Directory of page files (overrides config).
    #[arg(short, long, global = true)]
    pages: Option<PathBuf>,

    /// Use the legacy pipeline only.
    #[arg(long, global = true)]
    legacy: bool,

    /// Disable plural-aware link matching.
    #[arg(long, global = true)]
    no_plurals: bool,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    fn settings(&self) -> CliSettings {
        CliSettings {
            pages_dir: self.pages.clone(),
            use_advanced_parser: self.legacy.then_some(false),
            match_english_plurals: self.no_plurals.then_some(false),
        }
    }

    /// Load configuration and open the wiki over the pages directory.
    pub(crate) fn open_wiki(&self) -> Result<Wiki, CliError> {
        let config = Config::load(self.config.as_deref(), Some(&self.settings()))?;

        let pages_dir = config.site.pages_dir.clone();
        if !pages_dir.is_dir() {
            return Err(CliError::Validation(format!(
                "Pages directory not found: {}",
                pages_dir.display()
            )));
        }
        tracing::info!(pages_dir = %pages_dir.display(), "Opening wiki");

        let store = Arc::new(FsPageStore::new(pages_dir));
        Ok(Wiki::builder(store).config(config).build()?)
    }

    /// [`Self::open_wiki`] followed by a link graph rebuild.
    pub(crate) fn open_indexed_wiki(&self) -> Result<Wiki, CliError> {
        let wiki = self.open_wiki()?;
        let summary = wiki.rebuild_link_graph()?;
        tracing::info!(
            pages = summary.pages,
            skipped = summary.skipped,
            "Indexed pages"
        );
        Ok(wiki)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn global(pages: &TempDir) -> GlobalArgs {
        GlobalArgs {
            config: None,
            pages: Some(pages.path().to_path_buf()),
            legacy: false,
            no_plurals: false,
            verbose: false,
        }
    }

    #[test]
    fn test_settings_only_override_when_flagged() {
        let dir = TempDir::new().unwrap();
        let mut args = global(&dir);

        let settings = args.settings();
        assert_eq!(settings.use_advanced_parser, None);
        assert_eq!(settings.match_english_plurals, None);

        args.legacy = true;
        args.no_plurals = true;
        let settings = args.settings();
        assert_eq!(settings.use_advanced_parser, Some(false));
        assert_eq!(settings.match_english_plurals, Some(false));
    }

    #[test]
    fn test_open_indexed_wiki() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Home.md"), "[About]").unwrap();
        fs::write(dir.path().join("About.md"), "# About").unwrap();

        let wiki = global(&dir).open_indexed_wiki().unwrap();

        assert_eq!(wiki.referring_pages("About"), vec!["Home"]);
        assert_eq!(wiki.orphaned_pages(), vec!["Home"]);
    }

    #[test]
    fn test_missing_pages_dir() {
        let dir = TempDir::new().unwrap();
        let mut args = global(&dir);
        args.pages = Some(dir.path().join("missing"));

        assert!(matches!(args.open_wiki(), Err(CliError::Validation(_))));
    }

    #[test]
    fn test_missing_config_file() {
        let dir = TempDir::new().unwrap();
        let mut args = global(&dir);
        args.config = Some(dir.path().join("wiki.toml"));

        assert!(matches!(args.open_wiki(), Err(CliError::Config(_))));
    }
}
