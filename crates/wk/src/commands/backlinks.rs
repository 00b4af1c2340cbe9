//! `wk backlinks` command implementation.

use clap::Args;

use super::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the backlinks command.
#[derive(Args)]
pub(crate) struct BacklinksArgs {
    /// Page whose referrers to list.
    page: String,
}

impl BacklinksArgs {
    pub(crate) fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let wiki = global.open_indexed_wiki()?;

        let referrers = wiki.referring_pages(&self.page);
        if referrers.is_empty() {
            output.info(&format!("No pages link to {}", self.page));
            return Ok(());
        }

        output.highlight(&format!("Pages linking to {}:", self.page));
        for page in &referrers {
            output.result(page);
        }
        Ok(())
    }
}
