//! `wk sites` command implementation.

use super::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

pub(crate) fn sites(global: &GlobalArgs) -> Result<(), CliError> {
    let output = Output::new();
    let wiki = global.open_wiki()?;

    for (name, site) in wiki.interwiki_sites()? {
        let detail = if site.description.is_empty() {
            site.url
        } else {
            format!("{} ({})", site.url, site.description)
        };
        output.entry(&name, &detail);
    }
    Ok(())
}
