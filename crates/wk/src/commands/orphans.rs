//! `wk orphans` command implementation.

use super::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

pub(crate) fn orphans(global: &GlobalArgs) -> Result<(), CliError> {
    let output = Output::new();
    let wiki = global.open_indexed_wiki()?;

    let orphans = wiki.orphaned_pages();
    if orphans.is_empty() {
        output.success("Every page is linked from another page");
        return Ok(());
    }

    output.highlight(&format!("{} orphaned pages:", orphans.len()));
    for page in &orphans {
        output.result(page);
    }
    Ok(())
}
