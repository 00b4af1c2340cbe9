//! `wk render` command implementation.

use clap::Args;
use wk_renderer::{ParseContext, UserContext};

use super::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Page to render.
    page: String,

    /// Render as this user (default: anonymous).
    #[arg(short, long)]
    user: Option<String>,
}

impl RenderArgs {
    pub(crate) fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let wiki = global.open_indexed_wiki()?;

        let mut ctx = ParseContext::new(self.page.as_str());
        if let Some(user) = self.user {
            ctx = ctx.with_user(UserContext::named(user));
        }

        let rendered = wiki.render_page(&self.page, &ctx)?;
        if global.verbose {
            output.info(&format!("Rendered {} with {} parser", self.page, rendered.strategy));
        }
        output.result(rendered.html.trim_end());
        Ok(())
    }
}
