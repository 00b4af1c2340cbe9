//! `[{...}]` macro expansion: system variables and plugin calls.
//!
//! `[{$pagename}]` resolves a variable directly; anything else is parsed as
//! `PluginName key=value ...` and dispatched to a [`PluginExecutor`].
//! `[{Table ...}]` headers are left alone for the table converter.

use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use chrono::{Datelike, Local, SecondsFormat, Utc};
use regex::Regex;
use wk_config::SiteConfig;

use crate::context::ParseContext;
use crate::handler::{collect_matches, replace_matches};
use crate::html::escape_html;
use crate::names::PageNames;
use crate::plugin::{PluginContext, PluginError, PluginExecutor, PluginParams, ReferrerLookup};

/// Pattern of one macro; group 1 is the text between `[{` and `}]`.
pub const MACRO_PATTERN: &str = r"\[\{([^}]+)\}\]";

static MACRO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(MACRO_PATTERN).expect("invalid macro regex"));

/// Process-wide values behind the system variables.
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub application_name: String,
    pub version: String,
    pub base_url: String,
    pub started_at: Instant,
}

impl SystemInfo {
    pub fn from_config(site: &SiteConfig) -> Self {
        Self {
            application_name: site.application_name.clone(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            base_url: site.base_url.clone(),
            started_at: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// `2d 3h 4m`, `3h 4m` or `4m`.
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let days = total / 86_400;
    let hours = total % 86_400 / 3_600;
    let minutes = total % 3_600 / 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Split `Name a=1 b='two words' c = "x"` into the plugin name and params.
///
/// A quoted value continues across whitespace until its closing quote. The
/// `key = value` form with the key as a separate word is accepted too.
pub fn parse_plugin_call(inner: &str) -> (String, PluginParams) {
    let parts: Vec<&str> = inner.split_whitespace().collect();
    let mut params = PluginParams::new();
    let Some((name, rest)) = parts.split_first() else {
        return (String::new(), params);
    };

    let mut i = 0;
    while i < rest.len() {
        let part = rest[i];
        let (key, raw_value) = if let Some((key, value)) = part.split_once('=') {
            (key, value.to_owned())
        } else if let Some(value) = rest.get(i + 1).and_then(|next| next.strip_prefix('=')) {
            i += 1;
            (part, value.to_owned())
        } else {
            i += 1;
            continue;
        };

        let mut value = raw_value;
        if value.is_empty() && rest.get(i + 1).is_some_and(|next| !next.contains('=')) {
            i += 1;
            value = rest[i].to_owned();
        }
        if let Some(quote) = value.chars().next().filter(|c| *c == '\'' || *c == '"') {
            while (value.len() < 2 || !value.ends_with(quote)) && i + 1 < rest.len() {
                i += 1;
                value.push(' ');
                value.push_str(rest[i]);
            }
            if value.len() >= 2 && value.ends_with(quote) {
                value = value[1..value.len() - 1].to_owned();
            }
        }
        params.insert(key.to_owned(), value);
        i += 1;
    }

    ((*name).to_owned(), params)
}

/// Expands macros with access to system info, page names and plugins.
pub struct MacroExpander {
    system: SystemInfo,
    page_names: Arc<PageNames>,
    plugins: Arc<dyn PluginExecutor>,
    referrers: Option<Arc<dyn ReferrerLookup>>,
}

impl MacroExpander {
    pub fn new(
        system: SystemInfo,
        page_names: Arc<PageNames>,
        plugins: Arc<dyn PluginExecutor>,
    ) -> Self {
        Self {
            system,
            page_names,
            plugins,
            referrers: None,
        }
    }

    #[must_use]
    pub fn with_referrers(mut self, referrers: Arc<dyn ReferrerLookup>) -> Self {
        self.referrers = Some(referrers);
        self
    }

    pub fn system(&self) -> &SystemInfo {
        &self.system
    }

    /// Value of `variable` (including the `$`). Unknown variables come back
    /// as their original macro text.
    pub fn expand_variable(&self, variable: &str, ctx: &ParseContext) -> String {
        match variable {
            "$pagename" => ctx.page_name.clone(),
            "$totalpages" => self.page_names.len().to_string(),
            "$uptime" => format_uptime(self.system.uptime()),
            "$applicationname" => self.system.application_name.clone(),
            "$version" => self.system.version.clone(),
            "$baseurl" => self.system.base_url.clone(),
            "$timestamp" => Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "$date" => Local::now().format("%-m/%-d/%Y").to_string(),
            "$time" => Local::now().format("%-I:%M:%S %p").to_string(),
            "$year" => Local::now().year().to_string(),
            "$username" => ctx.display_user_name(),
            "$loginstatus" => ctx.login_status().as_str().to_owned(),
            unknown => {
                tracing::warn!(variable = unknown, page = %ctx.page_name, "Unknown system variable");
                format!("[{{{unknown}}}]")
            }
        }
    }

    /// Expand the inside of one `[{...}]`. `None` leaves the macro as is.
    pub fn expand(&self, inner: &str, ctx: &ParseContext) -> Result<Option<String>, PluginError> {
        let inner = inner.trim();
        if inner.starts_with('$') {
            return Ok(Some(self.expand_variable(inner, ctx)));
        }

        let (name, params) = parse_plugin_call(inner);
        if name.eq_ignore_ascii_case("table") {
            return Ok(None);
        }
        let plugin_ctx = PluginContext {
            page_name: &ctx.page_name,
            parse: ctx,
            referrers: self.referrers.as_deref(),
        };
        self.plugins.execute(&name, &params, &plugin_ctx).map(Some)
    }

    /// Expand every macro in `content`. A failing macro becomes
    /// `[Error: ...]`; the others are still expanded.
    pub fn expand_all(&self, content: &str, ctx: &ParseContext) -> String {
        let matches = collect_matches(&MACRO, content);
        replace_matches(content, &matches, |m| {
            let inner = m.group(1).unwrap_or_default();
            match self.expand(inner, ctx) {
                Ok(replacement) => replacement,
                Err(e) => {
                    tracing::error!(
                        page = %ctx.page_name,
                        expression = inner,
                        error = %e,
                        "Macro expansion failed"
                    );
                    Some(error_marker(inner))
                }
            }
        })
    }
}

/// Inline marker for a macro that failed, shown as `[Error: ...]`.
///
/// The brackets are entity-encoded so that later link passes cannot match
/// the marker; markdown conversion decodes them back.
pub fn error_marker(inner: &str) -> String {
    format!("&#91;Error: {}&#93;", escape_html(inner))
}
