//! JSPWiki-style tables.
//!
//! Two source forms are converted into GFM pipe tables:
//!
//! ```text
//! %%table-striped            [{Table dataStyle:'color: red' rowNumber:0}]
//! || Name || Role            ||# || Name
//! | Ann   | Dev               |#  | Ann
//! /%
//! ```
//!
//! Each converted table is preceded by a `TABLE_METADATA` comment carrying
//! its styling. After markdown conversion, [`post_process_tables`] turns the
//! comment and the following `<table>` tag into a scoped `<style>` block and
//! an identified table.

use std::fmt::Write;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::html::escape_html;

static STRIPED_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)%%table-striped\s*\n((?:(?:\|\|?[^|\n]*)+\|?\s*\n?)+)\s*/%")
        .expect("invalid striped table regex")
});
static TABLE_PLUGIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\{Table\s+([^}]+)\}\]\s*\n((?:(?:\|\|?[^|\n]*)+\|?\s*\n?)+)")
        .expect("invalid table plugin regex")
});
static TABLE_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\w+)\s*:\s*['"](.*?)['"]|(\w+)\s*:\s*([^,\s]+)"#)
        .expect("invalid table parameter regex")
});
static TABLE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--\s*TABLE_METADATA:(.*?)\s*-->\s*<table>")
        .expect("invalid table marker regex")
});

/// Stripe colour applied to even rows of `%%table-striped` tables.
pub const STRIPED_EVEN_ROW_STYLE: &str =
    "background-color: var(--bs-table-striped-bg, rgba(0,0,0,.05));";

/// Styling carried from a table's source to its rendered HTML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableStyleMetadata {
    pub id: String,
    pub style: String,
    pub data_style: String,
    pub header_style: String,
    pub even_row_style: String,
    pub odd_row_style: String,
    /// Number of the row before the first numbered data row.
    pub row_number: u32,
    pub is_striped: bool,
}

impl TableStyleMetadata {
    fn with_fresh_id() -> Self {
        Self {
            id: format!("table_{}", Uuid::new_v4().simple()),
            ..Self::default()
        }
    }

    fn striped() -> Self {
        Self {
            even_row_style: STRIPED_EVEN_ROW_STYLE.to_owned(),
            is_striped: true,
            ..Self::with_fresh_id()
        }
    }

    /// Parse `key:'value'` / `key:value` pairs of a `[{Table ...}]` header.
    pub fn from_params(params: &str) -> Self {
        let mut metadata = Self::with_fresh_id();
        for caps in TABLE_PARAM.captures_iter(params) {
            let (Some(key), Some(value)) = (caps.get(1).or(caps.get(3)), caps.get(2).or(caps.get(4)))
            else {
                continue;
            };
            let value = value.as_str().to_owned();
            match key.as_str() {
                "rowNumber" => metadata.row_number = value.parse().unwrap_or(0),
                "style" => metadata.style = value,
                "dataStyle" => metadata.data_style = value,
                "headerStyle" => metadata.header_style = value,
                "evenRowStyle" => metadata.even_row_style = value,
                "oddRowStyle" => metadata.odd_row_style = value,
                other => tracing::debug!(param = other, "Ignoring unknown table parameter"),
            }
        }
        metadata
    }

    fn marker(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => format!("<!-- TABLE_METADATA:{json} -->\n"),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode table metadata");
                String::new()
            }
        }
    }
}

/// Convert both JSPWiki table forms in `content` into marked pipe tables.
pub fn convert_tables(content: &str) -> String {
    let striped = STRIPED_TABLE.replace_all(content, |caps: &Captures<'_>| {
        let metadata = TableStyleMetadata::striped();
        let table = rows_to_markdown(&caps[1], metadata.row_number);
        format!("{}{table}\n\n", metadata.marker())
    });
    TABLE_PLUGIN
        .replace_all(&striped, |caps: &Captures<'_>| {
            let metadata = TableStyleMetadata::from_params(&caps[1]);
            let table = rows_to_markdown(&caps[2], metadata.row_number);
            format!("{}{table}\n\n", metadata.marker())
        })
        .into_owned()
}

/// Turn JSPWiki rows into pipe-table rows.
///
/// `||` rows become a header followed by a separator. `|#` in a data row is
/// replaced by the next row number; `||#` in a header row becomes `||Nr`.
pub fn rows_to_markdown(rows: &str, first_row_number: u32) -> String {
    let mut row_number = first_row_number;
    let mut lines = Vec::new();

    for line in rows.trim().lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("||") {
            let mut header = line.replace("||#", "||Nr").replace("||", "|");
            if !header.ends_with('|') {
                header.push('|');
            }
            let columns = header.matches('|').count().saturating_sub(1);
            lines.push(header);
            lines.push(format!("|{}", "---|".repeat(columns)));
        } else if line.starts_with('|') {
            let mut row = if line.contains("|#") {
                row_number += 1;
                line.replace("|#", &format!("|{row_number}"))
            } else {
                line.to_owned()
            };
            if !row.ends_with('|') {
                row.push('|');
            }
            lines.push(row);
        }
    }

    lines.join("\n")
}

/// Replace table markers and their `<table>` tags with styled tables.
pub fn post_process_tables(html: &str) -> String {
    if !html.contains("TABLE_METADATA") {
        return html.to_owned();
    }
    TABLE_MARKER
        .replace_all(html, |caps: &Captures<'_>| {
            match serde_json::from_str::<TableStyleMetadata>(&caps[1]) {
                Ok(metadata) => styled_table_open(&metadata),
                Err(e) => {
                    tracing::error!(error = %e, "Invalid table metadata");
                    "<table>".to_owned()
                }
            }
        })
        .into_owned()
}

/// Scoped CSS plus the opening tag for one table.
///
/// Striped tables already shade odd body rows through the theme, so their
/// even/odd rules target the opposite `nth-child` parity.
pub fn styled_table_open(metadata: &TableStyleMetadata) -> String {
    let id = css_value(&metadata.id);
    let mut css = String::new();

    if !metadata.header_style.is_empty() {
        let _ = write!(css, "#{id} th {{ {} }}", css_value(&metadata.header_style));
    }
    if !metadata.data_style.is_empty() {
        let _ = write!(css, "#{id} td {{ {} }}", css_value(&metadata.data_style));
    }
    if !metadata.even_row_style.is_empty() {
        let selector = if metadata.is_striped {
            "tbody tr:nth-child(odd)"
        } else {
            "tr:nth-child(even)"
        };
        let _ = write!(css, "#{id} {selector} {{ {} }}", css_value(&metadata.even_row_style));
    }
    if !metadata.odd_row_style.is_empty() {
        let selector = if metadata.is_striped {
            "tbody tr:nth-child(even)"
        } else {
            "tr:nth-child(odd)"
        };
        let _ = write!(css, "#{id} {selector} {{ {} }}", css_value(&metadata.odd_row_style));
    }

    let mut out = String::new();
    if !css.is_empty() {
        let _ = write!(out, "<style>{css}</style>");
    }
    let class = if metadata.is_striped {
        "table table-striped"
    } else {
        "table"
    };
    let _ = write!(out, r#"<table id="{}" class="{class}""#, escape_html(&id));
    if !metadata.style.is_empty() {
        let _ = write!(out, r#" style="{}""#, escape_html(&metadata.style));
    }
    out.push('>');
    out
}

/// Drop characters that could close the rule block or the `<style>` element.
fn css_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '{' | '}'))
        .collect()
}
