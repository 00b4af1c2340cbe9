//! Built-in syntax handlers, in descending priority.
//!
//! | Handler | Priority | Syntax |
//! |---------|----------|--------|
//! | [`EscapedSyntaxHandler`] | 100 | `[[...]` |
//! | [`MacroHandler`] | 90 | `[{$var}]`, `[{Plugin ...}]` |
//! | [`InterWikiLinkHandler`] | 80 | `[Site:Page]` |
//! | [`TableHandler`] | 70 | `%%table-striped`, `[{Table}]` |
//! | [`WikiLinkHandler`] | 50 | `[Text\|Target\|params]` |

mod escaped;
mod interwiki;
mod macros;
mod table;
mod wiki_link;

pub use escaped::EscapedSyntaxHandler;
pub use interwiki::{InterWikiLinkHandler, SiteSource, expand_template, is_url_safe};
pub use macros::MacroHandler;
pub use table::TableHandler;
pub use wiki_link::{WIKI_LINK_PATTERN, WikiLinkHandler};
