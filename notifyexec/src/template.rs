//! Argument templating.
//!
//! Each entry of the parameter template may contain placeholders that are
//! replaced with fields of the triggering event:
//!
//! | Placeholder | Replacement |
//! |-------------|-------------|
//! | `[[Cookie]]` | event cookie, in decimal |
//! | `[[Filename]]` | event name, verbatim |
//! | `[[Info]]` | event description |
//!
//! Substitution is plain text replacement. No shell quoting is applied, so
//! the target command sees the filename exactly as the provider reported it.

use crate::types::Event;

pub const COOKIE_PLACEHOLDER: &str = "[[Cookie]]";
pub const FILENAME_PLACEHOLDER: &str = "[[Filename]]";
pub const INFO_PLACEHOLDER: &str = "[[Info]]";

/// Renders `template` against `event`, one output entry per template entry.
#[must_use]
pub fn render<S: AsRef<str>>(template: &[S], event: &Event) -> Vec<String> {
    let cookie = event.cookie.to_string();
    let info = event.description();

    template
        .iter()
        .map(|entry| {
            entry
                .as_ref()
                .replace(COOKIE_PLACEHOLDER, &cookie)
                .replace(FILENAME_PLACEHOLDER, &event.name)
                .replace(INFO_PLACEHOLDER, &info)
        })
        .collect()
}
