//! Deterministic workspace naming.
//!
//! A fresh workspace is named after its objective. When that name is taken the
//! resolver walks [`candidate_names`] until it finds a free directory.

use chrono::NaiveDateTime;

/// Maximum number of objective characters that make it into a slug.
pub const MAX_SLUG_LEN: usize = 50;

/// Name used when an objective contains nothing slug-worthy.
pub const FALLBACK_SLUG: &str = "workspace";

/// Derive a path-safe directory name from objective text.
///
/// Truncates to [`MAX_SLUG_LEN`] characters, replaces anything outside
/// `[A-Za-z0-9_-]` with `_`, lowercases, then strips leading/trailing `_`.
pub fn slugify(objective: &str) -> String {
    let replaced: String = objective
        .chars()
        .take(MAX_SLUG_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = replaced.trim_matches('_');
    if trimmed.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Second-resolution disambiguation suffix, e.g. `20240101_120000`.
pub fn timestamp_suffix(now: NaiveDateTime) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// Names to try in order: `slug`, `slug_<ts>`, `slug_<ts>_2`, `slug_<ts>_3`, ...
pub fn candidate_names(slug: &str, timestamp: &str) -> impl Iterator<Item = String> {
    let base = slug.to_string();
    let stamped = format!("{slug}_{timestamp}");
    std::iter::once(base)
        .chain(std::iter::once(stamped.clone()))
        .chain((2u32..).map(move |n| format!("{stamped}_{n}")))
}
