//! Item metadata resolution.
//!
//! Most item fields come from two independent sources:
//!
//! ## Frontmatter (explicit)
//!
//! Whatever the author typed into the YAML block: `slug`, `order`, `excerpt`,
//! `date`. These always win.
//!
//! ## Filesystem and body (derived)
//!
//! - **Slug**: the file stem with its `NNN-` prefix stripped.
//! - **Order**: the `NNN-` prefix itself, `0` when absent.
//! - **Excerpt**: the first paragraph of the body rendered to plain text.
//!
//! ## Dates
//!
//! Dates accept `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]`, the same with a `T`
//! separator, and RFC 3339 with an offset (normalized to UTC). Sub-second
//! precision is dropped so every backend orders dates identically.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use pulldown_cmark::{Event, Parser, Tag, TagEnd};

/// Maximum excerpt length in characters.
pub const EXCERPT_LEN: usize = 200;

/// Resolve a metadata field from multiple sources.
///
/// Takes a list of optional values in priority order and returns the first
/// non-None, non-empty value.
///
/// ```text
/// excerpt: resolve(&[frontmatter_excerpt, first_paragraph])
/// ```
pub fn resolve(sources: &[Option<&str>]) -> Option<String> {
    sources
        .iter()
        .filter_map(|opt| {
            opt.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
        .next()
}

/// Parse a frontmatter date. Returns `None` for anything unrecognized.
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok())
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").ok())
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M").ok())
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M").ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    parsed.with_nanosecond(0)
}

/// Plain text of the first non-empty paragraph of a Markdown body.
pub fn first_paragraph(body: &str) -> Option<String> {
    let mut in_paragraph = false;
    let mut text = String::new();
    for event in Parser::new(body) {
        match event {
            Event::Start(Tag::Paragraph) => {
                in_paragraph = true;
                text.clear();
            }
            Event::End(TagEnd::Paragraph) => {
                in_paragraph = false;
                let collapsed = collapse_whitespace(&text);
                if !collapsed.is_empty() {
                    return Some(collapsed);
                }
            }
            Event::Text(t) | Event::Code(t) if in_paragraph => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak if in_paragraph => text.push(' '),
            _ => {}
        }
    }
    None
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` characters, breaking at the last space when one
/// falls in the second half of the allowance. Truncated text ends with `…`.
pub fn truncate_excerpt(text: &str, max: usize) -> String {
    if text.chars().count() <= max || max == 0 {
        return text.to_string();
    }
    let cut: String = text.chars().take(max - 1).collect();
    let cut = match cut.rfind(' ') {
        Some(pos) if cut[..pos].chars().count() >= max / 2 => &cut[..pos],
        _ => cut.as_str(),
    };
    format!("{}…", cut.trim_end())
}

/// Resolve an item's excerpt: frontmatter value, else the body's first paragraph.
pub fn excerpt(explicit: Option<&str>, body: &str) -> String {
    let derived = first_paragraph(body);
    resolve(&[explicit, derived.as_deref()])
        .map(|s| truncate_excerpt(&s, EXCERPT_LEN))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // resolve() tests
    // =========================================================================

    #[test]
    fn resolve_picks_first_non_none() {
        assert_eq!(
            resolve(&[Some("Frontmatter"), Some("Derived")]),
            Some("Frontmatter".to_string())
        );
    }

    #[test]
    fn resolve_skips_empty_and_whitespace() {
        assert_eq!(
            resolve(&[Some("  \n\t  "), None, Some("Fallback")]),
            Some("Fallback".to_string())
        );
    }

    #[test]
    fn resolve_returns_none_for_empty_sources() {
        assert_eq!(resolve(&[]), None);
        assert_eq!(resolve(&[None, None]), None);
    }

    // =========================================================================
    // parse_date() tests
    // =========================================================================

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn parse_date_plain_day() {
        assert_eq!(parse_date("2024-01-03"), Some(ymd_hms(2024, 1, 3, 0, 0, 0)));
    }

    #[test]
    fn parse_date_with_time() {
        assert_eq!(
            parse_date("2024-01-03 14:30"),
            Some(ymd_hms(2024, 1, 3, 14, 30, 0))
        );
        assert_eq!(
            parse_date("2024-01-03T14:30:15"),
            Some(ymd_hms(2024, 1, 3, 14, 30, 15))
        );
    }

    #[test]
    fn parse_date_rfc3339_normalizes_to_utc() {
        assert_eq!(
            parse_date("2024-01-03T14:30:00+02:00"),
            Some(ymd_hms(2024, 1, 3, 12, 30, 0))
        );
    }

    #[test]
    fn parse_date_drops_subseconds() {
        assert_eq!(
            parse_date("2024-01-03T14:30:15.987"),
            Some(ymd_hms(2024, 1, 3, 14, 30, 15))
        );
    }

    #[test]
    fn parse_date_rejects_garbage() {
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("2024-13-01"), None);
    }

    // =========================================================================
    // excerpt tests
    // =========================================================================

    #[test]
    fn first_paragraph_skips_headings() {
        let body = "# Title\n\nFirst *real* paragraph\nwith a `code` span.\n\nSecond.";
        assert_eq!(
            first_paragraph(body),
            Some("First real paragraph with a code span.".to_string())
        );
    }

    #[test]
    fn first_paragraph_none_for_empty_body() {
        assert_eq!(first_paragraph(""), None);
        assert_eq!(first_paragraph("# Only a heading"), None);
    }

    #[test]
    fn excerpt_prefers_frontmatter() {
        assert_eq!(excerpt(Some("Given"), "Derived paragraph."), "Given");
        assert_eq!(excerpt(None, "Derived paragraph."), "Derived paragraph.");
        assert_eq!(excerpt(Some("   "), "Derived."), "Derived.");
    }

    #[test]
    fn truncate_excerpt_short_text_untouched() {
        assert_eq!(truncate_excerpt("short", 200), "short");
    }

    #[test]
    fn truncate_excerpt_breaks_at_word() {
        let text = "word ".repeat(60);
        let result = truncate_excerpt(text.trim(), 200);
        assert!(result.chars().count() <= 200);
        assert!(result.ends_with("word…"));
    }

    #[test]
    fn truncate_excerpt_respects_char_boundaries() {
        let text = "é".repeat(300);
        let result = truncate_excerpt(&text, 200);
        assert_eq!(result.chars().count(), 200);
    }
}
