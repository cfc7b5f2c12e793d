//! Filename parsing for the `NNN-name` convention, plus slug normalization.
//!
//! Content files may carry an optional numeric prefix that supplies their
//! manual order:
//! - `010-getting-started.md` → order 10, slug `getting-started`
//! - `hello-world.md` → no order, slug `hello-world`
//! - `2024-01-15-hello.md` → no order, slug `hello` (a date prefix is not an order)
//!
//! The prefix never appears in a slug or URL, so reordering files does not
//! break links.

/// Result of parsing a numbered entry name like `020-getting-started`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedName {
    /// Number prefix if present (e.g., `20` from `020-getting-started`)
    pub number: Option<u32>,
    /// Raw name part after `NNN-`. Empty if number-only.
    /// For unnumbered entries, this is the full input.
    pub name: String,
}

/// Parse an entry name following the `NNN-name` convention.
///
/// - `"020-getting-started"` → number=Some(20), name="getting-started"
/// - `"001"` → number=Some(1), name=""
/// - `"hello-world"` → number=None, name="hello-world"
/// - `"2024-recap"` → number=Some(2024), name="recap"
/// - `"2024-01-15-hello"` → number=None, name="hello"
pub fn parse_entry_name(name: &str) -> ParsedName {
    if let Some(rest) = strip_date_prefix(name) {
        return ParsedName {
            number: None,
            name: rest.to_string(),
        };
    }
    if let Some(dash_pos) = name.find('-') {
        let prefix = &name[..dash_pos];
        if !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(num) = prefix.parse::<u32>() {
                return ParsedName {
                    number: Some(num),
                    name: name[dash_pos + 1..].to_string(),
                };
            }
        }
    }
    if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(num) = name.parse::<u32>() {
            return ParsedName {
                number: Some(num),
                name: String::new(),
            };
        }
    }
    ParsedName {
        number: None,
        name: name.to_string(),
    }
}

/// The part after a `YYYY-MM-DD-` prefix, if `name` has one that is a real
/// calendar date.
fn strip_date_prefix(name: &str) -> Option<&str> {
    let (date, rest) = (name.get(..10)?, name.get(10..)?);
    let rest = rest.strip_prefix('-').filter(|r| !r.is_empty())?;
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some(rest)
}

/// Strip the `NNN-` prefix from one path segment, keeping number-only names.
pub fn strip_prefix(segment: &str) -> String {
    let parsed = parse_entry_name(segment);
    if parsed.number.is_some() && parsed.name.is_empty() {
        segment.to_string()
    } else {
        parsed.name
    }
}

/// Normalize free text into a URL-safe slug.
///
/// Lowercases, keeps alphanumerics (Unicode included), and collapses every
/// other run of characters into a single `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Slugify each `/`-separated segment of a path, dropping empty segments.
pub fn slugify_path(path: &str) -> String {
    path.split('/')
        .map(slugify)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
