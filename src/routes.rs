//! Public URL assignment and the compiled route table.
//!
//! Each content type maps its items to URLs with a pattern from `folio.toml`:
//!
//! | Token | Expands to |
//! |-------|-----------|
//! | `{type}` | the content type name |
//! | `{slug}` | the item slug |
//! | `{path}` | the slug; for hierarchical types that is the full prefix-stripped path |
//! | `{year}` `{month}` `{day}` | parts of the item date (zero-padded) |
//!
//! An item whose pattern needs a date it does not have gets no URL and an
//! [`IndexIssue::UnresolvableRoute`]; it stays indexed. When several items
//! claim one URL, the first in (type, slug) order owns it and the clash is
//! recorded as an [`IndexIssue::RouteCollision`]. Every claimant stays indexed.
//!
//! The table includes every status. Whether a draft URL is served is the
//! rendering layer's call.

use crate::config::{SiteConfig, UrlStyle};
use crate::types::{IndexIssue, Item, ItemMeta, RouteTable, RouteTarget};
use chrono::Datelike;
use std::collections::BTreeMap;

/// Expand a URL pattern for one item.
pub fn expand(pattern: &str, meta: &ItemMeta, style: UrlStyle) -> Result<String, String> {
    let mut out = String::with_capacity(pattern.len() + meta.slug.len());
    let mut rest = pattern;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let close = rest[open..]
            .find('}')
            .map(|c| open + c)
            .ok_or_else(|| "unterminated '{' in pattern".to_string())?;
        let token = &rest[open + 1..close];
        match token {
            "type" => out.push_str(&meta.item_type),
            "slug" => out.push_str(&meta.slug),
            "path" => {
                // A hierarchical root index is the type's landing page.
                if !(style == UrlStyle::Hierarchical && meta.slug == "index") {
                    out.push_str(&meta.slug);
                }
            }
            "year" | "month" | "day" => {
                let date = meta
                    .date
                    .ok_or_else(|| format!("{{{token}}} needs a date"))?;
                let part = match token {
                    "year" => format!("{:04}", date.year()),
                    "month" => format!("{:02}", date.month()),
                    _ => format!("{:02}", date.day()),
                };
                out.push_str(&part);
            }
            other => return Err(format!("unknown token {{{other}}}")),
        }
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    Ok(normalize(&out))
}

/// Leading slash, no empty segments.
pub fn normalize(url: &str) -> String {
    let mut out = String::with_capacity(url.len() + 1);
    out.push('/');
    for c in url.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    out
}

/// Assign URLs to `items` and compile the route table.
///
/// `items` must be sorted by (type, slug): that order decides collision owners.
pub fn compile(items: &mut [Item], config: &SiteConfig) -> (RouteTable, Vec<IndexIssue>) {
    let mut issues = Vec::new();
    let mut claims: BTreeMap<String, Vec<RouteTarget>> = BTreeMap::new();

    for item in items.iter_mut() {
        let meta = &mut item.meta;
        let Some(ty) = config.type_config(&meta.item_type) else {
            meta.url = None;
            continue;
        };
        match expand(&ty.url, meta, ty.url_style) {
            Ok(url) => {
                claims.entry(url.clone()).or_default().push(RouteTarget {
                    item_type: meta.item_type.clone(),
                    slug: meta.slug.clone(),
                    status: meta.status,
                });
                meta.url = Some(url);
            }
            Err(reason) => {
                meta.url = None;
                issues.push(IndexIssue::UnresolvableRoute {
                    item_type: meta.item_type.clone(),
                    slug: meta.slug.clone(),
                    pattern: ty.url.clone(),
                    reason,
                });
            }
        }
    }

    let mut table = RouteTable::default();
    for (url, claimants) in claims {
        let owner = claimants[0].clone();
        if claimants.len() > 1 {
            issues.push(IndexIssue::RouteCollision {
                url: url.clone(),
                owner: format!("{}/{}", owner.item_type, owner.slug),
                others: claimants[1..]
                    .iter()
                    .map(|c| format!("{}/{}", c.item_type, c.slug))
                    .collect(),
            });
            table.collisions.insert(url.clone(), claimants);
        }
        table.routes.insert(url, owner);
    }
    (table, issues)
}
