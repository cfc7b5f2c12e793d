//! Taxonomy definition files and the derived term index.
//!
//! A taxonomy file declares the terms a site knows about, with display names
//! and descriptions. Two YAML shapes are accepted:
//!
//! ```yaml
//! # list form
//! - name: Rust
//!   description: Systems programming
//! - { slug: cms, name: Content Management }
//! - Web
//! ```
//!
//! ```yaml
//! # map form
//! rust: Rust
//! cms:
//!   name: Content Management
//!   description: Flat-file CMS internals
//! ```
//!
//! Membership is never stored in these files. Items name their terms in
//! frontmatter and every rebuild derives each term's item list from scratch.
//! Terms that items reference but the file does not define are created on the
//! fly, named after the first label seen.

use crate::naming::slugify;
use crate::types::{IndexIssue, Item, ItemRef, Term};
use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// A term as declared in a taxonomy file.
#[derive(Debug, Clone, PartialEq)]
pub struct TermDef {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
}

/// A term label as an item wrote it, before slugification.
#[derive(Debug, Clone, PartialEq)]
pub struct TermLabel {
    pub taxonomy: String,
    pub slug: String,
    pub label: String,
}

/// Load one taxonomy file. A missing file is not an error: the taxonomy then
/// only contains terms created from frontmatter.
pub fn load_definitions(taxonomy: &str, path: &Path) -> (Vec<TermDef>, Vec<IndexIssue>) {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("taxonomy '{taxonomy}': no definition file at {}", path.display());
            return (Vec::new(), Vec::new());
        }
        Err(e) => return (Vec::new(), vec![issue(taxonomy, format!("cannot read file: {e}"))]),
    };
    parse_definitions(taxonomy, &content)
}

/// Parse the YAML of a taxonomy file.
pub fn parse_definitions(taxonomy: &str, content: &str) -> (Vec<TermDef>, Vec<IndexIssue>) {
    let value: Value = match serde_yaml::from_str(content) {
        Ok(v) => v,
        Err(e) => return (Vec::new(), vec![issue(taxonomy, format!("invalid YAML: {e}"))]),
    };

    let mut issues = Vec::new();
    let raw: Vec<Result<TermDef, String>> = match value {
        Value::Null => Vec::new(),
        Value::Sequence(seq) => seq.into_iter().map(list_entry).collect(),
        Value::Mapping(map) => map
            .into_iter()
            .map(|(key, entry)| map_entry(key, entry))
            .collect(),
        _ => {
            return (
                Vec::new(),
                vec![issue(taxonomy, "file must be a list or a mapping of terms".into())],
            );
        }
    };

    let mut seen = BTreeSet::new();
    let mut defs = Vec::new();
    for entry in raw {
        match entry {
            Ok(def) if seen.insert(def.slug.clone()) => defs.push(def),
            Ok(def) => issues.push(issue(taxonomy, format!("term '{}' defined twice", def.slug))),
            Err(message) => issues.push(issue(taxonomy, message)),
        }
    }
    (defs, issues)
}

fn issue(taxonomy: &str, message: String) -> IndexIssue {
    IndexIssue::Taxonomy {
        taxonomy: taxonomy.to_string(),
        message,
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn list_entry(entry: Value) -> Result<TermDef, String> {
    match entry {
        Value::Mapping(map) => {
            let name = text(map.get("name")).ok_or("term entry without a name")?;
            let slug = text(map.get("slug"))
                .map(|s| slugify(&s))
                .unwrap_or_else(|| slugify(&name));
            checked(TermDef {
                slug,
                name,
                description: text(map.get("description")),
            })
        }
        other => {
            let name = text(Some(&other)).ok_or("term entry must be a name or a mapping")?;
            checked(TermDef {
                slug: slugify(&name),
                name,
                description: None,
            })
        }
    }
}

fn map_entry(key: Value, entry: Value) -> Result<TermDef, String> {
    let key = text(Some(&key)).ok_or("term keys must be strings")?;
    let slug = slugify(&key);
    match entry {
        Value::Mapping(map) => checked(TermDef {
            slug,
            name: text(map.get("name")).unwrap_or(key),
            description: text(map.get("description")),
        }),
        Value::Null => checked(TermDef {
            slug,
            name: key,
            description: None,
        }),
        other => checked(TermDef {
            slug,
            name: text(Some(&other)).unwrap_or(key),
            description: None,
        }),
    }
}

fn checked(def: TermDef) -> Result<TermDef, String> {
    if def.slug.is_empty() {
        Err(format!("cannot derive a slug from '{}'", def.name))
    } else {
        Ok(def)
    }
}

/// Build the term index for one taxonomy.
///
/// Item lists hold published items only, sorted by slug and deduplicated.
/// Output is sorted by term slug.
pub fn build_terms(
    taxonomy: &str,
    defs: Vec<TermDef>,
    items: &[Item],
    labels: &[TermLabel],
) -> Vec<Term> {
    let mut terms: BTreeMap<String, Term> = defs
        .into_iter()
        .map(|d| {
            let term = Term {
                taxonomy: taxonomy.to_string(),
                slug: d.slug.clone(),
                name: d.name,
                description: d.description,
                items: Vec::new(),
            };
            (d.slug, term)
        })
        .collect();

    for label in labels.iter().filter(|l| l.taxonomy == taxonomy) {
        terms.entry(label.slug.clone()).or_insert_with(|| Term {
            taxonomy: taxonomy.to_string(),
            slug: label.slug.clone(),
            name: label.label.clone(),
            description: None,
            items: Vec::new(),
        });
    }

    for item in items.iter().filter(|i| i.meta.is_published()) {
        for slug in item.meta.terms_for(taxonomy) {
            if let Some(term) = terms.get_mut(slug) {
                term.items.push(ItemRef::of(&item.meta));
            }
        }
    }

    terms
        .into_values()
        .map(|mut term| {
            term.items.sort();
            term.items.dedup();
            term
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::item;
    use crate::types::Status;
    use tempfile::TempDir;

    #[test]
    fn list_form() {
        let (defs, issues) = parse_definitions(
            "tags",
            "- name: Rust\n  description: Systems\n- { slug: cms, name: Content Management }\n- Web Dev\n",
        );
        assert!(issues.is_empty());
        let slugs: Vec<&str> = defs.iter().map(|d| d.slug.as_str()).collect();
        assert_eq!(slugs, vec!["rust", "cms", "web-dev"]);
        assert_eq!(defs[0].description.as_deref(), Some("Systems"));
        assert_eq!(defs[1].name, "Content Management");
    }

    #[test]
    fn map_form() {
        let (defs, issues) = parse_definitions(
            "tags",
            "rust: Rust\ncms:\n  name: CMS\n  description: Internals\nbare:\n",
        );
        assert!(issues.is_empty());
        assert_eq!(defs.len(), 3);
        let cms = defs.iter().find(|d| d.slug == "cms").unwrap();
        assert_eq!(cms.name, "CMS");
        assert_eq!(cms.description.as_deref(), Some("Internals"));
        let bare = defs.iter().find(|d| d.slug == "bare").unwrap();
        assert_eq!(bare.name, "bare");
    }

    #[test]
    fn duplicate_definition_is_reported() {
        let (defs, issues) = parse_definitions("tags", "- Rust\n- rust\n");
        assert_eq!(defs.len(), 1);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind(), "taxonomy");
    }

    #[test]
    fn invalid_yaml_is_reported() {
        let (defs, issues) = parse_definitions("tags", "- [unclosed");
        assert!(defs.is_empty());
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn scalar_document_is_reported() {
        let (_, issues) = parse_definitions("tags", "just words");
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn missing_file_is_silent() {
        let tmp = TempDir::new().unwrap();
        let (defs, issues) = load_definitions("tags", &tmp.path().join("nope.yaml"));
        assert!(defs.is_empty());
        assert!(issues.is_empty());
    }

    // =========================================================================
    // build_terms
    // =========================================================================

    fn members(term: &Term) -> Vec<String> {
        term.items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn build_terms_lists_published_items_only() {
        let mut a = item("post", "a", Status::Published, Some("2024-01-01"));
        a.meta.terms.insert("tags".into(), vec!["rust".into()]);
        let mut b = item("post", "b", Status::Draft, Some("2024-01-02"));
        b.meta.terms.insert("tags".into(), vec!["rust".into()]);
        let defs = vec![TermDef {
            slug: "rust".into(),
            name: "Rust".into(),
            description: None,
        }];

        let terms = build_terms("tags", defs, &[a, b], &[]);
        assert_eq!(terms.len(), 1);
        assert_eq!(members(&terms[0]), vec!["post/a"]);
    }

    #[test]
    fn build_terms_creates_undefined_terms_from_labels() {
        let mut a = item("post", "a", Status::Published, None);
        a.meta.terms.insert("tags".into(), vec!["web-dev".into()]);
        let labels = vec![TermLabel {
            taxonomy: "tags".into(),
            slug: "web-dev".into(),
            label: "Web Dev".into(),
        }];

        let terms = build_terms("tags", Vec::new(), &[a], &labels);
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].name, "Web Dev");
        assert_eq!(members(&terms[0]), vec!["post/a"]);
    }

    #[test]
    fn build_terms_keeps_same_slug_in_two_types() {
        let mut items = Vec::new();
        for slug in ["c", "a", "b"] {
            let mut it = item("post", slug, Status::Published, None);
            it.meta.terms.insert("tags".into(), vec!["x".into()]);
            items.push(it);
        }
        // Same slug in another type
        let mut page = item("page", "a", Status::Published, None);
        page.meta.terms.insert("tags".into(), vec!["x".into()]);
        items.push(page);
        let labels = vec![TermLabel {
            taxonomy: "tags".into(),
            slug: "x".into(),
            label: "X".into(),
        }];

        // Listed twice in frontmatter, counted once
        items[0]
            .meta
            .terms
            .insert("tags".into(), vec!["x".into(), "x".into()]);

        let terms = build_terms("tags", Vec::new(), &items, &labels);
        assert_eq!(
            members(&terms[0]),
            vec!["page/a", "post/a", "post/b", "post/c"]
        );
    }
}
