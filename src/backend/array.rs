//! In-memory array backend.
//!
//! The whole item collection is one codec blob (`index.bin`). Loading reads
//! it once; afterwards slug lookups go through the slug projection and path
//! lookups through a map built at load time. Listings filter and sort in
//! memory with the shared comparator.
//!
//! Good up to a few thousand items. Past that, load time and resident memory
//! grow with the corpus on every request and the SQLite backend wins.

use super::codec::Codec;
use super::{
    Backend, BackendError, BackendKind, INDEX_BLOB, IndexHandle, Listing, ListingRequest,
    Projections, Snapshot, load_projections, meta_bytes, read_blob, write_blob, write_projections,
};
use crate::ordering;
use crate::types::{Item, ItemMeta, Status};
use std::collections::HashMap;
use std::path::Path;

pub struct ArrayBackend;

impl Backend for ArrayBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Array
    }

    fn write(&self, snapshot: &Snapshot, dir: &Path, codec: Codec) -> Result<(), BackendError> {
        write_blob(dir, INDEX_BLOB, codec, &snapshot.items)?;
        write_projections(snapshot, dir, codec)
    }

    fn load(&self, dir: &Path) -> Result<Box<dyn IndexHandle>, BackendError> {
        let items: Vec<Item> = read_blob(dir, INDEX_BLOB)?;
        let projections = load_projections(dir)?;
        Ok(Box::new(ArrayHandle::new(items, projections)?))
    }
}

/// A fully loaded generation.
pub struct ArrayHandle {
    items: Vec<Item>,
    by_path: HashMap<String, usize>,
    projections: Projections,
}

impl ArrayHandle {
    fn new(items: Vec<Item>, projections: Projections) -> Result<Self, BackendError> {
        for (item_type, slugs) in &projections.slugs {
            for (slug, &offset) in slugs {
                let ok = items
                    .get(offset)
                    .is_some_and(|i| i.meta.item_type == *item_type && i.meta.slug == *slug);
                if !ok {
                    return Err(BackendError::Corrupt(format!(
                        "slug index entry {item_type}/{slug} points at offset {offset}"
                    )));
                }
            }
        }
        let by_path = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.meta.path.clone(), i))
            .collect();
        Ok(Self {
            items,
            by_path,
            projections,
        })
    }
}

impl IndexHandle for ArrayHandle {
    fn backend(&self) -> BackendKind {
        BackendKind::Array
    }

    fn count(&self, item_type: &str, status: Option<Status>) -> Result<usize, BackendError> {
        Ok(self
            .items
            .iter()
            .filter(|i| i.meta.item_type == item_type)
            .filter(|i| status.is_none_or(|s| i.meta.status == s))
            .count())
    }

    fn get_by_slug(&self, item_type: &str, slug: &str) -> Result<Option<Item>, BackendError> {
        Ok(self
            .projections
            .slugs
            .get(item_type)
            .and_then(|m| m.get(slug))
            .and_then(|&offset| self.items.get(offset))
            .cloned())
    }

    fn get_by_path(&self, path: &str) -> Result<Option<Item>, BackendError> {
        Ok(self
            .by_path
            .get(path)
            .and_then(|&i| self.items.get(i))
            .cloned())
    }

    fn list(&self, request: &ListingRequest) -> Result<Listing, BackendError> {
        let mut matches: Vec<ItemMeta> = self
            .items
            .iter()
            .filter(|i| request.accepts(&i.meta) && request.matches_search(i))
            .map(|i| i.meta.clone())
            .collect();
        ordering::sort_metas(&mut matches, request.sort);
        let total = matches.len();
        let items = matches
            .into_iter()
            .skip(request.offset)
            .take(request.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(Listing { items, total })
    }

    fn all_raw(&self) -> Result<Vec<Item>, BackendError> {
        Ok(self.items.clone())
    }

    fn projections(&self) -> &Projections {
        &self.projections
    }

    fn approx_memory_bytes(&self) -> usize {
        let items: usize = self
            .items
            .iter()
            .map(|i| meta_bytes(&i.meta) + i.body.len())
            .sum();
        let paths: usize = self.by_path.keys().map(|p| p.len() + 32).sum();
        items + paths + self.projections.approx_bytes()
    }
}
