//! Listing order shared by every backend.
//!
//! One comparator decides the order of every listing in the engine, so the
//! array backend, the recent cache and the SQL translation in the SQLite
//! backend can never disagree:
//!
//! 1. the primary key of the [`SortField`], in the requested direction
//!    - `date`: undated items sort last in *either* direction
//!    - `title`: lowercase comparison
//!    - `order`: the manual order integer
//! 2. slug ascending
//! 3. type ascending (only matters for listings spanning several types)

use crate::types::{ItemMeta, SortDirection, SortField};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A sort field paired with its direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TypeSort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl TypeSort {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }
}

fn directed(ord: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ord,
        SortDirection::Desc => ord.reverse(),
    }
}

/// Compare two items under `sort`.
pub fn compare(a: &ItemMeta, b: &ItemMeta, sort: TypeSort) -> Ordering {
    let primary = match sort.field {
        SortField::Date => match (a.date, b.date) {
            (Some(x), Some(y)) => directed(x.cmp(&y), sort.direction),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortField::Title => directed(
            a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            sort.direction,
        ),
        SortField::Order => directed(a.order.cmp(&b.order), sort.direction),
    };
    primary
        .then_with(|| a.slug.cmp(&b.slug))
        .then_with(|| a.item_type.cmp(&b.item_type))
}

/// Sort a listing in place.
pub fn sort_metas(metas: &mut [ItemMeta], sort: TypeSort) {
    metas.sort_by(|a, b| compare(a, b, sort));
}

/// The first `k` items under `sort`, in order.
///
/// Bounded selection: partitions around the k-th element and only sorts the
/// winners, so building a recent list never sorts the whole type.
pub fn top_k(mut metas: Vec<ItemMeta>, k: usize, sort: TypeSort) -> Vec<ItemMeta> {
    if k == 0 {
        return Vec::new();
    }
    if metas.len() > k {
        metas.select_nth_unstable_by(k - 1, |a, b| compare(a, b, sort));
        metas.truncate(k);
    }
    sort_metas(&mut metas, sort);
    metas
}
