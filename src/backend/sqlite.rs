//! SQLite backend.
//!
//! Items are rows in `index.sqlite`; nothing but the small projection blobs is
//! loaded up front. Listings become SQL that reproduces the shared comparator
//! key by key:
//!
//! | Comparator key | Column / clause |
//! |----------------|-----------------|
//! | date, undated last | `date IS NULL, date ASC\|DESC` over fixed-width ISO text |
//! | lowercase title | `title_key`, lowercased when written |
//! | manual order | `ord` |
//! | slug, then type | `slug ASC, type ASC` |
//!
//! Search runs `instr` over `search_text`, the same lowercased haystack the
//! array backend scans, so both backends match the same items.
//!
//! ```text
//! items(pos PK, id, type, slug, title, title_key, status, date, updated,
//!       excerpt, ord, path UNIQUE, body, terms, fields, url, search_text)
//!   UNIQUE (type, slug)
//!   INDEX  (type, status, date)
//! item_terms(item_pos, taxonomy, term, position)
//!   INDEX  (taxonomy, term)
//! ```

use super::codec::Codec;
use super::{
    Backend, BackendError, BackendKind, IndexHandle, Listing, ListingRequest, Projections,
    SQLITE_FILE, Snapshot, load_projections, search_text, write_projections,
};
use crate::ordering::TypeSort;
use crate::types::{Item, ItemMeta, SortDirection, SortField, Status};
use chrono::NaiveDateTime;
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OpenFlags, Row, params, params_from_iter};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Nominal resident cost of an open connection and its page cache.
const CONNECTION_OVERHEAD: usize = 256 * 1024;

const SCHEMA: &str = "
CREATE TABLE items (
    pos         INTEGER PRIMARY KEY,
    id          TEXT NOT NULL,
    type        TEXT NOT NULL,
    slug        TEXT NOT NULL,
    title       TEXT NOT NULL,
    title_key   TEXT NOT NULL,
    status      TEXT NOT NULL,
    date        TEXT,
    updated     TEXT,
    excerpt     TEXT NOT NULL,
    ord         INTEGER NOT NULL,
    path        TEXT NOT NULL,
    body        TEXT NOT NULL,
    terms       TEXT NOT NULL,
    fields      TEXT NOT NULL,
    url         TEXT,
    search_text TEXT NOT NULL
);
CREATE TABLE item_terms (
    item_pos INTEGER NOT NULL REFERENCES items(pos),
    taxonomy TEXT NOT NULL,
    term     TEXT NOT NULL,
    position INTEGER NOT NULL
);
";

const INDEXES: &str = "
CREATE UNIQUE INDEX items_type_slug ON items(type, slug);
CREATE UNIQUE INDEX items_path ON items(path);
CREATE INDEX items_type_status_date ON items(type, status, date);
CREATE INDEX item_terms_lookup ON item_terms(taxonomy, term);
ANALYZE;
";

const META_COLUMNS: &str =
    "id, type, slug, title, status, date, updated, excerpt, ord, path, terms, fields, url";

pub struct SqliteBackend;

impl Backend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn write(&self, snapshot: &Snapshot, dir: &Path, codec: Codec) -> Result<(), BackendError> {
        let mut conn = Connection::open(dir.join(SQLITE_FILE))?;
        conn.pragma_update_and_check(None, "journal_mode", "OFF", |row| row.get::<_, String>(0))?;
        conn.pragma_update(None, "synchronous", "OFF")?;
        conn.execute_batch(SCHEMA)?;

        let tx = conn.transaction()?;
        {
            let mut insert_item = tx.prepare(
                "INSERT INTO items (pos, id, type, slug, title, title_key, status, date, updated,
                                    excerpt, ord, path, body, terms, fields, url, search_text)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            )?;
            let mut insert_term = tx.prepare(
                "INSERT INTO item_terms (item_pos, taxonomy, term, position) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (offset, item) in snapshot.items.iter().enumerate() {
                let meta = &item.meta;
                let pos = position(offset);
                insert_item.execute(params![
                    pos,
                    meta.id,
                    meta.item_type,
                    meta.slug,
                    meta.title,
                    meta.title.to_lowercase(),
                    meta.status.as_str(),
                    meta.date.map(format_date),
                    meta.updated.map(format_date),
                    meta.excerpt,
                    meta.order,
                    meta.path,
                    item.body,
                    to_json(&meta.terms)?,
                    to_json(&meta.fields)?,
                    meta.url,
                    search_text(meta, &item.body),
                ])?;
                for (taxonomy, terms) in &meta.terms {
                    for (i, term) in terms.iter().enumerate() {
                        insert_term.execute(params![pos, taxonomy, term, i as i64])?;
                    }
                }
            }
        }
        tx.commit()?;
        conn.execute_batch(INDEXES)?;
        drop(conn);

        write_projections(snapshot, dir, codec)
    }

    fn load(&self, dir: &Path) -> Result<Box<dyn IndexHandle>, BackendError> {
        let path = dir.join(SQLITE_FILE);
        if !path.is_file() {
            return Err(BackendError::Corrupt(format!("{} is missing", path.display())));
        }
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let projections = load_projections(dir)?;
        Ok(Box::new(SqliteHandle {
            conn: Mutex::new(conn),
            projections,
        }))
    }
}

fn position(offset: usize) -> i64 {
    offset as i64 + 1
}

fn format_date(date: NaiveDateTime) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, BackendError> {
    serde_json::to_string(value).map_err(|e| BackendError::Corrupt(format!("cannot encode column: {e}")))
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| NaiveDateTime::parse_from_str(&s, DATE_FORMAT).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| conversion_error(idx, e))
}

/// Map a row selected with [`META_COLUMNS`].
fn row_to_meta(row: &Row<'_>) -> rusqlite::Result<ItemMeta> {
    let status: String = row.get(4)?;
    let status = Status::parse(&status).ok_or_else(|| {
        conversion_error(
            4,
            std::io::Error::new(std::io::ErrorKind::InvalidData, format!("bad status '{status}'")),
        )
    })?;
    Ok(ItemMeta {
        id: row.get(0)?,
        item_type: row.get(1)?,
        slug: row.get(2)?,
        title: row.get(3)?,
        status,
        date: date_column(row, 5)?,
        updated: date_column(row, 6)?,
        excerpt: row.get(7)?,
        order: row.get(8)?,
        path: row.get(9)?,
        terms: json_column(row, 10)?,
        fields: json_column(row, 11)?,
        url: row.get(12)?,
    })
}

/// Map a row selected with [`META_COLUMNS`] followed by `body`.
fn row_to_item(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        meta: row_to_meta(row)?,
        body: row.get(13)?,
    })
}

/// SQL `WHERE` clause and parameters for a listing request.
fn where_clause(request: &ListingRequest) -> (String, Vec<Value>) {
    let mut conds: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();
    if let Some(item_type) = &request.item_type {
        conds.push("type = ?".into());
        params.push(Value::Text(item_type.clone()));
    }
    if !request.statuses.is_empty() {
        let marks = vec!["?"; request.statuses.len()].join(", ");
        conds.push(format!("status IN ({marks})"));
        params.extend(
            request
                .statuses
                .iter()
                .map(|s| Value::Text(s.as_str().to_string())),
        );
    }
    if let Some((taxonomy, term)) = &request.term {
        conds.push(
            "EXISTS (SELECT 1 FROM item_terms t \
             WHERE t.item_pos = items.pos AND t.taxonomy = ? AND t.term = ?)"
                .into(),
        );
        params.push(Value::Text(taxonomy.clone()));
        params.push(Value::Text(term.clone()));
    }
    for token in &request.search {
        conds.push("instr(search_text, ?) > 0".into());
        params.push(Value::Text(token.clone()));
    }
    if conds.is_empty() {
        (String::new(), params)
    } else {
        (format!("WHERE {}", conds.join(" AND ")), params)
    }
}

/// SQL `ORDER BY` clause mirroring [`crate::ordering::compare`].
fn order_clause(sort: TypeSort) -> String {
    let dir = match sort.direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    };
    let primary = match sort.field {
        SortField::Date => format!("date IS NULL, date {dir}"),
        SortField::Title => format!("title_key {dir}"),
        SortField::Order => format!("ord {dir}"),
    };
    format!("ORDER BY {primary}, slug ASC, type ASC")
}

/// A generation opened read-only.
pub struct SqliteHandle {
    conn: Mutex<Connection>,
    projections: Projections,
}

impl SqliteHandle {
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T, BackendError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&conn)?)
    }
}

impl IndexHandle for SqliteHandle {
    fn backend(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn count(&self, item_type: &str, status: Option<Status>) -> Result<usize, BackendError> {
        let n: i64 = self.with_conn(|conn| match status {
            Some(s) => conn.query_row(
                "SELECT COUNT(*) FROM items WHERE type = ?1 AND status = ?2",
                params![item_type, s.as_str()],
                |row| row.get(0),
            ),
            None => conn.query_row(
                "SELECT COUNT(*) FROM items WHERE type = ?1",
                params![item_type],
                |row| row.get(0),
            ),
        })?;
        Ok(n as usize)
    }

    fn get_by_slug(&self, item_type: &str, slug: &str) -> Result<Option<Item>, BackendError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {META_COLUMNS}, body FROM items WHERE type = ?1 AND slug = ?2"
            ))?;
            let mut rows = stmt.query_map(params![item_type, slug], row_to_item)?;
            rows.next().transpose()
        })
    }

    fn get_by_path(&self, path: &str) -> Result<Option<Item>, BackendError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {META_COLUMNS}, body FROM items WHERE path = ?1"
            ))?;
            let mut rows = stmt.query_map(params![path], row_to_item)?;
            rows.next().transpose()
        })
    }

    fn list(&self, request: &ListingRequest) -> Result<Listing, BackendError> {
        let (filter, mut params) = where_clause(request);
        let order = order_clause(request.sort);
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM items {filter}"),
                params_from_iter(params.iter()),
                |row| row.get(0),
            )?;
            params.push(Value::Integer(
                request.limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX)),
            ));
            params.push(Value::Integer(
                i64::try_from(request.offset).unwrap_or(i64::MAX),
            ));
            let mut stmt = conn.prepare(&format!(
                "SELECT {META_COLUMNS} FROM items {filter} {order} LIMIT ? OFFSET ?"
            ))?;
            let items = stmt
                .query_map(params_from_iter(params.iter()), row_to_meta)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(Listing {
                items,
                total: total as usize,
            })
        })
    }

    fn all_raw(&self) -> Result<Vec<Item>, BackendError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {META_COLUMNS}, body FROM items ORDER BY pos"))?;
            stmt.query_map([], row_to_item)?.collect()
        })
    }

    fn projections(&self) -> &Projections {
        &self.projections
    }

    fn approx_memory_bytes(&self) -> usize {
        CONNECTION_OVERHEAD + self.projections.approx_bytes()
    }
}
