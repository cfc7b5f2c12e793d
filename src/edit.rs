//! Safe single-file content edits.
//!
//! Editors read a file together with its modification time, let the user
//! work on it, then save with that time as a token. [`save`] takes an
//! exclusive advisory lock on the file and compares the token with the
//! file's current mtime: if someone else saved in between, the save is
//! refused with [`EditError::Conflict`] and the file is left untouched.
//!
//! Saving does not touch the index. Call
//! [`Indexer::rebuild`](crate::indexer::Indexer::rebuild) afterwards, or let
//! `auto` mode notice the change.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditError {
    #[error("IO error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("{path} was modified by someone else since it was opened")]
    Conflict {
        path: PathBuf,
        expected: SystemTime,
        actual: SystemTime,
    },
}

/// A file opened for editing.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    pub path: PathBuf,
    pub content: String,
    /// Token to pass back to [`save`].
    pub mtime: SystemTime,
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> EditError + '_ {
    move |source| EditError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Read a file and capture its mtime token.
pub fn open_for_edit(path: impl AsRef<Path>) -> Result<EditSession, EditError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(io_err(path))?;
    let mtime = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(io_err(path))?;
    Ok(EditSession {
        path: path.to_path_buf(),
        content,
        mtime,
    })
}

/// Replace the file's contents if it still has mtime `expected`.
///
/// Returns the new mtime, the token for a follow-up save.
pub fn save(
    path: impl AsRef<Path>,
    expected: SystemTime,
    contents: &str,
) -> Result<SystemTime, EditError> {
    let path = path.as_ref();
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(io_err(path))?;
    file.lock().map_err(io_err(path))?;

    let result = write_locked(&mut file, path, expected, contents);
    if let Err(e) = file.unlock() {
        log::warn!("cannot unlock {}: {e}", path.display());
    }
    result
}

fn write_locked(
    file: &mut File,
    path: &Path,
    expected: SystemTime,
    contents: &str,
) -> Result<SystemTime, EditError> {
    let actual = file.metadata().and_then(|m| m.modified()).map_err(io_err(path))?;
    if actual != expected {
        log::info!("refusing to save {}: modified since opened", path.display());
        return Err(EditError::Conflict {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }
    file.set_len(0).map_err(io_err(path))?;
    file.seek(SeekFrom::Start(0)).map_err(io_err(path))?;
    file.write_all(contents.as_bytes()).map_err(io_err(path))?;
    file.sync_all().map_err(io_err(path))?;
    file.metadata().and_then(|m| m.modified()).map_err(io_err(path))
}
