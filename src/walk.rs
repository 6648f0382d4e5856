//! Directory entry enumeration shared by the tree builder and the archiver
//!
//! Both traversals see the same view of the root: `node_modules` is never
//! entered, and symlinks only count when they resolve to a file inside the
//! root.

use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use crate::fs_utils::normalize_path;

/// Directory name skipped by every traversal, regardless of caller input.
pub const SKIP_DIR_NAME: &str = "node_modules";

/// Kind of a directory entry that survived filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntryKind {
    File,
    Dir,
}

/// A single entry inside a walked directory
#[derive(Debug)]
pub struct WalkEntry {
    pub name: String,
    pub path: PathBuf,
    pub kind: EntryKind,
    pub metadata: Metadata,
}

/// List the entries of `dir` in filesystem enumeration order.
///
/// `root` must be the canonical served root. Entries that are skipped:
/// - anything named [`SKIP_DIR_NAME`]
/// - symlinks that are broken, resolve outside `root`, or point at a directory
/// - special files (sockets, fifos, devices)
///
/// Errors from `read_dir` or from stat'ing a listed entry are returned as-is.
pub fn read_entries(dir: &Path, root: &Path) -> io::Result<Vec<WalkEntry>> {
    let mut entries = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == SKIP_DIR_NAME {
            continue;
        }

        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_symlink() {
            if let Some(metadata) = resolve_symlink(&path, root) {
                entries.push(WalkEntry {
                    name,
                    path,
                    kind: EntryKind::File,
                    metadata,
                });
            }
            continue;
        }

        let metadata = entry.metadata()?;
        let kind = if metadata.is_dir() {
            EntryKind::Dir
        } else if metadata.is_file() {
            EntryKind::File
        } else {
            tracing::debug!("Skipping special file {}", path.display());
            continue;
        };

        entries.push(WalkEntry {
            name,
            path,
            kind,
            metadata,
        });
    }

    Ok(entries)
}

/// Metadata of the symlink target when it is a regular file inside `root`.
fn resolve_symlink(link: &Path, root: &Path) -> Option<Metadata> {
    let target = match link.canonicalize() {
        Ok(target) => normalize_path(&target),
        Err(e) => {
            tracing::debug!("Skipping broken symlink {}: {}", link.display(), e);
            return None;
        }
    };

    if !target.starts_with(root) {
        tracing::warn!(
            "Skipping symlink {} that escapes the served directory",
            link.display()
        );
        return None;
    }

    match fs::metadata(&target) {
        Ok(metadata) if metadata.is_file() => Some(metadata),
        Ok(_) => {
            tracing::debug!("Skipping directory symlink {}", link.display());
            None
        }
        Err(e) => {
            tracing::debug!("Skipping unreadable symlink {}: {}", link.display(), e);
            None
        }
    }
}
