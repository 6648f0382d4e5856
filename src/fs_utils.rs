//! Root directory resolution and cross-platform path helpers
//!
//! This module provides helpers that work correctly on both Unix and Windows:
//! - `resolve_root`: Canonicalizes the served directory once at startup
//! - `normalize_path`: Strips Windows `\\?\` prefix from canonicalized paths
//! - `join_posix`: Builds `/`-separated wire paths

use std::path::{Path, PathBuf};

use crate::{DirshareError, Result};

/// Resolve the directory to serve into an absolute, canonical path.
///
/// The returned path is the traversal boundary for every listing and
/// archive: walks only ever descend from it.
///
/// # Errors
///
/// - `DirectoryNotFound` if nothing exists at `dir`
/// - `NotADirectory` if `dir` is a regular file
/// - `Io` if canonicalization fails for another reason
///
/// # Examples
///
/// ```
/// use dirshare::fs_utils::resolve_root;
///
/// let root = resolve_root(std::env::temp_dir()).unwrap();
/// assert!(root.is_absolute());
/// ```
pub fn resolve_root(dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Err(DirshareError::DirectoryNotFound {
            path: dir.display().to_string(),
        });
    }
    let canonical = normalize_path(&dir.canonicalize()?);
    if !canonical.is_dir() {
        return Err(DirshareError::NotADirectory {
            path: canonical.display().to_string(),
        });
    }
    Ok(canonical)
}

/// Base name of the served root, or an empty string for a filesystem root.
pub fn root_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Normalize Windows paths by removing the `\\?\` prefix if present.
///
/// On Windows, `Path::canonicalize()` returns paths with the extended-length path prefix
/// (`\\?\C:\...`), which breaks `starts_with` checks against user-supplied paths
/// and confuses log output.
///
/// This function strips the prefix on Windows while being a no-op on Unix.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use dirshare::fs_utils::normalize_path;
///
/// // On Unix, path is returned unchanged
/// let path = PathBuf::from("/home/user/project");
/// assert_eq!(normalize_path(&path), path);
/// ```
pub fn normalize_path(path: &Path) -> PathBuf {
    #[cfg(windows)]
    {
        let s = path.to_string_lossy();
        // Handle UNC paths: \\?\UNC\server\share -> \\server\share
        if let Some(stripped) = s.strip_prefix(r"\\?\UNC\") {
            return PathBuf::from(format!(r"\\{}", stripped));
        }
        // Handle local paths: \\?\C:\path -> C:\path
        if let Some(stripped) = s.strip_prefix(r"\\?\") {
            return PathBuf::from(stripped);
        }
    }
    path.to_path_buf()
}

/// Join a POSIX prefix and a name with exactly one `/` between them.
pub fn join_posix(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else if prefix.ends_with('/') {
        format!("{}{}", prefix, name)
    } else {
        format!("{}/{}", prefix, name)
    }
}
