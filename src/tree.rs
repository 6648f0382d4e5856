//! Selection-annotated directory listing
//!
//! Builds the hierarchical tree sent in `folderStructure` responses. Every
//! file carries a `checked` flag from the injected [`SelectionPolicy`], and
//! every directory derives its own flags from the files directly inside it.
//!
//! The tree is a plain value: built from scratch per request, serialized, and
//! dropped. Paths are relative to a synthetic wrapper node, so the real root
//! directory appears as `<rootName>/` and its files as `<rootName>/<file>`.

use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use crate::fs_utils::{join_posix, root_name};
use crate::walk::{read_entries, EntryKind};
use crate::Result;

/// Extension selected by default when no other is configured.
pub const DEFAULT_SELECTED_EXTENSION: &str = ".sol";

/// Decides which files are checked by default in a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Select files whose name ends with the given suffix (e.g. `.sol`)
    Extension(String),
    /// Select nothing
    None,
}

impl SelectionPolicy {
    /// Build an extension policy, accepting `sol` as well as `.sol`.
    pub fn extension(ext: &str) -> Self {
        if ext.is_empty() {
            Self::None
        } else if ext.starts_with('.') {
            Self::Extension(ext.to_string())
        } else {
            Self::Extension(format!(".{}", ext))
        }
    }

    /// Check if a file with this name is selected by default
    pub fn is_default_selected(&self, file_name: &str) -> bool {
        match self {
            Self::Extension(suffix) => file_name.ends_with(suffix.as_str()),
            Self::None => false,
        }
    }
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::Extension(DEFAULT_SELECTED_EXTENSION.to_string())
    }
}

/// Tri-state selection of a directory, as the pair of wire flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionState {
    pub selected: bool,
    pub has_selected_descendant: bool,
}

impl SelectionState {
    /// Derive directory flags from the counts of its direct files.
    pub fn from_counts(selected_count: usize, total_files: usize) -> Self {
        if selected_count == 0 {
            Self {
                selected: false,
                has_selected_descendant: false,
            }
        } else if selected_count == total_files {
            Self {
                selected: true,
                has_selected_descendant: true,
            }
        } else {
            Self {
                selected: false,
                has_selected_descendant: true,
            }
        }
    }
}

/// File leaf ("blob") in the listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub name: String,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    #[serde(rename = "mtimeMs")]
    pub modified_at_ms: f64,
    #[serde(rename = "checked")]
    pub selected: bool,
}

/// Directory node in the listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryNode {
    pub name: String,
    pub path: String,
    #[serde(rename = "tree")]
    pub children: Vec<DirectoryNode>,
    #[serde(rename = "isChildCheck")]
    pub has_selected_descendant: bool,
    #[serde(rename = "checked")]
    pub selected: bool,
    #[serde(rename = "blobs")]
    pub files: Vec<FileEntry>,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    #[serde(rename = "mtimeMs")]
    pub modified_at_ms: f64,
}

impl DirectoryNode {
    /// Flags of this node as a [`SelectionState`]
    pub fn selection(&self) -> SelectionState {
        SelectionState {
            selected: self.selected,
            has_selected_descendant: self.has_selected_descendant,
        }
    }

    /// Number of selected files directly inside this directory
    pub fn selected_count(&self) -> usize {
        self.files.iter().filter(|f| f.selected).count()
    }

    /// All files in this subtree, depth-first, directories before their files
    pub fn flatten_files(&self) -> Vec<&FileEntry> {
        let mut out = Vec::new();
        self.collect_files(&mut out);
        out
    }

    fn collect_files<'a>(&'a self, out: &mut Vec<&'a FileEntry>) {
        for child in &self.children {
            child.collect_files(out);
        }
        out.extend(self.files.iter());
    }

    /// Every directory in this subtree including `self`
    pub fn iter_dirs(&self) -> Vec<&DirectoryNode> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.iter_dirs());
        }
        out
    }
}

/// Build the full listing for `root`, wrapped in the synthetic root node.
///
/// `root` must already be canonical (see [`crate::fs_utils::resolve_root`]).
/// Any filesystem error aborts the listing; no partial tree is returned.
pub fn build_tree(root: &Path, policy: &SelectionPolicy) -> Result<DirectoryNode> {
    let name = root_name(root);
    let root_path = format!("{}/", name);
    let inner = build_dir(root, root, name, root_path, policy)?;

    Ok(DirectoryNode {
        name: String::new(),
        path: String::new(),
        has_selected_descendant: inner.has_selected_descendant,
        selected: inner.selected,
        modified_at_ms: inner.modified_at_ms,
        children: vec![inner],
        files: Vec::new(),
        size_bytes: 0,
    })
}

fn build_dir(
    dir: &Path,
    root: &Path,
    name: String,
    path: String,
    policy: &SelectionPolicy,
) -> Result<DirectoryNode> {
    let modified_at_ms = modified_ms(&std::fs::metadata(dir)?);
    let mut children = Vec::new();
    let mut files = Vec::new();

    // A filesystem root has an empty name; its entries carry no prefix.
    let prefix = path.trim_start_matches('/');
    for entry in read_entries(dir, root)? {
        let entry_path = join_posix(prefix, &entry.name);
        match entry.kind {
            EntryKind::Dir => {
                let child_path = format!("{}/", entry_path);
                children.push(build_dir(&entry.path, root, entry.name, child_path, policy)?);
            }
            EntryKind::File => {
                files.push(FileEntry {
                    selected: policy.is_default_selected(&entry.name),
                    path: entry_path,
                    name: entry.name,
                    size_bytes: entry.metadata.len(),
                    modified_at_ms: modified_ms(&entry.metadata),
                });
            }
        }
    }

    let selected_count = files.iter().filter(|f| f.selected).count();
    let state = SelectionState::from_counts(selected_count, files.len());

    Ok(DirectoryNode {
        name,
        path,
        children,
        has_selected_descendant: state.has_selected_descendant,
        selected: state.selected,
        files,
        size_bytes: 0,
        modified_at_ms,
    })
}

fn modified_ms(metadata: &std::fs::Metadata) -> f64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}
