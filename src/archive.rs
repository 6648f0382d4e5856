//! Selective zip archiving of the served directory
//!
//! Walks the root independently of the listing, adds every regular file that
//! the client did not exclude under its POSIX path relative to the root, and
//! hands the finished archive to an [`UploadSink`].
//!
//! The archive is buffered in memory before delivery. Streaming it straight
//! into the sink would bound memory for very large trees.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::fs_utils::join_posix;
use crate::upload::{UploadSink, UploadTarget};
use crate::walk::{read_entries, EntryKind};
use crate::{DirshareError, Result};

/// Paths to leave out of an archive, relative to the root with `/` separators
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludedPaths(HashSet<String>);

impl ExcludedPaths {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            paths
                .into_iter()
                .map(|p| normalize_excluded(p.as_ref()))
                .filter(|p| !p.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, relative: &str) -> bool {
        self.0.contains(relative)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// `.\contracts\\a.sol` and `/contracts/a.sol` both match `contracts/a.sol`.
fn normalize_excluded(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// A finished archive and what went into it
#[derive(Debug, Default)]
pub struct ArchiveOutcome {
    pub bytes: Vec<u8>,
    /// Archive entry names in the order they were written
    pub entries: Vec<String>,
    /// Files that could not be read for a reason other than vanishing
    pub warnings: Vec<String>,
}

/// Result of [`archive_and_deliver`], ready to be turned into responses
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub success: bool,
    pub warnings: Vec<String>,
    /// Set when the archive could not be produced at all
    pub archive_error: Option<String>,
}

/// Build a deflate-compressed zip of every file under `root` not in `excluded`.
///
/// Files that disappear between enumeration and read are skipped silently.
/// Files that cannot be opened for any other reason are skipped and reported
/// in [`ArchiveOutcome::warnings`]. Errors walking the tree or writing the
/// archive abort the whole operation.
pub fn build_archive(root: &Path, excluded: &ExcludedPaths) -> Result<ArchiveOutcome> {
    let mut files = Vec::new();
    collect_files(root, root, "", &mut files)?;

    let mut outcome = ArchiveOutcome::default();
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));

    for (relative, absolute, len) in files {
        if excluded.contains(&relative) {
            tracing::debug!("Excluding {}", relative);
            continue;
        }

        let mut file = match File::open(&absolute) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("{} vanished before it could be archived", relative);
                continue;
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {}", relative, e);
                outcome.warnings.push(format!("{}: {}", relative, e));
                continue;
            }
        };

        zip.start_file(relative.as_str(), options.large_file(len >= u32::MAX as u64))?;
        io::copy(&mut file, &mut zip)?;
        outcome.entries.push(relative);
    }

    outcome.bytes = zip.finish()?.into_inner();
    Ok(outcome)
}

fn collect_files(
    dir: &Path,
    root: &Path,
    prefix: &str,
    out: &mut Vec<(String, PathBuf, u64)>,
) -> Result<()> {
    for entry in read_entries(dir, root)? {
        let relative = join_posix(prefix, &entry.name);
        match entry.kind {
            EntryKind::Dir => collect_files(&entry.path, root, &relative, out)?,
            EntryKind::File => out.push((relative, entry.path, entry.metadata.len())),
        }
    }
    Ok(())
}

/// Archive `root` minus `excluded` and deliver it to `target` through `sink`.
///
/// Never fails: archive and upload errors are folded into the report.
pub async fn archive_and_deliver(
    root: PathBuf,
    excluded: ExcludedPaths,
    target: &UploadTarget,
    sink: &dyn UploadSink,
) -> DeliveryReport {
    let built = tokio::task::spawn_blocking(move || build_archive(&root, &excluded))
        .await
        .unwrap_or_else(|e| {
            Err(DirshareError::Archive {
                message: format!("archive task failed: {}", e),
            })
        });

    let outcome = match built {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Failed to build archive: {}", e);
            return DeliveryReport {
                success: false,
                warnings: Vec::new(),
                archive_error: Some(e.to_string()),
            };
        }
    };

    tracing::info!(
        "Built archive with {} files ({} bytes) for {}",
        outcome.entries.len(),
        outcome.bytes.len(),
        target.redacted()
    );

    let success = match sink.deliver(outcome.bytes, target).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Error uploading archive: {}", e);
            false
        }
    };

    DeliveryReport {
        success,
        warnings: outcome.warnings,
        archive_error: None,
    }
}
