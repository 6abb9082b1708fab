//! Zip archive extraction onto disk

use crate::error::{FsOp, Result, ScaffoldError};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, Write};
use std::path::{Component, Path, PathBuf};
use tokio_util::sync::CancellationToken;
use zip::ZipArchive;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Directory tree produced by [`extract`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTree {
    /// Absolute location of the template root, e.g. `<dest>/gink-1.2.0`
    pub root: PathBuf,
    /// Name of the single top-level directory in the archive
    pub root_name: String,
    /// Number of directory entries created
    pub directories: usize,
    /// Number of file entries written
    pub files: usize,
}

/// Extract every entry of `archive_path` under `dest_dir`
///
/// Directory entries are created (existing ones are fine), file entries are
/// streamed to disk with their recorded permission bits. The archive must
/// contain exactly one top-level directory; it becomes [`ExtractedTree::root`].
/// Entry names are checked before anything is written, so an archive with
/// entries outside that root or outside `dest_dir` leaves the disk untouched.
///
/// A failure while writing leaves whatever was already written in place.
pub fn extract(
    archive_path: &Path,
    dest_dir: &Path,
    cancel: &CancellationToken,
) -> Result<ExtractedTree> {
    let file =
        File::open(archive_path).map_err(|e| ScaffoldError::fs(FsOp::Open, archive_path, e))?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|e| corrupt(archive_path, e.to_string()))?;

    let (root_name, planned) = plan_entries(&mut archive, archive_path)?;

    let mut directories = 0;
    let mut files = 0;
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];

    for PlannedEntry { index, relative } in planned {
        if cancel.is_cancelled() {
            return Err(ScaffoldError::Cancelled);
        }

        let mut entry = archive
            .by_index(index)
            .map_err(|e| corrupt(archive_path, e.to_string()))?;
        let out_path = dest_dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .map_err(|e| ScaffoldError::fs(FsOp::CreateDir, &out_path, e))?;
            directories += 1;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ScaffoldError::fs(FsOp::CreateDir, parent, e))?;
        }

        let mut out_file = File::create(&out_path)
            .map_err(|e| ScaffoldError::fs(FsOp::CreateFile, &out_path, e))?;
        loop {
            let n = entry.read(&mut buf).map_err(|e| {
                corrupt(archive_path, format!("failed to read '{}': {}", entry.name(), e))
            })?;
            if n == 0 {
                break;
            }
            out_file
                .write_all(&buf[..n])
                .map_err(|e| ScaffoldError::fs(FsOp::Write, &out_path, e))?;
        }

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o7777))
                .map_err(|e| ScaffoldError::fs(FsOp::SetPermissions, &out_path, e))?;
        }

        files += 1;
    }

    tracing::debug!(root = %root_name, directories, files, "archive extracted");

    Ok(ExtractedTree {
        root: dest_dir.join(&root_name),
        root_name,
        directories,
        files,
    })
}

struct PlannedEntry {
    index: usize,
    relative: PathBuf,
}

/// Resolve every entry name and find the single root, without writing
fn plan_entries<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    archive_path: &Path,
) -> Result<(String, Vec<PlannedEntry>)> {
    let mut roots = BTreeSet::new();
    let mut planned = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let entry = archive
            .by_index_raw(index)
            .map_err(|e| corrupt(archive_path, e.to_string()))?;
        let relative = entry.enclosed_name().ok_or_else(|| {
            corrupt(
                archive_path,
                format!("entry '{}' points outside the destination", entry.name()),
            )
        })?;

        let mut components = relative.components().filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        });
        let Some(first) = components.next() else {
            continue;
        };
        if !entry.is_dir() && components.next().is_none() {
            return Err(corrupt(
                archive_path,
                format!("file '{}' sits outside a root directory", first),
            ));
        }
        roots.insert(first);
        planned.push(PlannedEntry { index, relative });
    }

    let root_name = match roots.len() {
        1 => roots.into_iter().next().unwrap_or_default(),
        0 => return Err(corrupt(archive_path, "archive is empty".to_string())),
        n => {
            return Err(corrupt(
                archive_path,
                format!("expected one root directory, found {}", n),
            ))
        }
    };
    Ok((root_name, planned))
}

fn corrupt(path: &Path, reason: String) -> ScaffoldError {
    ScaffoldError::ArchiveCorrupt {
        path: path.to_path_buf(),
        reason,
    }
}
