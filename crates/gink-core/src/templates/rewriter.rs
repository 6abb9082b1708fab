//! In-place token replacement across an extracted template tree

use crate::error::{FsOp, Result, ScaffoldError};
use std::fs::OpenOptions;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// Replace every occurrence of `token` with `replacement`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionRule {
    pub token: String,
    pub replacement: String,
}

impl SubstitutionRule {
    pub fn new(token: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            replacement: replacement.into(),
        }
    }
}

/// Rules applied left to right to the whole content of each file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionRules(Vec<SubstitutionRule>);

impl SubstitutionRules {
    pub fn new(rules: Vec<SubstitutionRule>) -> Self {
        Self(rules)
    }

    /// Module path rule first, then the bare project name
    ///
    /// The module token usually contains the name token, so the order
    /// cannot be swapped.
    pub fn for_project(
        template_module: &str,
        template_name: &str,
        module_path: &str,
        project_name: &str,
    ) -> Self {
        Self(vec![
            SubstitutionRule::new(template_module, module_path),
            SubstitutionRule::new(template_name, project_name),
        ])
    }

    pub fn rules(&self) -> &[SubstitutionRule] {
        &self.0
    }

    /// Apply every rule in order
    pub fn apply(&self, content: &[u8]) -> Vec<u8> {
        self.0.iter().fold(content.to_vec(), |acc, rule| {
            replace_bytes(&acc, rule.token.as_bytes(), rule.replacement.as_bytes())
        })
    }
}

/// Module path for a new project: `<prefix>/<name>`, or just `<name>`
pub fn module_path(prefix: Option<&str>, project_name: &str) -> String {
    match prefix.map(|p| p.trim().trim_end_matches('/')) {
        Some(p) if !p.is_empty() => format!("{}/{}", p, project_name),
        _ => project_name.to_string(),
    }
}

/// Non-overlapping, left-to-right literal replacement on raw bytes
fn replace_bytes(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return haystack.to_vec();
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            out.extend_from_slice(replacement);
            i += needle.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}

/// Outcome of a tree rewrite
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    /// Files read
    pub visited: usize,
    /// Files whose content changed and was written back
    pub changed: usize,
}

/// Rewrite every file below `root` with `rules`
///
/// Entries are visited depth-first in file-name order. Directories are
/// descended; every other entry is opened read-write, so a link that cannot
/// be opened fails the walk. The first failure stops the walk; files already
/// rewritten stay rewritten.
pub fn rewrite_tree(
    root: &Path,
    rules: &SubstitutionRules,
    cancel: &CancellationToken,
) -> Result<RewriteSummary> {
    let mut summary = RewriteSummary::default();

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        if cancel.is_cancelled() {
            return Err(ScaffoldError::Cancelled);
        }

        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            ScaffoldError::fs(FsOp::Read, path, io::Error::from(e))
        })?;
        if entry.file_type().is_dir() {
            continue;
        }

        if rewrite_file(entry.path(), rules)? {
            summary.changed += 1;
        }
        summary.visited += 1;
    }

    tracing::debug!(
        visited = summary.visited,
        changed = summary.changed,
        "tree rewritten"
    );
    Ok(summary)
}

/// Returns whether the file content changed
fn rewrite_file(path: &Path, rules: &SubstitutionRules) -> Result<bool> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| ScaffoldError::fs(FsOp::Open, path, e))?;

    let mut content = Vec::new();
    file.read_to_end(&mut content)
        .map_err(|e| ScaffoldError::fs(FsOp::Read, path, e))?;

    let rewritten = rules.apply(&content);
    if rewritten == content {
        return Ok(false);
    }

    file.set_len(0)
        .and_then(|_| file.seek(SeekFrom::Start(0)))
        .and_then(|_| file.write_all(&rewritten))
        .map_err(|e| ScaffoldError::fs(FsOp::Write, path, e))?;

    tracing::trace!(path = %path.display(), "rewritten");
    Ok(true)
}
