//! End-to-end scaffold operation
//!
//! One [`Scaffolder::run`] call takes a [`ScaffoldRequest`] through
//! check-existing, fetch, extract, rename and rewrite. Every stage runs to
//! completion before the next starts; the first failure ends the run and is
//! returned as a [`StageError`] naming the stage.

use crate::error::{FsOp, Result, ScaffoldError, Stage, StageError};
use crate::product::ProductConfig;
use crate::templates::extractor::{self, ExtractedTree};
use crate::templates::fetcher::{ArchiveFetcher, TemplateSource};
use crate::templates::rewriter::{self, RewriteSummary, SubstitutionRules};
use crate::templates::version::VersionSpec;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio_util::sync::CancellationToken;

/// Inputs of one scaffold operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldRequest {
    /// Directory the project is created in
    pub destination: PathBuf,
    /// New project's directory name and identifier
    pub project_name: String,
    /// Prefix of the module path, e.g. `github.com/user`
    pub module_prefix: Option<String>,
    pub version: VersionSpec,
}

impl ScaffoldRequest {
    pub fn new(
        destination: impl Into<PathBuf>,
        project_name: impl Into<String>,
        module_prefix: Option<String>,
        version: VersionSpec,
    ) -> Self {
        Self {
            destination: destination.into(),
            project_name: project_name.into(),
            module_prefix: module_prefix.filter(|m| !m.trim().trim_matches('/').is_empty()),
            version,
        }
    }

    /// Split a target path into destination and project name
    ///
    /// Relative paths are resolved against the current directory.
    pub fn for_path(
        path: &Path,
        module_prefix: Option<String>,
        version: VersionSpec,
    ) -> Result<Self> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ScaffoldError::WorkingDirectoryUnavailable)?
                .join(path)
        };

        let project_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ScaffoldError::InvalidRequest(format!(
                    "'{}' does not end in a project name",
                    path.display()
                ))
            })?;
        let destination = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self::new(destination, project_name, module_prefix, version))
    }

    /// Final location of the project
    pub fn project_dir(&self) -> PathBuf {
        self.destination.join(&self.project_name)
    }

    /// Module path substituted for the template's own module path
    pub fn module_path(&self) -> String {
        rewriter::module_path(self.module_prefix.as_deref(), &self.project_name)
    }

    /// Check the name can serve both as a directory and as a replacement token
    pub fn validate(&self, template_name_token: &str) -> Result<()> {
        let name = self.project_name.as_str();
        if name.trim().is_empty() {
            return Err(ScaffoldError::InvalidRequest(
                "project name is empty".to_string(),
            ));
        }
        if name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(ScaffoldError::InvalidRequest(format!(
                "project name '{}' is not a plain directory name",
                name
            )));
        }
        if !template_name_token.is_empty() && name.contains(template_name_token) {
            return Err(ScaffoldError::InvalidRequest(format!(
                "project name '{}' contains the template name '{}'",
                name, template_name_token
            )));
        }
        let module = self.module_path();
        if !template_name_token.is_empty() && module.contains(template_name_token) {
            return Err(ScaffoldError::InvalidRequest(format!(
                "module path '{}' contains the template name '{}'",
                module, template_name_token
            )));
        }
        Ok(())
    }
}

/// Decides whether an existing project directory may be deleted
pub trait OverwritePolicy {
    fn approve_overwrite(&mut self, path: &Path) -> bool;
}

impl<F> OverwritePolicy for F
where
    F: FnMut(&Path) -> bool,
{
    fn approve_overwrite(&mut self, path: &Path) -> bool {
        self(path)
    }
}

impl OverwritePolicy for bool {
    fn approve_overwrite(&mut self, _path: &Path) -> bool {
        *self
    }
}

/// What a successful scaffold produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldReport {
    pub project_dir: PathBuf,
    pub module_path: String,
    /// Whether an existing directory was deleted first
    pub replaced_existing: bool,
    pub directories: usize,
    pub files: usize,
    pub rewritten: usize,
}

/// Terminal state of a scaffold operation that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaffoldOutcome {
    Created(ScaffoldReport),
    /// The target existed and overwriting was declined
    Aborted,
}

type StageHook = Box<dyn Fn(Stage) + Send + Sync>;

/// Runs scaffold operations for one product
pub struct Scaffolder<C: ProductConfig> {
    config: C,
    fetcher: ArchiveFetcher,
    cancel: CancellationToken,
    on_stage: Option<StageHook>,
}

impl<C: ProductConfig> Scaffolder<C> {
    pub fn new(config: C, fetcher: ArchiveFetcher) -> Self {
        Self {
            config,
            fetcher,
            cancel: CancellationToken::new(),
            on_stage: None,
        }
    }

    /// Create a scaffolder downloading from the product's archive origin
    pub fn from_config(config: C) -> Result<Self> {
        let fetcher = ArchiveFetcher::from_config(&config)?;
        Ok(Self::new(config, fetcher))
    }

    /// Share a cancellation token with the fetcher and the filesystem stages
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.fetcher = self.fetcher.with_cancellation(token.clone());
        self.cancel = token;
        self
    }

    /// Called each time a stage starts
    pub fn on_stage(mut self, hook: impl Fn(Stage) + Send + Sync + 'static) -> Self {
        self.on_stage = Some(Box::new(hook));
        self
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    /// Run one scaffold operation
    pub async fn run<P: OverwritePolicy>(
        &self,
        request: &ScaffoldRequest,
        policy: &mut P,
    ) -> Result<ScaffoldOutcome, StageError> {
        if self.cancel.is_cancelled() {
            return Err(StageError::new(Stage::Start, ScaffoldError::Cancelled));
        }

        self.enter(Stage::Validate)?;
        request
            .validate(self.config.template_name_token())
            .map_err(at(Stage::Validate))?;

        let project_dir = request.project_dir();
        let module_path = request.module_path();

        self.enter(Stage::CheckExisting)?;
        let replaced_existing = match fs::symlink_metadata(&project_dir).await {
            Ok(meta) => {
                if !policy.approve_overwrite(&project_dir) {
                    tracing::info!(path = %project_dir.display(), "overwrite declined");
                    return Ok(ScaffoldOutcome::Aborted);
                }
                self.enter(Stage::RemoveExisting)?;
                remove_path(&project_dir, meta.is_dir())
                    .await
                    .map_err(at(Stage::RemoveExisting))?;
                tracing::info!(path = %project_dir.display(), "removed existing project");
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                return Err(StageError::new(
                    Stage::CheckExisting,
                    ScaffoldError::fs(FsOp::Stat, &project_dir, e),
                ))
            }
        };

        self.enter(Stage::Fetch)?;
        let archive = self
            .fetcher
            .fetch(&request.version, &request.destination)
            .await
            .map_err(at(Stage::Fetch))?;

        self.enter(Stage::Extract)?;
        let extracted = self.extract(&archive, &request.destination).await;
        if !self.is_origin_archive(&archive) {
            remove_archive(&archive).await;
        }
        let tree = extracted.map_err(at(Stage::Extract))?;

        self.enter(Stage::Rename)?;
        rename_root(&tree, &project_dir)
            .await
            .map_err(at(Stage::Rename))?;

        self.enter(Stage::Rewrite)?;
        let rules = SubstitutionRules::for_project(
            self.config.template_module_token(),
            self.config.template_name_token(),
            &module_path,
            &request.project_name,
        );
        let summary = self
            .rewrite(&project_dir, rules)
            .await
            .map_err(at(Stage::Rewrite))?;

        tracing::info!(
            path = %project_dir.display(),
            module = %module_path,
            files = tree.files,
            rewritten = summary.changed,
            "project created"
        );

        Ok(ScaffoldOutcome::Created(ScaffoldReport {
            project_dir,
            module_path,
            replaced_existing,
            directories: tree.directories,
            files: tree.files,
            rewritten: summary.changed,
        }))
    }

    /// Report the stage and stop if the operation was cancelled
    fn enter(&self, stage: Stage) -> Result<(), StageError> {
        if self.cancel.is_cancelled() {
            return Err(StageError::new(stage, ScaffoldError::Cancelled));
        }
        tracing::debug!(%stage, "stage started");
        if let Some(hook) = &self.on_stage {
            hook(stage);
        }
        Ok(())
    }

    /// A local source may live in the destination itself; never delete it
    fn is_origin_archive(&self, archive: &Path) -> bool {
        match self.fetcher.source() {
            TemplateSource::Local(dir) => archive.parent() == Some(dir.as_path()),
            TemplateSource::Remote(_) => false,
        }
    }

    async fn extract(&self, archive: &Path, dest: &Path) -> Result<ExtractedTree> {
        let archive = archive.to_path_buf();
        let dest = dest.to_path_buf();
        let cancel = self.cancel.clone();
        tokio::task::spawn_blocking(move || extractor::extract(&archive, &dest, &cancel)).await?
    }

    async fn rewrite(&self, root: &Path, rules: SubstitutionRules) -> Result<RewriteSummary> {
        let root = root.to_path_buf();
        let cancel = self.cancel.clone();
        tokio::task::spawn_blocking(move || rewriter::rewrite_tree(&root, &rules, &cancel)).await?
    }
}

fn at(stage: Stage) -> impl FnOnce(ScaffoldError) -> StageError {
    move |source| StageError::new(stage, source)
}

async fn remove_path(path: &Path, is_dir: bool) -> Result<()> {
    let removed = if is_dir {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };
    removed.map_err(|e| ScaffoldError::fs(FsOp::Remove, path, e))
}

/// Best-effort: the archive is only scratch once extraction has run
async fn remove_archive(archive: &Path) {
    if let Err(e) = fs::remove_file(archive).await {
        tracing::warn!(path = %archive.display(), error = %e, "failed to remove template archive");
    }
}

async fn rename_root(tree: &ExtractedTree, project_dir: &Path) -> Result<()> {
    if tree.root == project_dir {
        return Ok(());
    }
    if fs::symlink_metadata(project_dir).await.is_ok() {
        return Err(ScaffoldError::fs(
            FsOp::Rename,
            &tree.root,
            io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", project_dir.display()),
            ),
        ));
    }
    fs::rename(&tree.root, project_dir)
        .await
        .map_err(|e| ScaffoldError::fs(FsOp::Rename, &tree.root, e))
}
