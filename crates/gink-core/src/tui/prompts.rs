//! Charm-style CLI prompts using cliclack

use crate::error::{ScaffoldError, Stage, StageError};
use crate::product::ProductConfig;
use crate::runtime::ToolManager;
use crate::scaffold::{ScaffoldOutcome, ScaffoldReport, ScaffoldRequest, Scaffolder};
use crate::templates::{ArchiveFetcher, TemplateSource, VersionSpec};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// CLI arguments for the create command
#[derive(Debug, Clone, Default)]
pub struct CreateArgs {
    /// Local directory holding `<tag>.zip` archives instead of the remote origin
    pub template_dir: Option<PathBuf>,

    /// Project path; the last segment is the project name
    pub path: Option<PathBuf>,

    /// Module prefix placed before the project name
    pub module: Option<String>,

    /// Template version (`latest` when unset)
    pub version: Option<String>,

    /// Download timeout, overriding the product default
    pub timeout: Option<Duration>,

    /// Skip the post-generation formatter
    pub skip_format: bool,

    /// Auto-confirm all prompts (non-interactive mode)
    pub yes: bool,
}

/// How an interactive run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Created,
    Aborted,
}

/// Run the CLI with interactive prompts
///
/// Failures are printed before being returned.
pub async fn run<C: ProductConfig>(
    config: &C,
    args: CreateArgs,
    cancel: CancellationToken,
) -> Result<RunStatus> {
    cliclack::intro(config.display_name())?;

    // Step 1: Resolve the request
    let request = build_request(&args)?;
    if !request.version.is_semver() {
        cliclack::log::warning(format!(
            "'{}' is not a semantic version, fetching tag '{}' anyway",
            request.version,
            request.version.tag()
        ))?;
    }
    cliclack::log::info(format!(
        "Creating '{}' (module {}) in {}",
        request.project_name,
        request.module_path(),
        request.destination.display()
    ))?;

    // Step 2: Setup archive fetcher
    let fetcher = setup_fetcher(config, &args)?;
    let scaffolder = Scaffolder::new(config.clone(), fetcher)
        .with_cancellation(cancel)
        .on_stage(report_stage);

    // Step 3: Run the pipeline, asking before deleting an existing project
    let yes = args.yes;
    let mut policy = |path: &Path| confirm_overwrite(path, yes);
    let outcome = match scaffolder.run(&request, &mut policy).await {
        Ok(outcome) => outcome,
        Err(err) => return Err(report_failure(&request, err)),
    };

    let report = match outcome {
        ScaffoldOutcome::Created(report) => report,
        ScaffoldOutcome::Aborted => {
            cliclack::outro_cancel("Setup cancelled.")?;
            return Ok(RunStatus::Aborted);
        }
    };
    print_summary(&request, &report)?;

    // Step 4: Format the generated sources
    if !args.skip_format {
        format_project(config, &report.project_dir).await?;
    }

    // Step 5: Show next steps
    print_next_steps(config, &report.project_dir)?;

    Ok(RunStatus::Created)
}

fn build_request(args: &CreateArgs) -> Result<ScaffoldRequest> {
    let path = match &args.path {
        Some(path) => path.clone(),
        None => {
            let input: String = cliclack::input("Project path")
                .placeholder("./my-app")
                .validate(|input: &String| {
                    if input.trim().is_empty() {
                        Err("Please enter a project path")
                    } else {
                        Ok(())
                    }
                })
                .interact()?;
            PathBuf::from(input.trim())
        }
    };

    let version = args
        .version
        .as_deref()
        .map(VersionSpec::parse)
        .unwrap_or_default();

    Ok(ScaffoldRequest::for_path(&path, args.module.clone(), version)?)
}

fn setup_fetcher<C: ProductConfig>(config: &C, args: &CreateArgs) -> Result<ArchiveFetcher> {
    let timeout = args.timeout.unwrap_or_else(|| config.fetch_timeout());
    let source = match &args.template_dir {
        Some(path) => {
            cliclack::log::info(format!("Using local templates from {}", path.display()))?;
            TemplateSource::local(path.clone())
        }
        None => TemplateSource::from_config(config)?,
    };

    Ok(ArchiveFetcher::new(source, config.user_agent(), timeout)?)
}

fn confirm_overwrite(path: &Path, yes: bool) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let _ = cliclack::log::warning(format!("Project '{}' already exists", name));

    // Auto-confirm with --yes flag
    if yes {
        let _ = cliclack::log::info("Overwriting (--yes mode)");
        return true;
    }

    cliclack::confirm(format!("Delete '{}' and continue?", path.display()))
        .initial_value(false)
        .interact()
        .unwrap_or(false)
}

fn report_stage(stage: Stage) {
    let message = match stage {
        Stage::RemoveExisting => "Removing existing project...",
        Stage::Fetch => "Downloading template...",
        Stage::Extract => "Extracting template...",
        Stage::Rewrite => "Replacing package names...",
        Stage::Start | Stage::Validate | Stage::CheckExisting | Stage::Rename => return,
    };
    let _ = cliclack::log::step(message);
}

fn report_failure(request: &ScaffoldRequest, err: StageError) -> anyhow::Error {
    let _ = cliclack::log::error(err.report());
    if err.stage == Stage::Extract {
        let _ = cliclack::log::remark(format!(
            "Partially extracted files under {} can be deleted",
            request.destination.display()
        ));
    }
    if matches!(err.source, ScaffoldError::Cancelled) {
        let _ = cliclack::outro_cancel("Cancelled.");
    } else {
        let _ = cliclack::outro_cancel(format!(
            "Failed to create project '{}'",
            request.project_name
        ));
    }
    err.into()
}

fn print_summary(request: &ScaffoldRequest, report: &ScaffoldReport) -> Result<()> {
    cliclack::log::success(format!(
        "Created project '{}' ({} files, {} rewritten)",
        request.project_name, report.files, report.rewritten
    ))?;
    Ok(())
}

async fn format_project<C: ProductConfig>(config: &C, project_dir: &Path) -> Result<()> {
    let Some(tool) = ToolManager::for_product(config) else {
        return Ok(());
    };

    if !tool.is_installed() {
        cliclack::log::remark(format!(
            "{} not found, skipping formatting",
            tool.config().name
        ))?;
        return Ok(());
    }

    let spinner = cliclack::spinner();
    spinner.start(format!("Running {}...", tool.command_line()));
    match tool.run_in(project_dir).await {
        Ok(()) => spinner.stop("Sources formatted"),
        Err(e) => {
            spinner.stop("Formatting skipped");
            cliclack::log::warning(format!("{}", e))?;
        }
    }
    Ok(())
}

fn print_next_steps<C: ProductConfig>(config: &C, project_dir: &Path) -> Result<()> {
    let steps = config.next_steps(project_dir);

    println!();
    println!("  Next steps");
    println!();

    for (i, step) in steps.iter().enumerate() {
        println!("  {}.  {}", i + 1, console::style(step).cyan());
    }

    cliclack::outro("Happy coding!")?;

    Ok(())
}
