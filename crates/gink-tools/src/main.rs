//! gink CLI - Project scaffolding from the gink template

mod logging;

use anyhow::Result;
use clap::Parser;
use gink_core::tui::{CreateArgs, RunStatus};
use gink_core::{CancellationToken, ProductConfig, ScaffoldError, StageError};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

const GOFMT_ARGS: &[&str] = &["-w", "-s", "-l", "."];

/// gink product configuration
#[derive(Clone)]
pub struct GinkConfig;

impl ProductConfig for GinkConfig {
    fn name(&self) -> &'static str {
        "gink"
    }

    fn display_name(&self) -> &'static str {
        "gink"
    }

    fn default_archive_url(&self) -> &'static str {
        "https://github.com/yeyudekuangxiang/gink/archive/refs/tags/{tag}.zip"
    }

    fn archive_url_env(&self) -> &'static str {
        "GINK_TEMPLATE_URL"
    }

    fn template_module_token(&self) -> &'static str {
        "github.com/yeyudekuangxiang/gink"
    }

    fn template_name_token(&self) -> &'static str {
        "gink"
    }

    fn post_generate_command(&self) -> Option<(&'static str, &'static [&'static str])> {
        Some(("gofmt", GOFMT_ARGS))
    }

    fn next_steps(&self, dir: &Path) -> Vec<String> {
        let mut steps = Vec::new();
        let current = std::env::current_dir().ok();

        // Step 1: cd to directory if not current
        if current.as_deref() != Some(dir) {
            steps.push(format!("cd {}", dir.display()));
        }

        steps.push("go mod tidy".to_string());
        steps.push("go run .".to_string());

        steps
    }
}

#[derive(Parser, Debug)]
#[command(name = "gink")]
#[command(about = "Create a new project from the gink template")]
#[command(version)]
pub struct Args {
    /// Project path; the last segment becomes the project name
    pub path: Option<PathBuf>,

    /// Module prefix, e.g. demo.com/user (defaults to the path below $GOPATH/src)
    #[arg(short, long)]
    pub module: Option<String>,

    /// Template version to use
    #[arg(short = 'v', long = "tag", default_value = "latest")]
    pub tag: String,

    /// Local directory with <tag>.zip template archives (for development use)
    #[arg(long = "template-dir")]
    pub template_dir: Option<PathBuf>,

    /// Download timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,

    /// Do not run gofmt on the generated project
    #[arg(long = "no-format")]
    pub no_format: bool,

    /// Overwrite an existing project without asking
    #[arg(short, long)]
    pub yes: bool,

    /// More log output (repeatable)
    #[arg(long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    fn into_create_args(self, module: Option<String>) -> CreateArgs {
        CreateArgs {
            template_dir: self.template_dir,
            path: self.path,
            module,
            version: Some(self.tag),
            timeout: Some(Duration::from_secs(self.timeout)),
            skip_format: self.no_format,
            yes: self.yes,
        }
    }
}

/// Module prefix implied by working inside `$GOPATH/src`
///
/// `gopath` may list several roots; the first one containing `cwd` wins.
fn detect_module_prefix(cwd: &Path, gopath: Option<&OsStr>) -> Option<String> {
    let gopath = gopath?;
    std::env::split_paths(gopath)
        .filter(|root| !root.as_os_str().is_empty())
        .find_map(|root| {
            let relative = cwd.strip_prefix(root.join("src")).ok()?;
            let prefix = relative.to_string_lossy().replace('\\', "/");
            (!prefix.is_empty()).then_some(prefix)
        })
}

#[tokio::main]
async fn main() -> ExitCode {
    // Ensure terminal cursor is restored on panic
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = console::Term::stderr().show_cursor();
        default_panic(info);
    }));

    // First Ctrl+C cancels the running stage, a second one exits immediately
    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        if handler_token.is_cancelled() {
            let _ = console::Term::stderr().show_cursor();
            std::process::exit(130);
        }
        handler_token.cancel();
    })
    .ok();

    let args = Args::parse();
    if let Err(e) = logging::init_logging(args.verbose, args.quiet) {
        eprintln!("{e}");
    }

    let result = run(args, cancel).await;

    // Ensure cursor is visible on normal exit
    let _ = console::Term::stderr().show_cursor();

    match result {
        Ok(RunStatus::Created) | Ok(RunStatus::Aborted) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<StageError>() {
            Some(stage_err) if matches!(stage_err.source, ScaffoldError::Cancelled) => {
                ExitCode::from(130)
            }
            // already reported by the prompts
            Some(_) => ExitCode::FAILURE,
            None => {
                use colored::Colorize;
                eprintln!("{} {:#}", "error:".red().bold(), e);
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(args: Args, cancel: CancellationToken) -> Result<RunStatus> {
    let module = match args.module.clone() {
        Some(module) => Some(module),
        None => {
            let cwd = std::env::current_dir().map_err(ScaffoldError::WorkingDirectoryUnavailable)?;
            let detected = detect_module_prefix(&cwd, std::env::var_os("GOPATH").as_deref());
            if let Some(prefix) = &detected {
                tracing::info!(%prefix, "module prefix detected from GOPATH");
            }
            detected
        }
    };

    let config = GinkConfig;
    gink_core::run(&config, args.into_create_args(module), cancel).await
}
