//! Gink Core - scaffolding library for gink projects
//!
//! A new project is materialized from a versioned template archive in four
//! steps: the archive is downloaded, extracted next to the target, its root
//! directory renamed to the project name, and every file rewritten so the
//! template's module path and name become the project's own.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! - **Layer 1: Core Operations** - Fetching, extraction and rewriting in [`templates`]
//! - **Layer 2: Workflow Orchestration** - [`ProductConfig`] and [`Scaffolder`]
//! - **Layer 3: CLI/TUI Interface** - Optional cliclack-based prompts (feature-gated)
//!
//! # Feature Flags
//!
//! - `tui` (default): Enables the cliclack-based TUI prompts module
//!
//! # Example Usage (without TUI)
//!
//! ```ignore
//! use gink_core::{ScaffoldOutcome, ScaffoldRequest, Scaffolder, VersionSpec};
//!
//! let scaffolder = Scaffolder::from_config(MyConfig)?;
//! let request = ScaffoldRequest::new("/work", "demo", Some("example.com/me".into()), VersionSpec::Latest);
//! match scaffolder.run(&request, &mut false).await? {
//!     ScaffoldOutcome::Created(report) => println!("{}", report.project_dir.display()),
//!     ScaffoldOutcome::Aborted => {}
//! }
//! ```

pub mod error;
pub mod product;
pub mod runtime;
pub mod scaffold;
pub mod templates;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use error::{FsOp, ScaffoldError, Stage, StageError};
pub use product::ProductConfig;
pub use scaffold::{OverwritePolicy, ScaffoldOutcome, ScaffoldReport, ScaffoldRequest, Scaffolder};
pub use templates::{ArchiveFetcher, SubstitutionRules, TemplateSource, VersionSpec};
pub use tokio_util::sync::CancellationToken;

#[cfg(feature = "tui")]
pub use tui::run;
