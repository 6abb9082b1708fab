//! External tool invocation after a project is generated
//!
//! The generated project is already complete when these tools run; callers
//! treat any failure here as a warning.

use crate::product::ProductConfig;
use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

/// Timeout for a tool run (30 seconds)
const RUN_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a CLI tool
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Name of the tool binary (e.g., "gofmt")
    pub name: &'static str,
    /// Arguments passed on every run
    pub args: &'static [&'static str],
}

/// Manager for checking and running CLI tools
pub struct ToolManager {
    config: ToolConfig,
}

impl ToolManager {
    /// Create a new tool manager with the given configuration
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }

    /// Tool configured by the product, if it has one
    pub fn for_product<C: ProductConfig>(product: &C) -> Option<Self> {
        product
            .post_generate_command()
            .map(|(name, args)| Self::new(ToolConfig { name, args }))
    }

    /// Get the tool configuration
    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    /// Full command line, for display
    pub fn command_line(&self) -> String {
        std::iter::once(self.config.name)
            .chain(self.config.args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Check if the tool is installed and available in PATH
    pub fn is_installed(&self) -> bool {
        std::process::Command::new("which")
            .arg(self.config.name)
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Run the tool with `dir` as working directory
    ///
    /// Output lines are echoed dimmed; a non-zero exit or a hang is an error.
    pub async fn run_in(&self, dir: &Path) -> Result<()> {
        let child = TokioCommand::new(self.config.name)
            .args(self.config.args)
            .current_dir(dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match timeout(RUN_TIMEOUT, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => anyhow::bail!(
                "{} timed out after {} seconds",
                self.command_line(),
                RUN_TIMEOUT.as_secs()
            ),
        };

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            println!("  {}", line.dimmed());
        }
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            eprintln!("  {}", line.yellow());
        }

        if !output.status.success() {
            anyhow::bail!(
                "{} exited with code {}",
                self.command_line(),
                output.status.code().unwrap_or(-1)
            );
        }
        tracing::debug!(command = %self.command_line(), dir = %dir.display(), "tool finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &'static str, args: &'static [&'static str]) -> ToolManager {
        ToolManager::new(ToolConfig { name, args })
    }

    #[test]
    fn test_command_line() {
        assert_eq!(tool("gofmt", &["-w", "-s", "-l"]).command_line(), "gofmt -w -s -l");
        assert_eq!(tool("gofmt", &[]).command_line(), "gofmt");
    }

    #[test]
    fn test_missing_tool_is_not_installed() {
        assert!(!tool("definitely-not-a-real-tool-gink", &[]).is_installed());
    }

    #[test]
    fn test_product_without_tool() {
        assert!(ToolManager::for_product(&crate::testing::TestConfig).is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_in_reports_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        assert!(tool("true", &[]).run_in(dir.path()).await.is_ok());
        assert!(tool("false", &[]).run_in(dir.path()).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_in_uses_directory() {
        let dir = tempfile::tempdir().unwrap();
        tool("touch", &["marker"]).run_in(dir.path()).await.unwrap();
        assert!(dir.path().join("marker").exists());
    }
}
