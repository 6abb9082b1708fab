//! Product configuration trait for CLI binaries
//!
//! This trait is the immutable description of where templates come from and
//! which literal tokens inside them get rewritten. The binary supplies the
//! real values; tests supply their own implementation pointing at local
//! archives.

use std::path::Path;
use std::time::Duration;

/// Placeholder substituted with the resolved tag in archive URL templates
pub const TAG_PLACEHOLDER: &str = "{tag}";

/// Configuration trait for the template product
///
/// Implementors define:
/// - Product identity (name, display name)
/// - Template archive origin
/// - The template's self-identifying tokens
/// - Network and post-generation behavior
pub trait ProductConfig: Clone + Send + Sync + 'static {
    /// Internal product name (used for CLI command, env vars)
    fn name(&self) -> &'static str;

    /// Human-readable display name
    fn display_name(&self) -> &'static str;

    /// URL template for template archives, containing [`TAG_PLACEHOLDER`]
    fn default_archive_url(&self) -> &'static str;

    /// Environment variable name for overriding the archive URL template
    fn archive_url_env(&self) -> &'static str;

    /// Module path the template uses to import its own packages
    fn template_module_token(&self) -> &'static str;

    /// Bare project name the template uses for itself
    fn template_name_token(&self) -> &'static str;

    /// Timeout applied to the archive download
    fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(60)
    }

    /// Command run inside the new project after generation, if any
    fn post_generate_command(&self) -> Option<(&'static str, &'static [&'static str])> {
        None
    }

    /// Generate the "next steps" instructions after project creation
    fn next_steps(&self, dir: &Path) -> Vec<String>;

    /// User agent string for HTTP requests
    fn user_agent(&self) -> &'static str {
        self.name()
    }
}
