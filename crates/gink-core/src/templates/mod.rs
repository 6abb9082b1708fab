//! Template archive handling
//!
//! This module provides:
//! - Version resolution (`latest` or `v<version>` tags)
//! - Archive fetching from the remote origin or a local directory
//! - Zip extraction onto disk
//! - In-place token rewriting across the extracted tree

pub mod extractor;
pub mod fetcher;
pub mod rewriter;
pub mod version;

pub use extractor::{extract, ExtractedTree};
pub use fetcher::{ArchiveFetcher, TemplateSource};
pub use rewriter::{module_path, rewrite_tree, RewriteSummary, SubstitutionRule, SubstitutionRules};
pub use version::VersionSpec;
