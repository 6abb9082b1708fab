//! Template archive fetching from the remote origin or a local directory
//!
//! Both sources produce the same thing: a `<tag>.zip` file written into the
//! destination directory, ready for extraction.

use super::version::VersionSpec;
use crate::error::{FsOp, Result, ScaffoldError};
use crate::product::{ProductConfig, TAG_PLACEHOLDER};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Template source - either a remote URL template or a local directory of archives
#[derive(Debug, Clone)]
pub enum TemplateSource {
    /// URL template containing `{tag}`
    Remote(String),
    /// Directory holding `<tag>.zip` files
    Local(PathBuf),
}

impl TemplateSource {
    /// Create a remote template source from a product config
    ///
    /// The product's environment variable, when set, replaces the default URL template.
    pub fn from_config<C: ProductConfig>(config: &C) -> Result<Self> {
        Self::remote(
            config.default_archive_url(),
            std::env::var(config.archive_url_env()).ok(),
        )
    }

    /// Pick the URL template to use, validating that it can produce a URL
    pub fn remote(default_url: &str, override_url: Option<String>) -> Result<Self> {
        let template = override_url
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| default_url.to_string());

        if !template.contains(TAG_PLACEHOLDER) {
            return Err(ScaffoldError::InvalidUrl(template));
        }
        let source = Self::Remote(template);
        source.archive_url("latest")?;
        Ok(source)
    }

    /// Create a local template source from a path
    pub fn local(path: PathBuf) -> Self {
        Self::Local(path)
    }

    /// Concrete archive URL for a tag (remote sources only)
    pub fn archive_url(&self, tag: &str) -> Result<Url> {
        match self {
            TemplateSource::Remote(template) => {
                let raw = template.replace(TAG_PLACEHOLDER, tag);
                Url::parse(&raw).map_err(|_| ScaffoldError::InvalidUrl(raw))
            }
            TemplateSource::Local(path) => Err(ScaffoldError::InvalidUrl(format!(
                "local source {} has no URL",
                path.display()
            ))),
        }
    }
}

/// Archive fetcher - retrieves one versioned template archive onto disk
pub struct ArchiveFetcher {
    source: TemplateSource,
    client: reqwest::Client,
    cancel: CancellationToken,
}

impl ArchiveFetcher {
    /// Create a new fetcher with a custom user agent and request timeout
    pub fn new(source: TemplateSource, user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(ScaffoldError::HttpClient)?;
        Ok(Self {
            source,
            client,
            cancel: CancellationToken::new(),
        })
    }

    /// Create a fetcher from a product config
    pub fn from_config<C: ProductConfig>(config: &C) -> Result<Self> {
        let source = TemplateSource::from_config(config)?;
        Self::new(source, config.user_agent(), config.fetch_timeout())
    }

    /// Create a fetcher reading archives from a local directory
    pub fn from_local(path: PathBuf, user_agent: &str) -> Result<Self> {
        Self::new(TemplateSource::local(path), user_agent, Duration::from_secs(60))
    }

    /// Abort in-flight downloads when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Get the template source
    pub fn source(&self) -> &TemplateSource {
        &self.source
    }

    /// Fetch the archive for `version` into `dest_dir/<tag>.zip`
    ///
    /// Any existing file with that name is overwritten. The caller owns the
    /// returned file and is expected to remove it once extracted.
    pub async fn fetch(&self, version: &VersionSpec, dest_dir: &Path) -> Result<PathBuf> {
        let tag = version.tag();
        let zip_path = dest_dir.join(format!("{}.zip", tag));

        match &self.source {
            TemplateSource::Remote(_) => {
                let url = self.source.archive_url(&tag)?;
                tracing::info!(%url, "downloading template archive");

                let mut response = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(ScaffoldError::Cancelled),
                    res = self.client.get(url.clone()).send() => res.map_err(|source| {
                        ScaffoldError::NetworkFailure { url: url.to_string(), source }
                    })?,
                };

                if !response.status().is_success() {
                    return Err(ScaffoldError::VersionNotFound {
                        tag,
                        detail: format!("HTTP {} from {}", response.status(), url),
                    });
                }

                ensure_dir(dest_dir).await?;
                let mut file = fs::File::create(&zip_path)
                    .await
                    .map_err(|e| ScaffoldError::fs(FsOp::CreateFile, &zip_path, e))?;

                let mut written = 0usize;
                let copied: Result<()> = async {
                    loop {
                        let chunk = tokio::select! {
                            biased;
                            _ = self.cancel.cancelled() => return Err(ScaffoldError::Cancelled),
                            chunk = response.chunk() => chunk.map_err(|source| {
                                ScaffoldError::NetworkFailure { url: url.to_string(), source }
                            })?,
                        };
                        let Some(bytes) = chunk else { break };
                        file.write_all(&bytes)
                            .await
                            .map_err(|e| ScaffoldError::fs(FsOp::Write, &zip_path, e))?;
                        written += bytes.len();
                    }
                    file.flush()
                        .await
                        .map_err(|e| ScaffoldError::fs(FsOp::Write, &zip_path, e))
                }
                .await;

                if let Err(e) = copied {
                    drop(file);
                    if let Err(rm) = fs::remove_file(&zip_path).await {
                        tracing::warn!(path = %zip_path.display(), error = %rm, "failed to remove partial archive");
                    }
                    return Err(e);
                }

                tracing::debug!(bytes = written, path = %zip_path.display(), "archive saved");
            }
            TemplateSource::Local(dir) => {
                let source_path = dir.join(format!("{}.zip", tag));
                if !source_path.is_file() {
                    return Err(ScaffoldError::VersionNotFound {
                        tag,
                        detail: format!("no archive at {}", source_path.display()),
                    });
                }

                ensure_dir(dest_dir).await?;
                if source_path != zip_path {
                    fs::copy(&source_path, &zip_path)
                        .await
                        .map_err(|e| ScaffoldError::fs(FsOp::Write, &zip_path, e))?;
                }
                tracing::debug!(from = %source_path.display(), "using local template archive");
            }
        }

        Ok(zip_path)
    }
}

async fn ensure_dir(dir: &Path) -> Result<()> {
    if fs::metadata(dir).await.is_err() {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| ScaffoldError::fs(FsOp::CreateDir, dir, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{serve_once, template_zip, TestConfig};

    fn remote_fetcher(url_template: String) -> ArchiveFetcher {
        let source = TemplateSource::remote(&url_template, None).unwrap();
        ArchiveFetcher::new(source, "gink-test", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_archive_url_substitutes_tag() {
        let source = TemplateSource::remote(TestConfig.default_archive_url(), None).unwrap();
        let url = source.archive_url("v1.2.0").unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.org/acme/tmpl/archive/refs/tags/v1.2.0.zip"
        );
    }

    #[test]
    fn test_override_url_wins() {
        let source = TemplateSource::remote(
            TestConfig.default_archive_url(),
            Some("http://mirror.local/{tag}.zip".to_string()),
        )
        .unwrap();
        assert_eq!(
            source.archive_url("latest").unwrap().as_str(),
            "http://mirror.local/latest.zip"
        );
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let source =
            TemplateSource::remote(TestConfig.default_archive_url(), Some("  ".to_string()))
                .unwrap();
        assert!(matches!(source, TemplateSource::Remote(t) if t.contains("example.org")));
    }

    #[test]
    fn test_override_without_placeholder_is_rejected() {
        let err = TemplateSource::remote(
            TestConfig.default_archive_url(),
            Some("http://mirror.local/latest.zip".to_string()),
        )
        .unwrap_err();
        assert!(matches!(err, ScaffoldError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_local_fetch_copies_archive() {
        let origin = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let bytes = template_zip("v1.0.0");
        std::fs::write(origin.path().join("v1.0.0.zip"), &bytes).unwrap();

        let fetcher =
            ArchiveFetcher::from_local(origin.path().to_path_buf(), "gink-test").unwrap();
        let path = fetcher
            .fetch(&VersionSpec::parse("1.0.0"), dest.path())
            .await
            .unwrap();

        assert_eq!(path, dest.path().join("v1.0.0.zip"));
        assert_eq!(std::fs::read(&path).unwrap(), bytes);
    }

    #[tokio::test]
    async fn test_local_missing_version_is_not_found() {
        let origin = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();

        let fetcher =
            ArchiveFetcher::from_local(origin.path().to_path_buf(), "gink-test").unwrap();
        let err = fetcher
            .fetch(&VersionSpec::parse("9.9.9"), dest.path())
            .await
            .unwrap_err();

        assert!(matches!(err, ScaffoldError::VersionNotFound { ref tag, .. } if tag == "v9.9.9"));
        assert!(!dest.path().join("v9.9.9.zip").exists());
    }

    #[tokio::test]
    async fn test_remote_fetch_creates_parent() {
        let body = template_zip("latest");
        let url = serve_once("200 OK", body.clone()).await;
        let dest = tempfile::tempdir().unwrap();
        let nested = dest.path().join("a").join("b");

        let path = remote_fetcher(url)
            .fetch(&VersionSpec::Latest, &nested)
            .await
            .unwrap();

        assert_eq!(path, nested.join("latest.zip"));
        assert_eq!(std::fs::read(&path).unwrap(), body);
    }

    #[tokio::test]
    async fn test_remote_fetch_overwrites_existing_archive() {
        let body = template_zip("v2.1.0");
        let url = serve_once("200 OK", body.clone()).await;
        let dest = tempfile::tempdir().unwrap();
        std::fs::write(dest.path().join("v2.1.0.zip"), b"stale").unwrap();

        let path = remote_fetcher(url)
            .fetch(&VersionSpec::parse("2.1.0"), dest.path())
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), body);
    }

    #[tokio::test]
    async fn test_destination_under_a_file_fails_to_create_dir() {
        let origin = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        std::fs::write(origin.path().join("latest.zip"), template_zip("latest")).unwrap();
        let blocker = scratch.path().join("blocker");
        std::fs::write(&blocker, b"plain file").unwrap();
        let dest = blocker.join("nested");

        let fetcher =
            ArchiveFetcher::from_local(origin.path().to_path_buf(), "gink-test").unwrap();
        let err = fetcher.fetch(&VersionSpec::Latest, &dest).await.unwrap_err();

        match err {
            ScaffoldError::Filesystem { op, path, .. } => {
                assert_eq!(op, FsOp::CreateDir);
                assert_eq!(path, dest);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_archive_path_taken_by_directory_fails_to_create_file() {
        let url = serve_once("200 OK", template_zip("latest")).await;
        let dest = tempfile::tempdir().unwrap();
        let taken = dest.path().join("latest.zip");
        std::fs::create_dir_all(&taken).unwrap();

        let err = remote_fetcher(url)
            .fetch(&VersionSpec::Latest, dest.path())
            .await
            .unwrap_err();

        match err {
            ScaffoldError::Filesystem { op, path, .. } => {
                assert_eq!(op, FsOp::CreateFile);
                assert_eq!(path, taken);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(taken.is_dir());
    }

    #[tokio::test]
    async fn test_remote_non_success_is_version_not_found() {
        let url = serve_once("404 Not Found", Vec::new()).await;
        let dest = tempfile::tempdir().unwrap();

        let err = remote_fetcher(url)
            .fetch(&VersionSpec::parse("0.0.1"), dest.path())
            .await
            .unwrap_err();

        match err {
            ScaffoldError::VersionNotFound { tag, detail } => {
                assert_eq!(tag, "v0.0.1");
                assert!(detail.contains("404"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!dest.path().join("v0.0.1.zip").exists());
    }

    #[tokio::test]
    async fn test_remote_connection_refused_is_network_failure() {
        // Bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dest = tempfile::tempdir().unwrap();
        let err = remote_fetcher(format!("http://{}/{{tag}}.zip", addr))
            .fetch(&VersionSpec::Latest, dest.path())
            .await
            .unwrap_err();

        assert!(matches!(err, ScaffoldError::NetworkFailure { .. }));
    }

    #[tokio::test]
    async fn test_configured_timeout_applies() {
        // accepts the connection but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let source =
            TemplateSource::remote(&format!("http://{}/{{tag}}.zip", addr), None).unwrap();
        let fetcher =
            ArchiveFetcher::new(source, "gink-test", Duration::from_millis(200)).unwrap();
        let dest = tempfile::tempdir().unwrap();

        let started = std::time::Instant::now();
        let err = fetcher
            .fetch(&VersionSpec::Latest, dest.path())
            .await
            .unwrap_err();

        match err {
            ScaffoldError::NetworkFailure { source, .. } => assert!(source.is_timeout()),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_cancelled_fetch() {
        let token = CancellationToken::new();
        token.cancel();
        let dest = tempfile::tempdir().unwrap();

        let fetcher = remote_fetcher("http://127.0.0.1:9/{tag}.zip".to_string())
            .with_cancellation(token);
        let err = fetcher
            .fetch(&VersionSpec::Latest, dest.path())
            .await
            .unwrap_err();

        assert!(matches!(err, ScaffoldError::Cancelled));
    }
}
