//! Shared fixtures for unit tests

use crate::product::ProductConfig;
use std::io::{Cursor, Write};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Config used across unit tests
#[derive(Clone)]
pub struct TestConfig;

impl ProductConfig for TestConfig {
    fn name(&self) -> &'static str {
        "tmpl"
    }

    fn display_name(&self) -> &'static str {
        "Template"
    }

    fn default_archive_url(&self) -> &'static str {
        "https://example.org/acme/tmpl/archive/refs/tags/{tag}.zip"
    }

    fn archive_url_env(&self) -> &'static str {
        "GINK_CORE_TEST_TEMPLATE_URL"
    }

    fn template_module_token(&self) -> &'static str {
        "example.org/acme/tmpl"
    }

    fn template_name_token(&self) -> &'static str {
        "tmpl"
    }

    fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    fn next_steps(&self, dir: &Path) -> Vec<String> {
        vec![format!("cd {}", dir.display())]
    }
}

/// Entry of an in-memory test archive
pub enum Entry<'a> {
    Dir(&'a str),
    File(&'a str, &'a [u8], u32),
}

/// Build a zip archive in memory
pub fn build_zip(entries: &[Entry<'_>]) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for entry in entries {
            match entry {
                Entry::Dir(name) => zip.add_directory(*name, options).unwrap(),
                Entry::File(name, content, mode) => {
                    zip.start_file(*name, options.unix_permissions(*mode)).unwrap();
                    zip.write_all(content).unwrap();
                }
            }
        }
        zip.finish().unwrap();
    }
    buffer
}

/// A small template tree rooted at `tmpl-<tag>/`
pub fn template_zip(tag: &str) -> Vec<u8> {
    let root = format!("tmpl-{}/", tag);
    let go_mod = format!("{}go.mod", root);
    let main_go = format!("{}main.go", root);
    let internal = format!("{}internal/", root);
    let config_go = format!("{}internal/config.go", root);
    let readme = format!("{}README.md", root);
    build_zip(&[
        Entry::Dir(&root),
        Entry::File(&go_mod, b"module example.org/acme/tmpl\n\ngo 1.21\n", 0o644),
        Entry::File(
            &main_go,
            b"package main\n\nimport \"example.org/acme/tmpl/internal\"\n\nfunc main() { internal.Run(\"tmpl\") }\n",
            0o644,
        ),
        Entry::Dir(&internal),
        Entry::File(&config_go, b"package internal\n\nconst App = \"tmpl\"\n", 0o600),
        Entry::File(&readme, b"# tmpl\n", 0o644),
    ])
}

/// Serve a single HTTP response on a local port
///
/// Returns an archive URL template pointing at the listener.
pub async fn serve_once(status_line: &'static str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        let head = format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status_line,
            body.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&body).await.unwrap();
        let _ = socket.shutdown().await;
    });
    format!("http://{}/archive/{{tag}}.zip", addr)
}
