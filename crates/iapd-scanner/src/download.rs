//! Document downloads.
//!
//! Files are named after the MD5 of their URL, so repeated downloads of the
//! same document land on the same path. The registry's document server
//! sometimes answers 502 Bad Gateway to the HTTP client while still serving
//! the file to other user agents; for that case a configurable external
//! command gets one attempt.

use crate::error::{Result, ScanError};
use async_trait::async_trait;
use iapd_core::DownloadConfig;
use iapd_session::{RateLimitedClient, SessionError};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

/// Second-chance fetcher used after a 502 response.
#[async_trait]
pub trait FallbackFetcher: Send + Sync {
    /// Fetch `url` into `path`.
    async fn fetch(&self, url: &str, path: &Path) -> Result<()>;
}

/// Runs an external command such as `wget {url} -O {path}`.
#[derive(Debug, Clone)]
pub struct CommandFallback {
    argv: Vec<String>,
}

impl CommandFallback {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    pub fn from_config(config: &DownloadConfig) -> Self {
        Self::new(config.fallback_command.clone())
    }

    /// Argument vector with `{url}` and `{path}` filled in.
    pub fn render(&self, url: &str, path: &Path) -> Vec<String> {
        let path = path.to_string_lossy();
        self.argv
            .iter()
            .map(|arg| arg.replace("{url}", url).replace("{path}", &path))
            .collect()
    }
}

#[async_trait]
impl FallbackFetcher for CommandFallback {
    async fn fetch(&self, url: &str, path: &Path) -> Result<()> {
        let argv = self.render(url, path);
        let Some((program, args)) = argv.split_first() else {
            return Err(ScanError::InvalidArgument(
                "fallback download command is empty".to_string(),
            ));
        };

        tracing::debug!(program = %program, url, "Running fallback download command");
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            tracing::warn!(
                exit_code = output.status.code().unwrap_or(-1),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Fallback download command failed"
            );
            return Err(ScanError::DownloadFailed {
                url: url.to_string(),
                status: None,
            });
        }
        Ok(())
    }
}

/// Local filename for a document URL: lowercase hex MD5 plus `.pdf`.
pub fn local_file_name(url: &str) -> String {
    format!("{:x}.pdf", md5::compute(url.as_bytes()))
}

pub struct Downloader {
    client: Arc<RateLimitedClient>,
    fallback: Arc<dyn FallbackFetcher>,
}

impl Downloader {
    pub fn new(client: Arc<RateLimitedClient>, fallback: Arc<dyn FallbackFetcher>) -> Self {
        Self { client, fallback }
    }

    /// Save `url` under `target_dir`, or under a fresh temporary directory
    /// that is left in place for the caller.
    ///
    /// Directories are only created once there is something to write.
    ///
    /// # Errors
    /// A non-502 error status fails with [`ScanError::DownloadFailed`]
    /// carrying the status, so the retry policy can act on it.
    /// Transport failures are returned as [`ScanError::Http`].
    pub async fn download(&self, url: &str, target_dir: Option<&Path>) -> Result<PathBuf> {
        match self.client.get(url).await {
            Ok(response) => {
                let path = prepare_dir(target_dir).await?.join(local_file_name(url));
                tokio::fs::write(&path, &response.body).await?;
                tracing::debug!(url, path = %path.display(), bytes = response.body.len(), "Downloaded file");
                Ok(path)
            }
            Err(SessionError::Status { status: 502, .. }) => {
                let path = prepare_dir(target_dir).await?.join(local_file_name(url));
                tracing::warn!(url, "Bad gateway, trying fallback download");
                if let Err(e) = self.fallback.fetch(url, &path).await {
                    tracing::error!(url, error = %e, "Fallback download failed");
                }
                Ok(path)
            }
            Err(SessionError::Status { status, .. }) => {
                tracing::warn!(url, status, "Download failed");
                Err(ScanError::DownloadFailed {
                    url: url.to_string(),
                    status: Some(status),
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

async fn prepare_dir(target_dir: Option<&Path>) -> Result<PathBuf> {
    match target_dir {
        Some(dir) => {
            tokio::fs::create_dir_all(dir).await?;
            Ok(dir.to_path_buf())
        }
        None => Ok(tempfile::Builder::new()
            .prefix("iapd-")
            .tempdir()?
            .into_path()),
    }
}
