//! Downloader process supervision.
//!
//! One sync = one external downloader process targeting one playlist's URL
//! and download directory. The supervisor enforces single-flight per
//! playlist, captures both output streams into the playlist's bounded log
//! buffer, and reconciles download status once the process exits.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::playlist::registry::{PlaylistRegistry, SharedPlaylist};
use crate::playlist::{LogStream, PlaylistStatus, ProcessHandle, status};
use crate::utils::fs;
use crate::{Error, Result};

/// How the external downloader is invoked.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Executable name or path.
    pub bin: String,
    /// Arguments appended to every invocation.
    pub extra_args: Vec<String>,
}

impl DownloaderConfig {
    pub fn new(bin: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            bin: bin.into(),
            extra_args,
        }
    }

    /// Build the download invocation: `<bin> download <url> --output <dir>`.
    pub fn command(&self, url: &str, dest: &Path) -> tokio::process::Command {
        let mut cmd = process_utils::tokio_command(&self.bin);
        cmd.arg("download")
            .arg(url)
            .arg("--output")
            .arg(dest)
            .args(&self.extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

/// Single-flight sync supervisor over the playlist registry.
pub struct SyncSupervisor {
    registry: Arc<PlaylistRegistry>,
    downloader: DownloaderConfig,
}

impl SyncSupervisor {
    pub fn new(registry: Arc<PlaylistRegistry>, downloader: DownloaderConfig) -> Self {
        Self {
            registry,
            downloader,
        }
    }

    /// Whether a downloader process is attached to the playlist.
    pub fn is_running(&self, id: &str) -> bool {
        self.registry
            .get(id)
            .is_some_and(|entry| entry.read().is_syncing())
    }

    /// Start a sync for the playlist.
    ///
    /// Fails with [`Error::NotFound`] for an unknown id and
    /// [`Error::AlreadyInProgress`] when a process is already attached; in
    /// the latter case existing state is left unmodified. Returns a
    /// completion receiver that resolves once the process has exited and
    /// post-exit reconciliation has run (callers are free to drop it).
    pub async fn start_sync(&self, id: &str) -> Result<oneshot::Receiver<()>> {
        let entry = self
            .registry
            .get(id)
            .ok_or_else(|| Error::not_found("Playlist", id))?;

        // Claim the slot before any await so concurrent callers see the
        // in-flight marker immediately.
        let (url, dir) = {
            let mut playlist = entry.write();
            if playlist.is_syncing() {
                return Err(Error::AlreadyInProgress {
                    id: playlist.id.clone(),
                });
            }
            playlist.process = Some(ProcessHandle {
                pid: None,
                started_at: Utc::now(),
            });
            playlist.status = PlaylistStatus::Syncing;
            playlist.error_message = None;
            (playlist.url.clone(), playlist.download_dir.clone())
        };

        if let Err(e) = fs::ensure_dir_all(&dir).await {
            self.fail_start(&entry, &e);
            return Err(e);
        }

        info!(playlist = %id, bin = %self.downloader.bin, "Starting sync");
        let mut child = match self.downloader.command(&url, &dir).spawn() {
            Ok(child) => child,
            Err(source) => {
                let err = Error::Spawn {
                    program: self.downloader.bin.clone(),
                    source,
                };
                self.fail_start(&entry, &err);
                return Err(err);
            }
        };

        if let Some(handle) = entry.write().process.as_mut() {
            handle.pid = child.id();
        }

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (done_tx, done_rx) = oneshot::channel();
        let waiter_entry = entry.clone();

        tokio::spawn(async move {
            let out_entry = waiter_entry.clone();
            let err_entry = waiter_entry.clone();

            let drain_stdout = async {
                if let Some(stdout) = stdout {
                    process_utils::forward_lines(stdout, |line| {
                        out_entry.write().push_log(LogStream::Stdout, line);
                    })
                    .await
                } else {
                    Ok(())
                }
            };
            let drain_stderr = async {
                if let Some(stderr) = stderr {
                    process_utils::forward_lines(stderr, |line| {
                        err_entry.write().push_log(LogStream::Stderr, line);
                    })
                    .await
                } else {
                    Ok(())
                }
            };

            let (out_result, err_result, wait_result) =
                tokio::join!(drain_stdout, drain_stderr, child.wait());
            if let Err(e) = out_result {
                warn!(error = %e, "Error draining downloader stdout");
            }
            if let Err(e) = err_result {
                warn!(error = %e, "Error draining downloader stderr");
            }

            let code = match wait_result {
                Ok(exit_status) => exit_status.code(),
                Err(e) => {
                    error!(error = %e, "Error waiting for downloader process");
                    Some(-1)
                }
            };

            finish_sync(&waiter_entry, code).await;
            let _ = done_tx.send(());
        });

        Ok(done_rx)
    }

    /// Roll back a claimed sync slot after a failure to launch.
    fn fail_start(&self, entry: &SharedPlaylist, err: &Error) {
        let mut playlist = entry.write();
        playlist.process = None;
        playlist.status = PlaylistStatus::Error;
        playlist.error_message = Some(err.to_string());
        warn!(playlist = %playlist.id, error = %err, "Sync failed to start");
    }
}

/// Apply the exit outcome and reconcile what actually landed on disk.
async fn finish_sync(entry: &SharedPlaylist, code: Option<i32>) {
    let id = {
        let mut playlist = entry.write();
        playlist.process = None;
        match code {
            Some(0) => {
                playlist.status = PlaylistStatus::Idle;
                playlist.last_sync_at = Some(Utc::now());
            }
            Some(code) => {
                playlist.status = PlaylistStatus::Error;
                playlist.error_message = Some(Error::ProcessExit { code }.to_string());
            }
            None => {
                playlist.status = PlaylistStatus::Error;
                playlist.error_message = Some("terminated by signal".to_string());
            }
        }
        playlist.id.clone()
    };

    match code {
        Some(0) => info!(playlist = %id, "Sync finished"),
        _ => warn!(playlist = %id, code = ?code, "Sync failed"),
    }

    // The response for this sync has long been sent; reconciliation problems
    // are only logged.
    if let Err(e) = status::reconcile(entry).await {
        warn!(playlist = %id, error = %e, "Post-sync reconciliation failed");
    }
}
