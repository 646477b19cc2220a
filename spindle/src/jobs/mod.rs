//! Ad hoc single-URL download jobs.
//!
//! A job is the single-shot cousin of a playlist sync: one URL, one
//! downloader process, one directory under `<root>/jobs/<id>`. Jobs are not
//! refreshed or re-reconciled; they run once, keep their logs, and are
//! removed entirely (entry and directory) by the cleanup sweep once their
//! completion time passes the content TTL.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::playlist::{LogLine, LogStream, MAX_LOG_LINES};
use crate::sync::DownloaderConfig;
use crate::utils::fs;
use crate::{Error, Result};

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

/// One ad hoc download job.
#[derive(Debug)]
pub struct Job {
    pub id: String,
    pub url: String,
    pub status: JobStatus,
    pub error_message: Option<String>,
    /// Owned exclusively by this job; a pure function of `id`.
    pub dir: PathBuf,
    pub logs: VecDeque<LogLine>,
    pub created_at: DateTime<Utc>,
    /// Set when the process exits (either way); drives cleanup expiry.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    fn new(url: impl Into<String>, root: &Path) -> Self {
        let id = Uuid::new_v4().to_string();
        let dir = root.join(&id);
        Self {
            id,
            url: url.into(),
            status: JobStatus::Running,
            error_message: None,
            dir,
            logs: VecDeque::new(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Append a log line, evicting the oldest once the buffer is full.
    pub fn push_log(&mut self, stream: LogStream, line: String) {
        if self.logs.len() == MAX_LOG_LINES {
            self.logs.pop_front();
        }
        self.logs.push_back(LogLine {
            at: Utc::now(),
            stream,
            line,
        });
    }

    /// Whether the job reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status != JobStatus::Running
    }
}

/// A registry entry; mutated in place by whichever task holds the lock.
pub type SharedJob = Arc<RwLock<Job>>;

/// Identity-keyed in-memory job store.
pub struct JobRegistry {
    jobs: DashMap<String, SharedJob>,
    root: PathBuf,
}

impl JobRegistry {
    /// `root` is the jobs directory, conventionally `<download_root>/jobs`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            jobs: DashMap::new(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create and register a fresh job for a URL.
    pub fn create(&self, url: &str) -> SharedJob {
        let job = Arc::new(RwLock::new(Job::new(url, &self.root)));
        let id = job.read().id.clone();
        self.jobs.insert(id, job.clone());
        job
    }

    pub fn get(&self, id: &str) -> Option<SharedJob> {
        self.jobs.get(id).map(|entry| entry.clone())
    }

    /// All jobs, newest first.
    pub fn all(&self) -> Vec<SharedJob> {
        let mut jobs: Vec<SharedJob> = self.jobs.iter().map(|entry| entry.clone()).collect();
        jobs.sort_by_key(|job| std::cmp::Reverse(job.read().created_at));
        jobs
    }

    /// Drop a job entry entirely. Used by the cleanup sweep.
    pub fn remove(&self, id: &str) -> Option<SharedJob> {
        self.jobs.remove(id).map(|(_, job)| job)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Spawns and supervises job downloads.
pub struct JobRunner {
    registry: Arc<JobRegistry>,
    downloader: DownloaderConfig,
}

impl JobRunner {
    pub fn new(registry: Arc<JobRegistry>, downloader: DownloaderConfig) -> Self {
        Self {
            registry,
            downloader,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Create a job and start its download.
    ///
    /// On spawn failure the job entry stays registered in `failed` state (the
    /// cleanup sweep reaps it later) and the error is returned to the caller.
    /// Returns the job id and a completion receiver.
    pub async fn start_job(&self, url: &str) -> Result<(String, oneshot::Receiver<()>)> {
        let job = self.registry.create(url);
        let (id, dir) = {
            let job = job.read();
            (job.id.clone(), job.dir.clone())
        };

        if let Err(e) = fs::ensure_dir_all(&dir).await {
            self.fail_start(&job, &e);
            return Err(e);
        }

        info!(job = %id, url = %url, "Starting download job");
        let mut child = match self.downloader.command(url, &dir).spawn() {
            Ok(child) => child,
            Err(source) => {
                let err = Error::Spawn {
                    program: self.downloader.bin.clone(),
                    source,
                };
                self.fail_start(&job, &err);
                return Err(err);
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (done_tx, done_rx) = oneshot::channel();
        let waiter_job = job.clone();

        tokio::spawn(async move {
            let out_job = waiter_job.clone();
            let err_job = waiter_job.clone();

            let drain_stdout = async {
                if let Some(stdout) = stdout {
                    process_utils::forward_lines(stdout, |line| {
                        out_job.write().push_log(LogStream::Stdout, line);
                    })
                    .await
                } else {
                    Ok(())
                }
            };
            let drain_stderr = async {
                if let Some(stderr) = stderr {
                    process_utils::forward_lines(stderr, |line| {
                        err_job.write().push_log(LogStream::Stderr, line);
                    })
                    .await
                } else {
                    Ok(())
                }
            };

            let (out_result, err_result, wait_result) =
                tokio::join!(drain_stdout, drain_stderr, child.wait());
            if let Err(e) = out_result {
                warn!(error = %e, "Error draining job stdout");
            }
            if let Err(e) = err_result {
                warn!(error = %e, "Error draining job stderr");
            }

            let code = match wait_result {
                Ok(exit_status) => exit_status.code(),
                Err(e) => {
                    error!(error = %e, "Error waiting for job process");
                    Some(-1)
                }
            };

            {
                let mut job = waiter_job.write();
                job.completed_at = Some(Utc::now());
                match code {
                    Some(0) => {
                        job.status = JobStatus::Completed;
                        info!(job = %job.id, "Download job finished");
                    }
                    Some(code) => {
                        job.status = JobStatus::Failed;
                        job.error_message = Some(Error::ProcessExit { code }.to_string());
                        warn!(job = %job.id, code, "Download job failed");
                    }
                    None => {
                        job.status = JobStatus::Failed;
                        job.error_message = Some("terminated by signal".to_string());
                        warn!(job = %job.id, "Download job terminated by signal");
                    }
                }
            }

            let _ = done_tx.send(());
        });

        Ok((id, done_rx))
    }

    fn fail_start(&self, job: &SharedJob, err: &Error) {
        let mut job = job.write();
        job.status = JobStatus::Failed;
        job.error_message = Some(err.to_string());
        job.completed_at = Some(Utc::now());
        warn!(job = %job.id, error = %err, "Download job failed to start");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_registers_running_job() {
        let registry = JobRegistry::new("/data/jobs");
        let job = registry.create("https://example.com/p/x");

        let snapshot = job.read();
        assert_eq!(snapshot.status, JobStatus::Running);
        assert!(snapshot.dir.starts_with("/data/jobs"));
        assert!(registry.get(&snapshot.id).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_drops_entry() {
        let registry = JobRegistry::new("/data/jobs");
        let job = registry.create("url");
        let id = job.read().id.clone();

        assert!(registry.remove(&id).is_some());
        assert!(registry.get(&id).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_spawn_failure_marks_job_failed() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = Arc::new(JobRegistry::new(tmp.path().join("jobs")));
        let runner = JobRunner::new(
            registry.clone(),
            DownloaderConfig::new("definitely-not-a-real-binary-name", Vec::new()),
        );

        let err = runner.start_job("https://example.com/p/x").await.unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));

        let job = registry.all().into_iter().next().unwrap();
        let job = job.read();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.completed_at.is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_job_completes_with_logs() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let script = tmp.path().join("fake-downloader.sh");
        std::fs::write(&script, "#!/bin/sh\necho grabbed\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let registry = Arc::new(JobRegistry::new(tmp.path().join("jobs")));
        let runner = JobRunner::new(
            registry.clone(),
            DownloaderConfig::new(script.to_string_lossy().into_owned(), Vec::new()),
        );

        let (id, done) = runner.start_job("https://example.com/p/x").await.unwrap();
        done.await.unwrap();

        let job = registry.get(&id).unwrap();
        let job = job.read();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.completed_at.is_some());
        assert_eq!(job.logs.len(), 1);
        assert_eq!(job.logs[0].line, "grabbed");
        assert_eq!(job.logs[0].stream, LogStream::Stdout);
    }
}
