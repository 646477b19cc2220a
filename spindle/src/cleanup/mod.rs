//! Content cleanup scheduler.
//!
//! Downloaded content is disposable: anything older than the configured
//! time-to-live is evicted to reclaim disk space. Playlists are reset in
//! place (directory recreated empty, statuses back to pending) because the
//! entries themselves live forever; jobs are removed entirely, entry and
//! directory both. Both cases run through the same expiry sweep, differing
//! only in the timestamp consulted and the expiry callback.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::jobs::JobRegistry;
use crate::playlist::TrackStatus;
use crate::playlist::registry::PlaylistRegistry;
use crate::utils::fs;

/// One candidate for expiry: its content directory and the timestamp that
/// starts the TTL clock. `key` is handed back to the expiry callback.
struct ExpiryCandidate<K> {
    key: K,
    dir: PathBuf,
    stamp: Option<DateTime<Utc>>,
}

/// Delete expired candidates' content and invoke the per-entry callback.
///
/// `recreate` distinguishes reset-in-place (playlists keep an empty
/// directory) from full removal (jobs). Failures are logged and isolated:
/// one entry's IO error never aborts the sweep, and its callback is skipped
/// so state keeps describing what is actually on disk.
async fn sweep_expired<K>(
    kind: &'static str,
    candidates: Vec<ExpiryCandidate<K>>,
    ttl: TimeDelta,
    now: DateTime<Utc>,
    recreate: bool,
    mut on_expired: impl FnMut(K),
) -> usize {
    let mut swept = 0;

    for candidate in candidates {
        let Some(stamp) = candidate.stamp else {
            continue;
        };
        if now - stamp < ttl {
            continue;
        }

        let result = if recreate {
            fs::clear_directory(&candidate.dir).await
        } else {
            fs::remove_directory(&candidate.dir).await
        };

        match result {
            Ok(()) => {
                on_expired(candidate.key);
                swept += 1;
            }
            Err(e) => {
                warn!(kind, dir = %candidate.dir.display(), error = %e, "Cleanup failed for entry");
            }
        }
    }

    swept
}

/// Periodic TTL eviction over playlists and jobs.
pub struct CleanupScheduler {
    playlists: Arc<PlaylistRegistry>,
    jobs: Arc<JobRegistry>,
    ttl: TimeDelta,
}

impl CleanupScheduler {
    pub fn new(playlists: Arc<PlaylistRegistry>, jobs: Arc<JobRegistry>, ttl: TimeDelta) -> Self {
        Self {
            playlists,
            jobs,
            ttl,
        }
    }

    /// Run one sweep. Returns (playlists cleared, jobs removed).
    pub async fn run_sweep(&self) -> (usize, usize) {
        let now = Utc::now();

        let playlist_candidates = self
            .playlists
            .all()
            .into_iter()
            .map(|entry| {
                let playlist = entry.read();
                ExpiryCandidate {
                    dir: playlist.download_dir.clone(),
                    stamp: playlist.last_content_at,
                    key: entry.clone(),
                }
            })
            .collect();

        let playlists_cleared =
            sweep_expired("playlist", playlist_candidates, self.ttl, now, true, |entry| {
                let mut playlist = entry.write();
                for track in playlist.tracks.iter_mut() {
                    track.local_status = TrackStatus::Pending;
                }
                playlist.downloaded_count = 0;
                playlist.last_content_at = None;
                debug!(playlist = %playlist.id, "Expired content cleared");
            })
            .await;

        let job_candidates = self
            .jobs
            .all()
            .into_iter()
            .filter(|job| job.read().is_terminal())
            .map(|job| {
                let snapshot = job.read();
                ExpiryCandidate {
                    dir: snapshot.dir.clone(),
                    stamp: snapshot.completed_at,
                    key: snapshot.id.clone(),
                }
            })
            .collect();

        let jobs = self.jobs.clone();
        let jobs_removed = sweep_expired("job", job_candidates, self.ttl, now, false, |id| {
            jobs.remove(&id);
            debug!(job = %id, "Expired job removed");
        })
        .await;

        if playlists_cleared > 0 || jobs_removed > 0 {
            info!(
                playlists = playlists_cleared,
                jobs = jobs_removed,
                "Cleanup sweep evicted expired content"
            );
        }

        (playlists_cleared, jobs_removed)
    }

    /// Start the periodic cleanup task.
    pub fn start_background_task(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            info!(
                ttl_hours = self.ttl.num_hours(),
                interval_secs = interval.as_secs(),
                "Cleanup scheduler started"
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Cleanup scheduler shutting down");
                        break;
                    }
                    _ = tick.tick() => {
                        self.run_sweep().await;
                    }
                }
            }
        });
    }
}
