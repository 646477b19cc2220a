//! Download status reconciliation.
//!
//! Pure recomputation: scan the playlist's download directory, derive match
//! keys from the filenames, and recompute every track's local status plus the
//! playlist-level counters. Runs after every metadata refresh, after every
//! sync completion, and on its own periodic timer.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::TrackStatus;
use super::registry::{PlaylistRegistry, SharedPlaylist};
use crate::utils::fs;
use crate::{Result, matcher};

/// Recompute download status for one playlist entry.
///
/// A missing download directory means "nothing downloaded yet", not an error.
pub async fn reconcile(entry: &SharedPlaylist) -> Result<()> {
    let dir = entry.read().download_dir.clone();
    let files = fs::list_audio_files(&dir).await?;
    let file_keys = matcher::file_keys(&files);

    let mut playlist = entry.write();
    let mut downloaded = 0;
    for track in playlist.tracks.iter_mut() {
        if matcher::is_downloaded(&track.key, &file_keys) {
            track.local_status = TrackStatus::Downloaded;
            downloaded += 1;
        } else {
            track.local_status = TrackStatus::Pending;
        }
    }

    let pending = playlist.tracks.len() - downloaded;
    playlist.downloaded_count = downloaded;
    if playlist.tracks_total == 0 {
        playlist.tracks_total = downloaded + pending;
    }
    if downloaded > 0 {
        playlist.last_content_at = Some(Utc::now());
    }

    debug!(
        playlist = %playlist.id,
        downloaded,
        total = playlist.tracks_total,
        "Reconciled download status"
    );
    Ok(())
}

/// Periodic download-status reconciler across all registered playlists.
pub struct StatusReconciler {
    registry: Arc<PlaylistRegistry>,
}

impl StatusReconciler {
    pub fn new(registry: Arc<PlaylistRegistry>) -> Self {
        Self { registry }
    }

    /// Reconcile one playlist by id.
    pub async fn reconcile_by_id(&self, id: &str) -> Result<()> {
        let entry = self
            .registry
            .get(id)
            .ok_or_else(|| crate::Error::not_found("Playlist", id))?;
        reconcile(&entry).await
    }

    /// Reconcile every playlist; per-entry failures are logged and skipped.
    pub async fn reconcile_all(&self) {
        for entry in self.registry.all() {
            if let Err(e) = reconcile(&entry).await {
                let id = entry.read().id.clone();
                warn!(playlist = %id, error = %e, "Download status reconciliation failed");
            }
        }
    }

    /// Start the periodic reconciliation task.
    pub fn start_background_task(self: &Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let reconciler = self.clone();

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            info!(interval_secs = interval.as_secs(), "Download scan started");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Download scan shutting down");
                        break;
                    }
                    _ = tick.tick() => {
                        reconciler.reconcile_all().await;
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::Track;

    fn registry_with_playlist(
        root: &std::path::Path,
        tracks: Vec<Track>,
    ) -> (Arc<PlaylistRegistry>, SharedPlaylist) {
        let registry = Arc::new(PlaylistRegistry::new(root));
        let entry = registry.get_or_create("pl1", "https://example.com/pl1", false);
        entry.write().tracks = tracks;
        (registry, entry)
    }

    #[tokio::test]
    async fn test_no_files_means_all_pending() {
        let tmp = tempfile::tempdir().unwrap();
        let tracks = vec![
            Track::from_metadata("One", "A"),
            Track::from_metadata("Two", "B"),
            Track::from_metadata("Three", "C"),
        ];
        let (_registry, entry) = registry_with_playlist(tmp.path(), tracks);

        reconcile(&entry).await.unwrap();

        let playlist = entry.read();
        assert_eq!(playlist.downloaded_count, 0);
        assert_eq!(playlist.tracks_total, 3);
        assert!(playlist
            .tracks
            .iter()
            .all(|t| t.local_status == TrackStatus::Pending));
        assert!(playlist.last_content_at.is_none());
    }

    #[tokio::test]
    async fn test_matching_file_marks_track_downloaded() {
        let tmp = tempfile::tempdir().unwrap();
        let tracks = vec![Track::from_metadata("Karma Police", "Radiohead")];
        let (_registry, entry) = registry_with_playlist(tmp.path(), tracks);

        let dir = entry.read().download_dir.clone();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("radiohead-karma-police-320kbps.mp3"), b"x").unwrap();

        reconcile(&entry).await.unwrap();

        let playlist = entry.read();
        assert_eq!(playlist.downloaded_count, 1);
        assert_eq!(playlist.tracks[0].local_status, TrackStatus::Downloaded);
        assert!(playlist.last_content_at.is_some());
    }

    #[tokio::test]
    async fn test_downloaded_count_matches_track_statuses() {
        let tmp = tempfile::tempdir().unwrap();
        let tracks = vec![
            Track::from_metadata("Karma Police", "Radiohead"),
            Track::from_metadata("No Surprises", "Radiohead"),
        ];
        let (_registry, entry) = registry_with_playlist(tmp.path(), tracks);

        let dir = entry.read().download_dir.clone();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Radiohead - Karma Police.mp3"), b"x").unwrap();

        reconcile(&entry).await.unwrap();

        let playlist = entry.read();
        let downloaded_tracks = playlist
            .tracks
            .iter()
            .filter(|t| t.local_status == TrackStatus::Downloaded)
            .count();
        assert_eq!(playlist.downloaded_count, downloaded_tracks);
        assert_eq!(playlist.downloaded_count, 1);
    }

    #[tokio::test]
    async fn test_tracks_total_is_sticky() {
        let tmp = tempfile::tempdir().unwrap();
        let (_registry, entry) =
            registry_with_playlist(tmp.path(), vec![Track::from_metadata("One", "A")]);
        entry.write().tracks_total = 10;

        reconcile(&entry).await.unwrap();

        // An already-set total is left alone even though only one track is known.
        assert_eq!(entry.read().tracks_total, 10);
    }

    #[tokio::test]
    async fn test_reconcile_by_id_unknown_is_not_found() {
        let registry = Arc::new(PlaylistRegistry::new("/data"));
        let reconciler = StatusReconciler::new(registry);
        let err = reconciler.reconcile_by_id("missing").await.unwrap_err();
        assert!(matches!(err, crate::Error::NotFound { .. }));
    }
}
