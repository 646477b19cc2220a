//! Integration tests for the playlist sync core.
//!
//! These wire the real registry, reconcilers, supervisor, and cleanup
//! scheduler together against a stub metadata provider and scratch
//! directories, exercising the same flows the timers and routes drive in
//! production.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};

use spindle::Result;
use spindle::cleanup::CleanupScheduler;
use spindle::jobs::JobRegistry;
use spindle::metadata::{MetadataProvider, PlaylistMetadata, TrackMetadata};
use spindle::playlist::refresher::MetadataRefresher;
use spindle::playlist::registry::PlaylistRegistry;
use spindle::playlist::{TrackStatus, status};

/// Stub metadata provider returning a fixed three-track playlist.
struct StubProvider {
    fail: bool,
}

#[async_trait]
impl MetadataProvider for StubProvider {
    fn extract_identifier(&self, url: &str) -> Option<String> {
        url.rsplit('/').next().map(|s| s.to_string())
    }

    async fn get_metadata(&self, id: &str) -> Result<PlaylistMetadata> {
        if self.fail {
            return Err(spindle::Error::api("stubbed outage"));
        }
        Ok(PlaylistMetadata {
            name: "Late Night".to_string(),
            owner: "jo".to_string(),
            description: "after hours".to_string(),
            tracks_total: 3,
            url: format!("https://open.spotify.com/playlist/{id}"),
            images: vec!["https://img/cover.jpg".to_string()],
        })
    }

    async fn get_tracks(&self, _id: &str) -> Result<Vec<TrackMetadata>> {
        if self.fail {
            return Err(spindle::Error::api("stubbed outage"));
        }
        Ok(vec![
            track("Karma Police", "Radiohead"),
            track("No Surprises", "Radiohead"),
            track("Halo", "Beyoncé"),
        ])
    }
}

fn track(name: &str, artists: &str) -> TrackMetadata {
    TrackMetadata {
        name: name.to_string(),
        artists: artists.to_string(),
    }
}

fn setup(
    root: &Path,
    fail: bool,
) -> (Arc<PlaylistRegistry>, Arc<MetadataRefresher>) {
    let registry = Arc::new(PlaylistRegistry::new(root));
    registry.get_or_create("pl1", "https://open.spotify.com/playlist/pl1", false);
    let refresher = Arc::new(MetadataRefresher::new(
        registry.clone(),
        Arc::new(StubProvider { fail }),
    ));
    (registry, refresher)
}

#[cfg(unix)]
fn fake_downloader(dir: &Path, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("fake-downloader.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

mod refresh_flow {
    use super::*;

    #[tokio::test]
    async fn refresh_then_reconcile_with_partial_content() {
        let tmp = tempfile::tempdir().unwrap();
        let (registry, refresher) = setup(tmp.path(), false);

        refresher.refresh("pl1").await.unwrap();

        let entry = registry.get("pl1").unwrap();
        // One of the three tracks already sits on disk.
        let dir = entry.read().download_dir.clone();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Radiohead - Karma Police (320kbps).mp3"), b"x").unwrap();

        status::reconcile(&entry).await.unwrap();

        let playlist = entry.read();
        assert_eq!(playlist.name, "Late Night");
        assert_eq!(playlist.tracks_total, 3);
        assert_eq!(playlist.downloaded_count, 1);
        assert_eq!(playlist.tracks[0].local_status, TrackStatus::Downloaded);
        assert_eq!(playlist.tracks[1].local_status, TrackStatus::Pending);
        assert_eq!(playlist.tracks[2].local_status, TrackStatus::Pending);
        assert!(playlist.last_content_at.is_some());
    }

    #[tokio::test]
    async fn outage_keeps_previous_refresh_intact() {
        let tmp = tempfile::tempdir().unwrap();
        let (registry, refresher) = setup(tmp.path(), false);
        refresher.refresh("pl1").await.unwrap();

        // Second refresher against the same registry, now failing.
        let failing = Arc::new(MetadataRefresher::new(
            registry.clone(),
            Arc::new(StubProvider { fail: true }),
        ));
        failing.refresh("pl1").await.unwrap_err();

        let playlist = registry.get("pl1").unwrap();
        let playlist = playlist.read();
        assert_eq!(playlist.name, "Late Night");
        assert_eq!(playlist.tracks.len(), 3);
        assert!(playlist.error_message.as_deref().unwrap().contains("outage"));
    }
}

#[cfg(unix)]
mod sync_flow {
    use super::*;
    use spindle::Error;
    use spindle::playlist::PlaylistStatus;
    use spindle::sync::{DownloaderConfig, SyncSupervisor};

    #[tokio::test]
    async fn sync_downloads_and_reconciles() {
        let tmp = tempfile::tempdir().unwrap();
        let (registry, refresher) = setup(tmp.path(), false);
        refresher.refresh("pl1").await.unwrap();

        let bin = fake_downloader(
            tmp.path(),
            "touch \"$4/Radiohead - Karma Police.mp3\"\ntouch \"$4/Radiohead - No Surprises.mp3\"",
        );
        let supervisor =
            SyncSupervisor::new(registry.clone(), DownloaderConfig::new(&bin, Vec::new()));

        let done = supervisor.start_sync("pl1").await.unwrap();
        done.await.unwrap();

        let playlist = registry.get("pl1").unwrap();
        let playlist = playlist.read();
        assert_eq!(playlist.status, PlaylistStatus::Idle);
        assert_eq!(playlist.downloaded_count, 2);
        assert!(playlist.last_sync_at.is_some());
        assert!(playlist.process.is_none());
    }

    #[tokio::test]
    async fn second_sync_while_running_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let (registry, _refresher) = setup(tmp.path(), false);

        let bin = fake_downloader(tmp.path(), "sleep 2");
        let supervisor =
            SyncSupervisor::new(registry.clone(), DownloaderConfig::new(&bin, Vec::new()));

        let _done = supervisor.start_sync("pl1").await.unwrap();
        let err = supervisor.start_sync("pl1").await.unwrap_err();
        assert!(matches!(err, Error::AlreadyInProgress { .. }));
        assert!(supervisor.is_running("pl1"));
    }
}

mod cleanup_flow {
    use super::*;

    #[tokio::test]
    async fn expired_content_resets_playlist_and_survives_rescan() {
        let tmp = tempfile::tempdir().unwrap();
        let (registry, refresher) = setup(tmp.path(), false);
        refresher.refresh("pl1").await.unwrap();

        let entry = registry.get("pl1").unwrap();
        let dir = entry.read().download_dir.clone();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Radiohead - Karma Police.mp3"), b"x").unwrap();
        status::reconcile(&entry).await.unwrap();
        assert_eq!(entry.read().downloaded_count, 1);

        // Backdate the content stamp past the TTL and sweep.
        entry.write().last_content_at = Some(Utc::now() - TimeDelta::hours(2));
        let jobs = Arc::new(JobRegistry::new(tmp.path().join("jobs")));
        let scheduler = CleanupScheduler::new(registry.clone(), jobs, TimeDelta::hours(1));
        let (cleared, _) = scheduler.run_sweep().await;
        assert_eq!(cleared, 1);

        {
            let playlist = entry.read();
            assert_eq!(playlist.downloaded_count, 0);
            assert!(playlist.last_content_at.is_none());
            assert!(playlist
                .tracks
                .iter()
                .all(|t| t.local_status == TrackStatus::Pending));
        }
        assert!(dir.exists());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);

        // A later periodic scan of the now-empty directory changes nothing.
        status::reconcile(&entry).await.unwrap();
        assert_eq!(entry.read().downloaded_count, 0);
        assert!(entry.read().last_content_at.is_none());
    }
}
