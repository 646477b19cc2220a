//! Metadata refresh and reconciliation.
//!
//! Pulls fresh metadata and the track list from the remote API, merges them
//! into the playlist entry (tracks are replaced wholesale, never patched),
//! and finishes by reconciling download status so the new track list gets
//! its local statuses immediately. Runs once per configured playlist at
//! boot (fire-and-forget, independent failures) and periodically across all
//! known playlists.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Track;
use super::registry::{PlaylistRegistry, SharedPlaylist};
use super::status;
use crate::metadata::MetadataProvider;
use crate::{Error, Result};

/// Metadata reconciler over the playlist registry.
pub struct MetadataRefresher {
    registry: Arc<PlaylistRegistry>,
    provider: Arc<dyn MetadataProvider>,
}

impl MetadataRefresher {
    pub fn new(registry: Arc<PlaylistRegistry>, provider: Arc<dyn MetadataProvider>) -> Self {
        Self { registry, provider }
    }

    /// Refresh one playlist by id.
    ///
    /// On failure the previous metadata and tracks are left untouched; only
    /// `error_message` records what went wrong.
    pub async fn refresh(&self, id: &str) -> Result<()> {
        let entry = self
            .registry
            .get(id)
            .ok_or_else(|| Error::not_found("Playlist", id))?;
        self.refresh_entry(&entry).await
    }

    async fn refresh_entry(&self, entry: &SharedPlaylist) -> Result<()> {
        {
            let mut playlist = entry.write();
            if playlist.refresh_in_flight {
                debug!(playlist = %playlist.id, "Refresh already in flight; skipping");
                return Ok(());
            }
            playlist.refresh_in_flight = true;
        }

        let result = self.fetch_and_apply(entry).await;
        entry.write().refresh_in_flight = false;
        result
    }

    async fn fetch_and_apply(&self, entry: &SharedPlaylist) -> Result<()> {
        let id = entry.read().id.clone();

        let fetched = async {
            let metadata = self.provider.get_metadata(&id).await?;
            let tracks = self.provider.get_tracks(&id).await?;
            Ok::<_, Error>((metadata, tracks))
        }
        .await;

        match fetched {
            Ok((metadata, track_list)) => {
                {
                    let mut playlist = entry.write();
                    playlist.name = metadata.name;
                    playlist.owner = metadata.owner;
                    playlist.description = metadata.description;
                    playlist.images = metadata.images;
                    if !metadata.url.is_empty() {
                        playlist.url = metadata.url;
                    }
                    // Sticky total: a zero from the API never shrinks what we
                    // already know; fall back to the fetched list length.
                    if metadata.tracks_total > 0 {
                        playlist.tracks_total = metadata.tracks_total;
                    } else if playlist.tracks_total == 0 {
                        playlist.tracks_total = track_list.len();
                    }
                    playlist.tracks = track_list
                        .iter()
                        .map(|t| Track::from_metadata(&t.name, &t.artists))
                        .collect();
                    playlist.last_metadata_refresh_at = Some(Utc::now());
                    playlist.error_message = None;

                    debug!(
                        playlist = %playlist.id,
                        tracks = playlist.tracks.len(),
                        "Metadata refreshed"
                    );
                }

                // Freshly replaced tracks are all pending until reconciled.
                status::reconcile(entry).await
            }
            Err(e) => {
                let mut playlist = entry.write();
                playlist.error_message = Some(e.to_string());
                warn!(playlist = %playlist.id, error = %e, "Metadata refresh failed");
                Err(e)
            }
        }
    }

    /// Refresh every playlist sequentially; failures are already recorded on
    /// the entries, so they are only logged here.
    pub async fn refresh_all(&self) {
        for entry in self.registry.all() {
            if let Err(e) = self.refresh_entry(&entry).await {
                let id = entry.read().id.clone();
                debug!(playlist = %id, error = %e, "Periodic refresh failed");
            }
        }
    }

    /// Fire one refresh per playlist without blocking the caller.
    ///
    /// Used at boot: startup must not wait for the metadata API, and each
    /// playlist's failure is independent.
    pub fn spawn_initial_refreshes(self: &Arc<Self>) {
        for entry in self.registry.all() {
            let refresher = self.clone();
            let id = entry.read().id.clone();
            tokio::spawn(async move {
                if let Err(e) = refresher.refresh(&id).await {
                    warn!(playlist = %id, error = %e, "Initial metadata refresh failed");
                }
            });
        }
    }

    /// Start the periodic refresh task.
    pub fn start_background_task(self: &Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let refresher = self.clone();

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            // The immediate first tick duplicates the boot refreshes.
            tick.tick().await;
            info!(
                interval_secs = interval.as_secs(),
                "Metadata refresh loop started"
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Metadata refresh loop shutting down");
                        break;
                    }
                    _ = tick.tick() => {
                        refresher.refresh_all().await;
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{PlaylistMetadata, TrackMetadata};
    use crate::playlist::{PLACEHOLDER_NAME, TrackStatus};
    use async_trait::async_trait;

    struct StubProvider {
        metadata: PlaylistMetadata,
        tracks: Vec<TrackMetadata>,
        fail: bool,
    }

    impl StubProvider {
        fn succeeding(tracks_total: usize, tracks: Vec<TrackMetadata>) -> Self {
            Self {
                metadata: PlaylistMetadata {
                    name: "Evening Mix".to_string(),
                    owner: "sam".to_string(),
                    description: "slow ones".to_string(),
                    tracks_total,
                    url: "https://open.spotify.com/playlist/pl1".to_string(),
                    images: vec!["https://img/cover.jpg".to_string()],
                },
                tracks,
                fail: false,
            }
        }

        fn failing() -> Self {
            let mut stub = Self::succeeding(0, Vec::new());
            stub.fail = true;
            stub
        }
    }

    #[async_trait]
    impl MetadataProvider for StubProvider {
        fn extract_identifier(&self, _url: &str) -> Option<String> {
            Some("pl1".to_string())
        }

        async fn get_metadata(&self, _id: &str) -> Result<PlaylistMetadata> {
            if self.fail {
                return Err(Error::api("simulated network failure"));
            }
            Ok(self.metadata.clone())
        }

        async fn get_tracks(&self, _id: &str) -> Result<Vec<TrackMetadata>> {
            if self.fail {
                return Err(Error::api("simulated network failure"));
            }
            Ok(self.tracks.clone())
        }
    }

    fn track(name: &str, artists: &str) -> TrackMetadata {
        TrackMetadata {
            name: name.to_string(),
            artists: artists.to_string(),
        }
    }

    fn setup(provider: StubProvider) -> (Arc<PlaylistRegistry>, Arc<MetadataRefresher>, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let registry = Arc::new(PlaylistRegistry::new(tmp.path()));
        registry.get_or_create("pl1", "https://configured.example/pl1", false);
        let refresher = Arc::new(MetadataRefresher::new(registry.clone(), Arc::new(provider)));
        (registry, refresher, tmp)
    }

    #[tokio::test]
    async fn test_successful_refresh_replaces_tracks() {
        let provider = StubProvider::succeeding(
            3,
            vec![track("One", "A"), track("Two", "B"), track("Three", "C")],
        );
        let (registry, refresher, _tmp) = setup(provider);

        refresher.refresh("pl1").await.unwrap();

        let entry = registry.get("pl1").unwrap();
        let playlist = entry.read();
        assert_eq!(playlist.name, "Evening Mix");
        assert_eq!(playlist.owner, "sam");
        assert_eq!(playlist.tracks.len(), 3);
        assert_eq!(playlist.tracks_total, 3);
        assert!(playlist.error_message.is_none());
        assert!(playlist.last_metadata_refresh_at.is_some());
        // No files on disk: reconciliation leaves everything pending.
        assert_eq!(playlist.downloaded_count, 0);
        assert!(playlist
            .tracks
            .iter()
            .all(|t| t.local_status == TrackStatus::Pending));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_state() {
        let (registry, refresher, _tmp) = setup(StubProvider::failing());

        let err = refresher.refresh("pl1").await.unwrap_err();
        assert!(matches!(err, Error::Api(_)));

        let entry = registry.get("pl1").unwrap();
        let playlist = entry.read();
        assert_eq!(playlist.name, PLACEHOLDER_NAME);
        assert!(playlist.tracks.is_empty());
        assert!(playlist.last_metadata_refresh_at.is_none());
        let message = playlist.error_message.as_deref().unwrap();
        assert!(message.contains("simulated network failure"));
    }

    #[tokio::test]
    async fn test_refresh_clears_previous_error() {
        let provider = StubProvider::succeeding(1, vec![track("One", "A")]);
        let (registry, refresher, _tmp) = setup(provider);
        registry
            .get("pl1")
            .unwrap()
            .write()
            .error_message = Some("stale failure".to_string());

        refresher.refresh("pl1").await.unwrap();

        assert!(registry.get("pl1").unwrap().read().error_message.is_none());
    }

    #[tokio::test]
    async fn test_zero_total_falls_back_to_track_count() {
        let provider = StubProvider::succeeding(0, vec![track("One", "A"), track("Two", "B")]);
        let (registry, refresher, _tmp) = setup(provider);

        refresher.refresh("pl1").await.unwrap();

        assert_eq!(registry.get("pl1").unwrap().read().tracks_total, 2);
    }

    #[tokio::test]
    async fn test_zero_total_never_shrinks_existing() {
        let provider = StubProvider::succeeding(0, vec![track("One", "A")]);
        let (registry, refresher, _tmp) = setup(provider);
        registry.get("pl1").unwrap().write().tracks_total = 12;

        refresher.refresh("pl1").await.unwrap();

        assert_eq!(registry.get("pl1").unwrap().read().tracks_total, 12);
    }

    #[tokio::test]
    async fn test_refresh_unknown_playlist_is_not_found() {
        let (_registry, refresher, _tmp) =
            setup(StubProvider::succeeding(0, Vec::new()));
        let err = refresher.refresh("missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
