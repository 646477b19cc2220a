//! In-memory playlist registry.
//!
//! The single source of truth for playlist state during runtime. Identity is
//! the playlist id and nothing else; entries are created lazily on first
//! reference and live for the process lifetime. There is no persistence:
//! the registry is rebuilt from configuration, the filesystem, and the
//! metadata API on each boot.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use super::{Playlist, PlaylistStatus};

/// A registry entry; mutated in place by whichever task holds the lock.
pub type SharedPlaylist = Arc<RwLock<Playlist>>;

/// Snapshot projection of one playlist for list views. No live references.
#[derive(Debug, Clone)]
pub struct PlaylistSummary {
    pub id: String,
    pub url: String,
    pub name: String,
    pub owner: String,
    pub images: Vec<String>,
    pub tracks_total: usize,
    pub downloaded_count: usize,
    pub status: PlaylistStatus,
    pub error_message: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_metadata_refresh_at: Option<DateTime<Utc>>,
    pub is_manual: bool,
}

/// Identity-keyed in-memory playlist store.
pub struct PlaylistRegistry {
    entries: DashMap<String, SharedPlaylist>,
    download_root: PathBuf,
    next_seq: AtomicU64,
}

impl PlaylistRegistry {
    pub fn new(download_root: impl Into<PathBuf>) -> Self {
        Self {
            entries: DashMap::new(),
            download_root: download_root.into(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Root directory under which every playlist owns one subdirectory.
    pub fn download_root(&self) -> &Path {
        &self.download_root
    }

    /// Get an existing entry or create a fresh one.
    ///
    /// Idempotent: when the id is already present the existing entry is
    /// returned unchanged; `url` and `is_manual` do NOT overwrite what the
    /// first creation recorded.
    pub fn get_or_create(&self, id: &str, url: &str, is_manual: bool) -> SharedPlaylist {
        self.entries
            .entry(id.to_string())
            .or_insert_with(|| {
                debug!(playlist = %id, manual = is_manual, "Registering playlist");
                let mut playlist = Playlist::new(id, url, is_manual, &self.download_root);
                playlist.seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                Arc::new(RwLock::new(playlist))
            })
            .clone()
    }

    /// Look up the live entry for an id.
    pub fn get(&self, id: &str) -> Option<SharedPlaylist> {
        self.entries.get(id).map(|entry| entry.clone())
    }

    /// All entries in first-creation order.
    pub fn all(&self) -> Vec<SharedPlaylist> {
        let mut entries: Vec<SharedPlaylist> =
            self.entries.iter().map(|entry| entry.clone()).collect();
        entries.sort_by_key(|entry| entry.read().seq);
        entries
    }

    /// Snapshot summaries in first-creation order.
    pub fn summaries(&self) -> Vec<PlaylistSummary> {
        self.all()
            .into_iter()
            .map(|entry| {
                let playlist = entry.read();
                PlaylistSummary {
                    id: playlist.id.clone(),
                    url: playlist.url.clone(),
                    name: playlist.name.clone(),
                    owner: playlist.owner.clone(),
                    images: playlist.images.clone(),
                    tracks_total: playlist.tracks_total,
                    downloaded_count: playlist.downloaded_count,
                    status: playlist.status,
                    error_message: playlist.error_message.clone(),
                    last_sync_at: playlist.last_sync_at,
                    last_metadata_refresh_at: playlist.last_metadata_refresh_at,
                    is_manual: playlist.is_manual,
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
