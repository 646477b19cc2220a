//! Playlist domain types.
//!
//! A [`Playlist`] is the unit of state in the dashboard: display metadata
//! pulled from the metadata API, the current track list with per-track
//! download status, sync lifecycle state, and a bounded log buffer capturing
//! downloader output. Entries live in the [`registry`] for the lifetime of
//! the process; they are content-cleared by the cleanup sweep, never deleted.

pub mod refresher;
pub mod registry;
pub mod status;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Maximum retained log lines per playlist; oldest evicted first.
pub const MAX_LOG_LINES: usize = 500;

/// Placeholder display name until the first successful metadata refresh.
pub const PLACEHOLDER_NAME: &str = "Unknown playlist";

/// Sync lifecycle state of a playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistStatus {
    Idle,
    Syncing,
    Error,
}

/// Local download state of a single track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackStatus {
    Pending,
    Downloaded,
}

/// One track of a playlist, as last reported by the metadata API.
#[derive(Debug, Clone)]
pub struct Track {
    pub name: String,
    pub artists: String,
    /// Normalized match key; recomputed whenever the track is materialized
    /// from metadata.
    pub key: String,
    /// Recomputed only by download-status reconciliation, never by a
    /// metadata refresh.
    pub local_status: TrackStatus,
}

impl Track {
    /// Materialize a track from metadata with a freshly derived key.
    pub fn from_metadata(name: impl Into<String>, artists: impl Into<String>) -> Self {
        let name = name.into();
        let artists = artists.into();
        let key = crate::matcher::track_key(&artists, &name);
        Self {
            name,
            artists,
            key,
            local_status: TrackStatus::Pending,
        }
    }
}

/// Which output stream a log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// A timestamped, stream-tagged downloader log line.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub at: DateTime<Utc>,
    pub stream: LogStream,
    pub line: String,
}

/// Marker for a live downloader process owned by this playlist.
///
/// The child itself is owned by the supervisor's waiter task; the registry
/// entry only needs to know that one exists (single-flight) and how to
/// describe it.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
}

/// In-memory state of one tracked playlist.
#[derive(Debug)]
pub struct Playlist {
    /// Stable external identifier; the registry key. Immutable.
    pub id: String,
    /// Source URL; refreshed from metadata.
    pub url: String,
    pub name: String,
    pub owner: String,
    pub description: String,
    pub images: Vec<String>,
    /// Expected track count. Sticky: a metadata refresh reporting zero does
    /// not shrink it; reconciliation falls back to the locally computed
    /// total when it was never set.
    pub tracks_total: usize,
    /// Fully replaced (never merged) by each metadata refresh.
    pub tracks: Vec<Track>,
    pub status: PlaylistStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_metadata_refresh_at: Option<DateTime<Utc>>,
    /// Stamped by download-status reconciliation when content exists;
    /// cleared only by the cleanup sweep.
    pub last_content_at: Option<DateTime<Utc>>,
    /// Derived; recomputed on every status reconciliation.
    pub downloaded_count: usize,
    /// Cleared on successful metadata refresh, set on sync or refresh
    /// failure.
    pub error_message: Option<String>,
    /// Owned exclusively by this playlist; a pure function of `id`.
    pub download_dir: PathBuf,
    /// At most one live downloader process at any time.
    pub process: Option<ProcessHandle>,
    pub logs: VecDeque<LogLine>,
    /// Provenance: configured at boot vs. added through the API. Never
    /// changes after creation.
    pub is_manual: bool,
    /// Registry insertion sequence; orders summary projections.
    pub seq: u64,
    /// Guards against overlapping metadata refreshes of the same playlist.
    pub refresh_in_flight: bool,
}

impl Playlist {
    pub fn new(id: impl Into<String>, url: impl Into<String>, is_manual: bool, root: &Path) -> Self {
        let id = id.into();
        let dir = download_dir(root, &id);
        Self {
            id,
            url: url.into(),
            name: PLACEHOLDER_NAME.to_string(),
            owner: String::new(),
            description: String::new(),
            images: Vec::new(),
            tracks_total: 0,
            tracks: Vec::new(),
            status: PlaylistStatus::Idle,
            last_sync_at: None,
            last_metadata_refresh_at: None,
            last_content_at: None,
            downloaded_count: 0,
            error_message: None,
            download_dir: dir,
            process: None,
            logs: VecDeque::new(),
            is_manual,
            seq: 0,
            refresh_in_flight: false,
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

    /// Whether a downloader process is currently attached.
    pub fn is_syncing(&self) -> bool {
        self.process.is_some()
    }
}

/// The download directory for a playlist id: `root/<id>`.
///
/// Deterministic so state can be rebuilt from the filesystem at boot, and
/// collision-free because ids are unique in the registry.
pub fn download_dir(root: &Path, id: &str) -> PathBuf {
    root.join(id)
}
