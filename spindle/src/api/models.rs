//! API request and response models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::jobs::{Job, JobStatus};
use crate::playlist::registry::PlaylistSummary;
use crate::playlist::{LogLine, LogStream, Playlist, PlaylistStatus, Track, TrackStatus};

/// Request body for adding a playlist by URL.
#[derive(Debug, Clone, Deserialize)]
pub struct AddPlaylistRequest {
    /// Playlist share URL (or URI) to track.
    pub url: String,
}

/// Request body for starting an ad hoc download job.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateJobRequest {
    /// URL handed verbatim to the downloader.
    pub url: String,
}

/// One playlist in the list view.
#[derive(Debug, Clone, Serialize)]
pub struct PlaylistSummaryResponse {
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

impl From<PlaylistSummary> for PlaylistSummaryResponse {
    fn from(summary: PlaylistSummary) -> Self {
        Self {
            id: summary.id,
            url: summary.url,
            name: summary.name,
            owner: summary.owner,
            images: summary.images,
            tracks_total: summary.tracks_total,
            downloaded_count: summary.downloaded_count,
            status: summary.status,
            error_message: summary.error_message,
            last_sync_at: summary.last_sync_at,
            last_metadata_refresh_at: summary.last_metadata_refresh_at,
            is_manual: summary.is_manual,
        }
    }
}

/// One track in the detail view.
#[derive(Debug, Clone, Serialize)]
pub struct TrackResponse {
    pub name: String,
    pub artists: String,
    pub status: TrackStatus,
}

impl From<&Track> for TrackResponse {
    fn from(track: &Track) -> Self {
        Self {
            name: track.name.clone(),
            artists: track.artists.clone(),
            status: track.local_status,
        }
    }
}

/// Full playlist detail including the track list.
#[derive(Debug, Clone, Serialize)]
pub struct PlaylistDetailResponse {
    pub id: String,
    pub url: String,
    pub name: String,
    pub owner: String,
    pub description: String,
    pub images: Vec<String>,
    pub tracks_total: usize,
    pub downloaded_count: usize,
    pub status: PlaylistStatus,
    pub error_message: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_metadata_refresh_at: Option<DateTime<Utc>>,
    pub last_content_at: Option<DateTime<Utc>>,
    pub is_manual: bool,
    pub tracks: Vec<TrackResponse>,
}

impl From<&Playlist> for PlaylistDetailResponse {
    fn from(playlist: &Playlist) -> Self {
        Self {
            id: playlist.id.clone(),
            url: playlist.url.clone(),
            name: playlist.name.clone(),
            owner: playlist.owner.clone(),
            description: playlist.description.clone(),
            images: playlist.images.clone(),
            tracks_total: playlist.tracks_total,
            downloaded_count: playlist.downloaded_count,
            status: playlist.status,
            error_message: playlist.error_message.clone(),
            last_sync_at: playlist.last_sync_at,
            last_metadata_refresh_at: playlist.last_metadata_refresh_at,
            last_content_at: playlist.last_content_at,
            is_manual: playlist.is_manual,
            tracks: playlist.tracks.iter().map(TrackResponse::from).collect(),
        }
    }
}

/// One captured downloader log line.
#[derive(Debug, Clone, Serialize)]
pub struct LogLineResponse {
    pub at: DateTime<Utc>,
    pub stream: LogStream,
    pub line: String,
}

impl From<&LogLine> for LogLineResponse {
    fn from(line: &LogLine) -> Self {
        Self {
            at: line.at,
            stream: line.stream,
            line: line.line.clone(),
        }
    }
}

/// One ad hoc download job.
#[derive(Debug, Clone, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub url: String,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Job> for JobResponse {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            url: job.url.clone(),
            status: job.status,
            error_message: job.error_message.clone(),
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub playlists: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_detail_response_from_playlist() {
        let mut playlist = Playlist::new("abc", "https://example.com/p/abc", true, Path::new("/d"));
        playlist.tracks = vec![Track::from_metadata("Karma Police", "Radiohead")];
        playlist.tracks_total = 1;

        let response = PlaylistDetailResponse::from(&playlist);
        assert_eq!(response.id, "abc");
        assert_eq!(response.tracks.len(), 1);
        assert_eq!(response.tracks[0].status, TrackStatus::Pending);
        assert!(response.is_manual);
    }

    #[test]
    fn test_detail_response_serializes_status_lowercase() {
        let playlist = Playlist::new("abc", "url", false, Path::new("/d"));
        let json = serde_json::to_value(PlaylistDetailResponse::from(&playlist)).unwrap();
        assert_eq!(json["status"], "idle");
        assert_eq!(json["downloaded_count"], 0);
    }

    #[test]
    fn test_add_playlist_request_deserializes() {
        let request: AddPlaylistRequest =
            serde_json::from_str(r#"{"url":"https://open.spotify.com/playlist/x"}"#).unwrap();
        assert_eq!(request.url, "https://open.spotify.com/playlist/x");
    }
}
