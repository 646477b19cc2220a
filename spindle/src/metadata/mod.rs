//! Metadata API abstraction.
//!
//! The reconcilers depend on this trait, never on a concrete client, so tests
//! inject stub providers. The shipped implementation is [`spotify::SpotifyClient`].

pub mod spotify;

use async_trait::async_trait;

use crate::Result;

/// Playlist-level metadata as reported by the remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistMetadata {
    pub name: String,
    pub owner: String,
    pub description: String,
    /// Reported track count; may be zero on transient API gaps.
    pub tracks_total: usize,
    /// Canonical playlist URL.
    pub url: String,
    pub images: Vec<String>,
}

/// One track as reported by the remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    pub name: String,
    /// Artist names joined into one display string.
    pub artists: String,
}

/// Remote metadata API client contract.
///
/// All failures (network, auth, unknown identifier) surface as
/// [`crate::Error::Api`]; background refresh recovers from them locally.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Extract the stable playlist identifier from a user-supplied URL.
    fn extract_identifier(&self, url: &str) -> Option<String>;

    /// Fetch playlist-level metadata.
    async fn get_metadata(&self, id: &str) -> Result<PlaylistMetadata>;

    /// Fetch the ordered track list.
    async fn get_tracks(&self, id: &str) -> Result<Vec<TrackMetadata>>;
}
