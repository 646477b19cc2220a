//! Spotify Web API metadata client.
//!
//! Uses the client-credentials flow: playlist metadata and track listings do
//! not need user authorization, only an application token. Tokens are cached
//! until shortly before expiry and refreshed on demand.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use super::{MetadataProvider, PlaylistMetadata, TrackMetadata};
use crate::{Error, Result};

const ACCOUNTS_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Tracks page size; the API caps playlist track pages at 100.
const TRACKS_PAGE_LIMIT: usize = 100;

/// Refresh the cached token this long before it actually expires.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Spotify Web API client implementing [`MetadataProvider`].
pub struct SpotifyClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    token_url: String,
    api_base: String,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyClient {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: ACCOUNTS_TOKEN_URL.to_string(),
            api_base: API_BASE_URL.to_string(),
            token: Mutex::new(None),
        }
    }

    /// Return a valid access token, refreshing the cache when needed.
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;

        let margin = TimeDelta::seconds(TOKEN_EXPIRY_MARGIN_SECS);
        if let Some(token) = cached.as_ref()
            && token.expires_at - margin > Utc::now()
        {
            return Ok(token.access_token.clone());
        }

        debug!("Requesting Spotify client-credentials token");
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| Error::api(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::api(format!(
                "token request returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::api(format!("invalid token response: {e}")))?;

        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Utc::now() + TimeDelta::seconds(token.expires_in),
        });

        Ok(access_token)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::api(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::api(format!("{url} returned {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| Error::api(format!("invalid response from {url}: {e}")))
    }
}

#[async_trait]
impl MetadataProvider for SpotifyClient {
    /// Accepts `open.spotify.com/playlist/<id>` URLs (with or without query
    /// string or locale prefix) and `spotify:playlist:<id>` URIs.
    fn extract_identifier(&self, raw: &str) -> Option<String> {
        extract_playlist_id(raw)
    }

    async fn get_metadata(&self, id: &str) -> Result<PlaylistMetadata> {
        let url = format!(
            "{}/playlists/{id}?fields=name,description,external_urls.spotify,owner.display_name,images.url,tracks.total",
            self.api_base
        );
        let dto: PlaylistDto = self.get_json(&url).await?;
        Ok(dto.into())
    }

    async fn get_tracks(&self, id: &str) -> Result<Vec<TrackMetadata>> {
        let mut tracks = Vec::new();
        let mut next = Some(format!(
            "{}/playlists/{id}/tracks?limit={TRACKS_PAGE_LIMIT}&fields=next,items.track(name,artists.name)",
            self.api_base
        ));

        while let Some(url) = next {
            let page: TracksPageDto = self.get_json(&url).await?;
            tracks.extend(page.items.into_iter().filter_map(|item| {
                // Deleted or locally unavailable entries come back null.
                let track = item.track?;
                Some(TrackMetadata {
                    name: track.name,
                    artists: track
                        .artists
                        .into_iter()
                        .map(|a| a.name)
                        .collect::<Vec<_>>()
                        .join(", "),
                })
            }));
            next = page.next;
        }

        Ok(tracks)
    }
}

/// Extract a playlist id from a share URL or URI.
fn extract_playlist_id(raw: &str) -> Option<String> {
    let raw = raw.trim();

    if let Some(rest) = raw.strip_prefix("spotify:playlist:") {
        return valid_id(rest);
    }

    let parsed = Url::parse(raw).ok()?;
    if !parsed
        .host_str()
        .is_some_and(|host| host == "open.spotify.com" || host.ends_with(".spotify.com"))
    {
        return None;
    }

    let segments: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();
    // Either /playlist/<id> or a locale-prefixed /intl-xx/playlist/<id>.
    let position = segments.iter().position(|s| *s == "playlist")?;
    valid_id(segments.get(position + 1)?)
}

fn valid_id(candidate: &str) -> Option<String> {
    (!candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| candidate.to_string())
}

// ========== Wire DTOs ==========

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct PlaylistDto {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    owner: Option<OwnerDto>,
    #[serde(default)]
    images: Option<Vec<ImageDto>>,
    #[serde(default)]
    tracks: Option<TracksTotalDto>,
    #[serde(default)]
    external_urls: Option<ExternalUrlsDto>,
}

#[derive(Debug, Deserialize)]
struct OwnerDto {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageDto {
    url: String,
}

#[derive(Debug, Deserialize)]
struct TracksTotalDto {
    #[serde(default)]
    total: usize,
}

#[derive(Debug, Deserialize)]
struct ExternalUrlsDto {
    #[serde(default)]
    spotify: Option<String>,
}

impl From<PlaylistDto> for PlaylistMetadata {
    fn from(dto: PlaylistDto) -> Self {
        PlaylistMetadata {
            name: dto.name,
            owner: dto
                .owner
                .and_then(|o| o.display_name)
                .unwrap_or_default(),
            description: dto.description.unwrap_or_default(),
            tracks_total: dto.tracks.map(|t| t.total).unwrap_or_default(),
            url: dto
                .external_urls
                .and_then(|u| u.spotify)
                .unwrap_or_default(),
            images: dto
                .images
                .unwrap_or_default()
                .into_iter()
                .map(|i| i.url)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TracksPageDto {
    #[serde(default)]
    items: Vec<TrackItemDto>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackItemDto {
    #[serde(default)]
    track: Option<TrackDto>,
}

#[derive(Debug, Deserialize)]
struct TrackDto {
    name: String,
    #[serde(default)]
    artists: Vec<ArtistDto>,
}

#[derive(Debug, Deserialize)]
struct ArtistDto {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_identifier_from_share_url() {
        assert_eq!(
            extract_playlist_id(
                "https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M?si=abc123"
            ),
            Some("37i9dQZF1DXcBWIGoYBM5M".to_string())
        );
    }

    #[test]
    fn test_extract_identifier_locale_prefixed() {
        assert_eq!(
            extract_playlist_id("https://open.spotify.com/intl-de/playlist/37i9dQZF1DXcBWIGoYBM5M"),
            Some("37i9dQZF1DXcBWIGoYBM5M".to_string())
        );
    }

    #[test]
    fn test_extract_identifier_from_uri() {
        assert_eq!(
            extract_playlist_id("spotify:playlist:37i9dQZF1DXcBWIGoYBM5M"),
            Some("37i9dQZF1DXcBWIGoYBM5M".to_string())
        );
    }

    #[test]
    fn test_extract_identifier_rejects_foreign_urls() {
        assert_eq!(extract_playlist_id("https://example.com/playlist/abc"), None);
        assert_eq!(
            extract_playlist_id("https://open.spotify.com/album/abc123"),
            None
        );
        assert_eq!(extract_playlist_id("not a url"), None);
    }

    #[test]
    fn test_playlist_dto_maps_to_metadata() {
        let json = serde_json::json!({
            "name": "Road Trip",
            "description": "Windows down",
            "owner": { "display_name": "maia" },
            "images": [{ "url": "https://i.scdn.co/cover.jpg" }],
            "tracks": { "total": 42 },
            "external_urls": { "spotify": "https://open.spotify.com/playlist/x" }
        });
        let dto: PlaylistDto = serde_json::from_value(json).unwrap();
        let metadata = PlaylistMetadata::from(dto);

        assert_eq!(metadata.name, "Road Trip");
        assert_eq!(metadata.owner, "maia");
        assert_eq!(metadata.tracks_total, 42);
        assert_eq!(metadata.images, vec!["https://i.scdn.co/cover.jpg"]);
    }

    #[test]
    fn test_playlist_dto_tolerates_sparse_fields() {
        let dto: PlaylistDto = serde_json::from_value(serde_json::json!({
            "name": "Bare"
        }))
        .unwrap();
        let metadata = PlaylistMetadata::from(dto);
        assert_eq!(metadata.name, "Bare");
        assert_eq!(metadata.tracks_total, 0);
        assert!(metadata.images.is_empty());
    }

    #[test]
    fn test_tracks_page_skips_null_tracks() {
        let json = serde_json::json!({
            "items": [
                { "track": { "name": "Karma Police", "artists": [{ "name": "Radiohead" }] } },
                { "track": null },
                { "track": { "name": "Halo", "artists": [{ "name": "Beyoncé" }, { "name": "Someone" }] } }
            ],
            "next": null
        });
        let page: TracksPageDto = serde_json::from_value(json).unwrap();
        let tracks: Vec<TrackMetadata> = page
            .items
            .into_iter()
            .filter_map(|item| {
                let track = item.track?;
                Some(TrackMetadata {
                    name: track.name,
                    artists: track
                        .artists
                        .into_iter()
                        .map(|a| a.name)
                        .collect::<Vec<_>>()
                        .join(", "),
                })
            })
            .collect();

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[1].artists, "Beyoncé, Someone");
    }
}
