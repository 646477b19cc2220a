//! Runtime configuration.
//!
//! All settings come from environment variables (a `.env` file is honored via
//! `dotenvy` in `main`). Intervals use `0` to mean "disabled".

use std::path::PathBuf;
use std::time::Duration;

/// Default metadata refresh interval in minutes.
const DEFAULT_REFRESH_MINUTES: u64 = 30;

/// Default download-scan interval in seconds.
const DEFAULT_SCAN_SECONDS: u64 = 60;

/// Default content time-to-live in hours.
const DEFAULT_CONTENT_TTL_HOURS: u64 = 24;

/// Default cleanup sweep interval in seconds.
const DEFAULT_CLEANUP_INTERVAL_SECONDS: u64 = 3600;

/// Runtime settings for the dashboard.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Playlists tracked from boot (each URL is resolved to an identifier).
    pub playlist_urls: Vec<String>,
    /// Metadata refresh interval in minutes. 0 disables the periodic refresh.
    pub metadata_refresh_minutes: u64,
    /// Download-status scan interval in seconds. 0 disables the periodic scan.
    pub download_scan_seconds: u64,
    /// Root directory holding one subdirectory per playlist (and `jobs/`).
    pub download_root: PathBuf,
    /// Downloader executable name or path.
    pub downloader_bin: String,
    /// Extra arguments appended to every downloader invocation.
    pub downloader_extra_args: Vec<String>,
    /// Content time-to-live in hours. 0 disables the cleanup sweep.
    pub content_ttl_hours: u64,
    /// Interval between cleanup sweeps in seconds.
    pub cleanup_interval_seconds: u64,
    /// API server bind address.
    pub bind_address: String,
    /// API server port.
    pub port: u16,
    /// Spotify application client id (client-credentials flow).
    pub spotify_client_id: Option<String>,
    /// Spotify application client secret.
    pub spotify_client_secret: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            playlist_urls: Vec::new(),
            metadata_refresh_minutes: DEFAULT_REFRESH_MINUTES,
            download_scan_seconds: DEFAULT_SCAN_SECONDS,
            download_root: PathBuf::from("downloads"),
            downloader_bin: "spotdl".to_string(),
            downloader_extra_args: Vec::new(),
            content_ttl_hours: DEFAULT_CONTENT_TTL_HOURS,
            cleanup_interval_seconds: DEFAULT_CLEANUP_INTERVAL_SECONDS,
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            spotify_client_id: None,
            spotify_client_secret: None,
        }
    }
}

impl Settings {
    /// Load settings from environment variables, falling back to defaults.
    ///
    /// Supported env vars:
    /// - `PLAYLIST_URLS` (comma-separated playlist URLs)
    /// - `METADATA_REFRESH_MINUTES` (0 disables)
    /// - `DOWNLOAD_SCAN_SECONDS` (0 disables)
    /// - `DOWNLOAD_ROOT` (default "downloads")
    /// - `DOWNLOADER_BIN` (default "spotdl")
    /// - `DOWNLOADER_EXTRA_ARGS` (whitespace-separated)
    /// - `CONTENT_TTL_HOURS` (0 disables cleanup)
    /// - `CLEANUP_INTERVAL_SECONDS`
    /// - `API_BIND_ADDRESS`, `API_PORT`
    /// - `SPOTIFY_CLIENT_ID`, `SPOTIFY_CLIENT_SECRET`
    pub fn from_env_or_default() -> Self {
        let mut settings = Self::default();

        if let Ok(urls) = std::env::var("PLAYLIST_URLS") {
            settings.playlist_urls = parse_url_list(&urls);
        }
        if let Some(minutes) = env_u64("METADATA_REFRESH_MINUTES") {
            settings.metadata_refresh_minutes = minutes;
        }
        if let Some(seconds) = env_u64("DOWNLOAD_SCAN_SECONDS") {
            settings.download_scan_seconds = seconds;
        }
        if let Ok(root) = std::env::var("DOWNLOAD_ROOT")
            && !root.trim().is_empty()
        {
            settings.download_root = PathBuf::from(root);
        }
        if let Ok(bin) = std::env::var("DOWNLOADER_BIN")
            && !bin.trim().is_empty()
        {
            settings.downloader_bin = bin;
        }
        if let Ok(args) = std::env::var("DOWNLOADER_EXTRA_ARGS") {
            settings.downloader_extra_args = parse_arg_list(&args);
        }
        if let Some(hours) = env_u64("CONTENT_TTL_HOURS") {
            settings.content_ttl_hours = hours;
        }
        if let Some(seconds) = env_u64("CLEANUP_INTERVAL_SECONDS") {
            settings.cleanup_interval_seconds = seconds;
        }
        if let Ok(bind_address) = std::env::var("API_BIND_ADDRESS")
            && !bind_address.trim().is_empty()
        {
            settings.bind_address = bind_address;
        }
        if let Ok(port) = std::env::var("API_PORT")
            && let Ok(parsed) = port.parse::<u16>()
        {
            settings.port = parsed;
        }
        settings.spotify_client_id = env_non_empty("SPOTIFY_CLIENT_ID");
        settings.spotify_client_secret = env_non_empty("SPOTIFY_CLIENT_SECRET");

        settings
    }

    /// Metadata refresh interval, or `None` when disabled.
    pub fn metadata_refresh_interval(&self) -> Option<Duration> {
        (self.metadata_refresh_minutes > 0)
            .then(|| Duration::from_secs(self.metadata_refresh_minutes * 60))
    }

    /// Download scan interval, or `None` when disabled.
    pub fn download_scan_interval(&self) -> Option<Duration> {
        (self.download_scan_seconds > 0).then(|| Duration::from_secs(self.download_scan_seconds))
    }

    /// Content TTL, or `None` when cleanup is disabled.
    pub fn content_ttl(&self) -> Option<chrono::TimeDelta> {
        (self.content_ttl_hours > 0)
            .then(|| chrono::TimeDelta::hours(self.content_ttl_hours as i64))
    }

    /// Interval between cleanup sweeps.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds.max(1))
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Split a comma-separated URL list, dropping empty entries.
fn parse_url_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Split a whitespace-separated argument list.
fn parse_arg_list(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(|s| s.to_string()).collect()
}
