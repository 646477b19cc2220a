use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use spindle::api::server::{ApiServer, ApiServerConfig, AppState};
use spindle::cleanup::CleanupScheduler;
use spindle::config::Settings;
use spindle::jobs::{JobRegistry, JobRunner};
use spindle::logging;
use spindle::metadata::{MetadataProvider, spotify::SpotifyClient};
use spindle::playlist::refresher::MetadataRefresher;
use spindle::playlist::registry::PlaylistRegistry;
use spindle::playlist::status::StatusReconciler;
use spindle::sync::{DownloaderConfig, SyncSupervisor};
use spindle::utils::fs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init_logging();

    let settings = Settings::from_env_or_default();
    fs::ensure_dir_all(&settings.download_root).await?;

    match process_utils::probe_version(&settings.downloader_bin) {
        Some(version) => info!(bin = %settings.downloader_bin, %version, "Downloader found"),
        None => warn!(
            bin = %settings.downloader_bin,
            "Downloader not found; syncs will fail until it is installed"
        ),
    }

    if settings.spotify_client_id.is_none() || settings.spotify_client_secret.is_none() {
        warn!("SPOTIFY_CLIENT_ID / SPOTIFY_CLIENT_SECRET not set; metadata refreshes will fail");
    }
    let provider: Arc<dyn MetadataProvider> = Arc::new(SpotifyClient::new(
        settings.spotify_client_id.clone().unwrap_or_default(),
        settings.spotify_client_secret.clone().unwrap_or_default(),
    ));

    // Seed the registry from configuration; all further state is rebuilt
    // from the filesystem and the metadata API.
    let registry = Arc::new(PlaylistRegistry::new(&settings.download_root));
    for url in &settings.playlist_urls {
        match provider.extract_identifier(url) {
            Some(id) => {
                registry.get_or_create(&id, url, false);
            }
            None => warn!(%url, "Ignoring configured playlist URL with no recognizable identifier"),
        }
    }
    info!(playlists = registry.len(), "Seeded playlist registry");

    let downloader = DownloaderConfig::new(
        settings.downloader_bin.clone(),
        settings.downloader_extra_args.clone(),
    );
    let refresher = Arc::new(MetadataRefresher::new(registry.clone(), provider.clone()));
    let status_reconciler = Arc::new(StatusReconciler::new(registry.clone()));
    let supervisor = Arc::new(SyncSupervisor::new(registry.clone(), downloader.clone()));
    let job_registry = Arc::new(JobRegistry::new(settings.download_root.join("jobs")));
    let jobs = Arc::new(JobRunner::new(job_registry.clone(), downloader));

    let cancel = CancellationToken::new();

    refresher.spawn_initial_refreshes();
    if let Some(interval) = settings.metadata_refresh_interval() {
        refresher.start_background_task(interval, cancel.child_token());
    }
    if let Some(interval) = settings.download_scan_interval() {
        status_reconciler.start_background_task(interval, cancel.child_token());
    }
    if let Some(ttl) = settings.content_ttl() {
        Arc::new(CleanupScheduler::new(registry.clone(), job_registry, ttl))
            .start_background_task(settings.cleanup_interval(), cancel.child_token());
    }

    let state = AppState::with_services(registry, provider, refresher, supervisor, jobs);
    let server = ApiServer::with_state(
        ApiServerConfig {
            bind_address: settings.bind_address.clone(),
            port: settings.port,
            enable_cors: true,
        },
        state,
    );

    let server_cancel = server.cancel_token();
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            shutdown_cancel.cancel();
            server_cancel.cancel();
        }
    });

    server.run().await?;
    cancel.cancel();
    info!("spindle stopped");

    Ok(())
}
