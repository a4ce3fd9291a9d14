use habit_tracker::backup::{BackupTarget, DirectoryBackup};
use habit_tracker::storage::{FileStore, spawn_change_poller};
use habit_tracker::{AppState, Config, router};
use std::{net::SocketAddr, sync::Arc};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env();
    let store = Arc::new(FileStore::open(&config.data_dir)?);
    info!("storing data in {}", store.dir().display());

    let backup = config.backup_dir.as_ref().map(|dir| {
        info!("backups go to {}", dir.display());
        Arc::new(DirectoryBackup::new(dir)) as Arc<dyn BackupTarget>
    });

    let state = AppState::new(store.clone(), &config.storage_key, backup);
    let poller = spawn_change_poller(store, config.sync_interval);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    poller.abort();
    Ok(())
}
