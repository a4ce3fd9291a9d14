use crate::backup::{self, BackupError, BackupReport, BackupTarget};
use crate::models::AppData;
use crate::persisted::PersistedValue;
use crate::storage::{KeyValueStore, Subscription};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};

/// The application's single state container. Every mutation goes through
/// [`AppState::update`].
#[derive(Clone)]
pub struct AppState {
    pub data: Arc<Mutex<PersistedValue<AppData>>>,
    pub backup: Option<Arc<dyn BackupTarget>>,
    _subscription: Arc<Subscription>,
}

impl AppState {
    /// Loads the data stored under `key` and starts following changes made
    /// to it by other instances. Must be called inside a tokio runtime.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        key: &str,
        backup: Option<Arc<dyn BackupTarget>>,
    ) -> Self {
        let mut persisted = PersistedValue::new(store, key, AppData::default());
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let subscription = persisted.subscribe(move |_: AppData| {
            let _ = tx.send(());
        });
        persisted.resync();

        let data = Arc::new(Mutex::new(persisted));
        let receiver = Arc::downgrade(&data);
        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                let Some(data) = receiver.upgrade() else { break };
                // The store holds the last write; a queued value may be stale
                // by the time the lock is ours.
                let mut guard = data.lock_owned().await;
                let reloaded = tokio::task::spawn_blocking(move || {
                    guard.reload();
                    guard.get().habits.len()
                })
                .await;
                match reloaded {
                    Ok(habits) => info!("applied external change with {habits} habits"),
                    Err(err) => warn!("failed to apply external change: {err}"),
                }
            }
        });

        Self {
            data,
            backup,
            _subscription: Arc::new(subscription),
        }
    }

    pub async fn snapshot(&self) -> AppData {
        self.data.lock().await.get().clone()
    }

    /// Applies `mutate` to the current data and persists the result if it
    /// changed. Returns the data after the update.
    pub async fn update(&self, mutate: impl FnOnce(&AppData) -> AppData) -> AppData {
        let mut data = Arc::clone(&self.data).lock_owned().await;
        let next = mutate(data.get());
        if &next == data.get() {
            return next;
        }
        // The guard moves to the blocking pool so writes stay ordered.
        let value = next.clone();
        match tokio::task::spawn_blocking(move || data.set(value)).await {
            Ok(true) => {}
            Ok(false) => warn!("change kept in memory only"),
            Err(err) => warn!("storage write task failed: {err}"),
        }
        self.auto_sync(&next);
        next
    }

    pub async fn replace(&self, value: AppData) -> AppData {
        self.update(move |_| value).await
    }

    fn auto_sync(&self, data: &AppData) {
        let Some(target) = self.backup.clone() else {
            return;
        };
        let Some(config) = data.settings.active_backup().filter(|config| config.auto_sync) else {
            return;
        };
        let keep = config.backup_count;
        let data = data.clone();
        tokio::spawn(async move {
            if let Err(err) = backup::spawn_backup(target, data, keep).await {
                warn!("automatic backup failed: {err}");
            }
        });
    }

    pub async fn backup_now(&self) -> Result<BackupReport, BackupError> {
        let data = self.snapshot().await;
        let target = self.backup.clone().ok_or(BackupError::NotConfigured)?;
        let config = data
            .settings
            .active_backup()
            .ok_or(BackupError::NotConfigured)?;
        let keep = config.backup_count;
        backup::spawn_backup(target, data, keep).await
    }
}
