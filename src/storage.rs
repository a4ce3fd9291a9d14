//! String key/value stores backing the persisted application state.
//!
//! A store notifies subscribers when a key is changed by *another* instance
//! sharing the same backing storage. Writes made through a store handle never
//! notify that handle's own subscribers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use std::{fs, io};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage io error: {0}")]
    Io(#[from] io::Error),
    #[error("storage quota exceeded writing {key}: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded {
        key: String,
        needed: usize,
        quota: usize,
    },
    #[error("invalid storage key {0:?}")]
    InvalidKey(String),
}

/// Called with the new raw value of a key, or `None` when it was removed.
pub type Listener = Arc<dyn Fn(Option<&str>) + Send + Sync>;

pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove_item(&self, key: &str) -> Result<(), StoreError>;
    fn subscribe(&self, key: &str, listener: Listener) -> Subscription;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct ListenerRegistry {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, String, Listener)>>,
}

impl ListenerRegistry {
    fn register(self: &Arc<Self>, key: &str, listener: Listener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.entries).push((id, key.to_string(), listener));
        Subscription {
            registry: Arc::downgrade(self),
            id,
        }
    }

    fn has_key(&self, key: &str) -> bool {
        lock(&self.entries).iter().any(|(_, k, _)| k == key)
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.entries).iter().map(|(_, k, _)| k.clone()).collect();
        keys.sort();
        keys.dedup();
        keys
    }

    fn dispatch(&self, key: &str, value: Option<&str>) {
        // Collect first so a listener may subscribe or unsubscribe.
        let listeners: Vec<Listener> = lock(&self.entries)
            .iter()
            .filter(|(_, k, _)| k == key)
            .map(|(_, _, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(value);
        }
    }

    fn remove(&self, id: u64) {
        lock(&self.entries).retain(|(entry_id, _, _)| *entry_id != id);
    }
}

/// Unsubscribes on drop.
#[must_use = "dropping a subscription unsubscribes it"]
pub struct Subscription {
    registry: Weak<ListenerRegistry>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

struct SharedItems {
    items: Mutex<HashMap<String, String>>,
    instances: Mutex<Vec<(u64, Weak<ListenerRegistry>)>>,
    next_instance: AtomicU64,
    quota: Option<usize>,
}

/// In-process store. Handles opened with [`MemoryStore::open_instance`] share
/// items the way browser tabs share one origin's storage.
pub struct MemoryStore {
    shared: Arc<SharedItems>,
    instance: u64,
    listeners: Arc<ListenerRegistry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_shared(Arc::new(SharedItems {
            items: Mutex::new(HashMap::new()),
            instances: Mutex::new(Vec::new()),
            next_instance: AtomicU64::new(0),
            quota: None,
        }))
    }

    /// Total bytes of keys plus values the store accepts before failing writes.
    pub fn with_quota(quota: usize) -> Self {
        Self::from_shared(Arc::new(SharedItems {
            items: Mutex::new(HashMap::new()),
            instances: Mutex::new(Vec::new()),
            next_instance: AtomicU64::new(0),
            quota: Some(quota),
        }))
    }

    pub fn open_instance(&self) -> Self {
        Self::from_shared(Arc::clone(&self.shared))
    }

    fn from_shared(shared: Arc<SharedItems>) -> Self {
        let instance = shared.next_instance.fetch_add(1, Ordering::Relaxed);
        let listeners = Arc::new(ListenerRegistry::default());
        lock(&shared.instances).push((instance, Arc::downgrade(&listeners)));
        Self {
            shared,
            instance,
            listeners,
        }
    }

    fn notify_others(&self, key: &str, value: Option<&str>) {
        let others: Vec<Arc<ListenerRegistry>> = {
            let mut instances = lock(&self.shared.instances);
            instances.retain(|(_, registry)| registry.strong_count() > 0);
            instances
                .iter()
                .filter(|(id, _)| *id != self.instance)
                .filter_map(|(_, registry)| registry.upgrade())
                .collect()
        };
        for registry in others {
            registry.dispatch(key, value);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.shared.items).get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        {
            let mut items = lock(&self.shared.items);
            if let Some(quota) = self.shared.quota {
                let others: usize = items
                    .iter()
                    .filter(|(k, _)| k.as_str() != key)
                    .map(|(k, v)| k.len() + v.len())
                    .sum();
                let needed = others + key.len() + value.len();
                if needed > quota {
                    return Err(StoreError::QuotaExceeded {
                        key: key.to_string(),
                        needed,
                        quota,
                    });
                }
            }
            if items.get(key).map(String::as_str) == Some(value) {
                return Ok(());
            }
            items.insert(key.to_string(), value.to_string());
        }
        self.notify_others(key, Some(value));
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        let removed = lock(&self.shared.items).remove(key).is_some();
        if removed {
            self.notify_others(key, None);
        }
        Ok(())
    }

    fn subscribe(&self, key: &str, listener: Listener) -> Subscription {
        self.listeners.register(key, listener)
    }
}

/// One `<key>.json` file per key inside a directory.
///
/// Changes written by other processes are picked up by [`FileStore::poll_changes`].
/// The `seen` lock is held across every file access so a poll never observes a
/// write of this handle that has not been recorded yet.
pub struct FileStore {
    dir: PathBuf,
    seen: Mutex<HashMap<String, Option<String>>>,
    polling: Mutex<()>,
    listeners: Arc<ListenerRegistry>,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            seen: Mutex::new(HashMap::new()),
            polling: Mutex::new(()),
            listeners: Arc::new(ListenerRegistry::default()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn read_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Re-reads every subscribed key and notifies listeners of keys whose
    /// content differs from what this handle last read or wrote. Returns the
    /// number of keys that changed.
    pub fn poll_changes(&self) -> usize {
        // Concurrent polls would dispatch out of order.
        let _polling = lock(&self.polling);
        let mut changed = 0;
        for key in self.listeners.keys() {
            let current = {
                let mut seen = lock(&self.seen);
                let current = match self.read_raw(&key) {
                    Ok(current) => current,
                    Err(err) => {
                        warn!("failed to poll storage key {key}: {err}");
                        continue;
                    }
                };
                if seen.get(&key) == Some(&current) {
                    continue;
                }
                seen.insert(key.clone(), current.clone());
                current
            };
            debug!("storage key {key} changed externally");
            changed += 1;
            self.listeners.dispatch(&key, current.as_deref());
        }
        changed
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut seen = lock(&self.seen);
        let raw = self.read_raw(key)?;
        seen.insert(key.to_string(), raw.clone());
        Ok(raw)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        let mut seen = lock(&self.seen);
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        seen.insert(key.to_string(), Some(value.to_string()));
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let mut seen = lock(&self.seen);
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        seen.insert(key.to_string(), None);
        Ok(())
    }

    fn subscribe(&self, key: &str, listener: Listener) -> Subscription {
        if !self.listeners.has_key(key) {
            // Baseline so the first poll only reports real changes.
            let mut seen = lock(&self.seen);
            if let Ok(raw) = self.read_raw(key) {
                seen.entry(key.to_string()).or_insert(raw);
            }
        }
        self.listeners.register(key, listener)
    }
}

/// Polls `store` for external changes until the task is aborted.
pub fn spawn_change_poller(store: Arc<FileStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            store.poll_changes();
        }
    })
}
