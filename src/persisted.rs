use crate::storage::{KeyValueStore, Listener, Subscription};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::warn;

/// Reads `key` as JSON, falling back to `default` when it is missing or
/// cannot be parsed.
pub fn read_value<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str, default: T) -> T {
    match store.get_item(key) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                warn!("failed to parse stored value for {key}: {err}");
                default
            }
        },
        Ok(None) => default,
        Err(err) => {
            warn!("failed to read stored value for {key}: {err}");
            default
        }
    }
}

/// A typed value mirrored into a key/value store.
///
/// The in-memory copy is authoritative for the running instance. Writes are
/// best-effort: a failing store leaves the in-memory value updated.
pub struct PersistedValue<T> {
    store: Arc<dyn KeyValueStore>,
    key: String,
    default: T,
    value: T,
}

impl<T> PersistedValue<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + 'static,
{
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>, default: T) -> Self {
        let key = key.into();
        let value = read_value(store.as_ref(), &key, default.clone());
        Self {
            store,
            key,
            default,
            value,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Replaces the value and writes it through. Returns whether the write
    /// reached the store.
    pub fn set(&mut self, value: T) -> bool {
        self.value = value;
        let raw = match serde_json::to_string(&self.value) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("failed to serialize value for {}: {err}", self.key);
                return false;
            }
        };
        match self.store.set_item(&self.key, &raw) {
            Ok(()) => true,
            Err(err) => {
                warn!("failed to persist {}: {err}", self.key);
                false
            }
        }
    }

    /// Overwrites the in-memory value with whatever the store holds now.
    pub fn resync(&mut self) {
        self.value = read_value(self.store.as_ref(), &self.key, self.default.clone());
    }

    /// Re-reads the store after another instance changed it. A removed key
    /// resets to the default; an unreadable value keeps the current one.
    pub fn reload(&mut self) {
        match self.store.get_item(&self.key) {
            Ok(None) => self.value = self.default.clone(),
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => self.value = value,
                Err(err) => warn!("keeping current value, {} is unparsable: {err}", self.key),
            },
            Err(err) => warn!("keeping current value, failed to read {}: {err}", self.key),
        }
    }

    /// Delivers values written to this key by other instances. A removed key
    /// delivers the default value.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let key = self.key.clone();
        let default = std::sync::Mutex::new(self.default.clone());
        let listener: Listener = Arc::new(move |raw: Option<&str>| match raw {
            None => {
                let value = default
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .clone();
                callback(value);
            }
            Some(raw) => match serde_json::from_str::<T>(raw) {
                Ok(value) => callback(value),
                Err(err) => warn!("ignoring unparsable external change to {key}: {err}"),
            },
        });
        self.store.subscribe(&self.key, listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, StoreError};
    use std::sync::Mutex;

    #[test]
    fn missing_or_malformed_values_fall_back_to_default() {
        let store = Arc::new(MemoryStore::new());
        let value: PersistedValue<Vec<u32>> = PersistedValue::new(store.clone(), "nums", vec![7]);
        assert_eq!(value.get(), &vec![7]);

        store.set_item("nums", "{not json").unwrap();
        let value: PersistedValue<Vec<u32>> = PersistedValue::new(store, "nums", vec![7]);
        assert_eq!(value.get(), &vec![7]);
    }

    #[test]
    fn set_writes_through_and_survives_quota_failures() {
        let store = Arc::new(MemoryStore::with_quota(16));
        let mut value = PersistedValue::new(store.clone(), "nums", Vec::<u32>::new());
        assert!(value.set(vec![1, 2]));
        assert_eq!(store.get_item("nums").unwrap().as_deref(), Some("[1,2]"));

        assert!(!value.set(vec![1; 20]));
        assert_eq!(value.get().len(), 20);
        assert_eq!(store.get_item("nums").unwrap().as_deref(), Some("[1,2]"));
        assert!(matches!(
            store.set_item("nums", &"x".repeat(32)),
            Err(StoreError::QuotaExceeded { .. })
        ));
    }

    #[test]
    fn external_changes_reach_subscribers_and_deletion_resets() {
        let tab_a = Arc::new(MemoryStore::new());
        let tab_b = Arc::new(tab_a.open_instance());
        let mut writer = PersistedValue::new(tab_a.clone(), "nums", vec![0u32]);
        let reader = PersistedValue::new(tab_b.clone(), "nums", vec![0u32]);

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let _sub = reader.subscribe(move |value: Vec<u32>| sink.lock().unwrap().push(value));

        writer.set(vec![5]);
        tab_b.set_item("nums", "[9]").unwrap();
        tab_a.remove_item("nums").unwrap();
        tab_a.set_item("nums", "garbage").unwrap();

        assert_eq!(*received.lock().unwrap(), vec![vec![5], vec![0]]);
    }

    #[test]
    fn resync_picks_up_values_stored_after_construction() {
        let store = Arc::new(MemoryStore::new());
        let mut value = PersistedValue::new(store.clone(), "nums", Vec::<u32>::new());
        store.open_instance().set_item("nums", "[3]").unwrap();
        assert!(value.get().is_empty());
        value.resync();
        assert_eq!(value.get(), &vec![3]);
    }

    #[test]
    fn reload_follows_the_store_but_keeps_value_on_garbage() {
        let store = Arc::new(MemoryStore::new());
        let other = store.open_instance();
        let mut value = PersistedValue::new(store.clone(), "nums", vec![0u32]);
        value.set(vec![1]);

        other.set_item("nums", "[4]").unwrap();
        value.reload();
        assert_eq!(value.get(), &vec![4]);

        other.set_item("nums", "garbage").unwrap();
        value.reload();
        assert_eq!(value.get(), &vec![4]);

        other.remove_item("nums").unwrap();
        value.reload();
        assert_eq!(value.get(), &vec![0]);
    }
}
