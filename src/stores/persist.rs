//! Persistence boundary for local stores.
//!
//! A persisted store writes one named blob shaped
//! `{"state": <snapshot>, "version": n}`. Restoring tolerates missing,
//! corrupt or wrong-version blobs by starting from the default state.

use std::collections::HashMap;
use std::io;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage name `{name}`")]
    InvalidName { name: String },
    #[error("storage I/O failed for `{name}`")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode `{name}`")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Durable string blobs addressed by name.
pub trait LocalStorage: Send + Sync {
    fn load(&self, name: &str) -> Result<Option<String>, StorageError>;

    fn save(&self, name: &str, blob: &str) -> Result<(), StorageError>;

    fn remove(&self, name: &str) -> Result<(), StorageError>;
}

/// Process-local storage; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn blobs(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.blobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LocalStorage for MemoryStorage {
    fn load(&self, name: &str) -> Result<Option<String>, StorageError> {
        Ok(self.blobs().get(name).cloned())
    }

    fn save(&self, name: &str, blob: &str) -> Result<(), StorageError> {
        self.blobs().insert(name.to_string(), blob.to_string());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), StorageError> {
        self.blobs().remove(name);
        Ok(())
    }
}

/// A store state with a durable projection.
pub trait Persisted: Sized {
    const STORAGE_NAME: &'static str;
    const VERSION: u32;

    /// The persisted subset of the state.
    type Snapshot: Serialize + DeserializeOwned;

    fn snapshot(&self) -> Self::Snapshot;

    fn restore(snapshot: Self::Snapshot) -> Self;
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    state: T,
    version: u32,
}

pub(crate) fn encode<S: Persisted>(state: &S) -> Result<String, StorageError> {
    serde_json::to_string(&Envelope {
        state: state.snapshot(),
        version: S::VERSION,
    })
    .map_err(|source| StorageError::Encode {
        name: S::STORAGE_NAME.to_string(),
        source,
    })
}

/// Read the state back from `storage`, or the default on any failure.
pub(crate) fn restore<S: Persisted + Default>(storage: &dyn LocalStorage) -> S {
    let name = S::STORAGE_NAME;
    let blob = match storage.load(name) {
        Ok(Some(blob)) => blob,
        Ok(None) => {
            debug!(store = name, "no persisted state; starting empty");
            return S::default();
        }
        Err(err) => {
            warn!(store = name, error = %err, "failed to read persisted state; starting empty");
            return S::default();
        }
    };

    match serde_json::from_str::<Envelope<S::Snapshot>>(&blob) {
        Ok(envelope) if envelope.version == S::VERSION => S::restore(envelope.state),
        Ok(envelope) => {
            warn!(
                store = name,
                found = envelope.version,
                expected = S::VERSION,
                "persisted state version mismatch; starting empty"
            );
            S::default()
        }
        Err(err) => {
            warn!(store = name, error = %err, "persisted state is corrupt; starting empty");
            S::default()
        }
    }
}

/// Write an encoded blob under `name`. Failures are logged, never surfaced.
pub(crate) fn save(storage: &dyn LocalStorage, name: &str, blob: Result<String, StorageError>) {
    let result = blob.and_then(|blob| storage.save(name, &blob));
    if let Err(err) = result {
        warn!(store = name, error = %err, "failed to persist store state");
    }
}
