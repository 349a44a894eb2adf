use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::task::{Context, Poll, noop_waker_ref};
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::scene::ScenePayload;

/// The external collaborator scene payloads are read from and written to.
pub trait ProjectStore: Send + Sync {
    /// The stored value for `key`, in whatever shape it was saved, or `None`.
    fn load(&self, key: &str) -> BoxFuture<'static, StoreResult<Option<Value>>>;

    fn save(&self, key: &str, payload: ScenePayload) -> BoxFuture<'static, StoreResult<()>>;
}

/// In-process store. Can be switched offline to make every call fail.
#[derive(Debug, Clone, Default)]
pub struct MemoryProjectStore {
    scenes: Arc<Mutex<HashMap<String, Value>>>,
    offline: Arc<Mutex<bool>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock() = offline;
    }

    /// Seeds a raw value, e.g. a legacy payload.
    pub fn insert_raw(&self, key: &str, value: Value) {
        self.scenes.lock().insert(key.to_string(), value);
    }

    pub fn get_raw(&self, key: &str) -> Option<Value> {
        self.scenes.lock().get(key).cloned()
    }
}

impl ProjectStore for MemoryProjectStore {
    fn load(&self, key: &str) -> BoxFuture<'static, StoreResult<Option<Value>>> {
        let result = if *self.offline.lock() {
            Err(StoreError::Offline)
        } else {
            Ok(self.get_raw(key))
        };
        futures::future::ready(result).boxed()
    }

    fn save(&self, key: &str, payload: ScenePayload) -> BoxFuture<'static, StoreResult<()>> {
        let result = if *self.offline.lock() {
            Err(StoreError::Offline)
        } else {
            payload
                .to_value()
                .map(|value| {
                    self.insert_raw(key, value);
                })
                .map_err(StoreError::from)
        };
        futures::future::ready(result).boxed()
    }
}

/// One pretty-printed JSON file per scene key inside a directory.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl JsonFileStore {
    pub fn new(dir: impl Into<std::path::PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> StoreResult<std::path::PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl ProjectStore for JsonFileStore {
    fn load(&self, key: &str) -> BoxFuture<'static, StoreResult<Option<Value>>> {
        let path = self.path_for(key);
        async move {
            let path = path?;
            match std::fs::read(&path) {
                Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(err) => Err(err.into()),
            }
        }
        .boxed()
    }

    fn save(&self, key: &str, payload: ScenePayload) -> BoxFuture<'static, StoreResult<()>> {
        let path = self.path_for(key);
        let dir = self.dir.clone();
        async move {
            let path = path?;
            std::fs::create_dir_all(&dir)?;
            let json = serde_json::to_vec_pretty(&payload)?;
            std::fs::write(path, json)?;
            Ok(())
        }
        .boxed()
    }
}

/// Result of one finished save.
#[derive(Debug)]
pub struct SaveOutcome {
    pub key: String,
    pub result: StoreResult<()>,
}

/// Serialises saves: at most one in flight, later ones wait their turn in order.
///
/// Nothing is coalesced; every enqueued payload is written. The queue is polled
/// once per UI frame with a no-op waker.
pub struct SaveQueue {
    store: Arc<dyn ProjectStore>,
    in_flight: Option<(String, BoxFuture<'static, StoreResult<()>>)>,
    waiting: VecDeque<(String, ScenePayload)>,
}

impl std::fmt::Debug for SaveQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveQueue")
            .field("in_flight", &self.in_flight.as_ref().map(|(k, _)| k))
            .field("waiting", &self.waiting.len())
            .finish()
    }
}

impl SaveQueue {
    pub fn new(store: Arc<dyn ProjectStore>) -> Self {
        Self {
            store,
            in_flight: None,
            waiting: VecDeque::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ProjectStore> {
        &self.store
    }

    pub fn enqueue(&mut self, key: &str, payload: ScenePayload) {
        log::debug!("Queued save of {key:?} ({} waiting)", self.waiting.len());
        self.waiting.push_back((key.to_string(), payload));
    }

    /// True while a save is in flight or waiting.
    pub fn is_saving(&self) -> bool {
        self.in_flight.is_some() || !self.waiting.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.waiting.len() + usize::from(self.in_flight.is_some())
    }

    /// Drives the in-flight save and starts the next one when it finishes.
    pub fn poll(&mut self) -> Vec<SaveOutcome> {
        let mut finished = Vec::new();
        let mut cx = Context::from_waker(noop_waker_ref());
        loop {
            if self.in_flight.is_none() {
                let Some((key, payload)) = self.waiting.pop_front() else {
                    break;
                };
                let fut = self.store.save(&key, payload);
                self.in_flight = Some((key, fut));
            }
            let Some((key, fut)) = self.in_flight.as_mut() else {
                break;
            };
            match fut.poll_unpin(&mut cx) {
                Poll::Ready(result) => {
                    let key = std::mem::take(key);
                    self.in_flight = None;
                    match &result {
                        Ok(()) => log::debug!("Saved {key:?}"),
                        Err(err) => log::warn!("Saving {key:?} failed: {err}"),
                    }
                    finished.push(SaveOutcome { key, result });
                }
                Poll::Pending => break,
            }
        }
        finished
    }
}

/// Fires once edits have been quiet for the debounce window.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveDebounce {
    window_ms: f64,
    last_change_ms: Option<f64>,
}

impl SaveDebounce {
    pub fn new(window_ms: f64) -> Self {
        Self {
            window_ms,
            last_change_ms: None,
        }
    }

    /// Records an edit at `now_ms`, restarting the window.
    pub fn mark(&mut self, now_ms: f64) {
        self.last_change_ms = Some(now_ms);
    }

    pub fn is_armed(&self) -> bool {
        self.last_change_ms.is_some()
    }

    /// Returns true once per quiet period and disarms.
    pub fn take_due(&mut self, now_ms: f64) -> bool {
        match self.last_change_ms {
            Some(at) if now_ms - at >= self.window_ms => {
                self.last_change_ms = None;
                true
            }
            _ => false,
        }
    }

    /// Disarms without waiting, e.g. when a save is forced.
    pub fn take(&mut self) -> bool {
        self.last_change_ms.take().is_some()
    }
}

/// Polls a one-shot future once with a no-op waker.
pub(crate) fn poll_once<T>(fut: &mut BoxFuture<'static, T>) -> Poll<T> {
    let mut cx = Context::from_waker(noop_waker_ref());
    fut.poll_unpin(&mut cx)
}
