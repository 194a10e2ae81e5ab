#![allow(dead_code)]
//! In-memory storage backend shared by the integration tests.
//!
//! Records every bucket creation and committed object, tracks how many sinks are
//! open at once, and can be told to fail or stall uploads for particular keys.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use remote_storage_core::{ObjectSink, StorageClient, StorageError, StorageErrorKind};
use tokio::sync::Barrier;

/// What a sink for a given key does when written to.
#[derive(Clone)]
pub enum Behaviour {
    /// Fail the write with this message.
    FailWrite(String),
    /// Never finish the write.
    Hang,
    /// Wait on the barrier before accepting the write.
    Rendezvous(Arc<Barrier>),
    /// Sleep before accepting the write.
    Delay(Duration),
    /// Panic inside the upload task.
    Panic,
}

#[derive(Default)]
struct State {
    buckets: Mutex<Vec<String>>,
    bucket_error: Mutex<Option<(StorageErrorKind, String)>>,
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    content_types: Mutex<HashMap<String, Option<String>>>,
    behaviours: Mutex<HashMap<String, Behaviour>>,
    opened: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    abandoned: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct FakeStorage {
    state: Arc<State>,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_create_bucket(&self, kind: StorageErrorKind, message: &str) {
        *self.state.bucket_error.lock().unwrap() = Some((kind, message.to_string()));
    }

    pub fn set_behaviour(&self, key: &str, behaviour: Behaviour) {
        self.state
            .behaviours
            .lock()
            .unwrap()
            .insert(key.to_string(), behaviour);
    }

    pub fn buckets(&self) -> Vec<String> {
        self.state.buckets.lock().unwrap().clone()
    }

    pub fn objects(&self) -> BTreeMap<String, Vec<u8>> {
        self.state.objects.lock().unwrap().clone()
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.state
            .content_types
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .flatten()
    }

    /// Number of write streams ever opened.
    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    /// Highest number of sinks open at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.state.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Sinks dropped before being closed.
    pub fn abandoned(&self) -> usize {
        self.state.abandoned.load(Ordering::SeqCst)
    }

    /// Poll until `abandoned() == expected` or the timeout elapses.
    pub async fn wait_for_abandoned(&self, expected: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.abandoned() == expected {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.abandoned() == expected
    }
}

#[async_trait]
impl StorageClient for FakeStorage {
    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        self.state.buckets.lock().unwrap().push(bucket.to_string());
        match self.state.bucket_error.lock().unwrap().clone() {
            Some((kind, message)) => Err(StorageError::new(kind, message)),
            None => Ok(()),
        }
    }

    async fn open_write_stream(
        &self,
        _bucket: &str,
        key: &str,
    ) -> Result<Box<dyn ObjectSink>, StorageError> {
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let behaviour = self.state.behaviours.lock().unwrap().get(key).cloned();
        Ok(Box::new(FakeSink {
            state: Arc::clone(&self.state),
            key: key.to_string(),
            content_type: None,
            buf: Vec::new(),
            behaviour,
            finished: false,
        }))
    }
}

struct FakeSink {
    state: Arc<State>,
    key: String,
    content_type: Option<String>,
    buf: Vec<u8>,
    behaviour: Option<Behaviour>,
    finished: bool,
}

#[async_trait]
impl ObjectSink for FakeSink {
    fn set_content_type(&mut self, content_type: &str) {
        self.content_type = Some(content_type.to_string());
    }

    async fn write(&mut self, buf: &[u8]) -> Result<(), StorageError> {
        match self.behaviour.clone() {
            Some(Behaviour::FailWrite(message)) => {
                return Err(StorageError::new(StorageErrorKind::Other, message));
            }
            Some(Behaviour::Hang) => std::future::pending::<()>().await,
            Some(Behaviour::Rendezvous(barrier)) => {
                barrier.wait().await;
            }
            Some(Behaviour::Delay(d)) => tokio::time::sleep(d).await,
            Some(Behaviour::Panic) => panic!("sink for {} panicked", self.key),
            None => {}
        }
        self.buf.extend_from_slice(buf);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StorageError> {
        self.finished = true;
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.state
            .content_types
            .lock()
            .unwrap()
            .insert(self.key.clone(), self.content_type.clone());
        self.state
            .objects
            .lock()
            .unwrap()
            .insert(self.key.clone(), std::mem::take(&mut self.buf));
        Ok(())
    }
}

impl Drop for FakeSink {
    fn drop(&mut self) {
        if !self.finished {
            self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.state.abandoned.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Create `files` (relative path, content) under `root`, making parent directories.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, content) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
    }
}
