// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: a mock HTTP service for the kube client and an in-memory
//! control plane for driving reconcilers.

use crate::error::{OperatorError, Result};
use crate::kubernetes::{from_dynamic, to_dynamic, ControlPlane, LogStream, ObjectKey};
use async_trait::async_trait;
use futures::io::{AsyncBufRead, AsyncRead};
use http::{Request, Response};
use kube::api::DynamicObject;
use kube::client::Body;
use kube::core::TypeMeta;
use kube::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for POST requests matching the exact path
    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.on("POST", path, status, body)
    }

    pub fn on_patch(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PATCH", path, status, body)
    }

    pub fn on_delete(self, path: &str, status: u16, body: &str) -> Self {
        self.on("DELETE", path, status, body)
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "https://kubernetes.default.svc")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();
        responses
            .get(&(method.to_string(), path.to_string()))
            .cloned()
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future =
        Pin<Box<dyn Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        let (status, body) = self
            .find_response(&method, &path)
            .unwrap_or_else(|| (404, not_found_json("resource", &path)));

        Box::pin(async move {
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    status_json(404, "NotFound", &format!("{} \"{}\" not found", resource, name))
}

/// Create a failure Status body
pub fn status_json(code: u16, reason: &str, message: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    })
    .to_string()
}

/// How the log stream of a fake pod behaves
#[derive(Clone)]
enum FakeLog {
    Text(Vec<u8>),
    Gone,
    FailOpen,
    FailRead,
    Hang,
}

#[derive(Default)]
struct FakeState {
    objects: BTreeMap<ObjectKey, DynamicObject>,
    next_version: u64,
    creates: BTreeMap<ObjectKey, usize>,
    updates: usize,
    status_writes: usize,
    deletes: Vec<ObjectKey>,
    status_conflicts: u32,
    update_conflicts: u32,
    logs: BTreeMap<(String, String), FakeLog>,
}

impl FakeState {
    fn bump(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }
}

/// In-memory control plane with server-side conflict checks and call counters
#[derive(Default)]
pub struct FakeControlPlane {
    state: Mutex<FakeState>,
    opened_logs: AtomicUsize,
    closed_logs: Arc<AtomicUsize>,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object, bypassing create counters
    pub fn insert<K: Serialize>(&self, object: &K) -> ObjectKey {
        let mut object = to_dynamic(object).unwrap();
        let key = ObjectKey::from_object(&object).unwrap();
        let mut state = self.state.lock().unwrap();
        object.metadata.resource_version = Some(state.bump());
        state.objects.insert(key.clone(), object);
        key
    }

    pub fn remove(&self, key: &ObjectKey) {
        self.state.lock().unwrap().objects.remove(key);
    }

    pub fn object(&self, key: &ObjectKey) -> Option<DynamicObject> {
        self.state.lock().unwrap().objects.get(key).cloned()
    }

    pub fn typed<K: DeserializeOwned>(&self, key: &ObjectKey) -> Option<K> {
        self.object(key).map(|o| from_dynamic(o).unwrap())
    }

    pub fn keys(&self) -> Vec<ObjectKey> {
        self.state.lock().unwrap().objects.keys().cloned().collect()
    }

    pub fn create_count(&self, key: &ObjectKey) -> usize {
        self.state.lock().unwrap().creates.get(key).copied().unwrap_or(0)
    }

    pub fn total_creates(&self) -> usize {
        self.state.lock().unwrap().creates.values().sum()
    }

    pub fn update_count(&self) -> usize {
        self.state.lock().unwrap().updates
    }

    pub fn status_writes(&self) -> usize {
        self.state.lock().unwrap().status_writes
    }

    pub fn deleted(&self) -> Vec<ObjectKey> {
        self.state.lock().unwrap().deletes.clone()
    }

    /// Make the next `count` status writes fail as if another writer got there first
    pub fn inject_status_conflicts(&self, count: u32) {
        self.state.lock().unwrap().status_conflicts = count;
    }

    /// Make the next `count` updates fail as if another writer got there first
    pub fn inject_update_conflicts(&self, count: u32) {
        self.state.lock().unwrap().update_conflicts = count;
    }

    pub fn set_pod_logs(&self, namespace: &str, pod: &str, text: &str) {
        self.set_pod_log_bytes(namespace, pod, text.as_bytes());
    }

    pub fn set_pod_log_bytes(&self, namespace: &str, pod: &str, bytes: &[u8]) {
        self.set_log(namespace, pod, FakeLog::Text(bytes.to_vec()));
    }

    /// The pod disappears between listing and opening its log
    pub fn remove_pod_logs(&self, namespace: &str, pod: &str) {
        self.set_log(namespace, pod, FakeLog::Gone);
    }

    pub fn fail_pod_log_open(&self, namespace: &str, pod: &str) {
        self.set_log(namespace, pod, FakeLog::FailOpen);
    }

    pub fn fail_pod_log_read(&self, namespace: &str, pod: &str) {
        self.set_log(namespace, pod, FakeLog::FailRead);
    }

    pub fn hang_pod_logs(&self, namespace: &str, pod: &str) {
        self.set_log(namespace, pod, FakeLog::Hang);
    }

    fn set_log(&self, namespace: &str, pod: &str, log: FakeLog) {
        self.state
            .lock()
            .unwrap()
            .logs
            .insert((namespace.to_string(), pod.to_string()), log);
    }

    pub fn opened_logs(&self) -> usize {
        self.opened_logs.load(Ordering::SeqCst)
    }

    pub fn closed_logs(&self) -> usize {
        self.closed_logs.load(Ordering::SeqCst)
    }
}

fn matches_selector(object: &DynamicObject, selector: &str) -> bool {
    let labels = object.metadata.labels.clone().unwrap_or_default();
    selector
        .split(',')
        .filter(|s| !s.is_empty())
        .all(|requirement| match requirement.split_once('=') {
            Some((k, v)) => labels.get(k).is_some_and(|l| l == v),
            None => labels.contains_key(requirement),
        })
}

fn check_version(stored: &DynamicObject, incoming: &DynamicObject, key: &ObjectKey) -> Result<()> {
    match &incoming.metadata.resource_version {
        Some(rv) if Some(rv) != stored.metadata.resource_version.as_ref() => {
            Err(OperatorError::Conflict(key.to_string()))
        }
        _ => Ok(()),
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn get(&self, key: &ObjectKey) -> Result<Option<DynamicObject>> {
        let found = self.object(key);
        // Give concurrent callers a chance to interleave between read and write
        tokio::task::yield_now().await;
        Ok(found)
    }

    async fn list(
        &self,
        type_meta: &TypeMeta,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<DynamicObject>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .objects
            .iter()
            .filter(|(key, _)| {
                key.api_version == type_meta.api_version
                    && key.kind == type_meta.kind
                    && key.namespace.as_deref() == Some(namespace)
            })
            .filter(|(_, object)| matches_selector(object, label_selector))
            .map(|(_, object)| object.clone())
            .collect())
    }

    async fn create(&self, object: &DynamicObject) -> Result<DynamicObject> {
        let key = ObjectKey::from_object(object)?;
        let mut state = self.state.lock().unwrap();
        if state.objects.contains_key(&key) {
            return Err(OperatorError::AlreadyExists(key.to_string()));
        }
        let mut stored = object.clone();
        stored.metadata.resource_version = Some(state.bump());
        stored.metadata.uid = Some(format!("uid-{}", key.name));
        state.objects.insert(key.clone(), stored.clone());
        *state.creates.entry(key).or_default() += 1;
        Ok(stored)
    }

    async fn update(&self, object: &DynamicObject) -> Result<DynamicObject> {
        let key = ObjectKey::from_object(object)?;
        let mut state = self.state.lock().unwrap();
        if state.update_conflicts > 0 {
            state.update_conflicts -= 1;
            let version = state.bump();
            if let Some(stored) = state.objects.get_mut(&key) {
                stored.metadata.resource_version = Some(version);
            }
            return Err(OperatorError::Conflict(key.to_string()));
        }
        let stored = state
            .objects
            .get(&key)
            .ok_or_else(|| OperatorError::NotFound(key.to_string()))?;
        check_version(stored, object, &key)?;
        let mut updated = object.clone();
        updated.metadata.resource_version = Some(state.bump());
        state.objects.insert(key, updated.clone());
        state.updates += 1;
        Ok(updated)
    }

    async fn update_status(&self, object: &DynamicObject) -> Result<DynamicObject> {
        let key = ObjectKey::from_object(object)?;
        let mut state = self.state.lock().unwrap();
        if state.status_conflicts > 0 {
            state.status_conflicts -= 1;
            let version = state.bump();
            if let Some(stored) = state.objects.get_mut(&key) {
                stored.metadata.resource_version = Some(version);
            }
            return Err(OperatorError::Conflict(key.to_string()));
        }
        let version = state.bump();
        let stored = state
            .objects
            .get_mut(&key)
            .ok_or_else(|| OperatorError::NotFound(key.to_string()))?;
        check_version(stored, object, &key)?;
        let status = object.data.get("status").cloned().unwrap_or_default();
        if let Some(data) = stored.data.as_object_mut() {
            data.insert("status".to_string(), status);
        }
        stored.metadata.resource_version = Some(version);
        let updated = stored.clone();
        state.status_writes += 1;
        Ok(updated)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let existed = state.objects.remove(key).is_some();
        if existed {
            state.deletes.push(key.clone());
        }
        Ok(existed)
    }

    async fn open_log_stream(&self, namespace: &str, pod: &str) -> Result<LogStream> {
        let log = self
            .state
            .lock()
            .unwrap()
            .logs
            .get(&(namespace.to_string(), pod.to_string()))
            .cloned()
            .unwrap_or(FakeLog::Text(Vec::new()));

        let inner: LogStream = match log {
            FakeLog::Text(bytes) => Box::pin(futures::io::Cursor::new(bytes)),
            FakeLog::Gone => {
                return Err(OperatorError::NotFound(format!("Pod {}/{}", namespace, pod)))
            }
            FakeLog::FailOpen => {
                return Err(OperatorError::LogStream {
                    pod: format!("{}/{}", namespace, pod),
                    source: io::Error::new(io::ErrorKind::ConnectionRefused, "kubelet unreachable"),
                })
            }
            FakeLog::FailRead => Box::pin(futures::io::BufReader::new(BrokenReader)),
            FakeLog::Hang => Box::pin(futures::io::BufReader::new(PendingReader)),
        };
        self.opened_logs.fetch_add(1, Ordering::SeqCst);
        Ok(Box::pin(TrackedStream {
            inner,
            closed: self.closed_logs.clone(),
        }))
    }
}

/// Counts drops so tests can check every opened stream is released
struct TrackedStream {
    inner: LogStream,
    closed: Arc<AtomicUsize>,
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

impl AsyncRead for TrackedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        self.get_mut().inner.as_mut().poll_read(cx, buf)
    }
}

impl AsyncBufRead for TrackedStream {
    fn poll_fill_buf(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
        self.get_mut().inner.as_mut().poll_fill_buf(cx)
    }

    fn consume(self: Pin<&mut Self>, amt: usize) {
        self.get_mut().inner.as_mut().consume(amt)
    }
}

struct BrokenReader;

impl AsyncRead for BrokenReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _: &mut Context<'_>,
        _: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "log stream reset")))
    }
}

struct PendingReader;

impl AsyncRead for PendingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _: &mut Context<'_>,
        _: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Pending
    }
}

/// Label map literal helper
pub fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
