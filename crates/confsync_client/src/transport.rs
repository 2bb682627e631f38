//! Transport layer abstraction for the configuration service.

use crate::config::ApiKey;
use crate::error::{ClientError, ClientResult};
use confsync_protocol::{Manifest, StateReport};
use std::collections::{HashMap, HashSet};

/// A transport handles network communication with the configuration
/// service.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (reqwest, ureq, a loopback for testing, etc.).
/// Authentication material beyond the API key (TLS client
/// certificates, proxies) is the implementation's concern, as are
/// timeouts and low-level retries. A timed-out call is reported like
/// any other failed fetch.
pub trait ConfigTransport: Send + Sync {
    /// Fetches the current manifest for this device.
    fn fetch_manifest(&self, api_key: &ApiKey) -> ClientResult<Manifest>;

    /// Fetches the body of one entry at a specific revision.
    fn fetch_body(&self, api_key: &ApiKey, name: &str, content_ref: &str)
        -> ClientResult<Vec<u8>>;

    /// Delivers a state report.
    fn report_state(&self, api_key: &ApiKey, report: &StateReport) -> ClientResult<()>;
}

impl<T: ConfigTransport + ?Sized> ConfigTransport for std::sync::Arc<T> {
    fn fetch_manifest(&self, api_key: &ApiKey) -> ClientResult<Manifest> {
        (**self).fetch_manifest(api_key)
    }

    fn fetch_body(
        &self,
        api_key: &ApiKey,
        name: &str,
        content_ref: &str,
    ) -> ClientResult<Vec<u8>> {
        (**self).fetch_body(api_key, name, content_ref)
    }

    fn report_state(&self, api_key: &ApiKey, report: &StateReport) -> ClientResult<()> {
        (**self).report_state(api_key, report)
    }
}

/// A mock transport for testing.
///
/// Responses are scripted ahead of time; fetches are recorded so tests
/// can assert exactly which bodies traveled over the wire.
#[derive(Debug, Default)]
pub struct MockTransport {
    manifest: std::sync::Mutex<Option<Manifest>>,
    bodies: std::sync::Mutex<HashMap<(String, String), Vec<u8>>>,
    failing_bodies: std::sync::Mutex<HashSet<String>>,
    fail_manifest: std::sync::atomic::AtomicBool,
    fail_report: std::sync::atomic::AtomicBool,
    manifest_fetches: std::sync::atomic::AtomicU64,
    body_fetches: std::sync::Mutex<Vec<String>>,
    reports: std::sync::Mutex<Vec<StateReport>>,
}

impl MockTransport {
    /// Creates a new mock transport with nothing scripted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the manifest returned by `fetch_manifest`.
    pub fn set_manifest(&self, manifest: Manifest) {
        *self.manifest.lock().unwrap() = Some(manifest);
    }

    /// Scripts the body served for `(name, content_ref)`.
    pub fn insert_body(&self, name: impl Into<String>, content_ref: impl Into<String>, body: Vec<u8>) {
        self.bodies
            .lock()
            .unwrap()
            .insert((name.into(), content_ref.into()), body);
    }

    /// Makes every fetch of `name` fail until cleared.
    pub fn fail_body(&self, name: impl Into<String>) {
        self.failing_bodies.lock().unwrap().insert(name.into());
    }

    /// Clears all injected body failures.
    pub fn clear_body_failures(&self) {
        self.failing_bodies.lock().unwrap().clear();
    }

    /// Makes `fetch_manifest` fail.
    pub fn set_fail_manifest(&self, fail: bool) {
        self.fail_manifest
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Makes `report_state` fail.
    pub fn set_fail_report(&self, fail: bool) {
        self.fail_report
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Number of manifest fetches performed.
    pub fn manifest_fetches(&self) -> u64 {
        self.manifest_fetches
            .load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Entry names fetched, in order.
    pub fn body_fetches(&self) -> Vec<String> {
        self.body_fetches.lock().unwrap().clone()
    }

    /// State reports delivered so far.
    pub fn reports(&self) -> Vec<StateReport> {
        self.reports.lock().unwrap().clone()
    }
}

impl ConfigTransport for MockTransport {
    fn fetch_manifest(&self, _api_key: &ApiKey) -> ClientResult<Manifest> {
        self.manifest_fetches
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.fail_manifest.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(ClientError::sync_manifest("injected manifest failure"));
        }
        self.manifest
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ClientError::sync_manifest("no mock manifest set"))
    }

    fn fetch_body(
        &self,
        _api_key: &ApiKey,
        name: &str,
        content_ref: &str,
    ) -> ClientResult<Vec<u8>> {
        self.body_fetches.lock().unwrap().push(name.to_string());
        if self.failing_bodies.lock().unwrap().contains(name) {
            return Err(ClientError::sync_body(name, "injected body failure"));
        }
        self.bodies
            .lock()
            .unwrap()
            .get(&(name.to_string(), content_ref.to_string()))
            .cloned()
            .ok_or_else(|| ClientError::sync_body(name, "no mock body set"))
    }

    fn report_state(&self, _api_key: &ApiKey, report: &StateReport) -> ClientResult<()> {
        if self.fail_report.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(ClientError::Report("injected report failure".into()));
        }
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}
