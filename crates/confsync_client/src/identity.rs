//! Client identity and lifecycle-state bookkeeping.

use crate::error::{ClientError, ClientResult};
use confsync_protocol::{DeviceState, StateReport};
use parking_lot::RwLock;

/// Identity and last-reported lifecycle state of this device.
///
/// The record here is telemetry, not a transactional ledger: it is
/// updated before the report leaves the device and is not rolled back
/// when delivery fails.
#[derive(Debug, Default)]
pub(crate) struct Identity {
    inner: RwLock<IdentityInner>,
}

#[derive(Debug, Default)]
struct IdentityInner {
    client_name: Option<String>,
    current_state: Option<DeviceState>,
    last_reported_version: Option<u64>,
}

impl Identity {
    /// Binds the reporting identity. Re-binding replaces the previous
    /// name (last writer wins).
    pub fn identify(&self, client_name: impl Into<String>) {
        self.inner.write().client_name = Some(client_name.into());
    }

    /// The bound identity, if any.
    pub fn client_name(&self) -> Option<String> {
        self.inner.read().client_name.clone()
    }

    /// The most recently recorded state, if any.
    pub fn current_state(&self) -> Option<DeviceState> {
        self.inner.read().current_state
    }

    /// Manifest version of the most recent record, if any.
    pub fn last_reported_version(&self) -> Option<u64> {
        self.inner.read().last_reported_version
    }

    /// Records a state transition locally and builds the report payload
    /// for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotIdentified`], without recording
    /// anything, if `identify` was never called.
    pub fn record(
        &self,
        state: DeviceState,
        manifest_version: Option<u64>,
    ) -> ClientResult<StateReport> {
        let mut inner = self.inner.write();
        let client_name = inner.client_name.clone().ok_or(ClientError::NotIdentified)?;
        inner.current_state = Some(state);
        inner.last_reported_version = manifest_version;
        Ok(StateReport::new(client_name, state, manifest_version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_requires_identity() {
        let identity = Identity::default();
        let result = identity.record(DeviceState::Upvote, Some(1));
        assert!(matches!(result, Err(ClientError::NotIdentified)));
        assert!(identity.current_state().is_none());
    }

    #[test]
    fn record_after_identify() {
        let identity = Identity::default();
        identity.identify("device-1");

        let report = identity.record(DeviceState::ConfigurationsApplied, Some(3)).unwrap();
        assert_eq!(report.client_name, "device-1");
        assert_eq!(report.manifest_version, Some(3));
        assert_eq!(
            identity.current_state(),
            Some(DeviceState::ConfigurationsApplied)
        );
        assert_eq!(identity.last_reported_version(), Some(3));
    }

    #[test]
    fn rebinding_replaces_name() {
        let identity = Identity::default();
        identity.identify("first");
        identity.identify("second");

        assert_eq!(identity.client_name().as_deref(), Some("second"));
        let report = identity.record(DeviceState::Downvote, None).unwrap();
        assert_eq!(report.client_name, "second");
    }
}
