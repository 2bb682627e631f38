//! Device lifecycle states and the report payload sent upstream.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle stance of a device toward its delivered configuration set.
///
/// Reporting is advisory rollout feedback; the client does not enforce
/// an ordering between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    /// The delivered configurations were applied.
    ConfigurationsApplied,
    /// The device endorses the configuration set.
    Upvote,
    /// The device rejects the configuration set.
    Downvote,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceState::ConfigurationsApplied => "configurations_applied",
            DeviceState::Upvote => "upvote",
            DeviceState::Downvote => "downvote",
        };
        f.write_str(name)
    }
}

/// Telemetry payload reporting a state transition to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateReport {
    /// The reporting identity bound via `identify`.
    pub client_name: String,
    /// The reported lifecycle state.
    pub state: DeviceState,
    /// Version of the manifest the report refers to, or `None` when no
    /// configuration set has been committed yet.
    pub manifest_version: Option<u64>,
}

impl StateReport {
    /// Creates a new report payload.
    pub fn new(
        client_name: impl Into<String>,
        state: DeviceState,
        manifest_version: Option<u64>,
    ) -> Self {
        Self {
            client_name: client_name.into(),
            state,
            manifest_version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_display_matches_wire_form() {
        assert_eq!(
            DeviceState::ConfigurationsApplied.to_string(),
            "configurations_applied"
        );
        assert_eq!(DeviceState::Upvote.to_string(), "upvote");
        assert_eq!(DeviceState::Downvote.to_string(), "downvote");
    }

    #[test]
    fn report_serializes_snake_case() {
        let report = StateReport::new("device-1", DeviceState::Upvote, Some(4));
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["client_name"], "device-1");
        assert_eq!(value["state"], "upvote");
        assert_eq!(value["manifest_version"], 4);
    }

    #[test]
    fn report_without_committed_version() {
        let report = StateReport::new("device-1", DeviceState::Downvote, None);
        let value = serde_json::to_value(&report).unwrap();
        assert!(value["manifest_version"].is_null());
    }
}
