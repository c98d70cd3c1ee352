use std::fmt;

use serde::{Deserialize, Serialize};

use super::format::StreamFormat;

/// Resolved identifier of a physical output device.
///
/// Produced by the device-selection collaborator; never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Returns `None` for an empty or whitespace-only identifier.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One start → stop run of the native stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSession {
    pub id: String,
    pub device: DeviceId,
    pub format: StreamFormat,
    pub started_at: String,
}

impl StreamSession {
    pub fn new(device: DeviceId, format: StreamFormat) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            device,
            format,
            started_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Counters for debugging an output stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderDiagnostics {
    pub callback_count: u64,
    /// Callbacks that found the stream lock held and rendered silence.
    pub contended_callbacks: u64,
    /// Callbacks that had fewer buffered bytes than requested.
    pub underrun_callbacks: u64,
    pub bytes_accepted: u64,
    pub bytes_rendered: u64,
    pub silence_bytes: u64,
    pub backpressure_retries: u64,
    pub dropped_writes: u64,
    pub drain_timeouts: u64,
    pub buffer_grows: u64,
    pub buffer_capacity: usize,
    pub pending_bytes: usize,
}

impl RenderDiagnostics {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
