/// Output stream state machine.
///
/// State transitions:
/// ```text
/// closed → open → running → stopping → open → closed
///            ↑       │
///            └───────┘ (start failure leaves the stream open)
/// ```
///
/// The device identifier and negotiated format only exist while the stream
/// is open, running or stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    Closed,
    Open,
    Running,
    Stopping,
}

impl StreamState {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_stopping(&self) -> bool {
        matches!(self, Self::Stopping)
    }

    /// Whether the driver callback may consume buffered bytes.
    ///
    /// `Stopping` keeps servicing pulls so the buffer can drain.
    pub fn services_pull(&self) -> bool {
        matches!(self, Self::Running | Self::Stopping)
    }

    /// Whether a device and format are attached.
    pub fn has_device(&self) -> bool {
        !self.is_closed()
    }
}
