use crate::models::render_models::DeviceId;

/// State carried from before a device enumeration change to after it.
///
/// Lives for a single enumeration event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HotSwapSnapshot {
    pub was_running: bool,
    pub device: Option<DeviceId>,
}

/// Two-phase hook around an external device enumeration update.
pub trait EnumerationObserver: Send + Sync {
    /// Called before the device list mutates.
    fn on_before_enumeration_change(&self) -> HotSwapSnapshot;

    /// Called after the device list mutated, with the snapshot taken before.
    fn on_after_enumeration_change(&self, snapshot: HotSwapSnapshot);
}
