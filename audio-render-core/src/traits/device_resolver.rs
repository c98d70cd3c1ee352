use crate::models::format::FormatConstraints;
use crate::models::render_models::DeviceId;

/// Device-selection collaborator.
///
/// Owns enumeration and user preference ordering; the render core only asks
/// which device a locator currently points at.
pub trait DeviceResolver: Send + Sync {
    /// Resolve `locator` to the device it selects right now.
    ///
    /// `None` when nothing is selected or the device is unplugged.
    fn resolve_device_id(&self, locator: &str) -> Option<DeviceId>;

    /// Output capabilities of `device`, if the device reports them.
    fn current_format_constraints(&self, device: &DeviceId) -> Option<FormatConstraints>;
}
