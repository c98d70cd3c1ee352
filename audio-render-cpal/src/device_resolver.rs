use audio_render_core::{DeviceId, DeviceResolver, FormatConstraints};
use cpal::traits::{DeviceTrait, HostTrait};

/// Resolves locators to cpal output devices on the default host.
///
/// Device ids are cpal device names. `"default"` (or an empty locator)
/// follows the system default output, so it may resolve to a different
/// device after a hot swap.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalDeviceResolver;

impl CpalDeviceResolver {
    pub fn new() -> Self {
        Self
    }

    /// Names of every output device the host currently reports.
    pub fn list_output_devices(&self) -> Vec<String> {
        let host = cpal::default_host();
        match host.output_devices() {
            Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
            Err(e) => {
                log::warn!("failed to enumerate output devices: {}", e);
                Vec::new()
            }
        }
    }
}

impl DeviceResolver for CpalDeviceResolver {
    fn resolve_device_id(&self, locator: &str) -> Option<DeviceId> {
        let host = cpal::default_host();
        let name = if is_default_locator(locator) {
            host.default_output_device()?.name().ok()?
        } else {
            find_output_device(&host, locator)?.name().ok()?
        };
        DeviceId::new(name)
    }

    fn current_format_constraints(&self, device: &DeviceId) -> Option<FormatConstraints> {
        let host = cpal::default_host();
        let device = find_output_device(&host, device.as_str())?;
        let ranges = device
            .supported_output_configs()
            .inspect_err(|e| log::debug!("no output configs for device: {}", e))
            .ok()?;

        ranges.fold(None, |acc: Option<FormatConstraints>, range| {
            let min_rate = range.min_sample_rate().0;
            let max_rate = range.max_sample_rate().0;
            let channels = range.channels();
            Some(match acc {
                None => FormatConstraints {
                    min_rate,
                    max_rate,
                    max_channels: channels,
                },
                Some(c) => FormatConstraints {
                    min_rate: c.min_rate.min(min_rate),
                    max_rate: c.max_rate.max(max_rate),
                    max_channels: c.max_channels.max(channels),
                },
            })
        })
    }
}

pub(crate) fn find_output_device(host: &cpal::Host, name: &str) -> Option<cpal::Device> {
    let mut devices = host
        .output_devices()
        .inspect_err(|e| log::warn!("failed to enumerate output devices: {}", e))
        .ok()?;
    devices.find(|d| d.name().is_ok_and(|n| n == name))
}

fn is_default_locator(locator: &str) -> bool {
    let locator = locator.trim();
    locator.is_empty() || locator.eq_ignore_ascii_case("default")
}
