//! Device registry for runtime hardware management.
//!
//! The registry is the host-owned collection of analog I/O devices the
//! calibration module addresses. Devices are kept in registration order and
//! resolved by **ordinal position**: the module walks the enumeration with a
//! position counter each time it needs the selected device, and never caches
//! the result across calls, since the registry composition can change while
//! the module is running.
//!
//! The registry is passed into modules as an explicit `Arc<DeviceRegistry>`
//! handle rather than reached through a process-wide singleton, which keeps
//! the module testable against a private registry instance.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use daq_calibration::hardware::{DeviceRegistry, Direction, MockAnalogDevice};
//!
//! let registry = DeviceRegistry::new();
//! registry
//!     .register("daq0", Arc::new(MockAnalogDevice::new("NI PCI-6221", 16, 2)))
//!     .unwrap();
//!
//! let dev = registry.device_at(0).unwrap();
//! assert_eq!(dev.channel_count(Direction::AnalogInput), 16);
//! ```

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::error::{AppResult, CalibrationError};

/// Unique identifier for a registered device.
///
/// Format: lowercase alphanumeric with underscores (e.g., "daq0", "usb_6008").
pub type DeviceId = String;

/// Whether an analog channel belongs to the input or the output subdevice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Analog input (ADC) channels.
    AnalogInput,
    /// Analog output (DAC) channels.
    AnalogOutput,
}

impl Direction {
    /// All selectable directions, in front-end presentation order.
    pub const ALL: [Direction; 2] = [Direction::AnalogInput, Direction::AnalogOutput];

    /// Short label for selection front-ends.
    pub fn label(self) -> &'static str {
        match self {
            Direction::AnalogInput => "Input",
            Direction::AnalogOutput => "Output",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An analog I/O device with per-channel calibration storage.
///
/// Implementations wrap hardware drivers. All methods are synchronous and
/// must not block: they are called from the host's real-time path.
pub trait AnalogDevice: Send + Sync {
    /// Human-readable device name shown in selection front-ends.
    fn name(&self) -> &str;

    /// Number of channels available for the given direction.
    fn channel_count(&self, direction: Direction) -> usize;

    /// Stores `value` as the calibration offset for `(direction, channel)`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the channel does not exist for that direction or the
    /// hardware rejects the write.
    fn set_calibration_offset(
        &self,
        direction: Direction,
        channel: usize,
        value: f64,
    ) -> AppResult<()>;

    /// Reads back the stored calibration offset, if one has been written.
    fn calibration_offset(&self, direction: Direction, channel: usize) -> Option<f64>;
}

/// Information about a registered device (returned by list operations).
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Unique identifier.
    pub id: DeviceId,
    /// Human-readable name.
    pub name: String,
    /// Analog input channel count.
    pub input_channels: usize,
    /// Analog output channel count.
    pub output_channels: usize,
}

/// Ordered registry of analog devices, addressed by ordinal position.
///
/// Interior locking keeps the registry shareable as `Arc<DeviceRegistry>`
/// between the host (which registers and removes devices) and modules
/// (which only query it). Access is read-mostly; queries take a read lock.
pub struct DeviceRegistry {
    devices: RwLock<Vec<(DeviceId, Arc<dyn AnalogDevice>)>>,
}

impl DeviceRegistry {
    /// Creates a new empty device registry.
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<(DeviceId, Arc<dyn AnalogDevice>)>> {
        self.devices.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<(DeviceId, Arc<dyn AnalogDevice>)>> {
        self.devices.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a device at the end of the enumeration order.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the id is already registered.
    pub fn register(
        &self,
        id: impl Into<DeviceId>,
        device: Arc<dyn AnalogDevice>,
    ) -> AppResult<()> {
        let id = id.into();
        let mut devices = self.write();
        if devices.iter().any(|(existing, _)| *existing == id) {
            return Err(CalibrationError::DeviceAlreadyRegistered(id));
        }
        log::debug!("Registered device '{}' ({})", id, device.name());
        devices.push((id, device));
        Ok(())
    }

    /// Removes a device. Later devices shift down one ordinal position.
    ///
    /// Returns true if the device was found and removed.
    pub fn unregister(&self, id: &str) -> bool {
        let mut devices = self.write();
        let before = devices.len();
        devices.retain(|(existing, _)| existing != id);
        devices.len() != before
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the registry holds no devices.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Whether a device with the given id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.read().iter().any(|(existing, _)| existing == id)
    }

    /// Visits every device in registration order.
    pub fn for_each_device(&self, mut f: impl FnMut(&Arc<dyn AnalogDevice>)) {
        for (_, device) in self.read().iter() {
            f(device);
        }
    }

    /// Resolves a device by ordinal position in the current enumeration.
    ///
    /// This is a linear, registration-order walk carrying a position counter;
    /// the result is never cached by callers. Ordinals are not stable across
    /// registry mutation: removing a device shifts everything after it.
    pub fn device_at(&self, index: usize) -> Option<Arc<dyn AnalogDevice>> {
        let mut position = 0usize;
        let mut found = None;
        self.for_each_device(|device| {
            if position == index && found.is_none() {
                found = Some(Arc::clone(device));
            }
            position += 1;
        });
        found
    }

    /// Lists all registered devices in enumeration order.
    pub fn list_devices(&self) -> Vec<DeviceInfo> {
        self.read()
            .iter()
            .map(|(id, device)| DeviceInfo {
                id: id.clone(),
                name: device.name().to_string(),
                input_channels: device.channel_count(Direction::AnalogInput),
                output_channels: device.channel_count(Direction::AnalogOutput),
            })
            .collect()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::MockAnalogDevice;

    fn registry_with(names: &[&str]) -> DeviceRegistry {
        let registry = DeviceRegistry::new();
        for (i, name) in names.iter().enumerate() {
            registry
                .register(format!("dev{i}"), Arc::new(MockAnalogDevice::new(*name, 4, 2)))
                .unwrap();
        }
        registry
    }

    #[test]
    fn direction_choices_cover_input_and_output() {
        let labels: Vec<&str> = Direction::ALL.iter().map(|d| d.label()).collect();
        assert_eq!(labels, ["Input", "Output"]);
    }

    #[test]
    fn register_preserves_enumeration_order() {
        let registry = registry_with(&["first", "second", "third"]);

        let mut seen = Vec::new();
        registry.for_each_device(|d| seen.push(d.name().to_string()));
        assert_eq!(seen, ["first", "second", "third"]);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let registry = registry_with(&["first"]);
        let result = registry.register("dev0", Arc::new(MockAnalogDevice::new("again", 1, 1)));
        assert!(matches!(
            result,
            Err(CalibrationError::DeviceAlreadyRegistered(id)) if id == "dev0"
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn device_at_resolves_by_ordinal() {
        let registry = registry_with(&["first", "second", "third"]);

        assert_eq!(registry.device_at(1).unwrap().name(), "second");
        assert_eq!(registry.device_at(2).unwrap().name(), "third");
        assert!(registry.device_at(3).is_none());
    }

    #[test]
    fn device_at_on_empty_registry_is_none() {
        let registry = DeviceRegistry::new();
        assert!(registry.device_at(0).is_none());
    }

    #[test]
    fn unregister_shifts_later_ordinals() {
        let registry = registry_with(&["first", "second", "third"]);

        assert!(registry.unregister("dev0"));
        assert_eq!(registry.device_at(0).unwrap().name(), "second");
        assert_eq!(registry.device_at(1).unwrap().name(), "third");
        assert!(!registry.unregister("dev0"));
    }

    #[test]
    fn list_devices_reports_channel_counts() {
        let registry = DeviceRegistry::new();
        registry
            .register("daq0", Arc::new(MockAnalogDevice::new("NI PCI-6221", 16, 2)))
            .unwrap();

        let infos = registry.list_devices();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].id, "daq0");
        assert_eq!(infos[0].input_channels, 16);
        assert_eq!(infos[0].output_channels, 2);
    }
}
