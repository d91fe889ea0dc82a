//! # Channel-Offset Calibration Module
//!
//! This crate implements a calibration plugin for a real-time
//! data-acquisition host. The host loads the module, then drives it through
//! a per-period execution callback and a small set of lifecycle
//! notifications. While unpaused, the module accumulates one second's worth
//! of samples from a selected analog input channel, averages them, and
//! writes the mean into the selected device's calibration store for the
//! chosen (direction, channel) pair.
//!
//! ## Crate Structure
//!
//! - **`error`**: The `CalibrationError` enum and `AppResult` alias for
//!   centralized error handling.
//! - **`hardware`**: The `AnalogDevice` trait, the ordinal-addressed
//!   `DeviceRegistry`, and mock implementations for tests and demos.
//! - **`host`**: The seams to the enclosing application: the `RtClock`
//!   period source and a synchronous `ModuleHost` dispatch harness.
//! - **`modules`**: The `RealtimeModule` plugin contract (`UpdateFlag`
//!   lifecycle, per-tick `TickContext`), `ModuleConfig`, the factory
//!   `ModuleRegistry`, observable parameters, and the concrete
//!   `OffsetCalibration` module.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use daq_calibration::hardware::{AnalogDevice, DeviceRegistry, Direction, MockAnalogDevice};
//! use daq_calibration::host::{FixedClock, ModuleHost};
//! use daq_calibration::modules::{ModuleConfig, OffsetCalibration, RealtimeModule};
//!
//! let registry = Arc::new(DeviceRegistry::new());
//! let device = Arc::new(MockAnalogDevice::new("daq0", 8, 2));
//! registry.register("daq0", device.clone()).unwrap();
//!
//! let clock = Arc::new(FixedClock::new(0.1));
//! let mut module = OffsetCalibration::new("cal", registry, clock.clone());
//! module.init(ModuleConfig::new()).unwrap();
//!
//! let mut host = ModuleHost::new(module, clock);
//! host.unpause();
//! host.run((1..=10).map(f64::from));
//!
//! assert!(host.is_paused());
//! assert_eq!(host.module().offset(), 5.5);
//! assert_eq!(
//!     device.calibration_offset(Direction::AnalogInput, 0),
//!     Some(5.5)
//! );
//! ```

pub mod error;
pub mod hardware;
pub mod host;
pub mod modules;
