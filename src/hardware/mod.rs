//! Hardware abstraction layer: the analog device trait, the device
//! registry, and mock implementations for tests and demos.

pub mod mock;
pub mod registry;

pub use mock::{MockAnalogDevice, NoisySignal};
pub use registry::{AnalogDevice, DeviceId, DeviceInfo, DeviceRegistry, Direction};
