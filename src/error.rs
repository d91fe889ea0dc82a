//! Custom error types for the crate.
//!
//! This module defines the primary error type, `CalibrationError`, using the
//! `thiserror` crate. A missing device or a failed calibration write never
//! aborts a run, so the fallible surfaces are the ones around the
//! calibration path: registry registration, module-type lookup,
//! configuration parsing, and channel validation on the device side.
//!
//! By using `#[error(...)]` display strings and an `AppResult` alias, error
//! handling stays consistent with the `?` operator throughout the crate.

use crate::hardware::Direction;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, CalibrationError>;

/// Errors raised by the registry, module system, and device layer.
#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("Device '{0}' is already registered")]
    DeviceAlreadyRegistered(String),

    #[error("Unknown module type: {0}")]
    UnknownModuleType(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Channel {channel} out of range for {direction} ({count} channels)")]
    ChannelOutOfRange {
        /// Analog direction the write addressed.
        direction: Direction,
        /// Requested channel index.
        channel: usize,
        /// Channel count the device reports for that direction.
        count: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_out_of_range_message_names_direction_and_bounds() {
        let err = CalibrationError::ChannelOutOfRange {
            direction: Direction::AnalogOutput,
            channel: 5,
            count: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("Channel 5"));
        assert!(msg.contains("Output"));
        assert!(msg.contains("2 channels"));
    }

    #[test]
    fn duplicate_registration_message_names_device() {
        let err = CalibrationError::DeviceAlreadyRegistered("daq0".into());
        assert!(err.to_string().contains("daq0"));
    }
}
