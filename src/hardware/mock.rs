//! Mock hardware implementations.
//!
//! Provides simulated devices and signals for testing without physical
//! hardware:
//!
//! - `MockAnalogDevice` - analog I/O device with in-memory calibration
//!   storage and channel-count introspection
//! - `NoisySignal` - DC level plus uniform noise, standing in for the
//!   host-routed channel input in demos and tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{AppResult, CalibrationError};
use crate::hardware::registry::{AnalogDevice, Direction};

/// Mock analog I/O device with in-memory calibration storage.
///
/// Channel counts are fixed at construction. Calibration writes validate the
/// channel index against the count for the addressed direction; successful
/// writes can be read back with `calibration_offset`.
pub struct MockAnalogDevice {
    name: String,
    input_channels: usize,
    output_channels: usize,
    calibration: RwLock<HashMap<(Direction, usize), f64>>,
    write_count: AtomicUsize,
}

impl MockAnalogDevice {
    /// Creates a mock device with the given channel counts.
    pub fn new(name: impl Into<String>, input_channels: usize, output_channels: usize) -> Self {
        Self {
            name: name.into(),
            input_channels,
            output_channels,
            calibration: RwLock::new(HashMap::new()),
            write_count: AtomicUsize::new(0),
        }
    }

    /// Total number of calibration writes accepted by this device.
    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }
}

impl AnalogDevice for MockAnalogDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel_count(&self, direction: Direction) -> usize {
        match direction {
            Direction::AnalogInput => self.input_channels,
            Direction::AnalogOutput => self.output_channels,
        }
    }

    fn set_calibration_offset(
        &self,
        direction: Direction,
        channel: usize,
        value: f64,
    ) -> AppResult<()> {
        let count = self.channel_count(direction);
        if channel >= count {
            return Err(CalibrationError::ChannelOutOfRange {
                direction,
                channel,
                count,
            });
        }

        self.calibration
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((direction, channel), value);
        self.write_count.fetch_add(1, Ordering::SeqCst);
        log::debug!(
            "{}: stored calibration offset {:.6} for {} channel {}",
            self.name,
            value,
            direction,
            channel
        );
        Ok(())
    }

    fn calibration_offset(&self, direction: Direction, channel: usize) -> Option<f64> {
        self.calibration
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(direction, channel))
            .copied()
    }
}

/// Synthetic channel input: a DC level with uniform noise on top.
///
/// Stands in for the sample stream the host routes into the module's
/// `Channel` input. Seeded construction gives deterministic sequences for
/// tests.
pub struct NoisySignal {
    level: f64,
    amplitude: f64,
    rng: StdRng,
}

impl NoisySignal {
    /// Creates a signal centered on `level` with peak noise `amplitude`.
    pub fn new(level: f64, amplitude: f64) -> Self {
        Self::with_seed(level, amplitude, rand::random())
    }

    /// Creates a deterministic signal from an explicit seed.
    pub fn with_seed(level: f64, amplitude: f64, seed: u64) -> Self {
        Self {
            level,
            amplitude,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Produces the next sample.
    pub fn next_sample(&mut self) -> f64 {
        if self.amplitude <= 0.0 {
            return self.level;
        }
        self.level + self.rng.gen_range(-self.amplitude..self.amplitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_counts_follow_direction() {
        let dev = MockAnalogDevice::new("mock", 8, 2);
        assert_eq!(dev.channel_count(Direction::AnalogInput), 8);
        assert_eq!(dev.channel_count(Direction::AnalogOutput), 2);
    }

    #[test]
    fn calibration_write_and_read_back() {
        let dev = MockAnalogDevice::new("mock", 4, 2);

        dev.set_calibration_offset(Direction::AnalogInput, 3, 0.125)
            .unwrap();

        assert_eq!(dev.calibration_offset(Direction::AnalogInput, 3), Some(0.125));
        assert_eq!(dev.calibration_offset(Direction::AnalogInput, 2), None);
        assert_eq!(dev.calibration_offset(Direction::AnalogOutput, 3), None);
        assert_eq!(dev.write_count(), 1);
    }

    #[test]
    fn out_of_range_channel_is_rejected() {
        let dev = MockAnalogDevice::new("mock", 4, 2);

        let result = dev.set_calibration_offset(Direction::AnalogOutput, 2, 1.0);
        assert!(matches!(
            result,
            Err(CalibrationError::ChannelOutOfRange { channel: 2, count: 2, .. })
        ));
        assert_eq!(dev.write_count(), 0);
    }

    #[test]
    fn noisy_signal_stays_within_bounds() {
        let mut signal = NoisySignal::with_seed(2.5, 0.25, 7);
        for _ in 0..1000 {
            let sample = signal.next_sample();
            assert!(sample > 2.25 && sample < 2.75);
        }
    }

    #[test]
    fn seeded_signals_are_reproducible() {
        let mut a = NoisySignal::with_seed(0.0, 1.0, 42);
        let mut b = NoisySignal::with_seed(0.0, 1.0, 42);
        for _ in 0..16 {
            assert_eq!(a.next_sample(), b.next_sample());
        }
    }

    #[test]
    fn zero_amplitude_signal_is_constant() {
        let mut signal = NoisySignal::with_seed(1.5, 0.0, 0);
        assert_eq!(signal.next_sample(), 1.5);
        assert_eq!(signal.next_sample(), 1.5);
    }
}
