/*
 * Offset Calibration Harness
 *
 * Runs one channel-offset calibration pass against mock hardware: registers
 * two mock devices, selects a (device, direction, channel) triple from the
 * command line, feeds a synthetic noisy input one sample per tick, and
 * prints the computed offset plus the value read back from the device.
 *
 * This is the CLI stand-in for the host's selection front-end; the module
 * itself never parses arguments or owns a UI.
 */

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;

use daq_calibration::hardware::{
    AnalogDevice, DeviceRegistry, Direction, MockAnalogDevice, NoisySignal,
};
use daq_calibration::host::{FixedClock, ModuleHost};
use daq_calibration::modules::{ModuleConfig, OffsetCalibration, RealtimeModule};

#[derive(Parser)]
#[command(
    name = "calibrate",
    about = "Run a channel-offset calibration pass against mock hardware"
)]
struct Args {
    /// Real-time tick period in seconds
    #[arg(long, default_value_t = 0.001)]
    period: f64,

    /// Ordinal index of the device to calibrate
    #[arg(long, default_value_t = 0)]
    device: usize,

    /// Analog direction: "input" or "output"
    #[arg(long, default_value = "input")]
    direction: String,

    /// Channel index to calibrate
    #[arg(long, default_value_t = 0)]
    channel: usize,

    /// DC level of the synthetic input signal
    #[arg(long, default_value_t = 0.25)]
    level: f64,

    /// Peak noise amplitude added on top of the DC level
    #[arg(long, default_value_t = 0.05)]
    noise: f64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.period <= 0.0 {
        bail!("period must be positive, got {}", args.period);
    }

    let direction_arg = args.direction.to_ascii_lowercase();
    let direction = match direction_arg.as_str() {
        "input" => Direction::AnalogInput,
        "output" => Direction::AnalogOutput,
        other => bail!("invalid direction '{}': expected 'input' or 'output'", other),
    };

    let registry = Arc::new(DeviceRegistry::new());
    registry.register("daq0", Arc::new(MockAnalogDevice::new("Mock PCI-6221", 16, 2)))?;
    registry.register("daq1", Arc::new(MockAnalogDevice::new("Mock USB-6008", 8, 2)))?;

    let clock = Arc::new(FixedClock::new(args.period));
    let mut module = OffsetCalibration::new("offset_cal", Arc::clone(&registry), clock.clone());

    let mut config = ModuleConfig::new();
    config.set("device", serde_json::json!(args.device));
    config.set("direction", serde_json::json!(direction_arg));
    config.set("channel", serde_json::json!(args.channel));
    module.init(config)?;

    println!("Devices:");
    for info in registry.list_devices() {
        println!(
            "  {} ({} in / {} out)",
            info.name, info.input_channels, info.output_channels
        );
    }
    println!(
        "Calibrating device {} {} channel {} at period {} s ({} samples)",
        args.device,
        direction,
        args.channel,
        args.period,
        module.sample_window()
    );

    if module.sample_window() == 0 {
        bail!("period {} s exceeds 1 s: the sample window is empty", args.period);
    }

    let mut signal = NoisySignal::new(args.level, args.noise);
    let mut host = ModuleHost::new(module, clock);
    host.unpause();

    let mut ticks = 0usize;
    while !host.is_paused() {
        host.tick(signal.next_sample());
        ticks += 1;
    }

    println!("{}", host.module().status_line());
    println!("Computed offset after {} ticks: {:.6}", ticks, host.module().offset());

    if let Some(device) = registry.device_at(args.device) {
        match device.calibration_offset(direction, args.channel) {
            Some(value) => println!("{} reads back {:.6}", device.name(), value),
            None => println!("{} holds no calibration for that channel", device.name()),
        }
    }

    Ok(())
}
