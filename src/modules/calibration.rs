//! Channel-offset calibration module.
//!
//! Collects one second's worth of samples from the selected analog input
//! channel (`floor(1/period)` ticks at the current real-time period),
//! averages them, and stores the mean as the calibration offset for the
//! selected device's (direction, channel) pair. When the window fills, the
//! module reports completion on its `Status` parameter and asks the host to
//! pause; the next `Unpause` starts a fresh run.
//!
//! Host-visible variables:
//!
//! - `Channel`: the input sample, delivered each tick via `TickContext`
//! - `Offset`: the last computed mean, published as an observable state
//!   parameter (zero before the first run)
//!
//! Device selection is by ordinal position in the registry's live
//! enumeration, resolved on every use. If the registry mutates between
//! selection and calibration, the ordinal may land on a different device;
//! this mirrors the selection model of the hardware front-end and is not
//! guarded here.

use std::sync::Arc;

use anyhow::Result;

use crate::error::CalibrationError;
use crate::hardware::{AnalogDevice, DeviceRegistry, Direction};
use crate::host::RtClock;
use crate::modules::observable::{Observable, ParameterSet};
use crate::modules::{
    ModuleConfig, ModuleRegistry, ModuleStatus, RealtimeModule, TickContext, UpdateFlag,
};

/// Type name under which the module's factory is registered.
pub const MODULE_TYPE: &str = "offset_calibration";

/// Channel-offset calibration module. See the module-level docs.
pub struct OffsetCalibration {
    name: String,
    registry: Arc<DeviceRegistry>,
    clock: Arc<dyn RtClock>,

    device_index: usize,
    direction: Direction,
    channel: usize,
    channel_labels: Vec<String>,

    period_s: f64,
    data_idx: usize,
    channel_data: Vec<f64>,

    offset: Arc<Observable<f64>>,
    status_line: Arc<Observable<String>>,
    parameters: ParameterSet,
    state: ModuleStatus,
}

impl OffsetCalibration {
    /// Status line before a channel has been calibrated.
    pub const STATUS_READY: &'static str = "Status: Please specify a channel...";
    /// Status line after a calibration run completes.
    pub const STATUS_COMPLETE: &'static str = "Status: Calibration complete.";

    /// Creates an uninitialized module bound to a device registry and clock.
    ///
    /// Call `init` before handing the module to the host.
    pub fn new(
        name: impl Into<String>,
        registry: Arc<DeviceRegistry>,
        clock: Arc<dyn RtClock>,
    ) -> Self {
        let offset = Arc::new(
            Observable::new("Offset", 0.0)
                .with_description("Calibration offset value")
                .with_units("V"),
        );
        let status_line =
            Arc::new(Observable::new("Status", Self::STATUS_READY.to_string()).read_only());

        let mut parameters = ParameterSet::new();
        parameters.register(Arc::clone(&offset));
        parameters.register(Arc::clone(&status_line));

        Self {
            name: name.into(),
            registry,
            clock,
            device_index: 0,
            direction: Direction::AnalogInput,
            channel: 0,
            channel_labels: Vec::new(),
            period_s: 0.0,
            data_idx: 0,
            channel_data: Vec::new(),
            offset,
            status_line,
            parameters,
            state: ModuleStatus::Uninitialized,
        }
    }

    /// Boxed constructor, for handing an instance straight to a host.
    pub fn boxed(
        name: impl Into<String>,
        registry: Arc<DeviceRegistry>,
        clock: Arc<dyn RtClock>,
    ) -> Box<dyn RealtimeModule> {
        Box::new(Self::new(name, registry, clock))
    }

    /// Registers this module's factory with the host's module registry.
    ///
    /// This is the plugin entry point: the host creates instances via
    /// `modules.create(MODULE_TYPE, name)`.
    pub fn register_factory(
        modules: &mut ModuleRegistry,
        registry: Arc<DeviceRegistry>,
        clock: Arc<dyn RtClock>,
    ) {
        modules.register(MODULE_TYPE, move |name| {
            Box::new(Self::new(name, Arc::clone(&registry), Arc::clone(&clock)))
        });
    }

    /// Number of samples accumulated per run at the current period.
    ///
    /// Zero when the period exceeds one second, in which case a run never
    /// completes; the module stays inert until the period is lowered.
    pub fn sample_window(&self) -> usize {
        (1.0 / self.period_s).floor() as usize
    }

    /// Samples accumulated in the current run.
    pub fn samples_accumulated(&self) -> usize {
        self.data_idx
    }

    /// Length of the internal sample buffer.
    pub fn buffer_len(&self) -> usize {
        self.channel_data.len()
    }

    /// Last computed offset (zero before the first run).
    pub fn offset(&self) -> f64 {
        self.offset.get()
    }

    /// The `Offset` parameter, for subscription.
    pub fn offset_parameter(&self) -> Arc<Observable<f64>> {
        Arc::clone(&self.offset)
    }

    /// Current status line.
    pub fn status_line(&self) -> String {
        self.status_line.get()
    }

    /// Host-visible parameters (`Offset`, `Status`).
    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    /// Ordinal index of the selected device.
    pub fn device_index(&self) -> usize {
        self.device_index
    }

    /// Selected analog direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Selected channel index.
    pub fn channel(&self) -> usize {
        self.channel
    }

    /// Channel labels for the current device/direction selection.
    pub fn channel_labels(&self) -> &[String] {
        &self.channel_labels
    }

    /// Device labels in enumeration order, for the selection front-end.
    pub fn device_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.registry
            .for_each_device(|device| names.push(device.name().to_string()));
        names
    }

    /// Selects a device by ordinal index and refreshes the channel list.
    pub fn select_device(&mut self, index: usize) {
        self.device_index = index;
        self.refresh_channels();
    }

    /// Selects the analog direction and refreshes the channel list.
    pub fn select_direction(&mut self, direction: Direction) {
        self.direction = direction;
        self.refresh_channels();
    }

    /// Selects the channel to calibrate.
    pub fn select_channel(&mut self, channel: usize) {
        self.channel = channel;
    }

    /// Rebuilds the channel label list from the selected device.
    ///
    /// If no device resolves at the selected ordinal, the list is left
    /// untouched (empty when no device has ever resolved).
    pub fn refresh_channels(&mut self) {
        let Some(device) = self.registry.device_at(self.device_index) else {
            return;
        };

        self.channel_labels.clear();
        for channel in 0..device.channel_count(self.direction) {
            self.channel_labels.push(channel.to_string());
        }
    }

    /// Runs the calibration once the sample window is full.
    fn calibrate(&mut self, tick: &mut TickContext) {
        let mean = self.channel_data.iter().sum::<f64>() / self.channel_data.len() as f64;
        self.offset.set_unchecked(mean);

        // Resolved against the live enumeration, not the one the labels
        // were built from.
        match self.registry.device_at(self.device_index) {
            Some(device) => {
                match device.set_calibration_offset(self.direction, self.channel, mean) {
                    Ok(()) => log::info!(
                        "Module '{}': stored offset {:.6} on '{}' {} channel {}",
                        self.name,
                        mean,
                        device.name(),
                        self.direction,
                        self.channel
                    ),
                    Err(err) => log::warn!(
                        "Module '{}': calibration write to '{}' failed: {}",
                        self.name,
                        device.name(),
                        err
                    ),
                }
            }
            None => log::warn!(
                "Module '{}': no device at index {}; offset {:.6} not applied",
                self.name,
                self.device_index,
                mean
            ),
        }

        self.status_line
            .set_unchecked(Self::STATUS_COMPLETE.to_string());
        tick.request_pause();
    }
}

impl RealtimeModule for OffsetCalibration {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, config: ModuleConfig) -> Result<()> {
        if let Some(device) = config.get("device").and_then(|v| v.as_u64()) {
            self.device_index = device as usize;
        }

        if let Some(direction) = config.get("direction").and_then(|v| v.as_str()) {
            self.direction = match direction {
                "input" => Direction::AnalogInput,
                "output" => Direction::AnalogOutput,
                other => {
                    return Err(CalibrationError::Configuration(format!(
                        "invalid direction '{other}': expected 'input' or 'output'"
                    ))
                    .into())
                }
            };
        }

        if let Some(channel) = config.get("channel").and_then(|v| v.as_u64()) {
            self.channel = channel as usize;
        }

        self.update(UpdateFlag::Init);
        self.refresh_channels();

        log::info!(
            "Module '{}' initialized: device {}, {} channel {}, period {:.6} s",
            self.name,
            self.device_index,
            self.direction,
            self.channel,
            self.period_s
        );
        Ok(())
    }

    fn update(&mut self, flag: UpdateFlag) {
        match flag {
            UpdateFlag::Init => {
                self.period_s = self.clock.period_s();
                self.offset.set_unchecked(0.0);
                self.state = ModuleStatus::Idle;
            }

            UpdateFlag::Modify => {}

            UpdateFlag::Unpause => {
                self.data_idx = 0;
                self.offset.set_unchecked(0.0);
                self.state = ModuleStatus::Accumulating;
            }

            UpdateFlag::Pause => {
                self.data_idx = 0;
                self.channel_data.clear();
                self.state = ModuleStatus::Idle;
            }

            UpdateFlag::Period => {
                self.period_s = self.clock.period_s();
                log::debug!(
                    "Module '{}': period now {:.6} s (window {})",
                    self.name,
                    self.period_s,
                    self.sample_window()
                );
            }
        }
    }

    fn execute(&mut self, tick: &mut TickContext) {
        if self.state == ModuleStatus::Uninitialized {
            return;
        }

        let window = self.sample_window();
        if self.data_idx < window {
            self.channel_data.push(tick.input());
            self.data_idx += 1;

            if self.data_idx == window {
                self.calibrate(tick);
            }
        }
    }

    fn status(&self) -> ModuleStatus {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::MockAnalogDevice;
    use crate::host::FixedClock;

    fn module_with_devices(period_s: f64, devices: &[(&str, usize, usize)]) -> OffsetCalibration {
        let registry = Arc::new(DeviceRegistry::new());
        for (i, (name, inputs, outputs)) in devices.iter().enumerate() {
            registry
                .register(
                    format!("dev{i}"),
                    Arc::new(MockAnalogDevice::new(*name, *inputs, *outputs)),
                )
                .unwrap();
        }
        OffsetCalibration::new("cal", registry, Arc::new(FixedClock::new(period_s)))
    }

    #[test]
    fn starts_uninitialized_with_ready_status() {
        let module = module_with_devices(0.1, &[]);
        assert_eq!(module.status(), ModuleStatus::Uninitialized);
        assert_eq!(module.status_line(), OffsetCalibration::STATUS_READY);
        assert_eq!(module.offset(), 0.0);
    }

    #[test]
    fn init_reads_period_and_populates_channels() {
        let mut module = module_with_devices(0.1, &[("daq", 4, 2)]);
        module.init(ModuleConfig::new()).unwrap();

        assert_eq!(module.status(), ModuleStatus::Idle);
        assert_eq!(module.sample_window(), 10);
        assert_eq!(module.channel_labels(), ["0", "1", "2", "3"]);
    }

    #[test]
    fn init_applies_selection_from_config() {
        let mut module = module_with_devices(0.1, &[("a", 4, 2), ("b", 8, 3)]);

        let mut config = ModuleConfig::new();
        config.set("device", serde_json::json!(1));
        config.set("direction", serde_json::json!("output"));
        config.set("channel", serde_json::json!(2));
        module.init(config).unwrap();

        assert_eq!(module.device_index(), 1);
        assert_eq!(module.direction(), Direction::AnalogOutput);
        assert_eq!(module.channel(), 2);
        assert_eq!(module.channel_labels(), ["0", "1", "2"]);
    }

    #[test]
    fn init_rejects_unknown_direction() {
        let mut module = module_with_devices(0.1, &[("daq", 4, 2)]);

        let mut config = ModuleConfig::new();
        config.set("direction", serde_json::json!("sideways"));

        let result = module.init(config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("sideways"));
    }

    #[test]
    fn refresh_without_resolvable_device_leaves_labels() {
        let mut module = module_with_devices(0.1, &[]);
        module.init(ModuleConfig::new()).unwrap();
        assert!(module.channel_labels().is_empty());

        module.select_device(3);
        assert!(module.channel_labels().is_empty());
    }

    #[test]
    fn direction_change_repopulates_channel_list() {
        let mut module = module_with_devices(0.1, &[("daq", 3, 7)]);
        module.init(ModuleConfig::new()).unwrap();
        assert_eq!(module.channel_labels().len(), 3);

        module.select_direction(Direction::AnalogOutput);

        let labels: Vec<String> = (0..7).map(|c| c.to_string()).collect();
        assert_eq!(module.channel_labels(), labels.as_slice());
    }

    #[test]
    fn device_names_follow_enumeration_order() {
        let module = module_with_devices(0.1, &[("first", 1, 1), ("second", 1, 1)]);
        assert_eq!(module.device_names(), ["first", "second"]);
    }

    #[test]
    fn sample_window_floors_inverse_period() {
        let mut module = module_with_devices(0.3, &[]);
        module.init(ModuleConfig::new()).unwrap();
        assert_eq!(module.sample_window(), 3);

        let mut module = module_with_devices(1.0, &[]);
        module.init(ModuleConfig::new()).unwrap();
        assert_eq!(module.sample_window(), 1);

        let mut module = module_with_devices(1.5, &[]);
        module.init(ModuleConfig::new()).unwrap();
        assert_eq!(module.sample_window(), 0);
    }

    #[test]
    fn factory_creates_instances_through_module_registry() {
        let registry = Arc::new(DeviceRegistry::new());
        let clock: Arc<dyn RtClock> = Arc::new(FixedClock::new(0.1));

        let mut modules = ModuleRegistry::new();
        OffsetCalibration::register_factory(&mut modules, registry, clock);
        assert!(modules.list_types().contains(&MODULE_TYPE.to_string()));

        let mut module = modules.create(MODULE_TYPE, "cal_0".to_string()).unwrap();
        assert_eq!(module.name(), "cal_0");
        module.init(ModuleConfig::new()).unwrap();
        assert_eq!(module.status(), ModuleStatus::Idle);
    }

    #[test]
    fn parameters_expose_offset_and_status() {
        let module = module_with_devices(0.1, &[]);
        let params = module.parameters();

        assert!(params.get::<f64>("Offset").is_some());
        assert!(params.get::<String>("Status").is_some());
    }
}
