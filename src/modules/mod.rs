//! Module system for host-driven real-time plugins.
//!
//! This module defines the `RealtimeModule` trait: the contract between the
//! host application and a loadable plugin. The host constructs a module
//! through a registered factory, initializes it from a `ModuleConfig`, then
//! drives it with per-tick `execute` calls and `UpdateFlag` lifecycle
//! notifications. All entry points run synchronously on the host's thread;
//! modules never block, spawn work, or suspend, and per-tick calls are
//! strictly sequential and non-overlapping.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──init()──> Idle(paused) ──Unpause──> Accumulating
//!                                ^                         │
//!                                └───────── Pause ─────────┘
//! ```
//!
//! `Period` refreshes the module's cached tick duration without a state
//! transition; `Modify` is reserved for generic parameter-change
//! notifications and is a no-op for modules that don't use it.

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::{AppResult, CalibrationError};

pub mod calibration;
pub mod observable;

pub use calibration::OffsetCalibration;

/// Lifecycle notification delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateFlag {
    /// Module loaded: read the current period, reset published state.
    Init,
    /// Generic parameter change. Reserved; modules may ignore it.
    Modify,
    /// Execution suspended: discard in-flight run state.
    Pause,
    /// Execution resumed: start a fresh run.
    Unpause,
    /// The real-time tick duration changed: re-read it from the clock.
    Period,
}

/// Coarse execution state of a module, for host monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleStatus {
    /// Created but not yet initialized.
    Uninitialized,
    /// Initialized and paused.
    Idle,
    /// Unpaused and collecting samples.
    Accumulating,
}

/// Per-tick exchange between the host and a module.
///
/// Carries the module's channel input sample in, and the module's requests
/// (currently only a pause request) out. The host applies requests after
/// `execute` returns.
pub struct TickContext {
    input: f64,
    pause_requested: bool,
}

impl TickContext {
    /// Builds the context for one tick with the current input sample.
    pub fn new(input: f64) -> Self {
        Self {
            input,
            pause_requested: false,
        }
    }

    /// The channel input sample for this tick.
    pub fn input(&self) -> f64 {
        self.input
    }

    /// Asks the host to pause the module once this tick completes.
    pub fn request_pause(&mut self) {
        self.pause_requested = true;
    }

    /// Whether the module asked to be paused.
    pub fn pause_requested(&self) -> bool {
        self.pause_requested
    }
}

/// Configuration for a module instance.
///
/// A flattened parameter map, typically built by the host from its own
/// configuration source and handed to `RealtimeModule::init`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Module-specific configuration parameters.
    #[serde(flatten)]
    pub params: HashMap<String, serde_json::Value>,
}

impl ModuleConfig {
    /// Creates a new empty module configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a configuration parameter by key.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.params.get(key)
    }

    /// Sets a configuration parameter.
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.params.insert(key.into(), value);
    }
}

/// A host-driven real-time plugin.
///
/// Modules must be `Send` so the host can move them onto whichever thread
/// runs the real-time loop. All methods are called from that single thread.
pub trait RealtimeModule: Send {
    /// Unique name of this module instance.
    fn name(&self) -> &str;

    /// Initializes the module from configuration.
    ///
    /// Called once after construction, before any `execute`. On success the
    /// module transitions from `Uninitialized` to `Idle`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the configuration is invalid.
    fn init(&mut self, config: ModuleConfig) -> Result<()>;

    /// Handles a lifecycle notification from the host.
    fn update(&mut self, flag: UpdateFlag);

    /// Executes one real-time tick. Called once per period while unpaused.
    fn execute(&mut self, tick: &mut TickContext);

    /// Current execution state.
    fn status(&self) -> ModuleStatus;
}

impl<M: RealtimeModule + ?Sized> RealtimeModule for Box<M> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn init(&mut self, config: ModuleConfig) -> Result<()> {
        (**self).init(config)
    }

    fn update(&mut self, flag: UpdateFlag) {
        (**self).update(flag);
    }

    fn execute(&mut self, tick: &mut TickContext) {
        (**self).execute(tick);
    }

    fn status(&self) -> ModuleStatus {
        (**self).status()
    }
}

/// Registry of module factory functions.
///
/// The host's loading mechanism: plugins register a factory under a type
/// name, and the host creates instances from configuration without
/// hardcoding module types.
#[derive(Default)]
pub struct ModuleRegistry {
    factories: HashMap<String, Box<dyn Fn(String) -> Box<dyn RealtimeModule> + Send + Sync>>,
}

impl ModuleRegistry {
    /// Creates a new empty module registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module factory under a type name.
    pub fn register<F>(&mut self, module_type: &str, factory: F)
    where
        F: Fn(String) -> Box<dyn RealtimeModule> + Send + Sync + 'static,
    {
        self.factories
            .insert(module_type.to_string(), Box::new(factory));
    }

    /// Creates a module instance of a registered type.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the module type is not registered.
    pub fn create(&self, module_type: &str, name: String) -> AppResult<Box<dyn RealtimeModule>> {
        let factory = self
            .factories
            .get(module_type)
            .ok_or_else(|| CalibrationError::UnknownModuleType(module_type.to_string()))?;
        Ok(factory(name))
    }

    /// Lists all registered module types.
    pub fn list_types(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_config_round_trips_values() {
        let mut config = ModuleConfig::new();
        config.set("channel", serde_json::json!(3));

        assert_eq!(config.get("channel").and_then(|v| v.as_u64()), Some(3));
        assert!(config.get("missing").is_none());
    }

    #[test]
    fn tick_context_carries_input_and_pause_request() {
        let mut tick = TickContext::new(1.25);
        assert_eq!(tick.input(), 1.25);
        assert!(!tick.pause_requested());

        tick.request_pause();
        assert!(tick.pause_requested());
    }

    #[test]
    fn unknown_module_type_is_an_error() {
        let registry = ModuleRegistry::new();
        let result = registry.create("missing", "m".to_string());
        assert!(matches!(
            result,
            Err(CalibrationError::UnknownModuleType(t)) if t == "missing"
        ));
    }
}
