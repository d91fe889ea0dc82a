//! Observable parameters.
//!
//! Reactive parameter system using `tokio::sync::watch` for multi-subscriber
//! notifications. A module publishes its host-visible state variables (for
//! this crate: the calibration `Offset` and the `Status` line) as
//! `Observable<T>` values registered in a `ParameterSet`; front-ends
//! subscribe for change notifications without polling.
//!
//! All module-side operations (`get`, `set`, `set_unchecked`) are
//! synchronous and non-blocking, so observables are safe to touch from the
//! real-time path. Only subscribers await.
//!
//! # Example
//!
//! ```rust,ignore
//! let offset = Arc::new(Observable::new("Offset", 0.0).with_units("V"));
//!
//! let mut rx = offset.subscribe();
//! tokio::spawn(async move {
//!     while rx.changed().await.is_ok() {
//!         println!("Offset is now {}", *rx.borrow());
//!     }
//! });
//!
//! offset.set(0.0125)?;
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::watch;

/// A thread-safe, observable value with change notifications.
pub struct Observable<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// The watch channel sender (holds the current value).
    sender: watch::Sender<T>,
    /// Parameter metadata.
    metadata: ObservableMetadata,
    /// Optional validation function.
    validator: Option<Arc<dyn Fn(&T) -> Result<()> + Send + Sync>>,
}

impl<T: Clone + Send + Sync + 'static> Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("metadata", &self.metadata)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

/// Metadata for an observable parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservableMetadata {
    /// Parameter name (unique within a module).
    pub name: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// Physical units (e.g., "V", "s").
    pub units: Option<String>,
    /// Whether this parameter rejects external writes.
    pub read_only: bool,
}

impl<T> Observable<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a new observable with an initial value.
    pub fn new(name: impl Into<String>, initial_value: T) -> Self {
        let (sender, _) = watch::channel(initial_value);
        Self {
            sender,
            metadata: ObservableMetadata {
                name: name.into(),
                description: None,
                units: None,
                read_only: false,
            },
            validator: None,
        }
    }

    /// Adds a description to this observable.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = Some(description.into());
        self
    }

    /// Adds units to this observable.
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.metadata.units = Some(units.into());
        self
    }

    /// Marks this observable as read-only for external writers.
    pub fn read_only(mut self) -> Self {
        self.metadata.read_only = true;
        self
    }

    /// Adds a custom validator function.
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&T) -> Result<()> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Gets the current value (clone).
    pub fn get(&self) -> T {
        self.sender.borrow().clone()
    }

    /// Gets the parameter name.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Gets the metadata.
    pub fn metadata(&self) -> &ObservableMetadata {
        &self.metadata
    }

    /// Sets a new value, notifying all subscribers.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the parameter is read-only or validation fails.
    pub fn set(&self, value: T) -> Result<()> {
        if self.metadata.read_only {
            return Err(anyhow!("Parameter '{}' is read-only", self.metadata.name));
        }

        if let Some(validator) = &self.validator {
            validator(&value)?;
        }

        self.sender.send_replace(value);
        Ok(())
    }

    /// Sets a value bypassing validation and the read-only flag.
    ///
    /// For the owning module's internal state publication.
    pub(crate) fn set_unchecked(&self, value: T) {
        self.sender.send_replace(value);
    }

    /// Subscribes to value changes.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T> Observable<T>
where
    T: Clone + Send + Sync + PartialOrd + Debug + 'static,
{
    /// Adds min/max range validation.
    pub fn with_range(mut self, min: T, max: T) -> Self {
        self.validator = Some(Arc::new(move |value: &T| {
            if value < &min || value > &max {
                Err(anyhow!(
                    "Value {:?} out of range [{:?}, {:?}]",
                    value,
                    min,
                    max
                ))
            } else {
                Ok(())
            }
        }));
        self
    }
}

/// A module's collection of host-visible parameters.
///
/// Parameters are stored as `Arc<Observable<T>>` so the owning module keeps
/// a handle for publication while the host holds the set for introspection
/// and subscription.
#[derive(Default)]
pub struct ParameterSet {
    parameters: std::collections::HashMap<String, Box<dyn std::any::Any + Send + Sync>>,
}

impl Debug for ParameterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterSet")
            .field("names", &self.names())
            .finish()
    }
}

impl ParameterSet {
    /// Creates a new empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observable parameter.
    pub fn register<T>(&mut self, observable: Arc<Observable<T>>)
    where
        T: Clone + Send + Sync + 'static,
    {
        let name = observable.metadata.name.clone();
        self.parameters.insert(name, Box::new(observable));
    }

    /// Gets a parameter by name.
    pub fn get<T>(&self, name: &str) -> Option<Arc<Observable<T>>>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.parameters
            .get(name)
            .and_then(|p| p.downcast_ref::<Arc<Observable<T>>>())
            .cloned()
    }

    /// Lists all parameter names.
    pub fn names(&self) -> Vec<&str> {
        self.parameters.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observable_basic_get_set() {
        let obs = Observable::new("Offset", 0.0);
        assert_eq!(obs.get(), 0.0);
        assert_eq!(obs.name(), "Offset");

        obs.set(0.125).unwrap();
        assert_eq!(obs.get(), 0.125);
    }

    #[test]
    fn observable_metadata_builders() {
        let obs = Observable::new("Offset", 0.0)
            .with_description("Calibration offset value")
            .with_units("V");

        assert_eq!(obs.metadata().units.as_deref(), Some("V"));
        assert!(obs.metadata().description.is_some());
    }

    #[test]
    fn observable_range_validation() {
        let obs = Observable::new("period", 0.1).with_range(1e-6, 1.0);

        assert!(obs.set(0.5).is_ok());
        assert!(obs.set(0.0).is_err());
        assert!(obs.set(2.0).is_err());
    }

    #[test]
    fn read_only_rejects_external_set_but_not_publication() {
        let obs = Observable::new("Status", "idle".to_string()).read_only();

        assert!(obs.set("busy".to_string()).is_err());
        obs.set_unchecked("busy".to_string());
        assert_eq!(obs.get(), "busy");
    }

    #[tokio::test]
    async fn subscribers_see_published_values() {
        let obs = Observable::new("Offset", 0.0);
        let mut rx = obs.subscribe();

        assert_eq!(*rx.borrow(), 0.0);

        obs.set_unchecked(5.5);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 5.5);
    }

    #[test]
    fn parameter_set_stores_and_retrieves_by_type() {
        let mut params = ParameterSet::new();
        params.register(Arc::new(Observable::new("Offset", 0.0).with_units("V")));
        params.register(Arc::new(Observable::new("Status", String::new())));

        assert!(params.get::<f64>("Offset").is_some());
        assert!(params.get::<String>("Status").is_some());
        assert!(params.get::<f64>("Status").is_none());
        assert!(params.get::<f64>("missing").is_none());

        let offset = params.get::<f64>("Offset").unwrap();
        offset.set_unchecked(1.5);
        assert_eq!(params.get::<f64>("Offset").unwrap().get(), 1.5);
    }
}
