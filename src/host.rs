//! Host-side abstractions the module is driven through.
//!
//! The real host application owns the real-time scheduler, the clock, and
//! the pause control. This crate only needs the seams: `RtClock` supplies
//! the tick period, and `ModuleHost` is a synchronous dispatch harness that
//! replays the host's calling convention (one `execute` per tick while
//! unpaused, lifecycle updates on pause/unpause/period changes) for tests
//! and the CLI tool. `ModuleHost` does no timing of its own; it is not a
//! scheduler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::modules::{RealtimeModule, TickContext, UpdateFlag};

/// Source of the real-time tick period.
///
/// Queried by modules on `Init` and `Period` updates; never cached between
/// those notifications.
pub trait RtClock: Send + Sync {
    /// Current tick period in seconds.
    fn period_s(&self) -> f64;
}

/// Settable clock for tests and demo harnesses.
///
/// The period is stored as raw bits in an atomic so the clock can be shared
/// as `Arc<FixedClock>` between the harness (which sets it) and the module
/// (which reads it) without locking.
pub struct FixedClock {
    period_bits: AtomicU64,
}

impl FixedClock {
    /// Creates a clock ticking at `period_s` seconds.
    pub fn new(period_s: f64) -> Self {
        Self {
            period_bits: AtomicU64::new(period_s.to_bits()),
        }
    }

    /// Changes the tick period. The owning harness is responsible for
    /// delivering the matching `Period` update to its module.
    pub fn set_period_s(&self, period_s: f64) {
        self.period_bits.store(period_s.to_bits(), Ordering::SeqCst);
    }
}

impl RtClock for FixedClock {
    fn period_s(&self) -> f64 {
        f64::from_bits(self.period_bits.load(Ordering::SeqCst))
    }
}

/// Synchronous dispatch harness standing in for the real-time host.
///
/// Owns a module and drives it the way the host contract specifies:
///
/// - `tick` invokes `execute` once with the current channel sample, then
///   honors a pause request by delivering `Pause`
/// - `pause`/`unpause` deliver the matching lifecycle updates and gate
///   further ticks
/// - `set_period_s` updates the shared clock and delivers `Period`
///
/// Modules start paused; calibration runs begin with `unpause`.
pub struct ModuleHost<M: RealtimeModule> {
    module: M,
    clock: Arc<FixedClock>,
    paused: bool,
}

impl<M: RealtimeModule> ModuleHost<M> {
    /// Wraps an initialized module. The module starts paused.
    pub fn new(module: M, clock: Arc<FixedClock>) -> Self {
        Self {
            module,
            clock,
            paused: true,
        }
    }

    /// Read access to the hosted module.
    pub fn module(&self) -> &M {
        &self.module
    }

    /// Mutable access to the hosted module (selection changes etc.).
    pub fn module_mut(&mut self) -> &mut M {
        &mut self.module
    }

    /// Whether the module is currently paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Delivers `Unpause` and resumes per-tick execution.
    pub fn unpause(&mut self) {
        if self.paused {
            self.module.update(UpdateFlag::Unpause);
            self.paused = false;
        }
    }

    /// Delivers `Pause` and stops per-tick execution.
    pub fn pause(&mut self) {
        if !self.paused {
            self.module.update(UpdateFlag::Pause);
            self.paused = true;
        }
    }

    /// Changes the tick period and delivers the `Period` update.
    pub fn set_period_s(&mut self, period_s: f64) {
        self.clock.set_period_s(period_s);
        self.module.update(UpdateFlag::Period);
    }

    /// Executes one tick with the given channel sample.
    ///
    /// Returns true if the module ran (i.e., it was not paused). A pause
    /// requested by the module during the tick is applied before returning.
    pub fn tick(&mut self, input: f64) -> bool {
        if self.paused {
            return false;
        }
        let mut tick = TickContext::new(input);
        self.module.execute(&mut tick);
        if tick.pause_requested() {
            self.pause();
        }
        true
    }

    /// Feeds samples one per tick until the module pauses or the samples
    /// run out. Returns the number of ticks executed.
    pub fn run(&mut self, samples: impl IntoIterator<Item = f64>) -> usize {
        let mut ticks = 0;
        for sample in samples {
            if self.paused {
                break;
            }
            self.tick(sample);
            ticks += 1;
        }
        ticks
    }

    /// Consumes the harness, returning the module.
    pub fn into_module(self) -> M {
        self.module
    }
}
