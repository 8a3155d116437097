//! ---
//! sky_section: "03-simulation-clock"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Pause/run state machine driving the flight-dynamics engine."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use std::time::Duration;

use serde::Serialize;
use skylink_fdm::aircraft::set_controls;
use skylink_fdm::{Aircraft, ControlSurfaces, FdmAdapter};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Relative slack applied before rounding a run duration up to whole steps.
const STEP_COUNT_TOLERANCE: f64 = 1e-9;

/// Pause/run state of the simulation clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockMode {
    /// Only explicit `step`/`run_for` advance time.
    Paused,
    /// The background tick steps once per `dt`.
    Running,
    /// Terminal; entered on the first engine failure.
    Stopped,
}

/// Snapshot reported by the `status` command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClockState {
    /// True unless the clock is `Running`.
    pub paused: bool,
    /// True once an engine step has failed.
    pub stopped: bool,
    /// Engine time in seconds.
    pub simulation_time: f64,
    /// Integration step in seconds.
    pub dt: f64,
}

/// Failures reported by [`Simulator`] operations.
#[derive(Debug, Error, PartialEq)]
pub enum ClockError {
    /// The engine refused to advance; fatal.
    #[error("flight dynamics engine failed to advance at t={time:.4}s")]
    StepFailed {
        /// Simulation time at which the step failed.
        time: f64,
    },
    /// An earlier step failure already stopped the clock.
    #[error("simulator is stopped")]
    Stopped,
    /// `run_for` got a negative or non-finite duration.
    #[error("run duration must be a finite, non-negative number of seconds, got {0}")]
    InvalidDuration(f64),
}

/// Owns the flight-dynamics adapter and its pause/run state.
///
/// Every mutation of the adapter goes through this type so the server loop
/// has a single owner to borrow from.
#[derive(Debug)]
pub struct Simulator<F> {
    fdm: F,
    mode: ClockMode,
}

impl<F: FdmAdapter> Simulator<F> {
    /// Wrap an adapter; the clock starts `Paused`.
    pub fn new(fdm: F) -> Self {
        Self {
            fdm,
            mode: ClockMode::Paused,
        }
    }

    /// Underlying adapter.
    pub fn fdm(&self) -> &F {
        &self.fdm
    }

    /// Instrument view over the adapter.
    pub fn aircraft(&self) -> Aircraft<'_, F> {
        Aircraft::new(&self.fdm)
    }

    /// Current clock mode.
    pub fn mode(&self) -> ClockMode {
        self.mode
    }

    /// Whether the background tick is stepping.
    pub fn is_running(&self) -> bool {
        self.mode == ClockMode::Running
    }

    /// Whether a step failure ended the simulation.
    pub fn is_stopped(&self) -> bool {
        self.mode == ClockMode::Stopped
    }

    /// Integration step in seconds.
    pub fn dt(&self) -> f64 {
        self.fdm.dt()
    }

    /// Real-time period of the background tick.
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(self.fdm.dt())
    }

    /// Snapshot for status replies.
    pub fn state(&self) -> ClockState {
        ClockState {
            paused: self.mode != ClockMode::Running,
            stopped: self.mode == ClockMode::Stopped,
            simulation_time: self.fdm.sim_time(),
            dt: self.fdm.dt(),
        }
    }

    /// Enter `Paused`. Idempotent; ignored once stopped.
    pub fn pause(&mut self) {
        if self.mode == ClockMode::Stopped {
            return;
        }
        self.mode = ClockMode::Paused;
        self.fdm.pause();
        info!(simulation_time = self.fdm.sim_time(), "simulator paused");
    }

    /// Enter `Running`. Idempotent; ignored once stopped.
    pub fn resume(&mut self) {
        if self.mode == ClockMode::Stopped {
            return;
        }
        self.mode = ClockMode::Running;
        self.fdm.resume();
        info!(simulation_time = self.fdm.sim_time(), "simulator resumed");
    }

    /// Reset the engine to its initial condition and neutralise the controls.
    ///
    /// The pause flag is left as it was. Failure is reported, not fatal.
    pub fn reset(&mut self) -> bool {
        if self.mode == ClockMode::Stopped {
            return false;
        }
        if !self.fdm.reset() {
            warn!("flight dynamics engine failed to reset");
            return false;
        }
        let idle = self.fdm.idle_throttle();
        set_controls(&mut self.fdm, ControlSurfaces::neutral(idle));
        info!(idle_throttle = idle, "simulator reset");
        true
    }

    /// Advance exactly one `dt`, paused or not.
    pub fn step(&mut self) -> Result<(), ClockError> {
        if self.mode == ClockMode::Stopped {
            return Err(ClockError::Stopped);
        }
        if self.fdm.run() {
            return Ok(());
        }
        let time = self.fdm.sim_time();
        self.mode = ClockMode::Stopped;
        error!(simulation_time = time, "flight dynamics engine step failed; stopping");
        Err(ClockError::StepFailed { time })
    }

    /// Run `ceil(seconds / dt)` steps back to back. Returns the step count.
    pub fn run_for(&mut self, seconds: f64) -> Result<u64, ClockError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(ClockError::InvalidDuration(seconds));
        }
        let ratio = seconds / self.fdm.dt();
        let steps = (ratio - STEP_COUNT_TOLERANCE * ratio.max(1.0)).ceil().max(0.0) as u64;
        for _ in 0..steps {
            self.step()?;
        }
        debug!(seconds, steps, simulation_time = self.fdm.sim_time(), "run_for complete");
        Ok(steps)
    }

    /// Background tick: one step while `Running`, nothing otherwise.
    pub fn tick(&mut self) -> Result<bool, ClockError> {
        match self.mode {
            ClockMode::Running => self.step().map(|()| true),
            ClockMode::Paused => Ok(false),
            ClockMode::Stopped => Err(ClockError::Stopped),
        }
    }

    /// Clamp and write control inputs; returns the values applied.
    pub fn apply_controls(&mut self, controls: ControlSurfaces) -> ControlSurfaces {
        set_controls(&mut self.fdm, controls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skylink_common::InitialCondition;
    use skylink_fdm::properties as prop;
    use skylink_fdm::PropertyTreeFdm;

    fn simulator(dt: f64) -> Simulator<PropertyTreeFdm> {
        Simulator::new(PropertyTreeFdm::new(dt, InitialCondition::default()).expect("adapter"))
    }

    #[test]
    fn starts_paused_and_toggles_idempotently() {
        let mut sim = simulator(0.01);
        assert_eq!(sim.mode(), ClockMode::Paused);
        sim.resume();
        sim.resume();
        assert!(sim.is_running());
        assert!(!sim.fdm().is_paused());
        sim.pause();
        sim.pause();
        assert!(sim.state().paused);
        assert!(sim.fdm().is_paused());
    }

    #[test]
    fn manual_steps_advance_while_paused() {
        let mut sim = simulator(0.01);
        sim.step().expect("step");
        sim.step().expect("step");
        let state = sim.state();
        assert!(state.paused);
        assert!((state.simulation_time - 0.02).abs() < 1e-12);
    }

    #[test]
    fn run_for_uses_ceiling_step_count() {
        let mut sim = simulator(1.0 / 160.0);
        assert_eq!(sim.run_for(1.0), Ok(160));
        assert!((sim.state().simulation_time - 1.0).abs() < 1e-9);
        assert!(sim.state().paused);

        let mut sim = simulator(0.3);
        assert_eq!(sim.run_for(1.0), Ok(4));
        assert_eq!(sim.run_for(0.0), Ok(0));
        assert_eq!(sim.run_for(-1.0), Err(ClockError::InvalidDuration(-1.0)));
    }

    #[test]
    fn tick_only_steps_when_running() {
        let mut sim = simulator(0.5);
        assert_eq!(sim.tick(), Ok(false));
        sim.resume();
        assert_eq!(sim.tick(), Ok(true));
        assert_eq!(sim.state().simulation_time, 0.5);
    }

    #[test]
    fn reset_neutralises_controls_and_keeps_pause_flag() {
        let fdm = PropertyTreeFdm::new(0.5, InitialCondition::default())
            .expect("adapter")
            .with_idle_throttle(0.1);
        let mut sim = Simulator::new(fdm);
        sim.resume();
        sim.apply_controls(ControlSurfaces {
            aileron: 0.4,
            elevator: -0.3,
            rudder: 0.2,
            throttle: 0.9,
        });
        sim.step().expect("step");

        assert!(sim.reset());
        assert!(sim.is_running());
        assert_eq!(sim.state().simulation_time, 0.0);
        let controls = sim.aircraft().controls();
        assert_eq!(controls, ControlSurfaces::neutral(0.1));
    }

    #[test]
    fn reset_failure_is_reported_not_fatal() {
        let fdm = PropertyTreeFdm::new(0.5, InitialCondition::default())
            .expect("adapter")
            .fail_resets();
        let mut sim = Simulator::new(fdm);
        sim.apply_controls(ControlSurfaces {
            aileron: 0.4,
            ..ControlSurfaces::default()
        });
        assert!(!sim.reset());
        assert!(!sim.is_stopped());
        assert_eq!(sim.fdm().get_property(prop::AILERON_CMD), 0.4);
    }

    #[test]
    fn step_failure_stops_the_clock() {
        let fdm = PropertyTreeFdm::new(0.5, InitialCondition::default())
            .expect("adapter")
            .fail_after(1);
        let mut sim = Simulator::new(fdm);
        sim.resume();
        assert_eq!(sim.tick(), Ok(true));
        assert_eq!(sim.tick(), Err(ClockError::StepFailed { time: 0.5 }));
        assert!(sim.is_stopped());
        assert!(sim.state().stopped);

        sim.resume();
        assert!(sim.is_stopped());
        assert_eq!(sim.step(), Err(ClockError::Stopped));
        assert_eq!(sim.run_for(1.0), Err(ClockError::Stopped));
    }

    #[test]
    fn run_for_failure_is_fatal_midway() {
        let fdm = PropertyTreeFdm::new(0.1, InitialCondition::default())
            .expect("adapter")
            .fail_after(3);
        let mut sim = Simulator::new(fdm);
        assert!(matches!(sim.run_for(1.0), Err(ClockError::StepFailed { .. })));
        assert!(sim.is_stopped());
    }
}
