//! ---
//! sky_section: "02-flight-model"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Flight-dynamics adapter contract and aircraft facade."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---

/// Contract every flight-dynamics engine binding fulfils.
///
/// The gateway drives the engine exclusively through named scalar properties
/// and single fixed-`dt` steps. Implementations are owned by one event loop
/// and are never shared across threads, hence no `Send`/`Sync` bound.
pub trait FdmAdapter {
    /// Advance the model by exactly one `dt`. `false` signals an engine failure.
    fn run(&mut self) -> bool;

    /// Notify the engine that real-time stepping is on hold.
    fn pause(&mut self);

    /// Notify the engine that real-time stepping continues.
    fn resume(&mut self);

    /// Re-apply the initial condition and restart propulsion.
    fn reset(&mut self) -> bool;

    /// Read a property; unknown names read as `0.0`.
    fn get_property(&self, name: &str) -> f64;

    fn set_property(&mut self, name: &str, value: f64);

    /// Simulation time in seconds.
    fn sim_time(&self) -> f64;

    /// Integration step in seconds.
    fn dt(&self) -> f64;

    /// Throttle setting the engine expects after a reset.
    fn idle_throttle(&self) -> f64 {
        0.0
    }
}

impl<F: FdmAdapter + ?Sized> FdmAdapter for Box<F> {
    fn run(&mut self) -> bool {
        (**self).run()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn resume(&mut self) {
        (**self).resume()
    }

    fn reset(&mut self) -> bool {
        (**self).reset()
    }

    fn get_property(&self, name: &str) -> f64 {
        (**self).get_property(name)
    }

    fn set_property(&mut self, name: &str, value: f64) {
        (**self).set_property(name, value)
    }

    fn sim_time(&self) -> f64 {
        (**self).sim_time()
    }

    fn dt(&self) -> f64 {
        (**self).dt()
    }

    fn idle_throttle(&self) -> f64 {
        (**self).idle_throttle()
    }
}
