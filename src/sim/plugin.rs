//! Bevy plugin driving the simulation on the fixed timestep.

use bevy::prelude::*;

use super::integrator::Integrator;
use super::params::{SimParams, SphParams};
use super::simulation::{Simulation, TickStats};

/// Largest step taken when following the app's fixed delta.
const MAX_TIMESTEP: f64 = 1.0 / 30.0;

/// Plugin that steps a [`Simulation`] resource every `FixedUpdate`.
///
/// # Example
///
/// ```rust,ignore
/// use bevy::prelude::*;
/// use particula::prelude::*;
///
/// fn main() {
///     App::new()
///         .add_plugins(MinimalPlugins)
///         .add_plugins(SimulationPlugin::with_params(SimParams::fluid()))
///         .run();
/// }
/// ```
#[derive(Default)]
pub struct SimulationPlugin {
    params: SimParams,
}

impl SimulationPlugin {
    pub fn with_params(params: SimParams) -> Self {
        Self { params }
    }
}

/// Statistics of the most recent tick.
#[derive(Resource, Clone, Copy, Debug, Default)]
pub struct LastTick(pub TickStats);

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<SimParams>()
            .register_type::<SphParams>()
            .register_type::<Integrator>();

        let params = match self.params.validate() {
            Ok(()) => self.params.clone(),
            Err(err) => {
                error!("invalid simulation parameters, falling back to defaults: {}", err);
                SimParams::default()
            }
        };
        let simulation = Simulation::from_params(&params).unwrap_or_default();

        app.insert_resource(params)
            .insert_resource(simulation)
            .init_resource::<LastTick>();

        app.add_systems(FixedUpdate, (sync_params, step_simulation).chain());
    }
}

/// Push edited parameters into the running simulation.
fn sync_params(params: Res<SimParams>, mut simulation: ResMut<Simulation>) {
    if !params.is_changed() {
        return;
    }
    if let Err(err) = params.validate() {
        warn!("ignoring invalid simulation parameters: {}", err);
        return;
    }
    simulation.integrator = params.integrator;
    simulation.k_elastic = params.k_elastic;
    simulation.k_friction = params.k_friction;
    simulation.set_gravity(params.gravity);
    simulation.set_sph_params(params.sph.clone());
}

/// Advance the simulation by one step.
fn step_simulation(
    time: Res<Time>,
    params: Res<SimParams>,
    mut simulation: ResMut<Simulation>,
    mut last: ResMut<LastTick>,
) {
    let dt = params
        .fixed_timestep
        .unwrap_or_else(|| time.delta_secs_f64().min(MAX_TIMESTEP));

    if dt > 0.0 {
        last.0 = simulation.tick(dt);
    }
}
