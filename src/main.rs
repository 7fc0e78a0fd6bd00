//! Particula - headless SPH dam break demo
//!
//! Drops a jittered block of fluid into an open box and logs progress until
//! the configured number of steps has run.

use bevy::log::LogPlugin;
use bevy::math::DVec3;
use bevy::prelude::*;
use particula::prelude::*;

/// Steps simulated before the demo exits.
const DEMO_STEPS: u64 = 600;
/// Steps between progress reports.
const REPORT_EVERY: u64 = 50;
/// Half extent of the container on x and z.
const BOX_HALF: f64 = 6.0;

fn main() {
    App::new()
        .add_plugins(MinimalPlugins)
        .add_plugins(LogPlugin::default())
        .add_plugins(SimulationPlugin::with_params(
            SimParams::fluid()
                .with_timestep(0.01)
                .with_response(0.5, 0.0)
                .with_sph(SphParams::water().with_max_particles(4096)),
        ))
        .add_systems(Startup, setup_scene)
        .add_systems(Update, report_progress)
        .run();
}

/// Replace the empty simulation with the dam break scene.
fn setup_scene(params: Res<SimParams>, mut simulation: ResMut<Simulation>) {
    let corner = DVec3::new(-BOX_HALF + 1.0, 5.0, -BOX_HALF + 1.0);
    let block = ParticleBlock::new([10, 10, 10], 1.0, corner).with_jitter(0.5, 0x5eed);

    match Simulation::fluid_scene(&params, &block, BOX_HALF) {
        Ok(scene) => {
            info!(
                "dam break: {} particles, {} colliders, integrator {}",
                scene.system.num_particles(),
                scene.colliders.len(),
                scene.integrator.name()
            );
            *simulation = scene;
        }
        Err(err) => error!("could not build scene: {}", err),
    }
}

/// Log simulation progress and exit once enough steps have run.
fn report_progress(
    simulation: Res<Simulation>,
    last: Res<LastTick>,
    mut reported: Local<u64>,
    mut exit: MessageWriter<AppExit>,
) {
    let steps = simulation.steps;
    if steps >= *reported + REPORT_EVERY {
        *reported = steps - steps % REPORT_EVERY;
        let particles = simulation.system.particles();
        let mean_density =
            particles.iter().map(|p| p.density).sum::<f64>() / particles.len().max(1) as f64;
        info!(
            "step {} t={:.2}s: {} collisions, max speed {:.2}, mean density {:.3}",
            steps,
            simulation.system.time(),
            last.0.collisions,
            last.0.max_speed,
            mean_density
        );
    }

    if steps >= DEMO_STEPS {
        info!("finished {} steps", steps);
        exit.write(AppExit::Success);
    }
}
