//! Time integration schemes.
//!
//! Every scheme advances a [`ParticleSystem`] by exactly one step of `dt`:
//! time moves forward by `dt` once, positions and velocities are written, and
//! forces are left evaluated at the final state. Multi-stage schemes
//! re-evaluate forces after every intermediate state write.

use bevy::math::DVec3;
use bevy::prelude::*;

use super::system::ParticleSystem;

/// Numerical integration scheme.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Reflect)]
pub enum Integrator {
    /// Explicit forward Euler, first order.
    Euler,
    /// Semi-implicit Euler: velocity first, then position from the new velocity.
    #[default]
    SymplecticEuler,
    /// Explicit midpoint, second order.
    Midpoint,
    /// Heun's method, second order.
    Rk2,
    /// Classic fourth-order Runge-Kutta.
    Rk4,
    /// Position Verlet with velocity reconstructed from the displacement.
    Verlet,
}

impl Integrator {
    pub const ALL: [Integrator; 6] = [
        Integrator::Euler,
        Integrator::SymplecticEuler,
        Integrator::Midpoint,
        Integrator::Rk2,
        Integrator::Rk4,
        Integrator::Verlet,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Integrator::Euler => "Euler",
            Integrator::SymplecticEuler => "Symplectic Euler",
            Integrator::Midpoint => "Midpoint",
            Integrator::Rk2 => "RK2",
            Integrator::Rk4 => "RK4",
            Integrator::Verlet => "Verlet",
        }
    }

    /// Advance `system` by `dt`.
    ///
    /// `prev_pos` of every particle holds its position at entry afterwards.
    pub fn step(&self, system: &mut ParticleSystem, dt: f64) {
        if system.is_empty() {
            system.set_time(system.time() + dt);
            return;
        }

        let entry = system.positions();
        system.refresh_forces();

        match self {
            Integrator::Euler => euler(system, dt),
            Integrator::SymplecticEuler => symplectic_euler(system, dt),
            Integrator::Midpoint => midpoint(system, dt),
            Integrator::Rk2 => rk2(system, dt),
            Integrator::Rk4 => rk4(system, dt),
            Integrator::Verlet => verlet(system, dt),
        }

        system.set_previous_positions(&entry);
    }
}

/// `x + h * k`, element-wise.
fn advance(x: &[DVec3], h: f64, k: &[DVec3]) -> Vec<DVec3> {
    x.iter().zip(k).map(|(&x, &k)| x + h * k).collect()
}

/// Write a state and time, then re-evaluate forces there.
fn write_stage(system: &mut ParticleSystem, state: &[DVec3], time: f64) {
    system.set_state(state);
    system.set_time(time);
    system.update_forces();
}

fn euler(system: &mut ParticleSystem, dt: f64) {
    let t0 = system.time();
    let x0 = system.state();
    let dx = system.derivative();
    write_stage(system, &advance(&x0, dt, &dx), t0 + dt);
}

fn symplectic_euler(system: &mut ParticleSystem, dt: f64) {
    let t0 = system.time();
    let v1 = advance(&system.velocities(), dt, &system.accelerations());
    let p1 = advance(&system.positions(), dt, &v1);
    system.set_velocities(&v1);
    system.set_positions(&p1);
    system.set_time(t0 + dt);
    system.update_forces();
}

fn midpoint(system: &mut ParticleSystem, dt: f64) {
    let t0 = system.time();
    let x0 = system.state();
    let k1 = system.derivative();
    write_stage(system, &advance(&x0, 0.5 * dt, &k1), t0 + 0.5 * dt);

    let k_mid = system.derivative();
    write_stage(system, &advance(&x0, dt, &k_mid), t0 + dt);
}

fn rk2(system: &mut ParticleSystem, dt: f64) {
    let t0 = system.time();
    let x0 = system.state();
    let k1 = system.derivative();
    write_stage(system, &advance(&x0, dt, &k1), t0 + dt);

    let k2 = system.derivative();
    let x1: Vec<DVec3> = x0
        .iter()
        .zip(k1.iter().zip(&k2))
        .map(|(&x, (&a, &b))| x + 0.5 * dt * (a + b))
        .collect();
    write_stage(system, &x1, t0 + dt);
}

fn rk4(system: &mut ParticleSystem, dt: f64) {
    let t0 = system.time();
    let half = 0.5 * dt;
    let x0 = system.state();

    let k1 = system.derivative();
    write_stage(system, &advance(&x0, half, &k1), t0 + half);

    let k2 = system.derivative();
    write_stage(system, &advance(&x0, half, &k2), t0 + half);

    let k3 = system.derivative();
    write_stage(system, &advance(&x0, dt, &k3), t0 + dt);

    let k4 = system.derivative();
    let x1: Vec<DVec3> = (0..x0.len())
        .map(|i| x0[i] + dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]))
        .collect();
    write_stage(system, &x1, t0 + dt);
}

fn verlet(system: &mut ParticleSystem, dt: f64) {
    let t0 = system.time();
    let pt = system.positions();
    let pmt = if t0 == 0.0 {
        advance(&pt, -dt, &system.velocities())
    } else {
        system.previous_positions()
    };

    let acc = system.accelerations();
    let pdt: Vec<DVec3> = (0..pt.len())
        .map(|i| pt[i] + (pt[i] - pmt[i]) + dt * dt * acc[i])
        .collect();
    let vdt: Vec<DVec3> = pdt.iter().zip(&pt).map(|(&a, &b)| (a - b) / dt).collect();

    system.set_positions(&pdt);
    system.set_velocities(&vdt);
    system.set_time(t0 + dt);
    system.update_forces();
}
