//! The SPH force terms and the velocity Verlet step for a single particle.
//!
//! All functions work on the neighbour list copies taken during the search
//! pass of the current timestep: neighbour densities are the values of the
//! previous step, only the integrated particle's own density is fresh.

use crate::constants::FLUID_REFERENCE_DENSITY;
use crate::constants::PRESSURE_CONSTANT;
use crate::constants::VISCOSITY;
use crate::kernel::SmoothingKernel;
use crate::particle::Particle;
use crate::vector::Vector3;

pub const GRAVITY: Vector3 = Vector3::new(0.0, -9.81, 0.0);

#[derive(Clone, Copy, Debug)]
pub struct IntegrationParameters {
    pub timestep: f64,
    pub half_timestep: f64,
    pub max_velocity: f64,
    pub sink_height: f64,
    pub gravity: Vector3,
}

impl IntegrationParameters {
    pub fn new(timestep: f64, max_velocity: f64, sink_height: f64, gravity: Vector3) -> Self {
        Self {
            timestep,
            half_timestep: timestep / 2.0,
            max_velocity,
            sink_height,
            gravity,
        }
    }
}

pub fn local_pressure(particle: &Particle) -> f64 {
    PRESSURE_CONSTANT * (particle.local_density - FLUID_REFERENCE_DENSITY)
}

/// Kernel weighted sum of neighbour masses, clamped from below by the
/// reference density. With no neighbours in range the clamp alone applies.
pub fn local_density(
    particle: &Particle,
    fluid_neighbours: &[Particle],
    static_neighbours: &[Particle],
    kernel: &impl SmoothingKernel,
) -> f64 {
    let density: f64 = fluid_neighbours
        .iter()
        .chain(static_neighbours)
        .map(|neighbour| neighbour.mass * kernel.value(particle.position - neighbour.position))
        .sum();
    density.max(FLUID_REFERENCE_DENSITY)
}

fn density_acceleration(
    particle: &Particle,
    fluid_neighbours: &[Particle],
    static_neighbours: &[Particle],
    kernel: &impl SmoothingKernel,
) -> Vector3 {
    let pressure = local_pressure(particle);
    let mut acceleration = Vector3::ZERO;
    for neighbour in fluid_neighbours.iter().chain(static_neighbours) {
        acceleration -= (neighbour.mass / particle.mass)
            * ((pressure + local_pressure(neighbour))
                / (2.0 * particle.local_density * neighbour.local_density))
            * kernel.gradient(particle.position - neighbour.position);
    }
    acceleration
}

/// Laminar viscosity over fluid neighbours only. Terms with coinciding
/// positions are skipped.
fn viscosity_acceleration(
    particle: &Particle,
    fluid_neighbours: &[Particle],
    kernel: &impl SmoothingKernel,
) -> Vector3 {
    let mut acceleration = Vector3::ZERO;
    for neighbour in fluid_neighbours {
        let rij = neighbour.position - particle.position;
        let distance = rij.length();
        if distance == 0.0 {
            continue;
        }
        acceleration += neighbour.mass
            * ((4.0 * VISCOSITY * rij.dot(kernel.gradient(rij)))
                / ((particle.local_density + neighbour.local_density) * distance * distance))
            * (particle.velocity - neighbour.velocity);
    }
    acceleration / particle.local_density
}

pub fn acceleration(
    particle: &Particle,
    fluid_neighbours: &[Particle],
    static_neighbours: &[Particle],
    kernel: &impl SmoothingKernel,
    gravity: Vector3,
) -> Vector3 {
    gravity
        + density_acceleration(particle, fluid_neighbours, static_neighbours, kernel)
        + viscosity_acceleration(particle, fluid_neighbours, kernel)
}

fn clamp_velocity(particle: &mut Particle, max_velocity: f64) {
    if particle.velocity.length() > max_velocity {
        particle.velocity = particle.velocity.normalize() * max_velocity;
    }
}

/// One velocity Verlet step (kick, drift, kick, drift). The second
/// acceleration is evaluated with the same neighbour set and densities as
/// the first; only the half-kicked velocity differs. Returns true when the
/// particle ends at or below the sink height and must be deleted.
pub fn integrate(
    particle: &mut Particle,
    fluid_neighbours: &[Particle],
    static_neighbours: &[Particle],
    kernel: &impl SmoothingKernel,
    parameters: &IntegrationParameters,
) -> bool {
    let acceleration_start = acceleration(
        particle,
        fluid_neighbours,
        static_neighbours,
        kernel,
        parameters.gravity,
    );
    particle.velocity += acceleration_start * parameters.half_timestep;
    clamp_velocity(particle, parameters.max_velocity);

    let position_half = particle.position + particle.velocity * parameters.half_timestep;

    let acceleration_half = acceleration(
        particle,
        fluid_neighbours,
        static_neighbours,
        kernel,
        parameters.gravity,
    );
    particle.velocity += acceleration_half * parameters.half_timestep;
    clamp_velocity(particle, parameters.max_velocity);

    particle.position = position_half + particle.velocity * parameters.half_timestep;
    debug_assert!(
        particle.position.is_finite() && particle.velocity.is_finite(),
        "non-finite particle state after integration"
    );
    particle.position.y <= parameters.sink_height
}
