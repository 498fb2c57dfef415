//! Fixed numerical constants of the simulation.

/// Kernel influence factor relating cutoff and smoothing length.
pub const Q_MAX: f64 = 1.2;

/// Smoothing length of the kernel.
pub const H: f64 = 1.0;

/// Compact support cutoff of the kernel. Particles further apart than this
/// do not interact.
pub const R_MAX: f64 = Q_MAX * H;

/// Edge length of one grid cell. Must be at least `2 * R_MAX`, otherwise the
/// 3x3x3 neighbour cell block does not cover the influence sphere.
pub const DOMAIN_DIMENSION: f64 = 2.0 * R_MAX;

/// Half edge length of the cubic spawn volume around a source.
pub const SOURCE_SIZE: f64 = 4.0 * Q_MAX;

/// Density below which fluid particles are clamped.
pub const FLUID_REFERENCE_DENSITY: f64 = 1.0;

/// Density assigned to static boundary particles.
pub const STATIC_REFERENCE_DENSITY: f64 = 1.0;

pub const FLUID_MASS: f64 = 1.0;
pub const STATIC_MASS: f64 = 5.0;

/// Stiffness of the equation of state `P = k * (rho - rho_0)`.
pub const PRESSURE_CONSTANT: f64 = 20.0;

/// Kinematic viscosity coefficient.
pub const VISCOSITY: f64 = 1.0;
