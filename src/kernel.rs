//! SPH smoothing kernels.

use std::f64::consts::PI;

use crate::constants::R_MAX;
use crate::vector::Vector3;

/// The smoothing weight capability used by the integrator: the kernel value
/// `W` and its gradient with respect to the first particle position.
pub trait SmoothingKernel {
    fn value(&self, rij: Vector3) -> f64;
    fn gradient(&self, rij: Vector3) -> Vector3;
}

/// Cubic spline kernel (Monaghan & Lattanzio 1985) with compact support
/// `R_MAX`, normalized so that it integrates to one over the support ball.
#[derive(Clone, Copy, Default)]
pub struct CubicSplineKernel;

fn kernel_function(ratio: f64) -> f64 {
    if ratio < 0.5 {
        1.0 - 6.0 * ratio.powi(2) + 6.0 * ratio.powi(3)
    } else if ratio < 1.0 {
        2.0 * (1.0 - ratio).powi(3)
    } else {
        0.0
    }
}

fn kernel_derivative_function(ratio: f64) -> f64 {
    if ratio < 0.5 {
        -2.0 * ratio + 3.0 * ratio.powi(2)
    } else if ratio < 1.0 {
        -(1.0 - ratio).powi(2)
    } else {
        0.0
    }
}

impl SmoothingKernel for CubicSplineKernel {
    fn value(&self, rij: Vector3) -> f64 {
        let ratio = rij.length() / R_MAX;
        8.0 / (PI * R_MAX.powi(3)) * kernel_function(ratio)
    }

    /// Gradient with respect to the first particle: direction `rij / |rij|`,
    /// magnitude `dW/dr`. Zero for coinciding particles and outside the
    /// support.
    fn gradient(&self, rij: Vector3) -> Vector3 {
        let distance = rij.length();
        if distance == 0.0 || distance > R_MAX {
            return Vector3::ZERO;
        }
        let ratio = distance / R_MAX;
        rij / distance * (48.0 / (PI * R_MAX.powi(4)) * kernel_derivative_function(ratio))
    }
}
