use mpi::datatype::UserDatatype;
use mpi::internal::memoffset::offset_of;
use mpi::traits::Equivalence;
use mpi::Address;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::FLUID_MASS;
use crate::constants::FLUID_REFERENCE_DENSITY;
use crate::constants::STATIC_MASS;
use crate::constants::STATIC_REFERENCE_DENSITY;
use crate::vector::Vector3;

/// The behavioural kind of a particle. Static and shutter particles form
/// boundaries: they never move and keep their reference density.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticleKind {
    Fluid = 0,
    Static = 1,
    Shutter = 2,
}

impl ParticleKind {
    pub fn mass(self) -> f64 {
        match self {
            ParticleKind::Fluid => FLUID_MASS,
            ParticleKind::Static | ParticleKind::Shutter => STATIC_MASS,
        }
    }

    pub fn reference_density(self) -> f64 {
        match self {
            ParticleKind::Fluid => FLUID_REFERENCE_DENSITY,
            ParticleKind::Static | ParticleKind::Shutter => STATIC_REFERENCE_DENSITY,
        }
    }
}

/// One SPH particle. This struct doubles as the wire and disk record, hence
/// the fixed layout.
#[repr(C)]
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Particle {
    pub position: Vector3,
    pub velocity: Vector3,
    pub mass: f64,
    pub local_density: f64,
    pub kind: ParticleKind,
}

impl Particle {
    pub fn new(position: Vector3, velocity: Vector3, kind: ParticleKind) -> Self {
        Self {
            position,
            velocity,
            mass: kind.mass(),
            local_density: kind.reference_density(),
            kind,
        }
    }

    pub fn fluid(position: Vector3) -> Self {
        Self::new(position, Vector3::ZERO, ParticleKind::Fluid)
    }

    pub fn fluid_with_velocity(position: Vector3, velocity: Vector3) -> Self {
        Self::new(position, velocity, ParticleKind::Fluid)
    }

    pub fn is_fluid(&self) -> bool {
        self.kind == ParticleKind::Fluid
    }
}

impl Default for Particle {
    fn default() -> Self {
        Self::fluid(Vector3::ZERO)
    }
}

/// Particles compare by their phase space coordinates; mass and density are
/// derived quantities.
impl PartialEq for Particle {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position && self.velocity == other.velocity
    }
}

unsafe impl Equivalence for Particle {
    type Out = UserDatatype;

    fn equivalent_datatype() -> Self::Out {
        UserDatatype::structured(
            &[1, 1, 1, 1, 1],
            &[
                offset_of!(Particle, position) as Address,
                offset_of!(Particle, velocity) as Address,
                offset_of!(Particle, mass) as Address,
                offset_of!(Particle, local_density) as Address,
                offset_of!(Particle, kind) as Address,
            ],
            &[
                UserDatatype::contiguous(1, &Vector3::equivalent_datatype()),
                UserDatatype::contiguous(1, &Vector3::equivalent_datatype()),
                UserDatatype::contiguous(1, &f64::equivalent_datatype()),
                UserDatatype::contiguous(1, &f64::equivalent_datatype()),
                UserDatatype::contiguous(1, &i32::equivalent_datatype()),
            ],
        )
    }
}
