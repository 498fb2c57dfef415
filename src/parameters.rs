//! Run parameters, read from a YAML parameter file with one section per
//! concern. Every section has defaults so the binary also runs without a
//! file.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::constants::DOMAIN_DIMENSION;
use crate::constants::R_MAX;
use crate::particle::Particle;
use crate::vector::Vector3;

#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("failed to read parameter file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse parameter file {path}: {source}")]
    Invalid {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("timestep duration must be positive, got {0}")]
    NonPositiveTimestep(f64),
    #[error("max velocity must be positive, got {0}")]
    NonPositiveMaxVelocity(f64),
    #[error("sink height must be finite, got {0}")]
    InvalidSinkHeight(f64),
    #[error("source position {0} is not finite")]
    InvalidSource(Vector3),
    #[error("fluid block spacing must be positive, got {0}")]
    InvalidBlockSpacing(f64),
    #[error("influence radius {r_max} exceeds half the cell edge {edge}")]
    UnsoundNeighbourhood { r_max: f64, edge: f64 },
}

/// A cubic block of fluid particles seeded before the first timestep.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FluidBlock {
    pub origin: Vector3,
    pub counts: [u32; 3],
    #[serde(default = "default_spacing")]
    pub spacing: f64,
}

fn default_spacing() -> f64 {
    1.0
}

impl FluidBlock {
    pub fn particles(&self) -> Vec<Particle> {
        let mut particles = Vec::new();
        for i in 0..self.counts[0] {
            for j in 0..self.counts[1] {
                for k in 0..self.counts[2] {
                    let offset =
                        Vector3::new(i as f64, j as f64, k as f64) * self.spacing;
                    particles.push(Particle::fluid(self.origin + offset));
                }
            }
        }
        particles
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationParameters {
    pub timesteps: u32,
    pub timestep_duration: f64,
    pub max_velocity: f64,
    pub sink_height: f64,
    #[serde(default)]
    pub sources: Vec<Vector3>,
    #[serde(default)]
    pub fluid_blocks: Vec<FluidBlock>,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            timesteps: 1000,
            timestep_duration: 0.03,
            max_velocity: 100.0,
            sink_height: 0.0,
            sources: vec![],
            fluid_blocks: vec![],
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputParameters {
    pub output_dir: PathBuf,
    pub vtk_prefix: String,
    pub archive_file: String,
    pub write_vtk: bool,
    pub write_velocities: bool,
}

impl Default for OutputParameters {
    fn default() -> Self {
        Self {
            output_dir: "output".into(),
            vtk_prefix: "particles".into(),
            archive_file: "frames.bin".into(),
            write_vtk: true,
            write_velocities: true,
        }
    }
}

impl OutputParameters {
    pub fn vtk_path(&self, timestep: u32) -> PathBuf {
        self.output_dir
            .join("vtk")
            .join(format!("{}_{}.vtk", self.vtk_prefix, timestep))
    }

    pub fn archive_path(&self) -> PathBuf {
        self.output_dir.join(&self.archive_file)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LogParameters {
    #[serde(default)]
    pub verbosity: Option<usize>,
    /// When set, every rank writes its own log file under the output
    /// directory; otherwise only the coordinator logs.
    #[serde(default)]
    pub all_ranks: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Parameters {
    #[serde(default)]
    pub simulation: SimulationParameters,
    #[serde(default)]
    pub output: OutputParameters,
    #[serde(default)]
    pub logging: LogParameters,
}

impl Parameters {
    pub fn load(path: &Path) -> Result<Self, ParameterError> {
        let contents = fs::read_to_string(path).map_err(|source| ParameterError::Unreadable {
            path: path.to_owned(),
            source,
        })?;
        let parameters: Parameters =
            serde_yaml::from_str(&contents).map_err(|source| ParameterError::Invalid {
                path: path.to_owned(),
                source,
            })?;
        parameters.validate()?;
        Ok(parameters)
    }

    /// Checked before the simulation starts; a failure here means the run
    /// never begins.
    pub fn validate(&self) -> Result<(), ParameterError> {
        if R_MAX > DOMAIN_DIMENSION / 2.0 {
            return Err(ParameterError::UnsoundNeighbourhood {
                r_max: R_MAX,
                edge: DOMAIN_DIMENSION,
            });
        }
        let simulation = &self.simulation;
        if !(simulation.timestep_duration > 0.0) {
            return Err(ParameterError::NonPositiveTimestep(
                simulation.timestep_duration,
            ));
        }
        if !(simulation.max_velocity > 0.0) {
            return Err(ParameterError::NonPositiveMaxVelocity(
                simulation.max_velocity,
            ));
        }
        if !simulation.sink_height.is_finite() {
            return Err(ParameterError::InvalidSinkHeight(simulation.sink_height));
        }
        for source in &simulation.sources {
            if !source.is_finite() {
                return Err(ParameterError::InvalidSource(*source));
            }
        }
        for block in &simulation.fluid_blocks {
            if !(block.spacing > 0.0) {
                return Err(ParameterError::InvalidBlockSpacing(block.spacing));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Parameters;

    #[test]
    fn defaults_are_valid() {
        assert!(Parameters::default().validate().is_ok());
    }

    #[test]
    fn parses_a_sectioned_file() {
        let yaml = "
simulation:
  timesteps: 10
  timestep_duration: 0.05
  max_velocity: 50.0
  sink_height: -2.0
  sources:
    - { x: 0.0, y: 10.0, z: 0.0 }
  fluid_blocks:
    - origin: { x: 1.0, y: 20.0, z: 1.0 }
      counts: [3, 3, 3]
      spacing: 0.5
output:
  output_dir: out
  vtk_prefix: flow
  archive_file: frames.bin
  write_vtk: false
  write_velocities: true
";
        let parameters: Parameters = serde_yaml::from_str(yaml).unwrap();
        parameters.validate().unwrap();
        assert_eq!(parameters.simulation.timesteps, 10);
        assert_eq!(parameters.simulation.sources.len(), 1);
        let block = &parameters.simulation.fluid_blocks[0];
        assert_eq!(block.particles().len(), 27);
        assert!(!parameters.output.write_vtk);
        assert_eq!(
            parameters.output.vtk_path(3),
            std::path::Path::new("out/vtk/flow_3.vtk")
        );
    }

    #[test]
    fn rejects_a_non_positive_timestep() {
        let mut parameters = Parameters::default();
        parameters.simulation.timestep_duration = 0.0;
        assert!(parameters.validate().is_err());
    }

    #[test]
    fn rejects_a_non_finite_source() {
        let mut parameters = Parameters::default();
        parameters.simulation.sources =
            vec![crate::vector::Vector3::new(f64::NAN, 0.0, 0.0)];
        assert!(parameters.validate().is_err());
    }

    #[test]
    fn fluid_block_generates_the_grid() {
        let block = super::FluidBlock {
            origin: crate::vector::Vector3::new(1.0, 2.0, 3.0),
            counts: [2, 1, 2],
            spacing: 0.5,
        };
        let particles = block.particles();
        assert_eq!(particles.len(), 4);
        assert!(particles
            .iter()
            .any(|p| p.position == crate::vector::Vector3::new(1.5, 2.0, 3.5)));
    }
}
