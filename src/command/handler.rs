//! Simulator side dispatch of broadcast commands.

use mpi::topology::SystemCommunicator;
use mpi::traits::CommunicatorCollectives;

use super::codec;
use super::CommandCode;
use super::CuiCommand;
use crate::communication::MPI_UNIVERSE;
use crate::parameters::Parameters;
use crate::simulation::SphManager;
use crate::vector::Vector3;

pub struct CommandHandler {
    world: SystemCommunicator,
    manager: SphManager,
    parameters: Parameters,
    shutter_frame: Option<i32>,
}

fn parse_vector(value: &str) -> Option<Vector3> {
    let components: Vec<f64> = value
        .split_whitespace()
        .filter_map(|token| token.parse().ok())
        .collect();
    match components[..] {
        [x, y, z] => Some(Vector3::new(x, y, z)),
        _ => None,
    }
}

impl CommandHandler {
    pub fn new(manager: SphManager, parameters: Parameters) -> Self {
        Self {
            world: MPI_UNIVERSE.world(),
            manager,
            parameters,
            shutter_frame: None,
        }
    }

    /// Receives and executes commands until EXIT arrives.
    pub fn run(&mut self) {
        loop {
            let command = codec::receive_command(&self.world);
            log::debug!("received command: {command}");
            if !self.execute(&command) {
                return;
            }
        }
    }

    /// Executes one command; the world barrier at the end of each arm lines
    /// up with the coordinator. Returns false on EXIT.
    fn execute(&mut self, command: &CuiCommand) -> bool {
        match command.code {
            CommandCode::Exit => return false,
            CommandCode::None => {}
            CommandCode::Simulate => {
                if let Some(frame) = self.shutter_frame {
                    log::debug!("shutter move registered for frame {frame}");
                }
                if self.manager.is_main() {
                    for block in &self.parameters.simulation.fluid_blocks {
                        self.manager.add_particles(block.particles());
                    }
                }
                self.manager.simulate();
                self.world.barrier();
            }
            CommandCode::AddSource => match command.parameter(0).and_then(parse_vector) {
                Some(source) if source.is_finite() => {
                    log::info!("new source: {source}");
                    self.manager.add_source(source);
                    self.world.barrier();
                }
                _ => {
                    log::error!("addSource: invalid position {:?}", command.parameter(0));
                    self.world.barrier();
                }
            },
            CommandCode::AddSink => match command.parameter(0).and_then(|v| v.parse().ok()) {
                Some(height) => {
                    log::info!("new sink height: {height}");
                    self.manager.set_sink(height);
                    self.world.barrier();
                }
                None => {
                    log::error!("addSink: invalid height {:?}", command.parameter(0));
                    self.world.barrier();
                }
            },
            CommandCode::MoveShutter => {
                match command.parameter(0).and_then(|v| v.parse().ok()) {
                    Some(frame) => {
                        log::info!("shutter opening at frame {frame}");
                        self.shutter_frame = Some(frame);
                    }
                    None => log::error!("moveShutter: invalid frame {:?}", command.parameter(0)),
                }
                self.world.barrier();
            }
            CommandCode::LoadMesh
            | CommandCode::LoadShutter
            | CommandCode::GenerateParticles
            | CommandCode::Render => {
                log::warn!(
                    "command '{}' needs the mesh and render pipeline, which is not part of this build",
                    command.name
                );
                self.world.barrier();
            }
        }
        true
    }
}
