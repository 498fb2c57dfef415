//! The coordinator process: console input, command broadcast and the
//! per-frame export receive loop.

use std::io::BufRead;
use std::sync::mpsc;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Instant;

use mpi::topology::SystemCommunicator;
use mpi::traits::Communicator;
use mpi::traits::CommunicatorCollectives;
use mpi::traits::MatchedReceiveVec;
use mpi::traits::Source;

use crate::command::parser;
use crate::command::parser::ParsedLine;
use crate::command::codec;
use crate::command::CommandCode;
use crate::command::CuiCommand;
use crate::communication::tags;
use crate::communication::Count;
use crate::communication::Rank;
use crate::communication::MPI_UNIVERSE;
use crate::io::FrameArchive;
use crate::io::SimulationOutput;
use crate::parameters::Parameters;
use crate::particle::Particle;

pub struct Coordinator {
    world: SystemCommunicator,
    parameters: Parameters,
    output: Box<dyn SimulationOutput>,
}

/// Reads console lines and feeds parsed commands into the mailbox. Runs on
/// its own thread, decoupled from the communication loop.
fn console_loop(sender: Sender<CuiCommand>) {
    println!("Please enter a command or enter 'help' to show a list of all commands");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        match parser::parse_line(&line) {
            ParsedLine::Command(command) => {
                let is_exit = command.code == CommandCode::Exit;
                if sender.send(command).is_err() || is_exit {
                    return;
                }
            }
            ParsedLine::Help => println!("{}", parser::HELP),
            ParsedLine::Empty => {}
            ParsedLine::Unknown(command) => {
                println!("Unknown command '{command}', enter 'help' for a list")
            }
            ParsedLine::Error(message) => println!("{message}"),
        }
    }
    // Console closed; shut the cluster down.
    sender.send(CuiCommand::exit()).ok();
}

impl Coordinator {
    pub fn new(parameters: Parameters, output: Box<dyn SimulationOutput>) -> Self {
        Self {
            world: MPI_UNIVERSE.world(),
            parameters,
            output,
        }
    }

    pub fn run(&mut self) {
        let (sender, mailbox) = mpsc::channel();
        let console = thread::spawn(move || console_loop(sender));
        loop {
            let command = mailbox.recv().unwrap_or_else(|_| CuiCommand::exit());
            log::debug!("broadcasting command: {command}");
            codec::send_command(&self.world, &command);
            if !self.execute(&command) {
                break;
            }
            println!("Please enter a command or enter 'help' to show a list of all commands");
        }
        console.join().ok();
    }

    /// Coordinator side of one command; barrier placement mirrors the
    /// simulator side. Returns false on EXIT.
    fn execute(&mut self, command: &CuiCommand) -> bool {
        match command.code {
            CommandCode::Exit => return false,
            CommandCode::None => {}
            CommandCode::Simulate => {
                self.receive_frames();
                self.world.barrier();
                println!("Simulation finished.");
            }
            CommandCode::AddSource => {
                self.world.barrier();
                println!("Added source.");
            }
            CommandCode::AddSink => {
                self.world.barrier();
                println!("Added sink.");
            }
            CommandCode::MoveShutter => {
                self.world.barrier();
                println!("Shutter move set.");
            }
            CommandCode::LoadMesh
            | CommandCode::LoadShutter
            | CommandCode::GenerateParticles
            | CommandCode::Render => {
                self.world.barrier();
                println!(
                    "Command '{}' needs the mesh and render pipeline, which is not part of this build.",
                    command.name
                );
            }
        }
        true
    }

    /// Consumes one (count, payload) pair per simulator per timestep, in
    /// rank order, writes the frame outputs and persists the archive at the
    /// end of the run.
    fn receive_frames(&mut self) {
        let number_of_simulators = self.world.size() as usize - 1;
        let timesteps = self.parameters.simulation.timesteps;
        let mut archive = FrameArchive::new();
        for frame in 1..=timesteps {
            let start = Instant::now();
            self.world.barrier();
            let mut counts = vec![0 as Count; number_of_simulators];
            for simulator in 0..number_of_simulators {
                let process = self.world.process_at_rank(simulator as Rank + 1);
                let (count, _) = process.receive_with_tag::<Count>(tags::EXPORT_PARTICLES_NUMBER);
                counts[simulator] = count;
            }
            let mut particles_of_frame = Vec::new();
            for simulator in 0..number_of_simulators {
                if counts[simulator] == 0 {
                    continue;
                }
                let process = self.world.process_at_rank(simulator as Rank + 1);
                let message = process.matched_probe_with_tag(tags::EXPORT);
                let (particles, _) = message.matched_receive_vec::<Particle>();
                assert_eq!(
                    particles.len(),
                    counts[simulator] as usize,
                    "export size mismatch in frame {} from simulator {}: announced {}, received {}",
                    frame,
                    simulator,
                    counts[simulator],
                    particles.len(),
                );
                particles_of_frame.extend(particles);
            }
            if let Err(error) = self.output.export_frame(frame, &particles_of_frame) {
                log::error!("failed to export frame {frame}: {error:#}");
            }
            archive.insert(frame, particles_of_frame);
            log::debug!("received frame {frame} in {:?}", start.elapsed());
        }
        let archive_path = self.parameters.output.archive_path();
        if let Err(error) = self.output.persist_archive(&archive_path, &archive) {
            log::error!("failed to persist the frame archive: {error:#}");
        }
        log::info!("done exporting {} frames", archive.len());
    }
}
