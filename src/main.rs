use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Distributed SPH simulation of a waterfall", long_about = None)]
struct Options {
    /// Path to the YAML parameter file; defaults apply without one.
    #[clap(long)]
    params: Option<PathBuf>,
    #[clap(short, parse(from_occurrences))]
    verbosity: usize,
}

#[cfg(not(feature = "local"))]
fn main() -> anyhow::Result<()> {
    use mpi::traits::Communicator;
    use waterfall::command::handler::CommandHandler;
    use waterfall::communication::simulator_subgroup;
    use waterfall::communication::SimulatorComms;
    use waterfall::communication::COORDINATOR_RANK;
    use waterfall::communication::MPI_UNIVERSE;
    use waterfall::coordinator::Coordinator;
    use waterfall::io::DiskOutput;
    use waterfall::logging;
    use waterfall::parameters::Parameters;
    use waterfall::simulation::MpiFrameSink;
    use waterfall::simulation::SphManager;

    let options = Options::parse();
    // Configuration problems surface before any rank starts simulating.
    let parameters = match &options.params {
        Some(path) => Parameters::load(path)?,
        None => {
            let parameters = Parameters::default();
            parameters.validate()?;
            parameters
        }
    };

    let world = MPI_UNIVERSE.world();
    let rank = world.rank();
    assert!(
        world.size() >= 2,
        "the simulation needs at least one coordinator and one simulator rank"
    );
    logging::setup(rank, options.verbosity, &parameters);

    let subgroup = simulator_subgroup();
    if rank == COORDINATOR_RANK {
        let output = Box::new(DiskOutput::new(parameters.output.clone()));
        Coordinator::new(parameters, output).run();
    } else {
        let comms = SimulatorComms::from_subgroup(
            subgroup.expect("simulator ranks must join the subgroup"),
        );
        let manager = SphManager::new(
            &parameters.simulation,
            comms,
            Box::new(MpiFrameSink::new()),
        );
        CommandHandler::new(manager, parameters).run();
    }

    MPI_UNIVERSE.drop();
    Ok(())
}

#[cfg(feature = "local")]
fn main() {
    let _ = Options::parse();
    eprintln!("built with the `local` test feature; the MPI binary is disabled");
}
