//! Log setup: the coordinator logs to the terminal; other ranks write
//! per-rank files under the output directory when enabled.

use std::fs;
use std::fs::File;

use log::LevelFilter;
use simplelog::ColorChoice;
use simplelog::ConfigBuilder;
use simplelog::LevelPadding;
use simplelog::TermLogger;
use simplelog::TerminalMode;
use simplelog::WriteLogger;

use crate::communication::Rank;
use crate::communication::COORDINATOR_RANK;
use crate::parameters::Parameters;

fn level_filter(verbosity: usize) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

pub fn setup(rank: Rank, cli_verbosity: usize, parameters: &Parameters) {
    let verbosity = parameters
        .logging
        .verbosity
        .map(|verbosity| verbosity.max(cli_verbosity))
        .unwrap_or(cli_verbosity);
    let level = level_filter(verbosity);
    let config = ConfigBuilder::default()
        .set_level_padding(LevelPadding::Right)
        .set_thread_level(LevelFilter::Off)
        .build();
    if rank == COORDINATOR_RANK {
        TermLogger::init(level, config, TerminalMode::Mixed, ColorChoice::Auto)
            .expect("logger initialized twice");
    } else if parameters.logging.all_ranks {
        let directory = parameters.output.output_dir.join("logs");
        fs::create_dir_all(&directory)
            .unwrap_or_else(|_| panic!("failed to create log directory at {directory:?}"));
        let path = directory.join(format!("rank_{rank}.log"));
        let file = File::create(&path)
            .unwrap_or_else(|_| panic!("failed to create log file at {path:?}"));
        WriteLogger::init(level, config, file).expect("logger initialized twice");
    }
}
