//! Distributed smoothed particle hydrodynamics simulation of a waterfall.
//!
//! The simulation volume is cut into a uniform grid of cubic cells, each
//! owned by exactly one simulator process. Processes communicate exclusively
//! via MPI messages: rim (halo) copies of boundary particles are exchanged
//! before every integration step, particles that leave their cell are
//! migrated to the new owner afterwards, and every timestep ends with an
//! export of all fluid particles to the coordinator process, which writes
//! VTK frames and the binary frame archive.
//!
//! Rank 0 of the world communicator is the coordinator: it parses console
//! commands, broadcasts them to the simulator processes and consumes the
//! per-timestep particle exports. All other ranks form the simulator
//! subgroup on which the actual physics runs.

pub mod command;
pub mod communication;
pub mod constants;
pub mod domain;
pub mod grid;
pub mod io;
pub mod kernel;
pub mod logging;
pub mod neighbour_search;
pub mod parameters;
pub mod particle;
pub mod simulation;
pub mod vector;

#[cfg(not(feature = "local"))]
pub mod coordinator;
