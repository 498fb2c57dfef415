mod data_by_rank;
mod sized_communicator;
pub mod tags;
mod world_communicator;

pub use data_by_rank::DataByRank;
pub use sized_communicator::SizedCommunicator;
pub use world_communicator::WorldCommunicator;

#[cfg(feature = "local")]
mod local;

#[cfg(feature = "local")]
pub use local::build_local_comms;
#[cfg(feature = "local")]
pub use local::LocalWorld;

#[cfg(not(feature = "local"))]
mod mpi_world;

#[cfg(not(feature = "local"))]
pub use mpi_world::simulator_subgroup;
#[cfg(not(feature = "local"))]
pub use mpi_world::MpiWorld;
#[cfg(not(feature = "local"))]
pub use mpi_world::MPI_UNIVERSE;

pub type Rank = mpi::Rank;
pub type Count = mpi::Count;
pub type Tag = mpi::Tag;

/// World rank of the coordinator process.
pub const COORDINATOR_RANK: Rank = 0;

/// The per-payload communication channel type, switched between the MPI
/// backend and the thread backed test backend.
#[cfg(not(feature = "local"))]
pub type SimChannel<T> = mpi_world::MpiWorld<T>;
#[cfg(feature = "local")]
pub type SimChannel<T> = local::LocalWorld<T>;

use crate::particle::Particle;

/// The channels a simulator process uses for the per-step exchanges over the
/// simulator subgroup: particle migration (META_EXCHANGE + EXCHANGE), rim
/// meta data (META_META_RIM + META_RIM) and rim payloads (RIM). Constructed
/// once at startup and threaded through every exchange routine.
pub struct SimulatorComms {
    pub particles: SimChannel<Particle>,
    pub rim_meta: SimChannel<Count>,
    pub rim_data: SimChannel<Particle>,
}

impl SimulatorComms {
    pub fn rank(&self) -> Rank {
        self.particles.rank()
    }

    pub fn size(&self) -> usize {
        self.particles.size()
    }

    /// Barrier over the simulator subgroup.
    pub fn barrier(&self) {
        self.particles.barrier();
    }
}
