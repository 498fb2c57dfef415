//! The per-timestep export of fluid particles towards the coordinator.

use std::sync::Arc;
use std::sync::Mutex;

use crate::particle::Particle;

/// Where a simulator pushes its fluid particles after every timestep. The
/// MPI implementation crosses a world barrier and sends to the coordinator;
/// tests collect frames in memory instead.
pub trait FrameSink {
    fn export_frame(&mut self, particles: Vec<Particle>);
}

#[cfg(not(feature = "local"))]
pub use mpi_sink::MpiFrameSink;

#[cfg(not(feature = "local"))]
mod mpi_sink {
    use mpi::topology::SystemCommunicator;
    use mpi::traits::Communicator;
    use mpi::traits::CommunicatorCollectives;
    use mpi::traits::Destination;

    use super::FrameSink;
    use crate::communication::tags;
    use crate::communication::Count;
    use crate::communication::COORDINATOR_RANK;
    use crate::communication::MPI_UNIVERSE;
    use crate::particle::Particle;

    /// Sends each frame to the coordinator: first the particle count, then,
    /// when non-zero, the payload. The preceding world barrier lines the
    /// sends up with the coordinator's per-frame receive loop.
    pub struct MpiFrameSink {
        world: SystemCommunicator,
    }

    impl MpiFrameSink {
        pub fn new() -> Self {
            Self {
                world: MPI_UNIVERSE.world(),
            }
        }
    }

    impl Default for MpiFrameSink {
        fn default() -> Self {
            Self::new()
        }
    }

    impl FrameSink for MpiFrameSink {
        fn export_frame(&mut self, particles: Vec<Particle>) {
            self.world.barrier();
            let count = particles.len() as Count;
            let coordinator = self.world.process_at_rank(COORDINATOR_RANK);
            coordinator.send_with_tag(&count, tags::EXPORT_PARTICLES_NUMBER);
            if count > 0 {
                coordinator.send_with_tag(&particles[..], tags::EXPORT);
            }
        }
    }
}

/// Collects frames in memory. The handle returned by `new` stays readable
/// after the sink has been moved into the manager.
pub struct CollectingSink {
    frames: Arc<Mutex<Vec<Vec<Particle>>>>,
}

impl CollectingSink {
    pub fn new() -> (Self, Arc<Mutex<Vec<Vec<Particle>>>>) {
        let frames = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                frames: frames.clone(),
            },
            frames,
        )
    }
}

impl FrameSink for CollectingSink {
    fn export_frame(&mut self, particles: Vec<Particle>) {
        self.frames.lock().unwrap().push(particles);
    }
}
