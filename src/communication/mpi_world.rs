use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::Mutex;

use derive_more::Deref;
use derive_more::DerefMut;
use lazy_static::lazy_static;
use mpi::environment::Universe;
use mpi::request::scope;
use mpi::request::WaitGuard;
use mpi::topology::Color;
use mpi::topology::SystemCommunicator;
use mpi::topology::UserCommunicator;
use mpi::traits::Communicator;
use mpi::traits::CommunicatorCollectives;
use mpi::traits::Destination;
use mpi::traits::Equivalence;
use mpi::traits::Source;
use mpi::Threading;

use super::tags;
use super::Count;
use super::DataByRank;
use super::Rank;
use super::SimulatorComms;
use super::SizedCommunicator;
use super::Tag;
use super::WorldCommunicator;
use super::COORDINATOR_RANK;
use crate::particle::Particle;

/// A wrapper around the universe which contains it in an Option, so that
/// `drop` can be called at program completion to run MPI_FINALIZE. Anything
/// inside a lazy_static is never dropped otherwise.
#[derive(Deref, DerefMut)]
pub struct StaticUniverse(Arc<Mutex<Option<Universe>>>);

impl StaticUniverse {
    pub fn world(&self) -> SystemCommunicator {
        self.0.lock().unwrap().as_ref().unwrap().world()
    }

    pub fn drop(&self) {
        let _ = self.0.lock().unwrap().take();
    }
}

lazy_static! {
    pub static ref MPI_UNIVERSE: StaticUniverse = {
        let threading = Threading::Multiple;
        let (universe, threading_initialized) =
            mpi::initialize_with_threading(threading).unwrap();
        assert_eq!(
            threading, threading_initialized,
            "Could not initialize MPI with multithreading"
        );
        StaticUniverse(Arc::new(Mutex::new(Some(universe))))
    };
}

/// Splits the world into the simulator subgroup. The coordinator (world rank
/// 0) stays outside and receives `None`.
pub fn simulator_subgroup() -> Option<UserCommunicator> {
    let world = MPI_UNIVERSE.world();
    let color = if world.rank() == COORDINATOR_RANK {
        Color::undefined()
    } else {
        Color::with_value(0)
    };
    world.split_by_color(color)
}

/// One communication channel of the simulator subgroup, carrying payloads of
/// type `T` under a fixed pair of (meta, data) tags.
pub struct MpiWorld<T> {
    comm: Rc<UserCommunicator>,
    meta_tag: Tag,
    data_tag: Tag,
    _marker: PhantomData<T>,
}

impl<T> MpiWorld<T> {
    pub fn new(comm: Rc<UserCommunicator>, meta_tag: Tag, data_tag: Tag) -> Self {
        Self {
            comm,
            meta_tag,
            data_tag,
            _marker: PhantomData,
        }
    }
}

impl<T> SizedCommunicator for MpiWorld<T> {
    fn rank(&self) -> Rank {
        self.comm.rank()
    }

    fn size(&self) -> usize {
        self.comm.size() as usize
    }
}

impl<T> WorldCommunicator<T> for MpiWorld<T>
where
    T: Equivalence + Default + Clone,
{
    fn exchange_counts(&mut self, outgoing: &DataByRank<Count>) -> DataByRank<Count> {
        let mut incoming = self.initialize_data_by_rank::<Count>();
        let peers = self.other_ranks();
        scope(|scope| {
            let mut guards = vec![];
            for rank in &peers {
                let process = self.comm.process_at_rank(*rank);
                guards.push(WaitGuard::from(process.immediate_send_with_tag(
                    scope,
                    &outgoing[*rank],
                    self.meta_tag,
                )));
            }
            for rank in &peers {
                let (count, _) = self
                    .comm
                    .process_at_rank(*rank)
                    .receive_with_tag::<Count>(self.meta_tag);
                incoming.insert(*rank, count);
            }
        });
        incoming
    }

    fn exchange_payloads(
        &mut self,
        outgoing: DataByRank<Vec<T>>,
        incoming_counts: &DataByRank<Count>,
    ) -> DataByRank<Vec<T>> {
        let mut buffers: Vec<(Rank, Vec<T>)> = incoming_counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(rank, count)| (*rank, vec![T::default(); *count as usize]))
            .collect();
        scope(|scope| {
            // All receives are posted before the first synchronous send; the
            // peers do the same, so every send finds its receive.
            let mut guards = vec![];
            for (rank, buffer) in buffers.iter_mut() {
                let process = self.comm.process_at_rank(*rank);
                guards.push(WaitGuard::from(process.immediate_receive_into_with_tag(
                    scope,
                    buffer,
                    self.data_tag,
                )));
            }
            for (rank, data) in outgoing.iter() {
                if !data.is_empty() {
                    self.comm
                        .process_at_rank(*rank)
                        .synchronous_send_with_tag(&data[..], self.data_tag);
                }
            }
        });
        let mut incoming = self.initialize_data_by_rank::<Vec<T>>();
        for (rank, buffer) in buffers {
            incoming.insert(rank, buffer);
        }
        incoming
    }

    fn barrier(&self) {
        self.comm.barrier();
    }
}

impl SimulatorComms {
    /// Builds the three per-step channels on top of the simulator subgroup.
    pub fn from_subgroup(subgroup: UserCommunicator) -> Self {
        let comm = Rc::new(subgroup);
        Self {
            particles: MpiWorld::<Particle>::new(
                comm.clone(),
                tags::META_EXCHANGE,
                tags::EXCHANGE,
            ),
            rim_meta: MpiWorld::<Count>::new(comm.clone(), tags::META_META_RIM, tags::META_RIM),
            rim_data: MpiWorld::<Particle>::new(comm, tags::META_META_RIM, tags::RIM),
        }
    }
}
