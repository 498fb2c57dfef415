//! Thread backed drop-in for the MPI channels, so that the full exchange
//! protocol runs as ordinary multi-threaded tests without an MPI runtime.

use std::sync::mpsc::channel;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::sync::Barrier;

use super::Count;
use super::DataByRank;
use super::Rank;
use super::SimulatorComms;
use super::SizedCommunicator;
use super::WorldCommunicator;
use crate::particle::Particle;

pub struct LocalWorld<T> {
    rank: Rank,
    size: usize,
    meta_senders: DataByRank<Sender<Count>>,
    meta_receivers: DataByRank<Receiver<Count>>,
    data_senders: DataByRank<Sender<Vec<T>>>,
    data_receivers: DataByRank<Receiver<Vec<T>>>,
    barrier: Arc<Barrier>,
}

impl<T> SizedCommunicator for LocalWorld<T> {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }
}

impl<T: Send> WorldCommunicator<T> for LocalWorld<T> {
    fn exchange_counts(&mut self, outgoing: &DataByRank<Count>) -> DataByRank<Count> {
        for rank in self.other_ranks() {
            self.meta_senders[rank].send(outgoing[rank]).unwrap();
        }
        let mut incoming = self.initialize_data_by_rank::<Count>();
        for rank in self.other_ranks() {
            incoming.insert(rank, self.meta_receivers[rank].recv().unwrap());
        }
        incoming
    }

    fn exchange_payloads(
        &mut self,
        outgoing: DataByRank<Vec<T>>,
        incoming_counts: &DataByRank<Count>,
    ) -> DataByRank<Vec<T>> {
        for (rank, data) in outgoing.into_iter() {
            if !data.is_empty() {
                self.data_senders[rank].send(data).unwrap();
            }
        }
        let mut incoming = self.initialize_data_by_rank::<Vec<T>>();
        for (rank, count) in incoming_counts.iter() {
            if *count > 0 {
                let data = self.data_receivers[*rank].recv().unwrap();
                assert_eq!(
                    data.len(),
                    *count as usize,
                    "payload size mismatch from rank {rank}"
                );
                incoming.insert(*rank, data);
            }
        }
        incoming
    }

    fn barrier(&self) {
        self.barrier.wait();
    }
}

fn build_local_worlds<T>(size: usize, barrier: Arc<Barrier>) -> Vec<LocalWorld<T>> {
    let mut meta_senders: Vec<_> = (0..size).map(|_| DataByRank::empty()).collect();
    let mut meta_receivers: Vec<_> = (0..size).map(|_| DataByRank::empty()).collect();
    let mut data_senders: Vec<_> = (0..size).map(|_| DataByRank::empty()).collect();
    let mut data_receivers: Vec<_> = (0..size).map(|_| DataByRank::empty()).collect();
    for sender in 0..size {
        for receiver in 0..size {
            if sender == receiver {
                continue;
            }
            let (tx, rx) = channel();
            meta_senders[sender].insert(receiver as Rank, tx);
            meta_receivers[receiver].insert(sender as Rank, rx);
            let (tx, rx) = channel();
            data_senders[sender].insert(receiver as Rank, tx);
            data_receivers[receiver].insert(sender as Rank, rx);
        }
    }
    let mut worlds = Vec::new();
    for rank in (0..size).rev() {
        worlds.push(LocalWorld {
            rank: rank as Rank,
            size,
            meta_senders: meta_senders.pop().unwrap(),
            meta_receivers: meta_receivers.pop().unwrap(),
            data_senders: data_senders.pop().unwrap(),
            data_receivers: data_receivers.pop().unwrap(),
            barrier: barrier.clone(),
        });
    }
    worlds.reverse();
    worlds
}

/// One bundle of simulator channels per simulated rank, all sharing one
/// barrier.
pub fn build_local_comms(size: usize) -> Vec<SimulatorComms> {
    let barrier = Arc::new(Barrier::new(size));
    let particles = build_local_worlds::<Particle>(size, barrier.clone());
    let rim_meta = build_local_worlds::<Count>(size, barrier.clone());
    let rim_data = build_local_worlds::<Particle>(size, barrier);
    particles
        .into_iter()
        .zip(rim_meta)
        .zip(rim_data)
        .map(|((particles, rim_meta), rim_data)| SimulatorComms {
            particles,
            rim_meta,
            rim_data,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::build_local_worlds;
    use std::sync::Arc;
    use std::sync::Barrier;

    use crate::communication::DataByRank;
    use crate::communication::SizedCommunicator;
    use crate::communication::WorldCommunicator;

    #[test]
    fn counts_and_payloads_cross_between_threads() {
        let size = 3;
        let barrier = Arc::new(Barrier::new(size));
        let worlds = build_local_worlds::<i32>(size, barrier);
        let threads: Vec<_> = worlds
            .into_iter()
            .map(|mut world| {
                thread::spawn(move || {
                    let rank = world.rank();
                    let mut outgoing: DataByRank<Vec<i32>> = world.initialize_data_by_rank();
                    for peer in world.other_ranks() {
                        outgoing.insert(peer, vec![rank; (peer + 1) as usize]);
                    }
                    let mut counts: DataByRank<i32> = world.initialize_data_by_rank();
                    for peer in world.other_ranks() {
                        counts.insert(peer, (peer + 1) as i32);
                    }
                    let incoming_counts = world.exchange_counts(&counts);
                    for peer in world.other_ranks() {
                        assert_eq!(incoming_counts[peer], (rank + 1) as i32);
                    }
                    let incoming = world.exchange_payloads(outgoing, &incoming_counts);
                    for peer in world.other_ranks() {
                        assert_eq!(incoming[peer], vec![peer; (rank + 1) as usize]);
                    }
                    world.barrier();
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
    }
}
