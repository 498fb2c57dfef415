use super::DataByRank;
use super::Rank;

pub trait SizedCommunicator {
    fn size(&self) -> usize;
    fn rank(&self) -> Rank;

    fn other_ranks(&self) -> Vec<Rank> {
        (0..self.size() as Rank)
            .filter(|rank| *rank != self.rank())
            .collect()
    }

    fn initialize_data_by_rank<T: Default>(&self) -> DataByRank<T> {
        DataByRank::from_size_and_rank(self.size(), self.rank())
    }
}
