use super::Count;
use super::DataByRank;
use super::SizedCommunicator;

/// Point to point exchange over the simulator subgroup for one payload type.
///
/// Every exchange phase follows the same two-round shape: a META round in
/// which each process tells every peer how many elements will follow
/// (non-blocking sends, then one blocking receive per peer), and a DATA
/// round in which all receives are posted before the first synchronous
/// payload send. Zero counts are skipped consistently on both sides, so no
/// empty messages cross the network.
pub trait WorldCommunicator<T>: SizedCommunicator {
    fn exchange_counts(&mut self, outgoing: &DataByRank<Count>) -> DataByRank<Count>;

    fn exchange_payloads(
        &mut self,
        outgoing: DataByRank<Vec<T>>,
        incoming_counts: &DataByRank<Count>,
    ) -> DataByRank<Vec<T>>;

    fn barrier(&self);
}
