//! The distributed SPH time integrator and its per-timestep exchange
//! protocol.

mod export;
mod physics;

#[cfg(all(test, feature = "local"))]
mod tests;

use std::collections::HashMap;
use std::time::Instant;

use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

pub use self::export::CollectingSink;
pub use self::export::FrameSink;
#[cfg(not(feature = "local"))]
pub use self::export::MpiFrameSink;
pub use self::physics::IntegrationParameters;
pub use self::physics::GRAVITY;

use crate::communication::Count;
use crate::communication::DataByRank;
use crate::communication::Rank;
use crate::communication::SimulatorComms;
use crate::communication::SizedCommunicator;
use crate::communication::WorldCommunicator;
use crate::constants::SOURCE_SIZE;
use crate::domain::ParticleDomain;
use crate::grid::CellId;
use crate::kernel::CubicSplineKernel;
use crate::neighbour_search::GridNeighbourSearch;
use crate::neighbour_search::NeighbourSearch;
use crate::parameters::SimulationParameters;
use crate::particle::Particle;
use crate::particle::ParticleKind;
use crate::vector::Vector3;

/// The neighbour lists of one fluid particle, copied at search time. The
/// copies keep the densities of the previous step; only the integrated
/// particle's own density is updated in between.
struct NeighbourLists {
    fluid: Vec<Particle>,
    statics: Vec<Particle>,
}

pub struct SphManager {
    sim_rank: Rank,
    sim_size: usize,
    number_of_timesteps: u32,
    timestep_duration: f64,
    max_velocity: f64,
    sink_height: f64,
    gravity: Vector3,
    sources: Vec<Vector3>,
    domains: HashMap<CellId, ParticleDomain>,
    /// Particles owned by other processes, staged until the next exchange.
    staged: DataByRank<Vec<Particle>>,
    /// Per domain, aligned with the domain's fluid particle storage order.
    neighbours: HashMap<CellId, Vec<NeighbourLists>>,
    kernel: CubicSplineKernel,
    search: GridNeighbourSearch,
    comms: SimulatorComms,
    exporter: Box<dyn FrameSink>,
    rng: StdRng,
    spawned_particles: usize,
    sunk_particles: usize,
}

impl SphManager {
    pub fn new(
        parameters: &SimulationParameters,
        comms: SimulatorComms,
        exporter: Box<dyn FrameSink>,
    ) -> Self {
        let staged = comms.particles.initialize_data_by_rank();
        Self {
            sim_rank: comms.rank(),
            sim_size: comms.size(),
            number_of_timesteps: parameters.timesteps,
            timestep_duration: parameters.timestep_duration,
            max_velocity: parameters.max_velocity,
            sink_height: parameters.sink_height,
            gravity: GRAVITY,
            sources: parameters.sources.clone(),
            domains: HashMap::new(),
            staged,
            neighbours: HashMap::new(),
            kernel: CubicSplineKernel,
            search: GridNeighbourSearch,
            comms,
            exporter,
            rng: StdRng::from_entropy(),
            spawned_particles: 0,
            sunk_particles: 0,
        }
    }

    pub fn set_sink(&mut self, sink_height: f64) {
        self.sink_height = sink_height;
    }

    pub fn add_source(&mut self, source: Vector3) {
        self.sources.push(source);
    }

    /// True on the first simulator rank, which seeds initial particles and
    /// spawns sources.
    pub fn is_main(&self) -> bool {
        self.sim_rank == 0
    }

    /// Runs the configured number of timesteps. Expects initial particles to
    /// have been staged through `add_particles` beforehand.
    pub fn simulate(&mut self) {
        if self.is_main() {
            log::info!("preparing simulation");
        }
        self.exchange_particles();
        self.exchange_rim(ParticleKind::Static);
        self.comms.barrier();
        if self.is_main() {
            log::info!("starting simulation ({} timesteps)", self.number_of_timesteps);
        }
        for timestep in 1..=self.number_of_timesteps {
            let step_start = Instant::now();
            self.comms.barrier();
            let phase_start = Instant::now();
            self.exchange_rim(ParticleKind::Fluid);
            self.comms.barrier();
            let rim_time = phase_start.elapsed();

            let phase_start = Instant::now();
            self.update();
            self.comms.barrier();
            let update_time = phase_start.elapsed();

            let phase_start = Instant::now();
            self.spawn_source_particles();
            self.comms.barrier();
            let spawn_time = phase_start.elapsed();

            let phase_start = Instant::now();
            self.exchange_particles();
            self.comms.barrier();
            let exchange_time = phase_start.elapsed();

            let phase_start = Instant::now();
            self.export_particles();
            self.comms.barrier();
            let export_time = phase_start.elapsed();

            if self.is_main() {
                log::debug!(
                    "rim {:?}, update {:?}, spawn {:?}, exchange {:?}, export {:?}",
                    rim_time,
                    update_time,
                    spawn_time,
                    exchange_time,
                    export_time
                );
                log::info!(
                    "finished timestep {} of {} in {} ms",
                    timestep,
                    self.number_of_timesteps,
                    step_start.elapsed().as_millis()
                );
            }
        }
        self.clean_up_fluid_particles();
    }

    /// Neighbour search, density update, velocity and position integration,
    /// sink removal.
    fn update(&mut self) {
        self.comms.barrier();
        let start = Instant::now();
        self.neighbours = self.search_neighbours();
        if self.is_main() {
            log::debug!("neighbour search took {:?}", start.elapsed());
        }

        let start = Instant::now();
        for (id, domain) in self.domains.iter_mut() {
            let lists = match self.neighbours.get(id) {
                Some(lists) => lists,
                None => continue,
            };
            let indices = domain.fluid_indices();
            let particles = domain.particles_mut();
            for (list, index) in lists.iter().zip(indices) {
                particles[index].local_density = physics::local_density(
                    &particles[index],
                    &list.fluid,
                    &list.statics,
                    &self.kernel,
                );
            }
        }
        if self.is_main() {
            log::debug!("density calculation took {:?}", start.elapsed());
        }

        let start = Instant::now();
        let parameters = IntegrationParameters::new(
            self.timestep_duration,
            self.max_velocity,
            self.sink_height,
            self.gravity,
        );
        for (id, domain) in self.domains.iter_mut() {
            let lists = match self.neighbours.get(id) {
                Some(lists) => lists,
                None => continue,
            };
            let indices = domain.fluid_indices();
            let mut below_sink = Vec::new();
            let particles = domain.particles_mut();
            for (list, index) in lists.iter().zip(indices) {
                let removed = physics::integrate(
                    &mut particles[index],
                    &list.fluid,
                    &list.statics,
                    &self.kernel,
                    &parameters,
                );
                if removed {
                    below_sink.push(index);
                }
            }
            if !below_sink.is_empty() {
                domain.remove_indices(&below_sink);
                self.sunk_particles += below_sink.len();
            }
        }
        if self.is_main() {
            log::debug!("velocity and position update took {:?}", start.elapsed());
        }
    }

    /// Builds, per fluid-carrying domain, one neighbour list pair per fluid
    /// particle: the domain's own particles plus the halo copies from every
    /// candidate cell, filtered down to the influence radius.
    fn search_neighbours(&self) -> HashMap<CellId, Vec<NeighbourLists>> {
        let mut neighbours = HashMap::new();
        for (id, domain) in &self.domains {
            if !domain.has_fluid() {
                continue;
            }
            let own_fluid = domain.particles_of_kind(ParticleKind::Fluid);
            let own_statics = domain.particles_of_kind(ParticleKind::Static);
            let mut lists = Vec::with_capacity(own_fluid.len());
            for particle in &own_fluid {
                let mut fluid_candidates = own_fluid.clone();
                let mut static_candidates = own_statics.clone();
                for cell in self.search.cell_candidates(particle.position) {
                    if let Some(rim) = domain.rim().get(&cell) {
                        fluid_candidates.extend(rim.iter().filter(|p| p.is_fluid()));
                        static_candidates
                            .extend(rim.iter().filter(|p| p.kind == ParticleKind::Static));
                    }
                }
                lists.push(NeighbourLists {
                    fluid: self.search.neighbours_of(particle.position, &fluid_candidates),
                    statics: self
                        .search
                        .neighbours_of(particle.position, &static_candidates),
                });
            }
            neighbours.insert(*id, lists);
        }
        neighbours
    }

    /// Routes particles to the process owning their cell: local particles go
    /// straight into their domain, foreign ones are staged for the next
    /// exchange.
    pub fn add_particles(&mut self, particles: impl IntoIterator<Item = Particle>) {
        for particle in particles {
            let cell = CellId::containing(particle.position);
            let owner = cell.owner(self.sim_size);
            if owner == self.sim_rank {
                self.domain_mut(cell).add(particle);
            } else {
                self.staged[owner].push(particle);
            }
        }
    }

    /// Like `add_particles`, but receiving a foreign-owned particle here is
    /// a routing bug: it is re-staged so it keeps moving towards its owner.
    fn add_arrivals(&mut self, from: Rank, particles: Vec<Particle>) {
        for particle in particles {
            let cell = CellId::containing(particle.position);
            let owner = cell.owner(self.sim_size);
            if owner == self.sim_rank {
                self.domain_mut(cell).add(particle);
            } else {
                log::warn!(
                    "rank {} received a particle owned by rank {} from rank {}, re-staging",
                    self.sim_rank,
                    owner,
                    from
                );
                self.staged[owner].push(particle);
            }
        }
    }

    fn domain_mut(&mut self, cell: CellId) -> &mut ParticleDomain {
        self.domains
            .entry(cell)
            .or_insert_with(|| ParticleDomain::new(cell))
    }

    /// Migrates every particle that left its owning cell. META round first
    /// (one count per peer), then payloads into receives that were posted
    /// before any send, then a subgroup barrier.
    pub fn exchange_particles(&mut self) {
        let mut target_map =
            std::mem::replace(&mut self.staged, self.comms.particles.initialize_data_by_rank());
        let mut local_arrivals = Vec::new();

        let fluid_cells: Vec<CellId> = self
            .domains
            .iter()
            .filter(|(_, domain)| domain.has_fluid())
            .map(|(id, _)| *id)
            .collect();
        for cell in fluid_cells {
            let (leavers, sunk) = self
                .domains
                .get_mut(&cell)
                .unwrap()
                .remove_outside(self.sink_height);
            self.sunk_particles += sunk;
            for particle in leavers {
                let owner = CellId::containing(particle.position).owner(self.sim_size);
                if owner == self.sim_rank {
                    local_arrivals.push(particle);
                } else {
                    target_map[owner].push(particle);
                }
            }
        }

        let mut counts: DataByRank<Count> = self.comms.particles.initialize_data_by_rank();
        for (rank, particles) in target_map.iter() {
            counts.insert(*rank, particles.len() as Count);
        }
        let incoming_counts = self.comms.particles.exchange_counts(&counts);
        let incoming = self
            .comms
            .particles
            .exchange_payloads(target_map, &incoming_counts);
        self.comms.particles.barrier();

        self.add_particles(local_arrivals);
        for (rank, particles) in incoming {
            self.add_arrivals(rank, particles);
        }
    }

    /// Repopulates the halo caches for one particle kind. Three message
    /// phases per peer: the number of (target, source) pairs, the flat
    /// (target, source, count) triples, and the concatenated payload, sliced
    /// back by the triple counts on arrival. Triples and payload are built
    /// in a single pass, so their ordering always agrees.
    pub fn exchange_rim(&mut self, kind: ParticleKind) {
        for domain in self.domains.values_mut() {
            domain.clear_rim(Some(kind));
        }

        let mut local_rim: Vec<(CellId, CellId, Vec<Particle>)> = Vec::new();
        let mut remote: DataByRank<Vec<(CellId, CellId, Vec<Particle>)>> =
            self.comms.rim_data.initialize_data_by_rank();
        for (id, domain) in &self.domains {
            let participates = match kind {
                ParticleKind::Fluid => domain.has_fluid(),
                _ => !domain.is_empty(),
            };
            if !participates {
                continue;
            }
            for (target, particles) in domain.rim_target_map(kind) {
                if particles.is_empty() {
                    continue;
                }
                let owner = target.owner(self.sim_size);
                if owner == self.sim_rank {
                    local_rim.push((target, *id, particles));
                } else {
                    remote[owner].push((target, *id, particles));
                }
            }
        }

        let mut pair_counts: DataByRank<Count> = self.comms.rim_meta.initialize_data_by_rank();
        for (rank, entries) in remote.iter() {
            pair_counts.insert(*rank, entries.len() as Count);
        }
        let incoming_pairs = self.comms.rim_meta.exchange_counts(&pair_counts);

        let mut triples: DataByRank<Vec<Count>> = self.comms.rim_meta.initialize_data_by_rank();
        let mut payloads: DataByRank<Vec<Particle>> =
            self.comms.rim_data.initialize_data_by_rank();
        for (rank, entries) in remote {
            for (target, source, particles) in entries {
                triples[rank].extend([target.0, source.0, particles.len() as Count]);
                payloads[rank].extend(particles);
            }
        }

        let mut triple_counts: DataByRank<Count> = self.comms.rim_meta.initialize_data_by_rank();
        for (rank, pairs) in incoming_pairs.iter() {
            triple_counts.insert(*rank, pairs * 3);
        }
        let incoming_triples = self
            .comms
            .rim_meta
            .exchange_payloads(triples, &triple_counts);
        self.comms.rim_meta.barrier();

        let mut payload_counts: DataByRank<Count> = self.comms.rim_data.initialize_data_by_rank();
        for (rank, triple) in incoming_triples.iter() {
            payload_counts.insert(*rank, triple.chunks_exact(3).map(|entry| entry[2]).sum());
        }
        let incoming_payloads = self
            .comms
            .rim_data
            .exchange_payloads(payloads, &payload_counts);
        self.comms.rim_data.barrier();

        for (target, source, particles) in local_rim {
            if let Some(domain) = self.domains.get_mut(&target) {
                domain.add_rim(source, particles);
            }
        }
        for (rank, triple) in incoming_triples {
            let payload = &incoming_payloads[rank];
            let mut offset = 0;
            for entry in triple.chunks_exact(3) {
                let (target, source) = (CellId(entry[0]), CellId(entry[1]));
                let count = entry[2] as usize;
                assert!(
                    offset + count <= payload.len(),
                    "rim payload from rank {} too short: meta promises {} more particles at offset {} of {}",
                    rank,
                    count,
                    offset,
                    payload.len(),
                );
                let slice = payload[offset..offset + count].to_vec();
                offset += count;
                // Halo copies are only useful where a domain already exists.
                if let Some(domain) = self.domains.get_mut(&target) {
                    domain.add_rim(source, slice);
                }
            }
            assert_eq!(
                offset,
                payload.len(),
                "rim payload from rank {} longer than its meta triples",
                rank
            );
        }
    }

    /// Emits one fluid particle per source, uniformly jittered within the
    /// cubic spawn volume, and stages it for the next migration exchange.
    /// Runs on the first simulator rank only so each source spawns once per
    /// step.
    fn spawn_source_particles(&mut self) {
        if self.sources.is_empty() || !self.is_main() {
            return;
        }
        let distribution = Uniform::new_inclusive(-SOURCE_SIZE, SOURCE_SIZE);
        let rng = &mut self.rng;
        let new_particles: Vec<Particle> = self
            .sources
            .iter()
            .map(|source| {
                let jitter = Vector3::new(
                    rng.sample(distribution),
                    rng.sample(distribution),
                    rng.sample(distribution),
                );
                Particle::fluid(*source + jitter)
            })
            .collect();
        self.spawned_particles += new_particles.len();
        self.add_particles(new_particles);
    }

    fn export_particles(&mut self) {
        let mut particles = Vec::new();
        for domain in self.domains.values() {
            if domain.has_fluid() {
                particles.extend(domain.particles_of_kind(ParticleKind::Fluid));
            }
        }
        self.exporter.export_frame(particles);
    }

    fn clean_up_fluid_particles(&mut self) {
        for domain in self.domains.values_mut() {
            domain.clear_particles(Some(ParticleKind::Fluid));
            domain.clear_rim(Some(ParticleKind::Fluid));
        }
    }

    pub fn fluid_particle_count(&self) -> usize {
        self.domains
            .values()
            .map(|domain| domain.particles_of_kind(ParticleKind::Fluid).len())
            .sum()
    }

    pub fn spawned_particle_count(&self) -> usize {
        self.spawned_particles
    }

    pub fn sunk_particle_count(&self) -> usize {
        self.sunk_particles
    }

    pub fn domain(&self, cell: CellId) -> Option<&ParticleDomain> {
        self.domains.get(&cell)
    }

    /// Ownership invariant: every stored particle hashes to a cell owned by
    /// this process, and every domain stores only particles of its own cell.
    pub fn owns_all_its_particles(&self) -> bool {
        self.domains.iter().all(|(id, domain)| {
            id.owner(self.sim_size) == self.sim_rank
                && domain
                    .particles()
                    .iter()
                    .filter(|particle| particle.is_fluid())
                    .all(|particle| CellId::containing(particle.position) == *id)
        })
    }
}
