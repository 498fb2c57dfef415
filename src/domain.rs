//! A particle domain is one cell of the uniform grid together with the
//! particles it owns and the halo copies received from neighbouring cells.

use std::collections::HashMap;
use std::collections::HashSet;

use crate::constants::R_MAX;
use crate::grid::CellId;
use crate::particle::Particle;
use crate::particle::ParticleKind;
use crate::vector::Vector3;

pub struct ParticleDomain {
    id: CellId,
    origin: Vector3,
    particles: Vec<Particle>,
    /// Halo copies keyed by the cell they were copied from. Cleared and
    /// repopulated from scratch in every rim exchange phase.
    neighbour_rim_particles: HashMap<CellId, Vec<Particle>>,
    number_of_fluid_particles: usize,
    has_static_particles: bool,
}

impl ParticleDomain {
    pub fn new(id: CellId) -> Self {
        Self {
            id,
            origin: id.origin(),
            particles: Vec::new(),
            neighbour_rim_particles: HashMap::new(),
            number_of_fluid_particles: 0,
            has_static_particles: false,
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn origin(&self) -> Vector3 {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn has_fluid(&self) -> bool {
        self.number_of_fluid_particles != 0
    }

    pub fn has_statics(&self) -> bool {
        self.has_static_particles
    }

    pub fn add(&mut self, particle: Particle) {
        match particle.kind {
            ParticleKind::Fluid => self.number_of_fluid_particles += 1,
            ParticleKind::Static => self.has_static_particles = true,
            ParticleKind::Shutter => {}
        }
        self.particles.push(particle);
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn particles_of_kind(&self, kind: ParticleKind) -> Vec<Particle> {
        self.particles
            .iter()
            .filter(|particle| particle.kind == kind)
            .copied()
            .collect()
    }

    /// Indices into `particles` of all fluid particles, in storage order.
    /// Neighbour lists built during the search pass stay aligned with this
    /// order for the rest of the timestep.
    pub fn fluid_indices(&self) -> Vec<usize> {
        self.particles
            .iter()
            .enumerate()
            .filter(|(_, particle)| particle.is_fluid())
            .map(|(index, _)| index)
            .collect()
    }

    pub fn clear_particles(&mut self, kind: Option<ParticleKind>) {
        match kind {
            None => {
                self.particles.clear();
                self.number_of_fluid_particles = 0;
                self.has_static_particles = false;
            }
            Some(kind) => {
                self.particles.retain(|particle| particle.kind != kind);
                match kind {
                    ParticleKind::Fluid => self.number_of_fluid_particles = 0,
                    ParticleKind::Static => self.has_static_particles = false,
                    ParticleKind::Shutter => {}
                }
            }
        }
    }

    pub fn clear_rim(&mut self, kind: Option<ParticleKind>) {
        match kind {
            None => self.neighbour_rim_particles.clear(),
            Some(kind) => {
                for rim in self.neighbour_rim_particles.values_mut() {
                    rim.retain(|particle| particle.kind != kind);
                }
            }
        }
    }

    /// Appends halo copies received from `source`. Source cells are unique
    /// within one exchange phase, so no deduplication happens here.
    pub fn add_rim(&mut self, source: CellId, particles: Vec<Particle>) {
        self.neighbour_rim_particles
            .entry(source)
            .or_default()
            .extend(particles);
    }

    pub fn rim(&self) -> &HashMap<CellId, Vec<Particle>> {
        &self.neighbour_rim_particles
    }

    pub fn rim_of_kind(&self, source: CellId, kind: ParticleKind) -> Vec<Particle> {
        self.neighbour_rim_particles
            .get(&source)
            .map(|rim| rim.iter().filter(|p| p.kind == kind).copied().collect())
            .unwrap_or_default()
    }

    /// Drops fluid particles at or below the sink height and removes fluid
    /// particles whose position hashes to a different cell. Returns the
    /// leavers for migration together with the number of sunk particles.
    /// Boundary particles are untouched.
    pub fn remove_outside(&mut self, sink_height: f64) -> (Vec<Particle>, usize) {
        let mut leavers = Vec::new();
        let mut sunk = 0;
        let id = self.id;
        self.particles.retain(|particle| {
            if !particle.is_fluid() {
                return true;
            }
            if particle.position.y <= sink_height {
                log::debug!("particle below sink height deleted at {}", particle.position);
                sunk += 1;
                return false;
            }
            if CellId::containing(particle.position) != id {
                leavers.push(*particle);
                return false;
            }
            true
        });
        self.number_of_fluid_particles -= sunk + leavers.len();
        (leavers, sunk)
    }

    /// Removes the particles at the given storage indices. Only fluid
    /// particles are ever removed this way.
    pub fn remove_indices(&mut self, indices: &[usize]) {
        let mut index = 0;
        self.particles.retain(|_| {
            let keep = !indices.contains(&index);
            index += 1;
            keep
        });
        self.number_of_fluid_particles -= indices.len();
    }

    /// For every particle of `kind`, probes the 26 neighbour directions at
    /// distance `R_MAX` and buckets the particle under every foreign cell hit
    /// by a probe. A particle is sent to a target cell exactly when it lies
    /// within `R_MAX` of that cell's cube.
    pub fn rim_target_map(&self, kind: ParticleKind) -> HashMap<CellId, Vec<Particle>> {
        let mut target_map: HashMap<CellId, Vec<Particle>> = HashMap::new();
        let mut targets = HashSet::new();
        for particle in self.particles.iter().filter(|p| p.kind == kind) {
            targets.clear();
            for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        if dx == 0 && dy == 0 && dz == 0 {
                            continue;
                        }
                        let direction = Vector3::new(dx as f64, dy as f64, dz as f64).normalize();
                        let probe = particle.position + direction * R_MAX;
                        let target = CellId::containing(probe);
                        if target != self.id && targets.insert(target) {
                            target_map.entry(target).or_default().push(*particle);
                        }
                    }
                }
            }
        }
        target_map
    }
}

#[cfg(test)]
mod tests {
    use super::ParticleDomain;
    use crate::constants::DOMAIN_DIMENSION;
    use crate::constants::R_MAX;
    use crate::grid::CellId;
    use crate::particle::Particle;
    use crate::particle::ParticleKind;
    use crate::vector::Vector3;

    fn center_of(id: CellId) -> Vector3 {
        id.origin() + Vector3::new(1.0, 1.0, 1.0) * (DOMAIN_DIMENSION / 2.0)
    }

    #[test]
    fn counters_follow_additions_and_clears() {
        let mut domain = ParticleDomain::new(CellId::pack(0, 0, 0));
        domain.add(Particle::fluid(Vector3::new(0.5, 0.5, 0.5)));
        domain.add(Particle::new(
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::ZERO,
            ParticleKind::Static,
        ));
        assert!(domain.has_fluid());
        assert!(domain.has_statics());
        domain.clear_particles(Some(ParticleKind::Fluid));
        assert!(!domain.has_fluid());
        assert!(domain.has_statics());
        assert_eq!(domain.len(), 1);
    }

    #[test]
    fn remove_outside_drops_sunk_and_returns_leavers() {
        let id = CellId::pack(0, 0, 0);
        let mut domain = ParticleDomain::new(id);
        domain.add(Particle::fluid(Vector3::new(0.5, -0.5, 0.5)));
        domain.add(Particle::fluid(Vector3::new(0.5, 0.5, 0.5)));
        domain.add(Particle::fluid(Vector3::new(DOMAIN_DIMENSION + 0.5, 0.5, 0.5)));
        domain.add(Particle::new(
            Vector3::new(0.5, -1.0, 0.5),
            Vector3::ZERO,
            ParticleKind::Static,
        ));
        let (leavers, sunk) = domain.remove_outside(0.0);
        assert_eq!(leavers.len(), 1);
        assert_eq!(sunk, 1);
        assert_eq!(
            CellId::containing(leavers[0].position),
            CellId::pack(1, 0, 0)
        );
        // One fluid particle sunk, one left, one stayed; the static particle
        // below the sink is untouched.
        assert_eq!(domain.len(), 2);
        assert!(domain.has_fluid());
    }

    #[test]
    fn rim_target_map_of_a_center_particle_reaches_at_most_face_neighbours() {
        // The cell edge is exactly 2 * R_MAX, so even the center particle's
        // probes touch the faces; diagonal probes stay inside.
        let id = CellId::pack(0, 0, 0);
        let mut domain = ParticleDomain::new(id);
        domain.add(Particle::fluid(center_of(id)));
        let faces = [
            CellId::pack(1, 0, 0),
            CellId::pack(-1, 0, 0),
            CellId::pack(0, 1, 0),
            CellId::pack(0, -1, 0),
            CellId::pack(0, 0, 1),
            CellId::pack(0, 0, -1),
        ];
        for (cell, _) in domain.rim_target_map(ParticleKind::Fluid) {
            assert_ne!(cell, id);
            assert!(faces.contains(&cell));
        }
    }

    #[test]
    fn rim_target_map_hits_the_adjacent_cell() {
        let id = CellId::pack(0, 0, 0);
        let mut domain = ParticleDomain::new(id);
        // Close to the +x face, well inside along y and z.
        let mut position = center_of(id);
        position.x = DOMAIN_DIMENSION - 0.1;
        domain.add(Particle::fluid(position));
        let map = domain.rim_target_map(ParticleKind::Fluid);
        let target = CellId::pack(1, 0, 0);
        assert!(map.contains_key(&target));
        // Probes from several directions may hit the same cell; the particle
        // still appears only once per target bucket.
        assert_eq!(map[&target].len(), 1);
        for (cell, _) in map {
            assert_ne!(cell, id);
        }
    }

    #[test]
    fn rim_target_map_filters_by_kind() {
        let id = CellId::pack(0, 0, 0);
        let mut domain = ParticleDomain::new(id);
        let mut position = center_of(id);
        position.x = DOMAIN_DIMENSION - 0.1;
        domain.add(Particle::new(position, Vector3::ZERO, ParticleKind::Static));
        assert!(domain.rim_target_map(ParticleKind::Fluid).is_empty());
        assert!(!domain.rim_target_map(ParticleKind::Static).is_empty());
    }

    #[test]
    fn sent_iff_within_cutoff_of_target_cube() {
        let id = CellId::pack(0, 0, 0);
        let mut domain = ParticleDomain::new(id);
        let mut near = center_of(id);
        near.x = DOMAIN_DIMENSION - R_MAX + 0.01;
        let mut far = center_of(id);
        far.x = DOMAIN_DIMENSION - R_MAX - 0.01;
        domain.add(Particle::fluid(near));
        domain.add(Particle::fluid(far));
        let map = domain.rim_target_map(ParticleKind::Fluid);
        let bucket = &map[&CellId::pack(1, 0, 0)];
        assert_eq!(bucket.len(), 1);
        assert_eq!(bucket[0].position, near);
    }
}
