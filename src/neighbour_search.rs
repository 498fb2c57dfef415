//! Neighbour candidate enumeration on the uniform grid.

use crate::constants::DOMAIN_DIMENSION;
use crate::constants::R_MAX;
use crate::grid::CellId;
use crate::particle::Particle;
use crate::vector::Vector3;

/// Enumerates the cells whose cube can intersect the influence sphere of a
/// position, and filters candidate particles down to actual neighbours.
pub trait NeighbourSearch {
    fn cell_candidates(&self, position: Vector3) -> Vec<CellId>;
    fn neighbours_of(&self, position: Vector3, candidates: &[Particle]) -> Vec<Particle>;
}

/// The 3x3x3 block of cells centered on the cell of the reference position.
/// Sound because the cell edge is at least `2 * R_MAX`, so the influence
/// sphere never reaches past the directly adjacent cells.
#[derive(Clone, Copy, Default)]
pub struct GridNeighbourSearch;

// The block search is only sound while the sphere fits inside the block.
const _: () = assert!(R_MAX <= DOMAIN_DIMENSION / 2.0);

impl NeighbourSearch for GridNeighbourSearch {
    fn cell_candidates(&self, position: Vector3) -> Vec<CellId> {
        let (x, y, z) = CellId::containing(position).unpack();
        let mut cells = Vec::with_capacity(27);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    cells.push(CellId::pack(x + dx, y + dy, z + dz));
                }
            }
        }
        cells
    }

    fn neighbours_of(&self, position: Vector3, candidates: &[Particle]) -> Vec<Particle> {
        candidates
            .iter()
            .filter(|candidate| (candidate.position - position).length() <= R_MAX)
            .copied()
            .collect()
    }
}
