//! The uniform grid of cubic cells and its integer cell identifiers.

use crate::communication::Rank;
use crate::constants::DOMAIN_DIMENSION;
use crate::vector::Vector3;

/// Identifier of one cell of the uniform grid, packing the three integer
/// cell coordinates into a single integer as `x + (y << 10) + (z << 20)`.
/// Each coordinate must fit into 10 signed bits, i.e. lie in [-512, 511].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub i32);

impl CellId {
    pub fn pack(x: i32, y: i32, z: i32) -> CellId {
        debug_assert!((-512..512).contains(&x));
        debug_assert!((-512..512).contains(&y));
        debug_assert!((-512..512).contains(&z));
        CellId(x + (y << 10) + (z << 20))
    }

    /// Inverts `pack`. The packed value is a mixed-radix number with digits
    /// in [-512, 511], so each digit is recovered with a shifted Euclidean
    /// remainder.
    pub fn unpack(self) -> (i32, i32, i32) {
        let x = (self.0 + 512).rem_euclid(1024) - 512;
        let rest = (self.0 - x) >> 10;
        let y = (rest + 512).rem_euclid(1024) - 512;
        let z = (rest - y) >> 10;
        (x, y, z)
    }

    /// The cell containing `position`.
    pub fn containing(position: Vector3) -> CellId {
        let cell = (position / DOMAIN_DIMENSION).floor();
        CellId::pack(cell.x as i32, cell.y as i32, cell.z as i32)
    }

    /// The minimum corner of this cell.
    pub fn origin(self) -> Vector3 {
        let (x, y, z) = self.unpack();
        Vector3::new(x as f64, y as f64, z as f64) * DOMAIN_DIMENSION
    }

    /// The simulator rank owning this cell.
    pub fn owner(self, number_of_simulators: usize) -> Rank {
        (self.0 % number_of_simulators as i32).abs() as Rank
    }
}

/// The owner of the cell containing `position`.
pub fn process_of_position(position: Vector3, number_of_simulators: usize) -> Rank {
    CellId::containing(position).owner(number_of_simulators)
}

#[cfg(test)]
mod tests {
    use super::CellId;
    use crate::constants::DOMAIN_DIMENSION;
    use crate::vector::Vector3;

    #[test]
    fn pack_unpack_roundtrip() {
        let coords = [-512, -511, -317, -100, -2, -1, 0, 1, 2, 99, 317, 510, 511];
        for &x in &coords {
            for &y in &coords {
                for &z in &coords {
                    assert_eq!(CellId::pack(x, y, z).unpack(), (x, y, z));
                }
            }
        }
        // Exhaustive sweep along each axis over the whole 10 bit range.
        for value in -512..512 {
            assert_eq!(CellId::pack(value, 7, -3).unpack(), (value, 7, -3));
            assert_eq!(CellId::pack(-3, value, 7).unpack(), (-3, value, 7));
            assert_eq!(CellId::pack(7, -3, value).unpack(), (7, -3, value));
        }
    }

    #[test]
    fn containing_cell_boundaries() {
        assert_eq!(
            CellId::containing(Vector3::new(0.0, 0.0, 0.0)),
            CellId::pack(0, 0, 0)
        );
        assert_eq!(
            CellId::containing(Vector3::new(DOMAIN_DIMENSION, 0.0, 0.0)),
            CellId::pack(1, 0, 0)
        );
        assert_eq!(
            CellId::containing(Vector3::new(-0.0001, 0.5, DOMAIN_DIMENSION * 2.5)),
            CellId::pack(-1, 0, 2)
        );
    }

    #[test]
    fn origin_matches_cell_coordinates() {
        let id = CellId::pack(2, -3, 1);
        let origin = id.origin();
        assert_eq!(CellId::containing(origin + Vector3::new(0.1, 0.1, 0.1)), id);
    }

    #[test]
    fn owner_is_non_negative_for_negative_ids() {
        let id = CellId::pack(-5, -1, -2);
        assert!(id.0 < 0);
        for size in 1..8 {
            let owner = id.owner(size);
            assert!((0..size as i32).contains(&owner));
        }
    }

    #[test]
    fn owner_is_stable_between_id_and_position() {
        let position = Vector3::new(-7.3, 4.1, 0.2);
        let id = CellId::containing(position);
        assert_eq!(super::process_of_position(position, 5), id.owner(5));
    }
}
