//! The persisted frame archive: every exported frame with its particle
//! records, written once at the end of a simulation run.

use std::collections::BTreeMap;
use std::fs::create_dir_all;
use std::fs::File;
use std::io::BufReader;
use std::io::BufWriter;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;

use crate::particle::Particle;

/// Frame number to particle records, ordered by frame.
pub type FrameArchive = BTreeMap<u32, Vec<Particle>>;

pub fn write_archive(path: &Path, frames: &FrameArchive) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)
            .with_context(|| format!("failed to create archive directory {parent:?}"))?;
    }
    let file = File::create(path).with_context(|| format!("failed to create archive {path:?}"))?;
    bincode::serialize_into(BufWriter::new(file), frames)
        .with_context(|| format!("failed to serialize archive {path:?}"))
}

pub fn read_archive(path: &Path) -> Result<FrameArchive> {
    let file = File::open(path).with_context(|| format!("failed to open archive {path:?}"))?;
    bincode::deserialize_from(BufReader::new(file))
        .with_context(|| format!("failed to deserialize archive {path:?}"))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::read_archive;
    use super::write_archive;
    use crate::particle::Particle;
    use crate::particle::ParticleKind;
    use crate::vector::Vector3;

    #[test]
    fn archive_round_trip_preserves_every_frame() {
        let mut frames = BTreeMap::new();
        frames.insert(
            1,
            vec![
                Particle::fluid_with_velocity(
                    Vector3::new(0.1, 2.0, -3.5),
                    Vector3::new(0.0, -1.0, 0.0),
                ),
                Particle::new(Vector3::new(5.0, 0.0, 5.0), Vector3::ZERO, ParticleKind::Static),
            ],
        );
        frames.insert(2, vec![]);
        frames.insert(3, vec![Particle::fluid(Vector3::ZERO)]);

        let path = std::env::temp_dir().join(format!(
            "waterfall-archive-test-{}.bin",
            std::process::id()
        ));
        write_archive(&path, &frames).unwrap();
        let restored = read_archive(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(restored.len(), frames.len());
        for (frame, particles) in &frames {
            let restored_particles = &restored[frame];
            assert_eq!(restored_particles, particles);
            for (a, b) in particles.iter().zip(restored_particles) {
                assert_eq!(a.mass, b.mass);
                assert_eq!(a.local_density, b.local_density);
                assert_eq!(a.kind, b.kind);
            }
        }
    }
}
