//! Legacy VTK polydata export of one particle frame.

use std::fs::create_dir_all;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use vtkio::model::Attribute;
use vtkio::model::Attributes;
use vtkio::model::ByteOrder;
use vtkio::model::DataArray;
use vtkio::model::ElementType;
use vtkio::model::PolyDataPiece;
use vtkio::model::Version;
use vtkio::model::VertexNumbers;
use vtkio::model::Vtk;
use vtkio::IOBuffer;

use crate::particle::Particle;

/// Writes positions as POINTS, one vertex cell per particle, and optionally
/// the velocities as a point vector attribute.
pub fn write_particles(path: &Path, particles: &[Particle], with_velocities: bool) -> Result<()> {
    let mut points = Vec::with_capacity(particles.len() * 3);
    for particle in particles {
        points.extend([
            particle.position.x,
            particle.position.y,
            particle.position.z,
        ]);
    }
    let vertices = (0..particles.len() as u32).flat_map(|i| [1, i]).collect();
    let mut point_attributes = Vec::new();
    if with_velocities {
        let mut velocities = Vec::with_capacity(particles.len() * 3);
        for particle in particles {
            velocities.extend([
                particle.velocity.x,
                particle.velocity.y,
                particle.velocity.z,
            ]);
        }
        point_attributes.push(Attribute::DataArray(DataArray {
            name: "velocity".into(),
            elem: ElementType::Vectors,
            data: IOBuffer::F64(velocities),
        }));
    }
    let piece = PolyDataPiece {
        points: IOBuffer::F64(points),
        verts: Some(VertexNumbers::Legacy {
            num_cells: particles.len() as u32,
            vertices,
        }),
        lines: None,
        polys: None,
        strips: None,
        data: Attributes {
            point: point_attributes,
            cell: vec![],
        },
    };
    let vtk_file = Vtk {
        version: Version::new((2, 0)),
        title: "waterfall particles".to_string(),
        file_path: None,
        byte_order: ByteOrder::BigEndian,
        data: piece.into(),
    };
    if let Some(parent) = path.parent() {
        create_dir_all(parent)
            .with_context(|| format!("failed to create VTK directory {parent:?}"))?;
    }
    vtk_file
        .export_ascii(path)
        .with_context(|| format!("failed to write VTK file {path:?}"))
}

#[cfg(test)]
mod tests {
    use super::write_particles;
    use crate::particle::Particle;
    use crate::vector::Vector3;

    #[test]
    fn writes_a_legacy_polydata_file() {
        let particles = vec![
            Particle::fluid(Vector3::new(0.0, 1.0, 2.0)),
            Particle::fluid_with_velocity(Vector3::new(3.0, 4.0, 5.0), Vector3::new(0.0, -1.0, 0.0)),
        ];
        let path = std::env::temp_dir().join(format!(
            "waterfall-vtk-test-{}.vtk",
            std::process::id()
        ));
        write_particles(&path, &particles, true).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert!(contents.starts_with("# vtk DataFile"));
        assert!(contents.contains("POLYDATA"));
        assert!(contents.contains("POINTS 2"));
        assert!(contents.contains("VECTORS velocity"));
    }
}
