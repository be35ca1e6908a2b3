// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

use super::compact_mesh::CompactMesh;
use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdivisionOptions {
    /// Number of Catmull-Clark steps. Zero leaves the mesh untouched.
    pub iterations: usize,
}

impl Default for SubdivisionOptions {
    fn default() -> Self {
        Self { iterations: 1 }
    }
}

/// Applies `options.iterations` steps of Catmull-Clark subdivision to `mesh`.
///
/// After each step, every face is a quad. The original vertices keep their
/// dense indices, followed by one vertex per old face and one per old edge.
/// The mesh is replaced as a whole, so any handle obtained before this call
/// becomes stale, and vertex UVs are discarded.
#[profiling::function]
pub fn subdivide(
    mesh: &mut HalfEdgeMesh,
    options: &SubdivisionOptions,
) -> Result<(), InvariantViolation> {
    log::debug!(
        "Subdividing mesh with {} vertices and {} faces, {} iterations",
        mesh.num_vertices(),
        mesh.num_faces(),
        options.iterations
    );

    let compact = CompactMesh::<false>::from_halfedge(mesh)?;
    let Some(subdivided) = compact.subdivide_multi(options.iterations) else {
        return Ok(());
    };

    let iterations = mesh.subdivision_iterations + options.iterations;
    *mesh = subdivided.to_halfedge()?;
    mesh.subdivision_iterations = iterations;

    log::debug!(
        "Subdivision produced {} vertices and {} faces",
        mesh.num_vertices(),
        mesh.num_faces()
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn euler_characteristic(mesh: &HalfEdgeMesh) -> i64 {
        mesh.num_vertices() as i64 - mesh.num_edges() as i64 + mesh.num_faces() as i64
    }

    #[test]
    fn subdivide_cube() {
        let mut mesh = primitives::Box::build(Vec3::ZERO, Vec3::ONE);
        let original = mesh.to_polygons().unwrap();

        subdivide(&mut mesh, &SubdivisionOptions::default()).unwrap();
        mesh.validate().unwrap();

        assert_eq!(mesh.num_vertices(), 8 + 6 + 12);
        assert_eq!(mesh.num_faces(), 24);
        assert_eq!(mesh.num_edges(), 48);
        assert_eq!(euler_characteristic(&mesh), 2);
        assert_eq!(mesh.num_boundary_loops(), 0);
        assert_eq!(mesh.subdivision_iterations(), 1);
        assert!(mesh.iter_faces().all(|(_, f)| f.kind() == FaceKind::Quad));

        let soup = mesh.to_polygons().unwrap();
        // A cube corner has valence 3: Q = 1/6, R = 1/3 per coordinate, so the
        // corner moves to (Q + 2R) / 3 = 5/18.
        for (old, new) in original.positions.iter().zip(&soup.positions) {
            assert!(new.abs_diff_eq(old.signum() * 5.0 / 18.0, 1e-6));
        }
        // Face points sit at the face centroids.
        for (i, polygon) in original.polygons.iter().enumerate() {
            let centroid = polygon
                .iter()
                .map(|&v| original.positions[v as usize])
                .fold(Vec3::ZERO, |a, b| a + b)
                / 4.0;
            assert!(soup.positions[8 + i].abs_diff_eq(centroid, 1e-6));
        }
    }

    #[test]
    fn subdivide_multiple_times() {
        let mut mesh = primitives::Box::build(Vec3::ZERO, Vec3::ONE);
        subdivide(&mut mesh, &SubdivisionOptions { iterations: 2 }).unwrap();
        assert_eq!(mesh.num_vertices(), 98);
        assert_eq!(mesh.num_faces(), 96);
        assert_eq!(mesh.subdivision_iterations(), 2);

        subdivide(&mut mesh, &SubdivisionOptions { iterations: 1 }).unwrap();
        assert_eq!(mesh.num_vertices(), 386);
        assert_eq!(mesh.subdivision_iterations(), 3);
        assert_eq!(euler_characteristic(&mesh), 2);
        mesh.validate().unwrap();
    }

    #[test]
    fn zero_iterations_is_a_no_op() {
        let mut mesh = primitives::Tetrahedron::build();
        let before = mesh.to_polygons().unwrap();
        subdivide(&mut mesh, &SubdivisionOptions { iterations: 0 }).unwrap();
        assert_eq!(mesh.to_polygons().unwrap(), before);
        assert_eq!(mesh.subdivision_iterations(), 0);
    }

    #[test]
    fn subdivide_triangles_into_quads() {
        let mut mesh = primitives::Tetrahedron::build();
        subdivide(&mut mesh, &SubdivisionOptions::default()).unwrap();
        mesh.validate().unwrap();
        assert_eq!(mesh.num_vertices(), 4 + 4 + 6);
        assert_eq!(mesh.num_faces(), 12);
        assert_eq!(euler_characteristic(&mesh), 2);
        assert!(mesh.iter_faces().all(|(_, f)| f.kind() == FaceKind::Quad));
    }

    #[test]
    fn subdivide_keeps_boundary_loops() {
        let mut mesh = primitives::Grid::build_quads(2, 2, 1.0);
        let (first, _) = mesh.iter_vertices().next().unwrap();
        mesh.set_vertex_uv(first, Vec2::ZERO);
        subdivide(&mut mesh, &SubdivisionOptions::default()).unwrap();
        mesh.validate().unwrap();

        assert_eq!(mesh.num_faces(), 16);
        assert_eq!(mesh.num_boundary_loops(), 1);
        assert_eq!(mesh.boundary_loop_halfedges(0).unwrap().len(), 16);
        assert_eq!(euler_characteristic(&mesh), 1);
        assert!(mesh.iter_vertices().all(|(_, v)| v.uv().is_none()));

        // Corner (0, 0): (m1 + m2 + 2S) / 4 with m1 = (0.5, 0), m2 = (0, 0.5)
        let soup = mesh.to_polygons().unwrap();
        assert!(soup.positions[0].abs_diff_eq(Vec3::new(0.125, 0.125, 0.0), 1e-6));
        // Border vertex (1, 0): (0.5 + 1.5 + 2) / 4 = 1, it stays in place
        assert!(soup.positions[1].abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-6));
        // All vertices stay on the plane
        assert!(soup.positions.iter().all(|p| p.z.abs() < 1e-6));
    }
}
