// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::f32::consts::PI;

use super::*;

pub struct Box;

impl Box {
    pub fn build(center: Vec3, size: Vec3) -> HalfEdgeMesh {
        let hsize = size * 0.5;

        let v1 = center + Vec3::new(-hsize.x, -hsize.y, -hsize.z);
        let v2 = center + Vec3::new(hsize.x, -hsize.y, -hsize.z);
        let v3 = center + Vec3::new(hsize.x, -hsize.y, hsize.z);
        let v4 = center + Vec3::new(-hsize.x, -hsize.y, hsize.z);

        let v5 = center + Vec3::new(-hsize.x, hsize.y, -hsize.z);
        let v6 = center + Vec3::new(-hsize.x, hsize.y, hsize.z);
        let v7 = center + Vec3::new(hsize.x, hsize.y, hsize.z);
        let v8 = center + Vec3::new(hsize.x, hsize.y, -hsize.z);

        HalfEdgeMesh::build_from_polygons(
            &[v1, v2, v3, v4, v5, v6, v7, v8],
            &[
                &[0, 1, 2, 3],
                &[4, 5, 6, 7],
                &[4, 7, 1, 0],
                &[3, 2, 6, 5],
                &[5, 4, 0, 3],
                &[6, 2, 1, 7],
            ],
        )
        .expect("Cube construction should not fail")
    }
}

pub struct Quad;
impl Quad {
    pub fn build(center: Vec3, normal: Vec3, right: Vec3, size: Vec2) -> HalfEdgeMesh {
        let normal = normal.normalize();
        let right = right.normalize();
        let forward = normal.cross(right);

        let hsize = size * 0.5;

        let v1 = center + hsize.x * right + hsize.y * forward;
        let v2 = center - hsize.x * right + hsize.y * forward;
        let v3 = center - hsize.x * right - hsize.y * forward;
        let v4 = center + hsize.x * right - hsize.y * forward;

        HalfEdgeMesh::build_from_polygons(&[v1, v2, v3, v4], &[&[0, 1, 2, 3]])
            .expect("Quad construction should not fail")
    }
}

/// A single n-sided polygon on the XZ plane
pub struct Circle;
impl Circle {
    pub fn build(center: Vec3, radius: f32, num_vertices: usize) -> HalfEdgeMesh {
        let angle_delta = (2.0 * PI) / num_vertices as f32;
        let verts = (0..num_vertices)
            .map(|i| {
                let q = Quat::from_rotation_y(angle_delta * i as f32);
                q * (Vec3::Z * radius) + center
            })
            .collect_vec();
        let polygon = (0..num_vertices).collect_vec();

        HalfEdgeMesh::build_from_polygons(&verts, &[&polygon])
            .expect("Circle construction should not fail")
    }
}

/// A regular grid of `nx` by `ny` cells on the XY plane, facing +Z, with its
/// lower-left corner at the origin. Vertex `(i, j)` has index `j * (nx + 1) + i`.
pub struct Grid;
impl Grid {
    fn positions(nx: u32, ny: u32, cell_size: f32) -> Vec<Vec3> {
        (0..=ny)
            .flat_map(|j| {
                (0..=nx).map(move |i| Vec3::new(i as f32 * cell_size, j as f32 * cell_size, 0.0))
            })
            .collect()
    }

    fn cells(nx: u32, ny: u32) -> impl Iterator<Item = [u32; 4]> {
        let v = move |i: u32, j: u32| j * (nx + 1) + i;
        (0..ny).flat_map(move |j| {
            (0..nx).map(move |i| [v(i, j), v(i + 1, j), v(i + 1, j + 1), v(i, j + 1)])
        })
    }

    pub fn build_quads(nx: u32, ny: u32, cell_size: f32) -> HalfEdgeMesh {
        let polygons = Self::cells(nx, ny).collect_vec();
        HalfEdgeMesh::build_from_polygons(&Self::positions(nx, ny, cell_size), &polygons)
            .expect("Grid construction should not fail")
    }

    /// Same as [`Grid::build_quads`], with every cell split along the
    /// diagonal that goes from its lower-left to its upper-right corner.
    pub fn build_tris(nx: u32, ny: u32, cell_size: f32) -> HalfEdgeMesh {
        let polygons = Self::cells(nx, ny)
            .flat_map(|[a, b, c, d]| [[a, b, c], [a, c, d]])
            .collect_vec();
        HalfEdgeMesh::build_from_polygons(&Self::positions(nx, ny, cell_size), &polygons)
            .expect("Grid construction should not fail")
    }
}

/// A triangle fan on the XY plane, facing +Z. The center is vertex 0, and rim
/// vertex `i` sits at angle `2πi / segments`.
pub struct DiskFan;
impl DiskFan {
    pub fn build(center: Vec3, radius: f32, segments: u32) -> HalfEdgeMesh {
        Self::build_with_hub(center, center, radius, segments)
    }

    /// Like [`DiskFan::build`], but the shared vertex of all triangles is
    /// placed at `hub` instead of the center of the circle.
    pub fn build_with_hub(center: Vec3, hub: Vec3, radius: f32, segments: u32) -> HalfEdgeMesh {
        let mut vertices = vec![hub];
        for i in 0..segments {
            let theta = 2.0 * PI * i as f32 / segments as f32;
            vertices.push(center + Vec3::new(theta.cos(), theta.sin(), 0.0) * radius);
        }
        let polygons = (0..segments)
            .map(|i| [0, i + 1, (i + 1) % segments + 1])
            .collect_vec();
        HalfEdgeMesh::build_from_polygons(&vertices, &polygons)
            .expect("Disk construction should not fail")
    }
}

pub struct Tetrahedron;
impl Tetrahedron {
    pub fn build() -> HalfEdgeMesh {
        HalfEdgeMesh::build_from_polygons(
            &[
                Vec3::new(1.0, 1.0, 1.0),
                Vec3::new(1.0, -1.0, -1.0),
                Vec3::new(-1.0, 1.0, -1.0),
                Vec3::new(-1.0, -1.0, 1.0),
            ],
            &[[0, 1, 2], [1, 0, 3], [0, 2, 3], [2, 1, 3]],
        )
        .expect("Tetrahedron construction should not fail")
    }
}

pub struct UVSphere;
impl UVSphere {
    fn soup(center: Vec3, segments: u32, rings: u32, radius: f32) -> (Vec<Vec3>, Vec<SVec<u32>>) {
        let mut vertices = Vec::<Vec3>::new();
        let mut polygons = Vec::<SVec<u32>>::new();

        let top_vertex = 0;
        vertices.push(center + Vec3::Y * radius);

        for i in 0..rings - 1 {
            let phi = PI * (i + 1) as f32 / rings as f32;
            for j in 0..segments {
                let theta = 2.0 * PI * j as f32 / segments as f32;
                let x = phi.sin() * theta.cos() * radius;
                let y = phi.cos() * radius;
                let z = phi.sin() * theta.sin() * radius;
                vertices.push(center + Vec3::new(x, y, z));
            }
        }

        let bottom_vertex = vertices.len() as u32;
        vertices.push(center - Vec3::Y * radius);

        // Top triangles
        for i in 0..segments {
            let i0 = i + 1;
            let i1 = (i + 1) % segments + 1;
            polygons.push(smallvec::smallvec![top_vertex, i1, i0]);
        }
        // Bottom triangles
        for i in 0..segments {
            let i0 = i + segments * (rings - 2) + 1;
            let i1 = (i + 1) % segments + segments * (rings - 2) + 1;
            polygons.push(smallvec::smallvec![bottom_vertex, i0, i1]);
        }
        // Middle quads
        for j in 0..rings - 2 {
            let j0 = j * segments + 1;
            let j1 = (j + 1) * segments + 1;
            for i in 0..segments {
                let i0 = j0 + i;
                let i1 = j0 + (i + 1) % segments;
                let i2 = j1 + (i + 1) % segments;
                let i3 = j1 + i;
                polygons.push(smallvec::smallvec![i0, i1, i2, i3]);
            }
        }

        (vertices, polygons)
    }

    pub fn build(center: Vec3, segments: u32, rings: u32, radius: f32) -> HalfEdgeMesh {
        let (vertices, polygons) = Self::soup(center, segments, rings, radius);
        HalfEdgeMesh::build_from_polygons(&vertices, &polygons)
            .expect("Sphere construction should not fail")
    }

    /// A UV sphere where every quad is split in two triangles.
    pub fn build_triangulated(center: Vec3, segments: u32, rings: u32, radius: f32) -> HalfEdgeMesh {
        let (vertices, polygons) = Self::soup(center, segments, rings, radius);
        let polygons = polygons
            .into_iter()
            .flat_map(|p| -> SVec<SVec<u32>> {
                if p.len() == 4 {
                    smallvec::smallvec![
                        smallvec::smallvec![p[0], p[1], p[2]],
                        smallvec::smallvec![p[0], p[2], p[3]],
                    ]
                } else {
                    smallvec::smallvec![p]
                }
            })
            .collect_vec();
        HalfEdgeMesh::build_from_polygons(&vertices, &polygons)
            .expect("Sphere construction should not fail")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn primitive_counts() {
        let cube = Box::build(Vec3::ZERO, Vec3::ONE);
        assert_eq!(
            (cube.num_vertices(), cube.num_edges(), cube.num_faces()),
            (8, 12, 6)
        );

        let grid = Grid::build_quads(3, 2, 1.0);
        assert_eq!(
            (grid.num_vertices(), grid.num_edges(), grid.num_faces()),
            (12, 17, 6)
        );
        assert_eq!(grid.num_boundary_loops(), 1);
        assert_eq!(grid.boundary_loop_halfedges(0).unwrap().len(), 10);

        let tris = Grid::build_tris(3, 2, 1.0);
        assert_eq!(
            (tris.num_vertices(), tris.num_edges(), tris.num_faces()),
            (12, 23, 12)
        );

        let disk = DiskFan::build(Vec3::ZERO, 0.5, 8);
        assert_eq!(
            (disk.num_vertices(), disk.num_edges(), disk.num_faces()),
            (9, 16, 8)
        );

        let hexagon = Circle::build(Vec3::ZERO, 1.0, 6);
        assert_eq!(
            (hexagon.num_vertices(), hexagon.num_edges(), hexagon.num_faces()),
            (6, 6, 1)
        );
        assert_eq!(hexagon.boundary_loop_halfedges(0).unwrap().len(), 6);

        let tet = Tetrahedron::build();
        assert_eq!(
            (tet.num_vertices(), tet.num_edges(), tet.num_faces()),
            (4, 6, 4)
        );

        let sphere = UVSphere::build_triangulated(Vec3::ZERO, 8, 4, 1.0);
        let euler = sphere.num_vertices() as i64 - sphere.num_edges() as i64
            + sphere.num_faces() as i64;
        assert_eq!(euler, 2);
        assert!(sphere
            .iter_faces()
            .all(|(_, f)| f.kind() == FaceKind::Triangle));
    }
}
