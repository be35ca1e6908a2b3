// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;

/// Checks a polygon soup for every condition that would make it impossible to
/// build a manifold, consistently oriented halfedge mesh out of it. Runs
/// before any allocation, so a failed build never exposes a partial mesh.
fn check_polygon_soup(
    num_positions: usize,
    polygons: &[SVec<usize>],
) -> Result<(), ConstructionError> {
    for (face, polygon) in polygons.iter().enumerate() {
        if let Some(&index) = polygon.iter().find(|&&i| i >= num_positions) {
            return Err(ConstructionError::IndexOutOfRange {
                face,
                index,
                num_vertices: num_positions,
            });
        }
    }

    for (face, polygon) in polygons.iter().enumerate() {
        if polygon.len() < 3 {
            return Err(ConstructionError::DegenerateFace {
                face,
                reason: "a polygon needs at least three vertices",
            });
        }
        if polygon.iter().duplicates().next().is_some() {
            return Err(ConstructionError::DegenerateFace {
                face,
                reason: "a polygon cannot repeat a vertex",
            });
        }
    }

    // Canonicalized as (min, max), counts how many polygons use each edge.
    let mut undirected = HashMap::<(usize, usize), u32>::new();
    for polygon in polygons {
        for (&a, &b) in polygon.iter().circular_tuple_windows() {
            let count = undirected.entry((a.min(b), a.max(b))).or_insert(0);
            *count += 1;
            if *count > 2 {
                return Err(ConstructionError::NonManifoldEdge {
                    v0: a.min(b),
                    v1: a.max(b),
                });
            }
        }
    }

    let mut directed = HashSet::<(usize, usize)>::new();
    for polygon in polygons {
        for (&a, &b) in polygon.iter().circular_tuple_windows() {
            if !directed.insert((a, b)) {
                return Err(ConstructionError::InconsistentOrientation { v0: a, v1: b });
            }
        }
    }

    // A vertex where two boundary gaps meet cannot be walked unambiguously
    // when synthesizing boundary loops.
    let mut gaps_at_vertex = vec![0u32; num_positions];
    for &(a, b) in directed.iter() {
        if !directed.contains(&(b, a)) {
            gaps_at_vertex[a] += 1;
            if gaps_at_vertex[a] > 1 {
                return Err(ConstructionError::NonManifoldVertex { vertex: a });
            }
        }
    }

    Ok(())
}

/// Drops the positions that no polygon refers to and renumbers the polygons
/// accordingly. The kept positions preserve their relative order. Also
/// returns, for each kept position, its index in the input.
fn strip_isolated_positions(
    positions: &[Vec3],
    polygons: Vec<SVec<usize>>,
) -> (Vec<Vec3>, Vec<SVec<usize>>, Vec<usize>) {
    let mut referenced = vec![false; positions.len()];
    for &i in polygons.iter().flatten() {
        referenced[i] = true;
    }

    let mut new_index = vec![0; positions.len()];
    let mut kept = Vec::with_capacity(positions.len());
    let mut original = Vec::with_capacity(positions.len());
    for (i, &position) in positions.iter().enumerate() {
        if referenced[i] {
            new_index[i] = kept.len();
            kept.push(position);
            original.push(i);
        }
    }

    let isolated = positions.len() - kept.len();
    if isolated == 0 {
        return (kept, polygons, original);
    }
    log::warn!("Dropping {isolated} positions not referenced by any polygon");
    let polygons = polygons
        .into_iter()
        .map(|polygon| polygon.into_iter().map(|i| new_index[i]).collect())
        .collect();
    (kept, polygons, original)
}

impl HalfEdgeMesh {
    /// Builds this mesh from a list of vertices, and a list of polygons,
    /// containing indices that reference those vertices.
    ///
    /// - Generic over Index: Use as much precision as you need / want.
    /// - Generic over Polygon: Use whatever input layout you want.
    ///
    /// If unsure, you can pass `Vec<Vec<u32>>` as `polygons`. You can also use
    /// `[[u32;3]]` or `&[&[u32]]`. Same for `u8`, `u16` or `usize` indices.
    ///
    /// Positions that no polygon refers to are dropped, with a warning. The
    /// remaining vertices get dense indices in input order, and faces keep
    /// the order of `polygons`. Errors report indices into the input.
    #[profiling::function]
    pub fn build_from_polygons<Index, Polygon>(
        positions: &[Vec3],
        polygons: &[Polygon],
    ) -> Result<Self, ConstructionError>
    where
        Index: num_traits::AsPrimitive<usize> + 'static + Copy,
        Polygon: AsRef<[Index]>,
    {
        let polygons: Vec<SVec<usize>> = polygons
            .iter()
            .map(|p| p.as_ref().iter().map(|i| i.as_()).collect())
            .collect();
        check_polygon_soup(positions.len(), &polygons)?;
        let (positions, polygons, original) = strip_isolated_positions(positions, polygons);

        let mut mesh = Self::new();
        let vertices = positions
            .iter()
            .map(|&p| mesh.alloc_vertex(p, None))
            .collect_vec();

        // Maps pairs of indices to mesh halfedges
        let mut pair_to_halfedge = HashMap::<(usize, usize), HalfEdgeId>::new();

        for polygon in &polygons {
            // Cyclically ordered list of the half edge ids of this face.
            let mut half_edges_in_face = SVec::<HalfEdgeId>::new();

            let face = mesh.alloc_face(FaceKind::from_degree(polygon.len()), None);

            for (&a, &b) in polygon.iter().circular_tuple_windows() {
                let v_a = vertices[a];
                let h = mesh.alloc_halfedge(HalfEdge {
                    vertex: Some(v_a),
                    face: Some(face),
                    ..Default::default()
                });
                // The first corner stays the face's representative, so the
                // polygon is read back starting at the same vertex.
                if mesh[face].halfedge.is_none() {
                    mesh[face].halfedge = Some(h);
                }
                mesh[v_a].halfedge = Some(h);

                half_edges_in_face.push(h);
                pair_to_halfedge.insert((a, b), h);

                // When the opposite side was already seen, both sides share
                // its edge. Otherwise this halfedge introduces a new one.
                if let Some(&other) = pair_to_halfedge.get(&(b, a)) {
                    mesh[h].twin = Some(other);
                    mesh[other].twin = Some(h);
                    mesh[h].edge = mesh[other].edge;
                } else {
                    let e = mesh.alloc_edge(Some(h));
                    mesh[h].edge = Some(e);
                }
            }

            for (&h1, &h2) in half_edges_in_face.iter().circular_tuple_windows() {
                mesh[h1].next = Some(h2);
                mesh[h2].prev = Some(h1);
            }
        }

        // Construct the boundary halfedges. Right now, the boundary consists of
        // incomplete edges, i.e. half edges that do not have a twin. Leaving it
        // like this would complicate some kinds of traversal because we can't
        // rely on halfedges always having a twin. We will instead create
        // boundary half edges, linked in a cycle around each hole and
        // circulating a synthetic boundary loop face.
        mesh.add_boundary_halfedges()?;

        // Check that the number of faces around each vertex equals the number
        // of polygons containing it. If this doesn't check out, the vertex is
        // not a polygon fan but some other non-manifold structure, like two
        // closed cones touching at their apex.
        let mut vertex_degree = vec![0usize; positions.len()];
        for &i in polygons.iter().flatten() {
            vertex_degree[i] += 1;
        }
        for (i, &v) in vertices.iter().enumerate() {
            let fan = mesh.at_vertex(v).outgoing_halfedges()?;
            let count = fan.iter().filter(|&&h| !mesh[h].boundary).count();
            if count != vertex_degree[i] {
                return Err(ConstructionError::NonManifoldVertex {
                    vertex: original[i],
                });
            }
        }

        mesh.reindex();
        Ok(mesh)
    }

    /// Given a mesh in an inconsistent state, where some halfedges have no
    /// `twin` (because it's in the boundary), this method adds twin halfedges
    /// forming a loop across the boundaries of the mesh. The new halfedges are
    /// marked as boundary, share the edge of their twin, and each loop gets
    /// its own boundary loop face.
    pub(super) fn add_boundary_halfedges(&mut self) -> Result<(), TraversalError> {
        let halfedges: Vec<HalfEdgeId> = self.iter_halfedges().map(|(h, _)| h).collect();

        for &h0 in halfedges.iter() {
            if self[h0].twin.is_some() {
                continue;
            }

            let mut boundary_halfedges = SVec::<HalfEdgeId>::new();
            let mut h_it = h0;
            loop {
                let dst = self.at_halfedge(h_it).next().vertex().try_end()?;
                let edge = self[h_it].edge;
                let t = self.alloc_halfedge(HalfEdge {
                    twin: Some(h_it),
                    vertex: Some(dst),
                    edge,
                    boundary: true,
                    ..Default::default()
                });
                boundary_halfedges.push(t);
                self[h_it].twin = Some(t);

                // Look for the next outgoing halfedge for this vertex
                // that's in the boundary
                h_it = self.at_halfedge(h_it).next().try_end()?;
                let mut count = 0;
                while h_it != h0 && self[h_it].twin.is_some() {
                    // Twin-next cycles around the outgoing halfedges of a vertex
                    h_it = self.at_halfedge(h_it).twin().next().try_end()?;
                    count += 1;
                    if count > MAX_LOOP_ITERATIONS {
                        return Err(TraversalError::HalfedgeBadLoop(h0));
                    }
                }

                if h_it == h0 {
                    break;
                }
                if boundary_halfedges.len() > MAX_LOOP_ITERATIONS {
                    return Err(TraversalError::HalfedgeBadLoop(h0));
                }
            }

            let boundary_face =
                self.alloc_face(FaceKind::BoundaryLoop, boundary_halfedges.first().copied());
            for (&b_h, &b_h_next) in boundary_halfedges.iter().rev().circular_tuple_windows() {
                self[b_h].next = Some(b_h_next);
                self[b_h_next].prev = Some(b_h);
                self[b_h].face = Some(boundary_face);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn quad_soup() -> (Vec<Vec3>, Vec<Vec<u32>>) {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        (positions, vec![vec![0, 1, 2], vec![0, 2, 3]])
    }

    #[test]
    fn builds_two_triangles() {
        let (positions, polygons) = quad_soup();
        let mesh = HalfEdgeMesh::build_from_polygons(&positions, &polygons).unwrap();
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_edges(), 5);
        assert_eq!(mesh.num_faces(), 2);
        assert_eq!(mesh.num_halfedges(), 10);
        assert_eq!(mesh.num_boundary_loops(), 1);
        assert_eq!(mesh.boundary_loop_halfedges(0).unwrap().len(), 4);
        mesh.validate().unwrap();

        let soup = mesh.to_polygons().unwrap();
        assert_eq!(soup.positions, positions);
        assert_eq!(soup.polygons[0].as_slice(), &[0, 1, 2]);
        assert_eq!(soup.polygons[1].as_slice(), &[0, 2, 3]);
        assert!(soup.uvs.is_none());
    }

    #[test]
    fn closed_mesh_has_no_boundary() {
        let mesh = primitives::Box::build(Vec3::ZERO, Vec3::ONE);
        assert_eq!(mesh.num_boundary_loops(), 0);
        assert!(mesh.iter_halfedges().all(|(_, h)| !h.is_boundary()));
        mesh.validate().unwrap();
    }

    #[test]
    fn rejects_out_of_range_indices() {
        let (positions, _) = quad_soup();
        let err = HalfEdgeMesh::build_from_polygons(&positions, &[[0u32, 1, 7]]).unwrap_err();
        assert_eq!(
            err,
            ConstructionError::IndexOutOfRange {
                face: 0,
                index: 7,
                num_vertices: 4
            }
        );
    }

    #[test]
    fn rejects_degenerate_faces() {
        let (positions, _) = quad_soup();
        let err = HalfEdgeMesh::build_from_polygons(&positions, &[vec![0u32, 1, 1], vec![0, 2, 3]])
            .unwrap_err();
        assert!(matches!(err, ConstructionError::DegenerateFace { face: 0, .. }));

        let err = HalfEdgeMesh::build_from_polygons(&positions, &[vec![0u32, 1]]).unwrap_err();
        assert!(matches!(err, ConstructionError::DegenerateFace { face: 0, .. }));
    }

    #[test]
    fn rejects_non_manifold_edges() {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ];
        // Three triangles hinged on the edge (0, 1)
        let polygons = vec![[0u32, 1, 2], [1, 0, 3], [0, 1, 4]];
        let err = HalfEdgeMesh::build_from_polygons(&positions, &polygons).unwrap_err();
        assert_eq!(err, ConstructionError::NonManifoldEdge { v0: 0, v1: 1 });
    }

    #[test]
    fn rejects_inconsistent_orientation() {
        let (positions, _) = quad_soup();
        let err = HalfEdgeMesh::build_from_polygons(&positions, &[[0u32, 1, 2], [0, 1, 3]])
            .unwrap_err();
        assert_eq!(err, ConstructionError::InconsistentOrientation { v0: 0, v1: 1 });
    }

    #[test]
    fn drops_isolated_vertices() {
        let (mut positions, polygons) = quad_soup();
        positions.push(Vec3::new(5.0, 5.0, 5.0));
        let mesh = HalfEdgeMesh::build_from_polygons(&positions, &polygons).unwrap();
        assert_eq!(mesh.num_vertices(), 4);
        mesh.validate().unwrap();
        assert_eq!(mesh.to_polygons().unwrap().positions, &positions[..4]);

        // A stray position in the middle shifts the indices after it.
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(9.0, 9.0, 9.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let mesh =
            HalfEdgeMesh::build_from_polygons(&positions, &[[0u32, 2, 3], [0, 3, 4]]).unwrap();
        let soup = mesh.to_polygons().unwrap();
        assert_eq!(soup.positions, quad_soup().0);
        assert_eq!(soup.polygons[0].as_slice(), &[0, 1, 2]);
        assert_eq!(soup.polygons[1].as_slice(), &[0, 2, 3]);
    }

    #[test]
    fn rejects_bowtie_vertices() {
        // Two triangles touching at vertex 0 only
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(-1.0, -1.0, 0.0),
        ];
        let polygons = vec![[0u32, 1, 2], [0, 3, 4]];
        let err = HalfEdgeMesh::build_from_polygons(&positions, &polygons).unwrap_err();
        assert_eq!(err, ConstructionError::NonManifoldVertex { vertex: 0 });
    }
}
