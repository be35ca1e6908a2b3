// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use atomic_float::AtomicF32;
use nonmax::NonMaxU32;
use slotmap::SecondaryMap;
use std::sync::atomic::Ordering;

use super::*;

/// A HalfEdge representation storing the halfedge pointers in contiguous
/// arrays. For each of the main arrays, at position `h` there is the data for
/// halfedge with index `h`.
///
/// This representation is better suited to certain algorithms due to the more
/// succint representation which allows easier concurrent access.
///
/// Besides storage type, there are some representation differences between a
/// [`HalfEdgeMesh`], and a [`CompactMesh`]:
/// - A `HalfEdgeMesh` closes every hole with boundary halfedges circulating a
///   boundary loop face, whereas in the `CompactMesh` the twin of a halfedge
///   on the border simply does not exist (encoded as u32::MAX, via NonMaxU32)
/// - A `CompactMesh` has no boundary loops, faces or UVs.
///
/// There is a const parameter, `Subdivided` that indicates whether this mesh
/// has been subdivided. After one refinement step, every face is a quad whose
/// halfedges are stored contiguously, so `next`, `prev` and `face` become
/// analytical expressions of the halfedge index.
#[derive(Debug)]
#[allow(non_upper_case_globals)]
pub struct CompactMesh<const Subdivided: bool> {
    /// Index is either Some(idx) or None. Uses NonMaxU32 to ensure elements are
    /// the same size as `u32`.
    pub twin: Vec<Option<NonMaxU32>>,
    pub next: Vec<u32>,
    pub prev: Vec<u32>,
    pub vert: Vec<u32>,
    pub edge: Vec<u32>,
    pub face: Vec<u32>,
    pub vertex_positions: Vec<Vec3>,
    pub counts: MeshCounts,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshCounts {
    /// The number of vertices
    pub num_vertices: usize,
    /// The number of halfedges. Note that this is not the same as the number of
    /// edges times two, because in a CompactMesh, a boundary edge only has a
    /// single halfedge instead of two.
    pub num_halfedges: usize,
    /// The number of edges.
    pub num_edges: usize,
    /// The number of faces
    pub num_faces: usize,
}

impl MeshCounts {
    /// Returns the mesh counts of a compact halfedge after a single iteration
    /// of subdivision. Applies recurrence relation.
    pub fn subdiv(&self) -> Self {
        let h_0 = self.num_halfedges;
        let v_0 = self.num_vertices;
        let f_0 = self.num_faces;
        let e_0 = self.num_edges;

        MeshCounts {
            num_halfedges: h_0 * 4,
            num_faces: h_0,
            num_vertices: v_0 + f_0 + e_0,
            num_edges: 2 * e_0 + h_0,
        }
    }
}

impl CompactMesh<false> {
    /// Flattens the interior halfedges of `mesh` into index arrays. Vertices
    /// keep their storage order, so a compact mesh maps vertex `i` to the
    /// vertex with dense index `i`.
    #[profiling::function]
    pub fn from_halfedge(mesh: &HalfEdgeMesh) -> Result<CompactMesh<false>, TraversalError> {
        // Create mappings between ids and indices in the compact arrays.
        // slotmap makes no guarantees about the structure of its keys, so
        // there is no way to reuse them directly.

        // --- Halfedge mapping ---

        // Boundary halfedges are skipped: the compact mesh represents a
        // border as a halfedge with no twin.
        let interior_halfedges = mesh
            .iter_halfedges()
            .filter(|(_, h)| !h.is_boundary())
            .map(|(id, _)| id)
            .collect_vec();
        let mut h_id_to_idx =
            SecondaryMap::<HalfEdgeId, u32>::with_capacity(interior_halfedges.len());
        for (idx, &id) in interior_halfedges.iter().enumerate() {
            h_id_to_idx.insert(id, idx as u32);
        }

        // --- Edge, vertex and face mapping ---

        let mut e_id_to_idx = SecondaryMap::<EdgeId, u32>::with_capacity(mesh.num_edges());
        for (idx, (id, _)) in mesh.iter_edges().enumerate() {
            e_id_to_idx.insert(id, idx as u32);
        }

        let mut v_id_to_idx = SecondaryMap::<VertexId, u32>::with_capacity(mesh.num_vertices());
        for (idx, (id, _)) in mesh.iter_vertices().enumerate() {
            v_id_to_idx.insert(id, idx as u32);
        }

        let mut f_id_to_idx = SecondaryMap::<FaceId, u32>::with_capacity(mesh.num_faces());
        for (idx, (id, _)) in mesh.iter_faces().enumerate() {
            f_id_to_idx.insert(id, idx as u32);
        }

        // --- Generate the compact mesh ---

        let num_halfedges = interior_halfedges.len();
        let mut twin = Vec::with_capacity(num_halfedges);
        let mut next = Vec::with_capacity(num_halfedges);
        let mut prev = Vec::with_capacity(num_halfedges);
        let mut vert = Vec::with_capacity(num_halfedges);
        let mut edge = Vec::with_capacity(num_halfedges);
        let mut face = Vec::with_capacity(num_halfedges);

        for &h_id in &interior_halfedges {
            let h = mesh.at_halfedge(h_id);
            let h_twin = h.twin().try_end()?;
            twin.push(h_id_to_idx.get(h_twin).and_then(|&t| NonMaxU32::new(t)));
            next.push(h_id_to_idx[h.next().try_end()?]);
            prev.push(h_id_to_idx[h.prev().try_end()?]);
            vert.push(v_id_to_idx[h.vertex().try_end()?]);
            edge.push(e_id_to_idx[h.edge().try_end()?]);
            face.push(f_id_to_idx[h.face().try_end()?]);
        }

        let vertex_positions = mesh.iter_vertices().map(|(_, v)| v.position).collect();

        Ok(CompactMesh {
            twin,
            next,
            prev,
            vert,
            edge,
            face,
            vertex_positions,
            counts: MeshCounts {
                num_halfedges,
                num_vertices: v_id_to_idx.len(),
                num_faces: f_id_to_idx.len(),
                num_edges: e_id_to_idx.len(),
            },
        })
    }
}

#[allow(non_upper_case_globals)]
impl<const Subdivided: bool> CompactMesh<Subdivided> {
    /// Rebuilds a [`HalfEdgeMesh`] out of this compact mesh. Boundary
    /// halfedges and loops are synthesized again, and the result is densely
    /// indexed.
    #[profiling::function]
    pub fn to_halfedge(&self) -> Result<HalfEdgeMesh, TraversalError> {
        let mut mesh = HalfEdgeMesh::new();

        let mut h_idx_to_id = Vec::with_capacity(self.counts.num_halfedges);
        for _ in 0..self.counts.num_halfedges {
            h_idx_to_id.push(mesh.alloc_halfedge(HalfEdge::default()));
        }

        let mut v_idx_to_id = Vec::with_capacity(self.counts.num_vertices);
        for &position in &self.vertex_positions {
            v_idx_to_id.push(mesh.alloc_vertex(position, None));
        }

        let mut e_idx_to_id = Vec::with_capacity(self.counts.num_edges);
        for _ in 0..self.counts.num_edges {
            e_idx_to_id.push(mesh.alloc_edge(None));
        }

        let mut face_degree = vec![0usize; self.counts.num_faces];
        for h in 0..self.counts.num_halfedges {
            face_degree[self.get_face(h)] += 1;
        }
        let f_idx_to_id = face_degree
            .iter()
            .map(|&degree| mesh.alloc_face(FaceKind::from_degree(degree), None))
            .collect_vec();

        for h in 0..self.counts.num_halfedges {
            let h_id = h_idx_to_id[h];
            let vert_id = v_idx_to_id[self.vert[h] as usize];
            let edge_id = e_idx_to_id[self.edge[h] as usize];
            let face_id = f_idx_to_id[self.get_face(h)];

            mesh[h_id] = HalfEdge {
                // If twin id is none, a twin boundary halfedge will be created
                // later in the `add_boundary_halfedges` call.
                twin: self.twin[h].map(|idx| h_idx_to_id[idx.get() as usize]),
                next: Some(h_idx_to_id[self.get_next(h)]),
                prev: Some(h_idx_to_id[self.get_prev(h)]),
                vertex: Some(vert_id),
                edge: Some(edge_id),
                face: Some(face_id),
                boundary: false,
                index: h as u32,
            };
            mesh[vert_id].halfedge = Some(h_id);
            // The first halfedge of each face and edge becomes its representative
            if mesh[face_id].halfedge.is_none() {
                mesh[face_id].halfedge = Some(h_id);
            }
            if mesh[edge_id].halfedge.is_none() {
                mesh[edge_id].halfedge = Some(h_id);
            }
        }

        // The CompactMesh has no boundary halfedges, so we create them here
        mesh.add_boundary_halfedges()?;
        mesh.reindex();
        Ok(mesh)
    }

    /// Generates the twin pointer for the 4 halfedges spawning from `h` during
    /// subdivision and stores them in `twin[0..4]`.
    fn halfedge_refinement_twin_rule(&self, h: usize, twin: &mut [Option<NonMaxU32>]) {
        twin[0] = self.twin[h]
            .and_then(|twin_h| NonMaxU32::new(4 * self.get_next(twin_h.get() as usize) as u32 + 3));
        twin[1] = NonMaxU32::new(4 * self.get_next(h) as u32 + 2);
        twin[2] = NonMaxU32::new(4 * self.get_prev(h) as u32 + 1);
        twin[3] = self.twin[self.get_prev(h)]
            .and_then(|twin_prev_h| NonMaxU32::new(4 * twin_prev_h.get()));
    }

    /// Generates the vert pointer for the 4 halfedges spawning from `h` during
    /// subdivision and stores them in `vert[0..4]`
    fn halfedge_refinement_vertex_rule(&self, h: usize, vert: &mut [u32]) {
        let v_d = self.counts.num_vertices as u32;
        let f_d = self.counts.num_faces as u32;

        vert[0] = self.vert[h];
        vert[1] = v_d + f_d + self.edge[h];
        vert[2] = v_d + self.get_face(h) as u32;
        vert[3] = v_d + f_d + self.edge[self.get_prev(h)];
    }

    /// Generates the edge pointer for the 4 halfedges spawning from `h` during
    /// subdivision and stores them in `edge[0..4]`
    fn halfedge_refinement_edge_rule(&self, h: usize, edge: &mut [u32]) {
        let e_d = self.counts.num_edges as u32;
        let h_prev = self.get_prev(h);
        let h_gt_twin_h = self.twin[h]
            .map(|twin_h| (h as u32) < twin_h.get())
            .unwrap_or(true);
        let hp_gt_twin_hp = self.twin[h_prev]
            .map(|twin_hp| (h_prev as u32) < twin_hp.get())
            .unwrap_or(true);

        edge[0] = if h_gt_twin_h {
            2 * self.edge[h]
        } else {
            2 * self.edge[h] + 1
        };
        edge[1] = 2 * e_d + h as u32;
        edge[2] = 2 * e_d + h_prev as u32;
        edge[3] = if hp_gt_twin_hp {
            2 * self.edge[h_prev] + 1
        } else {
            2 * self.edge[h_prev]
        };
    }

    /// Returns the next of a given halfedge h. This will use an analytical
    /// expression if the mesh has been subdivided at least once.
    pub fn get_next(&self, h: usize) -> usize {
        if Subdivided {
            if h % 4 == 3 {
                h - 3
            } else {
                h + 1
            }
        } else {
            self.next[h] as usize
        }
    }

    /// Returns the prev of a given halfedge h. This will use an analytical
    /// expression if the mesh has been subdivided at least once.
    pub fn get_prev(&self, h: usize) -> usize {
        if Subdivided {
            if h % 4 == 0 {
                h + 3
            } else {
                h - 1
            }
        } else {
            self.prev[h] as usize
        }
    }

    /// Returns the face of a given halfedge h. This will use an analytical
    /// expression if the mesh has been subdivided at least once.
    pub fn get_face(&self, h: usize) -> usize {
        if Subdivided {
            h / 4
        } else {
            self.face[h] as usize
        }
    }

    /// One step of Catmull-Clark subdivision. See "A HalfEdge Refinement Rule
    /// for Parallel Catmull-Clark"
    /// https://onrendering.com/data/papers/catmark/HalfedgeCatmullClark.pdf
    ///
    /// Boundary edges get their midpoint as edge point, and boundary vertices
    /// move to `(m1 + m2 + 2 * S) / 4`, where `m1` and `m2` are the midpoints
    /// of their two boundary edges.
    #[profiling::function]
    pub fn subdivide(&self) -> CompactMesh<true> {
        use rayon::prelude::*;

        // Compute the counts for the new mesh
        let new_counts = self.counts.subdiv();

        // After subdivision, we have 4 times as many halfedges, exactly.
        let mut new_twin: Vec<Option<NonMaxU32>> = vec![None; new_counts.num_halfedges];
        let mut new_vert = vec![0u32; new_counts.num_halfedges];
        let mut new_edge = vec![0u32; new_counts.num_halfedges];

        // NOTE: We partition the mutable space in the vector into 4-element
        // windows. Window `h` corresponds to halfedges 4h+0..4h+3, using the
        // paper nomenclature
        (
            new_twin.par_chunks_mut(4),
            new_vert.par_chunks_mut(4),
            new_edge.par_chunks_mut(4),
        )
            .into_par_iter()
            .enumerate()
            .for_each(|(h, (twin, vert, edge))| {
                self.halfedge_refinement_twin_rule(h, twin);
                self.halfedge_refinement_vertex_rule(h, vert);
                self.halfedge_refinement_edge_rule(h, edge);
            });

        // The threads need shared access to the positions, so we have to put
        // them in a vector of atomic floats
        // SAFETY: Vec3 and AtomicVec3 have the exact same memory layout
        let new_vertex_positions =
            unsafe { transmute_vec::<Vec3, AtomicVec3>(vec![Vec3::ZERO; new_counts.num_vertices]) };

        // If the mesh is subdivided, the cycle length is 4
        let mut cycle_lengths = Vec::new();
        if !Subdivided {
            (0..self.counts.num_halfedges)
                .into_par_iter()
                .map(|h| {
                    let mut cycle_len = 1;
                    let mut hh = self.get_next(h);
                    while hh != h {
                        cycle_len += 1;
                        hh = self.get_next(hh);
                        if cycle_len > MAX_LOOP_ITERATIONS {
                            break;
                        }
                    }
                    cycle_len as u32
                })
                .collect_into_vec(&mut cycle_lengths);
        }
        let get_cycle_length = move |h: usize| {
            if Subdivided {
                4
            } else {
                cycle_lengths[h]
            }
        };

        // None when the source vertex of `h` lies on the border.
        let mut valences = Vec::new();
        (0..self.counts.num_halfedges)
            .into_par_iter()
            .map(|h| {
                let mut valence = 1;
                let mut hh = self.get_next(self.twin[h]?.get() as usize);
                while hh != h {
                    valence += 1;
                    hh = self.get_next(self.twin[hh]?.get() as usize);
                    if valence > MAX_LOOP_ITERATIONS {
                        break;
                    }
                }
                NonMaxU32::new(valence as u32)
            })
            .collect_into_vec(&mut valences);

        // --- Face points ---
        (0..self.counts.num_halfedges)
            .into_par_iter()
            .for_each(|h| {
                let m = get_cycle_length(h) as f32;
                let v = self.vert[h] as usize;
                let i = self.counts.num_vertices + self.get_face(h);
                new_vertex_positions[i].fetch_add(
                    self.vertex_positions[v] / m,
                    // NOTE: Relaxed ordering should be okay here. We only care
                    // that this is incremented exactly once per halfedge in the
                    // face, not the order in which threads do it.
                    Ordering::Relaxed,
                );
            });

        // --- Smooth edge points ---
        (0..self.counts.num_halfedges)
            .into_par_iter()
            .for_each(|h| {
                let v = self.vert[h] as usize;
                let i = self.counts.num_vertices + self.get_face(h);
                let j = self.counts.num_vertices + self.counts.num_faces + self.edge[h] as usize;

                if self.twin[h].is_some() {
                    // NOTE: The vertices in `i` are not being written in this
                    // loop, so the load() does not read a changing value.
                    let inc = (self.vertex_positions[v]
                        + new_vertex_positions[i].load(Ordering::Relaxed))
                        / 4.0;
                    new_vertex_positions[j].fetch_add(inc, Ordering::Relaxed)
                } else {
                    let v_end = self.vert[self.get_next(h)] as usize;
                    let midpoint = (self.vertex_positions[v] + self.vertex_positions[v_end]) / 2.0;
                    new_vertex_positions[j].store(midpoint, Ordering::Relaxed)
                }
            });

        // --- Smooth vertex points ---
        (0..self.counts.num_halfedges)
            .into_par_iter()
            .for_each(|h| {
                let v = self.vert[h] as usize;
                if let Some(valence) = valences[h] {
                    let n = valence.get() as f32;
                    let i = self.counts.num_vertices + self.get_face(h);
                    let j =
                        self.counts.num_vertices + self.counts.num_faces + self.edge[h] as usize;

                    let inc = (4.0 * new_vertex_positions[j].load(Ordering::Relaxed)
                        - new_vertex_positions[i].load(Ordering::Relaxed)
                        + (n - 3.0) * self.vertex_positions[v])
                        / (n * n);

                    new_vertex_positions[v].fetch_add(inc, Ordering::Relaxed);
                }
            });

        // --- Boundary vertex points ---
        // Each border vertex has exactly one outgoing and one incoming twinless
        // halfedge, so it receives two quarter contributions.
        (0..self.counts.num_halfedges)
            .into_par_iter()
            .filter(|&h| self.twin[h].is_none())
            .for_each(|h| {
                let v = self.vert[h] as usize;
                let w = self.vert[self.get_next(h)] as usize;
                let midpoint = (self.vertex_positions[v] + self.vertex_positions[w]) / 2.0;
                new_vertex_positions[v].fetch_add(
                    (self.vertex_positions[v] + midpoint) / 4.0,
                    Ordering::Relaxed,
                );
                new_vertex_positions[w].fetch_add(
                    (self.vertex_positions[w] + midpoint) / 4.0,
                    Ordering::Relaxed,
                );
            });

        // SAFETY: Same as above, Vec3 and AtomicVec3 have the same memory layout
        let new_vertex_positions =
            unsafe { transmute_vec::<AtomicVec3, Vec3>(new_vertex_positions) };

        CompactMesh {
            twin: new_twin,
            // NOTE: Empty vecs represent analytically computed properties
            prev: vec![],
            next: vec![],
            vert: new_vert,
            edge: new_edge,
            face: vec![],
            vertex_positions: new_vertex_positions,
            counts: new_counts,
        }
    }

    /// Applies `iterations` steps of subdivision. Returns `None` when
    /// `iterations` is zero, since there is no subdivided mesh to return.
    #[profiling::function]
    pub fn subdivide_multi(&self, iterations: usize) -> Option<CompactMesh<true>> {
        if iterations == 0 {
            return None;
        }
        let mut mesh = self.subdivide();
        for _ in 1..iterations {
            mesh = mesh.subdivide();
        }
        Some(mesh)
    }
}

/// A counterpart to `glam::Vec3` with atomics in its `x`, `y`, `z` fields.
#[repr(C)]
struct AtomicVec3 {
    pub x: AtomicF32,
    pub y: AtomicF32,
    pub z: AtomicF32,
}

impl AtomicVec3 {
    /// Calls `fetch_add` on each of the inner atomic values internally. Note
    /// that there is one atomic operation per dimension.
    pub fn fetch_add(&self, v: Vec3, order: Ordering) {
        self.x.fetch_add(v.x, order);
        self.y.fetch_add(v.y, order);
        self.z.fetch_add(v.z, order);
    }

    /// Calls `store` on each of the inner atomic values internally. Note
    /// that there is one atomic operation per dimension.
    pub fn store(&self, v: Vec3, order: Ordering) {
        self.x.store(v.x, order);
        self.y.store(v.y, order);
        self.z.store(v.z, order);
    }

    pub fn load(&self, order: Ordering) -> Vec3 {
        Vec3::new(self.x.load(order), self.y.load(order), self.z.load(order))
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    fn scan_counts(initial: MeshCounts) -> Vec<MeshCounts> {
        (0..3)
            .scan(initial, |acc, _| {
                *acc = acc.subdiv();
                Some(*acc)
            })
            .collect()
    }

    #[test]
    pub fn mesh_counts_test() {
        // A cube, after successive levels of subdivision
        let cube_counts = MeshCounts {
            num_vertices: 8,
            num_halfedges: 24,
            num_edges: 12,
            num_faces: 6,
        };
        assert_eq!(
            scan_counts(cube_counts),
            &[
                MeshCounts {
                    num_vertices: 26,
                    num_halfedges: 96,
                    num_edges: 48,
                    num_faces: 24,
                },
                MeshCounts {
                    num_vertices: 98,
                    num_halfedges: 384,
                    num_edges: 192,
                    num_faces: 96,
                },
                MeshCounts {
                    num_vertices: 386,
                    num_halfedges: 1536,
                    num_edges: 768,
                    num_faces: 384,
                },
            ]
        );

        // A single quad. Unlike the cube, all its edges are on the border.
        let quad_counts = MeshCounts {
            num_vertices: 4,
            num_halfedges: 4,
            num_edges: 4,
            num_faces: 1,
        };
        assert_eq!(
            scan_counts(quad_counts),
            &[
                MeshCounts {
                    num_vertices: 9,
                    num_halfedges: 16,
                    num_edges: 12,
                    num_faces: 4,
                },
                MeshCounts {
                    num_vertices: 25,
                    num_halfedges: 64,
                    num_edges: 40,
                    num_faces: 16,
                },
                MeshCounts {
                    num_vertices: 81,
                    num_halfedges: 256,
                    num_edges: 144,
                    num_faces: 64,
                },
            ]
        );
    }

    #[test]
    pub fn round_trip_keeps_connectivity() {
        let mesh = primitives::Grid::build_quads(2, 2, 1.0);
        let compact = CompactMesh::<false>::from_halfedge(&mesh).unwrap();
        assert_eq!(
            compact.counts,
            MeshCounts {
                num_vertices: 9,
                num_halfedges: 16,
                num_edges: 12,
                num_faces: 4,
            }
        );
        assert_eq!(compact.twin.iter().filter(|t| t.is_none()).count(), 8);

        let rebuilt = compact.to_halfedge().unwrap();
        rebuilt.validate().unwrap();
        assert_eq!(
            rebuilt.to_polygons().unwrap(),
            mesh.to_polygons().unwrap()
        );
    }

    #[test]
    pub fn subdivided_quad_keeps_its_border() {
        let mesh = primitives::Quad::build(Vec3::ZERO, Vec3::Z, Vec3::X, Vec2::ONE);
        let compact = CompactMesh::<false>::from_halfedge(&mesh).unwrap();
        let subdivided = compact.subdivide();

        // Corners have a single boundary edge on each side, and both midpoints
        // lie on the border, so the corner is pulled inwards along it.
        let corner = mesh.vertex_position(mesh.iter_vertices().next().unwrap().0);
        let moved = subdivided.vertex_positions[0];
        assert!(moved.abs_diff_eq(corner * 0.75, 1e-6));

        // Face point at the center, edge points at the midpoints.
        assert!(subdivided.vertex_positions[4].abs_diff_eq(Vec3::ZERO, 1e-6));
        for edge_point in &subdivided.vertex_positions[5..] {
            assert!((edge_point.length() - 0.5).abs() < 1e-6);
        }

        let rebuilt = subdivided.to_halfedge().unwrap();
        rebuilt.validate().unwrap();
        assert_eq!(rebuilt.num_faces(), 4);
        assert_eq!(rebuilt.num_boundary_loops(), 1);
    }
}
