// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;

macro_rules! ensure {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(InvariantViolation(format!($($arg)*)));
        }
    };
}

fn traversal(err: TraversalError) -> InvariantViolation {
    InvariantViolation(format!("traversal failed: {err}"))
}

/// Checks that the dense indices of an arena are a permutation of 0..n
fn check_dense(name: &str, indices: impl Iterator<Item = u32>, n: usize) -> Result<(), InvariantViolation> {
    let mut seen = vec![false; n];
    for i in indices {
        ensure!((i as usize) < n, "{name} index {i} out of range 0..{n}");
        ensure!(!seen[i as usize], "{name} index {i} assigned twice");
        seen[i as usize] = true;
    }
    Ok(())
}

impl HalfEdgeMesh {
    /// Checks every structural invariant of the halfedge graph, returning the
    /// first violation found. Dense indices are only checked when the mesh is
    /// compact.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let mut outgoing_count = HashMap::<VertexId, usize>::new();
        let mut edge_incidence = HashMap::<EdgeId, usize>::new();

        for (h, halfedge) in self.iter_halfedges() {
            let twin = halfedge.twin.ok_or_else(|| InvariantViolation(format!("{h:?} has no twin")))?;
            let next = halfedge.next.ok_or_else(|| InvariantViolation(format!("{h:?} has no next")))?;
            let prev = halfedge.prev.ok_or_else(|| InvariantViolation(format!("{h:?} has no prev")))?;
            let vertex = halfedge
                .vertex
                .ok_or_else(|| InvariantViolation(format!("{h:?} has no vertex")))?;
            let edge = halfedge.edge.ok_or_else(|| InvariantViolation(format!("{h:?} has no edge")))?;
            let face = halfedge.face.ok_or_else(|| InvariantViolation(format!("{h:?} has no face")))?;

            ensure!(self.halfedge(twin).is_some(), "twin of {h:?} was deleted");
            ensure!(self.halfedge(next).is_some(), "next of {h:?} was deleted");
            ensure!(self.halfedge(prev).is_some(), "prev of {h:?} was deleted");
            ensure!(self.vertex(vertex).is_some(), "vertex of {h:?} was deleted");
            ensure!(self.edge(edge).is_some(), "edge of {h:?} was deleted");
            ensure!(self.face(face).is_some(), "face of {h:?} was deleted");

            ensure!(twin != h, "{h:?} is its own twin");
            ensure!(self[twin].twin == Some(h), "twin(twin({h:?})) != {h:?}");
            ensure!(self[next].prev == Some(h), "prev(next({h:?})) != {h:?}");
            ensure!(self[prev].next == Some(h), "next(prev({h:?})) != {h:?}");
            ensure!(self[twin].edge == Some(edge), "{h:?} and its twin disagree on the edge");
            ensure!(
                self[twin].vertex == self[next].vertex,
                "destination of {h:?} differs from the origin of its next"
            );
            ensure!(
                halfedge.boundary == self[face].is_boundary(),
                "boundary flag of {h:?} disagrees with its face"
            );
            ensure!(
                !(halfedge.boundary && self[twin].boundary),
                "{h:?} and its twin are both boundary halfedges"
            );

            *outgoing_count.entry(vertex).or_insert(0) += 1;
            *edge_incidence.entry(edge).or_insert(0) += 1;
        }

        let mut endpoints = HashSet::<(VertexId, VertexId)>::new();
        for (e, edge) in self.iter_edges() {
            let h = edge.halfedge.ok_or_else(|| InvariantViolation(format!("{e:?} has no halfedge")))?;
            ensure!(self.halfedge(h).is_some(), "halfedge of {e:?} was deleted");
            ensure!(self[h].edge == Some(e), "representative of {e:?} points to another edge");
            ensure!(
                edge_incidence.get(&e).copied() == Some(2),
                "{e:?} is referenced by {} halfedges",
                edge_incidence.get(&e).copied().unwrap_or(0)
            );
            let (a, b) = self.at_halfedge(h).src_dst_pair().map_err(traversal)?;
            ensure!(a != b, "{e:?} is a loop on {a:?}");
            ensure!(
                endpoints.insert((a.min(b), a.max(b))),
                "two edges connect {a:?} and {b:?}"
            );
        }

        for (f, face) in self.faces.iter() {
            let h0 = face.halfedge.ok_or_else(|| InvariantViolation(format!("{f:?} has no halfedge")))?;
            ensure!(self.halfedge(h0).is_some(), "halfedge of {f:?} was deleted");
            let cycle = self.face_halfedges(f).map_err(traversal)?;
            ensure!(
                cycle.iter().all(|&h| self[h].face == Some(f)),
                "the cycle of {f:?} contains halfedges of another face"
            );
            let vertices = cycle.iter().map(|&h| self[h].vertex).collect::<HashSet<_>>();
            ensure!(
                vertices.len() == cycle.len(),
                "the cycle of {f:?} visits {} halfedges but {} distinct vertices",
                cycle.len(),
                vertices.len()
            );
            if face.is_boundary() {
                ensure!(self.boundary_loops.contains(&f), "{f:?} is not a registered boundary loop");
            } else {
                ensure!(cycle.len() >= 3, "{f:?} has fewer than three sides");
                ensure!(
                    face.kind == FaceKind::from_degree(cycle.len()),
                    "{f:?} is flagged {:?} but has {} sides",
                    face.kind,
                    cycle.len()
                );
            }
        }
        for &b in self.boundary_loops.iter() {
            ensure!(
                self.face(b).map(|f| f.is_boundary()).unwrap_or(false),
                "boundary loop {b:?} is not a live boundary face"
            );
        }

        for (v, vertex) in self.iter_vertices() {
            let h = vertex.halfedge.ok_or_else(|| InvariantViolation(format!("{v:?} is isolated")))?;
            ensure!(self.halfedge(h).is_some(), "halfedge of {v:?} was deleted");
            ensure!(self[h].vertex == Some(v), "representative of {v:?} does not start at it");
            // Every halfedge leaving the vertex must be reachable from its
            // representative, otherwise the vertex is not a single fan.
            let fan = self.at_vertex(v).outgoing_halfedges().map_err(traversal)?;
            ensure!(
                Some(&fan.len()) == outgoing_count.get(&v),
                "{v:?} is not a single polygon fan"
            );
        }

        if self.is_compact() {
            check_dense("vertex", self.vertices.values().map(|v| v.index), self.num_vertices())?;
            check_dense("edge", self.edges.values().map(|e| e.index), self.num_edges())?;
            check_dense(
                "halfedge",
                self.halfedges.values().map(|h| h.index),
                self.num_halfedges(),
            )?;
            check_dense(
                "face",
                self.iter_faces().map(|(_, f)| f.index),
                self.num_faces(),
            )?;
            check_dense(
                "boundary loop",
                self.boundary_loops.iter().map(|&b| self[b].index),
                self.num_boundary_loops(),
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn primitives_are_valid() {
        primitives::Box::build(Vec3::ZERO, Vec3::ONE).validate().unwrap();
        primitives::Quad::build(Vec3::ZERO, Vec3::Y, Vec3::X, Vec2::ONE)
            .validate()
            .unwrap();
        primitives::Grid::build_quads(4, 3, 1.0).validate().unwrap();
        primitives::DiskFan::build(Vec3::ZERO, 0.5, 8).validate().unwrap();
        primitives::Tetrahedron::build().validate().unwrap();
        primitives::UVSphere::build(Vec3::ZERO, 6, 8, 1.0).validate().unwrap();
        primitives::UVSphere::build_triangulated(Vec3::ZERO, 6, 8, 1.0)
            .validate()
            .unwrap();
    }

    #[test]
    fn face_cycles_match_vertex_counts() {
        let mesh = primitives::UVSphere::build(Vec3::ZERO, 5, 7, 1.0);
        for (f, face) in mesh.iter_faces() {
            let expected = match face.kind() {
                FaceKind::Triangle => 3,
                FaceKind::Quad => 4,
                _ => unreachable!(),
            };
            let h0 = face.halfedge().unwrap();
            let mut h = h0;
            let mut steps = 0;
            loop {
                h = mesh.at_halfedge(h).next().end();
                steps += 1;
                if h == h0 {
                    break;
                }
            }
            assert_eq!(steps, expected);
            assert_eq!(mesh.face_vertices(f).unwrap().len(), expected);
        }
    }

    #[test]
    fn twin_next_prev_identities() {
        let mesh = primitives::Grid::build_tris(3, 2, 1.0);
        for (h, _) in mesh.iter_halfedges() {
            let t = mesh.at_halfedge(h);
            assert_eq!(t.twin().twin().end(), h);
            assert_eq!(t.next().prev().end(), h);
            assert_eq!(t.prev().next().end(), h);
        }
    }

    #[test]
    fn detects_broken_links() {
        let mut mesh = primitives::Tetrahedron::build();
        let (h, _) = mesh.iter_halfedges().next().unwrap();
        let next = mesh[h].next.unwrap();
        mesh[next].prev = None;
        assert!(mesh.validate().is_err());
    }
}
