// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use float_ord::FloatOrd;
use glam::DMat3;
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

use super::edit_ops;
use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimplificationOptions {
    /// Fraction of the faces to remove, in `[0, 1]`.
    pub reduce_ratio: f64,
}

impl Default for SimplificationOptions {
    fn default() -> Self {
        Self { reduce_ratio: 0.5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplificationReport {
    pub collapses: usize,
    pub faces_before: usize,
    pub faces_after: usize,
    /// False when the queue ran out of valid collapses first.
    pub reached_target: bool,
}

/// A symmetric 4x4 matrix measuring the sum of squared distances to a set of
/// planes. Only the upper triangle is stored:
///
/// ```text
/// | 0 1 2 3 |
/// | . 4 5 6 |
/// | . . 7 8 |
/// | . . . 9 |
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Quadric([f64; 10]);

impl Quadric {
    /// The quadric of the plane `n·x + d = 0`, with `n` of unit length.
    fn from_plane(n: DVec3, d: f64) -> Self {
        let (a, b, c) = (n.x, n.y, n.z);
        Quadric([
            a * a,
            a * b,
            a * c,
            a * d,
            b * b,
            b * c,
            b * d,
            c * c,
            c * d,
            d * d,
        ])
    }

    fn evaluate(&self, p: DVec3) -> f64 {
        let q = &self.0;
        let (x, y, z) = (p.x, p.y, p.z);
        q[0] * x * x
            + 2.0 * q[1] * x * y
            + 2.0 * q[2] * x * z
            + 2.0 * q[3] * x
            + q[4] * y * y
            + 2.0 * q[5] * y * z
            + 2.0 * q[6] * y
            + q[7] * z * z
            + 2.0 * q[8] * z
            + q[9]
    }

    /// The point where the quadric is minimal. None when the 3x3 minor is
    /// singular, i.e. the planes do not pin down a single point.
    fn minimizer(&self) -> Option<DVec3> {
        let q = &self.0;
        let a = DMat3::from_cols(
            DVec3::new(q[0], q[1], q[2]),
            DVec3::new(q[1], q[4], q[5]),
            DVec3::new(q[2], q[5], q[7]),
        );
        if a.determinant().abs() < 1e-10 {
            return None;
        }
        Some(a.inverse() * -DVec3::new(q[3], q[6], q[8]))
    }
}

impl std::ops::Add for Quadric {
    type Output = Quadric;

    fn add(mut self, rhs: Quadric) -> Quadric {
        self += rhs;
        self
    }
}

impl std::ops::AddAssign for Quadric {
    fn add_assign(&mut self, rhs: Quadric) {
        for (a, b) in self.0.iter_mut().zip(rhs.0) {
            *a += b;
        }
    }
}

/// A queued edge collapse. Entries are never updated in place: when any of
/// the two endpoints changes, its version is bumped and the entry is dropped
/// when popped.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    cost: FloatOrd<f64>,
    sequence: u64,
    edge: EdgeId,
    endpoints: [(VertexId, u32); 2],
    target: Vec3,
}

impl Candidate {
    /// The queue pops the cheapest candidate first, and among equal costs,
    /// the one pushed first.
    fn key(&self) -> Reverse<(FloatOrd<f64>, u64)> {
        Reverse((self.cost, self.sequence))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

struct Simplifier<'a> {
    mesh: &'a mut HalfEdgeMesh,
    quadrics: SecondaryMap<VertexId, Quadric>,
    versions: SecondaryMap<VertexId, u32>,
    queue: BinaryHeap<Candidate>,
    sequence: u64,
}

impl<'a> Simplifier<'a> {
    fn new(mesh: &'a mut HalfEdgeMesh) -> Result<Self, TraversalError> {
        let mut quadrics = SecondaryMap::<VertexId, Quadric>::new();
        let mut versions = SecondaryMap::<VertexId, u32>::new();
        for (v, _) in mesh.iter_vertices() {
            quadrics.insert(v, Quadric::default());
            versions.insert(v, 0);
        }

        let faces = mesh.iter_faces().map(|(f, _)| f).collect_vec();
        for f in faces {
            let normal = mesh.face_normal(f)?.as_dvec3();
            let point = mesh.face_midpoint(f)?.as_dvec3();
            let quadric = Quadric::from_plane(normal, -normal.dot(point));
            for v in mesh.face_vertices(f)? {
                quadrics[v] += quadric;
            }
        }

        Ok(Self {
            mesh,
            quadrics,
            versions,
            queue: BinaryHeap::new(),
            sequence: 0,
        })
    }

    /// Queues the collapse of `e`, unless any of its endpoints is on a
    /// boundary.
    fn push(&mut self, e: EdgeId) -> Result<(), TraversalError> {
        let (a, b) = self.mesh.edge_endpoints(e)?;
        if self.mesh.at_vertex(a).is_on_boundary()? || self.mesh.at_vertex(b).is_on_boundary()? {
            return Ok(());
        }

        let quadric = self.quadrics[a] + self.quadrics[b];
        let target = match quadric.minimizer() {
            Some(p) => p,
            None => self.mesh.edge_midpoint(e)?.as_dvec3(),
        };
        let cost = quadric.evaluate(target).max(0.0);

        self.queue.push(Candidate {
            cost: FloatOrd(cost),
            sequence: self.sequence,
            edge: e,
            endpoints: [(a, self.versions[a]), (b, self.versions[b])],
            target: target.as_vec3(),
        });
        self.sequence += 1;
        Ok(())
    }

    /// Whether the mesh changed around `candidate` since it was queued.
    fn is_stale(&self, candidate: &Candidate) -> Result<bool, TraversalError> {
        if self.mesh.edge(candidate.edge).is_none() {
            return Ok(true);
        }
        for (v, version) in candidate.endpoints {
            if self.versions.get(v) != Some(&version) {
                return Ok(true);
            }
        }
        let (a, b) = self.mesh.edge_endpoints(candidate.edge)?;
        let [(c0, _), (c1, _)] = candidate.endpoints;
        Ok(!((a, b) == (c0, c1) || (a, b) == (c1, c0)))
    }

    /// Collapses `candidate`, merging the quadric of the removed vertex into
    /// the kept one. Returns the number of faces removed, or None when the
    /// collapse was rejected.
    fn collapse(&mut self, candidate: &Candidate) -> Result<Option<usize>, MeshError> {
        let [(a, _), (b, _)] = candidate.endpoints;
        let faces_before = self.mesh.num_faces();
        let kept = match edit_ops::collapse_edge(self.mesh, candidate.edge, candidate.target) {
            Ok(v) => v,
            Err(OperatorError::InvalidOperation(_)) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let removed = if kept == a { b } else { a };

        let merged = self.quadrics[a] + self.quadrics[b];
        self.quadrics[kept] = merged;
        self.quadrics.remove(removed);
        self.versions.remove(removed);
        self.versions[kept] += 1;

        let edges = self
            .mesh
            .at_vertex(kept)
            .outgoing_halfedges()
            .map_err(InvariantViolation::from)?
            .iter()
            .map(|&h| self.mesh.at_halfedge(h).edge().try_end())
            .collect::<Result<SVec<_>, _>>()
            .map_err(InvariantViolation::from)?;
        for e in edges {
            self.push(e).map_err(InvariantViolation::from)?;
        }

        Ok(Some(faces_before - self.mesh.num_faces()))
    }
}

/// Reduces the face count of `mesh` by repeatedly collapsing the interior
/// edge whose collapse adds the least quadric error.
///
/// Stops when `floor(num_faces * reduce_ratio)` faces have been removed, or
/// when no interior edge can be collapsed any longer. Collapses are applied
/// one at a time, so stopping early leaves a valid mesh. The mesh is
/// reindexed and validated before returning.
#[profiling::function]
pub fn simplify(
    mesh: &mut HalfEdgeMesh,
    options: &SimplificationOptions,
) -> Result<SimplificationReport, MeshError> {
    if !(0.0..=1.0).contains(&options.reduce_ratio) {
        return Err(SolverError::UnsupportedOption(format!(
            "reduce ratio must be within [0, 1], got {}",
            options.reduce_ratio
        ))
        .into());
    }

    let faces_before = mesh.num_faces();
    let faces_to_remove = (faces_before as f64 * options.reduce_ratio).floor() as usize;
    log::debug!("Simplifying mesh with {faces_before} faces, removing {faces_to_remove}");

    let mut collapses = 0;
    let mut removed = 0;
    if faces_to_remove > 0 {
        let mut simplifier = Simplifier::new(mesh).map_err(InvariantViolation::from)?;
        let edges = simplifier.mesh.iter_edges().map(|(e, _)| e).collect_vec();
        for e in edges {
            simplifier.push(e).map_err(InvariantViolation::from)?;
        }

        while removed < faces_to_remove {
            let Some(candidate) = simplifier.queue.pop() else {
                break;
            };
            if simplifier
                .is_stale(&candidate)
                .map_err(InvariantViolation::from)?
            {
                log::trace!("Skipping stale collapse of {:?}", candidate.edge);
                continue;
            }
            if let Some(faces) = simplifier.collapse(&candidate)? {
                collapses += 1;
                removed += faces;
            }
        }
    }

    mesh.reindex();
    mesh.validate()?;

    let reached_target = removed >= faces_to_remove;
    if !reached_target {
        log::warn!(
            "Simplification stopped after removing {removed} of {faces_to_remove} faces: \
             no collapsible edge left"
        );
    }
    let report = SimplificationReport {
        collapses,
        faces_before,
        faces_after: mesh.num_faces(),
        reached_target,
    };
    log::debug!("Simplification finished: {report:?}");
    Ok(report)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn quadric_minimizer() {
        let q = Quadric::from_plane(DVec3::X, -1.0)
            + Quadric::from_plane(DVec3::Y, -2.0)
            + Quadric::from_plane(DVec3::Z, 0.5);
        let p = q.minimizer().unwrap();
        assert!(p.abs_diff_eq(DVec3::new(1.0, 2.0, -0.5), 1e-9));
        assert!(q.evaluate(p).abs() < 1e-9);
        assert!((q.evaluate(DVec3::new(2.0, 2.0, -0.5)) - 1.0).abs() < 1e-9);

        // Parallel planes leave a whole plane of minimizers
        let q = Quadric::from_plane(DVec3::Z, 0.0) + Quadric::from_plane(DVec3::Z, -1.0);
        assert!(q.minimizer().is_none());
    }

    #[test]
    fn zero_ratio_does_nothing() {
        let mut mesh = primitives::UVSphere::build_triangulated(Vec3::ZERO, 12, 8, 1.0);
        let before = mesh.to_polygons().unwrap();
        let report = simplify(&mut mesh, &SimplificationOptions { reduce_ratio: 0.0 }).unwrap();
        assert_eq!(report.collapses, 0);
        assert!(report.reached_target);
        assert_eq!(report.faces_before, report.faces_after);
        assert_eq!(mesh.to_polygons().unwrap(), before);
    }

    #[test]
    fn halve_a_sphere() {
        let mut mesh = primitives::UVSphere::build_triangulated(Vec3::ZERO, 16, 12, 1.0);
        let faces = mesh.num_faces();
        let report = simplify(&mut mesh, &SimplificationOptions::default()).unwrap();

        assert!(report.reached_target);
        assert_eq!(report.faces_before, faces);
        assert_eq!(report.faces_after, mesh.num_faces());
        assert!(mesh.num_faces() <= faces - faces / 2);
        assert!(mesh.is_compact());
        // Closed triangle meshes lose two faces per collapse
        assert_eq!(report.faces_before - report.faces_after, 2 * report.collapses);
        assert_eq!(
            mesh.num_vertices() as i64 - mesh.num_edges() as i64 + mesh.num_faces() as i64,
            2
        );
        // Vertices stay close to the sphere
        for (_, v) in mesh.iter_vertices() {
            assert!((v.position().length() - 1.0).abs() < 0.25);
        }
    }

    #[test]
    fn full_ratio_collapses_until_stuck() {
        let mut mesh = primitives::UVSphere::build_triangulated(Vec3::ZERO, 10, 8, 1.0);
        let report = simplify(&mut mesh, &SimplificationOptions { reduce_ratio: 1.0 }).unwrap();
        assert!(!report.reached_target);
        assert!(report.collapses > 0);
        assert!(mesh.num_faces() >= 4);
        mesh.validate().unwrap();
    }

    #[test]
    fn planar_grid_stays_planar() {
        let mut mesh = primitives::Grid::build_tris(6, 6, 1.0);
        let boundary_before = mesh.boundary_loop_halfedges(0).unwrap().len();
        let report = simplify(&mut mesh, &SimplificationOptions { reduce_ratio: 0.3 }).unwrap();
        assert!(report.collapses > 0);
        for (_, v) in mesh.iter_vertices() {
            let p = v.position();
            assert!(p.z.abs() < 1e-5);
            assert!(p.x >= -1e-5 && p.x <= 6.0 + 1e-5);
            assert!(p.y >= -1e-5 && p.y <= 6.0 + 1e-5);
        }
        // Only interior edges are collapsed
        assert_eq!(
            mesh.boundary_loop_halfedges(0).unwrap().len(),
            boundary_before
        );
    }

    #[test]
    fn rejects_invalid_ratio() {
        let mut mesh = primitives::Tetrahedron::build();
        let err = simplify(&mut mesh, &SimplificationOptions { reduce_ratio: 1.5 }).unwrap_err();
        assert!(matches!(
            err,
            MeshError::Solver(SolverError::UnsupportedOption(_))
        ));
    }
}
