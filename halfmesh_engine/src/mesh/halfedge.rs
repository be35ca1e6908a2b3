// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::prelude::*;

use glam::*;
use slotmap::SlotMap;

/// Implements indexing traits so the mesh data structure can be used to access
/// vertex, edge, face or halfedge information using ids as indices.
pub mod mesh_index_impls;

/// Type-safe wrappers over the internal allocator indices used as pointers
pub mod id_types;
pub use id_types::*;

/// An API to represent type-safe and error-handled graph traversals over a mesh
pub mod traversals;
pub use traversals::*;

/// Building a mesh out of a list of positions and polygons
pub mod builder;

/// Local topology operators: edge flip, edge split and edge collapse
pub mod edit_ops;

/// Per-element differential quantities: angles, normals, areas
pub mod geometry;
pub use geometry::VertexNormalWeight;

/// Dense re-indexing of mesh elements after removals
pub mod reindex;

/// Structural invariant checks
pub mod validation;

/// A compact halfedge graph specifically optimized for some operations
pub mod compact_mesh;

/// Catmull-Clark subdivision
pub mod subdivision;
pub use subdivision::SubdivisionOptions;

/// Harmonic (Tutte) parameterization of disk-like meshes
pub mod parameterization;
pub use parameterization::{BoundaryShape, LaplacianWeight, ParameterizationOptions};

/// Quadric error metric simplification
pub mod simplification;
pub use simplification::{SimplificationOptions, SimplificationReport};

/// Summary counts over a mesh
pub mod statistics;
pub use statistics::MeshStatistics;

/// Primitive shapes, like boxes or spheres
pub mod primitives;

/// HalfEdge meshes are a type of linked list. This means it is sometimes
/// impossible to ensure some algorithms will terminate when the mesh is
/// malformed. To ensure the code never goes into an infinite loop, this max
/// number of iterations will be performed before giving an error. This error
/// should be large enough, as faces with a very large number of vertices may
/// trigger it.
pub const MAX_LOOP_ITERATIONS: usize = 8196;

#[derive(Debug, Default, Clone)]
pub struct HalfEdge {
    twin: Option<HalfEdgeId>,
    next: Option<HalfEdgeId>,
    prev: Option<HalfEdgeId>,
    vertex: Option<VertexId>,
    edge: Option<EdgeId>,
    /// For boundary halfedges, this is the boundary loop they belong to.
    face: Option<FaceId>,
    boundary: bool,
    index: u32,
}

#[derive(Debug, Clone)]
pub struct Vertex {
    halfedge: Option<HalfEdgeId>,
    position: Vec3,
    uv: Option<Vec2>,
    index: u32,
}

#[derive(Debug, Clone)]
pub struct Edge {
    halfedge: Option<HalfEdgeId>,
    index: u32,
}

/// The shape of a face. Boundary loops are stored as faces too, so that
/// every halfedge has a face it circulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceKind {
    Triangle,
    Quad,
    Polygon,
    BoundaryLoop,
}

impl FaceKind {
    pub fn from_degree(degree: usize) -> Self {
        match degree {
            3 => FaceKind::Triangle,
            4 => FaceKind::Quad,
            _ => FaceKind::Polygon,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Face {
    halfedge: Option<HalfEdgeId>,
    kind: FaceKind,
    index: u32,
}

impl HalfEdge {
    /// Dense index of this halfedge. Only meaningful when the mesh is compact.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn is_boundary(&self) -> bool {
        self.boundary
    }
}

impl Vertex {
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn uv(&self) -> Option<Vec2> {
        self.uv
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn halfedge(&self) -> Option<HalfEdgeId> {
        self.halfedge
    }
}

impl Edge {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn halfedge(&self) -> Option<HalfEdgeId> {
        self.halfedge
    }
}

impl Face {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn kind(&self) -> FaceKind {
        self.kind
    }

    pub fn is_boundary(&self) -> bool {
        self.kind == FaceKind::BoundaryLoop
    }

    pub fn halfedge(&self) -> Option<HalfEdgeId> {
        self.halfedge
    }
}

/// A polygonal surface stored as a halfedge graph. Each element lives in its
/// own arena, and is referenced through a stable, typed handle. Besides the
/// handle, every element carries a dense index which is kept contiguous by
/// [`HalfEdgeMesh::reindex`].
#[derive(Debug, Clone, Default)]
pub struct HalfEdgeMesh {
    vertices: SlotMap<VertexId, Vertex>,
    edges: SlotMap<EdgeId, Edge>,
    faces: SlotMap<FaceId, Face>,
    halfedges: SlotMap<HalfEdgeId, HalfEdge>,

    /// Boundary loops, in the order their dense indices are assigned.
    boundary_loops: Vec<FaceId>,

    /// Set when an element has been removed since the last reindex.
    needs_reindex: bool,
    subdivision_iterations: usize,
}

/// An indexed polygon list, the flat representation a mesh is built from and
/// projected back into.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolygonSoup {
    pub positions: Vec<Vec3>,
    pub uvs: Option<Vec<Vec2>>,
    pub polygons: Vec<SVec<u32>>,
}

impl HalfEdgeMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Number of interior faces. Boundary loops are not counted.
    pub fn num_faces(&self) -> usize {
        self.faces.len() - self.boundary_loops.len()
    }

    pub fn num_halfedges(&self) -> usize {
        self.halfedges.len()
    }

    pub fn num_boundary_loops(&self) -> usize {
        self.boundary_loops.len()
    }

    /// Number of Catmull-Clark iterations this mesh has gone through.
    pub fn subdivision_iterations(&self) -> usize {
        self.subdivision_iterations
    }

    /// Whether all dense indices are contiguous, i.e. nothing was removed
    /// since the last call to [`HalfEdgeMesh::reindex`].
    pub fn is_compact(&self) -> bool {
        !self.needs_reindex
    }

    pub fn boundary_loops(&self) -> &[FaceId] {
        &self.boundary_loops
    }

    pub fn iter_vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex)> {
        self.vertices.iter()
    }

    pub fn iter_edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges.iter()
    }

    /// Iterates the interior faces of the mesh.
    pub fn iter_faces(&self) -> impl Iterator<Item = (FaceId, &Face)> {
        self.faces.iter().filter(|(_, f)| !f.is_boundary())
    }

    pub fn iter_halfedges(&self) -> impl Iterator<Item = (HalfEdgeId, &HalfEdge)> {
        self.halfedges.iter()
    }

    pub fn vertex_position(&self, v: VertexId) -> Vec3 {
        self[v].position
    }

    pub fn set_vertex_position(&mut self, v: VertexId, position: Vec3) {
        self[v].position = position;
    }

    pub fn set_vertex_uv(&mut self, v: VertexId, uv: Vec2) {
        self[v].uv = Some(uv);
    }

    /// Returns the halfedges of a face, or of a boundary loop, in `next` order.
    pub fn face_halfedges(&self, face_id: FaceId) -> Result<SVec<HalfEdgeId>, TraversalError> {
        self.at_face(face_id).halfedges()
    }

    pub fn face_vertices(&self, face_id: FaceId) -> Result<SVec<VertexId>, TraversalError> {
        self.at_face(face_id).vertices()
    }

    /// The source and destination vertices of an edge's representative halfedge.
    pub fn edge_endpoints(&self, edge: EdgeId) -> Result<(VertexId, VertexId), TraversalError> {
        self.at_edge(edge).halfedge().src_dst_pair()
    }

    /// Whether any of the two halfedges of this edge lies on a boundary loop.
    pub fn is_boundary_edge(&self, edge: EdgeId) -> Result<bool, TraversalError> {
        let e = self.at_edge(edge);
        let h = e.halfedge();
        Ok(h.is_boundary()? || h.twin().is_boundary()?)
    }

    /// Returns the halfedges of the i-th boundary loop, following `next`
    /// pointers. Note that boundary loops run opposite to the orientation of
    /// the faces they surround.
    pub fn boundary_loop_halfedges(&self, i: usize) -> Option<SVec<HalfEdgeId>> {
        let f = *self.boundary_loops.get(i)?;
        self.face_halfedges(f).ok()
    }

    /// Adds a new vertex to the mesh, disconnected from everything else. Returns its handle.
    fn alloc_vertex(&mut self, position: Vec3, halfedge: Option<HalfEdgeId>) -> VertexId {
        let index = self.vertices.len() as u32;
        self.vertices.insert(Vertex {
            halfedge,
            position,
            uv: None,
            index,
        })
    }

    fn alloc_edge(&mut self, halfedge: Option<HalfEdgeId>) -> EdgeId {
        let index = self.edges.len() as u32;
        self.edges.insert(Edge { halfedge, index })
    }

    /// Adds a new face to the mesh, disconnected from everything else. Returns its handle.
    fn alloc_face(&mut self, kind: FaceKind, halfedge: Option<HalfEdgeId>) -> FaceId {
        let index = if kind == FaceKind::BoundaryLoop {
            self.boundary_loops.len() as u32
        } else {
            self.num_faces() as u32
        };
        let f = self.faces.insert(Face {
            halfedge,
            kind,
            index,
        });
        if kind == FaceKind::BoundaryLoop {
            self.boundary_loops.push(f);
        }
        f
    }

    fn alloc_halfedge(&mut self, mut halfedge: HalfEdge) -> HalfEdgeId {
        halfedge.index = self.halfedges.len() as u32;
        self.halfedges.insert(halfedge)
    }

    /// Removes a face from the mesh. This does not attempt to preserve mesh
    /// connectivity and should only be used as part of internal operations.
    fn remove_face(&mut self, face: FaceId) {
        if let Some(removed) = self.faces.remove(face) {
            if removed.is_boundary() {
                self.boundary_loops.retain(|&b| b != face);
            }
        }
        self.needs_reindex = true;
    }

    /// Removes an edge from the mesh. This does not attempt to preserve mesh
    /// connectivity and should only be used as part of internal operations.
    fn remove_edge(&mut self, edge: EdgeId) {
        self.edges.remove(edge);
        self.needs_reindex = true;
    }

    /// Removes a halfedge from the mesh. This does not attempt to preserve mesh
    /// connectivity and should only be used as part of internal operations.
    fn remove_halfedge(&mut self, halfedge: HalfEdgeId) {
        self.halfedges.remove(halfedge);
        self.needs_reindex = true;
    }

    /// Removes a vertex from the mesh. This does not attempt to preserve mesh
    /// connectivity and should only be used as part of internal operations.
    fn remove_vertex(&mut self, vertex: VertexId) {
        self.vertices.remove(vertex);
        self.needs_reindex = true;
    }

    /// Projects the mesh back to an indexed polygon list, using the dense
    /// indices of vertices and faces. UVs are emitted only when every vertex
    /// has one.
    pub fn to_polygons(&self) -> Result<PolygonSoup, InvariantViolation> {
        if !self.is_compact() {
            return Err(InvariantViolation(
                "mesh has pending removals, call reindex() first".into(),
            ));
        }

        let mut positions = vec![Vec3::ZERO; self.num_vertices()];
        let mut uvs = Some(vec![Vec2::ZERO; self.num_vertices()]);
        for (_, vertex) in self.iter_vertices() {
            positions[vertex.index as usize] = vertex.position;
            match (vertex.uv, uvs.as_mut()) {
                (Some(uv), Some(uvs)) => uvs[vertex.index as usize] = uv,
                _ => uvs = None,
            }
        }

        let mut polygons = vec![SVec::new(); self.num_faces()];
        for (f, face) in self.iter_faces() {
            polygons[face.index as usize] = self
                .face_vertices(f)
                .map_err(|err| InvariantViolation(err.to_string()))?
                .iter()
                .map(|&v| self[v].index)
                .collect();
        }

        Ok(PolygonSoup {
            positions,
            uvs,
            polygons,
        })
    }
}

