// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::str::FromStr;

use super::*;

/// How the normals of the faces around a vertex are combined into the vertex
/// normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum VertexNormalWeight {
    EqualWeighted,
    AreaWeighted,
    #[default]
    AngleWeighted,
}

impl FromStr for VertexNormalWeight {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "equal" | "equal_weighted" => Ok(VertexNormalWeight::EqualWeighted),
            "area" | "area_weighted" => Ok(VertexNormalWeight::AreaWeighted),
            "angle" | "angle_weighted" => Ok(VertexNormalWeight::AngleWeighted),
            other => Err(SolverError::UnsupportedOption(format!(
                "unknown vertex normal weighting '{other}'"
            ))),
        }
    }
}

/// Angle between two vectors, robust to round-off pushing the cosine outside
/// of [-1, 1].
fn angle_between(u: Vec3, v: Vec3) -> f32 {
    u.normalize_or_zero()
        .dot(v.normalize_or_zero())
        .clamp(-1.0, 1.0)
        .acos()
}

impl HalfEdgeMesh {
    /// Head minus tail position.
    pub fn halfedge_vector(&self, h: HalfEdgeId) -> Result<Vec3, TraversalError> {
        let (src, dst) = self.at_halfedge(h).src_dst_pair()?;
        Ok(self[dst].position - self[src].position)
    }

    /// The interior angle of the face at the origin of `h`, between `h` and
    /// the reversed previous halfedge.
    pub fn corner_angle(&self, h: HalfEdgeId) -> Result<f32, TraversalError> {
        let prev = self.at_halfedge(h).prev().try_end()?;
        Ok(angle_between(
            self.halfedge_vector(h)?,
            -self.halfedge_vector(prev)?,
        ))
    }

    /// Cotangent of the angle opposite to `h` in its triangle. Zero for
    /// boundary halfedges. Degenerate triangles produce a non-finite value.
    pub fn cotan(&self, h: HalfEdgeId) -> Result<f32, TraversalError> {
        if self.at_halfedge(h).is_boundary()? {
            return Ok(0.0);
        }
        let (src, dst) = self.at_halfedge(h).src_dst_pair()?;
        let apex = self.at_halfedge(h).prev().src_vertex().try_end()?;
        let u = self[src].position - self[apex].position;
        let v = self[dst].position - self[apex].position;
        Ok(u.dot(v) / u.cross(v).length())
    }

    /// The cotangent weight of an edge, `(cot α + cot β) / 2`, where α and β
    /// are the angles opposite to it in its two triangles.
    pub fn cotan_weight(&self, h: HalfEdgeId) -> Result<f32, TraversalError> {
        let twin = self.at_halfedge(h).twin().try_end()?;
        Ok((self.cotan(h)? + self.cotan(twin)?) * 0.5)
    }

    /// Unit normal of a face, following its winding order. Quads average the
    /// triangle estimates at their first and third corners. Zero for boundary
    /// loops and degenerate faces.
    pub fn face_normal(&self, f: FaceId) -> Result<Vec3, TraversalError> {
        let face = &self[f];
        let h = self.at_face(f).halfedge().try_end()?;
        let corner_normal = |h: HalfEdgeId| -> Result<Vec3, TraversalError> {
            let prev = self.at_halfedge(h).prev().try_end()?;
            Ok(self
                .halfedge_vector(h)?
                .cross(-self.halfedge_vector(prev)?)
                .normalize_or_zero())
        };
        match face.kind {
            FaceKind::BoundaryLoop => Ok(Vec3::ZERO),
            FaceKind::Quad => {
                let third = self.at_halfedge(h).next().next().try_end()?;
                Ok((corner_normal(h)? + corner_normal(third)?).normalize_or_zero())
            }
            FaceKind::Triangle | FaceKind::Polygon => corner_normal(h),
        }
    }

    /// Area of a face, computed as a triangle fan around its first vertex.
    /// Zero for boundary loops.
    pub fn face_area(&self, f: FaceId) -> Result<f32, TraversalError> {
        if self[f].is_boundary() {
            return Ok(0.0);
        }
        let vertices = self.face_vertices(f)?;
        let p0 = self[vertices[0]].position;
        Ok(vertices[1..]
            .iter()
            .tuple_windows()
            .map(|(&a, &b)| (self[a].position - p0).cross(self[b].position - p0).length() * 0.5)
            .sum())
    }

    /// Normal at a vertex, combining the normals of its adjacent faces.
    pub fn vertex_normal(
        &self,
        v: VertexId,
        weight: VertexNormalWeight,
    ) -> Result<Vec3, TraversalError> {
        let mut normal = Vec3::ZERO;
        for h in self.at_vertex(v).outgoing_halfedges()? {
            let f = match self.at_halfedge(h).face_or_boundary()? {
                Some(f) => f,
                None => continue,
            };
            let w = match weight {
                VertexNormalWeight::EqualWeighted => 1.0,
                VertexNormalWeight::AreaWeighted => self.face_area(f)?,
                VertexNormalWeight::AngleWeighted => self.corner_angle(h)?,
            };
            normal += self.face_normal(f)? * w;
        }
        Ok(normal.normalize_or_zero())
    }

    /// One third of the area of the faces around a vertex.
    pub fn vertex_voronoi_area(&self, v: VertexId) -> Result<f32, TraversalError> {
        let mut area = 0.0;
        for f in self.at_vertex(v).adjacent_faces()? {
            area += self.face_area(f)?;
        }
        Ok(area / 3.0)
    }

    pub fn edge_midpoint(&self, e: EdgeId) -> Result<Vec3, TraversalError> {
        let (a, b) = self.edge_endpoints(e)?;
        Ok((self[a].position + self[b].position) * 0.5)
    }

    /// Returns the average of a face's vertices. Note that this is different
    /// from the centroid. See:
    /// https://en.wikipedia.org/wiki/Centroid#Of_a_polygon
    pub fn face_midpoint(&self, f: FaceId) -> Result<Vec3, TraversalError> {
        let vertices = self.face_vertices(f)?;
        Ok(vertices
            .iter()
            .fold(Vec3::ZERO, |acc, &v| acc + self[v].position)
            / vertices.len() as f32)
    }
}
