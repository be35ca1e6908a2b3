// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::prelude::*;

/// Tolerances for [`flip_edge`].
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FlipOptions {
    /// Maximum angle, in radians, between the normal of any of the two new
    /// triangles and the average normal of the two old ones.
    pub max_normal_deviation: f32,
}

impl Default for FlipOptions {
    fn default() -> Self {
        Self {
            max_normal_deviation: 60f32.to_radians(),
        }
    }
}

fn reject(reason: impl Into<String>) -> OperatorError {
    let reason = reason.into();
    log::trace!("Rejected topology operation: {reason}");
    OperatorError::InvalidOperation(reason)
}

/// Returns the representative halfedge of `e`, checking the edge is alive.
fn live_edge(mesh: &HalfEdgeMesh, e: EdgeId) -> Result<HalfEdgeId, OperatorError> {
    mesh.edge(e)
        .ok_or_else(|| OperatorError::StaleReference(format!("{e:?} does not exist")))?;
    Ok(mesh.at_edge(e).halfedge().try_end()?)
}

fn triangle_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (b - a).cross(c - a).normalize_or_zero()
}

/// Rotates an edge shared by two triangles, so that it connects the two
/// vertices opposite to it. The edge keeps its id.
///
/// The flip is rejected when the new edge already exists, or when any of the
/// two new triangles would be degenerate or deviate from the surface normal
/// by more than `options.max_normal_deviation`.
pub fn flip_edge(
    mesh: &mut HalfEdgeMesh,
    e: EdgeId,
    options: &FlipOptions,
) -> Result<(), OperatorError> {
    // --- Collect handles ---
    let h = live_edge(mesh, e)?;
    let t = mesh.at_halfedge(h).twin().try_end()?;
    if mesh[h].boundary || mesh[t].boundary {
        return Err(reject("cannot flip a boundary edge"));
    }
    let f0 = mesh.at_halfedge(h).face().try_end()?;
    let f1 = mesh.at_halfedge(t).face().try_end()?;
    if mesh[f0].kind != FaceKind::Triangle || mesh[f1].kind != FaceKind::Triangle {
        return Err(reject("flip requires two triangles"));
    }

    let h1 = mesh.at_halfedge(h).next().try_end()?;
    let h2 = mesh.at_halfedge(h).prev().try_end()?;
    let t1 = mesh.at_halfedge(t).next().try_end()?;
    let t2 = mesh.at_halfedge(t).prev().try_end()?;

    let (a, b) = mesh.at_halfedge(h).src_dst_pair()?;
    let c = mesh.at_halfedge(h2).src_vertex().try_end()?;
    let d = mesh.at_halfedge(t2).src_vertex().try_end()?;

    if c == d {
        return Err(reject("the faces of the edge share their opposite vertex"));
    }
    if mesh.at_vertex(c).halfedge_to(d).try_end().is_ok() {
        return Err(reject("flip would duplicate an existing edge"));
    }

    // --- Check geometry ---
    let (pa, pb, pc, pd) = (
        mesh[a].position,
        mesh[b].position,
        mesh[c].position,
        mesh[d].position,
    );
    let reference = (mesh.face_normal(f0)? + mesh.face_normal(f1)?).normalize_or_zero();
    for normal in [triangle_normal(pd, pc, pa), triangle_normal(pc, pd, pb)] {
        if normal == Vec3::ZERO {
            return Err(reject("flip would create a degenerate triangle"));
        }
        let deviation = normal.dot(reference).clamp(-1.0, 1.0).acos();
        if deviation > options.max_normal_deviation {
            return Err(reject(format!(
                "flip would bend the surface by {deviation} radians"
            )));
        }
    }

    // --- Fix connectivity ---
    // f0 becomes (d, c, a) and f1 becomes (c, d, b)
    mesh[h].vertex = Some(d);
    mesh[t].vertex = Some(c);

    mesh[h].next = Some(h2);
    mesh[h2].next = Some(t1);
    mesh[t1].next = Some(h);
    mesh[h].prev = Some(t1);
    mesh[h2].prev = Some(h);
    mesh[t1].prev = Some(h2);

    mesh[t].next = Some(t2);
    mesh[t2].next = Some(h1);
    mesh[h1].next = Some(t);
    mesh[t].prev = Some(h1);
    mesh[t2].prev = Some(t);
    mesh[h1].prev = Some(t2);

    mesh[t1].face = Some(f0);
    mesh[h1].face = Some(f1);

    // Only touch representatives that point to a halfedge that moved.
    if mesh[f0].halfedge == Some(h1) {
        mesh[f0].halfedge = Some(h);
    }
    if mesh[f1].halfedge == Some(t1) {
        mesh[f1].halfedge = Some(t);
    }
    if mesh[a].halfedge == Some(h) {
        mesh[a].halfedge = Some(t1);
    }
    if mesh[b].halfedge == Some(t) {
        mesh[b].halfedge = Some(h1);
    }

    Ok(())
}

/// Splits an edge shared by two triangles, inserting a new vertex at the
/// parametric point `t` between the source and destination of the edge's
/// representative halfedge. Both triangles are split in two. Returns the new
/// vertex.
///
/// ## Id Stability
/// The edge keeps its id, and stays on the half that touches the source
/// vertex. The two original faces are kept on the side of that half too.
pub fn split_edge(mesh: &mut HalfEdgeMesh, e: EdgeId, t: f32) -> Result<VertexId, OperatorError> {
    // --- Collect handles ---
    let h = live_edge(mesh, e)?;
    let tw = mesh.at_halfedge(h).twin().try_end()?;
    if mesh[h].boundary || mesh[tw].boundary {
        return Err(reject("cannot split a boundary edge"));
    }
    if !(0.0..=1.0).contains(&t) {
        return Err(reject(format!("split parameter {t} is outside of [0, 1]")));
    }
    let f0 = mesh.at_halfedge(h).face().try_end()?;
    let f1 = mesh.at_halfedge(tw).face().try_end()?;
    if mesh[f0].kind != FaceKind::Triangle || mesh[f1].kind != FaceKind::Triangle {
        return Err(reject("split requires two triangles"));
    }

    let h1 = mesh.at_halfedge(h).next().try_end()?;
    let h2 = mesh.at_halfedge(h).prev().try_end()?;
    let t1 = mesh.at_halfedge(tw).next().try_end()?;
    let t2 = mesh.at_halfedge(tw).prev().try_end()?;
    let (a, b) = mesh.at_halfedge(h).src_dst_pair()?;
    let c = mesh.at_halfedge(h2).src_vertex().try_end()?;
    let d = mesh.at_halfedge(t2).src_vertex().try_end()?;

    // --- Allocate new elements ---
    let position = mesh[a].position.lerp(mesh[b].position, t);
    let m = mesh.alloc_vertex(position, None);
    if let (Some(uv_a), Some(uv_b)) = (mesh[a].uv, mesh[b].uv) {
        mesh[m].uv = Some(uv_a.lerp(uv_b, t));
    }

    let f_mbc = mesh.alloc_face(FaceKind::Triangle, None);
    let f_mad = mesh.alloc_face(FaceKind::Triangle, None);
    let e_bm = mesh.alloc_edge(Some(tw));
    let e_cm = mesh.alloc_edge(None);
    let e_dm = mesh.alloc_edge(None);

    let n_ma = mesh.alloc_halfedge(HalfEdge::default());
    let n_mb = mesh.alloc_halfedge(HalfEdge::default());
    let n_mc = mesh.alloc_halfedge(HalfEdge::default());
    let n_cm = mesh.alloc_halfedge(HalfEdge::default());
    let n_md = mesh.alloc_halfedge(HalfEdge::default());
    let n_dm = mesh.alloc_halfedge(HalfEdge::default());

    // --- Fix connectivity ---
    let mut link = |face: FaceId, cycle: [(HalfEdgeId, VertexId); 3]| {
        for i in 0..3 {
            let (h, v) = cycle[i];
            mesh[h].vertex = Some(v);
            mesh[h].face = Some(face);
            mesh[h].next = Some(cycle[(i + 1) % 3].0);
            mesh[h].prev = Some(cycle[(i + 2) % 3].0);
        }
        mesh[face].halfedge = Some(cycle[0].0);
    };
    link(f0, [(h, a), (n_mc, m), (h2, c)]);
    link(f_mbc, [(n_mb, m), (h1, b), (n_cm, c)]);
    link(f1, [(tw, b), (n_md, m), (t2, d)]);
    link(f_mad, [(n_ma, m), (t1, a), (n_dm, d)]);

    let mut pair = |x: HalfEdgeId, y: HalfEdgeId, edge: EdgeId| {
        mesh[x].twin = Some(y);
        mesh[y].twin = Some(x);
        mesh[x].edge = Some(edge);
        mesh[y].edge = Some(edge);
    };
    pair(h, n_ma, e);
    pair(tw, n_mb, e_bm);
    pair(n_mc, n_cm, e_cm);
    pair(n_md, n_dm, e_dm);

    mesh[e].halfedge = Some(h);
    mesh[e_cm].halfedge = Some(n_mc);
    mesh[e_dm].halfedge = Some(n_md);
    mesh[m].halfedge = Some(n_mb);

    Ok(m)
}

/// How one of the two faces around a collapsing edge gets fixed.
enum SideFix {
    /// A triangle is dissolved. Its two remaining sides are glued together:
    /// the one touching the removed vertex goes away with its edge, the one
    /// touching the kept vertex goes away but its edge survives.
    Dissolve {
        face: FaceId,
        w_side: HalfEdgeId,
        v_side: HalfEdgeId,
        outer_w: HalfEdgeId,
        outer_v: HalfEdgeId,
        kept_edge: EdgeId,
        dropped_edge: EdgeId,
        apex: VertexId,
        apex_side: HalfEdgeId,
    },
    /// A larger face loses the collapsing side.
    Shrink {
        face: FaceId,
        side: HalfEdgeId,
        side_next: HalfEdgeId,
        side_prev: HalfEdgeId,
        degree: usize,
    },
}

/// The handles involved in a collapse, gathered while checking it.
struct CollapsePlan {
    h: HalfEdgeId,
    t: HalfEdgeId,
    v: VertexId,
    w: VertexId,
    sides: [SideFix; 2],
}

fn plan_side(
    mesh: &HalfEdgeMesh,
    side: HalfEdgeId,
    touches_w_first: bool,
) -> Result<SideFix, OperatorError> {
    let face = mesh.at_halfedge(side).face().try_end()?;
    let side_next = mesh.at_halfedge(side).next().try_end()?;
    let side_prev = mesh.at_halfedge(side).prev().try_end()?;
    let degree = mesh.at_face(face).halfedges()?.len();
    if degree > 3 {
        return Ok(SideFix::Shrink {
            face,
            side,
            side_next,
            side_prev,
            degree,
        });
    }

    let (w_side, v_side) = if touches_w_first {
        (side_next, side_prev)
    } else {
        (side_prev, side_next)
    };
    Ok(SideFix::Dissolve {
        face,
        w_side,
        v_side,
        outer_w: mesh.at_halfedge(w_side).twin().try_end()?,
        outer_v: mesh.at_halfedge(v_side).twin().try_end()?,
        kept_edge: mesh.at_halfedge(v_side).edge().try_end()?,
        dropped_edge: mesh.at_halfedge(w_side).edge().try_end()?,
        apex: mesh.at_halfedge(side_prev).src_vertex().try_end()?,
        apex_side: mesh.at_halfedge(side_next).twin().try_end()?,
    })
}

fn plan_collapse(mesh: &HalfEdgeMesh, e: EdgeId) -> Result<CollapsePlan, OperatorError> {
    let h = live_edge(mesh, e)?;
    let t = mesh.at_halfedge(h).twin().try_end()?;
    if mesh[h].boundary || mesh[t].boundary {
        return Err(reject("cannot collapse a boundary edge"));
    }
    let (v, w) = mesh.at_halfedge(h).src_dst_pair()?;
    if mesh.at_vertex(v).is_on_boundary()? || mesh.at_vertex(w).is_on_boundary()? {
        return Err(reject("cannot collapse an edge touching a boundary loop"));
    }

    // h goes from v to w, so its next touches w. The twin runs the other way.
    let sides = [plan_side(mesh, h, true)?, plan_side(mesh, t, false)?];

    // Link condition: the only vertices adjacent to both endpoints must be
    // the apexes of the triangles that vanish.
    let apexes = sides
        .iter()
        .filter_map(|side| match side {
            SideFix::Dissolve { apex, .. } => Some(*apex),
            SideFix::Shrink { .. } => None,
        })
        .collect::<SVec<_>>();
    if apexes.len() == 2 && apexes[0] == apexes[1] {
        return Err(reject("both faces of the edge share their apex"));
    }

    let v_ring: HashSet<VertexId> = mesh.at_vertex(v).neighbors()?.into_iter().collect();
    let common = mesh
        .at_vertex(w)
        .neighbors()?
        .into_iter()
        .filter(|n| v_ring.contains(n))
        .collect::<HashSet<_>>();
    if common != apexes.iter().copied().collect::<HashSet<_>>() {
        return Err(reject(format!(
            "link condition violated: endpoints share {} neighbors, expected {}",
            common.len(),
            apexes.len()
        )));
    }

    for &apex in &apexes {
        if mesh.at_vertex(apex).outgoing_halfedges()?.len() <= 3 {
            return Err(reject("collapse would leave a vertex of valence two"));
        }
    }

    Ok(CollapsePlan { h, t, v, w, sides })
}

/// Checks whether [`collapse_edge`] would accept `e`, without modifying the mesh.
pub fn check_collapse(mesh: &HalfEdgeMesh, e: EdgeId) -> Result<(), OperatorError> {
    plan_collapse(mesh, e).map(|_| ())
}

/// Merges the two endpoints of `e` into one vertex at `target`. The source of
/// the edge's representative halfedge is kept and returned, the destination
/// is removed. Incident triangles vanish, and incident faces with more sides
/// lose one.
///
/// Removed elements leave holes in the dense indices until the next call to
/// [`HalfEdgeMesh::reindex`].
pub fn collapse_edge(
    mesh: &mut HalfEdgeMesh,
    e: EdgeId,
    target: Vec3,
) -> Result<VertexId, OperatorError> {
    // --- Collect handles ---
    let CollapsePlan { h, t, v, w, sides } = plan_collapse(mesh, e)?;
    let w_outgoing = mesh.at_vertex(w).outgoing_halfedges()?;
    let v_outgoing = mesh.at_vertex(v).outgoing_halfedges()?;

    let mut removed_halfedges: SVec<HalfEdgeId> = smallvec::smallvec![h, t];
    let mut removed_edges: SVec<EdgeId> = smallvec::smallvec![e];
    let mut removed_faces = SVec::<FaceId>::new();

    // --- Fix connectivity ---
    for side in sides {
        match side {
            SideFix::Dissolve {
                face,
                w_side,
                v_side,
                outer_w,
                outer_v,
                kept_edge,
                dropped_edge,
                apex,
                apex_side,
            } => {
                mesh[outer_w].twin = Some(outer_v);
                mesh[outer_v].twin = Some(outer_w);
                mesh[outer_w].edge = Some(kept_edge);
                mesh[kept_edge].halfedge = Some(outer_v);
                if mesh[apex].halfedge.map_or(false, |x| x == w_side || x == v_side) {
                    mesh[apex].halfedge = Some(apex_side);
                }
                removed_halfedges.extend([w_side, v_side]);
                removed_edges.push(dropped_edge);
                removed_faces.push(face);
            }
            SideFix::Shrink {
                face,
                side,
                side_next,
                side_prev,
                degree,
            } => {
                mesh[side_prev].next = Some(side_next);
                mesh[side_next].prev = Some(side_prev);
                if mesh[face].halfedge == Some(side) {
                    mesh[face].halfedge = Some(side_next);
                }
                mesh[face].kind = FaceKind::from_degree(degree - 1);
            }
        }
    }

    for &h_wo in &w_outgoing {
        if !removed_halfedges.contains(&h_wo) {
            mesh[h_wo].vertex = Some(v);
        }
    }
    mesh[v].halfedge = v_outgoing
        .iter()
        .chain(w_outgoing.iter())
        .copied()
        .find(|h| !removed_halfedges.contains(h));
    mesh[v].position = target;

    // --- Remove elements ---
    for h in removed_halfedges {
        mesh.remove_halfedge(h);
    }
    for e in removed_edges {
        mesh.remove_edge(e);
    }
    for f in removed_faces {
        mesh.remove_face(f);
    }
    mesh.remove_vertex(w);

    Ok(v)
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use super::*;

    type Connectivity = (BTreeSet<Vec<VertexId>>, BTreeSet<(VertexId, VertexId)>);

    /// Face vertex cycles and edge endpoint pairs, independent of which
    /// halfedge ids realize them.
    fn connectivity(mesh: &HalfEdgeMesh) -> Connectivity {
        let faces = mesh
            .iter_faces()
            .map(|(f, _)| canonical_rotation(&mesh.face_vertices(f).unwrap()))
            .collect();
        let edges = mesh
            .iter_edges()
            .map(|(e, _)| {
                let (a, b) = mesh.edge_endpoints(e).unwrap();
                (a.min(b), a.max(b))
            })
            .collect();
        (faces, edges)
    }

    fn interior_edge(mesh: &HalfEdgeMesh) -> EdgeId {
        mesh.iter_edges()
            .map(|(e, _)| e)
            .find(|&e| !mesh.is_boundary_edge(e).unwrap())
            .unwrap()
    }

    fn boundary_edge(mesh: &HalfEdgeMesh) -> EdgeId {
        mesh.iter_edges()
            .map(|(e, _)| e)
            .find(|&e| mesh.is_boundary_edge(e).unwrap())
            .unwrap()
    }

    fn vertex_at(mesh: &HalfEdgeMesh, pos: Vec3) -> VertexId {
        mesh.iter_vertices()
            .find(|(_, v)| v.position().abs_diff_eq(pos, 1e-6))
            .map(|(v, _)| v)
            .unwrap()
    }

    fn snapshot(mesh: &HalfEdgeMesh) -> String {
        format!("{mesh:?}")
    }

    #[test]
    fn flip_rotates_the_diagonal() {
        let mut mesh = primitives::Grid::build_tris(1, 1, 1.0);
        let e = interior_edge(&mesh);
        let before = connectivity(&mesh);

        flip_edge(&mut mesh, e, &FlipOptions::default()).unwrap();
        mesh.validate().unwrap();
        let (a, b) = mesh.edge_endpoints(e).unwrap();
        let flipped: HashSet<_> = [a, b].into_iter().collect();
        let expected: HashSet<_> = [
            vertex_at(&mesh, Vec3::new(1.0, 0.0, 0.0)),
            vertex_at(&mesh, Vec3::new(0.0, 1.0, 0.0)),
        ]
        .into_iter()
        .collect();
        assert_eq!(flipped, expected);
        for (f, _) in mesh.iter_faces() {
            assert!(mesh.face_normal(f).unwrap().abs_diff_eq(Vec3::Z, 1e-6));
        }

        flip_edge(&mut mesh, e, &FlipOptions::default()).unwrap();
        mesh.validate().unwrap();
        assert_eq!(connectivity(&mesh), before);
    }

    #[test]
    fn flip_involution_on_sphere() {
        let mut mesh = primitives::UVSphere::build_triangulated(Vec3::ZERO, 8, 6, 1.0);
        let before = connectivity(&mesh);
        let options = FlipOptions {
            max_normal_deviation: std::f32::consts::PI,
        };
        let mut flipped = 0;
        for e in mesh.iter_edges().map(|(e, _)| e).collect_vec() {
            if flip_edge(&mut mesh, e, &options).is_ok() {
                flipped += 1;
                mesh.validate().unwrap();
                flip_edge(&mut mesh, e, &options).unwrap();
                assert_eq!(connectivity(&mesh), before);
            }
        }
        assert!(flipped > 0);
    }

    #[test]
    fn flip_rejections_leave_the_mesh_untouched() {
        // Non-convex quad, reflex at vertex 2. The new diagonal would fold.
        let mut mesh = HalfEdgeMesh::build_from_polygons(
            &[
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(2.0, -2.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(2.0, 2.0, 0.0),
            ],
            &[[0u32, 1, 2], [0, 2, 3]],
        )
        .unwrap();
        let before = snapshot(&mesh);
        let e = interior_edge(&mesh);
        assert!(matches!(
            flip_edge(&mut mesh, e, &FlipOptions::default()),
            Err(OperatorError::InvalidOperation(_))
        ));
        assert_eq!(snapshot(&mesh), before);

        let e = boundary_edge(&mesh);
        assert!(matches!(
            flip_edge(&mut mesh, e, &FlipOptions::default()),
            Err(OperatorError::InvalidOperation(_))
        ));
        assert_eq!(snapshot(&mesh), before);

        // In a tetrahedron, the opposite vertices of every edge are connected
        let mut tet = primitives::Tetrahedron::build();
        let before = snapshot(&tet);
        for e in tet.iter_edges().map(|(e, _)| e).collect_vec() {
            assert!(flip_edge(&mut tet, e, &FlipOptions::default()).is_err());
        }
        assert_eq!(snapshot(&tet), before);
    }

    #[test]
    fn split_counts_and_position() {
        let mut mesh = primitives::Grid::build_tris(2, 2, 1.0);
        let (v, e, f) = (mesh.num_vertices(), mesh.num_edges(), mesh.num_faces());
        let edge = interior_edge(&mesh);
        let midpoint = mesh.edge_midpoint(edge).unwrap();

        let m = split_edge(&mut mesh, edge, 0.5).unwrap();
        mesh.validate().unwrap();
        assert_eq!(mesh.num_vertices(), v + 1);
        assert_eq!(mesh.num_edges(), e + 3);
        assert_eq!(mesh.num_faces(), f + 2);
        assert!(mesh.vertex_position(m).abs_diff_eq(midpoint, 1e-6));
        assert_eq!(mesh.at_vertex(m).outgoing_halfedges().unwrap().len(), 4);
        assert!(mesh
            .at_vertex(m)
            .adjacent_faces()
            .unwrap()
            .iter()
            .all(|&f| mesh[f].kind() == FaceKind::Triangle));
        // Insertions keep the indices dense
        assert!(mesh.is_compact());
        assert_eq!(mesh[m].index() as usize, v);
    }

    #[test]
    fn split_rejects_boundary_edges() {
        let mut mesh = primitives::Grid::build_tris(2, 2, 1.0);
        let before = snapshot(&mesh);
        let e = boundary_edge(&mesh);
        assert!(matches!(
            split_edge(&mut mesh, e, 0.5),
            Err(OperatorError::InvalidOperation(_))
        ));
        assert_eq!(snapshot(&mesh), before);
    }

    #[test]
    fn collapse_interior_edge() {
        let mut mesh = primitives::Grid::build_tris(4, 4, 1.0);
        let (v, e, f) = (mesh.num_vertices(), mesh.num_edges(), mesh.num_faces());
        let a = vertex_at(&mesh, Vec3::new(2.0, 2.0, 0.0));
        let b = vertex_at(&mesh, Vec3::new(3.0, 2.0, 0.0));
        let h = mesh.at_vertex(a).halfedge_to(b).end();
        let edge = mesh.at_halfedge(h).edge().end();
        let target = Vec3::new(2.5, 2.0, 0.0);

        let kept = collapse_edge(&mut mesh, edge, target).unwrap();
        assert_eq!(mesh.num_vertices(), v - 1);
        assert_eq!(mesh.num_faces(), f - 2);
        assert_eq!(mesh.num_edges(), e - 3);
        assert_eq!(mesh.vertex_position(kept), target);

        mesh.reindex();
        mesh.validate().unwrap();
    }

    #[test]
    fn collapse_rejections() {
        let mut mesh = primitives::Grid::build_tris(4, 4, 1.0);
        let before = snapshot(&mesh);

        let e = boundary_edge(&mesh);
        assert!(matches!(
            collapse_edge(&mut mesh, e, Vec3::ZERO),
            Err(OperatorError::InvalidOperation(_))
        ));

        // Interior edge with one endpoint on the boundary
        let a = vertex_at(&mesh, Vec3::new(1.0, 0.0, 0.0));
        let b = vertex_at(&mesh, Vec3::new(1.0, 1.0, 0.0));
        let h = mesh.at_vertex(a).halfedge_to(b).end();
        let e = mesh.at_halfedge(h).edge().end();
        assert!(matches!(
            collapse_edge(&mut mesh, e, Vec3::ZERO),
            Err(OperatorError::InvalidOperation(_))
        ));
        assert_eq!(snapshot(&mesh), before);

        let mut tet = primitives::Tetrahedron::build();
        let before = snapshot(&tet);
        for e in tet.iter_edges().map(|(e, _)| e).collect_vec() {
            assert!(check_collapse(&tet, e).is_err());
            assert!(collapse_edge(&mut tet, e, Vec3::ZERO).is_err());
        }
        assert_eq!(snapshot(&tet), before);
    }

    #[test]
    fn collapse_between_quads() {
        let mut mesh = primitives::UVSphere::build(Vec3::ZERO, 8, 6, 1.0);
        let (v, e, f) = (mesh.num_vertices(), mesh.num_edges(), mesh.num_faces());
        let ids = mesh.iter_vertices().map(|(v, _)| v).collect_vec();
        // Vertex 0 of the second and third rings
        let h = mesh.at_vertex(ids[9]).halfedge_to(ids[17]).end();
        let edge = mesh.at_halfedge(h).edge().end();
        let faces = mesh
            .at_halfedge(h)
            .face()
            .try_end()
            .into_iter()
            .chain(mesh.at_halfedge(h).twin().face().try_end())
            .collect_vec();

        let target = mesh.edge_midpoint(edge).unwrap();
        collapse_edge(&mut mesh, edge, target).unwrap();
        assert_eq!(mesh.num_vertices(), v - 1);
        assert_eq!(mesh.num_edges(), e - 1);
        assert_eq!(mesh.num_faces(), f);
        for f in faces {
            assert_eq!(mesh[f].kind(), FaceKind::Triangle);
        }
        mesh.reindex();
        mesh.validate().unwrap();
    }

    #[test]
    fn stale_handles_are_reported() {
        let mut mesh = primitives::Grid::build_tris(4, 4, 1.0);
        let a = vertex_at(&mesh, Vec3::new(2.0, 2.0, 0.0));
        let b = vertex_at(&mesh, Vec3::new(2.0, 3.0, 0.0));
        let h = mesh.at_vertex(a).halfedge_to(b).end();
        let edge = mesh.at_halfedge(h).edge().end();
        collapse_edge(&mut mesh, edge, Vec3::new(2.0, 2.5, 0.0)).unwrap();

        assert!(matches!(
            flip_edge(&mut mesh, edge, &FlipOptions::default()),
            Err(OperatorError::StaleReference(_))
        ));
        assert!(matches!(
            split_edge(&mut mesh, edge, 0.5),
            Err(OperatorError::StaleReference(_))
        ));
    }
}
