// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::f64::consts::PI;
use std::str::FromStr;

use nalgebra::DMatrix;
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

use crate::prelude::*;

/// The convex shape the first boundary loop is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoundaryShape {
    /// A circle of radius 0.5
    #[default]
    Disk,
    /// A square of side 1
    Rectangle,
}

impl FromStr for BoundaryShape {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disk" | "circle" => Ok(BoundaryShape::Disk),
            "rect" | "rectangle" | "square" => Ok(BoundaryShape::Rectangle),
            _ => Err(SolverError::UnsupportedOption(format!(
                "unknown boundary shape '{s}'"
            ))),
        }
    }
}

/// Edge weights of the discrete Laplacian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LaplacianWeight {
    /// Every neighbor weighs the same (Tutte embedding)
    #[default]
    Uniform,
    /// Cotangent weights (harmonic map)
    Cotangent,
}

impl FromStr for LaplacianWeight {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uniform" => Ok(LaplacianWeight::Uniform),
            "cotan" | "cotangent" => Ok(LaplacianWeight::Cotangent),
            _ => Err(SolverError::UnsupportedOption(format!(
                "unknown laplacian weight '{s}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParameterizationOptions {
    pub boundary: BoundaryShape,
    pub weights: LaplacianWeight,
}

/// The vertices of the first boundary loop, following the orientation of the
/// faces around it. The ring starts at the boundary vertex with the lowest
/// index.
fn boundary_ring(mesh: &HalfEdgeMesh) -> Result<Vec<VertexId>, SolverError> {
    let loop_halfedges = mesh
        .boundary_loop_halfedges(0)
        .ok_or(SolverError::MissingBoundary)?;
    // Boundary loops run opposite to their faces, so the ring is read
    // backwards: ring[i] is the source of prev^i(b0).
    let n = loop_halfedges.len();
    let ring = (0..n)
        .map(|i| {
            let h = loop_halfedges[(n - i) % n];
            Ok(mesh.at_halfedge(h).src_vertex().try_end()?)
        })
        .collect::<Result<Vec<VertexId>, SolverError>>()?;

    let start = ring
        .iter()
        .position_min_by_key(|&&v| mesh[v].index())
        .unwrap_or(0);
    Ok(rotate_iter(ring.iter().copied(), start, n).collect())
}

/// Position of the i-th of `n` boundary vertices, centered at the origin.
fn boundary_position(shape: BoundaryShape, i: usize, n: usize) -> (f64, f64) {
    match shape {
        BoundaryShape::Disk => {
            let theta = 2.0 * PI * i as f64 / n as f64;
            (0.5 * theta.cos(), 0.5 * theta.sin())
        }
        BoundaryShape::Rectangle => {
            // Arc length along the perimeter of a unit square, starting at
            // the (-0.5, -0.5) corner.
            let s = 4.0 * i as f64 / n as f64;
            let side = s.floor();
            let f = s - side;
            match side as u32 {
                0 => (-0.5 + f, -0.5),
                1 => (0.5, -0.5 + f),
                2 => (0.5 - f, 0.5),
                _ => (-0.5, 0.5 - f),
            }
        }
    }
}

fn solver_failure(reason: impl Into<String>) -> SolverError {
    SolverError::SolverFailure(reason.into())
}

/// Computes a UV coordinate for every vertex by pinning the first boundary
/// loop to a convex shape and solving a Laplace equation for the rest of the
/// vertices. The embedding is centered at (0.5, 0.5).
///
/// UVs are written only once the solve succeeds. On error, the mesh is left
/// untouched.
#[profiling::function]
pub fn parameterize(
    mesh: &mut HalfEdgeMesh,
    options: &ParameterizationOptions,
) -> Result<(), SolverError> {
    log::debug!(
        "Parameterizing mesh with {} vertices ({:?} boundary, {:?} weights)",
        mesh.num_vertices(),
        options.boundary,
        options.weights
    );

    let ring = boundary_ring(mesh)?;
    if ring.len() < 3 {
        return Err(solver_failure("the boundary loop has fewer than 3 vertices"));
    }

    let mut pinned = SecondaryMap::<VertexId, (f64, f64)>::new();
    for (i, &v) in ring.iter().enumerate() {
        pinned.insert(v, boundary_position(options.boundary, i, ring.len()));
    }

    // Column of each free vertex in the reduced system.
    let mut column = SecondaryMap::<VertexId, usize>::new();
    for (v, _) in mesh.iter_vertices() {
        if !pinned.contains_key(v) {
            let next = column.len();
            column.insert(v, next);
        }
    }
    let n = column.len();

    let mut solution = DMatrix::<f64>::zeros(n, 2);
    if n > 0 {
        // --- Assemble ---
        // Pinned neighbors are moved to the right hand side. Cotangent rows
        // are multiplied by the Voronoi area of their vertex, which keeps the
        // matrix symmetric.
        let mut coo = CooMatrix::<f64>::new(n, n);
        let mut rhs = DMatrix::<f64>::zeros(n, 2);
        for (v, &row) in column.iter() {
            if options.weights == LaplacianWeight::Cotangent
                && mesh.vertex_voronoi_area(v)? <= f32::EPSILON
            {
                return Err(solver_failure(format!(
                    "{v:?} has a degenerate neighborhood"
                )));
            }

            let mut diagonal = 0.0;
            for h in mesh.at_vertex(v).outgoing_halfedges()? {
                let weight = match options.weights {
                    LaplacianWeight::Uniform => 1.0,
                    LaplacianWeight::Cotangent => mesh.cotan_weight(h)? as f64,
                };
                if !weight.is_finite() {
                    return Err(solver_failure(format!("{h:?} has a non-finite weight")));
                }

                let w = mesh.at_halfedge(h).dst_vertex().try_end()?;
                diagonal += weight;
                if let Some(&col) = column.get(w) {
                    coo.push(row, col, -weight);
                } else if let Some(&(pu, pv)) = pinned.get(w) {
                    rhs[(row, 0)] += weight * pu;
                    rhs[(row, 1)] += weight * pv;
                }
            }
            coo.push(row, row, diagonal);
        }

        // --- Solve ---
        let matrix = CscMatrix::from(&coo);
        let cholesky = CscCholesky::factor(&matrix)
            .map_err(|err| solver_failure(format!("cholesky factorization failed: {err:?}")))?;
        solution = cholesky.solve(&rhs);
        if solution.iter().any(|x| !x.is_finite()) {
            return Err(solver_failure("the solution is not finite"));
        }
    }

    // --- Write back ---
    let vertices = mesh.iter_vertices().map(|(v, _)| v).collect_vec();
    for v in vertices {
        let (u, w) = match (pinned.get(v), column.get(v)) {
            (Some(&uv), _) => uv,
            (None, Some(&col)) => (solution[(col, 0)], solution[(col, 1)]),
            (None, None) => continue,
        };
        mesh.set_vertex_uv(v, Vec2::new(u as f32 + 0.5, w as f32 + 0.5));
    }

    log::debug!(
        "Parameterization solved for {n} free vertices, {} pinned",
        ring.len()
    );
    Ok(())
}
