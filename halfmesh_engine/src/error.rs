// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::mesh::halfedge::TraversalError;

/// Errors that can happen while building a mesh out of a polygon soup. The
/// indices reported here always refer to the input arrays, since no mesh
/// element exists yet when they are raised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    /// A polygon references a position that does not exist
    #[error("polygon {face} references vertex {index}, but only {num_vertices} positions were given")]
    IndexOutOfRange {
        face: usize,
        index: usize,
        num_vertices: usize,
    },
    /// A polygon has fewer than three vertices, or repeats a vertex
    #[error("polygon {face} is degenerate: {reason}")]
    DegenerateFace { face: usize, reason: &'static str },
    /// An undirected edge is shared by three or more polygons
    #[error("edge ({v0}, {v1}) is shared by more than two polygons")]
    NonManifoldEdge { v0: usize, v1: usize },
    /// Two polygons traverse the same edge in the same direction
    #[error("edge ({v0}, {v1}) is traversed twice in the same direction. Polygons are not consistently oriented")]
    InconsistentOrientation { v0: usize, v1: usize },
    /// The polygons around a vertex do not form a single fan
    #[error("vertex {vertex} is not a polygon fan, but some other non-manifold structure")]
    NonManifoldVertex { vertex: usize },
    /// Connectivity was malformed while linking halfedges
    #[error("malformed connectivity: {0}")]
    Traversal(#[from] TraversalError),
}

/// Errors returned by the local topology operators. A failed operator never
/// leaves the mesh partially modified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperatorError {
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    /// The handle does not refer to a live element, or its neighborhood could
    /// not be traversed
    #[error("stale reference: {0}")]
    StaleReference(String),
}

impl From<TraversalError> for OperatorError {
    fn from(err: TraversalError) -> Self {
        OperatorError::StaleReference(err.to_string())
    }
}

/// Errors of the parameterization and simplification engines
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("the mesh has no boundary loop")]
    MissingBoundary,
    #[error("unsupported option: {0}")]
    UnsupportedOption(String),
    #[error("solver failure: {0}")]
    SolverFailure(String),
}

impl From<TraversalError> for SolverError {
    fn from(err: TraversalError) -> Self {
        SolverError::SolverFailure(format!("malformed connectivity: {err}"))
    }
}

/// A structural invariant of the halfedge mesh does not hold
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("mesh invariant violated: {0}")]
pub struct InvariantViolation(pub String);

impl From<TraversalError> for InvariantViolation {
    fn from(err: TraversalError) -> Self {
        InvariantViolation(format!("malformed connectivity: {err}"))
    }
}

/// Umbrella error for callers that drive several stages of the pipeline
#[derive(Error, Debug)]
pub enum MeshError {
    #[error(transparent)]
    Construction(#[from] ConstructionError),
    #[error(transparent)]
    Operator(#[from] OperatorError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}
