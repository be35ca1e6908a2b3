// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

use super::*;

/// Element counts of a mesh. Boundary loops are not counted as faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshStatistics {
    pub vertex_count: usize,
    pub edge_count: usize,
    pub face_count: usize,
    pub boundary_loop_count: usize,
    pub subdivision_iterations: usize,
}

impl HalfEdgeMesh {
    pub fn statistics(&self) -> MeshStatistics {
        MeshStatistics {
            vertex_count: self.num_vertices(),
            edge_count: self.num_edges(),
            face_count: self.num_faces(),
            boundary_loop_count: self.num_boundary_loops(),
            subdivision_iterations: self.subdivision_iterations,
        }
    }
}
