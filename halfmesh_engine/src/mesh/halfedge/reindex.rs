// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;

impl HalfEdgeMesh {
    /// Reassigns the dense index of every element, in storage order. Interior
    /// faces are numbered `0..num_faces()`, and boundary loops are numbered by
    /// their position in [`HalfEdgeMesh::boundary_loops`]. Handles are not
    /// affected.
    ///
    /// Must be called after a batch of removals before the mesh is read by
    /// anything relying on dense indices.
    #[profiling::function]
    pub fn reindex(&mut self) {
        for (i, (_, v)) in self.vertices.iter_mut().enumerate() {
            v.index = i as u32;
        }
        for (i, (_, e)) in self.edges.iter_mut().enumerate() {
            e.index = i as u32;
        }
        for (i, (_, h)) in self.halfedges.iter_mut().enumerate() {
            h.index = i as u32;
        }
        for (i, (_, f)) in self
            .faces
            .iter_mut()
            .filter(|(_, f)| !f.is_boundary())
            .enumerate()
        {
            f.index = i as u32;
        }
        for (i, &b) in self.boundary_loops.iter().enumerate() {
            if let Some(face) = self.faces.get_mut(b) {
                face.index = i as u32;
            }
        }
        self.needs_reindex = false;
    }
}
