// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Some useful re-exports
pub mod prelude;

/// Error types for mesh construction, topology edits and solvers
pub mod error;

/// The halfedge graph data structure, its edit operations and the
/// algorithms built on top of it
pub mod mesh;
