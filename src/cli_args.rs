// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use halfmesh_engine::prelude::{BoundaryShape, LaplacianWeight};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Prints vertex, edge, face and boundary loop counts of an OBJ file
    Stats {
        input: PathBuf,
        /// Print the statistics record as RON
        #[arg(long)]
        ron: bool,
    },
    /// Applies Catmull-Clark subdivision
    Subdivide {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(short, long, default_value_t = 1)]
        iterations: usize,
    },
    /// Removes faces by collapsing the edges of least quadric error
    Simplify {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Fraction of the faces to remove, between 0 and 1
        #[arg(short, long, default_value_t = 0.5)]
        ratio: f64,
    },
    /// Computes UV coordinates for a mesh with at least one boundary loop
    Parameterize {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// `disk` or `rectangle`
        #[arg(short, long, default_value = "disk")]
        boundary: BoundaryShape,
        /// `uniform` or `cotangent`
        #[arg(short, long, default_value = "uniform")]
        weights: LaplacianWeight,
    },
    /// Writes a primitive shape
    Primitive {
        #[arg(value_enum)]
        shape: PrimitiveShape,
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveShape {
    Box,
    Quad,
    Grid,
    Circle,
    Disk,
    Tetrahedron,
    Sphere,
}
