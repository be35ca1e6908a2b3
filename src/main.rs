// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use glam::{Vec2, Vec3};
use halfmesh_engine::prelude::*;

/// Command line arguments
mod cli_args;
use cli_args::{Args, Command, PrimitiveShape};

/// OBJ reading and writing
mod obj;

fn load_mesh(path: &Path) -> Result<HalfEdgeMesh> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    let data = obj::parse_obj(&text).with_context(|| format!("Invalid OBJ file {}", path.display()))?;
    let mesh = HalfEdgeMesh::build_from_polygons(&data.positions, &data.polygons)
        .with_context(|| format!("Could not build a mesh out of {}", path.display()))?;
    log::info!(
        "Loaded {} with {} vertices and {} faces",
        path.display(),
        mesh.num_vertices(),
        mesh.num_faces()
    );
    Ok(mesh)
}

fn save_mesh(mesh: &HalfEdgeMesh, path: &Path) -> Result<()> {
    let soup = mesh.to_polygons()?;
    let mut file = std::io::BufWriter::new(
        std::fs::File::create(path)
            .with_context(|| format!("Could not create {}", path.display()))?,
    );
    obj::write_obj(&soup, &mut file)?;
    file.flush()?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

fn build_primitive(shape: PrimitiveShape) -> HalfEdgeMesh {
    match shape {
        PrimitiveShape::Box => primitives::Box::build(Vec3::ZERO, Vec3::ONE),
        PrimitiveShape::Quad => primitives::Quad::build(Vec3::ZERO, Vec3::Y, Vec3::X, Vec2::ONE),
        PrimitiveShape::Grid => primitives::Grid::build_tris(8, 8, 0.125),
        PrimitiveShape::Circle => primitives::Circle::build(Vec3::ZERO, 0.5, 16),
        PrimitiveShape::Disk => primitives::DiskFan::build(Vec3::ZERO, 0.5, 16),
        PrimitiveShape::Tetrahedron => primitives::Tetrahedron::build(),
        PrimitiveShape::Sphere => primitives::UVSphere::build_triangulated(Vec3::ZERO, 24, 16, 1.0),
    }
}

fn write_statistics(stats: &MeshStatistics, as_ron: bool, out: &mut impl Write) -> Result<()> {
    if as_ron {
        let text = ron::ser::to_string_pretty(stats, ron::ser::PrettyConfig::default())?;
        writeln!(out, "{text}")?;
    } else {
        writeln!(out, "vertices:       {}", stats.vertex_count)?;
        writeln!(out, "edges:          {}", stats.edge_count)?;
        writeln!(out, "faces:          {}", stats.face_count)?;
        writeln!(out, "boundary loops: {}", stats.boundary_loop_count)?;
        writeln!(out, "subdivisions:   {}", stats.subdivision_iterations)?;
    }
    Ok(())
}

fn run(command: Command, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Stats { input, ron } => {
            let mesh = load_mesh(&input)?;
            write_statistics(&mesh.statistics(), ron, out)?;
        }
        Command::Subdivide {
            input,
            output,
            iterations,
        } => {
            let mut mesh = load_mesh(&input)?;
            subdivision::subdivide(&mut mesh, &SubdivisionOptions { iterations })?;
            save_mesh(&mesh, &output)?;
        }
        Command::Simplify {
            input,
            output,
            ratio,
        } => {
            let mut mesh = load_mesh(&input)?;
            let report = simplification::simplify(
                &mut mesh,
                &SimplificationOptions {
                    reduce_ratio: ratio,
                },
            )?;
            writeln!(
                out,
                "{} collapses, {} -> {} faces",
                report.collapses, report.faces_before, report.faces_after
            )?;
            save_mesh(&mesh, &output)?;
        }
        Command::Parameterize {
            input,
            output,
            boundary,
            weights,
        } => {
            let mut mesh = load_mesh(&input)?;
            parameterization::parameterize(
                &mut mesh,
                &ParameterizationOptions { boundary, weights },
            )
            .context("Parameterization failed")?;
            save_mesh(&mesh, &output)?;
        }
        Command::Primitive { shape, output } => {
            save_mesh(&build_primitive(shape), &output)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    // Setup logging
    env_logger::init();

    let args = Args::parse();
    run(args.command, &mut std::io::stdout().lock())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn primitive_subdivide_and_stats() {
        let dir = std::env::temp_dir().join(format!("halfmesh-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let cube = dir.join("cube.obj");
        let smooth = dir.join("smooth.obj");

        let mut out = Vec::new();
        run(
            Command::Primitive {
                shape: PrimitiveShape::Box,
                output: cube.clone(),
            },
            &mut out,
        )
        .unwrap();
        run(
            Command::Subdivide {
                input: cube,
                output: smooth.clone(),
                iterations: 1,
            },
            &mut out,
        )
        .unwrap();
        run(
            Command::Stats {
                input: smooth,
                ron: true,
            },
            &mut out,
        )
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("vertex_count: 26"));
        assert!(text.contains("face_count: 24"));
        // The counter is not stored in OBJ files
        assert!(text.contains("subdivision_iterations: 0"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn parameterize_writes_uvs() {
        let dir = std::env::temp_dir().join(format!("halfmesh-uv-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let disk = dir.join("disk.obj");
        let flat = dir.join("flat.obj");

        let mut out = Vec::new();
        run(
            Command::Primitive {
                shape: PrimitiveShape::Disk,
                output: disk.clone(),
            },
            &mut out,
        )
        .unwrap();
        run(
            Command::Parameterize {
                input: disk.clone(),
                output: flat.clone(),
                boundary: BoundaryShape::Rectangle,
                weights: LaplacianWeight::Cotangent,
            },
            &mut out,
        )
        .unwrap();
        let text = std::fs::read_to_string(&flat).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("vt ")).count(), 17);

        // A closed mesh has no boundary to pin
        let cube = dir.join("cube.obj");
        run(
            Command::Primitive {
                shape: PrimitiveShape::Box,
                output: cube.clone(),
            },
            &mut out,
        )
        .unwrap();
        let err = run(
            Command::Parameterize {
                input: cube,
                output: flat,
                boundary: BoundaryShape::Disk,
                weights: LaplacianWeight::Uniform,
            },
            &mut out,
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SolverError>(),
            Some(SolverError::MissingBoundary)
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
