// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reading and writing of Wavefront OBJ text. Only positions and polygons are
//! read. Texture and normal indices in faces are ignored.

use std::io::Write;

use anyhow::{anyhow, bail, Result};
use glam::Vec3;
use halfmesh_engine::prelude::PolygonSoup;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till},
    character::complete::{char, digit1, space0, space1},
    combinator::{map, map_res, opt, recognize},
    multi::separated_list1,
    number::complete::float,
    sequence::{pair, preceded, terminated, tuple},
    IResult, Parser,
};

/// Positions and 0-based polygon indices, as read from an OBJ file.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ObjData {
    pub positions: Vec<Vec3>,
    pub polygons: Vec<Vec<u32>>,
}

enum Line {
    Vertex(Vec3),
    Face(Vec<i64>),
}

fn vertex(input: &str) -> IResult<&str, Line> {
    map(
        preceded(
            pair(tag("v"), space1),
            tuple((float, preceded(space1, float), preceded(space1, float))),
        ),
        |(x, y, z)| Line::Vertex(Vec3::new(x, y, z)),
    )
    .parse(input)
}

/// A face corner like `3`, `3/1`, `3//2` or `-1/-1/-1`. Only the position
/// index is kept.
fn corner(input: &str) -> IResult<&str, i64> {
    terminated(
        map_res(recognize(pair(opt(char('-')), digit1)), str::parse::<i64>),
        opt(preceded(char('/'), take_till(char::is_whitespace))),
    )
    .parse(input)
}

fn face(input: &str) -> IResult<&str, Line> {
    map(
        preceded(
            pair(tag("f"), space1),
            terminated(separated_list1(space1, corner), space0),
        ),
        Line::Face,
    )
    .parse(input)
}

/// Parses the `v` and `f` lines of an OBJ file. Every other statement is
/// skipped.
pub fn parse_obj(text: &str) -> Result<ObjData> {
    let mut data = ObjData::default();

    for (line_number, line) in text.lines().enumerate().map(|(i, l)| (i + 1, l.trim())) {
        let keyword = line.split_whitespace().next();
        if !matches!(keyword, Some("v") | Some("f")) {
            continue;
        }

        let (rest, parsed) = alt((vertex, face))
            .parse(line)
            .map_err(|err| anyhow!("Error parsing OBJ line {line_number}: {err}"))?;

        match parsed {
            // Extra components, like the `w` of a vertex, are ignored
            Line::Vertex(position) => data.positions.push(position),
            Line::Face(corners) => {
                if !rest.trim().is_empty() {
                    bail!("Extra input on OBJ line {line_number}: '{rest}'");
                }
                let polygon = corners
                    .into_iter()
                    .map(|index| resolve_index(index, data.positions.len()))
                    .collect::<Option<Vec<u32>>>()
                    .ok_or_else(|| {
                        anyhow!("Invalid vertex index on OBJ line {line_number}: '{line}'")
                    })?;
                data.polygons.push(polygon);
            }
        }
    }

    Ok(data)
}

/// Converts a 1-based OBJ index into a 0-based one. Negative indices count
/// backwards from the last vertex read so far. Indices past the end are
/// kept, and reported later by the mesh builder.
fn resolve_index(index: i64, num_positions: usize) -> Option<u32> {
    let resolved = match index {
        0 => return None,
        i if i > 0 => i - 1,
        i => num_positions as i64 + i,
    };
    u32::try_from(resolved).ok()
}

/// Writes positions, UVs when present, and faces as OBJ text.
pub fn write_obj(soup: &PolygonSoup, out: &mut impl Write) -> std::io::Result<()> {
    for p in &soup.positions {
        writeln!(out, "v {} {} {}", p.x, p.y, p.z)?;
    }
    if let Some(uvs) = &soup.uvs {
        for uv in uvs {
            writeln!(out, "vt {} {}", uv.x, uv.y)?;
        }
    }
    for polygon in &soup.polygons {
        write!(out, "f")?;
        for &i in polygon {
            if soup.uvs.is_some() {
                write!(out, " {0}/{0}", i + 1)?;
            } else {
                write!(out, " {}", i + 1)?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}
