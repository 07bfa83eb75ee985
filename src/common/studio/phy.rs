// Copyright © 2018 Cormac O'Brien
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of this software
// and associated documentation files (the "Software"), to deal in the Software without
// restriction, including without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all copies or
// substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING
// BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Collision mesh (`.phy`) parsing.
//!
//! A `.phy` file holds one or more IVP "compact surfaces". Each surface is a header followed by
//! a list of convex ledges; a ledge is a run of triangle records whose edges carry vertex
//! indices, with the vertex pool reachable at a ledge-relative offset as 16-byte x/y/z/w floats.
//! The ledge list ends where the ledge tree (which the tracer has no use for) begins.
//!
//! Vertices are left in IVP coordinates (metres, axes permuted); conversion into map space is
//! the business of whoever places the mesh in the world.

use std::io::{Cursor, Seek, SeekFrom};

use crate::common::studio::StudioError;

use byteorder::{LittleEndian, ReadBytesExt};
use cgmath::Vector3;

const VPHYSICS_ID: i32 =
    ('V' as i32) | ('P' as i32) << 8 | ('H' as i32) << 16 | ('Y' as i32) << 24;

// mass center, rotation inertia, upper limit radius, size word, ledge tree root offset,
// three reserved words
const COMPACT_SURFACE_HEADER_SIZE: u64 = 48;

const LEDGE_HEADER_SIZE: u64 = 16;
const TRIANGLE_SIZE: u64 = 16;

/// One convex solid of a collision model.
#[derive(Debug)]
pub struct Solid {
    pub vertices: Vec<Vector3<f32>>,
    pub triangles: Vec<[u16; 3]>,
}

#[derive(Debug)]
pub struct Phy {
    pub checksum: i32,
    pub solids: Vec<Solid>,
}

impl Phy {
    /// Returns the solid used for collision queries, if the model has one.
    pub fn collision_solid(&self) -> Option<&Solid> {
        self.solids.first()
    }
}

pub fn load(data: &[u8]) -> Result<Phy, StudioError> {
    let mut reader = Cursor::new(data);

    let header_size = reader.read_i32::<LittleEndian>()?;
    let _id = reader.read_i32::<LittleEndian>()?;
    let solid_count = reader.read_i32::<LittleEndian>()?;
    let checksum = reader.read_i32::<LittleEndian>()?;

    if header_size < 16 || solid_count < 0 {
        return Err(StudioError::format("bad phy header"));
    }

    reader.seek(SeekFrom::Start(header_size as u64))?;

    let mut solids = Vec::with_capacity(solid_count as usize);
    for _ in 0..solid_count {
        solids.push(load_solid(&mut reader)?);
    }

    Ok(Phy { checksum, solids })
}

fn load_solid(reader: &mut Cursor<&[u8]>) -> Result<Solid, StudioError> {
    let solid_start = reader.seek(SeekFrom::Current(0))?;

    // the size field counts everything that follows it
    let solid_size = reader.read_i32::<LittleEndian>()?;
    if solid_size < 0 {
        return Err(StudioError::format("negative phy solid size"));
    }
    let solid_end = solid_start + 4 + solid_size as u64;

    let id = reader.read_i32::<LittleEndian>()?;
    if id != VPHYSICS_ID {
        return Err(StudioError::format("bad phy solid id (expected VPHY)"));
    }

    let _version = reader.read_u16::<LittleEndian>()?;
    let _model_type = reader.read_u16::<LittleEndian>()?;
    let surface_size = reader.read_i32::<LittleEndian>()?;
    for _ in 0..3 {
        reader.read_f32::<LittleEndian>()?; // drag axis areas
    }
    let _axis_map_size = reader.read_i32::<LittleEndian>()?;

    if surface_size < 0 {
        return Err(StudioError::format("negative phy surface size"));
    }

    let surface_start = reader.seek(SeekFrom::Current(0))?;

    // mass center, rotation inertia, upper limit radius, packed byte size
    for _ in 0..8 {
        reader.read_f32::<LittleEndian>()?;
    }
    let ledge_tree_root = reader.read_i32::<LittleEndian>()?;
    for _ in 0..3 {
        reader.read_i32::<LittleEndian>()?;
    }

    if ledge_tree_root < COMPACT_SURFACE_HEADER_SIZE as i32
        || ledge_tree_root as u64 > surface_size as u64
    {
        return Err(StudioError::format("bad phy ledge tree offset"));
    }

    let ledges_end = surface_start + ledge_tree_root as u64;

    let mut vertices = Vec::new();
    let mut triangles = Vec::new();

    while reader.seek(SeekFrom::Current(0))? + LEDGE_HEADER_SIZE <= ledges_end {
        let ledge_start = reader.seek(SeekFrom::Current(0))?;

        let point_offset = reader.read_i32::<LittleEndian>()?;
        let _client_data = reader.read_i32::<LittleEndian>()?;
        let _packed = reader.read_u32::<LittleEndian>()?;
        let n_triangles = reader.read_u16::<LittleEndian>()?;
        let _reserved = reader.read_u16::<LittleEndian>()?;

        if point_offset < 0 {
            return Err(StudioError::format("negative phy point offset"));
        }

        let base = vertices.len() as u16;
        let mut max_index = 0u16;

        for _ in 0..n_triangles {
            // triangle index, pierce index, material index
            reader.read_u32::<LittleEndian>()?;

            let mut indices = [0u16; 3];
            for index in indices.iter_mut() {
                let edge = reader.read_u32::<LittleEndian>()?;
                let start_point = (edge >> 16) as u16;
                max_index = max_index.max(start_point);
                *index = base + start_point;
            }

            triangles.push(indices);
        }

        let after_triangles = reader.seek(SeekFrom::Current(0))?;

        // the ledge's vertex pool: 16-byte x/y/z/w records
        reader.seek(SeekFrom::Start(ledge_start + point_offset as u64))?;
        for _ in 0..=max_index {
            let x = reader.read_f32::<LittleEndian>()?;
            let y = reader.read_f32::<LittleEndian>()?;
            let z = reader.read_f32::<LittleEndian>()?;
            reader.read_f32::<LittleEndian>()?;
            vertices.push(Vector3::new(x, y, z));
        }

        reader.seek(SeekFrom::Start(after_triangles))?;
    }

    debug!(
        "phy solid: {} vertices, {} triangles",
        vertices.len(),
        triangles.len()
    );

    reader.seek(SeekFrom::Start(solid_end))?;

    Ok(Solid {
        vertices,
        triangles,
    })
}
