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

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use crate::common::bsp::{
    Brush, BrushSide, BspFile, Contents, DispInfo, DispTri, DispVert, Edge, Face, Leaf, Node,
    PropPlacement, PropSolid, StaticPropLump,
};
use crate::common::math::Hyperplane;

use byteorder::{LittleEndian, ReadBytesExt};
use cgmath::Vector3;
use failure::Error;
use failure::ResultExt;
use num::FromPrimitive;

const MAGIC: i32 = ('V' as i32) | ('B' as i32) << 8 | ('S' as i32) << 16 | ('P' as i32) << 24;
const MIN_VERSION: i32 = 19;
const MAX_VERSION: i32 = 21;
const LUMP_COUNT: usize = 64;

// id of the static prop game sub-lump, MAKEID('s','p','r','p')
const GAME_LUMP_STATIC_PROPS: i32 =
    ('s' as i32) | ('p' as i32) << 8 | ('r' as i32) << 16 | ('p' as i32) << 24;

const PLANE_SIZE: usize = 20;
const VERTEX_SIZE: usize = 12;
const EDGE_SIZE: usize = 4;
const SURF_EDGE_SIZE: usize = 4;
const FACE_SIZE: usize = 56;
const NODE_SIZE: usize = 32;
const LEAF_SIZE: usize = 32;
const LEAF_V19_SIZE: usize = 56;
const LEAF_INDEX_SIZE: usize = 2;
const BRUSH_SIZE: usize = 12;
const BRUSH_SIDE_SIZE: usize = 8;
const DISP_INFO_SIZE: usize = 176;
const DISP_VERT_SIZE: usize = 20;
const DISP_TRI_SIZE: usize = 2;
const PROP_NAME_SIZE: usize = 128;

// the version-stable prefix of a static prop placement record; game lump versions 4 through 11
// only ever appended fields after it
const PROP_PLACEMENT_PREFIX_SIZE: usize = 32;

#[derive(Copy, Clone, Debug, FromPrimitive)]
enum BspLumpId {
    Entities = 0,
    Planes = 1,
    Vertices = 3,
    Nodes = 5,
    Faces = 7,
    Leaves = 10,
    Edges = 12,
    SurfEdges = 13,
    LeafFaces = 16,
    LeafBrushes = 17,
    Brushes = 18,
    BrushSides = 19,
    DispInfo = 26,
    DispVerts = 33,
    Game = 35,
    Pakfile = 40,
    DispTris = 48,
}

struct BspLump {
    offset: u64,
    size: usize,
}

impl BspLump {
    fn from_i32s(offset: i32, size: i32) -> Result<BspLump, Error> {
        ensure!(offset >= 0, "Lump offset must not be negative (was {})", offset);
        ensure!(size >= 0, "Lump size must not be negative (was {})", size);

        Ok(BspLump {
            offset: offset as u64,
            size: size as usize,
        })
    }

    fn record_count(&self, id: BspLumpId, record_size: usize) -> Result<usize, Error> {
        ensure!(self.size % record_size == 0, "Bad {:?} lump size", id);

        Ok(self.size / record_size)
    }
}

fn check_alignment<S>(seeker: &mut S, ofs: u64) -> Result<(), Error>
where
    S: Seek,
{
    ensure!(
        seeker.seek(SeekFrom::Current(0))? == seeker.seek(SeekFrom::Start(ofs))?,
        "BSP read misaligned"
    );

    Ok(())
}

fn read_vector3<R>(reader: &mut R) -> Result<Vector3<f32>, Error>
where
    R: ReadBytesExt,
{
    Ok(Vector3::new(
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
    ))
}

fn load_plane<R>(reader: &mut R) -> Result<Hyperplane, Error>
where
    R: ReadBytesExt,
{
    let normal = read_vector3(reader)?;
    let dist = reader.read_f32::<LittleEndian>()?;
    let axis_type = reader.read_i32::<LittleEndian>()?;

    Ok(Hyperplane::from_bsp(normal, dist, axis_type))
}

fn load_node<R>(reader: &mut R) -> Result<Node, Error>
where
    R: ReadBytesExt,
{
    let plane_id = reader.read_i32::<LittleEndian>()?;
    if plane_id < 0 {
        bail!("Invalid plane id");
    }

    let children = [
        reader.read_i32::<LittleEndian>()?,
        reader.read_i32::<LittleEndian>()?,
    ];

    let mut mins = [0i16; 3];
    let mut maxs = [0i16; 3];
    for m in mins.iter_mut() {
        *m = reader.read_i16::<LittleEndian>()?;
    }
    for m in maxs.iter_mut() {
        *m = reader.read_i16::<LittleEndian>()?;
    }

    let face_id = reader.read_u16::<LittleEndian>()?;
    let face_count = reader.read_u16::<LittleEndian>()?;
    let area = reader.read_i16::<LittleEndian>()?;

    // padding
    reader.read_i16::<LittleEndian>()?;

    Ok(Node {
        plane_id: plane_id as usize,
        children,
        mins,
        maxs,
        face_id,
        face_count,
        area,
    })
}

fn load_leaf<R>(reader: &mut R, long: bool) -> Result<Leaf, Error>
where
    R: ReadBytesExt,
{
    let contents = Contents::from_bits_truncate(reader.read_i32::<LittleEndian>()?);
    let cluster = reader.read_i16::<LittleEndian>()?;
    let area_flags = reader.read_i16::<LittleEndian>()?;

    let mut mins = [0i16; 3];
    let mut maxs = [0i16; 3];
    for m in mins.iter_mut() {
        *m = reader.read_i16::<LittleEndian>()?;
    }
    for m in maxs.iter_mut() {
        *m = reader.read_i16::<LittleEndian>()?;
    }

    let first_leaf_face = reader.read_u16::<LittleEndian>()?;
    let num_leaf_faces = reader.read_u16::<LittleEndian>()?;
    let first_leaf_brush = reader.read_u16::<LittleEndian>()?;
    let num_leaf_brushes = reader.read_u16::<LittleEndian>()?;
    let water_data_id = reader.read_i16::<LittleEndian>()?;

    // version 19 leaves carry an ambient light cube the tracer has no use for
    let padding = if long { 24 + 2 } else { 2 };
    let mut skipped = [0u8; 26];
    reader.read_exact(&mut skipped[..padding])?;

    Ok(Leaf {
        contents,
        cluster,
        area_flags,
        mins,
        maxs,
        first_leaf_face,
        num_leaf_faces,
        first_leaf_brush,
        num_leaf_brushes,
        water_data_id,
    })
}

fn load_face<R>(reader: &mut R) -> Result<Face, Error>
where
    R: ReadBytesExt,
{
    let plane_id = reader.read_u16::<LittleEndian>()?;
    let side = reader.read_u8()?;
    let on_node = reader.read_u8()?;
    let first_edge = reader.read_i32::<LittleEndian>()?;
    let num_edges = reader.read_i16::<LittleEndian>()?;
    let tex_info = reader.read_i16::<LittleEndian>()?;
    let disp_info = reader.read_i16::<LittleEndian>()?;

    // fog volume, lighting styles, lightmap extents, original face, primitives, smoothing
    let mut rest = [0u8; 42];
    reader.read_exact(&mut rest)?;

    Ok(Face {
        plane_id,
        side,
        on_node,
        first_edge,
        num_edges,
        tex_info,
        disp_info,
    })
}

fn load_edge<R>(reader: &mut R) -> Result<Edge, Error>
where
    R: ReadBytesExt,
{
    Ok(Edge {
        vertex_ids: [
            reader.read_u16::<LittleEndian>()?,
            reader.read_u16::<LittleEndian>()?,
        ],
    })
}

fn load_brush<R>(reader: &mut R) -> Result<Brush, Error>
where
    R: ReadBytesExt,
{
    let first_side = reader.read_i32::<LittleEndian>()?;
    let num_sides = reader.read_i32::<LittleEndian>()?;
    ensure!(first_side >= 0 && num_sides >= 0, "Invalid brush side range");

    Ok(Brush {
        first_side,
        num_sides,
        contents: Contents::from_bits_truncate(reader.read_i32::<LittleEndian>()?),
    })
}

fn load_brush_side<R>(reader: &mut R) -> Result<BrushSide, Error>
where
    R: ReadBytesExt,
{
    Ok(BrushSide {
        plane_id: reader.read_u16::<LittleEndian>()?,
        tex_info: reader.read_i16::<LittleEndian>()?,
        disp_info: reader.read_i16::<LittleEndian>()?,
        bevel: reader.read_i16::<LittleEndian>()?,
    })
}

fn load_disp_info<R>(reader: &mut R) -> Result<DispInfo, Error>
where
    R: ReadBytesExt,
{
    let start_position = read_vector3(reader)?;
    let disp_vert_start = reader.read_i32::<LittleEndian>()?;
    let disp_tri_start = reader.read_i32::<LittleEndian>()?;
    let power = reader.read_i32::<LittleEndian>()?;

    // minimum tesselation, smoothing angle
    reader.read_i32::<LittleEndian>()?;
    reader.read_f32::<LittleEndian>()?;

    let contents = reader.read_i32::<LittleEndian>()?;
    let map_face = reader.read_u16::<LittleEndian>()?;

    // lightmap offsets, neighbor data, allowed verts
    let mut rest = [0u8; DISP_INFO_SIZE - 38];
    reader.read_exact(&mut rest)?;

    Ok(DispInfo {
        start_position,
        disp_vert_start,
        disp_tri_start,
        power,
        contents,
        map_face,
    })
}

fn read_prop_name<R>(reader: &mut R) -> Result<String, Error>
where
    R: ReadBytesExt,
{
    let mut bytes = [0u8; PROP_NAME_SIZE];
    reader.read_exact(&mut bytes)?;

    let len = bytes.iter().position(|b| *b == 0).unwrap_or(PROP_NAME_SIZE);
    Ok(String::from_utf8_lossy(&bytes[..len]).into_owned())
}

fn load_static_props<R>(reader: &mut R, offset: u64, size: usize) -> Result<StaticPropLump, Error>
where
    R: ReadBytesExt + Seek,
{
    reader.seek(SeekFrom::Start(offset))?;

    let dict_count = reader.read_i32::<LittleEndian>()?;
    ensure!(dict_count >= 0, "Negative static prop dictionary count");

    let mut names = Vec::with_capacity(dict_count as usize);
    for _ in 0..dict_count {
        names.push(read_prop_name(reader)?);
    }

    let leaf_count = reader.read_i32::<LittleEndian>()?;
    ensure!(leaf_count >= 0, "Negative static prop leaf count");

    let mut leaf_indices = Vec::with_capacity(leaf_count as usize);
    for _ in 0..leaf_count {
        leaf_indices.push(reader.read_u16::<LittleEndian>()?);
    }

    let prop_count = reader.read_i32::<LittleEndian>()?;
    ensure!(prop_count >= 0, "Negative static prop count");

    let mut placements = Vec::with_capacity(prop_count as usize);

    if prop_count > 0 {
        // The placement record grew with every game lump revision, always by appending. Rather
        // than keeping a table of per-version layouts, derive the stride from the remaining
        // payload and read the stable prefix of each record.
        let consumed = (reader.seek(SeekFrom::Current(0))? - offset) as usize;
        ensure!(consumed <= size, "Static prop lump overrun");

        let stride = (size - consumed) / prop_count as usize;
        ensure!(
            stride >= PROP_PLACEMENT_PREFIX_SIZE,
            "Static prop record too small ({} bytes)",
            stride
        );

        debug!(
            "static props: {} models, {} leaf links, {} placements ({} bytes each)",
            dict_count, leaf_count, prop_count, stride
        );

        for i in 0..prop_count {
            let record_start = reader.seek(SeekFrom::Current(0))?;

            let origin = read_vector3(reader)?;
            let angles = read_vector3(reader)?;
            let prop_type = reader.read_u16::<LittleEndian>()?;
            let first_leaf = reader.read_u16::<LittleEndian>()?;
            let leaf_count = reader.read_u16::<LittleEndian>()?;
            let solid_raw = reader.read_u8()?;
            let flags = reader.read_u8()?;

            let solid = match PropSolid::from_u8(solid_raw) {
                Some(s) => s,
                None => {
                    warn!("prop {}: unknown solid type {}, not colliding", i, solid_raw);
                    PropSolid::None
                }
            };

            ensure!(
                (prop_type as i32) < dict_count,
                "Prop {} references model {} of {}",
                i,
                prop_type,
                dict_count
            );

            placements.push(PropPlacement {
                origin,
                angles,
                prop_type,
                first_leaf,
                leaf_count,
                solid,
                flags,
            });

            reader.seek(SeekFrom::Start(record_start + stride as u64))?;
        }
    }

    Ok(StaticPropLump {
        names,
        leaf_indices,
        placements,
    })
}

fn load_game_lump<R>(reader: &mut R, lump: &BspLump) -> Result<StaticPropLump, Error>
where
    R: ReadBytesExt + Seek,
{
    if lump.size == 0 {
        return Ok(StaticPropLump::default());
    }

    reader.seek(SeekFrom::Start(lump.offset))?;

    let sub_lump_count = reader.read_i32::<LittleEndian>()?;
    ensure!(sub_lump_count >= 0, "Negative game lump count");

    for _ in 0..sub_lump_count {
        let id = reader.read_i32::<LittleEndian>()?;
        let _flags = reader.read_u16::<LittleEndian>()?;
        let version = reader.read_u16::<LittleEndian>()?;
        // game sub-lump offsets are absolute within the file
        let offset = reader.read_i32::<LittleEndian>()?;
        let size = reader.read_i32::<LittleEndian>()?;

        if id == GAME_LUMP_STATIC_PROPS {
            ensure!(offset >= 0 && size >= 0, "Bad static prop sub-lump bounds");

            debug!("sprp sub-lump version {}", version);
            return load_static_props(reader, offset as u64, size as usize);
        }
    }

    Ok(StaticPropLump::default())
}

/// Parses a compiled level out of `data`.
pub fn load(data: &[u8]) -> Result<BspFile, Error> {
    let mut reader = BufReader::new(Cursor::new(data));

    let magic = reader.read_i32::<LittleEndian>()?;
    ensure!(magic == MAGIC, "Bad magic number (not a VBSP file)");

    let version = reader.read_i32::<LittleEndian>()?;
    ensure!(
        version >= MIN_VERSION && version <= MAX_VERSION,
        "Bad version number (found {}, supported {}-{})",
        version,
        MIN_VERSION,
        MAX_VERSION
    );

    let mut lumps = Vec::with_capacity(LUMP_COUNT);
    for l in 0..LUMP_COUNT {
        let offset = reader.read_i32::<LittleEndian>()?;
        let size = reader.read_i32::<LittleEndian>()?;

        // lump format version and uncompressed size, unused on PC
        reader.read_i32::<LittleEndian>()?;
        reader.read_i32::<LittleEndian>()?;

        debug!("lump {: >2}: offset = {:>#010x} | size = {:>#010x}", l, offset, size);

        lumps.push(BspLump::from_i32s(offset, size).context("Failed to read lump")?);
    }

    let lump = |id: BspLumpId| &lumps[id as usize];

    let plane_lump = lump(BspLumpId::Planes);
    let plane_count = plane_lump.record_count(BspLumpId::Planes, PLANE_SIZE)?;
    reader.seek(SeekFrom::Start(plane_lump.offset))?;
    let mut planes = Vec::with_capacity(plane_count);
    for _ in 0..plane_count {
        planes.push(load_plane(&mut reader)?);
    }
    check_alignment(&mut reader, plane_lump.offset + plane_lump.size as u64)?;

    let vert_lump = lump(BspLumpId::Vertices);
    let vert_count = vert_lump.record_count(BspLumpId::Vertices, VERTEX_SIZE)?;
    reader.seek(SeekFrom::Start(vert_lump.offset))?;
    let mut vertices = Vec::with_capacity(vert_count);
    for _ in 0..vert_count {
        vertices.push(read_vector3(&mut reader)?);
    }

    let edge_lump = lump(BspLumpId::Edges);
    let edge_count = edge_lump.record_count(BspLumpId::Edges, EDGE_SIZE)?;
    reader.seek(SeekFrom::Start(edge_lump.offset))?;
    let mut edges = Vec::with_capacity(edge_count);
    for _ in 0..edge_count {
        edges.push(load_edge(&mut reader)?);
    }

    let surf_edge_lump = lump(BspLumpId::SurfEdges);
    let surf_edge_count = surf_edge_lump.record_count(BspLumpId::SurfEdges, SURF_EDGE_SIZE)?;
    reader.seek(SeekFrom::Start(surf_edge_lump.offset))?;
    let mut surf_edges = Vec::with_capacity(surf_edge_count);
    for _ in 0..surf_edge_count {
        surf_edges.push(reader.read_i32::<LittleEndian>()?);
    }

    let face_lump = lump(BspLumpId::Faces);
    let face_count = face_lump.record_count(BspLumpId::Faces, FACE_SIZE)?;
    reader.seek(SeekFrom::Start(face_lump.offset))?;
    let mut faces = Vec::with_capacity(face_count);
    for _ in 0..face_count {
        faces.push(load_face(&mut reader)?);
    }
    check_alignment(&mut reader, face_lump.offset + face_lump.size as u64)?;

    let node_lump = lump(BspLumpId::Nodes);
    let node_count = node_lump.record_count(BspLumpId::Nodes, NODE_SIZE)?;
    reader.seek(SeekFrom::Start(node_lump.offset))?;
    let mut nodes = Vec::with_capacity(node_count);
    for _ in 0..node_count {
        nodes.push(load_node(&mut reader)?);
    }

    let long_leaves = version < 20;
    let leaf_size = if long_leaves { LEAF_V19_SIZE } else { LEAF_SIZE };
    let leaf_lump = lump(BspLumpId::Leaves);
    let leaf_count = leaf_lump.record_count(BspLumpId::Leaves, leaf_size)?;
    reader.seek(SeekFrom::Start(leaf_lump.offset))?;
    let mut leaves = Vec::with_capacity(leaf_count);
    for _ in 0..leaf_count {
        leaves.push(load_leaf(&mut reader, long_leaves)?);
    }
    check_alignment(&mut reader, leaf_lump.offset + leaf_lump.size as u64)?;

    let leaf_face_lump = lump(BspLumpId::LeafFaces);
    let leaf_face_count = leaf_face_lump.record_count(BspLumpId::LeafFaces, LEAF_INDEX_SIZE)?;
    reader.seek(SeekFrom::Start(leaf_face_lump.offset))?;
    let mut leaf_faces = Vec::with_capacity(leaf_face_count);
    for _ in 0..leaf_face_count {
        leaf_faces.push(reader.read_u16::<LittleEndian>()?);
    }

    let leaf_brush_lump = lump(BspLumpId::LeafBrushes);
    let leaf_brush_count = leaf_brush_lump.record_count(BspLumpId::LeafBrushes, LEAF_INDEX_SIZE)?;
    reader.seek(SeekFrom::Start(leaf_brush_lump.offset))?;
    let mut leaf_brushes = Vec::with_capacity(leaf_brush_count);
    for _ in 0..leaf_brush_count {
        leaf_brushes.push(reader.read_u16::<LittleEndian>()?);
    }

    let brush_lump = lump(BspLumpId::Brushes);
    let brush_count = brush_lump.record_count(BspLumpId::Brushes, BRUSH_SIZE)?;
    reader.seek(SeekFrom::Start(brush_lump.offset))?;
    let mut brushes = Vec::with_capacity(brush_count);
    for _ in 0..brush_count {
        brushes.push(load_brush(&mut reader)?);
    }

    let brush_side_lump = lump(BspLumpId::BrushSides);
    let brush_side_count = brush_side_lump.record_count(BspLumpId::BrushSides, BRUSH_SIDE_SIZE)?;
    reader.seek(SeekFrom::Start(brush_side_lump.offset))?;
    let mut brush_sides = Vec::with_capacity(brush_side_count);
    for _ in 0..brush_side_count {
        brush_sides.push(load_brush_side(&mut reader)?);
    }

    let disp_info_lump = lump(BspLumpId::DispInfo);
    let disp_info_count = disp_info_lump.record_count(BspLumpId::DispInfo, DISP_INFO_SIZE)?;
    reader.seek(SeekFrom::Start(disp_info_lump.offset))?;
    let mut disp_infos = Vec::with_capacity(disp_info_count);
    for _ in 0..disp_info_count {
        disp_infos.push(load_disp_info(&mut reader)?);
    }

    let disp_vert_lump = lump(BspLumpId::DispVerts);
    let disp_vert_count = disp_vert_lump.record_count(BspLumpId::DispVerts, DISP_VERT_SIZE)?;
    reader.seek(SeekFrom::Start(disp_vert_lump.offset))?;
    let mut disp_verts = Vec::with_capacity(disp_vert_count);
    for _ in 0..disp_vert_count {
        disp_verts.push(DispVert {
            vec: read_vector3(&mut reader)?,
            dist: reader.read_f32::<LittleEndian>()?,
            alpha: reader.read_f32::<LittleEndian>()?,
        });
    }

    let disp_tri_lump = lump(BspLumpId::DispTris);
    let disp_tri_count = disp_tri_lump.record_count(BspLumpId::DispTris, DISP_TRI_SIZE)?;
    reader.seek(SeekFrom::Start(disp_tri_lump.offset))?;
    let mut disp_tris = Vec::with_capacity(disp_tri_count);
    for _ in 0..disp_tri_count {
        disp_tris.push(DispTri {
            tags: reader.read_u16::<LittleEndian>()?,
        });
    }

    let ent_lump = lump(BspLumpId::Entities);
    reader.seek(SeekFrom::Start(ent_lump.offset))?;
    let mut ent_bytes = vec![0u8; ent_lump.size];
    reader.read_exact(&mut ent_bytes)?;
    while ent_bytes.last() == Some(&0) {
        ent_bytes.pop();
    }
    let entities = String::from_utf8_lossy(&ent_bytes).into_owned();

    let pak_lump = lump(BspLumpId::Pakfile);
    reader.seek(SeekFrom::Start(pak_lump.offset))?;
    let mut pakfile = vec![0u8; pak_lump.size];
    reader.read_exact(&mut pakfile)?;

    let static_props = load_game_lump(&mut reader, lump(BspLumpId::Game))
        .context("Failed to read static props")?;

    Ok(BspFile {
        planes,
        vertices,
        edges,
        surf_edges,
        faces,
        nodes,
        leaves,
        leaf_faces,
        leaf_brushes,
        brushes,
        brush_sides,
        disp_infos,
        disp_verts,
        disp_tris,
        entities,
        static_props,
        pakfile,
    })
}

/// Reads and parses a compiled level from the filesystem.
pub fn load_file<P>(path: P) -> Result<BspFile, Error>
where
    P: AsRef<Path>,
{
    let mut data = Vec::new();
    File::open(path)?.read_to_end(&mut data)?;

    load(&data)
}

#[cfg(test)]
mod test {
    use super::*;

    /// Assembles a minimal but well-formed version 21 image out of (lump id, payload) pairs.
    pub fn build_image(lumps: &[(usize, Vec<u8>)]) -> Vec<u8> {
        let header_size = 8 + LUMP_COUNT * 16 + 4;

        let mut directory = vec![(0i32, 0i32); LUMP_COUNT];
        let mut payload = Vec::new();

        for (id, data) in lumps {
            directory[*id] = ((header_size + payload.len()) as i32, data.len() as i32);
            payload.extend_from_slice(data);
        }

        let mut image = Vec::with_capacity(header_size + payload.len());
        image.extend_from_slice(&MAGIC.to_le_bytes());
        image.extend_from_slice(&21i32.to_le_bytes());
        for (offset, size) in directory {
            image.extend_from_slice(&offset.to_le_bytes());
            image.extend_from_slice(&size.to_le_bytes());
            image.extend_from_slice(&0i32.to_le_bytes());
            image.extend_from_slice(&0i32.to_le_bytes());
        }
        image.extend_from_slice(&1i32.to_le_bytes()); // map revision
        image.extend_from_slice(&payload);

        image
    }

    fn plane_bytes(normal: [f32; 3], dist: f32, axis_type: i32) -> Vec<u8> {
        let mut out = Vec::new();
        for c in normal.iter() {
            out.extend_from_slice(&c.to_le_bytes());
        }
        out.extend_from_slice(&dist.to_le_bytes());
        out.extend_from_slice(&axis_type.to_le_bytes());
        out
    }

    fn leaf_bytes(contents: i32, first_brush: u16, num_brushes: u16) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&contents.to_le_bytes());
        out.extend_from_slice(&0i16.to_le_bytes()); // cluster
        out.extend_from_slice(&0i16.to_le_bytes()); // area/flags
        for _ in 0..6 {
            out.extend_from_slice(&0i16.to_le_bytes()); // bounds
        }
        out.extend_from_slice(&0u16.to_le_bytes()); // first leaf face
        out.extend_from_slice(&0u16.to_le_bytes()); // leaf face count
        out.extend_from_slice(&first_brush.to_le_bytes());
        out.extend_from_slice(&num_brushes.to_le_bytes());
        out.extend_from_slice(&(-1i16).to_le_bytes()); // water data
        out.extend_from_slice(&0i16.to_le_bytes()); // padding
        out
    }

    fn node_bytes(plane_id: i32, children: [i32; 2]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&plane_id.to_le_bytes());
        out.extend_from_slice(&children[0].to_le_bytes());
        out.extend_from_slice(&children[1].to_le_bytes());
        for _ in 0..6 {
            out.extend_from_slice(&0i16.to_le_bytes());
        }
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0i16.to_le_bytes());
        out.extend_from_slice(&0i16.to_le_bytes());
        out
    }

    #[test]
    fn test_load_rejects_bad_magic() {
        let err = load(b"not a bsp file at all, sorry").unwrap_err();
        assert!(err.downcast_ref::<::std::io::Error>().is_none());
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_load_rejects_bad_version() {
        let mut image = build_image(&[]);
        image[4..8].copy_from_slice(&99i32.to_le_bytes());

        let err = load(&image).unwrap_err();
        assert!(err.downcast_ref::<::std::io::Error>().is_none());
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_load_rejects_misaligned_lump() {
        // a plane lump that is not a multiple of the record size
        let image = build_image(&[(BspLumpId::Planes as usize, vec![0u8; PLANE_SIZE + 1])]);

        let err = load(&image).unwrap_err();
        assert!(err.to_string().contains("Planes"));
    }

    #[test]
    fn test_load_file_missing() {
        let err = load_file("testdata/does_not_exist.bsp").unwrap_err();
        assert!(err.downcast_ref::<::std::io::Error>().is_some());
    }

    #[test]
    fn test_load_minimal_image() {
        let planes = plane_bytes([1.0, 0.0, 0.0], 0.0, 0);
        let nodes = node_bytes(0, [-1, -2]);
        let mut leaves = leaf_bytes(0, 0, 0);
        leaves.extend(leaf_bytes(1, 0, 1));

        let mut brushes = Vec::new();
        brushes.extend_from_slice(&0i32.to_le_bytes());
        brushes.extend_from_slice(&1i32.to_le_bytes());
        brushes.extend_from_slice(&1i32.to_le_bytes());

        let mut brush_sides = Vec::new();
        brush_sides.extend_from_slice(&0u16.to_le_bytes());
        brush_sides.extend_from_slice(&0i16.to_le_bytes());
        brush_sides.extend_from_slice(&(-1i16).to_le_bytes());
        brush_sides.extend_from_slice(&0i16.to_le_bytes());

        let leaf_brushes = 0u16.to_le_bytes().to_vec();

        let entities =
            b"{\n\"classname\" \"worldspawn\"\n}\n\0".to_vec();

        let image = build_image(&[
            (BspLumpId::Entities as usize, entities),
            (BspLumpId::Planes as usize, planes),
            (BspLumpId::Nodes as usize, nodes),
            (BspLumpId::Leaves as usize, leaves),
            (BspLumpId::LeafBrushes as usize, leaf_brushes),
            (BspLumpId::Brushes as usize, brushes),
            (BspLumpId::BrushSides as usize, brush_sides),
        ]);

        let bsp = load(&image).unwrap();
        assert_eq!(bsp.planes.len(), 1);
        assert_eq!(bsp.nodes.len(), 1);
        assert_eq!(bsp.leaves.len(), 2);
        assert_eq!(bsp.brushes.len(), 1);
        assert_eq!(bsp.brush_sides.len(), 1);
        assert_eq!(bsp.leaf_brushes.len(), 1);
        assert_eq!(bsp.nodes[0].children, [-1, -2]);
        assert_eq!(bsp.leaves[1].contents, Contents::SOLID);
        assert!(bsp.entities.contains("worldspawn"));
        assert!(bsp.static_props.placements.is_empty());
    }
}
