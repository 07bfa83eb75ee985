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

//! Source engine (VBSP) level container handling.
//!
//! # File Format
//!
//! A compiled level starts with the magic number `VBSP` and a 32-bit version (19 through 21 are
//! accepted here), followed by a directory of 64 "lumps": 32-bit offset, 32-bit size, a lump
//! format version and an uncompressed-size field used only by console builds. Everything
//! interesting lives behind this directory; lumps not listed below are left untouched.
//!
//! ## Geometry lumps
//!
//! Planes (lump 1) are stored in point-normal form with a precomputed axis type; types 0-2 mark
//! planes whose normal is a positive coordinate axis, which the tracer exploits as a fast path.
//!
//! Nodes (lump 5) form the binary space partitioning tree. Each node stores a plane index and
//! two child indices; a non-negative child refers to another node, while a negative child `c`
//! refers to leaf `-c - 1`. Leaves (lump 10) hold a contents bitmask and ranges into the
//! `leaf_faces` (16) and `leaf_brushes` (17) indirection arrays. Version 19 files pad each leaf
//! with an ambient light cube which is parsed and discarded.
//!
//! Faces (lump 7) describe boundary polygons by a range into `surf_edges` (13), whose entries
//! are signed indices into `edges` (12): the absolute value selects the edge, the sign selects
//! which of its two vertices (3) leads.
//!
//! Brushes (lump 18) are convex solids: a range of brush sides (19), each referencing a plane,
//! plus a contents bitmask. Sides flagged as bevels exist only for swept-box collision and are
//! skipped by point-ray queries.
//!
//! ## Auxiliary lumps
//!
//! The entities lump (0) is a NUL-terminated text blob of key/value blocks. The game lump (35)
//! is a container of its own; the `sprp` sub-lump carries the static prop dictionary, per-prop
//! placements and the prop-to-leaf table. The pakfile lump (40) is a plain zip archive embedded
//! in the level, which takes priority when resolving prop model files. Displacement data
//! (26/33/48) is parsed for completeness but not intersected against.

mod load;

pub use self::load::{load, load_file};

use crate::common::math::Hyperplane;

use cgmath::Vector3;

bitflags! {
    /// Material contents of a brush or leaf, from the engine's `bspflags.h`.
    pub struct Contents: i32 {
        const SOLID = 0x1;
        const WINDOW = 0x2;
        const AUX = 0x4;
        const GRATE = 0x8;
        const SLIME = 0x10;
        const WATER = 0x20;
        const BLOCKLOS = 0x40;
        const OPAQUE = 0x80;
        const TESTFOGVOLUME = 0x100;
        const UNUSED = 0x200;
        const UNUSED6 = 0x400;
        const TEAM1 = 0x800;
        const TEAM2 = 0x1000;
        const IGNORE_NODRAW_OPAQUE = 0x2000;
        const MOVEABLE = 0x4000;
        const AREAPORTAL = 0x8000;
        const PLAYERCLIP = 0x10000;
        const MONSTERCLIP = 0x20000;
        const CURRENT_0 = 0x40000;
        const CURRENT_90 = 0x80000;
        const CURRENT_180 = 0x100000;
        const CURRENT_270 = 0x200000;
        const CURRENT_UP = 0x400000;
        const CURRENT_DOWN = 0x800000;
        const ORIGIN = 0x1000000;
        const MONSTER = 0x2000000;
        const DEBRIS = 0x4000000;
        const DETAIL = 0x8000000;
        const TRANSLUCENT = 0x10000000;
        const LADDER = 0x20000000;
        const HITBOX = 0x40000000;

        /// Everything a hitscan trace collides with.
        const MASK_SHOT_HULL = Self::SOLID.bits
            | Self::MOVEABLE.bits
            | Self::MONSTER.bits
            | Self::WINDOW.bits
            | Self::DEBRIS.bits
            | Self::GRATE.bits;
    }
}

/// An internal node of the space partitioning tree.
#[derive(Debug)]
pub struct Node {
    pub plane_id: usize,
    /// Child indices: non-negative values refer to `nodes`, a negative value `c` refers to
    /// leaf `-c - 1`.
    pub children: [i32; 2],
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub face_id: u16,
    pub face_count: u16,
    pub area: i16,
}

/// A convex cell of the space partitioning tree.
#[derive(Debug)]
pub struct Leaf {
    pub contents: Contents,
    pub cluster: i16,
    pub area_flags: i16,
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub first_leaf_face: u16,
    pub num_leaf_faces: u16,
    pub first_leaf_brush: u16,
    pub num_leaf_brushes: u16,
    pub water_data_id: i16,
}

#[derive(Debug)]
pub struct Face {
    pub plane_id: u16,
    pub side: u8,
    pub on_node: u8,
    pub first_edge: i32,
    pub num_edges: i16,
    pub tex_info: i16,
    pub disp_info: i16,
}

#[derive(Debug)]
pub struct Edge {
    pub vertex_ids: [u16; 2],
}

/// A convex solid defined as the intersection of its sides' half-spaces.
#[derive(Debug)]
pub struct Brush {
    pub first_side: i32,
    pub num_sides: i32,
    pub contents: Contents,
}

#[derive(Debug)]
pub struct BrushSide {
    pub plane_id: u16,
    pub tex_info: i16,
    pub disp_info: i16,
    /// Non-zero in the low byte for bevel planes, which only matter to swept-box traces.
    pub bevel: i16,
}

#[derive(Debug)]
pub struct DispInfo {
    pub start_position: Vector3<f32>,
    pub disp_vert_start: i32,
    pub disp_tri_start: i32,
    pub power: i32,
    pub contents: i32,
    pub map_face: u16,
}

#[derive(Debug)]
pub struct DispVert {
    pub vec: Vector3<f32>,
    pub dist: f32,
    pub alpha: f32,
}

#[derive(Debug)]
pub struct DispTri {
    pub tags: u16,
}

/// How a static prop participates in collision.
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
pub enum PropSolid {
    None = 0,
    Bsp = 1,
    BBox = 2,
    Obb = 3,
    ObbYaw = 4,
    Custom = 5,
    VPhysics = 6,
}

/// A single static prop placement from the `sprp` game lump.
#[derive(Clone, Debug)]
pub struct PropPlacement {
    pub origin: Vector3<f32>,
    pub angles: Vector3<f32>,
    pub prop_type: u16,
    pub first_leaf: u16,
    pub leaf_count: u16,
    pub solid: PropSolid,
    pub flags: u8,
}

/// Contents of the `sprp` game sub-lump.
#[derive(Debug, Default)]
pub struct StaticPropLump {
    /// Model dictionary; `PropPlacement::prop_type` indexes into it.
    pub names: Vec<String>,
    /// Flattened prop-to-leaf table; each placement owns a range of it.
    pub leaf_indices: Vec<u16>,
    pub placements: Vec<PropPlacement>,
}

/// A parsed level container: every lump the tracer consumes, in load order.
#[derive(Debug)]
pub struct BspFile {
    pub planes: Vec<Hyperplane>,
    pub vertices: Vec<Vector3<f32>>,
    pub edges: Vec<Edge>,
    pub surf_edges: Vec<i32>,
    pub faces: Vec<Face>,
    pub nodes: Vec<Node>,
    pub leaves: Vec<Leaf>,
    pub leaf_faces: Vec<u16>,
    pub leaf_brushes: Vec<u16>,
    pub brushes: Vec<Brush>,
    pub brush_sides: Vec<BrushSide>,
    pub disp_infos: Vec<DispInfo>,
    pub disp_verts: Vec<DispVert>,
    pub disp_tris: Vec<DispTri>,
    pub entities: String,
    pub static_props: StaticPropLump,
    pub pakfile: Vec<u8>,
}
