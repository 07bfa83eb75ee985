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

//! Studio model handling.
//!
//! A model on disk is a family of files sharing a stem: `.mdl` (skeleton and metadata), `.vvd`
//! (render vertices), `.dx90.vtx` (strip data) and optionally `.phy` (collision mesh). The
//! first three are required for a model to resolve at all; only the `.phy` mesh is consumed by
//! ray queries, so the others are parsed just deeply enough to validate them and to recover the
//! bone table.

pub mod phy;

use std::fmt;
use std::io::{self, Cursor, Read, Seek, SeekFrom};

use crate::common::math::Mat3x4;
use crate::common::vfs::{Vfs, VfsError};

use byteorder::{LittleEndian, ReadBytesExt};
use cgmath::Vector3;

const MDL_MAGIC: i32 = ('I' as i32) | ('D' as i32) << 8 | ('S' as i32) << 16 | ('T' as i32) << 24;
const VVD_MAGIC: i32 = ('I' as i32) | ('D' as i32) << 8 | ('S' as i32) << 16 | ('V' as i32) << 24;
const VTX_VERSION: i32 = 7;

const MDL_NAME_SIZE: usize = 64;
const MDL_BONE_COUNT_OFFSET: u64 = 156;
const MDL_BONE_SIZE: usize = 216;

#[derive(Debug, Fail)]
pub enum StudioError {
    #[fail(display = "{} not found", _0)]
    NotFound(String),
    #[fail(display = "{}", _0)]
    Io(#[cause] io::Error),
    #[fail(display = "bad model data: {}", _0)]
    Format(String),
}

impl StudioError {
    pub(crate) fn format<S>(msg: S) -> StudioError
    where
        S: fmt::Display,
    {
        StudioError::Format(msg.to_string())
    }
}

impl From<io::Error> for StudioError {
    fn from(error: io::Error) -> Self {
        StudioError::Io(error)
    }
}

impl From<VfsError> for StudioError {
    fn from(error: VfsError) -> Self {
        match error {
            VfsError::NotFound(path) => StudioError::NotFound(path),
            VfsError::Io(e) => StudioError::Io(e),
        }
    }
}

/// A bone of the model skeleton; only the fields the collision path needs.
#[derive(Debug)]
pub struct Bone {
    pub pos: Vector3<f32>,
    pub pose_to_bone: Mat3x4,
}

#[derive(Debug)]
pub struct Mdl {
    pub version: i32,
    pub checksum: i32,
    pub name: String,
    pub bones: Vec<Bone>,
}

#[derive(Debug)]
pub struct Vvd {
    pub version: i32,
    pub checksum: i32,
    pub num_lods: i32,
    pub lod_vertex_count: i32,
}

#[derive(Debug)]
pub struct Vtx {
    pub checksum: i32,
    pub num_lods: i32,
    pub num_body_parts: i32,
}

/// The loaded file family of one model.
#[derive(Debug)]
pub struct StudioModel {
    pub name: String,
    pub mdl: Mdl,
    pub vvd: Vvd,
    pub vtx: Vtx,
    pub phy: Option<phy::Phy>,
}

fn read_vector3<R>(reader: &mut R) -> Result<Vector3<f32>, StudioError>
where
    R: ReadBytesExt,
{
    Ok(Vector3::new(
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
    ))
}

fn load_bone(reader: &mut Cursor<&[u8]>) -> Result<Bone, StudioError> {
    let bone_start = reader.seek(SeekFrom::Current(0))?;

    // name index, parent, bone controllers
    reader.seek(SeekFrom::Current(4 + 4 + 6 * 4))?;

    let pos = read_vector3(reader)?;

    // quaternion, radian euler, position scale, rotation scale
    reader.seek(SeekFrom::Current((4 + 3 + 3 + 3) * 4))?;

    // pose-to-bone is stored as three rows of four; our Mat3x4 is four columns of three
    let mut rows = [[0f32; 4]; 3];
    for row in rows.iter_mut() {
        for v in row.iter_mut() {
            *v = reader.read_f32::<LittleEndian>()?;
        }
    }
    let mut pose_to_bone: Mat3x4 = [[0.0; 3]; 4];
    for col in 0..4 {
        for row in 0..3 {
            pose_to_bone[col][row] = rows[row][col];
        }
    }

    reader.seek(SeekFrom::Start(bone_start + MDL_BONE_SIZE as u64))?;

    Ok(Bone { pos, pose_to_bone })
}

pub fn load_mdl(data: &[u8]) -> Result<Mdl, StudioError> {
    let mut reader = Cursor::new(data);

    let magic = reader.read_i32::<LittleEndian>()?;
    if magic != MDL_MAGIC {
        return Err(StudioError::format("bad mdl magic number"));
    }

    let version = reader.read_i32::<LittleEndian>()?;
    let checksum = reader.read_i32::<LittleEndian>()?;

    let mut name_bytes = [0u8; MDL_NAME_SIZE];
    reader.read_exact(&mut name_bytes)?;
    let name_len = name_bytes
        .iter()
        .position(|b| *b == 0)
        .unwrap_or(MDL_NAME_SIZE);
    let name = String::from_utf8_lossy(&name_bytes[..name_len]).into_owned();

    let length = reader.read_i32::<LittleEndian>()?;
    if length as usize != data.len() {
        debug!(
            "{}: header length {} != file length {}",
            name,
            length,
            data.len()
        );
    }

    reader.seek(SeekFrom::Start(MDL_BONE_COUNT_OFFSET))?;
    let bone_count = reader.read_i32::<LittleEndian>()?;
    let bone_offset = reader.read_i32::<LittleEndian>()?;

    if bone_count < 0 || bone_offset < 0 {
        return Err(StudioError::format("bad mdl bone table"));
    }

    reader.seek(SeekFrom::Start(bone_offset as u64))?;
    let mut bones = Vec::with_capacity(bone_count as usize);
    for _ in 0..bone_count {
        bones.push(load_bone(&mut reader)?);
    }

    Ok(Mdl {
        version,
        checksum,
        name,
        bones,
    })
}

pub fn load_vvd(data: &[u8]) -> Result<Vvd, StudioError> {
    let mut reader = Cursor::new(data);

    let magic = reader.read_i32::<LittleEndian>()?;
    if magic != VVD_MAGIC {
        return Err(StudioError::format("bad vvd magic number"));
    }

    let version = reader.read_i32::<LittleEndian>()?;
    let checksum = reader.read_i32::<LittleEndian>()?;
    let num_lods = reader.read_i32::<LittleEndian>()?;
    let lod_vertex_count = reader.read_i32::<LittleEndian>()?;

    Ok(Vvd {
        version,
        checksum,
        num_lods,
        lod_vertex_count,
    })
}

pub fn load_vtx(data: &[u8]) -> Result<Vtx, StudioError> {
    let mut reader = Cursor::new(data);

    let version = reader.read_i32::<LittleEndian>()?;
    if version != VTX_VERSION {
        return Err(StudioError::format(format_args!(
            "bad vtx version (found {}, should be {})",
            version, VTX_VERSION
        )));
    }

    // vertex cache size, bone limits
    reader.read_i32::<LittleEndian>()?;
    reader.read_u16::<LittleEndian>()?;
    reader.read_u16::<LittleEndian>()?;
    reader.read_i32::<LittleEndian>()?;

    let checksum = reader.read_i32::<LittleEndian>()?;
    let num_lods = reader.read_i32::<LittleEndian>()?;

    // material replacement list offset
    reader.read_i32::<LittleEndian>()?;

    let num_body_parts = reader.read_i32::<LittleEndian>()?;

    Ok(Vtx {
        checksum,
        num_lods,
        num_body_parts,
    })
}

/// Resolves and parses the file family of a single model.
///
/// `path` may carry the `.mdl` suffix the prop dictionary uses. A missing `.phy` is fine (the
/// model simply has no collision mesh); a missing or malformed `.mdl`, `.vvd` or `.dx90.vtx`
/// fails the model.
pub fn load_model(vfs: &mut Vfs, path: &str) -> Result<StudioModel, StudioError> {
    let stem = match path.find(".mdl") {
        Some(at) => &path[..at],
        None => path,
    };

    let mdl = load_mdl(&vfs.open(&format!("{}.mdl", stem))?)?;
    let vvd = load_vvd(&vfs.open(&format!("{}.vvd", stem))?)?;
    let vtx = load_vtx(&vfs.open(&format!("{}.dx90.vtx", stem))?)?;

    if vvd.checksum != mdl.checksum || vtx.checksum != mdl.checksum {
        warn!(
            "{}: checksum mismatch (mdl {}, vvd {}, vtx {})",
            stem, mdl.checksum, vvd.checksum, vtx.checksum
        );
    }

    let phy = match vfs.open(&format!("{}.phy", stem)) {
        Ok(data) => Some(phy::load(&data)?),
        Err(VfsError::NotFound(_)) => None,
        Err(why) => return Err(why.into()),
    };

    Ok(StudioModel {
        name: stem.to_owned(),
        mdl,
        vvd,
        vtx,
        phy,
    })
}
