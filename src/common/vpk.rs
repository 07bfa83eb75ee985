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

//! Valve Pak (VPK) archive manipulation.
//!
//! A VPK package consists of a `<stem>_dir.vpk` directory file and any number of numbered
//! `<stem>_NNN.vpk` data archives. The directory holds a three-level string tree (extension,
//! path, file name) of entries; each entry locates its data either in a numbered archive, or --
//! for archive index `0x7FFF` -- in the data section of the directory file itself, optionally
//! preceded by a small "preload" chunk stored inline in the tree.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::common::util::read_cstring;

use byteorder::{LittleEndian, ReadBytesExt};
use failure::Error;

const VPK_MAGIC: u32 = 0x55AA1234;

// entries with this archive index live in the directory file's own data section
const ARCHIVE_INDEX_DIR: u16 = 0x7FFF;

#[derive(Debug)]
struct VpkEntry {
    archive_index: u16,
    offset: u32,
    length: u32,
    preload: Vec<u8>,
}

/// An indexed VPK package.
#[derive(Debug)]
pub struct Vpk {
    dir_path: PathBuf,
    base: String,
    data_offset: u64,
    entries: HashMap<String, VpkEntry>,
}

impl Vpk {
    /// Indexes the package with the given stem path, e.g. `csgo/pak01` for
    /// `csgo/pak01_dir.vpk` and friends.
    pub fn open<P>(stem: P) -> Result<Vpk, Error>
    where
        P: AsRef<Path>,
    {
        let base = stem.as_ref().to_string_lossy().into_owned();
        let dir_path = PathBuf::from(format!("{}_dir.vpk", base));

        let mut reader = BufReader::new(File::open(&dir_path)?);

        let magic = reader.read_u32::<LittleEndian>()?;
        ensure!(magic == VPK_MAGIC, "Bad magic number (not a VPK directory)");

        let version = reader.read_u32::<LittleEndian>()?;
        let tree_size = reader.read_u32::<LittleEndian>()?;

        let header_len = match version {
            1 => 12,
            2 => {
                // file data / checksum / signature section sizes
                for _ in 0..4 {
                    reader.read_u32::<LittleEndian>()?;
                }
                28
            }
            v => bail!("Unsupported VPK version {}", v),
        };

        let mut entries = HashMap::new();

        loop {
            let ext = read_cstring(&mut reader)?;
            if ext.is_empty() {
                break;
            }

            loop {
                let dir = read_cstring(&mut reader)?;
                if dir.is_empty() {
                    break;
                }

                loop {
                    let name = read_cstring(&mut reader)?;
                    if name.is_empty() {
                        break;
                    }

                    let _crc = reader.read_u32::<LittleEndian>()?;
                    let preload_len = reader.read_u16::<LittleEndian>()?;
                    let archive_index = reader.read_u16::<LittleEndian>()?;
                    let offset = reader.read_u32::<LittleEndian>()?;
                    let length = reader.read_u32::<LittleEndian>()?;

                    let terminator = reader.read_u16::<LittleEndian>()?;
                    ensure!(terminator == 0xFFFF, "Bad entry terminator {:#x}", terminator);

                    let mut preload = vec![0u8; preload_len as usize];
                    reader.read_exact(&mut preload)?;

                    // a single space marks the empty path segment
                    let path = if dir == " " || dir.is_empty() {
                        format!("{}.{}", name, ext)
                    } else {
                        format!("{}/{}.{}", dir, name, ext)
                    };

                    entries.insert(
                        path,
                        VpkEntry {
                            archive_index,
                            offset,
                            length,
                            preload,
                        },
                    );
                }
            }
        }

        debug!("{}: indexed {} files", dir_path.display(), entries.len());

        Ok(Vpk {
            dir_path,
            base,
            data_offset: header_len + tree_size as u64,
            entries,
        })
    }

    /// Reads a packaged file in full.
    pub fn read(&self, path: &str) -> Result<Vec<u8>, Error> {
        let entry = match self.entries.get(path) {
            Some(e) => e,
            None => bail!("{} not found in {}", path, self.dir_path.display()),
        };

        let mut data = entry.preload.clone();

        if entry.length > 0 {
            let (archive_path, offset) = if entry.archive_index == ARCHIVE_INDEX_DIR {
                (self.dir_path.clone(), self.data_offset + entry.offset as u64)
            } else {
                (
                    PathBuf::from(format!("{}_{:03}.vpk", self.base, entry.archive_index)),
                    entry.offset as u64,
                )
            };

            let mut archive = File::open(archive_path)?;
            archive.seek(SeekFrom::Start(offset))?;
            let mut rest = vec![0u8; entry.length as usize];
            archive.read_exact(&mut rest)?;
            data.append(&mut rest);
        }

        Ok(data)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
