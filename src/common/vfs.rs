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

//! Virtual filesystem over a level's embedded pakfile and its VPK packages.
//!
//! Prop model paths are resolved against, in order: the zip archive embedded in the level
//! (exact match first, then case-insensitively), then each VPK package in the order given.
//! Zero-length archive members are treated as absent, matching engine behavior.

use std::collections::HashMap;
use std::io::{self, Cursor, Read};

use crate::common::vpk::Vpk;

use zip::ZipArchive;

#[derive(Debug, Fail)]
pub enum VfsError {
    #[fail(display = "{}", _0)]
    Io(#[cause] io::Error),
    #[fail(display = "{} not found", _0)]
    NotFound(String),
}

impl From<io::Error> for VfsError {
    fn from(error: io::Error) -> Self {
        VfsError::Io(error)
    }
}

pub struct Vfs {
    pakfile: Option<ZipArchive<Cursor<Vec<u8>>>>,
    // lowercased member name -> stored member name
    pakfile_index: HashMap<String, String>,
    vpks: Vec<Vpk>,
}

impl Vfs {
    /// Layers a filesystem over the given pakfile lump bytes and VPK packages.
    ///
    /// A missing or unreadable pakfile archive is not an error; the layer is simply skipped.
    pub fn new(pakfile: Vec<u8>, vpks: Vec<Vpk>) -> Vfs {
        let mut pakfile_index = HashMap::new();

        let pakfile = match ZipArchive::new(Cursor::new(pakfile)) {
            Ok(mut archive) => {
                for i in 0..archive.len() {
                    if let Ok(member) = archive.by_index(i) {
                        pakfile_index.insert(member.name().to_lowercase(), member.name().to_owned());
                    }
                }
                Some(archive)
            }
            Err(why) => {
                debug!("no usable pakfile archive: {}", why);
                None
            }
        };

        Vfs {
            pakfile,
            pakfile_index,
            vpks,
        }
    }

    /// Opens a file and reads it in full.
    ///
    /// `VfsError::NotFound` means no layer knows the path; any other error is a hard failure of
    /// a layer that does.
    pub fn open(&mut self, path: &str) -> Result<Vec<u8>, VfsError> {
        if let Some(ref mut archive) = self.pakfile {
            let name = if archive.by_name(path).is_ok() {
                Some(path.to_owned())
            } else {
                self.pakfile_index.get(&path.to_lowercase()).cloned()
            };

            if let Some(name) = name {
                let mut member = archive.by_name(&name).map_err(|why| {
                    VfsError::Io(io::Error::new(io::ErrorKind::Other, why.to_string()))
                })?;

                if member.size() > 0 {
                    let mut data = Vec::with_capacity(member.size() as usize);
                    member.read_to_end(&mut data)?;
                    return Ok(data);
                }
            }
        }

        for vpk in &self.vpks {
            if vpk.contains(path) {
                match vpk.read(path) {
                    Ok(ref data) if data.is_empty() => continue,
                    Ok(data) => return Ok(data),
                    Err(why) => {
                        warn!("{}: {}", path, why);
                        continue;
                    }
                }
            }
        }

        Err(VfsError::NotFound(path.to_owned()))
    }
}
