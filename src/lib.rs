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

//! Line-of-sight and collision ray queries against compiled Source engine levels.
//!
//! A [`Map`](world/struct.Map.html) is assembled once from a `.bsp` file (and, optionally, the
//! VPK archives holding static prop models), after which any number of threads may ask it
//! visibility questions:
//!
//! ```no_run
//! use cgmath::Vector3;
//! use sightline::world::{Map, MapError};
//!
//! let (map, missing) = Map::load("de_cache.bsp", &[]).unwrap();
//! if let Some(MapError::MissingModels { paths }) = missing {
//!     eprintln!("loaded without {} prop models", paths.len());
//! }
//!
//! let a_site = Vector3::new(-233.0, 1343.0, 1751.0);
//! let t_spawn = Vector3::new(3306.0, 431.0, 1723.0);
//! assert!(!map.is_visible(t_spawn, a_site));
//! ```

#[macro_use]
extern crate bitflags;
extern crate byteorder;
extern crate cgmath;
#[macro_use]
extern crate failure;
#[cfg(test)]
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
#[macro_use]
extern crate nom;
extern crate num;
#[macro_use]
extern crate num_derive;
extern crate zip;

pub mod common;
pub mod world;
