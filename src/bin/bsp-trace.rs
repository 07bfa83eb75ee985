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

extern crate cgmath;
extern crate docopt;
extern crate env_logger;
extern crate sightline;
#[macro_use]
extern crate serde_derive;

use std::path::PathBuf;
use std::process::exit;

use cgmath::Vector3;
use docopt::Docopt;
use sightline::world::{Map, MapError};

const USAGE: &'static str = "
Trace a ray through a compiled Source engine level.

Usage: bsp-trace <bsp> --from=<point> --to=<point> [--vpk=<stem>]...
       bsp-trace --help

Options:
    --from=<point>  Ray origin as x,y,z.
    --to=<point>    Ray destination as x,y,z.
    --vpk=<stem>    VPK package stem for prop models (e.g. csgo/pak01); repeatable.
    -h, --help      Show this message.
";

#[derive(Debug, Deserialize)]
struct Args {
    arg_bsp: String,
    flag_from: String,
    flag_to: String,
    flag_vpk: Vec<String>,
}

fn parse_point(src: &str) -> Option<Vector3<f32>> {
    let parts: Vec<&str> = src.split(',').collect();
    if parts.len() != 3 {
        return None;
    }

    Some(Vector3::new(
        parts[0].trim().parse().ok()?,
        parts[1].trim().parse().ok()?,
        parts[2].trim().parse().ok()?,
    ))
}

fn main() {
    env_logger::init();

    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.deserialize())
        .unwrap_or_else(|e| e.exit());

    let origin = match parse_point(&args.flag_from) {
        Some(p) => p,
        None => {
            println!("Couldn't parse --from={}", args.flag_from);
            exit(1);
        }
    };

    let destination = match parse_point(&args.flag_to) {
        Some(p) => p,
        None => {
            println!("Couldn't parse --to={}", args.flag_to);
            exit(1);
        }
    };

    let vpks: Vec<PathBuf> = args.flag_vpk.iter().map(PathBuf::from).collect();

    let (map, missing) = match Map::load(&args.arg_bsp, &vpks) {
        Ok(loaded) => loaded,
        Err(why) => {
            println!("Couldn't load {}: {}", args.arg_bsp, why);
            exit(1);
        }
    };

    if let Some(MapError::MissingModels { paths }) = missing {
        println!(
            "note: {} prop models unresolved; traces ignore the affected props",
            paths.len()
        );
    }

    let trace = map.trace_ray(origin, destination);

    println!("visible: {}", map.is_visible(origin, destination));
    println!("{:#?}", trace);
}
