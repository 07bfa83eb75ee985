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

//! The queryable world: an immutable [`Map`] assembled from a level's raw lumps, and the ray
//! queries that run against it.
//!
//! All cross references inside a `Map` are indices into flat arrays, so a loaded map has no
//! interior mutability and can be shared freely between threads.

mod collide;
mod trace;

pub use self::trace::Trace;

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::common::bsp::{
    self, Brush, BrushSide, BspFile, Edge, Face, Leaf, Node, PropPlacement, PropSolid,
    StaticPropLump,
};
use crate::common::math::{bounds, euler_rotation, transform_point, vector_i_transform, Hyperplane};
use crate::common::parse;
use crate::common::studio::{self, Bone, StudioModel};
use crate::common::vfs::Vfs;
use crate::common::vpk::Vpk;

use cgmath::{InnerSpace, Vector3, Zero};

/// The most vertices a face may contribute to a built polygon.
pub const MAX_SURFINFO_VERTS: usize = 32;

// physics meshes are authored in metres; the map is in inches
const METERS_TO_UNITS: f32 = 1.0 / 0.0254;

#[derive(Debug, Fail)]
pub enum MapError {
    #[fail(display = "{}", _0)]
    Io(#[cause] io::Error),
    #[fail(display = "bad map data: {}", _0)]
    Format(String),
    /// Static prop models that could not be resolved while loading a map.
    ///
    /// The map is returned alongside this error and is fully usable; traces simply pass
    /// through the affected props.
    #[fail(display = "missing models: {:?}", paths)]
    MissingModels { paths: Vec<String> },
}

impl From<failure::Error> for MapError {
    fn from(error: failure::Error) -> Self {
        // the loaders bubble their original I/O failures up through the failure chain
        match error.downcast::<io::Error>() {
            Ok(io) => MapError::Io(io),
            Err(other) => MapError::Format(other.to_string()),
        }
    }
}

/// A face promoted to an oriented convex polygon with per-edge separating planes.
#[derive(Clone, Debug)]
pub struct Polygon {
    verts: [Vector3<f32>; MAX_SURFINFO_VERTS],
    num_verts: usize,
    plane: Hyperplane,
    edge_planes: Vec<Hyperplane>,
}

impl Default for Polygon {
    fn default() -> Polygon {
        Polygon {
            verts: [Vector3::zero(); MAX_SURFINFO_VERTS],
            num_verts: 0,
            plane: Hyperplane::from_normal(Vector3::zero(), 0.0),
            edge_planes: Vec::new(),
        }
    }
}

impl Polygon {
    pub fn verts(&self) -> &[Vector3<f32>] {
        &self.verts[..self.num_verts]
    }

    fn compute_edge_planes(&mut self) {
        let n = self.num_verts;
        self.edge_planes = Vec::with_capacity(n);

        for i in 0..n {
            // faithful to the upstream construction, unusual as it is: the edge direction is
            // subtracted from the face normal before normalizing
            let normal =
                (self.plane.normal() - (self.verts[i] - self.verts[(i + 1) % n])).normalize();
            let dist = normal.dot(self.verts[i]);
            self.edge_planes.push(Hyperplane::from_normal(normal, dist));
        }
    }
}

/// One placed static prop with its collision geometry in world space.
#[derive(Clone, Debug)]
pub struct StaticProp {
    pub origin: Vector3<f32>,
    pub angles: Vector3<f32>,
    pub solid: PropSolid,
    pub prop_type: u16,
    pub triangles: Vec<[Vector3<f32>; 3]>,
    pub mins: Vector3<f32>,
    pub maxs: Vector3<f32>,
}

/// An immutable, queryable level.
#[derive(Debug)]
pub struct Map {
    brushes: Vec<Brush>,
    brush_sides: Vec<BrushSide>,
    edges: Vec<Edge>,
    leaf_brushes: Vec<u16>,
    leaf_faces: Vec<u16>,
    leaves: Vec<Leaf>,
    nodes: Vec<Node>,
    planes: Vec<Hyperplane>,
    surfaces: Vec<Face>,
    surf_edges: Vec<i32>,
    vertices: Vec<Vector3<f32>>,

    polygons: Vec<Polygon>,
    static_props: HashMap<u16, Vec<StaticProp>>,
    entities: Vec<HashMap<String, String>>,
}

impl Map {
    /// Loads a map from a `.bsp` file, resolving static prop models against the level's
    /// embedded pakfile and the given VPK package stems (e.g. `…/csgo/pak01`).
    ///
    /// Unresolvable models are reported alongside the map as
    /// [`MapError::MissingModels`](enum.MapError.html) rather than failing the load; the
    /// returned map answers every query, it merely cannot collide with props whose models are
    /// gone.
    pub fn load<P>(path: P, vpk_stems: &[PathBuf]) -> Result<(Map, Option<MapError>), MapError>
    where
        P: AsRef<Path>,
    {
        let bsp = bsp::load_file(path)?;

        let mut vpks = Vec::with_capacity(vpk_stems.len());
        for stem in vpk_stems {
            vpks.push(Vpk::open(stem)?);
        }

        Ok(Map::from_bsp(bsp, vpks))
    }

    /// Assembles a map from an already-parsed level container.
    pub fn from_bsp(bsp: BspFile, vpks: Vec<Vpk>) -> (Map, Option<MapError>) {
        let BspFile {
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
            entities,
            static_props,
            pakfile,
            ..
        } = bsp;

        let mut vfs = Vfs::new(pakfile, vpks);

        let mut models: Vec<Option<StudioModel>> = Vec::with_capacity(static_props.names.len());
        let mut missing = Vec::new();
        for name in &static_props.names {
            match studio::load_model(&mut vfs, name) {
                Ok(model) => models.push(Some(model)),
                Err(why) => {
                    debug!("{}: {}", name, why);
                    missing.push(name.clone());
                    models.push(None);
                }
            }
        }

        let polygons = build_polygons(&faces, &planes, &edges, &surf_edges, &vertices);
        let prop_index = index_static_props(&static_props, &models);

        let entities = match parse::entities(&entities) {
            Some(parsed) => parsed,
            None => {
                warn!("unparseable entity lump, continuing without entities");
                Vec::new()
            }
        };

        let map = Map {
            brushes,
            brush_sides,
            edges,
            leaf_brushes,
            leaf_faces,
            leaves,
            nodes,
            planes,
            surfaces: faces,
            surf_edges,
            vertices,
            polygons,
            static_props: prop_index,
            entities,
        };

        let missing = if missing.is_empty() {
            None
        } else {
            info!("{} static prop models could not be resolved", missing.len());
            Some(MapError::MissingModels { paths: missing })
        };

        (map, missing)
    }

    pub fn brushes(&self) -> &[Brush] {
        &self.brushes
    }

    pub fn brush_sides(&self) -> &[BrushSide] {
        &self.brush_sides
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn leaf_brushes(&self) -> &[u16] {
        &self.leaf_brushes
    }

    pub fn leaf_faces(&self) -> &[u16] {
        &self.leaf_faces
    }

    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn planes(&self) -> &[Hyperplane] {
        &self.planes
    }

    pub fn surfaces(&self) -> &[Face] {
        &self.surfaces
    }

    pub fn surf_edges(&self) -> &[i32] {
        &self.surf_edges
    }

    pub fn vertices(&self) -> &[Vector3<f32>] {
        &self.vertices
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    /// Static props indexed by the leaves they occupy.
    pub fn static_props(&self) -> &HashMap<u16, Vec<StaticProp>> {
        &self.static_props
    }

    /// The parsed entity dictionaries of the entities lump.
    pub fn entities(&self) -> &[HashMap<String, String>] {
        &self.entities
    }
}

/// Promotes raw faces to oriented polygons.
///
/// The list starts with one zeroed polygon per raw face, with the built polygons appended
/// after. Downstream code indexes this list by face id, landing in the zeroed range; the
/// reference implementation behaves this way and the fixture counts depend on it, so it is
/// preserved rather than repaired.
fn build_polygons(
    faces: &[Face],
    planes: &[Hyperplane],
    edges: &[Edge],
    surf_edges: &[i32],
    vertices: &[Vector3<f32>],
) -> Vec<Polygon> {
    let mut polygons = vec![Polygon::default(); faces.len()];

    for face in faces {
        let first_edge = face.first_edge as usize;
        let num_edges = face.num_edges as i64;

        if num_edges < 3 || num_edges > MAX_SURFINFO_VERTS as i64 || face.tex_info <= 0 {
            continue;
        }

        let mut poly = Polygon::default();

        for i in 0..num_edges as usize {
            let edge_index = surf_edges[first_edge + i];
            let vert = if edge_index >= 0 {
                vertices[edges[edge_index as usize].vertex_ids[0] as usize]
            } else {
                vertices[edges[(-edge_index) as usize].vertex_ids[1] as usize]
            };

            poly.verts[i] = vert;
        }

        poly.num_verts = num_edges as usize;

        let plane = &planes[face.plane_id as usize];
        poly.plane = Hyperplane::from_normal(plane.normal(), plane.dist());
        poly.compute_edge_planes();

        polygons.push(poly);
    }

    debug!("built {} polygons from {} faces", polygons.len(), faces.len());

    polygons
}

/// Converts a physics mesh vertex into map units and axes.
///
/// Bone-parented geometry is additionally pulled through the bone's inverse pose transform;
/// static props have no bones and take the plain branch.
fn transform_phy_vertex(bone: Option<&Bone>, vertex: Vector3<f32>) -> Vector3<f32> {
    match bone {
        Some(bone) => {
            let out = Vector3::new(vertex.x, vertex.z, -vertex.y) * METERS_TO_UNITS;
            vector_i_transform(out, &bone.pose_to_bone)
        }
        None => Vector3::new(vertex.z, -vertex.x, -vertex.y) * METERS_TO_UNITS,
    }
}

/// Places a prop's collision mesh in world space.
fn prop_triangles(placement: &PropPlacement, model: &StudioModel) -> Vec<[Vector3<f32>; 3]> {
    let solid = match model.phy.as_ref().and_then(|phy| phy.collision_solid()) {
        Some(solid) => solid,
        None => return Vec::new(),
    };

    let rotation = euler_rotation(placement.angles);

    let mut out = Vec::with_capacity(solid.triangles.len());
    for tri in &solid.triangles {
        let mut placed = [Vector3::zero(); 3];
        for (corner, index) in placed.iter_mut().zip(tri.iter()) {
            let vert =
                placement.origin + transform_phy_vertex(None, solid.vertices[*index as usize]);
            *corner = transform_point(&rotation, vert);
        }
        out.push(placed);
    }

    out
}

/// Builds the per-leaf prop table. Each placement fans out to every leaf it touches, in
/// placement order.
fn index_static_props(
    lump: &StaticPropLump,
    models: &[Option<StudioModel>],
) -> HashMap<u16, Vec<StaticProp>> {
    let mut index: HashMap<u16, Vec<StaticProp>> = HashMap::new();

    for placement in &lump.placements {
        let model = models
            .get(placement.prop_type as usize)
            .and_then(|m| m.as_ref());

        let triangles = match model {
            Some(model) => prop_triangles(placement, model),
            None => Vec::new(),
        };

        let (mins, maxs) = bounds(triangles.iter().flat_map(|tri| tri.iter()));

        let first = placement.first_leaf as usize;
        let last = first + placement.leaf_count as usize;
        if last > lump.leaf_indices.len() {
            warn!(
                "prop at {:?} references leaf links {}..{} of {}",
                placement.origin,
                first,
                last,
                lump.leaf_indices.len()
            );
            continue;
        }

        for leaf in &lump.leaf_indices[first..last] {
            index
                .entry(*leaf)
                .or_insert_with(Vec::new)
                .push(StaticProp {
                    origin: placement.origin,
                    angles: placement.angles,
                    solid: placement.solid,
                    prop_type: placement.prop_type,
                    triangles: triangles.clone(),
                    mins,
                    maxs,
                });
        }
    }

    index
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::bsp::Contents;
    use crate::common::studio::{phy, Mdl, Vtx, Vvd};

    use std::env;

    fn face(first_edge: i32, num_edges: i16, tex_info: i16) -> Face {
        Face {
            plane_id: 0,
            side: 0,
            on_node: 0,
            first_edge,
            num_edges,
            tex_info,
            disp_info: -1,
        }
    }

    fn triangle_fixture() -> (Vec<Face>, Vec<Hyperplane>, Vec<Edge>, Vec<i32>, Vec<Vector3<f32>>) {
        let vertices = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        ];
        let edges = vec![
            Edge { vertex_ids: [0, 1] },
            Edge { vertex_ids: [1, 2] },
            Edge { vertex_ids: [2, 0] },
            Edge { vertex_ids: [0, 1] },
        ];
        let surf_edges = vec![0, 1, 2, -1, -2, -3];
        let planes = vec![Hyperplane::axis_z(0.0)];
        let faces = vec![
            face(0, 3, 1),
            face(0, 2, 1),  // too few edges
            face(0, 3, 0),  // no texture info
            face(3, 3, 2),  // reversed edge references
        ];

        (faces, planes, edges, surf_edges, vertices)
    }

    #[test]
    fn test_build_polygons_counts() {
        let (faces, planes, edges, surf_edges, vertices) = triangle_fixture();
        let polygons = build_polygons(&faces, &planes, &edges, &surf_edges, &vertices);

        // one zeroed slot per raw face, one appended polygon per retained face
        assert_eq!(polygons.len(), faces.len() + 2);
        for zeroed in &polygons[..faces.len()] {
            assert_eq!(zeroed.num_verts, 0);
        }
    }

    #[test]
    fn test_build_polygons_vertex_walk() {
        let (faces, planes, edges, surf_edges, vertices) = triangle_fixture();
        let polygons = build_polygons(&faces, &planes, &edges, &surf_edges, &vertices);

        let forward = &polygons[faces.len()];
        assert_eq!(
            forward.verts(),
            &[vertices[0], vertices[1], vertices[2]][..]
        );
        assert_eq!(forward.edge_planes.len(), 3);
        assert_eq!(forward.plane.normal(), Vector3::unit_z());

        // negative surf edges select the trailing vertex of each edge
        let reversed = &polygons[faces.len() + 1];
        assert_eq!(
            reversed.verts(),
            &[vertices[2], vertices[0], vertices[1]][..]
        );
    }

    fn quad_model() -> StudioModel {
        StudioModel {
            name: "models/props/crate01".to_owned(),
            mdl: Mdl {
                version: 48,
                checksum: 7,
                name: "crate01.mdl".to_owned(),
                bones: Vec::new(),
            },
            vvd: Vvd {
                version: 4,
                checksum: 7,
                num_lods: 1,
                lod_vertex_count: 8,
            },
            vtx: Vtx {
                checksum: 7,
                num_lods: 1,
                num_body_parts: 1,
            },
            phy: Some(phy::load(&phy::test::quad_phy_bytes()).unwrap()),
        }
    }

    fn quad_placement() -> PropPlacement {
        PropPlacement {
            origin: Vector3::new(10.0, 20.0, 30.0),
            angles: Vector3::zero(),
            prop_type: 0,
            first_leaf: 0,
            leaf_count: 2,
            solid: PropSolid::VPhysics,
            flags: 0,
        }
    }

    #[test]
    fn test_index_static_props_fan_out() {
        let lump = StaticPropLump {
            names: vec!["models/props/crate01.mdl".to_owned()],
            leaf_indices: vec![5, 7],
            placements: vec![quad_placement()],
        };

        let index = index_static_props(&lump, &[Some(quad_model())]);

        assert_eq!(index.len(), 2);
        let in_five = &index[&5];
        let in_seven = &index[&7];
        assert_eq!(in_five.len(), 1);
        assert_eq!(in_seven.len(), 1);
        assert_eq!(in_five[0].triangles.len(), 2);
        assert_eq!(in_five[0].triangles, in_seven[0].triangles);
    }

    #[test]
    fn test_index_static_props_placement_transform() {
        let lump = StaticPropLump {
            names: vec!["models/props/crate01.mdl".to_owned()],
            leaf_indices: vec![5],
            placements: vec![PropPlacement {
                leaf_count: 1,
                ..quad_placement()
            }],
        };

        let index = index_static_props(&lump, &[Some(quad_model())]);
        let prop = &index[&5][0];

        // phy vertex (0, 0, 0): swapped and scaled to the origin, then translated
        assert_eq!(prop.triangles[0][0], Vector3::new(10.0, 20.0, 30.0));

        // phy vertex (1, 0, 0): x maps to -y and metres become inches
        let moved = prop.triangles[0][1];
        assert!((moved.x - 10.0).abs() < 1e-3);
        assert!((moved.y - (20.0 - 1.0 / 0.0254)).abs() < 1e-3);
        assert!((moved.z - 30.0).abs() < 1e-3);

        // the box spans from the prop origin into -y/-z
        assert!((prop.mins.y - (20.0 - 1.0 / 0.0254)).abs() < 1e-3);
        assert!((prop.maxs.x - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_index_static_props_rotation() {
        let lump = StaticPropLump {
            names: vec!["models/props/crate01.mdl".to_owned()],
            leaf_indices: vec![5],
            placements: vec![PropPlacement {
                angles: Vector3::new(0.0, 0.0, 90.0),
                leaf_count: 1,
                ..quad_placement()
            }],
        };

        let index = index_static_props(&lump, &[Some(quad_model())]);
        let corner = index[&5][0].triangles[0][0];

        // the translated corner (10, 20, 30) yawed a quarter turn about the world origin
        assert!((corner.x - -20.0).abs() < 1e-3);
        assert!((corner.y - 10.0).abs() < 1e-3);
        assert!((corner.z - 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_index_static_props_missing_model() {
        let lump = StaticPropLump {
            names: vec!["models/props/crate01.mdl".to_owned()],
            leaf_indices: vec![3],
            placements: vec![PropPlacement {
                first_leaf: 0,
                leaf_count: 1,
                ..quad_placement()
            }],
        };

        let index = index_static_props(&lump, &[None]);
        let prop = &index[&3][0];

        assert!(prop.triangles.is_empty());
        // an empty bound is inverted and can never be hit
        assert!(prop.mins.x > prop.maxs.x);
    }

    fn sample_bsp() -> BspFile {
        let (faces, planes, edges, surf_edges, vertices) = triangle_fixture();

        BspFile {
            planes,
            vertices,
            edges,
            surf_edges,
            faces,
            nodes: vec![Node {
                plane_id: 0,
                children: [-1, -2],
                mins: [0; 3],
                maxs: [0; 3],
                face_id: 0,
                face_count: 0,
                area: 0,
            }],
            leaves: vec![
                Leaf {
                    contents: Contents::empty(),
                    cluster: 0,
                    area_flags: 0,
                    mins: [0; 3],
                    maxs: [0; 3],
                    first_leaf_face: 0,
                    num_leaf_faces: 0,
                    first_leaf_brush: 0,
                    num_leaf_brushes: 0,
                    water_data_id: -1,
                },
                Leaf {
                    contents: Contents::SOLID,
                    cluster: 0,
                    area_flags: 0,
                    mins: [0; 3],
                    maxs: [0; 3],
                    first_leaf_face: 0,
                    num_leaf_faces: 0,
                    first_leaf_brush: 0,
                    num_leaf_brushes: 0,
                    water_data_id: -1,
                },
            ],
            leaf_faces: Vec::new(),
            leaf_brushes: Vec::new(),
            brushes: Vec::new(),
            brush_sides: Vec::new(),
            disp_infos: Vec::new(),
            disp_verts: Vec::new(),
            disp_tris: Vec::new(),
            entities: "{\n\"classname\" \"worldspawn\"\n}\n".to_owned(),
            static_props: StaticPropLump::default(),
            pakfile: Vec::new(),
        }
    }

    #[test]
    fn test_from_bsp_assembly() {
        let (map, missing) = Map::from_bsp(sample_bsp(), Vec::new());

        assert!(missing.is_none());
        assert_eq!(map.surfaces().len(), 4);
        assert_eq!(map.polygons().len(), 6);
        assert_eq!(map.entities().len(), 1);
        assert_eq!(map.entities()[0]["classname"], "worldspawn");
    }

    #[test]
    fn test_from_bsp_deterministic() {
        let (first, _) = Map::from_bsp(sample_bsp(), Vec::new());
        let (second, _) = Map::from_bsp(sample_bsp(), Vec::new());

        assert_eq!(
            format!("{:?}", first.polygons()),
            format!("{:?}", second.polygons())
        );
        assert_eq!(
            format!("{:?}", first.static_props()),
            format!("{:?}", second.static_props())
        );

        let origin = Vector3::new(-2.0, 0.5, 0.5);
        let destination = Vector3::new(3.0, 0.5, 0.5);
        assert_eq!(
            first.trace_ray(origin, destination),
            second.trace_ray(origin, destination)
        );
    }

    #[test]
    fn test_load_missing_file() {
        match Map::load("testdata/does_not_exist.bsp", &[]).unwrap_err() {
            MapError::Io(_) => (),
            other => panic!("expected io error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_not_a_bsp() {
        match Map::load("Cargo.toml", &[]).unwrap_err() {
            MapError::Format(_) => (),
            other => panic!("expected format error, got {:?}", other),
        }
    }

    // Everything below runs against a real level and skips silently when the fixture is not
    // present. Point SIGHTLINE_CSGO_DIR at a Counter-Strike: Global Offensive install to also
    // resolve prop models.

    lazy_static! {
        static ref DE_CACHE: Option<(Map, Option<MapError>)> = load_de_cache();
    }

    fn load_de_cache() -> Option<(Map, Option<MapError>)> {
        let path = Path::new("testdata/de_cache.bsp");
        if !path.exists() {
            return None;
        }

        let stems = match env::var("SIGHTLINE_CSGO_DIR") {
            Ok(dir) => vec![
                PathBuf::from(format!("{}/csgo/pak01", dir)),
                PathBuf::from(format!("{}/platform/platform_pak01", dir)),
            ],
            Err(_) => Vec::new(),
        };

        Map::load(path, &stems).ok()
    }

    #[test]
    fn test_de_cache_structure() {
        let (map, _) = match DE_CACHE.as_ref() {
            Some(loaded) => loaded,
            None => return,
        };

        assert_eq!(map.brushes().len(), 5560);
        assert_eq!(map.brush_sides().len(), 39815);
        assert_eq!(map.edges().len(), 129415);
        assert_eq!(map.leaf_brushes().len(), 24072);
        assert_eq!(map.leaf_faces().len(), 18843);
        assert_eq!(map.leaves().len(), 8906);
        assert_eq!(map.nodes().len(), 8648);
        assert_eq!(map.planes().len(), 30626);
        assert_eq!(map.surfaces().len(), 23221);
        assert_eq!(map.surf_edges().len(), 185200);
        assert_eq!(map.vertices().len(), 48496);
        assert_eq!(map.polygons().len(), 46442);
    }

    #[test]
    fn test_de_cache_missing_models_without_vpks() {
        let (_, missing) = match DE_CACHE.as_ref() {
            Some(loaded) => loaded,
            None => return,
        };

        if env::var("SIGHTLINE_CSGO_DIR").is_err() {
            match missing {
                Some(MapError::MissingModels { paths }) => assert!(!paths.is_empty()),
                other => panic!("models can only come from VPKs, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_de_cache_open_sightline() {
        let (map, _) = match DE_CACHE.as_ref() {
            Some(loaded) => loaded,
            None => return,
        };

        // A site -> A site
        let origin = Vector3::new(-12.0, 1444.0, 1751.0);
        let destination = Vector3::new(-233.0, 1343.0, 1751.0);

        assert!(map.is_visible(origin, destination));

        let trace = map.trace_ray(origin, destination);
        assert!(trace.all_solid);
        assert!(trace.start_solid);
        assert_eq!(trace.fraction, 1.0);
        assert_eq!(trace.end_pos, destination);
    }

    #[test]
    fn test_de_cache_blocked_sightline() {
        let (map, _) = match DE_CACHE.as_ref() {
            Some(loaded) => loaded,
            None => return,
        };

        // T spawn -> A site
        let origin = Vector3::new(3306.0, 431.0, 1723.0);
        let destination = Vector3::new(-233.0, 1343.0, 1751.0);

        assert!(!map.is_visible(origin, destination));

        let trace = map.trace_ray(origin, destination);
        assert!(trace.all_solid);
        assert!(trace.start_solid);
        assert_eq!(trace.fraction, 0.0);
        assert_eq!(trace.fraction_left_solid, 1.0);
        assert_eq!(trace.end_pos, origin);
        assert_eq!(trace.contents, Contents::SOLID);
        assert_eq!(trace.num_brush_sides, 7);
    }

    #[test]
    fn test_de_cache_short_sightline() {
        let (map, _) = match DE_CACHE.as_ref() {
            Some(loaded) => loaded,
            None => return,
        };

        // T spawn -> T spawn
        let origin = Vector3::new(3306.0, 431.0, 1723.0);
        let destination = Vector3::new(3303.0, 431.0, 1723.0);

        assert!(map.is_visible(origin, destination));

        let trace = map.trace_ray(origin, destination);
        assert_eq!(trace.fraction, 1.0);
        assert_eq!(trace.end_pos, destination);
    }

    #[test]
    fn test_de_cache_prop_occlusion() {
        let (map, _) = match DE_CACHE.as_ref() {
            Some(loaded) => loaded,
            None => return,
        };

        // through a doorway and through the boxes at mid; both only block once prop models
        // are resolved
        let door = (
            Vector3::new(207.0, 1948.0, 1751.0),
            Vector3::new(259.0, 2251.0, 1752.0),
        );
        let mid_box = (
            Vector3::new(-94.0, 452.0, 1677.0),
            Vector3::new(138.0, 396.0, 1677.0),
        );

        let with_models = env::var("SIGHTLINE_CSGO_DIR").is_ok();
        assert_eq!(map.is_visible(door.0, door.1), !with_models);
        assert_eq!(map.is_visible(mid_box.0, mid_box.1), !with_models);
    }
}
