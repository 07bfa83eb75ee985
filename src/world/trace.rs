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

//! Ray traversal of the space partitioning tree.
//!
//! A trace descends the tree recursively, splitting its segment wherever it straddles a node
//! plane and visiting near children before far ones. At each leaf the surviving sub-segment is
//! swept through the leaf's shootable brushes and tested against its static props. Several
//! quirks of the reference implementation are load-bearing for compatibility and are preserved
//! deliberately; they are marked where they occur.

use crate::common::bsp::{Contents, PropSolid};
use crate::world::{collide, Map, StaticProp};

use cgmath::{Vector3, Zero};

/// The engine-standard linear tolerance for half-space tests.
pub const DIST_EPSILON: f32 = 0.03125;

// the math library's default epsilon, used when splitting at node planes
const SPLIT_EPSILON: f32 = ::std::f32::EPSILON;

// reported by a surface hit in place of a real parametric fraction
const SURFACE_HIT_FRACTION: f32 = 0.2;

/// The result of sweeping a ray through a map.
///
/// `brush` identifies the last brush visited during the descent, which is not necessarily the
/// brush that was hit; callers comparing traces should ignore it.
#[derive(Clone, Debug, PartialEq)]
pub struct Trace {
    pub all_solid: bool,
    pub start_solid: bool,
    pub fraction: f32,
    pub fraction_left_solid: f32,
    pub end_pos: Vector3<f32>,
    pub contents: Contents,
    pub brush: Option<usize>,
    pub num_brush_sides: i32,
}

impl Trace {
    fn new() -> Trace {
        Trace {
            all_solid: true,
            start_solid: true,
            fraction: 1.0,
            fraction_left_solid: 0.0,
            end_pos: Vector3::zero(),
            contents: Contents::empty(),
            brush: None,
            num_brush_sides: 0,
        }
    }
}

impl Map {
    /// Sweeps a ray from `origin` to `destination` and reports the first obstruction.
    ///
    /// This never fails; degenerate input (a zero-length ray, non-finite coordinates) yields a
    /// deterministic if meaningless trace.
    pub fn trace_ray(&self, origin: Vector3<f32>, destination: Vector3<f32>) -> Trace {
        let mut trace = Trace::new();

        if !self.nodes.is_empty() {
            self.descend(0, 0.0, 1.0, origin, destination, &mut trace);
        }

        if trace.fraction < 1.0 {
            trace.end_pos = origin + (destination - origin) * trace.fraction;
        } else {
            trace.end_pos = destination;
        }

        trace
    }

    /// True when nothing shootable obstructs the segment from `origin` to `destination`.
    pub fn is_visible(&self, origin: Vector3<f32>, destination: Vector3<f32>) -> bool {
        self.trace_ray(origin, destination).fraction >= 1.0
    }

    fn descend(
        &self,
        node_index: i32,
        start_fraction: f32,
        end_fraction: f32,
        a: Vector3<f32>,
        b: Vector3<f32>,
        trace: &mut Trace,
    ) {
        // a closer hit already exists
        if trace.fraction <= start_fraction {
            return;
        }

        if node_index < 0 {
            self.trace_leaf((-node_index - 1) as usize, a, b, trace);
            return;
        }

        let node = &self.nodes[node_index as usize];
        let plane = &self.planes[node.plane_id];

        let ds = plane.point_dist(a);
        let de = plane.point_dist(b);

        if ds >= 0.0 && de >= 0.0 {
            self.descend(node.children[0], start_fraction, end_fraction, a, b, trace);
            return;
        }
        if ds < 0.0 && de < 0.0 {
            self.descend(node.children[1], start_fraction, end_fraction, a, b, trace);
            return;
        }

        // the segment straddles the node plane; split it, biased a little into the near side
        let (near, t_first, t_second) = if ds < de {
            let inv = 1.0 / (ds - de);
            (1, (ds + SPLIT_EPSILON) * inv, (ds + SPLIT_EPSILON) * inv)
        } else if de < ds {
            let inv = 1.0 / (ds - de);
            (0, (ds + SPLIT_EPSILON) * inv, (ds - SPLIT_EPSILON) * inv)
        } else {
            (0, 1.0, 0.0)
        };

        let t_first = t_first.max(0.0).min(1.0);
        let t_second = t_second.max(0.0).min(1.0);

        let fraction_mid = start_fraction + (end_fraction - start_fraction) * t_first;

        let mid = a + (b - a) * t_first;
        self.descend(node.children[near], start_fraction, fraction_mid, a, mid, trace);

        let mid = a + (b - a) * t_second;
        self.descend(node.children[near ^ 1], fraction_mid, end_fraction, mid, b, trace);
    }

    fn trace_leaf(&self, leaf_index: usize, a: Vector3<f32>, b: Vector3<f32>, trace: &mut Trace) {
        let leaf = &self.leaves[leaf_index];

        for i in 0..leaf.num_leaf_brushes as usize {
            let brush_index = self.leaf_brushes[leaf.first_leaf_brush as usize + i] as usize;

            if !self.brushes[brush_index]
                .contents
                .intersects(Contents::MASK_SHOT_HULL)
            {
                continue;
            }

            self.sweep_brush(brush_index, a, b, trace);

            // a solid hit at the window start ends the trace outright
            if trace.fraction == 0.0 {
                return;
            }

            // last brush visited, not necessarily the hit brush
            trace.brush = Some(brush_index);
        }

        if let Some(props) = self.static_props.get(&(leaf_index as u16)) {
            for prop in props {
                if self.trace_prop(prop, a, b) {
                    // the true parametric fraction is known here but discarded, matching the
                    // reference
                    trace.fraction = 0.0;
                    return;
                }
            }
        }

        if trace.start_solid || trace.fraction < 1.0 {
            return;
        }

        for i in 0..leaf.num_leaf_faces as usize {
            let face_index = self.leaf_faces[leaf.first_leaf_face as usize + i] as usize;
            self.trace_surface(face_index, a, b, trace);
        }
    }

    /// Sweeps a segment through the intersection of a brush's half-spaces.
    fn sweep_brush(
        &self,
        brush_index: usize,
        origin: Vector3<f32>,
        destination: Vector3<f32>,
        trace: &mut Trace,
    ) {
        let brush = &self.brushes[brush_index];

        let mut t_enter = -99.0f32;
        let mut t_leave = 1.0f32;
        let mut starts_out = false;
        let mut ends_out = false;

        for i in 0..brush.num_sides as usize {
            let side = &self.brush_sides[brush.first_side as usize + i];

            // bevel planes exist only for swept-box queries
            if side.bevel & 0xFF != 0 {
                continue;
            }

            let plane = &self.planes[side.plane_id as usize];
            let ds = plane.point_dist(origin);
            let de = plane.point_dist(destination);

            if ds > 0.0 {
                starts_out = true;

                // entirely outside this half-space
                if de > 0.0 {
                    return;
                }
            } else {
                if de <= 0.0 {
                    continue;
                }
                ends_out = true;
            }

            if ds > de {
                // heading in; the candidate is a biased distance, not a ratio, and that is
                // what the fixture data expects
                let t = (ds - DIST_EPSILON).max(0.0);
                if t > t_enter {
                    t_enter = t;
                }
            } else {
                let t = (ds + DIST_EPSILON) / (ds - de);
                if t < t_leave {
                    t_leave = t;
                }
            }
        }

        // a sweep that begins before the point where an earlier brush released the ray is
        // treated as starting inside
        if starts_out && trace.fraction_left_solid - t_enter > 0.0 {
            starts_out = false;
        }

        trace.num_brush_sides = brush.num_sides;

        if !starts_out {
            trace.start_solid = true;
            trace.contents = brush.contents;

            if !ends_out {
                trace.all_solid = true;
                trace.fraction = 0.0;
                trace.fraction_left_solid = 1.0;
            } else if t_leave != 1.0 && t_leave > trace.fraction_left_solid {
                trace.fraction_left_solid = t_leave;

                // the ray re-emerged into open space; any earlier hit is stale
                if trace.fraction <= t_leave {
                    trace.fraction = 1.0;
                }
            }

            return;
        }

        if t_enter < t_leave && t_enter > -99.0 && t_enter < trace.fraction {
            trace.fraction = t_enter.max(0.0);
            trace.brush = Some(brush_index);
            trace.contents = brush.contents;
        }
    }

    fn trace_prop(&self, prop: &StaticProp, a: Vector3<f32>, b: Vector3<f32>) -> bool {
        let direction = b - a;

        match prop.solid {
            PropSolid::BBox => {
                collide::ray_intersects_aabb(a, direction, prop.mins, prop.maxs).is_some()
            }

            PropSolid::VPhysics => {
                for tri in &prop.triangles {
                    if collide::ray_intersects_triangle(a, direction, tri).is_some() {
                        return true;
                    }
                }
                false
            }

            // not implemented: Bsp, Obb, ObbYaw, Custom
            PropSolid::None
            | PropSolid::Bsp
            | PropSolid::Obb
            | PropSolid::ObbYaw
            | PropSolid::Custom => false,
        }
    }

    /// Tests the segment against one built polygon.
    fn trace_surface(
        &self,
        face_index: usize,
        origin: Vector3<f32>,
        destination: Vector3<f32>,
        trace: &mut Trace,
    ) {
        // face ids land in the zeroed range reserved at the front of the polygon list (see
        // build_polygons), so this test cannot report a crossing on real data; preserved as-is
        let polygon = match self.polygons.get(face_index) {
            Some(p) => p,
            None => return,
        };

        let dot1 = polygon.plane.point_dist(origin);
        let dot2 = polygon.plane.point_dist(destination);

        // same side, no crossing
        if (dot1 > 0.0) == (dot2 > 0.0) {
            return;
        }

        // near-parallel
        if dot1 - dot2 < SPLIT_EPSILON {
            return;
        }

        let t = dot1 / (dot1 - dot2);
        if t <= 0.0 {
            return;
        }

        let x = origin + (destination - origin) * t;

        for edge_plane in &polygon.edge_planes {
            if edge_plane.point_dist(x) < 0.0 {
                return;
            }
        }

        // a sentinel rather than a parametric fraction
        trace.fraction = SURFACE_HIT_FRACTION;
        trace.end_pos = x;
    }
}
