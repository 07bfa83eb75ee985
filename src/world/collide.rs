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

//! Ray intersection tests for static prop geometry.

use cgmath::{InnerSpace, Vector3};

const MOLLER_TRUMBORE_EPSILON: f32 = 0.0000001;

// stands in for direction components of exactly zero in the slab test
const SLAB_GUARD: f32 = 0.00001;

/// A successful ray cast.
#[derive(Debug)]
pub struct RayHit {
    pub t: f32,
    pub point: Vector3<f32>,
}

/// Slab test of a ray against an axis-aligned bounding box.
pub fn ray_intersects_aabb(
    origin: Vector3<f32>,
    direction: Vector3<f32>,
    min: Vector3<f32>,
    max: Vector3<f32>,
) -> Option<RayHit> {
    let mut dir = direction;
    for c in 0..3 {
        if dir[c] == 0.0 {
            dir[c] = SLAB_GUARD;
        }
    }

    let t1 = ((min.x - origin.x) / dir.x) as f64;
    let t2 = ((max.x - origin.x) / dir.x) as f64;
    let t3 = ((min.y - origin.y) / dir.y) as f64;
    let t4 = ((max.y - origin.y) / dir.y) as f64;
    let t5 = ((min.z - origin.z) / dir.z) as f64;
    let t6 = ((max.z - origin.z) / dir.z) as f64;

    let tmin = t1.min(t2).max(t3.min(t4)).max(t5.min(t6));
    let tmax = t1.max(t2).min(t3.max(t4)).min(t5.max(t6));

    // the whole box is behind the ray origin
    if tmax < 0.0 {
        return None;
    }

    if tmin > tmax {
        return None;
    }

    // when the origin is inside the box the near crossing is behind it
    let t_result = if tmin < 0.0 { tmax } else { tmin };

    Some(RayHit {
        t: t_result as f32,
        // the reference scales the direction endpoint, not the segment
        point: origin + direction * t_result as f32,
    })
}

/// Möller-Trumbore test of a ray against a single triangle.
pub fn ray_intersects_triangle(
    origin: Vector3<f32>,
    direction: Vector3<f32>,
    triangle: &[Vector3<f32>; 3],
) -> Option<RayHit> {
    let edge1 = triangle[1] - triangle[0];
    let edge2 = triangle[2] - triangle[0];

    let h = direction.cross(edge2);
    let a = edge1.dot(h);

    // ray is parallel to the triangle plane
    if a > -MOLLER_TRUMBORE_EPSILON && a < MOLLER_TRUMBORE_EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = origin - triangle[0];
    let u = f * s.dot(h);

    if u < 0.0 || u > 1.0 {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * direction.dot(q);

    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);

    // a line intersection behind the origin is not a ray intersection
    if t <= MOLLER_TRUMBORE_EPSILON {
        return None;
    }

    Some(RayHit {
        t,
        point: origin + direction * t,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn unit_triangle() -> [Vector3<f32>; 3] {
        [
            Vector3::new(0.0, -1.0, -1.0),
            Vector3::new(0.0, 1.0, -1.0),
            Vector3::new(0.0, 0.0, 1.0),
        ]
    }

    #[test]
    fn test_triangle_hit() {
        let hit = ray_intersects_triangle(
            Vector3::new(-1.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
            &unit_triangle(),
        )
        .unwrap();
        assert!((hit.t - 0.5).abs() < 1e-6);
        assert!((hit.point.x - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_triangle_miss() {
        assert!(ray_intersects_triangle(
            Vector3::new(-1.0, 5.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
            &unit_triangle(),
        )
        .is_none());
    }

    #[test]
    fn test_triangle_parallel() {
        assert!(ray_intersects_triangle(
            Vector3::new(-1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            &unit_triangle(),
        )
        .is_none());
    }

    #[test]
    fn test_triangle_behind() {
        assert!(ray_intersects_triangle(
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            &unit_triangle(),
        )
        .is_none());
    }

    #[test]
    fn test_aabb_hit() {
        let hit = ray_intersects_aabb(
            Vector3::new(-2.0, 0.5, 0.5),
            Vector3::new(4.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
        )
        .unwrap();
        assert!((hit.t - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_aabb_miss() {
        assert!(ray_intersects_aabb(
            Vector3::new(-2.0, 5.0, 0.5),
            Vector3::new(4.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
        )
        .is_none());
    }

    #[test]
    fn test_aabb_behind() {
        assert!(ray_intersects_aabb(
            Vector3::new(3.0, 0.5, 0.5),
            Vector3::new(4.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
        )
        .is_none());
    }

    #[test]
    fn test_aabb_zero_direction_components() {
        // two zero components must not divide by zero
        let hit = ray_intersects_aabb(
            Vector3::new(0.5, 0.5, -2.0),
            Vector3::new(0.0, 0.0, 4.0),
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
        )
        .unwrap();
        assert!((hit.t - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_aabb_inside() {
        let hit = ray_intersects_aabb(
            Vector3::new(0.5, 0.5, 0.5),
            Vector3::new(4.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
        )
        .unwrap();
        // origin inside: the reported crossing is the exit
        assert!(hit.t > 0.0);
    }
}
