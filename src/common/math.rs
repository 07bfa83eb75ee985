// Copyright © 2018 Cormac O'Brien
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use cgmath::{Deg, InnerSpace, Matrix4, Vector3};
use num::FromPrimitive;

#[derive(Copy, Clone, Debug, FromPrimitive)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

#[derive(Clone, Debug)]
enum Alignment {
    Axis(Axis),
    Normal(Vector3<f32>),
}

/// An oriented plane in point-normal form.
///
/// Planes whose normal coincides with a coordinate axis are stored in an optimized form that
/// only considers that axis when computing point distances. The BSP compiler marks such planes
/// with an axis type of 0, 1 or 2; everything else is treated as a general plane.
#[derive(Clone, Debug)]
pub struct Hyperplane {
    alignment: Alignment,
    dist: f32,
}

impl Hyperplane {
    /// Creates a new hyperplane aligned along the x-axis, `dist` units away from the origin.
    pub fn axis_x(dist: f32) -> Hyperplane {
        Hyperplane {
            alignment: Alignment::Axis(Axis::X),
            dist,
        }
    }

    /// Creates a new hyperplane aligned along the y-axis, `dist` units away from the origin.
    pub fn axis_y(dist: f32) -> Hyperplane {
        Hyperplane {
            alignment: Alignment::Axis(Axis::Y),
            dist,
        }
    }

    /// Creates a new hyperplane aligned along the z-axis, `dist` units away from the origin.
    pub fn axis_z(dist: f32) -> Hyperplane {
        Hyperplane {
            alignment: Alignment::Axis(Axis::Z),
            dist,
        }
    }

    /// Creates a new hyperplane with the given normal, `dist` units away from the origin.
    pub fn from_normal(normal: Vector3<f32>, dist: f32) -> Hyperplane {
        Hyperplane {
            alignment: Alignment::Normal(normal),
            dist,
        }
    }

    /// Creates a hyperplane from the raw fields of a BSP plane record.
    ///
    /// Axis types 0-2 select the optimized axial form; the compiler guarantees the normal of
    /// such planes to be the corresponding positive unit vector.
    pub fn from_bsp(normal: Vector3<f32>, dist: f32, axis_type: i32) -> Hyperplane {
        match Axis::from_i32(axis_type) {
            Some(axis) => Hyperplane {
                alignment: Alignment::Axis(axis),
                dist,
            },
            None => Hyperplane::from_normal(normal, dist),
        }
    }

    /// Returns the surface normal of this plane.
    pub fn normal(&self) -> Vector3<f32> {
        match self.alignment {
            Alignment::Axis(ax) => match ax {
                Axis::X => Vector3::unit_x(),
                Axis::Y => Vector3::unit_y(),
                Axis::Z => Vector3::unit_z(),
            },
            Alignment::Normal(normal) => normal,
        }
    }

    pub fn dist(&self) -> f32 {
        self.dist
    }

    /// Calculates the signed distance between this hyperplane and the given point.
    pub fn point_dist(&self, point: Vector3<f32>) -> f32 {
        match self.alignment {
            Alignment::Axis(a) => point[a as usize] - self.dist,
            Alignment::Normal(n) => point.dot(n) - self.dist,
        }
    }
}

/// Componentwise minimum and maximum over a set of points.
pub fn bounds<'a, I>(points: I) -> (Vector3<f32>, Vector3<f32>)
where
    I: IntoIterator<Item = &'a Vector3<f32>>,
{
    let mut min = Vector3::new(::std::f32::MAX, ::std::f32::MAX, ::std::f32::MAX);
    let mut max = Vector3::new(::std::f32::MIN, ::std::f32::MIN, ::std::f32::MIN);
    for p in points.into_iter() {
        for c in 0..3 {
            min[c] = p[c].min(min[c]);
            max[c] = p[c].max(max[c]);
        }
    }
    (min, max)
}

/// Composes the rotation described by a triple of Euler angles in degrees, applied as a
/// rotation about X, then Y, then Z.
pub fn euler_rotation(angles: Vector3<f32>) -> Matrix4<f32> {
    Matrix4::from_angle_z(Deg(angles.z))
        * Matrix4::from_angle_y(Deg(angles.y))
        * Matrix4::from_angle_x(Deg(angles.x))
}

/// Applies a homogeneous transform to a point.
pub fn transform_point(m: &Matrix4<f32>, point: Vector3<f32>) -> Vector3<f32> {
    (m * point.extend(1.0)).truncate()
}

/// A 3x4 pose matrix stored as four columns; the fourth column is the translation.
pub type Mat3x4 = [[f32; 3]; 4];

/// Transforms a point by the inverse of a 3x4 pose matrix.
///
/// The matrix is assumed orthonormal in its rotation part, so the inverse rotation is applied
/// by dotting against columns rather than rows.
pub fn vector_i_transform(point: Vector3<f32>, m: &Mat3x4) -> Vector3<f32> {
    let t = Vector3::new(point.x - m[3][0], point.y - m[3][1], point.z - m[3][2]);

    Vector3::new(
        t.x * m[0][0] + t.y * m[0][1] + t.z * m[0][2],
        t.x * m[1][0] + t.y * m[1][1] + t.z * m[1][2],
        t.x * m[2][0] + t.y * m[2][1] + t.z * m[2][2],
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use cgmath::Zero;

    #[test]
    fn test_hyperplane_point_dist_axial() {
        let plane = Hyperplane::axis_x(1.0);
        assert_eq!(plane.point_dist(Vector3::unit_x() * 2.0), 1.0);
        assert_eq!(plane.point_dist(Vector3::zero()), -1.0);

        let plane = Hyperplane::axis_z(-8.0);
        assert_eq!(plane.point_dist(Vector3::zero()), 8.0);
    }

    #[test]
    fn test_hyperplane_point_dist_normal() {
        let plane = Hyperplane::from_normal(Vector3::unit_y(), 1.0);
        assert_eq!(plane.point_dist(Vector3::unit_y() * 2.0), 1.0);
        assert_eq!(plane.point_dist(Vector3::zero()), -1.0);
    }

    #[test]
    fn test_hyperplane_from_bsp_fast_path() {
        // an axial record must ignore its stored normal in distance computations
        let plane = Hyperplane::from_bsp(Vector3::unit_y(), 4.0, 1);
        assert_eq!(plane.point_dist(Vector3::new(100.0, 5.0, 100.0)), 1.0);

        let plane = Hyperplane::from_bsp(Vector3::new(0.5, 0.5, 0.0), 0.0, 3);
        assert_eq!(plane.point_dist(Vector3::new(1.0, 1.0, 0.0)), 1.0);
    }

    #[test]
    fn test_bounds() {
        let points = vec![
            Vector3::new(1.0, -2.0, 3.0),
            Vector3::new(-4.0, 5.0, 0.0),
            Vector3::new(0.0, 0.0, -6.0),
        ];
        let (min, max) = bounds(&points);
        assert_eq!(min, Vector3::new(-4.0, -2.0, -6.0));
        assert_eq!(max, Vector3::new(1.0, 5.0, 3.0));
    }

    #[test]
    fn test_euler_rotation_yaw() {
        let m = euler_rotation(Vector3::new(0.0, 0.0, 90.0));
        let v = transform_point(&m, Vector3::unit_x());
        assert!((v.x - 0.0).abs() < 1e-6);
        assert!((v.y - 1.0).abs() < 1e-6);
        assert!((v.z - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_vector_i_transform_translation() {
        // identity rotation with a translation of (1, 2, 3)
        let m: Mat3x4 = [
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 2.0, 3.0],
        ];
        assert_eq!(
            vector_i_transform(Vector3::new(2.0, 4.0, 6.0), &m),
            Vector3::new(1.0, 2.0, 3.0)
        );
    }
}
