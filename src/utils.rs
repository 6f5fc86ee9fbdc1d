use crate::types::{Position, Transform};
use cgmath::{Deg, Matrix4, Vector3};

/// Rotation from euler angles in DEGREES, applied Y, then X, then Z (intrinsic).
pub(crate) fn __from_euler_yxz(rotation: Vector3<f64>) -> Transform {
    Matrix4::from_angle_y(Deg(rotation.y))
        * Matrix4::from_angle_x(Deg(rotation.x))
        * Matrix4::from_angle_z(Deg(rotation.z))
}

/// Local joint transform: translation followed by the Y-X-Z rotation.
pub(crate) fn __local_transform(translation: Position, rotation: Vector3<f64>) -> Transform {
    Matrix4::from_translation(translation) * __from_euler_yxz(rotation)
}

/// Apply `transform` to a point (w = 1).
pub(crate) fn __transform_point(transform: &Transform, point: Position) -> Position {
    (*transform * point.extend(1.0)).truncate()
}

/// Recover Y-X-Z euler angles (in DEGREES, returned as `[x, y, z]`) from the rotation
/// part of a transform. Inverse of `__from_euler_yxz` for x in [-90, 90].
pub fn euler_yxz_from_matrix(m: &Transform) -> Vector3<f64> {
    // cgmath matrices are column major: m[col][row]
    let r = |row: usize, col: usize| m[col][row];

    let sx = (-r(1, 2)).clamp(-1.0, 1.0);
    let x = sx.asin();
    let (y, z) = if sx.abs() < 1.0 - 1e-9 {
        (r(0, 2).atan2(r(2, 2)), r(1, 0).atan2(r(1, 1)))
    } else {
        // gimbal lock, z is folded into y
        ((-r(2, 0)).atan2(r(0, 0)), 0.0)
    };
    Vector3::new(x.to_degrees(), y.to_degrees(), z.to_degrees())
}
