//! Math type aliases and helper constructors.
//!
//! Rendering math is always f32. Matrix helpers mirror the classic
//! fixed-function constructors (ortho, perspective, look-at, axis
//! rotations); angles are taken in degrees, matching the public API of the
//! renderer.

pub use nalgebra;

/// 2D vector (f32).
pub type Vec2 = nalgebra::Vector2<f32>;

/// 3D vector (f32).
pub type Vec3 = nalgebra::Vector3<f32>;

/// 4D vector (f32).
pub type Vec4 = nalgebra::Vector4<f32>;

/// 3D point (f32).
pub type Point3 = nalgebra::Point3<f32>;

/// 4x4 matrix (f32).
pub type Mat4 = nalgebra::Matrix4<f32>;

/// Orthographic projection matrix.
pub fn ortho(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    Mat4::new_orthographic(left, right, bottom, top, near, far)
}

/// Perspective projection matrix. `fovy` is the vertical field of view in
/// degrees.
pub fn perspective(fovy: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    Mat4::new_perspective(aspect, fovy.to_radians(), near, far)
}

/// Right-handed look-at view matrix.
pub fn look_at(eye: Vec3, at: Vec3, up: Vec3) -> Mat4 {
    Mat4::look_at_rh(&Point3::from(eye), &Point3::from(at), &up)
}

/// Rotation by `angle` degrees around an arbitrary axis. The axis does not
/// need to be normalized but must be non-zero.
pub fn rotation(angle: f32, axis: Vec3) -> Mat4 {
    let axis = nalgebra::Unit::new_normalize(axis);
    Mat4::from_axis_angle(&axis, angle.to_radians())
}

/// Rotation by `angle` degrees around the X axis.
pub fn rotation_x(angle: f32) -> Mat4 {
    rotation(angle, Vec3::x())
}

/// Rotation by `angle` degrees around the Y axis.
pub fn rotation_y(angle: f32) -> Mat4 {
    rotation(angle, Vec3::y())
}

/// Rotation by `angle` degrees around the Z axis.
pub fn rotation_z(angle: f32) -> Mat4 {
    rotation(angle, Vec3::z())
}

/// Uniform scaling matrix.
pub fn scaling(scale: f32) -> Mat4 {
    Mat4::new_scaling(scale)
}

/// Translation matrix.
pub fn translation(x: f32, y: f32, z: f32) -> Mat4 {
    Mat4::new_translation(&Vec3::new(x, y, z))
}

/// Transform a point by a matrix (w = 1, with perspective divide).
pub fn transform_point(matrix: &Mat4, point: Vec3) -> Vec3 {
    matrix.transform_point(&Point3::from(point)).coords
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_moves_point() {
        let m = translation(1.0, 2.0, 3.0);
        let p = transform_point(&m, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(p, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_rotation_z_quarter_turn() {
        let m = rotation_z(90.0);
        let p = transform_point(&m, Vec3::new(1.0, 0.0, 0.0));
        assert!((p.x - 0.0).abs() < 1e-6);
        assert!((p.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_scaling_is_uniform() {
        let m = scaling(2.0);
        let p = transform_point(&m, Vec3::new(1.0, -1.0, 0.5));
        assert_eq!(p, Vec3::new(2.0, -2.0, 1.0));
    }

    #[test]
    fn test_perspective_is_finite() {
        let m = perspective(60.0, 16.0 / 9.0, 0.1, 100.0);
        assert!(m.iter().all(|x| x.is_finite()));
    }
}
