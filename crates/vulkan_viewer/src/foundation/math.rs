//! Math utilities and types
//!
//! nalgebra aliases plus the camera matrices used by the viewer. All matrices are
//! column-major, right-handed, and project depth into Vulkan's `[0, 1]` range.

pub use nalgebra::{Matrix4, Quaternion, Unit, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Convert to a transformation matrix (scale, then rotate, then translate)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }
}

/// Convert degrees to radians
pub fn deg_to_rad(degrees: f32) -> f32 {
    degrees.to_radians()
}

/// Extension trait for Mat4 with camera and rotation constructors
pub trait Mat4Ext {
    /// Create a rotation matrix around the Z axis
    fn rotation_z(angle: f32) -> Mat4;

    /// Create a right-handed perspective projection with depth mapped to `[0, 1]`
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Create a right-handed look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Column-major array layout as consumed by GLSL `mat4`
    fn to_cols_array_2d(&self) -> [[f32; 4]; 4];
}

impl Mat4Ext for Mat4 {
    fn rotation_z(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::z_axis(), angle)
    }

    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let tan_half_fovy = (fov_y * 0.5).tan();

        let mut result = Mat4::zeros();
        result[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        result[(1, 1)] = 1.0 / tan_half_fovy;
        result[(2, 2)] = far / (near - far);
        result[(2, 3)] = (near * far) / (near - far);
        result[(3, 2)] = -1.0;
        result
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        let forward = (target - eye).normalize();
        let right = forward.cross(&up).normalize();
        let camera_up = right.cross(&forward);

        #[rustfmt::skip]
        let view = Mat4::new(
            right.x,      right.y,      right.z,      -right.dot(&eye),
            camera_up.x,  camera_up.y,  camera_up.z,  -camera_up.dot(&eye),
            -forward.x,   -forward.y,   -forward.z,   forward.dot(&eye),
            0.0,          0.0,          0.0,          1.0,
        );
        view
    }

    fn to_cols_array_2d(&self) -> [[f32; 4]; 4] {
        (*self).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn project(m: &Mat4, p: Vec3) -> Vec3 {
        let clip = m * nalgebra::Vector4::new(p.x, p.y, p.z, 1.0);
        Vec3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w)
    }

    #[test]
    fn perspective_maps_near_and_far_to_unit_depth() {
        let proj = Mat4::perspective(deg_to_rad(45.0), 1.5, 0.1, 10.0);
        assert_relative_eq!(project(&proj, Vec3::new(0.0, 0.0, -0.1)).z, 0.0, epsilon = 1e-5);
        assert_relative_eq!(project(&proj, Vec3::new(0.0, 0.0, -10.0)).z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn perspective_scales_by_aspect() {
        let proj = Mat4::perspective(deg_to_rad(90.0), 2.0, 0.1, 10.0);
        assert_relative_eq!(proj[(1, 1)], 1.0, epsilon = 1e-6);
        assert_relative_eq!(proj[(0, 0)], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn look_at_places_target_on_negative_z() {
        let eye = Vec3::new(2.0, 2.0, 2.0);
        let view = Mat4::look_at(eye, Vec3::zeros(), Vec3::z());
        let origin = view.transform_point(&Point3::origin());
        assert_relative_eq!(origin.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(origin.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(origin.z, -eye.norm(), epsilon = 1e-5);

        let camera = view.transform_point(&Point3::new(2.0, 2.0, 2.0));
        assert_relative_eq!(camera.coords.norm(), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn look_at_matches_nalgebra() {
        let eye = Point3::new(2.0, 2.0, 2.0);
        let ours = Mat4::look_at(eye.coords, Vec3::zeros(), Vec3::z());
        let reference = Mat4::look_at_rh(&eye, &Point3::origin(), &Vec3::z());
        assert_relative_eq!(ours, reference, epsilon = 1e-5);
    }

    #[test]
    fn rotation_z_quarter_turn() {
        let rot = Mat4::rotation_z(deg_to_rad(90.0));
        let p = rot.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn column_major_export() {
        let m = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let cols = m.to_cols_array_2d();
        assert_eq!(cols[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(cols[0], [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn transform_applies_scale_before_translation() {
        let t = Transform {
            position: Vec3::new(1.0, 0.0, 0.0),
            scale: Vec3::new(2.0, 2.0, 2.0),
            ..Transform::identity()
        };
        let p = t.to_matrix().transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 3.0, epsilon = 1e-6);
    }
}
