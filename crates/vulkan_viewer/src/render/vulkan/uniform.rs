//! Per-image uniform block
//!
//! Matches the `UniformBufferObject` block in the vertex shader: three column-major
//! `mat4`s, 192 bytes.

use crate::foundation::math::{deg_to_rad, Mat4, Mat4Ext, Vec3};
use ash::vk;

/// Camera eye position
pub const EYE: [f32; 3] = [2.0, 2.0, 2.0];
/// Vertical field of view in degrees
pub const FOV_Y_DEGREES: f32 = 45.0;
/// Near clip plane
pub const Z_NEAR: f32 = 0.1;
/// Far clip plane
pub const Z_FAR: f32 = 10.0;
/// Model spin rate around +Z
pub const DEGREES_PER_SECOND: f32 = 90.0;

/// Model, view and projection matrices as uploaded to the GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformBufferObject {
    /// Node transform followed by the animated spin
    pub model: [[f32; 4]; 4],
    /// Camera view
    pub view: [[f32; 4]; 4],
    /// Projection with Y flipped for Vulkan clip space
    pub proj: [[f32; 4]; 4],
}

unsafe impl bytemuck::Pod for UniformBufferObject {}
unsafe impl bytemuck::Zeroable for UniformBufferObject {}

impl UniformBufferObject {
    /// Size of the block in bytes
    pub const SIZE: vk::DeviceSize = std::mem::size_of::<Self>() as vk::DeviceSize;

    /// Matrices for elapsed `time_seconds` at the given swapchain extent
    pub fn for_frame(time_seconds: f32, extent: vk::Extent2D, node_transform: &Mat4) -> Self {
        let spin = Mat4::rotation_z(time_seconds * deg_to_rad(DEGREES_PER_SECOND));
        let model = node_transform * spin;

        let view = Mat4::look_at(Vec3::from(EYE), Vec3::zeros(), Vec3::z());

        let aspect = extent.width as f32 / extent.height.max(1) as f32;
        let mut proj = Mat4::perspective(deg_to_rad(FOV_Y_DEGREES), aspect, Z_NEAR, Z_FAR);
        proj[(1, 1)] *= -1.0;

        Self {
            model: model.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    #[test]
    fn block_is_three_mat4s() {
        assert_eq!(UniformBufferObject::SIZE, 192);
        assert_eq!(std::mem::align_of::<UniformBufferObject>(), 4);
    }

    #[test]
    fn projection_y_is_negated() {
        let ubo = UniformBufferObject::for_frame(0.0, extent(800, 600), &Mat4::identity());
        let unflipped = Mat4::perspective(deg_to_rad(45.0), 800.0 / 600.0, 0.1, 10.0);

        assert_relative_eq!(ubo.proj[1][1], -unflipped[(1, 1)]);
        assert!(ubo.proj[1][1] < 0.0);
        assert_relative_eq!(ubo.proj[0][0], unflipped[(0, 0)]);
    }

    #[test]
    fn model_spins_a_quarter_turn_per_second() {
        let ubo = UniformBufferObject::for_frame(1.0, extent(800, 600), &Mat4::identity());
        // Column 0 is the image of +X: a quarter turn maps it to +Y
        assert_relative_eq!(ubo.model[0][0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(ubo.model[0][1], 1.0, epsilon = 1e-6);

        let at_rest = UniformBufferObject::for_frame(0.0, extent(800, 600), &Mat4::identity());
        assert_eq!(at_rest.model, Mat4::identity().to_cols_array_2d());
    }

    #[test]
    fn node_transform_is_applied_after_spin() {
        let translate = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let ubo = UniformBufferObject::for_frame(0.5, extent(800, 600), &translate);
        assert_relative_eq!(ubo.model[3][0], 1.0);
        assert_relative_eq!(ubo.model[3][1], 2.0);
        assert_relative_eq!(ubo.model[3][2], 3.0);
    }

    #[test]
    fn view_looks_at_origin_from_eye() {
        let ubo = UniformBufferObject::for_frame(0.0, extent(800, 600), &Mat4::identity());
        let view = Mat4::from(ubo.view);
        let origin = view.transform_point(&nalgebra::Point3::origin());
        assert_relative_eq!(origin.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(origin.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(origin.z, -(12.0f32).sqrt(), epsilon = 1e-5);
    }

    #[test]
    fn zero_height_does_not_divide_by_zero() {
        let ubo = UniformBufferObject::for_frame(0.0, extent(800, 0), &Mat4::identity());
        assert!(ubo.proj[0][0].is_finite());
    }
}
