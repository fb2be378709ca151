// renderer/uniforms.rs
use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::scene::bounds::BoxSphereBounds;

/// One slot of the packed deform transform buffer.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, PartialEq, Debug)]
pub struct DeformTransformData {
    pub matrix: [[f32; 4]; 4],
}

impl DeformTransformData {
    pub fn from_matrix(matrix: Mat4) -> Self {
        Self {
            matrix: matrix.to_cols_array_2d(),
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.matrix)
    }
}

impl Default for DeformTransformData {
    fn default() -> Self {
        Self::from_matrix(Mat4::IDENTITY)
    }
}

pub const PRIMITIVE_FLAG_DRAWS_VELOCITY: u32 = 1 << 0;
pub const PRIMITIVE_FLAG_OUTPUT_VELOCITY: u32 = 1 << 1;
pub const PRIMITIVE_FLAG_REVERSE_CULLING: u32 = 1 << 2;

/// Per-draw primitive data: placement for this frame and the previous one,
/// plus bounds. Allocated once per batch for a single frame.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, PartialEq, Debug)]
pub struct PrimitiveUniforms {
    pub local_to_world: [[f32; 4]; 4],
    pub previous_local_to_world: [[f32; 4]; 4],
    pub world_bounds_origin: [f32; 3],
    pub world_sphere_radius: f32,
    pub world_bounds_extent: [f32; 3],
    pub flags: u32,
    pub local_bounds_min: [f32; 3],
    pub _padding0: f32,
    pub local_bounds_max: [f32; 3],
    pub _padding1: f32,
}

impl PrimitiveUniforms {
    pub fn new(
        local_to_world: Mat4,
        previous_local_to_world: Mat4,
        world_bounds: &BoxSphereBounds,
        local_bounds: &BoxSphereBounds,
        flags: u32,
    ) -> Self {
        let local = local_bounds.to_aabb();
        Self {
            local_to_world: local_to_world.to_cols_array_2d(),
            previous_local_to_world: previous_local_to_world.to_cols_array_2d(),
            world_bounds_origin: world_bounds.origin.to_array(),
            world_sphere_radius: world_bounds.sphere_radius,
            world_bounds_extent: world_bounds.box_extent.to_array(),
            flags,
            local_bounds_min: local.min.to_array(),
            _padding0: 0.0,
            local_bounds_max: local.max.to_array(),
            _padding1: 0.0,
        }
    }
}
