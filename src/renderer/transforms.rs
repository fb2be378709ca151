use std::mem;

use glam::Mat4;

use crate::error::RenderError;
use crate::renderer::gpu::{BufferDescriptor, GpuBackend, GpuBuffer};
use crate::renderer::uniforms::DeformTransformData;

const TRANSFORM_BUFFER_LABEL: &str = "DeformTransforms";

/// Packed deform transforms of every section of one proxy, one slot per
/// section index, plus the storage buffer the vertex shaders read them from.
///
/// The slot count is fixed when the proxy is built; a rebuild makes a new
/// buffer. Slots are only written on the render thread. The GPU copy is refreshed by
/// [`TransformBuffer::repack`] right before batches are collected, so a frame
/// either sees the previous upload or the complete new one.
pub struct TransformBuffer {
    scratch: Vec<DeformTransformData>,
    buffer: GpuBuffer,
    dirty: bool,
}

impl TransformBuffer {
    pub fn new(backend: &dyn GpuBackend, transforms: &[Mat4]) -> Result<Self, RenderError> {
        let scratch: Vec<_> = transforms
            .iter()
            .copied()
            .map(DeformTransformData::from_matrix)
            .collect();
        let buffer = create_storage(backend, &scratch)?;

        Ok(Self {
            scratch,
            buffer,
            dirty: false,
        })
    }

    pub fn len(&self) -> usize {
        self.scratch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scratch.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn get(&self, index: usize) -> Option<Mat4> {
        self.scratch.get(index).map(DeformTransformData::to_matrix)
    }

    pub fn as_slice(&self) -> &[DeformTransformData] {
        &self.scratch
    }

    /// The storage buffer bound alongside each section's vertex layout.
    pub fn gpu_view(&self) -> &GpuBuffer {
        &self.buffer
    }

    /// Replaces one slot. Returns false (and changes nothing) when `index` is
    /// outside the buffer.
    pub fn write(&mut self, index: usize, transform: Mat4) -> bool {
        match self.scratch.get_mut(index) {
            Some(slot) => {
                *slot = DeformTransformData::from_matrix(transform);
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Uploads the whole CPU copy if anything changed since the last upload.
    /// Returns whether an upload happened.
    pub fn repack(&mut self, backend: &dyn GpuBackend) -> Result<bool, RenderError> {
        if !self.dirty {
            return Ok(false);
        }

        if !self.scratch.is_empty() {
            backend.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&self.scratch));
        }

        self.dirty = false;
        Ok(true)
    }

    pub fn allocated_size(&self) -> usize {
        self.scratch.capacity() * mem::size_of::<DeformTransformData>()
    }
}

/// Storage buffers cannot be empty, so a proxy without sections still gets
/// one identity slot.
fn create_storage(
    backend: &dyn GpuBackend,
    contents: &[DeformTransformData],
) -> Result<GpuBuffer, RenderError> {
    let mut padded = contents.to_vec();
    if padded.is_empty() {
        padded.push(DeformTransformData::default());
    }
    backend.create_buffer(&BufferDescriptor {
        label: TRANSFORM_BUFFER_LABEL,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        contents: bytemuck::cast_slice(&padded),
    })
}
