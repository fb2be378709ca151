//! The slice of the GPU abstraction the deform mesh consumes: buffer
//! allocation and upload, plus vertex layout registration.
//!
//! Pipeline creation and shader permutations live outside this crate; the
//! proxy only hands over buffers and layout identifiers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::RenderError;
use crate::renderer::headless::HeadlessBuffer;
use crate::renderer::vertex::{LayoutId, LayoutSignature};

/// A GPU buffer owned by whichever backend created it. Cloning shares the
/// allocation; it is released when the last clone drops.
#[derive(Clone)]
pub enum GpuBuffer {
    Headless(Arc<HeadlessBuffer>),
    Wgpu(Arc<wgpu::Buffer>),
}

impl GpuBuffer {
    pub fn size(&self) -> u64 {
        match self {
            Self::Headless(buffer) => buffer.size(),
            Self::Wgpu(buffer) => buffer.size(),
        }
    }

    /// True when both handles refer to the same allocation.
    pub fn same_allocation(&self, other: &GpuBuffer) -> bool {
        match (self, other) {
            (Self::Headless(a), Self::Headless(b)) => Arc::ptr_eq(a, b),
            (Self::Wgpu(a), Self::Wgpu(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn as_wgpu(&self) -> Option<&wgpu::Buffer> {
        match self {
            Self::Wgpu(buffer) => Some(buffer),
            Self::Headless(_) => None,
        }
    }
}

impl fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Headless(buffer) => f
                .debug_struct("GpuBuffer::Headless")
                .field("label", &buffer.label())
                .field("size", &buffer.size())
                .finish(),
            Self::Wgpu(buffer) => f.debug_tuple("GpuBuffer::Wgpu").field(buffer).finish(),
        }
    }
}

pub struct BufferDescriptor<'a> {
    pub label: &'a str,
    pub usage: wgpu::BufferUsages,
    pub contents: &'a [u8],
}

pub trait GpuBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn max_buffer_size(&self) -> u64;

    /// Allocates a buffer initialised with `descriptor.contents`.
    fn create_buffer(&self, descriptor: &BufferDescriptor<'_>) -> Result<GpuBuffer, RenderError>;

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]);

    /// Reads a buffer back to the CPU, where the backend supports it.
    fn read_buffer(&self, buffer: &GpuBuffer) -> Option<Vec<u8>>;

    fn register_vertex_layout(&self, signature: &LayoutSignature) -> LayoutId;
}

pub(crate) fn check_buffer_size(
    backend: &dyn GpuBackend,
    label: &str,
    size: u64,
) -> Result<(), RenderError> {
    let limit = backend.max_buffer_size();
    if size > limit {
        return Err(RenderError::BufferTooLarge {
            label: label.to_string(),
            size,
            limit,
        });
    }
    Ok(())
}

/// Deduplicates vertex layouts: identical stream formats share one id.
#[derive(Default)]
pub struct LayoutRegistry {
    layouts: Mutex<HashMap<LayoutSignature, LayoutId>>,
}

impl LayoutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, signature: &LayoutSignature) -> LayoutId {
        let mut layouts = self.layouts.lock();
        let next = LayoutId(layouts.len() as u32);
        let id = *layouts.entry(signature.clone()).or_insert(next);
        if id == next {
            log::debug!("Registered vertex layout {:?}: {:?}", id, signature);
        }
        id
    }

    pub fn len(&self) -> usize {
        self.layouts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
