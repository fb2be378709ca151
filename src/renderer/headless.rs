//! CPU-memory backend. Buffers are plain byte vectors so contents can be read
//! back; used by tests, tools and as the fallback when no adapter exists.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::RenderError;
use crate::renderer::gpu::{check_buffer_size, BufferDescriptor, GpuBackend, GpuBuffer, LayoutRegistry};
use crate::renderer::vertex::{LayoutId, LayoutSignature};

/// Matches the wgpu default `max_buffer_size`.
pub const DEFAULT_MAX_BUFFER_SIZE: u64 = 256 * 1024 * 1024;

#[derive(Debug)]
pub struct HeadlessBuffer {
    label: String,
    usage: wgpu::BufferUsages,
    data: Mutex<Vec<u8>>,
    /// Shared with the backend; counts buffers not yet dropped.
    live: Arc<AtomicUsize>,
}

impl Drop for HeadlessBuffer {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::Relaxed);
    }
}

impl HeadlessBuffer {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn usage(&self) -> wgpu::BufferUsages {
        self.usage
    }

    pub fn size(&self) -> u64 {
        self.data.lock().len() as u64
    }

    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().clone()
    }
}

pub struct HeadlessBackend {
    max_buffer_size: u64,
    layouts: LayoutRegistry,
    live: Arc<AtomicUsize>,
    buffers_created: AtomicUsize,
    writes: AtomicUsize,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::with_max_buffer_size(DEFAULT_MAX_BUFFER_SIZE)
    }

    pub fn with_max_buffer_size(max_buffer_size: u64) -> Self {
        Self {
            max_buffer_size,
            layouts: LayoutRegistry::new(),
            live: Arc::new(AtomicUsize::new(0)),
            buffers_created: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn buffers_created(&self) -> usize {
        self.buffers_created.load(Ordering::Relaxed)
    }

    /// Buffers still referenced by someone (proxy, batch, ...).
    pub fn live_buffers(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn registered_layouts(&self) -> usize {
        self.layouts.len()
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "Headless"
    }

    fn max_buffer_size(&self) -> u64 {
        self.max_buffer_size
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor<'_>) -> Result<GpuBuffer, RenderError> {
        check_buffer_size(self, descriptor.label, descriptor.contents.len() as u64)?;

        log::trace!(
            "HeadlessBackend: creating buffer {} ({} bytes)",
            descriptor.label,
            descriptor.contents.len()
        );
        let buffer = Arc::new(HeadlessBuffer {
            label: descriptor.label.to_string(),
            usage: descriptor.usage,
            data: Mutex::new(descriptor.contents.to_vec()),
            live: self.live.clone(),
        });
        self.live.fetch_add(1, Ordering::Relaxed);
        self.buffers_created.fetch_add(1, Ordering::Relaxed);
        Ok(GpuBuffer::Headless(buffer))
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) {
        let GpuBuffer::Headless(buffer) = buffer else {
            log::error!("HeadlessBackend: cannot write to a foreign buffer");
            return;
        };

        let mut contents = buffer.data.lock();
        let start = offset as usize;
        let end = start + data.len();
        if end > contents.len() {
            log::error!(
                "HeadlessBackend: write of {} bytes at {} overruns buffer {} ({} bytes)",
                data.len(),
                offset,
                buffer.label,
                contents.len()
            );
            return;
        }
        contents[start..end].copy_from_slice(data);
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    fn read_buffer(&self, buffer: &GpuBuffer) -> Option<Vec<u8>> {
        match buffer {
            GpuBuffer::Headless(buffer) => Some(buffer.contents()),
            GpuBuffer::Wgpu(_) => None,
        }
    }

    fn register_vertex_layout(&self, signature: &LayoutSignature) -> LayoutId {
        self.layouts.register(signature)
    }
}
