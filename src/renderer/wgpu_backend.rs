use std::sync::Arc;

use wgpu::util::DeviceExt;

use crate::error::RenderError;
use crate::renderer::gpu::{check_buffer_size, BufferDescriptor, GpuBackend, GpuBuffer, LayoutRegistry};
use crate::renderer::vertex::{LayoutId, LayoutSignature};

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    layouts: LayoutRegistry,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            layouts: LayoutRegistry::new(),
        }
    }

    /// Requests an adapter without a surface. Returns `None` when the machine
    /// has no usable adapter.
    pub async fn request_headless() -> Option<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok()?;

        log::info!("Using adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("DeformMeshDevice"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .ok()?;

        Some(Self::new(device, queue))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

impl GpuBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn max_buffer_size(&self) -> u64 {
        self.device.limits().max_buffer_size
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor<'_>) -> Result<GpuBuffer, RenderError> {
        check_buffer_size(self, descriptor.label, descriptor.contents.len() as u64)?;
        if descriptor.contents.is_empty() {
            return Err(RenderError::Allocation {
                label: descriptor.label.to_string(),
                reason: "zero-sized buffer".to_string(),
            });
        }

        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(descriptor.label),
                contents: descriptor.contents,
                usage: descriptor.usage,
            });
        Ok(GpuBuffer::Wgpu(Arc::new(buffer)))
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) {
        match buffer.as_wgpu() {
            Some(buffer) => self.queue.write_buffer(buffer, offset, data),
            None => log::error!("WgpuBackend: cannot write to a foreign buffer"),
        }
    }

    fn read_buffer(&self, _buffer: &GpuBuffer) -> Option<Vec<u8>> {
        None
    }

    fn register_vertex_layout(&self, signature: &LayoutSignature) -> LayoutId {
        self.layouts.register(signature)
    }
}
