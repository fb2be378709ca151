// renderer/batch.rs
use std::sync::Arc;

use crate::renderer::gpu::GpuBuffer;
use crate::renderer::material::MaterialRef;
use crate::renderer::vertex::VertexFactory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    TriangleList,
}

impl PrimitiveTopology {
    pub fn vertices_per_primitive(self) -> u32 {
        match self {
            Self::TriangleList => 3,
        }
    }

    pub fn to_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            Self::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthPriorityGroup {
    #[default]
    World,
    Foreground,
}

/// Index buffer of one section.
#[derive(Debug)]
pub struct IndexBuffer {
    pub buffer: GpuBuffer,
    pub count: u32,
}

impl IndexBuffer {
    pub fn format(&self) -> wgpu::IndexFormat {
        wgpu::IndexFormat::Uint32
    }
}

/// Handle to a one-frame resource owned by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameResourceId(pub usize);

#[derive(Debug, Clone)]
pub enum BatchMaterial {
    Section(MaterialRef),
    OneFrame(FrameResourceId),
}

impl BatchMaterial {
    pub fn is_one_frame(&self) -> bool {
        matches!(self, Self::OneFrame(_))
    }
}

#[derive(Debug, Clone)]
pub struct MeshBatchElement {
    pub index_buffer: Arc<IndexBuffer>,
    pub first_index: u32,
    pub index_count: u32,
    pub min_vertex_index: u32,
    pub max_vertex_index: u32,
    pub primitive_uniforms: FrameResourceId,
}

/// One draw of one section into one view.
#[derive(Debug, Clone)]
pub struct MeshBatch {
    pub section_index: usize,
    pub element: MeshBatchElement,
    pub vertex_factory: Arc<VertexFactory>,
    pub deform_transforms: GpuBuffer,
    pub material: BatchMaterial,
    pub topology: PrimitiveTopology,
    pub reverse_culling: bool,
    pub wireframe: bool,
    pub depth_priority: DepthPriorityGroup,
    pub can_apply_view_mode_overrides: bool,
}

impl MeshBatch {
    pub fn num_primitives(&self) -> u32 {
        self.element.index_count / self.topology.vertices_per_primitive()
    }
}
