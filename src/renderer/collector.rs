use crate::renderer::batch::{FrameResourceId, MeshBatch};
use crate::renderer::material::ColoredMaterial;
use crate::renderer::uniforms::PrimitiveUniforms;

/// Receives the batches a proxy produces for one frame, and owns the
/// resources that only have to live until that frame is submitted.
pub trait MeshCollector {
    fn register_one_frame_material(&mut self, material: ColoredMaterial) -> FrameResourceId;

    fn allocate_primitive_uniforms(&mut self, uniforms: PrimitiveUniforms) -> FrameResourceId;

    fn add_mesh(&mut self, view_index: usize, batch: MeshBatch);
}

/// Collector that keeps batches grouped per view until the next `reset`.
#[derive(Default)]
pub struct BatchCollector {
    views: Vec<Vec<MeshBatch>>,
    materials: Vec<ColoredMaterial>,
    uniforms: Vec<PrimitiveUniforms>,
}

impl BatchCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_views(view_count: usize) -> Self {
        Self {
            views: (0..view_count).map(|_| Vec::new()).collect(),
            ..Self::default()
        }
    }

    /// Drops every batch and one-frame resource, keeping allocations.
    pub fn reset(&mut self) {
        for batches in &mut self.views {
            batches.clear();
        }
        self.materials.clear();
        self.uniforms.clear();
    }

    pub fn batches_for_view(&self, view_index: usize) -> &[MeshBatch] {
        self.views
            .get(view_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &MeshBatch)> {
        self.views
            .iter()
            .enumerate()
            .flat_map(|(view, batches)| batches.iter().map(move |batch| (view, batch)))
    }

    pub fn batch_count(&self) -> usize {
        self.views.iter().map(Vec::len).sum()
    }

    pub fn one_frame_material(&self, id: FrameResourceId) -> Option<&ColoredMaterial> {
        self.materials.get(id.0)
    }

    pub fn one_frame_material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn primitive_uniforms(&self, id: FrameResourceId) -> Option<&PrimitiveUniforms> {
        self.uniforms.get(id.0)
    }

    /// Uniform data of every batch, in allocation order, ready for upload.
    pub fn uniform_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.uniforms)
    }
}

impl MeshCollector for BatchCollector {
    fn register_one_frame_material(&mut self, material: ColoredMaterial) -> FrameResourceId {
        self.materials.push(material);
        FrameResourceId(self.materials.len() - 1)
    }

    fn allocate_primitive_uniforms(&mut self, uniforms: PrimitiveUniforms) -> FrameResourceId {
        self.uniforms.push(uniforms);
        FrameResourceId(self.uniforms.len() - 1)
    }

    fn add_mesh(&mut self, view_index: usize, batch: MeshBatch) {
        if view_index >= self.views.len() {
            self.views.resize_with(view_index + 1, Vec::new);
        }
        self.views[view_index].push(batch);
    }
}
