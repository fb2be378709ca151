//! Render-thread mirror of a deform mesh component.
//!
//! A [`RenderProxy`] is built in one go from a [`ProxySnapshot`] and after that
//! only ever patched: deform transforms go into the packed
//! [`TransformBuffer`], visibility flips straight into the section state.
//! Anything structural produces a brand new proxy instead.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use glam::Mat4;

use crate::asset::mesh::mesh_key;
use crate::error::RenderError;
use crate::renderer::batch::IndexBuffer;
use crate::renderer::collector::MeshCollector;
use crate::renderer::commands::{PrimitiveFlags, PrimitivePlacement, ProxySnapshot, SectionSnapshot};
use crate::renderer::frame::FrameRenderer;
use crate::renderer::gpu::{BufferDescriptor, GpuBackend};
use crate::renderer::material::{Material, MaterialRef, MaterialRelevance};
use crate::renderer::transforms::TransformBuffer;
use crate::renderer::vertex::{UploadedStreams, VertexFactory};
use crate::renderer::view::{SceneView, ShowFlags, ViewFamily, ViewRelevance};
use crate::settings::DeformMeshSettings;

/// Render-thread side of the drawable contract.
pub trait SceneProxy {
    fn collect_batches(
        &self,
        views: &[SceneView],
        family: &ViewFamily,
        visibility_map: u32,
        collector: &mut dyn MeshCollector,
    );

    fn view_relevance(&self, view: &SceneView, family: &ViewFamily) -> ViewRelevance;

    fn can_be_occluded(&self) -> bool;

    fn memory_footprint(&self) -> usize;
}

/// GPU resources and state of one section.
#[derive(Debug, Clone)]
pub struct SectionRenderState {
    pub material: MaterialRef,
    pub index_buffer: Arc<IndexBuffer>,
    pub vertex_factory: Arc<VertexFactory>,
    pub visible: bool,
    /// Cached so batch setup does not have to chase the vertex streams.
    pub max_vertex_index: u32,
}

pub struct RenderProxy {
    sections: Vec<Option<SectionRenderState>>,
    transforms: TransformBuffer,
    placement: PrimitivePlacement,
    /// `local_to_world` as of the last frame; becomes the next frame's
    /// previous placement.
    drawn_local_to_world: Mat4,
    flags: PrimitiveFlags,
    material_relevance: MaterialRelevance,
    settings: DeformMeshSettings,
}

impl RenderProxy {
    pub fn new(
        backend: &dyn GpuBackend,
        snapshot: &ProxySnapshot,
        settings: &DeformMeshSettings,
    ) -> Result<Self, RenderError> {
        let fallback_material = Material::fallback().into_ref();
        let mut uploaded: HashMap<usize, UploadedStreams> = HashMap::new();
        let mut sections = Vec::with_capacity(snapshot.sections.len());

        for (index, slot) in snapshot.sections.iter().enumerate() {
            let state = match slot {
                Some(section) => Some(build_section(
                    backend,
                    index,
                    section,
                    &fallback_material,
                    &mut uploaded,
                    settings,
                )?),
                None => None,
            };
            sections.push(state);
        }

        let initial: Vec<Mat4> = snapshot
            .sections
            .iter()
            .map(|slot| slot.as_ref().map_or(Mat4::IDENTITY, |s| s.deform_transform))
            .collect();
        let transforms = TransformBuffer::new(backend, &initial)?;

        let material_relevance = MaterialRelevance::from_materials(
            sections.iter().flatten().map(|s| &*s.material),
        );

        log::debug!(
            "Built deform mesh proxy: {} slots, {} sections, {} shared meshes",
            sections.len(),
            sections.iter().flatten().count(),
            uploaded.len()
        );

        Ok(Self {
            sections,
            transforms,
            placement: PrimitivePlacement {
                previous_local_to_world: snapshot.placement.local_to_world,
                ..snapshot.placement
            },
            drawn_local_to_world: snapshot.placement.local_to_world,
            flags: snapshot.flags,
            material_relevance,
            settings: settings.clone(),
        })
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn section(&self, index: usize) -> Option<&SectionRenderState> {
        self.sections.get(index).and_then(Option::as_ref)
    }

    pub fn sections(&self) -> &[Option<SectionRenderState>] {
        &self.sections
    }

    pub fn transforms(&self) -> &TransformBuffer {
        &self.transforms
    }

    pub fn placement(&self) -> &PrimitivePlacement {
        &self.placement
    }

    pub fn flags(&self) -> PrimitiveFlags {
        self.flags
    }

    pub fn settings(&self) -> &DeformMeshSettings {
        &self.settings
    }

    pub fn material_relevance(&self) -> MaterialRelevance {
        self.material_relevance
    }

    pub fn is_transform_dirty(&self) -> bool {
        self.transforms.is_dirty()
    }

    /// Applies a transform patch. Patches for slots this proxy does not know
    /// about are stale (a rebuild is on its way) and are dropped.
    pub fn update_deform_transform(&mut self, index: usize, transform: Mat4) -> bool {
        if self.section(index).is_none() {
            log::debug!("Dropping transform patch for unknown section {}", index);
            return false;
        }
        self.transforms.write(index, transform)
    }

    pub fn set_section_visibility(&mut self, index: usize, visible: bool) -> bool {
        match self.sections.get_mut(index).and_then(Option::as_mut) {
            Some(section) => {
                section.visible = visible;
                true
            }
            None => {
                log::debug!("Dropping visibility patch for unknown section {}", index);
                false
            }
        }
    }

    /// Takes a new placement from the control thread. The previous frame's
    /// placement is kept; only [`prepare_draw`](Self::prepare_draw) moves it.
    pub fn set_placement(&mut self, placement: PrimitivePlacement) {
        self.placement = PrimitivePlacement {
            previous_local_to_world: self.placement.previous_local_to_world,
            ..placement
        };
    }

    /// Continues the frame history of the proxy this one replaces, so a
    /// rebuild does not lose velocity.
    pub fn inherit_frame_history(&mut self, replaced: &RenderProxy) {
        self.drawn_local_to_world = replaced.drawn_local_to_world;
    }

    /// Starts a frame: last frame's placement becomes the previous one, then
    /// the transform buffer is uploaded if any patch touched it. Must run
    /// exactly once per frame, before batches are collected.
    pub fn prepare_draw(&mut self, backend: &dyn GpuBackend) -> Result<bool, RenderError> {
        self.placement.previous_local_to_world = self.drawn_local_to_world;
        self.drawn_local_to_world = self.placement.local_to_world;
        self.transforms.repack(backend)
    }

    fn allocated_size(&self) -> usize {
        self.sections.capacity() * mem::size_of::<Option<SectionRenderState>>()
            + self.transforms.allocated_size()
    }
}

fn build_section(
    backend: &dyn GpuBackend,
    index: usize,
    section: &SectionSnapshot,
    fallback_material: &MaterialRef,
    uploaded: &mut HashMap<usize, UploadedStreams>,
    settings: &DeformMeshSettings,
) -> Result<SectionRenderState, RenderError> {
    let indices = section.mesh.index_data();
    if indices.is_empty() {
        return Err(RenderError::EmptyIndexData { section: index });
    }

    let key = mesh_key(&section.mesh);
    let streams = match uploaded.get(&key) {
        Some(streams) => streams.clone(),
        None => {
            let streams = UploadedStreams::upload(backend, index, &section.mesh.vertex_streams())?;
            uploaded.insert(key, streams.clone());
            streams
        }
    };

    let label = format!("SectionIndexBuffer{index}");
    let buffer = backend.create_buffer(&BufferDescriptor {
        label: &label,
        usage: wgpu::BufferUsages::INDEX,
        contents: bytemuck::cast_slice(indices),
    })?;

    let vertex_factory = VertexFactory::new(
        backend,
        &streams,
        settings.max_texcoords as usize,
        index as u32,
    );

    Ok(SectionRenderState {
        material: section
            .material
            .clone()
            .or_else(|| section.mesh.material(0))
            .unwrap_or_else(|| fallback_material.clone()),
        index_buffer: Arc::new(IndexBuffer {
            buffer,
            count: indices.len() as u32,
        }),
        vertex_factory: Arc::new(vertex_factory),
        visible: section.visible,
        max_vertex_index: streams.vertex_count.saturating_sub(1),
    })
}

impl SceneProxy for RenderProxy {
    fn collect_batches(
        &self,
        views: &[SceneView],
        family: &ViewFamily,
        visibility_map: u32,
        collector: &mut dyn MeshCollector,
    ) {
        FrameRenderer::new(self).collect(views, family, visibility_map, collector);
    }

    fn view_relevance(&self, view: &SceneView, family: &ViewFamily) -> ViewRelevance {
        let mut relevance = ViewRelevance::DYNAMIC;
        relevance.set(ViewRelevance::DRAW, self.flags.visible);
        relevance.set(
            ViewRelevance::SHADOW,
            self.flags.cast_shadow
                && view.render_shadows
                && family.show_flags.contains(ShowFlags::SHADOWS),
        );
        relevance.set(ViewRelevance::MAIN_PASS, self.flags.render_in_main_pass);
        relevance.set(ViewRelevance::OPAQUE, self.material_relevance.opaque);
        relevance.set(ViewRelevance::TRANSLUCENT, self.material_relevance.translucent);
        relevance.set(
            ViewRelevance::VELOCITY,
            self.flags.movable
                && relevance.contains(ViewRelevance::OPAQUE | ViewRelevance::MAIN_PASS),
        );
        relevance
    }

    fn can_be_occluded(&self) -> bool {
        !self.material_relevance.disable_depth_test
    }

    fn memory_footprint(&self) -> usize {
        mem::size_of::<Self>() + self.allocated_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::StaticMesh;
    use crate::renderer::headless::HeadlessBackend;
    use glam::Vec3;

    fn snapshot(sections: Vec<Option<SectionSnapshot>>) -> ProxySnapshot {
        ProxySnapshot {
            sections,
            ..Default::default()
        }
    }

    fn section(transform: Mat4) -> Option<SectionSnapshot> {
        Some(SectionSnapshot {
            mesh: StaticMesh::cube("cube").into_handle(),
            material: None,
            deform_transform: transform,
            visible: true,
        })
    }

    #[test]
    fn empty_slots_stay_empty_but_keep_transform_slots() {
        let backend = HeadlessBackend::new();
        let proxy = RenderProxy::new(
            &backend,
            &snapshot(vec![section(Mat4::IDENTITY), None, section(Mat4::IDENTITY)]),
            &DeformMeshSettings::default(),
        )
        .unwrap();

        assert_eq!(proxy.section_count(), 3);
        assert!(proxy.section(1).is_none());
        assert_eq!(proxy.transforms().len(), 3);
        assert_eq!(proxy.section(2).unwrap().vertex_factory.transform_index, 2);
        assert_eq!(proxy.section(0).unwrap().max_vertex_index, 23);
        assert_eq!(proxy.section(0).unwrap().index_buffer.count, 36);
    }

    #[test]
    fn shared_mesh_streams_upload_once() {
        let backend = HeadlessBackend::new();
        let mesh = StaticMesh::cube("shared").into_handle();
        let shared = |_| {
            Some(SectionSnapshot {
                mesh: mesh.clone(),
                material: None,
                deform_transform: Mat4::IDENTITY,
                visible: true,
            })
        };
        let proxy = RenderProxy::new(
            &backend,
            &snapshot((0..4).map(shared).collect()),
            &DeformMeshSettings::default(),
        )
        .unwrap();

        let first = &proxy.section(0).unwrap().vertex_factory.default.bindings[0].buffer;
        let last = &proxy.section(3).unwrap().vertex_factory.default.bindings[0].buffer;
        assert!(first.same_allocation(last));
        // 2 vertex streams + 4 index buffers + 1 transform buffer
        assert_eq!(backend.buffers_created(), 7);
    }

    #[test]
    fn fallback_material_is_used_without_mesh_material() {
        let backend = HeadlessBackend::new();
        let proxy = RenderProxy::new(
            &backend,
            &snapshot(vec![section(Mat4::IDENTITY)]),
            &DeformMeshSettings::default(),
        )
        .unwrap();
        assert_eq!(proxy.section(0).unwrap().material.name, "DefaultMaterial");
    }

    #[test]
    fn empty_index_data_fails_construction() {
        let backend = HeadlessBackend::new();
        let mesh = StaticMesh::new("no-indices", vec![[0.0; 3]; 3], Vec::new()).into_handle();
        let result = RenderProxy::new(
            &backend,
            &snapshot(vec![
                section(Mat4::IDENTITY),
                Some(SectionSnapshot {
                    mesh,
                    material: None,
                    deform_transform: Mat4::IDENTITY,
                    visible: true,
                }),
            ]),
            &DeformMeshSettings::default(),
        );
        assert!(matches!(result, Err(RenderError::EmptyIndexData { section: 1 })));
    }

    #[test]
    fn patches_for_unknown_sections_are_dropped() {
        let backend = HeadlessBackend::new();
        let mut proxy = RenderProxy::new(
            &backend,
            &snapshot(vec![section(Mat4::IDENTITY), None]),
            &DeformMeshSettings::default(),
        )
        .unwrap();

        assert!(!proxy.update_deform_transform(1, Mat4::ZERO));
        assert!(!proxy.update_deform_transform(9, Mat4::ZERO));
        assert!(!proxy.set_section_visibility(9, false));
        assert!(!proxy.is_transform_dirty());

        let moved = Mat4::from_translation(Vec3::Z);
        assert!(proxy.update_deform_transform(0, moved));
        assert!(proxy.is_transform_dirty());
        assert_eq!(proxy.transforms().get(0), Some(moved));
    }

    #[test]
    fn relevance_follows_materials_and_flags() {
        let backend = HeadlessBackend::new();
        let mut snap = snapshot(vec![Some(SectionSnapshot {
            mesh: StaticMesh::cube("cube").into_handle(),
            material: Some(Material::rgb("glass", 1, 2, 3).with_alpha().without_depth_test().into_ref()),
            deform_transform: Mat4::IDENTITY,
            visible: true,
        })]);
        snap.flags.cast_shadow = false;
        let proxy = RenderProxy::new(&backend, &snap, &DeformMeshSettings::default()).unwrap();

        let view = SceneView::new("main", Mat4::IDENTITY);
        let relevance = proxy.view_relevance(&view, &ViewFamily::default());
        assert!(relevance.contains(ViewRelevance::DRAW | ViewRelevance::DYNAMIC));
        assert!(relevance.contains(ViewRelevance::TRANSLUCENT));
        assert!(!relevance.contains(ViewRelevance::SHADOW));
        assert!(!relevance.contains(ViewRelevance::VELOCITY));
        assert!(!proxy.can_be_occluded());
        assert!(proxy.memory_footprint() >= mem::size_of::<RenderProxy>());
    }

    #[test]
    fn previous_placement_rolls_once_per_frame() {
        let backend = HeadlessBackend::new();
        let mut proxy = RenderProxy::new(
            &backend,
            &snapshot(vec![section(Mat4::IDENTITY)]),
            &DeformMeshSettings::default(),
        )
        .unwrap();
        assert_eq!(proxy.placement().previous_local_to_world, Mat4::IDENTITY);

        let moved = Mat4::from_translation(Vec3::Y);
        let mut placement = *proxy.placement();
        placement.local_to_world = moved;
        proxy.set_placement(placement);
        assert_eq!(proxy.placement().previous_local_to_world, Mat4::IDENTITY);

        proxy.prepare_draw(&backend).unwrap();
        assert_eq!(proxy.placement().previous_local_to_world, Mat4::IDENTITY);
        assert_eq!(proxy.placement().local_to_world, moved);

        proxy.prepare_draw(&backend).unwrap();
        assert_eq!(proxy.placement().previous_local_to_world, moved);

        let mut rebuilt = RenderProxy::new(
            &backend,
            &snapshot(vec![section(Mat4::IDENTITY)]),
            &DeformMeshSettings::default(),
        )
        .unwrap();
        rebuilt.inherit_frame_history(&proxy);
        rebuilt.prepare_draw(&backend).unwrap();
        assert_eq!(rebuilt.placement().previous_local_to_world, moved);
        assert_eq!(rebuilt.placement().local_to_world, Mat4::IDENTITY);
    }
}
