//! Per-frame batch assembly for a [`RenderProxy`].

use crate::renderer::batch::{
    BatchMaterial, DepthPriorityGroup, MeshBatch, MeshBatchElement, PrimitiveTopology,
};
use crate::renderer::collector::MeshCollector;
use crate::renderer::material::ColoredMaterial;
use crate::renderer::proxy::RenderProxy;
use crate::renderer::uniforms::{
    PrimitiveUniforms, PRIMITIVE_FLAG_DRAWS_VELOCITY, PRIMITIVE_FLAG_OUTPUT_VELOCITY,
    PRIMITIVE_FLAG_REVERSE_CULLING,
};
use crate::renderer::view::{is_visible_in, SceneView, ShowFlags, ViewFamily};

pub struct FrameRenderer<'a> {
    proxy: &'a RenderProxy,
}

impl<'a> FrameRenderer<'a> {
    pub fn new(proxy: &'a RenderProxy) -> Self {
        Self { proxy }
    }

    pub fn wireframe_requested(&self, family: &ViewFamily) -> bool {
        self.proxy.settings().allow_debug_view_modes
            && family.show_flags.contains(ShowFlags::WIREFRAME)
    }

    /// Emits one batch per visible section for every view set in
    /// `visibility_map`. Returns the number of batches added.
    pub fn collect(
        &self,
        views: &[SceneView],
        family: &ViewFamily,
        visibility_map: u32,
        collector: &mut dyn MeshCollector,
    ) -> usize {
        let wireframe = self.wireframe_requested(family);
        // Shared by every section and view of this frame.
        let wireframe_material = wireframe.then(|| {
            collector.register_one_frame_material(ColoredMaterial {
                parent: family.wireframe_material.clone(),
                color: self.proxy.settings().wireframe_color,
            })
        });

        let placement = self.proxy.placement();
        let reverse_culling = placement.is_determinant_negative();
        let flags = self.primitive_flags(reverse_culling);
        let deform_transforms = self.proxy.transforms().gpu_view();

        let mut emitted = 0;
        for (section_index, slot) in self.proxy.sections().iter().enumerate() {
            let Some(section) = slot else { continue };
            if !section.visible {
                continue;
            }

            for view_index in 0..views.len() {
                if !is_visible_in(visibility_map, view_index) {
                    continue;
                }

                let uniforms = collector.allocate_primitive_uniforms(PrimitiveUniforms::new(
                    placement.local_to_world,
                    placement.previous_local_to_world,
                    &placement.bounds,
                    &placement.local_bounds,
                    flags,
                ));

                let material = match wireframe_material {
                    Some(id) => BatchMaterial::OneFrame(id),
                    None => BatchMaterial::Section(section.material.clone()),
                };

                collector.add_mesh(
                    view_index,
                    MeshBatch {
                        section_index,
                        element: MeshBatchElement {
                            index_buffer: section.index_buffer.clone(),
                            first_index: 0,
                            index_count: section.index_buffer.count,
                            min_vertex_index: 0,
                            max_vertex_index: section.max_vertex_index,
                            primitive_uniforms: uniforms,
                        },
                        vertex_factory: section.vertex_factory.clone(),
                        deform_transforms: deform_transforms.clone(),
                        material,
                        topology: PrimitiveTopology::TriangleList,
                        reverse_culling,
                        wireframe,
                        depth_priority: DepthPriorityGroup::World,
                        can_apply_view_mode_overrides: false,
                    },
                );
                emitted += 1;
            }
        }

        if self.proxy.is_transform_dirty() {
            log::warn!("Collected deform mesh batches with un-uploaded transforms");
        }
        emitted
    }

    fn primitive_flags(&self, reverse_culling: bool) -> u32 {
        let placement = self.proxy.placement();
        let mut flags = 0;
        if self.proxy.flags().movable {
            flags |= PRIMITIVE_FLAG_DRAWS_VELOCITY;
        }
        if placement.local_to_world != placement.previous_local_to_world {
            flags |= PRIMITIVE_FLAG_OUTPUT_VELOCITY;
        }
        if reverse_culling {
            flags |= PRIMITIVE_FLAG_REVERSE_CULLING;
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::StaticMesh;
    use crate::renderer::collector::BatchCollector;
    use crate::renderer::commands::{ProxySnapshot, SectionSnapshot};
    use crate::renderer::headless::HeadlessBackend;
    use crate::settings::DeformMeshSettings;
    use glam::{Mat4, Vec3};

    fn proxy_with(visible: &[bool], settings: &DeformMeshSettings) -> RenderProxy {
        let backend = HeadlessBackend::new();
        let mesh = StaticMesh::cube("cube").into_handle();
        let snapshot = ProxySnapshot {
            sections: visible
                .iter()
                .map(|&visible| {
                    Some(SectionSnapshot {
                        mesh: mesh.clone(),
                        material: None,
                        deform_transform: Mat4::IDENTITY,
                        visible,
                    })
                })
                .collect(),
            ..Default::default()
        };
        RenderProxy::new(&backend, &snapshot, settings).unwrap()
    }

    fn views(count: usize) -> Vec<SceneView> {
        (0..count)
            .map(|i| SceneView::new(format!("view{i}"), Mat4::IDENTITY))
            .collect()
    }

    #[test]
    fn batch_fields_describe_the_whole_section() {
        let proxy = proxy_with(&[true], &DeformMeshSettings::default());
        let mut collector = BatchCollector::new();
        let emitted =
            FrameRenderer::new(&proxy).collect(&views(1), &ViewFamily::default(), 1, &mut collector);

        assert_eq!(emitted, 1);
        let batch = &collector.batches_for_view(0)[0];
        assert_eq!(batch.element.first_index, 0);
        assert_eq!(batch.element.index_count, 36);
        assert_eq!(batch.num_primitives(), 12);
        assert_eq!(batch.element.min_vertex_index, 0);
        assert_eq!(batch.element.max_vertex_index, 23);
        assert!(!batch.reverse_culling);
        assert!(!batch.wireframe);
        assert!(!batch.can_apply_view_mode_overrides);
        assert_eq!(batch.depth_priority, DepthPriorityGroup::World);
        assert!(batch
            .deform_transforms
            .same_allocation(proxy.transforms().gpu_view()));
    }

    #[test]
    fn views_outside_the_bitmap_get_nothing() {
        let proxy = proxy_with(&[true, true], &DeformMeshSettings::default());
        let mut collector = BatchCollector::new();
        FrameRenderer::new(&proxy).collect(
            &views(3),
            &ViewFamily::default(),
            0b100,
            &mut collector,
        );

        assert!(collector.batches_for_view(0).is_empty());
        assert!(collector.batches_for_view(1).is_empty());
        assert_eq!(collector.batches_for_view(2).len(), 2);
    }

    #[test]
    fn mirrored_placement_reverses_culling() {
        let mut proxy = proxy_with(&[true], &DeformMeshSettings::default());
        let mut placement = *proxy.placement();
        placement.local_to_world = Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0));
        proxy.set_placement(placement);

        let mut collector = BatchCollector::new();
        FrameRenderer::new(&proxy).collect(&views(1), &ViewFamily::default(), 1, &mut collector);

        let batch = &collector.batches_for_view(0)[0];
        assert!(batch.reverse_culling);
        let uniforms = collector
            .primitive_uniforms(batch.element.primitive_uniforms)
            .unwrap();
        assert_ne!(uniforms.flags & PRIMITIVE_FLAG_REVERSE_CULLING, 0);
        assert_ne!(uniforms.flags & PRIMITIVE_FLAG_OUTPUT_VELOCITY, 0);
    }

    #[test]
    fn wireframe_needs_debug_view_modes() {
        let settings = DeformMeshSettings {
            allow_debug_view_modes: false,
            ..Default::default()
        };
        let proxy = proxy_with(&[true], &settings);
        let mut collector = BatchCollector::new();
        FrameRenderer::new(&proxy).collect(&views(1), &ViewFamily::wireframe(), 1, &mut collector);

        let batch = &collector.batches_for_view(0)[0];
        assert!(!batch.wireframe);
        assert!(!batch.material.is_one_frame());
        assert_eq!(collector.one_frame_material_count(), 0);
    }
}
