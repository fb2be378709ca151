//! Control-thread owner of a deform mesh.
//!
//! [`DeformMeshComponent`] is the authoritative copy of every section. Edits
//! that change which GPU resources exist (creating, replacing or removing
//! sections, material overrides, primitive flags) only mark the render state
//! dirty; the snapshot for the render thread goes out on
//! [`flush_render_state`](DeformMeshComponent::flush_render_state), or right
//! before the next patch so patches never overtake the rebuild they belong to.

use glam::Mat4;

use crate::asset::MeshHandle;
use crate::renderer::commands::{
    PrimitiveFlags, PrimitivePlacement, ProxySnapshot, RenderCommand, RenderCommandSender,
    SectionSnapshot,
};
use crate::renderer::material::MaterialRef;
use crate::scene::bounds::BoxSphereBounds;
use crate::scene::drawable::Drawable;
use crate::scene::section::{MeshSection, SectionCollection};
use crate::settings::DeformMeshSettings;

#[derive(Debug)]
pub struct DeformMeshComponent {
    sections: SectionCollection,
    /// Per-section material overrides, indexed like `sections`.
    materials: Vec<Option<MaterialRef>>,
    local_bounds: BoxSphereBounds,
    local_to_world: Mat4,
    flags: PrimitiveFlags,
    bounds_scale: f32,
    render: Option<RenderCommandSender>,
    render_state_dirty: bool,
}

impl Default for DeformMeshComponent {
    fn default() -> Self {
        Self::new()
    }
}

impl DeformMeshComponent {
    pub fn new() -> Self {
        Self {
            sections: SectionCollection::new(),
            materials: Vec::new(),
            local_bounds: BoxSphereBounds::ZERO,
            local_to_world: Mat4::IDENTITY,
            flags: PrimitiveFlags::default(),
            bounds_scale: 1.0,
            render: None,
            render_state_dirty: false,
        }
    }

    pub fn with_settings(settings: &DeformMeshSettings) -> Self {
        let mut component = Self::new();
        component.bounds_scale = settings.bounds_scale;
        component
    }

    // ---- sections ----

    /// Creates (or recreates) the section at `index`, growing the collection
    /// with empty sections as needed.
    pub fn create_section(&mut self, index: usize, mesh: MeshHandle, transform: impl Into<Mat4>) {
        let Some(len) = slot_len(index) else {
            log::trace!("Ignoring section creation at index {}", index);
            return;
        };
        self.sections.ensure_len(len);
        self.ensure_material_slots(len);

        self.materials[index] = mesh.material(0);
        if let Some(section) = self.sections.get_mut(index) {
            *section = MeshSection::new(mesh, transform.into());
        }

        self.update_local_bounds();
        self.mark_render_state_dirty();
    }

    /// Replaces the deform transform of an existing section. Unknown or empty
    /// sections are ignored.
    pub fn update_section_transform(&mut self, index: usize, transform: impl Into<Mat4>) {
        let transform = transform.into();
        let Some(section) = self.sections.get_mut(index) else {
            log::trace!("Ignoring transform update for out-of-range section {}", index);
            return;
        };
        let Some(mesh) = &section.source_mesh else {
            log::trace!("Ignoring transform update for empty section {}", index);
            return;
        };

        section.local_box += mesh.bounds().transform_by(transform);
        section.deform_transform = transform;

        let bounds_changed = self.update_local_bounds();
        self.send_patch(RenderCommand::UpdateTransform { index, transform });
        if bounds_changed {
            self.send_placement();
        }
    }

    pub fn set_section_visible(&mut self, index: usize, visible: bool) {
        let Some(section) = self.sections.get_mut(index) else {
            log::trace!("Ignoring visibility change for out-of-range section {}", index);
            return;
        };
        section.visible = visible;
        self.send_patch(RenderCommand::SetVisibility { index, visible });
    }

    pub fn is_section_visible(&self, index: usize) -> bool {
        self.sections.get(index).is_some_and(|s| s.visible)
    }

    /// Replaces a whole section, growing the collection as needed.
    pub fn set_section(&mut self, index: usize, section: MeshSection) {
        let Some(len) = slot_len(index) else {
            log::trace!("Ignoring section replacement at index {}", index);
            return;
        };
        self.sections.ensure_len(len);
        self.ensure_material_slots(len);
        if let Some(slot) = self.sections.get_mut(index) {
            *slot = section;
        }
        self.update_local_bounds();
        self.mark_render_state_dirty();
    }

    /// Empties the section at `index`. The slot stays, so other indices keep
    /// addressing the same sections.
    pub fn remove_section(&mut self, index: usize) {
        if !self.sections.reset(index) {
            log::trace!("Ignoring removal of out-of-range section {}", index);
            return;
        }
        if let Some(material) = self.materials.get_mut(index) {
            *material = None;
        }
        self.update_local_bounds();
        self.mark_render_state_dirty();
    }

    pub fn clear_all_sections(&mut self) {
        self.sections.clear();
        self.materials.clear();
        self.update_local_bounds();
        self.mark_render_state_dirty();
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn section(&self, index: usize) -> Option<&MeshSection> {
        self.sections.get(index)
    }

    pub fn sections(&self) -> &SectionCollection {
        &self.sections
    }

    // ---- materials ----

    pub fn set_material(&mut self, index: usize, material: Option<MaterialRef>) {
        let Some(len) = slot_len(index) else {
            log::trace!("Ignoring material override at index {}", index);
            return;
        };
        self.ensure_material_slots(len);
        self.materials[index] = material;
        self.mark_render_state_dirty();
    }

    fn ensure_material_slots(&mut self, len: usize) {
        if self.materials.len() < len {
            self.materials.resize(len, None);
        }
    }

    // ---- placement and bounds ----

    pub fn local_to_world(&self) -> Mat4 {
        self.local_to_world
    }

    /// Moves the whole component.
    pub fn set_local_to_world(&mut self, local_to_world: Mat4) {
        self.local_to_world = local_to_world;
        self.send_placement();
    }

    pub fn local_bounds(&self) -> BoxSphereBounds {
        self.local_bounds
    }

    /// World-space bounds, scaled by `bounds_scale`.
    pub fn bounds(&self) -> BoxSphereBounds {
        self.compute_bounds(self.local_to_world)
    }

    pub fn bounds_scale(&self) -> f32 {
        self.bounds_scale
    }

    pub fn set_bounds_scale(&mut self, bounds_scale: f32) {
        self.bounds_scale = bounds_scale;
        self.send_placement();
    }

    /// The previous frame's placement is tracked by the proxy, which knows
    /// where frames begin; here it just mirrors `local_to_world`.
    pub fn placement(&self) -> PrimitivePlacement {
        PrimitivePlacement {
            local_to_world: self.local_to_world,
            previous_local_to_world: self.local_to_world,
            bounds: self.bounds(),
            local_bounds: self.local_bounds,
        }
    }

    /// Recomputes the aggregate local bounds. Returns whether they changed.
    fn update_local_bounds(&mut self) -> bool {
        let local_bounds = BoxSphereBounds::from_aabb(&self.sections.aggregate_box());
        let changed = local_bounds != self.local_bounds;
        self.local_bounds = local_bounds;
        changed
    }

    // ---- primitive flags ----

    pub fn primitive_flags(&self) -> PrimitiveFlags {
        self.flags
    }

    pub fn set_primitive_flags(&mut self, flags: PrimitiveFlags) {
        if flags != self.flags {
            self.flags = flags;
            self.mark_render_state_dirty();
        }
    }

    // ---- render state ----

    /// Connects the component to a render-thread proxy host and queues the
    /// initial build.
    pub fn attach_render_state(&mut self, sender: RenderCommandSender) {
        if self.render.is_some() {
            self.detach_render_state();
        }
        self.render = Some(sender);
        self.render_state_dirty = true;
        self.flush_render_state();
    }

    /// Tells the proxy host to drop its proxy and disconnects from it.
    pub fn detach_render_state(&mut self) {
        if let Some(render) = self.render.take() {
            render.send(RenderCommand::Release);
        }
    }

    pub fn has_render_state(&self) -> bool {
        self.render.is_some()
    }

    pub fn is_render_state_dirty(&self) -> bool {
        self.render_state_dirty
    }

    /// Sends a rebuild if a structural change is pending. Call once per update,
    /// after all edits. Returns whether a rebuild was sent.
    pub fn flush_render_state(&mut self) -> bool {
        if !self.render_state_dirty {
            return false;
        }
        let Some(render) = &self.render else {
            return false;
        };

        let snapshot = self.create_render_state();
        log::debug!(
            "Queueing deform mesh rebuild with {} section slots",
            snapshot.section_count()
        );
        render.send(RenderCommand::Rebuild(Box::new(snapshot)));
        self.render_state_dirty = false;
        true
    }

    fn mark_render_state_dirty(&mut self) {
        self.render_state_dirty = true;
    }

    /// A pending rebuild already carries the patched value, so the patch
    /// itself is skipped in that case.
    fn send_patch(&mut self, command: RenderCommand) {
        if self.render.is_none() {
            return;
        }
        if self.flush_render_state() {
            return;
        }
        if let Some(render) = &self.render {
            log::trace!("Queueing patch {:?}", command);
            render.send(command);
        }
    }

    fn send_placement(&mut self) {
        let placement = self.placement();
        self.send_patch(RenderCommand::UpdatePlacement(placement));
    }
}

impl Drawable for DeformMeshComponent {
    fn compute_bounds(&self, local_to_world: Mat4) -> BoxSphereBounds {
        self.local_bounds
            .transform_by(local_to_world)
            .scaled(self.bounds_scale)
    }

    fn create_render_state(&self) -> ProxySnapshot {
        let sections = self
            .sections
            .iter()
            .enumerate()
            .map(|(index, section)| {
                section.source_mesh.as_ref().map(|mesh| SectionSnapshot {
                    mesh: mesh.clone(),
                    material: self.material(index),
                    deform_transform: section.deform_transform,
                    visible: section.visible,
                })
            })
            .collect();

        ProxySnapshot {
            sections,
            placement: self.placement(),
            flags: self.flags,
        }
    }

    fn num_materials(&self) -> usize {
        self.sections.len()
    }

    fn material(&self, index: usize) -> Option<MaterialRef> {
        self.materials.get(index).cloned().flatten()
    }
}

/// Collection length needed to address `index`, or `None` if it cannot exist.
fn slot_len(index: usize) -> Option<usize> {
    index.checked_add(1)
}

impl Drop for DeformMeshComponent {
    fn drop(&mut self) {
        self.detach_render_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::StaticMesh;
    use crate::renderer::commands::{command_channel, RenderCommandQueue};
    use crate::renderer::material::Material;
    use glam::Vec3;

    fn drain(queue: &RenderCommandQueue) -> Vec<RenderCommand> {
        std::iter::from_fn(|| queue.try_next()).collect()
    }

    #[test]
    fn create_section_backfills_and_keeps_indices() {
        let mut component = DeformMeshComponent::new();
        component.create_section(2, StaticMesh::cube("c").into_handle(), Mat4::IDENTITY);

        assert_eq!(component.section_count(), 3);
        assert!(component.section(0).unwrap().is_empty());
        assert!(component.section(1).unwrap().is_empty());
        assert!(!component.section(2).unwrap().is_empty());
        assert_eq!(component.num_materials(), 3);
        assert!(component.is_render_state_dirty());
    }

    #[test]
    fn material_slot_comes_from_the_mesh() {
        let material = Material::rgb("red", 255, 0, 0).into_ref();
        let mesh = StaticMesh::cube("c").with_material(material.clone()).into_handle();
        let mut component = DeformMeshComponent::new();
        component.create_section(0, mesh, Mat4::IDENTITY);
        assert_eq!(component.material(0).unwrap().name, "red");

        component.set_material(0, None);
        assert!(component.material(0).is_none());
    }

    #[test]
    fn remove_section_leaves_a_hole() {
        let mut component = DeformMeshComponent::new();
        let mesh = StaticMesh::cube("c").into_handle();
        component.create_section(0, mesh.clone(), Mat4::IDENTITY);
        component.create_section(1, mesh, Mat4::from_translation(Vec3::X));
        component.remove_section(0);

        assert_eq!(component.section_count(), 2);
        assert!(component.section(0).unwrap().is_empty());
        assert!(!component.section(1).unwrap().is_empty());

        component.clear_all_sections();
        assert_eq!(component.section_count(), 0);
        assert_eq!(component.local_bounds(), BoxSphereBounds::ZERO);
    }

    #[test]
    fn transform_updates_only_grow_the_local_box() {
        let mut component = DeformMeshComponent::new();
        component.create_section(0, StaticMesh::cube("c").into_handle(), Mat4::IDENTITY);
        let before = component.section(0).unwrap().local_box;

        component.update_section_transform(0, Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)));
        component.update_section_transform(0, Mat4::IDENTITY);
        let after = component.section(0).unwrap().local_box;

        assert!(after.contains(&before));
        assert_eq!(after.max.x, 5.5);
        assert!(component.local_bounds().box_extent.x > 0.5);
    }

    #[test]
    fn world_bounds_follow_placement_and_scale() {
        let settings = DeformMeshSettings {
            bounds_scale: 2.0,
            ..Default::default()
        };
        let mut component = DeformMeshComponent::with_settings(&settings);
        component.create_section(0, StaticMesh::cube("c").into_handle(), Mat4::IDENTITY);
        component.set_local_to_world(Mat4::from_translation(Vec3::new(0.0, 10.0, 0.0)));

        let bounds = component.bounds();
        assert_eq!(bounds.origin, Vec3::new(0.0, 10.0, 0.0));
        assert_eq!(bounds.box_extent, Vec3::splat(1.0));
        assert_eq!(component.bounds_scale(), 2.0);
    }

    #[test]
    fn structural_changes_wait_for_flush() {
        let (tx, queue) = command_channel();
        let mut component = DeformMeshComponent::new();
        component.attach_render_state(tx);
        assert!(matches!(drain(&queue).as_slice(), [RenderCommand::Rebuild(_)]));

        let mesh = StaticMesh::cube("c").into_handle();
        component.create_section(0, mesh.clone(), Mat4::IDENTITY);
        component.create_section(1, mesh, Mat4::IDENTITY);
        assert!(drain(&queue).is_empty());

        assert!(component.flush_render_state());
        assert!(!component.flush_render_state());
        let commands = drain(&queue);
        assert_eq!(commands.len(), 1);
        let RenderCommand::Rebuild(snapshot) = &commands[0] else {
            panic!("expected a rebuild");
        };
        assert_eq!(snapshot.section_count(), 2);
    }

    #[test]
    fn patch_after_structural_change_flushes_first() {
        let (tx, queue) = command_channel();
        let mut component = DeformMeshComponent::new();
        component.create_section(0, StaticMesh::cube("c").into_handle(), Mat4::IDENTITY);
        component.attach_render_state(tx);
        drain(&queue);

        component.set_material(0, Some(Material::fallback().into_ref()));
        component.set_section_visible(0, false);

        let commands = drain(&queue);
        assert_eq!(commands.len(), 1);
        let RenderCommand::Rebuild(snapshot) = &commands[0] else {
            panic!("expected a rebuild");
        };
        assert!(!snapshot.sections[0].as_ref().unwrap().visible);

        component.set_section_visible(0, true);
        assert!(matches!(
            drain(&queue).as_slice(),
            [RenderCommand::SetVisibility { index: 0, visible: true }]
        ));
    }

    #[test]
    fn out_of_range_and_empty_updates_send_nothing() {
        let (tx, queue) = command_channel();
        let mut component = DeformMeshComponent::new();
        component.create_section(1, StaticMesh::cube("c").into_handle(), Mat4::IDENTITY);
        component.attach_render_state(tx);
        drain(&queue);

        component.update_section_transform(99, Mat4::ZERO);
        component.update_section_transform(0, Mat4::ZERO);
        component.set_section_visible(99, false);
        component.remove_section(99);

        assert!(drain(&queue).is_empty());
        assert!(!component.is_render_state_dirty());
        assert_eq!(component.section(0).unwrap().deform_transform, Mat4::IDENTITY);
    }

    #[test]
    fn unaddressable_indices_are_ignored() {
        let (tx, queue) = command_channel();
        let mut component = DeformMeshComponent::new();
        component.attach_render_state(tx);
        drain(&queue);

        component.create_section(usize::MAX, StaticMesh::cube("c").into_handle(), Mat4::IDENTITY);
        component.set_section(usize::MAX, MeshSection::default());
        component.set_material(usize::MAX, Some(Material::fallback().into_ref()));

        assert_eq!(component.section_count(), 0);
        assert_eq!(component.num_materials(), 0);
        assert!(!component.is_render_state_dirty());
        assert!(!component.flush_render_state());
        assert!(drain(&queue).is_empty());
    }

    #[test]
    fn dropping_the_component_releases_the_proxy() {
        let (tx, queue) = command_channel();
        let mut component = DeformMeshComponent::new();
        component.attach_render_state(tx);
        drain(&queue);

        drop(component);
        assert!(matches!(drain(&queue).as_slice(), [RenderCommand::Release]));
    }
}
