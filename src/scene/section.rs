use glam::Mat4;

use crate::asset::MeshHandle;
use crate::scene::bounds::Aabb;

/// One independently deformable piece of a deform mesh.
#[derive(Debug, Clone)]
pub struct MeshSection {
    /// `None` marks an empty slot.
    pub source_mesh: Option<MeshHandle>,
    pub deform_transform: Mat4,
    /// Conservative bound accumulated over every transform the section has
    /// had. Only ever grows while the section lives.
    pub local_box: Aabb,
    pub visible: bool,
}

impl Default for MeshSection {
    fn default() -> Self {
        Self {
            source_mesh: None,
            deform_transform: Mat4::IDENTITY,
            local_box: Aabb::EMPTY,
            visible: true,
        }
    }
}

impl MeshSection {
    pub fn new(mesh: MeshHandle, deform_transform: Mat4) -> Self {
        Self {
            local_box: mesh.bounds(),
            source_mesh: Some(mesh),
            deform_transform,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.source_mesh.is_none()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Index-addressed arena of sections. Indices never move: removing a section
/// leaves an empty slot behind.
#[derive(Debug, Clone, Default)]
pub struct SectionCollection {
    sections: Vec<MeshSection>,
}

impl SectionCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backfills with empty sections up to `len`. Never shrinks.
    pub fn ensure_len(&mut self, len: usize) {
        if self.sections.len() < len {
            self.sections.resize_with(len, MeshSection::default);
        }
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&MeshSection> {
        self.sections.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut MeshSection> {
        self.sections.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MeshSection> {
        self.sections.iter()
    }

    /// Empties slot `index` in place. Returns false when out of range.
    pub fn reset(&mut self, index: usize) -> bool {
        match self.sections.get_mut(index) {
            Some(section) => {
                section.reset();
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.sections.clear();
    }

    /// Union of every section box; invalid when no section has a valid box.
    pub fn aggregate_box(&self) -> Aabb {
        self.sections
            .iter()
            .fold(Aabb::EMPTY, |acc, section| acc + section.local_box)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::StaticMesh;
    use glam::Vec3;

    #[test]
    fn ensure_len_backfills_empty_sections() {
        let mut sections = SectionCollection::new();
        sections.ensure_len(3);
        assert_eq!(sections.len(), 3);
        assert!(sections.iter().all(MeshSection::is_empty));
        assert!(sections.iter().all(|s| s.visible));

        sections.ensure_len(1);
        assert_eq!(sections.len(), 3);
    }

    #[test]
    fn reset_keeps_the_slot() {
        let mut sections = SectionCollection::new();
        sections.ensure_len(2);
        *sections.get_mut(1).unwrap() =
            MeshSection::new(StaticMesh::cube("cube").into_handle(), Mat4::IDENTITY);
        assert!(!sections.get(1).unwrap().is_empty());

        assert!(sections.reset(1));
        assert_eq!(sections.len(), 2);
        assert!(sections.get(1).unwrap().is_empty());
        assert!(!sections.reset(7));
    }

    #[test]
    fn aggregate_box_skips_empty_sections() {
        let mut sections = SectionCollection::new();
        assert!(!sections.aggregate_box().is_valid());

        sections.ensure_len(3);
        sections.get_mut(2).unwrap().local_box = Aabb::new(Vec3::ZERO, Vec3::ONE);
        sections.get_mut(0).unwrap().local_box = Aabb::new(-Vec3::ONE, Vec3::ZERO);

        let aggregate = sections.aggregate_box();
        assert_eq!(aggregate.min, -Vec3::ONE);
        assert_eq!(aggregate.max, Vec3::ONE);
    }
}
