use bitflags::bitflags;
use glam::Mat4;

use crate::renderer::material::MaterialRef;

bitflags! {
    /// Engine show flags shared by every view of a family.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShowFlags: u32 {
        const WIREFRAME = 1 << 0;
        const SHADOWS = 1 << 1;
        const DYNAMIC_GEOMETRY = 1 << 2;
    }
}

impl Default for ShowFlags {
    fn default() -> Self {
        Self::SHADOWS | Self::DYNAMIC_GEOMETRY
    }
}

/// One view the scene system wants geometry for this frame.
#[derive(Debug, Clone)]
pub struct SceneView {
    pub label: String,
    pub view_projection: Mat4,
    pub render_shadows: bool,
}

impl SceneView {
    pub fn new(label: impl Into<String>, view_projection: Mat4) -> Self {
        Self {
            label: label.into(),
            view_projection,
            render_shadows: true,
        }
    }
}

/// Settings common to all views rendered together.
#[derive(Debug, Clone, Default)]
pub struct ViewFamily {
    pub show_flags: ShowFlags,
    /// Engine-wide material the wireframe override is derived from.
    pub wireframe_material: Option<MaterialRef>,
}

impl ViewFamily {
    pub fn wireframe() -> Self {
        Self {
            show_flags: ShowFlags::default() | ShowFlags::WIREFRAME,
            wireframe_material: None,
        }
    }
}

bitflags! {
    /// How a proxy participates in a given view.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ViewRelevance: u32 {
        const DRAW = 1 << 0;
        const SHADOW = 1 << 1;
        const DYNAMIC = 1 << 2;
        const MAIN_PASS = 1 << 3;
        const OPAQUE = 1 << 4;
        const TRANSLUCENT = 1 << 5;
        const VELOCITY = 1 << 6;
    }
}

/// Bits of a per-view visibility bitmap set for `view_index`.
pub fn is_visible_in(visibility_map: u32, view_index: usize) -> bool {
    view_index < u32::BITS as usize && visibility_map & (1 << view_index) != 0
}
