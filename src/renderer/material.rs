use std::sync::Arc;

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MaterialFlags: u32 {
        const ALPHA_BLEND = 1 << 0;
        const DISABLE_DEPTH_TEST = 1 << 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Material {
    pub name: String,
    pub base_color: [u8; 4],
    pub flags: MaterialFlags,
}

pub type MaterialRef = Arc<Material>;

impl Material {
    pub fn new(name: impl Into<String>, color: [u8; 4]) -> Self {
        Self {
            name: name.into(),
            base_color: color,
            flags: MaterialFlags::empty(),
        }
    }

    /// Used for sections whose mesh carries no material and has no override.
    pub fn fallback() -> Self {
        Self::new("DefaultMaterial", [255, 255, 255, 255])
    }

    pub fn rgb(name: impl Into<String>, r: u8, g: u8, b: u8) -> Self {
        Self::new(name, [r, g, b, 255])
    }

    pub fn with_alpha(mut self) -> Self {
        self.flags |= MaterialFlags::ALPHA_BLEND;
        self
    }

    pub fn without_depth_test(mut self) -> Self {
        self.flags |= MaterialFlags::DISABLE_DEPTH_TEST;
        self
    }

    pub fn into_ref(self) -> MaterialRef {
        Arc::new(self)
    }

    pub fn color_f32(&self) -> [f32; 4] {
        self.base_color.map(|c| c as f32 / 255.0)
    }

    pub fn requires_separate_pass(&self) -> bool {
        self.flags.contains(MaterialFlags::ALPHA_BLEND)
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::fallback()
    }
}

/// Material proxy that replaces the parent's colour, used for the wireframe
/// override. Lives for a single frame inside the collector.
#[derive(Debug, Clone, PartialEq)]
pub struct ColoredMaterial {
    pub parent: Option<MaterialRef>,
    pub color: [f32; 4],
}

/// Aggregate of what the section materials of one proxy need from the renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterialRelevance {
    pub opaque: bool,
    pub translucent: bool,
    pub disable_depth_test: bool,
}

impl MaterialRelevance {
    pub fn from_materials<'a>(materials: impl IntoIterator<Item = &'a Material>) -> Self {
        materials
            .into_iter()
            .fold(Self::default(), |mut relevance, material| {
                if material.requires_separate_pass() {
                    relevance.translucent = true;
                } else {
                    relevance.opaque = true;
                }
                relevance.disable_depth_test |=
                    material.flags.contains(MaterialFlags::DISABLE_DEPTH_TEST);
                relevance
            })
    }
}
