// scene/mod.rs

pub mod bounds;
pub mod component;
pub mod drawable;
pub mod section;
pub mod transform;

// Re-export commonly used types
pub use bounds::{Aabb, BoxSphereBounds};
pub use component::DeformMeshComponent;
pub use drawable::Drawable;
pub use section::{MeshSection, SectionCollection};
pub use transform::Transform;
