use glam::Mat4;

use crate::renderer::commands::ProxySnapshot;
use crate::renderer::material::MaterialRef;
use crate::scene::bounds::BoxSphereBounds;

/// Control-thread side of something the renderer can draw. The render-thread
/// side is [`SceneProxy`](crate::renderer::proxy::SceneProxy).
pub trait Drawable {
    /// World bounds for the given placement.
    fn compute_bounds(&self, local_to_world: Mat4) -> BoxSphereBounds;

    /// Snapshot the render thread builds its proxy from.
    fn create_render_state(&self) -> ProxySnapshot;

    fn num_materials(&self) -> usize;

    fn material(&self, index: usize) -> Option<MaterialRef>;
}
