//! Render-thread owner of a deform mesh proxy.
//!
//! [`ProxyHost`] drains the component's command queue before each frame and
//! keeps the proxy in step with it. Rebuilds are deferred to
//! [`ProxyHost::prepare_frame`] so several structural changes in one frame
//! build only once, and the old proxy keeps drawing until its replacement is
//! ready.

use std::sync::Arc;

use crate::renderer::collector::MeshCollector;
use crate::renderer::commands::{PrimitivePlacement, ProxySnapshot, RenderCommand, RenderCommandQueue};
use crate::renderer::gpu::GpuBackend;
use crate::renderer::proxy::{RenderProxy, SceneProxy};
use crate::renderer::view::{SceneView, ViewFamily};
use crate::settings::DeformMeshSettings;

pub enum ProxyState {
    /// Nothing has been built yet, or the component released its proxy.
    Uninitialized,
    /// A snapshot is waiting to be built. `current` keeps drawing meanwhile.
    NeedsRebuild {
        current: Option<RenderProxy>,
        pending: Box<ProxySnapshot>,
    },
    Ready(RenderProxy),
    /// The last build failed. Nothing draws until the next rebuild.
    Failed,
}

impl ProxyState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::NeedsRebuild { .. } => "needs-rebuild",
            Self::Ready(_) => "ready",
            Self::Failed => "failed",
        }
    }
}

/// What one call to [`ProxyHost::drain`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub commands: usize,
    pub rebuilds: usize,
    pub patches_applied: usize,
    pub patches_dropped: usize,
    pub released: bool,
}

pub struct ProxyHost {
    queue: RenderCommandQueue,
    backend: Arc<dyn GpuBackend>,
    settings: DeformMeshSettings,
    state: ProxyState,
}

impl ProxyHost {
    pub fn new(
        queue: RenderCommandQueue,
        backend: Arc<dyn GpuBackend>,
        settings: DeformMeshSettings,
    ) -> Self {
        Self {
            queue,
            backend,
            settings,
            state: ProxyState::Uninitialized,
        }
    }

    pub fn state(&self) -> &ProxyState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ProxyState::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, ProxyState::Failed)
    }

    pub fn has_pending_rebuild(&self) -> bool {
        matches!(self.state, ProxyState::NeedsRebuild { .. })
    }

    /// Proxy that batches are drawn from right now.
    pub fn proxy(&self) -> Option<&RenderProxy> {
        match &self.state {
            ProxyState::Ready(proxy) => Some(proxy),
            ProxyState::NeedsRebuild { current, .. } => current.as_ref(),
            ProxyState::Uninitialized | ProxyState::Failed => None,
        }
    }

    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    /// Applies every queued command in submission order.
    pub fn drain(&mut self) -> DrainStats {
        let mut stats = DrainStats::default();
        while let Some(command) = self.queue.try_next() {
            stats.commands += 1;
            self.apply(command, &mut stats);
        }
        if stats.commands > 0 {
            log::trace!("Drained {:?}", stats);
        }
        stats
    }

    fn apply(&mut self, command: RenderCommand, stats: &mut DrainStats) {
        match command {
            RenderCommand::Rebuild(snapshot) => {
                stats.rebuilds += 1;
                let current = match std::mem::replace(&mut self.state, ProxyState::Uninitialized) {
                    ProxyState::Ready(proxy) => Some(proxy),
                    ProxyState::NeedsRebuild { current, .. } => current,
                    ProxyState::Uninitialized | ProxyState::Failed => None,
                };
                self.state = ProxyState::NeedsRebuild {
                    current,
                    pending: snapshot,
                };
            }
            RenderCommand::UpdateTransform { index, transform } => {
                let applied = match &mut self.state {
                    ProxyState::Ready(proxy) => proxy.update_deform_transform(index, transform),
                    ProxyState::NeedsRebuild { pending, .. } => {
                        pending.patch_transform(index, transform)
                    }
                    ProxyState::Uninitialized | ProxyState::Failed => false,
                };
                count_patch(stats, applied);
            }
            RenderCommand::SetVisibility { index, visible } => {
                let applied = match &mut self.state {
                    ProxyState::Ready(proxy) => proxy.set_section_visibility(index, visible),
                    ProxyState::NeedsRebuild { pending, .. } => {
                        pending.patch_visibility(index, visible)
                    }
                    ProxyState::Uninitialized | ProxyState::Failed => false,
                };
                count_patch(stats, applied);
            }
            RenderCommand::UpdatePlacement(placement) => {
                let applied = self.update_placement(placement);
                count_patch(stats, applied);
            }
            RenderCommand::Release => {
                if self.proxy().is_some() {
                    log::debug!("Releasing deform mesh proxy");
                }
                stats.released = true;
                self.state = ProxyState::Uninitialized;
            }
        }
    }

    fn update_placement(&mut self, placement: PrimitivePlacement) -> bool {
        match &mut self.state {
            ProxyState::Ready(proxy) => {
                proxy.set_placement(placement);
                true
            }
            ProxyState::NeedsRebuild { current, pending } => {
                pending.placement = placement;
                if let Some(proxy) = current {
                    proxy.set_placement(placement);
                }
                true
            }
            ProxyState::Uninitialized | ProxyState::Failed => false,
        }
    }

    /// Builds a pending snapshot, then uploads dirty transforms. Call once per
    /// frame after [`drain`](Self::drain) and before drawing.
    pub fn prepare_frame(&mut self) {
        if let ProxyState::NeedsRebuild { .. } = self.state {
            let ProxyState::NeedsRebuild { current, pending } =
                std::mem::replace(&mut self.state, ProxyState::Uninitialized)
            else {
                return;
            };

            self.state = match RenderProxy::new(self.backend.as_ref(), &pending, &self.settings) {
                Ok(mut proxy) => {
                    if let Some(replaced) = &current {
                        proxy.inherit_frame_history(replaced);
                    }
                    log::debug!(
                        "Rebuilt deform mesh proxy with {} section slots",
                        proxy.section_count()
                    );
                    ProxyState::Ready(proxy)
                }
                Err(err) => {
                    log::error!("Failed to build deform mesh proxy: {}", err);
                    ProxyState::Failed
                }
            };
            // Old GPU resources go only after the replacement exists.
            drop(current);
        }

        if let ProxyState::Ready(proxy) = &mut self.state {
            if let Err(err) = proxy.prepare_draw(self.backend.as_ref()) {
                log::error!("Failed to upload deform transforms: {}", err);
                self.state = ProxyState::Failed;
            }
        }
    }

    /// Emits this frame's batches from the current proxy, if any.
    pub fn draw(
        &self,
        views: &[SceneView],
        family: &ViewFamily,
        visibility_map: u32,
        collector: &mut dyn MeshCollector,
    ) {
        if let Some(proxy) = self.proxy() {
            proxy.collect_batches(views, family, visibility_map, collector);
        }
    }

    /// `drain`, `prepare_frame` and `draw` in one go.
    pub fn render_frame(
        &mut self,
        views: &[SceneView],
        family: &ViewFamily,
        visibility_map: u32,
        collector: &mut dyn MeshCollector,
    ) -> DrainStats {
        let stats = self.drain();
        self.prepare_frame();
        self.draw(views, family, visibility_map, collector);
        stats
    }
}

fn count_patch(stats: &mut DrainStats, applied: bool) {
    if applied {
        stats.patches_applied += 1;
    } else {
        stats.patches_dropped += 1;
    }
}
