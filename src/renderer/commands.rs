//! Messages from the control thread to the render thread.
//!
//! Each component talks to exactly one proxy host over its own FIFO channel.
//! Sending never blocks; the render thread drains the queue before a frame.

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use glam::Mat4;

use crate::asset::MeshHandle;
use crate::renderer::material::MaterialRef;
use crate::scene::bounds::BoxSphereBounds;

/// Everything the render thread needs to build one section.
#[derive(Debug, Clone)]
pub struct SectionSnapshot {
    pub mesh: MeshHandle,
    pub material: Option<MaterialRef>,
    pub deform_transform: Mat4,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimitiveFlags {
    pub visible: bool,
    pub cast_shadow: bool,
    pub render_in_main_pass: bool,
    pub movable: bool,
}

impl Default for PrimitiveFlags {
    fn default() -> Self {
        Self {
            visible: true,
            cast_shadow: true,
            render_in_main_pass: true,
            movable: true,
        }
    }
}

/// Placement of the whole component, independent of section deformation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimitivePlacement {
    pub local_to_world: Mat4,
    pub previous_local_to_world: Mat4,
    pub bounds: BoxSphereBounds,
    pub local_bounds: BoxSphereBounds,
}

impl Default for PrimitivePlacement {
    fn default() -> Self {
        Self {
            local_to_world: Mat4::IDENTITY,
            previous_local_to_world: Mat4::IDENTITY,
            bounds: BoxSphereBounds::ZERO,
            local_bounds: BoxSphereBounds::ZERO,
        }
    }
}

impl PrimitivePlacement {
    pub fn is_determinant_negative(&self) -> bool {
        self.local_to_world.determinant() < 0.0
    }
}

/// Section-indexed copy of the control thread state taken at a structural
/// change. Empty slots stay `None` so indices line up.
#[derive(Debug, Clone, Default)]
pub struct ProxySnapshot {
    pub sections: Vec<Option<SectionSnapshot>>,
    pub placement: PrimitivePlacement,
    pub flags: PrimitiveFlags,
}

impl ProxySnapshot {
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Applies a transform patch that raced a pending rebuild.
    pub fn patch_transform(&mut self, index: usize, transform: Mat4) -> bool {
        match self.sections.get_mut(index) {
            Some(Some(section)) => {
                section.deform_transform = transform;
                true
            }
            _ => false,
        }
    }

    pub fn patch_visibility(&mut self, index: usize, visible: bool) -> bool {
        match self.sections.get_mut(index) {
            Some(Some(section)) => {
                section.visible = visible;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum RenderCommand {
    /// Structural change: discard the proxy and build a new one from this.
    Rebuild(Box<ProxySnapshot>),
    UpdateTransform { index: usize, transform: Mat4 },
    SetVisibility { index: usize, visible: bool },
    UpdatePlacement(PrimitivePlacement),
    /// The component stopped rendering; free everything.
    Release,
}

/// Control-thread end of a component's command queue. Not `Clone`: one
/// producer per queue keeps patches in submission order.
#[derive(Debug)]
pub struct RenderCommandSender {
    tx: Sender<RenderCommand>,
}

impl RenderCommandSender {
    /// Fire and forget. A vanished render thread is not an error for the
    /// control thread; the command is dropped.
    pub fn send(&self, command: RenderCommand) {
        if self.tx.send(command).is_err() {
            log::debug!("Render command dropped: proxy host is gone");
        }
    }
}

/// Render-thread end of a component's command queue.
#[derive(Debug)]
pub struct RenderCommandQueue {
    rx: Receiver<RenderCommand>,
}

impl RenderCommandQueue {
    /// Next queued command, if any, without waiting.
    pub fn try_next(&self) -> Option<RenderCommand> {
        match self.rx.try_recv() {
            Ok(command) => Some(command),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

pub fn command_channel() -> (RenderCommandSender, RenderCommandQueue) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (RenderCommandSender { tx }, RenderCommandQueue { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_arrive_in_order() {
        let (tx, queue) = command_channel();
        tx.send(RenderCommand::SetVisibility { index: 0, visible: false });
        tx.send(RenderCommand::Release);

        assert!(matches!(
            queue.try_next(),
            Some(RenderCommand::SetVisibility { index: 0, visible: false })
        ));
        assert!(matches!(queue.try_next(), Some(RenderCommand::Release)));
        assert!(queue.try_next().is_none());
    }

    #[test]
    fn sending_to_dropped_queue_is_silent() {
        let (tx, queue) = command_channel();
        drop(queue);
        tx.send(RenderCommand::Release);
    }

    #[test]
    fn snapshot_patches_skip_empty_slots() {
        let mut snapshot = ProxySnapshot {
            sections: vec![None],
            ..Default::default()
        };
        assert!(!snapshot.patch_transform(0, Mat4::IDENTITY));
        assert!(!snapshot.patch_visibility(4, true));
    }
}
