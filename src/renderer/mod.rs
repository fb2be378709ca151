pub mod batch;
pub mod collector;
pub mod commands;
pub mod frame;
pub mod gpu;
pub mod headless;
pub mod material;
pub mod proxy;
pub mod render_thread;
pub mod transforms;
pub mod uniforms;
pub mod vertex;
pub mod view;
pub mod wgpu_backend;

pub use batch::{BatchMaterial, MeshBatch, MeshBatchElement};
pub use collector::{BatchCollector, MeshCollector};
pub use commands::{command_channel, RenderCommand, RenderCommandQueue, RenderCommandSender};
pub use frame::FrameRenderer;
pub use gpu::{GpuBackend, GpuBuffer};
pub use headless::HeadlessBackend;
pub use material::{Material, MaterialFlags, MaterialRef};
pub use proxy::{RenderProxy, SceneProxy, SectionRenderState};
pub use render_thread::{DrainStats, ProxyHost, ProxyState};
pub use transforms::TransformBuffer;
pub use view::{SceneView, ShowFlags, ViewFamily, ViewRelevance};
pub use wgpu_backend::WgpuBackend;
