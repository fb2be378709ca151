use std::f32::consts::TAU;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::Receiver;
use glam::{Mat4, Quat, Vec3};

use deform_mesh::asset::StaticMesh;
use deform_mesh::renderer::{
    command_channel, BatchCollector, GpuBackend, HeadlessBackend, Material, ProxyHost,
    RenderCommandQueue, SceneView, ViewFamily, WgpuBackend,
};
use deform_mesh::scene::{DeformMeshComponent, Transform};
use deform_mesh::DeformMeshSettings;

const SECTION_COUNT: usize = 6;
const TICKS: u32 = 120;
const TICK_INTERVAL: Duration = Duration::from_millis(16);

fn select_backend() -> Arc<dyn GpuBackend> {
    match pollster::block_on(WgpuBackend::request_headless()) {
        Some(backend) => {
            log::info!("Rendering with the wgpu backend");
            Arc::new(backend)
        }
        None => {
            log::warn!("No GPU adapter available, falling back to the headless backend");
            Arc::new(HeadlessBackend::new())
        }
    }
}

/// Drains, prepares and draws once per tick until the controller hangs up.
fn run_render_thread(
    queue: RenderCommandQueue,
    backend: Arc<dyn GpuBackend>,
    settings: DeformMeshSettings,
    ticks: Receiver<u32>,
) -> usize {
    let mut host = ProxyHost::new(queue, backend, settings);
    let views = [
        SceneView::new("main", Mat4::IDENTITY),
        SceneView::new("mirror", Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0))),
    ];
    let mut collector = BatchCollector::with_views(views.len());
    let mut total_batches = 0;

    for tick in ticks.iter() {
        let family = if tick % 40 == 39 {
            ViewFamily::wireframe()
        } else {
            ViewFamily::default()
        };

        collector.reset();
        let stats = host.render_frame(&views, &family, 0b11, &mut collector);
        total_batches += collector.batch_count();

        if stats.rebuilds > 0 || tick % 30 == 0 {
            log::info!(
                "Frame {}: proxy {}, {} batches, {} patches applied, {} dropped",
                tick,
                host.state().name(),
                collector.batch_count(),
                stats.patches_applied,
                stats.patches_dropped
            );
        }
    }

    // Pick up the final release.
    host.drain();
    log::info!("Render thread finished, proxy {}", host.state().name());
    total_batches
}

fn section_transform(index: usize, time: f32) -> Transform {
    let phase = time + index as f32 * TAU / SECTION_COUNT as f32;
    let angle = index as f32 * TAU / SECTION_COUNT as f32;
    Transform::from_trs(
        Vec3::new(angle.cos() * 3.0, phase.sin(), angle.sin() * 3.0),
        Quat::from_rotation_y(phase),
        Vec3::splat(1.0 + 0.25 * (phase * 2.0).sin()),
    )
}

fn main() {
    deform_mesh::init_logging();

    let settings = DeformMeshSettings::load();
    let backend = select_backend();
    log::info!("GPU backend: {}", backend.name());

    let (sender, queue) = command_channel();
    let (tick_tx, tick_rx) = crossbeam_channel::bounded(1);

    let render_thread = {
        let backend = backend.clone();
        let settings = settings.clone();
        thread::Builder::new()
            .name("render".into())
            .spawn(move || run_render_thread(queue, backend, settings, tick_rx))
    };
    let render_thread = match render_thread {
        Ok(handle) => handle,
        Err(err) => {
            log::error!("Failed to spawn render thread: {}", err);
            return;
        }
    };

    let cube = StaticMesh::cube("cube")
        .with_material(Material::rgb("orange", 255, 140, 0).into_ref())
        .into_handle();
    let sphere = StaticMesh::sphere("sphere", 24, 12).into_handle();

    let mut component = DeformMeshComponent::with_settings(&settings);
    for index in 0..SECTION_COUNT {
        let mesh = if index % 2 == 0 { cube.clone() } else { sphere.clone() };
        component.create_section(index, mesh, section_transform(index, 0.0));
    }
    component.attach_render_state(sender);

    for tick in 0..TICKS {
        let time = tick as f32 * TICK_INTERVAL.as_secs_f32();
        for index in 0..component.section_count() {
            component.update_section_transform(index, section_transform(index, time));
        }

        match tick {
            20 => component.set_section_visible(1, false),
            40 => component.set_section_visible(1, true),
            60 => component.remove_section(2),
            80 => component.create_section(SECTION_COUNT, cube.clone(), Transform::IDENTITY),
            _ => {}
        }
        component.set_local_to_world(Mat4::from_rotation_y(time * 0.5));
        component.flush_render_state();

        if tick_tx.send(tick).is_err() {
            log::error!("Render thread stopped early");
            break;
        }
        thread::sleep(TICK_INTERVAL);
    }

    drop(component);
    drop(tick_tx);

    match render_thread.join() {
        Ok(total) => log::info!("Submitted {} batches over {} frames", total, TICKS),
        Err(_) => log::error!("Render thread panicked"),
    }
}
