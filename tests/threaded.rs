//! Control and render threads running concurrently against one channel.

use std::sync::Arc;
use std::thread;

use glam::{Mat4, Quat, Vec3};

use deform_mesh::asset::StaticMesh;
use deform_mesh::renderer::{
    command_channel, BatchCollector, HeadlessBackend, ProxyHost, SceneView, ViewFamily,
};
use deform_mesh::scene::DeformMeshComponent;
use deform_mesh::DeformMeshSettings;

const SECTIONS: usize = 8;
const UPDATES: usize = 400;

fn transform_for(step: usize, index: usize) -> Mat4 {
    let t = step as f32 * 0.05 + index as f32;
    Mat4::from_scale_rotation_translation(
        Vec3::splat(1.0 + 0.1 * t.sin()),
        Quat::from_rotation_y(t),
        Vec3::new(index as f32 * 2.0, t.cos(), 0.0),
    )
}

#[test]
fn concurrent_updates_converge_on_the_last_state() {
    let backend = Arc::new(HeadlessBackend::new());
    let (sender, queue) = command_channel();
    let mut host = ProxyHost::new(queue, backend.clone(), DeformMeshSettings::default());

    let control = thread::spawn(move || {
        let cube = StaticMesh::cube("cube").into_handle();
        let sphere = StaticMesh::sphere("sphere", 8, 4).into_handle();
        let mut component = DeformMeshComponent::new();
        for index in 0..SECTIONS {
            component.create_section(index, cube.clone(), transform_for(0, index));
        }
        component.attach_render_state(sender);

        for step in 1..=UPDATES {
            for index in 0..component.section_count() {
                component.update_section_transform(index, transform_for(step, index));
            }
            let target = step % SECTIONS;
            if component.section(target).is_some_and(|s| !s.is_empty()) {
                component.set_section_visible(target, step % 3 != 0);
            }
            match step % 50 {
                10 => component.remove_section(step % SECTIONS),
                30 => component.create_section(step % SECTIONS, sphere.clone(), Mat4::IDENTITY),
                40 => component.create_section(SECTIONS + step / 50, cube.clone(), Mat4::IDENTITY),
                _ => {}
            }
            component.flush_render_state();
            if step % 16 == 0 {
                thread::yield_now();
            }
        }
        component
    });

    let views = [
        SceneView::new("left", Mat4::IDENTITY),
        SceneView::new("right", Mat4::IDENTITY),
    ];
    let family = ViewFamily::default();
    let mut collector = BatchCollector::with_views(views.len());
    let mut frames = 0;

    loop {
        let finished = control.is_finished();
        collector.reset();
        let stats = host.render_frame(&views, &family, 0b11, &mut collector);
        assert_eq!(stats.patches_dropped, 0, "frame {frames}: patch overtook its rebuild");

        if let Some(proxy) = host.proxy() {
            assert!(!proxy.is_transform_dirty());
            for (_, batch) in collector.iter() {
                let section = proxy
                    .section(batch.section_index)
                    .expect("batch for an empty section");
                assert!(section.visible);
                assert!(batch
                    .deform_transforms
                    .same_allocation(proxy.transforms().gpu_view()));
            }
            assert!(collector.batch_count() <= proxy.section_count() * views.len());
        }
        frames += 1;
        if finished {
            break;
        }
        thread::yield_now();
    }

    let component = control.join().expect("control thread panicked");
    collector.reset();
    host.render_frame(&views, &family, 0b11, &mut collector);

    let proxy = host.proxy().expect("proxy after the final frame");
    assert_eq!(proxy.section_count(), component.section_count());
    for index in 0..component.section_count() {
        let section = component.section(index).unwrap();
        match proxy.section(index) {
            Some(state) => {
                assert!(!section.is_empty());
                assert_eq!(state.visible, section.visible);
                assert_eq!(proxy.transforms().get(index), Some(section.deform_transform));
            }
            None => assert!(section.is_empty()),
        }
    }
    let visible = (0..component.section_count())
        .filter(|&i| component.section(i).is_some_and(|s| !s.is_empty() && s.visible))
        .count();
    assert_eq!(collector.batch_count(), visible * views.len());

    drop(component);
    collector.reset();
    host.drain();
    assert!(host.proxy().is_none());
    assert_eq!(backend.live_buffers(), 0);
}
