use std::sync::{Arc, Barrier};
use std::thread;
use tessera_engine::game_core::RngStream;
use tessera_engine::gpu::headless::GpuCall;
use tessera_engine::gpu::BufferTarget;
use tessera_engine::graphics::Graphics;
use tessera_engine::scene::graph::to_dot;
use tessera_engine::texture::TextureKey;
use tessera_engine::scene::{
    Container, ContainerExt, Gizmo, GizmoRef, Group, Image, Margins, NinePatch, UpdateContext, Visual,
    VisualGizmo,
};
use tessera_engine::utils::Position;

fn as_ref<T: Gizmo + 'static>(g: &Arc<T>) -> GizmoRef {
    g.clone()
}

fn solid_image(gfx: &mut Graphics) -> Arc<Image> {
    let texture = gfx.textures.create_solid(0xFF00FF00);
    Image::with_texture(texture)
}

#[test]
fn adding_twice_keeps_one_child() {
    let group = Group::new();
    let visual = Visual::create(0.0, 0.0, 4.0, 4.0);
    group.add(visual.clone());
    group.add(visual.clone());
    assert_eq!(group.children().len(), 1);
}

#[test]
fn adding_to_another_group_moves_the_child() {
    let first = Group::new();
    let second = Group::new();
    let visual = Visual::create(0.0, 0.0, 4.0, 4.0);
    first.add(visual.clone());
    second.add(visual.clone());

    assert!(first.children().is_empty());
    assert_eq!(second.children().len(), 1);
    assert!(second.children().contains(&as_ref(&visual)));
    assert!(visual.core().parent().is_some());
}

#[test]
fn removed_child_loses_its_parent() {
    let group = Group::new();
    let visual = Visual::create(0.0, 0.0, 4.0, 4.0);
    group.add(visual.clone());
    let removed = group.remove(&as_ref(&visual));
    assert!(removed.is_some());
    assert!(visual.core().parent().is_none());
    assert!(group.remove(&as_ref(&visual)).is_none());
}

#[test]
fn children_change_on_another_thread_while_the_tree_runs() {
    let (mut gfx, _handle) = Graphics::headless(320, 180);
    let group = Group::new();
    let visuals: Vec<Arc<Visual>> = (0..8)
        .map(|i| Visual::create(i as f32 * 10.0, 0.0, 4.0, 4.0))
        .collect();
    let worker = {
        let group = group.clone();
        let visuals = visuals.clone();
        thread::spawn(move || {
            for round in 0..2000 {
                let v = &visuals[round % visuals.len()];
                if round % 3 == 0 {
                    group.children().remove(&as_ref(v));
                } else {
                    group.add(v.clone());
                }
            }
        })
    };

    let mut rng = RngStream::seeded(1);
    while !worker.is_finished() {
        let mut ctx = UpdateContext::new(0.016, &mut rng);
        group.update(&mut ctx);
        group.draw(&mut gfx);
    }
    worker.join().unwrap();

    let held = visuals
        .iter()
        .filter(|v| group.children().contains(&as_ref(*v)))
        .count();
    assert_eq!(group.children().len(), held);
    for v in &visuals {
        assert_eq!(v.core().parent().is_some(), group.children().contains(&as_ref(v)));
    }
}

#[test]
fn racing_adds_leave_the_node_in_one_group() {
    let a = Group::new();
    let b = Group::new();
    for _ in 0..200 {
        let node = Visual::create(0.0, 0.0, 1.0, 1.0);
        let barrier = Arc::new(Barrier::new(2));
        let other = {
            let (b, node, barrier) = (b.clone(), node.clone(), barrier.clone());
            thread::spawn(move || {
                barrier.wait();
                b.add(node);
            })
        };
        barrier.wait();
        a.add(node.clone());
        other.join().unwrap();

        let in_a = a.children().contains(&as_ref(&node));
        let in_b = b.children().contains(&as_ref(&node));
        assert!(in_a != in_b);
        let parent = node.core().parent().unwrap();
        assert!(parent.children().contains(&as_ref(&node)));

        a.children().clear();
        b.children().clear();
        assert!(node.core().parent().is_none());
    }
}

#[test]
fn z_order_moves() {
    let group = Group::new();
    let a = Visual::create(0.0, 0.0, 1.0, 1.0);
    let b = Visual::create(0.0, 0.0, 1.0, 1.0);
    let c = Visual::create(0.0, 0.0, 1.0, 1.0);
    group.add(a.clone());
    group.add(b.clone());
    group.add(c.clone());

    assert!(group.bring_to_front(&as_ref(&a)));
    assert_eq!(group.children().index_of(&as_ref(&a)), Some(2));
    assert!(group.send_to_back(&as_ref(&c)));
    assert_eq!(group.children().index_of(&as_ref(&c)), Some(0));
    assert_eq!(group.children().index_of(&as_ref(&b)), Some(1));
}

#[test]
fn parent_flags_propagate_to_children() {
    let root = Group::new();
    let inner = Group::new();
    let leaf = Visual::create(0.0, 0.0, 1.0, 1.0);
    root.add(inner.clone());
    inner.add(leaf.clone());

    root.core().set_visible(false);
    assert!(!leaf.is_visible());
    assert!(leaf.core().local_visible());

    root.core().set_visible(true);
    root.core().set_active(false);
    assert!(leaf.is_visible());
    assert!(!leaf.is_active());

    root.core().set_active(true);
    inner.kill();
    assert!(!leaf.is_alive());
    assert!(!leaf.core().local_alive());
}

#[test]
fn dead_and_inactive_children_are_not_updated() {
    let group = Group::new();
    let moving = Visual::create(0.0, 0.0, 1.0, 1.0);
    let dead = Visual::create(0.0, 0.0, 1.0, 1.0);
    let idle = Visual::create(0.0, 0.0, 1.0, 1.0);
    for v in [&moving, &dead, &idle] {
        v.lock().speed = Position::new(10.0, 0.0);
        group.add(v.clone());
    }
    dead.kill();
    idle.core().set_active(false);

    let mut rng = RngStream::seeded(1);
    let mut ctx = UpdateContext::new(0.5, &mut rng);
    group.update(&mut ctx);

    assert!((moving.lock().x - 5.0).abs() < 1e-5);
    assert_eq!(dead.lock().x, 0.0);
    assert_eq!(idle.lock().x, 0.0);
}

#[test]
fn recycle_revives_a_dead_child() {
    let group = Group::new();
    let first = group.recycle::<Image>();
    assert_eq!(group.children().len(), 1);
    assert!(first.is_alive());

    first.kill();
    let again = group.recycle::<Image>();
    assert!(Arc::ptr_eq(&first, &again));
    assert!(again.is_alive());
    assert_eq!(group.children().len(), 1);

    let second = group.recycle::<Image>();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(group.children().len(), 2);
}

#[test]
fn destroy_empties_the_tree() {
    let (mut gfx, _handle) = Graphics::headless(320, 180);
    let group = Group::new();
    let a = solid_image(&mut gfx);
    let b = solid_image(&mut gfx);
    group.add(a.clone());
    group.add(b.clone());
    group.draw(&mut gfx);
    assert!(a.has_dataset());

    group.destroy();
    assert!(group.children().is_empty());
    assert!(a.core().parent().is_none());
    assert!(b.core().parent().is_none());
    assert!(!a.has_dataset());
    assert_eq!(gfx.collect_garbage(), 2);
}

#[test]
fn destroying_images_keeps_their_shared_texture() {
    let (mut gfx, handle) = Graphics::headless(320, 180);
    let group = Group::new();
    let images: Vec<_> = (0..3).map(|_| solid_image(&mut gfx)).collect();
    for image in &images {
        group.add(image.clone());
    }
    group.draw(&mut gfx);
    let texture = gfx.textures.create_solid(0xFF00FF00);
    assert!(images.iter().all(|i| Arc::ptr_eq(&i.texture().unwrap(), &texture)));
    assert_eq!(handle.live_buffers(), 4);

    group.destroy();
    assert!(images.iter().all(|i| !i.has_dataset()));
    assert_eq!(gfx.collect_garbage(), 3);
    assert_eq!(handle.live_buffers(), 1);

    assert!(gfx.textures.contains(&TextureKey::Solid(0xFF00FF00)));
    assert!(texture.is_generated());
    assert_eq!(handle.live_textures(), 1);
    assert!(!handle.calls().iter().any(|c| matches!(c, GpuCall::DeleteTexture(_))));
}

#[test]
fn images_sharing_a_texture_upload_it_once() {
    let (mut gfx, handle) = Graphics::headless(320, 180);
    let group = Group::new();
    for _ in 0..3 {
        group.add(solid_image(&mut gfx));
    }
    group.draw(&mut gfx);

    assert_eq!(handle.count(|c| matches!(c, GpuCall::GenTexture(_))), 1);
    assert_eq!(handle.count(|c| matches!(c, GpuCall::TexImage { .. })), 1);
    assert_eq!(handle.count(|c| matches!(c, GpuCall::BindTexture(_))), 1);
    assert_eq!(
        handle.count(|c| matches!(c, GpuCall::DrawElements { count: 6, first: 0 })),
        3
    );
}

#[test]
fn unchanged_image_reuses_its_buffer() {
    let (mut gfx, handle) = Graphics::headless(320, 180);
    let image = solid_image(&mut gfx);
    let vertex_uploads = |h: &tessera_engine::gpu::headless::HeadlessHandle| {
        h.count(|c| {
            matches!(
                c,
                GpuCall::BufferData { target: BufferTarget::Vertex, .. }
                    | GpuCall::BufferSubData { target: BufferTarget::Vertex, .. }
            )
        })
    };

    image.draw(&mut gfx);
    image.draw(&mut gfx);
    assert_eq!(vertex_uploads(&handle), 1);
    assert!(!image.is_dirty());

    image.set_flip_horizontal(true);
    assert!(image.is_dirty());
    image.draw(&mut gfx);
    assert_eq!(vertex_uploads(&handle), 2);
    assert_eq!(handle.count(|c| matches!(c, GpuCall::GenBuffer(_))), 2);
}

#[test]
fn image_takes_its_size_from_the_frame() {
    let (mut gfx, _handle) = Graphics::headless(320, 180);
    let texture = gfx.textures.create("sheet", 64, 32);
    let image = Image::with_region(texture, 16.0, 8.0, 16.0, 8.0);
    {
        let v = image.visual().lock();
        assert_eq!(v.width, 16.0);
        assert_eq!(v.height, 8.0);
    }
    let frame = image.frame();
    assert!((frame.left() - 0.25).abs() < 1e-6);
    assert!((frame.top() - 0.25).abs() < 1e-6);
    assert!((frame.right() - 0.5).abs() < 1e-6);
    assert!((frame.bottom() - 0.5).abs() < 1e-6);

    image.set_flip_horizontal(true);
    let v = image.vertices();
    assert!((v[2] - 0.5).abs() < 1e-6);
    assert!((v[6] - 0.25).abs() < 1e-6);
}

#[test]
fn nine_patch_draws_nine_quads_from_one_buffer() {
    let (mut gfx, handle) = Graphics::headless(320, 180);
    let texture = gfx.textures.create("frame", 12, 12);
    let patch = NinePatch::new(texture, Margins::uniform(4));
    patch.size(40.0, 20.0);
    patch.draw(&mut gfx);

    assert_eq!(handle.count(|c| matches!(c, GpuCall::DrawElements { count: 54, first: 0 })), 1);
    let quads = patch.quads();
    assert_eq!(quads.len(), 9 * 16);
    // Bottom-right corner keeps its pixel size.
    let last = &quads[8 * 16..];
    assert_eq!(last[0], 36.0);
    assert_eq!(last[1], 16.0);
    assert_eq!(last[8], 40.0);
    assert_eq!(last[9], 20.0);
}

#[test]
fn images_without_a_camera_are_culled_by_the_main_camera() {
    let (mut gfx, handle) = Graphics::headless(320, 180);
    let draws = |h: &tessera_engine::gpu::headless::HeadlessHandle| {
        h.count(|c| matches!(c, GpuCall::DrawElements { .. }))
    };
    let far = solid_image(&mut gfx);
    far.visual().set_point(Position::new(1000.0, 1000.0));
    let near = solid_image(&mut gfx);
    near.visual().set_point(Position::new(100.0, 50.0));
    assert!(far.is_visible());

    far.draw(&mut gfx);
    assert_eq!(draws(&handle), 0);
    near.draw(&mut gfx);
    assert_eq!(draws(&handle), 1);

    far.visual().set_point(Position::new(316.0, 0.0));
    far.draw(&mut gfx);
    assert_eq!(draws(&handle), 2);

    let patch = NinePatch::new(gfx.textures.create("frame", 12, 12), Margins::uniform(4));
    patch.size(40.0, 20.0);
    patch.visual().set_point(Position::new(-500.0, 0.0));
    patch.draw(&mut gfx);
    assert_eq!(draws(&handle), 2);
}

#[test]
fn graph_dump_lists_nodes_and_edges() {
    let root = Group::new();
    root.add(Visual::create(0.0, 0.0, 1.0, 1.0));
    let dot = to_dot(&as_ref(&root));
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("Group"));
    assert!(dot.contains("Visual"));
    assert!(dot.contains("->"));
}
