use std::sync::Arc;
use tessera_engine::camera::{Camera, Cameras};
use tessera_engine::matrix::Matrix;
use tessera_engine::scene::{Container, Gizmo, Group, Visual, VisualGizmo};
use tessera_engine::utils::{Position, Rectangle};

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

#[test]
fn full_screen_camera_maps_to_clip_space() {
    let camera = Camera::full_screen(200.0, 100.0, 1.0);
    assert!(camera.is_full_screen());
    let m = camera.matrix();
    let (x, y) = m.transform_point(0.0, 0.0);
    assert!(close(x, -1.0) && close(y, 1.0));
    let (x, y) = m.transform_point(200.0, 100.0);
    assert!(close(x, 1.0) && close(y, -1.0));
}

#[test]
fn zoom_keeps_the_screen_size() {
    let camera = Camera::full_screen(200.0, 100.0, 2.0);
    let state = camera.snapshot();
    assert_eq!((state.width, state.height), (100.0, 50.0));

    camera.set_zoom(4.0);
    let state = camera.snapshot();
    assert_eq!((state.width, state.height), (50.0, 25.0));
    assert_eq!(state.screen_width(), 200.0);
}

#[test]
fn screen_and_camera_coordinates_convert_both_ways() {
    let camera = Camera::new(10, 20, 50.0, 40.0, 2.0);
    camera.set_scroll(Position::new(5.0, 5.0));

    let p = camera.screen_to_camera(30.0, 40.0);
    assert_eq!(p, Position::new(15.0, 15.0));
    let back = camera.camera_to_screen(p.x, p.y);
    assert_eq!(back, Position::new(30.0, 40.0));

    assert!(camera.hit_test(10.0, 20.0));
    assert!(camera.hit_test(109.0, 99.0));
    assert!(!camera.hit_test(110.0, 50.0));
    assert!(!camera.hit_test(5.0, 50.0));
}

#[test]
fn update_recomputes_full_screen() {
    let camera = Camera::full_screen(200.0, 100.0, 1.0);
    camera.update(300.0, 100.0);
    assert!(!camera.is_full_screen());
    camera.update(200.0, 100.0);
    assert!(camera.is_full_screen());
}

#[test]
fn follow_centers_on_the_target() {
    let camera = Camera::full_screen(100.0, 100.0, 1.0);
    let hero = Visual::create(200.0, 300.0, 10.0, 10.0);
    let target: Arc<dyn VisualGizmo> = hero.clone();
    camera.follow(&target);
    camera.update(100.0, 100.0);
    assert_eq!(camera.scroll(), Position::new(155.0, 255.0));

    camera.stop_following();
    hero.set_point(Position::new(0.0, 0.0));
    camera.update(100.0, 100.0);
    assert_eq!(camera.scroll(), Position::new(155.0, 255.0));
}

#[test]
fn dead_zone_only_scrolls_when_the_target_leaves_it() {
    let camera = Camera::full_screen(100.0, 100.0, 1.0);
    camera.set_dead_zone(Some(Rectangle::new(25.0, 25.0, 50.0, 50.0)));
    let hero = Visual::create(40.0, 40.0, 10.0, 10.0);
    let target: Arc<dyn VisualGizmo> = hero.clone();
    camera.follow(&target);

    camera.update(100.0, 100.0);
    assert_eq!(camera.scroll(), Position::ZERO);

    hero.set_point(Position::new(90.0, 40.0));
    camera.update(100.0, 100.0);
    assert_eq!(camera.scroll(), Position::new(20.0, 0.0));
}

#[test]
fn dead_target_is_not_followed() {
    let camera = Camera::full_screen(100.0, 100.0, 1.0);
    let group = Group::new();
    let hero = Visual::create(200.0, 300.0, 10.0, 10.0);
    group.add(hero.clone());
    let target: Arc<dyn VisualGizmo> = hero.clone();
    camera.follow(&target);
    group.kill();

    camera.update(100.0, 100.0);
    assert_eq!(camera.scroll(), Position::ZERO);
}

#[test]
fn cameras_reset_to_a_single_main_camera() {
    let mut cameras = Cameras::new();
    let main = cameras.reset(320.0, 180.0);
    cameras.add(Arc::new(Camera::new(0, 0, 10.0, 10.0, 1.0)));
    assert_eq!(cameras.len(), 2);

    let fresh = cameras.reset(320.0, 180.0);
    assert_eq!(cameras.len(), 1);
    assert!(!Arc::ptr_eq(&main, &fresh));
    assert!(Arc::ptr_eq(&cameras.main().unwrap(), &fresh));

    cameras.remove(&fresh);
    assert!(cameras.main().is_none());
    assert!(cameras.is_empty());
}

#[test]
fn matrix_operations_compose() {
    let mut m = Matrix::identity();
    m.translate(10.0, 5.0);
    m.scale(2.0, 3.0);
    let (x, y) = m.transform_point(1.0, 1.0);
    assert!(close(x, 12.0) && close(y, 8.0));

    let mut r = Matrix::identity();
    r.rotate(90.0);
    let (x, y) = r.transform_point(1.0, 0.0);
    assert!(close(x, 0.0) && close(y, 1.0));

    let mut t = Matrix::identity();
    t.translate(3.0, 4.0);
    let product = t.multiply(&r);
    let (x, y) = product.transform_point(1.0, 0.0);
    assert!(close(x, 3.0) && close(y, 5.0));
    assert_eq!(Matrix::identity().multiply(&product), product);

    let mut s = Matrix::identity();
    s.skew_x(45.0);
    let (x, y) = s.transform_point(0.0, 1.0);
    assert!(close(x, -1.0) && close(y, 1.0));
}
