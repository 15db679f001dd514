use std::sync::{Arc, Mutex};
use tessera_engine::game_core::RngStream;
use tessera_engine::gpu::headless::GpuCall;
use tessera_engine::gpu::BlendMode;
use tessera_engine::graphics::Graphics;
use tessera_engine::scene::{
    Container, Emitter, Factory, Gizmo, Group, UpdateContext, Visual, VisualGizmo,
};

type Log = Arc<Mutex<Vec<(usize, f32, f32)>>>;

fn recording_factory() -> (Arc<dyn Factory>, Log) {
    let log: Log = Arc::default();
    let sink = log.clone();
    let factory: Arc<dyn Factory> = Arc::new(move |_emitter: &Emitter, index: usize, x: f32, y: f32| {
        sink.lock().unwrap().push((index, x, y));
    });
    (factory, log)
}

fn tick(emitter: &Emitter, rng: &mut RngStream, elapsed: f32) {
    let mut ctx = UpdateContext::new(elapsed, rng);
    emitter.update(&mut ctx);
}

struct Sparks;

impl Factory for Sparks {
    fn emit(&self, emitter: &Emitter, _index: usize, x: f32, y: f32) {
        emitter.add(Visual::create(x, y, 1.0, 1.0));
    }

    fn light_mode(&self) -> bool {
        true
    }
}

#[test]
fn burst_emits_every_particle_in_one_update() {
    let emitter = Emitter::new();
    let (factory, log) = recording_factory();
    emitter.pos(10.0, 20.0, 0.0, 0.0);
    emitter.burst(factory, 5);
    assert!(emitter.is_on());

    let mut rng = RngStream::seeded(7);
    tick(&emitter, &mut rng, 0.016);

    let emitted = log.lock().unwrap().clone();
    assert_eq!(emitted.iter().map(|e| e.0).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
    assert!(emitted.iter().all(|&(_, x, y)| x == 10.0 && y == 20.0));
    assert!(!emitter.is_on());
    assert_eq!(emitter.count(), 5);
}

#[test]
fn finished_emitter_kills_itself_once_its_particles_are_gone() {
    let group = Group::new();
    let emitter = Emitter::new();
    group.add(emitter.clone());
    emitter.burst(Arc::new(Sparks), 2);

    let mut rng = RngStream::seeded(7);
    tick(&emitter, &mut rng, 0.016);
    assert_eq!(emitter.children().len(), 2);
    tick(&emitter, &mut rng, 0.016);
    assert!(emitter.is_alive());

    emitter.children().clear();
    tick(&emitter, &mut rng, 0.016);
    assert!(!emitter.is_alive());
}

#[test]
fn auto_kill_can_be_disabled() {
    let emitter = Emitter::new();
    let (factory, _log) = recording_factory();
    emitter.set_auto_kill(false);
    emitter.burst(factory, 1);

    let mut rng = RngStream::seeded(7);
    tick(&emitter, &mut rng, 0.016);
    tick(&emitter, &mut rng, 0.016);
    assert!(emitter.is_alive());
}

#[test]
fn idle_emitter_is_not_killed() {
    let emitter = Emitter::new();
    let mut rng = RngStream::seeded(7);
    tick(&emitter, &mut rng, 0.016);
    assert!(emitter.is_alive());
    assert!(!emitter.is_started());
}

#[test]
fn pour_emits_on_its_interval() {
    let emitter = Emitter::new();
    let (factory, log) = recording_factory();
    emitter.pour(factory, 0.5);

    let mut rng = RngStream::seeded(3);
    for _ in 0..8 {
        tick(&emitter, &mut rng, 0.25);
    }
    let count = log.lock().unwrap().len();
    assert!((3..=4).contains(&count), "emitted {count}");
    assert!(emitter.is_on());
}

#[test]
fn zero_interval_pour_emits_once_per_update() {
    let emitter = Emitter::new();
    let (factory, log) = recording_factory();
    emitter.pour(factory, 0.0);

    let mut rng = RngStream::seeded(3);
    for _ in 0..3 {
        tick(&emitter, &mut rng, 0.016);
    }
    assert_eq!(log.lock().unwrap().len(), 3);
}

#[test]
fn frozen_emitters_stop_after_the_first_second() {
    let emitter = Emitter::new();
    let (factory, log) = recording_factory();
    emitter.burst(factory, 3);

    let mut rng = RngStream::seeded(3);
    let mut ctx = UpdateContext::new(0.016, &mut rng);
    ctx.freeze_emitters = true;
    ctx.time_total = 1.5;
    emitter.update(&mut ctx);
    assert!(log.lock().unwrap().is_empty());
    assert!(emitter.is_on());

    ctx.time_total = 0.5;
    emitter.update(&mut ctx);
    assert_eq!(log.lock().unwrap().len(), 3);
}

#[test]
fn particles_spawn_inside_the_area() {
    let emitter = Emitter::new();
    let (factory, log) = recording_factory();
    emitter.pos(100.0, 50.0, 20.0, 10.0);
    emitter.burst(factory, 50);

    let mut rng = RngStream::seeded(11);
    tick(&emitter, &mut rng, 0.016);
    for &(_, x, y) in log.lock().unwrap().iter() {
        assert!((100.0..120.0).contains(&x));
        assert!((50.0..60.0).contains(&y));
    }
}

#[test]
fn particles_follow_the_target() {
    let hero = Visual::create(50.0, 60.0, 10.0, 10.0);
    let target: Arc<dyn VisualGizmo> = hero.clone();
    let emitter = Emitter::new();
    let (factory, log) = recording_factory();
    emitter.pos_target(&target, 2.0, 3.0, 0.0, 0.0);
    emitter.burst(factory.clone(), 20);

    let mut rng = RngStream::seeded(5);
    tick(&emitter, &mut rng, 0.016);
    for &(_, x, y) in log.lock().unwrap().iter() {
        assert!((50.0..=60.0).contains(&x));
        assert!((60.0..=70.0).contains(&y));
    }

    log.lock().unwrap().clear();
    emitter.set_fill_target(false);
    emitter.burst(factory, 1);
    tick(&emitter, &mut rng, 0.016);
    assert_eq!(log.lock().unwrap().clone(), vec![(0, 52.0, 63.0)]);
}

#[test]
fn light_mode_draws_additively() {
    let (mut gfx, handle) = Graphics::headless(100, 100);
    let emitter = Emitter::new();
    emitter.burst(Arc::new(Sparks), 1);
    assert!(emitter.in_light_mode());

    let mut rng = RngStream::seeded(1);
    tick(&emitter, &mut rng, 0.016);
    emitter.draw(&mut gfx);

    assert_eq!(
        handle.calls(),
        vec![GpuCall::Blend(BlendMode::Additive), GpuCall::Blend(BlendMode::Normal)]
    );
    assert_eq!(gfx.blend(), BlendMode::Normal);
}
