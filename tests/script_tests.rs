use std::sync::Arc;
use tessera_engine::camera::Camera;
use tessera_engine::game_core::{CollectingReporter, MemoryAssets};
use tessera_engine::gpu::headless::{GpuCall, HeadlessDriver};
use tessera_engine::gpu::{AttribLocation, BufferTarget, ScissorRect, ShaderStage, UniformLocation};
use tessera_engine::graphics::{Graphics, Screen};
use tessera_engine::vertex::{INDICES_PER_QUAD, MAX_QUADS};

const CAMERA: UniformLocation = UniformLocation(0);

#[test]
fn script_builds_lazily_and_activates() {
    let (mut gfx, handle) = Graphics::headless(200, 100);
    assert!(!gfx.has_script());
    let program = gfx.script().program();

    let calls = handle.calls();
    assert_eq!(calls[0], GpuCall::CreateProgram(program));
    assert!(calls.contains(&GpuCall::CompileShader(ShaderStage::Vertex)));
    assert!(calls.contains(&GpuCall::CompileShader(ShaderStage::Fragment)));
    assert!(calls.contains(&GpuCall::LinkProgram(program)));
    assert!(calls.contains(&GpuCall::BufferData {
        target: BufferTarget::Index,
        len: MAX_QUADS * INDICES_PER_QUAD * 4,
    }));
    let tail = &calls[calls.len() - 5..];
    assert_eq!(
        tail,
        &[
            GpuCall::UseProgram(program),
            GpuCall::EnableAttrib(AttribLocation(0)),
            GpuCall::EnableAttrib(AttribLocation(1)),
            GpuCall::Uniform1i(UniformLocation(4), 0),
            GpuCall::BindBuffer(BufferTarget::Index, calls.iter().find_map(|c| match c {
                GpuCall::GenBuffer(id) => Some(*id),
                _ => None,
            })),
        ]
    );
    assert!(gfx.has_script());
}

#[test]
fn link_failure_is_reported_not_raised() {
    let reporter = Arc::new(CollectingReporter::new());
    let (mut gfx, handle) = Graphics::headless_with(
        HeadlessDriver::failing_link("missing entry point"),
        Arc::new(MemoryAssets::new()),
        reporter.clone(),
        Screen::new(200, 100),
    );
    gfx.script();

    let entries = reporter.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].starts_with("shader program"));
    assert!(entries[0].contains("missing entry point"));
    assert!(gfx.has_script());
    assert_eq!(handle.count(|c| matches!(c, GpuCall::UseProgram(_))), 1);
}

#[test]
fn same_camera_is_uploaded_once() {
    let (mut gfx, handle) = Graphics::headless(200, 100);
    let main = gfx.cameras.main().unwrap();
    gfx.set_camera(Some(&main));
    gfx.set_camera(Some(&main));
    gfx.set_camera(None);
    assert_eq!(handle.count(|c| *c == GpuCall::UniformMatrix4(CAMERA)), 1);

    gfx.reset_camera();
    gfx.set_camera(Some(&main));
    assert_eq!(handle.count(|c| *c == GpuCall::UniformMatrix4(CAMERA)), 2);
}

#[test]
fn full_screen_camera_disables_scissor() {
    let (mut gfx, handle) = Graphics::headless(200, 100);
    gfx.set_camera(None);
    assert!(handle.calls().contains(&GpuCall::ScissorTest(false)));
    assert!(!handle.calls().iter().any(|c| matches!(c, GpuCall::Scissor(_))));
}

#[test]
fn partial_camera_clips_in_backbuffer_pixels() {
    let (mut gfx, handle) = Graphics::headless(200, 100);
    let camera = Arc::new(Camera::new(10, 20, 50.0, 40.0, 2.0));
    camera.update(200.0, 100.0);
    gfx.set_camera(Some(&camera));

    let calls = handle.calls();
    assert!(calls.contains(&GpuCall::ScissorTest(true)));
    assert!(calls.contains(&GpuCall::Scissor(ScissorRect {
        x: 10,
        y: 0,
        width: 100,
        height: 80,
    })));
}

#[test]
fn scissor_scales_with_density_and_inset() {
    let (mut gfx, handle) = Graphics::headless(200, 100);
    gfx.set_screen(Screen::with_density(200, 100, 2.0, 10));
    let camera = Arc::new(Camera::new(0, 0, 100.0, 50.0, 1.0));
    camera.update(200.0, 100.0);
    gfx.set_camera(Some(&camera));

    assert!(handle.calls().contains(&GpuCall::Scissor(ScissorRect {
        x: 0,
        y: 110,
        width: 200,
        height: 100,
    })));
}

#[test]
fn draws_index_into_the_shared_pattern() {
    let (mut gfx, handle) = Graphics::headless(200, 100);
    let dataset = gfx.create_dataset(&[0.0; 16 * 4]);
    gfx.draw_quad(&dataset);
    gfx.draw_quad_set(&dataset, 3, 1);
    gfx.draw_quad_set(&dataset, 0, 0);

    let draws: Vec<_> = handle
        .calls()
        .into_iter()
        .filter(|c| matches!(c, GpuCall::DrawElements { .. }))
        .collect();
    assert_eq!(
        draws,
        vec![
            GpuCall::DrawElements { count: 6, first: 0 },
            GpuCall::DrawElements { count: 18, first: 6 },
        ]
    );
    assert!(handle.calls().contains(&GpuCall::AttribPointer {
        location: AttribLocation(1),
        components: 2,
        stride: 4,
        offset: 2,
    }));
}

#[test]
fn reset_script_deletes_and_rebuilds() {
    let (mut gfx, handle) = Graphics::headless(200, 100);
    let first = gfx.script().program();
    gfx.reset_script();
    assert!(!gfx.has_script());
    assert!(handle.calls().contains(&GpuCall::DeleteProgram(first)));

    let second = gfx.script().program();
    assert_ne!(first, second);
}
