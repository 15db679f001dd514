use tessera_engine::gpu::headless::GpuCall;
use tessera_engine::gpu::BufferTarget;
use tessera_engine::graphics::Graphics;
use tessera_engine::vertex::{self, FLOATS_PER_QUAD, INDICES_PER_QUAD, MAX_QUADS};

fn vertex_calls(calls: &[GpuCall]) -> Vec<GpuCall> {
    calls
        .iter()
        .filter(|c| {
            matches!(
                c,
                GpuCall::BufferData { target: BufferTarget::Vertex, .. }
                    | GpuCall::BufferSubData { target: BufferTarget::Vertex, .. }
            )
        })
        .cloned()
        .collect()
}

#[test]
fn first_flush_uploads_everything() {
    let (mut gfx, handle) = Graphics::headless(100, 100);
    let dataset = gfx.create_dataset(&vertex::create_set(2));
    assert_eq!(dataset.pending_range(), Some((0, 2 * FLOATS_PER_QUAD)));

    dataset.update_gl_data(gfx.gpu());
    assert_eq!(
        vertex_calls(&handle.calls()),
        vec![GpuCall::BufferData {
            target: BufferTarget::Vertex,
            len: 2 * FLOATS_PER_QUAD * 4
        }]
    );
    assert_eq!(dataset.pending_range(), None);
}

#[test]
fn marked_ranges_coalesce_into_one_partial_upload() {
    let (mut gfx, handle) = Graphics::headless(100, 100);
    let dataset = gfx.create_dataset(&[0.0; 16]);
    dataset.update_gl_data(gfx.gpu());
    handle.clear_calls();

    dataset.mark_range(None, 2, 5);
    dataset.mark_range(None, 10, 14);
    assert_eq!(dataset.pending_range(), Some((2, 14)));
    dataset.update_gl_data(gfx.gpu());

    assert_eq!(
        vertex_calls(&handle.calls()),
        vec![GpuCall::BufferSubData {
            target: BufferTarget::Vertex,
            offset: 8,
            len: 48
        }]
    );
}

#[test]
fn marking_the_whole_buffer_reuploads_it() {
    let (mut gfx, handle) = Graphics::headless(100, 100);
    let dataset = gfx.create_dataset(&[0.0; 16]);
    dataset.update_gl_data(gfx.gpu());
    handle.clear_calls();

    dataset.mark_for_update(Some(&[1.0; 16]));
    dataset.update_gl_data(gfx.gpu());
    assert_eq!(
        vertex_calls(&handle.calls()),
        vec![GpuCall::BufferData {
            target: BufferTarget::Vertex,
            len: 64
        }]
    );
}

#[test]
fn growing_the_data_forces_a_full_upload() {
    let (mut gfx, handle) = Graphics::headless(100, 100);
    let dataset = gfx.create_dataset(&[0.0; 16]);
    dataset.update_gl_data(gfx.gpu());
    handle.clear_calls();

    dataset.mark_range(Some(&[0.0; 32]), 20, 24);
    dataset.update_gl_data(gfx.gpu());
    assert_eq!(
        vertex_calls(&handle.calls()),
        vec![GpuCall::BufferData {
            target: BufferTarget::Vertex,
            len: 128
        }]
    );
    assert_eq!(dataset.len(), 32);
}

#[test]
fn clean_dataset_does_not_upload() {
    let (mut gfx, handle) = Graphics::headless(100, 100);
    let dataset = gfx.create_dataset(&[0.0; 16]);
    dataset.update_gl_data(gfx.gpu());
    handle.clear_calls();

    dataset.update_gl_data(gfx.gpu());
    assert!(vertex_calls(&handle.calls()).is_empty());
}

#[test]
fn dropped_datasets_are_collected() {
    let (mut gfx, handle) = Graphics::headless(100, 100);
    let kept = gfx.create_dataset(&[0.0; 16]);
    let dropped = gfx.create_dataset(&[0.0; 16]);
    let dropped_id = dropped.buffer_id().unwrap();
    assert_eq!(handle.live_buffers(), 2);

    drop(dropped);
    assert_eq!(gfx.collect_garbage(), 1);
    assert_eq!(gfx.vertices.len(), 1);
    assert_eq!(handle.live_buffers(), 1);
    assert!(handle.calls().contains(&GpuCall::DeleteBuffer(dropped_id)));
    assert!(kept.buffer_id().is_some());
    assert_eq!(gfx.collect_garbage(), 0);
}

#[test]
fn clear_makes_held_datasets_inert() {
    let (mut gfx, handle) = Graphics::headless(100, 100);
    let dataset = gfx.create_dataset(&[0.0; 16]);
    gfx.clear_vertices();
    assert_eq!(handle.live_buffers(), 0);
    assert!(dataset.buffer_id().is_none());

    handle.clear_calls();
    dataset.update_gl_data(gfx.gpu());
    assert!(vertex_calls(&handle.calls()).is_empty());
}

#[test]
fn reload_recreates_live_buffers() {
    let (mut gfx, handle) = Graphics::headless(100, 100);
    let dataset = gfx.create_dataset(&[0.5; 32]);
    dataset.update_gl_data(gfx.gpu());
    let before = dataset.buffer_id();

    handle.lose_context();
    handle.clear_calls();
    assert!(gfx.context_lost());
    gfx.restore_context();
    assert!(!gfx.context_lost());
    assert_ne!(dataset.buffer_id(), before);
    assert_eq!(handle.live_buffers(), 1);
    assert_eq!(
        vertex_calls(&handle.calls()),
        vec![GpuCall::BufferData {
            target: BufferTarget::Vertex,
            len: 128
        }]
    );
}

#[test]
fn shared_index_pattern_covers_every_quad() {
    let indices = vertex::quad_indices();
    assert_eq!(indices.len(), MAX_QUADS * INDICES_PER_QUAD);
    assert_eq!(&indices[..6], &[0, 1, 2, 0, 2, 3]);
    assert_eq!(&indices[6..12], &[4, 5, 6, 4, 6, 7]);
    let last = (MAX_QUADS as u32 - 1) * 4;
    assert_eq!(indices[indices.len() - 1], last + 3);
}
