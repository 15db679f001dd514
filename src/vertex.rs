use crate::gpu::{BufferId, BufferTarget, Gpu};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Quads addressable by the shared index buffer.
pub const MAX_QUADS: usize = 32767;
/// Indices per quad (two triangles).
pub const INDICES_PER_QUAD: usize = 6;
/// Floats per quad: four vertices of x, y, u, v.
pub const FLOATS_PER_QUAD: usize = 16;

const QUAD_PATTERN: [u32; INDICES_PER_QUAD] = [0, 1, 2, 0, 2, 3];

/// Index data for [`MAX_QUADS`] quads laid out as consecutive 4-vertex runs.
pub fn quad_indices() -> Vec<u32> {
    (0..MAX_QUADS as u32)
        .flat_map(|quad| QUAD_PATTERN.iter().map(move |i| quad * 4 + i))
        .collect()
}

/// Zeroed vertex storage for `quads` quads.
pub fn create_set(quads: usize) -> Vec<f32> {
    vec![0.0; quads * FLOATS_PER_QUAD]
}

/// One quad spanning `x1..x2`, `y1..y2` with matching UVs, corners in
/// top-left, top-right, bottom-right, bottom-left order.
#[allow(clippy::too_many_arguments)]
pub fn fill_quad(x1: f32, x2: f32, y1: f32, y2: f32, u1: f32, u2: f32, v1: f32, v2: f32) -> [f32; 16] {
    [
        x1, y1, u1, v1, //
        x2, y1, u2, v1, //
        x2, y2, u2, v2, //
        x1, y2, u1, v2, //
    ]
}

#[derive(Debug)]
struct DatasetState {
    id: Option<BufferId>,
    data: Vec<f32>,
    update_start: usize,
    update_end: usize,
    update: bool,
    uploaded_len: Option<usize>,
    released: bool,
}

impl DatasetState {
    fn mark(&mut self, start: usize, end: usize) {
        let end = end.min(self.data.len());
        self.update_start = self.update_start.min(start);
        self.update_end = self.update_end.max(end);
        self.update = true;
    }

    fn mark_all(&mut self) {
        self.mark(0, self.data.len());
    }

    fn flush(&mut self, gpu: &mut Gpu) {
        if !self.update {
            return;
        }
        let Some(id) = self.id else {
            return;
        };
        let len = self.data.len();
        let driver = gpu.driver();
        driver.bind_buffer(BufferTarget::Vertex, Some(id));
        let full = self.uploaded_len != Some(len) || (self.update_start == 0 && self.update_end == len);
        if full {
            driver.buffer_data(BufferTarget::Vertex, bytemuck::cast_slice(&self.data));
            self.uploaded_len = Some(len);
        } else if self.update_start < self.update_end {
            let range = &self.data[self.update_start..self.update_end];
            driver.buffer_sub_data(
                BufferTarget::Vertex,
                self.update_start * std::mem::size_of::<f32>(),
                bytemuck::cast_slice(range),
            );
        }
        driver.bind_buffer(BufferTarget::Vertex, None);
        // Empty range, so the next marks widen from nothing.
        self.update_start = len;
        self.update_end = 0;
        self.update = false;
    }
}

/// Vertex buffer with a CPU copy and a dirty range. Marks coalesce into a
/// single upload on the next [`update_gl_data`](Self::update_gl_data).
///
/// Dropping the dataset releases its GPU buffer at the registry's next
/// collection.
#[derive(Debug)]
pub struct VertexDataset {
    state: Arc<Mutex<DatasetState>>,
}

fn lock(state: &Mutex<DatasetState>) -> MutexGuard<'_, DatasetState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl VertexDataset {
    /// Replaces the CPU data (when given) and marks everything dirty.
    pub fn mark_for_update(&self, data: Option<&[f32]>) {
        let mut state = lock(&self.state);
        if let Some(data) = data {
            state.data.clear();
            state.data.extend_from_slice(data);
        }
        state.mark_all();
    }

    /// Marks floats `start..end` dirty, optionally replacing the data first.
    pub fn mark_range(&self, data: Option<&[f32]>, start: usize, end: usize) {
        let mut state = lock(&self.state);
        if let Some(data) = data {
            state.data.clear();
            state.data.extend_from_slice(data);
        }
        state.mark(start, end);
    }

    pub fn update_gl_data(&self, gpu: &mut Gpu) {
        lock(&self.state).flush(gpu);
    }

    pub fn bind(&self, gpu: &mut Gpu) {
        let id = lock(&self.state).id;
        gpu.driver().bind_buffer(BufferTarget::Vertex, id);
    }

    pub fn release(&self, gpu: &mut Gpu) {
        gpu.driver().bind_buffer(BufferTarget::Vertex, None);
    }

    pub fn buffer_id(&self) -> Option<BufferId> {
        lock(&self.state).id
    }

    /// Current dirty range in floats, `None` when clean.
    pub fn pending_range(&self) -> Option<(usize, usize)> {
        let state = lock(&self.state);
        state.update.then_some((state.update_start, state.update_end))
    }

    pub fn len(&self) -> usize {
        lock(&self.state).data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for VertexDataset {
    fn drop(&mut self) {
        lock(&self.state).released = true;
    }
}

/// Tracks every live dataset for bulk teardown and context-loss reload.
#[derive(Debug, Default)]
pub struct VertexRegistry {
    datasets: Vec<Arc<Mutex<DatasetState>>>,
}

impl VertexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a buffer for `data`. The first update uploads it whole.
    pub fn create(&mut self, gpu: &mut Gpu, data: &[f32]) -> VertexDataset {
        let id = gpu.driver().gen_buffer();
        let state = Arc::new(Mutex::new(DatasetState {
            id: Some(id),
            data: data.to_vec(),
            update_start: 0,
            update_end: data.len(),
            update: true,
            uploaded_len: None,
            released: false,
        }));
        self.datasets.push(state.clone());
        VertexDataset { state }
    }

    /// Deletes buffers whose datasets were dropped. Returns how many.
    pub fn collect(&mut self, gpu: &mut Gpu) -> usize {
        let before = self.datasets.len();
        self.datasets.retain(|state| {
            let mut state = lock(state);
            if !state.released {
                return true;
            }
            if let Some(id) = state.id.take() {
                gpu.driver().delete_buffer(id);
            }
            false
        });
        before - self.datasets.len()
    }

    /// Deletes every buffer. Datasets still held elsewhere become inert.
    pub fn clear(&mut self, gpu: &mut Gpu) {
        for state in self.datasets.drain(..) {
            if let Some(id) = lock(&state).id.take() {
                gpu.driver().delete_buffer(id);
            }
        }
    }

    /// Recreates and refills every live buffer after context loss.
    pub fn reload(&mut self, gpu: &mut Gpu) {
        self.collect(gpu);
        for state in &self.datasets {
            let mut state = lock(state);
            state.id = Some(gpu.driver().gen_buffer());
            state.uploaded_len = None;
            state.mark_all();
            state.flush(gpu);
        }
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}
