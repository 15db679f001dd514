use uuid::Uuid;

/// CPU-side RGBA8 pixel buffer. Kept by textures after upload so they can be
/// regenerated when the GPU context is lost.
///
/// Every pixmap carries a fresh id; clones get a new one, since they are
/// independent buffers as far as texture deduplication is concerned.
#[derive(Debug)]
pub struct Pixmap {
    id: Uuid,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Clone for Pixmap {
    fn clone(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            width: self.width,
            height: self.height,
            data: self.data.clone(),
        }
    }
}

/// `0xAARRGGBB` to RGBA bytes.
pub fn argb_to_rgba(color: u32) -> [u8; 4] {
    [
        (color >> 16) as u8,
        (color >> 8) as u8,
        color as u8,
        (color >> 24) as u8,
    ]
}

/// RGBA8 byte count of a `width` x `height` image, `None` on overflow.
fn byte_len(width: u32, height: u32) -> Option<usize> {
    (width as usize).checked_mul(height as usize)?.checked_mul(4)
}

impl Pixmap {
    /// Transparent pixmap.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            width,
            height,
            data: vec![0; byte_len(width, height).unwrap_or(usize::MAX)],
        }
    }

    /// Wraps raw RGBA bytes. Returns `None` if the length does not match.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        (byte_len(width, height) == Some(data.len())).then(|| Self {
            id: Uuid::new_v4(),
            width,
            height,
            data,
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, image::ImageError> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            id: Uuid::new_v4(),
            width,
            height,
            data: rgba.into_raw(),
        })
    }

    /// 1x1 pixmap of an `0xAARRGGBB` color.
    pub fn solid(color: u32) -> Self {
        let mut pixmap = Self::new(1, 1);
        pixmap.set_pixel(0, 0, color);
        pixmap
    }

    /// One row with a pixel per `0xAARRGGBB` color.
    pub fn gradient(colors: &[u32]) -> Self {
        let mut pixmap = Self::new(colors.len() as u32, 1);
        for (x, color) in colors.iter().enumerate() {
            pixmap.set_pixel(x as u32, 0, *color);
        }
        pixmap
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: u32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = self.offset(x, y);
        self.data[i..i + 4].copy_from_slice(&argb_to_rgba(color));
    }

    /// Pixel as `0xAARRGGBB`, 0 when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> u32 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        let i = self.offset(x, y);
        let [r, g, b, a] = [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]];
        u32::from_be_bytes([a, r, g, b])
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    pub fn fill(&mut self, color: u32) {
        let rgba = argb_to_rgba(color);
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }
}
