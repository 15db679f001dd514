//! Seedable random streams. SplitMix64 derives stream seeds, each stream
//! runs xorshift64*. Streams can be derived from names so that independent
//! subsystems (particles, music shuffling) do not perturb each other.

use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy)]
pub struct RngService {
    base_seed: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct RngStream {
    state: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RngStreamId(pub u64);

impl RngService {
    pub fn with_seed(seed: u64) -> Self {
        Self { base_seed: seed }
    }

    /// Seeds from the wall clock. Not reproducible.
    pub fn from_clock() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x5EED);
        Self::with_seed(nanos)
    }

    pub fn derive(&self, id: RngStreamId) -> RngStream {
        RngStream::seeded(self.base_seed ^ id.0)
    }

    pub fn derive_named(&self, name: &str) -> RngStream {
        self.derive(RngStreamId(fnv1a64(name.as_bytes())))
    }
}

impl RngStream {
    pub fn seeded(seed: u64) -> Self {
        Self {
            state: splitmix64(seed).max(1),
        }
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(2685821657736338717)
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Uniform in `[0, 1)` with 24 bits of precision.
    #[inline]
    pub fn unit(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Uniform in `[0, max)`; 0 when `max` is 0.
    #[inline]
    pub fn float(&mut self, max: f32) -> f32 {
        self.unit() * max
    }

    #[inline]
    pub fn float_range(&mut self, min: f32, max: f32) -> f32 {
        min + (max - min) * self.unit()
    }

    /// Uniform in `[0, max)`; 0 when `max` is 0.
    pub fn int(&mut self, max: u32) -> u32 {
        if max == 0 {
            0
        } else {
            self.next_u32() % max
        }
    }

    pub fn shuffle<T>(&mut self, data: &mut [T]) {
        for i in (1..data.len()).rev() {
            let j = self.int(i as u32 + 1) as usize;
            data.swap(i, j);
        }
    }
}

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z ^= z >> 30;
    z = z.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z ^= z >> 27;
    z = z.wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[inline]
fn fnv1a64(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0xcbf2_9ce4_8422_2325u64, |hash, &b| {
            (hash ^ b as u64).wrapping_mul(0x0000_0100_0000_01B3)
        })
}
