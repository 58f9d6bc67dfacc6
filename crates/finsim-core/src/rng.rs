use crate::Scalar;

/// Deterministic generator for per-run parameter jitter. Seeded explicitly
/// by the caller so runs are reproducible in tests.
#[derive(Copy, Clone, Debug)]
pub struct XorShift64 { state: u64 }

impl XorShift64 {
    pub fn new(seed: u64) -> Self { Self { state: seed | 1 } }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x >> 12; x ^= x << 25; x ^= x >> 27;
        self.state = x;
        ((x.wrapping_mul(2685821657736338717)) >> 32) as u32
    }

    /// Uniform in [0, 1).
    pub fn next_unit(&mut self) -> Scalar {
        (self.next_u32() as f64 / 4294967296.0) as Scalar
    }

    /// Multiplier `1 + frac*(2U - 1)` for U uniform in [0, 1).
    /// `frac = 0` always yields exactly 1.
    pub fn jitter(&mut self, frac: Scalar) -> Scalar {
        if frac == 0.0 { return 1.0; }
        1.0 + (self.next_unit() * 2.0 - 1.0) * frac
    }
}
