//! Payload generation.

use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

pub struct PayloadBuilder {
    /// Size of the payload, in bytes.
    size: usize,
    /// Seed for the PRNG
    seed: u64,
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        PayloadBuilder { size: 4096, seed: 1 }
    }
}

impl PayloadBuilder {
    pub fn size(&mut self, size: usize) -> &mut Self {
        self.size = size;
        self
    }

    pub fn seed(&mut self, seed: u64) -> &mut Self {
        self.seed = seed;
        self
    }

    /// Deterministic pseudo-random bytes.  The same builder always yields the
    /// same payload.
    pub fn build(&self) -> Vec<u8> {
        let mut rng = Xoshiro256Plus::seed_from_u64(self.seed);
        let mut data = vec![0u8; self.size];
        rng.fill_bytes(&mut data);
        data
    }
}

#[cfg(test)]
mod tests {
    use super::PayloadBuilder;

    #[test]
    fn deterministic() {
        let a = PayloadBuilder::default().size(1000).seed(7).build();
        let b = PayloadBuilder::default().size(1000).seed(7).build();
        let c = PayloadBuilder::default().size(1000).seed(8).build();
        assert_eq!(a.len(), 1000);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
