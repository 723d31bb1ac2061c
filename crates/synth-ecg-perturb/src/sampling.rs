// ─────────────────────────────────────────────────────────────────────
// SynthECG — Range Sampling
// ─────────────────────────────────────────────────────────────────────
//! Seeded random streams and validated `{min, max}` draws.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use synth_ecg_types::{SampleRange, Sampling, SynthEcgResult};

/// RNG threaded through every randomized operation.
pub type SampleRng = ChaCha20Rng;

/// Master stream of a batch (stream 0).
pub fn master_rng(seed: u64) -> SampleRng {
    ChaCha20Rng::seed_from_u64(seed)
}

/// Independent stream for sample `index`. Streams never overlap the
/// master stream, so results do not depend on worker scheduling.
pub fn sample_rng(seed: u64, index: usize) -> SampleRng {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    rng.set_stream(index as u64 + 1);
    rng
}

/// A range that has passed validation, ready to draw from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeSampler {
    min: f64,
    max: f64,
    sampling: Sampling,
}

impl RangeSampler {
    /// Validate `range` under `name`; `default` applies when the range
    /// leaves its sampling mode unset.
    pub fn new(name: &str, range: &SampleRange, default: Sampling) -> SynthEcgResult<Self> {
        range.validate(name, default)?;
        Ok(Self {
            min: range.min,
            max: range.max,
            sampling: range.resolved_sampling(default),
        })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn sampling(&self) -> Sampling {
        self.sampling
    }

    /// Uniform draw from `[min, max)`.
    pub fn draw(&self, rng: &mut SampleRng) -> f64 {
        match self.sampling {
            Sampling::Integer => rng.gen_range(self.min as i64..self.max as i64) as f64,
            Sampling::Continuous => rng.gen_range(self.min..self.max),
        }
    }
}
