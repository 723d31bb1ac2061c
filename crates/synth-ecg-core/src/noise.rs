// ─────────────────────────────────────────────────────────────────────
// SynthECG — Band-Limited Noise
// ─────────────────────────────────────────────────────────────────────
//! Gaussian noise shaped by a digital Butterworth band-pass, standardised
//! per lead and scaled to a target amplitude before it is added.
//!
//! Filter design: analog Butterworth prototype, low-pass → band-pass
//! transform, bilinear map with pre-warped band edges. Poles are grouped
//! into second-order sections (one per conjugate pair) whose zeros sit at
//! z = ±1; each section has unit gain at the band centre.

use std::f64::consts::PI;

use ndarray::{Array2, ArrayView1, Axis};
use num_complex::Complex64;
use rand::Rng;
use rand_distr::StandardNormal;

use synth_ecg_types::{NoiseConfig, SynthEcgError, SynthEcgResult};

/// Poles this close to the real axis are treated as real.
const REAL_POLE_TOLERANCE: f64 = 1e-10;

/// Second-order section with `a0 = 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b: [f64; 3],
    /// `[a1, a2]`.
    pub a: [f64; 2],
}

impl Biquad {
    fn band_pass(a1: f64, a2: f64) -> Self {
        Self {
            b: [1.0, 0.0, -1.0],
            a: [a1, a2],
        }
    }

    /// Frequency response at normalised angular frequency `omega` (rad/sample).
    pub fn response(&self, omega: f64) -> Complex64 {
        let z1 = Complex64::from_polar(1.0, -omega);
        let z2 = z1 * z1;
        (self.b[0] + z1 * self.b[1] + z2 * self.b[2]) / (1.0 + z1 * self.a[0] + z2 * self.a[1])
    }
}

/// Cascade of second-order sections.
#[derive(Debug, Clone, PartialEq)]
pub struct BandPass {
    sections: Vec<Biquad>,
    fs: f64,
}

impl BandPass {
    /// Digital Butterworth band-pass of prototype order `order` over
    /// `[f_min, f_max]` Hz; the result has `order` sections.
    pub fn butterworth(order: usize, f_min: f64, f_max: f64, fs: f64) -> SynthEcgResult<Self> {
        if !(f_min > 0.0 && f_min < f_max && f_max < fs / 2.0) || order == 0 {
            return Err(SynthEcgError::InvalidParameter(format!(
                "band-pass needs order > 0 and 0 < f_min < f_max < fs/2, got order {order}, \
                 [{f_min}, {f_max}] at {fs} Hz"
            )));
        }
        let fs2 = 2.0 * fs;
        let w1 = fs2 * (PI * f_min / fs).tan();
        let w2 = fs2 * (PI * f_max / fs).tan();
        let bw = w2 - w1;
        let w0_sq = w1 * w2;

        let mut upper = Vec::with_capacity(order);
        let mut real = Vec::new();
        for k in 0..order {
            let angle = PI * (2 * k + order + 1) as f64 / (2 * order) as f64;
            let half = Complex64::from_polar(1.0, angle) * (bw / 2.0);
            let disc = (half * half - w0_sq).sqrt();
            for s in [half + disc, half - disc] {
                let z = (fs2 + s) / (fs2 - s);
                if z.im > REAL_POLE_TOLERANCE {
                    upper.push(z);
                } else if z.im.abs() <= REAL_POLE_TOLERANCE {
                    real.push(z.re);
                }
            }
        }
        if real.len() % 2 != 0 {
            return Err(SynthEcgError::Numerical(format!(
                "band-pass design left {} unpaired real poles",
                real.len()
            )));
        }
        real.sort_by(f64::total_cmp);

        let mut sections: Vec<Biquad> = upper
            .iter()
            .map(|z| Biquad::band_pass(-2.0 * z.re, z.norm_sqr()))
            .collect();
        sections.extend(
            real.chunks_exact(2)
                .map(|p| Biquad::band_pass(-(p[0] + p[1]), p[0] * p[1])),
        );

        let omega_c = 2.0 * (w0_sq.sqrt() / fs2).atan();
        for section in &mut sections {
            let gain = section.response(omega_c).norm();
            if !(gain > 0.0 && gain.is_finite()) {
                return Err(SynthEcgError::Numerical(format!(
                    "band-pass section has gain {gain} at the band centre"
                )));
            }
            for b in &mut section.b {
                *b /= gain;
            }
        }
        Ok(Self { sections, fs })
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Magnitude response at `freq` Hz.
    pub fn gain(&self, freq: f64) -> f64 {
        let omega = 2.0 * PI * freq / self.fs;
        self.sections
            .iter()
            .map(|s| s.response(omega).norm())
            .product()
    }

    /// Causal filtering, Direct Form II transposed per section.
    pub fn filter(&self, signal: &[f64]) -> Vec<f64> {
        let mut out = signal.to_vec();
        for s in &self.sections {
            let (mut d1, mut d2) = (0.0, 0.0);
            for v in out.iter_mut() {
                let x = *v;
                let y = s.b[0] * x + d1;
                d1 = s.b[1] * x - s.a[0] * y + d2;
                d2 = s.b[2] * x - s.a[1] * y;
                *v = y;
            }
        }
        out
    }
}

/// Noise stage applied to rendered ECG windows.
#[derive(Debug, Clone, PartialEq)]
pub struct BandLimitedNoise {
    filter: BandPass,
    amplitude: f64,
    /// Leading filtered samples discarded to skip the start-up transient.
    warmup: usize,
}

impl BandLimitedNoise {
    pub fn new(config: &NoiseConfig, fs: f64) -> SynthEcgResult<Self> {
        config.validate(fs)?;
        Ok(Self {
            filter: BandPass::butterworth(config.order, config.f_min, config.f_max, fs)?,
            amplitude: config.amplitude,
            warmup: fs.round() as usize,
        })
    }

    pub fn filter(&self) -> &BandPass {
        &self.filter
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    /// Add noise to every column of `ecg`, drawn lead by lead from `rng`.
    ///
    /// Each lead's noise is standardised to zero mean and unit variance over
    /// the window, then scaled by the amplitude.
    pub fn apply<R: Rng + ?Sized>(&self, ecg: &mut Array2<f64>, rng: &mut R) -> SynthEcgResult<()> {
        let rows = ecg.nrows();
        if rows < 2 {
            return Err(SynthEcgError::InvalidParameter(format!(
                "noise needs at least 2 samples per lead, got {rows}"
            )));
        }
        for mut lead in ecg.axis_iter_mut(Axis(1)) {
            let raw: Vec<f64> = (0..self.warmup + rows)
                .map(|_| rng.sample(StandardNormal))
                .collect();
            let filtered = self.filter.filter(&raw);
            let band = ArrayView1::from(&filtered[self.warmup..]);
            let mean = band.mean().unwrap_or(0.0);
            let std = band.std(0.0);
            if !(std > 0.0 && std.is_finite()) {
                return Err(SynthEcgError::Numerical(format!(
                    "filtered noise has standard deviation {std}"
                )));
            }
            lead.scaled_add(self.amplitude / std, &(&band - mean));
        }
        Ok(())
    }
}
