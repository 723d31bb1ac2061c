// ─────────────────────────────────────────────────────────────────────
// SynthECG — Adaptive Dormand–Prince Integrator
// ─────────────────────────────────────────────────────────────────────
//! Embedded Runge–Kutta 5(4) (Dormand–Prince) with adaptive step size and
//! the 4th-order continuous extension, sampled on a fixed output grid.
//!
//! Grid: t_k = k / fs for k = 0..=N, N = duration · fs. Row 0 is the
//! initial condition; [`Trajectory`] drops it together with the phase
//! column, leaving exactly N samples at spacing 1 / fs.

use serde::{Deserialize, Serialize};

use synth_ecg_types::{SolverConfig, SynthEcgError, SynthEcgResult, GRID_TOLERANCE};

use crate::params::DEFAULT_INITIAL_STATE;

/// Integration state `[θ, x, y, z]`.
pub type State = [f64; 4];

/// Anything that can be integrated: a time-invariant or time-varying
/// right-hand side over a 4-vector.
pub trait Dynamics {
    fn derivative(&self, t: f64, state: &State) -> State;

    /// Reject parameter sets the right-hand side cannot evaluate.
    fn validate(&self) -> SynthEcgResult<()> {
        Ok(())
    }
}

// Dormand–Prince tableau.
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;
const A71: f64 = 35.0 / 384.0;
const A73: f64 = 500.0 / 1113.0;
const A74: f64 = 125.0 / 192.0;
const A75: f64 = -2187.0 / 6784.0;
const A76: f64 = 11.0 / 84.0;

// 5th minus 4th order weights.
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

// Continuous extension (Hairer & Wanner, dopri5).
const D1: f64 = -12715105075.0 / 11282082432.0;
const D3: f64 = 87487479700.0 / 32700410799.0;
const D4: f64 = -10690763975.0 / 1880347072.0;
const D5: f64 = 701980252875.0 / 199316789632.0;
const D6: f64 = -1453857185.0 / 822651844.0;
const D7: f64 = 69997945.0 / 29380423.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;
const ERROR_EXPONENT: f64 = -1.0 / 5.0;

/// Step bookkeeping of one solve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverStats {
    pub n_accepted: u64,
    pub n_rejected: u64,
    pub n_evals: u64,
}

/// Raw solver output on the full grid, initial row included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub t: Vec<f64>,
    pub y: Vec<State>,
    pub stats: SolverStats,
}

/// Spatial VCG samples `(x, y, z)` with their times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub t: Vec<f64>,
    pub points: Vec<[f64; 3]>,
}

impl Trajectory {
    /// Drop the phase column and the initial-condition row.
    pub fn from_solution(solution: &Solution) -> Self {
        let t = solution.t.iter().skip(1).copied().collect();
        let points = solution
            .y
            .iter()
            .skip(1)
            .map(|s| [s[1], s[2], s[3]])
            .collect();
        Self { t, points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Fixed-grid driver for the adaptive Dormand–Prince solver.
#[derive(Debug, Clone)]
pub struct Integrator {
    fs: f64,
    duration: f64,
    n_samples: usize,
    config: SolverConfig,
}

impl Integrator {
    pub fn new(fs: f64, duration: f64) -> SynthEcgResult<Self> {
        Self::with_config(fs, duration, SolverConfig::default())
    }

    pub fn with_config(fs: f64, duration: f64, config: SolverConfig) -> SynthEcgResult<Self> {
        if !(fs > 0.0 && fs.is_finite()) {
            return Err(SynthEcgError::InvalidParameter(format!(
                "sample rate must be > 0 Hz, got {fs}"
            )));
        }
        if !(duration > 0.0 && duration.is_finite()) {
            return Err(SynthEcgError::InvalidParameter(format!(
                "duration must be > 0 s, got {duration}"
            )));
        }
        let exact = duration * fs;
        let n = exact.round();
        if n < 1.0 {
            return Err(SynthEcgError::InvalidParameter(format!(
                "duration {duration} s at {fs} Hz yields no samples"
            )));
        }
        if (exact - n).abs() > GRID_TOLERANCE {
            return Err(SynthEcgError::InvalidParameter(format!(
                "duration {duration} s at {fs} Hz is not a whole number of samples ({exact})"
            )));
        }
        config.validate()?;
        Ok(Self {
            fs,
            duration,
            n_samples: n as usize,
            config,
        })
    }

    pub fn sample_rate(&self) -> f64 {
        self.fs
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Samples per trajectory (`duration · fs`).
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Output times `k / fs`, `k = 0..=N`.
    pub fn output_grid(&self) -> Vec<f64> {
        (0..=self.n_samples).map(|k| k as f64 / self.fs).collect()
    }

    /// Integrate `system` from `v0`, returning every grid row.
    pub fn solve<D: Dynamics + ?Sized>(&self, system: &D, v0: State) -> SynthEcgResult<Solution> {
        system.validate()?;
        if v0.iter().any(|v| !v.is_finite()) {
            return Err(SynthEcgError::InvalidParameter(format!(
                "initial state must be finite, got {v0:?}"
            )));
        }

        let grid = self.output_grid();
        let t_end = grid[self.n_samples];
        let max_step = self.config.max_step.unwrap_or(1.0 / self.fs);
        let (rtol, atol) = (self.config.rtol, self.config.atol);

        let mut out_t = Vec::with_capacity(grid.len());
        let mut out_y = Vec::with_capacity(grid.len());
        out_t.push(grid[0]);
        out_y.push(v0);
        let mut next = 1;

        let mut stats = SolverStats::default();
        let mut t = 0.0;
        let mut y = v0;
        let mut k1 = system.derivative(t, &y);
        stats.n_evals += 1;
        if k1.iter().any(|v| !v.is_finite()) {
            return Err(SynthEcgError::Integration(
                "derivative is not finite at the initial state".to_string(),
            ));
        }

        let mut h = initial_step(system, t, &y, &k1, rtol, atol, &mut stats).min(max_step);
        let mut attempts = 0usize;

        while next <= self.n_samples {
            attempts += 1;
            if attempts > self.config.max_steps {
                return Err(SynthEcgError::Integration(format!(
                    "exceeded {} steps at t = {t:.6} s of {t_end} s",
                    self.config.max_steps
                )));
            }

            let min_step = 10.0 * f64::EPSILON * t.abs().max(1.0);
            if h < min_step {
                return Err(SynthEcgError::Integration(format!(
                    "step size {h:e} underflowed at t = {t:.6} s"
                )));
            }

            let remaining = t_end - t;
            let last = h >= remaining;
            if last {
                h = remaining;
            }

            let k2 = system.derivative(t + C2 * h, &combine(&y, h, &[(A21, &k1)]));
            let k3 = system.derivative(t + C3 * h, &combine(&y, h, &[(A31, &k1), (A32, &k2)]));
            let k4 = system.derivative(
                t + C4 * h,
                &combine(&y, h, &[(A41, &k1), (A42, &k2), (A43, &k3)]),
            );
            let k5 = system.derivative(
                t + C5 * h,
                &combine(&y, h, &[(A51, &k1), (A52, &k2), (A53, &k3), (A54, &k4)]),
            );
            let k6 = system.derivative(
                t + h,
                &combine(
                    &y,
                    h,
                    &[(A61, &k1), (A62, &k2), (A63, &k3), (A64, &k4), (A65, &k5)],
                ),
            );
            let y_new = combine(
                &y,
                h,
                &[(A71, &k1), (A73, &k3), (A74, &k4), (A75, &k5), (A76, &k6)],
            );
            let t_new = if last { t_end } else { t + h };
            let k7 = system.derivative(t_new, &y_new);
            stats.n_evals += 6;

            let err = error_norm(
                &y,
                &y_new,
                h,
                [&k1, &k3, &k4, &k5, &k6, &k7],
                rtol,
                atol,
            );

            if !err.is_finite() || y_new.iter().chain(&k7).any(|v| !v.is_finite()) {
                stats.n_rejected += 1;
                h *= MIN_FACTOR;
                continue;
            }

            if err > 1.0 {
                stats.n_rejected += 1;
                h *= (SAFETY * err.powf(ERROR_EXPONENT)).max(MIN_FACTOR);
                continue;
            }

            // Accepted: sample every grid point inside (t, t_new].
            let dense = DenseStep::new(&y, &y_new, h, [&k1, &k3, &k4, &k5, &k6, &k7]);
            while next <= self.n_samples && grid[next] <= t_new {
                let s = ((grid[next] - t) / h).clamp(0.0, 1.0);
                out_t.push(grid[next]);
                out_y.push(dense.eval(s));
                next += 1;
            }
            if last {
                // Rounding in the final comparison can leave the end point.
                while next <= self.n_samples {
                    out_t.push(grid[next]);
                    out_y.push(y_new);
                    next += 1;
                }
            }

            stats.n_accepted += 1;
            t = t_new;
            y = y_new;
            k1 = k7;

            let factor = if err == 0.0 {
                MAX_FACTOR
            } else {
                (SAFETY * err.powf(ERROR_EXPONENT)).min(MAX_FACTOR)
            };
            h = (h * factor).min(max_step);
        }

        log::debug!(
            "Integrated {} s at {} Hz: {} accepted, {} rejected, {} evaluations",
            self.duration,
            self.fs,
            stats.n_accepted,
            stats.n_rejected,
            stats.n_evals
        );

        Ok(Solution {
            t: out_t,
            y: out_y,
            stats,
        })
    }

    /// Integrate and keep `(x, y, z)` from row 1 on.
    ///
    /// `v0` defaults to `[0, 0.3, 0.3, 0.3]`.
    pub fn trajectory<D: Dynamics + ?Sized>(
        &self,
        system: &D,
        v0: Option<State>,
    ) -> SynthEcgResult<Trajectory> {
        let solution = self.solve(system, v0.unwrap_or(DEFAULT_INITIAL_STATE))?;
        Ok(Trajectory::from_solution(&solution))
    }
}

/// `y + h · Σ a_i k_i`
#[inline]
fn combine(y: &State, h: f64, terms: &[(f64, &State)]) -> State {
    let mut out = *y;
    for (i, o) in out.iter_mut().enumerate() {
        let incr: f64 = terms.iter().map(|(a, k)| a * k[i]).sum();
        *o += h * incr;
    }
    out
}

fn rms(v: impl Iterator<Item = f64>, n: usize) -> f64 {
    (v.map(|x| x * x).sum::<f64>() / n as f64).sqrt()
}

fn error_norm(
    y: &State,
    y_new: &State,
    h: f64,
    k: [&State; 6],
    rtol: f64,
    atol: f64,
) -> f64 {
    let [k1, k3, k4, k5, k6, k7] = k;
    rms(
        (0..4).map(|i| {
            let e = h * (E1 * k1[i] + E3 * k3[i] + E4 * k4[i] + E5 * k5[i] + E6 * k6[i] + E7 * k7[i]);
            let scale = atol + y[i].abs().max(y_new[i].abs()) * rtol;
            e / scale
        }),
        4,
    )
}

/// Hairer–Wanner starting step heuristic.
fn initial_step<D: Dynamics + ?Sized>(
    system: &D,
    t0: f64,
    y0: &State,
    f0: &State,
    rtol: f64,
    atol: f64,
    stats: &mut SolverStats,
) -> f64 {
    let scale: Vec<f64> = y0.iter().map(|y| atol + y.abs() * rtol).collect();
    let d0 = rms(y0.iter().zip(&scale).map(|(y, s)| y / s), 4);
    let d1 = rms(f0.iter().zip(&scale).map(|(f, s)| f / s), 4);
    let h0 = if d0 < 1e-5 || d1 < 1e-5 {
        1e-6
    } else {
        0.01 * d0 / d1
    };

    let y1 = combine(y0, h0, &[(1.0, f0)]);
    let f1 = system.derivative(t0 + h0, &y1);
    stats.n_evals += 1;
    let d2 = rms(
        f1.iter()
            .zip(f0)
            .zip(&scale)
            .map(|((a, b), s)| (a - b) / s),
        4,
    ) / h0;

    let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
        (h0 * 1e-3).max(1e-6)
    } else {
        (0.01 / d1.max(d2)).powf(1.0 / 5.0)
    };
    let h = (100.0 * h0).min(h1);
    if h.is_finite() && h > 0.0 {
        h
    } else {
        1e-6
    }
}

/// Continuous extension of one accepted step.
struct DenseStep {
    r1: State,
    r2: State,
    r3: State,
    r4: State,
    r5: State,
}

impl DenseStep {
    fn new(y0: &State, y1: &State, h: f64, k: [&State; 6]) -> Self {
        let [k1, k3, k4, k5, k6, k7] = k;
        let mut step = Self {
            r1: *y0,
            r2: [0.0; 4],
            r3: [0.0; 4],
            r4: [0.0; 4],
            r5: [0.0; 4],
        };
        for i in 0..4 {
            let diff = y1[i] - y0[i];
            let bspl = h * k1[i] - diff;
            step.r2[i] = diff;
            step.r3[i] = bspl;
            step.r4[i] = diff - h * k7[i] - bspl;
            step.r5[i] = h
                * (D1 * k1[i] + D3 * k3[i] + D4 * k4[i] + D5 * k5[i] + D6 * k6[i] + D7 * k7[i]);
        }
        step
    }

    /// State at fraction `s ∈ [0, 1]` of the step.
    fn eval(&self, s: f64) -> State {
        let s1 = 1.0 - s;
        let mut out = [0.0; 4];
        for (i, o) in out.iter_mut().enumerate() {
            *o = self.r1[i]
                + s * (self.r2[i] + s1 * (self.r3[i] + s * (self.r4[i] + s1 * self.r5[i])));
        }
        out
    }
}
