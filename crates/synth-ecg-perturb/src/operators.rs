// ─────────────────────────────────────────────────────────────────────
// SynthECG — Perturbation Operators
// ─────────────────────────────────────────────────────────────────────
//! Concrete operators. Kernel indices follow the P, Q, R, S, T layout of
//! the canonical parameter tables; an index beyond a custom axis is an
//! `InvalidParameter` error rather than a silent skip.

use std::f64::consts::PI;

use rand_distr::{Distribution, Normal};

use synth_ecg_physics::{Axis, VcgModel};
use synth_ecg_types::{PerturbationKind, SampleRange, Sampling, SynthEcgError, SynthEcgResult};

use crate::operator::Perturbation;
use crate::sampling::{RangeSampler, SampleRng};

/// QRS complex kernels, every axis.
pub const QRS_KERNELS: &[usize] = &[3, 4, 5];
/// P wave kernels, every axis.
pub const P_WAVE_KERNELS: &[usize] = &[0, 1, 2];
/// T wave kernels, every axis.
pub const T_WAVE_KERNELS: &[usize] = &[8, 4, 5];
/// ST segment kernels, every axis.
pub const ST_KERNELS: &[usize] = &[8, 6, 4];

/// Kernels widened by [`WideQrs`], per axis `[x, y, z]`.
pub const WIDE_QRS_KERNELS: [&[usize]; 3] = [&[3, 4, 5], &[3, 4], &[5]];

/// T-wave kernels moved by [`QtElongation`], counted from the end of
/// each axis (`2` is the second-to-last kernel).
pub const QT_KERNELS_FROM_END: [&[usize]; 3] = [&[3, 2], &[3, 2], &[4, 3, 2]];

fn checked_index(axis: Axis, len: usize, i: usize) -> SynthEcgResult<usize> {
    if i < len {
        Ok(i)
    } else {
        Err(SynthEcgError::InvalidParameter(format!(
            "axis {} has {len} kernels, operator needs index {i}",
            axis.name()
        )))
    }
}

fn from_end(axis: Axis, len: usize, k: usize) -> SynthEcgResult<usize> {
    len.checked_sub(k).ok_or_else(|| {
        SynthEcgError::InvalidParameter(format!(
            "axis {} has {len} kernels, operator needs {k} from the end",
            axis.name()
        ))
    })
}

// ── Deterministic mutations ─────────────────────────────────────────

/// Phase shift (rad) equivalent to `ms` milliseconds at the model's rate.
pub fn qt_shift(model: &VcgModel, ms: f64) -> f64 {
    2.0 * PI * (ms / 1000.0) / model.beat_duration()
}

/// Copy of `model` with the T-wave centres moved `ms` later.
pub fn shift_t_waves(model: &VcgModel, ms: f64) -> SynthEcgResult<VcgModel> {
    let shift = qt_shift(model, ms);
    let mut out = model.clone();
    for (axis, offsets) in Axis::ALL.into_iter().zip(QT_KERNELS_FROM_END) {
        let kernels = out.axis_mut(axis);
        let len = kernels.len();
        for &k in offsets {
            let i = from_end(axis, len, k)?;
            kernels.theta_mut()[i] += shift;
        }
    }
    Ok(out)
}

/// Copy of `model` with QRS widths grown by `percent` and the paired
/// amplitudes multiplied by `scaledown`.
pub fn widen_qrs(model: &VcgModel, percent: f64, scaledown: f64) -> SynthEcgResult<VcgModel> {
    let widen = 1.0 + percent / 100.0;
    let mut out = model.clone();
    for (axis, indices) in Axis::ALL.into_iter().zip(WIDE_QRS_KERNELS) {
        let kernels = out.axis_mut(axis);
        let len = kernels.len();
        for &i in indices {
            let i = checked_index(axis, len, i)?;
            kernels.b_mut()[i] *= widen;
            kernels.alpha_mut()[i] *= scaledown;
        }
    }
    Ok(out)
}

/// Copy of `model` with `alpha[indices]` multiplied by `factor` on every axis.
pub fn scale_alpha(model: &VcgModel, indices: &[usize], factor: f64) -> SynthEcgResult<VcgModel> {
    let mut out = model.clone();
    for axis in Axis::ALL {
        let kernels = out.axis_mut(axis);
        let len = kernels.len();
        for &i in indices {
            let i = checked_index(axis, len, i)?;
            kernels.alpha_mut()[i] *= factor;
        }
    }
    Ok(out)
}

// ── Operators ───────────────────────────────────────────────────────

/// Override the heart rate with a sampled bpm.
#[derive(Debug, Clone)]
pub struct HeartRateChange {
    bpm: RangeSampler,
}

impl HeartRateChange {
    pub fn new(bpm: &SampleRange) -> SynthEcgResult<Self> {
        let bpm = RangeSampler::new("Heart Rate.bpm", bpm, Sampling::Integer)?;
        if bpm.min() <= 0.0 {
            return Err(SynthEcgError::InvalidParameter(format!(
                "Heart Rate.bpm must be > 0, got min {}",
                bpm.min()
            )));
        }
        Ok(Self { bpm })
    }
}

impl Perturbation for HeartRateChange {
    fn name(&self) -> &'static str {
        "Heart Rate"
    }

    fn apply(&self, model: &VcgModel, rng: &mut SampleRng) -> SynthEcgResult<VcgModel> {
        let mut out = model.clone();
        out.set_heart_rate(self.bpm.draw(rng))?;
        Ok(out)
    }
}

/// Move the T wave later in the cycle.
#[derive(Debug, Clone)]
pub struct QtElongation {
    ms_forward: RangeSampler,
}

impl QtElongation {
    pub fn new(ms_forward: &SampleRange) -> SynthEcgResult<Self> {
        Ok(Self {
            ms_forward: RangeSampler::new("QT Elongation.ms_forward", ms_forward, Sampling::Integer)?,
        })
    }
}

impl Perturbation for QtElongation {
    fn name(&self) -> &'static str {
        "QT Elongation"
    }

    fn apply(&self, model: &VcgModel, rng: &mut SampleRng) -> SynthEcgResult<VcgModel> {
        shift_t_waves(model, self.ms_forward.draw(rng))
    }
}

/// Widen the QRS kernels and compensate their amplitude.
#[derive(Debug, Clone)]
pub struct WideQrs {
    percent_widened: RangeSampler,
    scale: RangeSampler,
}

impl WideQrs {
    pub fn new(percent_widened: &SampleRange, scale: &SampleRange) -> SynthEcgResult<Self> {
        Ok(Self {
            percent_widened: RangeSampler::new(
                "Wide QRS.percent_widened",
                percent_widened,
                Sampling::Integer,
            )?,
            scale: RangeSampler::new("Wide QRS.scale", scale, Sampling::Integer)?,
        })
    }
}

impl Perturbation for WideQrs {
    fn name(&self) -> &'static str {
        "Wide QRS"
    }

    fn apply(&self, model: &VcgModel, rng: &mut SampleRng) -> SynthEcgResult<VcgModel> {
        let percent = self.percent_widened.draw(rng);
        let scaledown = self.scale.draw(rng);
        widen_qrs(model, percent, scaledown)
    }
}

/// Multiply a fixed kernel group's amplitudes by a sampled factor.
#[derive(Debug, Clone)]
pub struct KernelScaling {
    name: &'static str,
    indices: &'static [usize],
    scale: RangeSampler,
}

impl KernelScaling {
    fn with_indices(
        name: &'static str,
        indices: &'static [usize],
        scale: &SampleRange,
    ) -> SynthEcgResult<Self> {
        Ok(Self {
            name,
            indices,
            scale: RangeSampler::new(&format!("{name}.scale"), scale, Sampling::Integer)?,
        })
    }

    pub fn qrs_amplitude(scale: &SampleRange) -> SynthEcgResult<Self> {
        Self::with_indices("QRS Amplitude", QRS_KERNELS, scale)
    }

    pub fn p_wave_amplitude(scale: &SampleRange) -> SynthEcgResult<Self> {
        Self::with_indices("P Wave Amplitude", P_WAVE_KERNELS, scale)
    }

    pub fn t_wave_amplitude(scale: &SampleRange) -> SynthEcgResult<Self> {
        Self::with_indices("T Wave Amplitude", T_WAVE_KERNELS, scale)
    }

    pub fn st_change(scale: &SampleRange) -> SynthEcgResult<Self> {
        Self::with_indices("ST Change", ST_KERNELS, scale)
    }

    pub fn indices(&self) -> &'static [usize] {
        self.indices
    }
}

impl Perturbation for KernelScaling {
    fn name(&self) -> &'static str {
        self.name
    }

    fn apply(&self, model: &VcgModel, rng: &mut SampleRng) -> SynthEcgResult<VcgModel> {
        scale_alpha(model, self.indices, self.scale.draw(rng))
    }
}

/// Zero-mean Gaussian noise on every kernel parameter.
#[derive(Debug, Clone)]
pub struct ParameterJitter {
    scale: RangeSampler,
}

impl ParameterJitter {
    pub fn new(scale: &SampleRange) -> SynthEcgResult<Self> {
        let scale = RangeSampler::new("Modify Parameters.scale", scale, Sampling::Continuous)?;
        if scale.min() < 0.0 {
            return Err(SynthEcgError::InvalidParameter(format!(
                "Modify Parameters.scale is a standard deviation, got min {}",
                scale.min()
            )));
        }
        Ok(Self { scale })
    }
}

impl Perturbation for ParameterJitter {
    fn name(&self) -> &'static str {
        "Modify Parameters"
    }

    fn apply(&self, model: &VcgModel, rng: &mut SampleRng) -> SynthEcgResult<VcgModel> {
        let std = self.scale.draw(rng);
        let noise = Normal::new(0.0, std)
            .map_err(|e| SynthEcgError::InvalidParameter(format!("jitter scale {std}: {e}")))?;
        let mut out = model.clone();
        // Draw order: all alphas, then widths, then centres.
        for axis in Axis::ALL {
            for a in out.axis_mut(axis).alpha_mut() {
                *a += noise.sample(rng);
            }
        }
        for axis in Axis::ALL {
            for b in out.axis_mut(axis).b_mut() {
                *b += noise.sample(rng);
            }
        }
        for axis in Axis::ALL {
            for th in out.axis_mut(axis).theta_mut() {
                *th += noise.sample(rng);
            }
        }
        Ok(out)
    }
}

/// Operator kept for configuration compatibility with no effect:
/// returns an unchanged copy and draws nothing.
#[derive(Debug, Clone)]
pub struct DisabledPerturbation {
    name: &'static str,
}

impl DisabledPerturbation {
    pub fn invert_t_waves() -> Self {
        Self {
            name: "Invert T Waves",
        }
    }

    pub fn st_elevation() -> Self {
        Self {
            name: "ST Elevation",
        }
    }

    pub fn st_depression() -> Self {
        Self {
            name: "ST Depression",
        }
    }
}

impl Perturbation for DisabledPerturbation {
    fn name(&self) -> &'static str {
        self.name
    }

    fn apply(&self, model: &VcgModel, _rng: &mut SampleRng) -> SynthEcgResult<VcgModel> {
        Ok(model.clone())
    }

    fn is_implemented(&self) -> bool {
        false
    }
}

/// Build the operator a config entry describes.
pub fn build_operator(kind: &PerturbationKind) -> SynthEcgResult<Box<dyn Perturbation>> {
    let op: Box<dyn Perturbation> = match kind {
        PerturbationKind::HeartRate { bpm } => Box::new(HeartRateChange::new(bpm)?),
        PerturbationKind::QtElongation { ms_forward } => Box::new(QtElongation::new(ms_forward)?),
        PerturbationKind::WideQrs {
            percent_widened,
            scale,
        } => Box::new(WideQrs::new(percent_widened, scale)?),
        PerturbationKind::QrsAmplitude { scale } => Box::new(KernelScaling::qrs_amplitude(scale)?),
        PerturbationKind::PWaveAmplitude { scale } => {
            Box::new(KernelScaling::p_wave_amplitude(scale)?)
        }
        PerturbationKind::TWaveAmplitude { scale } => {
            Box::new(KernelScaling::t_wave_amplitude(scale)?)
        }
        PerturbationKind::StChange { scale } => Box::new(KernelScaling::st_change(scale)?),
        PerturbationKind::ModifyParameters { scale } => Box::new(ParameterJitter::new(scale)?),
        PerturbationKind::InvertTWaves { .. } => Box::new(DisabledPerturbation::invert_t_waves()),
        PerturbationKind::StElevation { .. } => Box::new(DisabledPerturbation::st_elevation()),
        PerturbationKind::StDepression { .. } => Box::new(DisabledPerturbation::st_depression()),
    };
    Ok(op)
}
