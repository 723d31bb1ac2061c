// ─────────────────────────────────────────────────────────────────────
// SynthECG — VCG Dynamical Model
// ─────────────────────────────────────────────────────────────────────
//! Phase-driven Gaussian-kernel model of the cardiac dipole:
//!
//!   dθ/dt = ω
//!   dA/dt = -Σ_i (ω α_i / b_i²) Δθ_i exp(-Δθ_i² / 2b_i²),   A ∈ {x, y, z}
//!   Δθ_i  = ((θ - θ_i + π) mod 2π) - π
//!
//! One phase θ drives all three axes, so P/QRS/T stay phase-locked while
//! each axis keeps its own kernel set.

use std::f64::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

use synth_ecg_types::{SynthEcgError, SynthEcgResult};

use crate::integrator::{Dynamics, State};
use crate::params::{ALPHA_X, ALPHA_Y, ALPHA_Z, B_X, B_Y, B_Z, THETA_X, THETA_Y, THETA_Z};

/// Spatial axis of the vector-cardiogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Position in the `[x, y, z]` trajectory row.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

/// Wrapped phase distance of `phase` from `centre`, in `[-π, π)`.
#[inline]
pub fn phase_offset(phase: f64, centre: f64) -> f64 {
    (phase - centre + PI).rem_euclid(TAU) - PI
}

/// Kernel parameters of one axis.
///
/// `theta[i]`, `alpha[i]` and `b[i]` describe the same kernel; the three
/// sequences always have equal length. Entries can be edited in place
/// through the `*_mut` slices, but never added, removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisKernels {
    theta: Vec<f64>,
    alpha: Vec<f64>,
    b: Vec<f64>,
}

impl AxisKernels {
    pub fn new(theta: Vec<f64>, alpha: Vec<f64>, b: Vec<f64>) -> SynthEcgResult<Self> {
        let kernels = Self { theta, alpha, b };
        kernels.check("custom")?;
        Ok(kernels)
    }

    fn from_template(theta: &[f64], alpha: &[f64], b: &[f64]) -> Self {
        Self {
            theta: theta.to_vec(),
            alpha: alpha.to_vec(),
            b: b.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.theta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.theta.is_empty()
    }

    pub fn theta(&self) -> &[f64] {
        &self.theta
    }

    pub fn alpha(&self) -> &[f64] {
        &self.alpha
    }

    pub fn b(&self) -> &[f64] {
        &self.b
    }

    pub fn theta_mut(&mut self) -> &mut [f64] {
        &mut self.theta
    }

    pub fn alpha_mut(&mut self) -> &mut [f64] {
        &mut self.alpha
    }

    pub fn b_mut(&mut self) -> &mut [f64] {
        &mut self.b
    }

    fn check(&self, axis: &str) -> SynthEcgResult<()> {
        if self.alpha.len() != self.theta.len() || self.b.len() != self.theta.len() {
            return Err(SynthEcgError::InvalidParameter(format!(
                "axis {axis}: theta/alpha/b lengths differ ({}/{}/{})",
                self.theta.len(),
                self.alpha.len(),
                self.b.len()
            )));
        }
        if self.theta.is_empty() {
            return Err(SynthEcgError::InvalidParameter(format!(
                "axis {axis}: needs at least one kernel"
            )));
        }
        let all = self.theta.iter().chain(&self.alpha).chain(&self.b);
        if let Some(v) = all.copied().find(|v| !v.is_finite()) {
            return Err(SynthEcgError::InvalidParameter(format!(
                "axis {axis}: non-finite kernel parameter {v}"
            )));
        }
        if let Some(i) = self.b.iter().position(|&b| b == 0.0) {
            return Err(SynthEcgError::InvalidParameter(format!(
                "axis {axis}: kernel {i} has zero width"
            )));
        }
        Ok(())
    }

    /// Contribution of kernel `i` to the axis velocity at `phase`.
    #[inline]
    pub fn kernel_term(&self, i: usize, phase: f64, w: f64) -> f64 {
        let b2 = self.b[i] * self.b[i];
        let dth = phase_offset(phase, self.theta[i]);
        -(w * self.alpha[i] / b2) * dth * (-(dth * dth) / (2.0 * b2)).exp()
    }

    /// Axis velocity: sum of all kernel terms.
    #[inline]
    pub fn velocity(&self, phase: f64, w: f64) -> f64 {
        (0..self.len()).map(|i| self.kernel_term(i, phase, w)).sum()
    }
}

/// Serialised form: derived frequencies are recomputed on load.
#[derive(Serialize, Deserialize)]
struct VcgModelRepr {
    heart_rate: f64,
    x: AxisKernels,
    y: AxisKernels,
    z: AxisKernels,
}

/// Parameters of one patient/beat archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "VcgModelRepr", into = "VcgModelRepr")]
pub struct VcgModel {
    heart_rate: f64,
    /// Rotational frequency f = HR / 60 (Hz).
    f: f64,
    /// Angular frequency ω = 2π f (rad/s).
    w: f64,
    x: AxisKernels,
    y: AxisKernels,
    z: AxisKernels,
}

impl VcgModel {
    /// Model with the canonical kernels, copied from the templates.
    pub fn new(heart_rate: f64) -> SynthEcgResult<Self> {
        Self::with_kernels(
            heart_rate,
            AxisKernels::from_template(&THETA_X, &ALPHA_X, &B_X),
            AxisKernels::from_template(&THETA_Y, &ALPHA_Y, &B_Y),
            AxisKernels::from_template(&THETA_Z, &ALPHA_Z, &B_Z),
        )
    }

    /// Model with explicit kernels.
    pub fn with_kernels(
        heart_rate: f64,
        x: AxisKernels,
        y: AxisKernels,
        z: AxisKernels,
    ) -> SynthEcgResult<Self> {
        check_heart_rate(heart_rate)?;
        let model = Self {
            heart_rate,
            f: 0.0,
            w: 0.0,
            x,
            y,
            z,
        }
        .with_frequencies();
        model.validate()?;
        Ok(model)
    }

    fn with_frequencies(mut self) -> Self {
        self.f = self.heart_rate / 60.0;
        self.w = 2.0 * PI * self.f;
        self
    }

    /// Change the heart rate and recompute `f` and `ω`. Kernels are untouched.
    pub fn set_heart_rate(&mut self, heart_rate: f64) -> SynthEcgResult<()> {
        check_heart_rate(heart_rate)?;
        self.heart_rate = heart_rate;
        self.f = heart_rate / 60.0;
        self.w = 2.0 * PI * self.f;
        Ok(())
    }

    pub fn heart_rate(&self) -> f64 {
        self.heart_rate
    }

    pub fn rotational_frequency(&self) -> f64 {
        self.f
    }

    pub fn angular_frequency(&self) -> f64 {
        self.w
    }

    /// One cardiac cycle in seconds (1 / f).
    pub fn beat_duration(&self) -> f64 {
        1.0 / self.f
    }

    pub fn axis(&self, axis: Axis) -> &AxisKernels {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }

    pub fn axis_mut(&mut self, axis: Axis) -> &mut AxisKernels {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Z => &mut self.z,
        }
    }

    /// Check every axis: equal lengths, finite values, nonzero widths.
    pub fn validate(&self) -> SynthEcgResult<()> {
        check_heart_rate(self.heart_rate)?;
        for axis in Axis::ALL {
            self.axis(axis).check(axis.name())?;
        }
        Ok(())
    }

    /// State derivative `[dθ/dt, dx/dt, dy/dt, dz/dt]` at state `v`.
    ///
    /// θ is not wrapped in the state; wrapping happens per kernel.
    #[inline]
    pub fn derivative(&self, _t: f64, v: &State) -> State {
        let theta = v[0];
        [
            self.w,
            self.x.velocity(theta, self.w),
            self.y.velocity(theta, self.w),
            self.z.velocity(theta, self.w),
        ]
    }
}

fn check_heart_rate(heart_rate: f64) -> SynthEcgResult<()> {
    if heart_rate > 0.0 && heart_rate.is_finite() {
        Ok(())
    } else {
        Err(SynthEcgError::InvalidParameter(format!(
            "heart rate must be > 0 bpm, got {heart_rate}"
        )))
    }
}

impl TryFrom<VcgModelRepr> for VcgModel {
    type Error = SynthEcgError;

    fn try_from(repr: VcgModelRepr) -> Result<Self, Self::Error> {
        Self::with_kernels(repr.heart_rate, repr.x, repr.y, repr.z)
    }
}

impl From<VcgModel> for VcgModelRepr {
    fn from(model: VcgModel) -> Self {
        Self {
            heart_rate: model.heart_rate,
            x: model.x,
            y: model.y,
            z: model.z,
        }
    }
}

impl Dynamics for VcgModel {
    fn derivative(&self, t: f64, state: &State) -> State {
        VcgModel::derivative(self, t, state)
    }

    fn validate(&self) -> SynthEcgResult<()> {
        VcgModel::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{N_KERNELS_X, N_KERNELS_Y, N_KERNELS_Z};

    #[test]
    fn test_default_lengths() {
        let m = VcgModel::new(60.0).unwrap();
        assert_eq!(m.axis(Axis::X).len(), N_KERNELS_X);
        assert_eq!(m.axis(Axis::Y).len(), N_KERNELS_Y);
        assert_eq!(m.axis(Axis::Z).len(), N_KERNELS_Z);
    }

    #[test]
    fn test_set_heart_rate_frequencies() {
        let mut m = VcgModel::new(60.0).unwrap();
        for hr in [1.0, 37.5, 60.0, 72.0, 133.3, 240.0] {
            m.set_heart_rate(hr).unwrap();
            let f = hr / 60.0;
            assert_eq!(m.heart_rate(), hr);
            assert_eq!(m.rotational_frequency(), f);
            assert_eq!(m.angular_frequency(), 2.0 * PI * f);
        }
    }

    #[test]
    fn test_set_heart_rate_keeps_kernels() {
        let mut m = VcgModel::new(60.0).unwrap();
        let before = m.axis(Axis::Z).clone();
        m.set_heart_rate(90.0).unwrap();
        assert_eq!(m.axis(Axis::Z), &before);
    }

    #[test]
    fn test_invalid_heart_rate_rejected() {
        assert!(VcgModel::new(0.0).is_err());
        assert!(VcgModel::new(-10.0).is_err());
        assert!(VcgModel::new(f64::NAN).is_err());
        let mut m = VcgModel::new(60.0).unwrap();
        assert!(m.set_heart_rate(0.0).is_err());
        assert_eq!(m.heart_rate(), 60.0);
    }

    #[test]
    fn test_zero_width_rejected() {
        let k = AxisKernels::new(vec![0.0, 1.0], vec![0.5, 0.5], vec![0.1, 0.0]);
        assert!(matches!(k, Err(SynthEcgError::InvalidParameter(_))));

        let mut m = VcgModel::new(60.0).unwrap();
        m.axis_mut(Axis::Y).b_mut()[2] = 0.0;
        assert!(m.validate().is_err());
    }

    #[test]
    fn test_ragged_axis_rejected() {
        let k = AxisKernels::new(vec![0.0, 1.0], vec![0.5], vec![0.1, 0.2]);
        assert!(k.is_err());
        assert!(AxisKernels::new(vec![], vec![], vec![]).is_err());
    }

    #[test]
    fn test_phase_drift_is_w() {
        let m = VcgModel::new(75.0).unwrap();
        let d = m.derivative(0.0, &[1.234, -0.1, 0.2, 0.3]);
        assert_eq!(d[0], m.angular_frequency());
    }

    #[test]
    fn test_kernel_centre_contributes_zero() {
        let m = VcgModel::new(60.0).unwrap();
        let w = m.angular_frequency();
        for axis in Axis::ALL {
            let k = m.axis(axis);
            for i in 0..k.len() {
                let term = k.kernel_term(i, k.theta()[i], w);
                assert!(term.abs() < 1e-12, "{axis:?}[{i}] term = {term}");
            }
        }
    }

    #[test]
    fn test_single_kernel_restoring_sign() {
        // Positive alpha: velocity is negative just past the centre and
        // positive just before it.
        let k = AxisKernels::new(vec![0.5], vec![1.0], vec![0.1]).unwrap();
        assert!(k.velocity(0.55, 1.0) < 0.0);
        assert!(k.velocity(0.45, 1.0) > 0.0);
    }

    #[test]
    fn test_single_kernel_term_value() {
        let k = AxisKernels::new(vec![0.5], vec![1.0], vec![0.1]).unwrap();
        let expected = -(TAU / 0.01) * 0.1 * (-0.5f64).exp();
        let got = k.kernel_term(0, 0.6, TAU);
        assert!((got - expected).abs() < 1e-9 * expected.abs(), "{got} vs {expected}");
        assert!((expected + 38.109_445_294_603_6).abs() < 1e-9);
    }

    #[test]
    fn test_derivative_matches_reference_rows() {
        // Canonical kernels at 60 bpm.
        let m = VcgModel::new(60.0).unwrap();
        let rows: [(f64, [f64; 3]); 2] = [
            (0.03, [-59.178_323_192_675_435, -71.396_472_187_696_3, 29.552_184_323_223_898]),
            (1.3, [4.244_796_855_333_65, 0.679_307_586_513_398_1, -5.625_025_883_937_792]),
        ];
        for (theta, expected) in rows {
            let d = m.derivative(0.0, &[theta, 0.0, 0.0, 0.0]);
            assert_eq!(d[0], TAU);
            for a in 0..3 {
                let tol = 1e-9 * expected[a].abs().max(1.0);
                assert!(
                    (d[a + 1] - expected[a]).abs() < tol,
                    "theta={theta} axis={a}: {} vs {}",
                    d[a + 1],
                    expected[a]
                );
            }
        }
    }

    #[test]
    fn test_velocity_scales_with_heart_rate() {
        let slow = VcgModel::new(60.0).unwrap();
        let fast = VcgModel::new(90.0).unwrap();
        let state = [0.4, 0.0, 0.0, 0.0];
        let (ds, df) = (slow.derivative(0.0, &state), fast.derivative(0.0, &state));
        for a in 1..4 {
            assert!((df[a] - 1.5 * ds[a]).abs() < 1e-9 * ds[a].abs().max(1.0));
        }
    }

    #[test]
    fn test_derivative_periodic_in_phase() {
        let m = VcgModel::new(72.0).unwrap();
        for &theta in &[-2.0, -0.07, 0.0, 0.33, 1.42, 3.0] {
            let base = m.derivative(0.0, &[theta, 0.0, 0.0, 0.0]);
            for k in [-3i32, -1, 1, 2, 7] {
                let shifted = theta + TAU * f64::from(k);
                let d = m.derivative(0.0, &[shifted, 0.0, 0.0, 0.0]);
                for a in 1..4 {
                    let tol = 1e-7 * base[a].abs().max(1.0);
                    assert!(
                        (d[a] - base[a]).abs() < tol,
                        "theta={theta} k={k} axis={a}: {} vs {}",
                        d[a],
                        base[a]
                    );
                }
            }
        }
    }

    #[test]
    fn test_phase_offset_range() {
        for i in -100..100 {
            let phase = f64::from(i) * 0.37;
            let d = phase_offset(phase, 0.2);
            assert!((-PI..=PI).contains(&d), "offset {d}");
        }
        assert!(phase_offset(1.0, 1.0).abs() < 1e-15);
    }

    #[test]
    fn test_clone_does_not_alias() {
        let a = VcgModel::new(60.0).unwrap();
        let mut b = a.clone();
        b.axis_mut(Axis::X).alpha_mut()[4] *= 3.0;
        assert_eq!(a.axis(Axis::X).alpha()[4], ALPHA_X[4]);
        let c = VcgModel::new(60.0).unwrap();
        assert_eq!(c.axis(Axis::X).alpha()[4], ALPHA_X[4]);
    }

    #[test]
    fn test_serde_recomputes_frequencies() {
        let m = VcgModel::new(90.0).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        let back: VcgModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
        assert_eq!(back.rotational_frequency(), 1.5);
    }
}
