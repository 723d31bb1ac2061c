// ─────────────────────────────────────────────────────────────────────
// SynthECG — VCG Physics Engine
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! VCG physics: Gaussian-kernel dynamical model, adaptive Dormand–Prince
//! integrator, and Dower projection to the 12-lead ECG.

pub mod dower;
pub mod integrator;
pub mod params;
pub mod vcg;

pub use dower::{project_point, rotate_vcg, rotation_matrix, vcg_to_12lead, Ecg, Rotation, Vcg};
pub use integrator::{Dynamics, Integrator, Solution, SolverStats, State, Trajectory};
pub use params::{DEFAULT_INITIAL_STATE, DOWER_MATRIX};
pub use vcg::{phase_offset, Axis, AxisKernels, VcgModel};
