// ─────────────────────────────────────────────────────────────────────
// SynthECG — Canonical Parameters
// ─────────────────────────────────────────────────────────────────────
//! Canonical Gaussian-kernel parameters of the reference VCG beat and the
//! Dower transform to the 12 standard leads.
//!
//! Kernel index order per axis follows the P, Q, R, S, T sub-waves. The
//! tables are immutable templates: every model copies them on
//! construction, so mutating one model never leaks into another.
//!
//! Dower coefficients: Dower et al., Clin. Cardiol. 3(2), 87 (1980).

use synth_ecg_types::N_LEADS;

pub const N_KERNELS_X: usize = 11;
pub const N_KERNELS_Y: usize = 9;
pub const N_KERNELS_Z: usize = 10;

/// Phase centres (rad).
pub const THETA_X: [f64; N_KERNELS_X] = [
    -1.09, -0.83, -0.19, -0.07, 0.00, 0.06, 0.22, 1.20, 1.42, 1.68, 2.90,
];
pub const THETA_Y: [f64; N_KERNELS_Y] = [-1.10, -0.90, -0.76, -0.11, -0.01, 0.07, 0.80, 1.58, 2.90];
pub const THETA_Z: [f64; N_KERNELS_Z] = [
    -1.10, -0.93, -0.70, -0.40, -0.15, 0.10, 1.05, 1.25, 1.55, 2.80,
];

/// Kernel amplitudes.
pub const ALPHA_X: [f64; N_KERNELS_X] = [
    0.03, 0.08, -0.13, 0.85, 1.11, 0.75, 0.06, 0.10, 0.17, 0.39, 0.03,
];
pub const ALPHA_Y: [f64; N_KERNELS_Y] = [0.04, 0.02, -0.0, 0.32, 0.51, -0.32, 0.04, 0.08, 0.01];
pub const ALPHA_Z: [f64; N_KERNELS_Z] = [
    -0.03, -0.14, -0.04, 0.05, -0.40, 0.46, -0.12, -0.20, -0.35, -0.04,
];

/// Kernel widths (rad). Never zero.
pub const B_X: [f64; N_KERNELS_X] = [
    0.09, 0.11, 0.05, 0.04, 0.03, 0.03, 0.24, 0.60, 0.30, 0.18, 0.50,
];
pub const B_Y: [f64; N_KERNELS_Y] = [0.07, 0.07, 0.04, 0.06, 0.04, 0.06, 0.45, 0.30, 0.50];
pub const B_Z: [f64; N_KERNELS_Z] = [
    0.03, 0.12, 0.04, 0.40, 0.05, 0.05, 0.80, 0.40, 0.20, 0.40,
];

/// Default integration state `[theta, x, y, z]`.
pub const DEFAULT_INITIAL_STATE: [f64; 4] = [0.0, 0.3, 0.3, 0.3];

/// 3×12 Dower matrix: row `r` holds the weight of VCG axis `r` (x, y, z)
/// in each lead `[I, II, III, aVR, aVL, aVF, V1..V6]`.
pub const DOWER_MATRIX: [[f64; N_LEADS]; 3] = [
    [
        0.632, 0.235, -0.397, -0.434, 0.515, -0.081, -0.515, 0.044, 0.882, 1.213, 1.125, 0.831,
    ],
    [
        -0.235, 1.066, 1.301, -0.415, -0.768, 1.184, 0.157, 0.164, 0.098, 0.127, 0.127, 0.076,
    ],
    [
        0.059, -0.132, -0.191, 0.037, 0.125, -0.162, -0.917, -1.387, -1.277, -0.601, -0.086,
        0.230,
    ],
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_lengths_match() {
        assert_eq!(THETA_X.len(), ALPHA_X.len());
        assert_eq!(THETA_X.len(), B_X.len());
        assert_eq!(THETA_Y.len(), ALPHA_Y.len());
        assert_eq!(THETA_Y.len(), B_Y.len());
        assert_eq!(THETA_Z.len(), ALPHA_Z.len());
        assert_eq!(THETA_Z.len(), B_Z.len());
    }

    #[test]
    fn test_widths_nonzero() {
        for &b in B_X.iter().chain(B_Y.iter()).chain(B_Z.iter()) {
            assert!(b > 0.0, "b = {b} must be nonzero");
        }
    }

    #[test]
    fn test_phase_centres_within_one_turn() {
        for &th in THETA_X.iter().chain(THETA_Y.iter()).chain(THETA_Z.iter()) {
            assert!(th.abs() < std::f64::consts::PI, "theta = {th}");
        }
    }

    #[test]
    fn test_phase_centres_ordered() {
        for axis in [&THETA_X[..], &THETA_Y[..], &THETA_Z[..]] {
            assert!(axis.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_dower_limb_leads_einthoven() {
        // III = II - I holds for the limb rows within rounding of the table.
        for row in &DOWER_MATRIX {
            assert!((row[2] - (row[1] - row[0])).abs() < 2e-3, "row = {row:?}");
        }
    }
}
