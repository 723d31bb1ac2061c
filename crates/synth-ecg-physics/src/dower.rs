// ─────────────────────────────────────────────────────────────────────
// SynthECG — Dower Lead Projection
// ─────────────────────────────────────────────────────────────────────
//! Linear map from the 3-D vectorcardiogram to the 12 standard leads,
//! plus optional rigid rotation of the heart axis before projection.

use synth_ecg_types::N_LEADS;

use crate::params::DOWER_MATRIX;

pub type Vcg = [f64; 3];
pub type Ecg = [f64; N_LEADS];
pub type Rotation = [[f64; 3]; 3];

/// Project one VCG sample onto the 12 leads.
#[inline]
pub fn project_point(v: &Vcg) -> Ecg {
    let mut out = [0.0; N_LEADS];
    for (lead, o) in out.iter_mut().enumerate() {
        *o = v[0] * DOWER_MATRIX[0][lead] + v[1] * DOWER_MATRIX[1][lead] + v[2] * DOWER_MATRIX[2][lead];
    }
    out
}

/// `(L, 3)` VCG → `(L, 12)` ECG. Empty in, empty out.
pub fn vcg_to_12lead(vcg: &[Vcg]) -> Vec<Ecg> {
    vcg.iter().map(project_point).collect()
}

/// Composite rotation `Rx · Ry · Rz` from angles in degrees.
pub fn rotation_matrix(rx_deg: f64, ry_deg: f64, rz_deg: f64) -> Rotation {
    let (sx, cx) = rx_deg.to_radians().sin_cos();
    let (sy, cy) = ry_deg.to_radians().sin_cos();
    let (sz, cz) = rz_deg.to_radians().sin_cos();

    let rx = [[1.0, 0.0, 0.0], [0.0, cx, -sx], [0.0, sx, cx]];
    let ry = [[cy, 0.0, sy], [0.0, 1.0, 0.0], [-sy, 0.0, cy]];
    let rz = [[cz, -sz, 0.0], [sz, cz, 0.0], [0.0, 0.0, 1.0]];

    matmul(&rx, &matmul(&ry, &rz))
}

fn matmul(a: &Rotation, b: &Rotation) -> Rotation {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

/// Rotate every sample by `r`.
pub fn rotate_vcg(vcg: &[Vcg], r: &Rotation) -> Vec<Vcg> {
    vcg.iter()
        .map(|v| {
            [
                r[0][0] * v[0] + r[0][1] * v[1] + r[0][2] * v[2],
                r[1][0] * v[0] + r[1][1] * v[1] + r[1][2] * v[2],
                r[2][0] * v[0] + r[2][1] * v[1] + r[2][2] * v[2],
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_maps_to_zero() {
        assert_eq!(project_point(&[0.0, 0.0, 0.0]), [0.0; N_LEADS]);
    }

    #[test]
    fn test_unit_axes_select_matrix_rows() {
        for axis in 0..3 {
            let mut v = [0.0; 3];
            v[axis] = 1.0;
            let ecg = project_point(&v);
            for lead in 0..N_LEADS {
                assert!((ecg[lead] - DOWER_MATRIX[axis][lead]).abs() < 1e-15);
            }
        }
    }

    #[test]
    fn test_projection_linear() {
        let a = [0.3, -0.1, 0.7];
        let b = [-1.2, 0.4, 0.05];
        let sum = [a[0] + 2.0 * b[0], a[1] + 2.0 * b[1], a[2] + 2.0 * b[2]];
        let (pa, pb, ps) = (project_point(&a), project_point(&b), project_point(&sum));
        for l in 0..N_LEADS {
            assert!((ps[l] - (pa[l] + 2.0 * pb[l])).abs() < 1e-12);
        }
    }

    #[test]
    fn test_shape_and_empty() {
        assert!(vcg_to_12lead(&[]).is_empty());
        let vcg = vec![[0.1, 0.2, 0.3]; 7];
        let ecg = vcg_to_12lead(&vcg);
        assert_eq!(ecg.len(), 7);
        assert_eq!(ecg[3], project_point(&vcg[3]));
    }

    #[test]
    fn test_identity_rotation() {
        let r = rotation_matrix(0.0, 0.0, 0.0);
        let vcg = vec![[0.4, -0.2, 1.3]];
        let out = rotate_vcg(&vcg, &r);
        for a in 0..3 {
            assert!((out[0][a] - vcg[0][a]).abs() < 1e-15);
        }
    }

    #[test]
    fn test_quarter_turn_about_z() {
        let r = rotation_matrix(0.0, 0.0, 90.0);
        let out = rotate_vcg(&[[1.0, 0.0, 0.0]], &r);
        assert!(out[0][0].abs() < 1e-12);
        assert!((out[0][1] - 1.0).abs() < 1e-12);
        assert!(out[0][2].abs() < 1e-12);
    }

    #[test]
    fn test_rotation_preserves_norm() {
        let r = rotation_matrix(17.0, -42.0, 133.0);
        let v = [0.3, -0.8, 0.5];
        let out = rotate_vcg(&[v], &r)[0];
        let n0: f64 = v.iter().map(|x| x * x).sum();
        let n1: f64 = out.iter().map(|x| x * x).sum();
        assert!((n0 - n1).abs() < 1e-12);
    }
}
