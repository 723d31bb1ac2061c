// ─────────────────────────────────────────────────────────────────────
// SynthECG — Array Persistence
// ─────────────────────────────────────────────────────────────────────
//! `ecgs.npy`: one `(n_samples, n_rows, n_leads)` float64 array.

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{Array2, Array3, Axis};
use ndarray_npy::{read_npy, write_npy};

use synth_ecg_types::{SynthEcgError, SynthEcgResult};

pub const ECGS_FILE: &str = "ecgs.npy";

/// Stack `ecgs` and write them to `dir/ecgs.npy`, creating `dir` if needed.
///
/// `shape` is the `(rows, leads)` every sample must have; it also fixes the
/// trailing dimensions when `ecgs` is empty.
pub fn save_ecgs(dir: &Path, ecgs: &[&Array2<f64>], shape: (usize, usize)) -> SynthEcgResult<PathBuf> {
    let (rows, leads) = shape;
    let mut stacked = Array3::<f64>::zeros((ecgs.len(), rows, leads));
    for (i, ecg) in ecgs.iter().enumerate() {
        if ecg.dim() != shape {
            return Err(SynthEcgError::Storage(format!(
                "sample {i} has shape {:?}, expected {shape:?}",
                ecg.dim()
            )));
        }
        stacked.index_axis_mut(Axis(0), i).assign(*ecg);
    }

    fs::create_dir_all(dir)?;
    let path = dir.join(ECGS_FILE);
    write_npy(&path, &stacked)
        .map_err(|e| SynthEcgError::Storage(format!("writing {}: {e}", path.display())))?;
    log::info!(
        "Saved {} ECGs of shape ({rows}, {leads}) to {}",
        ecgs.len(),
        path.display()
    );
    Ok(path)
}

/// Read an array written by [`save_ecgs`].
pub fn load_ecgs(path: impl AsRef<Path>) -> SynthEcgResult<Array3<f64>> {
    let path = path.as_ref();
    read_npy(path).map_err(|e| SynthEcgError::Storage(format!("reading {}: {e}", path.display())))
}
