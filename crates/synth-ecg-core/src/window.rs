// ─────────────────────────────────────────────────────────────────────
// SynthECG — Save Window
// ─────────────────────────────────────────────────────────────────────
//! Random sub-window selection over a generated trace.

use rand::Rng;

use synth_ecg_perturb::SampleRng;
use synth_ecg_types::{SynthEcgError, SynthEcgResult};

/// Uniform start offset in `[0, total - window]`, both ends included.
pub fn window_start(total: usize, window: usize, rng: &mut SampleRng) -> SynthEcgResult<usize> {
    if window == 0 || window > total {
        return Err(SynthEcgError::InvalidParameter(format!(
            "save window of {window} samples does not fit a trace of {total}"
        )));
    }
    Ok(rng.gen_range(0..=total - window))
}

/// `rows[start..start + window]`, checked.
pub fn cut_window<T>(rows: &[T], start: usize, window: usize) -> SynthEcgResult<&[T]> {
    rows.get(start..start + window).ok_or_else(|| {
        SynthEcgError::InvalidParameter(format!(
            "window [{start}, {}) outside trace of {}",
            start + window,
            rows.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_ecg_perturb::master_rng;

    #[test]
    fn test_full_window_starts_at_zero() {
        let mut rng = master_rng(1);
        for _ in 0..50 {
            assert_eq!(window_start(5120, 5120, &mut rng).unwrap(), 0);
        }
    }

    #[test]
    fn test_start_covers_inclusive_range() {
        let mut rng = master_rng(2);
        let mut seen = [false; 4];
        for _ in 0..400 {
            let s = window_start(10, 7, &mut rng).unwrap();
            assert!(s <= 3);
            seen[s] = true;
        }
        assert!(seen.iter().all(|&b| b), "offsets seen: {seen:?}");
    }

    #[test]
    fn test_oversized_window_rejected() {
        let mut rng = master_rng(3);
        assert!(window_start(10, 11, &mut rng).is_err());
        assert!(window_start(10, 0, &mut rng).is_err());
    }

    #[test]
    fn test_cut_window_length() {
        let rows: Vec<usize> = (0..20).collect();
        let w = cut_window(&rows, 5, 10).unwrap();
        assert_eq!(w.len(), 10);
        assert_eq!(w[0], 5);
        assert_eq!(w[9], 14);
        assert!(cut_window(&rows, 15, 10).is_err());
    }
}
