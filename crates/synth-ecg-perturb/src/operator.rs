// ─────────────────────────────────────────────────────────────────────
// SynthECG — Perturbation Interface
// ─────────────────────────────────────────────────────────────────────
//! Operator trait and the probability gate shared by every operator.

use std::fmt;

use rand::Rng;

use synth_ecg_physics::VcgModel;
use synth_ecg_types::{SynthEcgError, SynthEcgResult};

use crate::sampling::SampleRng;

/// A parameter mutation over a [`VcgModel`].
///
/// `apply` never touches its input: it returns a modified copy.
pub trait Perturbation: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn apply(&self, model: &VcgModel, rng: &mut SampleRng) -> SynthEcgResult<VcgModel>;

    /// `false` for operators kept as documented no-ops.
    fn is_implemented(&self) -> bool {
        true
    }
}

/// An operator behind a trigger probability.
#[derive(Debug)]
pub struct GatedPerturbation {
    probability: f64,
    operator: Box<dyn Perturbation>,
}

impl GatedPerturbation {
    pub fn new(probability: f64, operator: Box<dyn Perturbation>) -> SynthEcgResult<Self> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(SynthEcgError::InvalidParameter(format!(
                "{}: probability must be in [0, 1], got {probability}",
                operator.name()
            )));
        }
        Ok(Self {
            probability,
            operator,
        })
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn name(&self) -> &'static str {
        self.operator.name()
    }

    pub fn operator(&self) -> &dyn Perturbation {
        self.operator.as_ref()
    }

    /// Roll the gate once, then apply the operator if it fired.
    ///
    /// `Ok(None)` means pass-through: the input is left as is and no copy
    /// is made.
    pub fn maybe_apply(
        &self,
        model: &VcgModel,
        rng: &mut SampleRng,
    ) -> SynthEcgResult<Option<VcgModel>> {
        if rng.gen::<f64>() < self.probability {
            self.operator.apply(model, rng).map(Some)
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::master_rng;
    use synth_ecg_physics::Axis;

    #[derive(Debug)]
    struct Bump;

    impl Perturbation for Bump {
        fn name(&self) -> &'static str {
            "Bump"
        }

        fn apply(&self, model: &VcgModel, _rng: &mut SampleRng) -> SynthEcgResult<VcgModel> {
            let mut out = model.clone();
            out.axis_mut(Axis::X).alpha_mut()[0] += 1.0;
            Ok(out)
        }
    }

    fn fire_count(p: f64, trials: usize) -> usize {
        let gate = GatedPerturbation::new(p, Box::new(Bump)).unwrap();
        let model = VcgModel::new(60.0).unwrap();
        let mut rng = master_rng(2024);
        (0..trials)
            .filter(|_| gate.maybe_apply(&model, &mut rng).unwrap().is_some())
            .count()
    }

    #[test]
    fn test_probability_zero_never_fires() {
        assert_eq!(fire_count(0.0, 2000), 0);
    }

    #[test]
    fn test_probability_one_always_fires() {
        assert_eq!(fire_count(1.0, 2000), 2000);
    }

    #[test]
    fn test_probability_half_fires_about_half() {
        let n = fire_count(0.5, 4000);
        assert!((1700..2300).contains(&n), "fired {n} of 4000");
    }

    #[test]
    fn test_out_of_range_probability_rejected() {
        assert!(GatedPerturbation::new(1.5, Box::new(Bump)).is_err());
        assert!(GatedPerturbation::new(-0.1, Box::new(Bump)).is_err());
    }

    #[test]
    fn test_fired_gate_leaves_input_untouched() {
        let gate = GatedPerturbation::new(1.0, Box::new(Bump)).unwrap();
        let model = VcgModel::new(60.0).unwrap();
        let before = model.clone();
        let out = gate
            .maybe_apply(&model, &mut master_rng(1))
            .unwrap()
            .unwrap();
        assert_eq!(model, before);
        assert!((out.axis(Axis::X).alpha()[0] - before.axis(Axis::X).alpha()[0] - 1.0).abs() < 1e-12);
    }
}
