// ─────────────────────────────────────────────────────────────────────
// SynthECG — Perturbation Chain
// ─────────────────────────────────────────────────────────────────────
//! Ordered, left-to-right composition of gated operators.

use std::borrow::Cow;

use synth_ecg_physics::VcgModel;
use synth_ecg_types::{PerturbationConfig, SynthEcgError, SynthEcgResult};

use crate::operator::GatedPerturbation;
use crate::operators::build_operator;
use crate::sampling::SampleRng;

/// Result of running a chain over one model.
#[derive(Debug, Clone)]
pub struct Perturbed<'a> {
    /// Borrowed when no operator fired.
    pub model: Cow<'a, VcgModel>,
    /// Names of the operators that fired, in order.
    pub applied: Vec<&'static str>,
}

#[derive(Debug, Default)]
pub struct PerturbationChain {
    steps: Vec<GatedPerturbation>,
}

impl PerturbationChain {
    pub fn new(steps: Vec<GatedPerturbation>) -> Self {
        Self { steps }
    }

    /// Build from config entries, preserving their order.
    ///
    /// Operators without an effect are kept as no-ops with a warning, or
    /// rejected with `Unimplemented` when `strict` is set.
    pub fn from_configs(configs: &[PerturbationConfig], strict: bool) -> SynthEcgResult<Self> {
        let mut steps = Vec::with_capacity(configs.len());
        for config in configs {
            config.validate()?;
            let operator = build_operator(&config.kind)?;
            if !operator.is_implemented() {
                if strict {
                    return Err(SynthEcgError::Unimplemented(format!(
                        "{} has no defined effect",
                        operator.name()
                    )));
                }
                log::warn!(
                    "Perturbation '{}' is configured but has no effect; it returns the model unchanged",
                    operator.name()
                );
            }
            steps.push(GatedPerturbation::new(config.probability, operator)?);
        }
        Ok(Self { steps })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(GatedPerturbation::name).collect()
    }

    pub fn steps(&self) -> &[GatedPerturbation] {
        &self.steps
    }

    /// Feed `base` through every step; each step sees the previous output.
    pub fn apply<'a>(
        &self,
        base: &'a VcgModel,
        rng: &mut SampleRng,
    ) -> SynthEcgResult<Perturbed<'a>> {
        let mut model = Cow::Borrowed(base);
        let mut applied = Vec::new();
        for step in &self.steps {
            if let Some(next) = step.maybe_apply(&model, rng)? {
                model = Cow::Owned(next);
                applied.push(step.name());
            }
        }
        if !applied.is_empty() {
            log::debug!("Applied perturbations: {}", applied.join(", "));
        }
        Ok(Perturbed { model, applied })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::qt_shift;
    use crate::sampling::master_rng;
    use synth_ecg_physics::Axis;
    use synth_ecg_types::{PerturbationKind, SampleRange};

    fn hr(p: f64, bpm: f64) -> PerturbationConfig {
        PerturbationConfig::new(
            p,
            PerturbationKind::HeartRate {
                bpm: SampleRange::new(bpm, bpm + 1.0),
            },
        )
    }

    fn qt(p: f64, ms: f64) -> PerturbationConfig {
        PerturbationConfig::new(
            p,
            PerturbationKind::QtElongation {
                ms_forward: SampleRange::new(ms, ms + 1.0),
            },
        )
    }

    fn t_shift(base: &VcgModel, out: &VcgModel) -> f64 {
        out.axis(Axis::X).theta()[8] - base.axis(Axis::X).theta()[8]
    }

    #[test]
    fn test_empty_chain_borrows() {
        let chain = PerturbationChain::default();
        let base = VcgModel::new(60.0).unwrap();
        let out = chain.apply(&base, &mut master_rng(0)).unwrap();
        assert!(matches!(out.model, Cow::Borrowed(_)));
        assert!(out.applied.is_empty());
    }

    #[test]
    fn test_order_matters() {
        let base = VcgModel::new(60.0).unwrap();

        // Heart rate first: the QT shift is computed at 90 bpm.
        let chain = PerturbationChain::from_configs(&[hr(1.0, 90.0), qt(1.0, 100.0)], false).unwrap();
        let out = chain.apply(&base, &mut master_rng(1)).unwrap();
        let fast = VcgModel::new(90.0).unwrap();
        assert!((t_shift(&base, &out.model) - qt_shift(&fast, 100.0)).abs() < 1e-12);
        assert_eq!(out.applied, vec!["Heart Rate", "QT Elongation"]);

        // QT first: the shift is computed at the base 60 bpm.
        let chain = PerturbationChain::from_configs(&[qt(1.0, 100.0), hr(1.0, 90.0)], false).unwrap();
        let out = chain.apply(&base, &mut master_rng(1)).unwrap();
        assert!((t_shift(&base, &out.model) - qt_shift(&base, 100.0)).abs() < 1e-12);
        assert_eq!(out.model.heart_rate(), 90.0);
    }

    #[test]
    fn test_gated_off_steps_skipped() {
        let base = VcgModel::new(60.0).unwrap();
        let chain = PerturbationChain::from_configs(&[hr(0.0, 90.0), qt(1.0, 50.0)], false).unwrap();
        let out = chain.apply(&base, &mut master_rng(2)).unwrap();
        assert_eq!(out.applied, vec!["QT Elongation"]);
        assert_eq!(out.model.heart_rate(), 60.0);
    }

    #[test]
    fn test_base_untouched() {
        let base = VcgModel::new(70.0).unwrap();
        let snapshot = base.clone();
        let chain = PerturbationChain::from_configs(&[hr(1.0, 100.0), qt(1.0, 80.0)], false).unwrap();
        let _ = chain.apply(&base, &mut master_rng(3)).unwrap();
        assert_eq!(base, snapshot);
    }

    #[test]
    fn test_disabled_operator_strict_and_lenient() {
        let cfg = [PerturbationConfig::new(
            1.0,
            PerturbationKind::StElevation {
                percent_elevated: SampleRange::new(1.0, 5.0),
            },
        )];
        assert!(matches!(
            PerturbationChain::from_configs(&cfg, true),
            Err(SynthEcgError::Unimplemented(_))
        ));
        let chain = PerturbationChain::from_configs(&cfg, false).unwrap();
        let base = VcgModel::new(60.0).unwrap();
        let out = chain.apply(&base, &mut master_rng(4)).unwrap();
        assert_eq!(*out.model, base);
        assert_eq!(out.applied, vec!["ST Elevation"]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(PerturbationChain::from_configs(&[hr(1.5, 80.0)], false).is_err());
        let inverted = PerturbationConfig::new(
            0.5,
            PerturbationKind::QrsAmplitude {
                scale: SampleRange::new(3.0, 2.0),
            },
        );
        assert!(PerturbationChain::from_configs(&[inverted], false).is_err());
    }

    #[test]
    fn test_same_seed_same_result() {
        let base = VcgModel::new(60.0).unwrap();
        let cfg = [
            PerturbationConfig::new(
                0.5,
                PerturbationKind::ModifyParameters {
                    scale: SampleRange::new(0.001, 0.01),
                },
            ),
            qt(0.5, 30.0),
        ];
        let chain = PerturbationChain::from_configs(&cfg, false).unwrap();
        let a = chain.apply(&base, &mut master_rng(99)).unwrap();
        let b = chain.apply(&base, &mut master_rng(99)).unwrap();
        assert_eq!(a.model, b.model);
        assert_eq!(a.applied, b.applied);
    }
}
