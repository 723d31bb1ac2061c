// ─────────────────────────────────────────────────────────────────────
// SynthECG — Generator Configuration
// ─────────────────────────────────────────────────────────────────────

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{SynthEcgError, SynthEcgResult};
use crate::lead::{resolve_leads, LeadSelection};

/// Tolerance used when checking that `seconds * fs` lands on a whole sample.
pub const GRID_TOLERANCE: f64 = 1e-6;

/// How a value is drawn from a [`SampleRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sampling {
    /// Whole numbers in `[min, max)`.
    Integer,
    /// Uniform reals in `[min, max)`.
    Continuous,
}

/// A `{min, max}` interval a parameter is sampled from.
///
/// `sampling` is optional; when absent the consumer's default applies
/// (see [`PerturbationKind::default_sampling`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRange {
    pub min: f64,
    pub max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling: Option<Sampling>,
}

impl SampleRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            sampling: None,
        }
    }

    pub fn integer(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            sampling: Some(Sampling::Integer),
        }
    }

    pub fn continuous(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            sampling: Some(Sampling::Continuous),
        }
    }

    /// Sampling mode, falling back to `default` when unset.
    pub fn resolved_sampling(&self, default: Sampling) -> Sampling {
        self.sampling.unwrap_or(default)
    }

    /// Reject empty, inverted or non-finite ranges.
    pub fn validate(&self, name: &str, default: Sampling) -> SynthEcgResult<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(SynthEcgError::Config(format!(
                "{name}: range bounds must be finite, got [{}, {})",
                self.min, self.max
            )));
        }
        if self.min >= self.max {
            return Err(SynthEcgError::Config(format!(
                "{name}: min must be < max, got [{}, {})",
                self.min, self.max
            )));
        }
        if self.resolved_sampling(default) == Sampling::Integer
            && (self.min.fract() != 0.0 || self.max.fract() != 0.0)
        {
            return Err(SynthEcgError::Config(format!(
                "{name}: integer sampling needs whole-number bounds, got [{}, {})",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Operator-specific part of a perturbation entry, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PerturbationKind {
    /// Override the heart rate (bpm).
    HeartRate { bpm: SampleRange },
    /// Push the T-wave kernels later by `ms_forward` milliseconds.
    QtElongation { ms_forward: SampleRange },
    /// Widen QRS kernels by `percent_widened` and scale their amplitude by `scale`.
    WideQrs {
        percent_widened: SampleRange,
        scale: SampleRange,
    },
    QrsAmplitude { scale: SampleRange },
    PWaveAmplitude { scale: SampleRange },
    TWaveAmplitude { scale: SampleRange },
    StChange { scale: SampleRange },
    /// Gaussian jitter on every kernel parameter, std drawn from `scale`.
    ModifyParameters { scale: SampleRange },
    InvertTWaves {
        #[serde(default)]
        invert_prob: f64,
    },
    StElevation { percent_elevated: SampleRange },
    StDepression { percent_depressed: SampleRange },
}

impl PerturbationKind {
    pub fn name(&self) -> &'static str {
        match self {
            PerturbationKind::HeartRate { .. } => "Heart Rate",
            PerturbationKind::QtElongation { .. } => "QT Elongation",
            PerturbationKind::WideQrs { .. } => "Wide QRS",
            PerturbationKind::QrsAmplitude { .. } => "QRS Amplitude",
            PerturbationKind::PWaveAmplitude { .. } => "P Wave Amplitude",
            PerturbationKind::TWaveAmplitude { .. } => "T Wave Amplitude",
            PerturbationKind::StChange { .. } => "ST Change",
            PerturbationKind::ModifyParameters { .. } => "Modify Parameters",
            PerturbationKind::InvertTWaves { .. } => "Invert T Waves",
            PerturbationKind::StElevation { .. } => "ST Elevation",
            PerturbationKind::StDepression { .. } => "ST Depression",
        }
    }

    /// Sampling used for this operator's ranges when a range leaves it unset.
    ///
    /// Integer draws everywhere except the jitter scale, which is a
    /// standard deviation well below one.
    pub fn default_sampling(&self) -> Sampling {
        match self {
            PerturbationKind::ModifyParameters { .. } => Sampling::Continuous,
            _ => Sampling::Integer,
        }
    }

    /// Named ranges carried by this operator.
    pub fn ranges(&self) -> Vec<(&'static str, &SampleRange)> {
        match self {
            PerturbationKind::HeartRate { bpm } => vec![("bpm", bpm)],
            PerturbationKind::QtElongation { ms_forward } => vec![("ms_forward", ms_forward)],
            PerturbationKind::WideQrs {
                percent_widened,
                scale,
            } => vec![("percent_widened", percent_widened), ("scale", scale)],
            PerturbationKind::QrsAmplitude { scale }
            | PerturbationKind::PWaveAmplitude { scale }
            | PerturbationKind::TWaveAmplitude { scale }
            | PerturbationKind::StChange { scale }
            | PerturbationKind::ModifyParameters { scale } => vec![("scale", scale)],
            PerturbationKind::InvertTWaves { .. } => Vec::new(),
            PerturbationKind::StElevation { percent_elevated } => {
                vec![("percent_elevated", percent_elevated)]
            }
            PerturbationKind::StDepression { percent_depressed } => {
                vec![("percent_depressed", percent_depressed)]
            }
        }
    }

    /// Whether the operator changes the model when it fires.
    pub fn is_implemented(&self) -> bool {
        !matches!(
            self,
            PerturbationKind::InvertTWaves { .. }
                | PerturbationKind::StElevation { .. }
                | PerturbationKind::StDepression { .. }
        )
    }
}

/// One entry of the ordered perturbation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerturbationConfig {
    /// Trigger probability in `[0, 1]`.
    pub probability: f64,
    #[serde(flatten)]
    pub kind: PerturbationKind,
}

impl PerturbationConfig {
    pub fn new(probability: f64, kind: PerturbationKind) -> Self {
        Self { probability, kind }
    }

    pub fn validate(&self) -> SynthEcgResult<()> {
        let name = self.kind.name();
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(SynthEcgError::Config(format!(
                "{name}: probability must be in [0, 1], got {}",
                self.probability
            )));
        }
        if let PerturbationKind::InvertTWaves { invert_prob } = self.kind {
            if !(0.0..=1.0).contains(&invert_prob) {
                return Err(SynthEcgError::Config(format!(
                    "{name}: invert_prob must be in [0, 1], got {invert_prob}"
                )));
            }
        }
        let default = self.kind.default_sampling();
        for (field, range) in self.kind.ranges() {
            range.validate(&format!("{name}.{field}"), default)?;
        }
        Ok(())
    }
}

/// Settings of the adaptive ODE solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Relative tolerance.
    pub rtol: f64,
    /// Absolute tolerance.
    pub atol: f64,
    /// Largest step in seconds. `None` caps steps at one output interval
    /// so no kernel can be stepped over.
    pub max_step: Option<f64>,
    /// Hard limit on attempted steps before giving up.
    pub max_steps: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            max_step: None,
            max_steps: 1_000_000,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> SynthEcgResult<()> {
        if !(self.rtol > 0.0 && self.rtol.is_finite()) {
            return Err(SynthEcgError::Config(format!(
                "solver.rtol must be > 0, got {}",
                self.rtol
            )));
        }
        if !(self.atol > 0.0 && self.atol.is_finite()) {
            return Err(SynthEcgError::Config(format!(
                "solver.atol must be > 0, got {}",
                self.atol
            )));
        }
        if let Some(h) = self.max_step {
            if !(h > 0.0 && h.is_finite()) {
                return Err(SynthEcgError::Config(format!(
                    "solver.max_step must be > 0, got {h}"
                )));
            }
        }
        if self.max_steps == 0 {
            return Err(SynthEcgError::Config(
                "solver.max_steps must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Time grid of one generated sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleParams {
    /// Simulated span in seconds.
    pub duration: f64,
    /// Sample rate in Hz.
    pub frequency: f64,
    /// Span kept per sample, cut from a random offset.
    pub save_duration: f64,
    /// Optional lead subset; all twelve when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leads: Option<LeadSelection>,
}

impl Default for SampleParams {
    fn default() -> Self {
        Self {
            duration: 10.0,
            frequency: 512.0,
            save_duration: 10.0,
            leads: None,
        }
    }
}

impl SampleParams {
    /// Samples in the simulated span (`duration * fs`).
    pub fn n_simulated(&self) -> usize {
        (self.duration * self.frequency).round() as usize
    }

    /// Samples in the saved window (`save_duration * fs`).
    pub fn n_saved(&self) -> usize {
        (self.save_duration * self.frequency).round() as usize
    }

    pub fn validate(&self) -> SynthEcgResult<()> {
        if !(self.frequency > 0.0 && self.frequency.is_finite()) {
            return Err(SynthEcgError::Config(format!(
                "sample_params.frequency must be > 0, got {}",
                self.frequency
            )));
        }
        if !(self.duration > 0.0 && self.duration.is_finite()) {
            return Err(SynthEcgError::Config(format!(
                "sample_params.duration must be > 0, got {}",
                self.duration
            )));
        }
        if !(self.save_duration > 0.0 && self.save_duration <= self.duration) {
            return Err(SynthEcgError::Config(format!(
                "sample_params.save_duration must be in (0, duration={}], got {}",
                self.duration, self.save_duration
            )));
        }
        for (name, seconds) in [
            ("duration", self.duration),
            ("save_duration", self.save_duration),
        ] {
            let n = seconds * self.frequency;
            if (n - n.round()).abs() > GRID_TOLERANCE || n.round() < 1.0 {
                return Err(SynthEcgError::Config(format!(
                    "sample_params.{name} * frequency must be a whole number of samples, got {n}"
                )));
            }
        }
        resolve_leads(self.leads.as_ref())?;
        Ok(())
    }
}

/// Band-limited Gaussian noise added to every lead after projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Lower pass-band edge (Hz).
    pub f_min: f64,
    /// Upper pass-band edge (Hz).
    pub f_max: f64,
    /// Standard deviation of the added noise on each lead.
    pub amplitude: f64,
    /// Butterworth prototype order.
    #[serde(default = "NoiseConfig::default_order")]
    pub order: usize,
}

impl NoiseConfig {
    pub const DEFAULT_ORDER: usize = 10;

    fn default_order() -> usize {
        Self::DEFAULT_ORDER
    }

    pub fn new(f_min: f64, f_max: f64, amplitude: f64) -> Self {
        Self {
            f_min,
            f_max,
            amplitude,
            order: Self::DEFAULT_ORDER,
        }
    }

    /// Requires `0 < f_min < f_max < fs / 2`.
    pub fn validate(&self, fs: f64) -> SynthEcgResult<()> {
        let nyquist = fs / 2.0;
        if !(self.f_min > 0.0 && self.f_min < self.f_max && self.f_max < nyquist) {
            return Err(SynthEcgError::Config(format!(
                "noise band must satisfy 0 < f_min < f_max < {nyquist} Hz, got [{}, {}]",
                self.f_min, self.f_max
            )));
        }
        if !(self.amplitude >= 0.0 && self.amplitude.is_finite()) {
            return Err(SynthEcgError::Config(format!(
                "noise.amplitude must be >= 0, got {}",
                self.amplitude
            )));
        }
        if self.order == 0 {
            return Err(SynthEcgError::Config(
                "noise.order must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Heart-rate range, the ordered perturbation chain and optional noise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    /// Heart rate in bpm; integer draws unless the range says otherwise.
    pub heart_rate: SampleRange,
    /// Applied left to right before integration.
    pub perturbations: Vec<PerturbationConfig>,
    /// Added to the projected leads; none when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise: Option<NoiseConfig>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            heart_rate: SampleRange::new(60.0, 100.0),
            perturbations: Vec::new(),
            noise: None,
        }
    }
}

impl GenerationParams {
    pub fn validate(&self) -> SynthEcgResult<()> {
        self.heart_rate
            .validate("generation_params.heart_rate", Sampling::Integer)?;
        if self.heart_rate.min <= 0.0 {
            return Err(SynthEcgError::Config(format!(
                "generation_params.heart_rate.min must be > 0, got {}",
                self.heart_rate.min
            )));
        }
        for p in &self.perturbations {
            p.validate()?;
        }
        Ok(())
    }
}

/// Full configuration of an ECG generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub sample_params: SampleParams,
    pub generation_params: GenerationParams,
    pub solver: SolverConfig,
    /// Number of samples requested.
    pub n_samples: usize,
    /// Worker threads; 0 uses every available core.
    pub n_jobs: usize,
    /// Directory receiving `ecgs.npy`.
    pub output_dir: PathBuf,
    /// Batch seed. Drawn from OS entropy when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Reject operators that have no defined effect instead of
    /// running them as no-ops.
    pub strict_perturbations: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            sample_params: SampleParams::default(),
            generation_params: GenerationParams::default(),
            solver: SolverConfig::default(),
            n_samples: 1,
            n_jobs: 0,
            output_dir: PathBuf::from("output"),
            seed: None,
            strict_perturbations: false,
        }
    }
}

impl GeneratorConfig {
    /// Validate every section.
    pub fn validate(&self) -> SynthEcgResult<()> {
        self.sample_params.validate()?;
        self.generation_params.validate()?;
        if let Some(noise) = &self.generation_params.noise {
            noise.validate(self.sample_params.frequency)?;
        }
        self.solver.validate()?;
        if self.n_samples == 0 {
            return Err(SynthEcgError::Config(
                "n_samples must be > 0".to_string(),
            ));
        }
        if self.strict_perturbations {
            if let Some(p) = self
                .generation_params
                .perturbations
                .iter()
                .find(|p| !p.kind.is_implemented())
            {
                return Err(SynthEcgError::Unimplemented(format!(
                    "{} has no defined effect and strict_perturbations is set",
                    p.kind.name()
                )));
            }
        }
        Ok(())
    }

    /// Load from JSON string.
    pub fn from_json(json: &str) -> SynthEcgResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| SynthEcgError::Config(format!("JSON parse error: {e}")))
    }

    /// Load from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> SynthEcgResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            SynthEcgError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_json(&text)?;
        log::debug!("Loaded generator config from {}", path.display());
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> SynthEcgResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SynthEcgError::Config(format!("JSON encode error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lead::{Lead, LeadSelection};

    #[test]
    fn test_default_validates() {
        GeneratorConfig::default().validate().unwrap();
    }

    #[test]
    fn test_default_grid_sizes() {
        let sp = SampleParams::default();
        assert_eq!(sp.n_simulated(), 5120);
        assert_eq!(sp.n_saved(), 5120);
    }

    #[test]
    fn test_range_rejects_inverted() {
        let r = SampleRange::new(5.0, 5.0);
        assert!(r.validate("r", Sampling::Continuous).is_err());
        let r = SampleRange::new(6.0, 5.0);
        assert!(r.validate("r", Sampling::Continuous).is_err());
    }

    #[test]
    fn test_range_integer_needs_whole_bounds() {
        let r = SampleRange::new(0.5, 2.0);
        assert!(r.validate("r", Sampling::Integer).is_err());
        assert!(r.validate("r", Sampling::Continuous).is_ok());
        let r = SampleRange::continuous(0.5, 2.0);
        assert!(r.validate("r", Sampling::Integer).is_ok());
    }

    #[test]
    fn test_save_duration_longer_than_duration() {
        let mut cfg = GeneratorConfig::default();
        cfg.sample_params.save_duration = 12.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_fractional_sample_count_rejected() {
        let mut cfg = GeneratorConfig::default();
        cfg.sample_params.frequency = 500.0;
        cfg.sample_params.save_duration = 2.0011;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_noise_band_validation() {
        let mut cfg = GeneratorConfig::default();
        cfg.generation_params.noise = Some(NoiseConfig::new(0.5, 40.0, 0.05));
        cfg.validate().unwrap();
        for (lo, hi) in [(0.0, 40.0), (40.0, 40.0), (50.0, 40.0), (1.0, 256.0), (1.0, 300.0)] {
            cfg.generation_params.noise = Some(NoiseConfig::new(lo, hi, 0.05));
            assert!(cfg.validate().is_err(), "band [{lo}, {hi}] accepted");
        }
        cfg.generation_params.noise = Some(NoiseConfig::new(1.0, 40.0, -0.1));
        assert!(cfg.validate().is_err());
        cfg.generation_params.noise = Some(NoiseConfig {
            order: 0,
            ..NoiseConfig::new(1.0, 40.0, 0.1)
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_noise_from_json_default_order() {
        let json = r#"{"generation_params": {"noise": {"f_min": 1, "f_max": 30, "amplitude": 0.02}}}"#;
        let cfg = GeneratorConfig::from_json(json).unwrap();
        cfg.validate().unwrap();
        let noise = cfg.generation_params.noise.unwrap();
        assert_eq!(noise.order, NoiseConfig::DEFAULT_ORDER);
        assert_eq!(noise.f_max, 30.0);
    }

    #[test]
    fn test_probability_bounds() {
        let p = PerturbationConfig::new(
            1.5,
            PerturbationKind::QrsAmplitude {
                scale: SampleRange::new(1.0, 3.0),
            },
        );
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_jitter_defaults_to_continuous() {
        let p = PerturbationConfig::new(
            1.0,
            PerturbationKind::ModifyParameters {
                scale: SampleRange::new(0.001, 0.01),
            },
        );
        p.validate().unwrap();
    }

    #[test]
    fn test_strict_rejects_disabled_operator() {
        let mut cfg = GeneratorConfig::default();
        cfg.generation_params.perturbations.push(PerturbationConfig::new(
            0.5,
            PerturbationKind::StElevation {
                percent_elevated: SampleRange::new(1.0, 10.0),
            },
        ));
        cfg.validate().unwrap();
        cfg.strict_perturbations = true;
        assert!(matches!(
            cfg.validate(),
            Err(SynthEcgError::Unimplemented(_))
        ));
    }

    #[test]
    fn test_from_json_full() {
        let json = r#"{
            "sample_params": {"duration": 12, "frequency": 256, "save_duration": 10, "leads": ["I", "V2"]},
            "generation_params": {
                "heart_rate": {"min": 50, "max": 120},
                "perturbations": [
                    {"kind": "qt_elongation", "probability": 0.3, "ms_forward": {"min": 20, "max": 80}},
                    {"kind": "wide_qrs", "probability": 0.2,
                     "percent_widened": {"min": 10, "max": 50},
                     "scale": {"min": 0.6, "max": 0.9, "sampling": "continuous"}},
                    {"kind": "invert_t_waves", "probability": 0.1}
                ]
            },
            "n_samples": 8,
            "n_jobs": 2,
            "output_dir": "out/ecgs",
            "seed": 7
        }"#;
        let cfg = GeneratorConfig::from_json(json).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.sample_params.n_simulated(), 3072);
        assert_eq!(
            cfg.sample_params.leads,
            Some(LeadSelection::Named(vec![Lead::I, Lead::V2]))
        );
        assert_eq!(cfg.generation_params.perturbations.len(), 3);
        assert_eq!(cfg.generation_params.perturbations[0].probability, 0.3);
        assert!(matches!(
            cfg.generation_params.perturbations[1].kind,
            PerturbationKind::WideQrs { .. }
        ));
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.solver, SolverConfig::default());
    }

    #[test]
    fn test_from_json_unknown_kind() {
        let json = r#"{"generation_params": {"perturbations": [{"kind": "nope", "probability": 1.0}]}}"#;
        assert!(GeneratorConfig::from_json(json).is_err());
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        let mut cfg = GeneratorConfig::default();
        cfg.seed = Some(11);
        cfg.generation_params.perturbations.push(PerturbationConfig::new(
            1.0,
            PerturbationKind::PWaveAmplitude {
                scale: SampleRange::integer(1.0, 3.0),
            },
        ));
        std::fs::write(&path, cfg.to_json_pretty().unwrap()).unwrap();
        let loaded = GeneratorConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_solver_validation() {
        let solver = SolverConfig {
            rtol: 0.0,
            ..SolverConfig::default()
        };
        assert!(solver.validate().is_err());
        let solver = SolverConfig {
            max_step: Some(-1.0),
            ..SolverConfig::default()
        };
        assert!(solver.validate().is_err());
    }
}
