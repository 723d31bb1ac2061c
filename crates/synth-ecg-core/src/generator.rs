// ─────────────────────────────────────────────────────────────────────
// SynthECG — ECG Generator
// ─────────────────────────────────────────────────────────────────────
//! Single-sample pipeline (heart rate → perturbed model → trajectory →
//! 12 leads → save window) and the parallel batch around it.
//!
//! Every sample owns an independent ChaCha stream derived from the batch
//! seed and its index, so a batch is reproducible for a fixed seed no
//! matter how many workers run it or in which order they finish.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use ndarray::Array2;
use rand::Rng;
use rayon::prelude::*;

use synth_ecg_perturb::{master_rng, sample_rng, PerturbationChain, RangeSampler, SampleRng};
use synth_ecg_physics::{vcg_to_12lead, Integrator, VcgModel};
use synth_ecg_types::{
    resolve_leads, GeneratorConfig, Sampling, SynthEcgError, SynthEcgResult,
};

use crate::noise::BandLimitedNoise;
use crate::store;
use crate::window::{cut_window, window_start};

/// One generated sample and how it was produced.
#[derive(Debug, Clone)]
pub struct EcgSample {
    pub index: usize,
    /// Rate the ECG was simulated at, after the perturbation chain.
    pub heart_rate: f64,
    /// Rate drawn for this index before any operator ran.
    pub base_heart_rate: f64,
    /// Operators that fired, in chain order.
    pub perturbations: Vec<&'static str>,
    /// `(save_duration · fs, n_leads)`.
    pub ecg: Array2<f64>,
}

/// A sample that could not be generated.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFailure {
    pub index: usize,
    pub base_heart_rate: f64,
    pub cause: String,
}

/// Outcome of a batch: successes in index order plus every failure.
#[derive(Debug, Clone, Default)]
pub struct BatchOutput {
    pub requested: usize,
    pub samples: Vec<EcgSample>,
    pub failures: Vec<SampleFailure>,
}

impl BatchOutput {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.samples.len() == self.requested
    }

    pub fn indices(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.index).collect()
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.index).collect()
    }

    pub fn ecgs(&self) -> Vec<&Array2<f64>> {
        self.samples.iter().map(|s| &s.ecg).collect()
    }
}

/// Configured generator. Cheap to share across threads.
#[derive(Debug)]
pub struct EcgGenerator {
    config: GeneratorConfig,
    chain: PerturbationChain,
    integrator: Integrator,
    heart_rate: RangeSampler,
    noise: Option<BandLimitedNoise>,
    leads: Vec<usize>,
    seed: u64,
}

impl EcgGenerator {
    pub fn new(config: GeneratorConfig) -> SynthEcgResult<Self> {
        config.validate()?;
        let params = &config.sample_params;
        let chain = PerturbationChain::from_configs(
            &config.generation_params.perturbations,
            config.strict_perturbations,
        )?;
        let integrator =
            Integrator::with_config(params.frequency, params.duration, config.solver.clone())?;
        let heart_rate = RangeSampler::new(
            "generation_params.heart_rate",
            &config.generation_params.heart_rate,
            Sampling::Integer,
        )?;
        let noise = config
            .generation_params
            .noise
            .as_ref()
            .map(|n| BandLimitedNoise::new(n, params.frequency))
            .transpose()?;
        let leads = resolve_leads(params.leads.as_ref())?;
        let seed = match config.seed {
            Some(seed) => seed,
            None => {
                let seed = rand::thread_rng().gen();
                log::info!("No seed configured; using {seed}");
                seed
            }
        };
        log::debug!(
            "Generator initialized with perturbations {:?}",
            chain.names()
        );
        Ok(Self {
            config,
            chain,
            integrator,
            heart_rate,
            noise,
            leads,
            seed,
        })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> SynthEcgResult<Self> {
        Self::new(GeneratorConfig::from_json_file(path)?)
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn chain(&self) -> &PerturbationChain {
        &self.chain
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn lead_indices(&self) -> &[usize] {
        &self.leads
    }

    /// `(rows, leads)` of every generated sample.
    pub fn sample_shape(&self) -> (usize, usize) {
        (self.config.sample_params.n_saved(), self.leads.len())
    }

    /// Base model at `heart_rate` pushed through the perturbation chain.
    pub fn generate_vcg(
        &self,
        heart_rate: f64,
        rng: &mut SampleRng,
    ) -> SynthEcgResult<(VcgModel, Vec<&'static str>)> {
        let base = VcgModel::new(heart_rate)?;
        let perturbed = self.chain.apply(&base, rng)?;
        Ok((perturbed.model.into_owned(), perturbed.applied))
    }

    /// Integrate, project, cut the save window out of one model and add
    /// the configured noise.
    pub fn render(&self, model: &VcgModel, rng: &mut SampleRng) -> SynthEcgResult<Array2<f64>> {
        let trajectory = self.integrator.trajectory(model, None)?;
        let ecg = vcg_to_12lead(&trajectory.points);

        let (rows, n_leads) = self.sample_shape();
        let start = window_start(ecg.len(), rows, rng)?;
        let window = cut_window(&ecg, start, rows)?;

        let mut out = Array2::from_shape_fn((rows, n_leads), |(r, c)| window[r][self.leads[c]]);
        if let Some(noise) = &self.noise {
            noise.apply(&mut out, rng)?;
        }
        if out.iter().any(|v| !v.is_finite()) {
            return Err(SynthEcgError::Numerical(
                "generated ECG contains non-finite values".to_string(),
            ));
        }
        Ok(out)
    }

    /// One `(save_duration · fs, n_leads)` ECG at `heart_rate`.
    pub fn generate_ecg(&self, heart_rate: f64, rng: &mut SampleRng) -> SynthEcgResult<Array2<f64>> {
        let (model, _) = self.generate_vcg(heart_rate, rng)?;
        self.render(&model, rng)
    }

    /// Sample `index` of the batch, on its own stream.
    pub fn generate_sample(&self, index: usize, base_heart_rate: f64) -> SynthEcgResult<EcgSample> {
        let mut rng = sample_rng(self.seed, index);
        let (model, perturbations) = self.generate_vcg(base_heart_rate, &mut rng)?;
        let ecg = self.render(&model, &mut rng)?;
        Ok(EcgSample {
            index,
            heart_rate: model.heart_rate(),
            base_heart_rate,
            perturbations,
            ecg,
        })
    }

    /// One heart rate per requested sample, drawn from the master stream.
    pub fn sample_heart_rates(&self) -> Vec<f64> {
        let mut rng = master_rng(self.seed);
        (0..self.config.n_samples)
            .map(|_| self.heart_rate.draw(&mut rng))
            .collect()
    }

    /// Generate the whole batch. Failed samples are logged and excluded.
    pub fn generate_ecgs(&self) -> BatchOutput {
        log::info!(
            "Generating {} ECGs (seed {}, {} s at {} Hz)",
            self.config.n_samples,
            self.seed,
            self.config.sample_params.duration,
            self.config.sample_params.frequency
        );
        let heart_rates = self.sample_heart_rates();
        self.run_batch(&heart_rates, |i, hr| self.generate_sample(i, hr))
    }

    /// Fan `work` out over the configured pool and gather results by index.
    pub(crate) fn run_batch<F>(&self, heart_rates: &[f64], work: F) -> BatchOutput
    where
        F: Fn(usize, f64) -> SynthEcgResult<EcgSample> + Sync,
    {
        let run = || -> Vec<(usize, f64, Result<EcgSample, String>)> {
            heart_rates
                .par_iter()
                .enumerate()
                .map(|(i, &hr)| (i, hr, guarded(|| work(i, hr))))
                .collect()
        };

        let results = match self.config.n_jobs {
            0 => run(),
            n => match rayon::ThreadPoolBuilder::new().num_threads(n).build() {
                Ok(pool) => pool.install(run),
                Err(e) => {
                    log::warn!("Could not build a {n}-thread pool ({e}); using the global pool");
                    run()
                }
            },
        };

        let mut batch = BatchOutput {
            requested: heart_rates.len(),
            ..BatchOutput::default()
        };
        for (index, base_heart_rate, result) in results {
            match result {
                Ok(sample) => batch.samples.push(sample),
                Err(cause) => {
                    log::error!(
                        "Error generating ECG {index} (base HR {base_heart_rate} bpm): {cause}"
                    );
                    batch.failures.push(SampleFailure {
                        index,
                        base_heart_rate,
                        cause,
                    });
                }
            }
        }

        if batch.is_complete() {
            log::info!("Generated {}/{} ECGs", batch.len(), batch.requested);
        } else {
            log::warn!(
                "Generated {}/{} ECGs; failed indices {:?}",
                batch.len(),
                batch.requested,
                batch.failed_indices()
            );
        }
        batch
    }

    /// Write the batch to `<output_dir>/ecgs.npy`.
    pub fn save_ecgs(&self, batch: &BatchOutput) -> SynthEcgResult<PathBuf> {
        log::info!("Saving ECGs...");
        store::save_ecgs(&self.config.output_dir, &batch.ecgs(), self.sample_shape())
    }
}

/// Run one unit of work, turning both errors and panics into a cause string.
fn guarded<F>(work: F) -> Result<EcgSample, String>
where
    F: FnOnce() -> SynthEcgResult<EcgSample>,
{
    match catch_unwind(AssertUnwindSafe(work)) {
        Ok(Ok(sample)) => Ok(sample),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(format!("panicked: {msg}"))
        }
    }
}
