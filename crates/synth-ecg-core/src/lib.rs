// ─────────────────────────────────────────────────────────────────────
// SynthECG — Generator Core
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Synthetic 12-lead ECG generation.
//!
//! # Pipeline
//!
//! 1. A heart rate is drawn per sample from the batch's master stream.
//! 2. The canonical VCG model at that rate runs through the configured
//!    perturbation chain on the sample's own stream.
//! 3. The model is integrated over `duration` and projected to 12 leads.
//! 4. A `save_duration` window is cut at a random offset and the selected
//!    leads are kept.
//! 5. Optional band-limited noise is added to each kept lead.
//!
//! # Failure Isolation
//!
//! Samples run in parallel on a rayon pool. An error or panic in one
//! sample is logged with its index and excluded from the batch; siblings
//! are unaffected. [`BatchOutput`] lists both outcomes.

pub mod generator;
pub mod noise;
pub mod store;
pub mod window;

pub use generator::{BatchOutput, EcgGenerator, EcgSample, SampleFailure};
pub use noise::{BandLimitedNoise, BandPass, Biquad};
pub use store::{load_ecgs, save_ecgs, ECGS_FILE};
pub use window::{cut_window, window_start};
