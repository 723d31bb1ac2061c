// ─────────────────────────────────────────────────────────────────────
// SynthECG — Shared Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Type definitions, configuration, and error hierarchy for the
//! SynthECG synthetic electrocardiogram generator.

pub mod config;
pub mod error;
pub mod lead;

pub use config::{
    GenerationParams, GeneratorConfig, NoiseConfig, PerturbationConfig, PerturbationKind,
    SampleParams, SampleRange, Sampling, SolverConfig, GRID_TOLERANCE,
};
pub use error::{SynthEcgError, SynthEcgResult};
pub use lead::{resolve_leads, Lead, LeadSelection, N_LEADS};
