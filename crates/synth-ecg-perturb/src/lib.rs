// ─────────────────────────────────────────────────────────────────────
// SynthECG — Perturbation Operators
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Probability-gated parameter mutations of the VCG model, composed as an
//! ordered chain and driven by seeded ChaCha streams.

pub mod chain;
pub mod operator;
pub mod operators;
pub mod sampling;

pub use chain::{PerturbationChain, Perturbed};
pub use operator::{GatedPerturbation, Perturbation};
pub use operators::{
    build_operator, DisabledPerturbation, HeartRateChange, KernelScaling, ParameterJitter,
    QtElongation, WideQrs,
};
pub use sampling::{master_rng, sample_rng, RangeSampler, SampleRng};
