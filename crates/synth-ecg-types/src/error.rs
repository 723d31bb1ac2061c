// ─────────────────────────────────────────────────────────────────────
// SynthECG — Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all SynthECG failures.
#[derive(Error, Debug)]
pub enum SynthEcgError {
    /// Model or operator parameter out of its valid domain
    /// (zero kernel width, non-positive heart rate, ragged axis).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration rejected during validation or parsing.
    #[error("config error: {0}")]
    Config(String),

    /// The ODE solver could not produce the requested output grid.
    #[error("integration failure: {0}")]
    Integration(String),

    /// Numerical error (NaN/Inf in computation).
    #[error("numerical error: {0}")]
    Numerical(String),

    /// A perturbation operator that has no defined behaviour was requested
    /// in strict mode.
    #[error("unimplemented perturbation: {0}")]
    Unimplemented(String),

    /// Array persistence failed (encoding or shape).
    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SynthEcgResult<T> = Result<T, SynthEcgError>;
