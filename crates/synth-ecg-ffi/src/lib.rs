// ─────────────────────────────────────────────────────────────────────
// SynthECG — PyO3 FFI Bindings
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
// Note: #[deny(unsafe_code)] not applied — PyO3 proc macros generate
// unsafe blocks internally. All hand-written code in this crate is safe.
//! Python-callable wrappers around the SynthECG generator.
//!
//! Exposes `EcgGenerator`, `VcgModel`, `vcg_to_12lead` and `rotate_vcg`.
//!
//! # FFI Safety
//!
//! - Configuration is validated before any object is stored.
//! - Batch generation releases the GIL (`py.allow_threads`).
//! - Arrays cross the boundary as nested lists of floats; no borrowed
//!   buffers escape.
//!
//! Install: `pip install -e crates/synth-ecg-ffi` (requires maturin).
//!
//! Usage from Python:
//! ```python
//! from synth_ecg import EcgGenerator
//!
//! gen = EcgGenerator(open("configs/generate_ecgs.json").read())
//! out = gen.generate()
//! path = gen.save()
//! ```

use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use synth_ecg_core::{BatchOutput, EcgGenerator};
use synth_ecg_physics::{Integrator, State, VcgModel, DEFAULT_INITIAL_STATE};
use synth_ecg_types::{GeneratorConfig, SynthEcgError};

fn to_py_err(e: SynthEcgError) -> PyErr {
    match e {
        SynthEcgError::InvalidParameter(_) | SynthEcgError::Config(_) => {
            PyValueError::new_err(e.to_string())
        }
        SynthEcgError::Io(_) | SynthEcgError::Storage(_) => PyIOError::new_err(e.to_string()),
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

fn rows_to_vecs<const N: usize>(rows: &[[f64; N]]) -> Vec<Vec<f64>> {
    rows.iter().map(|r| r.to_vec()).collect()
}

fn vecs_to_points(vcg: &[Vec<f64>]) -> PyResult<Vec<[f64; 3]>> {
    vcg.iter()
        .enumerate()
        .map(|(i, row)| {
            <[f64; 3]>::try_from(row.as_slice()).map_err(|_| {
                PyValueError::new_err(format!("row {i} has {} columns, expected 3", row.len()))
            })
        })
        .collect()
}

// ─── PyEcgGenerator ─────────────────────────────────────────────────

/// Batch ECG generator configured from a JSON string.
#[pyclass(name = "EcgGenerator")]
struct PyEcgGenerator {
    inner: EcgGenerator,
    last: Option<BatchOutput>,
}

#[pymethods]
impl PyEcgGenerator {
    #[new]
    #[pyo3(signature = (config_json = None))]
    fn new(config_json: Option<&str>) -> PyResult<Self> {
        let config = match config_json {
            Some(json) => GeneratorConfig::from_json(json).map_err(to_py_err)?,
            None => GeneratorConfig::default(),
        };
        let inner = EcgGenerator::new(config).map_err(to_py_err)?;
        Ok(Self { inner, last: None })
    }

    #[getter]
    fn seed(&self) -> u64 {
        self.inner.seed()
    }

    #[getter]
    fn sample_shape(&self) -> (usize, usize) {
        self.inner.sample_shape()
    }

    #[getter]
    fn perturbations(&self) -> Vec<&'static str> {
        self.inner.chain().names()
    }

    /// Generate the configured batch.
    ///
    /// Returns dict with ecgs (list of (rows, leads) nested lists),
    /// indices, heart_rates (as simulated), base_heart_rates (as drawn),
    /// perturbations and failures.
    fn generate(&mut self, py: Python<'_>) -> PyResult<PyObject> {
        let inner = &self.inner;
        let batch = py.allow_threads(|| inner.generate_ecgs());

        let dict = PyDict::new(py);
        let ecgs: Vec<Vec<Vec<f64>>> = batch
            .samples
            .iter()
            .map(|s| s.ecg.outer_iter().map(|row| row.to_vec()).collect())
            .collect();
        let heart_rates: Vec<f64> = batch.samples.iter().map(|s| s.heart_rate).collect();
        let base_heart_rates: Vec<f64> =
            batch.samples.iter().map(|s| s.base_heart_rate).collect();
        let fired: Vec<Vec<&str>> = batch
            .samples
            .iter()
            .map(|s| s.perturbations.clone())
            .collect();
        dict.set_item("ecgs", ecgs)?;
        dict.set_item("indices", batch.indices())?;
        dict.set_item("heart_rates", heart_rates)?;
        dict.set_item("base_heart_rates", base_heart_rates)?;
        dict.set_item("perturbations", fired)?;
        dict.set_item("requested", batch.requested)?;

        let failures: Vec<Bound<'_, PyDict>> = batch
            .failures
            .iter()
            .map(|f| {
                let d = PyDict::new(py);
                d.set_item("index", f.index)?;
                d.set_item("base_heart_rate", f.base_heart_rate)?;
                d.set_item("cause", f.cause.as_str())?;
                Ok(d)
            })
            .collect::<PyResult<_>>()?;
        dict.set_item("failures", failures)?;

        self.last = Some(batch);
        Ok(dict.into())
    }

    /// Write the most recent batch to `<output_dir>/ecgs.npy`; returns the path.
    fn save(&self) -> PyResult<String> {
        let batch = self
            .last
            .as_ref()
            .ok_or_else(|| PyRuntimeError::new_err("nothing generated yet; call generate() first"))?;
        let path = self.inner.save_ecgs(batch).map_err(to_py_err)?;
        Ok(path.display().to_string())
    }

    fn __repr__(&self) -> String {
        let cfg = self.inner.config();
        format!(
            "EcgGenerator(n_samples={}, duration={}, frequency={}, seed={})",
            cfg.n_samples,
            cfg.sample_params.duration,
            cfg.sample_params.frequency,
            self.inner.seed()
        )
    }
}

// ─── PyVcgModel ─────────────────────────────────────────────────────

/// Canonical VCG dynamical model.
#[pyclass(name = "VcgModel")]
#[derive(Clone)]
struct PyVcgModel {
    inner: VcgModel,
}

#[pymethods]
impl PyVcgModel {
    #[new]
    #[pyo3(signature = (heart_rate = 60.0))]
    fn new(heart_rate: f64) -> PyResult<Self> {
        Ok(Self {
            inner: VcgModel::new(heart_rate).map_err(to_py_err)?,
        })
    }

    #[getter]
    fn heart_rate(&self) -> f64 {
        self.inner.heart_rate()
    }

    #[getter]
    fn rotational_frequency(&self) -> f64 {
        self.inner.rotational_frequency()
    }

    #[getter]
    fn angular_frequency(&self) -> f64 {
        self.inner.angular_frequency()
    }

    fn set_heart_rate(&mut self, heart_rate: f64) -> PyResult<()> {
        self.inner.set_heart_rate(heart_rate).map_err(to_py_err)
    }

    /// State derivative at `(t, [theta, x, y, z])`.
    fn derivative(&self, t: f64, v: Vec<f64>) -> PyResult<Vec<f64>> {
        let state = State::try_from(v.as_slice())
            .map_err(|_| PyValueError::new_err(format!("state needs 4 values, got {}", v.len())))?;
        Ok(self.inner.derivative(t, &state).to_vec())
    }

    /// Integrate and return dict with t and vcg (rows of x, y, z).
    #[pyo3(signature = (fs = 512.0, duration = 10.0, v0 = None))]
    fn solve(
        &self,
        py: Python<'_>,
        fs: f64,
        duration: f64,
        v0: Option<Vec<f64>>,
    ) -> PyResult<PyObject> {
        let v0 = match v0 {
            Some(v) => State::try_from(v.as_slice()).map_err(|_| {
                PyValueError::new_err(format!("v0 needs 4 values, got {}", v.len()))
            })?,
            None => DEFAULT_INITIAL_STATE,
        };
        let integrator = Integrator::new(fs, duration).map_err(to_py_err)?;
        let model = &self.inner;
        let traj = py
            .allow_threads(|| integrator.trajectory(model, Some(v0)))
            .map_err(to_py_err)?;

        let dict = PyDict::new(py);
        dict.set_item("t", traj.t.clone())?;
        dict.set_item("vcg", rows_to_vecs(&traj.points))?;
        Ok(dict.into())
    }

    fn __repr__(&self) -> String {
        format!("VcgModel(heart_rate={})", self.inner.heart_rate())
    }
}

// ─── Free functions ─────────────────────────────────────────────────

/// Project (L, 3) VCG rows onto the 12 standard leads.
#[pyfunction]
fn vcg_to_12lead(vcg: Vec<Vec<f64>>) -> PyResult<Vec<Vec<f64>>> {
    let points = vecs_to_points(&vcg)?;
    Ok(rows_to_vecs(&synth_ecg_physics::vcg_to_12lead(&points)))
}

/// Rotate (L, 3) VCG rows by Rx · Ry · Rz (degrees).
#[pyfunction]
#[pyo3(signature = (vcg, th_x = 0.0, th_y = 0.0, th_z = 0.0))]
fn rotate_vcg(vcg: Vec<Vec<f64>>, th_x: f64, th_y: f64, th_z: f64) -> PyResult<Vec<Vec<f64>>> {
    let points = vecs_to_points(&vcg)?;
    let r = synth_ecg_physics::rotation_matrix(th_x, th_y, th_z);
    Ok(rows_to_vecs(&synth_ecg_physics::rotate_vcg(&points, &r)))
}

#[pymodule]
fn synth_ecg(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyEcgGenerator>()?;
    m.add_class::<PyVcgModel>()?;
    m.add_function(wrap_pyfunction!(vcg_to_12lead, m)?)?;
    m.add_function(wrap_pyfunction!(rotate_vcg, m)?)?;
    Ok(())
}
