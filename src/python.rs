//! Python bindings, built with the `python` feature.

use crate::scene::{self, population};
use crate::solver::Simulation;
use crate::structs::{ConfigError, SceneKind, SimParams};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyBytes;

impl From<ConfigError> for PyErr {
    fn from(err: ConfigError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

#[pyclass(name = "CrowdSimulation")]
pub struct PyCrowdSimulation {
    inner: Simulation,
}

#[pymethods]
impl PyCrowdSimulation {
    #[new]
    #[pyo3(signature = (scene, num_agents, seed=None))]
    fn new(scene: &str, num_agents: i64, seed: Option<u64>) -> PyResult<Self> {
        let kind: SceneKind = scene.parse()?;
        let n = population(num_agents);
        let inner = Simulation::new(kind, n, SimParams::for_population(n), seed)?;
        Ok(PyCrowdSimulation { inner })
    }

    /// Advances one step; returns (short_range_contacts, long_range_contacts).
    fn step(&mut self, py: Python<'_>) -> (usize, usize) {
        let stats = py.allow_threads(|| self.inner.step());
        (stats.short_range_contacts, stats.long_range_contacts)
    }

    fn reset(&mut self, num_agents: i64) {
        self.inner.reset(population(num_agents));
    }

    /// Flat `[posX, posY, velX, velY, predX, predY, goalX, goalY]` per agent.
    fn agent_data(&self) -> Vec<f32> {
        self.inner.agent_floats().to_vec()
    }

    fn agent_bytes<'py>(&self, py: Python<'py>) -> Bound<'py, PyBytes> {
        PyBytes::new(py, self.inner.agent_bytes())
    }

    #[getter]
    fn num_agents(&self) -> usize {
        self.inner.len()
    }

    #[getter]
    fn step_count(&self) -> u64 {
        self.inner.step_count()
    }

    #[getter]
    fn scene(&self) -> String {
        self.inner.scene().to_string()
    }

    #[getter]
    fn agent_scale(&self) -> f32 {
        self.inner.params().agent_scale
    }

    #[getter]
    fn delta_t(&self) -> f32 {
        self.inner.params().delta_t
    }

    #[setter]
    fn set_delta_t(&mut self, delta_t: f32) -> PyResult<()> {
        let params = SimParams { delta_t, ..*self.inner.params() };
        Ok(self.inner.set_params(params)?)
    }

    #[getter]
    fn stability_iterations(&self) -> u32 {
        self.inner.params().stability_iterations
    }

    #[setter]
    fn set_stability_iterations(&mut self, iterations: u32) -> PyResult<()> {
        let params = SimParams {
            stability_iterations: iterations,
            ..*self.inner.params()
        };
        Ok(self.inner.set_params(params)?)
    }

    #[getter]
    fn constraint_iterations(&self) -> u32 {
        self.inner.params().constraint_iterations
    }

    #[setter]
    fn set_constraint_iterations(&mut self, iterations: u32) -> PyResult<()> {
        let params = SimParams {
            constraint_iterations: iterations,
            ..*self.inner.params()
        };
        Ok(self.inner.set_params(params)?)
    }

    #[getter]
    fn avoidance_enabled(&self) -> bool {
        self.inner.params().avoidance_enabled
    }

    #[setter]
    fn set_avoidance_enabled(&mut self, enabled: bool) -> PyResult<()> {
        let params = SimParams {
            avoidance_enabled: enabled,
            ..*self.inner.params()
        };
        Ok(self.inner.set_params(params)?)
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __str__(&self) -> String {
        format!(
            "CrowdSimulation(scene={}, agents={}, step={})",
            self.inner.scene(),
            self.inner.len(),
            self.inner.step_count()
        )
    }
}

#[pyfunction]
fn agent_scale_for(num_agents: i64) -> f32 {
    SimParams::agent_scale_for(population(num_agents))
}

#[pyfunction]
#[pyo3(signature = (scene, num_agents, agent_scale=1.0, seed=None))]
fn generate_scene(scene: &str, num_agents: i64, agent_scale: f32, seed: Option<u64>) -> PyResult<Vec<f32>> {
    Ok(scene::generate_records(scene, population(num_agents), agent_scale, seed)?)
}

#[pymodule]
fn crowd_solver(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyCrowdSimulation>()?;

    m.add_function(wrap_pyfunction!(agent_scale_for, m)?)?;
    m.add_function(wrap_pyfunction!(generate_scene, m)?)?;

    Ok(())
}
