//! Python bindings for the gacha simulator using PyO3

use crate::config::{ConfigError, Goals, PlayerIntent, SimulationConfig};
use crate::simulation::{run_and_aggregate, run_trials};
use crate::stats::{AggregatedStats, Summary};
use numpy::{IntoPyArray, PyArray1};
use pyo3::prelude::*;
use pyo3::types::PyDict;

fn config_err(e: ConfigError) -> PyErr {
    PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("Invalid scenario: {}", e))
}

/// Helper to convert a goals dict (prize name -> count) into `Goals`
fn pydict_to_goals(dict: &Bound<'_, PyDict>) -> PyResult<Goals> {
    let mut goals = Goals::new();
    for (key, value) in dict.iter() {
        let name: String = key.extract()?;
        let count: u32 = value.extract()?;
        goals.insert(name, count);
    }
    Ok(goals)
}

fn summary_dict<'py>(py: Python<'py>, summary: &Summary) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("mean", summary.mean)?;
    dict.set_item("min", summary.min)?;
    dict.set_item("max", summary.max)?;
    dict.set_item("median", summary.median)?;
    dict.set_item("std_dev", summary.std_dev)?;
    dict.set_item("p25", summary.p25)?;
    dict.set_item("p75", summary.p75)?;
    dict.set_item("p90", summary.p90)?;
    dict.set_item("p95", summary.p95)?;
    dict.set_item("p99", summary.p99)?;
    Ok(dict)
}

fn stats_dict<'py>(py: Python<'py>, stats: &AggregatedStats) -> PyResult<Bound<'py, PyDict>> {
    let result_dict = PyDict::new(py);
    result_dict.set_item("simulations", stats.simulations)?;
    result_dict.set_item("successes", stats.successes)?;
    result_dict.set_item("failures", stats.failures)?;
    result_dict.set_item("success_rate", stats.success_rate)?;
    result_dict.set_item("character_pulls", summary_dict(py, &stats.character_pulls)?)?;
    result_dict.set_item("weapon_batches", summary_dict(py, &stats.weapon_batches)?)?;
    result_dict.set_item("quota_remaining", summary_dict(py, &stats.quota_remaining)?)?;
    result_dict.set_item("quota_purchased", summary_dict(py, &stats.quota_purchased)?)?;

    let causes = PyDict::new(py);
    for (tag, count) in &stats.failure_causes {
        causes.set_item(tag, count)?;
    }
    result_dict.set_item("failure_causes", causes)?;
    Ok(result_dict)
}

/// Python-callable simulation function - accepts the form fields as keyword arguments
/// and uses the built-in pool rules. Returns a dict of aggregated stats.
#[pyfunction]
#[pyo3(signature = (
    num_sims=10000,
    parallel=true,
    seed=None,
    guaranteed_six_star_within=None,
    guaranteed_five_star_within=None,
    character_pulls_used=None,
    character_limited_obtained=None,
    free_ten_pulls=None,
    urgent_ten_pulls=None,
    initial_weapon_quota=None,
    character_goals=None,
    character_always_pull_ten=None,
    character_pull_limit=None,
    character_pull_minimum=None,
    weapon_batches_used=None,
    weapon_limited_obtained=None,
    weapon_six_star_obtained=None,
    weapon_goals=None,
    weapon_pull_limit=None,
    weapon_pull_minimum=None,
    borrow_from_character_pool=None
))]
#[allow(clippy::too_many_arguments)]
fn simulate(
    py: Python<'_>,
    num_sims: usize,
    parallel: bool,
    seed: Option<u64>,
    guaranteed_six_star_within: Option<u32>,
    guaranteed_five_star_within: Option<u32>,
    character_pulls_used: Option<u32>,
    character_limited_obtained: Option<bool>,
    free_ten_pulls: Option<u32>,
    urgent_ten_pulls: Option<u32>,
    initial_weapon_quota: Option<u64>,
    character_goals: Option<&Bound<'_, PyDict>>,
    character_always_pull_ten: Option<bool>,
    character_pull_limit: Option<u32>,
    character_pull_minimum: Option<u32>,
    weapon_batches_used: Option<u32>,
    weapon_limited_obtained: Option<bool>,
    weapon_six_star_obtained: Option<bool>,
    weapon_goals: Option<&Bound<'_, PyDict>>,
    weapon_pull_limit: Option<u32>,
    weapon_pull_minimum: Option<u32>,
    borrow_from_character_pool: Option<bool>,
) -> PyResult<PyObject> {
    let defaults = PlayerIntent::default();
    let player = PlayerIntent {
        guaranteed_six_star_within: guaranteed_six_star_within
            .unwrap_or(defaults.guaranteed_six_star_within),
        guaranteed_five_star_within: guaranteed_five_star_within
            .unwrap_or(defaults.guaranteed_five_star_within),
        character_pulls_used: character_pulls_used.unwrap_or(defaults.character_pulls_used),
        character_limited_obtained: character_limited_obtained
            .unwrap_or(defaults.character_limited_obtained),
        free_ten_pulls: free_ten_pulls.unwrap_or(defaults.free_ten_pulls),
        urgent_ten_pulls: urgent_ten_pulls.unwrap_or(defaults.urgent_ten_pulls),
        initial_weapon_quota: initial_weapon_quota.unwrap_or(defaults.initial_weapon_quota),
        character_goals: match character_goals {
            Some(d) => pydict_to_goals(d)?,
            None => defaults.character_goals,
        },
        character_always_pull_ten: character_always_pull_ten
            .unwrap_or(defaults.character_always_pull_ten),
        character_pull_limit: character_pull_limit.unwrap_or(defaults.character_pull_limit),
        character_pull_minimum: character_pull_minimum.unwrap_or(defaults.character_pull_minimum),
        weapon_batches_used: weapon_batches_used.unwrap_or(defaults.weapon_batches_used),
        weapon_limited_obtained: weapon_limited_obtained.unwrap_or(defaults.weapon_limited_obtained),
        weapon_six_star_obtained: weapon_six_star_obtained
            .unwrap_or(defaults.weapon_six_star_obtained),
        weapon_goals: match weapon_goals {
            Some(d) => pydict_to_goals(d)?,
            None => defaults.weapon_goals,
        },
        weapon_pull_limit: weapon_pull_limit.unwrap_or(defaults.weapon_pull_limit),
        weapon_pull_minimum: weapon_pull_minimum.unwrap_or(defaults.weapon_pull_minimum),
        borrow_from_character_pool: borrow_from_character_pool
            .unwrap_or(defaults.borrow_from_character_pool),
    };

    let scenario = SimulationConfig {
        player,
        simulation_runs: num_sims,
        ..Default::default()
    };

    // Release GIL during computation to prevent GUI freezing
    let stats = py
        .allow_threads(|| run_and_aggregate(&scenario, num_sims, parallel, seed))
        .map_err(config_err)?;

    Ok(stats_dict(py, &stats)?.into())
}

/// Python-callable simulation function from JSON string
#[pyfunction]
#[pyo3(signature = (config_json, num_sims, parallel=false, seed=None))]
fn simulate_json(
    py: Python<'_>,
    config_json: &str,
    num_sims: usize,
    parallel: bool,
    seed: Option<u64>,
) -> PyResult<String> {
    let scenario = SimulationConfig::from_json(config_json).map_err(|e| {
        PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("Invalid config JSON: {}", e))
    })?;

    let stats = py
        .allow_threads(|| run_and_aggregate(&scenario, num_sims, parallel, seed))
        .map_err(config_err)?;

    serde_json::to_string(&stats).map_err(|e| {
        PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("Failed to serialize results: {}", e))
    })
}

/// Python-callable simulation function from a YAML or JSON file
#[pyfunction]
#[pyo3(signature = (config_path, num_sims=None, parallel=false, seed=None))]
fn simulate_from_file(
    py: Python<'_>,
    config_path: &str,
    num_sims: Option<usize>,
    parallel: bool,
    seed: Option<u64>,
) -> PyResult<String> {
    let scenario = SimulationConfig::from_file(config_path).map_err(|e| {
        PyErr::new::<pyo3::exceptions::PyIOError, _>(format!("Failed to load config: {}", e))
    })?;
    let num_sims = num_sims.unwrap_or(scenario.simulation_runs);

    let stats = py
        .allow_threads(|| run_and_aggregate(&scenario, num_sims, parallel, seed))
        .map_err(config_err)?;

    serde_json::to_string(&stats).map_err(|e| {
        PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("Failed to serialize results: {}", e))
    })
}

/// Per-trial arrays for charting: (character draws excluding urgent, weapon batches, success)
#[pyfunction]
#[pyo3(signature = (config_json, num_sims, parallel=true, seed=None))]
#[allow(clippy::type_complexity)]
fn outcome_arrays<'py>(
    py: Python<'py>,
    config_json: &str,
    num_sims: usize,
    parallel: bool,
    seed: Option<u64>,
) -> PyResult<(
    Bound<'py, PyArray1<u32>>,
    Bound<'py, PyArray1<u32>>,
    Bound<'py, PyArray1<bool>>,
)> {
    let scenario = SimulationConfig::from_json(config_json).map_err(|e| {
        PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("Invalid config JSON: {}", e))
    })?;

    let results = py
        .allow_threads(|| run_trials(&scenario, num_sims, parallel, seed))
        .map_err(config_err)?;

    let character: Vec<u32> = results.iter().map(|r| r.character_pulls_excluding_urgent).collect();
    let weapon: Vec<u32> = results.iter().map(|r| r.weapon_batches).collect();
    let success: Vec<bool> = results.iter().map(|r| r.success).collect();

    Ok((
        character.into_pyarray(py),
        weapon.into_pyarray(py),
        success.into_pyarray(py),
    ))
}

/// Get number of threads being used for parallel simulation
#[pyfunction]
fn get_thread_count() -> PyResult<usize> {
    Ok(rayon::current_num_threads())
}

/// Get number of available CPU cores
#[pyfunction]
fn get_available_cores() -> PyResult<usize> {
    Ok(num_cpus::get())
}

/// Python module definition
#[pymodule]
fn gacha_sim(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(simulate, m)?)?;
    m.add_function(wrap_pyfunction!(simulate_json, m)?)?;
    m.add_function(wrap_pyfunction!(simulate_from_file, m)?)?;
    m.add_function(wrap_pyfunction!(outcome_arrays, m)?)?;
    m.add_function(wrap_pyfunction!(get_thread_count, m)?)?;
    m.add_function(wrap_pyfunction!(get_available_cores, m)?)?;
    Ok(())
}
