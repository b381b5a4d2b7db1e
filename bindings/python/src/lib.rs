// PyO3 bindings for reportscrub_core
use log::warn;
use once_cell::sync::Lazy;
use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyModule};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use reportscrub_core as scrub;

use scrub::{Category, Deltas, RunTotals, ScrubConfig, ScrubEngine, ScrubError, TokenMatcher};

// Parallel iterators for batch extraction
use rayon::prelude::*;

/// Engine plus the mappings accumulated since it was configured. Every resolve
/// happens under the write lock, so callers from several Python threads still
/// see one fake value per original.
struct EngineState {
    cfg: ScrubConfig,
    engine: ScrubEngine,
    totals: RunTotals,
}

static ENGINE: Lazy<RwLock<Option<EngineState>>> = Lazy::new(|| RwLock::new(None));

fn to_py_err(e: ScrubError) -> PyErr {
    match e {
        ScrubError::Io { .. } | ScrubError::NotText { .. } => PyIOError::new_err(e.to_string()),
        ScrubError::Exhausted { .. } | ScrubError::Collision { .. } | ScrubError::Inconsistent { .. } => {
            PyRuntimeError::new_err(e.to_string())
        }
        _ => PyValueError::new_err(e.to_string()),
    }
}

fn not_configured() -> PyErr {
    PyValueError::new_err("No configuration loaded. Call load_config() or set_config_json().")
}

fn parse_category(name: &str) -> PyResult<Category> {
    Category::parse(name).ok_or_else(|| PyValueError::new_err(format!("Unknown category: {}", name)))
}

fn install(cfg: ScrubConfig) -> PyResult<bool> {
    let engine = ScrubEngine::from_config(&cfg).map_err(to_py_err)?;
    let mut g = ENGINE.write().unwrap();
    *g = Some(EngineState { cfg, engine, totals: RunTotals::default() });
    Ok(true)
}

fn loaded_matcher(category: Category) -> PyResult<Box<dyn TokenMatcher>> {
    let g = ENGINE.read().unwrap();
    let built = match g.as_ref() {
        Some(state) => scrub::matcher_for(category, &state.cfg),
        None => scrub::matcher_for(category, &ScrubConfig::default()),
    };
    built.map_err(to_py_err)
}

fn deltas_to_dict<'py>(py: Python<'py>, deltas: &Deltas) -> PyResult<Bound<'py, PyDict>> {
    let d = PyDict::new(py);
    for (category, pairs) in deltas.iter() {
        let sub = PyDict::new(py);
        for (orig, fake) in pairs {
            sub.set_item(orig, fake)?;
        }
        d.set_item(category.as_str(), sub)?;
    }
    Ok(d)
}

fn path_strings(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| p.display().to_string()).collect()
}

fn totals_as_maps(totals: &RunTotals) -> BTreeMap<&'static str, &BTreeMap<String, String>> {
    totals.iter().map(|m| (m.category().as_str(), m.as_map())).collect()
}

/// Load scrubbing options from a JSON file path and build a fresh engine.
/// Returns True on success. Raises ValueError on invalid configuration.
#[pyfunction]
#[pyo3(text_signature = "(config_path)")]
fn load_config(config_path: &str) -> PyResult<bool> {
    let cfg = ScrubConfig::load(Path::new(config_path)).map_err(to_py_err)?;
    install(cfg)
}

/// Set scrubbing options from a JSON string and build a fresh engine.
#[pyfunction]
#[pyo3(text_signature = "(config_json)")]
fn set_config_json(config_json: &str) -> PyResult<bool> {
    let cfg = ScrubConfig::from_json(config_json).map_err(to_py_err)?;
    install(cfg)
}

/// Seed the engine with translation files of an earlier run found in `dir`.
/// The loaded pairs are kept in the exported and saved mappings.
/// Returns the number of pairs loaded.
#[pyfunction]
#[pyo3(text_signature = "(dir)")]
fn load_mappings(dir: &str) -> PyResult<usize> {
    let mut g = ENGINE.write().unwrap();
    let state = g.as_mut().ok_or_else(not_configured)?;
    let added = state.engine.seed_from_dir(Path::new(dir), &state.cfg).map_err(to_py_err)?;
    state.totals.absorb(&RunTotals::from_engine(&state.engine)).map_err(to_py_err)?;
    Ok(added)
}

/// Return engine status: enabled categories and mapping sizes.
#[pyfunction]
#[pyo3(text_signature = "()")]
fn get_engine_status(py: Python) -> PyResult<Py<PyDict>> {
    let d = PyDict::new(py);
    let g = ENGINE.read().unwrap();
    match g.as_ref() {
        Some(state) => {
            let categories: Vec<&str> = state.engine.categories().iter().map(|c| c.as_str()).collect();
            let pairs: usize = state.totals.iter().map(|m| m.len()).sum();
            d.set_item("configured", true)?;
            d.set_item("categories", categories)?;
            d.set_item("pairs", pairs)?;
            d.set_item("exclude_files", state.cfg.exclude_files.clone())?;
        }
        None => {
            d.set_item("configured", false)?;
        }
    }
    Ok(d.unbind())
}

/// Scrub one line. Returns (scrubbed_line, {category: {original: fake}}).
#[pyfunction]
#[pyo3(text_signature = "(line)")]
fn scrub_line(py: Python, line: &str) -> PyResult<(String, Py<PyDict>)> {
    let mut g = ENGINE.write().unwrap();
    let state = g.as_mut().ok_or_else(not_configured)?;
    let outcome = state.engine.scrub_line(line).map_err(to_py_err)?;
    state.totals.merge(&outcome.deltas).map_err(to_py_err)?;
    let deltas = deltas_to_dict(py, &outcome.deltas)?;
    Ok((outcome.line, deltas.unbind()))
}

/// Scrub a single file in place. Returns True when the file was rewritten.
/// Raises OSError when the file cannot be read or written.
#[pyfunction]
#[pyo3(text_signature = "(path)")]
fn scrub_file(path: &str) -> PyResult<bool> {
    let mut g = ENGINE.write().unwrap();
    let state = g.as_mut().ok_or_else(not_configured)?;
    let outcome = scrub::process_file(&mut state.engine, Path::new(path)).map_err(to_py_err)?;
    state.totals.merge(&outcome.deltas).map_err(to_py_err)?;
    Ok(outcome.modified)
}

/// Scrub a list of files, skipping excluded base names (the configured list
/// unless `exclusions` is given). Per-file failures are reported, not raised.
#[pyfunction]
#[pyo3(signature = (paths, exclusions=None), text_signature = "(paths, exclusions=None)")]
fn scrub_files(py: Python, paths: Vec<String>, exclusions: Option<Vec<String>>) -> PyResult<Py<PyDict>> {
    let mut g = ENGINE.write().unwrap();
    let state = g.as_mut().ok_or_else(not_configured)?;
    let exclusions = exclusions.unwrap_or_else(|| state.cfg.exclude_files.clone());
    let paths: Vec<PathBuf> = paths.into_iter().map(PathBuf::from).collect();
    let report = scrub::run(&mut state.engine, &paths, &exclusions).map_err(to_py_err)?;
    state.totals.absorb(&report.totals).map_err(to_py_err)?;

    let d = PyDict::new(py);
    d.set_item("scrubbed", path_strings(&report.scrubbed))?;
    d.set_item("clean", path_strings(&report.clean))?;
    d.set_item("excluded", path_strings(&report.excluded))?;
    let failures: Vec<(String, String)> =
        report.failures.iter().map(|(p, e)| (p.display().to_string(), e.to_string())).collect();
    d.set_item("failures", failures)?;
    d.set_item("exit_code", report.exit_code())?;
    Ok(d.unbind())
}

/// Recursively list the regular files below an extracted report directory.
#[pyfunction]
#[pyo3(text_signature = "(dir)")]
fn collect_files(dir: &str) -> PyResult<Vec<String>> {
    let files = scrub::collect_files(Path::new(dir)).map_err(to_py_err)?;
    Ok(path_strings(&files))
}

/// Export the accumulated mappings as a nested dict: category -> {original: fake}.
#[pyfunction]
#[pyo3(text_signature = "()")]
fn export_mappings(py: Python) -> PyResult<Py<PyDict>> {
    let g = ENGINE.read().unwrap();
    let d = PyDict::new(py);
    if let Some(state) = g.as_ref() {
        for (category, pairs) in totals_as_maps(&state.totals) {
            let sub = PyDict::new(py);
            for (orig, fake) in pairs {
                sub.set_item(orig, fake)?;
            }
            d.set_item(category, sub)?;
        }
    }
    Ok(d.unbind())
}

/// Export the accumulated mappings as a JSON document.
#[pyfunction]
#[pyo3(text_signature = "()")]
fn export_mappings_json() -> PyResult<String> {
    let g = ENGINE.read().unwrap();
    let state = g.as_ref().ok_or_else(not_configured)?;
    serde_json::to_string_pretty(&totals_as_maps(&state.totals)).map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Write one translation file per category into `dir`. Returns the written paths.
#[pyfunction]
#[pyo3(text_signature = "(dir)")]
fn save_mappings(dir: &str) -> PyResult<Vec<String>> {
    let g = ENGINE.read().unwrap();
    let state = g.as_ref().ok_or_else(not_configured)?;
    let written = state.totals.persist(Path::new(dir), &state.cfg).map_err(to_py_err)?;
    Ok(path_strings(&written))
}

/// Extract the tokens of one category from a line without scrubbing anything.
/// Uses the loaded configuration's word lists, or defaults when none is loaded.
#[pyfunction]
#[pyo3(text_signature = "(category, line)")]
fn extract_tokens(category: &str, line: &str) -> PyResult<Vec<String>> {
    let category = parse_category(category)?;
    let matcher = loaded_matcher(category)?;
    Ok(scrub::extract(matcher.as_ref(), line).into_iter().map(str::to_string).collect())
}

/// Extract the tokens of one category from many lines in parallel.
/// Extraction is pure, so no engine lock is held while Rayon works.
#[pyfunction]
#[pyo3(text_signature = "(category, lines)")]
fn extract_tokens_batch(category: &str, lines: Vec<String>) -> PyResult<Vec<Vec<String>>> {
    let category = parse_category(category)?;
    let matcher = loaded_matcher(category)?;
    let out: Vec<Vec<String>> = lines
        .par_iter()
        .map(|line| scrub::extract(matcher.as_ref(), line).into_iter().map(str::to_string).collect())
        .collect();
    Ok(out)
}

#[pymodule]
#[pyo3(module = "reportscrub")]
fn reportscrub(_py: Python, m: &Bound<PyModule>) -> PyResult<()> {
    m.add(
        "__doc__",
        "Scrub public IPs, domains, hostnames, user names and keywords from report files.\n\n\
        Every original value maps to one stable fake value for the life of the\n\
        loaded engine, and the mappings can be saved as JSON translation files.\n\n\
        Quick start:\n\
        >>> import reportscrub as rs\n\
        >>> rs.set_config_json('{\"obfuscate_public_ip\": true}')\n\
        >>> rs.scrub_line('dns 8.8.8.8')\n\
        ('dns 42.42.0.1', {'ip': {'8.8.8.8': '42.42.0.1'}})",
    )?;

    // Engine setup
    m.add_function(wrap_pyfunction!(load_config, m)?)?;
    m.add_function(wrap_pyfunction!(set_config_json, m)?)?;
    m.add_function(wrap_pyfunction!(load_mappings, m)?)?;
    m.add_function(wrap_pyfunction!(get_engine_status, m)?)?;

    // Scrubbing
    m.add_function(wrap_pyfunction!(scrub_line, m)?)?;
    m.add_function(wrap_pyfunction!(scrub_file, m)?)?;
    m.add_function(wrap_pyfunction!(scrub_files, m)?)?;
    m.add_function(wrap_pyfunction!(collect_files, m)?)?;

    // Mappings
    m.add_function(wrap_pyfunction!(export_mappings, m)?)?;
    m.add_function(wrap_pyfunction!(export_mappings_json, m)?)?;
    m.add_function(wrap_pyfunction!(save_mappings, m)?)?;

    // Extraction helpers
    m.add_function(wrap_pyfunction!(extract_tokens, m)?)?;
    m.add_function(wrap_pyfunction!(extract_tokens_batch, m)?)?;

    // Optional: preload a configuration from env var
    if let Ok(path) = std::env::var("REPORTSCRUB_CONFIG") {
        match ScrubConfig::load(Path::new(&path)) {
            Ok(cfg) => {
                if let Err(e) = install(cfg) {
                    warn!("Ignoring REPORTSCRUB_CONFIG={}: {}", path, e);
                }
            }
            Err(e) => warn!("Ignoring REPORTSCRUB_CONFIG={}: {}", path, e),
        }
    }

    Ok(())
}
