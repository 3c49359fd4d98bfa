//! Python bindings (`python-ext` feature).

use pyo3::prelude::*;

use crate::analysis::analyze_path_blocking;
use crate::config::ProbeConfig;

/// Register the probe functions with the module.
pub fn register_probe_bindings(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(probe_path_py, m)?)?;
    m.add_function(wrap_pyfunction!(crate::logging::init_logging, m)?)?;
    Ok(())
}

/// Analyse the executable at `path` and return the report as JSON.
#[pyfunction]
#[pyo3(name = "probe_path")]
#[pyo3(signature = (path, config_json=None))]
fn probe_path_py(path: String, config_json: Option<String>) -> PyResult<String> {
    let config = match config_json {
        Some(json) => ProbeConfig::from_json_str(&json)?,
        None => ProbeConfig::default(),
    };
    let report = analyze_path_blocking(&path, &config)?;
    Ok(report.to_json_string()?)
}
