//! Layered policy resolution: builtin defaults, then YAML files, then the
//! environment, then command-line assignments.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::defaults::default_snapshot;
use crate::errors::PolicyError;
use crate::merge::{assign, KNOWN_PATHS};
use crate::model::{PolicySnapshot, PolicySource};

/// `PAGEDEFER_POLICY__ACTIVATION__MIN_DELAY_MS=50` assigns `activation.min_delay_ms`.
pub const ENV_PREFIX: &str = "PAGEDEFER_POLICY__";
/// A JSON document merged like a policy file, at env precedence.
pub const ENV_JSON: &str = "PAGEDEFER_POLICY_OVERRIDE_JSON";
/// Comma separated `path=value` pairs applied at CLI precedence.
pub const ENV_CLI_OVERRIDES: &str = "PAGEDEFER_POLICY_CLI_OVERRIDES";

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    /// Policy files in precedence order. Missing files are skipped.
    pub paths: Vec<PathBuf>,
    pub include_env: bool,
    pub include_cli_env: bool,
    /// `path=value` pairs handed over directly by the command line.
    pub cli_overrides: Vec<String>,
}

impl LoadOptions {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
            include_env: true,
            include_cli_env: true,
            cli_overrides: Vec::new(),
        }
    }

    fn layers(&self) -> Vec<Layer<'_>> {
        let mut layers: Vec<Layer<'_>> = self.paths.iter().map(|p| Layer::File(p.as_path())).collect();
        if self.include_env {
            layers.push(Layer::Env);
        }
        if self.include_cli_env {
            layers.push(Layer::CliEnv);
        }
        if !self.cli_overrides.is_empty() {
            layers.push(Layer::Cli(self.cli_overrides.as_slice()));
        }
        layers
    }
}

pub fn load_snapshot(path: Option<&Path>) -> Result<PolicySnapshot, PolicyError> {
    let options = match path {
        Some(path) => LoadOptions::with_path(path),
        None => LoadOptions {
            include_env: true,
            include_cli_env: true,
            ..LoadOptions::default()
        },
    };
    load_snapshot_with_options(&options)
}

pub fn load_snapshot_with_options(options: &LoadOptions) -> Result<PolicySnapshot, PolicyError> {
    let mut snapshot = default_snapshot();
    for path in KNOWN_PATHS {
        snapshot.set_provenance(path, PolicySource::Builtin);
    }

    for layer in options.layers() {
        let assignments = layer.assignments()?;
        if !assignments.is_empty() {
            debug!(
                target: "policy-center",
                layer = %layer.describe(),
                assignments = assignments.len(),
                "applying policy layer"
            );
        }
        for (path, value) in assignments {
            assign(&mut snapshot, &path, &value, layer.source())?;
        }
    }
    Ok(snapshot)
}

enum Layer<'a> {
    File(&'a Path),
    Env,
    CliEnv,
    Cli(&'a [String]),
}

impl Layer<'_> {
    fn source(&self) -> PolicySource {
        match self {
            Layer::File(_) => PolicySource::File,
            Layer::Env => PolicySource::Env,
            Layer::CliEnv | Layer::Cli(_) => PolicySource::Cli,
        }
    }

    fn describe(&self) -> String {
        match self {
            Layer::File(path) => format!("file:{}", path.display()),
            Layer::Env => "env".to_string(),
            Layer::CliEnv => format!("env:{ENV_CLI_OVERRIDES}"),
            Layer::Cli(_) => "cli".to_string(),
        }
    }

    fn assignments(&self) -> Result<Vec<(String, Value)>, PolicyError> {
        match self {
            Layer::File(path) => file_assignments(path),
            Layer::Env => env_assignments(),
            Layer::CliEnv => Ok(env::var(ENV_CLI_OVERRIDES)
                .map(|raw| pair_assignments(raw.split(',')))
                .unwrap_or_default()),
            Layer::Cli(pairs) => Ok(pair_assignments(pairs.iter().map(String::as_str))),
        }
    }
}

fn file_assignments(path: &Path) -> Result<Vec<(String, Value)>, PolicyError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path).map_err(|err| PolicyError::Read {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let origin = path.display().to_string();
    let document: serde_yaml::Value =
        serde_yaml::from_str(&raw).map_err(|err| PolicyError::malformed(&origin, err))?;
    let document = serde_json::to_value(document).map_err(|err| PolicyError::malformed(&origin, err))?;
    let mut out = Vec::new();
    flatten_into(&mut out, String::new(), document);
    Ok(out)
}

fn env_assignments() -> Result<Vec<(String, Value)>, PolicyError> {
    let mut out: Vec<(String, Value)> = env::vars()
        .filter_map(|(key, raw)| {
            let path = env_key_to_path(key.strip_prefix(ENV_PREFIX)?)?;
            Some((path, scalar(&raw)))
        })
        .collect();
    // Deterministic order regardless of the process environment.
    out.sort_by(|a, b| a.0.cmp(&b.0));

    if let Ok(raw) = env::var(ENV_JSON) {
        if !raw.trim().is_empty() {
            let document: Value =
                serde_json::from_str(&raw).map_err(|err| PolicyError::malformed(ENV_JSON, err))?;
            flatten_into(&mut out, String::new(), document);
        }
    }
    Ok(out)
}

fn env_key_to_path(suffix: &str) -> Option<String> {
    let segments: Vec<String> = suffix
        .split("__")
        .filter(|segment| !segment.is_empty())
        .map(str::to_ascii_lowercase)
        .collect();
    (!segments.is_empty()).then(|| segments.join("."))
}

fn pair_assignments<'a>(pairs: impl Iterator<Item = &'a str>) -> Vec<(String, Value)> {
    pairs
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (path, raw) = pair.split_once('=').unwrap_or((pair, ""));
            let path = path.trim();
            (!path.is_empty()).then(|| (path.to_ascii_lowercase(), scalar(raw.trim())))
        })
        .collect()
}

/// Env and CLI values arrive as text: JSON literals first, then a plain string.
fn scalar(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Nested mappings become dotted paths; leaves keep their JSON value.
fn flatten_into(out: &mut Vec<(String, Value)>, prefix: String, value: Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let key = key.trim().to_ascii_lowercase();
                let path = if prefix.is_empty() {
                    key
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(out, path, child);
            }
        }
        leaf if !prefix.is_empty() => out.push((prefix, leaf)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_nested_documents() {
        let mut out = Vec::new();
        flatten_into(
            &mut out,
            String::new(),
            json!({"Activation": {"min_delay_ms": 50}, "features": {"streaming_shell": false}}),
        );
        assert!(out.contains(&("activation.min_delay_ms".to_string(), json!(50))));
        assert!(out.contains(&("features.streaming_shell".to_string(), json!(false))));
    }

    #[test]
    fn pairs_parse_json_scalars() {
        let out = pair_assignments(
            ["activation.min_delay_ms=75", " priorities.low = interaction ", "", "=x"].into_iter(),
        );
        assert_eq!(
            out,
            vec![
                ("activation.min_delay_ms".to_string(), json!(75)),
                ("priorities.low".to_string(), json!("interaction")),
            ]
        );
    }

    #[test]
    fn env_keys_map_to_lowercase_paths() {
        assert_eq!(
            env_key_to_path("ACTIVATION__ROOT_MARGIN_PX").as_deref(),
            Some("activation.root_margin_px")
        );
        assert_eq!(env_key_to_path("__"), None);
    }

    #[test]
    fn missing_files_contribute_nothing() {
        let layer = Layer::File(Path::new("/nonexistent/pagedefer-policy.yaml"));
        assert!(layer.assignments().unwrap().is_empty());
    }
}
