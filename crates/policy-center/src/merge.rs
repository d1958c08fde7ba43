//! Assignment of one policy path, with the per-source merge rule.
//!
//! File and env layers may only make activation happen sooner: delays and
//! ceilings take the minimum, the proximity margin takes the maximum. CLI
//! assignments set values exactly.

use pagedefer_core_types::{DeferError, TriggerKind};
use serde_json::Value;

use crate::errors::PolicyError;
use crate::model::{PolicySnapshot, PolicySource};

/// Every path a layer may assign.
pub const KNOWN_PATHS: &[&str] = &[
    "activation.min_delay_ms",
    "activation.idle_timeout_ms",
    "activation.idle_fallback_delay_ms",
    "activation.interaction_ceiling_ms",
    "activation.proximity_fallback_ms",
    "activation.root_margin_px",
    "priorities.medium",
    "priorities.low",
    "viewport.constrained_max_width_px",
    "features.table_of_contents",
    "features.streaming_shell",
];

#[derive(Clone, Copy)]
enum Direction {
    /// Smaller means earlier activation.
    Lower,
    /// Larger means earlier activation.
    Higher,
}

fn replaces(source: PolicySource) -> bool {
    matches!(source, PolicySource::Cli)
}

pub(crate) fn assign(
    snapshot: &mut PolicySnapshot,
    path: &str,
    value: &Value,
    source: PolicySource,
) -> Result<(), PolicyError> {
    let changed = match path {
        "activation.min_delay_ms" => merge_timing(
            &mut snapshot.activation.min_delay_ms,
            millis(path, value)?,
            Direction::Lower,
            source,
        ),
        "activation.idle_timeout_ms" => merge_timing(
            &mut snapshot.activation.idle_timeout_ms,
            millis(path, value)?,
            Direction::Lower,
            source,
        ),
        "activation.idle_fallback_delay_ms" => merge_timing(
            &mut snapshot.activation.idle_fallback_delay_ms,
            millis(path, value)?,
            Direction::Lower,
            source,
        ),
        "activation.interaction_ceiling_ms" => merge_timing(
            &mut snapshot.activation.interaction_ceiling_ms,
            millis(path, value)?,
            Direction::Lower,
            source,
        ),
        "activation.proximity_fallback_ms" => merge_timing(
            &mut snapshot.activation.proximity_fallback_ms,
            millis(path, value)?,
            Direction::Lower,
            source,
        ),
        "activation.root_margin_px" => {
            let mut margin = u64::from(snapshot.activation.root_margin_px);
            let changed = merge_timing(&mut margin, pixels(path, value)?.into(), Direction::Higher, source);
            snapshot.activation.root_margin_px = u32::try_from(margin).unwrap_or(u32::MAX);
            changed
        }
        "priorities.medium" => replace(&mut snapshot.priorities.medium, strategy(path, value)?),
        "priorities.low" => replace(&mut snapshot.priorities.low, strategy(path, value)?),
        "viewport.constrained_max_width_px" => replace(
            &mut snapshot.viewport.constrained_max_width_px,
            pixels(path, value)?,
        ),
        "features.table_of_contents" => {
            replace(&mut snapshot.features.table_of_contents, flag(path, value)?)
        }
        "features.streaming_shell" => {
            replace(&mut snapshot.features.streaming_shell, flag(path, value)?)
        }
        unknown => return Err(PolicyError::UnsupportedPath(unknown.to_string())),
    };
    // An exact override owns the path even when it restates the current value.
    if changed || replaces(source) {
        snapshot.set_provenance(path, source);
    }
    Ok(())
}

fn merge_timing(target: &mut u64, candidate: u64, direction: Direction, source: PolicySource) -> bool {
    let merged = if replaces(source) {
        candidate
    } else {
        match direction {
            Direction::Lower => (*target).min(candidate),
            Direction::Higher => (*target).max(candidate),
        }
    };
    replace(target, merged)
}

fn replace<T: PartialEq>(target: &mut T, candidate: T) -> bool {
    if *target == candidate {
        return false;
    }
    *target = candidate;
    true
}

fn millis(path: &str, value: &Value) -> Result<u64, PolicyError> {
    value
        .as_u64()
        .ok_or_else(|| PolicyError::invalid_value(path, format!("expected milliseconds, got {value}")))
}

fn pixels(path: &str, value: &Value) -> Result<u32, PolicyError> {
    let raw = value
        .as_u64()
        .ok_or_else(|| PolicyError::invalid_value(path, format!("expected pixels, got {value}")))?;
    u32::try_from(raw).map_err(|_| PolicyError::invalid_value(path, format!("{raw}px is out of range")))
}

fn flag(path: &str, value: &Value) -> Result<bool, PolicyError> {
    value
        .as_bool()
        .ok_or_else(|| PolicyError::invalid_value(path, format!("expected true or false, got {value}")))
}

fn strategy(path: &str, value: &Value) -> Result<TriggerKind, PolicyError> {
    let name = value
        .as_str()
        .ok_or_else(|| PolicyError::invalid_value(path, format!("expected strategy name, got {value}")))?;
    name.parse()
        .map_err(|err: DeferError| PolicyError::invalid_value(path, err.to_string()))
}
