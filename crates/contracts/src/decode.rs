//! Typed decoding of engine payloads.
//!
//! Structural decoding is strict for fields that steer the engine (scenario,
//! forced weather) and lenient for display-only enumerations. After the
//! structural pass, snapshot invariants are checked. Every failure names the
//! offending field path, e.g. `planes[2].flight_code`.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::{AirlineCost, SimulationConfig, SimulationSnapshot};

const ROOT_PATH: &str = ".";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("schema violation at `{path}`: {message}")]
pub struct SchemaError {
    pub path: String,
    pub message: String,
}

impl SchemaError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    fn from_path_error(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
        let path = err.path().to_string();
        let message = err.inner().to_string();

        // serde reports a missing field at its parent; point at the field itself.
        let path = match missing_field(&message) {
            Some(field) if path == ROOT_PATH => field.to_string(),
            Some(field) => format!("{path}.{field}"),
            None => path,
        };

        Self { path, message }
    }

    fn nested(self, prefix: &str) -> Self {
        let path = if self.path == ROOT_PATH {
            prefix.to_string()
        } else {
            format!("{prefix}.{}", self.path)
        };
        Self { path, ..self }
    }
}

fn missing_field(message: &str) -> Option<&str> {
    message
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split('`').next())
}

fn decode_value<T: DeserializeOwned>(payload: &Value) -> Result<T, SchemaError> {
    serde_path_to_error::deserialize(payload).map_err(SchemaError::from_path_error)
}

pub fn decode_snapshot(payload: &Value) -> Result<SimulationSnapshot, SchemaError> {
    let snapshot: SimulationSnapshot = decode_value(payload)?;
    validate_snapshot(&snapshot)?;
    Ok(snapshot)
}

pub fn decode_snapshot_str(body: &str) -> Result<SimulationSnapshot, SchemaError> {
    let payload: Value = serde_json::from_str(body)
        .map_err(|err| SchemaError::new(ROOT_PATH, format!("invalid json: {err}")))?;
    decode_snapshot(&payload)
}

pub fn decode_config(payload: &Value) -> Result<SimulationConfig, SchemaError> {
    let config: SimulationConfig = decode_value(payload)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &SimulationConfig) -> Result<(), SchemaError> {
    match config.numeric_violation() {
        Some((field, value)) => Err(SchemaError::new(
            field,
            format!("expected a non-negative finite number, got {value}"),
        )),
        None => Ok(()),
    }
}

pub fn validate_snapshot(snapshot: &SimulationSnapshot) -> Result<(), SchemaError> {
    validate_config(&snapshot.config).map_err(|err| err.nested("config"))?;

    for (index, runway) in snapshot.runways.iter().enumerate() {
        if !runway.busy {
            if let Some(plane_id) = runway.plane_id {
                return Err(SchemaError::new(
                    format!("runways[{index}].plane_id"),
                    format!("idle runway {} reports occupying aircraft {plane_id}", runway.id),
                ));
            }
        }
    }

    for (index, airline) in snapshot.airlines.iter().enumerate() {
        if let Some(AirlineCost::Breakdown(breakdown)) = &airline.cost {
            if !breakdown.is_consistent() {
                return Err(SchemaError::new(
                    format!("airlines[{index}].costo.total"),
                    format!(
                        "total {} does not match component sum {}",
                        breakdown.total,
                        breakdown.component_sum()
                    ),
                ));
            }
        }
    }

    for plane in snapshot.orphaned_aircraft() {
        log::warn!(
            "step={} aircraft {} ({}) references airline {} missing from snapshot",
            snapshot.step,
            plane.id,
            plane.flight_code,
            plane.airline.code
        );
    }

    Ok(())
}
