use std::fmt;

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

/// Display-only aircraft state. Values the client does not know decode to
/// `Unknown` so newer engines do not break older clients.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AircraftState {
    Arriving,
    Holding,
    Waiting,
    #[serde(rename = "queued_departure")]
    QueuedForDeparture,
    Departing,
    Diverted,
    Gone,
    Unknown,
}

impl AircraftState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Arriving => "arriving",
            Self::Holding => "holding",
            Self::Waiting => "waiting",
            Self::QueuedForDeparture => "queued_departure",
            Self::Departing => "departing",
            Self::Diverted => "diverted",
            Self::Gone => "gone",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_wire(value: &str) -> Self {
        match value {
            "arriving" => Self::Arriving,
            "holding" => Self::Holding,
            "waiting" => Self::Waiting,
            "queued_departure" | "queued_for_departure" => Self::QueuedForDeparture,
            "departing" => Self::Departing,
            "diverted" => Self::Diverted,
            "gone" => Self::Gone,
            _ => Self::Unknown,
        }
    }

    /// Aircraft still inside the simulated airspace or on the ground.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Diverted | Self::Gone)
    }
}

impl<'de> Deserialize<'de> for AircraftState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StateInput {
            Text(String),
            Other(IgnoredAny),
        }

        match StateInput::deserialize(deserializer)? {
            StateInput::Text(raw) => Ok(Self::from_wire(&raw)),
            StateInput::Other(_) => Ok(Self::Unknown),
        }
    }
}

impl fmt::Display for AircraftState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Airline reference carried on each aircraft.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AirlineRef {
    pub name: String,
    pub code: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Aircraft {
    pub id: i64,
    pub flight_code: String,
    pub x: f64,
    pub y: f64,
    pub state: AircraftState,
    #[serde(rename = "prioridad", alias = "priority")]
    pub priority: i64,
    #[serde(rename = "combustible", alias = "fuel")]
    pub fuel: f64,
    #[serde(rename = "emergencia", alias = "emergency")]
    pub emergency: bool,
    #[serde(rename = "goaround_blink", alias = "go_around_blink")]
    pub go_around_blink: u32,
    #[serde(rename = "desviado", alias = "diverted")]
    pub diverted: bool,
    #[serde(rename = "distancia", alias = "distance")]
    pub distance: f64,
    #[serde(default)]
    pub holding_time: f64,
    pub airline: AirlineRef,
}

impl Aircraft {
    pub fn is_going_around(&self) -> bool {
        self.go_around_blink > 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Runway {
    pub id: i64,
    pub busy: bool,
    pub remaining: f64,
    #[serde(default)]
    pub plane_id: Option<i64>,
}
