//! Wire contracts for the air-traffic simulation engine: configuration,
//! snapshots, and the decoding rules that turn engine JSON into typed values.

mod airline;
pub mod decode;
mod metrics;
mod traffic;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use airline::{Airline, AirlineCost, AirlinePerformance, CostBreakdown};
pub use decode::{decode_config, decode_snapshot, decode_snapshot_str, SchemaError};
pub use metrics::{
    AdvancedMetrics, DayPeriod, Metrics, ObservedWeather, TimeOfDay, TowerStats, WeatherInfo,
};
pub use traffic::{Aircraft, AircraftState, AirlineRef, Runway};

pub const DEFAULT_MAX_HOLDING_TIME: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseVariantError {
    pub kind: &'static str,
    pub value: String,
}

/// Traffic profile the engine generates arrivals and departures from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Scenario {
    #[default]
    #[serde(rename = "Equilibrio", alias = "Balanced")]
    Balanced,
    #[serde(rename = "Normal")]
    Normal,
    #[serde(rename = "Sobrecarga", alias = "Overload")]
    Overload,
    #[serde(rename = "Libre", alias = "Free")]
    Free,
}

impl Scenario {
    pub const ALL: [Self; 4] = [Self::Balanced, Self::Normal, Self::Overload, Self::Free];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Balanced => "Equilibrio",
            Self::Normal => "Normal",
            Self::Overload => "Sobrecarga",
            Self::Free => "Libre",
        }
    }

    fn english_name(self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::Normal => "normal",
            Self::Overload => "overload",
            Self::Free => "free",
        }
    }
}

impl FromStr for Scenario {
    type Err = ParseVariantError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|scenario| {
                scenario.as_str().to_lowercase() == normalized
                    || scenario.english_name() == normalized
            })
            .ok_or_else(|| ParseVariantError {
                kind: "scenario",
                value: value.to_string(),
            })
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weather variant. In a config this forces the engine's weather, with
/// `None` leaving weather to the engine.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum WeatherKind {
    #[default]
    #[serde(rename = "ninguno", alias = "none")]
    None,
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "lluvia", alias = "rain")]
    Rain,
    #[serde(rename = "tormenta", alias = "storm")]
    Storm,
    #[serde(rename = "viento_fuerte", alias = "strong_wind")]
    StrongWind,
    #[serde(rename = "niebla", alias = "fog")]
    Fog,
    #[serde(rename = "microburst")]
    Microburst,
}

impl WeatherKind {
    pub const ALL: [Self; 7] = [
        Self::None,
        Self::Normal,
        Self::Rain,
        Self::Storm,
        Self::StrongWind,
        Self::Fog,
        Self::Microburst,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "ninguno",
            Self::Normal => "normal",
            Self::Rain => "lluvia",
            Self::Storm => "tormenta",
            Self::StrongWind => "viento_fuerte",
            Self::Fog => "niebla",
            Self::Microburst => "microburst",
        }
    }

    fn english_name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Normal => "normal",
            Self::Rain => "rain",
            Self::Storm => "storm",
            Self::StrongWind => "strong_wind",
            Self::Fog => "fog",
            Self::Microburst => "microburst",
        }
    }

    /// Exact wire lookup, wire names or English aliases.
    pub fn from_wire(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value || kind.english_name() == value)
    }
}

impl FromStr for WeatherKind {
    type Err = ParseVariantError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_wire(&value.trim().to_lowercase()).ok_or_else(|| ParseVariantError {
            kind: "weather",
            value: value.to_string(),
        })
    }
}

impl fmt::Display for WeatherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters submitted on reset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationConfig {
    pub scenario: Scenario,
    pub allow_diversion: bool,
    pub max_holding_time: f64,
    #[serde(rename = "clima_manual", alias = "forced_weather")]
    pub forced_weather: WeatherKind,
    #[serde(rename = "usar_probabilidades", alias = "probabilistic")]
    pub probabilistic: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ground: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub takeoff_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_release_per_step: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes_per_step: Option<f64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            scenario: Scenario::Balanced,
            allow_diversion: false,
            max_holding_time: DEFAULT_MAX_HOLDING_TIME,
            forced_weather: WeatherKind::None,
            probabilistic: true,
            arrival_rate: None,
            max_ground: None,
            turn_time: None,
            takeoff_time: None,
            max_release_per_step: None,
            minutes_per_step: None,
        }
    }
}

impl SimulationConfig {
    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenario = scenario;
        self
    }

    pub fn with_diversion(mut self, allow_diversion: bool) -> Self {
        self.allow_diversion = allow_diversion;
        self
    }

    pub fn with_max_holding_time(mut self, max_holding_time: f64) -> Self {
        self.max_holding_time = max_holding_time;
        self
    }

    pub fn with_forced_weather(mut self, weather: WeatherKind) -> Self {
        self.forced_weather = weather;
        self
    }

    pub fn with_probabilistic(mut self, probabilistic: bool) -> Self {
        self.probabilistic = probabilistic;
        self
    }

    pub fn with_arrival_rate(mut self, rate: f64) -> Self {
        self.arrival_rate = Some(rate);
        self
    }

    pub fn with_max_ground(mut self, max_ground: u32) -> Self {
        self.max_ground = Some(max_ground);
        self
    }

    pub fn with_turn_time(mut self, turn_time: f64) -> Self {
        self.turn_time = Some(turn_time);
        self
    }

    pub fn with_takeoff_time(mut self, takeoff_time: f64) -> Self {
        self.takeoff_time = Some(takeoff_time);
        self
    }

    pub fn with_max_release_per_step(mut self, max_release: u32) -> Self {
        self.max_release_per_step = Some(max_release);
        self
    }

    pub fn with_minutes_per_step(mut self, minutes: f64) -> Self {
        self.minutes_per_step = Some(minutes);
        self
    }

    /// First numeric field that is negative or not finite, by wire name.
    /// Integer tunables are unsigned and cannot violate.
    pub fn numeric_violation(&self) -> Option<(&'static str, f64)> {
        let fields = [
            ("max_holding_time", Some(self.max_holding_time)),
            ("arrival_rate", self.arrival_rate),
            ("turn_time", self.turn_time),
            ("takeoff_time", self.takeoff_time),
            ("minutes_per_step", self.minutes_per_step),
        ];

        fields.into_iter().find_map(|(name, value)| {
            value
                .filter(|value| !value.is_finite() || *value < 0.0)
                .map(|value| (name, value))
        })
    }
}

/// Complete engine state at one step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationSnapshot {
    pub step: u64,
    pub config: SimulationConfig,
    pub planes: Vec<Aircraft>,
    pub airlines: Vec<Airline>,
    pub metrics: Metrics,
    pub runways: Vec<Runway>,
}

impl SimulationSnapshot {
    pub fn aircraft_count(&self) -> usize {
        self.planes.len()
    }

    pub fn holding_count(&self) -> usize {
        self.aircraft_in_state(AircraftState::Holding).count()
    }

    pub fn has_go_around(&self) -> bool {
        self.planes.iter().any(Aircraft::is_going_around)
    }

    pub fn aircraft_in_state(&self, state: AircraftState) -> impl Iterator<Item = &Aircraft> {
        self.planes.iter().filter(move |plane| plane.state == state)
    }

    pub fn airline(&self, code: &str) -> Option<&Airline> {
        self.airlines.iter().find(|airline| airline.code == code)
    }

    pub fn aircraft(&self, id: i64) -> Option<&Aircraft> {
        self.planes.iter().find(|plane| plane.id == id)
    }

    pub fn runway_for(&self, aircraft_id: i64) -> Option<&Runway> {
        self.runways
            .iter()
            .find(|runway| runway.plane_id == Some(aircraft_id))
    }

    /// Aircraft whose airline code is missing from `airlines`. The engine is
    /// not required to keep these consistent, so they are reported, not
    /// rejected.
    pub fn orphaned_aircraft(&self) -> impl Iterator<Item = &Aircraft> {
        self.planes
            .iter()
            .filter(move |plane| self.airline(&plane.airline.code).is_none())
    }

    pub fn busy_runways(&self) -> usize {
        self.runways.iter().filter(|runway| runway.busy).count()
    }
}

impl fmt::Display for SimulationSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step={} scenario={} aircraft={} holding={} runways_busy={}/{} arrivals={} departures={} diverted={} weather={}",
            self.step,
            self.config.scenario,
            self.aircraft_count(),
            self.holding_count(),
            self.busy_runways(),
            self.runways.len(),
            self.metrics.total_arrivals,
            self.metrics.total_departures,
            self.metrics.total_diverted,
            self.metrics.weather.kind,
        )
    }
}
