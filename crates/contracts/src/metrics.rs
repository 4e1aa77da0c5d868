use std::fmt;

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::WeatherKind;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metrics {
    pub total_arrivals: u64,
    pub total_departures: u64,
    pub total_diverted: u64,
    #[serde(rename = "emergencias", alias = "emergencies")]
    pub emergencies: u64,
    /// Aircraft waiting with elevated priority.
    #[serde(rename = "en_espera", alias = "waiting_priority")]
    pub waiting_priority: u64,
    #[serde(
        rename = "advanced_metrics",
        alias = "advanced",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub advanced: Option<AdvancedMetrics>,
    #[serde(
        rename = "tower_stats",
        alias = "tower",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub tower: Option<TowerStats>,
    #[serde(rename = "clima", alias = "weather")]
    pub weather: WeatherInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeOfDay>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AdvancedMetrics {
    pub throughput: f64,
    pub runway_utilization: f64,
    pub avg_holding_time: f64,
    pub fuel_efficiency: f64,
    pub emergency_rate: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TowerStats {
    pub reorders: u64,
    pub emergencies_handled: u64,
    pub diversions: u64,
    pub efficiency: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherInfo {
    #[serde(rename = "tipo", alias = "kind")]
    pub kind: ObservedWeather,
    pub factor: f64,
}

/// Weather as reported in metrics. Unlike the config's forced weather this
/// is informational, so unrecognized variants are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObservedWeather {
    Known(WeatherKind),
    Unrecognized(String),
}

impl ObservedWeather {
    pub fn known(&self) -> Option<WeatherKind> {
        match self {
            Self::Known(kind) => Some(*kind),
            Self::Unrecognized(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(kind) => kind.as_str(),
            Self::Unrecognized(raw) => raw,
        }
    }
}

impl From<WeatherKind> for ObservedWeather {
    fn from(kind: WeatherKind) -> Self {
        Self::Known(kind)
    }
}

impl fmt::Display for ObservedWeather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ObservedWeather {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ObservedWeather {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match WeatherKind::from_wire(&raw) {
            Some(kind) => Self::Known(kind),
            None => Self::Unrecognized(raw),
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DayPeriod {
    Morning,
    Day,
    Evening,
    Night,
}

impl DayPeriod {
    pub fn from_hour(hour: u8) -> Self {
        match hour {
            6..=11 => Self::Morning,
            12..=17 => Self::Day,
            18..=21 => Self::Evening,
            _ => Self::Night,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Day => "day",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
    #[serde(
        default,
        deserialize_with = "lenient_period",
        skip_serializing_if = "Option::is_none"
    )]
    pub period: Option<DayPeriod>,
}

impl TimeOfDay {
    pub fn period(&self) -> DayPeriod {
        self.period
            .unwrap_or_else(|| DayPeriod::from_hour(self.hour))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02} ({})", self.hour, self.minute, self.period().as_str())
    }
}

fn lenient_period<'de, D>(deserializer: D) -> Result<Option<DayPeriod>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PeriodInput {
        Known(DayPeriod),
        Other(IgnoredAny),
    }

    match PeriodInput::deserialize(deserializer)? {
        PeriodInput::Known(period) => Ok(Some(period)),
        PeriodInput::Other(_) => Ok(None),
    }
}
