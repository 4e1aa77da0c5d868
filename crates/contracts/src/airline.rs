use serde::{Deserialize, Serialize};

const COST_TOLERANCE: f64 = 1e-6;

/// Per-airline totals, as reported by engines that track costs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Airline {
    pub name: String,
    pub code: String,
    pub color: String,
    #[serde(rename = "vuelos", alias = "flights", default, skip_serializing_if = "Option::is_none")]
    pub flights: Option<u64>,
    #[serde(rename = "desvios", alias = "diversions", default, skip_serializing_if = "Option::is_none")]
    pub diversions: Option<u64>,
    #[serde(rename = "costo", alias = "cost", default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<AirlineCost>,
    #[serde(
        rename = "retraso_promedio",
        alias = "average_delay",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub average_delay: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<AirlinePerformance>,
}

impl Airline {
    pub fn new(name: impl Into<String>, code: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            color: color.into(),
            flights: None,
            diversions: None,
            cost: None,
            average_delay: None,
            performance: None,
        }
    }
}

/// Older engines send a single number; newer ones send the breakdown.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AirlineCost {
    Total(f64),
    Breakdown(CostBreakdown),
}

impl AirlineCost {
    pub fn total(&self) -> f64 {
        match self {
            Self::Total(total) => *total,
            Self::Breakdown(breakdown) => breakdown.total,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CostBreakdown {
    pub fuel: f64,
    pub delay: f64,
    pub diversion: f64,
    pub emergency: f64,
    pub total: f64,
}

impl CostBreakdown {
    pub fn from_parts(fuel: f64, delay: f64, diversion: f64, emergency: f64) -> Self {
        Self {
            fuel,
            delay,
            diversion,
            emergency,
            total: fuel + delay + diversion + emergency,
        }
    }

    pub fn component_sum(&self) -> f64 {
        self.fuel + self.delay + self.diversion + self.emergency
    }

    pub fn is_consistent(&self) -> bool {
        let sum = self.component_sum();
        (self.total - sum).abs() <= COST_TOLERANCE * sum.abs().max(1.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AirlinePerformance {
    pub avg_holding_time: f64,
    pub diversion_rate: f64,
    pub cost_per_flight: f64,
    pub completed_flights: u64,
    pub efficiency_score: f64,
}
