//! Weather observation types and inline condition predicates.
//!
//! A `WeatherObservation` is the normalised reading handed to the selection
//! engine by a weather provider. `WeatherConditionSpec` is the optional
//! condition metadata a stored notice can carry (min/max temperature, allowed
//! sky conditions, minimum wind, humidity bounds).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Form of precipitation reported alongside the amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PrecipitationType {
    #[default]
    None,
    Rain,
    Snow,
    RainSnow,
}

/// Coarse sky label derived from the precipitation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SkyCondition {
    Clear,
    Rainy,
    Snowy,
    Cloudy,
}

/// A single normalised weather reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeatherObservation {
    /// Air temperature in °C
    pub temperature: f64,
    /// Relative humidity in percent (0–100)
    pub humidity: f64,
    /// Precipitation in mm/hour
    pub precipitation: f64,
    /// Wind speed in m/s
    pub wind_speed: f64,
    pub precipitation_type: PrecipitationType,
}

impl WeatherObservation {
    /// Sky label used by condition matching. Nowcasts carry no cloud data, so
    /// the label follows the precipitation type.
    pub fn sky_condition(&self) -> SkyCondition {
        match self.precipitation_type {
            PrecipitationType::None => SkyCondition::Clear,
            PrecipitationType::Rain => SkyCondition::Rainy,
            PrecipitationType::Snow => SkyCondition::Snowy,
            PrecipitationType::RainSnow => SkyCondition::Cloudy,
        }
    }
}

/// Inclusive numeric bounds; either side may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Range {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl Range {
    fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

/// Condition metadata attached to a weather notice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeatherConditionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Range>,
    /// Allowed sky conditions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Vec<SkyCondition>>,
    /// Only `min` is consulted for wind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<Range>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<Range>,
}

/// Whether `observation` satisfies every constraint present in `spec`.
///
/// Absent constraints are ignored, so an empty spec matches any observation.
/// Wind speed only has a lower bound; a `max` on it is ignored.
pub fn matches_condition(observation: &WeatherObservation, spec: &WeatherConditionSpec) -> bool {
    if let Some(range) = &spec.temperature {
        if !range.contains(observation.temperature) {
            return false;
        }
    }

    if let Some(allowed) = &spec.condition {
        if !allowed.contains(&observation.sky_condition()) {
            return false;
        }
    }

    if let Some(min) = spec.wind_speed.and_then(|w| w.min) {
        if observation.wind_speed < min {
            return false;
        }
    }

    if let Some(range) = &spec.humidity {
        if !range.contains(observation.humidity) {
            return false;
        }
    }

    true
}
