//! Weather notice template catalog.
//!
//! The catalog is a JSON file loaded once at startup:
//!
//! ```json
//! {
//!   "thresholds": { "extreme_heat_c": 33.0, ... },
//!   "templates": {
//!     "hot_weather": [
//!       { "id": "hot-01", "title": "...", "content": "...",
//!         "category": "health", "priority": 1, "icon": "..." }
//!     ],
//!     "normal_weather": [ ... ]
//!   }
//! }
//! ```
//!
//! `thresholds` is optional and falls back to `SelectionThresholds::default()`.
//! Loading validates the catalog; any `CatalogError::Configuration` is fatal.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

/// File name of the catalog inside `DATA_DIR`.
pub const CATALOG_FILE_NAME: &str = "weather_notices.json";

/// Highest (most urgent) template priority.
pub const PRIORITY_HIGHEST: u8 = 1;
/// Lowest template priority.
pub const PRIORITY_LOWEST: u8 = 3;

/// Errors that can occur while loading the template catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error reading notice catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed notice catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Catalog misconfiguration: {0}")]
    Configuration(String),
}

/// Weather bucket a template belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ConditionGroup {
    HotWeather,
    ColdWeather,
    RainyWeather,
    SnowyWeather,
    WindyWeather,
    HumidWeather,
    NormalWeather,
    DustyWeather,
    HeavyRain,
}

impl ConditionGroup {
    pub const ALL: [ConditionGroup; 9] = [
        ConditionGroup::HotWeather,
        ConditionGroup::ColdWeather,
        ConditionGroup::RainyWeather,
        ConditionGroup::SnowyWeather,
        ConditionGroup::WindyWeather,
        ConditionGroup::HumidWeather,
        ConditionGroup::NormalWeather,
        ConditionGroup::DustyWeather,
        ConditionGroup::HeavyRain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionGroup::HotWeather => "hot_weather",
            ConditionGroup::ColdWeather => "cold_weather",
            ConditionGroup::RainyWeather => "rainy_weather",
            ConditionGroup::SnowyWeather => "snowy_weather",
            ConditionGroup::WindyWeather => "windy_weather",
            ConditionGroup::HumidWeather => "humid_weather",
            ConditionGroup::NormalWeather => "normal_weather",
            ConditionGroup::DustyWeather => "dusty_weather",
            ConditionGroup::HeavyRain => "heavy_rain",
        }
    }
}

impl fmt::Display for ConditionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConditionGroup::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| format!("unknown condition group '{}'", s))
    }
}

/// Category shown on a weather template card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCategory {
    Health,
    Lifestyle,
    SchoolActivity,
    Safety,
}

/// A curated notice template belonging to one condition group.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct NoticeTemplate {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: TemplateCategory,
    /// 1 (highest) to 3 (lowest)
    pub priority: u8,
    pub condition_group: ConditionGroup,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Thresholds driving bucket selection.
///
/// These mirror the priority tags of the shipped catalog. Changing the
/// catalog's priority mix may require retuning them; see
/// `WeatherCatalog::new` for the warnings emitted on drift.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct SelectionThresholds {
    /// At or above: hot_weather, priority 1 only
    pub extreme_heat_c: f64,
    /// At or above: hot_weather, any priority
    pub heat_c: f64,
    /// At or below: cold_weather, priority 1 only
    pub extreme_cold_c: f64,
    /// At or below: cold_weather, any priority
    pub cold_c: f64,
    /// At or above: heavy_rain
    pub heavy_rain_mm: f64,
    /// At or above: windy_weather, priority 1 only
    pub gale_wind_ms: f64,
    /// At or above: windy_weather, any priority
    pub strong_wind_ms: f64,
    /// At or above: humid_weather, priority 1–2 only
    pub very_humid_pct: f64,
    /// At or above: humid_weather, any priority
    pub humid_pct: f64,
    /// Maximum number of templates returned per observation
    pub max_selections: usize,
}

impl Default for SelectionThresholds {
    fn default() -> Self {
        Self {
            extreme_heat_c: 33.0,
            heat_c: 28.0,
            extreme_cold_c: 0.0,
            cold_c: 5.0,
            heavy_rain_mm: 20.0,
            gale_wind_ms: 14.0,
            strong_wind_ms: 10.0,
            very_humid_pct: 85.0,
            humid_pct: 80.0,
            max_selections: 3,
        }
    }
}

impl SelectionThresholds {
    /// Reject threshold sets whose buckets would overlap or invert.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let values = [
            ("extreme_heat_c", self.extreme_heat_c),
            ("heat_c", self.heat_c),
            ("extreme_cold_c", self.extreme_cold_c),
            ("cold_c", self.cold_c),
            ("heavy_rain_mm", self.heavy_rain_mm),
            ("gale_wind_ms", self.gale_wind_ms),
            ("strong_wind_ms", self.strong_wind_ms),
            ("very_humid_pct", self.very_humid_pct),
            ("humid_pct", self.humid_pct),
        ];
        if let Some((name, v)) = values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(CatalogError::Configuration(format!(
                "threshold {} must be finite, got {}",
                name, v
            )));
        }

        let ordered = [
            (self.heat_c < self.extreme_heat_c, "heat_c < extreme_heat_c"),
            (self.extreme_cold_c < self.cold_c, "extreme_cold_c < cold_c"),
            (self.cold_c < self.heat_c, "cold_c < heat_c"),
            (self.strong_wind_ms < self.gale_wind_ms, "strong_wind_ms < gale_wind_ms"),
            (self.humid_pct < self.very_humid_pct, "humid_pct < very_humid_pct"),
            (self.heavy_rain_mm > 0.0, "heavy_rain_mm > 0"),
            (self.max_selections >= 1, "max_selections >= 1"),
        ];
        for (holds, rule) in ordered {
            if !holds {
                return Err(CatalogError::Configuration(format!(
                    "thresholds violate {}",
                    rule
                )));
            }
        }
        Ok(())
    }
}

/// Validated template catalog. `normal_weather` is guaranteed non-empty.
#[derive(Debug, Clone)]
pub struct WeatherCatalog {
    thresholds: SelectionThresholds,
    groups: BTreeMap<ConditionGroup, Vec<NoticeTemplate>>,
}

impl WeatherCatalog {
    /// Build and validate a catalog from a flat template list.
    pub fn new(
        thresholds: SelectionThresholds,
        templates: Vec<NoticeTemplate>,
    ) -> Result<Self, CatalogError> {
        thresholds.validate()?;

        let mut seen_ids = HashSet::new();
        let mut groups: BTreeMap<ConditionGroup, Vec<NoticeTemplate>> = BTreeMap::new();
        for template in templates {
            if !(PRIORITY_HIGHEST..=PRIORITY_LOWEST).contains(&template.priority) {
                return Err(CatalogError::Configuration(format!(
                    "template '{}' has priority {} (expected {}..={})",
                    template.id, template.priority, PRIORITY_HIGHEST, PRIORITY_LOWEST
                )));
            }
            if !seen_ids.insert(template.id.clone()) {
                return Err(CatalogError::Configuration(format!(
                    "duplicate template id '{}'",
                    template.id
                )));
            }
            groups
                .entry(template.condition_group)
                .or_default()
                .push(template);
        }

        if groups
            .get(&ConditionGroup::NormalWeather)
            .map_or(true, |t| t.is_empty())
        {
            return Err(CatalogError::Configuration(
                "normal_weather must contain at least one template".to_string(),
            ));
        }

        let catalog = Self { thresholds, groups };
        catalog.warn_on_drift();
        Ok(catalog)
    }

    /// Log catalog shapes that leave a selection step unable to contribute.
    fn warn_on_drift(&self) {
        for group in [
            ConditionGroup::HotWeather,
            ConditionGroup::ColdWeather,
            ConditionGroup::RainyWeather,
            ConditionGroup::SnowyWeather,
            ConditionGroup::WindyWeather,
            ConditionGroup::HumidWeather,
            ConditionGroup::HeavyRain,
        ] {
            if self.templates_for(group).is_empty() {
                tracing::warn!("Catalog has no templates for {}; that step never selects", group);
            }
        }

        let restricted = [
            (ConditionGroup::HotWeather, PRIORITY_HIGHEST, "extreme_heat_c"),
            (ConditionGroup::ColdWeather, PRIORITY_HIGHEST, "extreme_cold_c"),
            (ConditionGroup::WindyWeather, PRIORITY_HIGHEST, "gale_wind_ms"),
            (ConditionGroup::HumidWeather, 2, "very_humid_pct"),
        ];
        for (group, max_priority, threshold) in restricted {
            let templates = self.templates_for(group);
            if !templates.is_empty() && !templates.iter().any(|t| t.priority <= max_priority) {
                tracing::warn!(
                    "Catalog has no {} template with priority <= {}; observations beyond {} \
                     select nothing from it. Retune thresholds or catalog priorities.",
                    group,
                    max_priority,
                    threshold
                );
            }
        }
    }

    pub fn thresholds(&self) -> &SelectionThresholds {
        &self.thresholds
    }

    /// All templates in a group (empty slice when the group is absent).
    pub fn templates_for(&self, group: ConditionGroup) -> &[NoticeTemplate] {
        self.groups.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Groups that currently have at least one template, in declaration order.
    pub fn available_conditions(&self) -> Vec<ConditionGroup> {
        self.groups
            .iter()
            .filter(|(_, t)| !t.is_empty())
            .map(|(g, _)| *g)
            .collect()
    }

    /// Total number of templates.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}

// --- JSON file format ---

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    thresholds: SelectionThresholds,
    templates: BTreeMap<String, Vec<CatalogFileTemplate>>,
}

#[derive(Debug, Deserialize)]
struct CatalogFileTemplate {
    id: String,
    title: String,
    content: String,
    category: TemplateCategory,
    priority: u8,
    #[serde(default)]
    icon: Option<String>,
}

/// Parse and validate catalog JSON.
pub fn parse_catalog(json: &str) -> Result<WeatherCatalog, CatalogError> {
    let file: CatalogFile = serde_json::from_str(json)?;

    let mut templates = Vec::new();
    for (group_name, entries) in file.templates {
        let group = group_name
            .parse::<ConditionGroup>()
            .map_err(CatalogError::Configuration)?;
        templates.extend(entries.into_iter().map(|t| NoticeTemplate {
            id: t.id,
            title: t.title,
            content: t.content,
            category: t.category,
            priority: t.priority,
            condition_group: group,
            icon: t.icon,
        }));
    }

    WeatherCatalog::new(file.thresholds, templates)
}

/// Load the catalog from `data_dir/weather_notices.json`.
pub fn load_catalog_from_dir(data_dir: &Path) -> Result<WeatherCatalog, CatalogError> {
    let path = data_dir.join(CATALOG_FILE_NAME);
    let json = std::fs::read_to_string(&path)?;
    let catalog = parse_catalog(&json)?;
    tracing::info!(
        "Loaded {} weather notice templates from {}",
        catalog.len(),
        path.display()
    );
    Ok(catalog)
}
