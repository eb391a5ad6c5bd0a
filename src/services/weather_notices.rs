//! Weather-condition → notice template selection.
//!
//! Each observation is evaluated in four independent steps (temperature,
//! precipitation, wind, humidity). A step that matches a bucket picks one
//! template uniformly at random from the bucket's eligible templates. When no
//! step produced a pick, one `normal_weather` template is chosen instead.
//! The picks are truncated to `max_selections` in production order and then
//! stable-sorted by priority.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::db::models::Notice;
use crate::services::catalog::{
    ConditionGroup, NoticeTemplate, SelectionThresholds, WeatherCatalog, PRIORITY_HIGHEST,
    PRIORITY_LOWEST,
};
use crate::services::conditions::{matches_condition, PrecipitationType, WeatherObservation};

/// Priority ceiling for the "very humid" step.
const VERY_HUMID_MAX_PRIORITY: u8 = 2;

/// A matched bucket together with the lowest priority still eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketRule {
    pub group: ConditionGroup,
    /// Templates with `priority <= max_priority` are eligible.
    pub max_priority: u8,
}

impl BucketRule {
    fn any(group: ConditionGroup) -> Self {
        Self {
            group,
            max_priority: PRIORITY_LOWEST,
        }
    }

    fn restricted(group: ConditionGroup, max_priority: u8) -> Self {
        Self {
            group,
            max_priority,
        }
    }
}

fn temperature_rule(obs: &WeatherObservation, t: &SelectionThresholds) -> Option<BucketRule> {
    let temp = obs.temperature;
    if temp >= t.extreme_heat_c {
        Some(BucketRule::restricted(
            ConditionGroup::HotWeather,
            PRIORITY_HIGHEST,
        ))
    } else if temp >= t.heat_c {
        Some(BucketRule::any(ConditionGroup::HotWeather))
    } else if temp <= t.extreme_cold_c {
        Some(BucketRule::restricted(
            ConditionGroup::ColdWeather,
            PRIORITY_HIGHEST,
        ))
    } else if temp <= t.cold_c {
        Some(BucketRule::any(ConditionGroup::ColdWeather))
    } else {
        None
    }
}

fn precipitation_rule(obs: &WeatherObservation, t: &SelectionThresholds) -> Option<BucketRule> {
    if obs.precipitation >= t.heavy_rain_mm {
        return Some(BucketRule::any(ConditionGroup::HeavyRain));
    }
    if obs.precipitation <= 0.0 {
        return None;
    }
    // Mixed rain/snow below the heavy threshold has no bucket of its own.
    match obs.precipitation_type {
        PrecipitationType::Snow => Some(BucketRule::any(ConditionGroup::SnowyWeather)),
        PrecipitationType::Rain => Some(BucketRule::any(ConditionGroup::RainyWeather)),
        PrecipitationType::None | PrecipitationType::RainSnow => None,
    }
}

fn wind_rule(obs: &WeatherObservation, t: &SelectionThresholds) -> Option<BucketRule> {
    if obs.wind_speed >= t.gale_wind_ms {
        Some(BucketRule::restricted(
            ConditionGroup::WindyWeather,
            PRIORITY_HIGHEST,
        ))
    } else if obs.wind_speed >= t.strong_wind_ms {
        Some(BucketRule::any(ConditionGroup::WindyWeather))
    } else {
        None
    }
}

fn humidity_rule(obs: &WeatherObservation, t: &SelectionThresholds) -> Option<BucketRule> {
    if obs.humidity >= t.very_humid_pct {
        Some(BucketRule::restricted(
            ConditionGroup::HumidWeather,
            VERY_HUMID_MAX_PRIORITY,
        ))
    } else if obs.humidity >= t.humid_pct {
        Some(BucketRule::any(ConditionGroup::HumidWeather))
    } else {
        None
    }
}

/// Buckets matched by `observation`, in evaluation order (temperature,
/// precipitation, wind, humidity). Does not include the `normal_weather`
/// fallback.
pub fn matched_rules(
    observation: &WeatherObservation,
    thresholds: &SelectionThresholds,
) -> Vec<BucketRule> {
    [
        temperature_rule(observation, thresholds),
        precipitation_rule(observation, thresholds),
        wind_rule(observation, thresholds),
        humidity_rule(observation, thresholds),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Pick one eligible template for `rule`, or `None` if the bucket has none.
fn pick<'a, R: Rng + ?Sized>(
    catalog: &'a WeatherCatalog,
    rule: BucketRule,
    rng: &mut R,
) -> Option<&'a NoticeTemplate> {
    let eligible: Vec<&NoticeTemplate> = catalog
        .templates_for(rule.group)
        .iter()
        .filter(|t| t.priority <= rule.max_priority)
        .collect();
    eligible.choose(rng).copied()
}

/// Select up to `max_selections` templates for an observation, sorted by
/// ascending priority.
///
/// Deterministic for a given RNG state. Never returns an empty list: the
/// catalog guarantees a non-empty `normal_weather` bucket.
pub fn select_weather_notices<'a, R: Rng + ?Sized>(
    observation: &WeatherObservation,
    catalog: &'a WeatherCatalog,
    rng: &mut R,
) -> Vec<&'a NoticeTemplate> {
    let thresholds = catalog.thresholds();

    let mut selected: Vec<&NoticeTemplate> = matched_rules(observation, thresholds)
        .into_iter()
        .filter_map(|rule| pick(catalog, rule, rng))
        .collect();

    if selected.is_empty() {
        selected.extend(pick(
            catalog,
            BucketRule::any(ConditionGroup::NormalWeather),
            rng,
        ));
    }

    selected.truncate(thresholds.max_selections);
    // sort_by_key is stable: equal priorities keep production order
    selected.sort_by_key(|t| t.priority);

    tracing::debug!(
        "Selected {} weather notices for {:.1}°C / {:.0}% / {:.1}mm / {:.1}m/s",
        selected.len(),
        observation.temperature,
        observation.humidity,
        observation.precipitation,
        observation.wind_speed
    );

    selected
}

/// Up to `limit` stored weather notices whose conditions match `observation`,
/// in random order. Notices without condition metadata never match.
pub fn pick_matching_notices<R: Rng + ?Sized>(
    observation: &WeatherObservation,
    notices: Vec<Notice>,
    limit: usize,
    rng: &mut R,
) -> Vec<Notice> {
    let mut matching: Vec<Notice> = notices
        .into_iter()
        .filter(|n| {
            n.weather_conditions
                .as_ref()
                .is_some_and(|spec| matches_condition(observation, spec))
        })
        .collect();
    matching.shuffle(rng);
    matching.truncate(limit);
    matching
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::TemplateCategory;
    use crate::services::conditions::{Range, WeatherConditionSpec};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Deterministic RNG for reproducible tests
    fn make_rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    fn template(id: &str, group: ConditionGroup, priority: u8) -> NoticeTemplate {
        NoticeTemplate {
            id: id.to_string(),
            title: format!("Title {}", id),
            content: format!("Content {}", id),
            category: TemplateCategory::Health,
            priority,
            condition_group: group,
            icon: None,
        }
    }

    /// Catalog with a mix of priorities in every selectable bucket.
    fn full_catalog() -> WeatherCatalog {
        use ConditionGroup::*;
        let templates = vec![
            template("hot-1", HotWeather, 1),
            template("hot-2", HotWeather, 2),
            template("hot-3", HotWeather, 3),
            template("hot-1b", HotWeather, 1),
            template("cold-1", ColdWeather, 1),
            template("cold-2", ColdWeather, 2),
            template("cold-3", ColdWeather, 3),
            template("rain-2", RainyWeather, 2),
            template("rain-3", RainyWeather, 3),
            template("snow-1", SnowyWeather, 1),
            template("snow-3", SnowyWeather, 3),
            template("wind-1", WindyWeather, 1),
            template("wind-2", WindyWeather, 2),
            template("wind-3", WindyWeather, 3),
            template("humid-2", HumidWeather, 2),
            template("humid-3", HumidWeather, 3),
            template("normal-3a", NormalWeather, 3),
            template("normal-3b", NormalWeather, 3),
            template("heavy-1", HeavyRain, 1),
            template("dust-1", DustyWeather, 1),
        ];
        WeatherCatalog::new(SelectionThresholds::default(), templates).unwrap()
    }

    fn obs(
        temperature: f64,
        humidity: f64,
        precipitation: f64,
        wind_speed: f64,
        precipitation_type: PrecipitationType,
    ) -> WeatherObservation {
        WeatherObservation {
            temperature,
            humidity,
            precipitation,
            wind_speed,
            precipitation_type,
        }
    }

    fn calm() -> WeatherObservation {
        obs(18.0, 50.0, 0.0, 3.0, PrecipitationType::None)
    }

    #[test]
    fn test_extreme_heat_selects_priority_one_hot_template() {
        let catalog = full_catalog();
        let o = obs(35.0, 50.0, 0.0, 2.0, PrecipitationType::None);
        for seed in 0..50 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let result = select_weather_notices(&o, &catalog, &mut rng);
            assert_eq!(result.len(), 1);
            assert_eq!(result[0].condition_group, ConditionGroup::HotWeather);
            assert_eq!(result[0].priority, 1);
        }
    }

    #[test]
    fn test_extreme_heat_never_returns_lower_priority_hot_templates() {
        let catalog = full_catalog();
        for temp in [33.0, 34.5, 40.0, 48.0] {
            for seed in 0..30 {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let o = obs(temp, 90.0, 25.0, 15.0, PrecipitationType::Rain);
                let result = select_weather_notices(&o, &catalog, &mut rng);
                assert!(result
                    .iter()
                    .filter(|t| t.condition_group == ConditionGroup::HotWeather)
                    .all(|t| t.priority == 1));
            }
        }
    }

    #[test]
    fn test_heat_band_allows_any_priority() {
        let catalog = full_catalog();
        let o = obs(30.0, 50.0, 0.0, 2.0, PrecipitationType::None);
        let mut seen_priorities = std::collections::HashSet::new();
        for seed in 0..100 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let result = select_weather_notices(&o, &catalog, &mut rng);
            assert_eq!(result.len(), 1);
            assert_eq!(result[0].condition_group, ConditionGroup::HotWeather);
            seen_priorities.insert(result[0].priority);
        }
        assert!(seen_priorities.len() > 1, "expected a mix of priorities");
    }

    #[test]
    fn test_temperature_boundaries() {
        let t = SelectionThresholds::default();
        let rule = |temp| temperature_rule(&obs(temp, 50.0, 0.0, 0.0, PrecipitationType::None), &t);

        assert_eq!(
            rule(33.0),
            Some(BucketRule::restricted(ConditionGroup::HotWeather, 1))
        );
        assert_eq!(rule(28.0), Some(BucketRule::any(ConditionGroup::HotWeather)));
        assert_eq!(rule(27.9), None);
        assert_eq!(rule(5.1), None);
        assert_eq!(rule(5.0), Some(BucketRule::any(ConditionGroup::ColdWeather)));
        assert_eq!(
            rule(0.0),
            Some(BucketRule::restricted(ConditionGroup::ColdWeather, 1))
        );
        assert_eq!(
            rule(-12.0),
            Some(BucketRule::restricted(ConditionGroup::ColdWeather, 1))
        );
    }

    #[test]
    fn test_heavy_rain_overrides_rain_bucket() {
        let catalog = full_catalog();
        let o = obs(20.0, 50.0, 25.0, 3.0, PrecipitationType::Rain);
        let mut rng = make_rng();
        let result = select_weather_notices(&o, &catalog, &mut rng);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "heavy-1");
    }

    #[test]
    fn test_heavy_rain_applies_to_any_precipitation_type() {
        let catalog = full_catalog();
        let o = obs(20.0, 50.0, 20.0, 3.0, PrecipitationType::Snow);
        let result = select_weather_notices(&o, &catalog, &mut make_rng());
        assert_eq!(result[0].condition_group, ConditionGroup::HeavyRain);
    }

    #[test]
    fn test_light_snow_and_rain_buckets() {
        let catalog = full_catalog();
        let snow = obs(10.0, 50.0, 1.5, 1.0, PrecipitationType::Snow);
        let result = select_weather_notices(&snow, &catalog, &mut make_rng());
        assert_eq!(result[0].condition_group, ConditionGroup::SnowyWeather);

        let rain = obs(10.0, 50.0, 1.5, 1.0, PrecipitationType::Rain);
        let result = select_weather_notices(&rain, &catalog, &mut make_rng());
        assert_eq!(result[0].condition_group, ConditionGroup::RainyWeather);
    }

    #[test]
    fn test_light_mixed_precipitation_falls_back_to_normal() {
        let catalog = full_catalog();
        let o = obs(10.0, 50.0, 3.0, 1.0, PrecipitationType::RainSnow);
        let result = select_weather_notices(&o, &catalog, &mut make_rng());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].condition_group, ConditionGroup::NormalWeather);
    }

    #[test]
    fn test_gale_restricts_to_priority_one() {
        let catalog = full_catalog();
        let o = obs(18.0, 50.0, 0.0, 14.0, PrecipitationType::None);
        for seed in 0..30 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let result = select_weather_notices(&o, &catalog, &mut rng);
            assert_eq!(result.len(), 1);
            assert_eq!(result[0].id, "wind-1");
        }
    }

    #[test]
    fn test_very_humid_excludes_priority_three() {
        let catalog = full_catalog();
        let o = obs(18.0, 85.0, 0.0, 0.0, PrecipitationType::None);
        for seed in 0..30 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let result = select_weather_notices(&o, &catalog, &mut rng);
            assert_eq!(result[0].id, "humid-2");
        }
    }

    #[test]
    fn test_calm_weather_returns_one_normal_template() {
        let catalog = full_catalog();
        for temp in [5.5, 12.0, 20.0, 27.5] {
            for humidity in [0.0, 40.0, 79.9] {
                for wind in [0.0, 5.0, 9.9] {
                    let o = obs(temp, humidity, 0.0, wind, PrecipitationType::None);
                    let result = select_weather_notices(&o, &catalog, &mut make_rng());
                    assert_eq!(result.len(), 1);
                    assert_eq!(result[0].condition_group, ConditionGroup::NormalWeather);
                }
            }
        }
    }

    #[test]
    fn test_never_more_than_three_and_sorted_by_priority() {
        let catalog = full_catalog();
        let temps = [-10.0, 0.0, 3.0, 18.0, 29.0, 36.0];
        let humidities = [30.0, 82.0, 95.0];
        let precips = [
            (0.0, PrecipitationType::None),
            (4.0, PrecipitationType::Rain),
            (4.0, PrecipitationType::Snow),
            (30.0, PrecipitationType::Rain),
        ];
        let winds = [2.0, 11.0, 20.0];

        let mut rng = make_rng();
        for &t in &temps {
            for &h in &humidities {
                for &(p, pt) in &precips {
                    for &w in &winds {
                        let result = select_weather_notices(&obs(t, h, p, w, pt), &catalog, &mut rng);
                        assert!(!result.is_empty());
                        assert!(result.len() <= 3);
                        assert!(result.windows(2).all(|pair| pair[0].priority <= pair[1].priority));
                    }
                }
            }
        }
    }

    #[test]
    fn test_truncation_keeps_first_three_in_production_order() {
        // Every bucket has exactly one template, so picks are deterministic.
        use ConditionGroup::*;
        let templates = vec![
            template("hot", HotWeather, 3),
            template("rain", RainyWeather, 2),
            template("wind", WindyWeather, 3),
            template("humid", HumidWeather, 1),
            template("normal", NormalWeather, 3),
        ];
        let catalog = WeatherCatalog::new(SelectionThresholds::default(), templates).unwrap();
        let o = obs(30.0, 82.0, 5.0, 11.0, PrecipitationType::Rain);

        let result = select_weather_notices(&o, &catalog, &mut make_rng());
        let ids: Vec<&str> = result.iter().map(|t| t.id.as_str()).collect();
        // humid (priority 1) is produced fourth and dropped before sorting;
        // hot and wind tie at priority 3 and keep their production order.
        assert_eq!(ids, vec!["rain", "hot", "wind"]);
    }

    #[test]
    fn test_restricted_step_without_eligible_templates_falls_back_to_normal() {
        use ConditionGroup::*;
        let templates = vec![
            template("hot-3", HotWeather, 3),
            template("normal", NormalWeather, 3),
        ];
        let catalog = WeatherCatalog::new(SelectionThresholds::default(), templates).unwrap();
        let o = obs(40.0, 40.0, 0.0, 0.0, PrecipitationType::None);

        let result = select_weather_notices(&o, &catalog, &mut make_rng());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "normal");
    }

    #[test]
    fn test_empty_bucket_contributes_nothing() {
        use ConditionGroup::*;
        let templates = vec![
            template("wind", WindyWeather, 2),
            template("normal", NormalWeather, 3),
        ];
        let catalog = WeatherCatalog::new(SelectionThresholds::default(), templates).unwrap();
        // Snow matches a bucket with no templates; wind still contributes.
        let o = obs(18.0, 40.0, 2.0, 11.0, PrecipitationType::Snow);

        let result = select_weather_notices(&o, &catalog, &mut make_rng());
        let ids: Vec<&str> = result.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["wind"]);
    }

    #[test]
    fn test_custom_thresholds_are_honoured() {
        use ConditionGroup::*;
        let thresholds = SelectionThresholds {
            heat_c: 25.0,
            ..Default::default()
        };
        let templates = vec![
            template("hot", HotWeather, 2),
            template("normal", NormalWeather, 3),
        ];
        let catalog = WeatherCatalog::new(thresholds, templates).unwrap();
        let o = obs(26.0, 40.0, 0.0, 0.0, PrecipitationType::None);

        let result = select_weather_notices(&o, &catalog, &mut make_rng());
        assert_eq!(result[0].id, "hot");
    }

    #[test]
    fn test_max_selections_from_thresholds() {
        use ConditionGroup::*;
        let thresholds = SelectionThresholds {
            max_selections: 1,
            ..Default::default()
        };
        let templates = vec![
            template("cold", ColdWeather, 2),
            template("wind", WindyWeather, 1),
            template("normal", NormalWeather, 3),
        ];
        let catalog = WeatherCatalog::new(thresholds, templates).unwrap();
        let o = obs(2.0, 40.0, 0.0, 12.0, PrecipitationType::None);

        let result = select_weather_notices(&o, &catalog, &mut make_rng());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "cold");
    }

    #[test]
    fn test_same_seed_same_selection() {
        let catalog = full_catalog();
        let o = obs(2.0, 88.0, 3.0, 12.0, PrecipitationType::Snow);

        let first: Vec<String> = select_weather_notices(&o, &catalog, &mut make_rng())
            .iter()
            .map(|t| t.id.clone())
            .collect();
        let second: Vec<String> = select_weather_notices(&o, &catalog, &mut make_rng())
            .iter()
            .map(|t| t.id.clone())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_matched_rules_order() {
        let rules = matched_rules(
            &obs(-3.0, 90.0, 2.0, 12.0, PrecipitationType::Snow),
            &SelectionThresholds::default(),
        );
        let groups: Vec<ConditionGroup> = rules.iter().map(|r| r.group).collect();
        assert_eq!(
            groups,
            vec![
                ConditionGroup::ColdWeather,
                ConditionGroup::SnowyWeather,
                ConditionGroup::WindyWeather,
                ConditionGroup::HumidWeather,
            ]
        );
        assert!(matched_rules(&calm(), &SelectionThresholds::default()).is_empty());
    }

    fn stored_notice(id: &str, conditions: Option<WeatherConditionSpec>) -> Notice {
        Notice {
            id: id.to_string(),
            content: format!("Content {}", id),
            categories: vec![],
            tags: vec![],
            author: "teacher".to_string(),
            like_count: 0,
            usage_count: 0,
            created_at: chrono::Utc::now(),
            is_weather_notice: true,
            weather_conditions: conditions,
        }
    }

    #[test]
    fn test_pick_matching_notices_filters_and_limits() {
        let hot_only = WeatherConditionSpec {
            temperature: Some(Range {
                min: Some(28.0),
                max: None,
            }),
            ..Default::default()
        };
        let cold_only = WeatherConditionSpec {
            temperature: Some(Range {
                min: None,
                max: Some(5.0),
            }),
            ..Default::default()
        };
        let notices = vec![
            stored_notice("hot-a", Some(hot_only.clone())),
            stored_notice("hot-b", Some(hot_only.clone())),
            stored_notice("hot-c", Some(hot_only)),
            stored_notice("cold", Some(cold_only)),
            stored_notice("no-conditions", None),
        ];
        let o = obs(31.0, 50.0, 0.0, 2.0, PrecipitationType::None);

        let picked = pick_matching_notices(&o, notices, 2, &mut make_rng());
        assert_eq!(picked.len(), 2);
        assert!(picked.iter().all(|n| n.id.starts_with("hot-")));
    }

    #[test]
    fn test_pick_matching_notices_empty_spec_matches() {
        let notices = vec![stored_notice("any", Some(WeatherConditionSpec::default()))];
        let picked = pick_matching_notices(&calm(), notices, 2, &mut make_rng());
        assert_eq!(picked.len(), 1);
    }
}
