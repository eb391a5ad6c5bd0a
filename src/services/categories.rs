//! Notice categories and the fixed category → sub-tag table.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Learning,
    StudentLife,
    SafetyHealth,
    Character,
    CreativeArts,
    PhysicalEducation,
    EnvironmentIt,
    Events,
    Counseling,
    SchoolNotice,
    SpecialPrograms,
    HomeConnection,
    Miscellaneous,
}

impl Category {
    /// All categories in table order. Sub-tag ownership follows this order.
    pub const ALL: [Category; 13] = [
        Category::Learning,
        Category::StudentLife,
        Category::SafetyHealth,
        Category::Character,
        Category::CreativeArts,
        Category::PhysicalEducation,
        Category::EnvironmentIt,
        Category::Events,
        Category::Counseling,
        Category::SchoolNotice,
        Category::SpecialPrograms,
        Category::HomeConnection,
        Category::Miscellaneous,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Learning => "learning",
            Category::StudentLife => "student_life",
            Category::SafetyHealth => "safety_health",
            Category::Character => "character",
            Category::CreativeArts => "creative_arts",
            Category::PhysicalEducation => "physical_education",
            Category::EnvironmentIt => "environment_it",
            Category::Events => "events",
            Category::Counseling => "counseling",
            Category::SchoolNotice => "school_notice",
            Category::SpecialPrograms => "special_programs",
            Category::HomeConnection => "home_connection",
            Category::Miscellaneous => "miscellaneous",
        }
    }

    /// Sub-tags listed under this category.
    pub fn sub_tags(&self) -> &'static [&'static str] {
        match self {
            Category::Learning => &[
                "exam_notice",
                "presentations",
                "homework_submission",
                "study_habits",
                "concentration",
                "review_methods",
                "reading_activity",
                "new_books",
                "library_use",
                "journal_writing",
                "reading_assignment",
                "math_problems",
                "dictation",
                "drawing",
                "crafts",
                "school_supplies",
                "pe_uniform",
                "lunch_kit",
                "lab_materials",
                "art_materials",
                "music_instruments",
            ],
            Category::StudentLife => &[
                "dress_code",
                "punctuality",
                "classroom_tidying",
                "personal_hygiene",
                "lost_and_found",
                "electronic_devices",
                "greeting_manners",
                "language_manners",
                "public_manners",
            ],
            Category::SafetyHealth => &[
                "traffic_safety",
                "lab_safety",
                "pe_safety",
                "playground_safety",
                "cafeteria_safety",
                "fire_safety",
                "evacuation_drill",
                "emergencies",
                "chemical_safety",
                "protective_gear",
                "heat_preparedness",
                "cold_preparedness",
                "wet_road_safety",
                "snowy_road_safety",
                "strong_wind_preparedness",
                "cold_prevention",
                "nutrition",
                "exercise",
                "eye_care",
                "dental_health",
                "mental_health",
                "personal_hygiene",
                "health_care",
                "hydration",
                "body_temperature",
                "humidity_control",
                "ventilation",
            ],
            Category::Character => &[
                "bullying_prevention",
                "character_education",
                "conflict_resolution",
                "consideration",
                "respect",
                "cooperation_spirit",
                "diligence",
                "kindness",
                "cooperation",
                "leadership",
                "creativity",
                "effort",
                "growth",
                "role_model",
                "rule_violations",
                "safety_caution",
                "attitude_improvement",
                "behaviour_correction",
                "concentration",
                "responsibility",
            ],
            Category::CreativeArts => &[
                "art_exhibition",
                "creative_activity",
                "arts_education",
                "imagination",
                "expression",
                "artwork",
                "concert",
                "instrument_playing",
                "choir",
                "art_appreciation",
                "performance_viewing",
                "arts_experience",
            ],
            Category::PhysicalEducation => &[
                "winter_pe",
                "warm_up",
                "pe_safety",
                "motor_skills",
                "fitness",
                "sportsmanship",
            ],
            Category::EnvironmentIt => &[
                "environmental_protection",
                "waste_sorting",
                "recycling",
                "energy_saving",
                "eco_friendly",
                "earth_care",
                "digital_literacy",
                "internet_ethics",
                "information_security",
                "it_skills",
                "computer_education",
                "cyber_safety",
            ],
            Category::Events => &[
                "school_events",
                "seasonal_events",
                "anniversaries",
                "performance_viewing",
                "sports_day",
                "graduation",
                "field_trips",
                "site_visits",
            ],
            Category::Counseling => &[
                "parent_counseling",
                "individual_counseling",
                "career_counseling",
                "learning_counseling",
                "peer_relationships",
                "problem_solving",
            ],
            Category::SchoolNotice => &[
                "schedule_changes",
                "announcements",
                "school_closure",
                "commute",
                "after_school",
                "special_classes",
            ],
            Category::SpecialPrograms => &[
                "vacation_courses",
                "seasonal_classes",
                "special_programs",
                "guest_instructors",
                "experiential_learning",
            ],
            Category::HomeConnection => &[
                "home_letters",
                "parent_participation",
                "home_education",
                "family_events",
                "parent_education",
            ],
            Category::Miscellaneous => &[
                "weather_notice",
                "special_notice",
                "temporary_notice",
                "miscellaneous",
                "basic_notice",
                "everyday",
                "general",
                "basic_rules",
            ],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category '{}'", s))
    }
}

/// Sub-tag → owning category. A sub-tag listed under several categories
/// belongs to the first one in `Category::ALL` order.
static SUB_TAG_INDEX: LazyLock<HashMap<&'static str, Category>> = LazyLock::new(|| {
    let mut index = HashMap::new();
    for category in Category::ALL {
        for tag in category.sub_tags() {
            index.entry(*tag).or_insert(category);
        }
    }
    index
});

/// Parent category of a sub-tag, or `None` for tags outside the table.
pub fn category_for_sub_tag(sub_tag: &str) -> Option<Category> {
    SUB_TAG_INDEX.get(sub_tag).copied()
}
