pub mod catalog;
pub mod categories;
pub mod conditions;
pub mod grid;
pub mod kma;
pub mod recommender;
pub mod usage_stats;
pub mod weather_notices;
