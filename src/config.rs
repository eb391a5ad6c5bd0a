/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// KMA open-data service key. When unset, weather comes from the dummy generator.
    pub kma_api_key: Option<String>,
    /// Override for the KMA nowcast endpoint (used for staging mirrors).
    pub kma_base_url: Option<String>,
    pub port: u16,
    /// Directory containing `weather_notices.json`.
    pub data_dir: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            kma_api_key: non_empty_var("KMA_API_KEY"),
            kma_base_url: non_empty_var("KMA_BASE_URL"),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("PORT must be a valid u16"),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
        }
    }
}

/// Read an env var, treating an empty or whitespace-only value as unset.
fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
