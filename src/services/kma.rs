//! KMA (Korea Meteorological Administration) ultra-short-term nowcast client.
//!
//! Fetches the latest observed conditions for a 5 km grid cell from the
//! `getUltraSrtNcst` endpoint of the public data portal.
//! See: https://www.data.go.kr/data/15084084/openapi.do

use chrono::{DateTime, Duration, Timelike, Utc};
use rand::Rng;
use serde::Deserialize;

use crate::errors::AppError;
use crate::services::conditions::{PrecipitationType, WeatherObservation};
use crate::services::grid::GridPoint;

const KMA_API_URL: &str = "https://apis.data.go.kr/1360000/VilageFcstInfoService_2.0";
const NOWCAST_PATH: &str = "/getUltraSrtNcst";

/// Nowcasts are published at HH:30 and become available around HH:40.
const PUBLISH_MINUTE: u32 = 40;
const KST_OFFSET_HOURS: i64 = 9;

/// Literal the API returns for RN1 when there is no precipitation.
const NO_PRECIPITATION: &str = "강수없음";

/// Client for the KMA nowcast API.
#[derive(Debug, Clone)]
pub struct KmaClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

/// A parsed nowcast together with the slot it was published for.
#[derive(Debug, Clone, PartialEq)]
pub struct KmaNowcast {
    pub observation: WeatherObservation,
    /// `YYYYMMDD` in KST
    pub base_date: String,
    /// `HHMM` in KST
    pub base_time: String,
}

// --- KMA JSON response types ---

#[derive(Debug, Deserialize)]
struct KmaResponse {
    response: KmaEnvelope,
}

#[derive(Debug, Deserialize)]
struct KmaEnvelope {
    header: KmaHeader,
    body: Option<KmaBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KmaHeader {
    result_code: String,
    result_msg: String,
}

#[derive(Debug, Deserialize)]
struct KmaBody {
    items: KmaItems,
}

#[derive(Debug, Deserialize)]
struct KmaItems {
    #[serde(default)]
    item: Vec<KmaItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KmaItem {
    category: String,
    /// A string in practice, but numbers have been observed
    obsr_value: serde_json::Value,
}

impl KmaItem {
    fn raw_value(&self) -> String {
        match &self.obsr_value {
            serde_json::Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        }
    }
}

impl KmaClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, KMA_API_URL)
    }

    /// Client against a different service root (mirrors, tests).
    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the most recent published nowcast for `grid` as of `now`.
    pub async fn fetch_nowcast(
        &self,
        grid: GridPoint,
        now: DateTime<Utc>,
    ) -> Result<KmaNowcast, AppError> {
        let (base_date, base_time) = nowcast_base_time(now);
        let url = format!("{}{}", self.base_url, NOWCAST_PATH);
        let nx = grid.nx.to_string();
        let ny = grid.ny.to_string();

        tracing::debug!(
            "Requesting KMA nowcast for grid ({}, {}) at {} {}",
            grid.nx,
            grid.ny,
            base_date,
            base_time
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("serviceKey", self.api_key.as_str()),
                ("pageNo", "1"),
                ("numOfRows", "1000"),
                ("dataType", "JSON"),
                ("base_date", base_date.as_str()),
                ("base_time", base_time.as_str()),
                ("nx", nx.as_str()),
                ("ny", ny.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("KMA request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "KMA returned HTTP {}",
                response.status()
            )));
        }

        // The portal answers auth failures with an XML body and HTTP 200
        let body = response.text().await.map_err(|e| {
            AppError::ExternalServiceError(format!("KMA response read failed: {}", e))
        })?;
        let parsed: KmaResponse = serde_json::from_str(&body).map_err(|e| {
            AppError::ExternalServiceError(format!("KMA returned non-JSON response: {}", e))
        })?;

        let observation = parse_nowcast(parsed)?;
        Ok(KmaNowcast {
            observation,
            base_date,
            base_time,
        })
    }
}

/// Latest published nowcast slot in KST as (`YYYYMMDD`, `HH30`).
///
/// Before HH:40 the current hour's slot is not out yet, so the previous hour
/// is used, rolling back to the previous day at midnight.
pub fn nowcast_base_time(now: DateTime<Utc>) -> (String, String) {
    let local = now.naive_utc() + Duration::hours(KST_OFFSET_HOURS);
    let slot = if local.minute() >= PUBLISH_MINUTE {
        local
    } else {
        local - Duration::hours(1)
    };
    (
        slot.format("%Y%m%d").to_string(),
        format!("{:02}30", slot.hour()),
    )
}

/// Map a KMA PTY code to a precipitation type.
pub fn precipitation_type_from_code(code: &str) -> PrecipitationType {
    match code {
        "0" => PrecipitationType::None,
        "1" | "5" => PrecipitationType::Rain,
        "2" | "6" => PrecipitationType::RainSnow,
        "3" | "7" => PrecipitationType::Snow,
        other => {
            tracing::warn!("Unknown KMA PTY code '{}', treating as no precipitation", other);
            PrecipitationType::None
        }
    }
}

/// Parse an RN1 value: blank or "강수없음" is 0, a trailing "mm" is ignored.
fn parse_precipitation(raw: &str) -> f64 {
    let value = raw.trim();
    if value.is_empty() || value == NO_PRECIPITATION {
        return 0.0;
    }
    let number = value.trim_end_matches("mm").trim();
    number.parse::<f64>().unwrap_or_else(|_| {
        tracing::warn!("Unparseable KMA RN1 value '{}', treating as 0", raw);
        0.0
    })
}

fn parse_number(category: &str, raw: &str) -> f64 {
    raw.parse::<f64>().unwrap_or_else(|_| {
        tracing::warn!("Unparseable KMA {} value '{}', treating as 0", category, raw);
        0.0
    })
}

fn parse_nowcast(response: KmaResponse) -> Result<WeatherObservation, AppError> {
    let header = &response.response.header;
    if header.result_code != "00" {
        return Err(AppError::ExternalServiceError(format!(
            "KMA error {}: {}",
            header.result_code, header.result_msg
        )));
    }

    let items = response
        .response
        .body
        .map(|b| b.items.item)
        .unwrap_or_default();
    if items.is_empty() {
        return Err(AppError::ExternalServiceError(
            "KMA returned no nowcast items".to_string(),
        ));
    }

    let mut observation = WeatherObservation {
        temperature: 0.0,
        humidity: 0.0,
        precipitation: 0.0,
        wind_speed: 0.0,
        precipitation_type: PrecipitationType::None,
    };
    for item in &items {
        let raw = item.raw_value();
        match item.category.as_str() {
            "T1H" => observation.temperature = parse_number("T1H", &raw),
            "REH" => observation.humidity = parse_number("REH", &raw),
            "RN1" => observation.precipitation = parse_precipitation(&raw),
            "WSD" => observation.wind_speed = parse_number("WSD", &raw),
            "PTY" => observation.precipitation_type = precipitation_type_from_code(&raw),
            _ => {}
        }
    }

    Ok(observation)
}

/// Random but plausible observation used when no API key is configured or
/// the live API fails.
pub fn dummy_observation<R: Rng + ?Sized>(rng: &mut R) -> WeatherObservation {
    let precipitation = if rng.gen_bool(0.3) {
        f64::from(rng.gen_range(0..=9_i32))
    } else {
        0.0
    };
    WeatherObservation {
        temperature: f64::from(rng.gen_range(10..=24_i32)),
        humidity: f64::from(rng.gen_range(40..=79_i32)),
        precipitation,
        wind_speed: f64::from(rng.gen_range(1..=5_i32)),
        precipitation_type: PrecipitationType::None,
    }
}
