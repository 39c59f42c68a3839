//! Live grid data sources.
//!
//! The production source is the Electricity Maps API, which exposes a
//! per-zone power consumption breakdown and carbon intensity. The
//! [`EnergyDataSource`] trait keeps the oracle testable without network
//! access and leaves room for other providers.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Raw per-zone readings before pricing and rounding are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneReadings {
    /// Share of renewables in current consumption, 0 to 100, unrounded.
    pub renewable_percent: f64,
    /// Grams of CO2 per kWh. `None` when the API has no data for the zone.
    pub carbon_intensity: Option<f64>,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned status {status} for zone {zone}")]
    Api { status: u16, zone: String },
}

impl SourceError {
    pub fn api(status: u16, zone: impl Into<String>) -> Self {
        Self::Api {
            status,
            zone: zone.into(),
        }
    }
}

/// Fetches current grid readings for a single zone.
#[async_trait]
pub trait EnergyDataSource: Send + Sync {
    async fn fetch_zone(&self, zone: &str) -> Result<ZoneReadings, SourceError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PowerBreakdownResponse {
    #[serde(default)]
    power_consumption_breakdown: HashMap<String, Option<f64>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CarbonIntensityResponse {
    carbon_intensity: Option<f64>,
}

/// Electricity Maps v3 API client.
///
/// Works unauthenticated against the free tier for a limited set of
/// zones; a token raises the rate limits and unlocks the rest.
pub struct ElectricityMapsClient {
    http: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

const SOURCE_NAMES: &[&str] = &["wind", "solar", "hydro", "biomass", "geothermal"];

impl ElectricityMapsClient {
    pub fn new(
        base_url: impl Into<String>,
        api_token: Option<String>,
    ) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_token,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        zone: &str,
    ) -> Result<T, SourceError> {
        let url = format!("{}/{}/latest?zone={}", self.base_url, path, zone);
        let mut request = self.http.get(&url);
        if let Some(token) = &self.api_token {
            request = request.header("auth-token", token);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SourceError::api(response.status().as_u16(), zone));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl EnergyDataSource for ElectricityMapsClient {
    async fn fetch_zone(&self, zone: &str) -> Result<ZoneReadings, SourceError> {
        let (power, carbon) = futures::try_join!(
            self.get_json::<PowerBreakdownResponse>("power-breakdown", zone),
            self.get_json::<CarbonIntensityResponse>("carbon-intensity", zone),
        )?;
        Ok(ZoneReadings {
            renewable_percent: renewable_share(&power.power_consumption_breakdown),
            carbon_intensity: carbon.carbon_intensity,
        })
    }
}

/// Share of renewables in a consumption breakdown, 0 to 100.
///
/// Negative entries are storage charging or export artifacts and count
/// toward neither total.
pub(crate) fn renewable_share(breakdown: &HashMap<String, Option<f64>>) -> f64 {
    let mut total = 0.0;
    let mut renewable = 0.0;
    for (source, value) in breakdown {
        let Some(watts) = value else { continue };
        if *watts <= 0.0 {
            continue;
        }
        total += watts;
        let name = source.to_lowercase();
        if SOURCE_NAMES.iter().any(|s| name.contains(s)) {
            renewable += watts;
        }
    }
    if total > 0.0 {
        renewable / total * 100.0
    } else {
        0.0
    }
}
