//! Price-list lookup service.
//!
//! Quotes are requested with a fixed filter set (operating system, tenancy,
//! billing model, region) so that one instance type maps to exactly one
//! hourly list price per run. A type missing from the feed is `None`, not
//! an error; the price enricher records it as a warning.

use async_trait::async_trait;
use serde::Deserialize;

use rightsizer_types::{PriceQuote, Result, RightsizerError};

/// Fixed filters applied to every price lookup in a run.
#[derive(Debug, Clone)]
pub struct PriceFilters {
    pub operating_system: String,
    pub tenancy: String,
    pub billing: String,
    pub region: String,
}

impl PriceFilters {
    /// The filter set both pipelines use: Linux, shared tenancy, on-demand.
    pub fn on_demand_linux(region: impl Into<String>) -> Self {
        Self {
            operating_system: "Linux".into(),
            tenancy: "Shared".into(),
            billing: "OnDemand".into(),
            region: region.into(),
        }
    }
}

#[async_trait]
pub trait PriceService: Send + Sync {
    fn filters(&self) -> &PriceFilters;

    /// Hourly list price for an instance type under this service's filters.
    /// Returns `None` when the feed has no quote for the type.
    async fn hourly_price(&self, instance_type: &str) -> Result<Option<PriceQuote>>;
}

// ---------------------------------------------------------------------------
// HttpPriceService
// ---------------------------------------------------------------------------

/// Price-list endpoint over HTTP.
///
/// `GET {base}/prices?instance_type=..&operating_system=..&tenancy=..&billing=..&region=..`
/// returning `{ "prices": [{ "instance_type": ..., "hourly_usd": ... }] }`.
pub struct HttpPriceService {
    client: reqwest::Client,
    base_url: String,
    filters: PriceFilters,
}

impl HttpPriceService {
    pub fn new(base_url: impl Into<String>, filters: PriceFilters) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            filters,
        }
    }
}

#[async_trait]
impl PriceService for HttpPriceService {
    fn filters(&self) -> &PriceFilters {
        &self.filters
    }

    async fn hourly_price(&self, instance_type: &str) -> Result<Option<PriceQuote>> {
        if instance_type.is_empty() {
            return Ok(None);
        }

        let resp = self
            .client
            .get(format!("{}/prices", self.base_url))
            .query(&[
                ("instance_type", instance_type),
                ("operating_system", &self.filters.operating_system),
                ("tenancy", &self.filters.tenancy),
                ("billing", &self.filters.billing),
                ("region", &self.filters.region),
                ("max_results", "1"),
            ])
            .send()
            .await
            .map_err(|e| price_error(0, e.to_string(), true))?;

        let status = resp.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }

        let body = resp
            .text()
            .await
            .map_err(|e| price_error(0, e.to_string(), true))?;

        if !status.is_success() {
            let retryable = status.is_server_error() || status.as_u16() == 429;
            return Err(price_error(status.as_u16(), body, retryable));
        }

        let raw: RawPriceList = serde_json::from_str(&body)
            .map_err(|e| price_error(status.as_u16(), format!("invalid price JSON: {e}"), false))?;

        Ok(raw
            .prices
            .into_iter()
            .find(|p| p.hourly_usd > 0.0)
            .map(|p| PriceQuote {
                instance_type: instance_type.to_string(),
                operating_system: self.filters.operating_system.clone(),
                tenancy: self.filters.tenancy.clone(),
                region: self.filters.region.clone(),
                hourly_usd: p.hourly_usd,
            }))
    }
}

fn price_error(status: u16, message: String, retryable: bool) -> RightsizerError {
    RightsizerError::ProviderError {
        provider: "price-service".into(),
        status,
        message,
        retryable,
    }
}

#[derive(Debug, Deserialize)]
struct RawPriceList {
    #[serde(default)]
    prices: Vec<RawPrice>,
}

#[derive(Debug, Deserialize)]
struct RawPrice {
    #[serde(default)]
    hourly_usd: f64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
