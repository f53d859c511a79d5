//! Price enricher.
//!
//! Queries the price service once per distinct instance type appearing as
//! either side of a recommendation, caches the result for the rest of the
//! run, and derives monthly figures. A type missing from the price feed
//! leaves that record's price fields `None` and is counted as a warning.

use std::collections::{BTreeSet, HashMap};

use rightsizer_sources::PriceService;
use rightsizer_types::{RecommendationRecord, Result};

use crate::discount::round_cents;

/// Average hours per month used to project hourly prices.
pub const HOURS_PER_MONTH: f64 = 730.0;

#[derive(Debug, Default, Clone, Copy)]
pub struct PriceStats {
    /// Distinct instance types looked up.
    pub distinct_types: usize,
    /// Types the price feed had no quote for.
    pub missing: usize,
}

/// Per-run price cache. The service's fixed filters (OS, tenancy, billing,
/// region) complete the cache key, so within a run one instance type maps
/// to at most one quote. Entries are write-once; misses are cached too so a
/// missing type costs a single remote call.
#[derive(Debug, Default)]
pub struct PriceBook {
    quotes: HashMap<String, Option<f64>>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn hourly_price(
        &mut self,
        service: &dyn PriceService,
        instance_type: &str,
    ) -> Result<Option<f64>> {
        if let Some(cached) = self.quotes.get(instance_type) {
            return Ok(*cached);
        }
        let quote = service.hourly_price(instance_type).await?;
        let hourly = quote.map(|q| q.hourly_usd);
        if hourly.is_none() {
            tracing::warn!(
                instance_type,
                region = %service.filters().region,
                "No list price found"
            );
        }
        self.quotes.insert(instance_type.to_string(), hourly);
        Ok(hourly)
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

pub struct PriceEnricher<'a> {
    service: &'a dyn PriceService,
    book: PriceBook,
}

impl<'a> PriceEnricher<'a> {
    /// Starts with a cold cache; one enricher per run.
    pub fn new(service: &'a dyn PriceService) -> Self {
        Self {
            service,
            book: PriceBook::new(),
        }
    }

    pub async fn enrich(&mut self, records: &mut [RecommendationRecord]) -> Result<PriceStats> {
        let mut types: BTreeSet<&str> = BTreeSet::new();
        for record in records.iter() {
            types.insert(record.current_instance_type.as_str());
            types.insert(record.recommended_instance_type.as_str());
        }
        let types: Vec<String> = types.into_iter().map(String::from).collect();

        tracing::info!(types = types.len(), "Fetching list prices");

        let mut stats = PriceStats {
            distinct_types: types.len(),
            missing: 0,
        };
        for instance_type in &types {
            if self.book.hourly_price(self.service, instance_type).await?.is_none() {
                stats.missing += 1;
            }
        }

        for record in records.iter_mut() {
            let current_type = record.current_instance_type.clone();
            let recommended_type = record.recommended_instance_type.clone();
            let current_hourly = self.book.hourly_price(self.service, &current_type).await?;
            let recommended_hourly = self
                .book
                .hourly_price(self.service, &recommended_type)
                .await?;

            record.current_hourly_price = current_hourly.map(round_micro);
            record.recommended_hourly_price = recommended_hourly.map(round_micro);
            record.current_monthly_price = current_hourly.map(|h| round_cents(h * HOURS_PER_MONTH));
            record.recommended_monthly_price =
                recommended_hourly.map(|h| round_cents(h * HOURS_PER_MONTH));
            record.monthly_price_difference = match (
                record.current_monthly_price,
                record.recommended_monthly_price,
            ) {
                (Some(current), Some(recommended)) => Some(round_cents(current - recommended)),
                _ => None,
            };
        }

        tracing::info!(
            records = records.len(),
            missing_types = stats.missing,
            "Price enrichment complete"
        );
        Ok(stats)
    }
}

/// Hourly prices keep six decimal places.
fn round_micro(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rightsizer_sources::PriceFilters;
    use rightsizer_types::PriceQuote;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedPrices {
        filters: PriceFilters,
        prices: Vec<(&'static str, f64)>,
        calls: AtomicUsize,
    }

    impl FixedPrices {
        fn new(prices: &[(&'static str, f64)]) -> Self {
            Self {
                filters: PriceFilters::on_demand_linux("us-east-1"),
                prices: prices.to_vec(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PriceService for FixedPrices {
        fn filters(&self) -> &PriceFilters {
            &self.filters
        }

        async fn hourly_price(&self, instance_type: &str) -> Result<Option<PriceQuote>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .prices
                .iter()
                .find(|(t, _)| *t == instance_type)
                .map(|(t, hourly)| PriceQuote {
                    instance_type: t.to_string(),
                    operating_system: self.filters.operating_system.clone(),
                    tenancy: self.filters.tenancy.clone(),
                    region: self.filters.region.clone(),
                    hourly_usd: *hourly,
                }))
        }
    }

    fn record(current: &str, recommended: &str) -> RecommendationRecord {
        RecommendationRecord::new("1", "i-1", current, recommended)
    }

    #[tokio::test]
    async fn monthly_prices_use_730_hours() {
        let service = FixedPrices::new(&[("m5.xlarge", 0.192), ("m7g.large", 0.0816)]);
        let mut recs = vec![record("m5.xlarge", "m7g.large")];

        let mut enricher = PriceEnricher::new(&service);
        let stats = enricher.enrich(&mut recs).await.unwrap();

        assert_eq!(stats.distinct_types, 2);
        assert_eq!(stats.missing, 0);
        assert_eq!(recs[0].current_hourly_price, Some(0.192));
        assert_eq!(recs[0].current_monthly_price, Some(140.16));
        assert_eq!(recs[0].recommended_monthly_price, Some(59.57));
        // 140.16 − 59.57
        assert_eq!(recs[0].monthly_price_difference, Some(80.59));
    }

    #[tokio::test]
    async fn repeated_types_cost_one_call_each() {
        let service = FixedPrices::new(&[("m5.xlarge", 0.192), ("m7g.large", 0.0816)]);
        let mut recs = vec![
            record("m5.xlarge", "m7g.large"),
            record("m5.xlarge", "m7g.large"),
            record("m7g.large", "m5.xlarge"),
        ];

        PriceEnricher::new(&service).enrich(&mut recs).await.unwrap();

        // Two distinct types → exactly two remote calls despite six lookups.
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_quote_leaves_fields_null() {
        let service = FixedPrices::new(&[("m5.xlarge", 0.192)]);
        let mut recs = vec![record("m5.xlarge", "z9.mythical")];

        let mut enricher = PriceEnricher::new(&service);
        let stats = enricher.enrich(&mut recs).await.unwrap();

        assert_eq!(stats.missing, 1);
        assert_eq!(recs[0].current_monthly_price, Some(140.16));
        assert!(recs[0].recommended_hourly_price.is_none());
        assert!(recs[0].recommended_monthly_price.is_none());
        assert!(recs[0].monthly_price_difference.is_none());
    }

    #[tokio::test]
    async fn missing_quote_is_cached_too() {
        let service = FixedPrices::new(&[]);
        let mut recs = vec![record("z9.mythical", "z9.mythical")];

        PriceEnricher::new(&service).enrich(&mut recs).await.unwrap();
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn price_book_is_write_once() {
        let service = FixedPrices::new(&[("m5.xlarge", 0.192)]);
        let mut book = PriceBook::new();

        assert_eq!(
            book.hourly_price(&service, "m5.xlarge").await.unwrap(),
            Some(0.192)
        );
        assert_eq!(
            book.hourly_price(&service, "m5.xlarge").await.unwrap(),
            Some(0.192)
        );
        assert_eq!(book.len(), 1);
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }
}
