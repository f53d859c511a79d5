//! Recommendation source adapter.
//!
//! `RecommendationFeed` is a lazy, finite, non-restartable reader over a
//! paginated recommendation feed, optionally spanning multiple account
//! scopes. Page fetches retry with backoff; exhausting the retry budget
//! fails the whole run with `SourceUnavailable`. There is no partial-batch
//! result, since downstream savings totals would be misleading if silently
//! incomplete.

use async_trait::async_trait;
use serde::Deserialize;

use rightsizer_types::{Finding, RecommendationRecord, Result, RightsizerError};

use crate::retry::{fetch_with_retry, BackoffPolicy};

/// Bounded retry budget per page fetch.
pub const MAX_FEED_RETRIES: usize = 3;

/// Page size requested from the feed.
const PAGE_MAX_RESULTS: u32 = 1000;

/// Reason codes the adapter splits into the CPU subset.
const CPU_REASON_CODES: [&str; 2] = ["CPUOverprovisioned", "CPUUnderprovisioned"];

/// Reason codes the adapter splits into the memory subset.
const MEMORY_REASON_CODES: [&str; 2] = ["MemoryOverprovisioned", "MemoryUnderprovisioned"];

// ---------------------------------------------------------------------------
// RecommendationSource
// ---------------------------------------------------------------------------

/// One page of upstream results plus the continuation token, if any.
#[derive(Debug, Default)]
pub struct RecommendationPage {
    pub records: Vec<RecommendationRecord>,
    pub next_token: Option<String>,
}

#[async_trait]
pub trait RecommendationSource: Send + Sync {
    /// Fetch one page of recommendations for an optional account scope.
    async fn fetch_page(
        &self,
        account_id: Option<&str>,
        page_token: Option<&str>,
    ) -> Result<RecommendationPage>;

    fn name(&self) -> &str {
        "recommendation-feed"
    }
}

// ---------------------------------------------------------------------------
// RecommendationFeed
// ---------------------------------------------------------------------------

/// Lazy pagination state over one or more account scopes.
///
/// `next_page` follows continuation tokens until every scope is exhausted,
/// then yields `None` forever. The feed cannot be restarted; construct a
/// new one per run.
pub struct RecommendationFeed<'a> {
    source: &'a dyn RecommendationSource,
    pending_scopes: std::vec::IntoIter<Option<String>>,
    current_scope: Option<Option<String>>,
    next_token: Option<String>,
    policy: BackoffPolicy,
    max_retries: usize,
    done: bool,
}

impl<'a> RecommendationFeed<'a> {
    /// An empty `account_ids` list means "the caller's own account scope".
    pub fn new(source: &'a dyn RecommendationSource, account_ids: Vec<String>) -> Self {
        let scopes: Vec<Option<String>> = if account_ids.is_empty() {
            vec![None]
        } else {
            account_ids.into_iter().map(Some).collect()
        };
        let mut pending = scopes.into_iter();
        let current = pending.next();
        Self {
            source,
            pending_scopes: pending,
            current_scope: current,
            next_token: None,
            policy: BackoffPolicy::default(),
            max_retries: MAX_FEED_RETRIES,
            done: false,
        }
    }

    pub fn with_backoff(mut self, policy: BackoffPolicy, max_retries: usize) -> Self {
        self.policy = policy;
        self.max_retries = max_retries;
        self
    }

    /// Fetch the next page of records, or `None` once every scope is drained.
    pub async fn next_page(&mut self) -> Result<Option<Vec<RecommendationRecord>>> {
        if self.done {
            return Ok(None);
        }

        let scope = match &self.current_scope {
            Some(scope) => scope.clone(),
            None => {
                self.done = true;
                return Ok(None);
            }
        };

        let token = self.next_token.clone();
        let source = self.source;
        let page = fetch_with_retry(
            || async {
                source
                    .fetch_page(scope.as_deref(), token.as_deref())
                    .await
            },
            self.max_retries,
            &self.policy,
            source.name(),
        )
        .await
        .map_err(|e| RightsizerError::SourceUnavailable {
            source_name: source.name().to_string(),
            attempts: self.max_retries + 1,
            message: e.to_string(),
        })?;

        tracing::info!(
            count = page.records.len(),
            account = scope.as_deref().unwrap_or("self"),
            "Fetched recommendation page"
        );

        match page.next_token {
            Some(token) => self.next_token = Some(token),
            None => {
                // Scope drained; move to the next one on the following call.
                self.next_token = None;
                self.current_scope = self.pending_scopes.next();
                if self.current_scope.is_none() {
                    self.done = true;
                }
            }
        }

        Ok(Some(page.records))
    }

    /// Drain the feed into memory. Still all-or-nothing: the first
    /// exhausted page fetch discards everything read so far.
    pub async fn collect_all(mut self) -> Result<Vec<RecommendationRecord>> {
        let mut all = Vec::new();
        while let Some(mut records) = self.next_page().await? {
            all.append(&mut records);
        }
        tracing::info!(total = all.len(), "Recommendation feed drained");
        Ok(all)
    }
}

// ---------------------------------------------------------------------------
// HttpRecommendationSource
// ---------------------------------------------------------------------------

/// Paginated JSON feed over HTTP.
///
/// `GET {base}/recommendations?max_results=N[&account_id=..][&page_token=..]`
/// returning `{ "recommendations": [...], "next_token": "..." }`.
pub struct HttpRecommendationSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRecommendationSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl RecommendationSource for HttpRecommendationSource {
    async fn fetch_page(
        &self,
        account_id: Option<&str>,
        page_token: Option<&str>,
    ) -> Result<RecommendationPage> {
        let mut query: Vec<(&str, String)> =
            vec![("max_results", PAGE_MAX_RESULTS.to_string())];
        if let Some(account) = account_id {
            query.push(("account_id", account.to_string()));
        }
        if let Some(token) = page_token {
            query.push(("page_token", token.to_string()));
        }

        let resp = self
            .client
            .get(format!("{}/recommendations", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(|e| feed_error(0, e.to_string(), true))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| feed_error(0, e.to_string(), true))?;

        if !status.is_success() {
            let retryable = status.is_server_error() || status.as_u16() == 429;
            return Err(feed_error(status.as_u16(), body, retryable));
        }

        let raw: RawPage = serde_json::from_str(&body)
            .map_err(|e| feed_error(status.as_u16(), format!("invalid page JSON: {e}"), false))?;

        let records = raw
            .recommendations
            .into_iter()
            .filter_map(structure_recommendation)
            .collect();

        Ok(RecommendationPage {
            records,
            next_token: raw.next_token,
        })
    }
}

fn feed_error(status: u16, message: String, retryable: bool) -> RightsizerError {
    RightsizerError::ProviderError {
        provider: "recommendation-feed".into(),
        status,
        message,
        retryable,
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawPage {
    #[serde(default)]
    recommendations: Vec<RawRecommendation>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRecommendation {
    #[serde(default)]
    account_id: String,
    #[serde(default)]
    instance_id: String,
    #[serde(default)]
    current_instance_type: String,
    #[serde(default)]
    finding: Finding,
    #[serde(default)]
    finding_reason_codes: Vec<String>,
    #[serde(default)]
    recommendation_options: Vec<RawOption>,
}

#[derive(Debug, Deserialize)]
struct RawOption {
    #[serde(default)]
    instance_type: String,
    #[serde(default)]
    performance_risk: f64,
    #[serde(default)]
    migration_effort: String,
    #[serde(default)]
    savings_opportunity: Option<RawSavings>,
    #[serde(default)]
    savings_opportunity_after_discounts: Option<RawSavings>,
}

#[derive(Debug, Deserialize)]
struct RawSavings {
    #[serde(default)]
    estimated_monthly_savings: f64,
}

/// Flatten one raw feed row into a record. The top-ranked recommendation
/// option becomes the record's recommended type; rows missing either
/// instance type are dropped with a warning rather than failing the page.
fn structure_recommendation(raw: RawRecommendation) -> Option<RecommendationRecord> {
    if raw.instance_id.is_empty() {
        tracing::warn!("Skipping feed row without an instance id");
        return None;
    }
    let top = raw.recommendation_options.into_iter().next();
    let (recommended_type, performance_risk, migration_effort, savings, savings_after) = match top {
        Some(opt) if !opt.instance_type.is_empty() => (
            opt.instance_type,
            opt.performance_risk,
            opt.migration_effort,
            opt.savings_opportunity
                .map(|s| s.estimated_monthly_savings),
            opt.savings_opportunity_after_discounts
                .map(|s| s.estimated_monthly_savings),
        ),
        _ => {
            tracing::warn!(instance = %raw.instance_id, "Skipping feed row without a recommended type");
            return None;
        }
    };
    if raw.current_instance_type.is_empty() {
        tracing::warn!(instance = %raw.instance_id, "Skipping feed row without a current type");
        return None;
    }

    let cpu_reasons: Vec<String> = raw
        .finding_reason_codes
        .iter()
        .filter(|r| CPU_REASON_CODES.contains(&r.as_str()))
        .cloned()
        .collect();
    let memory_reasons: Vec<String> = raw
        .finding_reason_codes
        .iter()
        .filter(|r| MEMORY_REASON_CODES.contains(&r.as_str()))
        .cloned()
        .collect();

    let mut record = RecommendationRecord::new(
        raw.account_id,
        raw.instance_id,
        raw.current_instance_type,
        recommended_type,
    );
    record.finding = raw.finding;
    record.finding_reasons = raw.finding_reason_codes;
    record.cpu_finding_reasons = cpu_reasons;
    record.memory_finding_reasons = memory_reasons;
    record.performance_risk = performance_risk;
    record.migration_effort = migration_effort;
    record.savings_monthly_on_demand = savings;
    record.savings_monthly_after_discounts = savings_after;
    Some(record)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page_json(ids: &[&str], next_token: Option<&str>) -> serde_json::Value {
        let recommendations: Vec<serde_json::Value> = ids
            .iter()
            .map(|id| {
                serde_json::json!({
                    "account_id": "123456789012",
                    "instance_id": id,
                    "current_instance_type": "m5.xlarge",
                    "finding": "OVER_PROVISIONED",
                    "finding_reason_codes": ["CPUOverprovisioned", "MemoryOverprovisioned"],
                    "recommendation_options": [{
                        "instance_type": "m7g.large",
                        "performance_risk": 1.0,
                        "migration_effort": "Low",
                        "savings_opportunity": { "estimated_monthly_savings": 42.5 }
                    }]
                })
            })
            .collect();
        match next_token {
            Some(token) => serde_json::json!({
                "recommendations": recommendations,
                "next_token": token
            }),
            None => serde_json::json!({ "recommendations": recommendations }),
        }
    }

    #[tokio::test]
    async fn feed_follows_pagination_tokens() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/recommendations"))
            .and(query_param("page_token", "t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_json(&["i-2"], None)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/recommendations"))
            .and(query_param_is_missing("page_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_json(&["i-1"], Some("t1"))))
            .mount(&server)
            .await;

        let source = HttpRecommendationSource::new(server.uri());
        let records = RecommendationFeed::new(&source, vec![])
            .collect_all()
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].instance_id, "i-1");
        assert_eq!(records[1].instance_id, "i-2");
        assert_eq!(records[0].cpu_finding_reasons, vec!["CPUOverprovisioned"]);
        assert_eq!(
            records[0].memory_finding_reasons,
            vec!["MemoryOverprovisioned"]
        );
        assert_eq!(records[0].savings_monthly_on_demand, Some(42.5));
        assert!(records[0].savings_monthly_after_discounts.is_none());
    }

    #[tokio::test]
    async fn feed_is_finite_after_drain() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/recommendations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_json(&["i-1"], None)))
            .mount(&server)
            .await;

        let source = HttpRecommendationSource::new(server.uri());
        let mut feed = RecommendationFeed::new(&source, vec![]);
        assert!(feed.next_page().await.unwrap().is_some());
        assert!(feed.next_page().await.unwrap().is_none());
        assert!(feed.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn feed_spans_account_scopes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/recommendations"))
            .and(query_param("account_id", "111111111111"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_json(&["i-a"], None)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/recommendations"))
            .and(query_param("account_id", "222222222222"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_json(&["i-b"], None)))
            .mount(&server)
            .await;

        let source = HttpRecommendationSource::new(server.uri());
        let records =
            RecommendationFeed::new(&source, vec!["111111111111".into(), "222222222222".into()])
                .collect_all()
                .await
                .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].instance_id, "i-a");
        assert_eq!(records[1].instance_id, "i-b");
    }

    #[tokio::test]
    async fn exhausted_retries_become_source_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/recommendations"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = HttpRecommendationSource::new(server.uri());
        let err = RecommendationFeed::new(&source, vec![])
            .with_backoff(BackoffPolicy::None, 2)
            .collect_all()
            .await
            .unwrap_err();

        match err {
            RightsizerError::SourceUnavailable { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected SourceUnavailable, got {other}"),
        }
    }

    #[tokio::test]
    async fn client_errors_fail_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/recommendations"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let source = HttpRecommendationSource::new(server.uri());
        let err = RecommendationFeed::new(&source, vec![])
            .with_backoff(BackoffPolicy::None, 3)
            .collect_all()
            .await
            .unwrap_err();

        assert!(matches!(err, RightsizerError::SourceUnavailable { .. }));
    }

    #[test]
    fn rows_missing_types_are_skipped() {
        let raw = RawRecommendation {
            account_id: "1".into(),
            instance_id: "i-1".into(),
            current_instance_type: String::new(),
            finding: Finding::Optimized,
            finding_reason_codes: vec![],
            recommendation_options: vec![RawOption {
                instance_type: "m7g.large".into(),
                performance_risk: 0.0,
                migration_effort: String::new(),
                savings_opportunity: None,
                savings_opportunity_after_discounts: None,
            }],
        };
        assert!(structure_recommendation(raw).is_none());
    }

    #[test]
    fn rows_without_options_are_skipped() {
        let raw = RawRecommendation {
            account_id: "1".into(),
            instance_id: "i-1".into(),
            current_instance_type: "m5.xlarge".into(),
            finding: Finding::OverProvisioned,
            finding_reason_codes: vec![],
            recommendation_options: vec![],
        };
        assert!(structure_recommendation(raw).is_none());
    }
}
