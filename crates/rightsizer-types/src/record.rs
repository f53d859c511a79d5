use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Finding
// ---------------------------------------------------------------------------

/// Upstream classification of whether an instance is over-, under-, or
/// optimally provisioned. The feed occasionally emits values outside this
/// set; those land in `Unknown` rather than failing the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Finding {
    OverProvisioned,
    UnderProvisioned,
    Optimized,
    #[serde(other)]
    Unknown,
}

impl Default for Finding {
    fn default() -> Self {
        Finding::Unknown
    }
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Finding::OverProvisioned => "OVER_PROVISIONED",
            Finding::UnderProvisioned => "UNDER_PROVISIONED",
            Finding::Optimized => "OPTIMIZED",
            Finding::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// RecommendationRecord
// ---------------------------------------------------------------------------

/// One instance's right-sizing case, flowing through both pipeline stages.
///
/// Created by the source adapter, then mutated additively: the tag enricher
/// fills `tags`/`instance_name`, the price enricher fills the price fields,
/// and Stage B attaches `validation`. Derived numeric fields stay `None`
/// until their producing stage runs; absent is never coerced to zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub account_id: String,
    pub instance_id: String,
    #[serde(default)]
    pub instance_name: Option<String>,
    pub current_instance_type: String,
    pub recommended_instance_type: String,
    #[serde(default)]
    pub finding: Finding,
    #[serde(default)]
    pub finding_reasons: Vec<String>,
    #[serde(default)]
    pub cpu_finding_reasons: Vec<String>,
    #[serde(default)]
    pub memory_finding_reasons: Vec<String>,
    #[serde(default)]
    pub performance_risk: f64,
    #[serde(default)]
    pub migration_effort: String,
    #[serde(default)]
    pub savings_monthly_on_demand: Option<f64>,
    #[serde(default)]
    pub savings_monthly_after_discounts: Option<f64>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub current_hourly_price: Option<f64>,
    #[serde(default)]
    pub recommended_hourly_price: Option<f64>,
    #[serde(default)]
    pub current_monthly_price: Option<f64>,
    #[serde(default)]
    pub recommended_monthly_price: Option<f64>,
    #[serde(default)]
    pub monthly_price_difference: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationOutcome>,
}

impl RecommendationRecord {
    /// Create a record with only the fields the source adapter guarantees.
    pub fn new(
        account_id: impl Into<String>,
        instance_id: impl Into<String>,
        current_instance_type: impl Into<String>,
        recommended_instance_type: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            instance_id: instance_id.into(),
            instance_name: None,
            current_instance_type: current_instance_type.into(),
            recommended_instance_type: recommended_instance_type.into(),
            finding: Finding::Unknown,
            finding_reasons: Vec::new(),
            cpu_finding_reasons: Vec::new(),
            memory_finding_reasons: Vec::new(),
            performance_risk: 0.0,
            migration_effort: String::new(),
            savings_monthly_on_demand: None,
            savings_monthly_after_discounts: None,
            tags: BTreeMap::new(),
            current_hourly_price: None,
            recommended_hourly_price: None,
            current_monthly_price: None,
            recommended_monthly_price: None,
            monthly_price_difference: None,
            validation: None,
        }
    }
}

// ---------------------------------------------------------------------------
// PriceQuote
// ---------------------------------------------------------------------------

/// Hourly list price for one (instance type, OS, tenancy, region) tuple.
/// Immutable once fetched; cached for the remainder of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub instance_type: String,
    pub operating_system: String,
    pub tenancy: String,
    pub region: String,
    pub hourly_usd: f64,
}

// ---------------------------------------------------------------------------
// ValidationStatus
// ---------------------------------------------------------------------------

/// Outcome class of Stage B validation for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    /// Recommended type was an exact allow-list match.
    ApprovedAllowed,
    /// The inference provider chose an alternative; its top pick is final.
    AiAlternative,
    /// The inference call failed; the original recommendation stands.
    AiFailed,
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ValidationStatus::ApprovedAllowed => "approved_allowed",
            ValidationStatus::AiAlternative => "ai_alternative",
            ValidationStatus::AiFailed => "ai_failed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Confidence
// ---------------------------------------------------------------------------

/// Confidence label reported by the inference provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// AlternativeSuggestion
// ---------------------------------------------------------------------------

/// One ranked alternative from the inference provider. Rank 1 is best.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternativeSuggestion {
    #[serde(default)]
    pub rank: u32,
    pub instance_type: String,
    #[serde(default)]
    pub reason: String,
}

// ---------------------------------------------------------------------------
// ValidationOutcome
// ---------------------------------------------------------------------------

/// Stage B result attached to a record.
///
/// `final_instance_type` is always populated: the original recommendation
/// on the `ApprovedAllowed` and `AiFailed` paths, the provider's top pick
/// on the `AiAlternative` path. Discount fields are `None` whenever no
/// allow-list entry matched the final type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub status: ValidationStatus,
    pub final_instance_type: String,
    #[serde(default)]
    pub discount_tier: Option<String>,
    #[serde(default)]
    pub discount_percent: Option<f64>,
    #[serde(default)]
    pub discounted_monthly_price: Option<f64>,
    #[serde(default)]
    pub savings_with_discount: Option<f64>,
    #[serde(default)]
    pub alternatives: Vec<AlternativeSuggestion>,
    #[serde(default)]
    pub confidence: Option<Confidence>,
    #[serde(default)]
    pub analysis_summary: String,
    #[serde(default)]
    pub model_id: Option<String>,
}
