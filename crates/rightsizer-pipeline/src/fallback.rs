//! AI fallback resolver.
//!
//! Invoked only when the allow-list matcher comes up empty. One provider
//! call per record; any failure (timeout, provider error, unparseable
//! payload, empty alternatives) marks that record `ai_failed` and keeps the
//! batch moving. One instance's inference failure must not discard the
//! whole validation run.

use serde::{Deserialize, Deserializer};

use rightsizer_llm::{DynProvider, Request};
use rightsizer_types::{
    AlternativeSuggestion, Confidence, RecommendationRecord, Result, RightsizerError,
    ValidationOutcome, ValidationStatus,
};

use crate::allowlist::AllowList;
use crate::prompt::build_validation_prompt;

const RESPONSE_MAX_TOKENS: u32 = 2048;
const RESPONSE_TEMPERATURE: f32 = 0.1;

// ---------------------------------------------------------------------------
// Payload extraction and parsing
// ---------------------------------------------------------------------------

/// Why a provider response yielded no usable validation payload.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("response contains no JSON object")]
    Missing,
    #[error("payload is not valid JSON: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// The structured response expected from the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct AiValidation {
    #[serde(default)]
    pub alternatives: Vec<AlternativeSuggestion>,
    #[serde(default)]
    pub analysis_summary: String,
    #[serde(default, deserialize_with = "lenient_confidence")]
    pub confidence: Option<Confidence>,
}

/// Providers wrap the payload in prose or markdown fences despite being
/// told not to. Extraction is explicit: a fenced block wins, otherwise the
/// outermost brace pair; anything else is a typed miss.
pub fn extract_json_payload(raw: &str) -> Option<&str> {
    let fence = regex::Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap();
    if let Some(captures) = fence.captures(raw) {
        return captures.get(1).map(|m| m.as_str());
    }
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Extract-then-parse. Failures are typed so the resolver can fold them
/// into a per-record `InferenceFailure` rather than guessing at strings.
pub fn parse_validation_response(raw: &str) -> std::result::Result<AiValidation, PayloadError> {
    let payload = extract_json_payload(raw).ok_or(PayloadError::Missing)?;
    Ok(serde_json::from_str(payload)?)
}

/// Confidence labels outside high/medium/low parse as absent instead of
/// failing the record.
fn lenient_confidence<'de, D>(deserializer: D) -> std::result::Result<Option<Confidence>, D::Error>
where
    D: Deserializer<'de>,
{
    let label: Option<String> = Option::deserialize(deserializer)?;
    Ok(label.and_then(|l| match l.to_lowercase().as_str() {
        "high" => Some(Confidence::High),
        "medium" => Some(Confidence::Medium),
        "low" => Some(Confidence::Low),
        _ => None,
    }))
}

// ---------------------------------------------------------------------------
// AiFallbackResolver
// ---------------------------------------------------------------------------

pub struct AiFallbackResolver {
    provider: DynProvider,
    model: String,
}

impl AiFallbackResolver {
    pub fn new(provider: DynProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: rightsizer_llm::resolve_model(&model.into()),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Resolve one record. Infallible by design: every error path collapses
    /// into an `ai_failed` outcome that keeps the original recommendation.
    pub async fn resolve(
        &self,
        record: &RecommendationRecord,
        allowlist: &AllowList,
    ) -> ValidationOutcome {
        match self.try_resolve(record, allowlist).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(
                    instance = %record.instance_id,
                    error = %e,
                    "Inference validation failed; keeping upstream recommendation"
                );
                self.failed_outcome(record)
            }
        }
    }

    async fn try_resolve(
        &self,
        record: &RecommendationRecord,
        allowlist: &AllowList,
    ) -> Result<ValidationOutcome> {
        let prompt = build_validation_prompt(record, allowlist);

        let mut request = Request::prompt(&self.model, prompt.system, prompt.user);
        request.max_tokens = Some(RESPONSE_MAX_TOKENS);
        request.temperature = Some(RESPONSE_TEMPERATURE);

        let response = self.provider.complete(&request).await?;

        let parsed = parse_validation_response(&response.text).map_err(|e| {
            RightsizerError::InferenceFailure {
                instance_id: record.instance_id.clone(),
                message: e.to_string(),
            }
        })?;

        let best = parsed
            .alternatives
            .first()
            .ok_or_else(|| RightsizerError::InferenceFailure {
                instance_id: record.instance_id.clone(),
                message: "provider returned no alternatives".into(),
            })?;

        // Never trust the provider to stay inside the allow-list: the tier
        // is re-resolved here. A top pick outside the list still wins the
        // type decision; it just carries no discount.
        let tier = allowlist.tier_for(&best.instance_type);
        if tier.is_none() {
            tracing::warn!(
                instance = %record.instance_id,
                chosen = %best.instance_type,
                "AI top pick is not allow-listed; no discount applied"
            );
        }

        tracing::info!(
            instance = %record.instance_id,
            from = %record.recommended_instance_type,
            to = %best.instance_type,
            confidence = ?parsed.confidence,
            "AI alternative selected"
        );

        Ok(ValidationOutcome {
            status: ValidationStatus::AiAlternative,
            final_instance_type: best.instance_type.clone(),
            discount_tier: tier.map(|t| t.tier_name.clone()),
            discount_percent: tier.map(|t| t.discount_percent),
            discounted_monthly_price: None,
            savings_with_discount: None,
            alternatives: parsed.alternatives.clone(),
            confidence: parsed.confidence,
            analysis_summary: parsed.analysis_summary,
            model_id: Some(self.model.clone()),
        })
    }

    fn failed_outcome(&self, record: &RecommendationRecord) -> ValidationOutcome {
        ValidationOutcome {
            status: ValidationStatus::AiFailed,
            final_instance_type: record.recommended_instance_type.clone(),
            discount_tier: None,
            discount_percent: None,
            discounted_monthly_price: None,
            savings_with_discount: None,
            alternatives: Vec::new(),
            confidence: None,
            analysis_summary: "Inference validation failed. Using the original recommendation."
                .into(),
            model_id: Some(self.model.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rightsizer_llm::{FinishReason, ProviderAdapter, Response, Usage};

    const LIST: &str = r#"
[[tiers]]
name = "Tier 2"
discount_percent = 35.0

[[tiers.types]]
instance_type = "m7g.large"
vcpus = 2
memory_gib = 8.0

[[tiers.types]]
instance_type = "c7i.large"
vcpus = 2
memory_gib = 4.0
"#;

    fn allowlist() -> AllowList {
        AllowList::from_toml_str(LIST).unwrap()
    }

    fn record() -> RecommendationRecord {
        RecommendationRecord::new("123456789012", "i-0abc", "m5.xlarge", "z1d.metal")
    }

    enum Script {
        Reply(&'static str),
        Fail,
    }

    struct ScriptedProvider(Script);

    #[async_trait]
    impl ProviderAdapter for ScriptedProvider {
        async fn complete(&self, _request: &Request) -> Result<Response> {
            match &self.0 {
                Script::Reply(text) => Ok(Response {
                    id: "resp-1".into(),
                    text: (*text).into(),
                    usage: Usage::default(),
                    model: "scripted".into(),
                    finish_reason: FinishReason::EndTurn,
                }),
                Script::Fail => Err(RightsizerError::RequestTimeout {
                    provider: "scripted".into(),
                    timeout_ms: 30_000,
                }),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn default_model(&self) -> &str {
            "scripted"
        }

        fn context_window_size(&self) -> usize {
            100_000
        }
    }

    fn resolver(script: Script) -> AiFallbackResolver {
        AiFallbackResolver::new(DynProvider::new(ScriptedProvider(script)), "claude")
    }

    // --- extraction ---

    #[test]
    fn extracts_plain_json() {
        let payload = extract_json_payload(r#"{"alternatives": []}"#).unwrap();
        assert_eq!(payload, r#"{"alternatives": []}"#);
    }

    #[test]
    fn extracts_fenced_json() {
        let raw = "Here you go:\n```json\n{\"alternatives\": []}\n```\nHope that helps!";
        assert_eq!(extract_json_payload(raw).unwrap(), "{\"alternatives\": []}");
    }

    #[test]
    fn extracts_unfenced_json_wrapped_in_prose() {
        let raw = "Sure! The answer is {\"alternatives\": [], \"confidence\": \"low\"} as requested.";
        let parsed = parse_validation_response(raw).unwrap();
        assert_eq!(parsed.confidence, Some(Confidence::Low));
    }

    #[test]
    fn no_braces_is_a_typed_miss() {
        assert!(extract_json_payload("I cannot answer that.").is_none());
        assert!(matches!(
            parse_validation_response("I cannot answer that."),
            Err(PayloadError::Missing)
        ));
    }

    #[test]
    fn garbage_braces_are_invalid_not_a_panic() {
        assert!(matches!(
            parse_validation_response("{not json}"),
            Err(PayloadError::Invalid(_))
        ));
    }

    #[test]
    fn unknown_confidence_parses_as_absent() {
        let parsed =
            parse_validation_response(r#"{"alternatives": [], "confidence": "very high"}"#)
                .unwrap();
        assert!(parsed.confidence.is_none());
    }

    // --- resolver ---

    #[tokio::test]
    async fn valid_response_selects_top_ranked_alternative() {
        let reply = r#"{
            "alternatives": [
                {"instance_type": "m7g.large", "reason": "closest price with headroom", "rank": 1},
                {"instance_type": "c7i.large", "reason": "cheaper, less memory", "rank": 2}
            ],
            "analysis_summary": "m7g.large fits best.",
            "confidence": "high"
        }"#;
        let outcome = resolver(Script::Reply(reply))
            .resolve(&record(), &allowlist())
            .await;

        assert_eq!(outcome.status, ValidationStatus::AiAlternative);
        assert_eq!(outcome.final_instance_type, "m7g.large");
        assert_eq!(outcome.discount_tier.as_deref(), Some("Tier 2"));
        assert_eq!(outcome.discount_percent, Some(35.0));
        assert_eq!(outcome.alternatives.len(), 2);
        assert_eq!(outcome.confidence, Some(Confidence::High));
        assert_eq!(
            outcome.model_id.as_deref(),
            Some("claude-sonnet-4-5-20250929")
        );
    }

    #[tokio::test]
    async fn unlisted_top_pick_keeps_status_without_discount() {
        let reply = r#"{
            "alternatives": [
                {"instance_type": "x2idn.metal", "reason": "hallucinated", "rank": 1}
            ],
            "confidence": "medium"
        }"#;
        let outcome = resolver(Script::Reply(reply))
            .resolve(&record(), &allowlist())
            .await;

        // The type decision is authoritative even without a discount mapping.
        assert_eq!(outcome.status, ValidationStatus::AiAlternative);
        assert_eq!(outcome.final_instance_type, "x2idn.metal");
        assert!(outcome.discount_tier.is_none());
        assert!(outcome.discount_percent.is_none());
    }

    #[tokio::test]
    async fn provider_error_marks_record_failed() {
        let outcome = resolver(Script::Fail).resolve(&record(), &allowlist()).await;

        assert_eq!(outcome.status, ValidationStatus::AiFailed);
        assert_eq!(outcome.final_instance_type, "z1d.metal");
        assert!(outcome.discount_tier.is_none());
        assert!(outcome.alternatives.is_empty());
        assert!(outcome.confidence.is_none());
        assert!(outcome.model_id.is_some());
    }

    #[tokio::test]
    async fn unparseable_response_marks_record_failed() {
        let outcome = resolver(Script::Reply("I am not able to help with that."))
            .resolve(&record(), &allowlist())
            .await;

        assert_eq!(outcome.status, ValidationStatus::AiFailed);
        assert_eq!(outcome.final_instance_type, "z1d.metal");
    }

    #[tokio::test]
    async fn empty_alternatives_marks_record_failed() {
        let outcome = resolver(Script::Reply(r#"{"alternatives": [], "confidence": "low"}"#))
            .resolve(&record(), &allowlist())
            .await;

        assert_eq!(outcome.status, ValidationStatus::AiFailed);
        assert_eq!(outcome.final_instance_type, "z1d.metal");
    }
}
