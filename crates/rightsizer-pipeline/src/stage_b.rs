//! Stage B: validation pipeline.
//!
//! Reads a Stage A structured report (fully into memory), matches each
//! record's recommended type against the allow-list, falls back to the
//! inference provider when the match misses, applies the discount math,
//! and writes the enriched report under the validated sub-path.
//!
//! Discounts on the AI paths use the upstream recommended type's monthly
//! price as the proxy list price; there is no second pricing pass here.

use std::path::{Path, PathBuf};

use rightsizer_types::{
    RecommendationRecord, Result, RightsizerError, ValidationOutcome, ValidationStatus,
};

use crate::allowlist::{AllowList, AllowListEntry};
use crate::discount::{discounted_price, savings_with_discount};
use crate::fallback::AiFallbackResolver;
use crate::report::{batch_id_from_path, batch_id_now, is_stage_a_report, ValidatedReport, VALIDATED_SEGMENT};

#[derive(Debug, Default)]
pub struct ValidationSummary {
    pub batch_id: String,
    pub total_validated: usize,
    pub approved: usize,
    pub ai_alternative: usize,
    pub ai_failed: usize,
    pub total_savings_with_discount: f64,
    pub csv_path: Option<PathBuf>,
    pub json_path: Option<PathBuf>,
}

pub struct ValidationPipeline<'a> {
    allowlist: &'a AllowList,
    resolver: &'a AiFallbackResolver,
}

impl<'a> ValidationPipeline<'a> {
    pub fn new(allowlist: &'a AllowList, resolver: &'a AiFallbackResolver) -> Self {
        Self {
            allowlist,
            resolver,
        }
    }

    /// Parse a Stage A structured report. A file that cannot be parsed is
    /// `MalformedInput` and aborts before any record is processed.
    pub fn read_report(path: &Path) -> Result<crate::report::AnalysisReport> {
        let text = std::fs::read_to_string(path).map_err(|e| RightsizerError::MalformedInput {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| RightsizerError::MalformedInput {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Validate every record in a Stage A report and write the enriched
    /// report under `out_dir/<batch-id>/validated/`.
    ///
    /// Returns `Ok(None)` for paths the trigger guard rejects (Stage B's
    /// own output, non-JSON files): recognized and ignored, zero records
    /// re-processed.
    pub async fn run(&self, report_path: &Path, out_dir: &Path) -> Result<Option<ValidationSummary>> {
        if !is_stage_a_report(report_path) {
            tracing::info!(path = %report_path.display(), "Not a stage-one report; skipping");
            return Ok(None);
        }

        let report = Self::read_report(report_path)?;
        let batch_id = batch_id_from_path(report_path).unwrap_or_else(batch_id_now);

        let mut records = report.recommendations;
        if records.is_empty() {
            tracing::info!("Report holds no recommendations; nothing to validate");
            return Ok(Some(ValidationSummary {
                batch_id,
                ..ValidationSummary::default()
            }));
        }

        let total = records.len();
        tracing::info!(total, "Validating recommendations against allow-list");

        for (i, record) in records.iter_mut().enumerate() {
            tracing::info!(
                progress = format!("{}/{}", i + 1, total),
                instance = %record.instance_id,
                recommended = %record.recommended_instance_type,
                "Validating"
            );
            self.validate_record(record).await;
        }

        let validated = ValidatedReport::build(records, &batch_id);
        let dir = out_dir.join(&batch_id).join(VALIDATED_SEGMENT);
        let (csv_path, json_path) = validated.write(&dir)?;

        let meta = &validated.report_metadata;
        tracing::info!(
            approved = meta.approved_count,
            ai_recommended = meta.ai_recommended_count,
            ai_failed = meta.ai_failed_count,
            "Validation complete"
        );

        Ok(Some(ValidationSummary {
            batch_id,
            total_validated: meta.total_instances,
            approved: meta.approved_count,
            ai_alternative: meta.ai_recommended_count,
            ai_failed: meta.ai_failed_count,
            total_savings_with_discount: meta.total_estimated_monthly_savings_with_discount,
            csv_path: Some(csv_path),
            json_path: Some(json_path),
        }))
    }

    /// Attach a `ValidationOutcome` to one record: exact allow-list match
    /// approves in place, anything else goes through the fallback resolver.
    pub async fn validate_record(&self, record: &mut RecommendationRecord) {
        let mut outcome = match self.allowlist.tier_for(&record.recommended_instance_type) {
            Some(entry) => approved_outcome(record, entry),
            None => self.resolver.resolve(record, self.allowlist).await,
        };

        outcome.discounted_monthly_price =
            discounted_price(record.recommended_monthly_price, outcome.discount_percent);
        outcome.savings_with_discount =
            savings_with_discount(record.current_monthly_price, outcome.discounted_monthly_price);

        record.validation = Some(outcome);
    }
}

fn approved_outcome(record: &RecommendationRecord, entry: &AllowListEntry) -> ValidationOutcome {
    tracing::info!(
        instance = %record.instance_id,
        instance_type = %record.recommended_instance_type,
        tier = %entry.tier_name,
        "Approved: type is allow-listed"
    );
    ValidationOutcome {
        status: ValidationStatus::ApprovedAllowed,
        final_instance_type: record.recommended_instance_type.clone(),
        discount_tier: Some(entry.tier_name.clone()),
        discount_percent: Some(entry.discount_percent),
        discounted_monthly_price: None,
        savings_with_discount: None,
        alternatives: Vec::new(),
        confidence: None,
        analysis_summary: "Instance type is pre-approved in the organization's allow-list.".into(),
        model_id: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
