//! Stage A: recommendation enrichment pipeline.
//!
//! Feed → tag enricher → exclusion filter → price enricher → report.
//! Fatal errors abort before anything is written; tag and price misses
//! degrade per record and surface in the summary counts.

use std::path::{Path, PathBuf};

use rightsizer_sources::{PriceService, RecommendationFeed, RecommendationSource, TagService};
use rightsizer_types::Result;

use crate::exclusion::partition;
use crate::price_enrich::PriceEnricher;
use crate::report::{batch_id_now, AnalysisReport};
use crate::tag_enrich::TagEnricher;

#[derive(Debug, Default)]
pub struct AnalysisSummary {
    pub batch_id: String,
    pub total_analyzed: usize,
    pub excluded: usize,
    pub kept: usize,
    pub tag_misses: usize,
    pub price_misses: usize,
    pub total_savings_on_demand: f64,
    pub total_savings_after_discounts: f64,
    /// Absent when the run completed with nothing to report.
    pub csv_path: Option<PathBuf>,
    pub json_path: Option<PathBuf>,
}

pub struct AnalysisPipeline<'a> {
    source: &'a dyn RecommendationSource,
    tags: &'a dyn TagService,
    prices: &'a dyn PriceService,
    account_ids: Vec<String>,
}

impl<'a> AnalysisPipeline<'a> {
    pub fn new(
        source: &'a dyn RecommendationSource,
        tags: &'a dyn TagService,
        prices: &'a dyn PriceService,
        account_ids: Vec<String>,
    ) -> Self {
        Self {
            source,
            tags,
            prices,
            account_ids,
        }
    }

    /// Run the full enrichment pipeline and write the report under
    /// `out_dir/<batch-id>/`.
    pub async fn run(&self, out_dir: &Path) -> Result<AnalysisSummary> {
        tracing::info!("Step 1/5: fetching recommendations");
        let feed = RecommendationFeed::new(self.source, self.account_ids.clone());
        let mut records = feed.collect_all().await?;

        let total_analyzed = records.len();
        if records.is_empty() {
            tracing::info!("No recommendations found; nothing to report");
            return Ok(AnalysisSummary {
                batch_id: batch_id_now(),
                ..AnalysisSummary::default()
            });
        }

        tracing::info!(total = total_analyzed, "Step 2/5: enriching with tags");
        let tag_stats = TagEnricher::new(self.tags).enrich(&mut records).await?;

        tracing::info!("Step 3/5: filtering orchestration-managed instances");
        let (mut kept, excluded) = partition(records);

        if kept.is_empty() {
            tracing::info!(
                excluded = excluded.len(),
                "Every instance is orchestration-managed; nothing to report"
            );
            return Ok(AnalysisSummary {
                batch_id: batch_id_now(),
                total_analyzed,
                excluded: excluded.len(),
                tag_misses: tag_stats.missing,
                ..AnalysisSummary::default()
            });
        }

        tracing::info!(kept = kept.len(), "Step 4/5: enriching with prices");
        let price_stats = PriceEnricher::new(self.prices).enrich(&mut kept).await?;

        tracing::info!("Step 5/5: writing reports");
        let batch_id = batch_id_now();
        let report = AnalysisReport::build(
            kept,
            total_analyzed,
            excluded.len(),
            tag_stats.missing,
            price_stats.missing,
            &batch_id,
        );
        let (csv_path, json_path) = report.write(&out_dir.join(&batch_id))?;

        let meta = &report.report_metadata;
        Ok(AnalysisSummary {
            batch_id,
            total_analyzed,
            excluded: meta.total_excluded,
            kept: meta.total_kept,
            tag_misses: meta.tag_misses,
            price_misses: meta.price_misses,
            total_savings_on_demand: meta.total_estimated_monthly_savings_on_demand,
            total_savings_after_discounts: meta.total_estimated_monthly_savings_after_discounts,
            csv_path: Some(csv_path),
            json_path: Some(json_path),
        })
    }
}
