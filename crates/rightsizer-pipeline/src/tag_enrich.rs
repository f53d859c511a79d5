//! Tag enricher.
//!
//! Fills each record's tag map and display name from the tag service,
//! batched to respect request-size limits. An instance that no longer
//! exists keeps an empty tag map and proceeds: deletion between
//! recommendation generation and enrichment is a per-record condition, not
//! a batch failure.

use rightsizer_sources::TagService;
use rightsizer_types::{RecommendationRecord, Result};

/// Instance ids per tag-service call.
pub const TAG_BATCH_SIZE: usize = 200;

/// The well-known tag key the display name is derived from.
pub const NAME_TAG_KEY: &str = "Name";

#[derive(Debug, Default, Clone, Copy)]
pub struct TagStats {
    /// Records whose tag map was populated.
    pub enriched: usize,
    /// Records absent from the tag service (kept with empty tag maps).
    pub missing: usize,
}

pub struct TagEnricher<'a> {
    service: &'a dyn TagService,
}

impl<'a> TagEnricher<'a> {
    pub fn new(service: &'a dyn TagService) -> Self {
        Self { service }
    }

    pub async fn enrich(&self, records: &mut [RecommendationRecord]) -> Result<TagStats> {
        let ids: Vec<String> = records.iter().map(|r| r.instance_id.clone()).collect();
        if ids.is_empty() {
            return Ok(TagStats::default());
        }

        let mut all_tags = rightsizer_sources::TagMap::new();
        for (i, batch) in ids.chunks(TAG_BATCH_SIZE).enumerate() {
            tracing::info!(
                batch = i + 1,
                size = batch.len(),
                total = ids.len(),
                "Fetching instance tags"
            );
            all_tags.extend(self.service.tags_for(batch).await?);
        }

        let mut stats = TagStats::default();
        for record in records.iter_mut() {
            match all_tags.remove(&record.instance_id) {
                Some(tags) => {
                    record.instance_name = tags
                        .get(NAME_TAG_KEY)
                        .filter(|name| !name.is_empty())
                        .cloned();
                    record.tags = tags;
                    stats.enriched += 1;
                }
                None => {
                    tracing::warn!(
                        instance = %record.instance_id,
                        "No tags found (instance likely deleted); proceeding untagged"
                    );
                    stats.missing += 1;
                }
            }
        }

        tracing::info!(
            enriched = stats.enriched,
            missing = stats.missing,
            "Tag enrichment complete"
        );
        Ok(stats)
    }
}
