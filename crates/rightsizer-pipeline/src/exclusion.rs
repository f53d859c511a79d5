//! Exclusion filter for orchestration-managed instances.
//!
//! Instances that belong to a cluster orchestration platform are resized by
//! that platform, not by this pipeline, so their recommendations are routed
//! to a separate set kept only for audit counts.

use std::collections::BTreeMap;

use rightsizer_types::RecommendationRecord;

/// Tag keys that mark an orchestration-managed instance, matched exactly.
pub const ORCHESTRATION_TAG_KEYS: [&str; 3] = [
    "eks:cluster-name",
    "eks:nodegroup-name",
    "aws:eks:cluster-name",
];

/// Tag key prefixes that mark an orchestration-managed instance. The suffix
/// varies per cluster name, so these match on prefix.
pub const ORCHESTRATION_TAG_PREFIXES: [&str; 2] = ["kubernetes.io/cluster/", "k8s.io/cluster/"];

/// Whether a tag map marks its instance as orchestration-managed.
/// Key matching is case-sensitive; tag values are irrelevant.
pub fn is_orchestrated(tags: &BTreeMap<String, String>) -> bool {
    tags.keys().any(|key| {
        ORCHESTRATION_TAG_KEYS.contains(&key.as_str())
            || ORCHESTRATION_TAG_PREFIXES
                .iter()
                .any(|prefix| key.starts_with(prefix))
    })
}

/// Split records into (kept, excluded). Total and disjoint: every input
/// record lands in exactly one side.
pub fn partition(
    records: Vec<RecommendationRecord>,
) -> (Vec<RecommendationRecord>, Vec<RecommendationRecord>) {
    let mut kept = Vec::new();
    let mut excluded = Vec::new();

    for record in records {
        if is_orchestrated(&record.tags) {
            tracing::debug!(
                instance = %record.instance_id,
                name = record.instance_name.as_deref().unwrap_or(""),
                "Excluded: orchestration-managed"
            );
            excluded.push(record);
        } else {
            kept.push(record);
        }
    }

    tracing::info!(
        kept = kept.len(),
        excluded = excluded.len(),
        "Exclusion filter applied"
    );
    (kept, excluded)
}
