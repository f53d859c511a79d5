//! Organization allow-list of approved instance types.
//!
//! Loaded once per run from a TOML file into an exact-string lookup; static
//! for the run. Entries carry vCPU and memory figures so the fallback
//! resolver can hand the full table to the inference provider as decision
//! context.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use rightsizer_types::{Result, RightsizerError};

/// One approved instance type with its discount tier.
#[derive(Debug, Clone)]
pub struct AllowListEntry {
    pub instance_type: String,
    pub family: String,
    pub category: String,
    pub tier_name: String,
    pub discount_percent: f64,
    pub vcpus: u32,
    pub memory_gib: f64,
}

/// Exact-lookup table over approved instance types. No fuzzy matching:
/// any family/size mismatch falls through to the AI path.
#[derive(Debug, Default)]
pub struct AllowList {
    by_type: BTreeMap<String, AllowListEntry>,
}

impl AllowList {
    /// Load the allow-list TOML from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            RightsizerError::Config(format!("cannot read allow-list {}: {e}", path.display()))
        })?;
        let list = Self::from_toml_str(&text)?;
        tracing::info!(
            types = list.len(),
            path = %path.display(),
            "Loaded instance-type allow-list"
        );
        Ok(list)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let raw: RawAllowList = toml::from_str(text)
            .map_err(|e| RightsizerError::Config(format!("invalid allow-list TOML: {e}")))?;

        let mut by_type = BTreeMap::new();
        for tier in raw.tiers {
            for entry in tier.types {
                let family = family_of(&entry.instance_type);
                let category = category_for_family(&family).to_string();
                by_type.insert(
                    entry.instance_type.clone(),
                    AllowListEntry {
                        instance_type: entry.instance_type,
                        family,
                        category,
                        tier_name: tier.name.clone(),
                        discount_percent: tier.discount_percent,
                        vcpus: entry.vcpus,
                        memory_gib: entry.memory_gib,
                    },
                );
            }
        }

        Ok(Self { by_type })
    }

    pub fn is_allowed(&self, instance_type: &str) -> bool {
        self.by_type.contains_key(instance_type)
    }

    /// Tier info for an exact instance-type string, or `None`.
    pub fn tier_for(&self, instance_type: &str) -> Option<&AllowListEntry> {
        self.by_type.get(instance_type)
    }

    /// All entries, sorted by instance type.
    pub fn entries(&self) -> impl Iterator<Item = &AllowListEntry> {
        self.by_type.values()
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

/// Family is the segment before the size dot ("m7g" from "m7g.large").
fn family_of(instance_type: &str) -> String {
    instance_type
        .split_once('.')
        .map(|(family, _)| family.to_string())
        .unwrap_or_else(|| instance_type.to_string())
}

/// Workload category from the family's letter prefix.
fn category_for_family(family: &str) -> &'static str {
    match family.chars().next() {
        Some('m') => "General Purpose",
        Some('c') => "Compute Optimized",
        Some('r') => "Memory Optimized",
        Some('i') => "Storage Optimized",
        Some('t') => "Burstable",
        _ => "Other",
    }
}

// ---------------------------------------------------------------------------
// TOML shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawAllowList {
    #[serde(default)]
    tiers: Vec<RawTier>,
}

#[derive(Debug, Deserialize)]
struct RawTier {
    name: String,
    discount_percent: f64,
    #[serde(default)]
    types: Vec<RawType>,
}

#[derive(Debug, Deserialize)]
struct RawType {
    instance_type: String,
    #[serde(default)]
    vcpus: u32,
    #[serde(default)]
    memory_gib: f64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
