//! Validation prompt builder.
//!
//! Assembles the structured request sent to the inference provider when a
//! recommended type misses the allow-list: instance context, the full
//! allow-list as decision context, the ranking criteria, and the required
//! JSON response contract.

use rightsizer_types::RecommendationRecord;

use crate::allowlist::AllowList;

/// System and user halves of one validation request.
#[derive(Debug, Clone)]
pub struct ValidationPrompt {
    pub system: String,
    pub user: String,
}

const SYSTEM_PROMPT: &str = "You are a compute instance right-sizing expert. Your role is to \
validate right-sizing recommendations against an organization's approved instance type \
allow-list and suggest the best alternatives when the recommended type is not approved.\n\n\
IMPORTANT: Respond ONLY with a valid JSON object. No explanations, no markdown, no extra text.";

pub fn build_validation_prompt(
    record: &RecommendationRecord,
    allowlist: &AllowList,
) -> ValidationPrompt {
    let user = format!(
        "## Task\n\
The right-sizing engine recommends migrating from **{current}** to **{recommended}**, \
but **{recommended}** is NOT in the organization's approved allow-list.\n\n\
Select the best alternative(s) from the allow-list below.\n\n\
## Current Instance Details\n\
- **Current Type**: {current}\n\
- **Current Monthly Cost**: ${current_cost}\n\
- **Finding**: {finding}\n\
- **Instance Name**: {name}\n\
- **Instance ID**: {id}\n\n\
## Engine Recommendation\n\
- **Recommended Type**: {recommended}\n\
- **Recommended Monthly Cost**: ${recommended_cost}\n\
- **Estimated Savings**: ${savings}\n\n\
## Approved Allow-List\n\
{table}\n\n\
## Selection Criteria (Priority Order)\n\
1. **Price**: closest to or lower than the recommended type's cost\n\
2. **vCPU count**: should meet or exceed the recommended type\n\
3. **Memory**: should meet or exceed the recommended type\n\
4. **20% headroom rule**: prefer types with ~20% more capacity than the bare minimum required\n\
5. **Favor higher discount tiers**: when specs are comparable, pick the larger discount\n\n\
## Required JSON Response Format\n\
{{\n\
  \"alternatives\": [\n\
    {{\n\
      \"instance_type\": \"<type>\",\n\
      \"reason\": \"<brief justification>\",\n\
      \"rank\": 1\n\
    }}\n\
  ],\n\
  \"analysis_summary\": \"<2-3 sentence summary of the analysis>\",\n\
  \"confidence\": \"<high|medium|low>\"\n\
}}\n\n\
Provide up to 3 ranked alternatives. Rank 1 is the best match.",
        current = record.current_instance_type,
        recommended = record.recommended_instance_type,
        current_cost = money(record.current_monthly_price),
        recommended_cost = money(record.recommended_monthly_price),
        savings = money(record.savings_monthly_on_demand),
        finding = record.finding,
        name = record.instance_name.as_deref().unwrap_or("unnamed"),
        id = record.instance_id,
        table = format_allowlist_table(allowlist),
    );

    ValidationPrompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

/// The allow-list as a markdown table the provider can rank against.
fn format_allowlist_table(allowlist: &AllowList) -> String {
    let mut lines = vec![
        "| Instance Type | vCPU | Memory (GiB) | Family | Category | Tier | Discount |".to_string(),
        "|---|---|---|---|---|---|---|".to_string(),
    ];
    for entry in allowlist.entries() {
        lines.push(format!(
            "| {} | {} | {} | {} | {} | {} | {}% |",
            entry.instance_type,
            entry.vcpus,
            entry.memory_gib,
            entry.family,
            entry.category,
            entry.tier_name,
            entry.discount_percent,
        ));
    }
    lines.join("\n")
}

fn money(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.2}"))
        .unwrap_or_else(|| "unknown".to_string())
}
