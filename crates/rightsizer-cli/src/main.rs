//! CLI binary for the rightsizer pipelines.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use rightsizer_pipeline::{AiFallbackResolver, AllowList, AnalysisPipeline, ValidationPipeline};
use rightsizer_sources::{
    HttpPriceService, HttpRecommendationSource, HttpTagService, PriceFilters,
};

#[derive(Parser)]
#[command(
    name = "rsz",
    version,
    about = "Right-sizing recommendation enrichment and allow-list validation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the enrichment pipeline and write a report (stage one)
    Analyze {
        /// Base URL of the recommendation feed
        #[arg(long)]
        feed_url: String,

        /// Base URL of the instance tag service
        #[arg(long)]
        tags_url: String,

        /// Base URL of the price-list service
        #[arg(long)]
        pricing_url: String,

        /// Region used for price lookups
        #[arg(long, default_value = "us-east-1")]
        region: String,

        /// Comma-separated account ids (empty = the caller's own account)
        #[arg(long)]
        accounts: Option<String>,

        /// Output directory for reports
        #[arg(short, long, default_value = "reports")]
        out: PathBuf,
    },

    /// Validate a stage-one report against the allow-list (stage two)
    Validate {
        /// Path to the stage-one JSON report
        report: PathBuf,

        /// Path to the allow-list TOML file
        #[arg(long, default_value = "allowlist.toml")]
        allowlist: PathBuf,

        /// Inference model id or shorthand alias
        #[arg(long, default_value = "claude")]
        model: String,

        /// Inference provider (credentials from the environment)
        #[arg(long, default_value = "anthropic")]
        provider: String,

        /// Output directory for reports
        #[arg(short, long, default_value = "reports")]
        out: PathBuf,
    },

    /// Load an allow-list file and print its entries
    Allowlist {
        /// Path to the allow-list TOML file
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Analyze {
            feed_url,
            tags_url,
            pricing_url,
            region,
            accounts,
            out,
        } => {
            cmd_analyze(&feed_url, &tags_url, &pricing_url, &region, accounts, &out).await?;
        }
        Commands::Validate {
            report,
            allowlist,
            model,
            provider,
            out,
        } => {
            cmd_validate(&report, &allowlist, &model, &provider, &out).await?;
        }
        Commands::Allowlist { path } => {
            cmd_allowlist(&path)?;
        }
    }

    Ok(())
}

async fn cmd_analyze(
    feed_url: &str,
    tags_url: &str,
    pricing_url: &str,
    region: &str,
    accounts: Option<String>,
    out: &Path,
) -> anyhow::Result<()> {
    let account_ids = parse_accounts(accounts);

    let source = HttpRecommendationSource::new(feed_url);
    let tags = HttpTagService::new(tags_url);
    let prices = HttpPriceService::new(pricing_url, PriceFilters::on_demand_linux(region));

    let pipeline = AnalysisPipeline::new(&source, &tags, &prices, account_ids);
    let summary = pipeline.run(out).await?;

    println!("Batch:                {}", summary.batch_id);
    println!("Analyzed:             {}", summary.total_analyzed);
    println!("Excluded:             {}", summary.excluded);
    println!("Reported:             {}", summary.kept);
    println!("Tag misses:           {}", summary.tag_misses);
    println!("Price misses:         {}", summary.price_misses);
    println!(
        "Est. monthly savings: ${:.2} (after discounts ${:.2})",
        summary.total_savings_on_demand, summary.total_savings_after_discounts
    );
    match (&summary.csv_path, &summary.json_path) {
        (Some(csv), Some(json)) => {
            println!("CSV:                  {}", csv.display());
            println!("JSON:                 {}", json.display());
        }
        _ => println!("No report written (nothing to report)."),
    }
    Ok(())
}

async fn cmd_validate(
    report: &Path,
    allowlist_path: &Path,
    model: &str,
    provider: &str,
    out: &Path,
) -> anyhow::Result<()> {
    let allowlist = AllowList::load(allowlist_path)?;
    let provider = rightsizer_llm::provider_from_env(provider)?;
    let resolver = AiFallbackResolver::new(provider, model);

    let pipeline = ValidationPipeline::new(&allowlist, &resolver);
    match pipeline.run(report, out).await? {
        None => {
            println!("Skipped: {} is not a stage-one report.", report.display());
        }
        Some(summary) => {
            println!("Batch:                {}", summary.batch_id);
            println!("Validated:            {}", summary.total_validated);
            println!("Approved (allowed):   {}", summary.approved);
            println!("AI alternatives:      {}", summary.ai_alternative);
            println!("AI failed:            {}", summary.ai_failed);
            println!(
                "Savings w/ discount:  ${:.2}",
                summary.total_savings_with_discount
            );
            if let (Some(csv), Some(json)) = (&summary.csv_path, &summary.json_path) {
                println!("CSV:                  {}", csv.display());
                println!("JSON:                 {}", json.display());
            }
        }
    }
    Ok(())
}

fn cmd_allowlist(path: &Path) -> anyhow::Result<()> {
    let allowlist = AllowList::load(path)?;
    println!(
        "{} approved instance types in {}",
        allowlist.len(),
        path.display()
    );
    for entry in allowlist.entries() {
        println!(
            "  {:<14} {:>3} vCPU {:>8.1} GiB  {:<18} {:<8} {:>4}%",
            entry.instance_type,
            entry.vcpus,
            entry.memory_gib,
            entry.category,
            entry.tier_name,
            entry.discount_percent,
        );
    }
    Ok(())
}

fn parse_accounts(accounts: Option<String>) -> Vec<String> {
    accounts
        .map(|raw| {
            raw.split(',')
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accounts_parse_and_trim() {
        assert_eq!(
            parse_accounts(Some("111111111111, 222222222222,".into())),
            vec!["111111111111".to_string(), "222222222222".to_string()]
        );
        assert!(parse_accounts(None).is_empty());
        assert!(parse_accounts(Some("  ".into())).is_empty());
    }
}
