use market_belief_engine::{
    audit::snapshot_digest,
    extractor::KeywordSignalExtractor,
    ingest::NewsIngestor,
    models::NewsItem,
    seed::seed_defaults,
    store::{BeliefStore, InMemoryBeliefStore, JsonFileBeliefStore},
    BeliefTracker, TrackerConfig,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = TrackerConfig::from_env()?;

    info!("🧠 Market Belief Engine starting");

    // BELIEF_STORE_PATH switches to the JSON file store
    let store: Box<dyn BeliefStore> = match std::env::var("BELIEF_STORE_PATH") {
        Ok(path) => {
            info!("📁 Belief file: {}", path);
            Box::new(JsonFileBeliefStore::open(path).await?)
        }
        Err(_) => Box::new(InMemoryBeliefStore::new()),
    };

    let tracker = Arc::new(BeliefTracker::new(config, store)?);

    let seeded = seed_defaults(&tracker).await?;
    info!(created = seeded.outcomes.len(), "✅ Default beliefs seeded");

    let ingestor = NewsIngestor::new(Arc::new(KeywordSignalExtractor), Arc::clone(&tracker));

    let headlines = [
        ("wire-001", "Fed raises rates by 25 basis points, signals more to come"),
        ("wire-002", "CPI up for a third straight month as price increases broaden"),
        ("wire-003", "Tech-led sell-off deepens on growth worries"),
        ("wire-004", "Analysts see bull market returning after earnings beat"),
    ];
    let news: Vec<NewsItem> = headlines
        .iter()
        .map(|(id, headline)| NewsItem::new(*id, *headline))
        .collect();

    let result = ingestor.ingest(&news).await?;

    println!("\n=== BATCH {} ===", result.batch_id);
    for outcome in &result.outcomes {
        println!(
            "  {:<20} {:<12} {:.3} -> {:.3}",
            outcome.key,
            outcome.kind.to_string(),
            outcome.previous_confidence.unwrap_or(0.0),
            outcome.confidence
        );
    }
    for rejected in &result.rejected {
        println!("  rejected #{} ({}): {}", rejected.index, rejected.target_key, rejected.reason);
    }

    let summary = tracker.summary().await?;
    println!("\n=== BELIEF SUMMARY ===");
    println!("Total beliefs: {}", summary.total_beliefs);
    println!("Causal links:  {}", summary.causal_links_count);
    for (label, bucket) in [
        ("High", &summary.high_confidence),
        ("Medium", &summary.medium_confidence),
        ("Low", &summary.low_confidence),
    ] {
        println!("\n{} confidence:", label);
        for belief in bucket {
            println!(
                "  {:<24} {:<14} conf={:.3} polarity={:+.2}",
                belief.key, belief.statement, belief.confidence, belief.polarity
            );
        }
    }

    let snapshot = tracker.snapshot().await?;
    println!("\nSnapshot digest: {}", snapshot_digest(&snapshot));
    println!("{}", serde_json::to_string_pretty(&summary.recent_changes)?);

    Ok(())
}
