use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use marketnav::catalog::load_catalog;
use marketnav::{
    compose_feed, EngineConfig, FeatureExtractor, FeedConfig, HttpImageLoader, Profile,
    SearchFilters, SearchSession, SimilarityScorer, SortBy,
};

/// Product discovery over a multi-marketplace catalog
#[derive(Parser, Debug)]
#[command(name = "marketnav")]
#[command(about = "Search, similar-product and feed ranking over a product catalog", long_about = None)]
struct Args {
    /// Catalog snapshot: a JSON array of products
    #[arg(short, long)]
    catalog: PathBuf,

    /// Engine configuration (JSON); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Personalization profile (JSON)
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Seed for deterministic shuffles
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rank the catalog against a free-text query
    Search {
        query: String,

        #[arg(long)]
        min_price: Option<f64>,

        #[arg(long)]
        max_price: Option<f64>,

        /// Keep only these platforms (repeatable)
        #[arg(long = "platform")]
        platforms: Vec<String>,

        /// Keep only these brands (repeatable)
        #[arg(long = "brand")]
        brands: Vec<String>,

        #[arg(long)]
        min_rating: Option<f64>,

        /// relevance, price-low, price-high or rating; omit for the
        /// platform-balanced order
        #[arg(long)]
        sort: Option<SortBy>,

        /// Print the capped first-paint sample instead of the full ranking
        #[arg(long)]
        preview: bool,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Find products similar to the one with the given id
    Similar {
        product_id: String,

        /// Minimum number of shared keyword tags
        #[arg(long)]
        min_keywords: Option<usize>,

        /// Cache extracted image features for this many URLs
        #[arg(long)]
        cache: Option<usize>,
    },

    /// Compose a browsing feed
    Feed {
        /// Platforms in round priority order; the first gets two slots per
        /// round (repeatable)
        #[arg(long = "bias-platform")]
        bias_platforms: Vec<String>,

        /// Cap on the dominant platform's running share
        #[arg(long)]
        max_dominant_ratio: Option<f64>,

        #[arg(long, default_value_t = 30)]
        limit: usize,
    },

    /// Show personalized category and query suggestions for the profile
    Suggest,
}

fn print_json_lines<T: Serialize>(items: impl IntoIterator<Item = T>) -> anyhow::Result<()> {
    for item in items {
        println!("{}", serde_json::to_string(&item)?);
    }
    Ok(())
}

fn load_profile(path: Option<&PathBuf>) -> anyhow::Result<Option<Profile>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading profile {}", path.display()))?;
    let profile = serde_json::from_str(&raw)
        .with_context(|| format!("parsing profile {}", path.display()))?;
    Ok(Some(profile))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(log_level).into())
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting marketnav v{}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let catalog = load_catalog(&args.catalog)
        .with_context(|| format!("loading catalog {}", args.catalog.display()))?;
    let profile = load_profile(args.profile.as_ref())?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let now = Utc::now();

    match args.command {
        Command::Search {
            query,
            min_price,
            max_price,
            platforms,
            brands,
            min_rating,
            sort,
            preview,
            limit,
        } => {
            let mut session = SearchSession::new(config.search);
            let hits = if preview {
                session.preview(&query, &catalog, &mut rng)
            } else {
                let filters = SearchFilters {
                    min_price,
                    max_price,
                    platforms,
                    brands,
                    min_rating,
                    sort_by: sort,
                };
                session.search(&query, &catalog, &filters, profile.as_ref(), now, &mut rng)
            };
            info!(query = %query, results = hits.len(), "search complete");
            print_json_lines(hits.iter().take(limit))?;
        }

        Command::Similar {
            product_id,
            min_keywords,
            cache,
        } => {
            let Some(reference) = catalog.iter().find(|p| p.id == product_id) else {
                bail!("no product with id {product_id} in catalog");
            };
            let mut extractor_config = config.extractor;
            if cache.is_some() {
                extractor_config.cache_capacity = cache;
            }
            let min_keywords = min_keywords.unwrap_or(config.similarity.min_keyword_matches);

            let loader = HttpImageLoader::new()?.with_max_bytes(extractor_config.max_image_bytes);
            let extractor = FeatureExtractor::new(loader, extractor_config);
            let scorer = SimilarityScorer::new(extractor, config.similarity);
            let results = scorer.find_similar(reference, &catalog, min_keywords).await;
            info!(reference = %reference.id, results = results.len(), "similarity search complete");
            print_json_lines(&results)?;
        }

        Command::Feed {
            bias_platforms,
            max_dominant_ratio,
            limit,
        } => {
            let feed_config = if bias_platforms.is_empty() {
                let mut feed_config = config.feed;
                if let Some(ratio) = max_dominant_ratio {
                    feed_config.plan.max_dominant_ratio = ratio;
                }
                feed_config
            } else {
                FeedConfig::with_bias(
                    &bias_platforms,
                    max_dominant_ratio.unwrap_or(config.feed.plan.max_dominant_ratio),
                )
            };
            feed_config.validate()?;

            let feed = compose_feed(&catalog, &feed_config, profile.as_ref(), now, &mut rng);
            info!(products = feed.len(), "feed composed");
            print_json_lines(feed.into_iter().take(limit))?;
        }

        Command::Suggest => {
            let Some(profile) = profile else {
                bail!("--profile is required for suggestions");
            };
            #[derive(Serialize)]
            #[serde(rename_all = "camelCase")]
            struct Suggestions {
                recommended_categories: Vec<String>,
                queries: Vec<String>,
            }
            print_json_lines([Suggestions {
                recommended_categories: profile.recommended_categories(),
                queries: profile.suggestions(&mut rng),
            }])?;
        }
    }

    Ok(())
}
