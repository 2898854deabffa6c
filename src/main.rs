mod analyzer;
mod categorize;
mod config;
mod db;
mod fetcher;
mod output;
mod post;
mod text;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use analyzer::anthropic::AnthropicClient;
use analyzer::FeedbackAnalyzer;
use categorize::filter::filter_by_role;
use categorize::stats::compute_statistics;
use categorize::{format_summary, CategoryTree, Categorizer};
use config::Config;
use fetcher::PiazzaClient;
use post::{AuthorRole, Post};

const LATEST_CATEGORIZED: &str = "categorized_posts_latest.json";
const LATEST_ANALYSIS: &str = "analysis_latest.json";

#[derive(Parser)]
#[command(
    name = "forum_feedback",
    about = "Scrape course forum posts, group them by assignment/problem, and summarize feedback with an LLM"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the saved Piazza session is still valid
    Verify,
    /// List the classes this session can see, with their network ids
    Classes,
    /// Fetch the course feed and queue its posts
    Init {
        /// Max feed entries to queue (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Fetch queued posts that have not been fetched yet
    Scrape {
        /// Max posts to fetch (default: all unvisited)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Group fetched posts by assignment and problem
    Categorize {
        /// Max posts to categorize (default: all fetched)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Only keep student and anonymous posts
        #[arg(short, long)]
        students_only: bool,
    },
    /// Run the LLM analysis over categorized posts
    Analyze {
        /// Categorized posts JSON (default: latest)
        #[arg(short, long)]
        input: Option<std::path::PathBuf>,
        /// Only analyze student and anonymous posts
        #[arg(short, long)]
        students_only: bool,
        /// Only analyze posts by these roles
        #[arg(long, value_enum, value_delimiter = ',', conflicts_with = "students_only")]
        roles: Vec<AuthorRole>,
    },
    /// Init + scrape + categorize + analyze (students only) in one go
    Run {
        /// Max posts to fetch
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show fetch progress
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let cfg = Config::from_env()?;

    let result = match cli.command {
        Commands::Verify => {
            let client = piazza_client(&cfg)?;
            let email = client.verify_session().await?;
            println!("Authenticated as: {}", email);
            Ok(())
        }
        Commands::Classes => {
            // Not needed to list classes
            let nid = cfg.network_id.as_deref().unwrap_or_default();
            let client = PiazzaClient::new(&cfg.require_cookies()?, nid)?;
            let classes = client.list_classes().await?;
            println!("Your Piazza classes:");
            for c in &classes {
                println!("  {}: {} ({})", c.nid, c.name, c.term);
            }
            println!("\nSet PIAZZA_NETWORK_ID to the class id in your .env file.");
            Ok(())
        }
        Commands::Init { limit } => {
            let client = piazza_client(&cfg)?;
            init(&cfg, &client, limit).await
        }
        Commands::Scrape { limit } => {
            let client = Arc::new(piazza_client(&cfg)?);
            scrape(&cfg, client, limit).await
        }
        Commands::Categorize { limit, students_only } => {
            categorize_fetched(&cfg, limit, students_only).map(|_| ())
        }
        Commands::Analyze { input, students_only, roles } => {
            let path = input.unwrap_or_else(|| cfg.raw_dir().join(LATEST_CATEGORIZED));
            let tree: CategoryTree = output::load_json(&path)?;
            let tree = if students_only {
                println!("Filtering to student posts only");
                filter_by_role(&tree, AuthorRole::STUDENTS)
            } else if !roles.is_empty() {
                filter_by_role(&tree, &roles)
            } else {
                tree
            };
            analyze(&cfg, &tree).await
        }
        Commands::Run { limit } => {
            let client = Arc::new(piazza_client(&cfg)?);
            let email = client.verify_session().await?;
            info!("Authenticated as {}", email);

            // Phase 1: queue + fetch
            let t_fetch = Instant::now();
            init(&cfg, &client, limit).await?;
            scrape(&cfg, Arc::clone(&client), limit).await?;
            println!("Fetched in {:.1}s", t_fetch.elapsed().as_secs_f64());

            // Phase 2: categorize everything fetched, then analyze student feedback
            match categorize_fetched(&cfg, None, false)? {
                Some(tree) => analyze(&cfg, &filter_by_role(&tree, AuthorRole::STUDENTS)).await,
                None => Ok(()),
            }
        }
        Commands::Stats => {
            let conn = db::connect(&cfg.db_path())?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Queued:    {}", s.total);
            println!("Visited:   {}", s.visited);
            println!("Unvisited: {}", s.unvisited);
            println!("Fetched:   {}", s.fetched);
            println!("Errors:    {}", s.errors);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn piazza_client(cfg: &Config) -> Result<PiazzaClient> {
    PiazzaClient::new(&cfg.require_cookies()?, cfg.require_network_id()?)
}

async fn init(cfg: &Config, client: &PiazzaClient, limit: Option<usize>) -> Result<()> {
    let conn = db::connect(&cfg.db_path())?;
    db::init_schema(&conn)?;
    let items = client.fetch_feed(limit).await?;
    let inserted = db::insert_feed(&conn, &items)?;
    println!("Queued {} new posts ({} in feed)", inserted, items.len());
    Ok(())
}

async fn scrape(cfg: &Config, client: Arc<PiazzaClient>, limit: Option<usize>) -> Result<()> {
    let conn = db::connect(&cfg.db_path())?;
    db::init_schema(&conn)?;
    let queue = db::fetch_unvisited(&conn, limit)?;
    if queue.is_empty() {
        println!("No unfetched posts. Run 'init' first or everything is fetched.");
        return Ok(());
    }
    println!("Fetching {} posts (streaming to DB)...", queue.len());
    let stats = fetcher::fetch_posts_streaming(&conn, client, queue).await?;
    println!(
        "Done: {} fetched ({} ok, {} errors).",
        stats.total, stats.ok, stats.errors
    );
    Ok(())
}

/// Categorize every fetched post, print the summary and statistics, and save
/// the flat and grouped JSON. Returns `None` when nothing has been fetched.
fn categorize_fetched(
    cfg: &Config,
    limit: Option<usize>,
    students_only: bool,
) -> Result<Option<CategoryTree>> {
    let conn = db::connect(&cfg.db_path())?;
    db::init_schema(&conn)?;
    let raw = db::fetch_raw_posts(&conn, limit)?;
    if raw.is_empty() {
        println!("No fetched posts. Run 'scrape' first.");
        return Ok(None);
    }

    println!("Processing {} posts...", raw.len());
    let posts = parse_raw_posts(&raw)?;

    let categorizer = Categorizer::new(cfg.load_patterns()?);
    let mut tree = categorizer.categorize(&posts);
    if students_only {
        tree = filter_by_role(&tree, AuthorRole::STUDENTS);
    }
    info!("{}", format_summary(&tree));

    let stats = compute_statistics(&tree);
    println!("\nPost Statistics:");
    println!("  Total posts: {}", stats.total_posts);
    println!("  Total psets: {}", stats.total_psets);
    println!("  Resolved:    {}", stats.resolved_count);
    println!("  Unresolved:  {}", stats.unresolved_count);
    println!("  Answers:     {}", stats.total_answers);
    println!("  Followups:   {}", stats.total_followups);

    let ts = output::timestamp();
    let raw_dir = cfg.raw_dir();
    output::save_json(&raw_dir, &format!("all_posts_{}.json", ts), &posts)?;
    output::save_json(&raw_dir, &format!("categorized_posts_{}.json", ts), &tree)?;
    output::save_json(&raw_dir, &format!("statistics_{}.json", ts), &stats)?;
    output::save_json(&raw_dir, LATEST_CATEGORIZED, &tree)?;

    Ok(Some(tree))
}

/// Parse stored payloads into posts in parallel; order follows the feed.
/// A payload that is not valid JSON is skipped with a warning.
fn parse_raw_posts(raw: &[db::RawPost]) -> Result<Vec<Post>> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(raw.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut posts = Vec::with_capacity(raw.len());
    for chunk in raw.chunks(500) {
        let results: Vec<_> = chunk
            .par_iter()
            .map(|r| {
                serde_json::from_str::<serde_json::Value>(&r.raw_json)
                    .map(|v| post::parse_post(&v))
                    .with_context(|| format!("post {} (cid {})", r.post_id, r.cid))
            })
            .collect();

        for result in results {
            match result {
                Ok(p) => posts.push(p),
                Err(e) => warn!("Failed to parse {:#}", e),
            }
        }
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(posts)
}

async fn analyze(cfg: &Config, tree: &CategoryTree) -> Result<()> {
    let api_key = cfg.require_api_key()?;
    if tree.is_empty() {
        println!("Nothing to analyze.");
        return Ok(());
    }

    let analyzer = FeedbackAnalyzer::new(AnthropicClient::new(api_key, &cfg.llm_model));
    let results = analyzer.analyze_all(tree).await?;

    let ts = output::timestamp();
    let dir = cfg.analysis_dir();
    output::save_json(&dir, &format!("analysis_{}.json", ts), &results)?;
    output::save_json(&dir, LATEST_ANALYSIS, &results)?;

    let report = analyzer::report::generate_report(&results);
    let path = output::save_text(&dir, &format!("report_{}.md", ts), &report)?;
    println!("Report saved to {}\n", path.display());
    println!("{}", report);
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
