use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Write};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use github_activity_agent::agent::ActivityAgent;
use github_activity_agent::cache::ActivityCache;
use github_activity_agent::config::{self, Config};
use github_activity_agent::github::GitHubClient;
use github_activity_agent::models::RepoActivity;
use github_activity_agent::report;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory for cached snapshots and reports
    #[arg(short = 'd', long)]
    data_dir: Option<String>,

    /// Days of history to collect
    #[arg(long)]
    days: Option<u64>,

    /// Comma-separated owner/repo slugs (overrides REPOS)
    #[arg(short = 'r', long)]
    repos: Option<String>,

    /// Reuse the latest cached snapshots instead of fetching from GitHub
    #[arg(long)]
    use_cache: bool,

    /// Stop after collection, skip LLM analysis and indexing
    #[arg(long)]
    skip_analysis: bool,

    /// Answer a single question and exit instead of the interactive loop
    #[arg(short = 'q', long)]
    query: Option<String>,
}

async fn collect_activities(config: &Config, cache: &ActivityCache) -> Result<Vec<RepoActivity>> {
    let token = config
        .github
        .token
        .as_deref()
        .context("GITHUB_TOKEN is not set")?;
    let client = GitHubClient::new(token, &config.github.api_url)?;

    let mut activities = Vec::new();
    for repo in &config.collection.repos {
        match client.collect(repo, config.collection.days).await {
            Ok(activity) => {
                cache.save(&activity)?;
                activities.push(activity);
            }
            // One bad repository should not sink the whole run.
            Err(e) => error!(repo = %repo, "error collecting data: {:#}", e),
        }
    }
    Ok(activities)
}

async fn query_loop(agent: &ActivityAgent) -> Result<()> {
    println!("\nEnter queries about the repositories (type 'exit' to quit):");
    let mut buffer = String::new();

    loop {
        print!("\nQuery: ");
        io::stdout().flush()?;

        buffer.clear();
        if io::stdin().read_line(&mut buffer)? == 0 {
            break;
        }
        let query = buffer.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query.to_lowercase().as_str(), "exit" | "quit" | "q") {
            break;
        }

        match agent.answer(query).await {
            Ok(answer) => println!("\nAnswer: {}", answer),
            Err(e) => error!("query failed: {:#}", e),
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    let mut config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    // CLI args override environment configuration
    if let Some(dir) = args.data_dir {
        config.collection.data_dir = dir;
    }
    if let Some(days) = args.days {
        config.collection.days = days;
    }
    if let Some(repos) = args.repos {
        config.collection.repos = config::parse_repos(&repos);
    }

    if config.collection.repos.is_empty() {
        anyhow::bail!("no valid repositories configured");
    }

    let cache = ActivityCache::new(&config.collection.data_dir)?;

    let mut activities = Vec::new();
    if args.use_cache {
        activities = cache.load_latest()?;
        if activities.is_empty() {
            warn!("no cached snapshots found, collecting fresh data");
        } else {
            info!(snapshots = activities.len(), "loaded cached snapshots");
        }
    }
    if activities.is_empty() {
        activities = collect_activities(&config, &cache).await?;
    }

    if activities.is_empty() {
        anyhow::bail!("no activity data available for any configured repository");
    }

    if args.skip_analysis {
        println!(
            "Collected {} snapshot(s) into {}",
            activities.len(),
            config.collection.data_dir
        );
        return Ok(());
    }

    if config.llm.api_key.is_empty() {
        anyhow::bail!("OPENAI_API_KEY is not set");
    }

    let agent = ActivityAgent::from_config(&config)?;

    let paths = report::write_reports(&agent, &activities, cache.dir()).await?;
    println!("Generated {} report(s):", paths.len());
    for path in &paths {
        println!("  {}", path.display());
    }

    let indexed = agent.build_index(&activities).await?;
    info!(records = indexed, "activity records indexed for querying");

    if let Some(query) = args.query {
        let answer = agent.answer(&query).await?;
        println!("\nAnswer: {}", answer);
        return Ok(());
    }

    query_loop(&agent).await
}
