use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use gitfolio::models::{ContributionCalendar, ExtendedProfileStats, RepositorySummary, UserProfile};
use gitfolio::{
    CacheBackend, CacheStore, Config, Fetched, FileCacheStore, GitHubClient, GitHubDataService,
    MemoryCacheStore, ServiceConfig, SqliteCacheStore,
};

#[derive(Parser, Debug)]
#[command(name = "gitfolio")]
#[command(version = "0.1.0")]
#[command(about = "Fetch and cache GitHub profile data for a portfolio site")]
struct Args {
    /// GitHub username (defaults to GITHUB_USERNAME)
    #[arg(short, long, global = true)]
    username: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    format: Format,

    /// Cache backend (defaults to CACHE_BACKEND)
    #[arg(long, global = true)]
    cache: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Public profile
    Profile,
    /// Profile with pull request, commit and issue counts
    Stats,
    /// Personal and organization repositories, most starred first
    Repos,
    /// Daily contribution counts for the past year
    Contributions,
    /// Pinned repositories, or the most starred ones without a token
    Pinned {
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Refetch everything, ignoring cache freshness
    Refresh,
    /// Keep the cache warm until interrupted
    Watch {
        /// Minutes between refreshes (defaults to REFRESH_INTERVAL_MINUTES)
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Remove every cached entry
    ClearCache,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("gitfolio=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::from_env()?;
    if let Some(ref username) = args.username {
        config.username = username.clone();
    }
    if let Some(ref backend) = args.cache {
        config.cache_backend = backend.parse()?;
    }

    if config.github_token.is_none() {
        tracing::info!("GITHUB_TOKEN not set, using anonymous requests without GraphQL");
    }

    let github = GitHubClient::new(config.github_token.as_deref(), config.requests_per_minute)?;
    let store = open_store(&config).await?;
    let service = Arc::new(GitHubDataService::new(
        Arc::new(github),
        store,
        ServiceConfig::from(&config),
    ));
    let handle = config.username.clone();

    match args.command {
        Command::Profile => {
            let fetched = with_spinner("Fetching profile", service.get_profile(&handle)).await?;
            print_fetched(&fetched, args.format, format_profile)?;
        }
        Command::Stats => {
            let fetched = with_spinner("Fetching profile stats", service.get_profile_stats(&handle)).await?;
            print_fetched(&fetched, args.format, format_stats)?;
        }
        Command::Repos => {
            let fetched = with_spinner("Fetching repositories", service.get_repositories(&handle)).await?;
            print_fetched(&fetched, args.format, |repos| format_repos(repos))?;
        }
        Command::Contributions => {
            let fetched = with_spinner("Fetching contributions", service.get_contributions(&handle)).await?;
            print_fetched(&fetched, args.format, format_contributions)?;
        }
        Command::Pinned { limit } => {
            let limit = limit.unwrap_or(service.config().pinned_limit);
            let fetched = with_spinner(
                "Fetching pinned repositories",
                service.get_pinned_or_top_repositories(&handle, limit),
            )
            .await?;
            print_fetched(&fetched, args.format, |repos| format_repos(repos))?;
        }
        Command::Refresh => {
            let report = with_spinner("Refreshing", async { Ok(service.refresh_all(&handle).await) }).await?;
            for dataset in &report.refreshed {
                println!("refreshed  {}", dataset);
            }
            for (dataset, error) in &report.failed {
                println!("failed     {}: {}", dataset, error);
            }
            if !report.is_complete() {
                anyhow::bail!("{} of 4 datasets failed to refresh", report.failed.len());
            }
        }
        Command::Watch { interval } => {
            let interval = interval
                .map(|m| Duration::from_secs(m.saturating_mul(60)))
                .unwrap_or(service.config().refresh_interval);
            service.start_auto_refresh(interval);
            tracing::info!("Watching {}, press Ctrl-C to stop", handle);
            tokio::signal::ctrl_c().await?;
            service.dispose().await;
        }
        Command::ClearCache => {
            service.clear_cache().await?;
            tracing::info!("Cache cleared");
        }
    }

    Ok(())
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn CacheStore>> {
    let store: Arc<dyn CacheStore> = match config.cache_backend {
        CacheBackend::File => {
            let store = FileCacheStore::new(&config.cache_dir).await?;
            tracing::debug!("Caching to {}", store.dir().display());
            Arc::new(store)
        }
        CacheBackend::Sqlite => Arc::new(SqliteCacheStore::new(&config.cache_db_path)?),
        CacheBackend::Memory => Arc::new(MemoryCacheStore::new()),
    };
    Ok(store)
}

async fn with_spinner<T>(message: &str, fut: impl Future<Output = gitfolio::Result<T>>) -> gitfolio::Result<T> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = fut.await;
    spinner.finish_and_clear();
    result
}

fn print_fetched<T: Serialize>(
    fetched: &Fetched<T>,
    format: Format,
    render: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(fetched)?),
        Format::Text => {
            print!("{}", render(&fetched.data));
            if let Some(ref error) = fetched.error {
                println!(
                    "\n({}: showing data from {}; refresh failed: {})",
                    if fetched.is_stale() { "stale" } else { "cached" },
                    fetched.fetched_at.format("%Y-%m-%d %H:%M UTC"),
                    error
                );
            }
        }
    }
    Ok(())
}

fn format_profile(profile: &UserProfile) -> String {
    let mut output = String::new();

    output.push_str(&format!("\n=== {} ===\n\n", profile.handle));
    if let Some(ref name) = profile.name {
        output.push_str(&format!("Name: {}\n", name));
    }
    if let Some(ref bio) = profile.bio {
        output.push_str(&format!("Bio: {}\n", bio));
    }
    if let Some(ref company) = profile.company {
        output.push_str(&format!("Company: {}\n", company));
    }
    if let Some(ref location) = profile.location {
        output.push_str(&format!("Location: {}\n", location));
    }
    output.push_str(&format!("Public repositories: {}\n", profile.public_repos));
    output.push_str(&format!("Followers: {}\n", profile.followers));
    output.push_str(&format!("Member since: {}\n", profile.created_at.format("%Y-%m-%d")));
    output.push_str(&format!("Profile: {}\n", profile.profile_url));

    output
}

fn format_stats(stats: &ExtendedProfileStats) -> String {
    let mut output = format_profile(&stats.profile);

    output.push_str("\nActivity:\n");
    output.push_str(&format!("  Pull requests: {}\n", stats.total_pull_requests));
    output.push_str(&format!("  Issues: {}\n", stats.total_issues));
    output.push_str(&format!("  Commits: {}\n", stats.total_commits));
    output.push_str(&format!("  Commits in {}: {}\n", stats.commit_year, stats.commits_in_year));

    output
}

fn format_repos(repos: &[RepositorySummary]) -> String {
    let mut output = String::new();

    for repo in repos {
        output.push_str(&format!(
            "{:>6} ★ {:>5} ⑂  {}/{}",
            repo.stars, repo.forks, repo.owner, repo.name
        ));
        if let Some(ref language) = repo.language {
            output.push_str(&format!(" [{}]", language));
        }
        if repo.is_fork {
            output.push_str(" (fork)");
        }
        output.push('\n');
        if let Some(ref description) = repo.description {
            output.push_str(&format!("               {}\n", description));
        }
    }

    if repos.is_empty() {
        output.push_str("No repositories\n");
    }
    output
}

fn format_contributions(calendar: &ContributionCalendar) -> String {
    let mut output = String::new();

    if let (Some(first), Some(last)) = (calendar.first_date(), calendar.last_date()) {
        output.push_str(&format!("Contributions {} to {}: {}\n", first, last, calendar.total()));
    }
    if calendar.is_estimated {
        output.push_str("(estimated from public events; set GITHUB_TOKEN for the full calendar)\n");
    }

    let active_days = calendar.days.iter().filter(|d| d.count > 0).count();
    output.push_str(&format!("Active days: {}\n", active_days));

    if let Some(best) = calendar.days.iter().max_by_key(|d| d.count).filter(|d| d.count > 0) {
        output.push_str(&format!("Busiest day: {} ({})\n", best.date, best.count));
    }

    output.push_str("\nLast 14 days:\n");
    for day in calendar.days.iter().rev().take(14).rev() {
        output.push_str(&format!("  {} {:>3} {}\n", day.date, day.count, "■".repeat(day.count.min(40) as usize)));
    }

    output
}
