mod display;
mod logging;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use repocensus_core::crawl::sink::store_repo_dump;
use repocensus_core::discovery;
use repocensus_core::{
    ApiCallCounter, CrawlConfig, CrawlOptions, GitHubRepoSource, JsonLinesSink, Orchestrator,
    RateLimitedClient,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "repocensus",
    version,
    about = "repocensus: GitHub organization inventory crawler",
    long_about = "Crawl every repository of a GitHub organization and record its languages, \
        dependency manifests, lockfile coverage, Dockerfile posture and security signals."
)]
struct Cli {
    /// Log output format (json, pretty)
    #[arg(long, global = true, default_value = "json")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnectionArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Organization to crawl (overrides GITHUB_ORG)
    #[arg(long)]
    org: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl an organization and write one JSON line per repository
    Crawl {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Repositories fetched and imported concurrently
        #[arg(short, long)]
        parallelism: Option<usize>,

        /// Stop after a small number of repositories and log at debug level
        #[arg(long)]
        debug: bool,

        /// Crawl archived repositories too
        #[arg(long)]
        include_archived: bool,

        /// Fetch dependency-graph SBOMs
        #[arg(long)]
        sbom: bool,

        /// Output JSON-lines file
        #[arg(short, long, default_value = "repocensus.jsonl")]
        output: PathBuf,

        /// Append to the output file instead of truncating it
        #[arg(long)]
        append: bool,
    },

    /// Store the raw repository listing of an organization
    List {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Directory receiving <org>_repos_raw_dump.json
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Analyze a local checkout without network access
    Analyze {
        /// Directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Maximum directory depth to descend
        #[arg(long, default_value = "8")]
        max_depth: usize,
    },
}

struct CrawlOverrides {
    parallelism: Option<usize>,
    debug: bool,
    include_archived: bool,
    sbom: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl {
            connection,
            parallelism,
            debug,
            include_archived,
            sbom,
            output,
            append,
        } => {
            logging::init_tracing(if debug { "debug" } else { "info" }, &cli.log_format)?;
            let overrides = CrawlOverrides {
                parallelism,
                debug,
                include_archived,
                sbom,
            };
            cmd_crawl(&connection, &overrides, &output, append).await
        }
        Commands::List {
            connection,
            output_dir,
        } => {
            logging::init_tracing("info", &cli.log_format)?;
            cmd_list(&connection, &output_dir).await
        }
        Commands::Analyze {
            path,
            format,
            max_depth,
        } => {
            logging::init_tracing("warn", &cli.log_format)?;
            cmd_analyze(&path, &format, max_depth)
        }
    }
}

/// File, then environment, then flags.
fn load_config(connection: &ConnectionArgs, overrides: Option<&CrawlOverrides>) -> Result<CrawlConfig> {
    let mut config = CrawlConfig::load(connection.config.as_deref()).with_context(|| match &connection.config {
        Some(path) => format!("Failed to load config from '{}'", path.display()),
        None => "Failed to load config from the environment".to_string(),
    })?;

    if let Some(org) = &connection.org {
        config.org = org.clone();
    }
    if let Some(o) = overrides {
        if let Some(n) = o.parallelism {
            config.parallelism = n;
        }
        config.debug |= o.debug;
        config.sbom |= o.sbom;
        if o.include_archived {
            config.skip_archived = false;
        }
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Cancel `token` on the first Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling outstanding requests");
            token.cancel();
        }
    });
}

async fn cmd_crawl(
    connection: &ConnectionArgs,
    overrides: &CrawlOverrides,
    output: &Path,
    append: bool,
) -> Result<()> {
    let config = load_config(connection, Some(overrides))?;
    info!(config = ?config, "starting crawl");

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let counter = Arc::new(ApiCallCounter::new());
    let client = RateLimitedClient::from_config(&config, Arc::clone(&counter), cancel.clone())
        .context("Failed to build GitHub client")?;
    let source = GitHubRepoSource::new(client, config.org.clone(), config.sbom);
    let sink = if append {
        JsonLinesSink::append(output).await?
    } else {
        JsonLinesSink::create(output).await?
    };

    let orchestrator = Orchestrator::new(
        Arc::new(source),
        Arc::new(sink),
        CrawlOptions::from(&config),
        counter,
        cancel,
    );
    let summary = orchestrator
        .run()
        .await
        .with_context(|| format!("Crawl of '{}' failed", config.org))?;

    display::print_crawl_summary(&config.org, output, &summary);
    Ok(())
}

async fn cmd_list(connection: &ConnectionArgs, output_dir: &Path) -> Result<()> {
    let config = load_config(connection, None)?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let counter = Arc::new(ApiCallCounter::new());
    let client = RateLimitedClient::from_config(&config, Arc::clone(&counter), cancel)
        .context("Failed to build GitHub client")?;
    let source = GitHubRepoSource::new(client, config.org.clone(), false);
    let repos = source
        .list_all()
        .await
        .with_context(|| format!("Failed to list repositories of '{}'", config.org))?;

    let path = store_repo_dump(output_dir, &config.org, &repos)?;
    display::print_list_summary(&config.org, &path, &repos, counter.get());
    Ok(())
}

fn cmd_analyze(path: &Path, format: &str, max_depth: usize) -> Result<()> {
    let report = discovery::analyze_checkout(path, max_depth)
        .with_context(|| format!("Failed to analyze '{}'", path.display()))?;

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&report)?;
            println!("{}", json);
        }
        _ => display::print_local_report(&report),
    }
    Ok(())
}
