use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_loadforge::report::{render_summary, write_report, DEFAULT_REPORT_PATH};
use storefront_loadforge::utils::signal::graceful_then_forced;
use storefront_loadforge::{run_load_test, LoadTestConfig};

#[derive(Parser)]
#[command(name = "storefront-loadforge")]
#[command(about = "Load test the storefront frontend and API servers", long_about = None)]
struct Cli {
    /// JSON config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Frontend base URL
    #[arg(long, env = "BASE_URL")]
    base_url: Option<String>,

    /// API base URL
    #[arg(long, env = "API_URL")]
    api_url: Option<String>,

    /// Number of virtual users
    #[arg(long)]
    concurrent: Option<usize>,

    /// Test duration in seconds
    #[arg(long)]
    duration: Option<u64>,

    /// Seconds over which virtual users are started
    #[arg(long)]
    ramp_up: Option<u64>,

    #[arg(long)]
    think_time_min_ms: Option<u64>,

    #[arg(long)]
    think_time_max_ms: Option<u64>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// How long to wait for in-flight requests after stopping
    #[arg(long)]
    grace_period_ms: Option<u64>,

    /// Random seed for reproducible endpoint and think-time choices
    #[arg(long)]
    seed: Option<u64>,

    /// Where to write the JSON report
    #[arg(long, default_value = DEFAULT_REPORT_PATH)]
    output: PathBuf,

    /// Print every request and enable debug logs
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Result<(LoadTestConfig, PathBuf)> {
        let mut config = match &self.config {
            Some(path) => LoadTestConfig::from_file(path)?,
            None => LoadTestConfig::default(),
        };

        if let Some(v) = self.base_url {
            config.base_url = v;
        }
        if let Some(v) = self.api_url {
            config.api_url = v;
        }
        if let Some(v) = self.concurrent {
            config.concurrent = v;
        }
        if let Some(v) = self.duration {
            config.duration = v;
        }
        if let Some(v) = self.ramp_up {
            config.ramp_up = v;
        }
        if let Some(v) = self.think_time_min_ms {
            config.think_time_min_ms = v;
        }
        if let Some(v) = self.think_time_max_ms {
            config.think_time_max_ms = v;
        }
        if let Some(v) = self.timeout_ms {
            config.request_timeout_ms = v;
        }
        if let Some(v) = self.grace_period_ms {
            config.grace_period_ms = v;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config.verbose = self.verbose;

        Ok((config, self.output))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let (config, output) = cli.into_config()?;
    config.validate().context("Refusing to start load test")?;

    println!("{}", "🚀 Storefront Load Test".blue().bold());
    println!(
        "{}",
        format!(
            "Users: {}, Duration: {}s, Ramp-up: {}s, Frontend: {}, API: {}",
            config.concurrent, config.duration, config.ramp_up, config.base_url, config.api_url
        )
        .bright_black()
    );

    let interrupt = graceful_then_forced(tokio::signal::ctrl_c, || std::process::exit(130));

    let report = run_load_test(config, interrupt).await?;

    print!("{}", render_summary(&report));

    write_report(&report, &output)
        .with_context(|| format!("Failed to save report to {}", output.display()))?;
    tracing::info!(path = %output.display(), "report written");
    println!();
    println!("{} {}", "📄 Report saved to".green().bold(), output.display());

    Ok(())
}
