//! EcoPulse - open-source ecosystem analytics
//!
//! A CLI tool that loads GitHub repositories with their time-series
//! metrics, scores health, growth, risk and momentum per project, and
//! writes an ecosystem report.
//!
//! Exit codes:
//!   0 - Success (no project above threshold, or no --fail-on set)
//!   1 - Runtime error (config, project list could not be loaded, etc.)
//!   2 - Some project at or above the --fail-on risk level

mod analysis;
mod cli;
mod config;
mod metrics;
mod models;
mod report;
mod source;

use analysis::{CategoryRules, ScoringContext, SummaryOptions};
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use models::{Report, ReportMetadata, RiskLevel};
use report::ReportOptions;
use source::Sources;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration first so [general] verbose can set the log level
    let (mut config, config_origin) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(args.log_level(config.general.verbose));

    info!("EcoPulse v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    info!("Configuration: {}", config_origin);

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let result = match args.watch {
        Some(seconds) => run_watch(&args, &config, seconds).await,
        None => run_analysis(&args, &config).await,
    };

    match result {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .ecopulse.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Set [source] api_url or data_dir, then run ecopulse.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Re-run the analysis every `seconds` until Ctrl-C. Each run is
/// independent; a failed run is reported and the loop keeps going.
/// Returns the exit code of the last completed run.
async fn run_watch(args: &Args, config: &Config, seconds: u64) -> Result<i32> {
    println!("👀 Watching: refreshing every {}s (Ctrl-C to stop)", seconds);

    let exit_code = watch_loop(Duration::from_secs(seconds), tokio::signal::ctrl_c(), || {
        run_analysis(args, config)
    })
    .await;

    println!("\n👋 Stopping watch.");
    Ok(exit_code)
}

/// Call `run` on every tick until `shutdown` resolves. `shutdown` is
/// listened to for the whole loop, so it also cancels a run in progress.
/// Returns the exit code of the last completed run, 0 if none completed.
async fn watch_loop<S, F, Fut>(period: Duration, shutdown: S, mut run: F) -> i32
where
    S: Future,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<i32>>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut last_exit_code = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut shutdown => break,
        }

        tokio::select! {
            result = run() => {
                match result {
                    Ok(code) => last_exit_code = code,
                    Err(e) => {
                        error!("Analysis run failed: {:#}", e);
                        eprintln!("\n❌ Error: {:#}", e);
                        last_exit_code = 1;
                    }
                }
                println!("\n⏰ Next refresh in {}s", period.as_secs());
            }
            _ = &mut shutdown => {
                warn!("Interrupted during an analysis run");
                break;
            }
        }
    }

    last_exit_code
}

/// Run the complete analytics pipeline once. Returns exit code (0 or 2).
async fn run_analysis(args: &Args, config: &Config) -> Result<i32> {
    let start_time = Instant::now();
    let now = Utc::now();

    // Step 1: Load the project list
    let sources = Sources::try_from(&config.source).context("Failed to set up data sources")?;

    println!("📥 Loading projects from {}", sources.describe());
    let projects = sources.load_projects().await.map_err(|e| {
        error!("Project list unavailable: {}", e);
        anyhow::anyhow!("failed to load project list, please retry ({})", e)
    })?;

    if projects.is_empty() {
        warn!("Project list is empty");
    }

    // Step 2: Fetch metrics
    println!(
        "📊 Fetching metrics for {} projects (concurrency {})...",
        projects.len(),
        config.general.concurrency
    );
    let metrics = sources
        .fetch_all(&projects, config.general.concurrency, !args.quiet)
        .await;

    // Step 3: Score every project
    println!("🔬 Scoring projects...");
    let ctx = ScoringContext::new(config.analysis.granularity, now)
        .with_categories(CategoryRules::with_extra(&config.analysis.categories));
    let analyses = analysis::analyze_all(&projects, &metrics, &ctx);

    // Step 4: Filter and aggregate
    let query = (sources.remote.is_some() && sources.projects_file.is_none())
        .then(|| config.source.query.clone());
    let filters = args.filter_state(query);
    let analyses = analysis::apply_filters(analyses, &filters);

    let summary = analysis::summarize(&analyses, &SummaryOptions::from(&config.analysis));

    // Step 5: Build and save the report
    println!("\n📝 Generating report...");

    let duration = start_time.elapsed().as_secs_f64();
    let report = Report {
        metadata: ReportMetadata {
            generated_at: now,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            source: sources.describe(),
            granularity: config.analysis.granularity,
            duration_seconds: duration,
        },
        filters,
        summary,
        projects: analyses.into_iter().flatten().collect(),
    };

    let output_path = output_path(args, config);
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => {
            report::generate_markdown_report(&report, &ReportOptions::from(&config.report))
        }
    };

    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    // Print summary
    println!("\n📈 Ecosystem Summary:");
    for line in analysis::generate_summary_text(&report.summary).lines() {
        println!("   {}", line);
    }
    println!("   Duration: {:.1}s", duration);
    println!("\n✅ Analysis complete! Report saved to: {}", output_path.display());

    // Check --fail-on threshold
    if let Some(fail_level) = args.fail_on {
        let threshold = RiskLevel::from(fail_level);
        let at_or_above = report
            .projects
            .iter()
            .filter(|p| p.risk_level >= threshold)
            .count();

        if at_or_above > 0 {
            eprintln!(
                "\n⛔ {} projects at or above {} risk. Failing (exit code 2).",
                at_or_above, threshold
            );
            return Ok(2);
        }
    }

    Ok(0)
}

/// The report path. Without an explicit `--output`, a JSON report swaps the
/// configured `.md` extension for `.json`.
fn output_path(args: &Args, config: &Config) -> PathBuf {
    if let Some(ref output) = args.output {
        return output.clone();
    }

    let path = PathBuf::from(&config.general.output);
    if args.format == OutputFormat::Json && path.extension().is_some_and(|e| e == "md") {
        path.with_extension("json")
    } else {
        path
    }
}

/// Load configuration from file or use defaults. Runs before logging is
/// set up, so problems go to stderr and the origin is returned for logging.
fn load_config(args: &Args) -> Result<(Config, String)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, config_path.display().to_string()));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, DEFAULT_CONFIG_FILE.to_string())),
        Ok(None) => Ok((Config::default(), "defaults (no config file)".to_string())),
        Err(e) => {
            eprintln!("⚠️  Failed to load {}: {:#}", DEFAULT_CONFIG_FILE, e);
            Ok((Config::default(), "defaults (config file unreadable)".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_watch_stops_during_a_run() {
        let shutdown = tokio::time::sleep(Duration::from_millis(50));
        let run = || std::future::pending::<Result<i32>>();

        let stopped = tokio::time::timeout(
            Duration::from_secs(5),
            watch_loop(Duration::from_secs(1000), shutdown, run),
        )
        .await;

        assert_eq!(stopped.ok(), Some(0));
    }

    #[tokio::test]
    async fn test_watch_returns_last_exit_code() {
        let runs = AtomicUsize::new(0);
        let shutdown = tokio::time::sleep(Duration::from_millis(200));
        let run = || {
            let n = runs.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(anyhow::anyhow!("first run fails"))
                } else {
                    Ok(2)
                }
            }
        };

        let code = watch_loop(Duration::from_millis(20), shutdown, run).await;

        assert!(runs.load(Ordering::SeqCst) >= 2);
        assert_eq!(code, 2);
    }

    #[test]
    fn test_output_path_swaps_extension_for_json() {
        use clap::Parser;

        let args = Args::try_parse_from(["ecopulse", "--data-dir", ".", "--format", "json"]).unwrap();
        assert_eq!(output_path(&args, &Config::default()), PathBuf::from("ecopulse_report.json"));

        let args =
            Args::try_parse_from(["ecopulse", "--data-dir", ".", "--format", "json", "-o", "out.md"]).unwrap();
        assert_eq!(output_path(&args, &Config::default()), PathBuf::from("out.md"));
    }
}
