//! Forecast Desk CLI
//!
//! One binary for every question: simulate, monitor and track forecasts
//! from a per-question TOML file.

use chrono::Utc;
use clap::{Parser, Subcommand};
use forecast_desk::{
    config::Config,
    ensemble,
    monitor::{Monitor, RunOptions},
    simulation::{self, Simulator},
    state::QuestionState,
    storage::Journal,
    tracker::{ProgressStatus, Tracker},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "forecast-desk")]
#[command(about = "Forecasting toolkit for tournament questions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Question config file path
    #[arg(short, long, default_value = "question.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Monte Carlo model
    Simulate {
        /// Override the configured sample count
        #[arg(long)]
        samples: Option<usize>,
        /// Override the configured seed
        #[arg(long)]
        seed: Option<u64>,
        /// Print only, skip forecast_output.json / forecast_percentiles.csv
        #[arg(long)]
        no_write: bool,
    },
    /// Combine point estimates and blend outcome probabilities
    Ensemble,
    /// Poll sources, diff values and raise alerts
    Monitor {
        /// Fetch and classify, but persist nothing
        #[arg(long)]
        dry_run: bool,
        /// Ask the LLM about recent developments instead of polling sources
        #[arg(long, conflicts_with_all = ["dry_run", "values_only"])]
        quick: bool,
        /// Values only, skip news sources
        #[arg(long)]
        values_only: bool,
    },
    /// Show forecast, progress and key dates
    Status,
    /// Log a question event
    AddEvent {
        event_type: String,
        description: String,
        #[arg(default_value = "")]
        source: String,
    },
    /// Record a new forecast (0-1)
    Forecast { value: f64, reason: String },
    /// Apply a pre-committed trigger, or list them
    Trigger { name: Option<String> },
    /// Set the cumulative count
    SetCount {
        count: u64,
        /// Add to the current count instead of replacing it
        #[arg(long)]
        add: bool,
    },
    /// Show forecast history
    History {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Simulate { samples, seed, no_write } => run_simulation(config, samples, seed, no_write).await,
        Commands::Ensemble => run_ensemble(config),
        Commands::Monitor {
            dry_run,
            quick,
            values_only,
        } => {
            if quick {
                run_quick_check(config).await
            } else {
                run_monitor(config, dry_run, values_only).await
            }
        }
        Commands::Status => show_status(config).await,
        Commands::AddEvent {
            event_type,
            description,
            source,
        } => add_event(config, &event_type, &description, &source).await,
        Commands::Forecast { value, reason } => record_forecast(config, value, &reason).await,
        Commands::Trigger { name } => trigger(config, name.as_deref()).await,
        Commands::SetCount { count, add } => set_count(config, count, add).await,
        Commands::History { limit } => show_history(config, limit).await,
    }
}

async fn open_journal(config: &Config) -> anyhow::Result<Option<Journal>> {
    match &config.database {
        Some(db) => Ok(Some(Journal::connect(&db.path).await?)),
        None => Ok(None),
    }
}

async fn load_tracker(config: &Config) -> anyhow::Result<Tracker> {
    let state = QuestionState::load(&config.monitor.state_file).await?;
    Ok(Tracker::new(config.question.clone(), state))
}

/// Save state and mirror any new history entries into the journal
async fn save_tracker(config: &Config, tracker: &Tracker, history_before: usize) -> anyhow::Result<()> {
    tracker.state().save(&config.monitor.state_file).await?;
    if let Some(journal) = open_journal(config).await? {
        for entry in &tracker.state().forecast_history[history_before..] {
            journal.record_forecast(&config.question.id, entry).await?;
        }
    }
    Ok(())
}

async fn run_simulation(
    config: Config,
    samples: Option<usize>,
    seed: Option<u64>,
    no_write: bool,
) -> anyhow::Result<()> {
    let Some(mut sim_config) = config.simulation.clone() else {
        anyhow::bail!("No [simulation] section in {}", config.question.id);
    };
    if let Some(samples) = samples {
        sim_config.samples = samples;
    }
    if let Some(seed) = seed {
        sim_config.seed = seed;
    }

    println!("\n🎲 Simulating: {}\n", sim_config.target);
    let report = Simulator::from_config(&sim_config).run(&sim_config)?;

    if let Some(mixture) = &report.mixture {
        println!("Samples: {} (seed {})", report.samples, report.seed);
        for (label, value) in mixture.forecast_percentiles.entries() {
            println!("  {:<4} {:>12.4}", label, value);
        }
        println!("  mean {:>12.4}  std {:.4}", mixture.forecast_mean, mixture.forecast_std);
        for (label, p) in &mixture.tail_probs {
            println!("  {} = {:.1}%", label, p * 100.0);
        }
    }
    if let Some(any) = &report.any_event {
        println!("\nP(any event): {:.1}%", any.probability * 100.0);
    }

    println!("\n{}", serde_json::to_string_pretty(&report)?);

    if !no_write {
        for path in simulation::write_outputs(&report, &sim_config.output_dir)? {
            println!("📝 Wrote {}", path.display());
        }
        if let Some(journal) = open_journal(&config).await? {
            journal.record_simulation(&config.question.id, &report).await?;
        }
    }

    Ok(())
}

fn run_ensemble(config: Config) -> anyhow::Result<()> {
    let Some(ensemble_config) = &config.ensemble else {
        anyhow::bail!("No [ensemble] section in {}", config.question.id);
    };

    let report = ensemble::run(ensemble_config)?;

    println!("\n📊 Ensemble: {}\n", config.question.title);
    if let Some(point) = &report.point {
        println!("Combined estimate: {:.4}", point.value);
        for (name, share) in &point.contributions {
            println!("  {:<30} {:>10.4}", name, share);
        }
        if let Some(interval) = &point.interval {
            println!("  90% interval: [{:.4}, {:.4}]", interval.p5, interval.p95);
        }
    }
    if let Some(blended) = report.blended_probabilities.as_ref().or(report.model_probabilities.as_ref()) {
        println!("\nOutcome probabilities:");
        for (name, p) in blended {
            println!("  {:<30} {:>6.1}%", name, p * 100.0);
        }
    }

    println!("\n{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_monitor(config: Config, dry_run: bool, values_only: bool) -> anyhow::Result<()> {
    tracing::info!("Starting monitor for {}", config.question.id);

    if dry_run {
        tracing::warn!("Running in DRY RUN mode - nothing will be saved");
    }

    let mut monitor = Monitor::from_config(&config)?;
    if !dry_run {
        if let Some(journal) = open_journal(&config).await? {
            monitor = monitor.with_journal(journal);
        }
    }

    let report = monitor.run(RunOptions { dry_run, values_only }).await?;

    println!("\n🔎 Monitor: {}\n", report.question);
    println!(
        "Items: {} checked, {} new, {} relevant ({})",
        report.items_checked,
        report.new_items,
        report.relevant.len(),
        report.method
    );
    if report.alerts.is_empty() {
        println!("Alerts: none");
    } else {
        println!("🚨 Alerts:");
        for alert in &report.alerts {
            println!("  {}", serde_json::to_string(alert)?);
        }
    }
    if let Some(path) = &report.report_path {
        println!("📝 Report: {}", path);
    }

    println!("\n{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_quick_check(config: Config) -> anyhow::Result<()> {
    let monitor = Monitor::from_config(&config)?;
    let report = monitor.quick_check().await?;

    println!("\n⚡ Quick check: {}\n", report.question);
    match config.question.threshold {
        Some(threshold) => println!(
            "Forecast: {:.1}%  Count: {} / {}  ({})",
            report.forecast * 100.0,
            report.cumulative_count,
            threshold,
            report.classifier
        ),
        None => println!("Forecast: {:.1}%  ({})", report.forecast * 100.0, report.classifier),
    }
    println!("\n{}", report.findings);
    println!("\nNothing saved. Use `set-count` or `forecast` to record changes.");
    Ok(())
}

async fn show_status(config: Config) -> anyhow::Result<()> {
    let tracker = load_tracker(&config).await?;
    let summary = tracker.summary(Utc::now().date_naive(), 5);

    println!("\n📋 {}\n", summary.question);
    println!("Forecast: {:.1}%", summary.forecast * 100.0);
    println!("Status: {:?}", summary.status);

    if let Some(p) = &summary.progress {
        let flag = match p.status {
            ProgressStatus::OnTrack => "✅ on track",
            ProgressStatus::Behind => "⚠️  behind",
            ProgressStatus::ResolvedYes => "🎯 resolved YES",
        };
        println!(
            "Progress: {} / {} ({:.1}%), day {} of {}, {} days left, {}",
            p.cumulative, p.threshold, p.progress_pct, p.days_elapsed, p.total_days, p.days_remaining, flag
        );
    }

    if !summary.key_dates.is_empty() {
        println!("\nKey dates:");
        for kd in &summary.key_dates {
            let marker = if kd.passed {
                "passed"
            } else if kd.critical {
                "🔴"
            } else {
                ""
            };
            println!("  {:<24} {} ({} days) {}", kd.name, kd.date, kd.days_remaining, marker);
        }
    }

    if !summary.recent_events.is_empty() {
        println!("\nRecent events:");
        for event in &summary.recent_events {
            println!(
                "  {} [{}] {}",
                event.date.format("%Y-%m-%d"),
                event.event_type,
                event.description
            );
        }
    }

    if !summary.recent_forecasts.is_empty() {
        println!("\nRecent forecasts:");
        for entry in &summary.recent_forecasts {
            println!(
                "  {} {:.1}% {}",
                entry.date.format("%Y-%m-%d"),
                entry.forecast * 100.0,
                entry.reason
            );
        }
    }

    Ok(())
}

async fn add_event(config: Config, event_type: &str, description: &str, source: &str) -> anyhow::Result<()> {
    let mut tracker = load_tracker(&config).await?;
    let before = tracker.state().forecast_history.len();
    tracker.add_event(event_type, description, source);
    save_tracker(&config, &tracker, before).await?;

    println!("✅ Event logged: [{}] {}", event_type, description);
    Ok(())
}

async fn record_forecast(config: Config, value: f64, reason: &str) -> anyhow::Result<()> {
    let mut tracker = load_tracker(&config).await?;
    let before = tracker.state().forecast_history.len();
    let previous = tracker.update_forecast(value, reason)?;
    save_tracker(&config, &tracker, before).await?;

    println!("✅ Forecast: {:.1}% -> {:.1}% ({})", previous * 100.0, value * 100.0, reason);
    Ok(())
}

async fn trigger(config: Config, name: Option<&str>) -> anyhow::Result<()> {
    let Some(name) = name else {
        println!("\n🎯 Triggers\n");
        if config.question.triggers.is_empty() {
            println!("  (none configured)");
        }
        for t in &config.question.triggers {
            println!("  {:<20} -> {:>5.1}%  {}", t.name, t.new_forecast * 100.0, t.condition);
        }
        return Ok(());
    };

    let mut tracker = load_tracker(&config).await?;
    let before = tracker.state().forecast_history.len();
    let (previous, applied) = tracker.apply_trigger(name)?;
    save_tracker(&config, &tracker, before).await?;

    println!(
        "🎯 Trigger {}: {:.1}% -> {:.1}% ({})",
        applied.name,
        previous * 100.0,
        applied.new_forecast * 100.0,
        applied.condition
    );
    Ok(())
}

async fn set_count(config: Config, count: u64, add: bool) -> anyhow::Result<()> {
    let mut tracker = load_tracker(&config).await?;
    let before = tracker.state().forecast_history.len();
    let total = if add {
        tracker.add_count(count)
    } else {
        tracker.set_count(count);
        count
    };
    save_tracker(&config, &tracker, before).await?;

    match config.question.threshold {
        Some(threshold) => println!("✅ Count: {} / {}", total, threshold),
        None => println!("✅ Count: {}", total),
    }
    Ok(())
}

async fn show_history(config: Config, limit: usize) -> anyhow::Result<()> {
    let journal = open_journal(&config).await?;
    let history = match &journal {
        Some(journal) => journal.forecast_history(&config.question.id).await?,
        None => load_tracker(&config).await?.into_state().forecast_history,
    };

    println!("\n📈 Forecast history: {}\n", config.question.title);
    if history.is_empty() {
        println!("  (no entries)");
    }
    let skip = history.len().saturating_sub(limit);
    for entry in &history[skip..] {
        let count = entry
            .cumulative
            .map(|c| format!(" [count {}]", c))
            .unwrap_or_default();
        println!(
            "  {} {:>5.1}%{} {}",
            entry.date.format("%Y-%m-%d %H:%M"),
            entry.forecast * 100.0,
            count,
            entry.reason
        );
    }

    if let Some(journal) = &journal {
        let runs = journal.recent_runs(&config.question.id, limit as i64).await?;
        if !runs.is_empty() {
            println!("\n🔎 Recent monitor runs:");
            for run in &runs {
                println!(
                    "  {} {} new / {} relevant, {} alerts, count {}, {:.1}% ({})",
                    run.timestamp.format("%Y-%m-%d %H:%M"),
                    run.new_items,
                    run.relevant_items,
                    run.alerts,
                    run.cumulative_count,
                    run.forecast * 100.0,
                    run.method
                );
            }
        }
    }
    Ok(())
}
