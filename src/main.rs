use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use beacon::duration::{format_duration, parse_duration};
use beacon::{Command, CommandStream, SharedOverlay, VitalsFeed};
use beacon_adapters::{observe, LoopLagSource};
use beacon_sdk::{anon_id, FlushOutcome, Pipeline, PipelineConfig, DEFAULT_MAX_QUEUE};
use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "beacon")]
#[command(about = "Feed NDJSON events through a telemetry pipeline and watch its queue")]
struct Args {
    /// NDJSON input file (default: stdin)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Collector endpoint, overrides config and TELEMETRY_ENDPOINT
    #[arg(short, long, value_parser = parse_endpoint)]
    endpoint: Option<String>,

    /// Pipeline config file (toml, yaml or json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fraction of events forwarded to the collector, 0 to 1
    #[arg(short, long)]
    sample_rate: Option<f64>,

    /// Accept events but send nothing
    #[arg(long)]
    disabled: bool,

    /// Role attached to events that carry none
    #[arg(long)]
    role: Option<String>,

    /// File holding the persistent anonymous id, created if missing
    #[arg(long)]
    anon_id_file: Option<PathBuf>,

    /// Periodic flush interval (e.g. "5s", "500ms")
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    flush_interval: Duration,

    /// Maximum events held in memory
    #[arg(long, default_value_t = DEFAULT_MAX_QUEUE)]
    max_queue: usize,

    /// Overlay refresh interval
    #[arg(long, default_value = "1s", value_parser = parse_duration)]
    stats_interval: Duration,

    /// Sample runtime loop lag at this period (e.g. "1s")
    #[arg(long, value_parser = parse_duration)]
    loop_lag: Option<Duration>,

    /// Do not print the overlay
    #[arg(short, long)]
    quiet: bool,
}

fn parse_endpoint(s: &str) -> Result<String> {
    let s = s.trim();
    if !(s.starts_with("http://") || s.starts_with("https://")) {
        bail!("expected an http:// or https:// URL");
    }
    Ok(s.to_string())
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(run(args));
    // The stdin reader may still be parked in a blocking read
    rt.shutdown_timeout(Duration::from_millis(250));
    result
}

/// Config file (or environment), then command-line overrides.
fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PipelineConfig::from_env().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring telemetry environment");
            PipelineConfig::default()
        }),
    };

    if let Some(endpoint) = &args.endpoint {
        config.endpoint = Some(endpoint.clone());
    }
    if let Some(rate) = args.sample_rate {
        config.sample_rate = rate;
    }
    if args.disabled {
        config.enabled = false;
    }
    Ok(config.normalized())
}

fn build_pipeline(args: &Args, config: PipelineConfig) -> Pipeline {
    let mut builder = Pipeline::builder()
        .config(config)
        .flush_interval(args.flush_interval)
        .max_queue(args.max_queue);

    if let Some(role) = &args.role {
        builder = builder.default_role(role.as_str());
    }
    if let Some(path) = &args.anon_id_file {
        match anon_id::load_or_create(path) {
            Some(id) => builder = builder.default_anonymous_id(id),
            None => tracing::warn!(path = %path.display(), "anonymous id unavailable"),
        }
    }
    builder.build()
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    if config.endpoint.is_none() {
        tracing::warn!("no collector endpoint configured, events stay queued");
    }
    let pipeline = build_pipeline(&args, config);

    let (overlay, _overlay_sub) = SharedOverlay::attach(&pipeline);

    let vitals = VitalsFeed::attach(&pipeline);
    if let Some(period) = args.loop_lag {
        observe(&pipeline, LoopLagSource::new(period));
    }

    let mut commands = match &args.file {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening {}", path.display()))?;
            CommandStream::spawn(file, &path.display().to_string())
        }
        None => CommandStream::spawn(tokio::io::stdin(), "stdin"),
    };

    let mut ticker = tokio::time::interval(args.stats_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let interrupted = loop {
        tokio::select! {
            command = commands.next() => match command {
                Some(command) => apply(&pipeline, &vitals, command).await,
                None => break false,
            },
            _ = overlay.changed(), if !args.quiet => draw(&overlay, &pipeline),
            _ = ticker.tick(), if !args.quiet => draw(&overlay, &pipeline),
            _ = &mut ctrl_c => break true,
        }
    };
    // Vitals from the last lines must be queued before flush and teardown
    vitals.close().await;

    if commands.rejected() > 0 {
        tracing::warn!(
            rejected = commands.rejected(),
            source = commands.description(),
            "some input lines were skipped"
        );
    }

    if interrupted {
        tracing::info!("interrupted, sending teardown beacon");
    } else {
        report(pipeline.flush().await);
    }

    let handed_over = pipeline.teardown();
    if handed_over > 0 {
        tracing::info!(events = handed_over, "teardown beacon sent");
    }

    if !args.quiet {
        draw(&overlay, &pipeline);
    }
    Ok(())
}

async fn apply(pipeline: &Pipeline, vitals: &VitalsFeed, command: Command) {
    match command {
        Command::Emit(draft) => pipeline.emit(draft),
        Command::Mark(name) => pipeline.mark(&name),
        Command::MarkEnd { name, event_type } => {
            if pipeline.mark_end(&name, event_type.as_deref()).is_none() {
                tracing::debug!(mark = %name, "markEnd without a matching mark");
            }
        }
        Command::Vital(observation) => vitals.send(observation).await,
        Command::Flush => report(pipeline.flush().await),
    }
}

fn report(outcome: FlushOutcome) {
    match outcome {
        FlushOutcome::Delivered { events } => tracing::info!(events, "flushed"),
        FlushOutcome::Requeued { events, retry_in } => tracing::warn!(
            events,
            retry_in = %format_duration(retry_in),
            "flush failed, events requeued"
        ),
        FlushOutcome::Skipped(reason) => tracing::debug!(?reason, "flush skipped"),
    }
}

fn draw(overlay: &SharedOverlay, pipeline: &Pipeline) {
    let text = overlay.render(&pipeline.stats());
    let mut stdout = io::stdout().lock();
    let result = if stdout.is_terminal() {
        writeln!(stdout, "\x1b[2J\x1b[H{}", text)
    } else {
        writeln!(stdout, "{}", text)
    };
    if result.and_then(|_| stdout.flush()).is_err() {
        tracing::debug!("stdout closed");
    }
}
