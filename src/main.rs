// Quota Sync - Main Entry Point
//
// Reads control-plane and bus secrets, then publishes one quota event per
// workspace/cluster pair:
// - run: a single pass (default)
// - daemon: a pass every interval, with optional /metrics
// - check-config: validate configuration and secrets without side effects

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quota_sync::config::{Config, Secrets};
use quota_sync::http::HttpClient;
use quota_sync::kubesphere::Credentials;
use quota_sync::normalize::FallbackUsage;
use quota_sync::publisher::{parse_brokers, EventSink, KafkaSink, LogSink, Publisher};
use quota_sync::sync::{self, SyncOptions, Synchronizer};
use quota_sync::{metrics, metrics_server};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Quota Sync: KubeSphere workspace quotas to Kafka
#[derive(Parser, Debug)]
#[command(name = "quota-sync")]
#[command(version)]
#[command(about = "Publish KubeSphere workspace resource quotas to Kafka", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the host, user, passwd, kafkaAddr and kafkaTopic files
    #[arg(long, global = true)]
    secrets_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synchronize once and exit
    Run {
        /// Log events instead of writing them to Kafka
        #[arg(long)]
        dry_run: bool,
    },
    /// Synchronize on a fixed interval until stopped
    Daemon {
        /// Seconds between runs (overrides the config file)
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Validate configuration and secrets, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(Config::config_path);
    let mut config =
        Config::load_from_path(&config_path).context("Failed to load configuration")?;
    if let Some(dir) = &args.secrets_dir {
        config.sync.secrets_dir = dir.clone();
    }

    init_tracing(&config, args.verbose)?;
    if config_path.exists() {
        info!(path = %config_path.display(), "Loaded configuration");
    } else {
        info!(path = %config_path.display(), "No configuration file, using defaults");
    }

    match args.command.unwrap_or(Commands::Run { dry_run: false }) {
        Commands::Run { dry_run } => run_once(&config, dry_run).await,
        Commands::Daemon { interval_secs } => {
            if let Some(secs) = interval_secs {
                anyhow::ensure!(secs > 0, "--interval-secs must be > 0");
                config.sync.interval_secs = secs;
            }
            run_daemon(&config).await
        }
        Commands::CheckConfig => check_config(&config),
    }
}

fn init_tracing(config: &Config, verbose: bool) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        config.log_level()?
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.logging.format.to_lowercase().as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.compact().init(),
    }
    Ok(())
}

fn load_secrets(config: &Config) -> Result<Secrets> {
    Secrets::load(&config.sync.secrets_dir).with_context(|| {
        format!(
            "Failed to read secrets from {}",
            config.sync.secrets_dir.display()
        )
    })
}

async fn build_synchronizer(
    config: &Config,
    secrets: &Secrets,
    dry_run: bool,
) -> Result<Synchronizer<Box<dyn EventSink>>> {
    let http = HttpClient::new(config.http.timeout(), config.http.insecure_skip_verify)
        .context("Failed to build HTTP client")?;
    if http.is_insecure() {
        warn!("TLS certificate verification is disabled for the control plane");
    }

    let sink: Box<dyn EventSink> = if dry_run {
        info!("Dry run: events will be logged, not published");
        Box::new(LogSink)
    } else {
        let brokers = parse_brokers(&secrets.kafka_addr);
        anyhow::ensure!(!brokers.is_empty(), "No Kafka brokers in kafkaAddr");
        let sink = KafkaSink::connect(brokers, secrets.kafka_topic.clone(), config.kafka.partition)
            .await
            .context("Failed to connect to Kafka")?;
        Box::new(sink)
    };

    let publisher = Publisher::new(sink).with_retry(config.publish.retry_config());
    let options = SyncOptions {
        fallback: FallbackUsage::new(&config.sync.storage_class),
        fail_on_skipped: config.sync.fail_on_skipped,
    };

    Ok(Synchronizer::new(
        http,
        secrets.host.clone(),
        Credentials::new(secrets.user.clone(), secrets.passwd.clone()),
        publisher,
    )
    .with_options(options))
}

async fn run_once(config: &Config, dry_run: bool) -> Result<()> {
    let secrets = load_secrets(config)?;
    let synchronizer = build_synchronizer(config, &secrets, dry_run).await?;

    let report = synchronizer.run().await.context("Quota synchronization failed")?;
    info!(
        workspaces = report.workspaces,
        published = report.published,
        skipped = report.skipped.len(),
        "Quota synchronization complete"
    );
    Ok(())
}

async fn run_daemon(config: &Config) -> Result<()> {
    let secrets = load_secrets(config)?;
    let synchronizer = build_synchronizer(config, &secrets, false).await?;

    if config.metrics.enabled {
        metrics::init().context("Failed to register metrics")?;
        let port = config.metrics.port;
        tokio::spawn(async move {
            if let Err(e) = metrics_server::start_metrics_server(port).await {
                error!("Metrics server stopped: {:#}", e);
            }
        });
    }

    let interval = Duration::from_secs(config.sync.interval_secs);
    info!(interval_secs = interval.as_secs(), "Starting quota sync daemon");

    tokio::select! {
        _ = sync::run_periodically(&synchronizer, interval) => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received, stopping");
        }
    }
    Ok(())
}

fn check_config(config: &Config) -> Result<()> {
    let secrets = load_secrets(config)?;
    let brokers = parse_brokers(&secrets.kafka_addr);
    anyhow::ensure!(!brokers.is_empty(), "No Kafka brokers in kafkaAddr");

    println!("Configuration OK");
    println!("  control plane: {}", secrets.host);
    println!("  user:          {}", secrets.user);
    println!("  brokers:       {}", brokers.join(","));
    println!("  topic:         {}", secrets.kafka_topic);
    println!("  partition:     {}", config.kafka.partition);
    println!("  storage class: {}", config.sync.storage_class);
    Ok(())
}
