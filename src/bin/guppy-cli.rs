use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use axum::body::Body;
use clap::Parser;
use hyper::{Method, Request};
use serde::Serialize;

use guppy::config::loader::load_settings;
use guppy::observability::{logging, metrics};
use guppy::{CallContext, ClientSettings, ConfigOption, Configuration, SpanContext};

#[derive(Parser)]
#[command(name = "guppy-cli")]
#[command(about = "Issue calls through a resilient guppy client", long_about = None)]
struct Cli {
    /// Target URL (plain http).
    url: String,

    /// Settings file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    service: Option<String>,

    #[arg(long)]
    upstream: Option<String>,

    #[arg(long)]
    operation: Option<String>,

    #[arg(long)]
    user_agent: Option<String>,

    /// Per-call timeout in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Number of sequential calls.
    #[arg(short = 'n', long, default_value_t = 1)]
    requests: u32,

    /// Pause between calls in milliseconds.
    #[arg(long, default_value_t = 0)]
    interval_ms: u64,

    /// Prometheus exporter bind address (overrides the settings file).
    #[arg(long)]
    metrics_address: Option<String>,
}

#[derive(Serialize)]
struct Summary {
    operation: String,
    requests: u32,
    outcomes: BTreeMap<&'static str, u32>,
    statuses: BTreeMap<u16, u32>,
    breaker_state: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => load_settings(path)?,
        None => ClientSettings::default(),
    };

    logging::init_logging(&settings.observability.log_level)?;

    let metrics_address = cli
        .metrics_address
        .clone()
        .or_else(|| settings.observability.metrics_address.clone());
    if let Some(addr) = metrics_address {
        metrics::init_metrics(addr.parse()?);
    }

    let target = url::Url::parse(&cli.url)?;
    let method = Method::from_bytes(cli.method.to_ascii_uppercase().as_bytes())?;

    let mut options = settings.to_options();
    options.extend(cli.service.clone().map(ConfigOption::ServiceName));
    options.extend(cli.upstream.clone().map(ConfigOption::UpstreamServiceName));
    options.extend(cli.operation.clone().map(ConfigOption::OperationName));
    options.extend(cli.user_agent.clone().map(ConfigOption::UserAgent));
    options.extend(
        cli.timeout_ms
            .map(|ms| ConfigOption::CallTimeout(Duration::from_millis(ms))),
    );

    let client = Configuration::new(options)?.build();
    tracing::info!(operation = %client.operation_name(), url = %target, "guppy-cli starting");

    let root = SpanContext::new_root();
    let mut summary = Summary {
        operation: client.operation_name().to_string(),
        requests: cli.requests,
        outcomes: BTreeMap::new(),
        statuses: BTreeMap::new(),
        breaker_state: String::new(),
    };

    for attempt in 1..=cli.requests {
        let ctx = CallContext::new().with_span(root.child());
        let request = Request::builder()
            .method(method.clone())
            .uri(target.as_str())
            .body(Body::empty())?;

        match client.call(&ctx, "guppy-cli", request).await {
            Ok(response) => {
                let status = response.status();
                tracing::info!(attempt, status = %status, "Call completed");
                *summary.outcomes.entry("success").or_default() += 1;
                *summary.statuses.entry(status.as_u16()).or_default() += 1;
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "Call failed");
                *summary.outcomes.entry(e.outcome().as_str()).or_default() += 1;
            }
        }

        if cli.interval_ms > 0 && attempt < cli.requests {
            tokio::time::sleep(Duration::from_millis(cli.interval_ms)).await;
        }
    }

    summary.breaker_state = client.breaker().state().to_string();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
