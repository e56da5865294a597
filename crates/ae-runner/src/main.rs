//! ae-run
//!
//! Loads an automation configuration, replays one HTTP request or event
//! against it and prints the result as JSON. Without a request or event the
//! periodic schedules of the configuration are printed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ae_config::load_document;
use ae_core::{DeploymentEnvironment, Event};
use ae_data::HttpRequestData;
use ae_event_bus::EventBus;
use ae_providers::Dependencies;
use ae_runner::{AutomationEngine, LogEmailSender, ReleaseKey, ReqwestHttpClient};
use anyhow::{Context, Result};
use clap::Parser;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Parser)]
#[command(name = "ae-run", version, about = "Run automations against a recorded request or event")]
struct Args {
    /// Automation configuration document (JSON or YAML)
    #[arg(short, long, env = "AE_CONFIG")]
    config: PathBuf,

    /// HTTP request to replay (JSON)
    #[arg(short, long, conflicts_with = "event")]
    request: Option<PathBuf>,

    /// Event to replay (JSON)
    #[arg(short, long)]
    event: Option<PathBuf>,

    #[arg(long, env = "AE_TENANT", default_value = "default")]
    tenant: String,

    #[arg(long, env = "AE_PRODUCT", default_value = "default")]
    product: String,

    #[arg(long, env = "AE_ENVIRONMENT", default_value = "development")]
    environment: DeploymentEnvironment,

    /// Outbound HTTP timeout in seconds
    #[arg(long, env = "AE_HTTP_TIMEOUT", default_value_t = 30)]
    http_timeout: u64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "AE_LOG", default_value = "info")]
    log: String,
}

/// Recorded inbound request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestFile {
    http_verb: String,
    url: String,
    #[serde(default)]
    action_path: Option<String>,
    #[serde(default)]
    headers: IndexMap<String, String>,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    content: Option<Value>,
}

impl RequestFile {
    fn into_request(self) -> HttpRequestData {
        let mut request = HttpRequestData::new(&self.http_verb, self.url);
        if let Some(action_path) = &self.action_path {
            request = request.with_action_path(action_path);
        }
        for (name, value) in self.headers {
            request = request.with_header(name, value);
        }
        if let Some(content) = self.content {
            let content_type = self
                .content_type
                .unwrap_or_else(|| "application/json".to_string());
            request = request.with_content(content_type, content);
        }
        request
    }
}

/// Recorded domain event
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventFile {
    event_type: String,
    #[serde(default)]
    custom_event_alias: Option<String>,
    #[serde(default)]
    data: Value,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_dir = args
        .config
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = args
        .config
        .file_name()
        .with_context(|| format!("{} is not a file", args.config.display()))?;
    let document = load_document(config_dir, file_name)
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    let dependencies = Dependencies::new()
        .with_http_client(Arc::new(ReqwestHttpClient::new(Duration::from_secs(
            args.http_timeout,
        ))?))
        .with_email(Arc::new(LogEmailSender));
    let engine = Arc::new(AutomationEngine::new(Arc::new(EventBus::new()), dependencies));

    let key = ReleaseKey::new(&args.tenant, &args.product, args.environment);
    engine.load(key.clone(), document)?;
    let worker = engine.start_worker()?;

    let output = if let Some(path) = &args.request {
        let request = read_json::<RequestFile>(path)?.into_request();
        let response = engine
            .handle_http_request(&key, request, CancellationToken::new())
            .await;
        serde_json::to_value(&response)?
    } else if let Some(path) = &args.event {
        let file: EventFile = read_json(path)?;
        let mut event = Event::new(file.event_type, file.data, key.tenant_context());
        event.custom_event_alias = file.custom_event_alias;
        match engine
            .handle_event(&key, event, CancellationToken::new())
            .await?
        {
            Some(data) => json!({
                "automationAlias": data.system.automation_alias,
                "triggerAlias": data.system.trigger_alias,
                "error": data.error,
            }),
            None => Value::Null,
        }
    } else {
        serde_json::to_value(engine.periodic_schedules())?
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    // Let queued asynchronous actions finish before exiting
    engine.wait_idle().await;
    engine.stop();
    worker.await?;
    info!("Done");

    Ok(())
}
