//! `bountyhub` CLI: manage API keys for bug-bounty and threat-intel
//! platforms, and browse their programs and feeds in one merged list.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod config;

use std::io::BufRead as _;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use bountyhub_core::adapters::AdapterTable;
use bountyhub_core::manager::ServiceStats;
use bountyhub_core::service::AuthScheme;
use bountyhub_core::{
    AggregatedItem, Aggregator, Capability, KeyManager, KeyRegistry, Notification,
    NotificationLevel, Notifier, ServiceClient, ServiceId, ServiceStatus, TracingNotifier,
    ValidationResult, Validator,
};
use bountyhub_storage::{MemoryBackend, RedbBackend, StorageBackend};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::debug;

use crate::config::{HubConfig, StorageKind};

// ── ANSI color helpers ───────────────────────────────────────────────

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

// ── CLI structure ────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "bountyhub",
    version,
    about = "bountyhub CLI — API keys, bug-bounty programs and threat feeds in one place",
    long_about = None,
    after_help = format!(
        "{DIM}Environment variables:{RESET}\n  \
         BOUNTYHUB_STORAGE             memory | redb (default: redb)\n  \
         BOUNTYHUB_STORAGE_PATH        key store file (default: ./bountyhub.redb)\n  \
         BOUNTYHUB_LOG_LEVEL           log filter when RUST_LOG is unset (default: warn)\n  \
         BOUNTYHUB_HTTP_TIMEOUT_SECS   per-request timeout (default: 10)\n  \
         BOUNTYHUB_<SERVICE>_URL       base URL override, e.g. BOUNTYHUB_NVD_URL\n\n\
         {DIM}Examples:{RESET}\n  \
         bountyhub set hackerone $H1_TOKEN\n  \
         bountyhub status --check\n  \
         bountyhub programs --limit 20\n  \
         bountyhub threats --json"
    ),
)]
struct Cli {
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Print machine-readable JSON instead of formatted text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every supported service.
    Services,
    /// Show configured keys and their state.
    Status {
        /// Re-probe every enabled key first.
        #[arg(long)]
        check: bool,
    },
    /// Store (or replace) the key for a service and validate it.
    Set {
        /// Service id, e.g. `hackerone` or `alienvault-otx`.
        service: ServiceId,
        /// The API key. Use `-` to read it from stdin.
        key: String,
    },
    /// Forget the key for a service.
    Remove { service: ServiceId },
    /// Include a stored key in validation refreshes and aggregation.
    Enable { service: ServiceId },
    /// Keep a stored key but stop using it.
    Disable { service: ServiceId },
    /// Probe the stored key for one service.
    Validate { service: ServiceId },
    /// Re-probe every enabled key.
    Refresh,
    /// Bug-bounty programs from every configured platform.
    Programs {
        /// Show at most this many items.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// CVEs, advisories and pulses from every configured feed.
    Threats {
        /// Show at most this many items.
        #[arg(long)]
        limit: Option<usize>,
    },
}

// ── Pretty output helpers ────────────────────────────────────────────

fn header(icon: &str, title: &str) {
    println!("{BOLD}{CYAN}{icon} {title}{RESET}");
    println!("{DIM}─────────────────────────────────────────{RESET}");
}

fn kv_line(key: &str, value: &str) {
    println!("  {DIM}{key:<20}{RESET} {WHITE}{value}{RESET}");
}

fn success(msg: &str) {
    println!("{GREEN}{BOLD}✓{RESET} {msg}");
}

fn warning(msg: &str) {
    println!("{YELLOW}{BOLD}⚠{RESET} {YELLOW}{msg}{RESET}");
}

fn failure(msg: &str) {
    println!("{RED}{BOLD}✗{RESET} {RED}{msg}{RESET}");
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("failed to format JSON: {e}"),
    }
}

fn status_badge(status: ServiceStatus) -> String {
    let color = match status {
        ServiceStatus::Valid => GREEN,
        ServiceStatus::Invalid => RED,
        ServiceStatus::Unvalidated => YELLOW,
        ServiceStatus::Disabled | ServiceStatus::Unconfigured => DIM,
    };
    format!("{color}{status}{RESET}")
}

fn auth_label(auth: AuthScheme) -> String {
    match auth {
        AuthScheme::Bearer => "bearer token".to_owned(),
        AuthScheme::ApiKey { header } => format!("{header} header"),
        AuthScheme::None => "none".to_owned(),
    }
}

fn print_stats(stats: &ServiceStats) {
    header("🔑", "API Keys");
    for row in &stats.services {
        let mut detail = Vec::new();
        if let Some(hint) = &row.key_hint {
            detail.push(hint.clone());
        }
        if let Some(meta) = &row.metadata {
            if let Some(user) = &meta.username {
                detail.push(format!("user {user}"));
            }
            if let Some(tier) = &meta.tier {
                detail.push(format!("tier {tier}"));
            }
        }
        if let Some(error) = &row.error {
            detail.push(format!("{RED}{error}{RESET}"));
        }
        println!(
            "  {DIM}{:<16}{RESET} {:<24} {}",
            row.name,
            status_badge(row.status),
            detail.join(", ")
        );
    }
    println!();
    kv_line(
        "Configured",
        &format!("{} of {}", stats.configured, stats.total),
    );
    kv_line("Enabled", &stats.enabled.to_string());
    if stats.valid + stats.invalid > 0 {
        kv_line(
            "Valid / Invalid",
            &format!("{} / {}", stats.valid, stats.invalid),
        );
    }
    println!();
}

fn print_validation(service: ServiceId, result: &ValidationResult) {
    if result.valid {
        success(&format!("{} key is valid", service.display_name()));
    } else {
        failure(&format!(
            "{}: {}",
            service.display_name(),
            result.error.as_deref().unwrap_or("validation failed")
        ));
    }
    if let Some(meta) = &result.metadata {
        if let Some(user) = &meta.username {
            kv_line("Username", user);
        }
        if let Some(rep) = meta.reputation {
            kv_line("Reputation", &rep.to_string());
        }
        if let Some(tier) = &meta.tier {
            kv_line("Tier", tier);
        }
        if !meta.features.is_empty() {
            kv_line("Features", &meta.features.join(", "));
        }
    }
    if let Some(limits) = &result.rate_limit {
        if let Some(remaining) = limits.remaining {
            let of = limits
                .requests_per_hour
                .map(|l| format!(" of {l}"))
                .unwrap_or_default();
            kv_line("Rate limit", &format!("{remaining}{of} remaining"));
        }
    }
}

fn print_items(title: &str, items: &[AggregatedItem]) {
    header("📋", title);
    if items.is_empty() {
        println!("  {DIM}(nothing to show){RESET}");
    }
    for item in items {
        let when = item
            .timestamp
            .map_or_else(|| "----------".to_owned(), |t| t.format("%Y-%m-%d").to_string());
        let title = item
            .title
            .as_deref()
            .or(item.id.as_deref())
            .unwrap_or("(untitled)");
        println!(
            "  {DIM}{when}{RESET} {BOLD}{title}{RESET} {DIM}[{}]{RESET}",
            item.source.display_name()
        );
        let mut extra = Vec::new();
        if let Some(severity) = &item.severity {
            extra.push(severity.clone());
        }
        if let Some(bounty) = &item.bounty_range {
            extra.push(bounty.clone());
        }
        if !item.tags.is_empty() {
            extra.push(item.tags.join(" "));
        }
        if !extra.is_empty() {
            println!("             {}", extra.join(" · "));
        }
        if let Some(url) = &item.url {
            println!("             {CYAN}{url}{RESET}");
        }
    }
    println!();
}

/// Shows manager notifications as they happen.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn name(&self) -> &str {
        "console"
    }

    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => success(&notification.message),
            NotificationLevel::Error => failure(&notification.message),
            NotificationLevel::Info => println!("  {DIM}{}{RESET}", notification.message),
        }
    }
}

// ── Wiring ───────────────────────────────────────────────────────────

struct Hub {
    manager: KeyManager,
    aggregator: Aggregator,
}

async fn build_hub(config: &HubConfig, notifier: Arc<dyn Notifier>) -> Result<Hub> {
    let storage: Arc<dyn StorageBackend> = match &config.storage {
        StorageKind::Memory => Arc::new(MemoryBackend::new()),
        StorageKind::Redb { path } => {
            let backend = RedbBackend::open(path)
                .with_context(|| format!("failed to open key store at {}", path.display()))?;
            debug!(path = %backend.path().display(), "using redb key store");
            Arc::new(backend)
        }
    };

    let registry = Arc::new(KeyRegistry::new(storage));
    let loaded = registry.load().await;
    debug!(services = loaded, "key store opened");

    let client = Arc::new(ServiceClient::new(&config.http).context("failed to build HTTP client")?);
    let adapters = Arc::new(AdapterTable::builtin());
    let validator = Arc::new(Validator::new(
        Arc::clone(&client),
        Arc::clone(&adapters),
        config.http.validation_ttl,
    ));

    Ok(Hub {
        manager: KeyManager::new(Arc::clone(&registry), validator, notifier),
        aggregator: Aggregator::new(registry, client, adapters),
    })
}

fn init_logging(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_key(arg: String) -> Result<String> {
    if arg != "-" {
        return Ok(arg);
    }
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read API key from stdin")?;
    Ok(line.trim().to_owned())
}

// ── Command dispatch ─────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = HubConfig::from_env();
    init_logging(&config.log_level, cli.json_logs);

    match run(&config, cli.command, cli.json).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("  {RED}{BOLD}✗ Error:{RESET} {e:#}");
            eprintln!();
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &HubConfig, cmd: Commands, json: bool) -> Result<()> {
    if let Commands::Services = cmd {
        cmd_services(json);
        return Ok(());
    }

    let notifier: Arc<dyn Notifier> = if json {
        Arc::new(TracingNotifier)
    } else {
        Arc::new(ConsoleNotifier)
    };
    let hub = build_hub(config, notifier).await?;

    match cmd {
        Commands::Services => Ok(()),
        Commands::Status { check } => cmd_status(&hub, check, json).await,
        Commands::Set { service, key } => cmd_set(&hub, service, &read_key(key)?, json).await,
        Commands::Remove { service } => cmd_remove(&hub, service).await,
        Commands::Enable { service } => cmd_toggle(&hub, service, true).await,
        Commands::Disable { service } => cmd_toggle(&hub, service, false).await,
        Commands::Validate { service } => cmd_validate(&hub, service, json).await,
        Commands::Refresh => cmd_refresh(&hub, json).await,
        Commands::Programs { limit } => {
            cmd_aggregate(&hub, Capability::Programs, limit, json).await
        }
        Commands::Threats { limit } => {
            cmd_aggregate(&hub, Capability::ThreatFeed, limit, json).await
        }
    }
}

fn cmd_services(json: bool) {
    if json {
        let services: Vec<Value> = ServiceId::ALL
            .into_iter()
            .map(|id| {
                let d = id.descriptor();
                serde_json::json!({
                    "id": id,
                    "name": d.name,
                    "baseUrl": d.base_url,
                    "auth": auth_label(d.auth),
                    "scopes": d.scopes,
                    "docsUrl": d.docs_url,
                })
            })
            .collect();
        print_json(&services);
        return;
    }

    header("🌐", "Supported Services");
    for id in ServiceId::ALL {
        let d = id.descriptor();
        println!("  {BOLD}{:<16}{RESET} {DIM}{}{RESET}", d.name, id.as_str().to_lowercase());
        kv_line("Auth", &auth_label(d.auth));
        if !d.scopes.is_empty() {
            kv_line("Scopes", &d.scopes.join(", "));
        }
        kv_line("Docs", d.docs_url);
    }
    println!();
}

async fn cmd_status(hub: &Hub, check: bool, json: bool) -> Result<()> {
    if check {
        hub.manager.refresh_all_keys().await;
    }
    let stats = hub.manager.service_stats().await;
    if json {
        print_json(&stats);
    } else {
        print_stats(&stats);
    }
    Ok(())
}

async fn cmd_set(hub: &Hub, service: ServiceId, key: &str, json: bool) -> Result<()> {
    if key.is_empty() {
        bail!("no API key given for {}", service.display_name());
    }
    let result = hub
        .manager
        .save_api_key(service, key)
        .await
        .with_context(|| format!("failed to save {} key", service.display_name()))?;

    if json {
        print_json(&result);
    } else if !result.valid {
        warning("The key was stored anyway; fix it or run `bountyhub disable`.");
    }
    Ok(())
}

async fn cmd_remove(hub: &Hub, service: ServiceId) -> Result<()> {
    if !hub.manager.remove_api_key(service).await? {
        warning(&format!("No key stored for {}", service.display_name()));
    }
    Ok(())
}

async fn cmd_toggle(hub: &Hub, service: ServiceId, enabled: bool) -> Result<()> {
    hub.manager
        .set_api_key_enabled(service, enabled)
        .await
        .with_context(|| format!("cannot change {}", service.display_name()))?;
    Ok(())
}

async fn cmd_validate(hub: &Hub, service: ServiceId, json: bool) -> Result<()> {
    let result = hub.manager.validate_api_key(service).await?;
    if json {
        print_json(&result);
    } else {
        print_validation(service, &result);
        println!();
    }
    Ok(())
}

async fn cmd_refresh(hub: &Hub, json: bool) -> Result<()> {
    let results = hub.manager.refresh_all_keys().await;
    if json {
        let map: serde_json::Map<String, Value> = results
            .iter()
            .map(|(service, result)| {
                (
                    service.as_str().to_owned(),
                    serde_json::to_value(result).unwrap_or(Value::Null),
                )
            })
            .collect();
        print_json(&map);
        return Ok(());
    }

    header("🔄", "Key Refresh");
    if results.is_empty() {
        warning("No enabled keys to refresh.");
    }
    for (service, result) in &results {
        print_validation(*service, result);
    }
    println!();
    Ok(())
}

async fn cmd_aggregate(
    hub: &Hub,
    capability: Capability,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let mut items = hub.aggregator.aggregate(capability).await?;
    if let Some(limit) = limit {
        items.truncate(limit);
    }
    if json {
        print_json(&items);
    } else {
        let title = match capability {
            Capability::Programs => "Bug-Bounty Programs",
            Capability::ThreatFeed => "Threat Feed",
        };
        print_items(title, &items);
    }
    Ok(())
}
