mod cli;
mod confirm;
mod output;
mod watch;

use anyhow::Context;
use clap::Parser;
use cli::{AllowCommand, Cli, Command, PeerCommand};
use registry_api::AllowListQuery;
use registry_core::{
    AllowListStore, ConsoleConfig, Notification, PeerRegistry, RegistryBackend, StatusSource,
};
use registry_http::HttpBackend;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let config = load_config(&cli)?;
    debug!("Using gateway API at {}", config.base_url);

    let backend: Arc<dyn RegistryBackend> =
        Arc::new(HttpBackend::from_config(&config).context("failed to build HTTP client")?);

    if let Err(e) = run(cli.command, backend, &config).await {
        output::print_notification(&e.notification());
        return Err(e.into());
    }
    Ok(())
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Defaults, then the YAML file, then the environment, then flags
fn load_config(cli: &Cli) -> anyhow::Result<ConsoleConfig> {
    let mut config = match &cli.config {
        Some(path) => ConsoleConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ConsoleConfig::default(),
    };
    config
        .apply_env()
        .context("invalid environment configuration")?;

    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(secs) = cli.timeout_secs {
        config.request_timeout_secs = secs;
    }
    if let Some(secs) = cli.online_threshold_secs {
        config.online_threshold_secs = Some(secs);
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn peer_registry(
    backend: Arc<dyn RegistryBackend>,
    config: &ConsoleConfig,
    blank: bool,
) -> PeerRegistry {
    let mut registry = PeerRegistry::new(backend).with_refresh_delay(config.refresh_delay());
    if let Some(classifier) = config.classifier() {
        registry = registry.with_classifier(classifier);
    }
    if blank {
        registry = registry.with_source(StatusSource::Blank);
    }
    registry
}

async fn run(
    command: Command,
    backend: Arc<dyn RegistryBackend>,
    config: &ConsoleConfig,
) -> registry_core::Result<()> {
    match command {
        Command::Allow { action } => {
            let store = AllowListStore::new(backend).with_refresh_delay(config.refresh_delay());
            run_allow(action, &store).await
        }
        Command::Peers { action } => {
            let blank = matches!(action, PeerCommand::List { blank: true });
            let registry = peer_registry(backend, config, blank);
            registry.refresh().await?;
            run_peers(action, &registry).await
        }
        Command::Watch { blank } => {
            let registry = peer_registry(backend, config, blank);
            watch::run(&registry, config.watch_interval()).await;
            Ok(())
        }
    }
}

async fn run_allow(action: AllowCommand, store: &AllowListStore) -> registry_core::Result<()> {
    match action {
        AllowCommand::List { ip, id } => {
            let query = AllowListQuery { ip_addr: ip, id };
            let entries = if query.is_empty() {
                store.list().await?
            } else {
                store.list_filtered(&query).await?
            };
            output::print_entries(&entries);
        }
        AllowCommand::Add { ips } => {
            for ip in &ips {
                let entry = store.add(ip.trim()).await?;
                output::print_notification(&Notification::info(
                    "Address added",
                    format!("{} (id {})", entry.ip_addr, entry.id),
                ));
            }
        }
        AllowCommand::Import { file } => {
            let created = store.import_file(&file).await?;
            output::print_notification(&Notification::info(
                "Import finished",
                format!("{} addresses added from {}", created, file.display()),
            ));
        }
        AllowCommand::Delete { ids, yes } => {
            let confirm = confirm::confirmer(yes);
            let report = store.delete_many(&ids, confirm.as_ref()).await?;
            output::print_report("deleted", &report);
        }
    }
    Ok(())
}

async fn run_peers(action: PeerCommand, registry: &PeerRegistry) -> registry_core::Result<()> {
    match action {
        PeerCommand::List { .. } => {
            output::print_peers(&registry.peers().await);
        }
        PeerCommand::Protect { names } => {
            let report = registry.protect_many(&names).await?;
            output::print_report("protected", &report);
        }
        PeerCommand::Delete { pub_keys, yes } => {
            let confirm = confirm::confirmer(yes);
            let report = registry.delete_many(&pub_keys, confirm.as_ref()).await?;
            output::print_report("deleted", &report);
        }
        PeerCommand::Summary => {
            output::print_summary(&registry.summary().await);
        }
        PeerCommand::Sweep { yes } => {
            let confirm = confirm::confirmer(yes);
            let report = registry.sweep_offline(confirm.as_ref()).await?;
            if report.total() == 0 {
                info!("Nothing to sweep");
            }
            output::print_report("removed", &report);
        }
    }
    Ok(())
}
