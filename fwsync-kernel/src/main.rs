/**
 * FWSYNC - Point d'entrée du daemon
 *
 * ROLE : Bootstrap : .env, configuration, logging, discovery source,
 * Home Assistant sink, then the sync scheduler until Ctrl-C.
 *
 * DRY RUN : one planning pass, the sensors that would be written are printed
 * as JSON on stdout and the process exits without touching Home Assistant.
 */

use anyhow::{Context, Result};
use clap::Parser;
use fwsync_kernel::config::{CliArgs, Settings};
use fwsync_kernel::discovery::{DiscoverySource, HttpDiscovery, SnapshotDiscovery};
use fwsync_kernel::logging::init_tracing;
use fwsync_kernel::scheduler::{plan_snapshot, SyncOptions, SyncScheduler};
use fwsync_kernel::sink::{resolve_delete_base_url, HomeAssistantSink};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // .env optionnel
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();
    let (settings, issues) = Settings::load(&args);
    init_tracing(settings.debug);
    for issue in &issues {
        warn!("Ignoring setting: {issue}");
    }

    info!("Firewalla sync {}", env!("CARGO_PKG_VERSION"));

    let client = reqwest::Client::builder()
        .timeout(settings.request_timeout())
        .build()
        .context("Failed to build HTTP client")?;

    let discovery: Arc<dyn DiscoverySource> = match &settings.snapshot {
        Some(path) => {
            info!("Reading hosts from snapshot {}", path.display());
            Arc::new(SnapshotDiscovery::new(path))
        }
        None => Arc::new(HttpDiscovery::new(
            client.clone(),
            settings.firewalla_url.clone(),
            settings.firewalla_token.clone(),
        )),
    };
    let options = SyncOptions::from(&settings);

    if settings.dry_run {
        let planned = plan_snapshot(discovery.as_ref(), &options)
            .await
            .context("Dry run failed")?;
        println!("{}", serde_json::to_string_pretty(&planned)?);
        return Ok(());
    }

    let delete_base_url = resolve_delete_base_url(
        &client,
        &settings.ha_url,
        settings.ha_url_explicit,
        settings.supervisor_token.as_deref(),
    )
    .await;

    let sink = Arc::new(HomeAssistantSink::new(
        client,
        settings.ha_url.clone(),
        delete_base_url,
        settings.supervisor_token.clone(),
        settings.ha_token.clone(),
    ));

    info!("Polling every {}s", options.interval.as_secs());
    let scheduler = SyncScheduler::new(discovery, sink, options);

    tokio::select! {
        _ = scheduler.run() => {}
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }
    Ok(())
}
