//! Certwatch - certification watchlist and change-monitoring service

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use certwatch::{
    config::Args,
    lookup::HttpLookup,
    monitor::{ChangeMonitor, MonitorConfig},
    notify::WebhookNotifier,
    pending::{self, PendingLedger},
    resolver::{Resolver, ResolverConfig},
    server::{self, AppState},
    store::WatchlistStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("certwatch={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Certwatch - certification watchlist");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Data file: {}", args.data_file.display());
    info!("Registry: {}", args.lookup_url);
    info!(
        "Monitor: every {}s, active {}-{}h",
        args.monitor_interval_secs, args.window_start_hour, args.window_end_hour
    );
    info!("Capacity: {} entries", args.watchlist_capacity);
    info!(
        "Register policy: {}",
        if args.auto_confirm {
            "auto-confirm"
        } else {
            "confirm via callback"
        }
    );
    info!("======================================");

    // Watchlist store, restored from disk
    let store = match WatchlistStore::load(args.data_file.clone(), args.watchlist_capacity) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to load watchlist from {}: {}", args.data_file.display(), e);
            std::process::exit(1);
        }
    };
    info!("Watchlist loaded ({} entries)", store.len());

    // Pending-action ledger with TTL eviction
    let ledger = Arc::new(PendingLedger::new(args.pending_ttl()));
    pending::spawn_cleanup_task(Arc::clone(&ledger));

    // Registry lookup and webhook notifier collaborators
    let lookup = Arc::new(HttpLookup::new(&args.lookup_url, args.lookup_timeout())?);
    let notifier = Arc::new(WebhookNotifier::new(&args.notify_url, args.notify_timeout())?);
    if args.notify_url.is_empty() {
        info!("No notification webhook configured, monitor events will only be logged");
    }

    // Command resolver
    let resolver = Arc::new(Resolver::new(
        Arc::clone(&store),
        Arc::clone(&ledger),
        Arc::clone(&lookup) as Arc<dyn certwatch::lookup::Lookup>,
        ResolverConfig {
            auto_confirm: args.auto_confirm,
            ..ResolverConfig::default()
        },
    ));

    // Change monitor background loop
    let monitor = Arc::new(ChangeMonitor::new(
        Arc::clone(&store),
        lookup as Arc<dyn certwatch::lookup::Lookup>,
        notifier as Arc<dyn certwatch::notify::Notifier>,
        MonitorConfig {
            interval: args.monitor_interval(),
            lookup_timeout: args.lookup_timeout(),
            window_start_hour: args.window_start_hour,
            window_end_hour: args.window_end_hour,
        },
    ));
    let _monitor_handle = monitor.spawn();

    // Run the server
    let state = Arc::new(AppState::new(args, store, ledger, resolver));
    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
