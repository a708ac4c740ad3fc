//! ==============================================================================
//! main.rs - iot status host entry point
//! ==============================================================================
//!
//! purpose:
//!     records status pings of this device to a hosted REST collection and
//!     shows the latest entries. the device is the machine running the host.
//!
//! responsibilities:
//!     - load configuration (file, then cli/env overrides)
//!     - build the collection client, pollers, recorder and identity helpers
//!     - `serve`: run both poll loops and the web dashboard
//!     - `watch`: poll one view and print it as a table
//!     - `record`: post one status, print the refreshed table
//!
//! architecture:
//!
//!     ┌─────────────────────────────────────────────────────────────┐
//!     │                     rust host (this file)                   │
//!     │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐   │
//!     │  │ recorder poll│  │ monitor poll │  │ web dashboard    │   │
//!     │  │ (5 rows/15s) │  │ (10 rows/2s) │  │ (port 3000)      │   │
//!     │  └──────┬───────┘  └──────┬───────┘  └────────┬─────────┘   │
//!     │         │                 │        status     │             │
//!     │         │                 │        buttons ─> recorder      │
//!     │         └────────┬────────┘                   │             │
//!     │            ┌─────┴──────┐                     │             │
//!     │            │ collection │ <───────────────────┘             │
//!     │            └─────┬──────┘                                   │
//!     └──────────────────┼──────────────────────────────────────────┘
//!                        │ https (GET sorted/limited, GET all, POST)
//!                        ▼
//!                 hosted record collection
//!
//! ==============================================================================

mod alert;
mod clock;
mod collection;
mod config;
mod dashboard;
mod domain;
mod error;
mod identity;
mod poller;
mod recorder;
mod render;
mod store;
mod terminal;

use alert::{Alerter, Notices, StderrAlerter};
use clock::CivilClock;
use collection::{Collection, HttpCollection};
use config::AppConfig;
use identity::{HttpIpLookup, IpLookup, LabelProvider, SystemLabelProvider};
use poller::Poller;
use recorder::{fill_public_ip, DeviceFields, Recorder};
use render::{StatusSink, ViewSlot};
use store::{FileStore, KeyValueStore, MemoryStore};
use terminal::TerminalSink;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[clap(name = "iot-status")]
#[clap(about = "Record IoT device status pings and monitor the latest entries")]
#[clap(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Configuration file (default: config/iot-status.toml, then ../config/iot-status.toml)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Record collection URL, overrides [collection] url
    #[clap(long, global = true, env = "IOT_STATUS_API_URL")]
    api_url: Option<String>,

    /// Log level (trace, debug, info, warn, error), overrides [logging] level
    #[clap(long, global = true)]
    log_level: Option<String>,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run both views and the web dashboard (default)
    Serve {
        /// Listen address, overrides [server] bind
        #[clap(long)]
        bind: Option<String>,
    },
    /// Poll a view and print it on every tick
    Watch {
        #[clap(long, value_enum, default_value_t = WatchView::Monitor)]
        view: WatchView,
    },
    /// Record one status and print the refreshed recorder view
    Record {
        /// Status label, one of [recorder] statuses
        status: String,
        /// Device name (default: remembered name, else detected label)
        #[clap(long)]
        name: Option<String>,
        /// Public IP to attach
        #[clap(long)]
        ip: Option<String>,
        /// Look up the public IP before recording
        #[clap(long, conflicts_with = "ip")]
        detect_ip: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum WatchView {
    Recorder,
    Monitor,
}

/// long-lived pieces shared by every command
struct Host {
    config: AppConfig,
    collection: Arc<dyn Collection>,
    clock: CivilClock,
    labels: Arc<dyn LabelProvider>,
    store: Arc<dyn KeyValueStore>,
    ip_lookup: Arc<dyn IpLookup>,
}

impl Host {
    fn build(config: AppConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.collection.timeout_seconds.max(1));
        let collection = HttpCollection::new(config.collection.url.clone(), timeout)
            .context("failed to build collection client")?;
        let clock = CivilClock::from_name(&config.clock.timezone)?;
        let labels = SystemLabelProvider::new(
            config.identity.fallback_name.clone(),
            config.identity.max_label_len,
        );
        let store: Arc<dyn KeyValueStore> = if config.storage.in_memory {
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(FileStore::new(config.storage.path.clone()))
        };
        let ip_lookup = HttpIpLookup::new(config.identity.ip_lookup_url.clone(), timeout)
            .context("failed to build ip lookup client")?;

        Ok(Self {
            config,
            collection: Arc::new(collection),
            clock,
            labels: Arc::new(labels),
            store,
            ip_lookup: Arc::new(ip_lookup),
        })
    }

    fn poller(&self, name: &'static str, view: config::ViewConfig, sink: Arc<dyn StatusSink>) -> Arc<Poller> {
        Arc::new(Poller::new(name, self.collection.clone(), sink, view))
    }

    fn recorder(&self, poller: Arc<Poller>, alerter: Arc<dyn Alerter>) -> Recorder {
        let fields = DeviceFields::prefilled(self.store.as_ref(), self.labels.as_ref());
        Recorder::new(
            self.collection.clone(),
            poller,
            Arc::new(fields),
            self.labels.clone(),
            self.store.clone(),
            alerter,
            self.clock,
            self.config.identity.fallback_name.clone(),
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // config first: it decides the log level
    let mut config = AppConfig::load_or_default(args.config.as_deref())?;
    if let Some(url) = args.api_url {
        config.collection.url = url;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("iot_status={},reqwest=warn", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let command = args.command.unwrap_or(Command::Serve { bind: None });
    match command {
        Command::Serve { bind } => serve(config, bind).await,
        Command::Watch { view } => watch(config, view).await,
        Command::Record { status, name, ip, detect_ip } => {
            record_once(config, status, name, ip, detect_ip).await
        }
    }
}

async fn serve(config: AppConfig, bind: Option<String>) -> Result<()> {
    println!("===========================================================");
    println!("  IoT Status Host v{}", env!("CARGO_PKG_VERSION"));
    println!("===========================================================");
    config.print_summary();

    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let host = Host::build(config)?;

    let notices = Arc::new(Notices::new());
    let recorder_view = Arc::new(ViewSlot::new());
    let monitor_view = Arc::new(ViewSlot::new());
    let recorder_poller = host.poller("recorder", host.config.views.recorder, recorder_view.clone());
    let monitor_poller = host.poller("monitor", host.config.views.monitor, monitor_view.clone());
    let recorder = Arc::new(host.recorder(recorder_poller.clone(), notices.clone()));
    info!(name = %recorder.fields().name(), "device name prefilled");

    for poller in [&recorder_poller, &monitor_poller] {
        info!(
            view = poller.name(),
            window = poller.window(),
            interval_s = poller.interval_seconds(),
            "starting poll loop"
        );
        tokio::spawn(Arc::clone(poller).run());
    }

    let state = Arc::new(dashboard::DashboardState {
        collection_url: host.collection.url().to_string(),
        statuses: host.config.recorder.statuses.clone(),
        recorder,
        recorder_poller,
        recorder_view,
        monitor_poller,
        monitor_view,
        notices,
        ip_lookup: host.ip_lookup.clone(),
    });

    tokio::select! {
        result = dashboard::run_server(state, &bind) => {
            if let Err(e) = &result {
                error!("web server error: {e:#}");
            }
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            Ok(())
        }
    }
}

async fn watch(config: AppConfig, view: WatchView) -> Result<()> {
    let host = Host::build(config)?;
    let (name, view_config) = match view {
        WatchView::Recorder => ("recorder", host.config.views.recorder),
        WatchView::Monitor => ("monitor", host.config.views.monitor),
    };
    info!(
        view = name,
        window = view_config.window,
        "watching {} every {}s",
        host.collection.url(),
        view_config.interval_seconds
    );

    let poller = host.poller(name, view_config, Arc::new(TerminalSink::new()));
    tokio::select! {
        _ = poller.run() => Ok(()),
        _ = tokio::signal::ctrl_c() => Ok(()),
    }
}

async fn record_once(
    config: AppConfig,
    status: String,
    name: Option<String>,
    ip: Option<String>,
    detect_ip: bool,
) -> Result<()> {
    if !config.recorder.statuses.contains(&status) {
        anyhow::bail!(
            "unknown status {status:?}, expected one of: {}",
            config.recorder.statuses.join(", ")
        );
    }

    let host = Host::build(config)?;
    let alerter = Arc::new(StderrAlerter);
    let poller = host.poller("recorder", host.config.views.recorder, Arc::new(TerminalSink::new()));
    let recorder = host.recorder(poller, alerter.clone());

    if let Some(name) = name {
        recorder.fields().set_name(&name);
    }
    if let Some(ip) = ip {
        recorder.fields().set_ip(&ip);
    }
    if detect_ip {
        fill_public_ip(host.ip_lookup.as_ref(), recorder.fields(), alerter.as_ref()).await;
    }

    let created = recorder.record(&status).await?;
    info!(id = created.id.as_deref().unwrap_or("?"), "recorded {status}");
    Ok(())
}
