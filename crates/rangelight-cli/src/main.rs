//! `rangelight` – the sensor/LED bridge binary.
//!
//! 1. Initialises logging (and OTLP export when configured).
//! 2. Loads `~/.rangelight/config.toml`, writing the defaults on first run.
//! 3. Opens the SQLite store and loads the seed catalogue.
//! 4. Connects the MQTT client, or a recording broker when MQTT is disabled.
//! 5. Serves WebSocket clients until Ctrl-C.

mod config;
mod telemetry;

use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use rangelight_actuation::ActuationPublisher;
use rangelight_cockpit::{AppContext, CockpitServer, ServerError};
use rangelight_middleware::{ActuatorBroker, ConnectionRegistry, MemoryBroker, MqttBroker};
use rangelight_store::{Store, StoreError, schema};
use rangelight_types::LightError;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{Config, ConfigError};

#[derive(Error, Debug)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to open store: {0}")]
    Store(#[from] StoreError),
    #[error("failed to read seed file {path}: {source}")]
    SeedFile {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to seed store: {0}")]
    Seed(#[from] LightError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error("failed to start runtime: {0}")]
    Runtime(std::io::Error),
}

fn main() -> ExitCode {
    // The OTLP exporter is built before any Tokio runtime exists.
    let _guard = telemetry::init_tracing("rangelight");

    print_banner();

    let outcome = load_config().and_then(|cfg| {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(StartupError::Runtime)?;
        runtime.block_on(run(cfg))
    });

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "startup failed");
            eprintln!("{} {}", "✗".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn load_config() -> Result<Config, StartupError> {
    let path = config::config_path();
    let cfg = match config::load()? {
        Some(cfg) => {
            println!("  Config loaded from {}", path.display().to_string().bold());
            cfg
        }
        None => {
            let mut cfg = Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    path.display().to_string().bold()
                ),
                Err(e) => warn!(error = %e, "could not write default config"),
            }
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };
    cfg.validate()?;
    debug!(config = ?cfg, "effective configuration");
    Ok(cfg)
}

async fn run(cfg: Config) -> Result<(), StartupError> {
    // ── Store ─────────────────────────────────────────────────────────────
    let store = Store::open(&cfg.store.path)?.with_timeout(cfg.store_timeout());
    if let Some(path) = &cfg.store.seed_file {
        let sql = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| StartupError::SeedFile {
                path: path.display().to_string(),
                source,
            })?;
        store.execute_batch(sql).await?;
        info!(seed = %path.display(), "store seeded");
    } else if cfg.store.demo_seed {
        store.execute_batch(schema::DEMO_SEED).await?;
        info!("demo catalogue loaded");
    }
    info!(path = %cfg.store.path, "store ready");

    // ── Broker ────────────────────────────────────────────────────────────
    let mqtt = cfg
        .broker
        .enabled
        .then(|| Arc::new(MqttBroker::connect(&cfg.mqtt_settings())));
    let broker: Arc<dyn ActuatorBroker> = match &mqtt {
        Some(client) => {
            info!(host = %cfg.broker.host, port = cfg.broker.port, "mqtt broker enabled");
            client.clone() as Arc<dyn ActuatorBroker>
        }
        None => {
            warn!("mqtt broker disabled; publishes are only logged");
            Arc::new(MemoryBroker::new())
        }
    };

    // ── Server ────────────────────────────────────────────────────────────
    let actuation = ActuationPublisher::new(store.clone(), broker, cfg.actuation_settings());
    let ctx = AppContext::new(store, ConnectionRegistry::new(), actuation, cfg.server_settings());
    let server = CockpitServer::new(ctx).with_port(cfg.server.port).bind().await?;

    println!(
        "  {} Listening on {}",
        "●".green().bold(),
        format!("ws://{}", server.local_addr()).bold()
    );
    println!("  Press {} to stop.\n", "Ctrl-C".bold());

    tokio::select! {
        _ = server.serve() => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!(error = %e, "failed to listen for Ctrl-C");
            }
            println!();
            println!("{}", "  Ctrl-C received – shutting down …".yellow().bold());
        }
    }

    // Connection tasks still holding the publisher keep the client alive.
    if let Some(mqtt) = mqtt {
        match Arc::try_unwrap(mqtt) {
            Ok(client) => client.shutdown().await,
            Err(_) => debug!("clients still connected; skipping mqtt disconnect"),
        }
    }
    info!("bridge stopped");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ___                    __   _      __   __ "#.bold().cyan());
    println!("{}", r#"  / _ \___ ____  ___ ___ / /  (_)__ _/ /  / /_"#.bold().cyan());
    println!("{}", r#" / , _/ _ `/ _ \/ _ `/ -_) /__/ / _ `/ _ \/ __/"#.bold().cyan());
    println!("{}", r#"/_/|_|\_,_/_//_/\_, /\__/____/_/\_, /_//_/\__/ "#.bold().cyan());
    println!("{}", r#"               /___/           /___/            "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "RangeLight".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Distance sensor → LED strip bridge");
    println!();
}
