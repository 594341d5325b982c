use clap::Parser;
use serial_mqtt_adapter::bus::MqttConnection;
use serial_mqtt_adapter::config::{
    load_adapter_settings, validate, Config, ConfigError, ConfigLoader, LogFormat, LoggingConfig,
};
use serial_mqtt_adapter::error::AppResult;
use serial_mqtt_adapter::port::{DuplexCoordinator, DuplexMode, PortHandle};
use serial_mqtt_adapter::service::{BridgeService, ReadLoop, RequestRouter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Bridges a serial device to an MQTT broker.",
    long_about = "Opens a serial port described by a JSON adapter settings file and exposes \
                  it on an MQTT broker: publish to <root>/read or <root>/write (hex payload) \
                  to talk to the device; data and errors come back on <root>/response and \
                  <root>/error."
)]
struct Args {
    /// Bridge configuration file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Adapter settings file (JSON with portName, bitRate, ...).
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Milliseconds each serial read waits for data.
    #[arg(long)]
    read_timeout: Option<u64>,

    /// Prefix of the request and response topics.
    #[arg(long)]
    topic_root: Option<String>,

    /// MQTT broker host.
    #[arg(long)]
    broker_host: Option<String>,

    /// MQTT broker port.
    #[arg(long)]
    broker_port: Option<u16>,

    /// Log filter, e.g. `info` or `serial_mqtt_adapter=debug`.
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn load_config(&self) -> Result<Config, ConfigError> {
        let loader = match &self.config {
            Some(path) => ConfigLoader::load_from(path)?,
            None => ConfigLoader::load()?,
        };
        let mut config = loader.into_config();

        if let Some(path) = &self.settings {
            config.serial.settings_path = Some(path.clone());
        }
        if let Some(ms) = self.read_timeout {
            config.serial.read_timeout_ms = ms;
        }
        if let Some(root) = &self.topic_root {
            config.bus.topic_root = root.clone();
        }
        if let Some(host) = &self.broker_host {
            config.bus.host = host.clone();
        }
        if let Some(port) = self.broker_port {
            config.bus.port = port;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

// --- Main Application Entry Point ---
#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("serial_mqtt_adapter: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.logging);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "bridge stopped");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

async fn run(config: Config) -> AppResult<()> {
    let settings_path = config.serial.settings_path.clone().ok_or_else(|| {
        ConfigError::validation("serial.settings_path", "no adapter settings file given")
    })?;
    let raw = load_adapter_settings(&settings_path)?;
    let settings = validate(&raw)?.with_poll_timeout(config.serial.read_timeout());
    let mode = DuplexMode::from_half_duplex(settings.half_duplex);

    let handle = PortHandle::open(settings)?;
    let coordinator = Arc::new(DuplexCoordinator::new(handle, mode)?);

    let mut connection = match MqttConnection::connect(&config.bus).await {
        Ok(connection) => connection,
        Err(e) => {
            if let Err(close_err) = coordinator.close().await {
                warn!(error = %close_err, "closing port failed");
            }
            return Err(e.into());
        }
    };

    if let Err(e) = coordinator.flush().await {
        error!(error = %e, "initial flush failed");
    }

    let service = BridgeService::new(
        Arc::clone(&coordinator),
        Arc::new(connection.publisher()),
        config.bus.topic_root.clone(),
    );
    let read_loop = ReadLoop::spawn(service.clone(), config.serial.idle_backoff());
    let mut router = RequestRouter::new(service);
    info!(?mode, topic_root = %config.bus.topic_root, "bridge running");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            message = connection.recv() => match message {
                Some(message) => {
                    router.dispatch(message);
                }
                None => {
                    warn!("bus event loop ended");
                    break;
                }
            },
        }
    }

    let grace = config.serial.shutdown_grace();
    if read_loop.shutdown(grace).await.is_none() {
        warn!("read loop did not stop cleanly");
    }
    router.drain(grace).await;
    if let Err(e) = coordinator.close().await {
        warn!(error = %e, "closing port failed");
    }
    connection.disconnect().await;

    info!("bridge stopped");
    Ok(())
}

// --- Graceful Shutdown Handler ---
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("signal received, starting graceful shutdown");
}
