use color_eyre::Result;
use std::path::PathBuf;
use telemetry_monitor::config::MonitorConfig;
use telemetry_monitor::geo::planar_to_geo;
use telemetry_monitor::mqtt::{ConnectionManager, MonitorHandle, RumqttTransport};
use telemetry_monitor::telemetry::reducer::DEFAULT_DESTINATION;
use telemetry_monitor::telemetry::ConnectionStatus;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(MonitorConfig::default_path);
    let config = MonitorConfig::load_or_create(&config_path).await?;
    setup_logging_env(config.monitor.level());
    info!("Using config {}", config_path.display());

    let manager = ConnectionManager::new(
        RumqttTransport::new(),
        config.mqtt.clone(),
        config.monitor.manager_settings(),
    );
    info!("Monitor client id: {}", manager.client_id());
    let (handle, manager_task) = MonitorHandle::spawn(manager);

    let presenters = spawn_presenters(&handle);

    let status = handle.connect().await;
    if status != ConnectionStatus::Connected {
        warn!("Initial connect failed, the log has the reason");
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    handle.shutdown().await;
    let _ = manager_task.await;
    for presenter in presenters {
        presenter.abort();
    }

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    Ok(())
}

fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

/// Console stand-in for a display: prints every change of the three observables.
fn spawn_presenters(handle: &MonitorHandle) -> Vec<tokio::task::JoinHandle<()>> {
    let mut status_rx = handle.status();
    let status_task = tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = *status_rx.borrow_and_update();
            info!("MQTT Status: {}", status);
        }
    });

    let mut log_rx = handle.messages();
    let log_task = tokio::spawn(async move {
        let mut seen = 0;
        while log_rx.changed().await.is_ok() {
            let fresh: Vec<String> = {
                let log = log_rx.borrow_and_update();
                let fresh = log.since(seen).map(|entry| entry.to_string()).collect();
                seen = log.total_appended();
                fresh
            };
            for line in fresh {
                info!("{}", line);
            }
        }
    });

    let mut vehicle_rx = handle.vehicle();
    let vehicle_task = tokio::spawn(async move {
        let home = planar_to_geo(DEFAULT_DESTINATION.x, DEFAULT_DESTINATION.y);
        while vehicle_rx.changed().await.is_ok() {
            let vehicle = vehicle_rx.borrow_and_update().clone();
            let position = planar_to_geo(vehicle.location.x, vehicle.location.y);
            info!(
                "Vehicle at ({}, {}) [{:.5}, {:.5}] mode={} passenger={} eta={}min home=[{:.5}, {:.5}]",
                vehicle.location.x,
                vehicle.location.y,
                position.lat,
                position.lng,
                vehicle.autonomous_mode,
                if vehicle.passenger_in_vehicle {
                    "in vehicle"
                } else {
                    "not in vehicle"
                },
                vehicle.eta_minutes,
                home.lat,
                home.lng
            );
        }
    });

    vec![status_task, log_task, vehicle_task]
}
