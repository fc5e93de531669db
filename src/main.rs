use std::fs::File;

use anyhow::Context;
use broker::MqttClient;
use clock::SystemClock;
use config::Settings;
use dashboard::Dashboard;
use log::LevelFilter;
use simplelog::{ConfigBuilder, WriteLogger};
use ui::Tui;

mod broker;
mod clock;
mod command;
mod config;
mod dashboard;
mod export;
mod reading;
mod state;
mod ui;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // The terminal belongs to the dashboard, so logs go to a file.
    WriteLogger::init(
        LevelFilter::Info,
        ConfigBuilder::new()
            .set_time_format_rfc3339()
            .set_time_offset_to_local()
            .map_err(|_| anyhow::anyhow!("Failed to set time offset to local"))?
            .build(),
        File::create(config::LOG_FILE).context("Failed to create log file")?,
    )
    .context("Failed to initialize logger")?;

    let mut tui = Tui::enter().context("Failed to initialize terminal")?;
    ui::install_panic_hook();
    let result = run(&mut tui).await;
    tui.restore().context("Failed to restore terminal")?;

    if let Err(e) = result {
        log::error!("{e:#}");
        eprintln!("env-dashboard: {e:#}");
    }

    Ok(())
}

pub async fn run(tui: &mut Tui) -> Result<(), anyhow::Error> {
    let settings = Settings::default();
    log::info!(
        "Starting dashboard for {} on {}:{}",
        settings.sensor_topic,
        settings.host,
        settings.port
    );

    let mut dashboard = Dashboard::new(settings, SystemClock);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to wait for Ctrl+C signal: {e}");
            std::future::pending::<()>().await;
        }
    };

    dashboard::run(&mut dashboard, tui, MqttClient::connect, shutdown).await
}
