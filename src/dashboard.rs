use std::future::Future;
use std::ops::ControlFlow;

use crate::broker::{BrokerClient, BrokerEvent};
use crate::clock::Clock;
use crate::command::{Action, Command};
use crate::config::Settings;
use crate::export;
use crate::reading::Reading;
use crate::state::SessionState;

/// Minimum number of readings before the chart is drawn.
pub const CHART_MIN_ROWS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct ChartRow {
    pub ts: String,
    pub temp: Option<f64>,
    pub hum: Option<f64>,
}

/// Temperature and humidity indexed by timestamp, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartTable {
    pub rows: Vec<ChartRow>,
}

impl ChartTable {
    pub fn from_log(log: &[Reading]) -> Option<ChartTable> {
        if log.len() < CHART_MIN_ROWS {
            return None;
        }

        let rows = log
            .iter()
            .map(|r| ChartRow {
                ts: r.timestamp.clone(),
                temp: r.temperature,
                hum: r.humidity,
            })
            .collect();
        Some(ChartTable { rows })
    }
}

/// Snapshot handed to the display surface once per cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub connected: bool,
    pub broker: String,
    pub last_reading: Option<Reading>,
    pub confirmation: Option<String>,
    pub export_status: Option<String>,
    pub log_len: usize,
    pub chart: Option<ChartTable>,
}

/// Where views are drawn and operator actions come from.
pub trait Surface {
    /// Returns the actions triggered since the last call without blocking.
    fn actions(&mut self) -> Result<Vec<Action>, anyhow::Error>;

    fn draw(&mut self, view: &View) -> Result<(), anyhow::Error>;
}

pub struct Dashboard<B, K> {
    settings: Settings,
    state: SessionState<B>,
    clock: K,
    confirmation: Option<String>,
    export_status: Option<String>,
}

impl<B: BrokerClient, K: Clock> Dashboard<B, K> {
    pub fn new(settings: Settings, clock: K) -> Self {
        Self {
            settings,
            state: SessionState::new(),
            clock,
            confirmation: None,
            export_status: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn ensure_connected(&mut self, connect: impl FnOnce(&Settings) -> B) {
        let settings = &self.settings;
        self.state.ensure_connected(|| connect(settings));
    }

    pub fn apply(&mut self, action: Action) -> ControlFlow<()> {
        match action {
            Action::Send(command) => self.send(command),
            Action::Export => self.export(),
            Action::Quit => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn send(&mut self, command: Command) {
        let Some(client) = self.state.client.as_mut() else {
            log::warn!("No broker client, dropping {}", command.payload());
            return;
        };

        // Publish failures are not surfaced; the confirmation is optimistic.
        match client.publish(&self.settings.output_topic, command.payload()) {
            Ok(()) => log::info!("Sent {}", command.payload()),
            Err(e) => log::warn!("{e:#}"),
        }
        self.confirmation = Some(format!("Sent {}", command.payload()));
    }

    fn export(&mut self) {
        let path = &self.settings.export_file;
        let status = match export::write_csv(path, &self.state.log) {
            Ok(()) => {
                log::info!("Exported {} readings to {path}", self.state.log.len());
                format!("Saved {} rows to {path}", self.state.log.len())
            }
            Err(e) => {
                log::error!("{e:#}");
                format!("Export failed: {e}")
            }
        };
        self.export_status = Some(status);
    }

    /// Runs one bounded poll and applies every event it yielded, in order.
    pub async fn poll(&mut self) {
        let Some(client) = self.state.client.as_mut() else {
            return;
        };

        let events = client.poll(self.settings.poll_timeout).await;
        for event in events {
            self.ingest(event);
        }
    }

    fn ingest(&mut self, event: BrokerEvent) {
        match event {
            BrokerEvent::ConnAck(code) => {
                if self.state.on_connect(code) {
                    self.subscribe();
                }
            }
            BrokerEvent::Message { topic, payload } => {
                if topic == self.settings.sensor_topic {
                    self.state.on_message(&payload, &self.clock);
                } else {
                    log::debug!("Ignoring message on {topic}");
                }
            }
            BrokerEvent::Disconnected(reason) => self.state.on_disconnect(&reason),
        }
    }

    fn subscribe(&mut self) {
        let topic = &self.settings.sensor_topic;
        if let Some(client) = self.state.client.as_mut() {
            match client.subscribe(topic) {
                Ok(()) => log::info!("Subscribed to {topic}"),
                Err(e) => log::warn!("{e:#}"),
            }
        }
    }

    pub fn view(&self) -> View {
        View {
            connected: self.state.connected,
            broker: self.settings.host.clone(),
            last_reading: self.state.last_reading.clone(),
            confirmation: self.confirmation.clone(),
            export_status: self.export_status.clone(),
            log_len: self.state.log.len(),
            chart: ChartTable::from_log(&self.state.log),
        }
    }
}

/// Drives refresh cycles until the operator quits or `shutdown` resolves.
pub async fn run<B, K, S>(
    dashboard: &mut Dashboard<B, K>,
    surface: &mut S,
    connect: impl Fn(&Settings) -> B,
    shutdown: impl Future<Output = ()>,
) -> Result<(), anyhow::Error>
where
    B: BrokerClient,
    K: Clock,
    S: Surface,
{
    tokio::pin!(shutdown);

    loop {
        dashboard.ensure_connected(&connect);

        for action in surface.actions()? {
            if dashboard.apply(action).is_break() {
                log::info!("Quit requested");
                return Ok(());
            }
        }

        surface.draw(&dashboard.view())?;
        dashboard.poll().await;

        tokio::select! {
            _ = tokio::time::sleep(dashboard.settings().refresh_interval) => {}
            _ = &mut shutdown => {
                log::info!("Shutdown requested");
                return Ok(());
            }
        }
    }
}
