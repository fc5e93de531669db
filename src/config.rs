use std::time::Duration;

pub const BROKER_HOST: &str = "broker.hivemq.com";
pub const BROKER_PORT: u16 = 1883;
pub const KEEP_ALIVE: Duration = Duration::from_secs(60);

pub const TOPIC_SENSOR: &str = "iot/class/session5/sensor";
pub const TOPIC_OUTPUT: &str = "iot/class/session5/output";

pub const POLL_TIMEOUT: Duration = Duration::from_millis(100);
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(1);

pub const EXPORT_FILE: &str = "./log.csv";
pub const LOG_FILE: &str = "./env-dashboard.log";

/// Fixed broker and loop settings, passed explicitly instead of read from globals.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    pub sensor_topic: String,
    pub output_topic: String,
    pub poll_timeout: Duration,
    pub refresh_interval: Duration,
    pub export_file: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: BROKER_HOST.to_string(),
            port: BROKER_PORT,
            client_id: format!("env-dashboard-{}", std::process::id()),
            keep_alive: KEEP_ALIVE,
            sensor_topic: TOPIC_SENSOR.to_string(),
            output_topic: TOPIC_OUTPUT.to_string(),
            poll_timeout: POLL_TIMEOUT,
            refresh_interval: REFRESH_INTERVAL,
            export_file: EXPORT_FILE.to_string(),
        }
    }
}
