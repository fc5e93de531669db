use crate::broker::ConnectReturnCode;
use crate::clock::Clock;
use crate::reading::Reading;

/// Everything one dashboard session knows. Mutated only by the single
/// render loop, and by the ingest methods it calls from inside a poll.
#[derive(Debug)]
pub struct SessionState<B> {
    pub connected: bool,
    pub last_reading: Option<Reading>,
    pub log: Vec<Reading>,
    pub client: Option<B>,
}

impl<B> Default for SessionState<B> {
    fn default() -> Self {
        Self {
            connected: false,
            last_reading: None,
            log: Vec::new(),
            client: None,
        }
    }
}

impl<B> SessionState<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the client handle on first use. Later calls keep the existing handle.
    pub fn ensure_connected(&mut self, connect: impl FnOnce() -> B) -> &mut B {
        self.client.get_or_insert_with(connect)
    }

    /// Records a connection result. Returns true when the caller should subscribe.
    pub fn on_connect(&mut self, code: ConnectReturnCode) -> bool {
        self.connected = code == ConnectReturnCode::Success;
        if self.connected {
            log::info!("Connected to MQTT broker");
        } else {
            log::error!("MQTT connection failed: {code:?}");
        }
        self.connected
    }

    pub fn on_disconnect(&mut self, reason: &str) {
        if self.connected {
            log::warn!("MQTT connection lost: {reason}");
        } else {
            log::debug!("MQTT connection attempt failed: {reason}");
        }
        self.connected = false;
    }

    /// Ingests one sensor payload. Malformed payloads are logged and dropped.
    pub fn on_message(&mut self, payload: &[u8], clock: &impl Clock) -> Option<&Reading> {
        let reading = match Reading::parse(payload, clock) {
            Ok(reading) => reading,
            Err(e) => {
                log::warn!("Parse error: {e:#}");
                return None;
            }
        };

        log::debug!("{reading:?}");
        self.last_reading = Some(reading.clone());
        self.log.push(reading);
        self.log.last()
    }
}
