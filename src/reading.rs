use anyhow::Context;
use serde::Deserialize;

use crate::clock::Clock;

pub const TIMESTAMP_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

/// Wire shape of a sensor message. Unknown keys are ignored.
#[derive(Debug, Deserialize)]
struct SensorPayload {
    #[serde(default)]
    temp: Option<f64>,
    #[serde(default)]
    hum: Option<f64>,
}

impl Reading {
    pub fn parse(payload: &[u8], clock: &impl Clock) -> Result<Reading, anyhow::Error> {
        let text = std::str::from_utf8(payload).context("Payload is not valid UTF-8")?;
        // Going through a map first rejects arrays, which serde would
        // otherwise accept as a positional struct.
        let object: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(text).context("Payload is not a JSON object")?;
        let data: SensorPayload = serde_json::from_value(serde_json::Value::Object(object))
            .context("Payload fields have unexpected types")?;

        Ok(Reading {
            timestamp: clock.now().format(TIMESTAMP_FORMAT).to_string(),
            temperature: data.temp,
            humidity: data.hum,
        })
    }
}
