use std::path::Path;

use anyhow::Context;

use crate::reading::Reading;

pub const CSV_HEADER: &str = "ts,temp,hum";

/// Encodes the reading log as CSV, one row per reading. Absent values are empty fields.
pub fn to_csv(log: &[Reading]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + 1 + log.len() * 24);
    out.push_str(CSV_HEADER);
    out.push('\n');

    for reading in log {
        out.push_str(&reading.timestamp);
        out.push(',');
        out.push_str(&field(reading.temperature));
        out.push(',');
        out.push_str(&field(reading.humidity));
        out.push('\n');
    }

    out
}

fn field(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn write_csv(path: impl AsRef<Path>, log: &[Reading]) -> Result<(), anyhow::Error> {
    let path = path.as_ref();
    std::fs::write(path, to_csv(log))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
