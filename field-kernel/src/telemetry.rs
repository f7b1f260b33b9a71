use serde::Deserialize;
use thiserror::Error;

/// Opaque team identifier. Numeric by convention but never used
/// arithmetically; it only serves as a label key.
pub type TeamId = String;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("topic {0:?} does not match robot/<team>/stats")]
    Topic(String),
    #[error("malformed stats payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// One stats report as published by a robot's system processor.
///
/// Field names match the wire format exactly. Decoding is strict: a
/// report missing any field is rejected whole, so a truncated payload
/// can never push partial values into the metrics.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TelemetryReport {
    #[serde(rename = "RSSI")]
    pub rssi: u8,
    #[serde(rename = "VBat")]
    pub vbat: i32,
    #[serde(rename = "WatchdogRemaining")]
    pub watchdog_remaining: i32,
    #[serde(rename = "WatchdogOK")]
    pub watchdog_ok: bool,
    #[serde(rename = "PwrBoard")]
    pub pwr_board: bool,
    #[serde(rename = "PwrPico")]
    pub pwr_pico: bool,
    #[serde(rename = "PwrGPIO")]
    pub pwr_gpio: bool,
    #[serde(rename = "PwrMainA")]
    pub pwr_main_a: bool,
    #[serde(rename = "PwrMainB")]
    pub pwr_main_b: bool,
}

/// Decodes one bus message into the reporting team and its stats.
///
/// Pure: the same topic and payload always produce the same result.
pub fn decode(topic: &str, payload: &[u8]) -> Result<(TeamId, TelemetryReport), DecodeError> {
    let mut parts = topic.split('/');
    let (Some("robot"), Some(team), Some("stats"), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(DecodeError::Topic(topic.to_string()));
    };
    if team.is_empty() {
        return Err(DecodeError::Topic(topic.to_string()));
    }
    let report = serde_json::from_slice(payload)?;
    Ok((team.to_string(), report))
}
