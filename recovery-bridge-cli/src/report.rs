//! Replay report generation
//!
//! Summarises what the host saw during a replay, as plain text or JSON.

use crate::config::OutputFormat;
use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use recovery_bridge::{DeliveryMode, DeliveryRecord, EventId, ValidationResult};
use serde::Serialize;
use std::fmt::Write;

const PREVIEW_LEN: usize = 32;

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub session: String,
    pub mode: DeliveryMode,
    /// Which host received the events
    pub host: String,
    pub events_fired: u64,
    /// Deliveries observed by a built-in recording host
    pub deliveries: Vec<DeliveryLine>,
    /// Outcome collected by the built-in validation host
    pub validation: Option<ValidationResult>,
    pub finished_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryLine {
    pub event_id: EventId,
    pub path: DeliveryMode,
    pub payload_len: usize,
    pub payload_preview: String,
    pub received_at: String,
}

impl From<&DeliveryRecord> for DeliveryLine {
    fn from(record: &DeliveryRecord) -> Self {
        Self {
            event_id: record.event_id,
            path: record.mode,
            payload_len: record.payload.len(),
            payload_preview: preview(&record.payload),
            received_at: record.received_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

impl ReplayReport {
    pub fn new(session: impl Into<String>, mode: DeliveryMode, host: impl Into<String>, events_fired: u64) -> Self {
        Self {
            session: session.into(),
            mode,
            host: host.into(),
            events_fired,
            deliveries: Vec::new(),
            validation: None,
            finished_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    pub fn with_deliveries(mut self, records: &[DeliveryRecord]) -> Self {
        self.deliveries = records.iter().map(DeliveryLine::from).collect();
        self
    }

    pub fn with_validation(mut self, result: ValidationResult) -> Self {
        self.validation = Some(result);
        self
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            OutputFormat::Txt => Ok(self.render_txt()),
        }
    }

    fn render_txt(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "═══════════════════════════════════════════════");
        let _ = writeln!(out, "  Replay Summary");
        let _ = writeln!(out, "═══════════════════════════════════════════════");
        let _ = writeln!(out, "  Session:      {}", self.session);
        let _ = writeln!(out, "  Mode:         {}", self.mode);
        let _ = writeln!(out, "  Host:         {}", self.host);
        let _ = writeln!(out, "  Events fired: {}", self.events_fired);
        let _ = writeln!(out, "  Finished:     {}", self.finished_at);

        if !self.deliveries.is_empty() {
            let _ = writeln!(out, "\n  {:>10}  {:<10}  {:>6}  payload", "event", "path", "bytes");
            let _ = writeln!(out, "  ───────────────────────────────────────────");
            for line in &self.deliveries {
                let _ = writeln!(
                    out,
                    "  {:>10}  {:<10}  {:>6}  {}",
                    line.event_id,
                    line.path.to_string(),
                    line.payload_len,
                    line.payload_preview
                );
            }
        }

        if let Some(validation) = &self.validation {
            let verdict = if validation.valid { "valid" } else { "INVALID" };
            let _ = writeln!(out, "\n  Validation:   {}", verdict);
            for error in &validation.errors {
                let _ = writeln!(out, "    - {}", error);
            }
        }

        out
    }
}

/// Printable preview of a payload: text if it is UTF-8, hex otherwise
fn preview(payload: &[u8]) -> String {
    let shown = &payload[..payload.len().min(PREVIEW_LEN)];
    let text = match std::str::from_utf8(shown) {
        Ok(s) => Some(s),
        // The limit fell inside a multibyte character: show up to it
        Err(e) if e.error_len().is_none() && shown.len() < payload.len() => {
            std::str::from_utf8(&shown[..e.valid_up_to()]).ok()
        }
        Err(_) => None,
    };
    let mut text = match text {
        Some(s) if !s.chars().any(char::is_control) => format!("{:?}", s),
        _ => hex::encode(shown),
    };
    if payload.len() > PREVIEW_LEN {
        text.push('…');
    }
    text
}
