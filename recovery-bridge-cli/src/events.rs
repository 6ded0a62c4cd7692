//! Scripted engine events
//!
//! A replay script lists the notifications an engine run would produce. The
//! replay engine registers the bridge's entry point the same way a native
//! engine does and fires each scripted event through it.

use anyhow::{Context, Result};
use recovery_bridge::{EngineEventFn, EventId};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Events to replay, in order
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventScript {
    #[serde(default, rename = "event")]
    pub events: Vec<ScriptedEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptedEvent {
    pub id: EventId,
    /// Payload as UTF-8 text
    pub payload: Option<String>,
    /// Payload as hex bytes, for binary payloads
    pub payload_hex: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Event {id}: payload and payload_hex are mutually exclusive")]
    ConflictingPayload { id: EventId },

    #[error("Event {id}: invalid hex payload: {source}")]
    InvalidHex {
        id: EventId,
        source: hex::FromHexError,
    },
}

impl ScriptedEvent {
    /// Payload bytes exactly as the engine would hand them over
    pub fn payload_bytes(&self) -> std::result::Result<Vec<u8>, ScriptError> {
        match (&self.payload, &self.payload_hex) {
            (Some(_), Some(_)) => Err(ScriptError::ConflictingPayload { id: self.id }),
            (Some(text), None) => Ok(text.as_bytes().to_vec()),
            (None, Some(digits)) => decode_hex(digits).map_err(|source| ScriptError::InvalidHex {
                id: self.id,
                source,
            }),
            (None, None) => Ok(Vec::new()),
        }
    }
}

/// Hex digits to bytes; whitespace between digits is allowed
fn decode_hex(text: &str) -> std::result::Result<Vec<u8>, hex::FromHexError> {
    let digits: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    hex::decode(digits)
}

/// Load a replay script from a TOML file
pub fn load_script(path: &Path) -> Result<EventScript> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read event script: {:?}", path))?;

    let script: EventScript = toml::from_str(&content)
        .with_context(|| format!("Failed to parse event script: {:?}", path))?;

    // Reject bad payloads before anything is delivered
    for event in &script.events {
        event.payload_bytes()?;
    }

    log::debug!("Loaded {} scripted events from {:?}", script.events.len(), path);
    Ok(script)
}

/// Engine context for a replay run
#[derive(Debug, Clone, Default)]
pub struct ReplayEngine {
    pub session: String,
    pub events_fired: u64,
}

impl ReplayEngine {
    pub fn new(session: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            events_fired: 0,
        }
    }
}

/// Stand-in for the native engine's event loop
///
/// Holds only what a native engine would be given: the address of its
/// context and the entry point to call.
pub struct ReplayDriver {
    handler: EngineEventFn<ReplayEngine>,
    engine: *mut ReplayEngine,
}

impl ReplayDriver {
    /// Register the bridge entry point with the engine
    ///
    /// `engine` must stay valid for as long as the driver runs.
    pub fn register(handler: EngineEventFn<ReplayEngine>, engine: *mut ReplayEngine) -> Self {
        Self { handler, engine }
    }

    /// Fire every scripted event, in order, and return how many were fired
    pub fn run(&mut self, script: &EventScript) -> Result<u64> {
        let mut fired = 0;
        for event in &script.events {
            let payload = event.payload_bytes()?;
            log::debug!("Firing event {} ({} bytes)", event.id, payload.len());

            // SAFETY: `engine` comes from a live dispatch context (see
            // `register`) and `payload` outlives the call.
            unsafe {
                (*self.engine).events_fired += 1;
                (self.handler)(event.id, self.engine, payload.as_ptr().cast(), payload.len());
            }
            fired += 1;
        }
        Ok(fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recovery_bridge::{DeliveryMode, DispatchContext, RecordingHost};
    use std::io::Write;

    #[test]
    fn test_script_deserialization() {
        let toml_content = r#"
            [[event]]
            id = 42
            payload = "abc"

            [[event]]
            id = 7
            payload_hex = "00 ff 10"

            [[event]]
            id = 3
        "#;

        let script: EventScript = toml::from_str(toml_content).unwrap();
        assert_eq!(script.events.len(), 3);
        assert_eq!(script.events[0].payload_bytes().unwrap(), b"abc");
        assert_eq!(script.events[1].payload_bytes().unwrap(), vec![0x00, 0xff, 0x10]);
        assert!(script.events[2].payload_bytes().unwrap().is_empty());
    }

    #[test]
    fn test_payload_errors() {
        let both = ScriptedEvent {
            id: 1,
            payload: Some("a".into()),
            payload_hex: Some("61".into()),
        };
        assert!(matches!(both.payload_bytes(), Err(ScriptError::ConflictingPayload { id: 1 })));

        let odd = ScriptedEvent {
            id: 2,
            payload: None,
            payload_hex: Some("abc".into()),
        };
        assert!(matches!(
            odd.payload_bytes(),
            Err(ScriptError::InvalidHex {
                id: 2,
                source: hex::FromHexError::OddLength
            })
        ));

        let junk = ScriptedEvent {
            id: 3,
            payload: None,
            payload_hex: Some("zz".into()),
        };
        let err = junk.payload_bytes().unwrap_err();
        assert!(matches!(
            err,
            ScriptError::InvalidHex {
                id: 3,
                source: hex::FromHexError::InvalidHexCharacter { c: 'z', index: 0 }
            }
        ));
        assert!(err.to_string().starts_with("Event 3: invalid hex payload"));
    }

    #[test]
    fn test_load_script_rejects_bad_payload() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[[event]]\nid = 1\npayload_hex = \"xyz\"").unwrap();
        assert!(load_script(file.path()).is_err());
    }

    #[test]
    fn test_driver_fires_through_entry_point() {
        let script: EventScript =
            toml::from_str("[[event]]\nid = 1\npayload = \"a\"\n[[event]]\nid = 2\npayload = \"bc\"").unwrap();

        let mut host = RecordingHost::new();
        let mut ctx = DispatchContext::for_host(ReplayEngine::new("test"), &mut host, DeliveryMode::Standard);
        let mut driver = ReplayDriver::register(DispatchContext::<ReplayEngine>::event_handler(), ctx.engine_ptr());

        assert_eq!(driver.run(&script).unwrap(), 2);
        assert_eq!(ctx.engine().events_fired, 2);
        drop(ctx);

        let ids: Vec<_> = host.records().iter().map(|r| r.event_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(host.records()[1].payload, b"bc");
    }
}
