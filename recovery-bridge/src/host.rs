//! Host-side adapters
//!
//! The router hands every event to a pair of C-ABI host entry points. For a
//! host written in Rust those entry points are generated here: they turn the
//! opaque [`HostHandle`] back into the host object, turn the raw payload into
//! a slice and keep host panics from unwinding into the engine.
//!
//! Two ready-made hosts are included:
//! - [`RecordingHost`] keeps a copy of every delivery
//! - [`ValidationCollector`] folds warnings from a validation run into a
//!   [`ValidationResult`]

use crate::context::{DispatchContext, HostPaths};
use crate::types::{BridgeError, DeliveryMode, EventId, HostHandle, Result, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::slice;

/// A host object that receives routed events
pub trait Host<E> {
    /// Standard delivery path: progress, status and result events
    fn on_event(&mut self, event_id: EventId, engine: *mut E, payload: &[u8]);

    /// Validation delivery path: hash-validation outcomes
    fn on_validation(&mut self, event_id: EventId, engine: *mut E, payload: &[u8]) {
        let _ = engine;
        log::trace!(
            "Validation event {} ({} bytes) ignored by host",
            event_id,
            payload.len()
        );
    }
}

impl<E> HostPaths<E> {
    /// Entry points that deliver to a host object of type `H`
    pub fn for_host<H: Host<E>>() -> Self {
        HostPaths::new(standard_entry::<E, H>, validation_entry::<E, H>)
    }
}

impl<'h, E> DispatchContext<'h, E> {
    /// Build a context that delivers to `host`
    ///
    /// The context keeps `host` mutably borrowed, so the host outlives every
    /// event routed through it:
    ///
    /// ```compile_fail
    /// use recovery_bridge::{DeliveryMode, DispatchContext, Event, RecordingHost};
    ///
    /// let mut ctx = {
    ///     let mut host = RecordingHost::new();
    ///     DispatchContext::for_host(0u8, &mut host, DeliveryMode::Standard)
    /// };
    /// ctx.dispatch(Event::empty(1));
    /// ```
    pub fn for_host<H: Host<E>>(engine: E, host: &'h mut H, mode: DeliveryMode) -> Box<Self> {
        // SAFETY: the entry points for `H` get a handle to an `H` that stays
        // exclusively borrowed for `'h`, as long as the context can exist.
        unsafe { Self::with_paths(engine, HostHandle::from_mut(host), mode, HostPaths::for_host::<H>()) }
    }
}

unsafe extern "C" fn standard_entry<E, H: Host<E>>(
    event_id: EventId,
    engine: *mut E,
    host: HostHandle,
    buf: *const c_void,
    len: usize,
) {
    deliver::<E, H>(DeliveryMode::Standard, event_id, engine, host, buf, len);
}

unsafe extern "C" fn validation_entry<E, H: Host<E>>(
    event_id: EventId,
    engine: *mut E,
    host: HostHandle,
    buf: *const c_void,
    len: usize,
) {
    deliver::<E, H>(DeliveryMode::Validation, event_id, engine, host, buf, len);
}

unsafe fn deliver<E, H: Host<E>>(
    path: DeliveryMode,
    event_id: EventId,
    engine: *mut E,
    host: HostHandle,
    buf: *const c_void,
    len: usize,
) {
    if host.is_null() {
        log::error!("Event {} reached the {} path without a host object", event_id, path);
        return;
    }

    let payload = match payload_slice(buf, len) {
        Ok(payload) => payload,
        Err(e) => {
            log::error!("Skipping event {}: {}", event_id, e);
            return;
        }
    };

    let host = &mut *host.as_ptr().cast::<H>();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match path {
        DeliveryMode::Standard => host.on_event(event_id, engine, payload),
        DeliveryMode::Validation => host.on_validation(event_id, engine, payload),
    }));

    if outcome.is_err() {
        log::error!("Host panicked handling event {} on the {} path", event_id, path);
    }
}

/// View a raw `(buf, len)` payload as a slice
///
/// A null `buf` is accepted only with a zero length.
///
/// # Safety
/// A non-null `buf` must be valid for `len` bytes for the lifetime `'a`.
pub unsafe fn payload_slice<'a>(buf: *const c_void, len: usize) -> Result<&'a [u8]> {
    if buf.is_null() {
        if len == 0 {
            return Ok(&[]);
        }
        return Err(BridgeError::InvalidArgument(format!(
            "null payload with length {}",
            len
        )));
    }
    Ok(slice::from_raw_parts(buf.cast::<u8>(), len))
}

/// One delivery as seen by [`RecordingHost`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRecord {
    pub mode: DeliveryMode,
    pub event_id: EventId,
    /// Address of the engine context the event came with
    pub engine_addr: usize,
    /// Address of the payload buffer the engine passed
    pub payload_addr: usize,
    pub payload: Vec<u8>,
    pub received_at: Timestamp,
}

/// Host that stores a copy of every event it receives, on either path
#[derive(Debug, Default)]
pub struct RecordingHost {
    records: Vec<DeliveryRecord>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[DeliveryRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<DeliveryRecord> {
        self.records
    }

    /// Number of deliveries that arrived on `mode`'s path
    pub fn count(&self, mode: DeliveryMode) -> usize {
        self.records.iter().filter(|r| r.mode == mode).count()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    fn record<E>(&mut self, mode: DeliveryMode, event_id: EventId, engine: *mut E, payload: &[u8]) {
        self.records.push(DeliveryRecord {
            mode,
            event_id,
            engine_addr: engine as usize,
            payload_addr: payload.as_ptr() as usize,
            payload: payload.to_vec(),
            received_at: Utc::now(),
        });
    }
}

impl<E> Host<E> for RecordingHost {
    fn on_event(&mut self, event_id: EventId, engine: *mut E, payload: &[u8]) {
        self.record(DeliveryMode::Standard, event_id, engine, payload);
    }

    fn on_validation(&mut self, event_id: EventId, engine: *mut E, payload: &[u8]) {
        self.record(DeliveryMode::Validation, event_id, engine, payload);
    }
}

/// Outcome of a hash-validation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }
}

/// Validation-path host that turns engine warnings into validation errors
///
/// Events whose id is in `warning_ids` carry a warning message as payload.
/// Warnings about missing kernels or fallbacks say nothing about the hashes
/// and are ignored; anything else marks the input invalid.
#[derive(Debug, Clone, Default)]
pub struct ValidationCollector {
    warning_ids: Vec<EventId>,
    result: ValidationResult,
}

impl ValidationCollector {
    pub fn new(warning_ids: impl IntoIterator<Item = EventId>) -> Self {
        Self {
            warning_ids: warning_ids.into_iter().collect(),
            result: ValidationResult::default(),
        }
    }

    pub fn result(&self) -> &ValidationResult {
        &self.result
    }

    pub fn into_result(self) -> ValidationResult {
        self.result
    }

    /// Fold one validation event into the result
    pub fn observe(&mut self, event_id: EventId, payload: &[u8]) {
        if !self.warning_ids.contains(&event_id) {
            return;
        }

        let text = String::from_utf8_lossy(payload);
        let msg = text.trim_end_matches('\0');
        if msg.contains("kernel not found") || msg.contains("falling back to") {
            return;
        }

        // Drop the file name from "Hashfile '<name>' on line N ..." warnings
        let msg = match msg.find("on ") {
            Some(idx) if msg.contains("Hashfile") => &msg[idx + 3..],
            _ => msg,
        };

        self.result.valid = false;
        self.result.errors.push(msg.to_string());
    }
}

impl<E> Host<E> for ValidationCollector {
    fn on_event(&mut self, event_id: EventId, _engine: *mut E, _payload: &[u8]) {
        log::debug!("Validation collector ignoring standard event {}", event_id);
    }

    fn on_validation(&mut self, event_id: EventId, _engine: *mut E, payload: &[u8]) {
        self.observe(event_id, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Event;

    struct Panicky;

    impl Host<u8> for Panicky {
        fn on_event(&mut self, _: EventId, _: *mut u8, _: &[u8]) {
            panic!("host failure");
        }
    }

    #[test]
    fn test_payload_slice() {
        assert_eq!(unsafe { payload_slice(std::ptr::null(), 0) }.unwrap(), b"");
        assert!(unsafe { payload_slice(std::ptr::null(), 4) }.is_err());

        let data = b"abc";
        let view = unsafe { payload_slice(data.as_ptr().cast(), 3) }.unwrap();
        assert_eq!(view, b"abc");
        assert_eq!(view.as_ptr(), data.as_ptr());
    }

    #[test]
    fn test_recording_host_both_paths() {
        let mut host = RecordingHost::new();
        {
            let mut standard = DispatchContext::for_host(1u8, &mut host, DeliveryMode::Standard);
            standard.dispatch(Event::new(1, b"progress"));
        }
        {
            let mut validation = DispatchContext::for_host(2u8, &mut host, DeliveryMode::Validation);
            validation.dispatch(Event::new(2, b"result"));
        }

        assert_eq!(host.count(DeliveryMode::Standard), 1);
        assert_eq!(host.count(DeliveryMode::Validation), 1);
        assert_eq!(host.records()[0].payload, b"progress");
        assert_eq!(host.records()[1].event_id, 2);
    }

    #[test]
    fn test_host_panic_is_contained() {
        let mut host = Panicky;
        let mut ctx = DispatchContext::for_host(0u8, &mut host, DeliveryMode::Standard);
        ctx.dispatch(Event::new(5, b"boom"));
    }

    #[test]
    fn test_null_host_handle_skips_delivery() {
        let paths = HostPaths::<u8>::for_host::<RecordingHost>();
        let mut ctx = unsafe { DispatchContext::with_paths(0u8, HostHandle::null(), DeliveryMode::Standard, paths) };
        ctx.dispatch(Event::new(1, b"lost"));
    }

    #[test]
    fn test_host_usable_again_after_context_drop() {
        let mut host = RecordingHost::new();
        let mut ctx = DispatchContext::for_host(3u8, &mut host, DeliveryMode::Standard);
        ctx.dispatch(Event::new(4, b"first"));
        drop(ctx);

        host.clear();
        let mut ctx = DispatchContext::for_host(3u8, &mut host, DeliveryMode::Standard);
        ctx.dispatch(Event::new(5, b"second"));
        drop(ctx);

        assert_eq!(host.records().len(), 1);
        assert_eq!(host.records()[0].event_id, 5);
        assert_eq!(host.records()[0].payload, b"second");
    }

    #[test]
    fn test_validation_collector_filters_warnings() {
        let mut collector = ValidationCollector::new([3]);

        collector.observe(1, b"not a warning");
        collector.observe(3, b"Kernel /opt/x.cl: kernel not found, rebuilding");
        collector.observe(3, b"Device #1: falling back to pure kernel");
        assert!(collector.result().valid);

        collector.observe(3, b"Hashfile 'hashes.txt' on line 2 (abc): Token length exception\0");
        let result = collector.into_result();
        assert!(!result.valid);
        assert_eq!(result.errors, vec!["line 2 (abc): Token length exception"]);
    }

    #[test]
    fn test_validation_collector_keeps_plain_warnings() {
        let mut collector = ValidationCollector::new([3]);
        collector.observe(3, b"No hashes loaded");
        assert_eq!(collector.result().errors, vec!["No hashes loaded"]);
    }
}
