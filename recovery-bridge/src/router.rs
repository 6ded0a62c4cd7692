//! Event router
//!
//! The engine calls [`event_entry`] for every notification it wants the host
//! to see. The router looks at the delivery path fixed in the dispatch context
//! and makes exactly one call into host code with the arguments it was given.
//! No payload inspection, filtering, buffering or retrying happens here.

use crate::context::{Delivery, DispatchContext};
use crate::types::{BridgeError, EventId, Result};
use std::ffi::c_void;

/// C-ABI entry point registered with the engine
///
/// `engine` is the pointer obtained from [`DispatchContext::engine_ptr`]. A
/// null pointer cannot be reported back through the C signature, so it is
/// logged and the event is dropped.
///
/// # Safety
/// `engine` must be null or come from a dispatch context that is still alive,
/// and `buf` must be valid for `len` bytes for the duration of the call.
pub unsafe extern "C" fn event_entry<E>(
    id: EventId,
    engine: *mut E,
    buf: *const c_void,
    len: usize,
) {
    if let Err(e) = route_event(id, DispatchContext::from_engine_ptr(engine), buf, len) {
        log::error!("Dropping event {}: {}", id, e);
    }
}

/// Forward one event to the delivery path of `ctx`
///
/// Returns `NullContext` for a null context. Whatever the host path does
/// with the event is opaque and never reported back.
///
/// # Safety
/// `ctx` must be null or point to a live dispatch context, and `payload` must
/// be valid for `payload_length` bytes for the duration of the call.
pub unsafe fn route_event<E>(
    event_id: EventId,
    ctx: *mut DispatchContext<'_, E>,
    payload: *const c_void,
    payload_length: usize,
) -> Result<()> {
    if ctx.is_null() {
        return Err(BridgeError::NullContext);
    }
    forward(ctx, event_id, payload, payload_length);
    Ok(())
}

/// # Safety
/// `ctx` must point to a live dispatch context.
pub(crate) unsafe fn forward<E>(
    ctx: *mut DispatchContext<'_, E>,
    event_id: EventId,
    payload: *const c_void,
    payload_length: usize,
) {
    let (engine, host, delivery) = DispatchContext::raw_parts(ctx);

    log::trace!(
        "Routing event {} ({} bytes) to {} path",
        event_id,
        payload_length,
        delivery.mode()
    );

    match delivery {
        Delivery::Validation(validation) => validation(event_id, engine, host, payload, payload_length),
        Delivery::Standard(standard) => standard(event_id, engine, host, payload, payload_length),
    }
}
