//! Dispatch context threaded through every engine-to-host call
//!
//! The engine only ever sees a pointer to the embedded engine context. Because
//! `DispatchContext` is `#[repr(C)]` with the engine context as its first
//! field, that pointer is also a pointer to the whole dispatch context, which
//! is how the router gets back to the host handle and the delivery path.

use crate::router;
use crate::types::{DeliveryMode, Event, EventId, HostHandle};
use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::ptr;

/// Host-side delivery entry point
///
/// Arguments: event id, engine context, host handle, payload pointer, payload length.
pub type HostCallback<E> = unsafe extern "C" fn(EventId, *mut E, HostHandle, *const c_void, usize);

/// Entry point the engine calls for every notification
pub type EngineEventFn<E> = unsafe extern "C" fn(EventId, *mut E, *const c_void, usize);

/// The pair of host entry points a context can be built from
pub struct HostPaths<E> {
    pub standard: HostCallback<E>,
    pub validation: HostCallback<E>,
}

impl<E> HostPaths<E> {
    pub fn new(standard: HostCallback<E>, validation: HostCallback<E>) -> Self {
        Self {
            standard,
            validation,
        }
    }
}

impl<E> Clone for HostPaths<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for HostPaths<E> {}

impl<E> fmt::Debug for HostPaths<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostPaths")
            .field("standard", &(self.standard as *const ()))
            .field("validation", &(self.validation as *const ()))
            .finish()
    }
}

/// Delivery path bound to a context when it is built
///
/// There is no way to switch variants on an existing context, so every event
/// of a run takes the same path.
pub enum Delivery<E> {
    Standard(HostCallback<E>),
    Validation(HostCallback<E>),
}

impl<E> Delivery<E> {
    /// Pick the path for `mode` out of a pair of host entry points
    pub fn select(mode: DeliveryMode, paths: HostPaths<E>) -> Self {
        match mode {
            DeliveryMode::Standard => Delivery::Standard(paths.standard),
            DeliveryMode::Validation => Delivery::Validation(paths.validation),
        }
    }

    pub fn mode(&self) -> DeliveryMode {
        match self {
            Delivery::Standard(_) => DeliveryMode::Standard,
            Delivery::Validation(_) => DeliveryMode::Validation,
        }
    }

    pub fn callback(&self) -> HostCallback<E> {
        match self {
            Delivery::Standard(cb) | Delivery::Validation(cb) => *cb,
        }
    }
}

impl<E> Clone for Delivery<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Delivery<E> {}

impl<E> fmt::Debug for Delivery<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Delivery::{:?}({:p})", self.mode(), self.callback() as *const ())
    }
}

/// Engine context, host identity and delivery path for one compute run
///
/// `'h` is how long the host object behind the handle stays valid. Contexts
/// built with [`DispatchContext::for_host`] borrow the host for `'h`, so the
/// host cannot be dropped, moved or touched while the context exists.
#[repr(C)]
pub struct DispatchContext<'h, E> {
    /// Must stay the first field: the engine's pointer to it doubles as a
    /// pointer to the dispatch context
    engine: E,
    host: HostHandle,
    delivery: Delivery<E>,
    _host: PhantomData<&'h mut ()>,
}

impl<'h, E> DispatchContext<'h, E> {
    /// Build a context on the heap so the engine context keeps a stable
    /// address for the whole run
    ///
    /// # Safety
    /// The callback of `delivery` is called with `host` for every routed
    /// event. Whatever it does with the handle must be valid for `'h`: a
    /// callback that dereferences the handle needs it to point to a live
    /// object of the type it expects, with nothing else accessing it.
    pub unsafe fn new(engine: E, host: HostHandle, delivery: Delivery<E>) -> Box<Self> {
        log::debug!(
            "Dispatch context created: mode={}, host={:?}",
            delivery.mode(),
            host
        );
        Box::new(Self {
            engine,
            host,
            delivery,
            _host: PhantomData,
        })
    }

    /// Build a context that uses the path of `paths` matching `mode`
    ///
    /// Safe code goes through [`Self::for_host`] instead:
    ///
    /// ```compile_fail
    /// use recovery_bridge::{DeliveryMode, DispatchContext, HostHandle, HostPaths, RecordingHost};
    ///
    /// let paths = HostPaths::<u8>::for_host::<RecordingHost>();
    /// let ctx = DispatchContext::with_paths(0u8, HostHandle::null(), DeliveryMode::Standard, paths);
    /// ```
    ///
    /// # Safety
    /// Same as [`Self::new`], for both entry points of `paths`.
    pub unsafe fn with_paths(
        engine: E,
        host: HostHandle,
        mode: DeliveryMode,
        paths: HostPaths<E>,
    ) -> Box<Self> {
        Self::new(engine, host, Delivery::select(mode, paths))
    }

    /// The entry point to register with the engine alongside [`Self::engine_ptr`]
    pub fn event_handler() -> EngineEventFn<E> {
        router::event_entry::<E>
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Address of the embedded engine context, as handed to the engine
    pub fn engine_ptr(&mut self) -> *mut E {
        ptr::addr_of_mut!(self.engine)
    }

    pub fn host(&self) -> HostHandle {
        self.host
    }

    pub fn delivery(&self) -> Delivery<E> {
        self.delivery
    }

    pub fn mode(&self) -> DeliveryMode {
        self.delivery.mode()
    }

    /// True when events go to the validation path
    pub fn validation_mode(&self) -> bool {
        self.mode() == DeliveryMode::Validation
    }

    /// Route one event from Rust code holding the context directly
    pub fn dispatch(&mut self, event: Event<'_>) {
        let (buf, len) = event.as_raw_parts();
        // SAFETY: `self` is a live, exclusively borrowed context and the
        // payload slice outlives the call.
        unsafe { router::forward(self, event.id, buf, len) }
    }

    /// Recover the dispatch context from the engine-context pointer the
    /// engine hands back
    ///
    /// Only a cast: the result is valid exactly when `engine` came from
    /// [`Self::engine_ptr`] on a context that is still alive.
    pub fn from_engine_ptr(engine: *mut E) -> *mut Self {
        engine.cast()
    }

    /// Read the routing inputs through a raw context pointer without creating
    /// a reference that would overlap the engine's own pointer
    ///
    /// # Safety
    /// `ctx` must point to a live context.
    pub(crate) unsafe fn raw_parts(ctx: *mut Self) -> (*mut E, HostHandle, Delivery<E>) {
        (ptr::addr_of_mut!((*ctx).engine), (*ctx).host, (*ctx).delivery)
    }
}

impl<E: fmt::Debug> fmt::Debug for DispatchContext<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchContext")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("delivery", &self.delivery)
            .finish()
    }
}
