//! Core types shared by the router, the argv reclaimer and the host adapters
//!
//! Nothing in here interprets event payloads. Event ids and payload bytes are
//! carried through unchanged; their meaning belongs to the host.

use chrono::{DateTime, Utc};
use std::ffi::c_void;
use std::fmt;

/// Timestamp type used for recorded deliveries
pub type Timestamp = DateTime<Utc>;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Numeric event classification, interpreted only by the host
pub type EventId = u32;

/// Errors raised by the checked forms of the bridge operations
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Dispatch context is null")]
    NullContext,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Argument {index} contains an interior NUL byte")]
    InteriorNul { index: usize },

    #[error("Too many arguments for a C argument vector: {0}")]
    TooManyArguments(usize),

    #[error("Shared path must be set")]
    MissingSharedPath,

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Host library error: {0}")]
    HostLibrary(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A single notification from the engine, borrowed for the duration of one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event<'a> {
    /// Classification code, forwarded even when unknown
    pub id: EventId,
    /// Payload bytes owned by the engine
    pub payload: &'a [u8],
}

impl<'a> Event<'a> {
    pub fn new(id: EventId, payload: &'a [u8]) -> Self {
        Self { id, payload }
    }

    /// Event with no payload
    pub fn empty(id: EventId) -> Self {
        Self { id, payload: &[] }
    }

    /// Raw `(buf, len)` pair as the engine would hand it over
    pub fn as_raw_parts(&self) -> (*const c_void, usize) {
        (self.payload.as_ptr().cast(), self.payload.len())
    }
}

/// Opaque token identifying the host-side object behind a dispatch context
///
/// The bridge copies it around and never looks behind it. Only host adapters
/// turn it back into a reference.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostHandle(*mut c_void);

impl HostHandle {
    /// A handle that refers to nothing, for hosts that keep no state
    pub const fn null() -> Self {
        Self(std::ptr::null_mut())
    }

    /// Wrap an address received from outside the bridge
    ///
    /// # Safety
    /// Host entry points paired with the handle will treat `ptr` as their
    /// host object. It must be valid for that use for as long as any context
    /// holds the handle.
    pub unsafe fn from_raw(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    /// Handle to a host object
    ///
    /// Taking the address is safe; only building a context from the handle
    /// requires the object to stay alive and in place.
    pub fn from_mut<T>(host: &mut T) -> Self {
        Self((host as *mut T).cast())
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostHandle({:p})", self.0)
    }
}

/// Which of the two host delivery paths a context uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Run-time telemetry, status and result events
    #[default]
    Standard,
    /// Events describe hash-validation outcomes
    Validation,
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryMode::Standard => write!(f, "standard"),
            DeliveryMode::Validation => write!(f, "validation"),
        }
    }
}
