//! Recovery Bridge Library
//!
//! Callback-dispatch bridge between a native password-recovery engine and the
//! host process driving it.
//!
//! # Architecture
//!
//! The library covers two things and nothing more:
//! - Routing every engine notification to one of two host delivery paths
//!   (standard run-time events, or hash-validation results), chosen once
//!   when the dispatch context is built
//! - Releasing `char **` argument vectors handed across the boundary
//!
//! The library does NOT:
//! - Interpret event payloads
//! - Implement hashing or cracking
//! - Drive the engine's lifecycle
//!
//! Replaying events and loading host callbacks from a shared library live in
//! the application layer (recovery-bridge-cli).
//!
//! # Example Usage
//!
//! ```
//! use recovery_bridge::{DeliveryMode, DispatchContext, Event, RecordingHost};
//!
//! struct EngineState {
//!     words_done: u64,
//! }
//!
//! let mut host = RecordingHost::new();
//! let mut ctx = DispatchContext::for_host(
//!     EngineState { words_done: 0 },
//!     &mut host,
//!     DeliveryMode::Standard,
//! );
//!
//! // A native engine would be given these two and call the handler itself
//! let handler = DispatchContext::<EngineState>::event_handler();
//! let engine = ctx.engine_ptr();
//! let payload = b"status";
//! unsafe { handler(7, engine, payload.as_ptr().cast(), payload.len()) };
//!
//! ctx.dispatch(Event::new(8, b"more"));
//! drop(ctx);
//!
//! assert_eq!(host.records().len(), 2);
//! ```

// Public modules
pub mod argv;
pub mod config;
pub mod context;
pub mod host;
pub mod router;
pub mod types;

// Re-export main types for convenience
pub use argv::{freeargv, release_argv, try_release_argv, OwnedArgv};
pub use config::EngineOptions;
pub use context::{Delivery, DispatchContext, EngineEventFn, HostCallback, HostPaths};
pub use host::{DeliveryRecord, Host, RecordingHost, ValidationCollector, ValidationResult};
pub use router::{event_entry, route_event};
pub use types::{BridgeError, DeliveryMode, Event, EventId, HostHandle, Result, Timestamp};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
