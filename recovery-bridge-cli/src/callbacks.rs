//! Host callbacks loaded from a shared library
//!
//! A host written in C (or anything exporting C symbols) provides the two
//! delivery entry points:
//!
//! ```c
//! void callback(uint32_t id, void *engine, void *host, const void *buf, size_t len);
//! void validatorCallback(uint32_t id, void *engine, void *host, const void *buf, size_t len);
//! ```

use crate::events::ReplayEngine;
use anyhow::Result;
use libloading::Library;
use recovery_bridge::{BridgeError, HostCallback, HostPaths};
use std::path::Path;

/// Host entry points resolved from a loaded library
///
/// The library stays loaded for as long as this value lives, which keeps the
/// resolved function pointers valid.
pub struct HostLibrary {
    paths: HostPaths<ReplayEngine>,
    _library: Library,
}

impl HostLibrary {
    /// Load `path` and resolve both delivery entry points
    pub fn load(path: &Path, standard_symbol: &str, validation_symbol: &str) -> Result<Self> {
        log::info!("Loading host library: {:?}", path);

        // SAFETY: loading runs the library's initialisers; the library is
        // trusted configuration input.
        let library = unsafe { Library::new(path) }
            .map_err(|e| BridgeError::HostLibrary(format!("failed to load {:?}: {}", path, e)))?;

        let standard = resolve(&library, standard_symbol)?;
        let validation = resolve(&library, validation_symbol)?;

        log::debug!(
            "Resolved host entry points '{}' and '{}'",
            standard_symbol,
            validation_symbol
        );

        Ok(Self {
            paths: HostPaths::new(standard, validation),
            _library: library,
        })
    }

    pub fn paths(&self) -> HostPaths<ReplayEngine> {
        self.paths
    }
}

fn resolve(library: &Library, symbol: &str) -> Result<HostCallback<ReplayEngine>> {
    // SAFETY: the symbol is declared with the host callback signature; a
    // library exporting it with another signature breaks the host contract.
    let callback = unsafe { library.get::<HostCallback<ReplayEngine>>(symbol.as_bytes()) }
        .map_err(|e| BridgeError::HostLibrary(format!("missing symbol '{}': {}", symbol, e)))?;
    Ok(*callback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_library_is_reported() {
        let result = HostLibrary::load(
            Path::new("/nonexistent/libhost-does-not-exist.so"),
            "callback",
            "validatorCallback",
        );
        let err = result.err().unwrap();
        assert!(err.to_string().contains("Host library error"));
    }
}
