//! Engine options
//!
//! The few settings a host needs before it can pair an engine run with a
//! dispatch context: where the engine keeps its shared files, where its
//! executable lives, and which delivery path the run uses.

use crate::argv::OwnedArgv;
use crate::types::{BridgeError, DeliveryMode, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Options for one engine instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineOptions {
    /// Directory holding the engine's kernels and tuning files
    #[serde(default)]
    pub shared_path: PathBuf,

    /// Directory of the engine executable (not the binary itself).
    /// Defaults to the directory of the running executable.
    #[serde(default)]
    pub executable_path: Option<PathBuf>,

    /// Delivery path for every event of a run
    #[serde(default)]
    pub mode: DeliveryMode,
}

impl EngineOptions {
    /// Create options with the given shared path and default settings
    pub fn new(shared_path: impl Into<PathBuf>) -> Self {
        Self {
            shared_path: shared_path.into(),
            ..Self::default()
        }
    }

    /// Builder method: set the executable directory
    pub fn with_executable_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable_path = Some(path.into());
        self
    }

    /// Builder method: set the delivery mode
    pub fn with_mode(mut self, mode: DeliveryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Check the options and fill in the executable directory if missing
    pub fn validate(&mut self) -> Result<()> {
        if self.shared_path.as_os_str().is_empty() {
            return Err(BridgeError::MissingSharedPath);
        }

        match &self.executable_path {
            Some(path) => {
                if !path.exists() {
                    return Err(BridgeError::InvalidPath(format!(
                        "executable path not found: {:?}",
                        path
                    )));
                }
            }
            None => {
                let exe = std::env::current_exe()?;
                let dir = exe.parent().map(Path::to_path_buf).ok_or_else(|| {
                    BridgeError::InvalidPath(format!("executable has no parent directory: {:?}", exe))
                })?;
                log::debug!("Executable path defaulted to {:?}", dir);
                self.executable_path = Some(dir);
            }
        }

        Ok(())
    }

    /// Argument vector for a session: the executable path, then `args`
    pub fn session_argv<I, S>(&self, args: I) -> Result<OwnedArgv>
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        let program = self.executable_path.as_deref().unwrap_or_else(|| Path::new(""));
        let program = program.to_str().ok_or_else(|| {
            BridgeError::InvalidPath(format!("Invalid UTF-8 in path: {:?}", program))
        })?;

        OwnedArgv::with_program(program, args)
    }
}
