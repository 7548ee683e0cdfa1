//! The crate's single error type, split along the fault taxonomy in the
//! design: configuration problems the caller can recover from, and engine
//! invariant violations that can only be reported to a fatal-abort callback.

use thiserror::Error;

/// Errors returned from fallible, caller-facing operations (registry
/// construction, RON parsing). Never produced by the streaming hot path.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("material '{0}' is not registered")]
    UnknownMaterial(String),

    #[error("material '{0}' is already registered")]
    DuplicateMaterial(String),

    #[error("block '{0}' is already registered")]
    DuplicateBlock(String),

    #[error("block face shorthand must have 1, 2, 3, or 6 entries, got {0}")]
    BadFaceShorthand(usize),

    #[error("block/material name must not be empty")]
    EmptyName,

    #[error("failed to read directory '{dir}': {source}")]
    Io {
        dir: String,
        #[source]
        source: std::io::Error,
    },
}

/// A violated core invariant (circle slot reuse, neighbor counter out of
/// range, equi-level mismatch when debug checks are enabled). These are bugs,
/// not user input problems; they are constructed only at `debug_assert!`
/// sites and handed to the Timing harness's fatal-abort callback rather than
/// propagated with `?`.
#[derive(Debug, Error)]
#[error("engine invariant violated: {message}")]
pub struct EngineFault {
    pub message: String,
}

impl EngineFault {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Top-level error returned from the public API.
#[derive(Debug, Error)]
pub enum StratumError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineFault),
}
