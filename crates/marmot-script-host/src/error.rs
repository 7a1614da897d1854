use std::path::PathBuf;

use thiserror::Error;

use crate::info::ScriptKind;

/// Errors surfaced by the script host at the manager boundary.
///
/// Nothing in this enum is allowed to escape into the simulation's tick
/// loop; the manager converts engine failures into `ExecutionFault` and
/// tears the instance down itself.
#[derive(Debug, Error)]
pub enum ScriptHostError {
    /// The configured script (or a library it needs) could not be resolved.
    #[error("no {kind} named '{name}' (version {}) is available", .version.map_or_else(|| "any".to_string(), |v| v.to_string()))]
    ResolutionFailed {
        kind: ScriptKind,
        name: String,
        version: Option<u32>,
    },

    /// An unrecoverable error inside the running script.
    #[error("script execution fault: {0}")]
    ExecutionFault(String),

    /// A save references a script that is not available locally.
    #[error("save references {kind} '{name}' version {version}, which is not available locally")]
    SaveMismatch {
        kind: ScriptKind,
        name: String,
        version: u32,
    },

    /// The scanner could not walk its script directory.
    #[error("failed to scan {}: {source}", .dir.display())]
    ScanFailed {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading or writing the persisted host configuration failed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The engine factory refused to build an execution context.
    #[error("failed to construct an engine for '{name}': {reason}")]
    EngineConstruction { name: String, reason: String },
}

/// A fatal fault raised by a script engine.
///
/// Engines have no recoverable error channel by design: anything they
/// cannot handle internally ends the instance.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct EngineFault {
    message: String,
}

impl EngineFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
