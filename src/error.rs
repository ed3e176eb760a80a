//! Error taxonomy.
//!
//! `Fatal` variants are surfaced by `main` as a diagnostic and a non-zero
//! exit; everything else is logged as a warning at the call site that can
//! legally recover, and execution continues.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("effective user is not privileged (uid 0 required)")]
    NotPrivileged,

    #[error("supervisory group {0:?} does not exist")]
    MissingGroup(String),

    #[error("control channel {0:?} already exists — another supervisor is running")]
    AlreadyRunning(String),

    #[error("failed to set up control channel {path:?}: {source}")]
    ChannelSetupFailed { path: String, source: nix::Error },

    #[error("failed to open services directory {0:?}: {1}")]
    DirOpenFailed(PathBuf, std::io::Error),

    #[error("script {path:?} has mode {observed:o}, expected {expected:o}")]
    BadScriptPerms {
        path: PathBuf,
        observed: u32,
        expected: u32,
    },

    #[error("failed to parse {path:?}: {reason}")]
    ParseFailed { path: PathBuf, reason: String },

    #[error("module {path:?} is missing required symbol {symbol:?}")]
    ModuleSymbolMissing { path: PathBuf, symbol: &'static str },

    #[error("service {service:?} depends on unresolved name {dep:?}")]
    UnresolvedDependency { service: String, dep: String },

    #[error("circular dependency detected, first observed re-entering {0:?}")]
    CircularDependency(String),

    #[error("service {name:?} ({path:?}) exited with status {status}")]
    ServiceFailedAtRuntime {
        name: String,
        path: PathBuf,
        status: i32,
    },

    #[error("control channel receive error: {0}")]
    ControlChannelReceiveError(nix::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Nix(#[from] nix::Error),
}

impl SupervisorError {
    /// `true` for every variant that should abort the supervisor; `false`
    /// for the warn-and-continue ones.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SupervisorError::NotPrivileged
                | SupervisorError::MissingGroup(_)
                | SupervisorError::AlreadyRunning(_)
                | SupervisorError::ChannelSetupFailed { .. }
                | SupervisorError::DirOpenFailed(..)
                | SupervisorError::BadScriptPerms { .. }
                | SupervisorError::CircularDependency(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
