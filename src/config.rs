//! Configuration.
//!
//! Every path and name this supervisor touches has a hardcoded default.
//! Those values live here; each can be overridden by an environment
//! variable so tests (and, in principle, a packager) can point the Loader
//! and Control Channel somewhere other than the real filesystem roots.
//! Production behavior with no environment overrides uses the defaults
//! as-is.

use std::path::PathBuf;

pub const DEFAULT_MODULE_DIR: &str = "/etc/init/services";
pub const DEFAULT_SCRIPT_DIR: &str = "/etc/rc.d";
pub const DEFAULT_QUEUE_NAME: &str = "/init";
pub const DEFAULT_GROUP: &str = "service";

/// Octal 0555: r-xr-xr-x. Script services must have exactly this mode.
pub const SCRIPT_MODE: u32 = 0o555;
/// Octal 0420: owner read, group write, others neither.
pub const QUEUE_MODE: u32 = 0o420;

pub const QUEUE_MAX_MESSAGES: i64 = 10;
pub const QUEUE_MESSAGE_SIZE: i64 = 256;

#[derive(Clone, Debug)]
pub struct Config {
    pub module_dir: PathBuf,
    pub script_dir: PathBuf,
    pub queue_name: String,
    pub group_name: String,
    pub verbose: bool,
}

impl Config {
    pub fn from_env(verbose: bool) -> Self {
        Self {
            module_dir: std::env::var_os("SVCINIT_MODULE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODULE_DIR)),
            script_dir: std::env::var_os("SVCINIT_SCRIPT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRIPT_DIR)),
            queue_name: std::env::var("SVCINIT_QUEUE_NAME")
                .unwrap_or_else(|_| DEFAULT_QUEUE_NAME.to_string()),
            group_name: std::env::var("SVCINIT_GROUP").unwrap_or_else(|_| DEFAULT_GROUP.to_string()),
            verbose,
        }
    }
}

#[cfg(test)]
impl Default for Config {
    fn default() -> Self {
        Self {
            module_dir: PathBuf::from(DEFAULT_MODULE_DIR),
            script_dir: PathBuf::from(DEFAULT_SCRIPT_DIR),
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            group_name: DEFAULT_GROUP.to_string(),
            verbose: false,
        }
    }
}
