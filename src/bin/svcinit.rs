//! `svcinit` — the service supervisor binary.
//!
//! Recognizes exactly one argument, `--verbose`; anything else terminates
//! the program with a clear error. Exit code 0 on clean boot completion,
//! non-zero on any fatal condition.

use std::process::ExitCode;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use svcinit::channel::ControlChannel;
use svcinit::clock::Clock;
use svcinit::config::{Config, QUEUE_MODE};
use svcinit::error::SupervisorError;
use svcinit::graph;
use svcinit::loader::{self, SourceDir};
use svcinit::postboot;
use svcinit::privilege;
use svcinit::scheduler;
use svcinit::service::ServiceKind;

fn parse_args() -> Result<bool, String> {
    let mut verbose = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--verbose" => verbose = true,
            other => return Err(format!("unrecognized argument: {other:?}")),
        }
    }
    Ok(verbose)
}

fn main() -> ExitCode {
    let verbose = match parse_args() {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("error: {msg}");
            return ExitCode::FAILURE;
        }
    };

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env(verbose);

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_fatal() => {
            error!(error = %e, "fatal: supervisor cannot continue");
            ExitCode::FAILURE
        }
        Err(e) => {
            warn!(error = %e, "supervisor exiting after non-fatal error");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<(), SupervisorError> {
    let clock = Clock::start();

    let group_gid = privilege::ensure_ready(&config.group_name)?;

    let mut channel = ControlChannel::acquire(
        &config.queue_name,
        QUEUE_MODE,
        nix::unistd::Uid::from_raw(0),
        group_gid,
    )?;

    let dirs = [
        SourceDir {
            path: &config.module_dir,
            kind: ServiceKind::Module,
        },
        SourceDir {
            path: &config.script_dir,
            kind: ServiceKind::Script,
        },
    ];
    let mut services = loader::load_all(&dirs)?;

    graph::resolve(&mut services);
    graph::check_acyclic(&services)?;

    info!(count = services.len(), "starting boot");
    let report = scheduler::run(&services, &clock);

    info!(elapsed = ?report.total_elapsed, "boot complete");
    if let Some((name, duration)) = &report.longest {
        info!(service = %name, duration = ?duration, "longest-running service");
    }

    postboot::run(&mut channel)
}
