//! `svcinitctl` — minimal control-channel client.
//!
//! No command grammar is defined; this binary is intentionally thin. It
//! joins its arguments with a space, sends the bytes as-is to the
//! running supervisor's queue, and exits. Anything beyond that is future
//! work for whoever defines the wire format.

use std::process::ExitCode;

use svcinit::channel::ControlChannel;
use svcinit::config::DEFAULT_QUEUE_NAME;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("usage: svcinitctl <payload...>");
        return ExitCode::FAILURE;
    }

    let queue_name =
        std::env::var("SVCINIT_QUEUE_NAME").unwrap_or_else(|_| DEFAULT_QUEUE_NAME.to_string());
    let payload = args.join(" ");

    match ControlChannel::send(&queue_name, payload.as_bytes()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
