//! Post-boot Loop.
//!
//! Runs once every startup-eligible service has been joined. Command
//! dispatch itself is out of scope — this loop's contract is only to
//! keep draining the Control Channel and tolerate whatever comes back,
//! forever.

use tracing::{debug, warn};

use crate::channel::ControlChannel;

pub fn run(channel: &mut ControlChannel) -> ! {
    loop {
        match channel.receive() {
            Ok(payload) => {
                debug!(bytes = payload.len(), "received control channel message");
                // Wire format / command grammar is future work.
            }
            Err(e) => {
                warn!(error = %e, "control channel receive error");
            }
        }
    }
}
