//! Executor body: runs a service inside a forked child.
//!
//! Each eligible service is run in a freshly forked child. The window
//! between `fork()` and `exec()`/`_exit()` does only async-signal-safe
//! work (no allocation beyond what was prepared before the fork): this
//! supervisor forks from one thread of many, so the child must assume
//! every lock an allocator might hold in another thread is unavailable
//! to it until exec/_exit (see DESIGN.md).

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::path::Path;
use std::ptr;

use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult};

use crate::error::{Result, SupervisorError};
use crate::service::{KindData, Service, ServiceKind};

const RC_SUBR_SOURCE: &str = ". /etc/rc.subr && run_rc_script";

/// Fork, run the service body in the child, and collect its exit status
/// in the parent. Returns the observed exit status; a non-zero status is
/// not propagated to dependents — they proceed regardless.
pub fn run(service: &Service) -> Result<i32> {
    // Build everything the child needs before forking. The argv CStrings
    // own the bytes `argv_ptrs` points into, and the null-terminated
    // pointer table itself is built here too: `nix::unistd::execv` builds
    // that table with its own `.collect()` on every call, which would be
    // an allocation inside the child. Building it ourselves beforehand and
    // calling `libc::execv` directly means the child touches the allocator
    // exactly zero times between fork and exec/_exit.
    let shell = CString::new("/bin/sh").unwrap();
    let argv_cstrings = match service.kind {
        ServiceKind::Script => script_argv(&service.source_path),
        ServiceKind::Module | ServiceKind::Generic => Vec::new(),
    };
    let mut argv_ptrs: Vec<*const c_char> = argv_cstrings.iter().map(|c| c.as_ptr()).collect();
    argv_ptrs.push(ptr::null());

    // SAFETY: this thread holds no locks it will touch again before
    // exec/_exit in the child; see the module doc comment.
    match unsafe { fork() }.map_err(SupervisorError::Nix)? {
        ForkResult::Child => {
            let status = match service.kind {
                ServiceKind::Script => exec_script(&shell, &argv_ptrs),
                ServiceKind::Module => run_module(service),
                ServiceKind::Generic => 1,
            };
            // _exit, not std::process::exit: skip atexit handlers / Rust
            // destructors that assume the parent's full runtime state.
            unsafe { libc::_exit(status) };
        }
        ForkResult::Parent { child } => {
            let status = match waitpid(child, None).map_err(SupervisorError::Nix)? {
                WaitStatus::Exited(_, code) => code,
                WaitStatus::Signaled(_, signal, _) => 128 + signal as i32,
                _ => 1,
            };
            Ok(status)
        }
    }
}

fn script_argv(path: &Path) -> Vec<CString> {
    let shell = CString::new("sh").unwrap();
    let dash_c = CString::new("-c").unwrap();
    let command = format!(
        "{RC_SUBR_SOURCE} {} faststart",
        path.to_string_lossy()
    );
    let command = CString::new(command).unwrap();
    vec![shell, dash_c, command]
}

/// Never returns on success; `exec` replaces the child image. Calls
/// `libc::execv` directly rather than `nix::unistd::execv`, which
/// allocates its own null-terminated pointer array on every call — not
/// safe to do between fork and exec in a multi-threaded process.
fn exec_script(shell: &CStr, argv: &[*const c_char]) -> i32 {
    unsafe { libc::execv(shell.as_ptr(), argv.as_ptr()) };
    127
}

fn run_module(service: &Service) -> i32 {
    match &service.kind_data {
        KindData::Module(data) => {
            // SAFETY: `start` was resolved at parse time and the
            // `Library` that owns it is kept alive by `service`.
            unsafe { (data.start)() }
        }
        _ => 1,
    }
}
