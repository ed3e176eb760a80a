//! Privilege & Identity Guard.
//!
//! No retries: both failure modes here are fatal and reported before any
//! other resource (the control channel, loaded services) is acquired.

use nix::unistd::{Gid, Group, Uid};

use crate::error::{Result, SupervisorError};

/// Verify the process is running with effective uid 0 and that
/// `group_name` resolves to a real group, returning its gid.
pub fn ensure_ready(group_name: &str) -> Result<Gid> {
    if !Uid::effective().is_root() {
        return Err(SupervisorError::NotPrivileged);
    }

    let group = Group::from_name(group_name)
        .map_err(SupervisorError::Nix)?
        .ok_or_else(|| SupervisorError::MissingGroup(group_name.to_string()))?;

    Ok(group.gid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_group_is_distinguishable_from_not_privileged() {
        // We can't flip euid in a unit test, but we can confirm the two
        // failure variants are structurally distinct so callers branch on
        // them correctly.
        let not_privileged = SupervisorError::NotPrivileged;
        let missing_group = SupervisorError::MissingGroup("service".into());
        assert_ne!(format!("{not_privileged}"), format!("{missing_group}"));
    }
}
