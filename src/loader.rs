//! Service Loader: scans source directories into `Service` records.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::SCRIPT_MODE;
use crate::error::{Result, SupervisorError};
use crate::parser;
use crate::service::{Service, ServiceKind};

/// One `(directory, kind)` pair the Loader scans, in order.
pub struct SourceDir<'a> {
    pub path: &'a Path,
    pub kind: ServiceKind,
}

/// Scan every `SourceDir`, constructing a `Service` per regular file and
/// dispatching to the kind-specific parser. Entries whose name begins
/// with `.` are skipped; directory entries are sorted lexicographically
/// first so the returned order is stable across identical directory
/// states so a directory's diagnostics reproduce run to run.
pub fn load_all(dirs: &[SourceDir<'_>]) -> Result<Vec<Service>> {
    let mut services = Vec::new();

    for dir in dirs {
        let mut names = read_sorted_regular_files(dir.path)?;
        names.sort();

        for path in names {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            if file_name.starts_with('.') {
                continue;
            }

            match dir.kind {
                ServiceKind::Script => {
                    if let Err(e) = check_script_perms(&path) {
                        return Err(e);
                    }
                }
                _ => {}
            }

            let name = file_name.to_string();
            let mut service = Service::new(dir.kind, name, path.clone());

            let parsed = match dir.kind {
                ServiceKind::Script => parser::script::parse(&path, &mut service),
                ServiceKind::Module => parser::module::parse(&path, &mut service),
                ServiceKind::Generic => Ok(()),
            };

            match parsed {
                Ok(()) => services.push(service),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "discarding unparseable service");
                }
            }
        }
    }

    Ok(services)
}

fn read_sorted_regular_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| SupervisorError::DirOpenFailed(dir.into(), e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SupervisorError::DirOpenFailed(dir.into(), e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| SupervisorError::DirOpenFailed(dir.into(), e))?;
        if file_type.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn check_script_perms(path: &Path) -> Result<()> {
    let meta = fs::metadata(path).map_err(SupervisorError::Io)?;
    let observed = meta.permissions().mode() & 0o7777;
    if observed != SCRIPT_MODE {
        return Err(SupervisorError::BadScriptPerms {
            path: path.to_path_buf(),
            observed,
            expected: SCRIPT_MODE,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn dotfiles_are_skipped_and_order_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        for name in [".hidden", "zzz", "aaa", "mmm"] {
            let path = dir.path().join(name);
            let mut f = fs::File::create(&path).unwrap();
            writeln!(f, "# REQUIRE:").unwrap();
            f.set_permissions(fs::Permissions::from_mode(SCRIPT_MODE))
                .unwrap();
        }

        let services = load_all(&[SourceDir {
            path: dir.path(),
            kind: ServiceKind::Script,
        }])
        .unwrap();

        let names: Vec<_> = services.iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, vec!["aaa", "mmm", "zzz"]);
    }

    #[test]
    fn bad_perms_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svc");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "# REQUIRE:").unwrap();
        f.set_permissions(fs::Permissions::from_mode(0o755)).unwrap();

        let err = load_all(&[SourceDir {
            path: dir.path(),
            kind: ServiceKind::Script,
        }])
        .unwrap_err();
        assert!(matches!(err, SupervisorError::BadScriptPerms { .. }));
    }

    #[test]
    fn unparseable_service_is_discarded_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unreadable_but_present");
        fs::create_dir(dir.path().join("sub")).unwrap(); // directory, not a regular file
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "# KEYWORD: bogus_keyword_nobody_recognizes").unwrap();
        f.set_permissions(fs::Permissions::from_mode(SCRIPT_MODE))
            .unwrap();

        let services = load_all(&[SourceDir {
            path: dir.path(),
            kind: ServiceKind::Script,
        }])
        .unwrap();
        // The directory entry is skipped (not a regular file); the script
        // loads fine with default flags despite the unknown keyword.
        assert_eq!(services.len(), 1);
    }
}
