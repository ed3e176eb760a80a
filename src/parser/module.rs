//! Module Parser.
//!
//! Opens the service file as a dynamically loadable native object with
//! eager symbol resolution (`RTLD_NOW`), so a module with unresolved
//! symbols fails at load time rather than mid-boot. Three symbols are
//! required: `start`, `get_deps_len`, `get_dep_names`. Each of the six
//! Service flags is set by symbol *presence*, not by reading any value
//! behind it — fragile, but that's the contract modules are written
//! against.

use std::ffi::CStr;
use std::os::raw::{c_char, c_uint};
use std::path::Path;

use libloading::os::unix::{Library, Symbol, RTLD_GLOBAL, RTLD_NOW};

use crate::error::{Result, SupervisorError};
use crate::service::{KindData, ModuleData, Service};

type StartFn = unsafe extern "C" fn() -> i32;
type DepsLenFn = unsafe extern "C" fn() -> c_uint;
type DepNamesFn = unsafe extern "C" fn() -> *const *const c_char;

const FLAG_SYMBOLS: &[(&str, fn(&mut Service))] = &[
    ("on_start", |s| s.flags.on_start = true),
    ("on_stop", |s| s.flags.on_stop = true),
    ("on_resume", |s| s.flags.on_resume = true),
    ("first_boot", |s| s.flags.first_boot = true),
    ("disable_in_jail", |s| s.flags.disable_in_jail = true),
    ("disable_in_vnet_jail", |s| s.flags.disable_in_vnet_jail = true),
];

pub fn parse(path: &Path, service: &mut Service) -> Result<()> {
    // SAFETY: RTLD_NOW forces eager resolution of all undefined symbols at
    // load time, surfacing link errors immediately instead of on first
    // call into the module. RTLD_GLOBAL lets later modules in the same
    // process see these symbols, mirroring typical service-module linkage.
    let library = unsafe { Library::open(Some(path), RTLD_NOW | RTLD_GLOBAL) }.map_err(|e| {
        SupervisorError::ParseFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    let start = required_symbol::<StartFn>(&library, path, "start")?;
    let get_deps_len = required_symbol::<DepsLenFn>(&library, path, "get_deps_len")?;
    let get_dep_names = required_symbol::<DepNamesFn>(&library, path, "get_dep_names")?;

    // SAFETY: the module contract guarantees `get_deps_len()` returns a
    // count matching the array `get_dep_names()` returns; both are
    // required symbols we just verified exist.
    let dep_names = unsafe {
        let len = get_deps_len() as usize;
        let ptr = get_dep_names();
        if ptr.is_null() && len > 0 {
            return Err(SupervisorError::ModuleSymbolMissing {
                path: path.to_path_buf(),
                symbol: "get_dep_names",
            });
        }
        let mut names = Vec::with_capacity(len);
        for i in 0..len {
            let entry = *ptr.add(i);
            if entry.is_null() {
                continue;
            }
            if let Ok(s) = CStr::from_ptr(entry).to_str() {
                names.push(s.to_string());
            }
        }
        names
    };

    service.dep_names = dep_names;

    for (symbol, apply) in FLAG_SYMBOLS {
        // SAFETY: a symbol lookup that returns Ok means the dynamic
        // linker resolved the name against the loaded object; we never
        // call through it, only test for its existence.
        let present = unsafe { library.get::<*const ()>(symbol.as_bytes()) }.is_ok();
        if present {
            apply(service);
        }
    }

    service.kind_data = KindData::Module(ModuleData {
        library: library.into(),
        start,
    });

    Ok(())
}

fn required_symbol<T: Copy>(
    library: &Library,
    path: &Path,
    name: &'static str,
) -> Result<T> {
    // SAFETY: caller guarantees `T` matches the C signature exported under
    // `name`; this mirrors every other dlsym-based plugin-host pattern in
    // the ecosystem (see DESIGN.md).
    unsafe { library.get::<T>(name.as_bytes()) }
        .map(|sym: Symbol<T>| *sym)
        .map_err(|_| SupervisorError::ModuleSymbolMissing {
            path: path.to_path_buf(),
            symbol: name,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_a_parse_failure() {
        let mut svc = Service::new(
            crate::service::ServiceKind::Module,
            "nope".into(),
            "/nonexistent/path/to/module.so".into(),
        );
        let err = parse(Path::new("/nonexistent/path/to/module.so"), &mut svc).unwrap_err();
        assert!(matches!(err, SupervisorError::ParseFailed { .. }));
    }
}
