//! The central data model.
//!
//! Dependency edges are stored as indices into the owning `Vec<Service>`
//! rather than as references or `Rc`s: the set of services is built once
//! by the Loader, resolved once by the Graph Resolver, and is immutable
//! once the Scheduler starts launching, so a plain index arena is both
//! sufficient and avoids fighting the borrow checker over a graph with
//! legitimate sharing (many services may depend on the same one).

use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceKind {
    Generic,
    Script,
    Module,
}

/// Independent boolean flags. Defaults: `on_start = true`, all others
/// `false`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Flags {
    pub on_start: bool,
    pub on_stop: bool,
    pub on_resume: bool,
    pub first_boot: bool,
    pub disable_in_jail: bool,
    pub disable_in_vnet_jail: bool,
}

impl Default for Flags {
    fn default() -> Self {
        Self {
            on_start: true,
            on_stop: false,
            on_resume: false,
            first_boot: false,
            disable_in_jail: false,
            disable_in_vnet_jail: false,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ScriptData {
    pub provides: Vec<String>,
}

/// A loaded module's symbols, resolved once by the Module Parser.
///
/// The `Library` handle is kept alive for the lifetime of the `Service` so
/// the resolved `start` entry point remains valid; it is dropped (closing
/// the object) when the `Service` set is torn down.
pub struct ModuleData {
    pub library: libloading::Library,
    /// Raw pointer to the resolved `start` symbol. Stored as a function
    /// pointer rather than a `Symbol<'_>` borrow so `ModuleData` does not
    /// need a self-referential lifetime; validity is guaranteed by holding
    /// `library` alongside it.
    pub start: unsafe extern "C" fn() -> i32,
}

impl std::fmt::Debug for ModuleData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleData").finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub enum KindData {
    None,
    Script(ScriptData),
    Module(ModuleData),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Waiting,
    Running,
    Completed,
    Skipped,
}

impl Default for RunState {
    fn default() -> Self {
        RunState::Pending
    }
}

pub struct Service {
    pub kind: ServiceKind,
    pub name: String,
    pub source_path: PathBuf,
    pub dep_names: Vec<String>,
    /// Resolved by the Graph Resolver; `None` entries are unresolved
    /// dependencies, `Some(i)` indexes back into the owning `Vec<Service>`.
    pub deps: Vec<Option<usize>>,
    pub flags: Flags,
    pub kind_data: KindData,
}

impl Service {
    pub fn new(kind: ServiceKind, name: String, source_path: PathBuf) -> Self {
        Self {
            kind,
            name,
            source_path,
            dep_names: Vec::new(),
            deps: Vec::new(),
            flags: Flags::default(),
            kind_data: KindData::None,
        }
    }

    /// Eligible iff `on_start` and not `first_boot`.
    pub fn eligible(&self) -> bool {
        self.flags.on_start && !self.flags.first_boot
    }

    pub fn provides(&self) -> &[String] {
        match &self.kind_data {
            KindData::Script(data) => &data.provides,
            _ => &[],
        }
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("source_path", &self.source_path)
            .field("dep_names", &self.dep_names)
            .field("deps", &self.deps)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}
