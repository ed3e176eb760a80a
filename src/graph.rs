//! Graph Resolver: turns dependency names into indices and checks for cycles.

use std::collections::HashMap;

use tracing::warn;

use crate::error::{Result, SupervisorError};
use crate::service::Service;

/// Resolve every `dep_names` entry of every service to an index into
/// `services`, by exact `name` match first, then by `provides` match
/// (first Script service, in loaded order, whose provides set contains
/// the name). The provides lookup is attempted against every kind; it is
/// simply empty for anything but Script. Unresolved names become `None`
/// and are logged, not fatal.
pub fn resolve(services: &mut [Service]) {
    let by_name: HashMap<String, usize> = services
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.clone(), i))
        .collect();

    let mut by_provide: HashMap<String, usize> = HashMap::new();
    for (i, s) in services.iter().enumerate() {
        for provided in s.provides() {
            by_provide.entry(provided.clone()).or_insert(i);
        }
    }

    for i in 0..services.len() {
        let dep_names = services[i].dep_names.clone();
        let mut resolved = Vec::with_capacity(dep_names.len());
        for dep_name in &dep_names {
            let found = by_name
                .get(dep_name)
                .or_else(|| by_provide.get(dep_name))
                .copied();
            if found.is_none() {
                warn!(
                    service = %services[i].name,
                    dependency = %dep_name,
                    "unresolved dependency treated as immediately satisfied"
                );
            }
            resolved.push(found);
        }
        services[i].deps = resolved;
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// Depth-first traversal with a single per-node "on current path" mark,
/// started independently from every service to catch disconnected
/// components. Unresolved dependency entries are skipped.
pub fn check_acyclic(services: &[Service]) -> Result<()> {
    let mut marks = vec![Mark::Unvisited; services.len()];

    for start in 0..services.len() {
        if marks[start] == Mark::Unvisited {
            visit(services, &mut marks, start)?;
        }
    }
    Ok(())
}

fn visit(services: &[Service], marks: &mut [Mark], node: usize) -> Result<()> {
    marks[node] = Mark::OnPath;
    for dep in services[node].deps.iter().flatten() {
        match marks[*dep] {
            Mark::OnPath => {
                return Err(SupervisorError::CircularDependency(
                    services[*dep].name.clone(),
                ));
            }
            Mark::Unvisited => visit(services, marks, *dep)?,
            Mark::Done => {}
        }
    }
    marks[node] = Mark::Done;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{KindData, ScriptData, ServiceKind};

    fn script(name: &str, requires: &[&str], provides: &[&str]) -> Service {
        let mut svc = Service::new(ServiceKind::Script, name.into(), format!("/rc.d/{name}").into());
        svc.dep_names = requires.iter().map(|s| s.to_string()).collect();
        svc.kind_data = KindData::Script(ScriptData {
            provides: provides.iter().map(|s| s.to_string()).collect(),
        });
        svc
    }

    #[test]
    fn linear_chain_resolves_in_order() {
        let mut services = vec![
            script("a", &[], &[]),
            script("b", &["a"], &[]),
            script("c", &["b"], &[]),
        ];
        resolve(&mut services);
        assert_eq!(services[1].deps, vec![Some(0)]);
        assert_eq!(services[2].deps, vec![Some(1)]);
        check_acyclic(&services).unwrap();
    }

    #[test]
    fn provides_aliasing_resolves_by_provide_set() {
        let mut services = vec![script("netsvc", &[], &["network"]), script("webapp", &["network"], &[])];
        resolve(&mut services);
        assert_eq!(services[1].deps, vec![Some(0)]);
    }

    #[test]
    fn unresolved_dependency_is_none_not_fatal() {
        let mut services = vec![script("lonely", &["ghost"], &[])];
        resolve(&mut services);
        assert_eq!(services[0].deps, vec![None]);
        check_acyclic(&services).unwrap();
    }

    #[test]
    fn cycle_is_detected() {
        let mut services = vec![script("x", &["y"], &[]), script("y", &["x"], &[])];
        resolve(&mut services);
        let err = check_acyclic(&services).unwrap_err();
        assert!(matches!(err, SupervisorError::CircularDependency(_)));
    }

    #[test]
    fn diamond_resolves_without_cycle() {
        let mut services = vec![
            script("root", &[], &[]),
            script("left", &["root"], &[]),
            script("right", &["root"], &[]),
            script("join", &["left", "right"], &[]),
        ];
        resolve(&mut services);
        check_acyclic(&services).unwrap();
        assert_eq!(services[3].deps, vec![Some(1), Some(2)]);
    }
}
