//! Scheduler / Executor.
//!
//! One OS thread per eligible service. `Readiness` is the one-shot
//! completion signal described in the glossary as the readiness lock —
//! a dependent blocks on it once and then proceeds unblocked forever
//! after.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::clock::Clock;
use crate::error::{Result, SupervisorError};
use crate::executor;
use crate::service::{RunState, Service};

/// How `task` runs a service's body. Production code always passes
/// `executor::run` (fork + exec/module-call); tests substitute a function
/// that does neither, so the scheduler's ordering logic is exercised
/// without forking a real child.
pub type Runner = fn(&Service) -> Result<i32>;

struct Readiness {
    released: Mutex<bool>,
    cvar: Condvar,
}

impl Readiness {
    fn new() -> Self {
        Self {
            released: Mutex::new(false),
            cvar: Condvar::new(),
        }
    }

    fn release(&self) {
        let mut released = self.released.lock().unwrap();
        *released = true;
        self.cvar.notify_all();
    }

    fn wait(&self) {
        let mut released = self.released.lock().unwrap();
        while !*released {
            released = self.cvar.wait(released).unwrap();
        }
    }
}

#[derive(Default)]
pub struct Outcome {
    pub run_state: RunState,
    pub start_instant: Option<Instant>,
    pub total_duration: Option<Duration>,
    pub exit_status: Option<i32>,
}

pub struct Report {
    pub total_elapsed: Duration,
    pub longest: Option<(String, Duration)>,
    pub outcomes: Vec<Outcome>,
}

/// Launch every eligible service, respecting the dependency partial
/// order, and wait for all of them to finish. Non-eligible services are
/// marked `Skipped` and their readiness is released immediately so
/// dependents don't wait on a service that was never going to start.
pub fn run(services: &[Service], clock: &Clock) -> Report {
    run_with(services, clock, executor::run)
}

fn run_with(services: &[Service], clock: &Clock, runner: Runner) -> Report {
    let n = services.len();
    let readiness: Vec<Readiness> = (0..n).map(|_| Readiness::new()).collect();
    let outcomes: Vec<Mutex<Outcome>> = (0..n).map(|_| Mutex::new(Outcome::default())).collect();
    let dispatched: Vec<AtomicBool> = (0..n).map(|_| AtomicBool::new(false)).collect();

    let start = clock.now();
    std::thread::scope(|scope| {
        for i in 0..n {
            dispatch(
                i, services, &readiness, &outcomes, &dispatched, scope, clock, runner,
            );
        }
    });
    let total_elapsed = start.elapsed();

    let outcomes: Vec<Outcome> = outcomes.into_iter().map(|m| m.into_inner().unwrap()).collect();
    let longest = outcomes
        .iter()
        .zip(services.iter())
        .filter_map(|(o, s)| o.total_duration.map(|d| (s.name.clone(), d)))
        .max_by_key(|(_, d)| *d);

    Report {
        total_elapsed,
        longest,
        outcomes,
    }
}

#[allow(clippy::too_many_arguments)]
fn dispatch<'scope>(
    i: usize,
    services: &'scope [Service],
    readiness: &'scope [Readiness],
    outcomes: &'scope [Mutex<Outcome>],
    dispatched: &'scope [AtomicBool],
    scope: &'scope std::thread::Scope<'scope, '_>,
    clock: &'scope Clock,
    runner: Runner,
) {
    if dispatched[i].swap(true, Ordering::SeqCst) {
        return;
    }

    for dep in services[i].deps.iter().flatten() {
        dispatch(
            *dep, services, readiness, outcomes, dispatched, scope, clock, runner,
        );
    }

    if !services[i].eligible() {
        outcomes[i].lock().unwrap().run_state = RunState::Skipped;
        readiness[i].release();
        return;
    }

    outcomes[i].lock().unwrap().run_state = RunState::Waiting;
    scope.spawn(move || task(i, services, readiness, outcomes, clock, runner));
}

fn task(
    i: usize,
    services: &[Service],
    readiness: &[Readiness],
    outcomes: &[Mutex<Outcome>],
    clock: &Clock,
    runner: Runner,
) {
    for dep in services[i].deps.iter().flatten() {
        readiness[*dep].wait();
    }

    let start_instant = clock.now();
    {
        let mut outcome = outcomes[i].lock().unwrap();
        outcome.start_instant = Some(start_instant);
        outcome.run_state = RunState::Running;
    }

    let status = match runner(&services[i]) {
        Ok(status) => status,
        Err(SupervisorError::Nix(e)) => {
            warn!(service = %services[i].name, error = %e, "failed to spawn service");
            1
        }
        Err(e) => {
            warn!(service = %services[i].name, error = %e, "failed to spawn service");
            1
        }
    };

    if status != 0 {
        let err = SupervisorError::ServiceFailedAtRuntime {
            name: services[i].name.clone(),
            path: services[i].source_path.clone(),
            status,
        };
        warn!(error = %err, "dependents proceed regardless");
    }

    {
        let mut outcome = outcomes[i].lock().unwrap();
        outcome.exit_status = Some(status);
        outcome.total_duration = Some(start_instant.elapsed());
        outcome.run_state = RunState::Completed;
    }

    readiness[i].release();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{KindData, ScriptData, ServiceKind};

    fn script(name: &str, requires: &[&str]) -> Service {
        let mut svc = Service::new(ServiceKind::Script, name.into(), format!("/rc.d/{name}").into());
        svc.dep_names = requires.iter().map(|s| s.to_string()).collect();
        svc.kind_data = KindData::Script(ScriptData::default());
        svc
    }

    /// Stands in for `executor::run` in tests: sleeps briefly (so
    /// concurrent services measurably overlap) and returns success
    /// without forking or exec-ing anything.
    fn fake_runner(_service: &Service) -> Result<i32> {
        std::thread::sleep(Duration::from_millis(10));
        Ok(0)
    }

    /// Diamond graph: `join` must observe both `left` and `right`
    /// Completed before it starts.
    #[test]
    fn diamond_respects_dependency_order_in_timing() {
        let mut services = vec![
            script("root", &[]),
            script("left", &["root"]),
            script("right", &["root"]),
            script("join", &["left", "right"]),
        ];
        crate::graph::resolve(&mut services);
        crate::graph::check_acyclic(&services).unwrap();

        let clock = Clock::start();
        let report = run_with(&services, &clock, fake_runner);

        let start = |i: usize| report.outcomes[i].start_instant.unwrap();
        let end = |i: usize| start(i) + report.outcomes[i].total_duration.unwrap();

        assert!(end(0) <= start(1));
        assert!(end(0) <= start(2));
        assert!(end(1) <= start(3));
        assert!(end(2) <= start(3));
    }

    #[test]
    fn no_service_runs_more_than_once() {
        let mut services = vec![script("a", &[]), script("b", &["a"]), script("c", &["a"])];
        crate::graph::resolve(&mut services);
        let clock = Clock::start();
        let report = run_with(&services, &clock, fake_runner);
        for outcome in &report.outcomes {
            assert!(matches!(outcome.run_state, RunState::Completed | RunState::Skipped));
        }
    }

    #[test]
    fn ineligible_service_is_skipped_and_unblocks_dependents() {
        let mut dependency = script("disabled", &[]);
        dependency.flags.on_start = false;
        let dependent = script("user", &["disabled"]);
        let mut services = vec![dependency, dependent];
        crate::graph::resolve(&mut services);

        let clock = Clock::start();
        let report = run_with(&services, &clock, fake_runner);
        assert!(matches!(report.outcomes[0].run_state, RunState::Skipped));
        assert!(matches!(report.outcomes[1].run_state, RunState::Completed));
    }
}
