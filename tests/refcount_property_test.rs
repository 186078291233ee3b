/*!
 * Reference Count Property Tests
 *
 * Random create/get/close/release sequences checked against a simple
 * model of per-object reference counts, destroy flags and the connector's
 * global accounting:
 *
 * - inline scheduler: every task has settled when its entry point returns,
 *   so the model is checked after each step
 * - thread pool: several submitters pipeline their operations without
 *   waiting, and the model is checked once everything has settled
 */

mod common;

use common::{fixture, Fixture};
use proptest::prelude::*;
use std::thread;
use std::time::Duration;
use vol_async::{
    BackendError, CompletionMode, GroupCreateArgs, GroupGet, Location, ObjectRef, ObjectStatus,
    OpKind, PlistClass, SchedulerKind, VolError,
};

// ============================================================================
// Model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Ready,
    Tombstone { released: bool },
    Closed,
}

impl Expect {
    fn refcount(self) -> usize {
        match self {
            Expect::Ready | Expect::Tombstone { released: false } => 1,
            Expect::Tombstone { released: true } | Expect::Closed => 0,
        }
    }

    fn status(self) -> ObjectStatus {
        match self {
            Expect::Ready => ObjectStatus::Ready,
            Expect::Tombstone { .. } => ObjectStatus::Error,
            Expect::Closed => ObjectStatus::Closed,
        }
    }

    fn destroyed(self) -> bool {
        self.refcount() == 0
    }
}

#[derive(Debug, Clone)]
enum Step {
    Create { fail: bool, detach: bool },
    Get { target: usize },
    Close { target: usize, fail: bool, detach: bool },
    Release { target: usize },
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (any::<bool>(), any::<bool>()).prop_map(|(fail, detach)| Step::Create { fail, detach }),
        2 => any::<usize>().prop_map(|target| Step::Get { target }),
        2 => (any::<usize>(), any::<bool>(), any::<bool>())
            .prop_map(|(target, fail, detach)| Step::Close { target, fail, detach }),
        1 => any::<usize>().prop_map(|target| Step::Release { target }),
    ]
}

fn mode(detach: bool) -> CompletionMode {
    if detach {
        CompletionMode::Detach
    } else {
        CompletionMode::Wait
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn refcounts_follow_model(steps in prop::collection::vec(arb_step(), 1..40)) {
        let fx = fixture(SchedulerKind::Inline);
        let mut objects: Vec<(ObjectRef, Expect)> = Vec::new();
        let mut created = 0usize;

        for step in steps {
            match step {
                Step::Create { fail, detach } => {
                    if fail {
                        fx.backend.fail_next(OpKind::Create, BackendError::Injected("create".into()));
                    }
                    let name = format!("g{}", created);
                    created += 1;
                    let (group, done) = fx
                        .connector
                        .group_create(&fx.root, fx.create_args(&name), fx.dxpl(), mode(detach))
                        .unwrap();
                    let outcome = fx.connector.wait(done);
                    match (fail, detach) {
                        (_, true) => prop_assert_eq!(outcome, Ok(None)),
                        (false, false) => prop_assert_eq!(outcome, Ok(Some(()))),
                        (true, false) => prop_assert!(outcome.is_err()),
                    }
                    let expect = if fail {
                        Expect::Tombstone { released: false }
                    } else {
                        Expect::Ready
                    };
                    objects.push((group, expect));
                }
                Step::Get { target } => {
                    if objects.is_empty() {
                        continue;
                    }
                    let (group, expect) = &objects[target % objects.len()];
                    let submitted = fx.connector.group_get(
                        group,
                        GroupGet::Info(Location::SelfObject),
                        fx.dxpl(),
                        CompletionMode::Wait,
                    );
                    if *expect == Expect::Ready {
                        let reply = fx.connector.wait(submitted.unwrap());
                        prop_assert!(matches!(reply, Ok(Some(_))));
                    } else {
                        prop_assert!(submitted.is_err());
                    }
                }
                Step::Close { target, fail, detach } => {
                    if objects.is_empty() {
                        continue;
                    }
                    let index = target % objects.len();
                    let (group, expect) = objects[index].clone();
                    if expect != Expect::Ready {
                        let refused = fx.connector.group_close(&group, fx.dxpl(), mode(detach));
                        prop_assert!(refused.is_err());
                        continue;
                    }
                    if fail {
                        fx.backend.fail_next(OpKind::Close, BackendError::Injected("close".into()));
                    }
                    let done = fx
                        .connector
                        .group_close(&group, fx.dxpl(), mode(detach))
                        .unwrap();
                    let outcome = fx.connector.wait(done);
                    prop_assert_eq!(outcome.is_err(), fail && !detach);
                    if !fail {
                        objects[index].1 = Expect::Closed;
                    }
                }
                Step::Release { target } => {
                    if objects.is_empty() {
                        continue;
                    }
                    let index = target % objects.len();
                    let (group, expect) = objects[index].clone();
                    let released = fx.connector.release(&group);
                    match expect {
                        Expect::Ready => {
                            prop_assert_eq!(released, Err(VolError::StillOpen(group.id())));
                        }
                        Expect::Tombstone { released: false } => {
                            prop_assert_eq!(released, Ok(()));
                            objects[index].1 = Expect::Tombstone { released: true };
                        }
                        Expect::Tombstone { released: true } => {
                            prop_assert_eq!(released, Err(VolError::RefcountUnderflow(group.id())));
                        }
                        Expect::Closed => {
                            prop_assert_eq!(released, Err(VolError::ObjectClosed(group.id())));
                        }
                    }
                }
            }

            for (group, expect) in &objects {
                prop_assert_eq!(group.refcount(), expect.refcount());
                prop_assert_eq!(group.status(), expect.status());
                prop_assert_eq!(group.is_destroyed(), expect.destroyed());
            }

            let live = objects.iter().filter(|(_, e)| !e.destroyed()).count();
            let ready = objects.iter().filter(|(_, e)| *e == Expect::Ready).count();
            let registry = fx.connector.registry();
            prop_assert_eq!(registry.live(), live + 1);
            prop_assert_eq!(registry.created_count(), objects.len() as u64 + 1);
            prop_assert_eq!(registry.destroyed_count(), (objects.len() - live) as u64);
            prop_assert_eq!(fx.backend.open_handles(), ready + 1);
            prop_assert_eq!(fx.root.refcount(), 1);
            prop_assert_eq!(fx.connector.ledger().outstanding(), 0);
            prop_assert_eq!(fx.connector.plists().open_count(), 0);
        }
    }
}

// ============================================================================
// Concurrent plans on the thread pool
// ============================================================================

/// Everything one submitter does to one group, without waiting in between
#[derive(Debug, Clone)]
struct Plan {
    fail: bool,
    gets: usize,
    close: bool,
    release: bool,
}

impl Plan {
    fn expect(&self) -> Expect {
        match (self.fail, self.close) {
            (true, _) => Expect::Tombstone {
                released: self.release,
            },
            (false, true) => Expect::Closed,
            (false, false) => Expect::Ready,
        }
    }
}

fn arb_plan() -> impl Strategy<Value = Plan> {
    (any::<bool>(), 0..3usize, any::<bool>(), any::<bool>())
        .prop_map(|(fail, gets, close, release)| Plan { fail, gets, close, release })
}

/// Creation args that always fail: the intermediate group is missing and
/// the link-creation list does not ask for it
fn failing_args(fx: &Fixture, name: &str) -> GroupCreateArgs {
    let plists = fx.connector.plists();
    GroupCreateArgs {
        location: Location::SelfObject,
        name: format!("missing/{}", name),
        lcpl: plists.create(PlistClass::LinkCreate),
        gcpl: plists.create(PlistClass::GroupCreate),
        gapl: plists.create(PlistClass::GroupAccess),
    }
}

/// Submit every plan back to back, then wait for all of them
fn run_plans(fx: &Fixture, base: usize, plans: &[Plan]) -> Vec<ObjectRef> {
    let mut groups = Vec::new();
    let mut units = Vec::new();
    let mut gets = Vec::new();

    for (i, plan) in plans.iter().enumerate() {
        let name = format!("g{}", base + i);
        let args = if plan.fail {
            failing_args(fx, &name)
        } else {
            fx.create_args(&name)
        };
        let (group, done) = fx
            .connector
            .group_create(&fx.root, args, fx.dxpl(), CompletionMode::Detach)
            .unwrap();
        units.push(done);

        // A failed create may already have settled; those are refused up front
        for _ in 0..plan.gets {
            if let Ok(get) = fx.connector.group_get(
                &group,
                GroupGet::Info(Location::SelfObject),
                fx.dxpl(),
                CompletionMode::Wait,
            ) {
                gets.push(get);
            }
        }
        if plan.close {
            if let Ok(done) = fx.connector.group_close(&group, fx.dxpl(), CompletionMode::Detach) {
                units.push(done);
            }
        }
        groups.push(group);
    }

    for done in units {
        assert_eq!(fx.connector.wait(done), Ok(None));
    }
    for get in gets {
        let _ = fx.connector.wait(get);
    }
    groups
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn refcounts_balance_on_thread_pool(plans in prop::collection::vec(arb_plan(), 1..24)) {
        let fx = fixture(SchedulerKind::ThreadPool);
        fx.backend.set_call_delay(Duration::from_micros(50));

        let groups: Vec<ObjectRef> = thread::scope(|scope| {
            let submitters: Vec<_> = plans
                .chunks(4)
                .enumerate()
                .map(|(n, chunk)| {
                    let fx = &fx;
                    scope.spawn(move || run_plans(fx, n * 4, chunk))
                })
                .collect();
            submitters
                .into_iter()
                .flat_map(|submitter| submitter.join().unwrap())
                .collect()
        });

        for (group, plan) in groups.iter().zip(&plans) {
            if plan.fail && plan.release {
                prop_assert_eq!(fx.connector.release(group), Ok(()));
            }
        }

        for (group, plan) in groups.iter().zip(&plans) {
            let expect = plan.expect();
            prop_assert_eq!(group.status(), expect.status());
            prop_assert_eq!(group.refcount(), expect.refcount());
            prop_assert_eq!(group.is_destroyed(), expect.destroyed());
            prop_assert!(!group.has_pending_task());
        }

        let destroyed = plans.iter().filter(|p| p.expect().destroyed()).count();
        let ready = plans.iter().filter(|p| p.expect() == Expect::Ready).count();
        let registry = fx.connector.registry();
        prop_assert_eq!(registry.destroyed_count(), destroyed as u64);
        prop_assert_eq!(registry.live(), plans.len() - destroyed + 1);
        prop_assert_eq!(fx.backend.open_handles(), ready + 1);
        prop_assert_eq!(fx.backend.max_concurrent_entries(), 1);
        prop_assert_eq!(fx.root.refcount(), 1);

        let stats = fx.connector.stats();
        prop_assert_eq!(stats.tasks_completed + stats.tasks_failed, stats.tasks_submitted);
        prop_assert_eq!(stats.tasks_outstanding, 0);
        prop_assert_eq!(stats.open_plists, 0);
    }
}
