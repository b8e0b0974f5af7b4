mod common;

use common::{Journal, MockBoundary, Scripted, init_logging};

use strobe::task::{Awaitable, Resumption, TaskState};
use strobe::{FanOutPolicy, Scheduler, SchedulerError, Trigger, Value};

use std::sync::Arc;

#[test]
fn test_react_resumes_waiters_in_registration_order() {
    init_logging();
    let boundary = Arc::new(MockBoundary::default());
    let mut scheduler = Scheduler::new(boundary.clone());
    let journal = Journal::default();
    let edge = Trigger::timer(10);

    for name in ["a", "b", "c"] {
        scheduler
            .add(Scripted::waiter(name, edge.clone(), journal.clone()))
            .unwrap();
    }

    scheduler.react(&edge).unwrap();

    assert_eq!(journal.entries(), vec!["a", "b", "c"]);
}

#[test]
fn test_shared_trigger_is_armed_once() {
    let boundary = Arc::new(MockBoundary::default());
    let mut scheduler = Scheduler::new(boundary.clone());
    let journal = Journal::default();
    let edge = Trigger::timer(10);

    scheduler
        .add(Scripted::waiter("a", edge.clone(), journal.clone()))
        .unwrap();
    scheduler
        .add(Scripted::waiter("b", edge.clone(), journal))
        .unwrap();

    assert_eq!(boundary.arm_count(&edge), 1);
    assert_eq!(scheduler.waiters(&edge).len(), 2);
    assert!(edge.is_primed());
}

#[test]
fn test_react_without_waiters_is_benign() {
    let boundary = Arc::new(MockBoundary::default());
    let mut scheduler = Scheduler::new(boundary);
    let stray = Trigger::read_only();

    scheduler.react(&stray).unwrap();

    assert!(!scheduler.is_waiting(&stray));
    assert!(!scheduler.is_finished());
}

#[test]
fn test_rewaiting_on_fired_trigger_waits_for_next_firing() {
    let boundary = Arc::new(MockBoundary::default());
    let mut scheduler = Scheduler::new(boundary.clone());
    let journal = Journal::default();
    let edge = Trigger::timer(1);

    scheduler
        .add(Scripted::waiter("loop", edge.clone(), journal.clone()))
        .unwrap();

    scheduler.react(&edge).unwrap();
    assert_eq!(journal.entries(), vec!["loop"]);
    assert!(scheduler.is_waiting(&edge));
    assert_eq!(boundary.arm_count(&edge), 2);

    scheduler.react(&edge).unwrap();
    assert_eq!(journal.entries(), vec!["loop", "loop"]);
}

#[test]
fn test_waiter_list_is_detached_before_resuming() {
    let boundary = Arc::new(MockBoundary::default());
    let mut scheduler = Scheduler::new(boundary);
    let journal = Journal::default();
    let edge = Trigger::timer(1);

    let late = {
        let journal = journal.clone();
        let edge = edge.clone();
        Scripted::new("late", move |fired, _| {
            if fired.is_some() {
                journal.push("late");
            }
            Resumption::wait(edge.clone())
        })
    };

    let spawner = {
        let journal = journal.clone();
        let edge = edge.clone();
        let mut late = Some(late);
        Scripted::new("spawner", move |fired, cx| {
            if fired.is_some() {
                journal.push("spawner");
                if let Some(late) = late.take() {
                    cx.fork(late);
                }
            }
            Resumption::wait(edge.clone())
        })
    };

    scheduler.add(spawner).unwrap();
    scheduler.react(&edge).unwrap();

    assert_eq!(journal.entries(), vec!["spawner"]);
    assert_eq!(scheduler.waiters(&edge).len(), 2);

    scheduler.react(&edge).unwrap();
    assert_eq!(journal.entries(), vec!["spawner", "spawner", "late"]);
}

#[test]
fn test_fan_out_resumes_once_and_cancels_siblings() {
    let boundary = Arc::new(MockBoundary::default());
    let mut scheduler = Scheduler::new(boundary.clone());
    let journal = Journal::default();
    let first = Trigger::timer(5);
    let second = Trigger::read_only();
    let after = Trigger::timer(100);

    let task = {
        let journal = journal.clone();
        let triggers = vec![first.clone(), second.clone()];
        let after = after.clone();
        Scripted::new("either", move |fired, _| match fired {
            None => Resumption::Suspended(Awaitable::FanOut(triggers.clone())),
            Some(trigger) => {
                journal.push(trigger.to_string());
                Resumption::wait(after.clone())
            }
        })
    };

    scheduler.add(task).unwrap();
    scheduler.react(&first).unwrap();

    assert_eq!(journal.entries(), vec!["Timer(5)"]);
    assert!(!scheduler.is_waiting(&second));
    assert!(!second.is_primed());
    assert!(boundary.was_disarmed(&second));

    scheduler.react(&second).unwrap();
    assert_eq!(journal.entries(), vec!["Timer(5)"]);
}

#[test]
fn test_fan_out_replicate_resumes_per_firing() {
    let boundary = Arc::new(MockBoundary::default());
    let mut scheduler = Scheduler::builder()
        .fan_out(FanOutPolicy::Replicate)
        .build(boundary);
    let journal = Journal::default();
    let first = Trigger::timer(5);
    let second = Trigger::read_only();
    let after = Trigger::timer(100);

    let task = {
        let journal = journal.clone();
        let triggers = vec![first.clone(), second.clone()];
        let after = after.clone();
        Scripted::new("either", move |fired, _| match fired {
            None => Resumption::Suspended(Awaitable::FanOut(triggers.clone())),
            Some(trigger) => {
                journal.push(trigger.to_string());
                Resumption::wait(after.clone())
            }
        })
    };

    scheduler.add(task).unwrap();
    scheduler.react(&first).unwrap();
    assert!(scheduler.is_waiting(&second));

    scheduler.react(&second).unwrap();
    assert_eq!(journal.entries(), vec!["Timer(5)", "ReadOnly"]);
}

#[test]
fn test_fan_out_replicate_repeated_wait_resumes_once_per_firing() {
    let boundary = Arc::new(MockBoundary::default());
    let mut scheduler = Scheduler::builder()
        .fan_out(FanOutPolicy::Replicate)
        .build(boundary);
    let journal = Journal::default();
    let first = Trigger::timer(1);
    let second = Trigger::timer(2);

    let task = {
        let journal = journal.clone();
        let triggers = vec![first.clone(), second.clone()];
        Scripted::new("either", move |fired, _| {
            if let Some(trigger) = fired {
                journal.push(trigger.to_string());
            }
            Resumption::Suspended(Awaitable::FanOut(triggers.clone()))
        })
    };

    scheduler.add(task).unwrap();
    scheduler.react(&first).unwrap();

    assert_eq!(scheduler.waiters(&second).len(), 1);
    assert_eq!(scheduler.waiters(&first).len(), 1);

    scheduler.react(&second).unwrap();

    assert_eq!(journal.entries(), vec!["Timer(1)", "Timer(2)"]);
    assert_eq!(scheduler.waiters(&second).len(), 1);
}

#[test]
fn test_empty_fan_out_is_unschedulable() {
    let boundary = Arc::new(MockBoundary::default());
    let mut scheduler = Scheduler::new(boundary);

    let task = Scripted::new("nothing", |_, _| {
        Resumption::Suspended(Awaitable::FanOut(Vec::new()))
    });

    let err = scheduler.add(task).unwrap_err();

    assert!(matches!(err, SchedulerError::Unschedulable { .. }));
    assert!(scheduler.is_finished());
}

#[test]
fn test_task_states_follow_lifecycle() {
    let boundary = Arc::new(MockBoundary::default());
    let mut scheduler = Scheduler::new(boundary);
    let edge = Trigger::timer(3);

    let handle = scheduler.add(Scripted::once("once", edge.clone(), 9)).unwrap();
    assert_eq!(handle.state(), TaskState::Suspended);
    assert_eq!(handle.result(), None);

    scheduler.react(&edge).unwrap();
    assert_eq!(handle.state(), TaskState::Completed);
    assert_eq!(handle.result(), Some(Value::Int(9)));
    assert!(!scheduler.is_waiting(&edge));
}

#[test]
fn test_firer_queue_is_delivered_by_react_pending() {
    let boundary = Arc::new(MockBoundary::default());
    let mut scheduler = Scheduler::new(boundary);
    let journal = Journal::default();
    let edge = Trigger::timer(3);

    scheduler
        .add(Scripted::waiter("w", edge.clone(), journal.clone()))
        .unwrap();

    let firer = scheduler.firer();
    std::thread::spawn(move || firer.fire(edge)).join().unwrap();

    assert!(journal.entries().is_empty());
    scheduler.react_pending().unwrap();
    assert_eq!(journal.entries(), vec!["w"]);
}
