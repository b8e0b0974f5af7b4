mod common;

use common::{MockBoundary, Probe, Scripted, init_logging};

use strobe::task::Resumption;
use strobe::{Scheduler, Trigger, Value};

use std::sync::Arc;

use proptest::prelude::*;

#[test]
fn test_writes_are_deferred_to_read_write_phase() {
    init_logging();
    let boundary = Arc::new(MockBoundary::default());
    let mut scheduler = Scheduler::new(boundary.clone());
    let probe = Probe::new("data", 0);
    let data = probe.signal();
    let edge = Trigger::timer(10);

    let driver = {
        let data = data.clone();
        let edge = edge.clone();
        Scripted::new("driver", move |_, cx| {
            cx.save_write(&data, 7);
            Resumption::wait(edge.clone())
        })
    };

    scheduler.add(driver).unwrap();

    assert_eq!(data.value(), Value::Int(0));
    assert_eq!(scheduler.pending_writes(), 1);
    assert!(scheduler.flush_scheduled());

    let read_write = boundary.read_write().expect("phase mover armed ReadWrite");
    scheduler.react(&read_write).unwrap();

    assert_eq!(data.value(), Value::Int(7));
    assert_eq!(scheduler.pending_writes(), 0);
    assert!(!scheduler.flush_scheduled());
    assert!(scheduler.is_waiting(&edge));
}

#[test]
fn test_last_write_wins_within_a_phase() {
    let boundary = Arc::new(MockBoundary::default());
    let mut scheduler = Scheduler::new(boundary.clone());
    let probe = Probe::new("data", 0);
    let data = probe.signal();

    let driver = {
        let data = data.clone();
        Scripted::new("driver", move |_, cx| {
            cx.save_write(&data, 1);
            cx.save_write(&data, 2);
            cx.save_write(&data, 3);
            Resumption::wait(Trigger::timer(100))
        })
    };

    scheduler.add(driver).unwrap();
    assert_eq!(scheduler.pending_writes(), 1);

    scheduler.react(&boundary.read_write().unwrap()).unwrap();

    assert_eq!(*probe.applied.lock(), vec![Value::Int(3)]);
}

#[test]
fn test_flush_is_requested_once_per_phase() {
    let boundary = Arc::new(MockBoundary::default());
    let mut scheduler = Scheduler::new(boundary.clone());
    let a = Probe::new("a", 0);
    let b = Probe::new("b", 0);
    let edge = Trigger::timer(5);

    for probe in [&a, &b] {
        let signal = probe.signal();
        let edge = edge.clone();
        scheduler
            .add(Scripted::new("writer", move |fired, cx| {
                if fired.is_some() {
                    cx.save_write(&signal, 1);
                }
                Resumption::wait(edge.clone())
            }))
            .unwrap();
    }

    assert!(boundary.read_write().is_none());

    scheduler.react(&edge).unwrap();

    let read_write = boundary.read_write().unwrap();
    assert_eq!(boundary.arm_count(&read_write), 1);
    assert_eq!(scheduler.pending_writes(), 2);

    scheduler.react(&read_write).unwrap();
    assert_eq!(*a.applied.lock(), vec![Value::Int(1)]);
    assert_eq!(*b.applied.lock(), vec![Value::Int(1)]);
}

#[test]
fn test_writes_after_flush_arm_the_next_phase() {
    let boundary = Arc::new(MockBoundary::default());
    let mut scheduler = Scheduler::new(boundary.clone());
    let probe = Probe::new("data", 0);
    let data = probe.signal();
    let edge = Trigger::timer(5);

    let driver = {
        let data = data.clone();
        let edge = edge.clone();
        let mut next = 0;
        Scripted::new("driver", move |_, cx| {
            next += 1;
            cx.save_write(&data, next);
            Resumption::wait(edge.clone())
        })
    };

    scheduler.add(driver).unwrap();
    let read_write = boundary.read_write().unwrap();
    scheduler.react(&read_write).unwrap();

    scheduler.react(&edge).unwrap();
    assert!(scheduler.flush_scheduled());
    assert_eq!(boundary.arm_count(&read_write), 2);

    scheduler.react(&read_write).unwrap();
    assert_eq!(*probe.applied.lock(), vec![Value::Int(1), Value::Int(2)]);
}

#[test]
fn test_writes_from_outside_a_task_flush_on_next_reaction() {
    let boundary = Arc::new(MockBoundary::default());
    let mut scheduler = Scheduler::new(boundary.clone());
    let probe = Probe::new("data", 0);
    let edge = Trigger::timer(1);

    scheduler
        .add(Scripted::new("idle", {
            let edge = edge.clone();
            move |_, _| Resumption::wait(edge.clone())
        }))
        .unwrap();

    scheduler.save_write(&probe.signal(), true);
    assert!(!scheduler.flush_scheduled());

    scheduler.react(&edge).unwrap();
    scheduler.react(&boundary.read_write().unwrap()).unwrap();

    assert_eq!(*probe.value.lock(), Value::Bool(true));
}

proptest! {
    #[test]
    fn test_flush_applies_last_value_per_signal(
        writes in proptest::collection::vec((0usize..4, any::<i64>()), 1..40)
    ) {
        let boundary = Arc::new(MockBoundary::default());
        let mut scheduler = Scheduler::new(boundary.clone());
        let probes: Vec<Probe> = (0..4).map(|i| Probe::new(&format!("s{i}"), Value::None)).collect();
        let signals: Vec<_> = probes.iter().map(Probe::signal).collect();

        let driver = {
            let writes = writes.clone();
            let signals = signals.clone();
            Scripted::new("driver", move |_, cx| {
                for (index, value) in &writes {
                    cx.save_write(&signals[*index], *value);
                }
                Resumption::wait(Trigger::timer(1))
            })
        };

        scheduler.add(driver).unwrap();
        scheduler.react(&boundary.read_write().unwrap()).unwrap();

        for (index, probe) in probes.iter().enumerate() {
            let last = writes.iter().rev().find(|(i, _)| *i == index).map(|(_, v)| Value::Int(*v));
            let applied = probe.applied.lock().clone();

            match last {
                Some(value) => prop_assert_eq!(applied, vec![value]),
                None => prop_assert!(applied.is_empty()),
            }
        }
    }
}
