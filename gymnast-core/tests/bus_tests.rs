// gymnast-core/tests/bus_tests.rs

use gymnast_core::bus::{
    BusConfig, BusError, Dependency, MessageBus, Requires, SaturationPolicy,
};
use gymnast_core::{command, event};
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct Greet {
    name: String,
}

#[derive(Debug)]
struct Count;

#[derive(Debug)]
struct WhichThread;

#[derive(Debug, Clone, PartialEq)]
struct Tick(u32);

#[derive(Debug)]
struct Other;

/// Same shape as `Tick`, different type.
#[derive(Debug)]
struct Tock(u32);

command!(Greet => String, Count => usize, WhichThread => thread::ThreadId);
event!(Tick, Other, Tock);

fn bus() -> MessageBus {
    MessageBus::new().unwrap()
}

fn collect<T>(rx: &Receiver<T>, n: usize) -> Vec<T> {
    (0..n).map(|_| rx.recv_timeout(TIMEOUT).unwrap()).collect()
}

fn forward_ticks(bus: &MessageBus, label: &'static str, tx: Sender<(&'static str, u32)>) {
    let tx = Mutex::new(tx);
    bus.subscribe_event::<Tick, _>(Requires::none(), move |tick, _| {
        tx.lock().unwrap().send((label, tick.0))?;
        Ok(())
    })
    .unwrap();
}

// ---- Command channel ----

#[test]
fn test_command_without_handler_is_a_lookup_failure() {
    let bus = bus();
    let err = bus.execute(Greet { name: "a".into() }).unwrap_err();
    assert!(matches!(err, BusError::NoCommandHandler(_)));
    assert!(err.is_configuration());
}

#[test]
fn test_command_returns_handler_output() {
    let bus = bus();
    bus.subscribe_command::<Greet, _>(Requires::none(), |cmd, _| Ok(format!("hello {}", cmd.name)))
        .unwrap();

    assert_eq!(bus.execute(Greet { name: "bob".into() }).unwrap(), "hello bob");

    let reply = bus.publish(Greet { name: "amy".into() }).unwrap().unwrap();
    assert_eq!(*reply.downcast::<String>().unwrap(), "hello amy");
}

#[test]
fn test_command_runs_on_caller_thread() {
    let bus = bus();
    bus.subscribe_command::<WhichThread, _>(Requires::none(), |_, _| Ok(thread::current().id()))
        .unwrap();

    assert_eq!(bus.execute(WhichThread).unwrap(), thread::current().id());
}

#[test]
fn test_duplicate_command_handler_keeps_the_first() {
    let bus = bus();
    bus.subscribe_command::<Greet, _>(Requires::none(), |_, _| Ok("first".to_string()))
        .unwrap();
    let err = bus
        .subscribe_command::<Greet, _>(Requires::none(), |_, _| Ok("second".to_string()))
        .unwrap_err();

    assert!(matches!(err, BusError::DuplicateCommandHandler { .. }));
    assert_eq!(bus.execute(Greet { name: String::new() }).unwrap(), "first");
}

#[derive(Debug, thiserror::Error)]
#[error("disk full")]
struct DiskFull;

#[test]
fn test_command_failure_propagates_unmodified() {
    let bus = bus();
    bus.subscribe_command::<Count, _>(Requires::none(), |_, _| Err(DiskFull.into()))
        .unwrap();

    let err = bus.execute(Count).unwrap_err();
    assert_eq!(err.to_string(), "disk full");
    let source = err.handler_error().unwrap();
    assert!(source.downcast_ref::<DiskFull>().is_some());
}

// ---- Handler adaptation ----

#[test]
fn test_catch_all_dependency_list_is_rejected() {
    let bus = bus();
    let err = bus
        .subscribe_event::<Tick, _>(Requires::from(["*deps"]), |_, _| Ok(()))
        .unwrap_err();
    assert!(matches!(err, BusError::VariadicHandler { .. }));
    assert_eq!(bus.event_handler_count::<Tick>(), 0);

    let err = bus
        .subscribe_command::<Count, _>(Requires::from(["**options"]), |_, _| Ok(0))
        .unwrap_err();
    assert!(matches!(err, BusError::VariadicHandler { .. }));
    assert!(!bus.has_command_handler::<Count>());
}

#[test]
fn test_missing_dependency_fails_at_subscribe_time() {
    let bus = bus();
    let err = bus
        .subscribe_command::<Count, _>(Requires::from(["db", "cache"]), |_, _| Ok(0))
        .unwrap_err();
    match err {
        BusError::MissingDependencies { missing, .. } => assert_eq!(missing, ["db", "cache"]),
        other => panic!("unexpected error: {other:?}"),
    }

    bus.set_dependency("db", 1_usize).unwrap();
    bus.set_dependency("cache", 2_usize).unwrap();
    bus.subscribe_command::<Count, _>(Requires::from(["db", "cache"]), |_, deps| {
        Ok(*deps.get::<usize>("db")? + *deps.get::<usize>("cache")?)
    })
    .unwrap();
    assert_eq!(bus.execute(Count).unwrap(), 3);
}

#[test]
fn test_invalid_dependency_name_is_rejected() {
    let bus = bus();
    assert!(matches!(
        bus.set_dependency("not valid", 1_u8),
        Err(BusError::InvalidDependencyName(_))
    ));
    assert!(matches!(
        bus.set_dependency("9lives", 1_u8),
        Err(BusError::InvalidDependencyName(_))
    ));
}

#[test]
fn test_set_dependencies_applies_entries_in_order() {
    let bus = bus();
    let values: Vec<(&str, Dependency)> = vec![
        ("a", Arc::new(1_u32)),
        ("a", Arc::new(2_u32)),
        ("bad name", Arc::new(3_u32)),
        ("b", Arc::new(4_u32)),
    ];
    assert!(bus.set_dependencies(values).is_err());
    assert!(bus.dependencies().contains("a"));
    assert!(!bus.dependencies().contains("b"));

    bus.subscribe_command::<Count, _>(Requires::from(["a"]), |_, deps| {
        Ok(*deps.get::<u32>("a")? as usize)
    })
    .unwrap();
    assert_eq!(bus.execute(Count).unwrap(), 2);
}

#[test]
fn test_dependency_changes_are_visible_on_next_invocation() {
    let bus = bus();
    bus.set_dependency("count", 0_usize).unwrap();
    bus.subscribe_command::<Count, _>(Requires::from(["count"]), |_, deps| {
        Ok(*deps.get::<usize>("count")?)
    })
    .unwrap();

    assert_eq!(bus.execute(Count).unwrap(), 0);
    bus.set_dependency("count", 5_usize).unwrap();
    assert_eq!(bus.execute(Count).unwrap(), 5);
}

#[test]
fn test_dependency_of_wrong_type_fails_the_call() {
    let bus = bus();
    bus.set_dependency("count", "zero").unwrap();
    bus.subscribe_command::<Count, _>(Requires::from(["count"]), |_, deps| {
        Ok(*deps.get::<usize>("count")?)
    })
    .unwrap();

    let err = bus.execute(Count).unwrap_err();
    let inner = err.handler_error().unwrap().downcast_ref::<BusError>().unwrap();
    assert!(matches!(inner, BusError::DependencyType { .. }));
}

// ---- Event channel ----

#[test]
fn test_events_are_delivered_in_publish_order() {
    let bus = bus();
    let (tx, rx) = mpsc::channel();
    forward_ticks(&bus, "h", tx);

    for i in 1..=3 {
        assert!(bus.publish(Tick(i)).unwrap().is_none());
    }
    let seen: Vec<u32> = collect(&rx, 3).into_iter().map(|(_, n)| n).collect();
    assert_eq!(seen, [1, 2, 3]);
}

#[test]
fn test_handlers_run_in_subscription_order() {
    let bus = bus();
    let (tx, rx) = mpsc::channel();
    forward_ticks(&bus, "h1", tx.clone());
    forward_ticks(&bus, "h2", tx);

    bus.emit(Tick(1)).unwrap();
    bus.emit(Tick(2)).unwrap();

    assert_eq!(
        collect(&rx, 4),
        [("h1", 1), ("h2", 1), ("h1", 2), ("h2", 2)]
    );
}

#[test]
fn test_failing_handler_does_not_stop_delivery() {
    let bus = bus();
    let (tx, rx) = mpsc::channel();
    bus.subscribe_event::<Tick, _>(Requires::none(), |tick, _| {
        if tick.0 == 1 {
            anyhow::bail!("tick {} rejected", tick.0);
        }
        Ok(())
    })
    .unwrap();
    bus.subscribe_event::<Tick, _>(Requires::none(), |tick, _| {
        if tick.0 == 2 {
            panic!("tick {} exploded", tick.0);
        }
        Ok(())
    })
    .unwrap();
    forward_ticks(&bus, "last", tx);

    for i in 1..=3 {
        bus.emit(Tick(i)).unwrap();
    }
    assert_eq!(collect(&rx, 3), [("last", 1), ("last", 2), ("last", 3)]);

    bus.shutdown();
    assert_eq!(bus.stats().handler_failures, 2);
    assert_eq!(bus.stats().delivered, 3);
}

#[test]
fn test_event_types_are_routed_nominally() {
    let bus = bus();
    let (tx, rx) = mpsc::channel();
    forward_ticks(&bus, "tick", tx);
    let tocks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&tocks);
    bus.subscribe_event::<Tock, _>(Requires::none(), move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    bus.emit(Tock(7)).unwrap();
    bus.emit(Tick(7)).unwrap();
    assert_eq!(collect(&rx, 1), [("tick", 7)]);
    bus.shutdown();
    assert_eq!(tocks.load(Ordering::SeqCst), 1);
}

#[test]
fn test_event_without_handlers_is_accepted() {
    let bus = bus();
    assert!(bus.publish(Other).unwrap().is_none());
    bus.shutdown();
    assert_eq!(bus.stats().delivered, 1);
}

#[test]
fn test_publish_returns_before_handlers_finish() {
    let bus = bus();
    let gate = Arc::new(Barrier::new(2));
    let handler_gate = Arc::clone(&gate);
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    bus.subscribe_event::<Tick, _>(Requires::none(), move |tick, _| {
        handler_gate.wait();
        tx.lock().unwrap().send(tick.0)?;
        Ok(())
    })
    .unwrap();

    // The handler cannot finish until this thread reaches the barrier.
    bus.emit(Tick(1)).unwrap();
    assert!(rx.try_recv().is_err());
    gate.wait();
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), 1);
}

#[test]
fn test_handlers_may_publish_and_subscribe() {
    let bus = bus();
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    bus.subscribe_event::<Other, _>(Requires::none(), move |_, _| {
        tx.lock().unwrap().send(())?;
        Ok(())
    })
    .unwrap();

    let inner = bus.clone();
    bus.subscribe_event::<Tick, _>(Requires::none(), move |_, _| {
        inner.emit(Other)?;
        inner.subscribe_event::<Tock, _>(Requires::none(), |_, _| Ok(()))?;
        Ok(())
    })
    .unwrap();

    bus.emit(Tick(0)).unwrap();
    rx.recv_timeout(TIMEOUT).unwrap();
    bus.shutdown();
    assert_eq!(bus.stats().handler_failures, 0);
}

// ---- Classification ----

#[test]
fn test_unclassified_message_is_rejected() {
    let bus = bus();
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran);
    bus.subscribe_event::<Tick, _>(Requires::none(), move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    let err = bus.publish_any(Box::new(42_u32)).unwrap_err();
    assert!(matches!(err, BusError::Unclassified(_)));

    bus.shutdown();
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn test_publish_any_routes_known_types() {
    let bus = bus();
    bus.subscribe_command::<Greet, _>(Requires::none(), |cmd, _| Ok(cmd.name))
        .unwrap();
    bus.register_message::<Other>();

    let boxed: Box<dyn Any + Send> = Box::new(Greet { name: "x".into() });
    let reply = bus.publish_any(boxed).unwrap().unwrap();
    assert_eq!(*reply.downcast::<String>().unwrap(), "x");
    assert!(bus.publish_any(Box::new(Other)).unwrap().is_none());
}

// ---- Configuration and lifecycle ----

#[test]
fn test_zero_capacity_is_invalid() {
    let err = MessageBus::with_config(BusConfig::bounded(0, SaturationPolicy::Block)).unwrap_err();
    assert!(matches!(err, BusError::InvalidConfig(_)));
}

fn stalled_bus(policy: SaturationPolicy) -> (MessageBus, Arc<Barrier>, Receiver<u32>) {
    let bus = MessageBus::with_config(BusConfig::bounded(2, policy)).unwrap();
    let gate = Arc::new(Barrier::new(2));
    let handler_gate = Arc::clone(&gate);
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    bus.subscribe_event::<Tick, _>(Requires::none(), move |tick, _| {
        if tick.0 == 0 {
            handler_gate.wait();
        }
        tx.lock().unwrap().send(tick.0)?;
        Ok(())
    })
    .unwrap();
    (bus, gate, rx)
}

/// Waits until the worker has taken the first event off the queue.
fn wait_until_empty(bus: &MessageBus) {
    for _ in 0..500 {
        if bus.stats().pending == 0 {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("worker never picked up the first event");
}

#[test]
fn test_drop_oldest_discards_the_oldest_pending_event() {
    let (bus, gate, rx) = stalled_bus(SaturationPolicy::DropOldest);
    bus.emit(Tick(0)).unwrap();
    wait_until_empty(&bus);
    for i in 1..=3 {
        bus.emit(Tick(i)).unwrap();
    }
    gate.wait();

    assert_eq!(collect(&rx, 3), [0, 2, 3]);
    bus.shutdown();
    assert_eq!(bus.stats().dropped, 1);
}

#[test]
fn test_drop_newest_discards_the_incoming_event() {
    let (bus, gate, rx) = stalled_bus(SaturationPolicy::DropNewest);
    bus.emit(Tick(0)).unwrap();
    wait_until_empty(&bus);
    for i in 1..=3 {
        bus.emit(Tick(i)).unwrap();
    }
    gate.wait();

    assert_eq!(collect(&rx, 3), [0, 1, 2]);
    bus.shutdown();
    assert_eq!(bus.stats().dropped, 1);
}

#[test]
fn test_block_policy_waits_for_room() {
    let (bus, gate, rx) = stalled_bus(SaturationPolicy::Block);
    bus.emit(Tick(0)).unwrap();
    wait_until_empty(&bus);
    bus.emit(Tick(1)).unwrap();
    bus.emit(Tick(2)).unwrap();

    let producer = {
        let bus = bus.clone();
        thread::spawn(move || bus.emit(Tick(3)))
    };
    gate.wait();
    producer.join().unwrap().unwrap();

    assert_eq!(collect(&rx, 4), [0, 1, 2, 3]);
    bus.shutdown();
    assert_eq!(bus.stats().dropped, 0);
}

#[test]
fn test_shutdown_delivers_pending_events_then_stops() {
    let bus = bus();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.subscribe_event::<Tick, _>(Requires::none(), move |tick, _| {
        thread::sleep(Duration::from_millis(5));
        sink.lock().unwrap().push(tick.0);
        Ok(())
    })
    .unwrap();

    for i in 0..10 {
        bus.emit(Tick(i)).unwrap();
    }
    bus.shutdown();

    assert_eq!(*seen.lock().unwrap(), (0..10).collect::<Vec<_>>());
    assert!(!bus.is_running());
    assert!(matches!(bus.emit(Tick(99)), Err(BusError::Stopped)));
    assert_eq!(bus.event_handler_count::<Tick>(), 0);

    // Idempotent
    bus.shutdown();
}

#[test]
fn test_shutdown_from_a_handler_still_delivers_queued_events() {
    let bus = bus();
    bus.set_dependency("offset", 100_u32).unwrap();
    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    let gate_rx = Mutex::new(gate_rx);
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let inner = bus.clone();
    bus.subscribe_event::<Tick, _>(Requires::from(["offset"]), move |tick, deps| {
        if tick.0 == 0 {
            // Hold the worker until the later ticks are queued
            gate_rx.lock().unwrap().recv_timeout(TIMEOUT)?;
            inner.shutdown();
        }
        let offset = deps.get::<u32>("offset")?;
        tx.lock().unwrap().send(tick.0 + *offset)?;
        Ok(())
    })
    .unwrap();

    for i in 0..3 {
        bus.emit(Tick(i)).unwrap();
    }
    gate_tx.send(()).unwrap();

    assert_eq!(collect(&rx, 3), vec![100, 101, 102]);
    assert!(!bus.is_running());

    // The worker clears the registries once the queue is drained
    let deadline = std::time::Instant::now() + TIMEOUT;
    while bus.event_handler_count::<Tick>() > 0 {
        assert!(std::time::Instant::now() < deadline, "registries were never cleared");
        thread::sleep(Duration::from_millis(5));
    }
    let stats = bus.stats();
    assert_eq!(stats.published, 3);
    assert_eq!(stats.delivered, 3);
    assert_eq!(stats.handler_failures, 0);
}

#[test]
fn test_commands_after_shutdown_report_stopped() {
    let bus = bus();
    bus.subscribe_command::<Count, _>(Requires::none(), |_, _| Ok(1)).unwrap();
    bus.shutdown();

    let err = bus.execute(Count).unwrap_err();
    assert!(matches!(err, BusError::Stopped));
    assert!(!err.is_configuration());
    assert!(matches!(bus.publish(Count), Err(BusError::Stopped)));
}

#[test]
fn test_concurrent_shutdown_callers_wait_for_the_drain() {
    let bus = bus();
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&delivered);
    bus.subscribe_event::<Tick, _>(Requires::none(), move |_, _| {
        thread::sleep(Duration::from_millis(20));
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();
    for i in 0..5 {
        bus.emit(Tick(i)).unwrap();
    }

    let start = Arc::new(Barrier::new(3));
    let callers: Vec<_> = (0..3)
        .map(|_| {
            let bus = bus.clone();
            let start = Arc::clone(&start);
            let delivered = Arc::clone(&delivered);
            thread::spawn(move || {
                start.wait();
                bus.shutdown();
                delivered.load(Ordering::SeqCst)
            })
        })
        .collect();

    for caller in callers {
        assert_eq!(caller.join().unwrap(), 5);
    }
}

#[test]
fn test_kind_mismatch_is_a_classification_error() {
    struct Confused;
    impl gymnast_core::bus::Message for Confused {
        const KIND: gymnast_core::bus::MessageKind = gymnast_core::bus::MessageKind::Event;
    }
    impl gymnast_core::bus::Command for Confused {
        type Output = ();
    }

    let bus = bus();
    let err = bus
        .subscribe_command::<Confused, _>(Requires::none(), |_, _| Ok(()))
        .unwrap_err();
    assert!(matches!(err, BusError::KindMismatch { .. }));
}
