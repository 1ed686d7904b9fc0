//! Integration tests for the ISR publish path and the topic server

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use evbus::{
    BusConfig, ManualClock, ObjectStore, Rule, RuleKind, SubscriberFn, TopicBus, TopicServer,
};

const WAIT: Option<Duration> = Some(Duration::from_millis(200));

fn bus_with_or_topic(event_keys: &[u16]) -> (Arc<TopicBus>, Arc<ObjectStore>) {
    let clock = Arc::new(ManualClock::new());
    let store = Arc::new(ObjectStore::new(16, clock).unwrap());
    let bus = Arc::new(TopicBus::new(BusConfig::default(), store.clone()).unwrap());
    bus.rule_create(1, Rule::new(RuleKind::Or, event_keys).unwrap(), WAIT)
        .unwrap();
    (bus, store)
}

#[test]
fn test_isr_publish_is_deferred_until_drain() {
    let (bus, store) = bus_with_or_topic(&[10]);

    let log: Arc<Mutex<Vec<u16>>> = Arc::new(Mutex::new(Vec::new()));
    let callback: SubscriberFn = {
        let log = log.clone();
        Arc::new(move |delivery| {
            log.lock().unwrap().push(delivery.event_key.unwrap());
            Ok(())
        })
    };
    bus.subscribe(1, callback, WAIT).unwrap();

    store.set(10, b"v", 0, WAIT).unwrap();
    bus.publish_isr(10).unwrap();
    bus.publish_isr(10).unwrap();

    assert_eq!(bus.isr_queue_len(), 2);
    assert!(log.lock().unwrap().is_empty());

    let drained = bus.process_isr_queue(WAIT).unwrap();
    assert_eq!(drained, 2);
    assert_eq!(log.lock().unwrap().len(), 2);
    assert_eq!(bus.isr_queue_len(), 0);
}

#[test]
fn test_isr_queue_preserves_fifo_order() {
    let (bus, store) = bus_with_or_topic(&[1, 2, 3]);

    let log: Arc<Mutex<Vec<u16>>> = Arc::new(Mutex::new(Vec::new()));
    let callback: SubscriberFn = {
        let log = log.clone();
        Arc::new(move |delivery| {
            log.lock().unwrap().push(delivery.event_key.unwrap());
            Ok(())
        })
    };
    bus.subscribe(1, callback, WAIT).unwrap();

    for key in [1u16, 2, 3, 2, 1] {
        store.set(key, &key.to_le_bytes(), 0, WAIT).unwrap();
        bus.publish_isr(key).unwrap();
    }

    bus.process_isr_queue(WAIT).unwrap();
    assert_eq!(log.lock().unwrap().as_slice(), &[1, 2, 3, 2, 1]);
}

#[test]
fn test_isr_queue_overflow_is_reported() {
    let clock = Arc::new(ManualClock::new());
    let store = Arc::new(ObjectStore::new(4, clock).unwrap());
    let config = BusConfig {
        isr_queue_capacity: 4,
        ..BusConfig::default()
    };
    let bus = TopicBus::new(config, store).unwrap();

    for key in 0..4u16 {
        bus.publish_isr(key).unwrap();
    }
    assert!(bus.publish_isr(4).is_err());
    assert_eq!(
        bus.stats().isr_overflows.load(std::sync::atomic::Ordering::Relaxed),
        1
    );

    // Draining makes room again
    bus.process_isr_queue(WAIT).unwrap();
    bus.publish_isr(5).unwrap();
}

#[test]
fn test_server_run_once_drains_and_tracks_stats() {
    let (bus, store) = bus_with_or_topic(&[10]);
    let server = TopicServer::new(bus.clone(), Duration::from_millis(5));

    assert_eq!(server.run_once(), 0);

    store.set(10, b"v", 0, WAIT).unwrap();
    for _ in 0..3 {
        bus.publish_isr(10).unwrap();
    }

    assert_eq!(server.run_once(), 3);

    let (processed, _avg_latency) = server.get_stats();
    assert_eq!(processed, 3);
    assert_eq!(
        server.stats().batches.load(std::sync::atomic::Ordering::Relaxed),
        1
    );
}

#[test]
fn test_server_background_thread_drains_periodically() {
    let (bus, store) = bus_with_or_topic(&[10]);

    let log: Arc<Mutex<Vec<u16>>> = Arc::new(Mutex::new(Vec::new()));
    let callback: SubscriberFn = {
        let log = log.clone();
        Arc::new(move |delivery| {
            log.lock().unwrap().push(delivery.event_key.unwrap());
            Ok(())
        })
    };
    bus.subscribe(1, callback, WAIT).unwrap();

    let mut server = TopicServer::new(bus.clone(), Duration::from_millis(2));
    server.start().unwrap();
    assert!(server.is_running());
    assert!(server.start().is_err());

    store.set(10, b"v", 0, WAIT).unwrap();
    for _ in 0..5 {
        bus.publish_isr(10).unwrap();
    }

    // Wait for the server to pick the batch up
    let deadline = Instant::now() + Duration::from_secs(2);
    while log.lock().unwrap().len() < 5 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(log.lock().unwrap().len(), 5);

    server.stop();
    assert!(!server.is_running());

    // Events queued after stop stay queued
    bus.publish_isr(10).unwrap();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(bus.isr_queue_len(), 1);
}

#[test]
fn test_server_stops_on_drop() {
    let (bus, _store) = bus_with_or_topic(&[10]);
    let mut server = TopicServer::from_config(bus.clone());
    server.start().unwrap();
    drop(server);

    // The worker thread is joined; queued events are no longer consumed
    bus.publish_isr(10).unwrap();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(bus.isr_queue_len(), 1);
}
