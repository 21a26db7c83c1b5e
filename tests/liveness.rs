//! Auto-ping end-to-end: a responsive client stays online, a silent
//! one is declared offline exactly once, and the registration
//! survives to allow a rejoin.
mod helpers;

use can_pubsub::core::hash_topic;
use can_pubsub::infra::storage::MemoryStore;
use can_pubsub::protocol::broker::Broker;
use can_pubsub::protocol::client::Client;
use helpers::{BusEndpoint, SharedBus, TestClock};
use std::cell::RefCell;
use std::rc::Rc;

type TestBroker = Broker<BusEndpoint, MemoryStore, TestClock>;
type TestClient = Client<BusEndpoint, TestClock>;

fn pump(broker: &mut TestBroker, clients: &mut [&mut TestClient]) {
    for _ in 0..200 {
        broker.poll().unwrap();
        for client in clients.iter_mut() {
            client.poll().unwrap();
        }
    }
}

#[test]
fn silent_client_goes_offline_once_and_can_rejoin() {
    let bus = SharedBus::new();
    let clock = TestClock::new();
    let store = MemoryStore::new();

    let mut broker = Broker::new(bus.endpoint(), store.clone(), clock.clone());
    broker.begin().unwrap();
    broker.set_ping_interval(200).unwrap();
    broker.set_max_missed_pings(2).unwrap();
    broker.set_auto_ping(true).unwrap();

    let disconnected: Rc<RefCell<Vec<u8>>> = Rc::default();
    let seen = disconnected.clone();
    broker.on_client_disconnect(move |id| seen.borrow_mut().push(id));

    let mut client_a = Client::new(bus.endpoint(), clock.clone());
    client_a.begin_connect_with_serial("A1").unwrap();
    pump(&mut broker, &mut [&mut client_a]);
    client_a.subscribe("temp/1").unwrap();
    pump(&mut broker, &mut [&mut client_a]);
    assert!(broker.is_client_online(1));

    // Responsive phase: the client answers every wave.
    for _ in 0..3 {
        clock.advance(200);
        pump(&mut broker, &mut [&mut client_a]);
        assert!(broker.is_client_online(1));
        assert!(disconnected.borrow().is_empty());
    }

    // The client dies: its frames stop, two waves go unanswered.
    clock.advance(200);
    for _ in 0..5 {
        broker.poll().unwrap();
    }
    clock.advance(200);
    for _ in 0..5 {
        broker.poll().unwrap();
    }

    assert_eq!(disconnected.borrow().as_slice(), &[1]);
    assert!(!broker.is_client_online(1));
    // Offline, but still registered with its subscriptions stored.
    assert_eq!(broker.client_id_by_serial("A1"), Some(1));

    // Further silent waves must not re-fire the callback.
    clock.advance(200);
    for _ in 0..5 {
        broker.poll().unwrap();
    }
    assert_eq!(disconnected.borrow().len(), 1);

    // The node reboots and rejoins: same ID, subscriptions replayed.
    let mut rejoined = Client::new(bus.endpoint(), clock.clone());
    rejoined.begin_connect_with_serial("A1").unwrap();
    pump(&mut broker, &mut [&mut rejoined]);

    assert_eq!(rejoined.client_id(), 1);
    assert!(rejoined.is_subscribed("temp/1"));
    assert_eq!(broker.subscribers_of(hash_topic("temp/1")), &[1]);

    // The handshake itself carries no client ID; the first real frame
    // from the rejoined node puts it back in the connected set.
    rejoined.ping().unwrap();
    pump(&mut broker, &mut [&mut rejoined]);
    assert!(broker.is_client_online(1));
}

#[test]
fn ping_config_survives_a_reboot_and_waves_resume() {
    let bus = SharedBus::new();
    let clock = TestClock::new();
    let store = MemoryStore::new();

    let mut broker = Broker::new(bus.endpoint(), store.clone(), clock.clone());
    broker.begin().unwrap();
    broker.register_client("A1").unwrap();
    broker.set_ping_interval(300).unwrap();
    broker.set_max_missed_pings(5).unwrap();
    broker.set_auto_ping(true).unwrap();
    drop(broker);

    let mut broker = Broker::new(bus.endpoint(), store, clock.clone());
    broker.begin().unwrap();
    let config = broker.ping_config();
    assert!(config.enabled);
    assert_eq!(config.interval_ms, 300);
    assert_eq!(config.max_missed, 5);

    // A live client reconnects and shows activity: back online.
    let mut client_a = Client::new(bus.endpoint(), clock.clone());
    client_a.begin_connect_with_serial("A1").unwrap();
    pump(&mut broker, &mut [&mut client_a]);
    client_a.ping().unwrap();
    pump(&mut broker, &mut [&mut client_a]);
    assert!(broker.is_client_online(1));
}
