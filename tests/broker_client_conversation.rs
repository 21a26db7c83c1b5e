//! End-to-end conversations between a broker and several clients over
//! the in-memory broadcast bus.
mod helpers;

use can_pubsub::core::{hash_topic, TEMPORARY_ID_MIN};
use can_pubsub::infra::storage::MemoryStore;
use can_pubsub::protocol::broker::Broker;
use can_pubsub::protocol::client::Client;
use helpers::{BusEndpoint, SharedBus, TestClock};
use std::cell::RefCell;
use std::rc::Rc;

type TestBroker = Broker<BusEndpoint, MemoryStore, TestClock>;
type TestClient = Client<BusEndpoint, TestClock>;

fn world() -> (SharedBus, TestClock, MemoryStore, TestBroker) {
    let bus = SharedBus::new();
    let clock = TestClock::new();
    let store = MemoryStore::new();
    let mut broker = Broker::new(bus.endpoint(), store.clone(), clock.clone());
    broker.begin().unwrap();
    (bus, clock, store, broker)
}

/// Alternate polls until the segment goes quiet.
fn pump(broker: &mut TestBroker, clients: &mut [&mut TestClient]) {
    for _ in 0..200 {
        broker.poll().unwrap();
        for client in clients.iter_mut() {
            client.poll().unwrap();
        }
    }
}

fn connect_with_serial(
    broker: &mut TestBroker,
    client: &mut TestClient,
    serial: &str,
) {
    client.begin_connect_with_serial(serial).unwrap();
    pump(broker, &mut [client]);
    assert!(client.is_connected(), "client {serial} failed to connect");
}

#[test]
fn by_serial_handshake_assigns_sequential_permanent_ids() {
    let (bus, clock, _store, mut broker) = world();
    let mut client_a = Client::new(bus.endpoint(), clock.clone());
    let mut client_b = Client::new(bus.endpoint(), clock.clone());

    connect_with_serial(&mut broker, &mut client_a, "A1");
    connect_with_serial(&mut broker, &mut client_b, "B2");

    assert_eq!(client_a.client_id(), 1);
    assert_eq!(client_b.client_id(), 2);
    assert_eq!(broker.client_id_by_serial("A1"), Some(1));
    assert_eq!(broker.serial_by_client_id(2), Some("B2"));

    // Online status follows the first ID-bearing frame, not the
    // handshake itself.
    assert!(!broker.is_client_online(1));
    client_a.ping().unwrap();
    client_b.ping().unwrap();
    pump(&mut broker, &mut [&mut client_a, &mut client_b]);
    assert!(broker.is_client_online(1));
    assert!(broker.is_client_online(2));
    assert_eq!(broker.client_count(), 2);
}

#[test]
fn another_clients_handshake_is_ignored_on_the_shared_bus() {
    let (bus, clock, _store, mut broker) = world();
    let mut client_a = Client::new(bus.endpoint(), clock.clone());
    let mut client_b = Client::new(bus.endpoint(), clock.clone());

    connect_with_serial(&mut broker, &mut client_a, "A1");
    let id_of_a = client_a.client_id();

    // Client A stays on the bus while B's handshake flows past it.
    client_b.begin_connect_with_serial("B2").unwrap();
    pump(&mut broker, &mut [&mut client_a, &mut client_b]);

    assert_eq!(client_b.client_id(), 2);
    assert_eq!(client_a.client_id(), id_of_a);
    assert_eq!(client_a.serial_number(), Some("A1"));
}

#[test]
fn anonymous_handshake_gets_a_temporary_id() {
    let (bus, clock, _store, mut broker) = world();
    let mut client = Client::new(bus.endpoint(), clock.clone());
    client.begin_connect().unwrap();
    pump(&mut broker, &mut [&mut client]);

    assert!(client.is_connected());
    assert_eq!(client.client_id(), TEMPORARY_ID_MIN);
    // Temporary identities never reach the registry.
    assert_eq!(broker.registered_client_count(), 0);
}

#[test]
fn publish_reaches_the_subscriber_through_the_broker() {
    let (bus, clock, _store, mut broker) = world();
    let mut publisher = Client::new(bus.endpoint(), clock.clone());
    let mut subscriber = Client::new(bus.endpoint(), clock.clone());
    connect_with_serial(&mut broker, &mut publisher, "PUB");
    connect_with_serial(&mut broker, &mut subscriber, "SUB");

    let received: Rc<RefCell<Vec<(u16, Vec<u8>)>>> = Rc::default();
    let seen = received.clone();
    subscriber.on_message(move |hash, _name, payload| {
        seen.borrow_mut().push((hash, payload.to_vec()));
    });

    subscriber.subscribe("d").unwrap();
    pump(&mut broker, &mut [&mut publisher, &mut subscriber]);

    publisher.publish("d", b"hello").unwrap();
    pump(&mut broker, &mut [&mut publisher, &mut subscriber]);

    assert_eq!(received.borrow().len(), 1);
    assert_eq!(received.borrow()[0], (hash_topic("d"), b"hello".to_vec()));
}

#[test]
fn fragmented_publish_is_reassembled_end_to_end() {
    let (bus, clock, _store, mut broker) = world();
    let mut publisher = Client::new(bus.endpoint(), clock.clone());
    let mut subscriber = Client::new(bus.endpoint(), clock.clone());
    connect_with_serial(&mut broker, &mut publisher, "PUB");
    connect_with_serial(&mut broker, &mut subscriber, "SUB");

    let published: Rc<RefCell<Vec<Vec<u8>>>> = Rc::default();
    let seen = published.clone();
    broker.on_publish(move |_hash, _name, payload| {
        seen.borrow_mut().push(payload.to_vec());
    });
    let delivered: Rc<RefCell<Vec<Vec<u8>>>> = Rc::default();
    let seen = delivered.clone();
    subscriber.on_message(move |_hash, _name, payload| {
        seen.borrow_mut().push(payload.to_vec());
    });

    subscriber.subscribe("d").unwrap();
    pump(&mut broker, &mut [&mut publisher, &mut subscriber]);

    // 40 payload bytes + 3 header bytes: six extended frames on the
    // wire, one logical message at each receiver.
    let payload: Vec<u8> = (0u8..40).collect();
    publisher.publish("d", &payload).unwrap();
    pump(&mut broker, &mut [&mut publisher, &mut subscriber]);

    assert_eq!(published.borrow().len(), 1);
    assert_eq!(published.borrow()[0], payload);
    assert_eq!(delivered.borrow().len(), 1);
    assert_eq!(delivered.borrow()[0], payload);
}

#[test]
fn direct_message_is_delivered_and_acked() {
    let (bus, clock, _store, mut broker) = world();
    let mut client = Client::new(bus.endpoint(), clock.clone());
    connect_with_serial(&mut broker, &mut client, "A1");

    let received: Rc<RefCell<Vec<(u8, Vec<u8>)>>> = Rc::default();
    let seen = received.clone();
    broker.on_direct_message(move |sender, payload| {
        seen.borrow_mut().push((sender, payload.to_vec()));
    });

    client.send_direct_message(b"status?").unwrap();
    pump(&mut broker, &mut [&mut client]);

    assert_eq!(received.borrow().len(), 1);
    assert_eq!(received.borrow()[0], (1, b"status?".to_vec()));
}

#[test]
fn broker_direct_message_reaches_one_client_only() {
    let (bus, clock, _store, mut broker) = world();
    let mut client_a = Client::new(bus.endpoint(), clock.clone());
    let mut client_b = Client::new(bus.endpoint(), clock.clone());
    connect_with_serial(&mut broker, &mut client_a, "A1");
    connect_with_serial(&mut broker, &mut client_b, "B2");

    let for_a: Rc<RefCell<Vec<Vec<u8>>>> = Rc::default();
    let seen = for_a.clone();
    client_a.on_direct_message(move |_sender, payload| {
        seen.borrow_mut().push(payload.to_vec());
    });
    let for_b: Rc<RefCell<Vec<Vec<u8>>>> = Rc::default();
    let seen = for_b.clone();
    client_b.on_direct_message(move |_sender, payload| {
        seen.borrow_mut().push(payload.to_vec());
    });

    broker.send_direct_message(1, b"just you").unwrap();
    pump(&mut broker, &mut [&mut client_a, &mut client_b]);

    assert_eq!(for_a.borrow().len(), 1);
    assert!(for_b.borrow().is_empty());
}

#[test]
fn peer_message_flows_between_permanent_clients() {
    let (bus, clock, _store, mut broker) = world();
    let mut client_a = Client::new(bus.endpoint(), clock.clone());
    let mut client_b = Client::new(bus.endpoint(), clock.clone());
    connect_with_serial(&mut broker, &mut client_a, "A1");
    connect_with_serial(&mut broker, &mut client_b, "B2");

    let received: Rc<RefCell<Vec<(u8, Vec<u8>)>>> = Rc::default();
    let seen = received.clone();
    client_a.on_peer_message(move |sender, payload| {
        seen.borrow_mut().push((sender, payload.to_vec()));
    });

    client_b.send_peer_message(1, b"hi").unwrap();
    pump(&mut broker, &mut [&mut client_a, &mut client_b]);

    assert_eq!(received.borrow().len(), 1);
    assert_eq!(received.borrow()[0], (2, b"hi".to_vec()));
}

#[test]
fn temporary_client_is_denied_peer_messaging() {
    let (bus, clock, _store, mut broker) = world();
    let mut client_a = Client::new(bus.endpoint(), clock.clone());
    connect_with_serial(&mut broker, &mut client_a, "A1");

    let mut anon = Client::new(bus.endpoint(), clock.clone());
    anon.begin_connect().unwrap();
    pump(&mut broker, &mut [&mut client_a, &mut anon]);
    assert_eq!(anon.client_id(), TEMPORARY_ID_MIN);

    let received: Rc<RefCell<Vec<Vec<u8>>>> = Rc::default();
    let seen = received.clone();
    client_a.on_peer_message(move |_sender, payload| {
        seen.borrow_mut().push(payload.to_vec());
    });

    // The broker drops it silently; client A never observes anything.
    anon.send_peer_message(1, b"hi").unwrap();
    pump(&mut broker, &mut [&mut client_a, &mut anon]);
    assert!(received.borrow().is_empty());
}

#[test]
fn client_ping_measures_a_round_trip() {
    let (bus, clock, _store, mut broker) = world();
    let mut client = Client::new(bus.endpoint(), clock.clone());
    connect_with_serial(&mut broker, &mut client, "A1");

    client.ping().unwrap();
    clock.advance(3);
    pump(&mut broker, &mut [&mut client]);

    assert_eq!(client.last_round_trip_ms(), Some(3));
}
