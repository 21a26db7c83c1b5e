//! Broker endpoint: the single coordinator on the bus.
//!
//! The broker owns the CAN controller, the persistent store, and the
//! clock. Its [`poll`](Broker::poll) processes at most one inbound
//! frame plus any due liveness work, keeping each tick bounded under
//! the cooperative single-threaded model. Callbacks are plain boxed
//! closures; they must not call back into broker methods during
//! dispatch.
use alloc::boxed::Box;

use crate::core::{
    is_permanent_id, BROKER_ID, MAX_CLIENT_MAPPINGS, MAX_EXTENDED_PAYLOAD, MAX_NAME_LEN,
    MAX_SUBSCRIBERS_PER_TOPIC, UNASSIGNED_ID,
};
use crate::error::{BrokerError, RegistryError};
use crate::infra::storage::KeyValueStore;
use crate::protocol::messages::{
    DirectToBroker, MessageType, Probe, TopicControl, TopicPayload, Unicast, Unsubscribe,
    ACK_PAYLOAD,
};
use crate::protocol::topics::TopicDirectory;
use crate::protocol::transport::assembler::{AssemblyResult, ExtendedAssembler};
use crate::protocol::transport::can_frame::{CanFrame, CanId};
use crate::protocol::transport::traits::can_bus::CanBus;
use crate::protocol::transport::traits::clock::Clock;
use crate::protocol::transport::{
    send_message, FORWARD_DELAY_MS, RESTORE_FRAME_DELAY_MS, RESTORE_SETTLE_DELAY_MS,
};

pub mod liveness;
pub mod registry;
pub mod subscriptions;

mod connected;
mod persistence;

pub use connected::ConnectedSet;

use liveness::{LivenessEngine, PingConfig};
use registry::ClientRegistry;
use subscriptions::{StoredSubscriptionTable, SubscriptionTable};

/// Settling delay before the boot-time discovery ping wave (ms).
const STARTUP_PING_SETTLE_MS: u32 = 100;

type ConnectionCallback = Box<dyn FnMut(u8)>;
type PublishCallback = Box<dyn FnMut(u16, Option<&str>, &[u8])>;
type DirectMessageCallback = Box<dyn FnMut(u8, &[u8])>;

/// Publish/subscribe broker over a CAN bus.
pub struct Broker<C: CanBus, K: KeyValueStore, T: Clock> {
    bus: C,
    store: K,
    clock: T,
    topics: TopicDirectory,
    assembler: ExtendedAssembler,
    registry: ClientRegistry,
    subscriptions: SubscriptionTable,
    stored_subs: StoredSubscriptionTable,
    connected: ConnectedSet,
    liveness: LivenessEngine,
    on_client_connect: Option<ConnectionCallback>,
    on_client_disconnect: Option<ConnectionCallback>,
    on_publish: Option<PublishCallback>,
    on_direct_message: Option<DirectMessageCallback>,
}

impl<C: CanBus, K: KeyValueStore, T: Clock> Broker<C, K, T> {
    pub fn new(bus: C, store: K, clock: T) -> Self {
        Self {
            bus,
            store,
            clock,
            topics: TopicDirectory::new(),
            assembler: ExtendedAssembler::new(),
            registry: ClientRegistry::new(),
            subscriptions: SubscriptionTable::new(),
            stored_subs: StoredSubscriptionTable::new(),
            connected: ConnectedSet::new(),
            liveness: LivenessEngine::new(),
            on_client_connect: None,
            on_client_disconnect: None,
            on_publish: None,
            on_direct_message: None,
        }
    }

    /// Load every persisted namespace, rebuild the runtime tables from
    /// it, and (with auto-ping enabled) broadcast one discovery wave.
    pub fn begin(&mut self) -> Result<(), BrokerError<C::Error, K::Error>> {
        if let Some((mappings, next_id)) = persistence::load_registry(&mut self.store) {
            self.registry.restore(&mappings, next_id);
        }
        if let Some(entries) = persistence::load_stored_subscriptions(&mut self.store) {
            self.stored_subs.restore(&entries);
        }
        if let Some(names) = persistence::load_topic_names(&mut self.store) {
            for record in &names {
                self.topics.learn_raw(record.hash, record.name.as_bytes());
            }
        }
        self.liveness
            .set_config(persistence::load_ping_config(&mut self.store));

        // The active table is the union of all stored subscriptions.
        let Self {
            subscriptions,
            stored_subs,
            ..
        } = self;
        for entry in stored_subs.iter() {
            for &hash in &entry.topics {
                subscriptions.add(entry.client_id, hash);
            }
        }

        if self.liveness.config().enabled {
            let now = self.clock.now_ms();
            let Self {
                liveness, registry, ..
            } = self;
            for mapping in registry.iter().filter(|mapping| mapping.registered) {
                liveness.ensure_state(mapping.client_id, now);
            }
            self.clock.delay_ms(STARTUP_PING_SETTLE_MS);
            let now = self.clock.now_ms();
            self.run_ping_wave(now)?;
        }
        Ok(())
    }

    /// Drop the transient session state. Persisted namespaces and the
    /// in-memory registry survive.
    pub fn end(&mut self) {
        self.subscriptions.clear();
        self.connected.clear();
        self.liveness.clear_states();
        self.assembler.reset();
    }

    /// One cooperative tick: at most one inbound frame, then any due
    /// liveness work.
    pub fn poll(&mut self) -> Result<(), BrokerError<C::Error, K::Error>> {
        let now = self.clock.now_ms();
        if let Some(frame) = self.bus.try_recv().map_err(BrokerError::Bus)? {
            self.handle_frame(&frame, now)?;
        }
        let now = self.clock.now_ms();
        self.service_liveness(now)
    }

    //==================================================================================CALLBACKS

    /// Invoked when a client enters the connected set.
    pub fn on_client_connect(&mut self, callback: impl FnMut(u8) + 'static) {
        self.on_client_connect = Some(Box::new(callback));
    }

    /// Invoked when the liveness engine declares a client offline.
    pub fn on_client_disconnect(&mut self, callback: impl FnMut(u8) + 'static) {
        self.on_client_disconnect = Some(Box::new(callback));
    }

    /// Invoked for every inbound PUBLISH, before forwarding.
    pub fn on_publish(&mut self, callback: impl FnMut(u16, Option<&str>, &[u8]) + 'static) {
        self.on_publish = Some(Box::new(callback));
    }

    /// Invoked for every inbound client→broker direct message.
    pub fn on_direct_message(&mut self, callback: impl FnMut(u8, &[u8]) + 'static) {
        self.on_direct_message = Some(Box::new(callback));
    }

    //==================================================================================DISPATCH

    fn handle_frame(
        &mut self,
        frame: &CanFrame,
        now: u64,
    ) -> Result<(), BrokerError<C::Error, K::Error>> {
        match frame.id {
            CanId::Extended(_) => {
                if let AssemblyResult::Complete(message) = self.assembler.process_frame(frame, now)
                {
                    let mut body = [0u8; 1 + MAX_EXTENDED_PAYLOAD];
                    body[0] = message.sender_id;
                    let payload = message.payload.as_slice();
                    body[1..1 + payload.len()].copy_from_slice(payload);
                    self.dispatch(message.msg_type, &body[..1 + payload.len()], now)?;
                }
                Ok(())
            }
            CanId::Standard(raw) if raw <= 0xFF => {
                self.dispatch(raw as u8, frame.payload(), now)
            }
            CanId::Standard(_) => Ok(()),
        }
    }

    fn dispatch(
        &mut self,
        msg_type: u8,
        body: &[u8],
        now: u64,
    ) -> Result<(), BrokerError<C::Error, K::Error>> {
        match MessageType::from_u8(msg_type) {
            Some(MessageType::Subscribe) => self.handle_subscribe(body, now),
            Some(MessageType::Unsubscribe) => self.handle_unsubscribe(body, now),
            Some(MessageType::Publish) => self.handle_publish(body, now),
            Some(MessageType::DirectMsg) => self.handle_direct_message(body, now),
            Some(MessageType::Ping) => self.handle_ping(body, now),
            Some(MessageType::Pong) => self.handle_pong(body, now),
            Some(MessageType::PeerMsg) => self.handle_peer_message(body, now),
            Some(MessageType::IdRequest) => self.handle_id_request(body, now),
            // Remaining types are broker→client; nothing to do inbound.
            _ => Ok(()),
        }
    }

    /// First action of every handler whose frame leads with a client
    /// ID: a client is online the moment it shows any activity, even
    /// without a preceding handshake (rebooted node with a cached ID).
    fn track_client_activity(&mut self, client_id: u8, now: u64) {
        if client_id == BROKER_ID || client_id == UNASSIGNED_ID {
            return;
        }
        if self.connected.insert(client_id) {
            #[cfg(feature = "defmt")]
            defmt::debug!("client {=u8} connected", client_id);
            if let Some(callback) = self.on_client_connect.as_mut() {
                callback(client_id);
            }
        }
        if self.liveness.config().enabled {
            self.liveness.note_activity(client_id, now);
        }
    }

    fn handle_subscribe(
        &mut self,
        body: &[u8],
        now: u64,
    ) -> Result<(), BrokerError<C::Error, K::Error>> {
        let Some(control) = TopicControl::parse(body) else {
            return Ok(());
        };
        self.track_client_activity(control.client_id, now);

        if let Some(name) = control.name.filter(|name| !name.is_empty()) {
            if self.topics.learn_raw(control.hash, name) {
                persistence::save_topic_names(&mut self.store, &self.topics, &self.subscriptions)
                    .map_err(BrokerError::Store)?;
            }
        }

        self.subscriptions.add(control.client_id, control.hash);
        self.persist_client_topics(control.client_id)
    }

    fn handle_unsubscribe(
        &mut self,
        body: &[u8],
        now: u64,
    ) -> Result<(), BrokerError<C::Error, K::Error>> {
        let Some(control) = Unsubscribe::parse(body) else {
            return Ok(());
        };
        self.track_client_activity(control.client_id, now);
        if self.subscriptions.remove(control.client_id, control.hash) {
            self.persist_client_topics(control.client_id)?;
        }
        Ok(())
    }

    fn handle_publish(
        &mut self,
        body: &[u8],
        now: u64,
    ) -> Result<(), BrokerError<C::Error, K::Error>> {
        let Some(publish) = TopicPayload::parse(body) else {
            return Ok(());
        };
        self.track_client_activity(publish.client_id, now);

        let Self {
            topics, on_publish, ..
        } = self;
        if let Some(callback) = on_publish.as_mut() {
            callback(publish.hash, topics.name_of(publish.hash), publish.payload);
        }

        self.forward_to_subscribers(publish.hash, publish.payload)
            .map_err(BrokerError::Bus)
    }

    fn handle_direct_message(
        &mut self,
        body: &[u8],
        now: u64,
    ) -> Result<(), BrokerError<C::Error, K::Error>> {
        let Some(message) = DirectToBroker::parse(body) else {
            return Ok(());
        };
        self.track_client_activity(message.sender_id, now);

        if let Some(callback) = self.on_direct_message.as_mut() {
            callback(message.sender_id, message.payload);
        }

        // Unreliable receipt: one ACK, never retried.
        let mut ack = [0u8; 2 + ACK_PAYLOAD.len()];
        ack[0] = BROKER_ID;
        ack[1] = message.sender_id;
        ack[2..].copy_from_slice(ACK_PAYLOAD);
        send_message(&mut self.bus, &mut self.clock, MessageType::Ack.as_u8(), &ack)
            .map_err(BrokerError::Bus)
    }

    fn handle_ping(
        &mut self,
        body: &[u8],
        now: u64,
    ) -> Result<(), BrokerError<C::Error, K::Error>> {
        let Some(probe) = Probe::parse(body) else {
            return Ok(());
        };
        self.track_client_activity(probe.sender_id, now);

        let pong = [BROKER_ID, probe.sender_id];
        send_message(&mut self.bus, &mut self.clock, MessageType::Pong.as_u8(), &pong)
            .map_err(BrokerError::Bus)
    }

    fn handle_pong(
        &mut self,
        body: &[u8],
        now: u64,
    ) -> Result<(), BrokerError<C::Error, K::Error>> {
        if let Some(probe) = Probe::parse(body) {
            // Activity tracking alone resets the liveness accounting.
            self.track_client_activity(probe.sender_id, now);
        }
        Ok(())
    }

    fn handle_peer_message(
        &mut self,
        body: &[u8],
        now: u64,
    ) -> Result<(), BrokerError<C::Error, K::Error>> {
        let Some(unicast) = Unicast::parse(body) else {
            return Ok(());
        };
        self.track_client_activity(unicast.sender_id, now);

        // Peer messaging is reserved for clients with permanent
        // identities; anything else is dropped without a reply.
        if self.registry.find_by_id(unicast.sender_id).is_none()
            || self.registry.find_by_id(unicast.target_id).is_none()
        {
            #[cfg(feature = "defmt")]
            defmt::debug!(
                "peer message {=u8} -> {=u8} denied",
                unicast.sender_id,
                unicast.target_id
            );
            return Ok(());
        }

        send_message(
            &mut self.bus,
            &mut self.clock,
            MessageType::PeerMsg.as_u8(),
            body,
        )
        .map_err(BrokerError::Bus)
    }

    fn handle_id_request(
        &mut self,
        body: &[u8],
        now: u64,
    ) -> Result<(), BrokerError<C::Error, K::Error>> {
        if body.is_empty() {
            // Anonymous handshake: temporary ID, nothing persisted.
            let Self {
                registry,
                connected,
                bus,
                clock,
                ..
            } = self;
            let assigned = registry
                .allocate_temporary(|id| connected.contains(id))
                .unwrap_or(UNASSIGNED_ID);
            #[cfg(feature = "defmt")]
            defmt::info!("assigned temporary id {=u8}", assigned);
            return send_message(bus, clock, MessageType::IdResponse.as_u8(), &[assigned])
                .map_err(BrokerError::Bus);
        }

        let Ok(serial) = core::str::from_utf8(body) else {
            return Ok(());
        };

        match self.registry.register(serial) {
            Ok(identity) => {
                persistence::save_registry(&mut self.store, &self.registry)
                    .map_err(BrokerError::Store)?;
                #[cfg(feature = "defmt")]
                defmt::info!("assigned permanent id {=u8}", identity.client_id);

                let has_stored = self.stored_subs.has_stored_topics(identity.client_id);
                self.send_id_response(identity.client_id, has_stored, serial)
                    .map_err(BrokerError::Bus)?;

                if self.liveness.config().enabled {
                    self.liveness.ensure_state(identity.client_id, now);
                }
                if has_stored {
                    self.replay_stored_subscriptions(identity.client_id)
                        .map_err(BrokerError::Bus)?;
                }
                Ok(())
            }
            Err(RegistryError::Full) => {
                // No persistence change; the requester sees 0xFF.
                #[cfg(feature = "defmt")]
                defmt::warn!("registry full, rejecting serial request");
                self.send_id_response(UNASSIGNED_ID, false, serial)
                    .map_err(BrokerError::Bus)
            }
            Err(other) => Err(other.into()),
        }
    }

    fn send_id_response(
        &mut self,
        assigned_id: u8,
        has_stored: bool,
        serial: &str,
    ) -> Result<(), C::Error> {
        let echo = crate::core::clip_name(serial).as_bytes();
        let mut body = [0u8; 3 + MAX_NAME_LEN];
        body[0] = assigned_id;
        body[1] = has_stored as u8;
        body[2] = echo.len() as u8;
        body[3..3 + echo.len()].copy_from_slice(echo);
        send_message(
            &mut self.bus,
            &mut self.clock,
            MessageType::IdResponse.as_u8(),
            &body[..3 + echo.len()],
        )
    }

    /// Replay a reconnecting client's stored topics: re-populate the
    /// active table and send one paced SUB_RESTORE frame per topic so
    /// the client can rebuild its local mirror.
    fn replay_stored_subscriptions(&mut self, client_id: u8) -> Result<(), C::Error> {
        let Some(entry) = self.stored_subs.find(client_id) else {
            return Ok(());
        };
        let topics_to_restore = entry.topics.clone();

        self.clock.delay_ms(RESTORE_SETTLE_DELAY_MS);
        let Self {
            subscriptions,
            topics,
            bus,
            clock,
            ..
        } = self;
        for hash in topics_to_restore {
            subscriptions.add(client_id, hash);

            let name = topics.name_of(hash).unwrap_or("");
            let mut body = [0u8; 4 + MAX_NAME_LEN];
            body[0] = client_id;
            body[1..3].copy_from_slice(&hash.to_be_bytes());
            body[3] = name.len() as u8;
            body[4..4 + name.len()].copy_from_slice(name.as_bytes());
            send_message(
                bus,
                clock,
                MessageType::SubRestore.as_u8(),
                &body[..4 + name.len()],
            )?;
            clock.delay_ms(RESTORE_FRAME_DELAY_MS);
        }
        Ok(())
    }

    fn forward_to_subscribers(&mut self, hash: u16, payload: &[u8]) -> Result<(), C::Error> {
        let subscribers: heapless::Vec<u8, MAX_SUBSCRIBERS_PER_TOPIC> =
            self.subscriptions.subscribers_of(hash).iter().copied().collect();

        for subscriber in subscribers {
            let mut body = [0u8; MAX_EXTENDED_PAYLOAD];
            body[0] = subscriber;
            body[1..3].copy_from_slice(&hash.to_be_bytes());
            let copied = payload.len().min(MAX_EXTENDED_PAYLOAD - 3);
            body[3..3 + copied].copy_from_slice(&payload[..copied]);
            send_message(
                &mut self.bus,
                &mut self.clock,
                MessageType::TopicData.as_u8(),
                &body[..3 + copied],
            )?;
            self.clock.delay_ms(FORWARD_DELAY_MS);
        }
        Ok(())
    }

    //==================================================================================LIVENESS

    fn service_liveness(&mut self, now: u64) -> Result<(), BrokerError<C::Error, K::Error>> {
        if !self.liveness.wave_due(now) {
            return Ok(());
        }
        self.run_ping_wave(now)
    }

    fn run_ping_wave(&mut self, now: u64) -> Result<(), BrokerError<C::Error, K::Error>> {
        self.liveness.begin_wave(now);

        let targets: heapless::Vec<u8, MAX_CLIENT_MAPPINGS> = self
            .registry
            .iter()
            .filter(|mapping| mapping.registered)
            .map(|mapping| mapping.client_id)
            .collect();
        for client_id in targets {
            self.liveness.ensure_state(client_id, now);
            let ping = [BROKER_ID, client_id];
            send_message(&mut self.bus, &mut self.clock, MessageType::Ping.as_u8(), &ping)
                .map_err(BrokerError::Bus)?;
            self.liveness.mark_pinged(client_id);
        }

        // Offline transition: drop from the connected set, keep the
        // registry entry so the client may rejoin later.
        let offline: heapless::Vec<u8, MAX_CLIENT_MAPPINGS> = self
            .liveness
            .timed_out()
            .filter(|&client_id| self.connected.contains(client_id))
            .collect();
        for client_id in offline {
            self.connected.remove(client_id);
            #[cfg(feature = "defmt")]
            defmt::info!("client {=u8} timed out", client_id);
            if let Some(callback) = self.on_client_disconnect.as_mut() {
                callback(client_id);
            }
        }
        Ok(())
    }

    //==================================================================================BROKER_OPS

    /// Deliver a payload to one client under a topic hash.
    pub fn send_to_client(
        &mut self,
        client_id: u8,
        hash: u16,
        payload: &[u8],
    ) -> Result<(), BrokerError<C::Error, K::Error>> {
        let mut body = [0u8; MAX_EXTENDED_PAYLOAD];
        body[0] = client_id;
        body[1..3].copy_from_slice(&hash.to_be_bytes());
        let copied = payload.len().min(MAX_EXTENDED_PAYLOAD - 3);
        body[3..3 + copied].copy_from_slice(&payload[..copied]);
        send_message(
            &mut self.bus,
            &mut self.clock,
            MessageType::TopicData.as_u8(),
            &body[..3 + copied],
        )
        .map_err(BrokerError::Bus)
    }

    /// Send a broker→client direct message.
    pub fn send_direct_message(
        &mut self,
        client_id: u8,
        payload: &[u8],
    ) -> Result<(), BrokerError<C::Error, K::Error>> {
        let mut body = [0u8; MAX_EXTENDED_PAYLOAD];
        body[0] = BROKER_ID;
        body[1] = client_id;
        let copied = payload.len().min(MAX_EXTENDED_PAYLOAD - 2);
        body[2..2 + copied].copy_from_slice(&payload[..copied]);
        send_message(
            &mut self.bus,
            &mut self.clock,
            MessageType::DirectMsg.as_u8(),
            &body[..2 + copied],
        )
        .map_err(BrokerError::Bus)
    }

    /// Publish to every subscriber of a topic from the broker itself.
    pub fn broadcast(
        &mut self,
        hash: u16,
        payload: &[u8],
    ) -> Result<(), BrokerError<C::Error, K::Error>> {
        self.forward_to_subscribers(hash, payload)
            .map_err(BrokerError::Bus)
    }

    /// Visit every active topic row: hash, cached name, subscriber count.
    pub fn list_subscribed_topics(&self, mut visit: impl FnMut(u16, Option<&str>, u8)) {
        for row in self.subscriptions.iter() {
            visit(
                row.hash,
                self.topics.name_of(row.hash),
                row.subscribers.len() as u8,
            );
        }
    }

    //==================================================================================REGISTRY_OPS

    /// Bind a serial to a permanent ID (or return the existing one).
    pub fn register_client(
        &mut self,
        serial: &str,
    ) -> Result<u8, BrokerError<C::Error, K::Error>> {
        let identity = self.registry.register(serial)?;
        persistence::save_registry(&mut self.store, &self.registry)
            .map_err(BrokerError::Store)?;
        Ok(identity.client_id)
    }

    /// Flag a client unregistered and drop its active subscriptions.
    pub fn unregister_client(
        &mut self,
        client_id: u8,
    ) -> Result<(), BrokerError<C::Error, K::Error>> {
        self.registry.unregister(client_id)?;
        self.subscriptions.remove_client(client_id);
        self.persist_client_topics(client_id)?;
        persistence::save_registry(&mut self.store, &self.registry)
            .map_err(BrokerError::Store)
    }

    /// [`unregister_client`](Self::unregister_client) keyed by serial.
    pub fn unregister_client_by_serial(
        &mut self,
        serial: &str,
    ) -> Result<(), BrokerError<C::Error, K::Error>> {
        let client_id = self.registry.unregister_by_serial(serial)?;
        self.subscriptions.remove_client(client_id);
        self.persist_client_topics(client_id)?;
        persistence::save_registry(&mut self.store, &self.registry)
            .map_err(BrokerError::Store)
    }

    pub fn client_id_by_serial(&self, serial: &str) -> Option<u8> {
        self.registry
            .find_by_serial(serial)
            .map(|mapping| mapping.client_id)
    }

    pub fn serial_by_client_id(&self, client_id: u8) -> Option<&str> {
        self.registry
            .find_by_id(client_id)
            .map(|mapping| mapping.serial.as_str())
    }

    /// Rebind a client to a new serial number.
    pub fn update_client_serial(
        &mut self,
        client_id: u8,
        new_serial: &str,
    ) -> Result<(), BrokerError<C::Error, K::Error>> {
        self.registry.update_serial(client_id, new_serial)?;
        persistence::save_registry(&mut self.store, &self.registry)
            .map_err(BrokerError::Store)
    }

    /// Visit every mapping: id, serial, registered flag.
    pub fn list_registered_clients(&self, mut visit: impl FnMut(u8, &str, bool)) {
        for mapping in self.registry.iter() {
            visit(mapping.client_id, mapping.serial.as_str(), mapping.registered);
        }
    }

    pub fn registered_client_count(&self) -> usize {
        self.registry.len()
    }

    /// Clients currently in the connected set.
    pub fn client_count(&self) -> usize {
        self.connected.count()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_client_online(&self, client_id: u8) -> bool {
        self.connected.contains(client_id)
    }

    pub fn client_subscription_count(&self, client_id: u8) -> u8 {
        self.subscriptions.client_topic_count(client_id)
    }

    /// Subscribers of a topic, in delivery order.
    pub fn subscribers_of(&self, hash: u16) -> &[u8] {
        self.subscriptions.subscribers_of(hash)
    }

    //==================================================================================PING_CONFIG

    pub fn ping_config(&self) -> PingConfig {
        self.liveness.config()
    }

    /// Enable or disable the auto-ping engine; persisted immediately.
    pub fn set_auto_ping(
        &mut self,
        enabled: bool,
    ) -> Result<(), BrokerError<C::Error, K::Error>> {
        let mut config = self.liveness.config();
        config.enabled = enabled;
        self.liveness.set_config(config);
        if enabled {
            let now = self.clock.now_ms();
            let Self {
                liveness, registry, ..
            } = self;
            for mapping in registry.iter().filter(|mapping| mapping.registered) {
                liveness.ensure_state(mapping.client_id, now);
            }
        }
        persistence::save_ping_config(&mut self.store, &self.liveness.config())
            .map_err(BrokerError::Store)
    }

    /// Set the ping interval (validated); persisted immediately.
    pub fn set_ping_interval(
        &mut self,
        interval_ms: u32,
    ) -> Result<(), BrokerError<C::Error, K::Error>> {
        if !PingConfig::valid_interval(interval_ms) {
            return Err(BrokerError::InvalidPingConfig);
        }
        let mut config = self.liveness.config();
        config.interval_ms = interval_ms;
        self.liveness.set_config(config);
        persistence::save_ping_config(&mut self.store, &config).map_err(BrokerError::Store)
    }

    /// Set the missed-ping threshold (validated); persisted immediately.
    pub fn set_max_missed_pings(
        &mut self,
        max_missed: u8,
    ) -> Result<(), BrokerError<C::Error, K::Error>> {
        if !PingConfig::valid_max_missed(max_missed) {
            return Err(BrokerError::InvalidPingConfig);
        }
        let mut config = self.liveness.config();
        config.max_missed = max_missed;
        self.liveness.set_config(config);
        persistence::save_ping_config(&mut self.store, &config).map_err(BrokerError::Store)
    }

    //==================================================================================STORE_OPS

    /// Wipe the registry namespace and the in-memory mapping table.
    pub fn clear_stored_mappings(&mut self) -> Result<(), BrokerError<C::Error, K::Error>> {
        self.registry.clear();
        persistence::clear_registry(&mut self.store).map_err(BrokerError::Store)
    }

    /// Wipe the stored-subscription namespace and its runtime mirror.
    pub fn clear_stored_subscriptions(&mut self) -> Result<(), BrokerError<C::Error, K::Error>> {
        self.stored_subs.clear();
        persistence::clear_stored_subscriptions(&mut self.store).map_err(BrokerError::Store)
    }

    /// Wipe the stored-topic-name namespace. The runtime cache keeps
    /// what it already learned.
    pub fn clear_stored_topic_names(&mut self) -> Result<(), BrokerError<C::Error, K::Error>> {
        persistence::clear_topic_names(&mut self.store).map_err(BrokerError::Store)
    }

    //==================================================================================INTERNAL

    /// Mirror a permanent client's active topic set into the stored
    /// table and flush the namespace when it changed. Temporary
    /// clients are never persisted.
    fn persist_client_topics(
        &mut self,
        client_id: u8,
    ) -> Result<(), BrokerError<C::Error, K::Error>> {
        if !is_permanent_id(client_id) {
            return Ok(());
        }
        if self.stored_subs.capture(client_id, &self.subscriptions) {
            persistence::save_stored_subscriptions(&mut self.store, &self.stored_subs)
                .map_err(BrokerError::Store)?;
        }
        Ok(())
    }
}
