//! Client endpoint: identity handshake, local subscription mirror,
//! and the pub/sub operations.
//!
//! A client starts unassigned (`0xFF`). `connect` requests an identity
//! from the broker, anonymously (temporary ID) or with a serial number
//! (permanent ID). Because the bus is shared, a by-serial client only
//! accepts an ID_RESPONSE echoing its own serial; everything else on
//! the wire is someone else's handshake. Callbacks are boxed closures
//! and must not call back into client methods during dispatch.
use alloc::boxed::Box;

use crate::core::{
    clip_name, is_permanent_id, Payload, ShortName, BROKER_ID, MAX_CLIENT_TOPICS,
    MAX_EXTENDED_PAYLOAD, MAX_NAME_LEN, UNASSIGNED_ID,
};
use crate::error::ClientError;
use crate::protocol::messages::{
    IdResponse, MessageType, Probe, TopicControl, TopicPayload, Unicast,
};
use crate::protocol::topics::TopicDirectory;
use crate::protocol::transport::assembler::{AssemblyResult, ExtendedAssembler};
use crate::protocol::transport::can_frame::{CanFrame, CanId};
use crate::protocol::transport::send_message;
use crate::protocol::transport::traits::can_bus::CanBus;
use crate::protocol::transport::traits::clock::Clock;

/// Window within which an identical peer message from the same sender
/// is treated as a bus-level duplicate and suppressed (ms).
const PEER_DEDUP_WINDOW_MS: u64 = 50;
/// Poll cadence of the blocking connect loop (ms).
const CONNECT_POLL_DELAY_MS: u32 = 10;
/// Default bound for [`Client::connect`] (ms).
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

type MessageCallback = Box<dyn FnMut(u16, Option<&str>, &[u8])>;
type DirectMessageCallback = Box<dyn FnMut(u8, &[u8])>;
type EventCallback = Box<dyn FnMut()>;

/// Last forwarded peer message, kept for duplicate suppression.
struct PeerEcho {
    sender_id: u8,
    payload: Payload,
    at_ms: u64,
}

/// Publish/subscribe client over a CAN bus.
pub struct Client<C: CanBus, T: Clock> {
    bus: C,
    clock: T,
    topics: TopicDirectory,
    assembler: ExtendedAssembler,
    client_id: u8,
    connected: bool,
    serial: Option<ShortName>,
    subscribed: heapless::Vec<u16, MAX_CLIENT_TOPICS>,
    last_ping_ms: Option<u64>,
    last_pong_ms: Option<u64>,
    last_peer: Option<PeerEcho>,
    on_message: Option<MessageCallback>,
    on_direct_message: Option<DirectMessageCallback>,
    on_peer_message: Option<DirectMessageCallback>,
    on_connect: Option<EventCallback>,
    on_disconnect: Option<EventCallback>,
}

impl<C: CanBus, T: Clock> Client<C, T> {
    pub fn new(bus: C, clock: T) -> Self {
        Self {
            bus,
            clock,
            topics: TopicDirectory::new(),
            assembler: ExtendedAssembler::new(),
            client_id: UNASSIGNED_ID,
            connected: false,
            serial: None,
            subscribed: heapless::Vec::new(),
            last_ping_ms: None,
            last_pong_ms: None,
            last_peer: None,
            on_message: None,
            on_direct_message: None,
            on_peer_message: None,
            on_connect: None,
            on_disconnect: None,
        }
    }

    //==================================================================================CONNECTION

    /// Anonymous connect: blocks (polling) until a temporary ID
    /// arrives or `timeout_ms` elapses.
    pub fn connect(&mut self, timeout_ms: u64) -> Result<(), ClientError<C::Error>> {
        self.begin_connect()?;
        self.await_identity(timeout_ms)
    }

    /// By-serial connect: blocks (polling) until the broker echoes the
    /// serial back with an assigned permanent ID.
    pub fn connect_with_serial(
        &mut self,
        serial: &str,
        timeout_ms: u64,
    ) -> Result<(), ClientError<C::Error>> {
        self.begin_connect_with_serial(serial)?;
        self.await_identity(timeout_ms)
    }

    /// Non-blocking half of [`connect`](Self::connect): send the
    /// request and let the host drive [`poll`](Self::poll).
    pub fn begin_connect(&mut self) -> Result<(), ClientError<C::Error>> {
        self.serial = None;
        send_message(
            &mut self.bus,
            &mut self.clock,
            MessageType::IdRequest.as_u8(),
            &[],
        )
        .map_err(ClientError::Bus)
    }

    /// Non-blocking half of [`connect_with_serial`](Self::connect_with_serial).
    pub fn begin_connect_with_serial(
        &mut self,
        serial: &str,
    ) -> Result<(), ClientError<C::Error>> {
        self.serial = Some(crate::core::short_name(serial));
        let bytes = clip_name(serial).as_bytes();
        send_message(
            &mut self.bus,
            &mut self.clock,
            MessageType::IdRequest.as_u8(),
            bytes,
        )
        .map_err(ClientError::Bus)
    }

    fn await_identity(&mut self, timeout_ms: u64) -> Result<(), ClientError<C::Error>> {
        let started = self.clock.now_ms();
        loop {
            self.poll()?;
            if self.connected {
                return Ok(());
            }
            if self.clock.now_ms().saturating_sub(started) >= timeout_ms {
                #[cfg(feature = "defmt")]
                defmt::warn!("connect timed out");
                return Err(ClientError::ConnectTimeout);
            }
            self.clock.delay_ms(CONNECT_POLL_DELAY_MS);
        }
    }

    /// Drop the session: identity, mirror, and serial are gone, the
    /// disconnect callback fires once.
    pub fn end(&mut self) {
        let was_connected = self.connected;
        self.connected = false;
        self.client_id = UNASSIGNED_ID;
        self.serial = None;
        self.subscribed.clear();
        self.assembler.reset();
        if was_connected {
            if let Some(callback) = self.on_disconnect.as_mut() {
                callback();
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn client_id(&self) -> u8 {
        self.client_id
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    //==================================================================================POLL

    /// One cooperative tick: processes at most one inbound frame.
    pub fn poll(&mut self) -> Result<(), ClientError<C::Error>> {
        let now = self.clock.now_ms();
        if let Some(frame) = self.bus.try_recv().map_err(ClientError::Bus)? {
            self.handle_frame(&frame, now)?;
        }
        Ok(())
    }

    fn handle_frame(
        &mut self,
        frame: &CanFrame,
        now: u64,
    ) -> Result<(), ClientError<C::Error>> {
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
            CanId::Standard(raw) if raw <= 0xFF => self.dispatch(raw as u8, frame.payload(), now),
            CanId::Standard(_) => Ok(()),
        }
    }

    fn dispatch(
        &mut self,
        msg_type: u8,
        body: &[u8],
        now: u64,
    ) -> Result<(), ClientError<C::Error>> {
        match MessageType::from_u8(msg_type) {
            Some(MessageType::IdResponse) => {
                self.handle_id_response(body);
                Ok(())
            }
            Some(MessageType::TopicData) => {
                self.handle_topic_data(body);
                Ok(())
            }
            Some(MessageType::DirectMsg) => {
                self.handle_direct_message(body);
                Ok(())
            }
            Some(MessageType::PeerMsg) => {
                self.handle_peer_message(body, now);
                Ok(())
            }
            Some(MessageType::SubRestore) => {
                self.handle_sub_restore(body);
                Ok(())
            }
            Some(MessageType::Ping) => self.handle_ping(body),
            Some(MessageType::Pong) => {
                self.handle_pong(body, now);
                Ok(())
            }
            // ACK for our direct message: consumed, nothing to do.
            Some(MessageType::Ack) => Ok(()),
            _ => Ok(()),
        }
    }

    //==================================================================================HANDLERS

    fn handle_id_response(&mut self, body: &[u8]) {
        match IdResponse::parse(body) {
            Some(IdResponse::Anonymous { assigned_id }) => {
                // The one-byte form answers anonymous requests only; a
                // by-serial client leaves it for whoever asked.
                if self.serial.is_some() || assigned_id == UNASSIGNED_ID {
                    return;
                }
                self.accept_identity(assigned_id);
            }
            Some(IdResponse::WithSerial {
                assigned_id,
                serial,
                ..
            }) => {
                let Some(my_serial) = self.serial.as_ref() else {
                    return;
                };
                // Shared bus: an echo that is not our serial is another
                // client's handshake. Ignore it entirely.
                if serial != my_serial.as_bytes() {
                    #[cfg(feature = "defmt")]
                    defmt::trace!("ignoring id response for another serial");
                    return;
                }
                if assigned_id == UNASSIGNED_ID {
                    // Registry full on the broker side; stay unassigned.
                    return;
                }
                self.accept_identity(assigned_id);
            }
            None => {}
        }
    }

    fn accept_identity(&mut self, assigned_id: u8) {
        self.client_id = assigned_id;
        if !self.connected {
            self.connected = true;
            #[cfg(feature = "defmt")]
            defmt::info!("connected as {=u8}", assigned_id);
            if let Some(callback) = self.on_connect.as_mut() {
                callback();
            }
        }
    }

    fn handle_topic_data(&mut self, body: &[u8]) {
        let Some(data) = TopicPayload::parse(body) else {
            return;
        };
        if data.client_id != self.client_id {
            return;
        }
        let Self {
            topics, on_message, ..
        } = self;
        if let Some(callback) = on_message.as_mut() {
            callback(data.hash, topics.name_of(data.hash), data.payload);
        }
    }

    fn handle_direct_message(&mut self, body: &[u8]) {
        let Some(message) = Unicast::parse(body) else {
            return;
        };
        // Broker→client direct messages always originate from 0x00; a
        // client→broker frame seen on the shared bus has a client ID
        // there and is not for us, whatever its second byte says.
        if message.sender_id != BROKER_ID || message.target_id != self.client_id {
            return;
        }
        if let Some(callback) = self.on_direct_message.as_mut() {
            callback(message.sender_id, message.payload);
        }
    }

    fn handle_peer_message(&mut self, body: &[u8], now: u64) {
        let Some(message) = Unicast::parse(body) else {
            return;
        };
        if message.target_id != self.client_id {
            return;
        }
        // Peer messaging is a permanent-ID privilege on both ends; the
        // raw frame of a denied sender also crosses the shared bus, so
        // the receiver enforces the same rule the broker does.
        if !is_permanent_id(message.sender_id) || !is_permanent_id(self.client_id) {
            return;
        }
        if self.is_duplicate_peer(message.sender_id, message.payload, now) {
            #[cfg(feature = "defmt")]
            defmt::trace!("suppressing duplicate peer message");
            return;
        }
        self.last_peer = Some(PeerEcho {
            sender_id: message.sender_id,
            payload: Payload::from_slice(message.payload),
            at_ms: now,
        });
        if let Some(callback) = self.on_peer_message.as_mut() {
            callback(message.sender_id, message.payload);
        }
    }

    fn is_duplicate_peer(&self, sender_id: u8, payload: &[u8], now: u64) -> bool {
        self.last_peer.as_ref().is_some_and(|echo| {
            echo.sender_id == sender_id
                && echo.payload.as_slice() == payload
                && now.saturating_sub(echo.at_ms) <= PEER_DEDUP_WINDOW_MS
        })
    }

    fn handle_sub_restore(&mut self, body: &[u8]) {
        let Some(restore) = TopicControl::parse(body) else {
            return;
        };
        if restore.client_id != self.client_id {
            return;
        }
        if let Some(name) = restore.name.filter(|name| !name.is_empty()) {
            self.topics.learn_raw(restore.hash, name);
        }
        if !self.subscribed.contains(&restore.hash) {
            let _ = self.subscribed.push(restore.hash);
        }
        #[cfg(feature = "defmt")]
        defmt::debug!("restored subscription to {=u16:x}", restore.hash);
    }

    fn handle_ping(&mut self, body: &[u8]) -> Result<(), ClientError<C::Error>> {
        let Some(probe) = Probe::parse(body) else {
            return Ok(());
        };
        if probe.target_id != Some(self.client_id) {
            return Ok(());
        }
        let pong = [self.client_id, probe.sender_id];
        send_message(&mut self.bus, &mut self.clock, MessageType::Pong.as_u8(), &pong)
            .map_err(ClientError::Bus)
    }

    fn handle_pong(&mut self, body: &[u8], now: u64) {
        let Some(probe) = Probe::parse(body) else {
            return;
        };
        if probe.target_id == Some(self.client_id) {
            self.last_pong_ms = Some(now);
        }
    }

    //==================================================================================PUBSUB_OPS

    /// Subscribe to a topic: tells the broker (name included so it can
    /// learn the mapping) and mirrors the hash locally.
    pub fn subscribe(&mut self, topic: &str) -> Result<(), ClientError<C::Error>> {
        if !self.connected {
            return Err(ClientError::NotConnected);
        }
        let hash = self.topics.register(topic);
        let name = clip_name(topic).as_bytes();

        let mut body = [0u8; 4 + MAX_NAME_LEN];
        body[0] = self.client_id;
        body[1..3].copy_from_slice(&hash.to_be_bytes());
        body[3] = name.len() as u8;
        body[4..4 + name.len()].copy_from_slice(name);
        send_message(
            &mut self.bus,
            &mut self.clock,
            MessageType::Subscribe.as_u8(),
            &body[..4 + name.len()],
        )
        .map_err(ClientError::Bus)?;

        if !self.subscribed.contains(&hash) {
            let _ = self.subscribed.push(hash);
        }
        Ok(())
    }

    /// Drop a topic on both the broker and the local mirror.
    pub fn unsubscribe(&mut self, topic: &str) -> Result<(), ClientError<C::Error>> {
        if !self.connected {
            return Err(ClientError::NotConnected);
        }
        let hash = crate::core::hash_topic(topic);
        let mut body = [0u8; 3];
        body[0] = self.client_id;
        body[1..3].copy_from_slice(&hash.to_be_bytes());
        send_message(
            &mut self.bus,
            &mut self.clock,
            MessageType::Unsubscribe.as_u8(),
            &body,
        )
        .map_err(ClientError::Bus)?;

        if let Some(index) = self.subscribed.iter().position(|&stored| stored == hash) {
            self.subscribed.remove(index);
        }
        Ok(())
    }

    /// Publish a payload under a topic.
    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ClientError<C::Error>> {
        if !self.connected {
            return Err(ClientError::NotConnected);
        }
        let hash = self.topics.register(topic);

        let mut body = [0u8; MAX_EXTENDED_PAYLOAD];
        body[0] = self.client_id;
        body[1..3].copy_from_slice(&hash.to_be_bytes());
        let copied = payload.len().min(MAX_EXTENDED_PAYLOAD - 3);
        body[3..3 + copied].copy_from_slice(&payload[..copied]);
        send_message(
            &mut self.bus,
            &mut self.clock,
            MessageType::Publish.as_u8(),
            &body[..3 + copied],
        )
        .map_err(ClientError::Bus)
    }

    /// Send a direct message to the broker (the only acknowledged
    /// message in the protocol, and even that best-effort).
    pub fn send_direct_message(&mut self, payload: &[u8]) -> Result<(), ClientError<C::Error>> {
        if !self.connected {
            return Err(ClientError::NotConnected);
        }
        let mut body = [0u8; MAX_EXTENDED_PAYLOAD];
        body[0] = self.client_id;
        let copied = payload.len().min(MAX_EXTENDED_PAYLOAD - 1);
        body[1..1 + copied].copy_from_slice(&payload[..copied]);
        send_message(
            &mut self.bus,
            &mut self.clock,
            MessageType::DirectMsg.as_u8(),
            &body[..1 + copied],
        )
        .map_err(ClientError::Bus)
    }

    /// Send a unicast to another client via the broker. Requires both
    /// ends to hold permanent IDs; the broker drops it silently
    /// otherwise.
    pub fn send_peer_message(
        &mut self,
        target_id: u8,
        payload: &[u8],
    ) -> Result<(), ClientError<C::Error>> {
        if !self.connected {
            return Err(ClientError::NotConnected);
        }
        let mut body = [0u8; MAX_EXTENDED_PAYLOAD];
        body[0] = self.client_id;
        body[1] = target_id;
        let copied = payload.len().min(MAX_EXTENDED_PAYLOAD - 2);
        body[2..2 + copied].copy_from_slice(&payload[..copied]);
        send_message(
            &mut self.bus,
            &mut self.clock,
            MessageType::PeerMsg.as_u8(),
            &body[..2 + copied],
        )
        .map_err(ClientError::Bus)
    }

    /// Client-initiated liveness probe; the round trip is measured
    /// against the broker's PONG.
    pub fn ping(&mut self) -> Result<(), ClientError<C::Error>> {
        if !self.connected {
            return Err(ClientError::NotConnected);
        }
        send_message(
            &mut self.bus,
            &mut self.clock,
            MessageType::Ping.as_u8(),
            &[self.client_id],
        )
        .map_err(ClientError::Bus)?;
        self.last_ping_ms = Some(self.clock.now_ms());
        self.last_pong_ms = None;
        Ok(())
    }

    /// Round-trip time of the last completed ping/pong exchange.
    pub fn last_round_trip_ms(&self) -> Option<u64> {
        match (self.last_ping_ms, self.last_pong_ms) {
            (Some(ping), Some(pong)) if pong >= ping => Some(pong - ping),
            _ => None,
        }
    }

    //==================================================================================MIRROR

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscribed.contains(&crate::core::hash_topic(topic))
    }

    pub fn subscription_count(&self) -> u8 {
        self.subscribed.len() as u8
    }

    /// Visit the local mirror: hash and cached name per topic.
    pub fn list_subscribed_topics(&self, mut visit: impl FnMut(u16, Option<&str>)) {
        for &hash in &self.subscribed {
            visit(hash, self.topics.name_of(hash));
        }
    }

    //==================================================================================CALLBACKS

    /// Invoked for every TOPIC_DATA delivery addressed to this client.
    pub fn on_message(&mut self, callback: impl FnMut(u16, Option<&str>, &[u8]) + 'static) {
        self.on_message = Some(Box::new(callback));
    }

    /// Invoked for direct messages addressed to this client.
    pub fn on_direct_message(&mut self, callback: impl FnMut(u8, &[u8]) + 'static) {
        self.on_direct_message = Some(Box::new(callback));
    }

    /// Invoked for relayed peer messages addressed to this client,
    /// after duplicate suppression.
    pub fn on_peer_message(&mut self, callback: impl FnMut(u8, &[u8]) + 'static) {
        self.on_peer_message = Some(Box::new(callback));
    }

    /// Invoked once when an identity is accepted.
    pub fn on_connect(&mut self, callback: impl FnMut() + 'static) {
        self.on_connect = Some(Box::new(callback));
    }

    /// Invoked once when the session ends.
    pub fn on_disconnect(&mut self, callback: impl FnMut() + 'static) {
        self.on_disconnect = Some(Box::new(callback));
    }
}
