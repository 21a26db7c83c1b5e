//! Wire message contract: the message-type registry and the frame-body
//! layouts, with length-guarded parsers.
//!
//! A frame shorter than the required prefix of its declared layout is
//! invalid and must never mutate state; every parser here returns
//! `None` for such frames so handlers can drop them silently.

/// Protocol message type, carried in the standard CAN ID of a
/// short-form frame or in the upper byte of an extended 29-bit ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MessageType {
    /// Client wants a topic.
    Subscribe = 0x01,
    /// Client drops a topic.
    Unsubscribe = 0x02,
    /// Client posts to a topic.
    Publish = 0x03,
    /// Broker→subscriber delivery.
    TopicData = 0x04,
    /// Client↔broker unicast.
    DirectMsg = 0x05,
    /// Liveness probe.
    Ping = 0x06,
    /// Liveness reply.
    Pong = 0x07,
    /// Unreliable receipt for a direct message.
    Ack = 0x08,
    /// Client↔client unicast relayed by the broker.
    PeerMsg = 0x09,
    /// Broker→client replay of a stored subscription.
    SubRestore = 0x0A,
    /// Broker→client identity assignment.
    IdResponse = 0xFE,
    /// Client→broker identity handshake.
    IdRequest = 0xFF,
}

impl MessageType {
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Subscribe),
            0x02 => Some(Self::Unsubscribe),
            0x03 => Some(Self::Publish),
            0x04 => Some(Self::TopicData),
            0x05 => Some(Self::DirectMsg),
            0x06 => Some(Self::Ping),
            0x07 => Some(Self::Pong),
            0x08 => Some(Self::Ack),
            0x09 => Some(Self::PeerMsg),
            0x0A => Some(Self::SubRestore),
            0xFE => Some(Self::IdResponse),
            0xFF => Some(Self::IdRequest),
            _ => None,
        }
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Body of SUBSCRIBE and SUB_RESTORE frames:
/// `[clientId][hash_hi][hash_lo][name_len][name…]` with the name part
/// optional.
#[derive(Debug, PartialEq, Eq)]
pub struct TopicControl<'a> {
    pub client_id: u8,
    pub hash: u16,
    pub name: Option<&'a [u8]>,
}

impl<'a> TopicControl<'a> {
    pub fn parse(body: &'a [u8]) -> Option<Self> {
        if body.len() < 3 {
            return None;
        }
        let name = if body.len() > 3 {
            let name_len = body[3] as usize;
            let available = body.len() - 4;
            Some(&body[4..4 + name_len.min(available)])
        } else {
            None
        };
        Some(Self {
            client_id: body[0],
            hash: u16::from_be_bytes([body[1], body[2]]),
            name,
        })
    }
}

/// Body of UNSUBSCRIBE frames: `[clientId][hash_hi][hash_lo]`.
#[derive(Debug, PartialEq, Eq)]
pub struct Unsubscribe {
    pub client_id: u8,
    pub hash: u16,
}

impl Unsubscribe {
    pub fn parse(body: &[u8]) -> Option<Self> {
        if body.len() < 3 {
            return None;
        }
        Some(Self {
            client_id: body[0],
            hash: u16::from_be_bytes([body[1], body[2]]),
        })
    }
}

/// Body of PUBLISH and TOPIC_DATA frames:
/// `[clientId][hash_hi][hash_lo][payload…]`. For PUBLISH the leading
/// byte is the publisher, for TOPIC_DATA the targeted subscriber.
#[derive(Debug, PartialEq, Eq)]
pub struct TopicPayload<'a> {
    pub client_id: u8,
    pub hash: u16,
    pub payload: &'a [u8],
}

impl<'a> TopicPayload<'a> {
    pub fn parse(body: &'a [u8]) -> Option<Self> {
        if body.len() < 3 {
            return None;
        }
        Some(Self {
            client_id: body[0],
            hash: u16::from_be_bytes([body[1], body[2]]),
            payload: &body[3..],
        })
    }
}

/// Body of a client→broker DIRECT_MSG: `[senderId][payload…]`.
#[derive(Debug, PartialEq, Eq)]
pub struct DirectToBroker<'a> {
    pub sender_id: u8,
    pub payload: &'a [u8],
}

impl<'a> DirectToBroker<'a> {
    pub fn parse(body: &'a [u8]) -> Option<Self> {
        let (&sender_id, payload) = body.split_first()?;
        Some(Self { sender_id, payload })
    }
}

/// Body of broker→client DIRECT_MSG and of PEER_MSG frames:
/// `[senderId][targetId][payload…]`.
#[derive(Debug, PartialEq, Eq)]
pub struct Unicast<'a> {
    pub sender_id: u8,
    pub target_id: u8,
    pub payload: &'a [u8],
}

impl<'a> Unicast<'a> {
    pub fn parse(body: &'a [u8]) -> Option<Self> {
        if body.len() < 2 {
            return None;
        }
        Some(Self {
            sender_id: body[0],
            target_id: body[1],
            payload: &body[2..],
        })
    }
}

/// Body of PING, PONG, and ACK frames: sender then target, with the
/// target byte absent on a client-initiated ping.
#[derive(Debug, PartialEq, Eq)]
pub struct Probe {
    pub sender_id: u8,
    pub target_id: Option<u8>,
}

impl Probe {
    pub fn parse(body: &[u8]) -> Option<Self> {
        let (&sender_id, rest) = body.split_first()?;
        Some(Self {
            sender_id,
            target_id: rest.first().copied(),
        })
    }
}

/// Body of an ID_RESPONSE frame, in either of its two forms.
#[derive(Debug, PartialEq, Eq)]
pub enum IdResponse<'a> {
    /// One-byte form answering an anonymous request.
    Anonymous { assigned_id: u8 },
    /// Echo form answering a by-serial request:
    /// `[assignedId][hasStoredSubs][serial_len][serial…]`.
    WithSerial {
        assigned_id: u8,
        has_stored_subs: bool,
        serial: &'a [u8],
    },
}

impl<'a> IdResponse<'a> {
    pub fn parse(body: &'a [u8]) -> Option<Self> {
        match body.len() {
            0 => None,
            1 => Some(Self::Anonymous {
                assigned_id: body[0],
            }),
            2 => None,
            _ => {
                let serial_len = body[2] as usize;
                let available = body.len() - 3;
                Some(Self::WithSerial {
                    assigned_id: body[0],
                    has_stored_subs: body[1] == 0x01,
                    serial: &body[3..3 + serial_len.min(available)],
                })
            }
        }
    }
}

/// Payload of the ACK frame acknowledging a direct message.
pub const ACK_PAYLOAD: &[u8] = b"ACK";
