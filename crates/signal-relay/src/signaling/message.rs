//! Wire envelope exchanged between clients and the relay.
//!
//! On the wire a message is a JSON object:
//!
//! ```json
//! { "type": "host-change", "from": "user-1", "to": "user-2",
//!   "data": { "hostId": "user-1", "isHost": false }, "isHost": false }
//! ```
//!
//! Every field except `type` is optional. Internally the `type` tag and the
//! `data` payload are folded into [`MessageBody`], so each message kind only
//! carries the fields it uses. Signaling payloads (`offer`, `answer`,
//! `ice-candidate`, `chat`, `join`) are opaque to the relay and kept as raw
//! JSON objects.

use crate::errors::RelayError;

use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Opaque `data` payload of a relayed message.
pub type Payload = Option<Map<String, Value>>;

/// Message `type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Welcome,
    UserList,
    UserJoined,
    UserLeft,
    HostStatus,
    HostChange,
    Offer,
    Answer,
    IceCandidate,
    Chat,
    Join,
}

impl MessageType {
    /// Every defined message type.
    pub const ALL: [MessageType; 11] = [
        MessageType::Welcome,
        MessageType::UserList,
        MessageType::UserJoined,
        MessageType::UserLeft,
        MessageType::HostStatus,
        MessageType::HostChange,
        MessageType::Offer,
        MessageType::Answer,
        MessageType::IceCandidate,
        MessageType::Chat,
        MessageType::Join,
    ];

    /// Wire representation of the tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            MessageType::Welcome => "welcome",
            MessageType::UserList => "user-list",
            MessageType::UserJoined => "user-joined",
            MessageType::UserLeft => "user-left",
            MessageType::HostStatus => "host-status",
            MessageType::HostChange => "host-change",
            MessageType::Offer => "offer",
            MessageType::Answer => "answer",
            MessageType::IceCandidate => "ice-candidate",
            MessageType::Chat => "chat",
            MessageType::Join => "join",
        }
    }

    /// Parse a wire tag.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `welcome` payload, sent once to a newly connected client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeData {
    pub room_id: String,
    pub client_id: String,
    pub is_host: bool,
}

/// `user-list` payload: identifiers of the other members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserListData {
    pub users: Vec<String>,
}

/// `user-joined` payload.
///
/// Announcements triggered by a client `join` also carry `userId`, which
/// older clients read instead of `clientId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJoinedData {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub is_host: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl UserJoinedData {
    /// Id of the member that joined, whichever field carried it.
    #[must_use]
    pub fn joined_id(&self) -> &str {
        match self.user_id.as_deref() {
            Some(user_id) if self.client_id.is_empty() => user_id,
            _ => &self.client_id,
        }
    }
}

/// `user-left` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLeftData {
    pub user_id: String,
}

/// `host-status` payload: whether the recipient is host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostStatusData {
    pub is_host: bool,
}

/// `host-change` payload.
///
/// `is_host` is present when the message is individualized for the
/// recipient, absent on room-wide announcements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostChangeData {
    pub host_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_host: Option<bool>,
}

/// Message kind together with the payload that kind carries.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Welcome(WelcomeData),
    UserList(UserListData),
    UserJoined(UserJoinedData),
    UserLeft(UserLeftData),
    HostStatus(HostStatusData),
    HostChange(HostChangeData),
    Offer(Payload),
    Answer(Payload),
    IceCandidate(Payload),
    Chat(Payload),
    Join(Payload),
}

impl MessageBody {
    /// The `type` tag for this body.
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        match self {
            MessageBody::Welcome(_) => MessageType::Welcome,
            MessageBody::UserList(_) => MessageType::UserList,
            MessageBody::UserJoined(_) => MessageType::UserJoined,
            MessageBody::UserLeft(_) => MessageType::UserLeft,
            MessageBody::HostStatus(_) => MessageType::HostStatus,
            MessageBody::HostChange(_) => MessageType::HostChange,
            MessageBody::Offer(_) => MessageType::Offer,
            MessageBody::Answer(_) => MessageType::Answer,
            MessageBody::IceCandidate(_) => MessageType::IceCandidate,
            MessageBody::Chat(_) => MessageType::Chat,
            MessageBody::Join(_) => MessageType::Join,
        }
    }
}

/// A signaling message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "WireMessage")]
pub struct Message {
    /// Kind and payload.
    pub body: MessageBody,
    /// Sender identifier, stamped by the relay on relayed messages.
    pub from: Option<String>,
    /// Intended recipient. Advisory only: the relay never routes on it.
    pub to: Option<String>,
    /// Top-level host flag.
    pub is_host: Option<bool>,
}

impl Message {
    /// Create a message with no addressing.
    #[must_use]
    pub fn new(body: MessageBody) -> Self {
        Self {
            body,
            from: None,
            to: None,
            is_host: None,
        }
    }

    #[must_use]
    pub fn welcome(room_id: &str, client_id: &str, is_host: bool) -> Self {
        Self::new(MessageBody::Welcome(WelcomeData {
            room_id: room_id.to_string(),
            client_id: client_id.to_string(),
            is_host,
        }))
        .with_to(client_id)
    }

    #[must_use]
    pub fn user_list(users: Vec<String>) -> Self {
        Self::new(MessageBody::UserList(UserListData { users }))
    }

    #[must_use]
    pub fn user_joined(client_id: &str, is_host: bool) -> Self {
        Self::new(MessageBody::UserJoined(UserJoinedData {
            client_id: client_id.to_string(),
            is_host,
            user_id: None,
        }))
        .with_from(client_id)
    }

    /// `user-joined` re-sent in answer to a client `join`.
    #[must_use]
    pub fn join_announcement(client_id: &str, is_host: bool) -> Self {
        Self::new(MessageBody::UserJoined(UserJoinedData {
            client_id: client_id.to_string(),
            is_host,
            user_id: Some(client_id.to_string()),
        }))
        .with_from(client_id)
    }

    #[must_use]
    pub fn user_left(user_id: &str) -> Self {
        Self::new(MessageBody::UserLeft(UserLeftData {
            user_id: user_id.to_string(),
        }))
        .with_from(user_id)
    }

    #[must_use]
    pub fn host_status(is_host: bool) -> Self {
        Self::new(MessageBody::HostStatus(HostStatusData { is_host }))
    }

    #[must_use]
    pub fn host_change(host_id: &str, is_host: Option<bool>) -> Self {
        Self::new(MessageBody::HostChange(HostChangeData {
            host_id: host_id.to_string(),
            is_host,
        }))
    }

    /// Set the sender.
    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Set the advisory recipient.
    #[must_use]
    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    /// The `type` tag of this message.
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        self.body.message_type()
    }

    /// Decode one inbound text frame.
    ///
    /// Malformed JSON or a payload that does not fit its type yields
    /// [`RelayError::Decode`]; a well-formed envelope with an unknown tag
    /// yields [`RelayError::UnknownMessageType`].
    pub fn decode(text: &str) -> Result<Self, RelayError> {
        let wire: WireMessage = serde_json::from_str(text)?;
        Message::try_from(wire)
    }

    /// Encode as a JSON text frame payload.
    pub fn encode(&self) -> Result<String, RelayError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", self.message_type().as_str())?;
        if let Some(from) = &self.from {
            map.serialize_entry("from", from)?;
        }
        if let Some(to) = &self.to {
            map.serialize_entry("to", to)?;
        }
        match &self.body {
            MessageBody::Welcome(data) => map.serialize_entry("data", data)?,
            MessageBody::UserList(data) => map.serialize_entry("data", data)?,
            MessageBody::UserJoined(data) => map.serialize_entry("data", data)?,
            MessageBody::UserLeft(data) => map.serialize_entry("data", data)?,
            MessageBody::HostStatus(data) => map.serialize_entry("data", data)?,
            MessageBody::HostChange(data) => map.serialize_entry("data", data)?,
            MessageBody::Offer(payload)
            | MessageBody::Answer(payload)
            | MessageBody::IceCandidate(payload)
            | MessageBody::Chat(payload)
            | MessageBody::Join(payload) => {
                if let Some(payload) = payload {
                    map.serialize_entry("data", payload)?;
                }
            }
        }
        if let Some(is_host) = self.is_host {
            map.serialize_entry("isHost", &is_host)?;
        }
        map.end()
    }
}

/// Untyped envelope as it appears on the wire.
#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default, rename = "isHost")]
    is_host: Option<bool>,
}

impl TryFrom<WireMessage> for Message {
    type Error = RelayError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        let kind = MessageType::parse(&wire.kind)
            .ok_or_else(|| RelayError::UnknownMessageType(wire.kind.clone()))?;
        let data = wire.data;

        let body = match kind {
            MessageType::Welcome => MessageBody::Welcome(typed(kind, data)?),
            MessageType::UserList => MessageBody::UserList(typed(kind, data)?),
            MessageType::UserJoined => MessageBody::UserJoined(typed(kind, data)?),
            MessageType::UserLeft => MessageBody::UserLeft(typed(kind, data)?),
            MessageType::HostStatus => MessageBody::HostStatus(typed(kind, data)?),
            MessageType::HostChange => MessageBody::HostChange(typed(kind, data)?),
            MessageType::Offer => MessageBody::Offer(opaque(kind, data)?),
            MessageType::Answer => MessageBody::Answer(opaque(kind, data)?),
            MessageType::IceCandidate => MessageBody::IceCandidate(opaque(kind, data)?),
            MessageType::Chat => MessageBody::Chat(opaque(kind, data)?),
            MessageType::Join => MessageBody::Join(opaque(kind, data)?),
        };

        Ok(Message {
            body,
            from: wire.from,
            to: wire.to,
            is_host: wire.is_host,
        })
    }
}

fn typed<T: DeserializeOwned>(kind: MessageType, data: Option<Value>) -> Result<T, RelayError> {
    let data = data.ok_or_else(|| RelayError::Decode(format!("{kind} message requires data")))?;
    serde_json::from_value(data).map_err(|e| RelayError::Decode(format!("invalid {kind} data: {e}")))
}

fn opaque(kind: MessageType, data: Option<Value>) -> Result<Payload, RelayError> {
    match data {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(RelayError::Decode(format!(
            "{kind} data must be a JSON object"
        ))),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Payload {
        match value {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    fn sample(kind: MessageType) -> Message {
        match kind {
            MessageType::Welcome => Message::welcome("r1", "user-a", true),
            MessageType::UserList => {
                Message::user_list(vec!["user-b".to_string(), "user-c".to_string()])
                    .with_to("user-a")
            }
            MessageType::UserJoined => Message::user_joined("user-b", false),
            MessageType::UserLeft => Message::user_left("user-b"),
            MessageType::HostStatus => Message::host_status(true),
            MessageType::HostChange => Message::host_change("user-a", Some(false)),
            MessageType::Offer => Message::new(MessageBody::Offer(object(
                json!({"sdp": "v=0\r\no=- 46117 2 IN IP4 127.0.0.1", "type": "offer"}),
            )))
            .with_from("user-a")
            .with_to("user-b"),
            MessageType::Answer => Message::new(MessageBody::Answer(object(
                json!({"sdp": "v=0", "type": "answer"}),
            )))
            .with_from("user-b"),
            MessageType::IceCandidate => Message::new(MessageBody::IceCandidate(object(json!({
                "candidate": "candidate:1 1 udp 2122260223 10.0.0.2 54321 typ host",
                "sdpMid": "0",
                "sdpMLineIndex": 0
            }))))
            .with_from("user-a"),
            MessageType::Chat => {
                let mut msg =
                    Message::new(MessageBody::Chat(object(json!({"text": "hello", "ts": 1.5}))))
                        .with_from("user-a");
                msg.is_host = Some(true);
                msg
            }
            MessageType::Join => Message::new(MessageBody::Join(None)),
        }
    }

    #[test]
    fn test_every_type_survives_encode_decode() {
        for kind in MessageType::ALL {
            let original = sample(kind);
            let text = original.encode().unwrap();
            let decoded = Message::decode(&text).unwrap();
            assert_eq!(decoded, original, "round trip changed {kind}");
            assert_eq!(decoded.message_type(), kind);
        }
    }

    #[test]
    fn test_parse_tags() {
        for kind in MessageType::ALL {
            assert_eq!(MessageType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MessageType::parse("Offer"), None);
        assert_eq!(MessageType::parse(""), None);
    }

    #[test]
    fn test_serialized_shape_uses_wire_names() {
        let value = serde_json::to_value(Message::welcome("r1", "user-a", false)).unwrap();

        assert_eq!(value["type"], "welcome");
        assert_eq!(value["to"], "user-a");
        assert_eq!(value["data"]["roomId"], "r1");
        assert_eq!(value["data"]["clientId"], "user-a");
        assert_eq!(value["data"]["isHost"], false);
        assert!(value.get("from").is_none());
        assert!(value.get("isHost").is_none());
    }

    #[test]
    fn test_room_wide_host_change_omits_is_host() {
        let value = serde_json::to_value(Message::host_change("user-a", None)).unwrap();
        assert_eq!(value["data"], json!({"hostId": "user-a"}));
    }

    #[test]
    fn test_opaque_payload_without_data_has_no_data_key() {
        let value = serde_json::to_value(Message::new(MessageBody::Join(None))).unwrap();
        assert_eq!(value, json!({"type": "join"}));
    }

    #[test]
    fn test_decode_unknown_type() {
        let result = Message::decode(r#"{"type": "renegotiate", "data": {}}"#);
        assert!(matches!(result, Err(RelayError::UnknownMessageType(t)) if t == "renegotiate"));
    }

    #[test]
    fn test_decode_malformed_json() {
        assert!(matches!(
            Message::decode("{\"type\": \"offer\""),
            Err(RelayError::Decode(_))
        ));
        assert!(matches!(
            Message::decode(r#"{"data": {}}"#),
            Err(RelayError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_non_object_signaling_payload() {
        let result = Message::decode(r#"{"type": "offer", "data": "v=0"}"#);
        assert!(matches!(result, Err(RelayError::Decode(_))));
    }

    #[test]
    fn test_decode_typed_payload_requires_data() {
        let result = Message::decode(r#"{"type": "host-status"}"#);
        assert!(matches!(result, Err(RelayError::Decode(_))));
    }

    #[test]
    fn test_decode_null_data_is_absent() {
        let msg = Message::decode(r#"{"type": "chat", "data": null}"#).unwrap();
        assert_eq!(msg.body, MessageBody::Chat(None));
    }

    #[test]
    fn test_user_joined_accepts_user_id_only() {
        let msg = Message::decode(r#"{"type": "user-joined", "data": {"userId": "user-z"}}"#)
            .unwrap();
        match msg.body {
            MessageBody::UserJoined(data) => {
                assert_eq!(data.joined_id(), "user-z");
                assert!(!data.is_host);
            }
            other => panic!("expected user-joined, got {other:?}"),
        }
    }

    #[test]
    fn test_join_announcement_carries_user_id() {
        let value: serde_json::Value =
            serde_json::from_str(&Message::join_announcement("user-b", true).encode().unwrap())
                .unwrap();
        assert_eq!(value["data"]["userId"], "user-b");
        assert_eq!(value["data"]["clientId"], "user-b");
        assert_eq!(value["data"]["isHost"], true);

        let plain: serde_json::Value =
            serde_json::from_str(&Message::user_joined("user-b", true).encode().unwrap()).unwrap();
        assert!(plain["data"].get("userId").is_none());
    }

    #[test]
    fn test_client_supplied_fields_preserved() {
        let msg = Message::decode(
            r#"{"type": "offer", "from": "spoofed", "to": "user-b", "isHost": true, "data": {"sdp": "x"}}"#,
        )
        .unwrap();
        assert_eq!(msg.from.as_deref(), Some("spoofed"));
        assert_eq!(msg.to.as_deref(), Some("user-b"));
        assert_eq!(msg.is_host, Some(true));
    }
}
