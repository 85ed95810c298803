//! WebSocket protocol messages for Tradewinds multiplayer.

use serde::{Deserialize, Serialize};
use tradewinds_core::{GameEvent, PlayerAction, Rejection, Snapshot};
use uuid::Uuid;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Claim a username for this connection
    Identify { username: String },

    /// Join (or create) a room by name
    JoinRoom { room: String },

    /// Leave current room
    LeaveRoom,

    /// Start the match with everyone currently in the room
    StartGame,

    /// Ask for the full current state of the match
    RequestSnapshot,

    /// Submit a game action
    Action { action: PlayerAction },

    /// Request room list
    ListRooms,

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Sent once a connection is accepted
    Welcome { connection: Uuid },

    /// All rooms with members; broadcast whenever membership changes
    RoomList { rooms: Vec<RoomInfo> },

    /// The match in `room` has started
    GameStarted { room: String },

    /// Match state as seen by this connection; sent on request and to a
    /// player who just drew a development card
    Snapshot { snapshot: Box<Snapshot> },

    /// Events from an accepted action, broadcast to the room
    Update { events: Vec<GameEvent> },

    /// The acting client's action was refused
    Rejected { reason: Rejection, message: String },

    Error { message: String },

    Pong,
}

impl ServerMessage {
    pub fn error(message: impl ToString) -> Self {
        ServerMessage::Error {
            message: message.to_string(),
        }
    }

    pub fn rejected(reason: Rejection) -> Self {
        ServerMessage::Rejected {
            reason,
            message: reason.to_string(),
        }
    }
}

/// Room information for clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub name: String,
    pub members: Vec<String>,
    pub status: RoomStatus,
}

/// Room status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Waiting,
    Playing,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_message_shape() {
        let text = json!({
            "type": "Action",
            "payload": { "action": { "type": "BuildRoad", "edge": 12 } }
        })
        .to_string();
        let msg: ClientMessage = serde_json::from_str(&text).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Action {
                action: PlayerAction::BuildRoad { edge: 12 }
            }
        ));
    }

    #[test]
    fn test_unit_messages() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"FinishStep"}"#).is_err());

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"Ping"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn test_rejected_carries_reason_code() {
        let value = serde_json::to_value(ServerMessage::rejected(Rejection::NotYourTurn)).unwrap();
        assert_eq!(value["type"], "Rejected");
        assert_eq!(value["payload"]["reason"], "NotYourTurn");
        assert_eq!(value["payload"]["message"], "Not your turn");
    }
}
