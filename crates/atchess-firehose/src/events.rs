//! Chess events filtered out of the commit stream

use atchess_records::collections;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which record kind an event concerns, derived from the op path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    Game,
    Move,
    Challenge,
    ChallengeNotification,
    DrawOffer,
    Resignation,
    TimeViolation,
}

impl EventType {
    /// Map a collection NSID to its event type
    pub fn from_collection(collection: &str) -> Option<Self> {
        match collection {
            collections::GAME => Some(EventType::Game),
            collections::MOVE => Some(EventType::Move),
            collections::CHALLENGE => Some(EventType::Challenge),
            collections::CHALLENGE_NOTIFICATION => Some(EventType::ChallengeNotification),
            collections::DRAW_OFFER => Some(EventType::DrawOffer),
            collections::RESIGNATION => Some(EventType::Resignation),
            collections::TIME_VIOLATION => Some(EventType::TimeViolation),
            _ => None,
        }
    }
}

/// One chess record change observed on the stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChessEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Repository (DID) the commit came from
    pub repo: String,
    /// `<collection>/<rkey>` within that repository
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    /// `create`, `update`, or `delete`
    pub action: String,
    /// Observation time, not commit time
    pub time: DateTime<Utc>,
    /// Decoded record value; deletes carry none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Value>,
}

impl ChessEvent {
    /// `at://` URI of the record this event is about
    pub fn uri(&self) -> String {
        format!("at://{}/{}", self.repo, self.path)
    }

    /// The game this event belongs to: the record itself for game records,
    /// the `game.uri` ref for everything else that carries one
    pub fn game_uri(&self) -> Option<String> {
        match self.event_type {
            EventType::Game => Some(self.uri()),
            _ => self
                .record
                .as_ref()
                .and_then(|r| r["game"]["uri"].as_str())
                .map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_type_from_collection() {
        assert_eq!(
            EventType::from_collection("app.atchess.move"),
            Some(EventType::Move)
        );
        assert_eq!(
            EventType::from_collection("app.atchess.drawOffer"),
            Some(EventType::DrawOffer)
        );
        assert_eq!(EventType::from_collection("app.bsky.feed.post"), None);
    }

    #[test]
    fn test_game_uri_extraction() {
        let game_event = ChessEvent {
            event_type: EventType::Game,
            repo: "did:plc:alice".to_string(),
            path: "app.atchess.game/3kgame".to_string(),
            cid: Some("bafygame".to_string()),
            action: "update".to_string(),
            time: Utc::now(),
            record: None,
        };
        assert_eq!(
            game_event.game_uri().as_deref(),
            Some("at://did:plc:alice/app.atchess.game/3kgame")
        );

        let move_event = ChessEvent {
            event_type: EventType::Move,
            repo: "did:plc:bob".to_string(),
            path: "app.atchess.move/3kmove".to_string(),
            cid: Some("bafymove".to_string()),
            action: "create".to_string(),
            time: Utc::now(),
            record: Some(json!({
                "game": { "uri": "at://did:plc:alice/app.atchess.game/3kgame", "cid": "x" },
            })),
        };
        assert_eq!(
            move_event.game_uri().as_deref(),
            Some("at://did:plc:alice/app.atchess.game/3kgame")
        );

        let bare = ChessEvent {
            record: None,
            ..move_event
        };
        assert_eq!(bare.game_uri(), None);
    }
}
