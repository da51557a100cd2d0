//! Event processor
//!
//! Sits between the stream and the hub: keeps the dynamic tracked-game and
//! tracked-player sets, decides which chess events matter, and turns the
//! survivors into `GameUpdate`s.

use crate::events::ChessEvent;
use crate::hub::{GameUpdate, NotificationHub};
use parking_lot::RwLock;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Filter + transform stage in front of the hub
pub struct EventProcessor {
    tracked_games: RwLock<HashSet<String>>,
    tracked_players: RwLock<HashSet<String>>,
    hub: Arc<NotificationHub>,
}

impl EventProcessor {
    pub fn new(hub: Arc<NotificationHub>) -> Self {
        Self {
            tracked_games: RwLock::new(HashSet::new()),
            tracked_players: RwLock::new(HashSet::new()),
            hub,
        }
    }

    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }

    pub fn track_game(&self, game_uri: &str) {
        self.tracked_games.write().insert(game_uri.to_string());
    }

    pub fn untrack_game(&self, game_uri: &str) {
        self.tracked_games.write().remove(game_uri);
    }

    pub fn track_player(&self, did: &str) {
        self.tracked_players.write().insert(did.to_string());
    }

    pub fn untrack_player(&self, did: &str) {
        self.tracked_players.write().remove(did);
    }

    /// Tracked games, for the deadline scanner
    pub fn tracked_games(&self) -> Vec<String> {
        self.tracked_games.read().iter().cloned().collect()
    }

    /// Filter rules: with both sets empty every chess event passes; a
    /// non-empty player set accepts events from those repositories; anything
    /// else must reference a tracked game.
    pub fn accepts(&self, event: &ChessEvent) -> bool {
        let players = self.tracked_players.read();
        let games = self.tracked_games.read();
        if players.is_empty() && games.is_empty() {
            return true;
        }
        if !players.is_empty() && players.contains(&event.repo) {
            return true;
        }
        event
            .game_uri()
            .map_or(false, |game_uri| games.contains(&game_uri))
    }

    /// Run one event through the filter and publish it if it survives.
    /// Returns the update for callers that want to observe it.
    pub fn process(&self, event: ChessEvent) -> Option<GameUpdate> {
        if !self.accepts(&event) {
            debug!("[PROCESSOR] dropping {} from {}", event.path, event.repo);
            return None;
        }
        let update = to_update(&event);
        self.hub.publish(&update);
        Some(update)
    }
}

/// Shape an accepted event for subscribers. Events without a game ref
/// (challenges and notifications) use their own record URI as the game id
/// so player-level subscribers can still key off something stable.
fn to_update(event: &ChessEvent) -> GameUpdate {
    let game_id = event.game_uri().unwrap_or_else(|| event.uri());
    GameUpdate {
        game_id,
        kind: serde_json::to_value(event.event_type)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string()),
        repo: event.repo.clone(),
        data: json!({
            "uri": event.uri(),
            "cid": event.cid,
            "action": event.action,
            "record": event.record,
        }),
    }
}
