//! Fan-out hub
//!
//! Per-game and per-player subscriber sets with strictly non-blocking
//! publishing. Every subscriber owns a bounded channel; a full channel
//! means the subscriber is cut loose, exactly as if it had disconnected.
//! Order is preserved per subscriber, never across subscribers.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Default per-subscriber buffer depth
const DEFAULT_BUFFER: usize = 64;

/// What subscribers receive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameUpdate {
    #[serde(rename = "gameId")]
    pub game_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Repository the triggering event came from; empty for hub-generated
    /// updates such as spectator counts
    #[serde(rename = "repo", skip_serializing_if = "String::is_empty", default)]
    pub repo: String,
    pub data: Value,
}

struct Subscriber {
    id: Uuid,
    tx: mpsc::Sender<GameUpdate>,
}

/// A live subscription; dropping the receiver ends it
pub struct Subscription {
    pub id: Uuid,
    pub rx: mpsc::Receiver<GameUpdate>,
}

/// Subscriber tables for games and players
pub struct NotificationHub {
    games: RwLock<HashMap<String, Vec<Subscriber>>>,
    players: RwLock<HashMap<String, Vec<Subscriber>>>,
    buffer: usize,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER)
    }
}

impl NotificationHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
            players: RwLock::new(HashMap::new()),
            buffer,
        }
    }

    /// Watch one game. The subscriber immediately counts as a spectator.
    pub fn subscribe_game(&self, game_id: &str) -> Subscription {
        let subscription = Self::add(&self.games, game_id, self.buffer);
        self.publish_spectators(game_id);
        subscription
    }

    pub fn unsubscribe_game(&self, game_id: &str, id: Uuid) {
        Self::drop_subscriber(&self.games, game_id, id);
        self.publish_spectators(game_id);
    }

    /// Watch everything concerning one player (by DID)
    pub fn subscribe_player(&self, player_did: &str) -> Subscription {
        Self::add(&self.players, player_did, self.buffer)
    }

    pub fn unsubscribe_player(&self, player_did: &str, id: Uuid) {
        Self::drop_subscriber(&self.players, player_did, id);
    }

    /// Current spectator count for a game
    pub fn spectator_count(&self, game_id: &str) -> usize {
        self.games.read().get(game_id).map_or(0, Vec::len)
    }

    /// Route an update to its game's subscribers and, when the emitting
    /// repository is a tracked player, to that player's subscribers too
    pub fn publish(&self, update: &GameUpdate) {
        self.fan_out(&self.games, &update.game_id, update);
        if !update.repo.is_empty() {
            let repo = update.repo.clone();
            self.fan_out(&self.players, &repo, update);
        }
    }

    fn add(
        table: &RwLock<HashMap<String, Vec<Subscriber>>>,
        key: &str,
        buffer: usize,
    ) -> Subscription {
        let (tx, rx) = mpsc::channel(buffer);
        let id = Uuid::new_v4();
        table
            .write()
            .entry(key.to_string())
            .or_default()
            .push(Subscriber { id, tx });
        debug!("[HUB] subscriber {} joined {}", id, key);
        Subscription { id, rx }
    }

    fn drop_subscriber(
        table: &RwLock<HashMap<String, Vec<Subscriber>>>,
        key: &str,
        id: Uuid,
    ) {
        let mut table = table.write();
        if let Some(subscribers) = table.get_mut(key) {
            subscribers.retain(|s| s.id != id);
            if subscribers.is_empty() {
                table.remove(key);
            }
        }
    }

    /// Best-effort, non-blocking delivery. Subscribers whose buffers are
    /// full (or who dropped their receiver) are removed rather than waited
    /// on.
    fn fan_out(
        &self,
        table: &RwLock<HashMap<String, Vec<Subscriber>>>,
        key: &str,
        update: &GameUpdate,
    ) {
        let mut dead = Vec::new();
        {
            let table = table.read();
            let Some(subscribers) = table.get(key) else {
                return;
            };
            for subscriber in subscribers {
                if let Err(e) = subscriber.tx.try_send(update.clone()) {
                    warn!(
                        "[HUB] dropping subscriber {} of {}: {}",
                        subscriber.id, key, e
                    );
                    dead.push(subscriber.id);
                }
            }
        }
        if dead.is_empty() {
            return;
        }
        {
            let mut table = table.write();
            if let Some(subscribers) = table.get_mut(key) {
                subscribers.retain(|s| !dead.contains(&s.id));
                if subscribers.is_empty() {
                    table.remove(key);
                }
            }
        }
        // Dropped spectators change the count too
        if !std::ptr::eq(table, &self.players) {
            self.publish_spectators(key);
        }
    }

    fn publish_spectators(&self, game_id: &str) {
        let update = GameUpdate {
            game_id: game_id.to_string(),
            kind: "spectators".to_string(),
            repo: String::new(),
            data: json!({ "count": self.spectator_count(game_id) }),
        };
        self.fan_out(&self.games, game_id, &update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(game_id: &str, kind: &str) -> GameUpdate {
        GameUpdate {
            game_id: game_id.to_string(),
            kind: kind.to_string(),
            repo: String::new(),
            data: json!({}),
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_publish_order() {
        let hub = NotificationHub::default();
        let mut sub = hub.subscribe_game("game1");
        // Swallow the subscription's own spectator update
        assert_eq!(sub.rx.recv().await.unwrap().kind, "spectators");

        hub.publish(&update("game1", "move"));
        hub.publish(&update("game1", "drawOffer"));

        assert_eq!(sub.rx.recv().await.unwrap().kind, "move");
        assert_eq!(sub.rx.recv().await.unwrap().kind, "drawOffer");
    }

    #[tokio::test]
    async fn test_updates_only_reach_their_game() {
        let hub = NotificationHub::default();
        let mut sub1 = hub.subscribe_game("game1");
        let mut sub2 = hub.subscribe_game("game2");
        sub1.rx.recv().await.unwrap();
        sub2.rx.recv().await.unwrap();

        hub.publish(&update("game1", "move"));
        assert_eq!(sub1.rx.recv().await.unwrap().kind, "move");
        assert!(sub2.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_slow_subscriber_is_dropped_not_waited_on() {
        let hub = NotificationHub::new(2);
        let mut slow = hub.subscribe_game("game1");
        let mut healthy = hub.subscribe_game("game1");

        // Fill the slow subscriber's buffer without draining it; the
        // healthy one keeps up
        for i in 0..5 {
            hub.publish(&update("game1", &format!("move{i}")));
            let _ = healthy.rx.try_recv();
            while healthy.rx.try_recv().is_ok() {}
        }

        // The slow subscriber was cut once its buffer filled
        assert_eq!(hub.spectator_count("game1"), 1);

        // It still drains what it had buffered, then ends
        let mut drained = 0;
        while slow.rx.try_recv().is_ok() {
            drained += 1;
        }
        assert!(drained <= 3); // spectator updates + buffered moves, no more
    }

    #[tokio::test]
    async fn test_spectator_counts() {
        let hub = NotificationHub::default();
        let sub1 = hub.subscribe_game("game1");
        assert_eq!(hub.spectator_count("game1"), 1);
        let sub2 = hub.subscribe_game("game1");
        assert_eq!(hub.spectator_count("game1"), 2);

        hub.unsubscribe_game("game1", sub1.id);
        assert_eq!(hub.spectator_count("game1"), 1);
        hub.unsubscribe_game("game1", sub2.id);
        assert_eq!(hub.spectator_count("game1"), 0);
    }

    #[tokio::test]
    async fn test_player_subscription_keyed_by_repo() {
        let hub = NotificationHub::default();
        let mut sub = hub.subscribe_player("did:plc:alice");

        let mut tagged = update("game1", "move");
        tagged.repo = "did:plc:alice".to_string();
        hub.publish(&tagged);

        let mut other = update("game1", "move");
        other.repo = "did:plc:bob".to_string();
        hub.publish(&other);

        assert_eq!(sub.rx.recv().await.unwrap().repo, "did:plc:alice");
        assert!(sub.rx.try_recv().is_err());
    }
}
