//! Process-wide wiring
//!
//! One [`AppContext`] owns the component stack and is handed to every
//! command handler; nothing hides in globals, so tests assemble a context
//! over the in-memory repository and get the whole system.

use atchess_engine::ChessService;
use atchess_firehose::{ChessEvent, EventProcessor, GameUpdate, NotificationHub};
use atchess_oauth::OAuthClient;
use atchess_pdr::RepoClient;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Store sweeps and deadline scans run on this cadence
pub const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Everything the command surface needs
pub struct AppContext<C: RepoClient> {
    pub service: Arc<ChessService<C>>,
    /// Handle of the service account (rides along in notifications)
    pub service_handle: String,
    /// Public base URL this deployment serves under
    pub public_url: String,
    /// OAuth subsystem; absent when no signing key is configured
    pub oauth: Option<Arc<OAuthClient>>,
    pub hub: Arc<NotificationHub>,
    pub processor: Arc<EventProcessor>,
}

impl<C: RepoClient> AppContext<C> {
    pub fn new(
        client: C,
        service_handle: &str,
        public_url: &str,
        oauth: Option<OAuthClient>,
    ) -> Self {
        let hub = Arc::new(NotificationHub::default());
        let processor = Arc::new(EventProcessor::new(Arc::clone(&hub)));
        Self {
            service: Arc::new(ChessService::new(client)),
            service_handle: service_handle.to_string(),
            public_url: public_url.trim_end_matches('/').to_string(),
            oauth: oauth.map(Arc::new),
            hub,
            processor,
        }
    }
}

/// Drain firehose events into the processor until the stream side closes
pub fn spawn_event_pump(
    processor: Arc<EventProcessor>,
    mut events: mpsc::Receiver<ChessEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            processor.process(event);
        }
        info!("[PUMP] event stream ended");
    })
}

/// Periodic eviction of expired sessions and stale pending authorizations
pub fn spawn_session_evictor(oauth: Arc<OAuthClient>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(MAINTENANCE_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            let now = Utc::now();
            oauth.sessions.evict_expired(now);
            oauth.pending.evict_expired(now);
        }
    })
}

/// Periodic deadline sweep over tracked games; violations are published to
/// the hub so watchers learn a claim is available
pub fn spawn_deadline_scan<C: RepoClient + 'static>(
    service: Arc<ChessService<C>>,
    processor: Arc<EventProcessor>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(MAINTENANCE_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            let games = processor.tracked_games();
            if games.is_empty() {
                continue;
            }
            let violations = service.scan_for_violations(&games, Utc::now()).await;
            for (game_uri, status) in violations {
                warn!(
                    "[CLOCK] {} is past deadline; {} may be claimed against",
                    game_uri, status.player_to_move
                );
                processor.hub().publish(&GameUpdate {
                    game_id: game_uri,
                    kind: "deadlinePassed".to_string(),
                    repo: String::new(),
                    data: json!({
                        "violatingPlayer": status.player_to_move,
                        "deadline": atchess_records::to_rfc3339(status.deadline),
                    }),
                });
            }
        }
    })
}
