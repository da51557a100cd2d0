//! Command surface
//!
//! One method per public operation, mapping straight onto the component
//! stack. A transport layer frames these however it likes; tests call them
//! directly. Commands act as the service account; OAuth sessions get their
//! own client via [`AppContext::service_for_session`].

use crate::context::AppContext;
use crate::error::{ApiError, ApiResult};
use atchess_engine::{ChallengeCreated, ChessService, CreateGameOptions, MoveReport, Notification, TimeStatus};
use atchess_firehose::Subscription;
use atchess_oauth::{LoginStart, OAuthSession};
use atchess_pdr::{AuthScheme, PdrClient, RecordRef, RepoClient};
use atchess_records::{ColorChoice, DrawOfferRecord, GameRecord, ResignationRecord, TimeControl,
    TimeViolationRecord};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Session facts safe to hand back to a client
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub did: String,
    pub handle: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: String,
}

impl From<&OAuthSession> for SessionView {
    fn from(session: &OAuthSession) -> Self {
        Self {
            did: session.did.clone(),
            handle: session.handle.clone(),
            expires_at: atchess_records::to_rfc3339(session.expires_at),
        }
    }
}

impl<C: RepoClient> AppContext<C> {
    // ── Games ──────────────────────────────────────────────────────

    pub async fn create_game(
        &self,
        opponent: &str,
        color: ColorChoice,
        time_control: Option<TimeControl>,
    ) -> ApiResult<(RecordRef, GameRecord)> {
        let created = self
            .service
            .create_game(
                opponent,
                color,
                CreateGameOptions {
                    time_control,
                    ..Default::default()
                },
            )
            .await?;
        self.processor.track_game(&created.0.uri);
        Ok(created)
    }

    pub async fn get_game(&self, game_uri: &str) -> ApiResult<(String, GameRecord)> {
        Ok(self.service.get_game(game_uri).await?)
    }

    pub async fn record_move(
        &self,
        game_uri: &str,
        from: &str,
        to: &str,
        promotion: Option<char>,
        expected_fen: Option<&str>,
    ) -> ApiResult<MoveReport> {
        Ok(self
            .service
            .record_move(game_uri, from, to, promotion, expected_fen)
            .await?)
    }

    pub async fn list_active_games(&self) -> ApiResult<Vec<(String, String, GameRecord)>> {
        Ok(self.service.list_active_games().await?)
    }

    // ── Challenges ─────────────────────────────────────────────────

    pub async fn create_challenge(
        &self,
        challenged: &str,
        color: ColorChoice,
        message: Option<&str>,
        time_control: Option<TimeControl>,
    ) -> ApiResult<ChallengeCreated> {
        Ok(self
            .service
            .create_challenge(challenged, &self.service_handle, color, message, time_control)
            .await?)
    }

    pub async fn accept_challenge(&self, challenge_uri: &str) -> ApiResult<(RecordRef, GameRecord)> {
        let created = self.service.accept_challenge(challenge_uri).await?;
        self.processor.track_game(&created.0.uri);
        Ok(created)
    }

    pub async fn list_challenge_notifications(&self) -> ApiResult<Vec<Notification>> {
        Ok(self.service.list_challenge_notifications().await?)
    }

    pub async fn delete_challenge_notification(&self, notification_uri: &str) -> ApiResult<()> {
        Ok(self
            .service
            .delete_challenge_notification(notification_uri)
            .await?)
    }

    // ── Draws and resignation ──────────────────────────────────────

    pub async fn offer_draw(
        &self,
        game_uri: &str,
        message: Option<&str>,
    ) -> ApiResult<(RecordRef, DrawOfferRecord)> {
        Ok(self.service.offer_draw(game_uri, message).await?)
    }

    pub async fn respond_draw(&self, offer_uri: &str, accept: bool) -> ApiResult<DrawOfferRecord> {
        Ok(self.service.respond_draw_offer(offer_uri, accept).await?)
    }

    pub async fn resign(
        &self,
        game_uri: &str,
        reason: Option<&str>,
    ) -> ApiResult<(RecordRef, ResignationRecord)> {
        Ok(self.service.resign_game(game_uri, reason).await?)
    }

    // ── Time control ───────────────────────────────────────────────

    pub async fn check_time_violation(&self, game_uri: &str) -> ApiResult<(bool, TimeStatus)> {
        Ok(self.service.check_violation(game_uri, Utc::now()).await?)
    }

    pub async fn claim_time_victory(
        &self,
        game_uri: &str,
    ) -> ApiResult<(RecordRef, TimeViolationRecord)> {
        Ok(self.service.claim_time_victory(game_uri, Utc::now()).await?)
    }

    pub async fn get_time_remaining(&self, game_uri: &str) -> ApiResult<TimeStatus> {
        Ok(self.service.time_remaining(game_uri).await?)
    }

    pub async fn check_abandonment(&self, game_uri: &str) -> ApiResult<(bool, TimeStatus)> {
        Ok(self.service.check_abandonment(game_uri, Utc::now()).await?)
    }

    pub async fn claim_abandoned(
        &self,
        game_uri: &str,
    ) -> ApiResult<(RecordRef, TimeViolationRecord)> {
        Ok(self.service.claim_abandoned(game_uri, Utc::now()).await?)
    }

    // ── Subscriptions ──────────────────────────────────────────────

    /// Watch a game; also marks it tracked so its events survive the
    /// processor filter
    pub fn subscribe_game(&self, game_uri: &str) -> Subscription {
        self.processor.track_game(game_uri);
        self.hub.subscribe_game(game_uri)
    }

    pub fn unsubscribe_game(&self, game_uri: &str, id: Uuid) {
        self.hub.unsubscribe_game(game_uri, id);
    }

    pub fn subscribe_player(&self, did: &str) -> Subscription {
        self.processor.track_player(did);
        self.hub.subscribe_player(did)
    }

    // ── OAuth ──────────────────────────────────────────────────────

    fn oauth(&self) -> ApiResult<&atchess_oauth::OAuthClient> {
        self.oauth
            .as_deref()
            .ok_or(ApiError::OAuthUnavailable)
    }

    pub async fn oauth_login(&self, handle: &str) -> ApiResult<LoginStart> {
        Ok(self.oauth()?.login(handle).await?)
    }

    pub async fn oauth_callback(&self, code: &str, state: &str, iss: &str) -> ApiResult<String> {
        Ok(self.oauth()?.callback(code, state, iss).await?)
    }

    pub fn get_session(&self, session_id: &str) -> ApiResult<SessionView> {
        Ok(SessionView::from(&self.oauth()?.get_session(session_id)?))
    }

    pub fn logout(&self, session_id: &str) -> ApiResult<bool> {
        Ok(self.oauth()?.logout(session_id))
    }

    /// A [`ChessService`] acting as the logged-in user, with the session's
    /// DPoP-bound token
    pub fn service_for_session(&self, session_id: &str) -> ApiResult<ChessService<PdrClient>> {
        let session = self.oauth()?.get_session(session_id)?;
        let client = PdrClient::with_token(
            &session.pds_url,
            AuthScheme::Dpop,
            &session.access_token,
            &session.did,
            &session.handle,
            Some(session.dpop_key.clone()),
        )
        .map_err(ApiError::Pdr)?;
        Ok(ChessService::new(client))
    }

    /// The client-metadata document served at `/client-metadata.json`
    pub fn client_metadata(&self) -> ApiResult<Value> {
        let oauth = self.oauth()?;
        Ok(atchess_oauth::client_metadata(
            &self.public_url,
            oauth.public_jwk(),
        ))
    }
}
