//! Challenges and their best-effort notifications
//!
//! The challenge itself is a strict write into the challenger's own
//! repository. The notification copy in the challenged player's repository
//! is the one deliberately best-effort write in the system: their host may
//! refuse it, and the challenge stays valid regardless.

use crate::error::{EngineError, EngineResult};
use crate::service::{ChessService, CreateGameOptions, LIST_LIMIT};
use atchess_pdr::{RecordRef, RepoClient};
use atchess_records::{
    collections, parse_rfc3339, proposed_game_rkey, AtUri, ChallengeNotificationRecord,
    ChallengeRecord, ChallengeStatus, ColorChoice, GameRecord, StrongRef, TimeControl,
};
use atchess_rules::RulesEngine;
use chrono::{Duration, Utc};
use serde_json::to_value;
use tracing::{info, warn};

/// Challenges live for 24 hours
const CHALLENGE_TTL_HOURS: i64 = 24;

/// Result of creating a challenge
#[derive(Debug, Clone)]
pub struct ChallengeCreated {
    pub challenge_ref: RecordRef,
    pub record: ChallengeRecord,
    /// Reference to the notification in the opponent's repo, when their
    /// host accepted the write
    pub notification_ref: Option<RecordRef>,
}

/// A challenge notification read back from the caller's repository
#[derive(Debug, Clone)]
pub struct Notification {
    pub uri: String,
    pub cid: String,
    pub record: ChallengeNotificationRecord,
}

impl<C: RepoClient, R: RulesEngine> ChessService<C, R> {
    /// Challenge another player. `challenged` may be a DID or a handle.
    /// `challenger_handle` is the caller's own handle, carried in the
    /// notification so the opponent's client can render it without a
    /// directory lookup.
    pub async fn create_challenge(
        &self,
        challenged: &str,
        challenger_handle: &str,
        color: ColorChoice,
        message: Option<&str>,
        time_control: Option<TimeControl>,
    ) -> EngineResult<ChallengeCreated> {
        let caller = self.client.did().to_string();
        let challenged_did = if challenged.starts_with("did:") {
            challenged.to_string()
        } else {
            self.client.resolve_handle(challenged).await?
        };
        if challenged_did == caller {
            return Err(EngineError::InvalidInput(
                "cannot challenge yourself".to_string(),
            ));
        }
        if let Some(tc) = &time_control {
            if !tc.is_valid() {
                return Err(EngineError::InvalidInput(format!(
                    "unsupported time control: {} at {} days/move",
                    tc.control_type, tc.days_per_move
                )));
            }
        }

        let now = Utc::now();
        let created_at = atchess_records::time::to_rfc3339(now);
        let expires_at =
            atchess_records::time::to_rfc3339(now + Duration::hours(CHALLENGE_TTL_HOURS));
        let proposed = proposed_game_rkey(&caller, &challenged_did, now.timestamp());

        let challenge = ChallengeRecord {
            record_type: collections::CHALLENGE.to_string(),
            challenger: caller.clone(),
            challenged: challenged_did.clone(),
            color,
            time_control: time_control.clone(),
            proposed_game_id: Some(proposed),
            message: message.map(str::to_string),
            status: ChallengeStatus::Pending,
            created_at: created_at.clone(),
            expires_at: expires_at.clone(),
        };
        let challenge_ref = self
            .client
            .create_record(
                &caller,
                collections::CHALLENGE,
                to_value(&challenge).expect("challenge serializes"),
                None,
            )
            .await?;
        info!("[CHALLENGE] {} challenged {}", caller, challenged_did);

        let notification = ChallengeNotificationRecord {
            record_type: collections::CHALLENGE_NOTIFICATION.to_string(),
            challenge: StrongRef::new(challenge_ref.uri.clone(), challenge_ref.cid.clone()),
            challenger: caller.clone(),
            challenger_handle: challenger_handle.to_string(),
            color,
            message: message.map(str::to_string),
            time_control,
            created_at,
            expires_at,
        };
        let notification_ref = match self
            .client
            .create_record(
                &challenged_did,
                collections::CHALLENGE_NOTIFICATION,
                to_value(&notification).expect("notification serializes"),
                None,
            )
            .await
        {
            Ok(created) => Some(created),
            // Best-effort: their host may refuse writes from us
            Err(e) => {
                warn!(
                    "[CHALLENGE] notification write to {} failed ({}); challenge stands",
                    challenged_did, e
                );
                None
            }
        };

        Ok(ChallengeCreated {
            challenge_ref,
            record: challenge,
            notification_ref,
        })
    }

    /// Accept a challenge: create the proposed game in the caller's own
    /// repository under the deterministic rkey, so both sides converge on
    /// one game identity.
    pub async fn accept_challenge(
        &self,
        challenge_uri: &str,
    ) -> EngineResult<(RecordRef, GameRecord)> {
        let uri = AtUri::parse(challenge_uri)?;
        if uri.collection != collections::CHALLENGE {
            return Err(EngineError::InvalidInput(format!(
                "{challenge_uri} is not a challenge"
            )));
        }
        let fetched = self
            .client
            .get_record(&uri.did, &uri.collection, &uri.rkey)
            .await?;
        let challenge: ChallengeRecord =
            serde_json::from_value(fetched.value).map_err(atchess_records::RecordError::from)?;

        if challenge.challenged != self.client.did() {
            return Err(EngineError::NotParticipant);
        }
        let expires = parse_rfc3339(&challenge.expires_at)?;
        if Utc::now() > expires {
            return Err(EngineError::ChallengeExpired(challenge.expires_at.clone()));
        }

        self.create_game(
            &challenge.challenger,
            challenge.color,
            CreateGameOptions {
                rkey: challenge.proposed_game_id.clone(),
                challenge: Some(StrongRef::new(challenge_uri, &fetched.cid)),
                time_control: challenge.time_control.clone(),
            },
        )
        .await
    }

    /// Notifications waiting in the caller's repository
    pub async fn list_challenge_notifications(&self) -> EngineResult<Vec<Notification>> {
        let records = self
            .client
            .list_records(
                self.client.did(),
                collections::CHALLENGE_NOTIFICATION,
                LIST_LIMIT,
            )
            .await?;
        let mut notifications = Vec::new();
        for record in records {
            let Ok(parsed) = serde_json::from_value::<ChallengeNotificationRecord>(record.value)
            else {
                continue;
            };
            notifications.push(Notification {
                uri: record.uri,
                cid: record.cid,
                record: parsed,
            });
        }
        Ok(notifications)
    }

    /// Delete one of the caller's own notifications (decline or clean up)
    pub async fn delete_challenge_notification(&self, notification_uri: &str) -> EngineResult<()> {
        let uri = AtUri::parse(notification_uri)?;
        if uri.collection != collections::CHALLENGE_NOTIFICATION {
            return Err(EngineError::InvalidInput(format!(
                "{notification_uri} is not a challenge notification"
            )));
        }
        if uri.did != self.client.did() {
            return Err(EngineError::NotOwner);
        }
        self.client
            .delete_record(&uri.did, &uri.collection, &uri.rkey)
            .await?;
        Ok(())
    }
}
