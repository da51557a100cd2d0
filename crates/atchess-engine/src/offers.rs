//! Draw offers and resignations

use crate::error::{EngineError, EngineResult};
use crate::service::{ChessService, LIST_LIMIT};
use atchess_pdr::{RecordRef, RepoClient};
use atchess_records::{
    collections, now_rfc3339, AtUri, DrawOfferRecord, DrawOfferStatus, GameRecord, GameStatus,
    ResignationRecord,
};
use atchess_rules::RulesEngine;
use serde_json::to_value;
use tracing::info;

impl<C: RepoClient, R: RulesEngine> ChessService<C, R> {
    /// Offer a draw in an active game. At most one pending offer per side.
    pub async fn offer_draw(
        &self,
        game_uri: &str,
        message: Option<&str>,
    ) -> EngineResult<(RecordRef, DrawOfferRecord)> {
        let (uri, cid, game) = self.fetch_game_as_participant(game_uri).await?;
        if game.status != GameStatus::Active {
            return Err(EngineError::GameNotActive);
        }

        let caller = self.client.did();
        let existing = self
            .client
            .list_records(caller, collections::DRAW_OFFER, LIST_LIMIT)
            .await?;
        for record in existing {
            let Ok(offer) = serde_json::from_value::<DrawOfferRecord>(record.value) else {
                continue;
            };
            if offer.game.uri == game_uri && offer.status == DrawOfferStatus::Pending {
                return Err(EngineError::DrawOfferPending);
            }
        }

        let offer = DrawOfferRecord {
            record_type: collections::DRAW_OFFER.to_string(),
            game: self.game_ref(&uri, &cid),
            offered_by: caller.to_string(),
            message: message.map(str::to_string),
            status: DrawOfferStatus::Pending,
            created_at: now_rfc3339(),
            responded_at: None,
            responded_by: None,
        };
        let created = self
            .client
            .create_record(
                caller,
                collections::DRAW_OFFER,
                to_value(&offer).expect("draw offer serializes"),
                None,
            )
            .await?;
        info!("[DRAW] {} offered a draw in {}", caller, game_uri);
        Ok((created, offer))
    }

    /// Accept or decline a pending draw offer. On acceptance, the game is
    /// marked drawn when the responder owns the Game record; otherwise
    /// observers derive the draw from the accepted offer.
    pub async fn respond_draw_offer(
        &self,
        offer_uri: &str,
        accept: bool,
    ) -> EngineResult<DrawOfferRecord> {
        let uri = AtUri::parse(offer_uri)?;
        if uri.collection != collections::DRAW_OFFER {
            return Err(EngineError::InvalidInput(format!(
                "{offer_uri} is not a draw offer"
            )));
        }
        let fetched = self
            .client
            .get_record(&uri.did, &uri.collection, &uri.rkey)
            .await?;
        let offer: DrawOfferRecord =
            serde_json::from_value(fetched.value).map_err(atchess_records::RecordError::from)?;
        if offer.status != DrawOfferStatus::Pending {
            return Err(EngineError::OfferNotPending);
        }

        let caller = self.client.did();
        if offer.offered_by == caller {
            return Err(EngineError::OwnOffer);
        }
        let (game_uri, game_cid, game) = self.fetch_game_as_participant(&offer.game.uri).await?;

        let updated = DrawOfferRecord {
            status: if accept {
                DrawOfferStatus::Accepted
            } else {
                DrawOfferStatus::Declined
            },
            responded_at: Some(now_rfc3339()),
            responded_by: Some(caller.to_string()),
            ..offer
        };
        self.client
            .put_record(
                &uri.did,
                &uri.collection,
                &uri.rkey,
                to_value(&updated).expect("draw offer serializes"),
                Some(&fetched.cid),
            )
            .await?;

        if accept && self.owns(&game_uri) && game.status == GameStatus::Active {
            self.finish_game(&game_uri, &game_cid, game, GameStatus::Draw)
                .await?;
        }
        info!(
            "[DRAW] {} {} offer {}",
            caller,
            if accept { "accepted" } else { "declined" },
            offer_uri
        );
        Ok(updated)
    }

    /// Resign. The Resignation record is canonical; the Game record is only
    /// updated when the resigner happens to own it.
    pub async fn resign_game(
        &self,
        game_uri: &str,
        reason: Option<&str>,
    ) -> EngineResult<(RecordRef, ResignationRecord)> {
        let (uri, cid, game) = self.fetch_game_as_participant(game_uri).await?;
        if game.status != GameStatus::Active {
            return Err(EngineError::GameNotActive);
        }

        let caller = self.client.did();
        let resignation = ResignationRecord {
            record_type: collections::RESIGNATION.to_string(),
            game: self.game_ref(&uri, &cid),
            resigning_player: caller.to_string(),
            reason: reason.map(str::to_string),
            created_at: now_rfc3339(),
        };
        let created = self
            .client
            .create_record(
                caller,
                collections::RESIGNATION,
                to_value(&resignation).expect("resignation serializes"),
                None,
            )
            .await?;

        if self.owns(&uri) {
            let winner = if game.white == caller {
                GameStatus::BlackWon
            } else {
                GameStatus::WhiteWon
            };
            self.finish_game(&uri, &cid, game, winner).await?;
        }
        info!("[GAME] {} resigned {}", caller, game_uri);
        Ok((created, resignation))
    }

    /// Compare-and-swap the game into a terminal status
    pub(crate) async fn finish_game(
        &self,
        uri: &AtUri,
        cid: &str,
        game: GameRecord,
        status: GameStatus,
    ) -> EngineResult<()> {
        let updated = GameRecord {
            status,
            updated_at: now_rfc3339(),
            ..game
        };
        self.client
            .put_record(
                &uri.did,
                &uri.collection,
                &uri.rkey,
                to_value(&updated).expect("game record serializes"),
                Some(cid),
            )
            .await?;
        Ok(())
    }
}
