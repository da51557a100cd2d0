//! Collection NSIDs for the `app.atchess.*` namespace

/// Namespace prefix shared by every chess collection
pub const NAMESPACE: &str = "app.atchess.";

pub const GAME: &str = "app.atchess.game";
pub const MOVE: &str = "app.atchess.move";
pub const CHALLENGE: &str = "app.atchess.challenge";
pub const CHALLENGE_NOTIFICATION: &str = "app.atchess.challengeNotification";
pub const DRAW_OFFER: &str = "app.atchess.drawOffer";
pub const RESIGNATION: &str = "app.atchess.resignation";
pub const TIME_VIOLATION: &str = "app.atchess.timeViolation";

/// True when `collection` belongs to the chess namespace
pub fn is_chess_collection(collection: &str) -> bool {
    collection.starts_with(NAMESPACE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_membership() {
        assert!(is_chess_collection(GAME));
        assert!(is_chess_collection(CHALLENGE_NOTIFICATION));
        assert!(!is_chess_collection("app.bsky.feed.post"));
    }
}
