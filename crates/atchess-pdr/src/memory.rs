//! In-memory repository network
//!
//! A whole multi-repo "federation" in one process, with genuine CID
//! compare-and-swap. The engine test suites run against this, and it doubles
//! as a scratch backend for local experiments. CIDs are content hashes
//! salted with a revision counter so every write produces a fresh CID.

use crate::error::{PdrError, PdrResult};
use crate::types::{FetchedRecord, RecordRef};
use crate::RepoClient;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct StoredRecord {
    cid: String,
    value: Value,
    seq: u64,
}

#[derive(Default)]
struct MemoryStore {
    records: Mutex<HashMap<(String, String, String), StoredRecord>>,
    handles: Mutex<HashMap<String, String>>,
    denied_repos: Mutex<HashSet<String>>,
    seq: Mutex<u64>,
}

impl MemoryStore {
    fn next_seq(&self) -> u64 {
        let mut seq = self.seq.lock();
        *seq += 1;
        *seq
    }
}

/// The shared network; hand out per-identity clients with [`MemoryPdr::client`]
#[derive(Clone, Default)]
pub struct MemoryPdr {
    store: Arc<MemoryStore>,
}

impl MemoryPdr {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client acting as `did`
    pub fn client(&self, did: &str) -> MemoryRepoClient {
        MemoryRepoClient {
            store: Arc::clone(&self.store),
            did: did.to_string(),
        }
    }

    pub fn register_handle(&self, handle: &str, did: &str) {
        self.store
            .handles
            .lock()
            .insert(handle.to_string(), did.to_string());
    }

    /// Make every write into `repo` fail with `Forbidden`, the way a real
    /// host refuses cross-repo writes
    pub fn deny_writes(&self, repo: &str) {
        self.store.denied_repos.lock().insert(repo.to_string());
    }
}

/// [`RepoClient`] over the shared in-memory store
#[derive(Clone)]
pub struct MemoryRepoClient {
    store: Arc<MemoryStore>,
    did: String,
}

fn make_cid(value: &Value, seq: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.to_string().as_bytes());
    hasher.update(seq.to_be_bytes());
    format!("bafy{}", hex::encode(&hasher.finalize()[..16]))
}

impl MemoryRepoClient {
    fn check_write_allowed(&self, repo: &str) -> PdrResult<()> {
        if self.store.denied_repos.lock().contains(repo) {
            return Err(PdrError::Forbidden {
                message: format!("writes to {repo} are not permitted"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RepoClient for MemoryRepoClient {
    fn did(&self) -> &str {
        &self.did
    }

    async fn create_record(
        &self,
        repo: &str,
        collection: &str,
        record: Value,
        rkey: Option<&str>,
    ) -> PdrResult<RecordRef> {
        self.check_write_allowed(repo)?;
        let seq = self.store.next_seq();
        let rkey = match rkey {
            Some(rkey) => rkey.to_string(),
            None => format!("3k{seq:08x}"),
        };

        let key = (repo.to_string(), collection.to_string(), rkey.clone());
        let mut records = self.store.records.lock();
        if records.contains_key(&key) {
            return Err(PdrError::Conflict {
                message: format!("record {rkey} already exists in {collection}"),
            });
        }
        let cid = make_cid(&record, seq);
        records.insert(
            key,
            StoredRecord {
                cid: cid.clone(),
                value: record,
                seq,
            },
        );
        Ok(RecordRef {
            uri: format!("at://{repo}/{collection}/{rkey}"),
            cid,
        })
    }

    async fn put_record(
        &self,
        repo: &str,
        collection: &str,
        rkey: &str,
        record: Value,
        swap_cid: Option<&str>,
    ) -> PdrResult<RecordRef> {
        self.check_write_allowed(repo)?;
        let seq = self.store.next_seq();
        let key = (repo.to_string(), collection.to_string(), rkey.to_string());
        let mut records = self.store.records.lock();

        if let (Some(expected), Some(current)) = (swap_cid, records.get(&key)) {
            if current.cid != expected {
                return Err(PdrError::Conflict {
                    message: format!(
                        "swap mismatch: expected {expected}, record is at {}",
                        current.cid
                    ),
                });
            }
        } else if swap_cid.is_some() && !records.contains_key(&key) {
            return Err(PdrError::NotFound {
                message: format!("no record {collection}/{rkey} to swap"),
            });
        }

        let cid = make_cid(&record, seq);
        records.insert(
            key,
            StoredRecord {
                cid: cid.clone(),
                value: record,
                seq,
            },
        );
        Ok(RecordRef {
            uri: format!("at://{repo}/{collection}/{rkey}"),
            cid,
        })
    }

    async fn get_record(
        &self,
        repo: &str,
        collection: &str,
        rkey: &str,
    ) -> PdrResult<FetchedRecord> {
        let key = (repo.to_string(), collection.to_string(), rkey.to_string());
        let records = self.store.records.lock();
        let stored = records.get(&key).ok_or_else(|| PdrError::NotFound {
            message: format!("record {collection}/{rkey} not found in {repo}"),
        })?;
        Ok(FetchedRecord {
            uri: format!("at://{repo}/{collection}/{rkey}"),
            cid: stored.cid.clone(),
            value: stored.value.clone(),
        })
    }

    async fn list_records(
        &self,
        repo: &str,
        collection: &str,
        limit: u32,
    ) -> PdrResult<Vec<FetchedRecord>> {
        let records = self.store.records.lock();
        let mut matching: Vec<(&(String, String, String), &StoredRecord)> = records
            .iter()
            .filter(|((r, c, _), _)| r == repo && c == collection)
            .collect();
        matching.sort_by_key(|(_, stored)| stored.seq);
        Ok(matching
            .into_iter()
            .take(limit as usize)
            .map(|((r, c, rkey), stored)| FetchedRecord {
                uri: format!("at://{r}/{c}/{rkey}"),
                cid: stored.cid.clone(),
                value: stored.value.clone(),
            })
            .collect())
    }

    async fn delete_record(&self, repo: &str, collection: &str, rkey: &str) -> PdrResult<()> {
        self.check_write_allowed(repo)?;
        let key = (repo.to_string(), collection.to_string(), rkey.to_string());
        if self.store.records.lock().remove(&key).is_none() {
            return Err(PdrError::NotFound {
                message: format!("record {collection}/{rkey} not found in {repo}"),
            });
        }
        Ok(())
    }

    async fn resolve_handle(&self, handle: &str) -> PdrResult<String> {
        self.store
            .handles
            .lock()
            .get(handle)
            .cloned()
            .ok_or_else(|| PdrError::NotFound {
                message: format!("unknown handle {handle}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_get() {
        let pdr = MemoryPdr::new();
        let client = pdr.client("did:plc:alice");
        let record = json!({"fen": "start", "status": "active"});

        let created = client
            .create_record("did:plc:alice", "app.atchess.game", record.clone(), None)
            .await
            .unwrap();
        assert!(created.uri.starts_with("at://did:plc:alice/app.atchess.game/"));

        let rkey = created.uri.rsplit('/').next().unwrap();
        let fetched = client
            .get_record("did:plc:alice", "app.atchess.game", rkey)
            .await
            .unwrap();
        assert_eq!(fetched.cid, created.cid);
        assert_eq!(fetched.value, record);
    }

    #[tokio::test]
    async fn test_explicit_rkey_conflicts_on_duplicate() {
        let pdr = MemoryPdr::new();
        let client = pdr.client("did:plc:alice");
        client
            .create_record("did:plc:alice", "app.atchess.game", json!({}), Some("ch123"))
            .await
            .unwrap();
        let err = client
            .create_record("did:plc:alice", "app.atchess.game", json!({}), Some("ch123"))
            .await
            .unwrap_err();
        assert!(matches!(err, PdrError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_swap_cid_semantics() {
        let pdr = MemoryPdr::new();
        let client = pdr.client("did:plc:alice");
        let created = client
            .create_record("did:plc:alice", "app.atchess.game", json!({"v": 1}), Some("g1"))
            .await
            .unwrap();

        // Current CID succeeds and produces a new CID
        let updated = client
            .put_record(
                "did:plc:alice",
                "app.atchess.game",
                "g1",
                json!({"v": 2}),
                Some(&created.cid),
            )
            .await
            .unwrap();
        assert_ne!(updated.cid, created.cid);

        // Stale CID always fails
        let err = client
            .put_record(
                "did:plc:alice",
                "app.atchess.game",
                "g1",
                json!({"v": 3}),
                Some(&created.cid),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PdrError::Conflict { .. }));

        // The losing write left no trace
        let current = client
            .get_record("did:plc:alice", "app.atchess.game", "g1")
            .await
            .unwrap();
        assert_eq!(current.value, json!({"v": 2}));
    }

    #[tokio::test]
    async fn test_denied_repo_rejects_writes_but_not_reads() {
        let pdr = MemoryPdr::new();
        let alice = pdr.client("did:plc:alice");
        let bob = pdr.client("did:plc:bob");

        bob.create_record("did:plc:bob", "app.atchess.game", json!({}), Some("g1"))
            .await
            .unwrap();
        pdr.deny_writes("did:plc:bob");

        let err = alice
            .create_record("did:plc:bob", "app.atchess.challengeNotification", json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PdrError::Forbidden { .. }));

        // Reads still pass
        alice
            .get_record("did:plc:bob", "app.atchess.game", "g1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_respects_insertion_order_and_limit() {
        let pdr = MemoryPdr::new();
        let client = pdr.client("did:plc:alice");
        for i in 0..5 {
            client
                .create_record(
                    "did:plc:alice",
                    "app.atchess.move",
                    json!({"i": i}),
                    None,
                )
                .await
                .unwrap();
        }
        let records = client
            .list_records("did:plc:alice", "app.atchess.move", 3)
            .await
            .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].value["i"], json!(0));
        assert_eq!(records[2].value["i"], json!(2));
    }

    #[tokio::test]
    async fn test_resolve_handle() {
        let pdr = MemoryPdr::new();
        pdr.register_handle("alice.example.com", "did:plc:alice");
        let client = pdr.client("did:plc:alice");
        assert_eq!(
            client.resolve_handle("alice.example.com").await.unwrap(),
            "did:plc:alice"
        );
        assert!(matches!(
            client.resolve_handle("nobody.example.com").await,
            Err(PdrError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_record() {
        let pdr = MemoryPdr::new();
        let client = pdr.client("did:plc:alice");
        client
            .create_record(
                "did:plc:alice",
                "app.atchess.challengeNotification",
                json!({}),
                Some("n1"),
            )
            .await
            .unwrap();
        client
            .delete_record("did:plc:alice", "app.atchess.challengeNotification", "n1")
            .await
            .unwrap();
        assert!(matches!(
            client
                .get_record("did:plc:alice", "app.atchess.challengeNotification", "n1")
                .await,
            Err(PdrError::NotFound { .. })
        ));
    }
}
