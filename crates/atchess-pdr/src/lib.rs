//! Personal-data-repository client
//!
//! Authenticated CRUD over a PDR host's XRPC surface. Game state mutates
//! exclusively through CID compare-and-swap, so every write here either
//! lands exactly where the caller observed it or fails with `Conflict`.
//!
//! The [`RepoClient`] trait fronts the HTTP implementation so the game
//! engine can run against [`memory::MemoryPdr`] in tests.

pub mod client;
pub mod error;
pub mod memory;
pub mod types;

pub use client::PdrClient;
pub use error::{PdrError, PdrResult};
pub use types::{AuthScheme, FetchedRecord, PdrSession, RecordRef};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Record CRUD against some repository network, acting as one identity
#[async_trait]
pub trait RepoClient: Send + Sync {
    /// DID this client acts as
    fn did(&self) -> &str;

    /// Create a record; the host assigns the rkey unless one is given.
    /// A provided rkey that already exists fails with `Conflict`.
    async fn create_record(
        &self,
        repo: &str,
        collection: &str,
        record: Value,
        rkey: Option<&str>,
    ) -> PdrResult<RecordRef>;

    /// Replace a record iff its current CID equals `swap_cid`
    async fn put_record(
        &self,
        repo: &str,
        collection: &str,
        rkey: &str,
        record: Value,
        swap_cid: Option<&str>,
    ) -> PdrResult<RecordRef>;

    async fn get_record(&self, repo: &str, collection: &str, rkey: &str)
        -> PdrResult<FetchedRecord>;

    async fn list_records(
        &self,
        repo: &str,
        collection: &str,
        limit: u32,
    ) -> PdrResult<Vec<FetchedRecord>>;

    async fn delete_record(&self, repo: &str, collection: &str, rkey: &str) -> PdrResult<()>;

    /// Resolve a handle to its DID
    async fn resolve_handle(&self, handle: &str) -> PdrResult<String>;
}

#[async_trait]
impl<T: RepoClient + ?Sized> RepoClient for Arc<T> {
    fn did(&self) -> &str {
        (**self).did()
    }

    async fn create_record(
        &self,
        repo: &str,
        collection: &str,
        record: Value,
        rkey: Option<&str>,
    ) -> PdrResult<RecordRef> {
        (**self).create_record(repo, collection, record, rkey).await
    }

    async fn put_record(
        &self,
        repo: &str,
        collection: &str,
        rkey: &str,
        record: Value,
        swap_cid: Option<&str>,
    ) -> PdrResult<RecordRef> {
        (**self)
            .put_record(repo, collection, rkey, record, swap_cid)
            .await
    }

    async fn get_record(
        &self,
        repo: &str,
        collection: &str,
        rkey: &str,
    ) -> PdrResult<FetchedRecord> {
        (**self).get_record(repo, collection, rkey).await
    }

    async fn list_records(
        &self,
        repo: &str,
        collection: &str,
        limit: u32,
    ) -> PdrResult<Vec<FetchedRecord>> {
        (**self).list_records(repo, collection, limit).await
    }

    async fn delete_record(&self, repo: &str, collection: &str, rkey: &str) -> PdrResult<()> {
        (**self).delete_record(repo, collection, rkey).await
    }

    async fn resolve_handle(&self, handle: &str) -> PdrResult<String> {
        (**self).resolve_handle(handle).await
    }
}
