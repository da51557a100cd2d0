//! `at://` URI parsing
//!
//! Records are referenced by URIs of the form
//! `at://<did>/<collection>/<rkey>`. Parsing is strict: the scheme must be
//! `at` and all three path segments must be present and non-empty.

use crate::{RecordError, RecordResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parsed reference to a record in some repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AtUri {
    /// Repository owner (a DID)
    pub did: String,
    /// Collection NSID, e.g. `app.atchess.game`
    pub collection: String,
    /// Record key within the collection
    pub rkey: String,
}

impl AtUri {
    pub fn new(did: &str, collection: &str, rkey: &str) -> Self {
        Self {
            did: did.to_string(),
            collection: collection.to_string(),
            rkey: rkey.to_string(),
        }
    }

    /// Parse `at://did/collection/rkey`, rejecting anything else
    pub fn parse(input: &str) -> RecordResult<Self> {
        let malformed = |reason: &str| RecordError::MalformedUri {
            uri: input.to_string(),
            reason: reason.to_string(),
        };

        let rest = input
            .strip_prefix("at://")
            .ok_or_else(|| malformed("scheme must be at://"))?;

        let mut segments = rest.split('/');
        let did = segments.next().unwrap_or_default();
        let collection = segments.next().unwrap_or_default();
        let rkey = segments.next().unwrap_or_default();

        if did.is_empty() || collection.is_empty() || rkey.is_empty() {
            return Err(malformed("expected at://did/collection/rkey"));
        }
        if segments.next().is_some() {
            return Err(malformed("trailing path segments"));
        }

        Ok(Self::new(did, collection, rkey))
    }
}

impl fmt::Display for AtUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at://{}/{}/{}", self.did, self.collection, self.rkey)
    }
}

impl FromStr for AtUri {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AtUri {
    type Error = RecordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AtUri> for String {
    fn from(uri: AtUri) -> Self {
        uri.to_string()
    }
}
