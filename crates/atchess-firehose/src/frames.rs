//! Binary frame codec
//!
//! Each message is a 4-byte big-endian header length, the JSON-encoded
//! commit header, and a JSON block mapping CID → record value for the
//! records the commit carried.

use crate::{FirehoseError, FirehoseResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One record operation inside a commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoOp {
    /// `create`, `update`, or `delete`
    pub action: String,
    /// `<collection>/<rkey>`
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
}

/// Commit header preceding the record blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameHeader {
    pub op: i8,
    #[serde(rename = "t")]
    pub kind: String,
    pub seq: u64,
    pub repo: String,
    pub rev: String,
    #[serde(default)]
    pub ops: Vec<RepoOp>,
}

impl FrameHeader {
    /// Only `op=1 #commit` frames carry record operations
    pub fn is_commit(&self) -> bool {
        self.op == 1 && self.kind == "#commit"
    }
}

/// Serialize a frame: length-prefixed header, then the record blocks
pub fn encode_frame(
    header: &FrameHeader,
    blocks: &HashMap<String, Value>,
) -> FirehoseResult<Vec<u8>> {
    let header_bytes =
        serde_json::to_vec(header).map_err(|e| FirehoseError::Frame(e.to_string()))?;
    let block_bytes =
        serde_json::to_vec(blocks).map_err(|e| FirehoseError::Frame(e.to_string()))?;

    let mut out = Vec::with_capacity(4 + header_bytes.len() + block_bytes.len());
    out.extend_from_slice(&(header_bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&block_bytes);
    Ok(out)
}

/// Parse a frame back into header + blocks. An absent block section decodes
/// as an empty map.
pub fn decode_frame(data: &[u8]) -> FirehoseResult<(FrameHeader, HashMap<String, Value>)> {
    if data.len() < 4 {
        return Err(FirehoseError::Frame(format!(
            "frame of {} bytes has no length prefix",
            data.len()
        )));
    }
    let header_len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let rest = &data[4..];
    if rest.len() < header_len {
        return Err(FirehoseError::Frame(format!(
            "header length {header_len} exceeds frame ({} bytes left)",
            rest.len()
        )));
    }

    let header: FrameHeader = serde_json::from_slice(&rest[..header_len])
        .map_err(|e| FirehoseError::Frame(format!("bad header: {e}")))?;
    let block_bytes = &rest[header_len..];
    let blocks = if block_bytes.is_empty() {
        HashMap::new()
    } else {
        serde_json::from_slice(block_bytes)
            .map_err(|e| FirehoseError::Frame(format!("bad block section: {e}")))?
    };
    Ok((header, blocks))
}
