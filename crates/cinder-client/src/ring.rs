//! Consistent-hash routing over the live node set.

use std::sync::Arc;

use crate::error::ClientError;
use crate::node::{Node, NodeId};

/// Ring positions generated per node. More positions smooth the key
/// distribution at the cost of a larger (but still tiny) sorted array.
const VIRTUAL_NODES: usize = 160;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a over raw bytes.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Immutable position table for one live-node set.
///
/// Rebuilt wholesale whenever liveness changes and swapped in behind the
/// client's `RwLock<Arc<Ring>>`; a lookup binds to whichever snapshot it
/// loaded, so rebuilds never block lookups in flight.
#[derive(Debug)]
pub(crate) struct Ring {
    /// `(position, owner)` sorted by position.
    entries: Vec<(u64, NodeId)>,
}

impl Ring {
    /// Builds the ring from the live subset of `nodes`. Dead nodes get no
    /// positions, so they can never be selected.
    pub(crate) fn build(nodes: &[Arc<Node>]) -> Self {
        let mut entries = Vec::new();
        for node in nodes {
            if !node.is_alive() {
                continue;
            }
            for idx in 0..VIRTUAL_NODES {
                let point = format!("{}-{}", node.addr(), idx);
                entries.push((fnv1a(point.as_bytes()), node.id()));
            }
        }
        entries.sort_unstable();
        Self { entries }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The node owning the lowest ring position. Deterministic target for
    /// commands that carry no key.
    pub(crate) fn first(&self) -> Option<NodeId> {
        self.entries.first().map(|&(_, id)| id)
    }

    /// Maps a key to its owning node.
    ///
    /// The hashed span follows the hash-tag rule (see [`hash_span`]), then
    /// the owner is the first position at or past the hash, wrapping to
    /// the lowest position when the hash lies past them all.
    pub(crate) fn locate(&self, key: &[u8]) -> Result<NodeId, ClientError> {
        if self.entries.is_empty() {
            return Err(ClientError::NoLiveNodes);
        }
        let hash = fnv1a(hash_span(key)?);
        let idx = self.entries.partition_point(|&(pos, _)| pos < hash);
        let idx = if idx == self.entries.len() { 0 } else { idx };
        Ok(self.entries[idx].1)
    }
}

/// The byte span hashed for `key`: the tag between the first `{` and the
/// first `}` after it when present, the whole key otherwise. Tagged keys
/// co-locate — every key sharing a tag hashes identically.
fn hash_span(key: &[u8]) -> Result<&[u8], ClientError> {
    let Some(open) = key.iter().position(|&b| b == b'{') else {
        return Ok(key);
    };
    match key[open + 1..].iter().position(|&b| b == b'}') {
        Some(close) => Ok(&key[open + 1..open + 1 + close]),
        None => Err(ClientError::UnterminatedKeyTag(
            String::from_utf8_lossy(key).into_owned(),
        )),
    }
}
