//! Message framing over a small-payload transport.
//!
//! The transport only accepts chunks of at most [`MAX_CHUNK_SIZE`] bytes,
//! so an application message of arbitrary size is split into ordered
//! chunks on send and reassembled per stream key on receive.
//!
//! Chunk layout (big-endian):
//!
//! ```text
//! [ total_len: u32 ][ seq: u32 ][ body: <= MAX_CHUNK_BODY bytes ]
//! ```
//!
//! Completion is signaled by the declared total length, carried on every
//! chunk so any chunk is self-describing. Chunks also carry explicit
//! sequence numbers and are buffered out of order: the transport is not
//! assumed to preserve per-peer delivery order.
//!
//! Malformed chunks (truncated header, inconsistent declared length,
//! out-of-range or duplicate sequence numbers) are dropped with a warning
//! and never raise into the caller: a single malformed peer must not take
//! down the router.

use crate::error::{SyncError, SyncResult};
use crate::event::Status;
use driftsync_types::PeerId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Maximum bytes the transport accepts per chunk.
pub const MAX_CHUNK_SIZE: usize = 1300;

/// Bytes of header on every chunk: declared total length + sequence number.
pub const CHUNK_HEADER_LEN: usize = 8;

/// Maximum body bytes per chunk.
pub const MAX_CHUNK_BODY: usize = MAX_CHUNK_SIZE - CHUNK_HEADER_LEN;

/// Maximum reassembled message size (16 MiB).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// The traffic class a chunk arrived on.
///
/// Concurrent conversations with the same peer on different classes never
/// interleave into one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrafficClass {
    /// Group broadcast.
    Broadcast,
    /// Direct peer-to-peer message.
    Direct,
    /// Message from a group member.
    Group,
}

/// Identifies one logical, independently-reassembled message stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub peer: PeerId,
    pub class: TrafficClass,
}

impl StreamKey {
    pub fn new(peer: PeerId, class: TrafficClass) -> Self {
        Self { peer, class }
    }
}

/// A reassembled application message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Protocol version; messages from incompatible peers are dropped on
    /// ingress.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Command name.
    pub command: String,
    /// Outcome tag.
    #[serde(default)]
    pub status: Status,
    /// Correlation token for replies; empty when no reply is expected.
    #[serde(default)]
    pub rcode: String,
    /// Serialized parameter bag.
    #[serde(default)]
    pub params: serde_json::Value,
}

fn default_version() -> u32 {
    crate::protocol::PROTOCOL_VERSION
}

impl WireMessage {
    pub fn new(command: impl Into<String>, status: Status, params: serde_json::Value) -> Self {
        Self {
            version: crate::protocol::PROTOCOL_VERSION,
            command: command.into(),
            status,
            rcode: String::new(),
            params,
        }
    }

    /// Sets the correlation token.
    pub fn with_rcode(mut self, rcode: impl Into<String>) -> Self {
        self.rcode = rcode.into();
        self
    }
}

/// Serializes a message to its wire payload (JSON).
pub fn encode_message(message: &WireMessage) -> SyncResult<Vec<u8>> {
    Ok(serde_json::to_vec(message)?)
}

/// Splits a payload into ordered wire chunks, lazily.
///
/// Laziness lets the caller pace sends to transport backpressure. Fails up
/// front when the payload exceeds [`MAX_MESSAGE_SIZE`].
pub fn split_payload(payload: Vec<u8>) -> SyncResult<Chunks> {
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(SyncError::Framing(format!(
            "message too large: {} bytes",
            payload.len()
        )));
    }
    Ok(Chunks {
        payload,
        offset: 0,
        seq: 0,
        done: false,
    })
}

/// Convenience: encode then split.
pub fn split_message(message: &WireMessage) -> SyncResult<Chunks> {
    split_payload(encode_message(message)?)
}

/// Lazy chunk iterator produced by [`split_payload`].
#[derive(Debug)]
pub struct Chunks {
    payload: Vec<u8>,
    offset: usize,
    seq: u32,
    done: bool,
}

impl Iterator for Chunks {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        if self.done {
            return None;
        }
        let total = self.payload.len();
        let end = (self.offset + MAX_CHUNK_BODY).min(total);
        let body = &self.payload[self.offset..end];

        let mut chunk = Vec::with_capacity(CHUNK_HEADER_LEN + body.len());
        chunk.extend_from_slice(&(total as u32).to_be_bytes());
        chunk.extend_from_slice(&self.seq.to_be_bytes());
        chunk.extend_from_slice(body);

        self.offset = end;
        self.seq += 1;
        // An empty payload still yields exactly one (empty-bodied) chunk.
        if self.offset >= total {
            self.done = true;
        }
        Some(chunk)
    }
}

/// Number of chunks a payload of `total_len` bytes occupies.
fn chunk_count(total_len: usize) -> usize {
    if total_len == 0 {
        1
    } else {
        total_len.div_ceil(MAX_CHUNK_BODY)
    }
}

/// In-progress reconstruction of one stream's current message.
#[derive(Debug)]
struct Assembly {
    total_len: usize,
    bodies: BTreeMap<u32, Vec<u8>>,
    received: usize,
}

impl Assembly {
    fn new(total_len: usize) -> Self {
        Self {
            total_len,
            bodies: BTreeMap::new(),
            received: 0,
        }
    }

    fn complete(&self) -> bool {
        self.bodies.len() == chunk_count(self.total_len) && self.received == self.total_len
    }

    fn into_payload(self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(self.total_len);
        for body in self.bodies.into_values() {
            payload.extend_from_slice(&body);
        }
        payload
    }
}

/// Reassembles chunks into messages, multiplexed across stream keys.
///
/// Buffers are transient: a stream's buffer is discarded once a complete
/// message is yielded, and a new message under the same key starts fresh.
/// Streams for different keys are fully independent.
#[derive(Debug, Default)]
pub struct MsgBuffer {
    streams: HashMap<StreamKey, Assembly>,
}

impl MsgBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one incoming chunk; returns the reassembled payload once the
    /// stream's message completes, `None` until then.
    ///
    /// Never fails: malformed chunks are dropped with a warning.
    pub fn receive_chunk(&mut self, key: StreamKey, chunk: &[u8]) -> Option<Vec<u8>> {
        if chunk.len() < CHUNK_HEADER_LEN || chunk.len() > MAX_CHUNK_SIZE {
            warn!(?key, len = chunk.len(), "dropping chunk with bad size");
            return None;
        }
        let total_len = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as usize;
        let seq = u32::from_be_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
        let body = &chunk[CHUNK_HEADER_LEN..];

        if total_len > MAX_MESSAGE_SIZE {
            warn!(?key, total_len, "dropping chunk declaring oversize message");
            return None;
        }
        let count = chunk_count(total_len);
        if seq as usize >= count {
            warn!(?key, seq, count, "dropping chunk with out-of-range sequence");
            return None;
        }
        // All chunks but the last carry a full body.
        let expected_body = if (seq as usize) < count - 1 {
            MAX_CHUNK_BODY
        } else {
            total_len - (count - 1) * MAX_CHUNK_BODY
        };
        if body.len() != expected_body {
            warn!(
                ?key,
                seq,
                got = body.len(),
                expected = expected_body,
                "dropping chunk with inconsistent body length"
            );
            return None;
        }

        let assembly = self
            .streams
            .entry(key)
            .or_insert_with(|| Assembly::new(total_len));

        if assembly.total_len != total_len {
            warn!(
                ?key,
                declared = total_len,
                expected = assembly.total_len,
                "dropping chunk with inconsistent declared length"
            );
            return None;
        }
        if assembly.bodies.contains_key(&seq) {
            warn!(?key, seq, "dropping duplicate chunk");
            return None;
        }

        assembly.received += body.len();
        assembly.bodies.insert(seq, body.to_vec());

        if assembly.complete() {
            let assembly = self.streams.remove(&key)?;
            return Some(assembly.into_payload());
        }
        None
    }

    /// Feeds one incoming chunk; returns the decoded message once the
    /// stream's message completes.
    ///
    /// An undecodable completed payload is dropped with a warning.
    pub fn receive(&mut self, key: StreamKey, chunk: &[u8]) -> Option<WireMessage> {
        let payload = self.receive_chunk(key, chunk)?;
        match serde_json::from_slice(&payload) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(?key, error = %e, "dropping undecodable message");
                None
            }
        }
    }

    /// Number of streams with an in-progress buffer.
    pub fn pending_streams(&self) -> usize {
        self.streams.len()
    }

    /// Discards the in-progress buffer for `key`, if any. Called when a
    /// connection goes away mid-transfer.
    pub fn discard(&mut self, key: &StreamKey) {
        self.streams.remove(key);
    }
}
