//! Transport collaborator abstraction.
//!
//! The underlying P2P client (address book, NAT traversal, wire
//! encryption) is out of scope; this layer only needs a best-effort chunk
//! send plus the caller feeding incoming chunks into
//! [`PeerConnection::handle_chunk`](crate::connection::PeerConnection::handle_chunk).

use driftsync_types::PeerId;

/// A transport that can deliver one bounded chunk to a peer.
///
/// `send` is best-effort: a `false` return means the transport knows
/// delivery failed, `true` means it was handed off (it may still fail
/// silently downstream).
pub trait ChunkTransport: Send + Sync {
    fn send(&self, peer: PeerId, chunk: &[u8]) -> bool;
}

/// An in-memory transport for testing.
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// A mock transport endpoint; `pair` wires two together.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        outgoing: Arc<Mutex<VecDeque<(PeerId, Vec<u8>)>>>,
        connected: AtomicBool,
    }

    impl MockTransport {
        /// Creates an unconnected-to-anything endpoint that records sends.
        pub fn new() -> Self {
            Self {
                outgoing: Arc::new(Mutex::new(VecDeque::new())),
                connected: AtomicBool::new(true),
            }
        }

        /// Creates two endpoints. Sends are recorded per endpoint and the
        /// test pumps them across, so tests control delivery order and
        /// loss.
        pub fn pair() -> (Arc<Self>, Arc<Self>) {
            (Arc::new(Self::new()), Arc::new(Self::new()))
        }

        /// Takes the next recorded send.
        pub fn take_outgoing(&self) -> Option<(PeerId, Vec<u8>)> {
            self.outgoing.lock().unwrap().pop_front()
        }

        /// Drains all recorded sends.
        pub fn drain_outgoing(&self) -> Vec<(PeerId, Vec<u8>)> {
            self.outgoing.lock().unwrap().drain(..).collect()
        }

        /// Simulates the transport going away: later sends fail.
        pub fn close(&self) {
            self.connected.store(false, Ordering::SeqCst);
        }

        pub fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
    }

    impl ChunkTransport for MockTransport {
        fn send(&self, peer: PeerId, chunk: &[u8]) -> bool {
            if !self.is_connected() {
                return false;
            }
            self.outgoing
                .lock()
                .unwrap()
                .push_back((peer, chunk.to_vec()));
            true
        }
    }
}
