use bytes::Bytes;
use tracing::debug;

use crate::codec::{PacketHeader, HEADER_SIZE};
use crate::ring::RingBuffer;

/// Where frame reassembly currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No frame in progress.
    Idle,
    /// A header has been seen; `received` counts body bytes seen so far
    /// against the header's declared `target`.
    Accumulating { received: usize, target: usize },
    /// The active frame reached its declared length; flush pending.
    Complete,
}

/// Reassembles frames from raw read chunks.
///
/// One `Assembly` is shared across every accepted connection: this is a
/// deliberate single-producer design. Every connection boundary, accept or
/// close, resets it; interleaved writers get whatever the drop rules make
/// of their bytes.
///
/// Chunk classification rides on read boundaries: a chunk is a frame start
/// only when it is exactly [`HEADER_SIZE`] bytes and validates as a header.
/// Everything else is body. After a desync, recovery waits for the next
/// header to land on a read boundary; there is no byte-level rescanning.
pub struct Assembly {
    ring: RingBuffer,
    phase: Phase,
    connections: usize,
}

impl Assembly {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: RingBuffer::with_capacity(capacity),
            phase: Phase::Idle,
            connections: 0,
        }
    }

    /// Register an accepted connection. Wipes all shared assembly state so
    /// the new peer starts from a clean boundary.
    pub fn connection_opened(&mut self) {
        self.connections += 1;
        self.ring.clear();
        self.phase = Phase::Idle;
        debug!(connections = self.connections, "assembly reset for new connection");
    }

    /// Register a closed connection. Wipes all shared assembly state: a
    /// frame interrupted by a disconnect is abandoned, never completed by
    /// bytes from a surviving peer.
    pub fn connection_closed(&mut self) {
        self.connections = self.connections.saturating_sub(1);
        self.ring.clear();
        self.phase = Phase::Idle;
        debug!(connections = self.connections, "assembly reset on disconnect");
    }

    /// Feed one socket read. Returns a payload when this chunk caused a
    /// complete frame to be delivered.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Option<Bytes> {
        if let Some(header) = PacketHeader::decode(chunk) {
            // A new header always settles the previous frame first, by
            // delivery or by drop.
            let delivered = self.flush();
            self.append(chunk);
            self.phase = Phase::Accumulating {
                received: 0,
                target: header.body_len(),
            };
            return delivered;
        }

        match self.phase {
            Phase::Accumulating { received, target } => {
                let received = received + chunk.len();
                self.append(chunk);
                if received >= target {
                    self.phase = Phase::Complete;
                    self.flush()
                } else {
                    self.phase = Phase::Accumulating { received, target };
                    None
                }
            }
            // Body bytes with no frame declared: stray garbage, or a whole
            // frame coalesced into a single read. Flush sorts out which.
            Phase::Idle | Phase::Complete => {
                self.append(chunk);
                self.phase = Phase::Complete;
                self.flush()
            }
        }
    }

    /// Buffered bytes awaiting flush.
    pub fn buffered_len(&self) -> usize {
        self.ring.len()
    }

    /// Currently registered connections.
    pub fn connection_count(&self) -> usize {
        self.connections
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Release the receive buffer. Called when the owning role stops.
    pub fn cleanup(&mut self) {
        self.ring.cleanup();
        self.phase = Phase::Idle;
    }

    fn append(&mut self, chunk: &[u8]) {
        // Counters advance on bytes *seen* even when the buffer refuses
        // them; an overflowed frame then completes and flush drops it.
        if !self.ring.produce(chunk) {
            debug!(
                len = chunk.len(),
                buffered = self.ring.len(),
                "receive buffer full, chunk not stored"
            );
        }
    }

    /// Settle whatever is buffered: deliver one consistent frame, or drop.
    fn flush(&mut self) -> Option<Bytes> {
        if self.connections == 0 {
            // Nobody is attached; leave the bytes for the next accept to wipe.
            return None;
        }
        self.phase = Phase::Idle;

        let buffered = self.ring.len();
        if buffered <= HEADER_SIZE {
            self.ring.clear();
            return None;
        }

        let header = PacketHeader::decode(&self.ring.tail()[..HEADER_SIZE]);
        let header = match header {
            Some(header) => header,
            None => {
                debug!(buffered, "no valid header at buffer start, dropping");
                self.ring.clear();
                return None;
            }
        };

        let body_len = header.body_len();
        let available = buffered - HEADER_SIZE;
        if body_len > available && body_len > 0 {
            debug!(declared = body_len, available, "frame body incomplete, dropping");
            self.ring.clear();
            return None;
        }

        let payload = Bytes::copy_from_slice(&self.ring.tail()[HEADER_SIZE..HEADER_SIZE + body_len]);
        self.ring.clear();
        if payload.is_empty() {
            None
        } else {
            Some(payload)
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::codec::PROTOCOL_VERSION;

    fn header_chunk(body_len: usize) -> [u8; HEADER_SIZE] {
        PacketHeader::for_payload(body_len)
            .expect("test payload should fit")
            .encode()
    }

    fn attached(capacity: usize) -> Assembly {
        let mut assembly = Assembly::with_capacity(capacity);
        assembly.connection_opened();
        assembly
    }

    #[test]
    fn header_then_single_body_chunk_delivers() {
        let mut assembly = attached(1024);
        assert!(assembly.push_chunk(&header_chunk(5)).is_none());
        let payload = assembly.push_chunk(b"hello").expect("frame should deliver");
        assert_eq!(payload.as_ref(), b"hello");
        assert_eq!(assembly.phase(), Phase::Idle);
        assert_eq!(assembly.buffered_len(), 0);
    }

    #[test]
    fn split_body_delivers_once() {
        let mut assembly = attached(1024);
        assert!(assembly.push_chunk(&header_chunk(5)).is_none());
        assert!(assembly.push_chunk(b"he").is_none());
        assert_eq!(
            assembly.phase(),
            Phase::Accumulating {
                received: 2,
                target: 5
            }
        );
        let payload = assembly.push_chunk(b"llo").expect("frame should deliver");
        assert_eq!(payload.as_ref(), b"hello");
    }

    #[test]
    fn back_to_back_frames_deliver_in_order() {
        let mut assembly = attached(1024);
        let mut delivered = Vec::new();
        for body in [&b"first"[..], &b"second"[..]] {
            if let Some(payload) = assembly.push_chunk(&header_chunk(body.len())) {
                delivered.push(payload);
            }
            if let Some(payload) = assembly.push_chunk(body) {
                delivered.push(payload);
            }
        }
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].as_ref(), b"first");
        assert_eq!(delivered[1].as_ref(), b"second");
    }

    #[test]
    fn new_header_drops_incomplete_predecessor() {
        let mut assembly = attached(1024);
        assert!(assembly.push_chunk(&header_chunk(10)).is_none());
        assert!(assembly.push_chunk(b"abcde").is_none());

        // The next header forces a flush; 5 of 10 declared bytes can only drop.
        assert!(assembly.push_chunk(&header_chunk(2)).is_none());
        assert_eq!(assembly.buffered_len(), HEADER_SIZE);

        let payload = assembly.push_chunk(b"hi").expect("second frame should deliver");
        assert_eq!(payload.as_ref(), b"hi");
    }

    #[test]
    fn overdeclared_length_is_never_delivered() {
        let mut assembly = attached(1024);
        assert!(assembly.push_chunk(&header_chunk(9999)).is_none());
        assert!(assembly.push_chunk(b"short").is_none());
        assert!(assembly.push_chunk(&header_chunk(2)).is_none());
        assert_eq!(assembly.buffered_len(), HEADER_SIZE);
    }

    #[test]
    fn identity_mismatch_counts_as_body() {
        let mut assembly = attached(1024);
        assert!(assembly.push_chunk(&header_chunk(20)).is_none());

        let mut fake = header_chunk(7);
        fake[0] = 2;
        assert_ne!(fake[0..4], PROTOCOL_VERSION.to_le_bytes());
        // 16 bytes that fail validation are body, not a frame start.
        assert!(assembly.push_chunk(&fake).is_none());
        assert_eq!(
            assembly.phase(),
            Phase::Accumulating {
                received: HEADER_SIZE,
                target: 20
            }
        );

        let payload = assembly.push_chunk(b"tail").expect("frame should deliver");
        assert_eq!(&payload[..HEADER_SIZE], &fake);
        assert_eq!(&payload[HEADER_SIZE..], b"tail");
    }

    #[test]
    fn empty_payload_assembles_but_is_not_delivered() {
        let mut assembly = attached(1024);
        assert!(assembly.push_chunk(&header_chunk(0)).is_none());
        // Next frame's header settles the empty one silently.
        assert!(assembly.push_chunk(&header_chunk(3)).is_none());
        let payload = assembly.push_chunk(b"abc").expect("second frame should deliver");
        assert_eq!(payload.as_ref(), b"abc");
    }

    #[test]
    fn coalesced_whole_frame_in_one_read_delivers() {
        let mut assembly = attached(1024);
        let mut chunk = header_chunk(5).to_vec();
        chunk.extend_from_slice(b"hello");
        let payload = assembly
            .push_chunk(&chunk)
            .expect("coalesced frame should deliver");
        assert_eq!(payload.as_ref(), b"hello");
    }

    #[test]
    fn stray_garbage_is_dropped() {
        let mut assembly = attached(1024);
        assert!(assembly.push_chunk(b"garbage garbage bytes").is_none());
        assert_eq!(assembly.buffered_len(), 0);
        assert_eq!(assembly.phase(), Phase::Idle);
    }

    #[test]
    fn overflowed_frame_is_dropped_not_truncated() {
        let mut assembly = attached(64);
        assert!(assembly.push_chunk(&header_chunk(100)).is_none());
        // 60 bytes do not fit next to the header in a 64-byte buffer; the
        // chunk is refused but still counted.
        assert!(assembly.push_chunk(&[b'a'; 60]).is_none());
        assert_eq!(assembly.buffered_len(), HEADER_SIZE);
        // Seen bytes reach the target; stored bytes cannot satisfy it.
        assert!(assembly.push_chunk(&[b'b'; 40]).is_none());
        assert_eq!(assembly.buffered_len(), 0);
        assert_eq!(assembly.phase(), Phase::Idle);
    }

    #[test]
    fn flush_is_a_no_op_without_connections() {
        let mut assembly = Assembly::with_capacity(1024);
        assert!(assembly.push_chunk(&header_chunk(3)).is_none());
        assert!(assembly.push_chunk(b"abc").is_none());
        // Completion could not flush; everything is still buffered.
        assert_eq!(assembly.buffered_len(), HEADER_SIZE + 3);
        assert_eq!(assembly.phase(), Phase::Complete);

        // The first accept wipes the leftovers rather than delivering them.
        assembly.connection_opened();
        assert_eq!(assembly.buffered_len(), 0);
        let payload = {
            assert!(assembly.push_chunk(&header_chunk(5)).is_none());
            assembly.push_chunk(b"fresh").expect("new frame should deliver")
        };
        assert_eq!(payload.as_ref(), b"fresh");
    }

    #[test]
    fn accept_discards_partial_assembly() {
        let mut assembly = attached(1024);
        assert!(assembly.push_chunk(&header_chunk(50)).is_none());
        assert!(assembly.push_chunk(b"partial").is_none());

        assembly.connection_opened();
        assert_eq!(assembly.connection_count(), 2);
        assert_eq!(assembly.buffered_len(), 0);
        assert_eq!(assembly.phase(), Phase::Idle);

        assert!(assembly.push_chunk(&header_chunk(4)).is_none());
        let payload = assembly.push_chunk(b"good").expect("frame should deliver");
        assert_eq!(payload.as_ref(), b"good");
    }

    #[test]
    fn close_discards_partial_assembly() {
        let mut assembly = attached(1024);
        assembly.connection_opened();
        assert!(assembly.push_chunk(&header_chunk(10)).is_none());
        assert!(assembly.push_chunk(b"12345").is_none());

        assembly.connection_closed();
        assert_eq!(assembly.connection_count(), 1);
        assert_eq!(assembly.buffered_len(), 0);
        assert_eq!(assembly.phase(), Phase::Idle);

        // The surviving peer's bytes must not complete the abandoned frame.
        assert!(assembly.push_chunk(b"67890").is_none());
        assert_eq!(assembly.buffered_len(), 0);
    }

    #[test]
    fn cleanup_releases_buffer() {
        let mut assembly = attached(1024);
        assert!(assembly.push_chunk(&header_chunk(10)).is_none());
        assembly.cleanup();
        assert_eq!(assembly.buffered_len(), 0);
        assert_eq!(assembly.phase(), Phase::Idle);
    }

    #[test]
    fn every_split_point_delivers_exactly_once() {
        let payload = b"0123456789abcdefghijklmnop";
        for split in 1..payload.len() {
            let mut assembly = attached(1024);
            assert!(assembly.push_chunk(&header_chunk(payload.len())).is_none());

            let mut delivered = Vec::new();
            if let Some(frame) = assembly.push_chunk(&payload[..split]) {
                delivered.push(frame);
            }
            if let Some(frame) = assembly.push_chunk(&payload[split..]) {
                delivered.push(frame);
            }
            assert_eq!(delivered.len(), 1, "split at {split}");
            assert_eq!(delivered[0].as_ref(), payload, "split at {split}");
        }
    }

    proptest! {
        #[test]
        fn arbitrarily_fragmented_body_reassembles(
            payload in proptest::collection::vec(any::<u8>(), 1..512),
            cuts in proptest::collection::vec(1..64usize, 0..8),
        ) {
            let mut assembly = attached(4096);
            prop_assert!(assembly.push_chunk(&header_chunk(payload.len())).is_none());

            let mut delivered = Vec::new();
            let mut offset = 0;
            for cut in cuts {
                if offset >= payload.len() {
                    break;
                }
                let end = (offset + cut).min(payload.len());
                if let Some(frame) = assembly.push_chunk(&payload[offset..end]) {
                    delivered.push(frame);
                }
                offset = end;
            }
            if offset < payload.len() {
                if let Some(frame) = assembly.push_chunk(&payload[offset..]) {
                    delivered.push(frame);
                }
            }

            prop_assert_eq!(delivered.len(), 1);
            prop_assert_eq!(delivered[0].as_ref(), payload.as_slice());
        }
    }
}
