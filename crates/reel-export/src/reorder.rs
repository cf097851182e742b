//! Restores presentation order between encoder and muxer.

use std::collections::{BTreeMap, BTreeSet};

use reel_encode::EncodedChunk;

/// Holds encoded chunks until every earlier frame has come back from the
/// encoder, then releases them in pts order.
#[derive(Debug, Default)]
pub struct ReorderBuffer {
    pending: BTreeMap<i64, EncodedChunk>,
    /// Submitted to the encoder, no chunk returned yet.
    in_flight: BTreeSet<i64>,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a frame with this pts was handed to the encoder.
    pub fn submit(&mut self, pts_us: i64) {
        self.in_flight.insert(pts_us);
    }

    /// Accept a chunk from the encoder. A chunk with a pts already pending
    /// is handed back.
    pub fn accept(&mut self, chunk: EncodedChunk) -> Result<(), EncodedChunk> {
        if self.pending.contains_key(&chunk.pts_us) {
            return Err(chunk);
        }
        self.in_flight.remove(&chunk.pts_us);
        self.pending.insert(chunk.pts_us, chunk);
        Ok(())
    }

    /// Chunks that no in-flight frame can precede, in pts order.
    pub fn drain_ready(&mut self) -> Vec<EncodedChunk> {
        match self.in_flight.first().copied() {
            Some(barrier) => {
                let rest = self.pending.split_off(&barrier);
                std::mem::replace(&mut self.pending, rest)
                    .into_values()
                    .collect()
            }
            None => self.drain_all(),
        }
    }

    /// Everything pending, in pts order. Used after the encoder is flushed.
    pub fn drain_all(&mut self) -> Vec<EncodedChunk> {
        self.in_flight.clear();
        std::mem::take(&mut self.pending).into_values().collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }
}
