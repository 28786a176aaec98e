//! Order-independent reassembly of frame fragments.
//!
//! The buffer tracks one [`PartialFrame`] per in-flight sequence number.
//! A sequence leaves the pending set exactly once, either by completing or
//! by being discarded, and never comes back: late fragments for a sequence
//! that already completed, timed out or was superseded by a newer completed
//! frame are rejected as stale.

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use log::debug;

use crate::common::network::fragment::FrameFragment;
use crate::error::DropReason;
use crate::types::ReassembledFrame;

/// Upper bound on remembered discarded sequences. Bounds memory against a
/// peer that never completes anything; sequences below the completion
/// watermark are rejected without being remembered individually.
const MAX_TRACKED_EXPIRED: usize = 1024;

/// Reassembly state of a single in-flight frame.
#[derive(Debug)]
struct PartialFrame {
    fragment_count: u16,
    first_arrival: Instant,
    fragments: HashMap<u16, Bytes>,
    received_bytes: usize,
}

impl PartialFrame {
    fn new(fragment_count: u16, first_arrival: Instant) -> Self {
        Self {
            fragment_count,
            first_arrival,
            fragments: HashMap::new(),
            received_bytes: 0,
        }
    }

    fn register(&mut self, fragment: FrameFragment, max_frame_bytes: usize) -> Result<(), DropReason> {
        if fragment.header.fragment_count != self.fragment_count {
            return Err(DropReason::FragmentMismatch);
        }
        if self.fragments.contains_key(&fragment.header.fragment_index) {
            return Err(DropReason::DuplicateFragment);
        }
        if self.received_bytes + fragment.payload.len() > max_frame_bytes {
            return Err(DropReason::OversizedFrame);
        }

        self.received_bytes += fragment.payload.len();
        self.fragments
            .insert(fragment.header.fragment_index, fragment.payload);
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.fragments.len() == usize::from(self.fragment_count)
    }

    fn reassemble(mut self) -> Bytes {
        let mut payload = BytesMut::with_capacity(self.received_bytes);
        for index in 0..self.fragment_count {
            if let Some(chunk) = self.fragments.remove(&index) {
                payload.extend_from_slice(&chunk);
            }
        }
        payload.freeze()
    }
}

/// Receiver-owned map from sequence number to in-flight reassembly state.
///
/// Freshness wins over completeness: completing a frame discards every older
/// partial frame still pending, and fragments for anything at or below the
/// completion watermark are rejected. Memory stays bounded by the pending
/// cap, the per-frame byte cap and the expiry sweep.
#[derive(Debug)]
pub struct ReassemblyBuffer {
    pending: BTreeMap<u32, PartialFrame>,
    highest_completed: Option<u32>,
    expired: BTreeSet<u32>,
    max_frame_bytes: usize,
    max_pending_frames: usize,
}

impl ReassemblyBuffer {
    pub fn new(max_frame_bytes: usize, max_pending_frames: usize) -> Self {
        Self {
            pending: BTreeMap::new(),
            highest_completed: None,
            expired: BTreeSet::new(),
            max_frame_bytes,
            max_pending_frames: max_pending_frames.max(1),
        }
    }

    /// Fold one received fragment into the buffer. `now` is the arrival
    /// instant used for expiry accounting.
    ///
    /// Rejected fragments leave the buffer unchanged except for an oversized
    /// frame, which discards the whole partial frame it belongs to.
    pub fn on_fragment_received(
        &mut self,
        fragment: FrameFragment,
        now: Instant,
    ) -> Result<(), DropReason> {
        let sequence = fragment.header.sequence;

        if self.is_closed(sequence) {
            return Err(DropReason::StaleSequence);
        }

        if !self.pending.contains_key(&sequence) && self.pending.len() >= self.max_pending_frames {
            self.evict_oldest_pending();
        }

        let partial = self
            .pending
            .entry(sequence)
            .or_insert_with(|| PartialFrame::new(fragment.header.fragment_count, now));

        let registered = partial.register(fragment, self.max_frame_bytes);
        if matches!(registered, Err(DropReason::OversizedFrame)) {
            debug!("frame #{} grew past the frame size bound, discarding", sequence);
            self.pending.remove(&sequence);
            self.mark_expired(sequence);
        }

        registered
    }

    /// Reassemble and return the frame for `sequence` if all its fragments
    /// have arrived. Completion closes every pending sequence below it.
    pub fn try_complete(&mut self, sequence: u32) -> Option<ReassembledFrame> {
        let complete = self
            .pending
            .get(&sequence)
            .is_some_and(PartialFrame::is_complete);
        if !complete {
            return None;
        }

        let partial = self.pending.remove(&sequence)?;
        let first_arrival = partial.first_arrival;
        let payload = partial.reassemble();
        self.mark_completed(sequence);

        Some(ReassembledFrame {
            sequence,
            payload,
            first_arrival,
        })
    }

    /// Discard every pending frame whose first fragment arrived `max_age` or
    /// longer before `now`. Returns the number of frames discarded.
    pub fn expire_stale(&mut self, now: Instant, max_age: Duration) -> usize {
        let mut timed_out = Vec::new();
        self.pending.retain(|&sequence, partial| {
            let stale = now.duration_since(partial.first_arrival) >= max_age;
            if stale {
                timed_out.push(sequence);
            }
            !stale
        });

        for &sequence in &timed_out {
            debug!("frame #{} expired before completion", sequence);
            self.mark_expired(sequence);
        }

        timed_out.len()
    }

    /// Number of partial frames currently pending.
    pub fn pending_frames(&self) -> usize {
        self.pending.len()
    }

    /// Highest sequence number delivered so far.
    pub fn highest_completed(&self) -> Option<u32> {
        self.highest_completed
    }

    fn is_closed(&self, sequence: u32) -> bool {
        self.highest_completed
            .is_some_and(|watermark| sequence <= watermark)
            || self.expired.contains(&sequence)
    }

    fn evict_oldest_pending(&mut self) {
        if let Some((sequence, partial)) = self.pending.pop_first() {
            debug!(
                "pending cap reached, discarding frame #{} ({}/{} fragments)",
                sequence,
                partial.fragments.len(),
                partial.fragment_count
            );
            self.mark_expired(sequence);
        }
    }

    fn mark_expired(&mut self, sequence: u32) {
        self.expired.insert(sequence);
        while self.expired.len() > MAX_TRACKED_EXPIRED {
            self.expired.pop_first();
        }
    }

    fn mark_completed(&mut self, sequence: u32) {
        self.highest_completed = Some(match self.highest_completed {
            Some(watermark) => watermark.max(sequence),
            None => sequence,
        });

        // Everything older than the completed frame is superseded.
        let retained = self.pending.split_off(&sequence);
        let superseded = std::mem::replace(&mut self.pending, retained);
        if !superseded.is_empty() {
            debug!(
                "frame #{} completed, discarding {} superseded partial frame(s)",
                sequence,
                superseded.len()
            );
        }

        self.expired.retain(|&expired| expired > sequence);
    }
}
