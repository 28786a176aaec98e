use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rand::Rng;

use crate::common::network::fragment::split_into_fragments;

use super::*;

const CHUNK: usize = 1400;

fn test_buffer() -> ReassemblyBuffer {
    ReassemblyBuffer::new(60_000, 32)
}

fn random_payload(size: usize) -> Vec<u8> {
    let mut payload = vec![0u8; size];
    rand::thread_rng().fill(payload.as_mut_slice());
    payload
}

fn feed_all(buffer: &mut ReassemblyBuffer, fragments: Vec<FrameFragment>, now: Instant) {
    for fragment in fragments {
        buffer
            .on_fragment_received(fragment, now)
            .expect("fragment should be accepted");
    }
}

#[test]
fn reassembles_fragments_in_arrival_order() {
    let mut buffer = test_buffer();
    let now = Instant::now();
    let payload = random_payload(2 * CHUNK);

    feed_all(&mut buffer, split_into_fragments(1, &payload, CHUNK), now);

    let frame = buffer.try_complete(1).expect("frame should be complete");
    assert_eq!(frame.sequence, 1);
    assert_eq!(&frame.payload[..], &payload[..]);
    assert_eq!(buffer.pending_frames(), 0);
}

#[test]
fn reassembles_fragments_out_of_order() {
    let mut buffer = test_buffer();
    let now = Instant::now();
    let payload = random_payload(2 * CHUNK + 600);
    let mut fragments = split_into_fragments(3, &payload, CHUNK);

    // Deliver as 2, 0, 1.
    let last = fragments.remove(2);
    buffer.on_fragment_received(last, now).unwrap();
    assert!(buffer.try_complete(3).is_none());

    let first = fragments.remove(0);
    buffer.on_fragment_received(first, now).unwrap();
    assert!(buffer.try_complete(3).is_none());

    let middle = fragments.remove(0);
    buffer.on_fragment_received(middle, now).unwrap();

    let frame = buffer.try_complete(3).expect("frame should be complete");
    assert_eq!(&frame.payload[..], &payload[..]);
}

#[test]
fn reassembles_random_arrival_orders() {
    let mut rng = rand::thread_rng();

    for round in 0..20u32 {
        let mut buffer = test_buffer();
        let now = Instant::now();
        let payload = random_payload(rng.gen_range(1..=10 * CHUNK));
        let mut fragments = split_into_fragments(round, &payload, CHUNK);
        fragments.shuffle(&mut rng);

        feed_all(&mut buffer, fragments, now);

        let frame = buffer.try_complete(round).expect("frame should be complete");
        assert_eq!(&frame.payload[..], &payload[..]);
    }
}

#[test]
fn empty_frame_completes_from_a_single_fragment() {
    let mut buffer = test_buffer();
    let now = Instant::now();

    feed_all(&mut buffer, split_into_fragments(5, &[], CHUNK), now);

    let frame = buffer.try_complete(5).expect("frame should be complete");
    assert!(frame.payload.is_empty());
}

#[test]
fn incomplete_frame_yields_nothing() {
    let mut buffer = test_buffer();
    let now = Instant::now();
    let mut fragments = split_into_fragments(2, &random_payload(3 * CHUNK), CHUNK);
    fragments.pop();

    feed_all(&mut buffer, fragments, now);

    assert!(buffer.try_complete(2).is_none());
    assert_eq!(buffer.pending_frames(), 1);
}

#[test]
fn timed_out_frame_never_completes() {
    let mut buffer = test_buffer();
    let now = Instant::now();
    let mut fragments = split_into_fragments(9, &random_payload(2 * CHUNK), CHUNK);
    let missing = fragments.pop().unwrap();

    feed_all(&mut buffer, fragments, now);

    let expired = buffer.expire_stale(now + Duration::from_millis(50), Duration::from_millis(30));
    assert_eq!(expired, 1);
    assert_eq!(buffer.pending_frames(), 0);

    // The straggler cannot resurrect the frame.
    assert_eq!(
        buffer.on_fragment_received(missing, now + Duration::from_millis(60)),
        Err(DropReason::StaleSequence)
    );
    assert!(buffer.try_complete(9).is_none());
}

#[test]
fn frames_younger_than_the_timeout_survive_the_sweep() {
    let mut buffer = test_buffer();
    let now = Instant::now();
    let mut fragments = split_into_fragments(4, &random_payload(2 * CHUNK), CHUNK);
    fragments.pop();

    feed_all(&mut buffer, fragments, now);

    let expired = buffer.expire_stale(now + Duration::from_millis(99), Duration::from_millis(100));
    assert_eq!(expired, 0);
    assert_eq!(buffer.pending_frames(), 1);
}

#[test]
fn expiry_is_measured_from_the_first_fragment() {
    let mut buffer = test_buffer();
    let now = Instant::now();
    let mut fragments = split_into_fragments(6, &random_payload(3 * CHUNK), CHUNK);
    fragments.truncate(2);
    let (early, late) = (fragments.remove(0), fragments.remove(0));

    buffer.on_fragment_received(early, now).unwrap();
    buffer
        .on_fragment_received(late, now + Duration::from_millis(80))
        .unwrap();

    // Recent arrivals do not refresh the frame's age.
    let expired = buffer.expire_stale(now + Duration::from_millis(100), Duration::from_millis(100));
    assert_eq!(expired, 1);
}

#[test]
fn late_fragment_after_completion_is_rejected() {
    let mut buffer = test_buffer();
    let now = Instant::now();
    let payload = random_payload(2 * CHUNK);
    let fragments = split_into_fragments(7, &payload, CHUNK);
    let replay = fragments[0].clone();

    feed_all(&mut buffer, fragments, now);
    assert!(buffer.try_complete(7).is_some());

    assert_eq!(
        buffer.on_fragment_received(replay, now),
        Err(DropReason::StaleSequence)
    );
    assert!(buffer.try_complete(7).is_none());
}

#[test]
fn completion_supersedes_older_pending_frames() {
    let mut buffer = test_buffer();
    let now = Instant::now();

    let mut older = split_into_fragments(5, &random_payload(3 * CHUNK), CHUNK);
    let older_straggler = older.pop().unwrap();
    feed_all(&mut buffer, older, now);

    feed_all(
        &mut buffer,
        split_into_fragments(7, &random_payload(2 * CHUNK), CHUNK),
        now,
    );

    let frame = buffer.try_complete(7).expect("newer frame should complete");
    assert_eq!(frame.sequence, 7);
    assert_eq!(buffer.pending_frames(), 0);
    assert_eq!(buffer.highest_completed(), Some(7));

    // The superseded frame is closed even though it never timed out.
    assert_eq!(
        buffer.on_fragment_received(older_straggler, now),
        Err(DropReason::StaleSequence)
    );
    assert!(buffer.try_complete(5).is_none());
}

#[test]
fn duplicate_fragment_is_rejected_without_corrupting_the_frame() {
    let mut buffer = test_buffer();
    let now = Instant::now();
    let payload = random_payload(2 * CHUNK);
    let fragments = split_into_fragments(11, &payload, CHUNK);
    let duplicate = fragments[0].clone();

    buffer.on_fragment_received(fragments[0].clone(), now).unwrap();
    assert_eq!(
        buffer.on_fragment_received(duplicate, now),
        Err(DropReason::DuplicateFragment)
    );

    buffer.on_fragment_received(fragments[1].clone(), now).unwrap();
    let frame = buffer.try_complete(11).expect("frame should be complete");
    assert_eq!(&frame.payload[..], &payload[..]);
}

#[test]
fn fragment_count_mismatch_is_rejected() {
    let mut buffer = test_buffer();
    let now = Instant::now();
    let fragments = split_into_fragments(13, &random_payload(2 * CHUNK), CHUNK);

    buffer.on_fragment_received(fragments[0].clone(), now).unwrap();

    let mut forged = fragments[1].clone();
    forged.header.fragment_count = 4;
    assert_eq!(
        buffer.on_fragment_received(forged, now),
        Err(DropReason::FragmentMismatch)
    );

    // The honest remainder still completes the frame.
    buffer.on_fragment_received(fragments[1].clone(), now).unwrap();
    assert!(buffer.try_complete(13).is_some());
}

#[test]
fn pending_cap_discards_the_oldest_frame() {
    let mut buffer = ReassemblyBuffer::new(60_000, 2);
    let now = Instant::now();

    for sequence in 1..=3u32 {
        let mut fragments = split_into_fragments(sequence, &random_payload(2 * CHUNK), CHUNK);
        fragments.pop();
        feed_all(&mut buffer, fragments, now);
    }

    assert_eq!(buffer.pending_frames(), 2);

    let mut evicted = split_into_fragments(1, &random_payload(CHUNK), CHUNK);
    assert_eq!(
        buffer.on_fragment_received(evicted.remove(0), now),
        Err(DropReason::StaleSequence)
    );
    assert!(buffer.try_complete(1).is_none());
}

#[test]
fn oversized_frame_is_discarded() {
    let mut buffer = ReassemblyBuffer::new(3 * CHUNK, 32);
    let now = Instant::now();
    let fragments = split_into_fragments(21, &random_payload(4 * CHUNK), CHUNK);

    let mut outcome = Ok(());
    for fragment in fragments {
        outcome = buffer.on_fragment_received(fragment, now);
        if outcome.is_err() {
            break;
        }
    }

    assert_eq!(outcome, Err(DropReason::OversizedFrame));
    assert_eq!(buffer.pending_frames(), 0);
    assert!(buffer.try_complete(21).is_none());
}
