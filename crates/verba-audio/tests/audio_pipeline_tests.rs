//! Cross-module tests for the audio pipeline: capture ring through block
//! assembly and encoding on the way out, decode through scheduled rendering
//! on the way in. No devices; everything is driven sample-by-sample.

use tokio::sync::mpsc;

use verba_audio::codec::{decode_frame, encode_frame, from_transport_text, to_transport_text};
use verba_audio::playback::{PlaybackEvent, PlaybackScheduler};
use verba_audio::ring_buffer::AudioRingBuffer;
use verba_audio::{BLOCK_SAMPLES, CAPTURE_SAMPLE_RATE, INBOUND_SAMPLE_RATE};

// ─── Outbound path: ring -> block -> encoded payload ─────────────────

#[test]
fn captured_samples_survive_the_ring_and_encode_to_one_block() {
    let ring = AudioRingBuffer::new(BLOCK_SAMPLES * 4);
    let (mut producer, mut consumer) = ring.split();

    // A deterministic ramp stands in for the microphone callback
    let captured: Vec<i16> = (0..BLOCK_SAMPLES).map(|i| (i % 3000) as i16).collect();
    producer.write(&captured).unwrap();

    let mut drained = vec![0i16; BLOCK_SAMPLES];
    assert_eq!(consumer.read(&mut drained), BLOCK_SAMPLES);

    let block: Vec<f32> = drained.iter().map(|&s| s as f32 / 32768.0).collect();
    let bytes = encode_frame(&block);
    assert_eq!(bytes.len(), BLOCK_SAMPLES * 2);

    // The encoded payload carries the original 16-bit values unchanged
    let recovered: Vec<i16> = bytes
        .chunks_exact(2)
        .map(|p| i16::from_le_bytes([p[0], p[1]]))
        .collect();
    assert_eq!(recovered, captured);
}

#[test]
fn block_cadence_matches_the_outbound_contract() {
    // 4096 samples at 16 kHz is the ~256 ms block the peer expects
    let block_ms = BLOCK_SAMPLES as u64 * 1000 / CAPTURE_SAMPLE_RATE as u64;
    assert_eq!(block_ms, 256);
}

#[test]
fn transport_text_round_trips_an_encoded_block() {
    let block: Vec<f32> = (0..BLOCK_SAMPLES)
        .map(|i| ((i as f32) * 0.01).sin() * 0.8)
        .collect();
    let bytes = encode_frame(&block);
    let text = to_transport_text(&bytes);
    assert_eq!(from_transport_text(&text).unwrap(), bytes);
}

// ─── Inbound path: payload -> decode -> schedule -> render ───────────

#[test]
fn decoded_segment_renders_back_to_the_original_samples() {
    let original: Vec<f32> = (0..480).map(|i| ((i as f32) * 0.05).sin() * 0.5).collect();
    let pcm = encode_frame(&original);

    let mono = decode_frame(&pcm, 1).unwrap().swap_remove(0);

    let (tx, _rx) = mpsc::unbounded_channel();
    let mut scheduler = PlaybackScheduler::new(INBOUND_SAMPLE_RATE, tx);
    scheduler.schedule(mono);

    let mut out = vec![0.0f32; 480];
    scheduler.render(&mut out);
    for (a, b) in original.iter().zip(&out) {
        assert!((a - b).abs() <= 1.0 / 32768.0, "{} rendered as {}", a, b);
    }
}

#[test]
fn segments_stay_gapless_across_small_device_callbacks() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut scheduler = PlaybackScheduler::new(INBOUND_SAMPLE_RATE, tx);

    // Three segments with distinct levels, scheduled back to back
    scheduler.schedule(vec![0.1; 300]);
    scheduler.schedule(vec![0.2; 500]);
    scheduler.schedule(vec![0.3; 200]);

    // The device pulls awkward 128-sample buffers; concatenation must hold
    let mut played = Vec::new();
    while played.len() < 1000 {
        let mut out = vec![0.0f32; 128];
        scheduler.render(&mut out);
        played.extend(out);
    }

    assert!(played[..300].iter().all(|&s| s == 0.1));
    assert!(played[300..800].iter().all(|&s| s == 0.2));
    assert!(played[800..1000].iter().all(|&s| s == 0.3));
    // Everything finished, so the drain signal fired exactly once
    assert_eq!(rx.try_recv().unwrap(), PlaybackEvent::Drained);
    assert!(rx.try_recv().is_err());
}

#[test]
fn interruption_between_callbacks_cuts_the_rest_of_the_turn() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut scheduler = PlaybackScheduler::new(INBOUND_SAMPLE_RATE, tx);
    scheduler.schedule(vec![0.4; 1000]);
    scheduler.schedule(vec![0.5; 1000]);

    let mut out = vec![0.0f32; 256];
    scheduler.render(&mut out);
    assert!(out.iter().all(|&s| s == 0.4));

    scheduler.interrupt();

    // The very next callback renders silence; nothing reports completion
    scheduler.render(&mut out);
    assert!(out.iter().all(|&s| s == 0.0));
    assert_eq!(scheduler.active_segments(), 0);
    assert_eq!(scheduler.playhead(), 0);
    assert!(rx.try_recv().is_err());
}

#[test]
fn a_new_turn_after_interruption_starts_at_the_device_cursor() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut scheduler = PlaybackScheduler::new(INBOUND_SAMPLE_RATE, tx);
    scheduler.schedule(vec![0.4; 4096]);

    let mut out = vec![0.0f32; 1024];
    scheduler.render(&mut out);
    scheduler.interrupt();

    let start = scheduler.schedule(vec![0.6; 512]);
    assert_eq!(start, 1024);

    // The fresh segment is audible on the following callback
    let mut next = vec![0.0f32; 512];
    scheduler.render(&mut next);
    assert!(next.iter().all(|&s| s == 0.6));
}
