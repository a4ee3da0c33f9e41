//! Decoding of the playback framing that programs built with the
//! `faketime` tag write to stdout and stderr.
//!
//! A frame is the magic `\0\0PB`, an 8 byte big-endian timestamp in Unix
//! nanoseconds, a 4 byte big-endian payload length and the payload. Bytes
//! between frames belong to the last seen timestamp.

use anyhow::{bail, Result};
use memchr::memmem;
use serde::{Deserialize, Serialize};

const MAGIC: &[u8] = b"\x00\x00PB";
const HEADER_LEN: usize = 8 + 4;

/// 2009-11-10 23:00:00 UTC, where the fake clock starts.
pub const EPOCH_NANOS: i64 = 1_257_894_000 * 1_000_000_000;

pub const STDOUT: &str = "stdout";
pub const STDERR: &str = "stderr";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "Message")]
    pub message: String,

    /// `stdout` or `stderr`.
    #[serde(rename = "Kind")]
    pub kind: String,

    /// Nanoseconds to wait before showing this event.
    #[serde(rename = "Delay")]
    pub delay: i64,
}

#[derive(Debug)]
struct Chunk {
    kind: &'static str,
    time: i64,
    data: Vec<u8>,
}

/// Turns the captured output of a run into ordered events.
pub fn decode(stdout: &[u8], stderr: &[u8]) -> Result<Vec<Event>> {
    let out = decode_stream(STDOUT, stdout)?;
    let err = decode_stream(STDERR, stderr)?;

    let mut now = EPOCH_NANOS;
    let events = merge(out, err)
        .into_iter()
        .map(|chunk| {
            let delay = (chunk.time - now).max(0);
            if delay > 0 {
                now = chunk.time;
            }
            Event {
                message: String::from_utf8_lossy(&chunk.data).into_owned(),
                kind: chunk.kind.to_owned(),
                delay,
            }
        })
        .collect();
    Ok(events)
}

fn decode_stream(kind: &'static str, output: &[u8]) -> Result<Vec<Chunk>> {
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut last = EPOCH_NANOS;

    let mut i = 0;
    while i < output.len() {
        if !output[i..].starts_with(MAGIC) {
            match memmem::find(&output[i..], MAGIC) {
                None => {
                    push_chunk(&mut chunks, kind, last, &output[i..]);
                    break;
                }
                Some(j) => {
                    push_chunk(&mut chunks, kind, last, &output[i..i + j]);
                    i += j;
                }
            }
        }
        i += MAGIC.len();

        if output.len() - i < HEADER_LEN {
            bail!("short header");
        }
        let header = &output[i..i + HEADER_LEN];
        let mut nanos = [0; 8];
        nanos.copy_from_slice(&header[..8]);
        let mut len = [0; 4];
        len.copy_from_slice(&header[8..]);
        // Out of order stamps are clamped to keep the stream monotonic.
        last = (u64::from_be_bytes(nanos) as i64).max(last);
        let n = u32::from_be_bytes(len) as usize;
        i += HEADER_LEN;

        // A truncated payload is kept, the backend may have cut the output.
        let end = i.saturating_add(n).min(output.len());
        push_chunk(&mut chunks, kind, last, &output[i..end]);
        i = end;
    }
    Ok(chunks)
}

/// Appends `data`, merging it into the previous chunk when the timestamps
/// are equal.
fn push_chunk(chunks: &mut Vec<Chunk>, kind: &'static str, time: i64, data: &[u8]) {
    if data.is_empty() {
        return;
    }
    match chunks.last_mut() {
        Some(prev) if prev.time == time => prev.data.extend_from_slice(data),
        _ => chunks.push(Chunk {
            kind,
            time,
            data: data.to_vec(),
        }),
    }
}

/// Merges two time-ordered sequences. stdout goes first on ties.
fn merge(out: Vec<Chunk>, err: Vec<Chunk>) -> Vec<Chunk> {
    let mut merged = Vec::with_capacity(out.len() + err.len());
    let mut out = out.into_iter().peekable();
    let mut err = err.into_iter().peekable();
    loop {
        let take_out = match (out.peek(), err.peek()) {
            (Some(o), Some(e)) => o.time <= e.time,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_out { out.next() } else { err.next() };
        merged.extend(next);
    }
    merged
}
