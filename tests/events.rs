use goplay::events::{decode, EPOCH_NANOS};
use goplay::Event;

const MS: i64 = 1_000_000;

fn frame(time: i64, data: &[u8]) -> Vec<u8> {
    let mut out = b"\x00\x00PB".to_vec();
    out.extend_from_slice(&(time as u64).to_be_bytes());
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
    out
}

fn event(kind: &str, message: &str, delay: i64) -> Event {
    Event {
        message: message.into(),
        kind: kind.into(),
        delay,
    }
}

#[test]
fn plain_output() {
    let events = decode(b"hello\n", b"").unwrap();
    assert_eq!(events, [event("stdout", "hello\n", 0)]);

    assert!(decode(b"", b"").unwrap().is_empty());
}

#[test]
fn frames_are_merged_by_time() {
    let mut stdout = frame(EPOCH_NANOS, b"a");
    stdout.extend(frame(EPOCH_NANOS, b"b"));
    stdout.extend(frame(EPOCH_NANOS + 2 * MS, b"d"));
    let stderr = frame(EPOCH_NANOS + MS, b"c");

    let events = decode(&stdout, &stderr).unwrap();
    assert_eq!(
        events,
        [
            event("stdout", "ab", 0),
            event("stderr", "c", MS),
            event("stdout", "d", MS),
        ]
    );
}

#[test]
fn stdout_first_on_ties() {
    let stdout = frame(EPOCH_NANOS + MS, b"out");
    let stderr = frame(EPOCH_NANOS + MS, b"err");
    let events = decode(&stdout, &stderr).unwrap();
    assert_eq!(
        events,
        [event("stdout", "out", MS), event("stderr", "err", 0)]
    );
}

#[test]
fn unframed_bytes_keep_the_last_time() {
    let mut stdout = frame(EPOCH_NANOS + 5 * MS, b"x");
    stdout.extend_from_slice(b"y");
    let events = decode(&stdout, b"").unwrap();
    assert_eq!(events, [event("stdout", "xy", 5 * MS)]);
}

#[test]
fn backwards_time_is_clamped() {
    let mut stdout = frame(EPOCH_NANOS + 5 * MS, b"late");
    stdout.extend(frame(EPOCH_NANOS + MS, b"early"));
    let events = decode(&stdout, b"").unwrap();
    assert_eq!(events, [event("stdout", "lateearly", 5 * MS)]);
}

#[test]
fn truncated_payload_is_kept() {
    let mut stdout = frame(EPOCH_NANOS, b"complete");
    stdout.truncate(stdout.len() - 3);
    let events = decode(&stdout, b"").unwrap();
    assert_eq!(events, [event("stdout", "compl", 0)]);
}

#[test]
fn short_header_is_an_error() {
    let stdout = b"\x00\x00PB\x00\x00".to_vec();
    let err = decode(&stdout, b"").unwrap_err();
    assert_eq!(err.to_string(), "short header");
}

#[test]
fn invalid_utf8_is_replaced() {
    let events = decode(b"\xffok", b"").unwrap();
    assert_eq!(events[0].message, "\u{fffd}ok");
}

#[test]
fn json_shape() {
    let json = serde_json::to_value(event("stderr", "boom", 7)).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"Message": "boom", "Kind": "stderr", "Delay": 7})
    );
}
