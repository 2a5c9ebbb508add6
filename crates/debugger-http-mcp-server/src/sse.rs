//! Server-Sent Events (SSE) framing

use bytes::Bytes;

/// Comment frame sent on idle streams so dead connections surface as write errors
pub const KEEPALIVE_FRAME: &[u8] = b": keepalive\n\n";

/// Frame `data` as one SSE event.
///
/// Every line of `data` gets its own `data:` field, so multi-line payloads
/// survive the trip intact. Empty data still produces a single `data:` line.
pub fn format_sse_frame(event: &str, data: &str) -> String {
    let mut frame = String::with_capacity(event.len() + data.len() + 16);
    frame.push_str("event: ");
    frame.push_str(event);
    frame.push('\n');
    for line in data.split('\n') {
        frame.push_str("data: ");
        frame.push_str(line);
        frame.push('\n');
    }
    frame.push('\n');
    frame
}

pub fn keepalive_frame() -> Bytes {
    Bytes::from_static(KEEPALIVE_FRAME)
}
