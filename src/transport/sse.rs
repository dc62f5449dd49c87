//! Streaming decoder (Bytes -> JSON Value) for server-sent events.
//!
//! - splits frames on a blank line
//! - joins the frame's `data:` lines
//! - stops on `[DONE]`
//! - skips comments and non-JSON frames

use crate::BoxStream;
use bytes::{Bytes, BytesMut};
use futures::{stream, StreamExt};
use serde_json::Value;

const DONE_SIGNAL: &str = "[DONE]";

fn frame_data(frame: &str) -> Option<String> {
    let mut data: Vec<&str> = Vec::new();
    for line in frame.lines() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            data.push(rest.strip_prefix(' ').unwrap_or(rest));
        } else if !line.contains(':') || line.starts_with('{') {
            // bare JSON line without an SSE field name
            data.push(line);
        }
    }
    if data.is_empty() {
        None
    } else {
        Some(data.join("\n"))
    }
}

enum Frame {
    Done,
    Payload(Value),
    Skip,
}

fn parse_frame(frame: &str) -> Frame {
    let Some(data) = frame_data(frame) else {
        return Frame::Skip;
    };
    let data = data.trim();
    if data == DONE_SIGNAL {
        return Frame::Done;
    }
    match serde_json::from_str(data) {
        Ok(v) => Frame::Payload(v),
        Err(_) => Frame::Skip,
    }
}

/// Finds the first blank line. Returns (end of frame, bytes consumed through the blank line).
/// Works on raw bytes so a multi-byte character split across chunks stays intact.
fn frame_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    buf.iter().enumerate().find_map(|(i, b)| {
        if *b != b'\n' {
            return None;
        }
        match &buf[i + 1..] {
            [b'\n', ..] => Some((i, i + 2)),
            [b'\r', b'\n', ..] => Some((i, i + 3)),
            _ => None,
        }
    })
}

fn decode_frame(raw: &[u8]) -> Frame {
    let text = String::from_utf8_lossy(raw).replace("\r\n", "\n");
    parse_frame(&text)
}

/// Incrementally buffers bytes and emits one JSON value per complete SSE frame.
pub fn decode_sse(input: BoxStream<'static, Bytes>) -> BoxStream<'static, Value> {
    let stream = stream::unfold(
        (input, BytesMut::new(), false),
        |(mut input, mut buf, finished)| async move {
            if finished {
                return None;
            }
            loop {
                if let Some((end, consumed)) = frame_boundary(&buf) {
                    let frame = buf.split_to(consumed);
                    match decode_frame(&frame[..end]) {
                        Frame::Done => return None,
                        Frame::Payload(v) => return Some((Ok(v), (input, buf, false))),
                        Frame::Skip => continue,
                    }
                }

                match input.next().await {
                    Some(Ok(bytes)) => buf.extend_from_slice(&bytes),
                    Some(Err(e)) => return Some((Err(e), (input, buf, true))),
                    None => {
                        // EOF: the last frame may lack its terminating blank line
                        return match decode_frame(&buf) {
                            Frame::Payload(v) => Some((Ok(v), (input, BytesMut::new(), true))),
                            Frame::Done | Frame::Skip => None,
                        };
                    }
                }
            }
        },
    );
    Box::pin(stream)
}
