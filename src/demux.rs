//! Byte-stream demuxer: splits a mixed inbound stream into complete RTSP
//! text messages and interleaved binary frames (RFC 2326 §10.12).
//!
//! A pure byte-consuming parser: `append` mutates only this struct's own
//! buffer and two output queues, with no callbacks into the caller, so it
//! can be fed one byte or one socket read at a time with identical results.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

use crate::error::{ClientError, ParseErrorKind, Result};

#[derive(Debug, Clone)]
pub struct InterleavedFrame {
    pub channel: u8,
    pub payload: Bytes,
}

pub struct Demuxer {
    buf: BytesMut,
    messages: VecDeque<String>,
    interleaved: VecDeque<InterleavedFrame>,
}

impl Demuxer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
            messages: VecDeque::new(),
            interleaved: VecDeque::new(),
        }
    }

    /// Append freshly-read bytes and parse as much as is available.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(data);

        loop {
            if self.buf.is_empty() {
                break;
            }

            if self.buf[0] == 0x24 {
                if self.buf.len() < 4 {
                    break;
                }
                let channel = self.buf[1];
                let length = u16::from_be_bytes([self.buf[2], self.buf[3]]) as usize;
                if self.buf.len() < 4 + length {
                    break;
                }
                self.buf.advance(4);
                let payload = self.buf.split_to(length).freeze();
                self.interleaved.push_back(InterleavedFrame { channel, payload });
                continue;
            }

            match find_header_end(&self.buf) {
                None => {
                    if start_line_is_complete_and_invalid(&self.buf) {
                        return Err(ClientError::Parse { kind: ParseErrorKind::InvalidStatusLine });
                    }
                    break;
                }
                Some(header_end) => {
                    let header_text = std::str::from_utf8(&self.buf[..header_end])
                        .map_err(|_| ClientError::Parse { kind: ParseErrorKind::InvalidHeader })?;
                    if start_line_is_complete_and_invalid(&self.buf) {
                        return Err(ClientError::Parse { kind: ParseErrorKind::InvalidStatusLine });
                    }
                    let content_length = content_length_of(header_text).unwrap_or(0);
                    let total = header_end + 4 + content_length;
                    if self.buf.len() < total {
                        break;
                    }
                    let raw = self.buf.split_to(total);
                    let text = String::from_utf8_lossy(&raw).into_owned();
                    self.messages.push_back(text);
                }
            }
        }

        Ok(())
    }

    pub fn next_message(&mut self) -> Option<String> {
        self.messages.pop_front()
    }

    pub fn next_interleaved(&mut self) -> Option<InterleavedFrame> {
        self.interleaved.pop_front()
    }
}

impl Default for Demuxer {
    fn default() -> Self {
        Self::new()
    }
}

use bytes::Buf;

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// A still-growing, `\r`-less prefix is not yet judgeable - only a buffer
/// with a complete start line can be rejected as malformed.
fn start_line_is_complete_and_invalid(buf: &[u8]) -> bool {
    let Some(end) = buf.iter().position(|&b| b == b'\r') else {
        return false;
    };
    match std::str::from_utf8(&buf[..end]) {
        Ok(line) => !line.contains("RTSP/1.0"),
        Err(_) => true,
    }
}

fn content_length_of(header_text: &str) -> Option<usize> {
    header_text.split("\r\n").find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("Content-Length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}
