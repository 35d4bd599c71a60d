//! Downstream media-packet sink: a trait plus an in-memory reference
//! implementation so the pipeline is runnable end to end in tests and the
//! demo binary.

use std::sync::mpsc;

use bytes::Bytes;

use crate::rtp::depacketizer::{BitstreamFormat, PacketType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

#[derive(Debug, Clone)]
pub struct MediaPacket {
    pub track_id: u8,
    pub bitstream: Bytes,
    pub pts: u64,
    pub dts: u64,
    pub bitstream_format: BitstreamFormat,
    pub packet_type: PacketType,
}

pub trait MediaSink: Send {
    fn send_frame(&mut self, packet: MediaPacket);
}

/// Reference sink forwarding every packet over a channel; used by the
/// demo binary and by integration tests asserting on what arrived.
pub struct ChannelSink {
    tx: mpsc::Sender<MediaPacket>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::Receiver<MediaPacket>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl MediaSink for ChannelSink {
    fn send_frame(&mut self, packet: MediaPacket) {
        if self.tx.send(packet).is_err() {
            tracing::debug!("media sink receiver dropped, discarding frame");
        }
    }
}
