//! Track/depacketizer registry and RTP dispatcher. Tracks are keyed by
//! RTP payload-type, since an RTSP-over-TCP interleaved stream carries no
//! other reliable per-packet track identifier.

pub mod depacketizer;
pub mod packet;
pub mod timestamp;

use std::collections::HashMap;

use bytes::Bytes;
use url::Url;

use crate::error::{ClientError, Result};
use crate::media::{MediaKind, MediaPacket};
use depacketizer::{make_depacketizer, Codec, Depacketizer};
use packet::RtpPacket;
use timestamp::TimestampNormalizer;

#[derive(Debug, Clone)]
pub struct TrackDescriptor {
    pub payload_type: u8,
    pub kind: MediaKind,
    pub codec: Codec,
    pub clock_rate: u32,
    pub control_url: Url,
}

struct GroupAccumulator {
    payloads: Vec<Bytes>,
}

/// Holds one registered track plus its depacketizer and in-progress RTP
/// packet group. Grouping here is a minimal in-order accumulator rather
/// than a full jitter buffer: RTSP-over-TCP interleaving is already
/// ordered, so "accumulate until marker bit" is sufficient and correct.
struct Entry {
    track: TrackDescriptor,
    depacketizer: Box<dyn Depacketizer>,
    group: GroupAccumulator,
}

#[derive(Default)]
pub struct RtpDispatcher {
    entries: HashMap<u8, Entry>,
    timestamps: TimestampNormalizer,
}

impl RtpDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_track(&mut self, track: TrackDescriptor) {
        let payload_type = track.payload_type;
        let depacketizer = make_depacketizer(track.codec);
        self.entries.insert(
            payload_type,
            Entry { track, depacketizer, group: GroupAccumulator { payloads: Vec::new() } },
        );
    }

    pub fn track(&self, payload_type: u8) -> Option<&TrackDescriptor> {
        self.entries.get(&payload_type).map(|e| &e.track)
    }

    pub fn tracks(&self) -> impl Iterator<Item = &TrackDescriptor> {
        self.entries.values().map(|e| &e.track)
    }

    /// Feed one interleaved-frame payload (an RTP packet) through the
    /// dispatcher. Returns an assembled media packet once a full group
    /// (one coded frame) is available.
    pub fn dispatch(&mut self, rtp_payload: Bytes) -> Result<Option<MediaPacket>> {
        let packet = RtpPacket::parse(rtp_payload)?;

        let Some(entry) = self.entries.get_mut(&packet.payload_type) else {
            tracing::debug!(payload_type = packet.payload_type, "no track registered for payload type, dropping");
            return Ok(None);
        };

        entry.group.payloads.push(packet.payload.clone());

        if !packet.marker {
            return Ok(None);
        }

        let group = std::mem::take(&mut entry.group.payloads);
        let Some(bitstream) = entry.depacketizer.depacketize(&group) else {
            return Ok(None);
        };

        let pts = self.timestamps.normalize(packet.payload_type, packet.timestamp);

        Ok(Some(MediaPacket {
            track_id: packet.payload_type,
            bitstream,
            pts,
            dts: pts,
            bitstream_format: entry.depacketizer.bitstream_format(),
            packet_type: entry.depacketizer.packet_type(),
        }))
    }
}

/// Validate that an SDP's media sections can be registered without
/// ambiguity: payload types must be unique so dispatch-by-payload-type
/// stays unambiguous. Codec support is checked separately, by whichever
/// caller resolves each media section's `Codec` for registration.
pub fn validate_media_sections(media: &[crate::sdp::MediaDescription]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for m in media {
        if !seen.insert(m.payload_type) {
            return Err(ClientError::protocol(format!(
                "duplicate payload type {} in SDP",
                m.payload_type
            )));
        }
    }
    Ok(())
}
