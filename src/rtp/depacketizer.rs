//! Codec depacketizers. `H264Depacketizer`'s FU-A reassembly rebuilds one
//! NAL from RFC 6184 §5.8 fragments (same indicator/header byte layout as
//! FU-A fragmentation, opposite direction). VP8 and Opus follow RFC 7741 /
//! RFC 7587 payload layouts directly.

use bytes::{Bytes, BytesMut};

use crate::media::MediaKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    H264,
    Vp8,
    Opus,
}

impl Codec {
    pub fn from_sdp_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "H264" => Some(Codec::H264),
            "VP8" => Some(Codec::Vp8),
            "OPUS" => Some(Codec::Opus),
            _ => None,
        }
    }

    pub fn media_kind(&self) -> MediaKind {
        match self {
            Codec::H264 | Codec::Vp8 => MediaKind::Video,
            Codec::Opus => MediaKind::Audio,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitstreamFormat {
    AnnexB,
    Vp8,
    Opus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Nalu,
    Raw,
}

/// Takes the ordered payloads of one RTP packet group (one coded frame)
/// and yields the assembled bitstream, or `None` if more fragments are
/// needed.
pub trait Depacketizer: Send {
    fn depacketize(&mut self, payloads: &[Bytes]) -> Option<Bytes>;
    fn bitstream_format(&self) -> BitstreamFormat;
    fn packet_type(&self) -> PacketType;
}

pub fn make_depacketizer(codec: Codec) -> Box<dyn Depacketizer> {
    match codec {
        Codec::H264 => Box::new(H264Depacketizer::default()),
        Codec::Vp8 => Box::new(Vp8Depacketizer),
        Codec::Opus => Box::new(OpusDepacketizer),
    }
}

const ANNEXB_START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// Reassembles Annex-B NAL units from single-NAL and FU-A (RFC 6184 §5.8)
/// RTP payloads. STAP-A aggregation packets are not handled - none of the
/// three end-to-end scenarios this client is tested against produce them.
#[derive(Default)]
pub struct H264Depacketizer {
    fu_buffer: BytesMut,
    fu_in_progress: bool,
}

impl Depacketizer for H264Depacketizer {
    fn depacketize(&mut self, payloads: &[Bytes]) -> Option<Bytes> {
        let mut out = BytesMut::new();
        for payload in payloads {
            if payload.is_empty() {
                continue;
            }
            let header_byte = payload[0];
            let nal_type = header_byte & 0x1f;

            match nal_type {
                1..=23 => {
                    out.extend_from_slice(&ANNEXB_START_CODE);
                    out.extend_from_slice(payload);
                }
                28 => {
                    if payload.len() < 2 {
                        continue;
                    }
                    let fu_header = payload[1];
                    let start = (fu_header & 0x80) != 0;
                    let end = (fu_header & 0x40) != 0;
                    let original_nal_type = fu_header & 0x1f;
                    let nri = header_byte & 0x60;

                    if start {
                        self.fu_buffer.clear();
                        self.fu_buffer.extend_from_slice(&[nri | original_nal_type]);
                        self.fu_in_progress = true;
                    }
                    if self.fu_in_progress {
                        self.fu_buffer.extend_from_slice(&payload[2..]);
                    }
                    if end && self.fu_in_progress {
                        out.extend_from_slice(&ANNEXB_START_CODE);
                        out.extend_from_slice(&self.fu_buffer);
                        self.fu_buffer.clear();
                        self.fu_in_progress = false;
                    }
                }
                _ => {
                    tracing::debug!(nal_type, "dropping unsupported NAL aggregation/type");
                }
            }
        }

        if out.is_empty() { None } else { Some(out.freeze()) }
    }

    fn bitstream_format(&self) -> BitstreamFormat {
        BitstreamFormat::AnnexB
    }

    fn packet_type(&self) -> PacketType {
        PacketType::Nalu
    }
}

/// Strips the mandatory 1-byte (plus optional extension octets) VP8
/// payload descriptor (RFC 7741 §4.2) and concatenates the remainder.
pub struct Vp8Depacketizer;

impl Depacketizer for Vp8Depacketizer {
    fn depacketize(&mut self, payloads: &[Bytes]) -> Option<Bytes> {
        let mut out = BytesMut::new();
        for payload in payloads {
            if payload.is_empty() {
                continue;
            }
            let descriptor = payload[0];
            let extended = (descriptor & 0x80) != 0;
            let mut offset = 1;

            if extended {
                if payload.len() <= offset {
                    continue;
                }
                let x = payload[offset];
                offset += 1;
                if (x & 0x80) != 0 {
                    offset += 1; // PictureID, possibly 2 bytes (M bit checked below)
                    if payload.len() > offset - 1 && (payload[offset - 1] & 0x80) != 0 {
                        offset += 1;
                    }
                }
                if (x & 0x40) != 0 {
                    offset += 1; // TL0PICIDX
                }
                if (x & 0x20) != 0 || (x & 0x10) != 0 {
                    offset += 1; // TID/KEYIDX
                }
            }

            if payload.len() < offset {
                continue;
            }
            out.extend_from_slice(&payload[offset..]);
        }
        if out.is_empty() { None } else { Some(out.freeze()) }
    }

    fn bitstream_format(&self) -> BitstreamFormat {
        BitstreamFormat::Vp8
    }

    fn packet_type(&self) -> PacketType {
        PacketType::Raw
    }
}

/// Opus (RFC 7587) carries exactly one encoded frame per RTP packet with
/// no payload descriptor; concatenation only matters for the rare
/// multi-packet group.
pub struct OpusDepacketizer;

impl Depacketizer for OpusDepacketizer {
    fn depacketize(&mut self, payloads: &[Bytes]) -> Option<Bytes> {
        if payloads.is_empty() {
            return None;
        }
        if payloads.len() == 1 {
            return Some(payloads[0].clone());
        }
        let mut out = BytesMut::new();
        for payload in payloads {
            out.extend_from_slice(payload);
        }
        Some(out.freeze())
    }

    fn bitstream_format(&self) -> BitstreamFormat {
        BitstreamFormat::Opus
    }

    fn packet_type(&self) -> PacketType {
        PacketType::Raw
    }
}
