//! RTP fixed-header reader (RFC 3550 §5.1). Reads an incoming header out
//! of a borrowed buffer and owns nothing.

use bytes::Bytes;

use crate::error::{ClientError, Result};

#[derive(Debug, Clone)]
pub struct RtpPacket {
    pub marker: bool,
    pub payload_type: u8,
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub payload: Bytes,
}

impl RtpPacket {
    /// Parse a 12-byte-minimum RTP packet out of one interleaved frame's
    /// payload. CSRC entries and any extension header are skipped, not
    /// interpreted - dispatch only needs payload type, sequence, timestamp
    /// and marker.
    pub fn parse(data: Bytes) -> Result<Self> {
        if data.len() < 12 {
            return Err(ClientError::protocol("RTP packet shorter than fixed header"));
        }
        let first = data[0];
        let version = first >> 6;
        if version != 2 {
            return Err(ClientError::protocol(format!("unsupported RTP version {version}")));
        }
        let has_extension = (first & 0b0001_0000) != 0;
        let csrc_count = (first & 0b0000_1111) as usize;

        let second = data[1];
        let marker = (second & 0x80) != 0;
        let payload_type = second & 0x7f;

        let sequence = u16::from_be_bytes([data[2], data[3]]);
        let timestamp = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let ssrc = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        let mut offset = 12 + csrc_count * 4;
        if data.len() < offset {
            return Err(ClientError::protocol("RTP packet truncated in CSRC list"));
        }

        if has_extension {
            if data.len() < offset + 4 {
                return Err(ClientError::protocol("RTP packet truncated in extension header"));
            }
            let ext_words = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
            offset += 4 + ext_words * 4;
            if data.len() < offset {
                return Err(ClientError::protocol("RTP packet truncated in extension body"));
            }
        }

        Ok(Self {
            marker,
            payload_type,
            sequence,
            timestamp,
            ssrc,
            payload: data.slice(offset..),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(marker: bool, pt: u8, seq: u16, ts: u32, ssrc: u32, payload: &[u8]) -> Bytes {
        let mut buf = vec![0x80u8, (marker as u8) << 7 | pt];
        buf.extend_from_slice(&seq.to_be_bytes());
        buf.extend_from_slice(&ts.to_be_bytes());
        buf.extend_from_slice(&ssrc.to_be_bytes());
        buf.extend_from_slice(payload);
        Bytes::from(buf)
    }

    #[test]
    fn parses_fixed_header_fields() {
        let data = build(true, 96, 100, 90000, 0xAABBCCDD, b"payload");
        let pkt = RtpPacket::parse(data).unwrap();
        assert!(pkt.marker);
        assert_eq!(pkt.payload_type, 96);
        assert_eq!(pkt.sequence, 100);
        assert_eq!(pkt.timestamp, 90000);
        assert_eq!(pkt.ssrc, 0xAABBCCDD);
        assert_eq!(&pkt.payload[..], b"payload");
    }

    #[test]
    fn rejects_short_packet() {
        assert!(RtpPacket::parse(Bytes::from_static(&[0u8; 8])).is_err());
    }

    #[test]
    fn skips_csrc_list() {
        let mut buf = vec![0x81u8, 96]; // CC=1
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&1000u32.to_be_bytes());
        buf.extend_from_slice(&0xAAu32.to_be_bytes());
        buf.extend_from_slice(&0xBBu32.to_be_bytes()); // one CSRC
        buf.extend_from_slice(b"abc");
        let pkt = RtpPacket::parse(Bytes::from(buf)).unwrap();
        assert_eq!(&pkt.payload[..], b"abc");
    }
}
