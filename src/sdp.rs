//! Minimal SDP subset parser, behind an [`SdpParser`] trait so a fuller
//! implementation can be substituted. Covers exactly the vocabulary this
//! client needs to register tracks: `m=`, `a=rtpmap`, `a=control`.

use crate::error::{ClientError, Result};
use crate::media::MediaKind;

#[derive(Debug, Clone)]
pub struct MediaDescription {
    pub kind: MediaKind,
    pub payload_type: u8,
    pub codec_name: String,
    pub clock_rate: u32,
    pub control: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionDescription {
    pub content_base: Option<String>,
    pub media: Vec<MediaDescription>,
}

pub trait SdpParser: Send {
    fn parse(&self, text: &str) -> Result<SessionDescription>;
}

/// Default parser covering exactly the subset track registration needs:
/// `m=` lines, their trailing `a=rtpmap`/`a=control` attributes.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSdpParser;

impl SdpParser for DefaultSdpParser {
    fn parse(&self, text: &str) -> Result<SessionDescription> {
        let mut session = SessionDescription::default();
        let mut current: Option<MediaDescription> = None;

        for raw_line in text.lines() {
            let line = raw_line.trim_end_matches('\r');
            if let Some(rest) = line.strip_prefix("m=") {
                if let Some(prev) = current.take() {
                    session.media.push(prev);
                }
                let mut fields = rest.split_whitespace();
                let kind = match fields.next() {
                    Some("video") => MediaKind::Video,
                    Some("audio") => MediaKind::Audio,
                    _ => continue,
                };
                let payload_type = fields
                    .last()
                    .and_then(|pt| pt.parse().ok())
                    .ok_or_else(|| ClientError::media("m= line missing a payload type"))?;
                current = Some(MediaDescription {
                    kind,
                    payload_type,
                    codec_name: String::new(),
                    clock_rate: 0,
                    control: None,
                });
            } else if let Some(rest) = line.strip_prefix("a=rtpmap:") {
                if let Some(media) = current.as_mut() {
                    let mut fields = rest.split_whitespace();
                    let pt: u8 = fields.next().and_then(|p| p.parse().ok()).unwrap_or(media.payload_type);
                    if pt != media.payload_type {
                        continue;
                    }
                    if let Some(encoding) = fields.next() {
                        let mut parts = encoding.split('/');
                        media.codec_name = parts.next().unwrap_or_default().to_ascii_uppercase();
                        media.clock_rate = parts.next().and_then(|r| r.parse().ok()).unwrap_or(0);
                    }
                }
            } else if let Some(rest) = line.strip_prefix("a=control:") {
                if let Some(media) = current.as_mut() {
                    media.control = Some(rest.to_string());
                }
            }
        }
        if let Some(prev) = current.take() {
            session.media.push(prev);
        }

        if session.media.is_empty() {
            return Err(ClientError::protocol("SDP contains no usable media sections"));
        }

        let mut seen_payload_types = std::collections::HashSet::new();
        for media in &session.media {
            if !seen_payload_types.insert(media.payload_type) {
                return Err(ClientError::protocol(format!(
                    "duplicate payload type {} across media sections",
                    media.payload_type
                )));
            }
        }

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SDP: &str = "v=0\r\n\
o=- 0 0 IN IP4 127.0.0.1\r\n\
s=Stream\r\n\
c=IN IP4 127.0.0.1\r\n\
t=0 0\r\n\
m=video 0 RTP/AVP 96\r\n\
a=rtpmap:96 H264/90000\r\n\
a=control:track1\r\n\
m=audio 0 RTP/AVP 97\r\n\
a=rtpmap:97 OPUS/48000/2\r\n\
a=control:track2\r\n";

    #[test]
    fn parses_video_and_audio_sections() {
        let sd = DefaultSdpParser.parse(SDP).unwrap();
        assert_eq!(sd.media.len(), 2);
        assert_eq!(sd.media[0].kind, MediaKind::Video);
        assert_eq!(sd.media[0].codec_name, "H264");
        assert_eq!(sd.media[0].clock_rate, 90000);
        assert_eq!(sd.media[0].control.as_deref(), Some("track1"));
        assert_eq!(sd.media[1].kind, MediaKind::Audio);
        assert_eq!(sd.media[1].codec_name, "OPUS");
    }

    #[test]
    fn rejects_duplicate_payload_types() {
        let dup = SDP.replace("97", "96");
        assert!(DefaultSdpParser.parse(&dup).is_err());
    }

    #[test]
    fn rejects_empty_sdp() {
        assert!(DefaultSdpParser.parse("v=0\r\n").is_err());
    }
}
