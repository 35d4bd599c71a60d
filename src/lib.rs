//! # rtsp-client - RTSP pull client for live media streaming
//!
//! A Rust library for consuming a live media stream (H.264, VP8 or Opus)
//! from an RTSP server over TCP interleaved transport.
//!
//! ## Protocol references
//!
//! | RFC | Topic | How this crate uses it |
//! |-----|-------|----------------------|
//! | [RFC 2326](https://tools.ietf.org/html/rfc2326) | RTSP 1.0 | Request/response parsing, session lifecycle, interleaved framing |
//! | [RFC 3550](https://tools.ietf.org/html/rfc3550) | RTP | Packet header parsing, timestamp normalisation |
//! | [RFC 4566](https://tools.ietf.org/html/rfc4566) | SDP | Parsing the `m=`/`a=rtpmap`/`a=control` subset DESCRIBE returns |
//! | [RFC 6184](https://tools.ietf.org/html/rfc6184) | H.264 RTP payload | FU-A fragment reassembly into Annex-B |
//! | [RFC 7741](https://tools.ietf.org/html/rfc7741) | VP8 RTP payload | Payload descriptor stripping |
//! | [RFC 7587](https://tools.ietf.org/html/rfc7587) | Opus RTP payload | Passthrough framing |
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  Adapter (demo CLI binary)                │
//! ├──────────────────────────────────────────┤
//! │  Session        - public API, state machine│
//! ├──────────────────────────────────────────┤
//! │  Protocol       - RTSP message + demuxer │
//! │  Correlator     - CSeq-keyed response wait│
//! │  Sdp            - SDP subset parser      │
//! ├──────────────────────────────────────────┤
//! │  Socket         - TCP transport          │
//! │  Rtp            - header parsing, dispatch, depacketizers│
//! │  Media          - sink trait + channel sink│
//! └──────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use rtsp_client::{ClientConfig, Session, StdSocketPool, ChannelSink};
//! use std::sync::Arc;
//!
//! let config = ClientConfig::new(vec!["rtsp://127.0.0.1:8554/stream".to_string()]);
//! let pool: Arc<dyn rtsp_client::SocketPool> = Arc::new(StdSocketPool);
//! let (sink, rx) = ChannelSink::new();
//! let mut session = Session::new(config, Arc::downgrade(&pool), Box::new(sink));
//! session.start().unwrap();
//! session.play().unwrap();
//! // drive `session.process_media_packet()` from an event loop, read frames from `rx`.
//! ```
//!
//! ## Crate layout
//!
//! - [`session`] - [`Session`] state machine and transport orchestration.
//! - [`correlator`] - CSeq-keyed response correlator shared across threads.
//! - [`demux`] - incremental byte-stream demuxer splitting text and interleaved frames.
//! - [`message`] - RTSP request/response types and serialization.
//! - [`sdp`] - minimal SDP subset parser behind the [`sdp::SdpParser`] trait.
//! - [`url_resolve`] - control-URL resolution against Content-Base/request URL.
//! - [`rtp`] - RTP packet header parsing, timestamp normalisation, track dispatch.
//! - [`media`] - [`media::MediaSink`] trait and the assembled [`media::MediaPacket`].
//! - [`socket`] - [`socket::SocketPool`]/[`socket::RtspSocket`] transport abstraction.
//! - [`config`] - [`ClientConfig`].
//! - [`error`] - [`ClientError`] enum and [`Result`] alias.

pub mod config;
pub mod correlator;
pub mod demux;
pub mod error;
pub mod media;
pub mod message;
pub mod rtp;
pub mod sdp;
pub mod session;
pub mod socket;
pub mod url_resolve;

pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use media::{ChannelSink, MediaKind, MediaPacket, MediaSink};
pub use rtp::TrackDescriptor;
pub use session::{ProcessOutcome, Session, SessionHandle, SessionState};
pub use socket::{RtspSocket, SocketPool, StdSocketPool};
