//! Session state machine and dialogue driver: owns the socket, drives the
//! DESCRIBE/SETUP/PLAY/TEARDOWN exchange, and hands off to a non-blocking
//! per-packet read once playing.

use std::io;
use std::net::ToSocketAddrs;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::RngExt;
use url::Url;

use crate::config::ClientConfig;
use crate::correlator::Correlator;
use crate::demux::Demuxer;
use crate::error::{ClientError, Result};
use crate::media::MediaSink;
use crate::message::{session_id_from_header, RtspRequest, RtspResponse};
use crate::rtp::depacketizer::Codec;
use crate::rtp::{validate_media_sections, RtpDispatcher, TrackDescriptor};
use crate::sdp::{DefaultSdpParser, SdpParser};
use crate::socket::{RtspSocket, SocketPool};
use crate::url_resolve::resolve_control_url;

#[cfg(unix)]
use std::os::fd::RawFd;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connected,
    Described,
    Playing,
    Stopping,
    Stopped,
    Error,
}

impl SessionState {
    fn require(self, expected: SessionState) -> Result<()> {
        if self == expected {
            Ok(())
        } else {
            Err(ClientError::InvalidState { state: format!("{self:?}") })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Success,
    TryAgain,
    Failure,
}

/// The RTSP pull-client session.
///
/// Owned exclusively by whichever thread is currently driving it: the
/// caller during `start`/`play`/`stop`, an external event loop between
/// `play` and `stop` via repeated `process_media_packet` calls. The only
/// piece meant to be shared with another thread is [`SessionHandle`],
/// obtained through [`Session::handle`].
pub struct Session {
    config: ClientConfig,
    socket_pool: Weak<dyn SocketPool>,
    socket: Option<Box<dyn RtspSocket>>,
    state: SessionState,
    cseq: Arc<AtomicU32>,
    session_id: Arc<Mutex<Option<String>>>,
    content_base: Option<String>,
    correlator: Arc<Correlator>,
    demuxer: Demuxer,
    dispatcher: RtpDispatcher,
    sdp_parser: Box<dyn SdpParser>,
    sink: Box<dyn MediaSink>,
    request_url: Option<Url>,
    origin_request_time_ms: Option<u64>,
    origin_response_time_ms: Option<u64>,
}

impl Session {
    pub fn new(config: ClientConfig, socket_pool: Weak<dyn SocketPool>, sink: Box<dyn MediaSink>) -> Self {
        Self::with_sdp_parser(config, socket_pool, sink, Box::new(DefaultSdpParser))
    }

    pub fn with_sdp_parser(
        config: ClientConfig,
        socket_pool: Weak<dyn SocketPool>,
        sink: Box<dyn MediaSink>,
        sdp_parser: Box<dyn SdpParser>,
    ) -> Self {
        let initial_cseq = rand::rng().random_range(1..=10_000u32);
        Self {
            config,
            socket_pool,
            socket: None,
            state: SessionState::Idle,
            cseq: Arc::new(AtomicU32::new(initial_cseq)),
            session_id: Arc::new(Mutex::new(None)),
            content_base: None,
            correlator: Arc::new(Correlator::new()),
            demuxer: Demuxer::new(),
            dispatcher: RtpDispatcher::new(),
            sdp_parser,
            sink,
            request_url: None,
            origin_request_time_ms: None,
            origin_response_time_ms: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn tracks(&self) -> impl Iterator<Item = &TrackDescriptor> {
        self.dispatcher.tracks()
    }

    pub fn origin_request_time_ms(&self) -> Option<u64> {
        self.origin_request_time_ms
    }

    pub fn origin_response_time_ms(&self) -> Option<u64> {
        self.origin_response_time_ms
    }

    #[cfg(unix)]
    pub fn native_handle(&self) -> Option<RawFd> {
        self.socket.as_ref().map(|s| s.native_handle())
    }

    fn next_cseq(&self) -> u32 {
        self.cseq.fetch_add(1, Ordering::SeqCst)
    }

    /// Connect, DESCRIBE, and SETUP every track. Leaves the session in
    /// `Described`, ready for [`Session::play`].
    pub fn start(&mut self) -> Result<()> {
        self.state.require(SessionState::Idle)?;

        let url_str = self
            .config
            .primary_url()
            .ok_or_else(|| ClientError::configuration("no URL configured"))?
            .to_string();
        let url = Url::parse(&url_str)
            .map_err(|e| ClientError::configuration(format!("invalid url: {e}")))?;
        if url.scheme() != "rtsp" {
            return Err(ClientError::configuration(format!("unsupported scheme {}", url.scheme())));
        }
        let host = url
            .host_str()
            .ok_or_else(|| ClientError::configuration("url has no host"))?;
        let port = url.port().unwrap_or(554);
        let addr = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| ClientError::transport("could not resolve host"))?;

        let pool = self
            .socket_pool
            .upgrade()
            .ok_or_else(|| ClientError::configuration("socket pool no longer available"))?;
        let mut socket = pool.allocate_socket();

        let connect_started = Instant::now();
        socket.connect(addr, Duration::from_millis(self.config.connect_timeout_ms))?;
        self.origin_request_time_ms = Some(connect_started.elapsed().as_millis() as u64);

        self.socket = Some(socket);
        self.request_url = Some(url.clone());
        self.state = SessionState::Connected;
        tracing::info!(url = %url, "rtsp session connected");

        let setup_started = Instant::now();
        if let Err(e) = self.describe(&url).and_then(|_| self.setup_all_tracks()) {
            self.state = SessionState::Error;
            return Err(e);
        }
        self.origin_response_time_ms = Some(setup_started.elapsed().as_millis() as u64);

        Ok(())
    }

    fn describe(&mut self, url: &Url) -> Result<()> {
        let cseq = self.next_cseq();
        let request = RtspRequest::new("DESCRIBE", url.as_str(), cseq)
            .with_header("Accept", "application/sdp")
            .with_header("User-Agent", self.config.user_agent.clone());
        self.send_request(&request)?;

        let deadline = Instant::now() + Duration::from_millis(self.config.request_timeout_ms);
        let response = self.direct_read_until(cseq, deadline)?;

        if !response.is_ok() {
            return Err(ClientError::protocol(format!(
                "DESCRIBE failed with status {}",
                response.status_code
            )));
        }

        let session_header = response
            .header("Session")
            .ok_or_else(|| ClientError::protocol("DESCRIBE response missing Session header"))?;
        *self.session_id.lock() = Some(session_id_from_header(session_header).to_string());
        self.content_base = response.header("Content-Base").map(str::to_string);

        let body = response
            .body
            .clone()
            .ok_or_else(|| ClientError::protocol("DESCRIBE response missing SDP body"))?;

        let description = self.sdp_parser.parse(&body)?;
        validate_media_sections(&description.media)?;

        for media in &description.media {
            let codec = Codec::from_sdp_name(&media.codec_name)
                .ok_or_else(|| ClientError::media(format!("unsupported codec {}", media.codec_name)))?;
            let control = media
                .control
                .as_deref()
                .ok_or_else(|| ClientError::protocol("media section missing a=control"))?;
            let control_url = resolve_control_url(control, self.content_base.as_deref(), url)?;

            tracing::debug!(payload_type = media.payload_type, codec = %media.codec_name, %control_url, "track registered");
            self.dispatcher.register_track(TrackDescriptor {
                payload_type: media.payload_type,
                kind: codec.media_kind(),
                codec,
                clock_rate: media.clock_rate,
                control_url,
            });
        }

        self.state = SessionState::Described;
        Ok(())
    }

    fn setup_all_tracks(&mut self) -> Result<()> {
        let tracks: Vec<TrackDescriptor> = self.dispatcher.tracks().cloned().collect();
        let mut channel: u8 = 0;

        for track in tracks {
            let cseq = self.next_cseq();
            let mut request = RtspRequest::new("SETUP", track.control_url.as_str(), cseq)
                .with_header("User-Agent", self.config.user_agent.clone())
                .with_header(
                    "Transport",
                    format!("RTP/AVP/TCP;unicast;interleaved={}-{}", channel, channel + 1),
                );
            if let Some(session_id) = self.session_id.lock().clone() {
                request = request.with_header("Session", session_id);
            }
            self.send_request(&request)?;

            let deadline = Instant::now() + Duration::from_millis(self.config.request_timeout_ms);
            let response = self.direct_read_until(cseq, deadline)?;
            if !response.is_ok() {
                return Err(ClientError::protocol(format!(
                    "SETUP failed with status {}",
                    response.status_code
                )));
            }

            channel = channel.wrapping_add(2);
        }
        Ok(())
    }

    pub fn play(&mut self) -> Result<()> {
        self.state.require(SessionState::Described)?;
        let url = self
            .request_url
            .clone()
            .ok_or_else(|| ClientError::configuration("no active request url"))?;

        let cseq = self.next_cseq();
        let mut request = RtspRequest::new("PLAY", url.as_str(), cseq)
            .with_header("User-Agent", self.config.user_agent.clone())
            .with_header("Range", "npt=0-");
        if let Some(session_id) = self.session_id.lock().clone() {
            request = request.with_header("Session", session_id);
        }
        self.send_request(&request)?;

        let deadline = Instant::now() + Duration::from_millis(self.config.request_timeout_ms);
        let response = match self.direct_read_until(cseq, deadline) {
            Ok(r) => r,
            Err(e) => {
                self.state = SessionState::Error;
                return Err(e);
            }
        };
        if !response.is_ok() {
            self.state = SessionState::Error;
            return Err(ClientError::protocol(format!("PLAY failed with status {}", response.status_code)));
        }

        self.state = SessionState::Playing;
        tracing::info!("rtsp session playing");
        Ok(())
    }

    /// TEARDOWN issued by whichever thread currently owns the session
    /// (typical single-threaded embedding, or after the caller has
    /// stopped polling `process_media_packet` itself). For tearing down
    /// from a separate control thread while another thread still owns the
    /// event loop, use [`Session::handle`] instead.
    pub fn stop(&mut self) -> Result<()> {
        self.state.require(SessionState::Playing)?;
        self.state = SessionState::Stopping;

        let url = self
            .request_url
            .clone()
            .ok_or_else(|| ClientError::configuration("no active request url"))?;
        let cseq = self.next_cseq();
        let mut request = RtspRequest::new("TEARDOWN", url.as_str(), cseq)
            .with_header("User-Agent", self.config.user_agent.clone());
        if let Some(session_id) = self.session_id.lock().clone() {
            request = request.with_header("Session", session_id);
        }
        self.send_request(&request)?;

        let deadline = Instant::now() + Duration::from_millis(self.config.request_timeout_ms);
        let response = match self.direct_read_until(cseq, deadline) {
            Ok(r) => r,
            Err(e) => {
                self.state = SessionState::Error;
                return Err(e);
            }
        };
        if !response.is_ok() {
            self.state = SessionState::Error;
            return Err(ClientError::protocol(format!(
                "TEARDOWN failed with status {}",
                response.status_code
            )));
        }

        self.state = SessionState::Stopped;
        tracing::info!("rtsp session stopped");
        Ok(())
    }

    /// A lightweight, thread-safe handle that can request TEARDOWN while
    /// another thread owns this `Session` and keeps calling
    /// `process_media_packet`. That owning thread observes the response
    /// (via the shared correlator) and transitions this session's own
    /// state the next time it calls `process_media_packet`.
    pub fn handle(&self) -> Result<SessionHandle> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| ClientError::transport("socket not connected"))?;
        let writer = socket.try_clone()?;
        let request_uri = self
            .request_url
            .as_ref()
            .map(|u| u.to_string())
            .ok_or_else(|| ClientError::configuration("no active request url"))?;

        Ok(SessionHandle {
            correlator: self.correlator.clone(),
            writer: Mutex::new(writer),
            cseq: self.cseq.clone(),
            session_id: self.session_id.clone(),
            request_uri,
            user_agent: self.config.user_agent.clone(),
            request_timeout: Duration::from_millis(self.config.request_timeout_ms),
        })
    }

    /// Non-blocking event-loop step. Reads whatever is available,
    /// dispatches responses to the correlator and interleaved frames to
    /// the RTP dispatcher, and reports whether there is more to drain.
    pub fn process_media_packet(&mut self) -> ProcessOutcome {
        if matches!(self.state, SessionState::Error | SessionState::Stopped) {
            return ProcessOutcome::Failure;
        }

        let mut buf = vec![0u8; self.config.recv_buffer_size];
        let Some(socket) = self.socket.as_mut() else {
            self.state = SessionState::Error;
            return ProcessOutcome::Failure;
        };

        let n = match socket.recv(&mut buf, true, None) {
            Ok(0) => {
                self.state = SessionState::Error;
                return ProcessOutcome::Failure;
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return ProcessOutcome::TryAgain,
            Err(_) => {
                self.state = SessionState::Error;
                return ProcessOutcome::Failure;
            }
        };

        if self.demuxer.append(&buf[..n]).is_err() {
            self.state = SessionState::Error;
            return ProcessOutcome::Failure;
        }

        let mut drained_any = false;

        while let Some(text) = self.demuxer.next_message() {
            drained_any = true;
            if !text.starts_with("RTSP/") {
                tracing::debug!("discarding unexpected inbound rtsp request");
                continue;
            }
            match RtspResponse::parse(&text) {
                Ok(response) => {
                    let is_ok = response.is_ok();
                    if let Some(method) = self.correlator.complete(response) {
                        if method == "TEARDOWN" {
                            self.state = if is_ok { SessionState::Stopped } else { SessionState::Error };
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, "discarding unparseable inbound message"),
            }
        }

        while let Some(frame) = self.demuxer.next_interleaved() {
            drained_any = true;
            match self.dispatcher.dispatch(frame.payload) {
                Ok(Some(packet)) => self.sink.send_frame(packet),
                Ok(None) => {}
                Err(e) => tracing::debug!(error = %e, "dropping malformed rtp packet"),
            }
        }

        if self.state == SessionState::Error {
            ProcessOutcome::Failure
        } else if drained_any {
            ProcessOutcome::Success
        } else {
            ProcessOutcome::TryAgain
        }
    }

    fn send_request(&mut self, request: &RtspRequest) -> Result<()> {
        self.correlator.register(request.cseq, &request.method);
        tracing::debug!(method = %request.method, cseq = request.cseq, "sending rtsp request");
        let bytes = request.serialize();
        self.socket
            .as_mut()
            .ok_or_else(|| ClientError::transport("socket not connected"))?
            .send(&bytes)?;
        Ok(())
    }

    /// Blocking read loop used during setup: reads directly off the
    /// socket (no external event loop is involved yet) until the
    /// response matching `cseq` arrives or `deadline` passes. Any other
    /// complete response observed along the way is handed to the
    /// correlator as a late/out-of-order arrival; any interleaved frame
    /// observed is dispatched immediately.
    fn direct_read_until(&mut self, cseq: u32, deadline: Instant) -> Result<RtspResponse> {
        loop {
            let now = Instant::now();
            if now >= deadline {
                self.correlator.take_for_direct_receive(cseq);
                return Err(ClientError::Timeout { cseq });
            }
            let remaining = deadline - now;

            let mut buf = vec![0u8; self.config.recv_buffer_size];
            let n = {
                let socket = self
                    .socket
                    .as_mut()
                    .ok_or_else(|| ClientError::transport("socket not connected"))?;
                match socket.recv(&mut buf, false, Some(remaining)) {
                    Ok(n) => n,
                    Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => continue,
                    Err(e) => return Err(e.into()),
                }
            };
            if n == 0 {
                return Err(ClientError::transport("connection closed by peer"));
            }
            self.demuxer.append(&buf[..n])?;

            while let Some(text) = self.demuxer.next_message() {
                if !text.starts_with("RTSP/") {
                    tracing::debug!("discarding unexpected inbound rtsp request during setup");
                    continue;
                }
                let response = RtspResponse::parse(&text)?;
                if response.cseq == cseq {
                    self.correlator.take_for_direct_receive(cseq);
                    self.drain_interleaved();
                    return Ok(response);
                }
                self.correlator.complete(response);
            }
            self.drain_interleaved();
        }
    }

    fn drain_interleaved(&mut self) {
        while let Some(frame) = self.demuxer.next_interleaved() {
            match self.dispatcher.dispatch(frame.payload) {
                Ok(Some(packet)) => self.sink.send_frame(packet),
                Ok(None) => {}
                Err(e) => tracing::debug!(error = %e, "dropping malformed rtp packet during setup"),
            }
        }
    }
}

/// Thread-safe handle for issuing TEARDOWN from a thread other than the
/// one driving `process_media_packet`. See [`Session::handle`].
pub struct SessionHandle {
    correlator: Arc<Correlator>,
    writer: Mutex<Box<dyn RtspSocket>>,
    cseq: Arc<AtomicU32>,
    session_id: Arc<Mutex<Option<String>>>,
    request_uri: String,
    user_agent: String,
    request_timeout: Duration,
}

impl SessionHandle {
    pub fn teardown(&self) -> Result<RtspResponse> {
        let cseq = self.cseq.fetch_add(1, Ordering::SeqCst);
        let mut request = RtspRequest::new("TEARDOWN", self.request_uri.clone(), cseq)
            .with_header("User-Agent", self.user_agent.clone());
        if let Some(session_id) = self.session_id.lock().clone() {
            request = request.with_header("Session", session_id);
        }
        self.correlator.register(cseq, "TEARDOWN");
        self.writer.lock().send(&request.serialize())?;
        self.correlator.wait(cseq, self.request_timeout).ok_or(ClientError::Timeout { cseq })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::ChannelSink;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    fn config_for(addr: std::net::SocketAddr) -> ClientConfig {
        let mut cfg = ClientConfig::new(vec![format!("rtsp://{}/stream", addr)]);
        cfg.request_timeout_ms = 1000;
        cfg.connect_timeout_ms = 1000;
        cfg
    }

    fn new_session(addr: std::net::SocketAddr, pool: &Arc<dyn SocketPool>) -> Session {
        let (sink, _rx) = ChannelSink::new();
        Session::new(config_for(addr), Arc::downgrade(pool), Box::new(sink))
    }

    fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = [0u8; 4096];
        let mut text = String::new();
        loop {
            let n = stream.read(&mut buf).unwrap();
            text.push_str(&String::from_utf8_lossy(&buf[..n]));
            if text.ends_with("\r\n\r\n") {
                break;
            }
        }
        text
    }

    const SDP: &str = "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=s\r\nt=0 0\r\nm=video 0 RTP/AVP 96\r\na=rtpmap:96 H264/90000\r\na=control:track1\r\n";

    #[test]
    fn full_dialogue_reaches_playing_then_stopped() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();

            let describe = read_request(&mut stream);
            assert!(describe.starts_with("DESCRIBE"));
            let body = SDP;
            stream
                .write_all(
                    format!(
                        "RTSP/1.0 200 OK\r\nCSeq: 1\r\nSession: abc123\r\nContent-Base: rtsp://{addr}/stream/\r\nContent-Length: {}\r\n\r\n{}",
                        body.len(),
                        body
                    )
                    .as_bytes(),
                )
                .unwrap();

            let setup = read_request(&mut stream);
            assert!(setup.starts_with("SETUP"));
            stream
                .write_all(b"RTSP/1.0 200 OK\r\nCSeq: 2\r\nSession: abc123\r\nTransport: RTP/AVP/TCP;unicast;interleaved=0-1\r\n\r\n")
                .unwrap();

            let play = read_request(&mut stream);
            assert!(play.starts_with("PLAY"));
            stream
                .write_all(b"RTSP/1.0 200 OK\r\nCSeq: 3\r\nSession: abc123\r\n\r\n")
                .unwrap();

            let teardown = read_request(&mut stream);
            assert!(teardown.starts_with("TEARDOWN"));
            stream
                .write_all(b"RTSP/1.0 200 OK\r\nCSeq: 4\r\nSession: abc123\r\n\r\n")
                .unwrap();
        });

        let pool: Arc<dyn SocketPool> = Arc::new(crate::socket::StdSocketPool);
        let mut session = new_session(addr, &pool);
        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Described);
        assert_eq!(session.tracks().count(), 1);

        session.play().unwrap();
        assert_eq!(session.state(), SessionState::Playing);

        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);

        server.join().unwrap();
    }

    #[test]
    fn describe_with_unsupported_codec_moves_to_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            read_request(&mut stream);
            let body = "v=0\r\nm=video 0 RTP/AVP 26\r\na=rtpmap:26 MJPEG/90000\r\na=control:track1\r\n";
            stream
                .write_all(
                    format!(
                        "RTSP/1.0 200 OK\r\nCSeq: 1\r\nSession: abc\r\nContent-Length: {}\r\n\r\n{}",
                        body.len(),
                        body
                    )
                    .as_bytes(),
                )
                .unwrap();
        });

        let pool: Arc<dyn SocketPool> = Arc::new(crate::socket::StdSocketPool);
        let mut session = new_session(addr, &pool);
        let result = session.start();
        assert!(result.is_err());
        assert_eq!(session.state(), SessionState::Error);
        server.join().unwrap();
    }

    #[test]
    fn describe_missing_session_header_is_a_protocol_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            read_request(&mut stream);
            stream.write_all(b"RTSP/1.0 200 OK\r\nCSeq: 1\r\n\r\n").unwrap();
        });

        let pool: Arc<dyn SocketPool> = Arc::new(crate::socket::StdSocketPool);
        let mut session = new_session(addr, &pool);
        assert!(session.start().is_err());
        assert_eq!(session.state(), SessionState::Error);
        server.join().unwrap();
    }

    #[test]
    fn play_before_describe_is_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let pool: Arc<dyn SocketPool> = Arc::new(crate::socket::StdSocketPool);
        let mut session = new_session(addr, &pool);
        assert!(session.play().is_err());
    }
}
