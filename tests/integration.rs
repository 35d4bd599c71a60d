//! Integration test: full client dialogue DESCRIBE -> SETUP -> PLAY -> media
//! -> TEARDOWN against a hand-rolled mock RTSP server.
//!
//! Drives the public `Session` API the same way a real event loop would,
//! rather than exercising any single module in isolation.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rtsp_client::{ChannelSink, ClientConfig, ProcessOutcome, Session, SocketPool, StdSocketPool};

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

fn rtp_packet(marker: bool, pt: u8, seq: u16, ts: u32, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0x80u8, (marker as u8) << 7 | pt];
    buf.extend_from_slice(&seq.to_be_bytes());
    buf.extend_from_slice(&ts.to_be_bytes());
    buf.extend_from_slice(&0xaabbccddu32.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

fn interleaved(channel: u8, rtp: &[u8]) -> Vec<u8> {
    let mut buf = vec![0x24u8, channel];
    buf.extend_from_slice(&(rtp.len() as u16).to_be_bytes());
    buf.extend_from_slice(rtp);
    buf
}

fn new_config(addr: std::net::SocketAddr) -> ClientConfig {
    let mut cfg = ClientConfig::new(vec![format!("rtsp://{}/stream", addr)]);
    cfg.connect_timeout_ms = 1000;
    cfg.request_timeout_ms = 1000;
    cfg
}

const SDP: &str = "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=s\r\nt=0 0\r\nm=video 0 RTP/AVP 96\r\na=rtpmap:96 H264/90000\r\na=control:track1\r\n";

#[test]
fn full_session_dialogue_delivers_media_then_tears_down() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();

        let describe = read_request(&mut stream);
        assert!(describe.starts_with("DESCRIBE"));
        stream
            .write_all(
                format!(
                    "RTSP/1.0 200 OK\r\nCSeq: 1\r\nSession: sess1\r\nContent-Base: rtsp://{addr}/stream/\r\nContent-Length: {}\r\n\r\n{}",
                    SDP.len(),
                    SDP
                )
                .as_bytes(),
            )
            .unwrap();

        let setup = read_request(&mut stream);
        assert!(setup.starts_with("SETUP"));
        stream
            .write_all(b"RTSP/1.0 200 OK\r\nCSeq: 2\r\nSession: sess1\r\nTransport: RTP/AVP/TCP;unicast;interleaved=0-1\r\n\r\n")
            .unwrap();

        let play = read_request(&mut stream);
        assert!(play.starts_with("PLAY"));
        // Fuse the PLAY response together with the first interleaved RTP
        // frame in a single write, exercising the demuxer's ability to pull
        // both a text message and a binary frame out of one socket read.
        let nal = [0x67u8, 0x01, 0x02, 0x03];
        let rtp = rtp_packet(true, 96, 1, 3000, &nal);
        let frame = interleaved(0, &rtp);
        let mut fused = b"RTSP/1.0 200 OK\r\nCSeq: 3\r\nSession: sess1\r\n\r\n".to_vec();
        fused.extend_from_slice(&frame);
        stream.write_all(&fused).unwrap();

        let teardown = read_request(&mut stream);
        assert!(teardown.starts_with("TEARDOWN"));
        stream
            .write_all(b"RTSP/1.0 200 OK\r\nCSeq: 4\r\nSession: sess1\r\n\r\n")
            .unwrap();
    });

    let pool: Arc<dyn SocketPool> = Arc::new(StdSocketPool);
    let (sink, rx) = ChannelSink::new();
    let mut session = Session::new(new_config(addr), Arc::downgrade(&pool), Box::new(sink));

    session.start().expect("describe+setup");
    assert_eq!(session.tracks().count(), 1);

    session.play().expect("play");

    // `handle` lets a separate control thread request TEARDOWN while this
    // thread keeps owning `process_media_packet`, the same split the demo
    // binary uses between its stdin-watcher thread and its event loop.
    let handle = session.handle().expect("handle while playing");
    let (first_packet_tx, first_packet_rx) = std::sync::mpsc::channel::<()>();

    let control = thread::spawn(move || {
        first_packet_rx.recv().expect("driver thread signals first packet");
        handle.teardown().expect("teardown from a separate control thread")
    });

    let mut received = None;
    let mut signalled = false;
    let mut stopped = false;
    for _ in 0..400 {
        match session.process_media_packet() {
            ProcessOutcome::Success => {
                if let Ok(packet) = rx.try_recv() {
                    if received.is_none() {
                        received = Some(packet);
                    }
                    if !signalled {
                        signalled = true;
                        first_packet_tx.send(()).unwrap();
                    }
                }
            }
            ProcessOutcome::TryAgain => thread::sleep(Duration::from_millis(5)),
            ProcessOutcome::Failure => {
                stopped = true;
                break;
            }
        }
    }

    let packet = received.expect("media packet delivered alongside the PLAY response");
    assert_eq!(packet.track_id, 96);
    assert!(packet.bitstream.starts_with(&[0, 0, 0, 1]));
    assert!(stopped, "session should observe the TEARDOWN response and stop");
    assert_eq!(session.state(), rtsp_client::SessionState::Stopped);

    control.join().unwrap();
    server.join().unwrap();
}
