use std::io;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rtsp_client::{ChannelSink, ClientConfig, ProcessOutcome, Session, SocketPool, StdSocketPool};

#[derive(Parser)]
#[command(name = "pull-client", about = "Standalone RTSP pull client")]
struct Args {
    /// RTSP URL to pull from, e.g. rtsp://127.0.0.1:8554/stream
    url: String,

    /// Connect/request timeout in milliseconds
    #[arg(long, default_value_t = 3000)]
    timeout_ms: u64,
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut config = ClientConfig::new(vec![args.url.clone()]);
    config.connect_timeout_ms = args.timeout_ms;
    config.request_timeout_ms = args.timeout_ms;

    let pool: Arc<dyn SocketPool> = Arc::new(StdSocketPool);
    let (sink, rx) = ChannelSink::new();
    let mut session = Session::new(config, Arc::downgrade(&pool), Box::new(sink));

    if let Err(e) = session.start() {
        eprintln!("DESCRIBE/SETUP failed: {e}");
        return;
    }
    println!("described {} track(s), state {:?}", session.tracks().count(), session.state());

    if let Err(e) = session.play() {
        eprintln!("PLAY failed: {e}");
        return;
    }
    println!("playing {} - press Enter to stop", args.url);

    let handle = session.handle().expect("session is playing");
    let stdin_watcher = std::thread::spawn(move || {
        let mut input = String::new();
        io::stdin().read_line(&mut input).ok();
    });

    let mut teardown_sent = false;
    loop {
        match session.process_media_packet() {
            ProcessOutcome::Success => {
                while let Ok(packet) = rx.try_recv() {
                    println!(
                        "frame track={} pts={} bytes={}",
                        packet.track_id,
                        packet.pts,
                        packet.bitstream.len()
                    );
                }
            }
            ProcessOutcome::TryAgain => std::thread::sleep(Duration::from_millis(5)),
            ProcessOutcome::Failure => break,
        }
        if !teardown_sent && stdin_watcher.is_finished() {
            teardown_sent = true;
            if let Err(e) = handle.teardown() {
                eprintln!("TEARDOWN failed: {e}");
                break;
            }
        }
    }

    println!("stopped, final state {:?}", session.state());
}
