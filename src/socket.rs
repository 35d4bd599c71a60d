//! Socket abstraction: `RtspSocket` (one connection) + `SocketPool`
//! (allocates them). The default implementation wraps `std::net::TcpStream`
//! with blocking I/O, timeouts via `set_read_timeout`, and `try_clone` for
//! an independent write handle.

use std::io;
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

#[cfg(unix)]
use std::os::fd::{AsRawFd, RawFd};

/// One TCP connection to an RTSP server, abstracted so tests can
/// substitute an in-memory/looped implementation.
pub trait RtspSocket: Send {
    fn connect(&mut self, addr: SocketAddr, timeout: Duration) -> io::Result<()>;
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;
    /// `non_blocking` selects whether a missing read should return
    /// `WouldBlock` immediately (event-loop phase) or block up to
    /// `timeout` (setup phase).
    fn recv(&mut self, buf: &mut [u8], non_blocking: bool, timeout: Option<Duration>) -> io::Result<usize>;
    /// An independent handle sharing the same underlying connection, used
    /// so `stop()` can write a TEARDOWN from the caller thread while the
    /// event-loop worker thread still owns the read side.
    fn try_clone(&self) -> io::Result<Box<dyn RtspSocket>>;
    #[cfg(unix)]
    fn native_handle(&self) -> RawFd;
}

/// Non-owning allocator for sockets. The session holds only a `Weak`
/// reference to its pool (see the design notes on cyclic back-references
/// to a parent provider) rather than shared ownership.
pub trait SocketPool: Send + Sync {
    fn allocate_socket(&self) -> Box<dyn RtspSocket>;
}

pub struct StdTcpSocket {
    stream: Option<TcpStream>,
}

impl StdTcpSocket {
    pub fn new() -> Self {
        Self { stream: None }
    }

    fn stream(&mut self) -> io::Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "socket not connected"))
    }
}

impl Default for StdTcpSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl RtspSocket for StdTcpSocket {
    fn connect(&mut self, addr: SocketAddr, timeout: Duration) -> io::Result<()> {
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_nodelay(true).ok();
        self.stream = Some(stream);
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        use std::io::Write;
        self.stream()?.write_all(bytes)
    }

    fn recv(&mut self, buf: &mut [u8], non_blocking: bool, timeout: Option<Duration>) -> io::Result<usize> {
        use std::io::Read;
        let stream = self.stream()?;
        if non_blocking {
            stream.set_read_timeout(Some(Duration::from_millis(1)))?;
        } else {
            stream.set_read_timeout(timeout)?;
        }
        match stream.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if non_blocking && matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Err(io::Error::new(io::ErrorKind::WouldBlock, e))
            }
            Err(e) => Err(e),
        }
    }

    fn try_clone(&self) -> io::Result<Box<dyn RtspSocket>> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "socket not connected"))?
            .try_clone()?;
        Ok(Box::new(StdTcpSocket { stream: Some(stream) }))
    }

    #[cfg(unix)]
    fn native_handle(&self) -> RawFd {
        self.stream.as_ref().map(|s| s.as_raw_fd()).unwrap_or(-1)
    }
}

#[derive(Default)]
pub struct StdSocketPool;

impl SocketPool for StdSocketPool {
    fn allocate_socket(&self) -> Box<dyn RtspSocket> {
        Box::new(StdTcpSocket::new())
    }
}
