/// Client-level configuration.
///
/// Mirrors the options table: an ordered list of candidate source URLs
/// (first preferred) plus the timing and sizing knobs the session and
/// socket layer need.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Candidate RTSP source URLs, in preference order. Only the first is
    /// used by [`crate::session::Session::start`]; the rest exist so a
    /// caller can construct a fresh session against the next one on failure.
    pub url_list: Vec<String>,
    /// TCP connect deadline.
    pub connect_timeout_ms: u64,
    /// Deadline for each of DESCRIBE/SETUP/PLAY/TEARDOWN responses.
    pub request_timeout_ms: u64,
    /// Maximum bytes read per socket `recv` call.
    pub recv_buffer_size: usize,
    /// Value sent as the `User-Agent` header on every request.
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(url_list: Vec<String>) -> Self {
        Self {
            url_list,
            ..Self::default()
        }
    }

    pub fn primary_url(&self) -> Option<&str> {
        self.url_list.first().map(String::as_str)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url_list: Vec::new(),
            connect_timeout_ms: 3000,
            request_timeout_ms: 3000,
            recv_buffer_size: 65535,
            user_agent: format!("rtsp-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}
