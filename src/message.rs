//! RTSP message model: the request *builder* this client sends, and the
//! response *parser* for what comes back. The inverse of a server's
//! request-parser/response-builder pair.

use crate::error::{ClientError, ParseErrorKind, Result};

/// An ordered, case-insensitively-looked-up header list. Kept as a
/// `Vec<(String, String)>` rather than a `HashMap` so the wire order of a
/// freshly-built request is predictable.
#[derive(Debug, Clone, Default)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// An outgoing RTSP request under construction.
#[derive(Debug, Clone)]
pub struct RtspRequest {
    pub method: String,
    pub uri: String,
    pub cseq: u32,
    pub headers: Headers,
    pub body: Option<String>,
}

impl RtspRequest {
    pub fn new(method: impl Into<String>, uri: impl Into<String>, cseq: u32) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            cseq,
            headers: Headers::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(name, value);
        self
    }

    /// Serialize into wire-format bytes (`METHOD URI RTSP/1.0\r\n...\r\n\r\n<body>`).
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = format!("{} {} RTSP/1.0\r\n", self.method, self.uri);
        out.push_str(&format!("CSeq: {}\r\n", self.cseq));
        for (name, value) in self.headers.iter() {
            out.push_str(&format!("{name}: {value}\r\n"));
        }
        if let Some(body) = &self.body {
            out.push_str(&format!("Content-Length: {}\r\n", body.len()));
            out.push_str("\r\n");
            out.push_str(body);
        } else {
            out.push_str("\r\n");
        }
        out.into_bytes()
    }
}

/// A parsed inbound RTSP response.
#[derive(Debug, Clone)]
pub struct RtspResponse {
    pub status_code: u16,
    pub reason: String,
    pub cseq: u32,
    pub headers: Headers,
    pub body: Option<String>,
}

impl RtspResponse {
    pub fn is_ok(&self) -> bool {
        self.status_code == 200
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Parse a complete response (status line + headers + body, already
    /// framed by the demuxer - no trailing bytes beyond this one message).
    pub fn parse(raw: &str) -> Result<Self> {
        let mut lines = raw.split("\r\n");
        let status_line = lines
            .next()
            .ok_or(ClientError::Parse { kind: ParseErrorKind::EmptyMessage })?;

        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or("");
        let code = parts.next().unwrap_or("");
        let reason = parts.next().unwrap_or("").to_string();
        if !version.starts_with("RTSP/") {
            return Err(ClientError::Parse { kind: ParseErrorKind::InvalidStatusLine });
        }
        let status_code: u16 = code
            .parse()
            .map_err(|_| ClientError::Parse { kind: ParseErrorKind::InvalidStatusLine })?;

        let mut headers = Headers::new();
        let mut body_start = raw.len();
        let mut consumed = status_line.len() + 2;
        for line in lines {
            if line.is_empty() {
                consumed += 2;
                body_start = consumed;
                break;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or(ClientError::Parse { kind: ParseErrorKind::InvalidHeader })?;
            headers.push(name.trim(), value.trim());
            consumed += line.len() + 2;
        }

        let cseq: u32 = headers
            .get("CSeq")
            .and_then(|v| v.trim().parse().ok())
            .ok_or(ClientError::Parse { kind: ParseErrorKind::InvalidHeader })?;

        let body = if body_start < raw.len() {
            Some(raw[body_start..].to_string())
        } else {
            None
        };

        Ok(Self {
            status_code,
            reason,
            cseq,
            headers,
            body,
        })
    }
}

/// Strip a trailing `;timeout=N` (or other parameters) off a `Session`
/// header value, returning the bare session id.
pub fn session_id_from_header(value: &str) -> &str {
    value.split(';').next().unwrap_or(value).trim()
}

/// Extract the numeric timeout from a `Session: <id>;timeout=N` header,
/// if present.
pub fn session_timeout_from_header(value: &str) -> Option<u64> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("timeout="))
        .and_then(|n| n.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_with_cseq_first() {
        let req = RtspRequest::new("DESCRIBE", "rtsp://host/stream", 1)
            .with_header("Accept", "application/sdp");
        let bytes = req.serialize();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("DESCRIBE rtsp://host/stream RTSP/1.0\r\n"));
        assert!(text.contains("CSeq: 1\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn response_parses_status_and_cseq() {
        let raw = "RTSP/1.0 200 OK\r\nCSeq: 4\r\nSession: abc123;timeout=60\r\n\r\n";
        let resp = RtspResponse::parse(raw).unwrap();
        assert_eq!(resp.status_code, 200);
        assert_eq!(resp.cseq, 4);
        assert!(resp.is_ok());
        assert_eq!(resp.header("session"), Some("abc123;timeout=60"));
    }

    #[test]
    fn response_parses_body() {
        let raw = "RTSP/1.0 200 OK\r\nCSeq: 2\r\nContent-Length: 5\r\n\r\nhello";
        let resp = RtspResponse::parse(raw).unwrap();
        assert_eq!(resp.body.as_deref(), Some("hello"));
    }

    #[test]
    fn response_without_cseq_is_rejected() {
        let raw = "RTSP/1.0 200 OK\r\n\r\n";
        assert!(RtspResponse::parse(raw).is_err());
    }

    #[test]
    fn session_header_helpers_strip_timeout() {
        assert_eq!(session_id_from_header("abc123;timeout=60"), "abc123");
        assert_eq!(session_timeout_from_header("abc123;timeout=60"), Some(60));
        assert_eq!(session_timeout_from_header("abc123"), None);
    }
}
