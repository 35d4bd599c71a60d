//! Control-URL resolution (absolute / Content-Base-relative /
//! request-URL-relative), built on the `url` crate's `Url` type.

use url::Url;

use crate::error::{ClientError, Result};

/// Resolve a per-track `a=control` value into an absolute control URL.
///
/// - Already-absolute `rtsp://` values are returned verbatim.
/// - Otherwise, a non-empty `content_base` is joined with `control`.
/// - Otherwise, the request URL (with its query string stripped, then
///   re-appended) is joined with `control`.
pub fn resolve_control_url(control: &str, content_base: Option<&str>, request_url: &Url) -> Result<Url> {
    if control.to_ascii_lowercase().starts_with("rtsp://") {
        return Url::parse(control)
            .map_err(|e| ClientError::protocol(format!("invalid absolute control url: {e}")));
    }

    match content_base {
        Some(base) if !base.is_empty() => {
            let base = Url::parse(base)
                .map_err(|e| ClientError::protocol(format!("invalid content-base: {e}")))?;
            join_with_slash(&base, control, None)
        }
        _ => {
            let mut base = request_url.clone();
            base.set_query(None);
            join_with_slash(&base, control, request_url.query())
        }
    }
}

fn join_with_slash(base: &Url, control: &str, query: Option<&str>) -> Result<Url> {
    let mut base_str = base.as_str().trim_end_matches('/').to_string();
    base_str.push('/');
    base_str.push_str(control);
    if let Some(q) = query {
        if !base_str.contains('?') {
            base_str.push('?');
            base_str.push_str(q);
        }
    }
    Url::parse(&base_str).map_err(|e| ClientError::protocol(format!("cannot resolve control url: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_url() -> Url {
        Url::parse("rtsp://example.com:554/live/stream").unwrap()
    }

    #[test]
    fn absolute_control_is_returned_verbatim() {
        let resolved =
            resolve_control_url("rtsp://other.example.com/track1", None, &request_url()).unwrap();
        assert_eq!(resolved.as_str(), "rtsp://other.example.com/track1");
    }

    #[test]
    fn absolute_control_is_idempotent() {
        let once = resolve_control_url("rtsp://other.example.com/track1", None, &request_url()).unwrap();
        let twice = resolve_control_url(once.as_str(), None, &request_url()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn relative_control_joins_content_base() {
        let resolved = resolve_control_url(
            "track1",
            Some("rtsp://example.com:554/live/stream/"),
            &request_url(),
        )
        .unwrap();
        assert_eq!(resolved.as_str(), "rtsp://example.com:554/live/stream/track1");
    }

    #[test]
    fn relative_control_falls_back_to_request_url() {
        let resolved = resolve_control_url("track1", None, &request_url()).unwrap();
        assert_eq!(resolved.as_str(), "rtsp://example.com:554/live/stream/track1");
    }

    #[test]
    fn relative_control_preserves_request_query() {
        let mut with_query = request_url();
        with_query.set_query(Some("auth=abc"));
        let resolved = resolve_control_url("track1", None, &with_query).unwrap();
        assert_eq!(resolved.query(), Some("auth=abc"));
    }
}
