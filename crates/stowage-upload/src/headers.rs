//! Header reconciliation
//!
//! Merges the caller's headers with a `Content-Type` inferred from the blob's
//! declared MIME type. An existing `Content-Type` (any case) always wins.

/// Header name/value pair
pub type HeaderField = (String, String);

/// Canonical spelling used when a header is inferred
pub const CONTENT_TYPE: &str = "Content-Type";

/// Check for a `Content-Type` header, ignoring ASCII case
#[inline]
#[must_use]
pub fn has_content_type(headers: &[HeaderField]) -> bool {
    headers
        .iter()
        .any(|(name, _)| name.eq_ignore_ascii_case(CONTENT_TYPE))
}

/// Reconcile caller headers with the blob's declared MIME type
///
/// Appends exactly one `Content-Type` when none is present and `mime_type` is
/// non-empty; otherwise returns `headers` untouched. Idempotent.
#[must_use]
pub fn reconcile_headers(mut headers: Vec<HeaderField>, mime_type: Option<&str>) -> Vec<HeaderField> {
    if has_content_type(&headers) {
        return headers;
    }

    match mime_type {
        Some(mime) if !mime.is_empty() => {
            headers.push((CONTENT_TYPE.to_string(), mime.to_string()));
            headers
        }
        _ => headers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn header(name: &str, value: &str) -> HeaderField {
        (name.to_string(), value.to_string())
    }

    #[test]
    fn infers_from_mime_type() {
        let headers = reconcile_headers(vec![], Some("image/png"));
        assert_eq!(headers, vec![header("Content-Type", "image/png")]);
    }

    #[test]
    fn appends_after_existing_headers() {
        let headers = reconcile_headers(
            vec![header("Cache-Control", "max-age=60")],
            Some("text/html"),
        );
        assert_eq!(
            headers,
            vec![
                header("Cache-Control", "max-age=60"),
                header("Content-Type", "text/html"),
            ]
        );
    }

    #[test]
    fn caller_header_wins_regardless_of_case() {
        for name in ["content-type", "CONTENT-TYPE", "Content-type"] {
            let original = vec![header(name, "text/plain")];
            let headers = reconcile_headers(original.clone(), Some("image/png"));
            assert_eq!(headers, original);
        }
    }

    #[test]
    fn no_inference_without_mime_type() {
        assert!(reconcile_headers(vec![], None).is_empty());
        assert!(reconcile_headers(vec![], Some("")).is_empty());
    }

    #[test]
    fn reconcile_is_idempotent() {
        let once = reconcile_headers(vec![header("ETag", "x")], Some("application/json"));
        let twice = reconcile_headers(once.clone(), Some("application/json"));
        assert_eq!(once, twice);

        let other_mime = reconcile_headers(once.clone(), Some("text/plain"));
        assert_eq!(once, other_mime);
    }
}
