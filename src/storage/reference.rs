use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

/// Everything except RFC 3986 unreserved characters and `/`.
pub const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

const SIGNATURE_PARAMS: [&str; 2] = ["X-Amz-Signature", "X-Amz-Algorithm"];

pub fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_ENCODE_SET).to_string()
}

/// `https://{bucket}.{endpoint_host}/{percent-encoded key}`
pub fn virtual_hosted_url(bucket: &str, endpoint_host: &str, key: &str) -> String {
    format!("https://{}.{}/{}", bucket, endpoint_host, encode_key(key))
}

/// Unsigned reference on the standard regional AWS endpoint.
pub fn to_unsigned_reference(bucket: &str, region: &str, key: &str) -> String {
    virtual_hosted_url(bucket, &format!("s3.{}.amazonaws.com", region), key)
}

/// Whether the URL already carries signature query parameters.
pub fn is_presigned(reference: &str) -> bool {
    match Url::parse(reference) {
        Ok(url) => url
            .query_pairs()
            .any(|(name, _)| SIGNATURE_PARAMS.contains(&name.as_ref())),
        Err(_) => false,
    }
}

/// Recover the decoded object key from a virtual-hosted
/// (`https://{bucket}.s3.../{key}`) or path-style
/// (`https://s3.../{bucket}/{key}`) URL into `bucket`.
pub fn extract_key(reference: &str, bucket: &str) -> Option<String> {
    let url = Url::parse(reference).ok()?;
    let host = url.host_str()?;
    let path = url.path();

    let encoded = if host.starts_with(&format!("{}.", bucket)) {
        path.trim_start_matches('/')
    } else {
        let mut segments = path.splitn(3, '/');
        // Leading empty segment before the first '/'.
        segments.next()?;
        if segments.next()? != bucket {
            return None;
        }
        segments.next()?
    };

    if encoded.is_empty() {
        return None;
    }

    percent_decode_str(encoded)
        .decode_utf8()
        .ok()
        .map(|key| key.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_reference_encodes_key() {
        let url = to_unsigned_reference("bucket", "ap-northeast-2", "uploads/u 1/보고서.pdf");
        assert_eq!(
            url,
            "https://bucket.s3.ap-northeast-2.amazonaws.com/uploads/u%201/%EB%B3%B4%EA%B3%A0%EC%84%9C.pdf"
        );
    }

    #[test]
    fn key_round_trips_through_reference() {
        let key = "uploads/7/42/0f3c-분기 실적 (최종)+v2.pdf";
        let url = to_unsigned_reference("bucket", "ap-northeast-2", key);
        assert!(!is_presigned(&url));
        assert_eq!(extract_key(&url, "bucket").as_deref(), Some(key));
    }

    #[test]
    fn path_style_urls_are_accepted() {
        let url = "https://s3.ap-northeast-2.amazonaws.com/bucket/uploads/a%20b.pdf";
        assert_eq!(extract_key(url, "bucket").as_deref(), Some("uploads/a b.pdf"));
        assert_eq!(extract_key(url, "other"), None);
    }

    #[test]
    fn urls_without_key_are_rejected() {
        assert_eq!(extract_key("https://bucket.s3.us-east-1.amazonaws.com/", "bucket"), None);
        assert_eq!(extract_key("https://s3.us-east-1.amazonaws.com/bucket", "bucket"), None);
        assert_eq!(extract_key("relative/path.pdf", "bucket"), None);
    }

    #[test]
    fn detects_signature_parameters() {
        assert!(is_presigned("https://b.s3.x.amazonaws.com/k?X-Amz-Algorithm=AWS4-HMAC-SHA256"));
        assert!(is_presigned("https://b.s3.x.amazonaws.com/k?a=1&X-Amz-Signature=ff"));
        assert!(!is_presigned("https://b.s3.x.amazonaws.com/k?versionId=3"));
        assert!(!is_presigned("garbage"));
    }
}
