//! Endpoint normalization for metrics bucketing

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Bucket used when a URL cannot be parsed
pub const UNKNOWN_ENDPOINT: &str = "unknown";

const RELATIVE_BASE: &str = "http://localhost";

fn uuid_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
            .expect("UUID regex is valid")
    })
}

/// Reduce a URL to a low-cardinality endpoint key
///
/// Scheme, host, query and fragment are dropped. Numeric path segments
/// become `:id` and UUID segments become `:uuid`.
///
/// ```rust
/// use resilience_machines::normalize_endpoint;
///
/// assert_eq!(normalize_endpoint("/math/add?x=1"), "/math/add");
/// assert_eq!(normalize_endpoint("https://api.example.com/users/42/posts"), "/users/:id/posts");
/// ```
pub fn normalize_endpoint(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return UNKNOWN_ENDPOINT.to_string();
    }

    let parsed = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            match Url::parse(RELATIVE_BASE).and_then(|base| base.join(raw)) {
                Ok(url) => url,
                Err(_) => return UNKNOWN_ENDPOINT.to_string(),
            }
        }
        Err(_) => return UNKNOWN_ENDPOINT.to_string(),
    };

    let Some(segments) = parsed.path_segments() else {
        return UNKNOWN_ENDPOINT.to_string();
    };

    let normalized: Vec<&str> = segments
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                ":id"
            } else if uuid_regex().is_match(segment) {
                ":uuid"
            } else {
                segment
            }
        })
        .collect();

    format!("/{}", normalized.join("/"))
}
