//! Shared utility functions for provider adapters.

use bn_domain::error::Error;

/// Convert a [`reqwest::Error`] into the domain error, tagged with the
/// provider that failed. Timeouts and transport failures alike surface
/// as upstream errors.
pub(crate) fn from_reqwest(provider: &str, e: reqwest::Error) -> Error {
    let message = if e.is_timeout() {
        format!("request timed out: {e}")
    } else {
        e.to_string()
    };
    Error::Provider {
        provider: provider.to_string(),
        message,
    }
}

/// Truncate upstream response bodies before they land in error messages
/// or span attributes.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Build the error for a non-2xx provider response, with the body
/// truncated to 200 chars.
pub(crate) fn upstream_error(provider: &str, status: u16, body: &str) -> Error {
    Error::Provider {
        provider: provider.to_string(),
        message: format!("HTTP {status}: {}", truncate(body, 200)),
    }
}
