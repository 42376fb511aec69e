//! Error types for webhook processing.
//!
//! Only structural problems are surfaced as errors: a missing request body,
//! a rejected signature, or an event payload with no event type. Everything
//! else (missing fields, unparseable headers, bad counters) degrades to a
//! default value so that partially-formed provider traffic still normalizes.

use thiserror::Error;

/// Hard failures a webhook normalizer can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WebhookError {
    /// The request body container itself was absent. There is no sensible
    /// empty-record default for "no request at all".
    #[error("request body is missing")]
    MissingBody,

    /// Signature verification failed. Covers both HMAC mismatch and
    /// replay-window rejection; callers are deliberately unable to tell
    /// the two apart.
    #[error("webhook signature rejected")]
    SignatureRejected,

    /// An event payload carried no `event` field at all, so it cannot be
    /// classified.
    #[error("event payload has no event type")]
    MissingEventType,
}

impl WebhookError {
    /// Conventional HTTP status for this failure.
    ///
    /// Hosts are free to ignore this, but the convention keeps provider
    /// retry storms away: only malformed requests and signature failures
    /// are non-2xx. A missing event type is acknowledged with 200 plus an
    /// embedded error note.
    pub fn http_status(&self) -> u16 {
        match self {
            WebhookError::MissingBody => 400,
            WebhookError::SignatureRejected => 401,
            WebhookError::MissingEventType => 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(WebhookError::MissingBody.http_status(), 400);
        assert_eq!(WebhookError::SignatureRejected.http_status(), 401);
        assert_eq!(WebhookError::MissingEventType.http_status(), 200);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            WebhookError::SignatureRejected.to_string(),
            "webhook signature rejected"
        );
    }
}
