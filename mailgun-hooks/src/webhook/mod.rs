//! Webhook authentication.
//!
//! Signature verification for both Mailgun webhook payload shapes:
//! top-level triples on inbound mail, nested `signature` objects on
//! delivery-event notifications.

pub mod signature;

pub use signature::{
    extract_signature, verify_request, verify_signature, SignatureTuple,
    DEFAULT_MAX_AGE_SECONDS,
};
