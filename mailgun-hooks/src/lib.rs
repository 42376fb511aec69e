//! Mailgun webhook verification and payload normalization.
//!
//! This library authenticates Mailgun webhook requests and turns their two
//! payload shapes into canonical records for a host web server:
//! - inbound mail arrives form-encoded and becomes an [`EmailRecord`]
//! - delivery events arrive as JSON and become an [`EventRecord`]
//!
//! ## Processing Flow
//!
//! ```text
//! HTTP request → host framework decodes body
//!     inbound:  normalize_inbound(fields, files)          → EmailRecord
//!     events:   normalize_event(body, key, max_age, hdr)  → EventRecord
//!     ad hoc:   verify_signature(key, ts, token, sig, age) → bool
//! ```
//!
//! The crate runs no server and holds no cross-request state: every
//! operation is a synchronous pure function over an in-memory request
//! snapshot. Response emission, persistence, and retries stay with the
//! host.

pub mod config;
pub mod error;
pub mod normalize;
pub mod webhook;

// Re-export commonly used types
pub use config::Config;
pub use error::WebhookError;
pub use normalize::{
    normalize_event, normalize_inbound, AttachmentMeta, DeliveryStatus, EmailRecord,
    EventDetail, EventRecord, UploadedFile,
};
pub use webhook::{
    extract_signature, verify_request, verify_signature, SignatureTuple,
    DEFAULT_MAX_AGE_SECONDS,
};
