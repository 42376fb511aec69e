//! Webhook payload normalization.
//!
//! Turns the two Mailgun webhook shapes into canonical records:
//!
//! ```text
//! form fields + files → normalize_inbound() → EmailRecord
//! JSON event body     → normalize_event()   → EventRecord
//! ```
//!
//! Both normalizers favor partial, inspectable output over all-or-nothing
//! rejection: individually missing or malformed fields degrade to defaults,
//! and only a missing request body (or, for events, a payload with no event
//! type) is a hard failure.

pub mod event;
pub mod fields;
pub mod inbound;

pub use event::{normalize_event, DeliveryStatus, EventDetail, EventRecord};
pub use fields::{
    clean_message_id, extract_email, extract_emails, headers_to_map, lookup_header,
    parse_message_headers,
};
pub use inbound::{normalize_inbound, AttachmentMeta, EmailRecord, UploadedFile};
