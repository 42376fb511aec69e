//! Inbound email webhook normalization.
//!
//! Mailgun posts inbound mail as form-encoded fields with the body already
//! extracted, so no RFC 5322 parsing is needed. This module turns that raw
//! field set (plus any uploaded-file descriptors from the host's upload
//! middleware) into a single canonical, schema-stable email record.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::WebhookError;
use crate::normalize::fields::{
    clean_message_id, extract_email, extract_emails, headers_to_map, lookup_header,
    parse_message_headers,
};

/// Uploaded-file descriptor handed over by the host framework.
///
/// Treated as opaque input; field names follow the usual upload-middleware
/// shape.
#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    pub originalname: Option<String>,
    pub mimetype: Option<String>,
    pub size: u64,
    pub encoding: Option<String>,
    pub fieldname: Option<String>,
    pub buffer: Option<Vec<u8>>,
}

/// Attachment metadata derived from one uploaded file.
///
/// Each record exclusively owns its buffer; nothing is shared across
/// records. Lifetime is scoped to the request: the caller must persist or
/// discard before the host reclaims the underlying request buffers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMeta {
    /// Original filename, or a synthesized unique placeholder
    pub filename: String,
    pub originalname: Option<String>,
    /// Content type, defaulting to a generic binary type
    pub mimetype: String,
    pub size: u64,
    /// Lowercased text after the final `.` in the original filename
    pub extension: Option<String>,
    pub encoding: Option<String>,
    pub fieldname: Option<String>,
    #[serde(default)]
    pub buffer: Option<Vec<u8>>,
}

/// Canonical record for one inbound email.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRecord {
    /// Bracket-stripped Message-ID header value
    pub message_id: Option<String>,
    /// Single extracted sender address (empty string if absent)
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
    /// Flat header map; duplicate names resolved last-write-wins
    pub headers: HashMap<String, String>,
    pub attachments: Vec<AttachmentMeta>,
    /// Independently-reported count from the raw field; may disagree with
    /// `attachments.len()` when the source omitted files
    pub attachment_count: u64,
    /// Processing-time wall clock, always equal to `timestamp`
    pub received_at: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

/// Normalize a raw inbound webhook into a canonical email record.
///
/// Fails only when the field container itself is absent; every individual
/// missing or malformed field degrades to an empty/default value instead.
pub fn normalize_inbound(
    fields: Option<&HashMap<String, String>>,
    files: &[UploadedFile],
) -> Result<EmailRecord, WebhookError> {
    let fields = fields.ok_or(WebhookError::MissingBody)?;

    // Single wall-clock capture, used for both record timestamps and for
    // synthesized attachment filenames.
    let now = Utc::now();

    let header_pairs = fields
        .get("message-headers")
        .map(|raw| parse_message_headers(raw))
        .unwrap_or_default();
    let headers = headers_to_map(&header_pairs);

    let from = nonempty(fields, "sender")
        .or_else(|| nonempty(fields, "from"))
        .map(extract_email)
        .unwrap_or_default();

    let to = nonempty(fields, "recipient")
        .or_else(|| lookup_header(&headers, &["To", "TO"]))
        .map(extract_emails)
        .unwrap_or_default();

    let cc = nonempty(fields, "cc")
        .or_else(|| lookup_header(&headers, &["Cc", "CC"]))
        .map(extract_emails)
        .unwrap_or_default();

    let message_id = lookup_header(&headers, &["Message-ID", "Message-Id"])
        .and_then(clean_message_id);

    let text = nonempty(fields, "body-plain")
        .or_else(|| nonempty(fields, "stripped-text"))
        .unwrap_or_default()
        .to_string();

    let html = nonempty(fields, "body-html")
        .or_else(|| nonempty(fields, "stripped-html"))
        .unwrap_or_default()
        .to_string();

    let subject = fields.get("subject").cloned().unwrap_or_default();

    let attachments: Vec<AttachmentMeta> = files
        .iter()
        .enumerate()
        .map(|(index, file)| build_attachment(file, index, &now))
        .collect();

    // Pass-through, not a cross-check against the uploaded files.
    let attachment_count = fields
        .get("attachment-count")
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .unwrap_or(0);

    let record = EmailRecord {
        message_id,
        from,
        to,
        cc,
        subject,
        text,
        html,
        headers,
        attachments,
        attachment_count,
        received_at: now,
        timestamp: now,
    };

    info!(
        message_id = ?record.message_id,
        from = %record.from,
        to_count = record.to.len(),
        attachment_count = record.attachment_count,
        attachments = record.attachments.len(),
        has_html = !record.html.is_empty(),
        "inbound_normalize_complete"
    );

    Ok(record)
}

/// Field accessor that treats empty and whitespace-only strings as absent.
fn nonempty<'a>(fields: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.trim().is_empty())
}

fn build_attachment(file: &UploadedFile, index: usize, now: &DateTime<Utc>) -> AttachmentMeta {
    let filename = file
        .originalname
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("attachment-{}-{}", now.timestamp_millis(), index));

    let extension = file
        .originalname
        .as_deref()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty());

    AttachmentMeta {
        filename,
        originalname: file.originalname.clone(),
        mimetype: file
            .mimetype
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "application/octet-stream".to_string()),
        size: file.size,
        extension,
        encoding: file.encoding.clone(),
        fieldname: file.fieldname.clone(),
        buffer: file.buffer.clone(),
    }
}
