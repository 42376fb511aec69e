//! Delivery-event webhook normalization.
//!
//! Mailgun posts delivery events as JSON with the interesting fields nested
//! under an `event-data` object. This module verifies the request signature,
//! classifies the event against a closed set of known kinds, and builds a
//! canonical record. Unknown kinds degrade to an `unknown` record carrying
//! the raw event data verbatim rather than failing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::WebhookError;
use crate::webhook::signature::verify_request;

/// Closed set of recognized Mailgun event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    Delivered,
    Opened,
    Clicked,
    Bounced,
    Complained,
    Failed,
    Unsubscribed,
    Stored,
}

impl EventKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "delivered" => Some(EventKind::Delivered),
            "opened" => Some(EventKind::Opened),
            "clicked" => Some(EventKind::Clicked),
            "bounced" => Some(EventKind::Bounced),
            "complained" => Some(EventKind::Complained),
            "failed" => Some(EventKind::Failed),
            "unsubscribed" => Some(EventKind::Unsubscribed),
            "stored" => Some(EventKind::Stored),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            EventKind::Delivered => "delivered",
            EventKind::Opened => "opened",
            EventKind::Clicked => "clicked",
            EventKind::Bounced => "bounced",
            EventKind::Complained => "complained",
            EventKind::Failed => "failed",
            EventKind::Unsubscribed => "unsubscribed",
            EventKind::Stored => "stored",
        }
    }
}

/// SMTP delivery status details attached to delivered/bounced/failed events.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt_no: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_seconds: Option<f64>,
}

impl DeliveryStatus {
    /// Parse every known field from a `delivery-status` object.
    fn parse(value: Option<&Value>) -> Self {
        let obj = match value {
            Some(v) if v.is_object() => v,
            _ => return DeliveryStatus::default(),
        };

        // Status codes arrive as numbers or as numeric strings.
        let code = obj.get("code").and_then(|c| match c {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });

        DeliveryStatus {
            code,
            message: str_of(obj, "message"),
            description: str_of(obj, "description"),
            tls: obj.get("tls").and_then(Value::as_bool),
            certificate_verified: obj.get("certificate-verified").and_then(Value::as_bool),
            attempt_no: obj.get("attempt-no").and_then(Value::as_i64),
            session_seconds: obj.get("session-seconds").and_then(Value::as_f64),
        }
    }

    fn for_delivery(value: Option<&Value>) -> Self {
        DeliveryStatus {
            attempt_no: None,
            session_seconds: None,
            ..DeliveryStatus::parse(value)
        }
    }

    fn for_bounce(value: Option<&Value>) -> Self {
        DeliveryStatus {
            tls: None,
            certificate_verified: None,
            ..DeliveryStatus::parse(value)
        }
    }
}

/// Per-kind payload of a canonical event record.
///
/// Serializes untagged and flattened into [`EventRecord`]; the record's
/// `event`/`status` fields carry the discriminant.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EventDetail {
    #[serde(rename_all = "camelCase")]
    Delivered {
        delivered_at: Option<String>,
        delivery_status: DeliveryStatus,
    },
    #[serde(rename_all = "camelCase")]
    Opened {
        opened_at: Option<String>,
        client_info: Option<Value>,
        geolocation: Option<Value>,
        user_agent: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Clicked {
        clicked_at: Option<String>,
        url: Option<String>,
        client_info: Option<Value>,
        geolocation: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    Bounced {
        bounced_at: Option<String>,
        reason: Option<String>,
        delivery_status: DeliveryStatus,
        severity: String,
    },
    #[serde(rename_all = "camelCase")]
    Complained { complained_at: Option<String> },
    #[serde(rename_all = "camelCase")]
    Failed {
        failed_at: Option<String>,
        reason: Option<String>,
        delivery_status: DeliveryStatus,
    },
    #[serde(rename_all = "camelCase")]
    Unsubscribed { unsubscribed_at: Option<String> },
    #[serde(rename_all = "camelCase")]
    Stored { stored_at: Option<String> },
    #[serde(rename_all = "camelCase")]
    Unknown { full_event_data: Value },
}

/// Canonical record for one delivery-event notification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub received: bool,
    /// Event kind string; `"unknown"` for unrecognized kinds
    pub event: String,
    pub event_id: Option<String>,
    pub recipient: Option<String>,
    pub message_id: Option<String>,
    /// Event time as an ISO-8601 string; epoch-second inputs are converted,
    /// string inputs pass through unchanged
    pub timestamp: Option<String>,
    pub domain: Option<String>,
    /// Log-correlation value only; idempotency must use `event_id`
    pub correlation_id: String,
    pub processed_at: String,
    /// Mirror of `event`
    pub status: String,
    #[serde(flatten)]
    pub detail: EventDetail,
}

/// Normalize a raw event-webhook body into a canonical event record.
///
/// Runs signature verification first when a signing key is provided; a
/// `None` key skips verification (host chose not to configure one). The
/// only other failures are a missing body and a payload with no `event`
/// field; an unrecognized event kind is not a failure.
pub fn normalize_event(
    body: Option<&Value>,
    signing_key: Option<&str>,
    max_age_seconds: u64,
    correlation_header: Option<&str>,
) -> Result<EventRecord, WebhookError> {
    let body = body.ok_or(WebhookError::MissingBody)?;

    match signing_key {
        Some(key) => {
            if !verify_request(body, key, max_age_seconds) {
                return Err(WebhookError::SignatureRejected);
            }
        }
        None => warn!("event_signature_not_configured"),
    }

    let data = match body.get("event-data").filter(|d| d.is_object()) {
        Some(d) => d,
        None => {
            warn!("event_data_missing");
            return Err(WebhookError::MissingEventType);
        }
    };

    let event_raw = match str_of(data, "event") {
        Some(e) => e,
        None => {
            warn!("event_type_missing");
            return Err(WebhookError::MissingEventType);
        }
    };

    let correlation_id = correlation_header
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .unwrap_or_else(synthesize_correlation_id);

    let kind = EventKind::parse(&event_raw);
    let timestamp = timestamp_to_iso(data.get("timestamp"));

    let reason = data
        .get("delivery-status")
        .and_then(|ds| ds.get("description"))
        .and_then(Value::as_str)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .or_else(|| str_of(data, "reason"))
        .or_else(|| str_of(data, "failure-reason"));

    let detail = match kind {
        Some(EventKind::Delivered) => EventDetail::Delivered {
            delivered_at: timestamp.clone(),
            delivery_status: DeliveryStatus::for_delivery(data.get("delivery-status")),
        },
        Some(EventKind::Opened) => EventDetail::Opened {
            opened_at: timestamp.clone(),
            client_info: data.get("client-info").cloned(),
            geolocation: data.get("geolocation").cloned(),
            user_agent: data
                .get("client-info")
                .and_then(|ci| ci.get("user-agent"))
                .and_then(Value::as_str)
                .map(str::to_string),
        },
        Some(EventKind::Clicked) => EventDetail::Clicked {
            clicked_at: timestamp.clone(),
            url: str_of(data, "url"),
            client_info: data.get("client-info").cloned(),
            geolocation: data.get("geolocation").cloned(),
        },
        Some(EventKind::Bounced) => EventDetail::Bounced {
            bounced_at: timestamp.clone(),
            reason: reason.clone(),
            delivery_status: DeliveryStatus::for_bounce(data.get("delivery-status")),
            severity: str_of(data, "severity").unwrap_or_else(|| "permanent".to_string()),
        },
        Some(EventKind::Complained) => EventDetail::Complained {
            complained_at: timestamp.clone(),
        },
        Some(EventKind::Failed) => EventDetail::Failed {
            failed_at: timestamp.clone(),
            reason: reason.clone(),
            delivery_status: DeliveryStatus::parse(data.get("delivery-status")),
        },
        Some(EventKind::Unsubscribed) => EventDetail::Unsubscribed {
            unsubscribed_at: timestamp.clone(),
        },
        Some(EventKind::Stored) => EventDetail::Stored {
            stored_at: timestamp.clone(),
        },
        None => EventDetail::Unknown {
            full_event_data: data.clone(),
        },
    };

    let status = kind.map(EventKind::as_str).unwrap_or("unknown").to_string();

    let record = EventRecord {
        received: true,
        event: status.clone(),
        event_id: str_of(data, "id").or_else(|| str_of(data, "event-id")),
        recipient: str_of(data, "recipient"),
        message_id: extract_message_id(data),
        timestamp,
        domain: extract_domain(data),
        correlation_id,
        processed_at: Utc::now().to_rfc3339(),
        status,
        detail,
    };

    info!(
        event = %record.status,
        event_id = ?record.event_id,
        recipient = ?record.recipient,
        correlation_id = %record.correlation_id,
        "event_normalize_complete"
    );

    Ok(record)
}

/// Non-empty string accessor on a JSON object.
fn str_of(obj: &Value, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Message-id precedence: nested message header, then the flat field names.
fn extract_message_id(data: &Value) -> Option<String> {
    data.get("message")
        .and_then(|m| m.get("headers"))
        .and_then(|h| h.get("message-id"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .or_else(|| str_of(data, "message-id"))
        .or_else(|| str_of(data, "messageId"))
}

/// Domain precedence: `domain.name`, then a flat `domain` string.
fn extract_domain(data: &Value) -> Option<String> {
    data.get("domain")
        .and_then(|d| d.get("name"))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .or_else(|| str_of(data, "domain"))
}

/// Convert an event timestamp to an ISO-8601 string.
///
/// Epoch-second numbers (possibly fractional) are converted; strings pass
/// through unchanged; anything else is treated as absent.
fn timestamp_to_iso(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) => {
            let secs = n.as_f64()?;
            if !secs.is_finite() || secs < 0.0 {
                return None;
            }
            let whole = secs.trunc() as i64;
            let nanos = ((secs - whole as f64) * 1e9).round() as u32;
            DateTime::<Utc>::from_timestamp(whole, nanos.min(999_999_999))
                .map(|dt| dt.to_rfc3339())
        }
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Synthesize a correlation id when the host did not propagate one.
///
/// Time-based with a random suffix; unique enough for log correlation,
/// never used for idempotency.
fn synthesize_correlation_id() -> String {
    format!(
        "evt-{}-{:06x}",
        Utc::now().timestamp_millis(),
        rand::random::<u32>() & 0xff_ffff
    )
}
