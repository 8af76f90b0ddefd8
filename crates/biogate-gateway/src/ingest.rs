//! Validation and normalization of raw device pushes.
//!
//! Devices resend pushes on ambiguous acknowledgement, so identical
//! punches within a short window are suppressed. Unknown verify codes
//! map to [`VerifyMethod::Unknown`] rather than failing; the dashboard
//! must still show the punch.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Deserialize;

use biogate_core::error::IngestError;
use biogate_core::event::{AttendanceEvent, VerifyMethod};

/// Maximum tolerated device clock skew into the future.
const MAX_FUTURE_SKEW: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Deserialize)]
struct RawPush {
    #[serde(alias = "userId", alias = "userid")]
    user_id: Option<String>,
    timestamp: Option<serde_json::Value>,
    #[serde(alias = "verifyMethod", alias = "verify")]
    verify_method: Option<u8>,
    status: Option<u8>,
}

type DedupKey = (String, DateTime<Utc>, VerifyMethod);

/// Push validator with duplicate suppression.
pub struct Ingestor {
    window: Duration,
    recent: Mutex<VecDeque<(DedupKey, Instant)>>,
}

impl Ingestor {
    /// Create an ingestor with the given dedup window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            recent: Mutex::new(VecDeque::new()),
        }
    }

    /// Validate a raw push body into an [`AttendanceEvent`].
    ///
    /// Publishing the event is the caller's job; a `Duplicate` result
    /// means the identical punch was already accepted within the window.
    pub fn ingest(&self, raw: &[u8]) -> Result<AttendanceEvent, IngestError> {
        let push: RawPush = serde_json::from_slice(raw)
            .map_err(|err| IngestError::MalformedPayload(err.to_string()))?;

        let user_id = push
            .user_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(IngestError::MissingUserId)?;

        let timestamp = parse_timestamp(push.timestamp)?;
        let skew = timestamp.signed_duration_since(Utc::now());
        if skew.to_std().is_ok_and(|d| d > MAX_FUTURE_SKEW) {
            return Err(IngestError::FutureTimestamp);
        }

        let method = push.verify_method.map_or(VerifyMethod::Unknown, VerifyMethod::from_code);

        self.check_duplicate((user_id.clone(), timestamp, method))?;

        Ok(AttendanceEvent {
            user_id,
            timestamp,
            method,
            raw_status: push.status.unwrap_or(0),
        })
    }

    fn check_duplicate(&self, key: DedupKey) -> Result<(), IngestError> {
        let now = Instant::now();
        let mut recent = self.recent.lock();
        while recent
            .front()
            .is_some_and(|(_, seen)| now.duration_since(*seen) > self.window)
        {
            recent.pop_front();
        }
        if recent.iter().any(|(k, _)| *k == key) {
            return Err(IngestError::Duplicate);
        }
        recent.push_back((key, now));
        Ok(())
    }
}

fn parse_timestamp(value: Option<serde_json::Value>) -> Result<DateTime<Utc>, IngestError> {
    let value = value.ok_or_else(|| IngestError::BadTimestamp("missing".to_string()))?;
    match value {
        serde_json::Value::String(text) => DateTime::parse_from_rfc3339(&text)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| IngestError::BadTimestamp(text)),
        serde_json::Value::Number(number) => number
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| IngestError::BadTimestamp(number.to_string())),
        other => Err(IngestError::BadTimestamp(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingestor() -> Ingestor {
        Ingestor::new(Duration::from_secs(2))
    }

    fn push_body(user_id: &str, timestamp: &str) -> Vec<u8> {
        serde_json::json!({
            "userId": user_id,
            "timestamp": timestamp,
            "verifyMethod": 1,
            "status": 0,
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_valid_push_normalizes() {
        let event = ingestor()
            .ingest(&push_body("42", "2024-05-01T08:30:00Z"))
            .unwrap();
        assert_eq!(event.user_id, "42");
        assert_eq!(event.method, VerifyMethod::Fingerprint);
        assert_eq!(event.timestamp.to_rfc3339(), "2024-05-01T08:30:00+00:00");
    }

    #[test]
    fn test_unix_timestamp_accepted() {
        let body = serde_json::json!({"userId": "7", "timestamp": 1_714_550_400})
            .to_string()
            .into_bytes();
        let event = ingestor().ingest(&body).unwrap();
        assert_eq!(event.user_id, "7");
        assert_eq!(event.method, VerifyMethod::Unknown);
    }

    #[test]
    fn test_missing_user_id_rejected() {
        let body = serde_json::json!({"timestamp": "2024-05-01T08:30:00Z"})
            .to_string()
            .into_bytes();
        assert_eq!(
            ingestor().ingest(&body).unwrap_err(),
            IngestError::MissingUserId
        );

        assert_eq!(
            ingestor().ingest(&push_body("  ", "2024-05-01T08:30:00Z")).unwrap_err(),
            IngestError::MissingUserId
        );
    }

    #[test]
    fn test_unparseable_timestamp_rejected() {
        let err = ingestor()
            .ingest(&push_body("42", "yesterday-ish"))
            .unwrap_err();
        assert!(matches!(err, IngestError::BadTimestamp(_)));
    }

    #[test]
    fn test_far_future_timestamp_rejected() {
        let future = (Utc::now() + chrono::Duration::hours(48)).to_rfc3339();
        assert_eq!(
            ingestor().ingest(&push_body("42", &future)).unwrap_err(),
            IngestError::FutureTimestamp
        );

        // A few minutes of drift is tolerated.
        let near = (Utc::now() + chrono::Duration::minutes(5)).to_rfc3339();
        assert!(ingestor().ingest(&push_body("42", &near)).is_ok());
    }

    #[test]
    fn test_not_json_rejected() {
        assert!(matches!(
            ingestor().ingest(b"not json at all").unwrap_err(),
            IngestError::MalformedPayload(_)
        ));
    }

    #[test]
    fn test_unknown_verify_code_maps_to_unknown() {
        let body = serde_json::json!({
            "userId": "42",
            "timestamp": "2024-05-01T08:30:00Z",
            "verifyMethod": 99,
        })
        .to_string()
        .into_bytes();
        let event = ingestor().ingest(&body).unwrap();
        assert_eq!(event.method, VerifyMethod::Unknown);
    }

    #[test]
    fn test_duplicate_within_window_suppressed() {
        let ingestor = ingestor();
        let body = push_body("42", "2024-05-01T08:30:00Z");

        assert!(ingestor.ingest(&body).is_ok());
        assert_eq!(ingestor.ingest(&body).unwrap_err(), IngestError::Duplicate);

        // A different method is a different punch.
        let other = serde_json::json!({
            "userId": "42",
            "timestamp": "2024-05-01T08:30:00Z",
            "verifyMethod": 2,
        })
        .to_string()
        .into_bytes();
        assert!(ingestor.ingest(&other).is_ok());
    }

    #[test]
    fn test_duplicate_allowed_after_window() {
        let ingestor = Ingestor::new(Duration::from_millis(10));
        let body = push_body("42", "2024-05-01T08:30:00Z");

        assert!(ingestor.ingest(&body).is_ok());
        std::thread::sleep(Duration::from_millis(30));
        assert!(ingestor.ingest(&body).is_ok());
    }
}
