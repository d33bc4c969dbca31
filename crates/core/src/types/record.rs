//! A single shared countdown

use crate::types::Validator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Allowed gap between `initial_duration` and `expires_at - created_at`
const DURATION_TOLERANCE: Duration = Duration::from_secs(2);

/// One entry of the shared document
///
/// `expires_at` is the only source of truth for the time left. The initial
/// duration is kept for progress display and never used to derive expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerRecord {
    /// Timer key; on the wire this is the map key of the `timers` object
    #[serde(skip)]
    pub key: String,
    /// Absolute UTC instant at which the countdown ends
    pub expires_at: DateTime<Utc>,
    /// Free-text attribution of the writer
    pub created_by: String,
    /// UTC instant of creation
    pub created_at: DateTime<Utc>,
    /// Original countdown length, whole seconds on the wire
    #[serde(rename = "initialDurationSeconds", with = "duration_secs")]
    pub initial_duration: Duration,
    /// Opaque phase label computed once by the creator
    #[serde(default)]
    pub predicted_phase: String,
    /// Human readable form of the phase label
    #[serde(default)]
    pub predicted_phase_display: String,
}

impl TimerRecord {
    /// Creates a record counting down `duration` from `now`
    ///
    /// The duration is truncated to whole seconds so the record survives a
    /// round trip through the wire format unchanged. A duration reaching past
    /// the representable range leaves `expires_at` at `now`, which fails
    /// validation.
    pub fn new(
        key: impl Into<String>,
        duration: Duration,
        created_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let duration = Duration::from_secs(duration.as_secs());
        let expires_at = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|span| now.checked_add_signed(span))
            .unwrap_or(now);

        Self {
            key: key.into(),
            expires_at,
            created_by: created_by.into(),
            created_at: now,
            initial_duration: duration,
            predicted_phase: String::new(),
            predicted_phase_display: String::new(),
        }
    }

    /// Sets the predicted phase labels
    pub fn with_phase(mut self, phase: impl Into<String>, display: impl Into<String>) -> Self {
        self.predicted_phase = phase.into();
        self.predicted_phase_display = display.into();
        self
    }

    /// Carries the phase labels of an earlier record for the same key forward
    pub fn inherit_phase_from(mut self, existing: &TimerRecord) -> Self {
        if !existing.predicted_phase.is_empty() {
            self.predicted_phase = existing.predicted_phase.clone();
            self.predicted_phase_display = existing.predicted_phase_display.clone();
        }
        self
    }

    /// Returns true once `now` has reached the expiry instant
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Time left until expiry, zero once expired
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Returns true if the record expires within `window` of `now`
    pub fn expires_within(&self, window: Duration, now: DateTime<Utc>) -> bool {
        self.remaining(now) <= window
    }

    /// Elapsed share of the initial duration, between 0 and 100
    pub fn progress_percentage(&self, now: DateTime<Utc>) -> f64 {
        let total = self.initial_duration.as_secs().max(1);
        let remaining = self.remaining(now).as_secs();
        let elapsed = total.saturating_sub(remaining);
        (elapsed as f64 * 100.0 / total as f64).min(100.0)
    }

    /// Returns true if both records describe the same countdown within `tolerance`
    pub fn is_equivalent_to(&self, other: &TimerRecord, tolerance: Duration) -> bool {
        let gap = if self.expires_at >= other.expires_at {
            self.expires_at - other.expires_at
        } else {
            other.expires_at - self.expires_at
        };
        self.key == other.key && gap.to_std().map(|g| g <= tolerance).unwrap_or(false)
    }
}

impl Validator for TimerRecord {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.key.trim().is_empty() {
            errors.push("key must not be empty".to_string());
        }

        match (self.expires_at - self.created_at).to_std() {
            Ok(span) => {
                let drift = if span > self.initial_duration {
                    span - self.initial_duration
                } else {
                    self.initial_duration - span
                };
                if drift > DURATION_TOLERANCE {
                    errors.push(format!(
                        "initial duration {}s does not match expiry span {}s",
                        self.initial_duration.as_secs(),
                        span.as_secs()
                    ));
                }
            }
            Err(_) => errors.push("createdAt must not be after expiresAt".to_string()),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 30, 11, 30, 0).unwrap()
    }

    #[test]
    fn test_new_sets_expiry_from_duration() {
        let record = TimerRecord::new("overworld", Duration::from_secs(90), "alice", t0());
        assert_eq!(record.expires_at, t0() + chrono::Duration::seconds(90));
        assert_eq!(record.created_at, t0());
        assert_eq!(record.initial_duration, Duration::from_secs(90));
        assert!(record.is_valid());
    }

    #[test]
    fn test_new_truncates_sub_second_duration() {
        let record = TimerRecord::new("overworld", Duration::from_millis(90_750), "alice", t0());
        assert_eq!(record.initial_duration, Duration::from_secs(90));
    }

    #[test]
    fn test_out_of_range_duration_is_invalid() {
        let far = Duration::from_secs(100_000_000_000_000);
        let record = TimerRecord::new("nether", far, "alice", t0());
        assert_eq!(record.expires_at, t0());
        assert!(!record.is_valid());

        let record = TimerRecord::new("nether", Duration::from_secs(u64::MAX), "alice", t0());
        assert!(!record.is_valid());
    }

    #[test]
    fn test_expiry_boundary() {
        let record = TimerRecord::new("nether", Duration::from_secs(10), "alice", t0());
        let just_before = t0() + chrono::Duration::milliseconds(9_999);
        let at_expiry = t0() + chrono::Duration::seconds(10);

        assert!(!record.is_expired(just_before));
        assert!(record.is_expired(at_expiry));
        assert_eq!(record.remaining(at_expiry), Duration::ZERO);
        assert_eq!(record.remaining(at_expiry + chrono::Duration::seconds(5)), Duration::ZERO);
    }

    #[test]
    fn test_progress_percentage() {
        let record = TimerRecord::new("end", Duration::from_secs(100), "alice", t0());
        assert_eq!(record.progress_percentage(t0()), 0.0);
        assert_eq!(record.progress_percentage(t0() + chrono::Duration::seconds(25)), 25.0);
        assert_eq!(record.progress_percentage(t0() + chrono::Duration::seconds(500)), 100.0);
    }

    #[test]
    fn test_expires_within() {
        let record = TimerRecord::new("end", Duration::from_secs(120), "alice", t0());
        assert!(!record.expires_within(Duration::from_secs(60), t0()));
        assert!(record.expires_within(Duration::from_secs(60), t0() + chrono::Duration::seconds(61)));
    }

    #[test]
    fn test_inherit_phase_keeps_existing_labels() {
        let first = TimerRecord::new("end", Duration::from_secs(120), "alice", t0())
            .with_phase("dusk", "Dusk");
        let second = TimerRecord::new("end", Duration::from_secs(300), "bob", t0())
            .with_phase("night", "Night")
            .inherit_phase_from(&first);

        assert_eq!(second.predicted_phase, "dusk");
        assert_eq!(second.predicted_phase_display, "Dusk");
    }

    #[test]
    fn test_inherit_phase_ignores_unlabelled_record() {
        let first = TimerRecord::new("end", Duration::from_secs(120), "alice", t0());
        let second = TimerRecord::new("end", Duration::from_secs(300), "bob", t0())
            .with_phase("night", "Night")
            .inherit_phase_from(&first);

        assert_eq!(second.predicted_phase, "night");
    }

    #[test]
    fn test_equivalence_tolerance() {
        let a = TimerRecord::new("end", Duration::from_secs(120), "alice", t0());
        let b = TimerRecord::new("end", Duration::from_secs(128), "bob", t0());
        let c = TimerRecord::new("end", Duration::from_secs(140), "bob", t0());

        assert!(a.is_equivalent_to(&b, Duration::from_secs(10)));
        assert!(!a.is_equivalent_to(&c, Duration::from_secs(10)));
    }

    #[test]
    fn test_validation_rejects_inverted_instants() {
        let mut record = TimerRecord::new("end", Duration::from_secs(60), "alice", t0());
        record.created_at = record.expires_at + chrono::Duration::seconds(1);
        assert!(!record.is_valid());
    }

    #[test]
    fn test_validation_rejects_mismatched_duration() {
        let mut record = TimerRecord::new("end", Duration::from_secs(60), "alice", t0());
        record.initial_duration = Duration::from_secs(600);
        let errors = record.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("initial duration"));
    }

    #[test]
    fn test_validation_rejects_blank_key() {
        let record = TimerRecord::new("  ", Duration::from_secs(60), "alice", t0());
        assert!(!record.is_valid());
    }

    #[test]
    fn test_wire_field_names() {
        let record = TimerRecord::new("end", Duration::from_secs(60), "alice", t0())
            .with_phase("dusk", "Dusk");
        let json = serde_json::to_value(&record).unwrap();

        assert!(json.get("key").is_none());
        assert_eq!(json["initialDurationSeconds"], 60);
        assert_eq!(json["createdBy"], "alice");
        assert_eq!(json["predictedPhase"], "dusk");
        assert_eq!(json["predictedPhaseDisplay"], "Dusk");
        assert!(json["expiresAt"].as_str().unwrap().starts_with("2025-08-30T11:31:00"));
    }
}
