use crate::record::{parse_timestamp, IntakeForm, SessionRecord};
use crate::store::UsageStore;
use chrono::Utc;
use std::sync::Arc;

/// Session lifecycle tracking over a [`UsageStore`].
///
/// Every operation performs a full load-mutate-save cycle against the
/// store. Store failures degrade: loads fall back to an empty collection
/// and saves are skipped, with the error logged; no operation surfaces a
/// failure to its caller. Mutating methods take `&mut self`; holding the
/// tracker behind a write lock therefore makes each whole cycle exclusive,
/// so concurrent callers cannot lose updates to each other.
pub struct UsageTracker {
    store: Arc<dyn UsageStore>,
}

impl UsageTracker {
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self { store }
    }

    /// Begin tracking a session. No-op if the user already has one.
    pub async fn start_session(&mut self, user_id: &str) {
        self.start_session_at(user_id, Utc::now().to_rfc3339()).await;
    }

    /// Begin tracking a session with an explicit start timestamp.
    pub async fn start_session_at(&mut self, user_id: &str, timestamp: impl Into<String>) {
        let mut records = self.load_or_empty().await;
        if records.iter().any(|r| r.user_id == user_id) {
            return;
        }
        records.push(SessionRecord::new(user_id, timestamp));
        self.save_or_log(&records).await;
        tracing::info!("Started tracking session for user {}", user_id);
    }

    /// Record an intake form submission, creating the session if needed.
    ///
    /// Overwrites the demographic fields in place; values are taken as given.
    pub async fn record_intake(&mut self, user_id: &str, form: &IntakeForm) {
        let mut records = self.load_or_empty().await;
        if !records.iter().any(|r| r.user_id == user_id) {
            records.push(SessionRecord::new(user_id, Utc::now().to_rfc3339()));
        }
        if let Some(record) = records.iter_mut().find(|r| r.user_id == user_id) {
            record.age = form.age;
            record.location = form.location.clone();
            record.gender = form.gender.clone();
            record.cancer_type = form.cancer_type.clone();
            record.cancer_stage = form.cancer_stage.clone();
            record.comorbidities = form.comorbidities.clone();
            record.prior_treatments = form.prior_treatments.clone();
        }
        self.save_or_log(&records).await;
        tracing::info!("Tracked intake form for user {}", user_id);
    }

    /// Count one message sent by the user, creating the session if needed.
    pub async fn record_message(&mut self, user_id: &str) {
        let mut records = self.load_or_empty().await;
        match records.iter_mut().find(|r| r.user_id == user_id) {
            Some(record) => record.messages_sent += 1,
            None => {
                let mut record = SessionRecord::new(user_id, Utc::now().to_rfc3339());
                record.messages_sent = 1;
                records.push(record);
            }
        }
        self.save_or_log(&records).await;
    }

    /// Record the result count of the user's latest trial search.
    ///
    /// Overwrites any previous count rather than accumulating. No-op when
    /// the user has no session.
    pub async fn record_trials_found(&mut self, user_id: &str, count: u64) {
        let mut records = self.load_or_empty().await;
        if let Some(record) = records.iter_mut().find(|r| r.user_id == user_id) {
            record.trials_found = count;
            self.save_or_log(&records).await;
        }
    }

    /// Close the user's open session.
    ///
    /// Write-once: a session that already ended is left untouched, so a
    /// second call is a no-op.
    pub async fn end_session(&mut self, user_id: &str) {
        self.end_session_at(user_id, Utc::now().to_rfc3339()).await;
    }

    /// Close the user's open session with an explicit end timestamp.
    pub async fn end_session_at(&mut self, user_id: &str, timestamp: impl Into<String>) {
        let mut records = self.load_or_empty().await;
        let open = records
            .iter_mut()
            .find(|r| r.user_id == user_id && r.session_end.is_none());
        if let Some(record) = open {
            let end = timestamp.into();
            match (parse_timestamp(&record.session_start), parse_timestamp(&end)) {
                (Some(start), Some(finish)) => {
                    let duration = finish - start;
                    record.total_duration_seconds =
                        Some(duration.num_milliseconds() as f64 / 1000.0);
                }
                _ => {
                    tracing::warn!(
                        "Could not parse session timestamps for user {}; duration left unset",
                        user_id
                    );
                }
            }
            record.session_end = Some(end);
            self.save_or_log(&records).await;
            tracing::info!("Ended session for user {}", user_id);
        }
    }

    /// Snapshot of all records in insertion order. Empty on store failure.
    pub async fn all_records(&self) -> Vec<SessionRecord> {
        self.load_or_empty().await
    }

    /// Delete all collected data. Irreversible.
    pub async fn clear(&mut self) {
        self.save_or_log(&[]).await;
        tracing::info!("Cleared all usage data");
    }

    async fn load_or_empty(&self) -> Vec<SessionRecord> {
        match self.store.load().await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!("Failed to load usage data: {}", e);
                Vec::new()
            }
        }
    }

    async fn save_or_log(&self, records: &[SessionRecord]) {
        if let Err(e) = self.store.save(records).await {
            tracing::error!("Failed to save usage data: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{JsonFileStore, MemoryStore};
    use tokio::sync::RwLock;

    fn memory_tracker() -> UsageTracker {
        UsageTracker::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_start_session_is_idempotent() {
        let mut tracker = memory_tracker();
        tracker
            .start_session_at("u1", "2026-01-05T10:00:00+00:00")
            .await;
        tracker
            .start_session_at("u1", "2026-01-05T12:00:00+00:00")
            .await;

        let records = tracker.all_records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].session_start, "2026-01-05T10:00:00+00:00");
    }

    #[tokio::test]
    async fn test_record_message_counts() {
        let mut tracker = memory_tracker();
        tracker.start_session("u1").await;
        for _ in 0..3 {
            tracker.record_message("u1").await;
        }
        assert_eq!(tracker.all_records().await[0].messages_sent, 3);
    }

    #[tokio::test]
    async fn test_record_message_creates_session_implicitly() {
        let mut tracker = memory_tracker();
        tracker.record_message("u1").await;

        let records = tracker.all_records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].messages_sent, 1);
        assert!(!records[0].session_start.is_empty());
    }

    #[tokio::test]
    async fn test_record_intake_creates_and_overwrites() {
        let mut tracker = memory_tracker();

        let first = IntakeForm {
            age: Some(65.0),
            location: Some("CA".into()),
            gender: Some("Male".into()),
            cancer_type: Some("Prostate Cancer".into()),
            cancer_stage: Some("Stage II".into()),
            comorbidities: vec!["Diabetes".into()],
            prior_treatments: vec!["Surgery".into(), "Radiation".into()],
        };
        tracker.record_intake("u1", &first).await;

        let records = tracker.all_records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].age, Some(65.0));
        assert_eq!(records[0].prior_treatments, vec!["Surgery", "Radiation"]);

        // Resubmitting the form replaces the previous answers.
        let second = IntakeForm {
            age: Some(66.0),
            location: Some("NY".into()),
            ..IntakeForm::default()
        };
        tracker.record_intake("u1", &second).await;

        let records = tracker.all_records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].age, Some(66.0));
        assert_eq!(records[0].location.as_deref(), Some("NY"));
        assert!(records[0].comorbidities.is_empty());
    }

    #[tokio::test]
    async fn test_record_trials_found_overwrites() {
        let mut tracker = memory_tracker();
        tracker.start_session("u1").await;
        tracker.record_trials_found("u1", 5).await;
        tracker.record_trials_found("u1", 2).await;
        assert_eq!(tracker.all_records().await[0].trials_found, 2);
    }

    #[tokio::test]
    async fn test_record_trials_found_without_session_is_noop() {
        let mut tracker = memory_tracker();
        tracker.record_trials_found("ghost", 5).await;
        assert!(tracker.all_records().await.is_empty());
    }

    #[tokio::test]
    async fn test_end_session_computes_duration() {
        let mut tracker = memory_tracker();
        tracker
            .start_session_at("u1", "2026-01-05T10:00:00+00:00")
            .await;
        tracker
            .end_session_at("u1", "2026-01-05T10:02:00+00:00")
            .await;

        let records = tracker.all_records().await;
        assert_eq!(records[0].session_end.as_deref(), Some("2026-01-05T10:02:00+00:00"));
        assert_eq!(records[0].total_duration_seconds, Some(120.0));
    }

    #[tokio::test]
    async fn test_end_session_is_write_once() {
        let mut tracker = memory_tracker();
        tracker
            .start_session_at("u1", "2026-01-05T10:00:00+00:00")
            .await;
        tracker
            .end_session_at("u1", "2026-01-05T10:02:00+00:00")
            .await;
        tracker
            .end_session_at("u1", "2026-01-05T11:00:00+00:00")
            .await;

        let records = tracker.all_records().await;
        assert_eq!(records[0].session_end.as_deref(), Some("2026-01-05T10:02:00+00:00"));
        assert_eq!(records[0].total_duration_seconds, Some(120.0));
    }

    #[tokio::test]
    async fn test_end_session_without_session_is_noop() {
        let mut tracker = memory_tracker();
        tracker.end_session("ghost").await;
        assert!(tracker.all_records().await.is_empty());
    }

    #[tokio::test]
    async fn test_end_session_with_unparseable_start() {
        let mut tracker = memory_tracker();
        tracker.start_session_at("u1", "whenever").await;
        tracker
            .end_session_at("u1", "2026-01-05T10:02:00+00:00")
            .await;

        let records = tracker.all_records().await;
        // The end is still recorded; only the derived duration is skipped.
        assert!(records[0].session_end.is_some());
        assert!(records[0].total_duration_seconds.is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let mut tracker = memory_tracker();
        tracker.start_session("u1").await;
        tracker.start_session("u2").await;
        tracker.clear().await;
        assert!(tracker.all_records().await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_store_degrades_to_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("usage_stats.json");
        std::fs::write(&path, "not json at all").unwrap();

        let mut tracker = UsageTracker::new(Arc::new(JsonFileStore::new(path.clone())));
        assert!(tracker.all_records().await.is_empty());

        // Mutations still work; the first save replaces the bad file.
        tracker.record_message("u1").await;
        let records = tracker.all_records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].messages_sent, 1);
    }

    #[tokio::test]
    async fn test_unwritable_store_does_not_fail_caller() {
        let dir = tempfile::TempDir::new().unwrap();
        // A directory at the target path makes every save fail.
        let path = dir.path().join("usage_stats.json");
        std::fs::create_dir(&path).unwrap();

        let mut tracker = UsageTracker::new(Arc::new(JsonFileStore::new(path)));
        tracker.record_message("u1").await;
        tracker.end_session("u1").await;
    }

    #[tokio::test]
    async fn test_concurrent_messages_are_both_counted() {
        let tracker = Arc::new(RwLock::new(memory_tracker()));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move {
                tracker.write().await.record_message("u1").await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let records = tracker.read().await.all_records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].messages_sent, 2);
    }
}
