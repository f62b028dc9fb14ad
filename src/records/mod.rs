//!
//! timecard record store
//! ---------------------
//! Work-interval records live in the `records` collection, keyed by a
//! generated uuid. A record tracks an owner email, an optional finish instant,
//! an optional total duration in seconds and a free-text note field.
//!
//! The start instant is derived, never client-supplied: whenever both
//! finish_time and total_time are known, `start_time = finish_time -
//! total_time` (seconds). When either half of the pair is missing after a
//! create or update, start_time is left untouched.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::storage::{Collection, SharedStore};

const COLLECTION: &str = "records";

/// A stored work-interval record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRecord {
    pub id: String,
    pub owner_email: String,
    /// Derived from finish_time and total_time; see module docs.
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    /// Worked duration in seconds.
    pub total_time: Option<i64>,
    pub notes: String,
}

/// Partial update applied to an existing record. Absent fields keep their
/// stored values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordPatch {
    pub finish_time: Option<DateTime<Utc>>,
    pub total_time: Option<i64>,
    pub notes: Option<String>,
}

/// Time record store over the shared document storage.
#[derive(Clone)]
pub struct RecordStore {
    records: Collection,
}

impl RecordStore {
    pub fn new(store: &SharedStore) -> AppResult<Self> {
        Ok(Self { records: store.collection(COLLECTION)? })
    }

    /// Create a record under a fresh id and derive its start instant.
    pub fn create(
        &self,
        owner_email: &str,
        finish_time: Option<DateTime<Utc>>,
        total_time: Option<i64>,
        notes: &str,
    ) -> AppResult<TimeRecord> {
        let mut record = TimeRecord {
            id: Uuid::new_v4().to_string(),
            owner_email: owner_email.to_string(),
            start_time: None,
            finish_time,
            total_time,
            notes: notes.to_string(),
        };
        derive_start(&mut record);
        self.put(&record)?;
        debug!(target: "timecard::records", "record created id={} owner={}", record.id, record.owner_email);
        Ok(record)
    }

    /// Fetch a record by id.
    pub fn get(&self, id: &str) -> AppResult<Option<TimeRecord>> {
        match self.records.get(id) {
            Some(doc) => Ok(Some(decode(doc)?)),
            None => Ok(None),
        }
    }

    /// Apply a patch to an existing record, re-deriving the start instant when
    /// the finish/total pair is complete afterwards. Returns None when the id
    /// does not exist.
    pub fn update(&self, id: &str, patch: RecordPatch) -> AppResult<Option<TimeRecord>> {
        let Some(mut record) = self.get(id)? else { return Ok(None) };
        if let Some(finish) = patch.finish_time {
            record.finish_time = Some(finish);
        }
        if let Some(total) = patch.total_time {
            record.total_time = Some(total);
        }
        if let Some(notes) = patch.notes {
            record.notes = notes;
        }
        derive_start(&mut record);
        self.put(&record)?;
        Ok(Some(record))
    }

    /// Append text to the record's notes, separated by a single space.
    /// Returns None when the id does not exist.
    pub fn append_note(&self, id: &str, note: &str) -> AppResult<Option<TimeRecord>> {
        let Some(mut record) = self.get(id)? else { return Ok(None) };
        record.notes.push(' ');
        record.notes.push_str(note);
        self.put(&record)?;
        Ok(Some(record))
    }

    /// Best-effort delete: true only when the record existed and was removed.
    /// Storage failures are logged and reported as a plain false.
    pub fn delete(&self, id: &str) -> bool {
        match self.records.remove(id) {
            Ok(removed) => removed,
            Err(e) => {
                warn!(target: "timecard::records", "delete failed id={}: {}", id, e);
                false
            }
        }
    }

    /// Every stored record, in unspecified order.
    pub fn list_all(&self) -> AppResult<Vec<TimeRecord>> {
        self.records.all().into_iter().map(decode).collect()
    }

    fn put(&self, record: &TimeRecord) -> AppResult<()> {
        let doc = serde_json::to_value(record).map_err(|e| AppError::Internal {
            code: "internal_error".into(),
            message: e.to_string(),
        })?;
        self.records.upsert(&record.id, doc)?;
        Ok(())
    }
}

// start = finish - total seconds, only when both halves are known.
fn derive_start(record: &mut TimeRecord) {
    if let (Some(finish), Some(total)) = (record.finish_time, record.total_time) {
        record.start_time = TimeDelta::try_seconds(total).and_then(|d| finish.checked_sub_signed(d));
    }
}

fn decode(doc: serde_json::Value) -> AppResult<TimeRecord> {
    serde_json::from_value(doc).map_err(|e| AppError::Storage {
        code: "storage_error".into(),
        message: format!("corrupt record document: {}", e),
    })
}
