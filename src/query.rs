//! Read-side queries over the record store: note search, interval overlap and
//! per-account work-time totals.

use chrono::{DateTime, Utc};

use crate::error::AppResult;
use crate::records::{RecordStore, TimeRecord};

/// Query surface over stored records. Cheap to clone and share.
#[derive(Clone)]
pub struct QueryEngine {
    records: RecordStore,
}

impl QueryEngine {
    pub fn new(records: RecordStore) -> Self {
        Self { records }
    }

    /// Records whose notes contain `term`, case-insensitively.
    /// An empty term matches every record.
    pub fn search_by_note(&self, term: &str) -> AppResult<Vec<TimeRecord>> {
        let needle = term.to_lowercase();
        Ok(self
            .records
            .list_all()?
            .into_iter()
            .filter(|r| r.notes.to_lowercase().contains(&needle))
            .collect())
    }

    /// Records whose worked interval strictly overlaps `[start, end)`:
    /// `record.start < end` and `record.finish > start`. Records missing
    /// either instant never match; touching endpoints do not overlap.
    pub fn query_by_overlap(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<TimeRecord>> {
        Ok(self
            .records
            .list_all()?
            .into_iter()
            .filter(|r| match (r.start_time, r.finish_time) {
                (Some(s), Some(f)) => s < end && f > start,
                _ => false,
            })
            .collect())
    }

    /// Total seconds worked by one account: the sum of total_time across its
    /// records, counting records without a total as zero.
    pub fn seconds_worked(&self, email: &str) -> AppResult<i64> {
        Ok(self
            .records
            .list_all()?
            .into_iter()
            .filter(|r| r.owner_email == email)
            .filter_map(|r| r.total_time)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SharedStore;
    use chrono::TimeZone;

    fn engine() -> (tempfile::TempDir, RecordStore, QueryEngine) {
        let tmp = tempfile::tempdir().unwrap();
        let shared = SharedStore::open(tmp.path()).unwrap();
        let records = RecordStore::new(&shared).unwrap();
        let query = QueryEngine::new(records.clone());
        (tmp, records, query)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn note_search_is_case_insensitive_substring() {
        let (_tmp, records, query) = engine();
        records.create("a@b.c", None, None, "Fixed the Boiler").unwrap();
        records.create("a@b.c", None, None, "lunch break").unwrap();
        let hits = query.search_by_note("boil").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].notes, "Fixed the Boiler");
        assert_eq!(query.search_by_note("").unwrap().len(), 2);
        assert!(query.search_by_note("zzz").unwrap().is_empty());
    }

    #[test]
    fn overlap_is_strict_on_both_ends() {
        let (_tmp, records, query) = engine();
        // Worked interval [6400, 10000)
        let rec = records
            .create("a@b.c", Some(at(10_000)), Some(3_600), "shift")
            .unwrap();
        assert_eq!(rec.start_time, Some(at(6_400)));
        // Proper overlap
        assert_eq!(query.query_by_overlap(at(9_000), at(11_000)).unwrap().len(), 1);
        assert_eq!(query.query_by_overlap(at(5_000), at(7_000)).unwrap().len(), 1);
        // Touching endpoints are not overlap
        assert!(query.query_by_overlap(at(10_000), at(12_000)).unwrap().is_empty());
        assert!(query.query_by_overlap(at(5_000), at(6_400)).unwrap().is_empty());
        // Disjoint
        assert!(query.query_by_overlap(at(1_000), at(2_000)).unwrap().is_empty());
    }

    #[test]
    fn records_without_instants_never_overlap() {
        let (_tmp, records, query) = engine();
        records.create("a@b.c", Some(at(10_000)), None, "no total").unwrap();
        records.create("a@b.c", None, Some(3_600), "no finish").unwrap();
        records.create("a@b.c", None, None, "empty").unwrap();
        assert!(query.query_by_overlap(at(0), at(i32::MAX as i64)).unwrap().is_empty());
    }

    #[test]
    fn seconds_worked_sums_only_the_owner() {
        let (_tmp, records, query) = engine();
        records.create("a@b.c", None, Some(100), "").unwrap();
        records.create("a@b.c", None, Some(250), "").unwrap();
        records.create("a@b.c", None, None, "untimed").unwrap();
        records.create("x@y.z", None, Some(999), "").unwrap();
        assert_eq!(query.seconds_worked("a@b.c").unwrap(), 350);
        assert_eq!(query.seconds_worked("nobody@b.c").unwrap(), 0);
    }
}
