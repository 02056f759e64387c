//! Per-field audit trail.
//!
//! Every successful record mutation produces one [`AuditEntry`] per changed
//! field — not per request. Entries are append-only: the core creates them
//! as a byproduct of mutations and never updates or deletes them.
//!
//! Persistence is best-effort by design: a failed append is reported to the
//! operational log and the remaining entries are still attempted, but the
//! primary record mutation is never blocked or reversed. Durability of the
//! staffing number takes priority over completeness of the audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::principal::{Principal, Role};
use crate::reconcile::ResolvedFields;
use crate::record::{Field, StaffingRecord};

/// Synthetic field name logged for record creation.
pub const FIELD_RECORD_CREATED: &str = "record created";

/// Synthetic field name logged for record deletion.
pub const FIELD_RECORD_DELETED: &str = "record deleted";

/// One audit entry: a single field change by a single actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Id of the acting principal.
    pub actor_id: String,

    /// Role of the acting principal at mutation time.
    pub actor_role: Role,

    /// Code of the mutated record.
    pub record_code: String,

    /// Canonical field name, verbatim (or a synthetic
    /// [`FIELD_RECORD_CREATED`] / [`FIELD_RECORD_DELETED`] marker).
    pub field: String,

    /// Stringified prior value.
    pub old_value: String,

    /// Stringified new value.
    pub new_value: String,

    /// Request origin address.
    pub origin: String,

    /// Entry creation time.
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    fn new(
        actor: &Principal,
        record_code: impl Into<String>,
        field: impl Into<String>,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            actor_id: actor.id().to_string(),
            actor_role: actor.role(),
            record_code: record_code.into(),
            field: field.into(),
            old_value: old_value.into(),
            new_value: new_value.into(),
            origin: origin.into(),
            created_at: Utc::now(),
        }
    }

    /// The synthetic entry logged once per record creation.
    #[must_use]
    pub fn record_created(code: &str, actor: &Principal, origin: &str) -> Self {
        Self::new(actor, code, FIELD_RECORD_CREATED, "N/A", "created", origin)
    }

    /// The synthetic entry logged once per record deletion.
    #[must_use]
    pub fn record_deleted(code: &str, actor: &Principal, origin: &str) -> Self {
        Self::new(actor, code, FIELD_RECORD_DELETED, "exists", "deleted", origin)
    }
}

/// Error from an audit sink append.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuditError {
    /// The sink failed to persist an entry.
    #[error("audit sink error: {0}")]
    Sink(String),
}

/// Destination for audit entries.
///
/// Implemented by the record store; test doubles implement it in-memory.
pub trait AuditSink {
    /// Persists one entry.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] when the entry cannot be persisted.
    fn append(&self, entry: &AuditEntry) -> Result<(), AuditError>;
}

/// Stringifies the prior value of `field` on `record`.
///
/// Optional text fields stringify to the empty string when unset.
fn field_value(record: &StaffingRecord, field: Field) -> String {
    match field {
        Field::Name => record.name.clone(),
        Field::District => record.district.clone(),
        Field::Taluk => record.taluk.clone(),
        Field::Designation => record.designation.clone(),
        Field::Group => record.group.clone(),
        Field::Branch => record.branch.clone(),
        Field::Sanctioned => record.sanctioned.to_string(),
        Field::Working => record.working.to_string(),
        Field::Vacant => record.vacant.to_string(),
        Field::Deputation => record.deputation.to_string(),
        Field::DeputationTargetCode => {
            record.deputation_target_code.clone().unwrap_or_default()
        },
        Field::Remarks => record.remarks.clone().unwrap_or_default(),
    }
}

/// Computes the audit entries for a finalized mutation: one entry per field
/// in the resolved `changed` set, comparing stringified before/after values.
///
/// Field names are logged verbatim, never display labels.
#[must_use]
pub fn diff_entries(
    before: &StaffingRecord,
    after: &ResolvedFields,
    actor: &Principal,
    origin: &str,
) -> Vec<AuditEntry> {
    let applied = after.apply_to(before, actor.id(), before.last_modified_at);
    after
        .changed
        .iter()
        .map(|&field| {
            AuditEntry::new(
                actor,
                before.code.clone(),
                field.as_str(),
                field_value(before, field),
                field_value(&applied, field),
                origin,
            )
        })
        .collect()
}

/// Appends `entries` to `sink`, best-effort.
///
/// A failed append is logged via `tracing::warn!` and does not stop the
/// remaining entries or the caller's mutation. Returns the number of entries
/// actually persisted.
pub fn append_all<S: AuditSink + ?Sized>(sink: &S, entries: &[AuditEntry]) -> usize {
    let mut written = 0;
    for entry in entries {
        match sink.append(entry) {
            Ok(()) => written += 1,
            Err(error) => {
                tracing::warn!(
                    record_code = %entry.record_code,
                    field = %entry.field,
                    %error,
                    "failed to persist audit entry; mutation stands"
                );
            },
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;
    use crate::reconcile::{resolve, PartialFields};

    struct MemorySink {
        entries: Mutex<Vec<AuditEntry>>,
        fail: bool,
    }

    impl MemorySink {
        fn new(fail: bool) -> Self {
            Self {
                entries: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    impl AuditSink for MemorySink {
        fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
            if self.fail {
                return Err(AuditError::Sink("sink unavailable".to_string()));
            }
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }
    }

    fn record() -> StaffingRecord {
        StaffingRecord {
            code: "COL001".to_string(),
            name: "Government Polytechnic".to_string(),
            district: "North".to_string(),
            taluk: "Central".to_string(),
            designation: "Lecturer".to_string(),
            group: "A".to_string(),
            branch: "Science".to_string(),
            sanctioned: 60,
            working: 55,
            vacant: 5,
            deputation: 0,
            deputation_target_code: None,
            remarks: None,
            last_modified_at: Utc::now(),
            last_modified_by: "admin-1".to_string(),
        }
    }

    #[test]
    fn one_entry_per_changed_field() {
        let before = record();
        let actor = Principal::college("college-1", "COL001");
        let resolved =
            resolve(&before, &PartialFields::working(50), &actor).expect("must resolve");

        let entries = diff_entries(&before, &resolved, &actor, "10.0.0.1");
        assert_eq!(entries.len(), 2, "working and derived vacant both change");

        let working = entries
            .iter()
            .find(|e| e.field == "working")
            .expect("working entry");
        assert_eq!(working.old_value, "55");
        assert_eq!(working.new_value, "50");
        assert_eq!(working.actor_id, "college-1");
        assert_eq!(working.origin, "10.0.0.1");

        let vacant = entries
            .iter()
            .find(|e| e.field == "vacant")
            .expect("vacant entry");
        assert_eq!(vacant.old_value, "5");
        assert_eq!(vacant.new_value, "10");
    }

    #[test]
    fn synthetic_entries() {
        let actor = Principal::admin("admin-1");
        let created = AuditEntry::record_created("COL001", &actor, "10.0.0.1");
        assert_eq!(created.field, FIELD_RECORD_CREATED);
        assert_eq!(created.old_value, "N/A");

        let deleted = AuditEntry::record_deleted("COL001", &actor, "10.0.0.1");
        assert_eq!(deleted.field, FIELD_RECORD_DELETED);
    }

    #[test]
    fn append_all_is_best_effort() {
        let actor = Principal::admin("admin-1");
        let entries = vec![
            AuditEntry::record_created("COL001", &actor, "10.0.0.1"),
            AuditEntry::record_created("COL002", &actor, "10.0.0.1"),
        ];

        let healthy = MemorySink::new(false);
        assert_eq!(append_all(&healthy, &entries), 2);
        assert_eq!(healthy.entries.lock().unwrap().len(), 2);

        let broken = MemorySink::new(true);
        assert_eq!(append_all(&broken, &entries), 0);
    }
}
