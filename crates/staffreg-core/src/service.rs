//! The mutation pipeline: resolve, persist, then log.
//!
//! [`Register`] wires the reconciliation engine, the record store, and the
//! audit logger together. Control flow for a mutation is always the same:
//! read the existing record, resolve the proposal, persist the finalized
//! snapshot, then diff and append audit entries best-effort. Read-only flows
//! bypass the engine entirely.
//!
//! There is no cross-request locking: two concurrent updates to the same
//! record race between read and persist, and the later write wins. This is
//! an accepted limitation, not a serializability guarantee.

use chrono::Utc;
use thiserror::Error;

use crate::audit::{append_all, diff_entries, AuditEntry};
use crate::config::RegisterConfig;
use crate::import::{BulkRow, ImportReport, RowError, RowIssue};
use crate::principal::{Principal, Role};
use crate::reconcile::{resolve, Forbidden, PartialFields, ResolveError};
use crate::record::{NewRecord, StaffingRecord};
use crate::store::{AuditFilter, Page, RecordFilter, RegisterStore, StoreError};

/// Errors surfaced by the register pipeline.
///
/// Everything here is recoverable at the transport boundary; nothing crashes
/// the process. Audit append failures never appear — they are logged and
/// swallowed by design.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegisterError {
    /// Store-level failure (including duplicate codes and missing records).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Engine-level rejection.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// The staffing register: store plus engine plus audit trail.
pub struct Register {
    store: RegisterStore,
    audit_enabled: bool,
}

impl Register {
    /// Creates a register over an open store, with auditing enabled.
    #[must_use]
    pub const fn new(store: RegisterStore) -> Self {
        Self {
            store,
            audit_enabled: true,
        }
    }

    /// Opens a register from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened.
    pub fn from_config(config: &RegisterConfig) -> Result<Self, RegisterError> {
        let store = RegisterStore::open(&config.store.db_path)?;
        Ok(Self {
            store,
            audit_enabled: config.audit.enabled,
        })
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &RegisterStore {
        &self.store
    }

    fn require_admin(principal: &Principal, operation: &str) -> Result<(), RegisterError> {
        if principal.role() == Role::Admin {
            Ok(())
        } else {
            Err(ResolveError::from(Forbidden::AdminOnly {
                operation: operation.to_string(),
            })
            .into())
        }
    }

    fn audit_best_effort(&self, entries: &[AuditEntry]) {
        if !self.audit_enabled {
            return;
        }
        let written = append_all(&self.store, entries);
        if written < entries.len() {
            tracing::warn!(
                written,
                expected = entries.len(),
                "audit trail incomplete for this mutation"
            );
        }
    }

    /// Creates a record. Admin-only.
    ///
    /// Logs one synthetic "record created" audit entry.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admin principals and `DuplicateKey` when
    /// the code exists.
    pub fn create(
        &self,
        new: NewRecord,
        principal: &Principal,
        origin: &str,
    ) -> Result<StaffingRecord, RegisterError> {
        Self::require_admin(principal, "create record")?;

        let record = self.store.create(new, principal.id())?;
        tracing::debug!(code = %record.code, actor = %principal.id(), "record created");

        self.audit_best_effort(&[AuditEntry::record_created(&record.code, principal, origin)]);
        Ok(record)
    }

    /// Applies a partial update through the reconciliation engine.
    ///
    /// Logs one audit entry per changed field. Returns the updated snapshot.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown codes and any engine rejection
    /// (`Forbidden`, `InvalidValue`, `NoChange`) unchanged.
    pub fn update(
        &self,
        code: &str,
        proposed: &PartialFields,
        principal: &Principal,
        origin: &str,
    ) -> Result<StaffingRecord, RegisterError> {
        let existing = self.store.find_by_code(code)?;
        let resolved = resolve(&existing, proposed, principal)?;
        let updated = resolved.apply_to(&existing, principal.id(), Utc::now());

        self.store.conditional_update(&updated)?;
        tracing::debug!(
            code,
            actor = %principal.id(),
            changed = resolved.changed.len(),
            "record updated"
        );

        self.audit_best_effort(&diff_entries(&existing, &resolved, principal, origin));
        Ok(updated)
    }

    /// Deletes a record. Admin-only.
    ///
    /// Logs one synthetic "record deleted" audit entry.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admin principals and `NotFound` for
    /// unknown codes.
    pub fn delete(
        &self,
        code: &str,
        principal: &Principal,
        origin: &str,
    ) -> Result<(), RegisterError> {
        Self::require_admin(principal, "delete record")?;

        // Look up first so a missing code reports NotFound before any audit
        // side effects.
        let existing = self.store.find_by_code(code)?;
        self.store.delete(&existing.code)?;
        tracing::debug!(code, actor = %principal.id(), "record deleted");

        self.audit_best_effort(&[AuditEntry::record_deleted(code, principal, origin)]);
        Ok(())
    }

    /// Fetches a record. College principals may only fetch their own.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown codes, then `Forbidden` for records
    /// outside a college principal's scope.
    pub fn get(&self, code: &str, principal: &Principal) -> Result<StaffingRecord, RegisterError> {
        let record = self.store.find_by_code(code)?;
        if !principal.may_access(&record.code) {
            return Err(ResolveError::from(Forbidden::OutOfScope {
                code: record.code,
            })
            .into());
        }
        Ok(record)
    }

    /// Lists records ordered by name. Admin-only.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admin principals.
    pub fn list(
        &self,
        filter: &RecordFilter,
        page: u32,
        limit: u32,
        principal: &Principal,
    ) -> Result<Page<StaffingRecord>, RegisterError> {
        Self::require_admin(principal, "list records")?;
        Ok(self.store.find_all(filter, page, limit)?)
    }

    /// Lists audit entries, newest first.
    ///
    /// Admins see everything; a college principal's listing is forced onto
    /// its own record code.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` when a college principal asks for another
    /// record's trail.
    pub fn logs(
        &self,
        filter: &AuditFilter,
        page: u32,
        limit: u32,
        principal: &Principal,
    ) -> Result<Page<AuditEntry>, RegisterError> {
        let mut filter = filter.clone();
        if principal.role() == Role::College {
            let scoped = principal
                .scoped_code()
                .unwrap_or_default()
                .to_string();
            match &filter.record_code {
                Some(code) if *code != scoped => {
                    return Err(ResolveError::from(Forbidden::OutOfScope {
                        code: code.clone(),
                    })
                    .into());
                },
                _ => filter.record_code = Some(scoped),
            }
        }
        Ok(self.store.audit_entries(&filter, page, limit)?)
    }

    /// Runs a bulk import. Admin-only at the entry point; individual rows
    /// skip the engine's authorization step entirely.
    ///
    /// Every row goes through the same create path as a single creation,
    /// including the synthetic audit entry. Rejected rows are reported by
    /// sheet row number and never abort their siblings.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admin principals; per-row failures land
    /// in the report, not here.
    pub fn import(
        &self,
        rows: &[BulkRow],
        principal: &Principal,
        origin: &str,
    ) -> Result<ImportReport, RegisterError> {
        Self::require_admin(principal, "bulk import")?;

        let mut report = ImportReport {
            total: rows.len(),
            ..ImportReport::default()
        };

        for (index, row) in rows.iter().enumerate() {
            // Sheet row number: header is row 1, data starts at 2.
            let row_number = index + 2;

            let new = match crate::import::validate_row(row) {
                Ok(new) => new,
                Err(issue) => {
                    report.errors.push(RowError {
                        row: row_number,
                        issue,
                    });
                    continue;
                },
            };

            match self.store.create(new, principal.id()) {
                Ok(record) => {
                    report.successful += 1;
                    self.audit_best_effort(&[AuditEntry::record_created(
                        &record.code,
                        principal,
                        origin,
                    )]);
                },
                Err(StoreError::DuplicateKey { code }) => {
                    report.duplicates += 1;
                    report.errors.push(RowError {
                        row: row_number,
                        issue: RowIssue::Duplicate { code },
                    });
                },
                Err(other) => {
                    report.errors.push(RowError {
                        row: row_number,
                        issue: RowIssue::Store {
                            message: other.to_string(),
                        },
                    });
                },
            }
        }

        tracing::debug!(
            total = report.total,
            successful = report.successful,
            duplicates = report.duplicates,
            errors = report.errors.len(),
            "bulk import finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RegisterStore;

    fn register() -> Register {
        Register::new(RegisterStore::in_memory().expect("store"))
    }

    fn sample(code: &str) -> NewRecord {
        NewRecord {
            code: code.to_string(),
            name: "Government Polytechnic".to_string(),
            district: "North".to_string(),
            taluk: "Central".to_string(),
            designation: "Lecturer".to_string(),
            group: "A".to_string(),
            branch: "Science".to_string(),
            sanctioned: 60,
            working: 55,
            deputation: 0,
            deputation_target_code: None,
            remarks: None,
        }
    }

    #[test]
    fn create_is_admin_only() {
        let register = register();
        let college = Principal::college("college-1", "COL001");

        let err = register
            .create(sample("COL001"), &college, "10.0.0.1")
            .unwrap_err();
        assert!(matches!(
            err,
            RegisterError::Resolve(ResolveError::Forbidden(Forbidden::AdminOnly { .. }))
        ));
    }

    #[test]
    fn get_enforces_scope_after_lookup() {
        let register = register();
        let admin = Principal::admin("admin-1");
        register
            .create(sample("COL001"), &admin, "10.0.0.1")
            .expect("create");

        let foreign = Principal::college("college-2", "COL999");

        // Unknown code reports NotFound even to an out-of-scope principal.
        let err = register.get("COL404", &foreign).unwrap_err();
        assert!(matches!(err, RegisterError::Store(StoreError::NotFound { .. })));

        let err = register.get("COL001", &foreign).unwrap_err();
        assert!(matches!(
            err,
            RegisterError::Resolve(ResolveError::Forbidden(Forbidden::OutOfScope { .. }))
        ));
    }

    #[test]
    fn logs_scoping_for_college_principals() {
        let register = register();
        let admin = Principal::admin("admin-1");
        register
            .create(sample("COL001"), &admin, "10.0.0.1")
            .expect("create");
        register
            .create(sample("COL002"), &admin, "10.0.0.1")
            .expect("create");

        let college = Principal::college("college-1", "COL001");

        // Unfiltered request is forced onto the scoped code.
        let page = register
            .logs(&AuditFilter::default(), 1, 10, &college)
            .expect("scoped logs");
        assert_eq!(page.total, 1);
        assert!(page.items.iter().all(|e| e.record_code == "COL001"));

        // Asking for another record's trail is forbidden.
        let filter = AuditFilter {
            record_code: Some("COL002".to_string()),
            ..AuditFilter::default()
        };
        let err = register.logs(&filter, 1, 10, &college).unwrap_err();
        assert!(matches!(
            err,
            RegisterError::Resolve(ResolveError::Forbidden(Forbidden::OutOfScope { .. }))
        ));

        // Admin sees both creation entries.
        let page = register
            .logs(&AuditFilter::default(), 1, 10, &admin)
            .expect("admin logs");
        assert_eq!(page.total, 2);
    }
}
