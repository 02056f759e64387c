//! `SQLite`-backed store implementation.
//!
//! Uses `SQLite` with WAL mode; the schema is embedded at compile time and
//! executed on every open. The connection sits behind a mutex, so store
//! calls serialize; callers needing timeouts enforce them outside the store.

// SQLite returns i64 for row IDs and counts, but they're always non-negative
// here. Mutex poisoning indicates a panic in another thread, which is
// unrecoverable.
#![allow(clippy::cast_sign_loss, clippy::missing_panics_doc)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row};
use thiserror::Error;

use crate::audit::{AuditEntry, AuditError, AuditSink};
use crate::principal::Role;
use crate::record::{NewRecord, StaffingRecord};

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Upper bound for a page limit; larger requests are clamped, not rejected.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Database error from `SQLite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error during database operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record with this code already exists.
    #[error("record code already exists: {code}")]
    DuplicateKey {
        /// The duplicate code.
        code: String,
    },

    /// No record with this code exists.
    #[error("record not found: {code}")]
    NotFound {
        /// The missing code.
        code: String,
    },
}

/// Filter for record listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Restrict to one district.
    pub district: Option<String>,

    /// Restrict to codes starting with this prefix.
    pub code_prefix: Option<String>,
}

/// Filter for audit-trail listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    /// Restrict to one record code.
    pub record_code: Option<String>,

    /// Entries created at or after this instant.
    pub from: Option<DateTime<Utc>>,

    /// Entries created at or before this instant.
    pub to: Option<DateTime<Utc>>,
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// The page's items.
    pub items: Vec<T>,

    /// Total matching items across all pages.
    pub total: u64,

    /// 1-based page number actually used (after clamping).
    pub page: u32,

    /// Page size actually used (after clamping).
    pub limit: u32,
}

/// Row counts for operational visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of staffing records.
    pub record_count: u64,

    /// Number of audit entries.
    pub audit_entry_count: u64,
}

/// The staffing-record store backed by `SQLite`.
pub struct RegisterStore {
    conn: Arc<Mutex<Connection>>,
    #[allow(dead_code)]
    path: Option<PathBuf>,
}

impl RegisterStore {
    /// Opens or creates a store at the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        Self::initialize_connection(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_connection(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    fn initialize_connection(conn: &Connection) -> Result<(), StoreError> {
        // Schema includes the PRAGMA statements.
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Creates a record, deriving `vacant` from the supplied counts.
    ///
    /// Returns the persisted record snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] if the code already exists.
    pub fn create(
        &self,
        new: NewRecord,
        modified_by: impl Into<String>,
    ) -> Result<StaffingRecord, StoreError> {
        let record = new.into_record(modified_by, Utc::now());
        let conn = self.conn.lock().unwrap();

        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM records WHERE code = ?1",
                params![record.code],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(StoreError::DuplicateKey {
                code: record.code.clone(),
            });
        }

        conn.execute(
            "INSERT INTO records (code, name, district, taluk, designation, \"group\", branch,
                                  sanctioned, working, vacant, deputation,
                                  deputation_target_code, remarks,
                                  last_modified_at, last_modified_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                record.code,
                record.name,
                record.district,
                record.taluk,
                record.designation,
                record.group,
                record.branch,
                record.sanctioned,
                record.working,
                record.vacant,
                record.deputation,
                record.deputation_target_code,
                record.remarks,
                record.last_modified_at.timestamp_micros(),
                record.last_modified_by,
            ],
        )?;

        Ok(record)
    }

    /// Looks up a record by its code.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no record has this code.
    pub fn find_by_code(&self, code: &str) -> Result<StaffingRecord, StoreError> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!("{RECORD_SELECT} WHERE code = ?1"),
            params![code],
            record_from_row,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound {
            code: code.to_string(),
        })
    }

    /// Lists records ordered by `name` ascending.
    ///
    /// `limit` is clamped to `[1, 100]` and `page` to `>= 1`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn find_all(
        &self,
        filter: &RecordFilter,
        page: u32,
        limit: u32,
    ) -> Result<Page<StaffingRecord>, StoreError> {
        let page = page.max(1);
        let limit = limit.clamp(1, MAX_PAGE_LIMIT);
        let offset = u64::from(page - 1) * u64::from(limit);

        let mut conditions: Vec<&str> = Vec::new();
        let mut args: Vec<String> = Vec::new();
        if let Some(district) = &filter.district {
            conditions.push("district = ?");
            args.push(district.clone());
        }
        if let Some(prefix) = &filter.code_prefix {
            conditions.push("code LIKE ? ESCAPE '\\'");
            args.push(format!("{}%", escape_like(prefix)));
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let conn = self.conn.lock().unwrap();

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM records{where_clause}"),
            params_from_iter(args.iter()),
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "{RECORD_SELECT}{where_clause} ORDER BY name ASC LIMIT {limit} OFFSET {offset}"
        ))?;
        let items = stmt
            .query_map(params_from_iter(args.iter()), record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            total: total as u64,
            page,
            limit,
        })
    }

    /// Applies a fully resolved record snapshot, iff the record exists.
    ///
    /// The caller (the reconciliation engine) is responsible for
    /// pre-resolving the snapshot to a consistent field set; `vacant` is
    /// stored as supplied, never re-derived here.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no record has this code.
    pub fn conditional_update(&self, record: &StaffingRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        let affected = conn.execute(
            "UPDATE records
             SET name = ?2, district = ?3, taluk = ?4, designation = ?5, \"group\" = ?6,
                 branch = ?7, sanctioned = ?8, working = ?9, vacant = ?10, deputation = ?11,
                 deputation_target_code = ?12, remarks = ?13,
                 last_modified_at = ?14, last_modified_by = ?15
             WHERE code = ?1",
            params![
                record.code,
                record.name,
                record.district,
                record.taluk,
                record.designation,
                record.group,
                record.branch,
                record.sanctioned,
                record.working,
                record.vacant,
                record.deputation,
                record.deputation_target_code,
                record.remarks,
                record.last_modified_at.timestamp_micros(),
                record.last_modified_by,
            ],
        )?;

        if affected == 0 {
            return Err(StoreError::NotFound {
                code: record.code.clone(),
            });
        }
        Ok(())
    }

    /// Deletes a record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no record has this code.
    pub fn delete(&self, code: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        let affected = conn.execute("DELETE FROM records WHERE code = ?1", params![code])?;
        if affected == 0 {
            return Err(StoreError::NotFound {
                code: code.to_string(),
            });
        }
        Ok(())
    }

    /// Appends one audit entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be inserted.
    pub fn append_audit(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO audit_entries (actor_id, actor_role, record_code, field,
                                        old_value, new_value, origin, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.actor_id,
                entry.actor_role.to_string(),
                entry.record_code,
                entry.field,
                entry.old_value,
                entry.new_value,
                entry.origin,
                entry.created_at.timestamp_micros(),
            ],
        )?;
        Ok(())
    }

    /// Lists audit entries, newest first.
    ///
    /// `limit` is clamped to `[1, 100]` and `page` to `>= 1`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn audit_entries(
        &self,
        filter: &AuditFilter,
        page: u32,
        limit: u32,
    ) -> Result<Page<AuditEntry>, StoreError> {
        let page = page.max(1);
        let limit = limit.clamp(1, MAX_PAGE_LIMIT);
        let offset = u64::from(page - 1) * u64::from(limit);

        let mut conditions: Vec<&str> = Vec::new();
        let mut args: Vec<String> = Vec::new();
        if let Some(code) = &filter.record_code {
            conditions.push("record_code = ?");
            args.push(code.clone());
        }
        if let Some(from) = &filter.from {
            conditions.push("created_at >= ?");
            args.push(from.timestamp_micros().to_string());
        }
        if let Some(to) = &filter.to {
            conditions.push("created_at <= ?");
            args.push(to.timestamp_micros().to_string());
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let conn = self.conn.lock().unwrap();

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM audit_entries{where_clause}"),
            params_from_iter(args.iter()),
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT actor_id, actor_role, record_code, field, old_value, new_value,
                    origin, created_at
             FROM audit_entries{where_clause}
             ORDER BY created_at DESC, id DESC LIMIT {limit} OFFSET {offset}"
        ))?;
        let items = stmt
            .query_map(params_from_iter(args.iter()), audit_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            total: total as u64,
            page,
            limit,
        })
    }

    /// Row counts for operational visibility.
    ///
    /// # Errors
    ///
    /// Returns an error if the queries fail.
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.conn.lock().unwrap();

        let record_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        let audit_entry_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM audit_entries", [], |row| row.get(0))?;

        Ok(StoreStats {
            record_count: record_count as u64,
            audit_entry_count: audit_entry_count as u64,
        })
    }
}

impl AuditSink for RegisterStore {
    fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        self.append_audit(entry)
            .map_err(|e| AuditError::Sink(e.to_string()))
    }
}

const RECORD_SELECT: &str = "SELECT code, name, district, taluk, designation, \"group\", branch,
        sanctioned, working, vacant, deputation, deputation_target_code, remarks,
        last_modified_at, last_modified_by
 FROM records";

fn escape_like(prefix: &str) -> String {
    prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn timestamp_from_micros(index: usize, micros: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(index, micros))
}

fn role_from_str(index: usize, raw: &str) -> rusqlite::Result<Role> {
    match raw {
        "admin" => Ok(Role::Admin),
        "college" => Ok(Role::College),
        _ => Err(rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            format!("unknown role: {raw}").into(),
        )),
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<StaffingRecord> {
    Ok(StaffingRecord {
        code: row.get(0)?,
        name: row.get(1)?,
        district: row.get(2)?,
        taluk: row.get(3)?,
        designation: row.get(4)?,
        group: row.get(5)?,
        branch: row.get(6)?,
        sanctioned: row.get(7)?,
        working: row.get(8)?,
        vacant: row.get(9)?,
        deputation: row.get(10)?,
        deputation_target_code: row.get(11)?,
        remarks: row.get(12)?,
        last_modified_at: timestamp_from_micros(13, row.get(13)?)?,
        last_modified_by: row.get(14)?,
    })
}

fn audit_entry_from_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    let role_raw: String = row.get(1)?;
    Ok(AuditEntry {
        actor_id: row.get(0)?,
        actor_role: role_from_str(1, &role_raw)?,
        record_code: row.get(2)?,
        field: row.get(3)?,
        old_value: row.get(4)?,
        new_value: row.get(5)?,
        origin: row.get(6)?,
        created_at: timestamp_from_micros(7, row.get(7)?)?,
    })
}
