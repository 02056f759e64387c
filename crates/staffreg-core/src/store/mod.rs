//! Record store: SQLite-backed persistence for staffing records and their
//! audit trail.
//!
//! The store owns persistence and code uniqueness, nothing else. Create-time
//! vacancy derivation lives here (creation is always admin-originated and
//! complete); update-time derivation is explicit in the reconciliation
//! engine, because update requests are partial and role-scoped — the store
//! deliberately does not re-derive `vacant` on update.
//!
//! # Example
//!
//! ```rust,no_run
//! use staffreg_core::store::RegisterStore;
//!
//! # fn example() -> Result<(), staffreg_core::store::StoreError> {
//! let store = RegisterStore::open("/var/lib/staffreg/register.db")?;
//! let record = store.find_by_code("COL001")?;
//! # Ok(())
//! # }
//! ```

mod storage;

#[cfg(test)]
mod tests;

pub use storage::{
    AuditFilter, Page, RecordFilter, RegisterStore, StoreError, StoreStats, MAX_PAGE_LIMIT,
};
