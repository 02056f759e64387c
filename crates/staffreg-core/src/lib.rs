//! staffreg-core — multi-tenant staffing-register reconciliation core.
//!
//! A set of staffing records, one per college code, each tracking
//! sanctioned/working/vacant/deputation staff counts, mutated by role-scoped
//! principals. The crate's center of gravity is the reconciliation engine:
//! the rules that keep `vacant = max(0, sanctioned - working - deputation)`
//! consistent under partial, field-level updates from different actor roles,
//! and the per-field audit trail of every mutation.
//!
//! Transport, credential issuance, spreadsheet parsing, and report rendering
//! are external collaborators: they hand this crate plain data types
//! ([`principal::Principal`], [`reconcile::PartialFields`],
//! [`import::BulkRow`]) and consume record snapshots back.
//!
//! # Modules
//!
//! - [`record`]: the `StaffingRecord` data model and the vacancy derivation
//! - [`principal`]: actor identity and role scoping
//! - [`reconcile`]: the reconciliation engine — authorization, validation,
//!   and the asymmetric count derivation
//! - [`audit`]: per-field audit entries and best-effort persistence
//! - [`store`]: SQLite-backed record and audit-trail persistence
//! - [`import`]: bulk row validation and per-row reporting
//! - [`service`]: the resolve → persist → log mutation pipeline
//! - [`config`]: TOML configuration
//!
//! # Example
//!
//! ```rust
//! use staffreg_core::principal::Principal;
//! use staffreg_core::reconcile::PartialFields;
//! use staffreg_core::record::NewRecord;
//! use staffreg_core::service::Register;
//! use staffreg_core::store::RegisterStore;
//!
//! # fn example() -> Result<(), staffreg_core::service::RegisterError> {
//! let register = Register::new(RegisterStore::in_memory()?);
//! let admin = Principal::admin("admin-1");
//!
//! register.create(
//!     NewRecord {
//!         code: "COL001".to_string(),
//!         name: "Government Polytechnic".to_string(),
//!         district: "North".to_string(),
//!         taluk: "Central".to_string(),
//!         designation: "Lecturer".to_string(),
//!         group: "A".to_string(),
//!         branch: "Science".to_string(),
//!         sanctioned: 60,
//!         working: 55,
//!         deputation: 0,
//!         deputation_target_code: None,
//!         remarks: None,
//!     },
//!     &admin,
//!     "10.0.0.1",
//! )?;
//!
//! let college = Principal::college("college-1", "COL001");
//! let updated = register.update(
//!     "COL001",
//!     &PartialFields::working(50),
//!     &college,
//!     "10.0.0.2",
//! )?;
//! assert_eq!(updated.vacant, 10);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod audit;
pub mod config;
pub mod import;
pub mod principal;
pub mod reconcile;
pub mod record;
pub mod service;
pub mod store;

pub use audit::{AuditEntry, AuditSink};
pub use principal::{Principal, Role};
pub use reconcile::{resolve, PartialFields, ResolveError, ResolvedFields};
pub use record::{Field, NewRecord, StaffingRecord};
pub use service::{Register, RegisterError};
pub use store::{RegisterStore, StoreError};
