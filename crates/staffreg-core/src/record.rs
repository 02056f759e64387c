//! Staffing-record data model.
//!
//! One [`StaffingRecord`] exists per college code. The central invariant,
//! maintained by the reconciliation engine on update and by the store on
//! create, is:
//!
//! ```text
//! vacant = max(0, sanctioned - working - deputation)
//! ```
//!
//! Counts are `u32`, so non-negativity holds by construction; the clamp
//! guards the subtraction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical field names for a staffing record.
///
/// Audit entries and rejection messages carry these names verbatim, so the
/// wire form ([`Field::as_str`]) is part of the public contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    /// Record display name.
    Name,
    /// District the college belongs to.
    District,
    /// Taluk (sub-district) the college belongs to.
    Taluk,
    /// Staff designation this record counts.
    Designation,
    /// Cadre group.
    Group,
    /// Subject branch.
    Branch,
    /// Total approved positions.
    Sanctioned,
    /// Currently filled positions.
    Working,
    /// Unfilled positions (derived).
    Vacant,
    /// Positions filled by staff assigned from elsewhere.
    Deputation,
    /// Code of the record a deputed member is assigned to.
    DeputationTargetCode,
    /// Free-text remarks.
    Remarks,
}

impl Field {
    /// The canonical wire name for this field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::District => "district",
            Self::Taluk => "taluk",
            Self::Designation => "designation",
            Self::Group => "group",
            Self::Branch => "branch",
            Self::Sanctioned => "sanctioned",
            Self::Working => "working",
            Self::Vacant => "vacant",
            Self::Deputation => "deputation",
            Self::DeputationTargetCode => "deputation_target_code",
            Self::Remarks => "remarks",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computes the derived vacant count: `max(0, sanctioned - working - deputation)`.
///
/// Saturating subtraction is equivalent to the signed clamp here because
/// `working` and `deputation` are themselves non-negative.
#[must_use]
pub const fn derived_vacant(sanctioned: u32, working: u32, deputation: u32) -> u32 {
    sanctioned.saturating_sub(working).saturating_sub(deputation)
}

/// A staffing record, one per college code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffingRecord {
    /// Unique college code. Immutable after creation.
    pub code: String,

    /// College display name.
    pub name: String,

    /// District.
    pub district: String,

    /// Taluk.
    pub taluk: String,

    /// Staff designation counted by this record.
    pub designation: String,

    /// Cadre group.
    pub group: String,

    /// Subject branch.
    pub branch: String,

    /// Total approved positions. Admin-writable only.
    pub sanctioned: u32,

    /// Currently filled positions.
    pub working: u32,

    /// Unfilled positions. Derived, never stored inconsistently.
    pub vacant: u32,

    /// Positions filled on deputation from elsewhere.
    pub deputation: u32,

    /// Code of the record deputed staff are assigned to. Not
    /// referentially enforced.
    #[serde(default)]
    pub deputation_target_code: Option<String>,

    /// Free-text remarks. Admin-writable only.
    #[serde(default)]
    pub remarks: Option<String>,

    /// Timestamp of the last successful mutation.
    pub last_modified_at: DateTime<Utc>,

    /// Principal id of the last successful mutation.
    pub last_modified_by: String,
}

/// Input for record creation.
///
/// Creation is always admin-originated and complete: every descriptive field
/// and `sanctioned` are required, `working` and `deputation` default to zero.
/// There is deliberately no `vacant` field — the store derives it, exactly as
/// it does for bulk-imported rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    /// Unique college code.
    pub code: String,

    /// College display name.
    pub name: String,

    /// District.
    pub district: String,

    /// Taluk.
    pub taluk: String,

    /// Staff designation.
    pub designation: String,

    /// Cadre group.
    pub group: String,

    /// Subject branch.
    pub branch: String,

    /// Total approved positions.
    pub sanctioned: u32,

    /// Currently filled positions.
    #[serde(default)]
    pub working: u32,

    /// Positions filled on deputation.
    #[serde(default)]
    pub deputation: u32,

    /// Deputation target record code.
    #[serde(default)]
    pub deputation_target_code: Option<String>,

    /// Free-text remarks.
    #[serde(default)]
    pub remarks: Option<String>,
}

impl NewRecord {
    /// Materializes the record this input creates, deriving `vacant` and
    /// stamping modification metadata.
    #[must_use]
    pub fn into_record(self, modified_by: impl Into<String>, at: DateTime<Utc>) -> StaffingRecord {
        let vacant = derived_vacant(self.sanctioned, self.working, self.deputation);
        StaffingRecord {
            code: self.code,
            name: self.name,
            district: self.district,
            taluk: self.taluk,
            designation: self.designation,
            group: self.group,
            branch: self.branch,
            sanctioned: self.sanctioned,
            working: self.working,
            vacant,
            deputation: self.deputation,
            deputation_target_code: self.deputation_target_code,
            remarks: self.remarks,
            last_modified_at: at,
            last_modified_by: modified_by.into(),
        }
    }
}
