//! Staff-count reconciliation and field-level authorization.
//!
//! [`resolve`] turns a partial, role-scoped update proposal into a fully
//! consistent, validated field set, or rejects it. Rejections are terminal
//! for the request and side-effect free; the caller surfaces the rejection
//! kind and offending field(s) to the transport layer.
//!
//! # Invariants
//!
//! - Every successful resolution satisfies
//!   `vacant == max(0, sanctioned - working - deputation)`.
//! - All four counts are non-negative (`u32` by construction).
//! - A college principal can only ever touch its own record and the
//!   college-writable field subset.
//!
//! # The asymmetric derivation rule
//!
//! Editing `working` or `deputation` re-derives `vacant`; editing `vacant`
//! directly instead adjusts `working` and then re-derives `vacant` a second
//! time. The second clamp is what overrides unattainable requests (a vacant
//! count larger than `sanctioned - deputation` collapses `working` to zero
//! and yields the largest attainable vacancy, not the requested one).


use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::principal::{Principal, Role};
use crate::record::{derived_vacant, Field, StaffingRecord};

/// The exact set of fields a college-role principal may name in a proposal.
pub const COLLEGE_WRITABLE: [Field; 4] = [
    Field::Working,
    Field::Deputation,
    Field::Vacant,
    Field::DeputationTargetCode,
];

/// A numeric field value as delivered by a collaborator.
///
/// JSON bodies deliver integers, spreadsheet cells deliver strings; both must
/// parse to a non-negative integer to pass validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    /// An integer as delivered by a JSON body.
    Number(i64),
    /// A number as delivered by a spreadsheet cell.
    Text(String),
}

impl NumericInput {
    /// Parses to a non-negative integer, or `None` when the value is
    /// negative, fractional, out of range, or not a number at all.
    #[must_use]
    pub fn parse_count(&self) -> Option<u32> {
        match self {
            Self::Number(n) => u32::try_from(*n).ok(),
            Self::Text(s) => s.trim().parse::<u32>().ok(),
        }
    }
}

impl From<u32> for NumericInput {
    fn from(value: u32) -> Self {
        Self::Number(i64::from(value))
    }
}

/// A partial update proposal.
///
/// Dynamic request bodies become this strongly typed structure at the engine
/// boundary; unknown fields are a deserialization error rather than silently
/// ignored. A field left `None` was not named by the proposal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PartialFields {
    /// Record display name (admin-only).
    pub name: Option<String>,
    /// District (admin-only).
    pub district: Option<String>,
    /// Taluk (admin-only).
    pub taluk: Option<String>,
    /// Designation (admin-only).
    pub designation: Option<String>,
    /// Cadre group (admin-only).
    pub group: Option<String>,
    /// Subject branch (admin-only).
    pub branch: Option<String>,
    /// Total approved positions (admin-only).
    pub sanctioned: Option<NumericInput>,
    /// Currently filled positions.
    pub working: Option<NumericInput>,
    /// Unfilled positions. Naming this triggers the direct-vacant-edit path.
    pub vacant: Option<NumericInput>,
    /// Positions filled on deputation.
    pub deputation: Option<NumericInput>,
    /// Deputation target record code.
    pub deputation_target_code: Option<String>,
    /// Free-text remarks (admin-only).
    pub remarks: Option<String>,
}

impl PartialFields {
    /// The fields this proposal names, in canonical order.
    #[must_use]
    pub fn named_fields(&self) -> Vec<Field> {
        let mut named = Vec::new();
        if self.name.is_some() {
            named.push(Field::Name);
        }
        if self.district.is_some() {
            named.push(Field::District);
        }
        if self.taluk.is_some() {
            named.push(Field::Taluk);
        }
        if self.designation.is_some() {
            named.push(Field::Designation);
        }
        if self.group.is_some() {
            named.push(Field::Group);
        }
        if self.branch.is_some() {
            named.push(Field::Branch);
        }
        if self.sanctioned.is_some() {
            named.push(Field::Sanctioned);
        }
        if self.working.is_some() {
            named.push(Field::Working);
        }
        if self.vacant.is_some() {
            named.push(Field::Vacant);
        }
        if self.deputation.is_some() {
            named.push(Field::Deputation);
        }
        if self.deputation_target_code.is_some() {
            named.push(Field::DeputationTargetCode);
        }
        if self.remarks.is_some() {
            named.push(Field::Remarks);
        }
        named
    }

    /// Whether the proposal names no fields at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.named_fields().is_empty()
    }

    /// Convenience constructor naming only `working`.
    #[must_use]
    pub fn working(value: u32) -> Self {
        Self {
            working: Some(value.into()),
            ..Self::default()
        }
    }

    /// Convenience constructor naming only `vacant`.
    #[must_use]
    pub fn vacant(value: u32) -> Self {
        Self {
            vacant: Some(value.into()),
            ..Self::default()
        }
    }

    /// Convenience constructor naming only `deputation`.
    #[must_use]
    pub fn deputation(value: u32) -> Self {
        Self {
            deputation: Some(value.into()),
            ..Self::default()
        }
    }
}

/// Why an update was forbidden.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum Forbidden {
    /// The record is outside the principal's scoped code.
    #[error("record {code} is outside the principal's scoped code")]
    OutOfScope {
        /// Code of the record the principal tried to touch.
        code: String,
    },

    /// The principal's role may not write the named fields.
    #[error("role may not write field(s): {}", join_fields(.fields))]
    FieldsNotWritable {
        /// The offending fields, in canonical order.
        fields: Vec<Field>,
    },

    /// The operation is restricted to admin principals.
    #[error("operation \"{operation}\" requires the admin role")]
    AdminOnly {
        /// The attempted operation.
        operation: String,
    },
}

fn join_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .copied()
        .map(Field::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rejection of an update proposal.
///
/// All variants are terminal for the request; no side effects occur on any
/// rejection path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ResolveError {
    /// The principal may not perform this update.
    #[error("forbidden: {0}")]
    Forbidden(#[from] Forbidden),

    /// A numeric field failed validation. The whole update is rejected; no
    /// partial application.
    #[error("invalid value for field \"{field}\": expected a non-negative integer")]
    InvalidValue {
        /// The offending field.
        field: Field,
    },

    /// Every named field already holds the proposed value (or the proposal
    /// names none). Refusing empty-effect updates is a product decision, not
    /// an error of the caller's data.
    #[error("no changes detected")]
    NoChange,
}

/// The fully resolved, consistent output of [`resolve`].
///
/// The four counts are always present and satisfy the vacancy invariant;
/// non-numeric fields are present iff the proposal named them. `changed`
/// names every field whose final value differs from the prior record,
/// including derived changes the proposal never named — the audit logger
/// consumes it verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFields {
    /// Resolved display name, when named.
    pub name: Option<String>,
    /// Resolved district, when named.
    pub district: Option<String>,
    /// Resolved taluk, when named.
    pub taluk: Option<String>,
    /// Resolved designation, when named.
    pub designation: Option<String>,
    /// Resolved cadre group, when named.
    pub group: Option<String>,
    /// Resolved branch, when named.
    pub branch: Option<String>,
    /// Resolved sanctioned count.
    pub sanctioned: u32,
    /// Resolved working count.
    pub working: u32,
    /// Resolved vacant count. Always satisfies the invariant.
    pub vacant: u32,
    /// Resolved deputation count.
    pub deputation: u32,
    /// Resolved deputation target, when named.
    pub deputation_target_code: Option<String>,
    /// Resolved remarks, when named.
    pub remarks: Option<String>,
    /// Fields whose final value differs from the prior record.
    pub changed: BTreeSet<Field>,
}

impl ResolvedFields {
    /// Materializes the updated record snapshot, carrying unnamed fields
    /// over from `existing` and stamping modification metadata.
    #[must_use]
    pub fn apply_to(
        &self,
        existing: &StaffingRecord,
        modified_by: impl Into<String>,
        at: DateTime<Utc>,
    ) -> StaffingRecord {
        StaffingRecord {
            code: existing.code.clone(),
            name: self.name.clone().unwrap_or_else(|| existing.name.clone()),
            district: self
                .district
                .clone()
                .unwrap_or_else(|| existing.district.clone()),
            taluk: self.taluk.clone().unwrap_or_else(|| existing.taluk.clone()),
            designation: self
                .designation
                .clone()
                .unwrap_or_else(|| existing.designation.clone()),
            group: self.group.clone().unwrap_or_else(|| existing.group.clone()),
            branch: self
                .branch
                .clone()
                .unwrap_or_else(|| existing.branch.clone()),
            sanctioned: self.sanctioned,
            working: self.working,
            vacant: self.vacant,
            deputation: self.deputation,
            deputation_target_code: self
                .deputation_target_code
                .clone()
                .or_else(|| existing.deputation_target_code.clone()),
            remarks: self.remarks.clone().or_else(|| existing.remarks.clone()),
            last_modified_at: at,
            last_modified_by: modified_by.into(),
        }
    }
}

/// The four counts of a record, used by the derivation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Counts {
    sanctioned: u32,
    working: u32,
    vacant: u32,
    deputation: u32,
}

/// Validated numeric inputs of a proposal. `None` means "not named".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ProposedCounts {
    sanctioned: Option<u32>,
    working: Option<u32>,
    vacant: Option<u32>,
    deputation: Option<u32>,
}

/// The derivation step, isolated so the clamp order is testable on its own.
///
/// `S` and `D` resolve first. A direct vacant edit computes
/// `working = max(0, S - vacant - D)` and then re-derives
/// `vacant = max(0, S - working - D)`; the re-derivation guards against
/// inconsistent combinations supplied in the same request. Without a vacant
/// edit, `working` passes through and `vacant` is derived once.
const fn resolve_counts(existing: Counts, proposed: ProposedCounts) -> Counts {
    let s = match proposed.sanctioned {
        Some(v) => v,
        None => existing.sanctioned,
    };
    let d = match proposed.deputation {
        Some(v) => v,
        None => existing.deputation,
    };

    let (working, vacant) = match proposed.vacant {
        Some(requested) => {
            let w = s.saturating_sub(requested).saturating_sub(d);
            (w, derived_vacant(s, w, d))
        },
        None => {
            let w = match proposed.working {
                Some(v) => v,
                None => existing.working,
            };
            (w, derived_vacant(s, w, d))
        },
    };

    Counts {
        sanctioned: s,
        working,
        vacant,
        deputation: d,
    }
}

fn parse_numeric(
    input: Option<&NumericInput>,
    field: Field,
) -> Result<Option<u32>, ResolveError> {
    match input {
        None => Ok(None),
        Some(raw) => raw
            .parse_count()
            .map(Some)
            .ok_or(ResolveError::InvalidValue { field }),
    }
}

/// Resolves a partial update proposal against the existing record.
///
/// Steps, in order: authorization, numeric validation (all-or-nothing),
/// the no-op guard, then derivation. See the module docs for the
/// asymmetric derivation rule.
///
/// # Errors
///
/// - [`ResolveError::Forbidden`] when the principal is out of scope or names
///   fields its role may not write.
/// - [`ResolveError::InvalidValue`] when any named numeric field is not a
///   non-negative integer.
/// - [`ResolveError::NoChange`] when the proposal would have no effect.
pub fn resolve(
    existing: &StaffingRecord,
    proposed: &PartialFields,
    principal: &Principal,
) -> Result<ResolvedFields, ResolveError> {
    // Authorization comes first; a college principal learns nothing about
    // field validity on a record it may not touch.
    if principal.role() == Role::College {
        if !principal.may_access(&existing.code) {
            return Err(Forbidden::OutOfScope {
                code: existing.code.clone(),
            }
            .into());
        }
        let denied: Vec<Field> = proposed
            .named_fields()
            .into_iter()
            .filter(|field| !COLLEGE_WRITABLE.contains(field))
            .collect();
        if !denied.is_empty() {
            return Err(Forbidden::FieldsNotWritable { fields: denied }.into());
        }
    }

    let counts = ProposedCounts {
        sanctioned: parse_numeric(proposed.sanctioned.as_ref(), Field::Sanctioned)?,
        working: parse_numeric(proposed.working.as_ref(), Field::Working)?,
        vacant: parse_numeric(proposed.vacant.as_ref(), Field::Vacant)?,
        deputation: parse_numeric(proposed.deputation.as_ref(), Field::Deputation)?,
    };

    if !names_a_change(existing, proposed, counts) {
        return Err(ResolveError::NoChange);
    }

    let resolved = resolve_counts(
        Counts {
            sanctioned: existing.sanctioned,
            working: existing.working,
            vacant: existing.vacant,
            deputation: existing.deputation,
        },
        counts,
    );

    let mut changed = BTreeSet::new();
    if resolved.sanctioned != existing.sanctioned {
        changed.insert(Field::Sanctioned);
    }
    if resolved.working != existing.working {
        changed.insert(Field::Working);
    }
    if resolved.vacant != existing.vacant {
        changed.insert(Field::Vacant);
    }
    if resolved.deputation != existing.deputation {
        changed.insert(Field::Deputation);
    }
    if matches!(&proposed.name, Some(v) if *v != existing.name) {
        changed.insert(Field::Name);
    }
    if matches!(&proposed.district, Some(v) if *v != existing.district) {
        changed.insert(Field::District);
    }
    if matches!(&proposed.taluk, Some(v) if *v != existing.taluk) {
        changed.insert(Field::Taluk);
    }
    if matches!(&proposed.designation, Some(v) if *v != existing.designation) {
        changed.insert(Field::Designation);
    }
    if matches!(&proposed.group, Some(v) if *v != existing.group) {
        changed.insert(Field::Group);
    }
    if matches!(&proposed.branch, Some(v) if *v != existing.branch) {
        changed.insert(Field::Branch);
    }
    if matches!(&proposed.deputation_target_code, Some(v)
        if existing.deputation_target_code.as_ref() != Some(v))
    {
        changed.insert(Field::DeputationTargetCode);
    }
    if matches!(&proposed.remarks, Some(v) if existing.remarks.as_ref() != Some(v)) {
        changed.insert(Field::Remarks);
    }

    Ok(ResolvedFields {
        name: proposed.name.clone(),
        district: proposed.district.clone(),
        taluk: proposed.taluk.clone(),
        designation: proposed.designation.clone(),
        group: proposed.group.clone(),
        branch: proposed.branch.clone(),
        sanctioned: resolved.sanctioned,
        working: resolved.working,
        vacant: resolved.vacant,
        deputation: resolved.deputation,
        deputation_target_code: proposed.deputation_target_code.clone(),
        remarks: proposed.remarks.clone(),
        changed,
    })
}

/// The no-op guard: does the proposal name at least one field whose proposed
/// value differs from the existing one?
///
/// Compares the named fields only, pre-derivation; a derived `vacant` shift
/// alone never rescues a proposal from rejection.
fn names_a_change(
    existing: &StaffingRecord,
    proposed: &PartialFields,
    counts: ProposedCounts,
) -> bool {
    if counts.sanctioned.is_some_and(|v| v != existing.sanctioned) {
        return true;
    }
    if counts.working.is_some_and(|v| v != existing.working) {
        return true;
    }
    if counts.vacant.is_some_and(|v| v != existing.vacant) {
        return true;
    }
    if counts.deputation.is_some_and(|v| v != existing.deputation) {
        return true;
    }
    if matches!(&proposed.name, Some(v) if *v != existing.name) {
        return true;
    }
    if matches!(&proposed.district, Some(v) if *v != existing.district) {
        return true;
    }
    if matches!(&proposed.taluk, Some(v) if *v != existing.taluk) {
        return true;
    }
    if matches!(&proposed.designation, Some(v) if *v != existing.designation) {
        return true;
    }
    if matches!(&proposed.group, Some(v) if *v != existing.group) {
        return true;
    }
    if matches!(&proposed.branch, Some(v) if *v != existing.branch) {
        return true;
    }
    if matches!(&proposed.deputation_target_code, Some(v)
        if existing.deputation_target_code.as_ref() != Some(v))
    {
        return true;
    }
    if matches!(&proposed.remarks, Some(v) if existing.remarks.as_ref() != Some(v)) {
        return true;
    }
    false
}
