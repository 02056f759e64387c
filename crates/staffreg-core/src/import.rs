//! Bulk row import.
//!
//! A spreadsheet-parsing collaborator delivers rows as named string/number
//! fields; this module validates each row and reports failures by row
//! number. Data rows are numbered from 2 — row 1 is the sheet header.
//!
//! Import is always admin-equivalent: rows skip the engine's authorization
//! step and go straight through the store's create path. One row's rejection
//! never aborts sibling rows.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reconcile::NumericInput;
use crate::record::{Field, NewRecord};

/// One row of a bulk import sheet, as delivered by the parsing collaborator.
///
/// Everything is optional at this stage; [`validate_row`] decides what is
/// actually required. A supplied `vacant` column is accepted and ignored —
/// the store derives vacancy server-side to avoid inconsistent sheets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkRow {
    /// College code.
    pub code: Option<String>,
    /// College name.
    pub name: Option<String>,
    /// District.
    pub district: Option<String>,
    /// Taluk.
    pub taluk: Option<String>,
    /// Designation.
    pub designation: Option<String>,
    /// Cadre group.
    pub group: Option<String>,
    /// Subject branch.
    pub branch: Option<String>,
    /// Sanctioned count. Required.
    pub sanctioned: Option<NumericInput>,
    /// Working count. Defaults to 0 when blank.
    pub working: Option<NumericInput>,
    /// Vacant column. Ignored; vacancy is derived.
    pub vacant: Option<NumericInput>,
    /// Deputation count. Defaults to 0 when blank.
    pub deputation: Option<NumericInput>,
    /// Deputation target record code.
    pub deputation_target_code: Option<String>,
    /// Free-text remarks.
    pub remarks: Option<String>,
}

/// Why a row was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RowIssue {
    /// Required fields are blank.
    #[error("missing required fields: {}", .names.join(", "))]
    MissingFields {
        /// Canonical names of the blank fields.
        names: Vec<String>,
    },

    /// A numeric field failed validation.
    #[error("invalid value for field \"{field}\": expected a non-negative integer")]
    InvalidValue {
        /// The offending field.
        field: Field,
    },

    /// The row's code already exists in the register.
    #[error("record code already exists: {code}")]
    Duplicate {
        /// The duplicate code.
        code: String,
    },

    /// The store rejected the row for an operational reason.
    #[error("store error: {message}")]
    Store {
        /// Stringified store error.
        message: String,
    },
}

/// A skipped row, reported by sheet row number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("row {row}: {issue}")]
pub struct RowError {
    /// 1-based sheet row number (data starts at row 2).
    pub row: usize,

    /// Why the row was skipped.
    pub issue: RowIssue,
}

/// Outcome of a bulk import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Rows seen.
    pub total: usize,

    /// Rows persisted.
    pub successful: usize,

    /// Rows skipped because their code already existed.
    pub duplicates: usize,

    /// Every skipped row, duplicates included.
    pub errors: Vec<RowError>,
}

fn require(value: &Option<String>, field: Field, missing: &mut Vec<String>) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => {
            missing.push(field.as_str().to_string());
            String::new()
        },
    }
}

fn optional_count(
    value: &Option<NumericInput>,
    field: Field,
) -> Result<u32, RowIssue> {
    match value {
        None => Ok(0),
        Some(NumericInput::Text(s)) if s.trim().is_empty() => Ok(0),
        Some(raw) => raw.parse_count().ok_or(RowIssue::InvalidValue { field }),
    }
}

/// Validates one sheet row into a creation input.
///
/// Required fields are `code`, `name`, `district`, `taluk`, `designation`,
/// `group`, `branch`, and `sanctioned`; `working` and `deputation` default
/// to zero when blank. Numeric validation mirrors the engine's: non-negative
/// integers only.
///
/// # Errors
///
/// Returns a [`RowIssue`] naming the blank or invalid fields.
pub fn validate_row(row: &BulkRow) -> Result<NewRecord, RowIssue> {
    let mut missing = Vec::new();

    // `code` has no Field variant — it is the record key, not a mutable
    // field — so it is reported under its wire name directly.
    let code = match row.code.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => {
            missing.push("code".to_string());
            String::new()
        },
    };
    let name = require(&row.name, Field::Name, &mut missing);
    let district = require(&row.district, Field::District, &mut missing);
    let taluk = require(&row.taluk, Field::Taluk, &mut missing);
    let designation = require(&row.designation, Field::Designation, &mut missing);
    let group = require(&row.group, Field::Group, &mut missing);
    let branch = require(&row.branch, Field::Branch, &mut missing);
    if row.sanctioned.is_none() {
        missing.push(Field::Sanctioned.as_str().to_string());
    }
    if !missing.is_empty() {
        return Err(RowIssue::MissingFields { names: missing });
    }

    let sanctioned = row
        .sanctioned
        .as_ref()
        .and_then(NumericInput::parse_count)
        .ok_or(RowIssue::InvalidValue {
            field: Field::Sanctioned,
        })?;
    let working = optional_count(&row.working, Field::Working)?;
    let deputation = optional_count(&row.deputation, Field::Deputation)?;

    Ok(NewRecord {
        code,
        name,
        district,
        taluk,
        designation,
        group,
        branch,
        sanctioned,
        working,
        deputation,
        deputation_target_code: row
            .deputation_target_code
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string),
        remarks: row
            .remarks
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_row() -> BulkRow {
        BulkRow {
            code: Some("COL001".to_string()),
            name: Some("Government Polytechnic".to_string()),
            district: Some("North".to_string()),
            taluk: Some("Central".to_string()),
            designation: Some("Lecturer".to_string()),
            group: Some("A".to_string()),
            branch: Some("Science".to_string()),
            sanctioned: Some(50.into()),
            working: Some(45.into()),
            vacant: Some(99.into()),
            deputation: Some(2.into()),
            deputation_target_code: Some("COL002".to_string()),
            remarks: Some("sample".to_string()),
        }
    }

    #[test]
    fn valid_row_passes() {
        let new = validate_row(&full_row()).expect("row must validate");
        assert_eq!(new.code, "COL001");
        assert_eq!(new.sanctioned, 50);
        assert_eq!(new.working, 45);
        assert_eq!(new.deputation, 2);
        // The sheet's vacant column never reaches the creation input.
        assert_eq!(new.into_record("admin-1", chrono::Utc::now()).vacant, 3);
    }

    #[test]
    fn missing_fields_reported_together() {
        let row = BulkRow {
            code: None,
            district: Some("  ".to_string()),
            ..full_row()
        };
        let issue = validate_row(&row).unwrap_err();
        match issue {
            RowIssue::MissingFields { names } => {
                assert_eq!(names, vec!["code".to_string(), "district".to_string()]);
            },
            other => panic!("expected MissingFields, got {other:?}"),
        }
    }

    #[test]
    fn blank_counts_default_to_zero() {
        let row = BulkRow {
            working: Some(NumericInput::Text(String::new())),
            deputation: None,
            ..full_row()
        };
        let new = validate_row(&row).expect("row must validate");
        assert_eq!(new.working, 0);
        assert_eq!(new.deputation, 0);
    }

    #[test]
    fn invalid_count_rejected() {
        let row = BulkRow {
            working: Some(NumericInput::Number(-1)),
            ..full_row()
        };
        let issue = validate_row(&row).unwrap_err();
        assert_eq!(
            issue,
            RowIssue::InvalidValue {
                field: Field::Working
            }
        );
    }
}
