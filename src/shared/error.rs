//! Domain error taxonomy shared by every engine component.
//!
//! Validation failures always carry the offending quantity so the caller can
//! report it; none of them are retried automatically. Write paths never
//! partially commit a mutation that failed validation.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::reporting::ReportType;

pub type Result<T> = std::result::Result<T, PlanningError>;

#[derive(Debug, Clone, Error)]
pub enum PlanningError {
    #[error("total child weight should be {expected}%, but is {actual}%")]
    WeightMismatch { expected: f64, actual: f64 },

    #[error("total weight of selected objectives must equal 100%, current total: {total}%")]
    InvalidWeightTotal { total: f64 },

    #[error("at least one estimated cost must be greater than 0")]
    NoPositiveCost,

    #[error("total funding {funding} exceeds estimated cost {cost}")]
    FundingExceedsCost { funding: BigDecimal, cost: BigDecimal },

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("cannot {action} a {entity} in {from} state")]
    StateConflict {
        entity: &'static str,
        from: String,
        action: &'static str,
    },

    #[error("cycle detected in organization hierarchy at {0}")]
    CorruptHierarchy(Uuid),

    #[error("reports can only be created for approved plans")]
    PlanNotApproved,

    #[error("the reporting period for {report_type} has not ended yet; wait until {period_end}")]
    ReportPeriodNotElapsed {
        report_type: ReportType,
        period_end: NaiveDate,
    },
}

/// Coarse classification used by the (out-of-scope) HTTP layer to pick a
/// status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Forbidden,
    NotFound,
    StateConflict,
    CorruptHierarchy,
}

impl PlanningError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WeightMismatch { .. }
            | Self::InvalidWeightTotal { .. }
            | Self::NoPositiveCost
            | Self::FundingExceedsCost { .. }
            | Self::MissingField(_)
            | Self::Validation(_)
            | Self::ReportPeriodNotElapsed { .. } => ErrorKind::Validation,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::StateConflict { .. } | Self::PlanNotApproved => ErrorKind::StateConflict,
            Self::CorruptHierarchy(_) => ErrorKind::CorruptHierarchy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_matches_taxonomy() {
        let err = PlanningError::WeightMismatch {
            expected: 30.0,
            actual: 28.0,
        };
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = PlanningError::StateConflict {
            entity: "plan",
            from: "DRAFT".to_string(),
            action: "approve",
        };
        assert_eq!(err.kind(), ErrorKind::StateConflict);

        assert_eq!(
            PlanningError::PlanNotApproved.kind(),
            ErrorKind::StateConflict
        );
        assert_eq!(
            PlanningError::CorruptHierarchy(Uuid::new_v4()).kind(),
            ErrorKind::CorruptHierarchy
        );
    }

    #[test]
    fn messages_carry_quantities() {
        let err = PlanningError::WeightMismatch {
            expected: 30.0,
            actual: 28.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("30"));
        assert!(msg.contains("28"));
    }
}
