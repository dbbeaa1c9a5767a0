//! Plan & Report Lifecycle Module
//!
//! Plans and reports share the same lifecycle shape (draft, submitted,
//! approved/rejected) but are tracked independently: one approved plan can
//! carry one report per report type, each with its own review trail.

pub mod periods;
pub mod plan_workflow;
pub mod report_workflow;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::directory::OrgId;
use crate::planning::{ActivityId, MeasureId, ObjectiveId, SubActivityId};

pub use periods::{FiscalCalendar, PeriodResolver};
pub use plan_workflow::{CreatePlanRequest, PlanWorkflowService};
pub use report_workflow::{
    AchievementEntry, ReportWorkflowService, UtilizationEntry,
};

pub type PlanId = Uuid;
pub type ReportId = Uuid;

// ============================================================================
// Plan
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Draft => "DRAFT",
            Self::Submitted => "SUBMITTED",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        };
        write!(f, "{label}")
    }
}

/// An organization's annual plan: a selection of strategic objectives with
/// a weight snapshot taken at creation/submission. The snapshot does not
/// track later edits to the objectives' live weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub organization: OrgId,
    pub planner_name: String,
    pub plan_type: String,
    pub fiscal_year: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub status: PlanStatus,
    pub selected_objectives: Vec<ObjectiveId>,
    pub selected_objectives_weights: HashMap<ObjectiveId, f64>,
    /// The primary objective, used as the snapshot fallback when no
    /// objective carries a planner override at submission time.
    pub strategic_objective: Option<ObjectiveId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    pub fn objective_weight(&self, objective_id: ObjectiveId) -> f64 {
        self.selected_objectives_weights
            .get(&objective_id)
            .copied()
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    Approved,
    Rejected,
}

/// Immutable record of one evaluator decision on a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanReview {
    pub id: Uuid,
    pub plan_id: PlanId,
    pub evaluator: Uuid,
    pub status: ReviewStatus,
    pub feedback: String,
    pub reviewed_at: DateTime<Utc>,
}

// ============================================================================
// Report
// ============================================================================

/// Reporting-period token: which fraction of the fiscal year a report
/// covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportType {
    Q1,
    Q2,
    Q3,
    Q4,
    #[serde(rename = "6M")]
    SixMonth,
    #[serde(rename = "9M")]
    NineMonth,
    #[serde(rename = "YEARLY")]
    Yearly,
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Q1 => "Q1",
            Self::Q2 => "Q2",
            Self::Q3 => "Q3",
            Self::Q4 => "Q4",
            Self::SixMonth => "6M",
            Self::NineMonth => "9M",
            Self::Yearly => "YEARLY",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Draft => "DRAFT",
            Self::Submitted => "SUBMITTED",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        };
        write!(f, "{label}")
    }
}

/// Periodic report of achievement and budget utilization against one
/// approved plan. At most one live report exists per (plan, report type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub plan_id: PlanId,
    pub organization: OrgId,
    pub report_type: ReportType,
    pub status: ReportStatus,
    /// File name of the uploaded narrative document; storage is external.
    pub narrative_report: Option<String>,
    pub evaluator: Option<Uuid>,
    pub evaluator_feedback: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub evaluated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    /// Reports awaiting or past evaluation are locked against data entry.
    pub fn is_locked(&self) -> bool {
        matches!(self.status, ReportStatus::Submitted | ReportStatus::Approved)
    }
}

// ============================================================================
// Achievement and Utilization Records
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceAchievement {
    pub id: Uuid,
    pub report_id: ReportId,
    pub performance_measure_id: MeasureId,
    pub achievement: f64,
    pub justification: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityAchievement {
    pub id: Uuid,
    pub report_id: ReportId,
    pub main_activity_id: ActivityId,
    pub achievement: f64,
    pub justification: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-report utilization of a sub-activity's four funding sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubActivityBudgetUtilization {
    pub id: Uuid,
    pub report_id: ReportId,
    pub sub_activity_id: SubActivityId,
    pub government_treasury_utilized: BigDecimal,
    pub sdg_funding_utilized: BigDecimal,
    pub partners_funding_utilized: BigDecimal,
    pub other_funding_utilized: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubActivityBudgetUtilization {
    pub fn total_utilized(&self) -> BigDecimal {
        &self.government_treasury_utilized
            + &self.sdg_funding_utilized
            + &self.partners_funding_utilized
            + &self.other_funding_utilized
    }
}
