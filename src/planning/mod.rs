//! Strategic Planning Module
//!
//! The five-level plan hierarchy: strategic objectives own initiatives,
//! initiatives own performance measures and main activities, main activities
//! own costed sub-activities. Objectives, initiatives, measures and
//! activities may be "default" content shared across organizations
//! (organization = None); everything else is owned by one organization.

pub mod budget;
pub mod weights;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use bigdecimal::BigDecimal;

use crate::directory::OrgId;
use crate::shared::error::{PlanningError, Result};
use crate::shared::weight::Weight;

pub use budget::BudgetEngine;
pub use weights::{WeightEngine, WeightSummary};

pub type ObjectiveId = Uuid;
pub type InitiativeId = Uuid;
pub type MeasureId = Uuid;
pub type ActivityId = Uuid;
pub type SubActivityId = Uuid;

// ============================================================================
// Period Vocabulary
// ============================================================================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub const ALL: [Quarter; 4] = [Quarter::Q1, Quarter::Q2, Quarter::Q3, Quarter::Q4];

    /// Position within the fiscal year, 0-based.
    pub fn index(self) -> u32 {
        match self {
            Quarter::Q1 => 0,
            Quarter::Q2 => 1,
            Quarter::Q3 => 2,
            Quarter::Q4 => 3,
        }
    }
}

/// Abbreviated month tokens as the planning frontend records them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Month {
    Jan,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
}

impl Month {
    /// Calendar month number 1-12 to token.
    pub fn from_calendar(month: u32) -> Option<Month> {
        use Month::*;
        Some(match month {
            1 => Jan,
            2 => Feb,
            3 => Mar,
            4 => Apr,
            5 => May,
            6 => Jun,
            7 => Jul,
            8 => Aug,
            9 => Sep,
            10 => Oct,
            11 => Nov,
            12 => Dec,
            _ => return None,
        })
    }
}

/// How period achievements accumulate toward the annual figure. Opaque to
/// the engine, carried through to rollups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Cumulative,
    Incremental,
    Constant,
}

/// Targets and period selection shared by performance measures and main
/// activities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodTargets {
    pub target_type: TargetType,
    pub baseline: Option<f64>,
    pub q1_target: Option<f64>,
    pub q2_target: Option<f64>,
    pub q3_target: Option<f64>,
    pub q4_target: Option<f64>,
    pub annual_target: Option<f64>,
    pub selected_quarters: BTreeSet<Quarter>,
    pub selected_months: BTreeSet<Month>,
}

impl PeriodTargets {
    pub fn annual_only(target_type: TargetType, annual_target: f64) -> Self {
        Self {
            target_type,
            baseline: None,
            q1_target: None,
            q2_target: None,
            q3_target: None,
            q4_target: None,
            annual_target: Some(annual_target),
            selected_quarters: BTreeSet::new(),
            selected_months: BTreeSet::new(),
        }
    }

    pub fn quarter_target(&self, quarter: Quarter) -> Option<f64> {
        match quarter {
            Quarter::Q1 => self.q1_target,
            Quarter::Q2 => self.q2_target,
            Quarter::Q3 => self.q3_target,
            Quarter::Q4 => self.q4_target,
        }
    }

    /// True when any quarterly target is set and positive; quarterly targets
    /// then take precedence over the annual one.
    pub fn has_quarterly(&self) -> bool {
        Quarter::ALL
            .iter()
            .any(|q| self.quarter_target(*q).map(|t| t > 0.0).unwrap_or(false))
    }

    pub fn has_period_selection(&self) -> bool {
        !self.selected_quarters.is_empty() || !self.selected_months.is_empty()
    }
}

// ============================================================================
// Hierarchy Entities
// ============================================================================

/// Top-level strategic objective. Default objectives are shared templates
/// whose base weight only changes through content sync; planners shadow it
/// with an override instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategicObjective {
    pub id: ObjectiveId,
    pub title: String,
    pub description: Option<String>,
    pub weight: Weight,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StrategicObjective {
    pub fn new(title: &str, weight: f64, is_default: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: None,
            weight: Weight::new(weight),
            is_default,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn effective_weight(&self) -> f64 {
        self.weight.effective()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategicInitiative {
    pub id: InitiativeId,
    pub objective_id: ObjectiveId,
    pub name: String,
    pub weight: f64,
    pub organization: Option<OrgId>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMeasure {
    pub id: MeasureId,
    pub initiative_id: InitiativeId,
    pub name: String,
    pub weight: f64,
    pub organization: Option<OrgId>,
    pub targets: PeriodTargets,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainActivity {
    pub id: ActivityId,
    pub initiative_id: InitiativeId,
    pub name: String,
    pub weight: f64,
    pub organization: Option<OrgId>,
    pub targets: PeriodTargets,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityType {
    Training,
    Meeting,
    Workshop,
    Supervision,
    Procurement,
    Printing,
    Other,
}

impl ActivityType {
    pub const ALL: [ActivityType; 7] = [
        ActivityType::Training,
        ActivityType::Meeting,
        ActivityType::Workshop,
        ActivityType::Supervision,
        ActivityType::Procurement,
        ActivityType::Printing,
        ActivityType::Other,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetCalculationType {
    WithTool,
    WithoutTool,
}

/// Leaf of the hierarchy: a costed piece of work with a dual-mode cost
/// estimate and four funding sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubActivity {
    pub id: SubActivityId,
    pub main_activity_id: ActivityId,
    pub name: String,
    pub activity_type: ActivityType,
    pub description: Option<String>,
    pub budget_calculation_type: BudgetCalculationType,
    pub estimated_cost_with_tool: BigDecimal,
    pub estimated_cost_without_tool: BigDecimal,
    pub government_treasury: BigDecimal,
    pub sdg_funding: BigDecimal,
    pub partners_funding: BigDecimal,
    pub other_funding: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Creation Requests
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInitiative {
    pub objective_id: ObjectiveId,
    pub name: String,
    pub weight: f64,
    pub organization: Option<OrgId>,
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPlanItem {
    pub initiative_id: InitiativeId,
    pub name: String,
    pub weight: f64,
    pub organization: Option<OrgId>,
    pub targets: PeriodTargets,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubActivity {
    pub main_activity_id: ActivityId,
    pub name: String,
    pub activity_type: ActivityType,
    pub description: Option<String>,
    pub budget_calculation_type: BudgetCalculationType,
    pub estimated_cost_with_tool: BigDecimal,
    pub estimated_cost_without_tool: BigDecimal,
    pub government_treasury: BigDecimal,
    pub sdg_funding: BigDecimal,
    pub partners_funding: BigDecimal,
    pub other_funding: BigDecimal,
}

// ============================================================================
// Planning Store
// ============================================================================

/// In-memory store for the whole plan hierarchy. Every mutation validates
/// first and applies under a single write lock on the touched aggregate, so
/// sibling weight checks cannot race a concurrent insert into the same
/// parent.
#[derive(Clone, Default)]
pub struct PlanningService {
    objectives: Arc<RwLock<HashMap<ObjectiveId, StrategicObjective>>>,
    initiatives: Arc<RwLock<HashMap<InitiativeId, StrategicInitiative>>>,
    measures: Arc<RwLock<HashMap<MeasureId, PerformanceMeasure>>>,
    activities: Arc<RwLock<HashMap<ActivityId, MainActivity>>>,
    sub_activities: Arc<RwLock<HashMap<SubActivityId, SubActivity>>>,
}

fn validate_weight_range(weight: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&weight) {
        return Err(PlanningError::Validation(format!(
            "weight must be between 0 and 100, got {weight}"
        )));
    }
    Ok(())
}

impl PlanningService {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Objectives
    // ------------------------------------------------------------------

    pub async fn register_objective(&self, objective: StrategicObjective) -> Result<StrategicObjective> {
        validate_weight_range(objective.weight.base)?;
        let mut objectives = self.objectives.write().await;
        objectives.insert(objective.id, objective.clone());
        Ok(objective)
    }

    pub async fn objective(&self, id: ObjectiveId) -> Result<StrategicObjective> {
        let objectives = self.objectives.read().await;
        objectives
            .get(&id)
            .cloned()
            .ok_or(PlanningError::NotFound("strategic objective"))
    }

    pub async fn objectives(&self) -> Vec<StrategicObjective> {
        let objectives = self.objectives.read().await;
        let mut all: Vec<_> = objectives.values().cloned().collect();
        all.sort_by(|a, b| a.title.cmp(&b.title));
        all
    }

    /// Objectives a planner has explicitly taken into its plan (non-null
    /// override). Used for the submission snapshot.
    pub async fn overridden_objectives(&self) -> Vec<StrategicObjective> {
        let objectives = self.objectives.read().await;
        objectives
            .values()
            .filter(|o| o.weight.is_overridden())
            .cloned()
            .collect()
    }

    pub(crate) async fn apply_objective_override(
        &self,
        id: ObjectiveId,
        new_weight: Option<f64>,
    ) -> Result<StrategicObjective> {
        let mut objectives = self.objectives.write().await;
        let objective = objectives
            .get_mut(&id)
            .ok_or(PlanningError::NotFound("strategic objective"))?;
        objective.weight.planner_override = new_weight;
        objective.updated_at = Utc::now();
        Ok(objective.clone())
    }

    // ------------------------------------------------------------------
    // Initiatives
    // ------------------------------------------------------------------

    pub async fn create_initiative(&self, req: NewInitiative) -> Result<StrategicInitiative> {
        validate_weight_range(req.weight)?;
        self.objective(req.objective_id).await?;

        let now = Utc::now();
        let initiative = StrategicInitiative {
            id: Uuid::new_v4(),
            objective_id: req.objective_id,
            name: req.name,
            weight: req.weight,
            organization: req.organization,
            is_default: req.is_default,
            created_at: now,
            updated_at: now,
        };
        let mut initiatives = self.initiatives.write().await;
        initiatives.insert(initiative.id, initiative.clone());
        Ok(initiative)
    }

    pub async fn initiative(&self, id: InitiativeId) -> Result<StrategicInitiative> {
        let initiatives = self.initiatives.read().await;
        initiatives
            .get(&id)
            .cloned()
            .ok_or(PlanningError::NotFound("strategic initiative"))
    }

    /// Initiatives under an objective, optionally narrowed to one
    /// organization plus the shared defaults.
    pub async fn initiatives_for(
        &self,
        objective_id: ObjectiveId,
        organization: Option<OrgId>,
    ) -> Vec<StrategicInitiative> {
        let initiatives = self.initiatives.read().await;
        initiatives
            .values()
            .filter(|i| i.objective_id == objective_id)
            .filter(|i| match organization {
                Some(org) => i.organization.is_none() || i.organization == Some(org),
                None => true,
            })
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Measures and Activities
    // ------------------------------------------------------------------

    pub async fn create_measure(&self, req: NewPlanItem) -> Result<PerformanceMeasure> {
        validate_weight_range(req.weight)?;
        self.initiative(req.initiative_id).await?;
        if !req.targets.has_period_selection() {
            return Err(PlanningError::Validation(
                "at least one month or quarter must be selected".to_string(),
            ));
        }

        let now = Utc::now();
        let measure = PerformanceMeasure {
            id: Uuid::new_v4(),
            initiative_id: req.initiative_id,
            name: req.name,
            weight: req.weight,
            organization: req.organization,
            targets: req.targets,
            created_at: now,
            updated_at: now,
        };
        let mut measures = self.measures.write().await;
        measures.insert(measure.id, measure.clone());
        Ok(measure)
    }

    pub async fn measure(&self, id: MeasureId) -> Result<PerformanceMeasure> {
        let measures = self.measures.read().await;
        measures
            .get(&id)
            .cloned()
            .ok_or(PlanningError::NotFound("performance measure"))
    }

    pub async fn measures_for(
        &self,
        initiative_id: InitiativeId,
        organization: Option<OrgId>,
    ) -> Vec<PerformanceMeasure> {
        let measures = self.measures.read().await;
        measures
            .values()
            .filter(|m| m.initiative_id == initiative_id)
            .filter(|m| match organization {
                Some(org) => m.organization.is_none() || m.organization == Some(org),
                None => true,
            })
            .cloned()
            .collect()
    }

    pub async fn create_activity(&self, req: NewPlanItem) -> Result<MainActivity> {
        validate_weight_range(req.weight)?;
        self.initiative(req.initiative_id).await?;
        if !req.targets.has_period_selection() {
            return Err(PlanningError::Validation(
                "at least one month or quarter must be selected".to_string(),
            ));
        }

        let now = Utc::now();
        let activity = MainActivity {
            id: Uuid::new_v4(),
            initiative_id: req.initiative_id,
            name: req.name,
            weight: req.weight,
            organization: req.organization,
            targets: req.targets,
            created_at: now,
            updated_at: now,
        };
        let mut activities = self.activities.write().await;
        activities.insert(activity.id, activity.clone());
        Ok(activity)
    }

    pub async fn activity(&self, id: ActivityId) -> Result<MainActivity> {
        let activities = self.activities.read().await;
        activities
            .get(&id)
            .cloned()
            .ok_or(PlanningError::NotFound("main activity"))
    }

    pub async fn activities_for(
        &self,
        initiative_id: InitiativeId,
        organization: Option<OrgId>,
    ) -> Vec<MainActivity> {
        let activities = self.activities.read().await;
        activities
            .values()
            .filter(|a| a.initiative_id == initiative_id)
            .filter(|a| match organization {
                Some(org) => a.organization.is_none() || a.organization == Some(org),
                None => true,
            })
            .cloned()
            .collect()
    }

    pub async fn activities_in_orgs(&self, orgs: &std::collections::HashSet<OrgId>) -> Vec<MainActivity> {
        let activities = self.activities.read().await;
        activities
            .values()
            .filter(|a| a.organization.map(|o| orgs.contains(&o)).unwrap_or(false))
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Sub-activities
    // ------------------------------------------------------------------

    pub async fn create_sub_activity(&self, req: NewSubActivity) -> Result<SubActivity> {
        self.activity(req.main_activity_id).await?;

        let now = Utc::now();
        let sub_activity = SubActivity {
            id: Uuid::new_v4(),
            main_activity_id: req.main_activity_id,
            name: req.name,
            activity_type: req.activity_type,
            description: req.description,
            budget_calculation_type: req.budget_calculation_type,
            estimated_cost_with_tool: req.estimated_cost_with_tool,
            estimated_cost_without_tool: req.estimated_cost_without_tool,
            government_treasury: req.government_treasury,
            sdg_funding: req.sdg_funding,
            partners_funding: req.partners_funding,
            other_funding: req.other_funding,
            created_at: now,
            updated_at: now,
        };
        budget::validate_sub_activity(&sub_activity)?;

        let mut sub_activities = self.sub_activities.write().await;
        sub_activities.insert(sub_activity.id, sub_activity.clone());
        Ok(sub_activity)
    }

    pub async fn sub_activity(&self, id: SubActivityId) -> Result<SubActivity> {
        let sub_activities = self.sub_activities.read().await;
        sub_activities
            .get(&id)
            .cloned()
            .ok_or(PlanningError::NotFound("sub-activity"))
    }

    pub async fn sub_activities_for(&self, activity_id: ActivityId) -> Vec<SubActivity> {
        let sub_activities = self.sub_activities.read().await;
        sub_activities
            .values()
            .filter(|s| s.main_activity_id == activity_id)
            .cloned()
            .collect()
    }

    /// Update the budget block of a sub-activity; validation runs against
    /// the fully updated value before anything is stored.
    pub async fn update_sub_activity_budget(
        &self,
        id: SubActivityId,
        budget_calculation_type: BudgetCalculationType,
        estimated_cost_with_tool: BigDecimal,
        estimated_cost_without_tool: BigDecimal,
        government_treasury: BigDecimal,
        sdg_funding: BigDecimal,
        partners_funding: BigDecimal,
        other_funding: BigDecimal,
    ) -> Result<SubActivity> {
        let mut sub_activities = self.sub_activities.write().await;
        let existing = sub_activities
            .get(&id)
            .ok_or(PlanningError::NotFound("sub-activity"))?;

        let mut updated = existing.clone();
        updated.budget_calculation_type = budget_calculation_type;
        updated.estimated_cost_with_tool = estimated_cost_with_tool;
        updated.estimated_cost_without_tool = estimated_cost_without_tool;
        updated.government_treasury = government_treasury;
        updated.sdg_funding = sdg_funding;
        updated.partners_funding = partners_funding;
        updated.other_funding = other_funding;
        updated.updated_at = Utc::now();
        budget::validate_sub_activity(&updated)?;

        sub_activities.insert(id, updated.clone());
        Ok(updated)
    }

    pub async fn delete_sub_activity(&self, id: SubActivityId) -> Result<()> {
        let mut sub_activities = self.sub_activities.write().await;
        sub_activities
            .remove(&id)
            .map(|_| ())
            .ok_or(PlanningError::NotFound("sub-activity"))
    }
}
