//! Weight validation across the plan hierarchy.
//!
//! Initiative weights must add up to their objective's effective weight.
//! Below an initiative the split is fixed policy: performance measures
//! always total 35, while main activities total 65% of the initiative's own
//! weight (rounded to 2 digits). The asymmetry is deliberate and must not
//! be "fixed": the measure total is an absolute constant, the activity
//! total scales with the initiative.

use serde::Serialize;
use tracing::{info, warn};

use super::{InitiativeId, ObjectiveId, PlanningService, StrategicObjective};
use crate::directory::{OrgId, OrgRole, UserContext};
use crate::shared::error::{PlanningError, Result};
use crate::shared::weight::{approx_eq, round2};

/// Fixed total weight of performance measures under any initiative.
pub const MEASURES_TOTAL_WEIGHT: f64 = 35.0;
/// Main activities carry this share of their initiative's weight.
pub const ACTIVITIES_WEIGHT_SHARE: f64 = 0.65;
/// Top-level objective effective weights are expected to total this.
pub const OBJECTIVES_TOTAL_WEIGHT: f64 = 100.0;

/// `{is_valid, total, expected}` triple returned by every weight read.
#[derive(Debug, Clone, Serialize)]
pub struct WeightSummary {
    pub expected: f64,
    pub total: f64,
    pub remaining: f64,
    pub is_valid: bool,
}

impl WeightSummary {
    fn of(expected: f64, total: f64) -> Self {
        Self {
            expected,
            total,
            remaining: expected - total,
            is_valid: approx_eq(total, expected),
        }
    }

    fn into_result(self, mismatch: impl FnOnce(&Self) -> PlanningError) -> Result<()> {
        if self.is_valid {
            Ok(())
        } else {
            Err(mismatch(&self))
        }
    }
}

#[derive(Clone)]
pub struct WeightEngine {
    store: PlanningService,
}

impl WeightEngine {
    pub fn new(store: PlanningService) -> Self {
        Self { store }
    }

    /// Sum of initiative weights under an objective, checked against the
    /// objective's effective weight. An empty objective is only vacuously
    /// valid when its own effective weight is 0.
    pub async fn initiative_weight_summary(
        &self,
        objective_id: ObjectiveId,
        organization: Option<OrgId>,
    ) -> Result<WeightSummary> {
        let objective = self.store.objective(objective_id).await?;
        let initiatives = self.store.initiatives_for(objective_id, organization).await;
        let total: f64 = initiatives.iter().map(|i| i.weight).sum();
        Ok(WeightSummary::of(objective.effective_weight(), total))
    }

    pub async fn validate_initiative_weights(
        &self,
        objective_id: ObjectiveId,
        organization: Option<OrgId>,
    ) -> Result<()> {
        self.initiative_weight_summary(objective_id, organization)
            .await?
            .into_result(|summary| {
                warn!(
                    objective = %objective_id,
                    expected = summary.expected,
                    actual = summary.total,
                    "initiative weights do not match objective weight"
                );
                PlanningError::WeightMismatch {
                    expected: summary.expected,
                    actual: summary.total,
                }
            })
    }

    /// Performance measures under an initiative must total exactly 35.
    pub async fn measure_weight_summary(
        &self,
        initiative_id: InitiativeId,
        organization: Option<OrgId>,
    ) -> Result<WeightSummary> {
        self.store.initiative(initiative_id).await?;
        let measures = self.store.measures_for(initiative_id, organization).await;
        let total: f64 = measures.iter().map(|m| m.weight).sum();
        let mut summary = WeightSummary::of(MEASURES_TOTAL_WEIGHT, total);
        // The measure total is an exact policy constant, not the ±0.01
        // epsilon the other levels use. Weights carry 2 fraction digits, so
        // the sum is compared at that precision; a raw float comparison
        // would reject 1.0 + 31.24 + 2.76 depending on summation order.
        summary.is_valid = round2(total) == MEASURES_TOTAL_WEIGHT;
        Ok(summary)
    }

    pub async fn validate_measure_weights(
        &self,
        initiative_id: InitiativeId,
        organization: Option<OrgId>,
    ) -> Result<()> {
        self.measure_weight_summary(initiative_id, organization)
            .await?
            .into_result(|summary| PlanningError::WeightMismatch {
                expected: summary.expected,
                actual: summary.total,
            })
    }

    /// Main activities must total 65% of the initiative's weight, rounded
    /// to 2 digits, within the usual epsilon.
    pub async fn activity_weight_summary(
        &self,
        initiative_id: InitiativeId,
        organization: Option<OrgId>,
    ) -> Result<WeightSummary> {
        let initiative = self.store.initiative(initiative_id).await?;
        let activities = self.store.activities_for(initiative_id, organization).await;
        let total: f64 = activities.iter().map(|a| a.weight).sum();
        let expected = round2(initiative.weight * ACTIVITIES_WEIGHT_SHARE);
        Ok(WeightSummary::of(expected, total))
    }

    pub async fn validate_activity_weights(
        &self,
        initiative_id: InitiativeId,
        organization: Option<OrgId>,
    ) -> Result<()> {
        self.activity_weight_summary(initiative_id, organization)
            .await?
            .into_result(|summary| PlanningError::WeightMismatch {
                expected: summary.expected,
                actual: summary.total,
            })
    }

    /// Advisory check that all top-level objective effective weights total
    /// 100. Objectives are shared defaults across organizations, so this is
    /// never enforced on the write path; callers ask for it explicitly.
    pub async fn objective_total_summary(&self) -> WeightSummary {
        let objectives = self.store.objectives().await;
        let total: f64 = objectives.iter().map(|o| o.effective_weight()).sum();
        WeightSummary::of(OBJECTIVES_TOTAL_WEIGHT, total)
    }

    pub async fn validate_objective_total(&self) -> Result<()> {
        self.objective_total_summary()
            .await
            .into_result(|summary| PlanningError::WeightMismatch {
                expected: summary.expected,
                actual: summary.total,
            })
    }

    /// Planner override on a default objective: shadows the base weight
    /// without mutating it. Only planners may do this, and only on default
    /// content.
    pub async fn set_planner_override(
        &self,
        ctx: &UserContext,
        objective_id: ObjectiveId,
        new_weight: f64,
    ) -> Result<StrategicObjective> {
        if !ctx.has_role(OrgRole::Planner) {
            return Err(PlanningError::Forbidden(
                "only planners can override objective weights".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&new_weight) {
            return Err(PlanningError::Validation(format!(
                "weight must be between 0 and 100, got {new_weight}"
            )));
        }
        let objective = self.store.objective(objective_id).await?;
        if !objective.is_default {
            return Err(PlanningError::Forbidden(
                "planner overrides only apply to default objectives".to_string(),
            ));
        }

        let updated = self
            .store
            .apply_objective_override(objective_id, Some(new_weight))
            .await?;
        info!(
            objective = %objective_id,
            base = updated.weight.base,
            override_weight = new_weight,
            "planner weight override set"
        );
        Ok(updated)
    }

    pub async fn clear_planner_override(
        &self,
        ctx: &UserContext,
        objective_id: ObjectiveId,
    ) -> Result<StrategicObjective> {
        if !ctx.has_role(OrgRole::Planner) {
            return Err(PlanningError::Forbidden(
                "only planners can override objective weights".to_string(),
            ));
        }
        self.store.apply_objective_override(objective_id, None).await
    }
}
