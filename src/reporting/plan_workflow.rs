//! Plan lifecycle: draft, submit, approve/reject.
//!
//! Submission snapshots the planner's objective selection; approval and
//! rejection are evaluator decisions that leave an immutable review record.
//! Both APPROVED and REJECTED are terminal for the submission; plans have
//! no resubmit (a deliberate product asymmetry with reports).

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use super::{Plan, PlanId, PlanReview, PlanStatus, ReviewStatus};
use crate::directory::{DirectoryService, OrgId, OrgRole, UserContext};
use crate::planning::{ObjectiveId, PlanningService};
use crate::shared::error::{PlanningError, Result};
use crate::shared::weight::approx_eq;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlanRequest {
    pub organization: OrgId,
    pub planner_name: String,
    pub plan_type: String,
    pub fiscal_year: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub selected_objectives: Vec<ObjectiveId>,
    pub selected_objectives_weights: HashMap<ObjectiveId, f64>,
}

#[derive(Clone)]
pub struct PlanWorkflowService {
    plans: Arc<RwLock<HashMap<PlanId, Plan>>>,
    reviews: Arc<RwLock<Vec<PlanReview>>>,
    planning: PlanningService,
    directory: DirectoryService,
}

/// Weight snapshot rule shared by create and submit: the map must be
/// present, every value in [0, 100], and the total 100 within epsilon.
fn validate_objective_weights(weights: &HashMap<ObjectiveId, f64>) -> Result<()> {
    if weights.is_empty() {
        return Err(PlanningError::MissingField("selected objectives weights"));
    }
    for (objective_id, weight) in weights {
        if !(0.0..=100.0).contains(weight) {
            return Err(PlanningError::Validation(format!(
                "weight for objective {objective_id} must be between 0 and 100"
            )));
        }
    }
    let total: f64 = weights.values().sum();
    if !approx_eq(total, 100.0) {
        return Err(PlanningError::InvalidWeightTotal { total });
    }
    Ok(())
}

impl PlanWorkflowService {
    pub fn new(planning: PlanningService, directory: DirectoryService) -> Self {
        Self {
            plans: Arc::new(RwLock::new(HashMap::new())),
            reviews: Arc::new(RwLock::new(Vec::new())),
            planning,
            directory,
        }
    }

    // ------------------------------------------------------------------
    // Creation and reads
    // ------------------------------------------------------------------

    pub async fn create_plan(&self, ctx: &UserContext, req: CreatePlanRequest) -> Result<Plan> {
        if ctx.role_in(req.organization) != Some(OrgRole::Planner) {
            return Err(PlanningError::Forbidden(
                "only a planner of the organization can create its plan".to_string(),
            ));
        }
        self.directory.get(req.organization).await?;

        if req.planner_name.trim().is_empty() {
            return Err(PlanningError::MissingField("planner_name"));
        }
        if req.plan_type.trim().is_empty() {
            return Err(PlanningError::MissingField("plan type"));
        }
        if req.fiscal_year.trim().is_empty() {
            return Err(PlanningError::MissingField("fiscal_year"));
        }
        if req.to_date <= req.from_date {
            return Err(PlanningError::Validation(
                "end date must be after start date".to_string(),
            ));
        }
        if req.selected_objectives.is_empty() {
            return Err(PlanningError::Validation(
                "at least one objective must be selected".to_string(),
            ));
        }
        for objective_id in &req.selected_objectives {
            self.planning.objective(*objective_id).await?;
        }
        validate_objective_weights(&req.selected_objectives_weights)?;

        let now = Utc::now();
        let plan = Plan {
            id: Uuid::new_v4(),
            organization: req.organization,
            planner_name: req.planner_name,
            plan_type: req.plan_type,
            fiscal_year: req.fiscal_year,
            from_date: req.from_date,
            to_date: req.to_date,
            status: PlanStatus::Draft,
            strategic_objective: req.selected_objectives.first().copied(),
            selected_objectives: req.selected_objectives,
            selected_objectives_weights: req.selected_objectives_weights,
            created_at: now,
            updated_at: now,
        };
        let mut plans = self.plans.write().await;
        plans.insert(plan.id, plan.clone());
        info!(plan = %plan.id, organization = %plan.organization, "plan created");
        Ok(plan)
    }

    pub async fn plan(&self, id: PlanId) -> Result<Plan> {
        let plans = self.plans.read().await;
        plans.get(&id).cloned().ok_or(PlanningError::NotFound("plan"))
    }

    pub async fn get_plan(&self, ctx: &UserContext, id: PlanId) -> Result<Plan> {
        let plan = self.plan(id).await?;
        let tree = self.directory.tree().await;
        let scope = tree.visible_orgs(ctx, false)?;
        if !scope.permits(plan.organization) {
            return Err(PlanningError::Forbidden(
                "plan is outside your organization scope".to_string(),
            ));
        }
        Ok(plan)
    }

    /// Plans within the caller's scope, optionally filtered by status.
    pub async fn list_plans(
        &self,
        ctx: &UserContext,
        status: Option<PlanStatus>,
    ) -> Result<Vec<Plan>> {
        let tree = self.directory.tree().await;
        let scope = tree.visible_orgs(ctx, false)?;
        let plans = self.plans.read().await;
        let mut visible: Vec<_> = plans
            .values()
            .filter(|p| scope.permits(p.organization))
            .filter(|p| status.map(|s| p.status == s).unwrap_or(true))
            .cloned()
            .collect();
        visible.sort_by_key(|p| p.created_at);
        Ok(visible)
    }

    /// Submitted plans awaiting evaluation, within the caller's scope.
    pub async fn pending_reviews(&self, ctx: &UserContext) -> Result<Vec<Plan>> {
        if !ctx.can_evaluate() {
            return Err(PlanningError::Forbidden(
                "only evaluators can list pending reviews".to_string(),
            ));
        }
        self.list_plans(ctx, Some(PlanStatus::Submitted)).await
    }

    pub async fn reviews_for(&self, plan_id: PlanId) -> Vec<PlanReview> {
        let reviews = self.reviews.read().await;
        reviews
            .iter()
            .filter(|r| r.plan_id == plan_id)
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Submit a draft plan for review. Snapshots the planner-overridden
    /// objectives (falling back to the plan's primary objective when none
    /// carry an override) and re-validates the weight snapshot.
    pub async fn submit(&self, ctx: &UserContext, plan_id: PlanId) -> Result<Plan> {
        // Snapshot is computed before the plan lock so the store mutation
        // below stays all-or-nothing.
        let overridden = self.planning.overridden_objectives().await;

        let mut plans = self.plans.write().await;
        let plan = plans.get_mut(&plan_id).ok_or(PlanningError::NotFound("plan"))?;

        if ctx.role_in(plan.organization) != Some(OrgRole::Planner) {
            return Err(PlanningError::Forbidden(
                "only a planner of the organization can submit its plan".to_string(),
            ));
        }
        if plan.status != PlanStatus::Draft {
            return Err(PlanningError::StateConflict {
                entity: "plan",
                from: plan.status.to_string(),
                action: "submit",
            });
        }
        validate_objective_weights(&plan.selected_objectives_weights)?;

        let snapshot: Vec<ObjectiveId> = if overridden.is_empty() {
            plan.strategic_objective.into_iter().collect()
        } else {
            overridden.iter().map(|o| o.id).collect()
        };
        if snapshot.is_empty() {
            return Err(PlanningError::Validation(
                "at least one objective must be selected".to_string(),
            ));
        }

        plan.selected_objectives = snapshot;
        plan.status = PlanStatus::Submitted;
        plan.updated_at = Utc::now();
        info!(plan = %plan_id, objectives = plan.selected_objectives.len(), "plan submitted");
        Ok(plan.clone())
    }

    pub async fn approve(
        &self,
        ctx: &UserContext,
        plan_id: PlanId,
        feedback: Option<String>,
    ) -> Result<PlanReview> {
        self.review(ctx, plan_id, ReviewStatus::Approved, feedback)
            .await
    }

    /// Reject a submitted plan. Unlike report rejection, plan rejection
    /// does not mandate feedback; the asymmetry is inherited from the
    /// upstream policy and kept on purpose.
    pub async fn reject(
        &self,
        ctx: &UserContext,
        plan_id: PlanId,
        feedback: Option<String>,
    ) -> Result<PlanReview> {
        self.review(ctx, plan_id, ReviewStatus::Rejected, feedback)
            .await
    }

    async fn review(
        &self,
        ctx: &UserContext,
        plan_id: PlanId,
        decision: ReviewStatus,
        feedback: Option<String>,
    ) -> Result<PlanReview> {
        if !ctx.can_evaluate() {
            warn!(user = %ctx.user_id, plan = %plan_id, "non-evaluator attempted a plan review");
            return Err(PlanningError::Forbidden(
                "only evaluators can review plans".to_string(),
            ));
        }

        let mut plans = self.plans.write().await;
        let plan = plans.get_mut(&plan_id).ok_or(PlanningError::NotFound("plan"))?;
        if plan.status != PlanStatus::Submitted {
            return Err(PlanningError::StateConflict {
                entity: "plan",
                from: plan.status.to_string(),
                action: match decision {
                    ReviewStatus::Approved => "approve",
                    ReviewStatus::Rejected => "reject",
                },
            });
        }

        let review = PlanReview {
            id: Uuid::new_v4(),
            plan_id,
            evaluator: ctx.user_id,
            status: decision,
            feedback: feedback.unwrap_or_default(),
            reviewed_at: Utc::now(),
        };

        plan.status = match decision {
            ReviewStatus::Approved => PlanStatus::Approved,
            ReviewStatus::Rejected => PlanStatus::Rejected,
        };
        plan.updated_at = review.reviewed_at;

        let mut reviews = self.reviews.write().await;
        reviews.push(review.clone());
        info!(plan = %plan_id, status = %plan.status, evaluator = %ctx.user_id, "plan reviewed");
        Ok(review)
    }
}
