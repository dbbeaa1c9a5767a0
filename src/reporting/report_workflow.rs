//! Report lifecycle and monitoring-and-evaluation data assembly.
//!
//! A report may only be created against an approved plan once its period has
//! elapsed. While in DRAFT (or after rejection) the planner records
//! achievements and budget utilization in bulk; each bulk write replaces the
//! report's previous entries wholesale so the payload is the single source
//! of truth. Submitted and approved reports are locked against data entry.

use bigdecimal::{BigDecimal, Zero};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::plan_workflow::PlanWorkflowService;
use super::{
    ActivityAchievement, PerformanceAchievement, Plan, PlanId, PlanStatus, PeriodResolver,
    Report, ReportId, ReportStatus, ReportType, SubActivityBudgetUtilization,
};
use crate::directory::{DirectoryService, OrgRole, UserContext};
use crate::planning::{
    ActivityId, MainActivity, MeasureId, PerformanceMeasure, PlanningService,
    StrategicInitiative, SubActivity, SubActivityId,
};
use crate::shared::error::{PlanningError, Result};

// ============================================================================
// Bulk Payloads
// ============================================================================

/// One achievement row in a bulk write; `item_id` is a performance-measure
/// or main-activity id depending on the endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementEntry {
    pub item_id: Uuid,
    pub achievement: f64,
    pub justification: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilizationEntry {
    pub sub_activity_id: SubActivityId,
    pub government_treasury_utilized: BigDecimal,
    pub sdg_funding_utilized: BigDecimal,
    pub partners_funding_utilized: BigDecimal,
    pub other_funding_utilized: BigDecimal,
}

impl UtilizationEntry {
    fn validate(&self) -> Result<()> {
        let zero = BigDecimal::zero();
        for (field, value) in [
            ("government_treasury_utilized", &self.government_treasury_utilized),
            ("sdg_funding_utilized", &self.sdg_funding_utilized),
            ("partners_funding_utilized", &self.partners_funding_utilized),
            ("other_funding_utilized", &self.other_funding_utilized),
        ] {
            if value < &zero {
                return Err(PlanningError::Validation(format!(
                    "{field} must not be negative"
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Report Data Views
// ============================================================================

/// The planned side of a report: every initiative, measure, activity and
/// sub-activity that contributes to the report's period, with the period
/// target each should be measured against.
#[derive(Debug, Clone, Serialize)]
pub struct PlanData {
    pub report_id: ReportId,
    pub report_type: ReportType,
    pub initiatives: Vec<InitiativeData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitiativeData {
    pub initiative: StrategicInitiative,
    pub objective_weight: f64,
    pub measures: Vec<MeasureTarget>,
    pub activities: Vec<ActivityTarget>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeasureTarget {
    pub measure: PerformanceMeasure,
    pub period_target: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityTarget {
    pub activity: MainActivity,
    pub period_target: f64,
    pub sub_activities: Vec<SubActivity>,
}

/// The measured side of a report: the same working set joined with recorded
/// achievements and utilization. Items without an entry yet appear with
/// zero achievement, not absent, so the entry grid is always complete.
#[derive(Debug, Clone, Serialize)]
pub struct MeData {
    pub report_id: ReportId,
    pub report_type: ReportType,
    pub measures: Vec<MeasureProgress>,
    pub activities: Vec<ActivityProgress>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeasureProgress {
    pub measure: PerformanceMeasure,
    pub period_target: f64,
    pub achievement: f64,
    pub achievement_percent: f64,
    pub justification: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityProgress {
    pub activity: MainActivity,
    pub period_target: f64,
    pub achievement: f64,
    pub achievement_percent: f64,
    pub justification: String,
    pub sub_activities: Vec<SubActivityProgress>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubActivityProgress {
    pub sub_activity: SubActivity,
    /// Sum of the four funding sources; utilization is measured against the
    /// money available, not against the cost estimate.
    pub total_budget: BigDecimal,
    pub total_utilized: BigDecimal,
    pub remaining_budget: BigDecimal,
}

fn percent_of(achievement: f64, target: f64) -> f64 {
    if target > 0.0 {
        achievement / target * 100.0
    } else {
        0.0
    }
}

// ============================================================================
// Service
// ============================================================================

#[derive(Clone)]
pub struct ReportWorkflowService {
    reports: Arc<RwLock<HashMap<ReportId, Report>>>,
    performance_achievements:
        Arc<RwLock<HashMap<(ReportId, MeasureId), PerformanceAchievement>>>,
    activity_achievements: Arc<RwLock<HashMap<(ReportId, ActivityId), ActivityAchievement>>>,
    budget_utilizations:
        Arc<RwLock<HashMap<(ReportId, SubActivityId), SubActivityBudgetUtilization>>>,
    plans: PlanWorkflowService,
    planning: PlanningService,
    resolver: PeriodResolver,
    directory: DirectoryService,
}

impl ReportWorkflowService {
    pub fn new(
        plans: PlanWorkflowService,
        planning: PlanningService,
        resolver: PeriodResolver,
        directory: DirectoryService,
    ) -> Self {
        Self {
            reports: Arc::new(RwLock::new(HashMap::new())),
            performance_achievements: Arc::new(RwLock::new(HashMap::new())),
            activity_achievements: Arc::new(RwLock::new(HashMap::new())),
            budget_utilizations: Arc::new(RwLock::new(HashMap::new())),
            plans,
            planning,
            resolver,
            directory,
        }
    }

    // ------------------------------------------------------------------
    // Creation and reads
    // ------------------------------------------------------------------

    pub async fn create_report(
        &self,
        ctx: &UserContext,
        plan_id: PlanId,
        report_type: ReportType,
    ) -> Result<Report> {
        self.create_report_at(ctx, plan_id, report_type, Utc::now().date_naive())
            .await
    }

    /// Creation with an explicit "today", so period gating is testable.
    pub(crate) async fn create_report_at(
        &self,
        ctx: &UserContext,
        plan_id: PlanId,
        report_type: ReportType,
        today: NaiveDate,
    ) -> Result<Report> {
        let plan = self.plans.plan(plan_id).await?;
        if ctx.role_in(plan.organization) != Some(OrgRole::Planner) {
            return Err(PlanningError::Forbidden(
                "only a planner of the organization can report on its plan".to_string(),
            ));
        }
        if plan.status != PlanStatus::Approved {
            return Err(PlanningError::PlanNotApproved);
        }

        let period_end = self
            .resolver
            .period_end(plan.from_date, plan.to_date, report_type);
        if today < period_end {
            return Err(PlanningError::ReportPeriodNotElapsed {
                report_type,
                period_end,
            });
        }

        let mut reports = self.reports.write().await;
        if let Some(existing) = reports
            .values()
            .find(|r| r.plan_id == plan_id && r.report_type == report_type)
        {
            // Draft and rejected reports are resumed, not duplicated.
            if existing.is_locked() {
                return Err(PlanningError::StateConflict {
                    entity: "report",
                    from: existing.status.to_string(),
                    action: "create",
                });
            }
            debug!(report = %existing.id, "resuming existing report");
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let report = Report {
            id: Uuid::new_v4(),
            plan_id,
            organization: plan.organization,
            report_type,
            status: ReportStatus::Draft,
            narrative_report: None,
            evaluator: None,
            evaluator_feedback: None,
            submitted_at: None,
            evaluated_at: None,
            created_at: now,
            updated_at: now,
        };
        reports.insert(report.id, report.clone());
        info!(report = %report.id, plan = %plan_id, period = %report_type, "report created");
        Ok(report)
    }

    pub async fn report(&self, id: ReportId) -> Result<Report> {
        let reports = self.reports.read().await;
        reports.get(&id).cloned().ok_or(PlanningError::NotFound("report"))
    }

    pub async fn get_report(&self, ctx: &UserContext, id: ReportId) -> Result<Report> {
        let report = self.report(id).await?;
        let tree = self.directory.tree().await;
        let scope = tree.visible_orgs(ctx, false)?;
        if !scope.permits(report.organization) {
            return Err(PlanningError::Forbidden(
                "report is outside your organization scope".to_string(),
            ));
        }
        Ok(report)
    }

    pub async fn list_reports(
        &self,
        ctx: &UserContext,
        status: Option<ReportStatus>,
    ) -> Result<Vec<Report>> {
        let tree = self.directory.tree().await;
        let scope = tree.visible_orgs(ctx, false)?;
        let reports = self.reports.read().await;
        let mut visible: Vec<_> = reports
            .values()
            .filter(|r| scope.permits(r.organization))
            .filter(|r| status.map(|s| r.status == s).unwrap_or(true))
            .cloned()
            .collect();
        visible.sort_by_key(|r| r.created_at);
        Ok(visible)
    }

    /// Attach or replace the narrative document name on an unlocked report.
    pub async fn set_narrative(&self, report_id: ReportId, file_name: String) -> Result<Report> {
        let mut reports = self.reports.write().await;
        let report = reports
            .get_mut(&report_id)
            .ok_or(PlanningError::NotFound("report"))?;
        if report.is_locked() {
            return Err(PlanningError::StateConflict {
                entity: "report",
                from: report.status.to_string(),
                action: "attach narrative",
            });
        }
        report.narrative_report = Some(file_name);
        report.updated_at = Utc::now();
        Ok(report.clone())
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    pub async fn submit(&self, ctx: &UserContext, report_id: ReportId) -> Result<Report> {
        let mut reports = self.reports.write().await;
        let report = reports
            .get_mut(&report_id)
            .ok_or(PlanningError::NotFound("report"))?;
        if ctx.role_in(report.organization) != Some(OrgRole::Planner) {
            return Err(PlanningError::Forbidden(
                "only a planner of the organization can submit its report".to_string(),
            ));
        }
        if report.status != ReportStatus::Draft {
            return Err(PlanningError::StateConflict {
                entity: "report",
                from: report.status.to_string(),
                action: "submit",
            });
        }
        let now = Utc::now();
        report.status = ReportStatus::Submitted;
        report.submitted_at = Some(now);
        report.updated_at = now;
        info!(report = %report_id, "report submitted");
        Ok(report.clone())
    }

    pub async fn approve(
        &self,
        ctx: &UserContext,
        report_id: ReportId,
        feedback: Option<String>,
    ) -> Result<Report> {
        if !ctx.can_evaluate() {
            return Err(PlanningError::Forbidden(
                "only evaluators can review reports".to_string(),
            ));
        }
        let mut reports = self.reports.write().await;
        let report = reports
            .get_mut(&report_id)
            .ok_or(PlanningError::NotFound("report"))?;
        if report.status != ReportStatus::Submitted {
            return Err(PlanningError::StateConflict {
                entity: "report",
                from: report.status.to_string(),
                action: "approve",
            });
        }
        let now = Utc::now();
        report.status = ReportStatus::Approved;
        report.evaluator = Some(ctx.user_id);
        report.evaluator_feedback = feedback;
        report.evaluated_at = Some(now);
        report.updated_at = now;
        info!(report = %report_id, evaluator = %ctx.user_id, "report approved");
        Ok(report.clone())
    }

    /// Reject a submitted report. Report rejection always carries feedback:
    /// the planner must know what to fix before resubmitting.
    pub async fn reject(
        &self,
        ctx: &UserContext,
        report_id: ReportId,
        feedback: String,
    ) -> Result<Report> {
        if !ctx.can_evaluate() {
            return Err(PlanningError::Forbidden(
                "only evaluators can review reports".to_string(),
            ));
        }
        if feedback.trim().is_empty() {
            return Err(PlanningError::Validation(
                "rejection feedback is required".to_string(),
            ));
        }
        let mut reports = self.reports.write().await;
        let report = reports
            .get_mut(&report_id)
            .ok_or(PlanningError::NotFound("report"))?;
        if report.status != ReportStatus::Submitted {
            return Err(PlanningError::StateConflict {
                entity: "report",
                from: report.status.to_string(),
                action: "reject",
            });
        }
        let now = Utc::now();
        report.status = ReportStatus::Rejected;
        report.evaluator = Some(ctx.user_id);
        report.evaluator_feedback = Some(feedback);
        report.evaluated_at = Some(now);
        report.updated_at = now;
        warn!(report = %report_id, evaluator = %ctx.user_id, "report rejected");
        Ok(report.clone())
    }

    /// Resubmit a rejected report after corrections. The previous
    /// evaluation trail (evaluator, feedback) stays on record until the
    /// next review overwrites it.
    pub async fn resubmit(&self, ctx: &UserContext, report_id: ReportId) -> Result<Report> {
        let mut reports = self.reports.write().await;
        let report = reports
            .get_mut(&report_id)
            .ok_or(PlanningError::NotFound("report"))?;
        if ctx.role_in(report.organization) != Some(OrgRole::Planner) {
            return Err(PlanningError::Forbidden(
                "only a planner of the organization can resubmit its report".to_string(),
            ));
        }
        if report.status != ReportStatus::Rejected {
            return Err(PlanningError::StateConflict {
                entity: "report",
                from: report.status.to_string(),
                action: "resubmit",
            });
        }
        let now = Utc::now();
        report.status = ReportStatus::Submitted;
        report.submitted_at = Some(now);
        report.evaluated_at = None;
        report.updated_at = now;
        info!(report = %report_id, "report resubmitted");
        Ok(report.clone())
    }

    // ------------------------------------------------------------------
    // Bulk data entry
    // ------------------------------------------------------------------

    async fn unlocked_report(&self, report_id: ReportId) -> Result<Report> {
        let report = self.report(report_id).await?;
        if report.is_locked() {
            return Err(PlanningError::StateConflict {
                entity: "report",
                from: report.status.to_string(),
                action: "record data",
            });
        }
        Ok(report)
    }

    /// Replace the report's performance-measure achievements with exactly
    /// the given entries. Existing rows keep their identity and creation
    /// time; rows absent from the payload are deleted.
    pub async fn record_performance_achievements(
        &self,
        report_id: ReportId,
        entries: Vec<AchievementEntry>,
    ) -> Result<Vec<PerformanceAchievement>> {
        self.unlocked_report(report_id).await?;
        for entry in &entries {
            self.planning.measure(entry.item_id).await?;
            if entry.achievement < 0.0 {
                return Err(PlanningError::Validation(
                    "achievement must not be negative".to_string(),
                ));
            }
        }

        // The whole reconciliation happens under one write lock so a reader
        // never observes a half-replaced set.
        let mut store = self.performance_achievements.write().await;
        let now = Utc::now();
        let previous: HashMap<MeasureId, PerformanceAchievement> = store
            .iter()
            .filter(|((rid, _), _)| *rid == report_id)
            .map(|((_, mid), a)| (*mid, a.clone()))
            .collect();
        store.retain(|(rid, _), _| *rid != report_id);

        let mut written = Vec::with_capacity(entries.len());
        for entry in entries {
            let (id, created_at) = previous
                .get(&entry.item_id)
                .map(|a| (a.id, a.created_at))
                .unwrap_or((Uuid::new_v4(), now));
            let achievement = PerformanceAchievement {
                id,
                report_id,
                performance_measure_id: entry.item_id,
                achievement: entry.achievement,
                justification: entry.justification,
                created_at,
                updated_at: now,
            };
            store.insert((report_id, entry.item_id), achievement.clone());
            written.push(achievement);
        }
        debug!(report = %report_id, rows = written.len(), "performance achievements reconciled");
        Ok(written)
    }

    /// Replace the report's main-activity achievements, same contract as
    /// the performance-measure variant.
    pub async fn record_activity_achievements(
        &self,
        report_id: ReportId,
        entries: Vec<AchievementEntry>,
    ) -> Result<Vec<ActivityAchievement>> {
        self.unlocked_report(report_id).await?;
        for entry in &entries {
            self.planning.activity(entry.item_id).await?;
            if entry.achievement < 0.0 {
                return Err(PlanningError::Validation(
                    "achievement must not be negative".to_string(),
                ));
            }
        }

        let mut store = self.activity_achievements.write().await;
        let now = Utc::now();
        let previous: HashMap<ActivityId, ActivityAchievement> = store
            .iter()
            .filter(|((rid, _), _)| *rid == report_id)
            .map(|((_, aid), a)| (*aid, a.clone()))
            .collect();
        store.retain(|(rid, _), _| *rid != report_id);

        let mut written = Vec::with_capacity(entries.len());
        for entry in entries {
            let (id, created_at) = previous
                .get(&entry.item_id)
                .map(|a| (a.id, a.created_at))
                .unwrap_or((Uuid::new_v4(), now));
            let achievement = ActivityAchievement {
                id,
                report_id,
                main_activity_id: entry.item_id,
                achievement: entry.achievement,
                justification: entry.justification,
                created_at,
                updated_at: now,
            };
            store.insert((report_id, entry.item_id), achievement.clone());
            written.push(achievement);
        }
        debug!(report = %report_id, rows = written.len(), "activity achievements reconciled");
        Ok(written)
    }

    /// Replace the report's budget-utilization rows.
    pub async fn record_budget_utilizations(
        &self,
        report_id: ReportId,
        entries: Vec<UtilizationEntry>,
    ) -> Result<Vec<SubActivityBudgetUtilization>> {
        self.unlocked_report(report_id).await?;
        for entry in &entries {
            self.planning.sub_activity(entry.sub_activity_id).await?;
            entry.validate()?;
        }

        let mut store = self.budget_utilizations.write().await;
        let now = Utc::now();
        let previous: HashMap<SubActivityId, SubActivityBudgetUtilization> = store
            .iter()
            .filter(|((rid, _), _)| *rid == report_id)
            .map(|((_, sid), u)| (*sid, u.clone()))
            .collect();
        store.retain(|(rid, _), _| *rid != report_id);

        let mut written = Vec::with_capacity(entries.len());
        for entry in entries {
            let (id, created_at) = previous
                .get(&entry.sub_activity_id)
                .map(|u| (u.id, u.created_at))
                .unwrap_or((Uuid::new_v4(), now));
            let utilization = SubActivityBudgetUtilization {
                id,
                report_id,
                sub_activity_id: entry.sub_activity_id,
                government_treasury_utilized: entry.government_treasury_utilized,
                sdg_funding_utilized: entry.sdg_funding_utilized,
                partners_funding_utilized: entry.partners_funding_utilized,
                other_funding_utilized: entry.other_funding_utilized,
                created_at,
                updated_at: now,
            };
            store.insert((report_id, entry.sub_activity_id), utilization.clone());
            written.push(utilization);
        }
        debug!(report = %report_id, rows = written.len(), "budget utilizations reconciled");
        Ok(written)
    }

    // ------------------------------------------------------------------
    // Data assembly
    // ------------------------------------------------------------------

    /// The working set for a report: initiatives of the plan's selected
    /// objectives, with the measures and activities that contribute to the
    /// report period. Organization-owned items are filtered to the plan's
    /// organization; shared defaults always apply.
    async fn working_set(
        &self,
        plan: &Plan,
        report_type: ReportType,
    ) -> Result<Vec<InitiativeData>> {
        let mut initiatives = Vec::new();
        for objective_id in &plan.selected_objectives {
            for initiative in self
                .planning
                .initiatives_for(*objective_id, Some(plan.organization))
                .await
            {
                let measures = self
                    .planning
                    .measures_for(initiative.id, Some(plan.organization))
                    .await
                    .into_iter()
                    .filter_map(|measure| {
                        self.resolver
                            .contribution(&measure.targets, report_type)
                            .map(|period_target| MeasureTarget {
                                measure,
                                period_target,
                            })
                    })
                    .collect::<Vec<_>>();

                let mut activities = Vec::new();
                for activity in self
                    .planning
                    .activities_for(initiative.id, Some(plan.organization))
                    .await
                {
                    let Some(period_target) =
                        self.resolver.contribution(&activity.targets, report_type)
                    else {
                        continue;
                    };
                    let sub_activities = self.planning.sub_activities_for(activity.id).await;
                    activities.push(ActivityTarget {
                        activity,
                        period_target,
                        sub_activities,
                    });
                }

                if measures.is_empty() && activities.is_empty() {
                    continue;
                }
                initiatives.push(InitiativeData {
                    objective_weight: plan.objective_weight(*objective_id),
                    initiative,
                    measures,
                    activities,
                });
            }
        }
        Ok(initiatives)
    }

    pub async fn plan_data(&self, report_id: ReportId) -> Result<PlanData> {
        let report = self.report(report_id).await?;
        let plan = self.plans.plan(report.plan_id).await?;
        let initiatives = self.working_set(&plan, report.report_type).await?;
        Ok(PlanData {
            report_id,
            report_type: report.report_type,
            initiatives,
        })
    }

    /// Monitoring-and-evaluation view: the working set joined with the
    /// recorded achievements and utilization.
    pub async fn me_data(&self, report_id: ReportId) -> Result<MeData> {
        let report = self.report(report_id).await?;
        let plan = self.plans.plan(report.plan_id).await?;
        let working_set = self.working_set(&plan, report.report_type).await?;

        let measure_achievements = self.performance_achievements.read().await;
        let activity_achievements = self.activity_achievements.read().await;
        let utilizations = self.budget_utilizations.read().await;

        let mut measures = Vec::new();
        let mut activities = Vec::new();
        for initiative in working_set {
            for target in initiative.measures {
                let (achievement, justification) = measure_achievements
                    .get(&(report_id, target.measure.id))
                    .map(|a| (a.achievement, a.justification.clone()))
                    .unwrap_or((0.0, String::new()));
                measures.push(MeasureProgress {
                    achievement_percent: percent_of(achievement, target.period_target),
                    measure: target.measure,
                    period_target: target.period_target,
                    achievement,
                    justification,
                });
            }

            for target in initiative.activities {
                let (achievement, justification) = activity_achievements
                    .get(&(report_id, target.activity.id))
                    .map(|a| (a.achievement, a.justification.clone()))
                    .unwrap_or((0.0, String::new()));

                let sub_activities = target
                    .sub_activities
                    .into_iter()
                    .map(|sub_activity| {
                        let total_budget = sub_activity.total_funding();
                        let total_utilized = utilizations
                            .get(&(report_id, sub_activity.id))
                            .map(|u| u.total_utilized())
                            .unwrap_or_else(BigDecimal::zero);
                        let remaining_budget = &total_budget - &total_utilized;
                        SubActivityProgress {
                            sub_activity,
                            total_budget,
                            total_utilized,
                            remaining_budget,
                        }
                    })
                    .collect();

                activities.push(ActivityProgress {
                    achievement_percent: percent_of(achievement, target.period_target),
                    activity: target.activity,
                    period_target: target.period_target,
                    achievement,
                    justification,
                    sub_activities,
                });
            }
        }

        Ok(MeData {
            report_id,
            report_type: report.report_type,
            measures,
            activities,
        })
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{OrgId, OrganizationType};
    use crate::planning::{
        ActivityType, BudgetCalculationType, NewInitiative, NewPlanItem, NewSubActivity,
        ObjectiveId, PeriodTargets, Quarter, StrategicObjective, TargetType,
    };
    use crate::reporting::plan_workflow::CreatePlanRequest;

    fn bd(value: i64) -> BigDecimal {
        BigDecimal::from(value)
    }

    struct Fixture {
        reports: ReportWorkflowService,
        planner: UserContext,
        evaluator: UserContext,
        plan_id: PlanId,
        measure_id: MeasureId,
        activity_id: ActivityId,
        sub_activity_id: SubActivityId,
    }

    /// Approved plan over FY 2024-07-01..2025-06-30, one objective with one
    /// initiative carrying a Q1-planned measure (target 40), a Q1-planned
    /// activity (annual 120) and a costed sub-activity (funding 800).
    async fn fixture() -> Fixture {
        let directory = DirectoryService::new();
        let org: OrgId = directory
            .create("Executive Wing", OrganizationType::ExecutiveWing, None)
            .await
            .unwrap()
            .id;
        let planner = UserContext::new(Uuid::new_v4()).with_role(org, OrgRole::Planner);
        let evaluator = UserContext::new(Uuid::new_v4()).with_role(org, OrgRole::Evaluator);

        let planning = PlanningService::new();
        let objective: ObjectiveId = planning
            .register_objective(StrategicObjective::new("Objective", 100.0, true))
            .await
            .unwrap()
            .id;
        let initiative = planning
            .create_initiative(NewInitiative {
                objective_id: objective,
                name: "Initiative".to_string(),
                weight: 100.0,
                organization: Some(org),
                is_default: false,
            })
            .await
            .unwrap();

        let mut measure_targets = PeriodTargets::annual_only(TargetType::Incremental, 0.0);
        measure_targets.q1_target = Some(40.0);
        measure_targets.selected_quarters.insert(Quarter::Q1);
        let measure = planning
            .create_measure(NewPlanItem {
                initiative_id: initiative.id,
                name: "Coverage".to_string(),
                weight: 35.0,
                organization: Some(org),
                targets: measure_targets,
            })
            .await
            .unwrap();

        let mut activity_targets = PeriodTargets::annual_only(TargetType::Incremental, 120.0);
        activity_targets.selected_quarters.insert(Quarter::Q1);
        let activity = planning
            .create_activity(NewPlanItem {
                initiative_id: initiative.id,
                name: "Outreach".to_string(),
                weight: 65.0,
                organization: Some(org),
                targets: activity_targets,
            })
            .await
            .unwrap();

        let sub_activity = planning
            .create_sub_activity(NewSubActivity {
                main_activity_id: activity.id,
                name: "Field visits".to_string(),
                activity_type: ActivityType::Supervision,
                description: None,
                budget_calculation_type: BudgetCalculationType::WithoutTool,
                estimated_cost_with_tool: bd(0),
                estimated_cost_without_tool: bd(1000),
                government_treasury: bd(800),
                sdg_funding: bd(0),
                partners_funding: bd(0),
                other_funding: bd(0),
            })
            .await
            .unwrap();

        let plans = PlanWorkflowService::new(planning.clone(), directory.clone());
        let plan = plans
            .create_plan(
                &planner,
                CreatePlanRequest {
                    organization: org,
                    planner_name: "A. Planner".to_string(),
                    plan_type: "LEO/EO Plan".to_string(),
                    fiscal_year: "2017 EFY".to_string(),
                    from_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
                    to_date: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
                    selected_objectives: vec![objective],
                    selected_objectives_weights: HashMap::from([(objective, 100.0)]),
                },
            )
            .await
            .unwrap();
        plans.submit(&planner, plan.id).await.unwrap();
        plans.approve(&evaluator, plan.id, None).await.unwrap();

        let reports = ReportWorkflowService::new(
            plans,
            planning,
            PeriodResolver::default(),
            directory,
        );
        Fixture {
            reports,
            planner,
            evaluator,
            plan_id: plan.id,
            measure_id: measure.id,
            activity_id: activity.id,
            sub_activity_id: sub_activity.id,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn q1_report(f: &Fixture) -> Report {
        f.reports
            .create_report_at(&f.planner, f.plan_id, ReportType::Q1, day(2024, 10, 15))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn report_waits_for_the_period_to_elapse() {
        let f = fixture().await;

        let err = f
            .reports
            .create_report_at(&f.planner, f.plan_id, ReportType::Q1, day(2024, 7, 2))
            .await
            .unwrap_err();
        match err {
            PlanningError::ReportPeriodNotElapsed { period_end, .. } => {
                assert_eq!(period_end, day(2024, 10, 1));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let report = f
            .reports
            .create_report_at(&f.planner, f.plan_id, ReportType::Q1, day(2024, 10, 1))
            .await
            .unwrap();
        assert_eq!(report.status, ReportStatus::Draft);
    }

    #[tokio::test]
    async fn draft_report_is_resumed_not_duplicated() {
        let f = fixture().await;
        let first = q1_report(&f).await;
        let second = q1_report(&f).await;
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn report_requires_an_approved_plan() {
        let directory = DirectoryService::new();
        let org = directory
            .create("Wing", OrganizationType::ExecutiveWing, None)
            .await
            .unwrap()
            .id;
        let planner = UserContext::new(Uuid::new_v4()).with_role(org, OrgRole::Planner);

        let planning = PlanningService::new();
        let objective = planning
            .register_objective(StrategicObjective::new("Objective", 100.0, true))
            .await
            .unwrap()
            .id;
        let plans = PlanWorkflowService::new(planning.clone(), directory.clone());
        let plan = plans
            .create_plan(
                &planner,
                CreatePlanRequest {
                    organization: org,
                    planner_name: "A. Planner".to_string(),
                    plan_type: "LEO/EO Plan".to_string(),
                    fiscal_year: "2017 EFY".to_string(),
                    from_date: day(2024, 7, 1),
                    to_date: day(2025, 6, 30),
                    selected_objectives: vec![objective],
                    selected_objectives_weights: HashMap::from([(objective, 100.0)]),
                },
            )
            .await
            .unwrap();

        let reports =
            ReportWorkflowService::new(plans, planning, PeriodResolver::default(), directory);
        let err = reports
            .create_report_at(&planner, plan.id, ReportType::Q1, day(2025, 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, PlanningError::PlanNotApproved));
    }

    #[tokio::test]
    async fn rejection_requires_feedback_and_resubmit_recovers() {
        let f = fixture().await;
        let report = q1_report(&f).await;
        f.reports.submit(&f.planner, report.id).await.unwrap();

        let err = f
            .reports
            .reject(&f.evaluator, report.id, "  ".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, PlanningError::Validation(_)));

        f.reports
            .reject(&f.evaluator, report.id, "targets not justified".to_string())
            .await
            .unwrap();
        let rejected = f.reports.report(report.id).await.unwrap();
        assert_eq!(rejected.status, ReportStatus::Rejected);
        assert!(rejected.evaluated_at.is_some());

        let resubmitted = f.reports.resubmit(&f.planner, report.id).await.unwrap();
        assert_eq!(resubmitted.status, ReportStatus::Submitted);
        assert!(resubmitted.evaluated_at.is_none());

        let approved = f
            .reports
            .approve(&f.evaluator, report.id, Some("ok".to_string()))
            .await
            .unwrap();
        assert_eq!(approved.status, ReportStatus::Approved);
    }

    #[tokio::test]
    async fn locked_report_refuses_data_entry() {
        let f = fixture().await;
        let report = q1_report(&f).await;
        f.reports.submit(&f.planner, report.id).await.unwrap();

        let err = f
            .reports
            .record_performance_achievements(
                report.id,
                vec![AchievementEntry {
                    item_id: f.measure_id,
                    achievement: 10.0,
                    justification: String::new(),
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PlanningError::StateConflict { .. }));
    }

    #[tokio::test]
    async fn bulk_reconciliation_is_idempotent_and_replaces() {
        let f = fixture().await;
        let report = q1_report(&f).await;

        let entry = |achievement| AchievementEntry {
            item_id: f.measure_id,
            achievement,
            justification: "field data".to_string(),
        };

        let first = f
            .reports
            .record_performance_achievements(report.id, vec![entry(30.0)])
            .await
            .unwrap();
        // Same payload again: same row identity, same values.
        let second = f
            .reports
            .record_performance_achievements(report.id, vec![entry(30.0)])
            .await
            .unwrap();
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(first[0].created_at, second[0].created_at);

        // Updated payload keeps identity; empty payload deletes.
        let third = f
            .reports
            .record_performance_achievements(report.id, vec![entry(35.0)])
            .await
            .unwrap();
        assert_eq!(third[0].id, first[0].id);
        assert_eq!(third[0].achievement, 35.0);

        f.reports
            .record_performance_achievements(report.id, vec![])
            .await
            .unwrap();
        let me = f.reports.me_data(report.id).await.unwrap();
        assert_eq!(me.measures[0].achievement, 0.0);
    }

    #[tokio::test]
    async fn unknown_items_and_negative_values_are_rejected() {
        let f = fixture().await;
        let report = q1_report(&f).await;

        let err = f
            .reports
            .record_activity_achievements(
                report.id,
                vec![AchievementEntry {
                    item_id: Uuid::new_v4(),
                    achievement: 1.0,
                    justification: String::new(),
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PlanningError::NotFound(_)));

        let err = f
            .reports
            .record_budget_utilizations(
                report.id,
                vec![UtilizationEntry {
                    sub_activity_id: f.sub_activity_id,
                    government_treasury_utilized: bd(-1),
                    sdg_funding_utilized: bd(0),
                    partners_funding_utilized: bd(0),
                    other_funding_utilized: bd(0),
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PlanningError::Validation(_)));
    }

    #[tokio::test]
    async fn plan_data_carries_period_targets() {
        let f = fixture().await;
        let report = q1_report(&f).await;

        let data = f.reports.plan_data(report.id).await.unwrap();
        assert_eq!(data.initiatives.len(), 1);
        let initiative = &data.initiatives[0];
        assert_eq!(initiative.objective_weight, 100.0);
        // Quarterly target wins for the measure; annual /4 for the activity.
        assert_eq!(initiative.measures[0].period_target, 40.0);
        assert_eq!(initiative.activities[0].period_target, 30.0);
        assert_eq!(initiative.activities[0].sub_activities.len(), 1);
    }

    #[tokio::test]
    async fn me_data_joins_achievements_and_utilization() {
        let f = fixture().await;
        let report = q1_report(&f).await;

        f.reports
            .record_performance_achievements(
                report.id,
                vec![AchievementEntry {
                    item_id: f.measure_id,
                    achievement: 30.0,
                    justification: "survey round".to_string(),
                }],
            )
            .await
            .unwrap();
        f.reports
            .record_activity_achievements(
                report.id,
                vec![AchievementEntry {
                    item_id: f.activity_id,
                    achievement: 15.0,
                    justification: String::new(),
                }],
            )
            .await
            .unwrap();
        f.reports
            .record_budget_utilizations(
                report.id,
                vec![UtilizationEntry {
                    sub_activity_id: f.sub_activity_id,
                    government_treasury_utilized: bd(500),
                    sdg_funding_utilized: bd(0),
                    partners_funding_utilized: bd(100),
                    other_funding_utilized: bd(0),
                }],
            )
            .await
            .unwrap();

        let me = f.reports.me_data(report.id).await.unwrap();

        let measure = &me.measures[0];
        assert_eq!(measure.achievement, 30.0);
        assert_eq!(measure.achievement_percent, 75.0);
        assert_eq!(measure.justification, "survey round");

        let activity = &me.activities[0];
        assert_eq!(activity.achievement, 15.0);
        assert_eq!(activity.achievement_percent, 50.0);

        let sub = &activity.sub_activities[0];
        assert_eq!(sub.total_budget, bd(800));
        assert_eq!(sub.total_utilized, bd(600));
        assert_eq!(sub.remaining_budget, bd(200));
    }
}
