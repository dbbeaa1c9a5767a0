//! Executive Analytics Module
//!
//! Read-only rollups over plans, budgets and reports. Every figure is
//! computed inside the caller's organization scope; a Minister admin sees
//! ministry-wide numbers, any other admin sees its own subtree.

use bigdecimal::{BigDecimal, Zero};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::directory::{DirectoryService, OrgId, OrgRole, UserContext};
use crate::planning::{ActivityType, PlanningService};
use crate::reporting::{PlanStatus, PlanWorkflowService, ReportStatus, ReportWorkflowService};
use crate::shared::error::{PlanningError, Result};

// ============================================================================
// Rollup Shapes
// ============================================================================

/// Planned budget and funding totals over the sub-activities of every
/// organization with a submitted or approved plan in scope.
#[derive(Debug, Clone, Serialize, Default)]
pub struct BudgetTotals {
    pub total_with_tool: BigDecimal,
    pub total_without_tool: BigDecimal,
    pub government_treasury: BigDecimal,
    pub sdg_funding: BigDecimal,
    pub partners_funding: BigDecimal,
    pub other_funding: BigDecimal,
}

impl BudgetTotals {
    pub fn total_funding(&self) -> BigDecimal {
        &self.government_treasury + &self.sdg_funding + &self.partners_funding + &self.other_funding
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ActivityTypeStat {
    pub count: usize,
    /// Effective planned cost under each sub-activity's costing mode.
    pub budget: BigDecimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminAnalytics {
    /// True when the caller is a Minister admin and nothing was filtered.
    pub ministry_wide: bool,
    pub total_plans: usize,
    pub pending_plans: usize,
    pub approved_plans: usize,
    pub rejected_plans: usize,
    pub budget: BudgetTotals,
    pub by_activity_type: HashMap<ActivityType, ActivityTypeStat>,
}

/// Per-organization progress snapshot for the performance dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct OrgPerformance {
    pub organization: OrgId,
    pub organization_name: String,
    pub reports: usize,
    /// Mean achievement against period targets across every reported
    /// measure and activity, as a percentage.
    pub achievement_percent: f64,
    /// Utilized share of the available funding, as a percentage. Zero when
    /// no funding is available.
    pub utilization_percent: f64,
}

// ============================================================================
// Service
// ============================================================================

#[derive(Clone)]
pub struct AnalyticsService {
    directory: DirectoryService,
    planning: PlanningService,
    plans: PlanWorkflowService,
    reports: ReportWorkflowService,
}

impl AnalyticsService {
    pub fn new(
        directory: DirectoryService,
        planning: PlanningService,
        plans: PlanWorkflowService,
        reports: ReportWorkflowService,
    ) -> Self {
        Self {
            directory,
            planning,
            plans,
            reports,
        }
    }

    /// Plan-pipeline and budget rollup for an admin dashboard.
    pub async fn admin_analytics(&self, ctx: &UserContext) -> Result<AdminAnalytics> {
        if !ctx.has_role(OrgRole::Admin) {
            return Err(PlanningError::Forbidden(
                "analytics are restricted to admins".to_string(),
            ));
        }
        let tree = self.directory.tree().await;
        let scope = tree.visible_orgs(ctx, false)?;

        let plans = self.plans.list_plans(ctx, None).await?;
        let count_by = |status: PlanStatus| plans.iter().filter(|p| p.status == status).count();
        let pending_plans = count_by(PlanStatus::Submitted);
        let approved_plans = count_by(PlanStatus::Approved);
        let rejected_plans = count_by(PlanStatus::Rejected);

        // Budget figures only count organizations whose plan has reached
        // review; drafts are still in flux.
        let reporting_orgs: HashSet<OrgId> = plans
            .iter()
            .filter(|p| matches!(p.status, PlanStatus::Submitted | PlanStatus::Approved))
            .map(|p| p.organization)
            .collect();

        let mut budget = BudgetTotals::default();
        let mut by_activity_type: HashMap<ActivityType, ActivityTypeStat> = HashMap::new();
        for activity in self.planning.activities_in_orgs(&reporting_orgs).await {
            for sub_activity in self.planning.sub_activities_for(activity.id).await {
                budget.total_with_tool += &sub_activity.estimated_cost_with_tool;
                budget.total_without_tool += &sub_activity.estimated_cost_without_tool;
                budget.government_treasury += &sub_activity.government_treasury;
                budget.sdg_funding += &sub_activity.sdg_funding;
                budget.partners_funding += &sub_activity.partners_funding;
                budget.other_funding += &sub_activity.other_funding;

                let stat = by_activity_type
                    .entry(sub_activity.activity_type)
                    .or_default();
                stat.count += 1;
                stat.budget += sub_activity.estimated_cost();
            }
        }

        info!(
            user = %ctx.user_id,
            plans = plans.len(),
            orgs = reporting_orgs.len(),
            "admin analytics computed"
        );
        Ok(AdminAnalytics {
            ministry_wide: scope.is_unrestricted(),
            total_plans: plans.len(),
            pending_plans,
            approved_plans,
            rejected_plans,
            budget,
            by_activity_type,
        })
    }

    /// Achievement and budget-utilization percentages per organization in
    /// the caller's scope, aggregated over approved reports only; figures
    /// still under review would churn.
    pub async fn organization_performance(&self, ctx: &UserContext) -> Result<Vec<OrgPerformance>> {
        let reports = self
            .reports
            .list_reports(ctx, Some(ReportStatus::Approved))
            .await?;

        let mut by_org: HashMap<OrgId, Vec<_>> = HashMap::new();
        for report in reports {
            by_org.entry(report.organization).or_default().push(report);
        }

        let mut performance = Vec::with_capacity(by_org.len());
        for (org_id, org_reports) in by_org {
            let organization = self.directory.get(org_id).await?;

            let mut percent_sum = 0.0;
            let mut percent_count = 0usize;
            let mut available = BigDecimal::zero();
            let mut utilized = BigDecimal::zero();
            let report_count = org_reports.len();
            for report in org_reports {
                let me = self.reports.me_data(report.id).await?;
                for measure in &me.measures {
                    percent_sum += measure.achievement_percent;
                    percent_count += 1;
                }
                for activity in &me.activities {
                    percent_sum += activity.achievement_percent;
                    percent_count += 1;
                    for sub in &activity.sub_activities {
                        available += &sub.total_budget;
                        utilized += &sub.total_utilized;
                    }
                }
            }

            let achievement_percent = if percent_count > 0 {
                percent_sum / percent_count as f64
            } else {
                0.0
            };
            let utilization_percent = ratio_percent(&utilized, &available);

            performance.push(OrgPerformance {
                organization: org_id,
                organization_name: organization.name,
                reports: report_count,
                achievement_percent,
                utilization_percent,
            });
        }
        performance.sort_by(|a, b| a.organization_name.cmp(&b.organization_name));
        Ok(performance)
    }
}

/// `part / whole * 100` with a lossy decimal-to-float step; dashboard
/// percentages do not need exact decimal arithmetic.
fn ratio_percent(part: &BigDecimal, whole: &BigDecimal) -> f64 {
    use bigdecimal::ToPrimitive;
    if whole <= &BigDecimal::zero() {
        return 0.0;
    }
    let ratio = (part * BigDecimal::from(10_000u32)) / whole;
    ratio.to_f64().unwrap_or(0.0) / 100.0
}
