//! Application state wiring.
//!
//! One `AppState` owns every service; all of them share the same underlying
//! stores through cheap clones, so a state clone is a handle, not a copy.

use crate::analytics::AnalyticsService;
use crate::directory::DirectoryService;
use crate::planning::{BudgetEngine, PlanningService, WeightEngine};
use crate::reporting::{
    FiscalCalendar, PeriodResolver, PlanWorkflowService, ReportWorkflowService,
};
use crate::shared::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub directory: DirectoryService,
    pub planning: PlanningService,
    pub weights: WeightEngine,
    pub budgets: BudgetEngine,
    pub plans: PlanWorkflowService,
    pub reports: ReportWorkflowService,
    pub analytics: AnalyticsService,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let directory = DirectoryService::new();
        let planning = PlanningService::new();
        let weights = WeightEngine::new(planning.clone());
        let budgets = BudgetEngine::new(planning.clone());
        let plans = PlanWorkflowService::new(planning.clone(), directory.clone());
        let resolver = PeriodResolver::new(FiscalCalendar::from_config(&config.fiscal));
        let reports = ReportWorkflowService::new(
            plans.clone(),
            planning.clone(),
            resolver,
            directory.clone(),
        );
        let analytics = AnalyticsService::new(
            directory.clone(),
            planning.clone(),
            plans.clone(),
            reports.clone(),
        );
        Self {
            config,
            directory,
            planning,
            weights,
            budgets,
            plans,
            reports,
            analytics,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn state_services_share_stores() {
        let state = AppState::default();
        let org = state
            .directory
            .create(
                "Ministry",
                crate::directory::OrganizationType::Minister,
                None,
            )
            .await
            .unwrap();

        // The same directory is visible through a cloned handle.
        let clone = state.clone();
        assert_eq!(clone.directory.get(org.id).await.unwrap().name, "Ministry");
    }
}
