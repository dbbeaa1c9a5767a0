//! Cost, funding and gap computation for sub-activities, with plain-sum
//! rollups to their main activity.
//!
//! Two different "totals" exist and must not be conflated: `estimated_cost`
//! is the planned cost (one of the two estimates, chosen by the costing
//! mode), while `total_funding` is the money actually available from the
//! four sources. The funding gap compares the two; utilization reporting
//! only ever compares against `total_funding`.

use bigdecimal::{BigDecimal, Zero};
use serde::Serialize;

use super::{ActivityId, PlanningService, SubActivity};
use crate::planning::BudgetCalculationType;
use crate::shared::error::{PlanningError, Result};

impl SubActivity {
    /// The planned cost under the chosen costing mode.
    pub fn estimated_cost(&self) -> &BigDecimal {
        match self.budget_calculation_type {
            BudgetCalculationType::WithTool => &self.estimated_cost_with_tool,
            BudgetCalculationType::WithoutTool => &self.estimated_cost_without_tool,
        }
    }

    /// Sum of the four funding sources.
    pub fn total_funding(&self) -> BigDecimal {
        &self.government_treasury + &self.sdg_funding + &self.partners_funding + &self.other_funding
    }

    /// Planned cost minus available funding, floored at zero.
    pub fn funding_gap(&self) -> BigDecimal {
        let gap = self.estimated_cost() - self.total_funding();
        if gap < BigDecimal::zero() {
            BigDecimal::zero()
        } else {
            gap
        }
    }
}

/// Write-path validation for a sub-activity's budget block. Funding may
/// never exceed the effective cost; the comparison is strict, no epsilon.
pub fn validate_sub_activity(sub_activity: &SubActivity) -> Result<()> {
    let zero = BigDecimal::zero();
    for (field, value) in [
        ("estimated_cost_with_tool", &sub_activity.estimated_cost_with_tool),
        ("estimated_cost_without_tool", &sub_activity.estimated_cost_without_tool),
        ("government_treasury", &sub_activity.government_treasury),
        ("sdg_funding", &sub_activity.sdg_funding),
        ("partners_funding", &sub_activity.partners_funding),
        ("other_funding", &sub_activity.other_funding),
    ] {
        if value < &zero {
            return Err(PlanningError::Validation(format!(
                "{field} must not be negative"
            )));
        }
    }

    let with_tool = &sub_activity.estimated_cost_with_tool;
    let without_tool = &sub_activity.estimated_cost_without_tool;
    if with_tool <= &zero && without_tool <= &zero {
        return Err(PlanningError::NoPositiveCost);
    }

    let funding = sub_activity.total_funding();
    let cost = sub_activity.estimated_cost();
    if &funding > cost {
        return Err(PlanningError::FundingExceedsCost {
            funding,
            cost: cost.clone(),
        });
    }
    Ok(())
}

/// Budget rollup for one main activity: plain sums over its sub-activities,
/// no weighting.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityBudget {
    pub total_budget: BigDecimal,
    pub total_funding: BigDecimal,
    pub funding_gap: BigDecimal,
}

#[derive(Clone)]
pub struct BudgetEngine {
    store: PlanningService,
}

impl BudgetEngine {
    pub fn new(store: PlanningService) -> Self {
        Self { store }
    }

    pub async fn activity_budget(&self, activity_id: ActivityId) -> Result<ActivityBudget> {
        self.store.activity(activity_id).await?;
        let sub_activities = self.store.sub_activities_for(activity_id).await;

        let mut rollup = ActivityBudget {
            total_budget: BigDecimal::zero(),
            total_funding: BigDecimal::zero(),
            funding_gap: BigDecimal::zero(),
        };
        for sub_activity in &sub_activities {
            rollup.total_budget += sub_activity.estimated_cost();
            rollup.total_funding += sub_activity.total_funding();
            rollup.funding_gap += sub_activity.funding_gap();
        }
        Ok(rollup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planning::{
        ActivityType, NewInitiative, NewPlanItem, NewSubActivity, PeriodTargets, Quarter,
        StrategicObjective, TargetType,
    };

    fn bd(value: i64) -> BigDecimal {
        BigDecimal::from(value)
    }

    fn sub_activity(
        cost_mode: BudgetCalculationType,
        with_tool: i64,
        without_tool: i64,
        funding: [i64; 4],
    ) -> SubActivity {
        let now = chrono::Utc::now();
        SubActivity {
            id: uuid::Uuid::new_v4(),
            main_activity_id: uuid::Uuid::new_v4(),
            name: "Train regional staff".to_string(),
            activity_type: ActivityType::Training,
            description: None,
            budget_calculation_type: cost_mode,
            estimated_cost_with_tool: bd(with_tool),
            estimated_cost_without_tool: bd(without_tool),
            government_treasury: bd(funding[0]),
            sdg_funding: bd(funding[1]),
            partners_funding: bd(funding[2]),
            other_funding: bd(funding[3]),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn cost_follows_costing_mode() {
        let sa = sub_activity(BudgetCalculationType::WithTool, 1500, 1000, [0, 0, 0, 0]);
        assert_eq!(sa.estimated_cost(), &bd(1500));

        let sa = sub_activity(BudgetCalculationType::WithoutTool, 1500, 1000, [0, 0, 0, 0]);
        assert_eq!(sa.estimated_cost(), &bd(1000));
    }

    #[test]
    fn funding_gap_floors_at_zero() {
        let sa = sub_activity(BudgetCalculationType::WithoutTool, 0, 1000, [300, 200, 100, 0]);
        assert_eq!(sa.total_funding(), bd(600));
        assert_eq!(sa.funding_gap(), bd(400));

        let fully_funded =
            sub_activity(BudgetCalculationType::WithoutTool, 0, 1000, [500, 500, 0, 0]);
        assert_eq!(fully_funded.funding_gap(), bd(0));
    }

    #[test]
    fn validation_rejects_overfunding_and_zero_cost() {
        let sa = sub_activity(BudgetCalculationType::WithoutTool, 0, 1000, [600, 600, 0, 0]);
        match validate_sub_activity(&sa).unwrap_err() {
            PlanningError::FundingExceedsCost { funding, cost } => {
                assert_eq!(funding, bd(1200));
                assert_eq!(cost, bd(1000));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let sa = sub_activity(BudgetCalculationType::WithTool, 0, 0, [0, 0, 0, 0]);
        assert!(matches!(
            validate_sub_activity(&sa).unwrap_err(),
            PlanningError::NoPositiveCost
        ));

        // Exact funding == cost passes; the comparison is strict.
        let sa = sub_activity(BudgetCalculationType::WithoutTool, 0, 1000, [1000, 0, 0, 0]);
        validate_sub_activity(&sa).unwrap();
    }

    #[tokio::test]
    async fn activity_rollup_is_a_plain_sum() {
        let store = PlanningService::new();
        let objective = store
            .register_objective(StrategicObjective::new("Objective", 30.0, true))
            .await
            .unwrap();
        let initiative = store
            .create_initiative(NewInitiative {
                objective_id: objective.id,
                name: "Initiative".to_string(),
                weight: 30.0,
                organization: None,
                is_default: true,
            })
            .await
            .unwrap();
        let mut targets = PeriodTargets::annual_only(TargetType::Incremental, 10.0);
        targets.selected_quarters.insert(Quarter::Q1);
        let activity = store
            .create_activity(NewPlanItem {
                initiative_id: initiative.id,
                name: "Activity".to_string(),
                weight: 19.5,
                organization: None,
                targets,
            })
            .await
            .unwrap();

        for (cost, treasury) in [(1000, 800), (500, 500)] {
            store
                .create_sub_activity(NewSubActivity {
                    main_activity_id: activity.id,
                    name: format!("sub {cost}"),
                    activity_type: ActivityType::Workshop,
                    description: None,
                    budget_calculation_type: BudgetCalculationType::WithoutTool,
                    estimated_cost_with_tool: bd(0),
                    estimated_cost_without_tool: bd(cost),
                    government_treasury: bd(treasury),
                    sdg_funding: bd(0),
                    partners_funding: bd(0),
                    other_funding: bd(0),
                })
                .await
                .unwrap();
        }

        let engine = BudgetEngine::new(store);
        let rollup = engine.activity_budget(activity.id).await.unwrap();
        assert_eq!(rollup.total_budget, bd(1500));
        assert_eq!(rollup.total_funding, bd(1300));
        assert_eq!(rollup.funding_gap, bd(200));
    }
}
