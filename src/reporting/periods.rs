//! Reporting-period resolution.
//!
//! A report type names a set of fiscal quarters; quarters map to months of
//! the organization's fiscal calendar (fiscal Q1 starts in July by default,
//! so Q1 = JUL/AUG/SEP). Plan items declare their targets either
//! per-quarter or annually; the resolver derives the target value a given
//! report period should be measured against.

use chrono::{Months, NaiveDate};
use tracing::warn;

use super::ReportType;
use crate::planning::{Month, PeriodTargets, Quarter};
use crate::shared::config::FiscalConfig;

/// Quarter-to-month mapping driven by the fiscal year start month.
#[derive(Debug, Clone, Copy)]
pub struct FiscalCalendar {
    start_month: u32,
}

impl FiscalCalendar {
    /// Out-of-range months are clamped into 1..=12, the same guard the
    /// config loader applies, so `months_of` can never underflow.
    pub fn new(start_month: u32) -> Self {
        let clamped = start_month.clamp(1, 12);
        if clamped != start_month {
            warn!(start_month, "fiscal start month out of range, clamped");
        }
        Self {
            start_month: clamped,
        }
    }

    pub fn from_config(config: &FiscalConfig) -> Self {
        Self::new(config.start_month)
    }

    /// The three calendar months a fiscal quarter covers.
    pub fn months_of(&self, quarter: Quarter) -> [Month; 3] {
        let offset = quarter.index() * 3;
        let month_at = |i: u32| {
            let calendar = (self.start_month - 1 + offset + i) % 12 + 1;
            Month::from_calendar(calendar).expect("calendar month in 1..=12")
        };
        [month_at(0), month_at(1), month_at(2)]
    }
}

impl Default for FiscalCalendar {
    fn default() -> Self {
        Self::new(7)
    }
}

impl ReportType {
    /// The fiscal quarters a report of this type covers.
    pub fn quarters(self) -> &'static [Quarter] {
        match self {
            ReportType::Q1 => &[Quarter::Q1],
            ReportType::Q2 => &[Quarter::Q2],
            ReportType::Q3 => &[Quarter::Q3],
            ReportType::Q4 => &[Quarter::Q4],
            ReportType::SixMonth => &[Quarter::Q1, Quarter::Q2],
            ReportType::NineMonth => &[Quarter::Q1, Quarter::Q2, Quarter::Q3],
            ReportType::Yearly => &Quarter::ALL,
        }
    }

    /// Months into the plan year after which this report may be filed.
    /// YEARLY has no fixed offset; it waits for the plan's end date.
    fn months_until_end(self) -> Option<u32> {
        match self {
            ReportType::Q1 => Some(3),
            ReportType::Q2 | ReportType::SixMonth => Some(6),
            ReportType::Q3 | ReportType::NineMonth => Some(9),
            ReportType::Q4 => Some(12),
            ReportType::Yearly => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PeriodResolver {
    calendar: FiscalCalendar,
}

impl PeriodResolver {
    pub fn new(calendar: FiscalCalendar) -> Self {
        Self { calendar }
    }

    /// An item belongs to a report period when any of the period's quarters
    /// is selected, or any month of those quarters is selected. Items not
    /// planned for the period are absent from the report entirely, not
    /// zero-valued.
    pub fn is_planned_for_period(&self, targets: &PeriodTargets, report_type: ReportType) -> bool {
        let quarters = report_type.quarters();
        if quarters
            .iter()
            .any(|q| targets.selected_quarters.contains(q))
        {
            return true;
        }
        quarters
            .iter()
            .flat_map(|q| self.calendar.months_of(*q))
            .any(|m| targets.selected_months.contains(&m))
    }

    /// Target value for the period. Quarterly targets win when any is set
    /// and positive: the period target is the sum over the period's
    /// quarters, absent when all of those are zero/unset. Otherwise the
    /// annual target is pro-rated: /4 per quarter, /2 for 6M, *3/4 for 9M.
    pub fn target_for_period(
        &self,
        targets: &PeriodTargets,
        report_type: ReportType,
    ) -> Option<f64> {
        if !self.is_planned_for_period(targets, report_type) {
            return None;
        }

        if targets.has_quarterly() {
            let quarters = report_type.quarters();
            let values: Vec<f64> = quarters
                .iter()
                .map(|q| targets.quarter_target(*q).unwrap_or(0.0))
                .collect();
            if values.iter().any(|v| *v != 0.0) {
                return Some(values.iter().sum());
            }
            return None;
        }

        let annual = targets.annual_target.filter(|a| *a != 0.0)?;
        Some(match report_type {
            ReportType::Yearly => annual,
            ReportType::Q1 | ReportType::Q2 | ReportType::Q3 | ReportType::Q4 => annual / 4.0,
            ReportType::SixMonth => annual / 2.0,
            ReportType::NineMonth => annual * 3.0 / 4.0,
        })
    }

    /// The combined contract reporting uses: an item contributes to a
    /// report only when it is planned for the period and the derived
    /// target is positive.
    pub fn contribution(&self, targets: &PeriodTargets, report_type: ReportType) -> Option<f64> {
        self.target_for_period(targets, report_type)
            .filter(|t| *t > 0.0)
    }

    /// First date a report of this type may be created for a plan year.
    pub fn period_end(
        &self,
        plan_from: NaiveDate,
        plan_to: NaiveDate,
        report_type: ReportType,
    ) -> NaiveDate {
        match report_type.months_until_end() {
            Some(months) => plan_from
                .checked_add_months(Months::new(months))
                .unwrap_or(plan_to),
            None => plan_to,
        }
    }
}

impl Default for PeriodResolver {
    fn default() -> Self {
        Self::new(FiscalCalendar::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planning::TargetType;

    fn resolver() -> PeriodResolver {
        PeriodResolver::default()
    }

    fn annual_item(annual: f64, quarters: &[Quarter]) -> PeriodTargets {
        let mut targets = PeriodTargets::annual_only(TargetType::Incremental, annual);
        targets.selected_quarters.extend(quarters.iter().copied());
        targets
    }

    #[test]
    fn fiscal_quarters_start_in_july() {
        let calendar = FiscalCalendar::default();
        assert_eq!(calendar.months_of(Quarter::Q1), [Month::Jul, Month::Aug, Month::Sep]);
        assert_eq!(calendar.months_of(Quarter::Q2), [Month::Oct, Month::Nov, Month::Dec]);
        assert_eq!(calendar.months_of(Quarter::Q3), [Month::Jan, Month::Feb, Month::Mar]);
        assert_eq!(calendar.months_of(Quarter::Q4), [Month::Apr, Month::May, Month::Jun]);
    }

    #[test]
    fn out_of_range_start_month_is_clamped() {
        let calendar = FiscalCalendar::new(0);
        assert_eq!(calendar.months_of(Quarter::Q1), [Month::Jan, Month::Feb, Month::Mar]);

        let calendar = FiscalCalendar::new(15);
        assert_eq!(calendar.months_of(Quarter::Q1), [Month::Dec, Month::Jan, Month::Feb]);
    }

    #[test]
    fn month_selection_maps_into_quarters() {
        let mut targets = PeriodTargets::annual_only(TargetType::Constant, 40.0);
        targets.selected_months.insert(Month::Aug);

        let r = resolver();
        assert!(r.is_planned_for_period(&targets, ReportType::Q1));
        assert!(r.is_planned_for_period(&targets, ReportType::SixMonth));
        assert!(!r.is_planned_for_period(&targets, ReportType::Q2));
    }

    #[test]
    fn annual_target_pro_ration() {
        let targets = annual_item(120.0, &Quarter::ALL);
        let r = resolver();

        assert_eq!(r.target_for_period(&targets, ReportType::Q1), Some(30.0));
        assert_eq!(r.target_for_period(&targets, ReportType::SixMonth), Some(60.0));
        assert_eq!(r.target_for_period(&targets, ReportType::NineMonth), Some(90.0));
        assert_eq!(r.target_for_period(&targets, ReportType::Yearly), Some(120.0));
    }

    #[test]
    fn quarterly_targets_take_precedence_and_sum() {
        let mut targets = annual_item(999.0, &Quarter::ALL);
        targets.q1_target = Some(10.0);
        targets.q2_target = Some(15.0);

        let r = resolver();
        assert_eq!(r.target_for_period(&targets, ReportType::Q1), Some(10.0));
        assert_eq!(r.target_for_period(&targets, ReportType::SixMonth), Some(25.0));
        // Q3 has no quarterly value and quarterly mode is active: absent.
        assert_eq!(r.target_for_period(&targets, ReportType::Q3), None);
        assert_eq!(r.target_for_period(&targets, ReportType::Yearly), Some(25.0));
    }

    #[test]
    fn unplanned_items_are_absent_not_zero() {
        let targets = annual_item(120.0, &[Quarter::Q2]);
        let r = resolver();

        assert!(!r.is_planned_for_period(&targets, ReportType::Q1));
        assert_eq!(r.target_for_period(&targets, ReportType::Q1), None);
        assert_eq!(r.contribution(&targets, ReportType::Q2), Some(30.0));
    }

    #[test]
    fn zero_annual_target_yields_absent() {
        let targets = annual_item(0.0, &Quarter::ALL);
        assert_eq!(resolver().target_for_period(&targets, ReportType::Yearly), None);
    }

    #[test]
    fn period_end_offsets() {
        let from = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let r = resolver();

        assert_eq!(
            r.period_end(from, to, ReportType::Q1),
            NaiveDate::from_ymd_opt(2024, 10, 1).unwrap()
        );
        assert_eq!(
            r.period_end(from, to, ReportType::SixMonth),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
        );
        assert_eq!(
            r.period_end(from, to, ReportType::Q4),
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
        );
        assert_eq!(r.period_end(from, to, ReportType::Yearly), to);
    }
}
