//! Run-level summary statistics.

use serde::Serialize;

use crate::analyzers::correlate::CorrelationPair;
use crate::analyzers::score::{Direction, normalize};
use crate::analyzers::types::{Metric, NeighborhoodProfile};
use crate::analyzers::utility::{abs_z_scores, mean, median};
use crate::cleaner::{BudgetRecord, CleanMetrics, DepartmentCategory};
use crate::neighborhood::NeighborhoodKey;

/// Neighborhoods in each arm of the infrastructure comparison.
pub const COMPARISON_GROUP_SIZE: usize = 10;

/// Weights of the crime/infrastructure concern index.
const CONCERN_WEIGHTS: (f64, f64) = (0.6, 0.4);

#[derive(Debug, Clone, Serialize)]
pub struct Totals {
    pub total_crimes: f64,
    pub total_311_requests: f64,
    pub total_streetlight_requests: f64,
    pub pending_streetlight_requests: f64,
    pub avg_response_days: Option<f64>,
    pub neighborhoods_analyzed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedEntry {
    pub neighborhood: NeighborhoodKey,
    pub value: f64,
}

/// Crime in the neighborhoods with the most vs least streetlight trouble.
#[derive(Debug, Clone, Serialize)]
pub struct InfrastructureComparison {
    pub group_size: usize,
    pub high_infrastructure_issues_avg_crime: f64,
    pub low_infrastructure_issues_avg_crime: f64,
    pub crime_difference_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierSide {
    High,
    Low,
}

#[derive(Debug, Clone, Serialize)]
pub struct Outlier {
    pub neighborhood: NeighborhoodKey,
    pub metric: Metric,
    pub value: f64,
    pub z_score: f64,
    pub side: OutlierSide,
}

/// City-wide spending, including transactions without a neighborhood.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetSummary {
    pub transactions: usize,
    pub total_spending: f64,
    pub safety_spending: f64,
    pub public_works_spending: f64,
    pub safety_share_pct: f64,
    pub public_works_share_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunStatistics {
    pub totals: Totals,
    pub top_by_crime: Vec<RankedEntry>,
    pub top_by_pending_streetlights: Vec<RankedEntry>,
    pub top_by_civic_value: Vec<RankedEntry>,
    pub infrastructure_comparison: InfrastructureComparison,
    pub correlations: Vec<CorrelationPair>,
    pub outliers: Vec<Outlier>,
    pub budget: Option<BudgetSummary>,
    pub cleaning: Vec<CleanMetrics>,
}

/// Inputs the statistics stage needs beyond the scored profiles.
pub struct StatisticsInput<'a> {
    pub profiles: &'a [NeighborhoodProfile],
    pub correlations: Vec<CorrelationPair>,
    pub budget: Option<&'a [BudgetRecord]>,
    pub cleaning: Vec<CleanMetrics>,
    pub top_n: usize,
    pub outlier_z_threshold: f64,
}

fn column(profiles: &[NeighborhoodProfile], metric: Metric) -> Vec<f64> {
    profiles.iter().map(|p| p.metric(metric)).collect()
}

fn sum(profiles: &[NeighborhoodProfile], metric: Metric) -> f64 {
    column(profiles, metric).iter().sum()
}

/// Top `n` neighborhoods by `value`, descending, ties by key.
pub fn top_n_by(
    profiles: &[NeighborhoodProfile],
    n: usize,
    value: impl Fn(&NeighborhoodProfile) -> f64,
) -> Vec<RankedEntry> {
    let mut entries: Vec<RankedEntry> = profiles
        .iter()
        .map(|p| RankedEntry {
            neighborhood: p.neighborhood.clone(),
            value: value(p),
        })
        .collect();
    entries.sort_by(|a, b| {
        b.value
            .total_cmp(&a.value)
            .then_with(|| a.neighborhood.cmp(&b.neighborhood))
    });
    entries.truncate(n);
    entries
}

pub fn infrastructure_comparison(profiles: &[NeighborhoodProfile]) -> InfrastructureComparison {
    let crimes = column(profiles, Metric::TotalCrimes);
    let lights = column(profiles, Metric::TotalStreetlightRequests);
    let (wc, wl) = CONCERN_WEIGHTS;

    let concern: Vec<f64> = normalize(&crimes, Direction::HigherIsBetter)
        .into_iter()
        .zip(normalize(&lights, Direction::HigherIsBetter))
        .map(|(c, l)| wc * c + wl * l)
        .collect();

    let mut order: Vec<usize> = (0..profiles.len()).collect();
    order.sort_by(|&a, &b| {
        concern[b]
            .total_cmp(&concern[a])
            .then_with(|| profiles[a].neighborhood.cmp(&profiles[b].neighborhood))
    });

    let group_size = COMPARISON_GROUP_SIZE.min(profiles.len());
    let avg_crime = |idx: &[usize]| {
        let values: Vec<f64> = idx.iter().map(|&i| crimes[i]).collect();
        mean(&values).unwrap_or(0.0)
    };
    let high = avg_crime(&order[..group_size]);
    let low = avg_crime(&order[order.len() - group_size..]);
    let crime_difference_pct = if low > 0.0 {
        (high - low) / low * 100.0
    } else {
        0.0
    };

    InfrastructureComparison {
        group_size,
        high_infrastructure_issues_avg_crime: high,
        low_infrastructure_issues_avg_crime: low,
        crime_difference_pct,
    }
}

/// Cells whose absolute z-score exceeds `threshold`, strongest first.
pub fn find_outliers(profiles: &[NeighborhoodProfile], threshold: f64) -> Vec<Outlier> {
    let mut outliers = Vec::new();

    for &metric in Metric::ALL {
        let values = column(profiles, metric);
        let Some(z) = abs_z_scores(&values) else {
            continue;
        };
        let mid = median(&values).unwrap_or(0.0);

        for (i, p) in profiles.iter().enumerate() {
            if z[i] > threshold {
                outliers.push(Outlier {
                    neighborhood: p.neighborhood.clone(),
                    metric,
                    value: values[i],
                    z_score: z[i],
                    side: if values[i] > mid {
                        OutlierSide::High
                    } else {
                        OutlierSide::Low
                    },
                });
            }
        }
    }

    outliers.sort_by(|a, b| {
        b.z_score
            .total_cmp(&a.z_score)
            .then_with(|| a.metric.cmp(&b.metric))
            .then_with(|| a.neighborhood.cmp(&b.neighborhood))
    });
    outliers
}

pub fn budget_summary(records: &[BudgetRecord]) -> BudgetSummary {
    let total: f64 = records.iter().map(|r| r.amount).sum();
    let in_category = |c: DepartmentCategory| -> f64 {
        records.iter().filter(|r| r.is(c)).map(|r| r.amount).sum()
    };
    let safety = in_category(DepartmentCategory::PublicSafety);
    let works = in_category(DepartmentCategory::PublicWorks);
    let share = |part: f64| if total != 0.0 { part / total * 100.0 } else { 0.0 };

    BudgetSummary {
        transactions: records.len(),
        total_spending: total,
        safety_spending: safety,
        public_works_spending: works,
        safety_share_pct: share(safety),
        public_works_share_pct: share(works),
    }
}

#[tracing::instrument(skip_all, fields(neighborhoods = input.profiles.len()))]
pub fn compute_statistics(input: StatisticsInput<'_>) -> RunStatistics {
    let profiles = input.profiles;

    let response: Vec<f64> = profiles
        .iter()
        .filter_map(|p| p.metrics.get(&Metric::AvgResponseDays).copied())
        .filter(|v| *v > 0.0)
        .collect();

    let totals = Totals {
        total_crimes: sum(profiles, Metric::TotalCrimes),
        total_311_requests: sum(profiles, Metric::Total311Requests),
        total_streetlight_requests: sum(profiles, Metric::TotalStreetlightRequests),
        pending_streetlight_requests: sum(profiles, Metric::PendingStreetlightRequests),
        avg_response_days: mean(&response),
        neighborhoods_analyzed: profiles.len(),
    };

    let outliers = find_outliers(profiles, input.outlier_z_threshold);
    tracing::debug!(outliers = outliers.len(), "Computed statistics");

    RunStatistics {
        totals,
        top_by_crime: top_n_by(profiles, input.top_n, |p| p.metric(Metric::TotalCrimes)),
        top_by_pending_streetlights: top_n_by(profiles, input.top_n, |p| {
            p.metric(Metric::PendingStreetlightRequests)
        }),
        top_by_civic_value: top_n_by(profiles, input.top_n, |p| p.scores.civic_value_index),
        infrastructure_comparison: infrastructure_comparison(profiles),
        correlations: input.correlations,
        outliers,
        budget: input.budget.map(budget_summary),
        cleaning: input.cleaning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::{ScoreCard, Tier};

    fn profile(name: &str, crimes: f64, lights: f64, index: f64) -> NeighborhoodProfile {
        NeighborhoodProfile {
            neighborhood: NeighborhoodKey::parse(name).unwrap(),
            metrics: [
                (Metric::TotalCrimes, crimes),
                (Metric::TotalStreetlightRequests, lights),
                (Metric::PendingStreetlightRequests, lights / 2.0),
            ]
            .into_iter()
            .collect(),
            scores: ScoreCard {
                safety: 50.0,
                service: 50.0,
                market: 50.0,
                civic_value_ratio: 50.0,
                civic_value_index: index,
                rank: 1,
                percentile: 0.0,
                tier: Tier::OpportunityZone,
            },
        }
    }

    #[test]
    fn test_top_n_breaks_ties_by_key() {
        let profiles = vec![
            profile("b", 10.0, 0.0, 0.0),
            profile("a", 10.0, 0.0, 0.0),
            profile("c", 30.0, 0.0, 0.0),
        ];
        let top = top_n_by(&profiles, 2, |p| p.metric(Metric::TotalCrimes));
        let names: Vec<_> = top.iter().map(|e| e.neighborhood.as_str()).collect();
        assert_eq!(names, vec!["c", "a"]);
    }

    #[test]
    fn test_infrastructure_comparison() {
        // 20 neighborhoods: crime and streetlight load rise together.
        let profiles: Vec<_> = (0..20)
            .map(|i| profile(&format!("n{i:02}"), (i + 1) as f64 * 10.0, i as f64, 0.0))
            .collect();

        let cmp = infrastructure_comparison(&profiles);
        assert_eq!(cmp.group_size, 10);
        // Top 10 average 155, bottom 10 average 55.
        assert_eq!(cmp.high_infrastructure_issues_avg_crime, 155.0);
        assert_eq!(cmp.low_infrastructure_issues_avg_crime, 55.0);
        assert!((cmp.crime_difference_pct - 181.8181818).abs() < 1e-6);
    }

    #[test]
    fn test_comparison_without_low_crime_is_zero() {
        let profiles = vec![profile("a", 0.0, 0.0, 0.0)];
        assert_eq!(infrastructure_comparison(&profiles).crime_difference_pct, 0.0);
        assert_eq!(infrastructure_comparison(&[]).group_size, 0);
    }

    #[test]
    fn test_outliers_flag_extreme_values() {
        let mut profiles: Vec<_> = (0..12)
            .map(|i| profile(&format!("n{i:02}"), 10.0 + (i % 2) as f64, 1.0, 0.0))
            .collect();
        profiles.push(profile("hotspot", 500.0, 1.0, 0.0));

        let outliers = find_outliers(&profiles, 2.5);
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].neighborhood.as_str(), "hotspot");
        assert_eq!(outliers[0].metric, Metric::TotalCrimes);
        assert_eq!(outliers[0].side, OutlierSide::High);
    }

    #[test]
    fn test_budget_summary_shares() {
        let records = vec![
            BudgetRecord::new("Police", 60.0, None),
            BudgetRecord::new("Public Works", 30.0, None),
            BudgetRecord::new("Library", 10.0, None),
        ];
        let summary = budget_summary(&records);
        assert_eq!(summary.transactions, 3);
        assert_eq!(summary.total_spending, 100.0);
        assert_eq!(summary.safety_share_pct, 60.0);
        assert_eq!(summary.public_works_share_pct, 30.0);
    }
}
