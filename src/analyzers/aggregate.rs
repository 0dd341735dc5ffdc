//! Per-source neighborhood aggregation.
//!
//! Every source declares its metrics as a static table of [`MetricSpec`]s.
//! Records are grouped by neighborhood and each `MetricSpec` is evaluated over the
//! group, producing one [`MetricTable`] per source.

use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;
use tracing::info;

use crate::analyzers::buckets::{DayKind, TimeOfDay};
use crate::analyzers::types::{Metric, MetricTable};
use crate::analyzers::utility::{mean, median};
use crate::cleaner::{
    BudgetRecord, CrimeCategory, CrimeRecord, DepartmentCategory, HomeValueRecord, ServiceCategory,
    ServiceRequest,
};
use crate::neighborhood::NeighborhoodKey;

/// Length of each crime-trend window.
pub const TREND_WINDOW_DAYS: i64 = 180;

/// A typed record that can be grouped by neighborhood.
pub trait SourceRecord {
    /// Records without a neighborhood are left out of the grouping.
    fn neighborhood(&self) -> Option<&NeighborhoodKey>;
}

impl SourceRecord for CrimeRecord {
    fn neighborhood(&self) -> Option<&NeighborhoodKey> {
        Some(&self.neighborhood)
    }
}

impl SourceRecord for ServiceRequest {
    fn neighborhood(&self) -> Option<&NeighborhoodKey> {
        Some(&self.neighborhood)
    }
}

impl SourceRecord for HomeValueRecord {
    fn neighborhood(&self) -> Option<&NeighborhoodKey> {
        Some(&self.neighborhood)
    }
}

impl SourceRecord for BudgetRecord {
    fn neighborhood(&self) -> Option<&NeighborhoodKey> {
        self.neighborhood.as_ref()
    }
}

/// Table-wide facts a custom aggregation may depend on.
#[derive(Debug, Clone, Default)]
pub struct AggregationContext {
    /// Latest event timestamp across the whole source table.
    pub latest: Option<NaiveDateTime>,
}

/// How a metric is computed over one neighborhood's records.
pub enum Aggregation<R> {
    /// Records matching the predicate.
    Count(fn(&R) -> bool),
    /// Sum of the present values; zero when none are present.
    Sum(fn(&R) -> Option<f64>),
    /// Mean of the present values; empty when none are present.
    Mean(fn(&R) -> Option<f64>),
    /// Median of the present values; empty when none are present.
    Median(fn(&R) -> Option<f64>),
    Custom(fn(&[&R], &AggregationContext) -> Option<f64>),
}

pub struct MetricSpec<R> {
    pub metric: Metric,
    pub aggregation: Aggregation<R>,
}

impl<R> MetricSpec<R> {
    fn evaluate(&self, group: &[&R], ctx: &AggregationContext) -> Option<f64> {
        let values = |f: fn(&R) -> Option<f64>| -> Vec<f64> {
            group.iter().filter_map(|r| f(r)).filter(|v| v.is_finite()).collect()
        };
        match &self.aggregation {
            Aggregation::Count(pred) => Some(group.iter().filter(|r| pred(r)).count() as f64),
            Aggregation::Sum(f) => Some(values(*f).iter().sum()),
            Aggregation::Mean(f) => mean(&values(*f)),
            Aggregation::Median(f) => median(&values(*f)),
            Aggregation::Custom(f) => f(group, ctx),
        }
    }
}

/// Groups `records` by neighborhood and evaluates every `MetricSpec` per group.
pub fn aggregate<R: SourceRecord>(
    records: &[R],
    specs: &[MetricSpec<R>],
    ctx: &AggregationContext,
) -> MetricTable {
    let mut groups: BTreeMap<&NeighborhoodKey, Vec<&R>> = BTreeMap::new();
    for record in records {
        if let Some(key) = record.neighborhood() {
            groups.entry(key).or_default().push(record);
        }
    }

    let mut table = MetricTable::with_columns(specs.iter().map(|s| s.metric));
    for (key, group) in groups {
        let row = specs
            .iter()
            .filter_map(|spec| spec.evaluate(&group, ctx).map(|v| (spec.metric, v)))
            .collect();
        table.rows.insert(key.clone(), row);
    }
    table
}

fn occurred_in(r: &CrimeRecord, bucket: TimeOfDay) -> bool {
    r.occurred_at.is_some_and(|ts| TimeOfDay::of(ts) == bucket)
}

fn occurred_on(r: &CrimeRecord, kind: DayKind) -> bool {
    r.occurred_at.is_some_and(|ts| DayKind::of(ts) == kind)
}

/// Percent change between the last two trend windows, relative to `ctx.latest`.
///
/// The recent window is `[latest - 180d, latest]` and the previous one is the
/// 180 days before it, start inclusive. The trend is 0 unless both windows
/// hold at least one crime.
pub fn crime_trend_pct(group: &[&CrimeRecord], ctx: &AggregationContext) -> Option<f64> {
    let Some(latest) = ctx.latest else {
        return Some(0.0);
    };
    let window = Duration::days(TREND_WINDOW_DAYS);
    let recent_start = latest - window;
    let previous_start = recent_start - window;

    let mut recent = 0usize;
    let mut previous = 0usize;
    for ts in group.iter().filter_map(|r| r.occurred_at) {
        if (recent_start..=latest).contains(&ts) {
            recent += 1;
        } else if (previous_start..recent_start).contains(&ts) {
            previous += 1;
        }
    }

    if recent == 0 || previous == 0 {
        return Some(0.0);
    }
    Some((recent as f64 - previous as f64) / previous as f64 * 100.0)
}

pub static CRIME_METRICS: &[MetricSpec<CrimeRecord>] = &[
    MetricSpec { metric: Metric::TotalCrimes, aggregation: Aggregation::Count(|_| true) },
    MetricSpec { metric: Metric::TrafficCrimes, aggregation: Aggregation::Count(|r| r.is_traffic) },
    MetricSpec {
        metric: Metric::PropertyCrimes,
        aggregation: Aggregation::Count(|r| r.is(CrimeCategory::Property)),
    },
    MetricSpec {
        metric: Metric::ViolentCrimes,
        aggregation: Aggregation::Count(|r| r.is(CrimeCategory::Violent)),
    },
    MetricSpec {
        metric: Metric::NightCrimes,
        aggregation: Aggregation::Count(|r| occurred_in(r, TimeOfDay::Night)),
    },
    MetricSpec {
        metric: Metric::MorningCrimes,
        aggregation: Aggregation::Count(|r| occurred_in(r, TimeOfDay::Morning)),
    },
    MetricSpec {
        metric: Metric::AfternoonCrimes,
        aggregation: Aggregation::Count(|r| occurred_in(r, TimeOfDay::Afternoon)),
    },
    MetricSpec {
        metric: Metric::EveningCrimes,
        aggregation: Aggregation::Count(|r| occurred_in(r, TimeOfDay::Evening)),
    },
    MetricSpec {
        metric: Metric::WeekdayCrimes,
        aggregation: Aggregation::Count(|r| occurred_on(r, DayKind::Weekday)),
    },
    MetricSpec {
        metric: Metric::WeekendCrimes,
        aggregation: Aggregation::Count(|r| occurred_on(r, DayKind::Weekend)),
    },
    MetricSpec { metric: Metric::CrimeTrendPct, aggregation: Aggregation::Custom(crime_trend_pct) },
];

fn streetlight_response(r: &ServiceRequest) -> Option<f64> {
    if r.is(ServiceCategory::Streetlight) {
        r.response_days
    } else {
        None
    }
}

pub static SERVICE_METRICS: &[MetricSpec<ServiceRequest>] = &[
    MetricSpec { metric: Metric::Total311Requests, aggregation: Aggregation::Count(|_| true) },
    MetricSpec { metric: Metric::AvgResponseDays, aggregation: Aggregation::Mean(|r| r.response_days) },
    MetricSpec {
        metric: Metric::MedianResponseDays,
        aggregation: Aggregation::Median(|r| r.response_days),
    },
    MetricSpec {
        metric: Metric::TotalStreetlightRequests,
        aggregation: Aggregation::Count(|r| r.is(ServiceCategory::Streetlight)),
    },
    MetricSpec {
        metric: Metric::PendingStreetlightRequests,
        aggregation: Aggregation::Count(|r| r.is(ServiceCategory::Streetlight) && r.is_pending()),
    },
    MetricSpec {
        metric: Metric::AvgStreetlightResponseDays,
        aggregation: Aggregation::Mean(streetlight_response),
    },
    MetricSpec {
        metric: Metric::PotholeRequests,
        aggregation: Aggregation::Count(|r| r.is(ServiceCategory::Pothole)),
    },
    MetricSpec {
        metric: Metric::GraffitiRequests,
        aggregation: Aggregation::Count(|r| r.is(ServiceCategory::Graffiti)),
    },
    MetricSpec {
        metric: Metric::DumpingRequests,
        aggregation: Aggregation::Count(|r| r.is(ServiceCategory::Dumping)),
    },
];

pub static HOME_VALUE_METRICS: &[MetricSpec<HomeValueRecord>] = &[
    MetricSpec {
        metric: Metric::CurrentHomeValue,
        aggregation: Aggregation::Mean(|r| Some(r.current_value)),
    },
    MetricSpec {
        metric: Metric::YoyAppreciation,
        aggregation: Aggregation::Mean(|r| r.yoy_appreciation),
    },
];

fn department_amount(r: &BudgetRecord, category: DepartmentCategory) -> Option<f64> {
    r.is(category).then_some(r.amount)
}

pub static BUDGET_METRICS: &[MetricSpec<BudgetRecord>] = &[
    MetricSpec { metric: Metric::BudgetTotal, aggregation: Aggregation::Sum(|r| Some(r.amount)) },
    MetricSpec {
        metric: Metric::SafetySpending,
        aggregation: Aggregation::Sum(|r| department_amount(r, DepartmentCategory::PublicSafety)),
    },
    MetricSpec {
        metric: Metric::PublicWorksSpending,
        aggregation: Aggregation::Sum(|r| department_amount(r, DepartmentCategory::PublicWorks)),
    },
];

#[tracing::instrument(skip_all, fields(records = records.len()))]
pub fn aggregate_crime(records: &[CrimeRecord]) -> MetricTable {
    let ctx = AggregationContext {
        latest: records.iter().filter_map(|r| r.occurred_at).max(),
    };
    let table = aggregate(records, CRIME_METRICS, &ctx);
    info!(neighborhoods = table.len(), "Aggregated crime");
    table
}

#[tracing::instrument(skip_all, fields(records = records.len()))]
pub fn aggregate_service_requests(records: &[ServiceRequest]) -> MetricTable {
    let ctx = AggregationContext {
        latest: records.iter().filter_map(|r| r.opened_at).max(),
    };
    let table = aggregate(records, SERVICE_METRICS, &ctx);
    info!(neighborhoods = table.len(), "Aggregated 311 requests");
    table
}

#[tracing::instrument(skip_all, fields(records = records.len()))]
pub fn aggregate_home_values(records: &[HomeValueRecord]) -> MetricTable {
    let table = aggregate(records, HOME_VALUE_METRICS, &AggregationContext::default());
    info!(neighborhoods = table.len(), "Aggregated home values");
    table
}

#[tracing::instrument(skip_all, fields(records = records.len()))]
pub fn aggregate_budget(records: &[BudgetRecord]) -> MetricTable {
    let table = aggregate(records, BUDGET_METRICS, &AggregationContext::default());
    info!(neighborhoods = table.len(), "Aggregated budget");
    table
}
