//! Data types shared by the aggregation, scoring and statistics stages.

use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::neighborhood::NeighborhoodKey;

/// Version of the bundle layout written to `analysis_results.json`.
pub const SCHEMA_VERSION: u8 = 1;
/// Bumped whenever a formula in the scorer changes.
pub const ALGORITHM_VERSION: u8 = 1;

/// Profile columns, in declared order.
///
/// The declaration order is the column order used by the correlator and the
/// CSV export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TotalCrimes,
    TrafficCrimes,
    PropertyCrimes,
    ViolentCrimes,
    NightCrimes,
    MorningCrimes,
    AfternoonCrimes,
    EveningCrimes,
    WeekdayCrimes,
    WeekendCrimes,
    CrimeTrendPct,
    #[serde(rename = "total_311_requests")]
    Total311Requests,
    AvgResponseDays,
    MedianResponseDays,
    TotalStreetlightRequests,
    PendingStreetlightRequests,
    AvgStreetlightResponseDays,
    PotholeRequests,
    GraffitiRequests,
    DumpingRequests,
    CurrentHomeValue,
    YoyAppreciation,
    BudgetTotal,
    SafetySpending,
    PublicWorksSpending,
}

impl Metric {
    pub const ALL: &'static [Metric] = &[
        Metric::TotalCrimes,
        Metric::TrafficCrimes,
        Metric::PropertyCrimes,
        Metric::ViolentCrimes,
        Metric::NightCrimes,
        Metric::MorningCrimes,
        Metric::AfternoonCrimes,
        Metric::EveningCrimes,
        Metric::WeekdayCrimes,
        Metric::WeekendCrimes,
        Metric::CrimeTrendPct,
        Metric::Total311Requests,
        Metric::AvgResponseDays,
        Metric::MedianResponseDays,
        Metric::TotalStreetlightRequests,
        Metric::PendingStreetlightRequests,
        Metric::AvgStreetlightResponseDays,
        Metric::PotholeRequests,
        Metric::GraffitiRequests,
        Metric::DumpingRequests,
        Metric::CurrentHomeValue,
        Metric::YoyAppreciation,
        Metric::BudgetTotal,
        Metric::SafetySpending,
        Metric::PublicWorksSpending,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::TotalCrimes => "total_crimes",
            Metric::TrafficCrimes => "traffic_crimes",
            Metric::PropertyCrimes => "property_crimes",
            Metric::ViolentCrimes => "violent_crimes",
            Metric::NightCrimes => "night_crimes",
            Metric::MorningCrimes => "morning_crimes",
            Metric::AfternoonCrimes => "afternoon_crimes",
            Metric::EveningCrimes => "evening_crimes",
            Metric::WeekdayCrimes => "weekday_crimes",
            Metric::WeekendCrimes => "weekend_crimes",
            Metric::CrimeTrendPct => "crime_trend_pct",
            Metric::Total311Requests => "total_311_requests",
            Metric::AvgResponseDays => "avg_response_days",
            Metric::MedianResponseDays => "median_response_days",
            Metric::TotalStreetlightRequests => "total_streetlight_requests",
            Metric::PendingStreetlightRequests => "pending_streetlight_requests",
            Metric::AvgStreetlightResponseDays => "avg_streetlight_response_days",
            Metric::PotholeRequests => "pothole_requests",
            Metric::GraffitiRequests => "graffiti_requests",
            Metric::DumpingRequests => "dumping_requests",
            Metric::CurrentHomeValue => "current_home_value",
            Metric::YoyAppreciation => "yoy_appreciation",
            Metric::BudgetTotal => "budget_total",
            Metric::SafetySpending => "safety_spending",
            Metric::PublicWorksSpending => "public_works_spending",
        }
    }

    pub fn parse(name: &str) -> Option<Metric> {
        Metric::ALL.iter().copied().find(|m| m.as_str() == name)
    }

    /// Position in declaration order.
    pub fn position(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric cells of one neighborhood. An absent entry is an empty cell.
pub type MetricRow = BTreeMap<Metric, f64>;

/// Neighborhood-keyed metric cells plus the columns the table declares.
///
/// Rows iterate in key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricTable {
    pub columns: BTreeSet<Metric>,
    pub rows: BTreeMap<NeighborhoodKey, MetricRow>,
}

impl MetricTable {
    pub fn with_columns(columns: impl IntoIterator<Item = Metric>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
            rows: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: &NeighborhoodKey, metric: Metric) -> Option<f64> {
        self.rows.get(key).and_then(|row| row.get(&metric)).copied()
    }

    /// Values of one column in key order; empty cells are `None`.
    pub fn column(&self, metric: Metric) -> Vec<Option<f64>> {
        self.rows.values().map(|row| row.get(&metric).copied()).collect()
    }
}

/// Label band of the composite index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    ExcellentValue,
    GoodValue,
    OpportunityZone,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::ExcellentValue => "excellent_value",
            Tier::GoodValue => "good_value",
            Tier::OpportunityZone => "opportunity_zone",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rounds to one decimal place; presentation only.
pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

pub(crate) fn serialize_round1<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(round1(*v))
}

/// Component scores and placement of one neighborhood.
///
/// Values are kept unrounded; they are rounded to one decimal when
/// serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreCard {
    #[serde(rename = "safety_score", serialize_with = "serialize_round1")]
    pub safety: f64,
    #[serde(rename = "service_score", serialize_with = "serialize_round1")]
    pub service: f64,
    #[serde(rename = "market_score", serialize_with = "serialize_round1")]
    pub market: f64,
    #[serde(serialize_with = "serialize_round1")]
    pub civic_value_ratio: f64,
    #[serde(serialize_with = "serialize_round1")]
    pub civic_value_index: f64,
    pub rank: usize,
    #[serde(serialize_with = "serialize_round1")]
    pub percentile: f64,
    pub tier: Tier,
}

/// One row of the final profile table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborhoodProfile {
    pub neighborhood: NeighborhoodKey,
    #[serde(flatten)]
    pub metrics: MetricRow,
    #[serde(flatten)]
    pub scores: ScoreCard,
}

impl NeighborhoodProfile {
    /// Metric value, zero when the cell is empty.
    pub fn metric(&self, metric: Metric) -> f64 {
        self.metrics.get(&metric).copied().unwrap_or(0.0)
    }
}
