//! Component scores and the Civic Value Index.

use serde::Serialize;
use tracing::info;

use crate::analyzers::tier::tier;
use crate::analyzers::types::{Metric, MetricTable, NeighborhoodProfile, ScoreCard};
use crate::config::ScoreWeights;
use crate::error::PipelineError;

/// Score given when a column has no spread or a value is undefined.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Home value unit for the crimes-per-value ratio.
const VALUE_UNIT: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherIsBetter,
    HigherIsWorse,
}

/// One weighted input of a component score.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Component {
    pub metric: Metric,
    pub weight: f64,
    pub direction: Direction,
}

pub static SAFETY_COMPONENTS: &[Component] = &[
    Component { metric: Metric::TotalCrimes, weight: 0.4, direction: Direction::HigherIsWorse },
    Component { metric: Metric::ViolentCrimes, weight: 0.4, direction: Direction::HigherIsWorse },
    Component { metric: Metric::CrimeTrendPct, weight: 0.2, direction: Direction::HigherIsWorse },
];

pub static SERVICE_COMPONENTS: &[Component] = &[
    Component {
        metric: Metric::MedianResponseDays,
        weight: 0.6,
        direction: Direction::HigherIsWorse,
    },
    Component {
        metric: Metric::Total311Requests,
        weight: 0.4,
        direction: Direction::HigherIsBetter,
    },
];

pub static MARKET_COMPONENTS: &[Component] = &[
    Component {
        metric: Metric::CurrentHomeValue,
        weight: 0.5,
        direction: Direction::HigherIsBetter,
    },
    Component {
        metric: Metric::YoyAppreciation,
        weight: 0.5,
        direction: Direction::HigherIsBetter,
    },
];

/// Min-max normalizes `values` onto 0–100, inverted for [`Direction::HigherIsWorse`].
///
/// A column without spread, or a non-finite value, scores [`NEUTRAL_SCORE`].
pub fn normalize(values: &[f64], direction: Direction) -> Vec<f64> {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });

    values
        .iter()
        .map(|v| {
            if !v.is_finite() || max <= min {
                return NEUTRAL_SCORE;
            }
            let n = ((v - min) / (max - min) * 100.0).clamp(0.0, 100.0);
            match direction {
                Direction::HigherIsBetter => n,
                Direction::HigherIsWorse => 100.0 - n,
            }
        })
        .collect()
}

/// Like [`normalize`], over only the defined values; undefined entries score neutral.
pub fn normalize_partial(values: &[Option<f64>], direction: Direction) -> Vec<f64> {
    let defined: Vec<f64> = values.iter().filter_map(|v| *v).collect();
    let mut scores = normalize(&defined, direction).into_iter();
    values
        .iter()
        .map(|v| match v {
            Some(_) => scores.next().unwrap_or(NEUTRAL_SCORE),
            None => NEUTRAL_SCORE,
        })
        .collect()
}

/// Weighted sum of normalized component columns, one entry per row.
pub fn component_score(table: &MetricTable, components: &[Component]) -> Vec<f64> {
    let mut total = vec![0.0; table.len()];
    for c in components {
        let column: Vec<f64> = table
            .column(c.metric)
            .into_iter()
            .map(|v| v.unwrap_or(0.0))
            .collect();
        for (acc, n) in total.iter_mut().zip(normalize(&column, c.direction)) {
            *acc += c.weight * n;
        }
    }
    total
}

/// Crimes per million of home value; undefined without a positive home value.
pub fn crimes_per_value(total_crimes: f64, home_value: f64) -> Option<f64> {
    (home_value > 0.0).then(|| total_crimes / (home_value / VALUE_UNIT))
}

/// Competition ranks: 1 + count of strictly greater values.
pub fn competition_ranks(values: &[f64]) -> Vec<usize> {
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    values
        .iter()
        .map(|v| 1 + sorted.partition_point(|s| s > v))
        .collect()
}

pub fn percentile(rank: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (1.0 - rank as f64 / total as f64) * 100.0
}

/// Scores every row of a filled profile table.
///
/// Returns profiles ordered by rank, ties by neighborhood key.
///
/// # Errors
///
/// Returns [`PipelineError::Config`] if `weights` does not sum to one.
#[tracing::instrument(skip_all, fields(neighborhoods = table.len()))]
pub fn score_profiles(
    table: &MetricTable,
    weights: &ScoreWeights,
) -> Result<Vec<NeighborhoodProfile>, PipelineError> {
    weights.validate()?;

    let safety = component_score(table, SAFETY_COMPONENTS);
    let service = component_score(table, SERVICE_COMPONENTS);
    let market = component_score(table, MARKET_COMPONENTS);

    let ratios: Vec<Option<f64>> = table
        .rows
        .values()
        .map(|row| {
            let crimes = row.get(&Metric::TotalCrimes).copied().unwrap_or(0.0);
            let value = row.get(&Metric::CurrentHomeValue).copied().unwrap_or(0.0);
            crimes_per_value(crimes, value)
        })
        .collect();
    let ratio = normalize_partial(&ratios, Direction::HigherIsWorse);

    let index: Vec<f64> = (0..table.len())
        .map(|i| {
            weights.safety * safety[i]
                + weights.service * service[i]
                + weights.market * market[i]
                + weights.civic_value_ratio * ratio[i]
        })
        .collect();
    let ranks = competition_ranks(&index);
    let total = table.len();

    let mut profiles: Vec<NeighborhoodProfile> = table
        .rows
        .iter()
        .enumerate()
        .map(|(i, (key, row))| NeighborhoodProfile {
            neighborhood: key.clone(),
            metrics: row.clone(),
            scores: ScoreCard {
                safety: safety[i],
                service: service[i],
                market: market[i],
                civic_value_ratio: ratio[i],
                civic_value_index: index[i],
                rank: ranks[i],
                percentile: percentile(ranks[i], total),
                tier: tier(index[i]),
            },
        })
        .collect();

    profiles.sort_by(|a, b| {
        a.scores
            .rank
            .cmp(&b.scores.rank)
            .then_with(|| a.neighborhood.cmp(&b.neighborhood))
    });

    if let Some(top) = profiles.first() {
        info!(
            top = %top.neighborhood,
            civic_value_index = top.scores.civic_value_index,
            "Scored neighborhoods"
        );
    }
    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::join::fill_missing_with_zero;
    use crate::analyzers::types::Tier;
    use crate::neighborhood::NeighborhoodKey;

    fn key(s: &str) -> NeighborhoodKey {
        NeighborhoodKey::parse(s).unwrap()
    }

    #[test]
    fn test_normalize_range_and_inversion() {
        let n = normalize(&[10.0, 20.0, 30.0], Direction::HigherIsBetter);
        assert_eq!(n, vec![0.0, 50.0, 100.0]);
        let inv = normalize(&[10.0, 20.0, 30.0], Direction::HigherIsWorse);
        assert_eq!(inv, vec![100.0, 50.0, 0.0]);
    }

    #[test]
    fn test_constant_column_is_exactly_fifty() {
        for direction in [Direction::HigherIsBetter, Direction::HigherIsWorse] {
            assert_eq!(normalize(&[7.0, 7.0, 7.0], direction), vec![50.0; 3]);
        }
        assert_eq!(normalize(&[3.0], Direction::HigherIsWorse), vec![50.0]);
        assert!(normalize(&[], Direction::HigherIsBetter).is_empty());
    }

    #[test]
    fn test_normalize_partial_scores_undefined_neutral() {
        let n = normalize_partial(&[Some(1.0), None, Some(3.0)], Direction::HigherIsWorse);
        assert_eq!(n, vec![100.0, 50.0, 0.0]);
    }

    #[test]
    fn test_component_weights_sum_to_one() {
        for components in [SAFETY_COMPONENTS, SERVICE_COMPONENTS, MARKET_COMPONENTS] {
            let sum: f64 = components.iter().map(|c| c.weight).sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_competition_ranking_shares_ties() {
        assert_eq!(competition_ranks(&[90.0, 70.0, 90.0, 50.0]), vec![1, 3, 1, 4]);
        assert_eq!(percentile(1, 4), 75.0);
        assert_eq!(percentile(4, 4), 0.0);
    }

    #[test]
    fn test_crimes_per_value_undefined_without_value() {
        assert_eq!(crimes_per_value(10.0, 0.0), None);
        assert_eq!(crimes_per_value(10.0, 500_000.0), Some(20.0));
    }

    #[test]
    fn test_score_profiles_orders_and_bounds() {
        let mut table = MetricTable::default();
        let rows = [
            ("safe-place", 5.0, 0.0, 600_000.0),
            ("middling", 50.0, 10.0, 400_000.0),
            ("rough", 200.0, 60.0, 0.0),
        ];
        for (name, crimes, violent, value) in rows {
            table.rows.insert(
                key(name),
                [
                    (Metric::TotalCrimes, crimes),
                    (Metric::ViolentCrimes, violent),
                    (Metric::CurrentHomeValue, value),
                ]
                .into_iter()
                .collect(),
            );
        }
        let table = fill_missing_with_zero(table, Metric::ALL);

        let profiles = score_profiles(&table, &ScoreWeights::default()).unwrap();
        assert_eq!(profiles.len(), 3);
        assert_eq!(profiles[0].neighborhood, key("safe-place"));
        assert_eq!(profiles[0].scores.rank, 1);
        assert_eq!(profiles[2].neighborhood, key("rough"));

        for p in &profiles {
            let s = &p.scores;
            for v in [s.safety, s.service, s.market, s.civic_value_ratio, s.civic_value_index] {
                assert!((0.0..=100.0).contains(&v), "{v} out of range");
            }
        }

        // No home value: ratio undefined and neutral.
        assert_eq!(profiles[2].scores.civic_value_ratio, NEUTRAL_SCORE);
        // Every service input is constant.
        assert!(profiles.iter().all(|p| p.scores.service == 50.0));

        let safe = &profiles[0].scores;
        let expected = 0.30 * safe.safety + 0.25 * safe.service + 0.25 * safe.market + 0.20 * safe.civic_value_ratio;
        assert!((safe.civic_value_index - expected).abs() < 1e-9);
        assert_eq!(safe.tier, tier(safe.civic_value_index));
        assert_ne!(profiles[2].scores.tier, Tier::ExcellentValue);
    }

    #[test]
    fn test_invalid_weights_are_rejected() {
        let weights = ScoreWeights {
            market: 0.9,
            ..ScoreWeights::default()
        };
        assert!(score_profiles(&MetricTable::default(), &weights).is_err());
    }
}
