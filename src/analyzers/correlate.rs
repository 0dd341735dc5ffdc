//! Pairwise Pearson correlation over profile columns.

use serde::Serialize;
use std::cmp::Ordering;
use tracing::debug;

use crate::analyzers::types::{Metric, MetricTable};

/// Pairs with fewer overlapping rows are skipped.
pub const MIN_OBSERVATIONS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationPair {
    pub feature_a: Metric,
    pub feature_b: Metric,
    pub coefficient: f64,
    pub p_value: f64,
    pub significant: bool,
    pub observations: usize,
}

/// Pearson r and two-sided p-value. `None` for degenerate input.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<(f64, f64)> {
    let n = xs.len();
    if n != ys.len() || n < MIN_OBSERVATIONS {
        return None;
    }

    let nf = n as f64;
    let mx = xs.iter().sum::<f64>() / nf;
    let my = ys.iter().sum::<f64>() / nf;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let (dx, dy) = (x - mx, y - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }

    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    if !r.is_finite() {
        return None;
    }
    Some((r, two_sided_p(r, n)))
}

/// Two-sided p-value of r under H0: rho = 0, via Student t with n - 2 dof.
fn two_sided_p(r: f64, n: usize) -> f64 {
    let df = (n - 2) as f64;
    let denom = 1.0 - r * r;
    if denom <= 0.0 {
        return 0.0;
    }
    let t = r * (df / denom).sqrt();
    // P(|T| > t) = I_{df / (df + t^2)}(df / 2, 1 / 2)
    let x = df / (df + t * t);
    regularized_incomplete_beta(x, df / 2.0, 0.5).clamp(0.0, 1.0)
}

/// Lanczos approximation of ln Γ(x) for x > 0.
fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEF: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        // Reflection formula.
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut a = COEF[0];
    let t = x + G + 0.5;
    for (i, c) in COEF.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

/// Regularized incomplete beta I_x(a, b).
fn regularized_incomplete_beta(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();

    // The continued fraction converges fast only below the mean.
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(x, a, b) / a
    } else {
        1.0 - front * beta_continued_fraction(1.0 - x, b, a) / b
    }
}

/// Modified Lentz evaluation of the incomplete beta continued fraction.
fn beta_continued_fraction(x: f64, a: f64, b: f64) -> f64 {
    const MAX_ITER: usize = 300;
    const EPS: f64 = 1e-14;
    const TINY: f64 = 1e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;

        if (del - 1.0).abs() < EPS {
            break;
        }
    }

    h
}

/// Correlates every unordered pair of `table`'s columns.
///
/// Only pairs with |r| strictly above `threshold` are kept. Results are
/// sorted by |r| descending, ties by column declaration order.
#[tracing::instrument(skip_all, fields(neighborhoods = table.len(), threshold = threshold))]
pub fn correlate(table: &MetricTable, threshold: f64, significance_level: f64) -> Vec<CorrelationPair> {
    let columns: Vec<Metric> = table.columns.iter().copied().collect();
    let values: Vec<Vec<Option<f64>>> = columns.iter().map(|m| table.column(*m)).collect();

    let mut pairs = Vec::new();
    let mut skipped = 0usize;

    for i in 0..columns.len() {
        for j in (i + 1)..columns.len() {
            let (xs, ys): (Vec<f64>, Vec<f64>) = values[i]
                .iter()
                .zip(&values[j])
                .filter_map(|(x, y)| match (x, y) {
                    (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((*x, *y)),
                    _ => None,
                })
                .unzip();

            let Some((r, p)) = pearson(&xs, &ys) else {
                skipped += 1;
                continue;
            };
            if r.abs() > threshold {
                pairs.push(CorrelationPair {
                    feature_a: columns[i],
                    feature_b: columns[j],
                    coefficient: r,
                    p_value: p,
                    significant: p < significance_level,
                    observations: xs.len(),
                });
            }
        }
    }

    pairs.sort_by(|a, b| {
        b.coefficient
            .abs()
            .partial_cmp(&a.coefficient.abs())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.feature_a.cmp(&b.feature_a))
            .then_with(|| a.feature_b.cmp(&b.feature_b))
    });

    debug!(kept = pairs.len(), skipped, "Correlated metric pairs");
    pairs
}
