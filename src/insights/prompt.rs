use std::fmt;

use crate::analyzers::statistics::{RankedEntry, RunStatistics};

/// Correlation pairs quoted in the prompt.
const PROMPT_CORRELATIONS: usize = 5;

fn ranked_section(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    entries: &[RankedEntry],
    unit: &str,
) -> fmt::Result {
    writeln!(f, "\n{title}:")?;
    if entries.is_empty() {
        writeln!(f, "- none")?;
    }
    for (i, e) in entries.iter().enumerate() {
        writeln!(f, "{}. {}: {:.1} {unit}", i + 1, e.neighborhood, e.value)?;
    }
    Ok(())
}

/// The analysis request for one run's statistics.
pub struct Prompt<'a>(pub &'a RunStatistics);

impl fmt::Display for Prompt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.0;
        let t = &stats.totals;

        f.write_str(
            "You are a civic data analyst. Review these neighborhood statistics for a city and \
             explain what they mean for residents and local government.\n",
        )?;

        writeln!(f, "\nOverall metrics:")?;
        writeln!(f, "- Neighborhoods analyzed: {}", t.neighborhoods_analyzed)?;
        writeln!(f, "- Total crimes: {:.0}", t.total_crimes)?;
        writeln!(f, "- Total 311 requests: {:.0}", t.total_311_requests)?;
        writeln!(f, "- Streetlight requests: {:.0}", t.total_streetlight_requests)?;
        writeln!(f, "- Pending streetlight requests: {:.0}", t.pending_streetlight_requests)?;
        if let Some(days) = t.avg_response_days {
            writeln!(f, "- Average 311 response time: {days:.1} days")?;
        }

        let cmp = &stats.infrastructure_comparison;
        writeln!(f, "\nInfrastructure and crime:")?;
        writeln!(
            f,
            "- The {} neighborhoods with the most streetlight issues average {:.1} crimes; \
             the {} with the fewest average {:.1} ({:+.0}%).",
            cmp.group_size,
            cmp.high_infrastructure_issues_avg_crime,
            cmp.group_size,
            cmp.low_infrastructure_issues_avg_crime,
            cmp.crime_difference_pct
        )?;

        ranked_section(f, "Top concern neighborhoods by crime", &stats.top_by_crime, "crimes")?;
        ranked_section(
            f,
            "Most pending streetlight requests",
            &stats.top_by_pending_streetlights,
            "pending",
        )?;
        ranked_section(
            f,
            "Highest Civic Value Index",
            &stats.top_by_civic_value,
            "index",
        )?;

        if !stats.correlations.is_empty() {
            writeln!(f, "\nStrongest correlations:")?;
            for pair in stats.correlations.iter().take(PROMPT_CORRELATIONS) {
                writeln!(
                    f,
                    "- {} vs {}: r = {:.2} (p = {:.4}{})",
                    pair.feature_a,
                    pair.feature_b,
                    pair.coefficient,
                    pair.p_value,
                    if pair.significant { ", significant" } else { "" }
                )?;
            }
        }

        f.write_str(
            "\nRespond with:\n\
             1. A 2-3 sentence executive summary as the first paragraph.\n\
             2. 3-5 key findings.\n\
             3. 3-5 actionable recommendations for city officials.\n",
        )
    }
}

/// Serializes the run statistics into the analysis request.
pub fn build_prompt(stats: &RunStatistics) -> String {
    Prompt(stats).to_string()
}
