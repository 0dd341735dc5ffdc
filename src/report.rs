//! Flat-text neighborhood reports.

use chrono::NaiveDate;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::analyzers::types::{Metric, NeighborhoodProfile, Tier};
use crate::error::PipelineError;

pub const REPORTS_DIR: &str = "reports";

const RULE_WIDTH: usize = 80;
const BAR_WIDTH: usize = 20;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

fn heading(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f, "{}\n{title}\n{}\n", rule(), rule())
}

/// Whole dollars with thousands separators.
fn dollars(v: f64) -> String {
    let digits = format!("{:.0}", v.abs());
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if v < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}")
}

fn momentum(yoy: f64) -> &'static str {
    match yoy {
        y if y > 5.0 => "HOT",
        y if y > 0.0 => "STABLE",
        _ => "COOLING",
    }
}

fn tier_insight(tier: Tier) -> &'static str {
    match tier {
        Tier::ExcellentValue => {
            "EXCELLENT VALUE: a top tier neighborhood with high scores across safety, \
             service quality and market performance."
        }
        Tier::GoodValue => "GOOD VALUE: solid fundamentals with room for growth.",
        Tier::OpportunityZone => {
            "OPPORTUNITY ZONE: lower current scores may indicate undervaluation or areas \
             needing municipal attention."
        }
    }
}

fn buyer_advice(tier: Tier) -> &'static str {
    match tier {
        Tier::ExcellentValue => "Expect premium pricing due to excellent safety and service scores",
        Tier::GoodValue => "Moderate pricing with good city services and acceptable safety",
        Tier::OpportunityZone => "Lower entry price point, consider future infrastructure investment",
    }
}

fn renter_advice(tier: Tier) -> &'static str {
    match tier {
        Tier::ExcellentValue => "Premium rental market, expect higher rents but excellent quality of life",
        Tier::GoodValue => "Good balance of affordability and livability",
        Tier::OpportunityZone => "More affordable, prioritize security measures",
    }
}

fn investor_advice(p: &NeighborhoodProfile) -> &'static str {
    let s = &p.scores;
    if s.safety > 70.0 && s.market > 60.0 {
        "Strong hold for appreciation, low crime risk"
    } else if p.metric(Metric::CrimeTrendPct) < 0.0 && p.metric(Metric::YoyAppreciation) > 3.0 {
        "Watch for turnaround signals: improving crime trends and rising home values"
    } else {
        "Higher risk/reward profile, monitor city investment trends"
    }
}

/// Report of one profile out of `total` ranked neighborhoods.
pub struct Report<'a> {
    pub profile: &'a NeighborhoodProfile,
    pub total: usize,
    pub generated: NaiveDate,
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (p, total, generated) = (self.profile, self.total, self.generated);
        let s = &p.scores;

        writeln!(f, "{}", rule())?;
        writeln!(f, "CIVIC VALUE INDEX - NEIGHBORHOOD REPORT")?;
        writeln!(f, "Generated: {}", generated.format("%B %d, %Y"))?;
        writeln!(f, "{}\n", rule())?;
        writeln!(f, "NEIGHBORHOOD: {}\n", p.neighborhood.as_str().to_uppercase())?;

        heading(f, &format!("OVERALL CIVIC VALUE INDEX: {:.1}/100", s.civic_value_index))?;
        let filled = ((s.civic_value_index / 5.0) as usize).min(BAR_WIDTH);
        writeln!(f, "[{}{}]\n", "#".repeat(filled), " ".repeat(BAR_WIDTH - filled))?;

        writeln!(f, "COMPONENT SCORES:")?;
        writeln!(f, "  Safety Score:              {:.1}/100", s.safety)?;
        writeln!(f, "  Service Quality Score:     {:.1}/100", s.service)?;
        writeln!(f, "  Market Performance Score:  {:.1}/100", s.market)?;
        writeln!(f, "  Civic Value Ratio:         {:.1}/100\n", s.civic_value_ratio)?;

        heading(f, "SAFETY PROFILE")?;
        let trend = p.metric(Metric::CrimeTrendPct);
        writeln!(f, "Total Crimes:                {:.0}", p.metric(Metric::TotalCrimes))?;
        writeln!(f, "  Property Crimes:           {:.0}", p.metric(Metric::PropertyCrimes))?;
        writeln!(f, "  Violent Crimes:            {:.0}", p.metric(Metric::ViolentCrimes))?;
        writeln!(f, "  Traffic Incidents:         {:.0}", p.metric(Metric::TrafficCrimes))?;
        writeln!(
            f,
            "Crime Trend:                 {trend:+.1}% ({})\n",
            if trend > 0.0 { "INCREASING" } else { "DECREASING" }
        )?;

        heading(f, "SERVICE QUALITY")?;
        writeln!(f, "Total 311 Requests:          {:.0}", p.metric(Metric::Total311Requests))?;
        writeln!(f, "Average Response Time:       {:.1} days", p.metric(Metric::AvgResponseDays))?;
        writeln!(f, "Median Response Time:        {:.1} days", p.metric(Metric::MedianResponseDays))?;
        writeln!(
            f,
            "Streetlight Requests:        {:.0} ({:.0} pending)",
            p.metric(Metric::TotalStreetlightRequests),
            p.metric(Metric::PendingStreetlightRequests)
        )?;
        let stars = ((s.service / 20.0) as usize).min(5);
        writeln!(f, "Service Rating:              {}/5\n", stars)?;

        heading(f, "REAL ESTATE MARKET")?;
        let yoy = p.metric(Metric::YoyAppreciation);
        writeln!(f, "Current Median Home Value:   {}", dollars(p.metric(Metric::CurrentHomeValue)))?;
        writeln!(f, "Year-over-Year Appreciation: {yoy:.1}%")?;
        writeln!(f, "Market Momentum:             {}\n", momentum(yoy))?;

        heading(f, "INVESTMENT INSIGHTS")?;
        writeln!(f, "{}\n", tier_insight(s.tier))?;
        writeln!(f, "For home buyers: {}", buyer_advice(s.tier))?;
        writeln!(f, "For investors:   {}", investor_advice(p))?;
        writeln!(f, "For renters:     {}\n", renter_advice(s.tier))?;

        heading(f, "COMPETITIVE POSITIONING")?;
        writeln!(f, "Ranks #{} out of {} neighborhoods.", s.rank, total)?;
        writeln!(f, "Percentile: {:.0}\n", s.percentile)?;

        writeln!(f, "{}", rule())?;
        writeln!(
            f,
            "This report is for informational purposes only and is not financial,\n\
             legal or investment advice. All data is subject to change."
        )?;
        writeln!(f, "{}", rule())
    }
}

pub fn render_report(profile: &NeighborhoodProfile, total: usize, generated: NaiveDate) -> String {
    Report {
        profile,
        total,
        generated,
    }
    .to_string()
}

/// Top and bottom `n` profiles of a rank-ordered slice, without duplicates.
pub fn sample_profiles(profiles: &[NeighborhoodProfile], n: usize) -> Vec<&NeighborhoodProfile> {
    let top = n.min(profiles.len());
    let bottom_start = profiles.len().saturating_sub(n).max(top);
    profiles[..top].iter().chain(&profiles[bottom_start..]).collect()
}

/// Writes `reports/<key>_report.txt` for the sampled profiles under `output_dir`.
#[tracing::instrument(skip_all, fields(sample_size = n))]
pub fn write_reports(
    output_dir: &Path,
    profiles: &[NeighborhoodProfile],
    n: usize,
    generated: NaiveDate,
) -> Result<Vec<PathBuf>, PipelineError> {
    let dir = output_dir.join(REPORTS_DIR);
    fs::create_dir_all(&dir).map_err(|source| PipelineError::Output {
        path: dir.clone(),
        source,
    })?;

    let mut written = Vec::new();
    for p in sample_profiles(profiles, n) {
        let path = dir.join(format!("{}_report.txt", p.neighborhood));
        fs::write(&path, render_report(p, profiles.len(), generated)).map_err(|source| {
            PipelineError::Output {
                path: path.clone(),
                source,
            }
        })?;
        written.push(path);
    }

    info!(reports = written.len(), dir = %dir.display(), "Wrote neighborhood reports");
    Ok(written)
}
