use crate::analyzers::types::Tier;

/// Converts a Civic Value Index (0–100) into its tier.
///
/// | Range   | Tier               |
/// |---------|--------------------|
/// | > 70    | `excellent_value`  |
/// | > 50    | `good_value`       |
/// | <= 50   | `opportunity_zone` |
pub fn tier(index: f64) -> Tier {
    match index {
        i if i > 70.0 => Tier::ExcellentValue,
        i if i > 50.0 => Tier::GoodValue,
        _ => Tier::OpportunityZone,
    }
}
