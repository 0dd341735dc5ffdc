use chrono::{Datelike, NaiveDateTime};

use super::columns::{ColumnMap, ColumnRule, Pattern};
use super::keywords::{Category, CategoryTable, Flags};
use super::{CleanMetrics, Cleaned, DropReason, Source, coordinate_field, parse_flag, timestamp_field};
use crate::geo::{LATITUDE_RANGE, LONGITUDE_RANGE};
use crate::loader::RawTable;
use crate::neighborhood::NeighborhoodKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrimeCategory {
    Property,
    Violent,
}

impl Category for CrimeCategory {
    const ALL: &'static [Self] = &[CrimeCategory::Property, CrimeCategory::Violent];

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            CrimeCategory::Property => "property",
            CrimeCategory::Violent => "violent",
        }
    }
}

pub static CRIME_CATEGORIES: CategoryTable<CrimeCategory> = CategoryTable::new(&[
    (
        CrimeCategory::Property,
        &["larceny", "theft", "burglary", "auto-theft", "motor-vehicle-theft", "arson"],
    ),
    (CrimeCategory::Violent, &["assault", "robbery", "murder", "homicide"]),
]);

static CRIME_COLUMNS: &[ColumnRule] = &[
    ColumnRule {
        canonical: "incident_id",
        patterns: &[Pattern::Exact("INCIDENT_ID"), Pattern::Exact("OFFENSE_ID")],
    },
    ColumnRule {
        canonical: "offense_type",
        patterns: &[Pattern::Exact("OFFENSE_TYPE_ID"), Pattern::Exact("OFFENSE_TYPE")],
    },
    ColumnRule {
        canonical: "offense_category",
        patterns: &[
            Pattern::Exact("OFFENSE_CATEGORY_ID"),
            Pattern::Exact("OFFENSE_CATEGORY"),
            Pattern::AllOf(&["OFFENSE", "CATEGORY"]),
        ],
    },
    ColumnRule {
        canonical: "occurred_at",
        patterns: &[
            Pattern::Exact("FIRST_OCCURRENCE_DATE"),
            Pattern::Exact("OCCURRED_AT"),
            Pattern::AllOf(&["OCCURRENCE", "DATE"]),
        ],
    },
    ColumnRule {
        canonical: "reported_at",
        patterns: &[Pattern::Exact("REPORTED_DATE"), Pattern::AllOf(&["REPORTED"])],
    },
    ColumnRule {
        canonical: "latitude",
        patterns: &[Pattern::Exact("GEO_LAT"), Pattern::Exact("LATITUDE"), Pattern::Exact("LAT")],
    },
    ColumnRule {
        canonical: "longitude",
        patterns: &[
            Pattern::Exact("GEO_LON"),
            Pattern::Exact("LONGITUDE"),
            Pattern::Exact("LON"),
            Pattern::Exact("LNG"),
        ],
    },
    ColumnRule {
        canonical: "neighborhood",
        patterns: &[
            Pattern::Exact("NEIGHBORHOOD_ID"),
            Pattern::Exact("NEIGHBORHOOD"),
            Pattern::AllOf(&["NEIGHBORHOOD"]),
        ],
    },
    ColumnRule {
        canonical: "is_crime",
        patterns: &[Pattern::Exact("IS_CRIME")],
    },
    ColumnRule {
        canonical: "is_traffic",
        patterns: &[Pattern::Exact("IS_TRAFFIC")],
    },
];

/// A cleaned crime incident.
#[derive(Debug, Clone)]
pub struct CrimeRecord {
    pub incident_id: Option<String>,
    pub offense_type: Option<String>,
    pub offense_category: Option<String>,
    pub occurred_at: Option<NaiveDateTime>,
    pub reported_at: Option<NaiveDateTime>,
    pub neighborhood: NeighborhoodKey,
    pub latitude: f64,
    pub longitude: f64,
    pub is_traffic: bool,
    pub categories: Flags<CrimeCategory>,
}

impl CrimeRecord {
    #[cfg(test)]
    /// Builds a record from an offense category, classifying it on the way.
    pub fn new(
        neighborhood: NeighborhoodKey,
        offense_category: &str,
        occurred_at: Option<NaiveDateTime>,
    ) -> Self {
        Self {
            incident_id: None,
            offense_type: None,
            offense_category: Some(offense_category.to_string()),
            occurred_at,
            reported_at: None,
            neighborhood,
            latitude: 0.0,
            longitude: 0.0,
            is_traffic: false,
            categories: CRIME_CATEGORIES.classify([offense_category]),
        }
    }

    pub fn is(&self, category: CrimeCategory) -> bool {
        self.categories.contains(category)
    }
}

/// Keeps actual crimes with a neighborhood and coordinates.
///
/// Rows flagged `is_crime = 0` drop as [`DropReason::NotACrime`]; an extract
/// without an `is_crime` column is taken to contain crimes only. When
/// `since_year` is set, undated rows and rows before it drop as
/// [`DropReason::OutOfScope`].
#[tracing::instrument(skip_all, fields(rows = table.len()))]
pub fn clean_crime(table: &RawTable, since_year: Option<i32>) -> Cleaned<CrimeRecord> {
    let columns = ColumnMap::resolve(&table.headers, CRIME_COLUMNS);
    let mut metrics = CleanMetrics::new(Source::Crime, table);
    let mut records = Vec::with_capacity(table.len());

    if !table.is_empty() && !columns.has("neighborhood") {
        tracing::warn!("Crime extract has no neighborhood column; every row will be dropped");
    }

    for row in 0..table.len() {
        let get = |name: &str| columns.value(table, row, name);

        if columns.has("is_crime") {
            let is_crime = get("is_crime").and_then(|raw| {
                let flag = parse_flag(raw);
                if flag.is_none() {
                    metrics.unparsed("is_crime");
                }
                flag
            });
            if is_crime != Some(true) {
                metrics.drop_row(DropReason::NotACrime);
                continue;
            }
        }

        let occurred_at = timestamp_field(get("occurred_at"), "occurred_at", &mut metrics);
        let reported_at = timestamp_field(get("reported_at"), "reported_at", &mut metrics);
        let latitude = coordinate_field(get("latitude"), "latitude", &LATITUDE_RANGE, &mut metrics);
        let longitude = coordinate_field(get("longitude"), "longitude", &LONGITUDE_RANGE, &mut metrics);
        let neighborhood = get("neighborhood").and_then(NeighborhoodKey::parse);

        let (Some(neighborhood), Some(latitude), Some(longitude)) = (neighborhood, latitude, longitude)
        else {
            metrics.drop_row(DropReason::MissingLocation);
            continue;
        };

        if let Some(year) = since_year {
            if occurred_at.is_none_or(|ts| ts.year() < year) {
                metrics.drop_row(DropReason::OutOfScope);
                continue;
            }
        }

        let offense_category = get("offense_category").map(str::to_string);
        let offense_type = get("offense_type").map(str::to_string);
        let categories = CRIME_CATEGORIES
            .classify(offense_category.iter().chain(offense_type.iter()).map(String::as_str));
        let is_traffic = get("is_traffic").and_then(parse_flag).unwrap_or(false);

        records.push(CrimeRecord {
            incident_id: get("incident_id").map(str::to_string),
            offense_type,
            offense_category,
            occurred_at,
            reported_at,
            neighborhood,
            latitude,
            longitude,
            is_traffic,
            categories,
        });
    }

    Cleaned::new(records, metrics)
}
