use chrono::NaiveDateTime;

use super::columns::{ColumnMap, ColumnRule, Pattern};
use super::keywords::{Category, CategoryTable, Flags};
use super::{CleanMetrics, Cleaned, DropReason, Source, coordinate_field, timestamp_field};
use crate::geo::{LATITUDE_RANGE, LONGITUDE_RANGE, NearestNeighborhood};
use crate::loader::RawTable;
use crate::neighborhood::NeighborhoodKey;

/// Response times at or above this many days are treated as data errors.
pub const MAX_RESPONSE_DAYS: f64 = 365.0;

const PENDING_STATUSES: &[&str] = &["open", "new", "pending", "in progress", "assigned"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceCategory {
    Streetlight,
    Pothole,
    Graffiti,
    Dumping,
}

impl Category for ServiceCategory {
    const ALL: &'static [Self] = &[
        ServiceCategory::Streetlight,
        ServiceCategory::Pothole,
        ServiceCategory::Graffiti,
        ServiceCategory::Dumping,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            ServiceCategory::Streetlight => "streetlight",
            ServiceCategory::Pothole => "pothole",
            ServiceCategory::Graffiti => "graffiti",
            ServiceCategory::Dumping => "dumping",
        }
    }
}

pub static SERVICE_CATEGORIES: CategoryTable<ServiceCategory> = CategoryTable::new(&[
    (
        ServiceCategory::Streetlight,
        &["street light", "streetlight", "light out", "lamp out", "lighting", "illumination"],
    ),
    (
        ServiceCategory::Pothole,
        &["pothole", "pot hole", "street repair", "pavement"],
    ),
    (ServiceCategory::Graffiti, &["graffiti"]),
    (ServiceCategory::Dumping, &["illegal dumping", "dumping", "debris"]),
]);

static SERVICE_COLUMNS: &[ColumnRule] = &[
    ColumnRule {
        canonical: "case_id",
        patterns: &[
            Pattern::Exact("CASE_ID"),
            Pattern::Exact("SERVICE_ID"),
            Pattern::Exact("OBJECTID"),
        ],
    },
    ColumnRule {
        canonical: "case_type",
        patterns: &[
            Pattern::Exact("CASE_SUMMARY"),
            Pattern::Exact("CASE_TYPE"),
            Pattern::Exact("SERVICE_TYPE"),
            Pattern::Exact("REQUEST_TYPE"),
        ],
    },
    ColumnRule {
        canonical: "topic",
        patterns: &[Pattern::AllOf(&["TOPIC"])],
    },
    ColumnRule {
        canonical: "status",
        patterns: &[Pattern::Exact("CASE_STATUS"), Pattern::AllOf(&["STATUS"])],
    },
    ColumnRule {
        canonical: "opened_at",
        patterns: &[
            Pattern::AllOf(&["OPEN", "DATE"]),
            Pattern::AllOf(&["CREATE", "DATE"]),
            Pattern::AllOf(&["SUBMIT", "DATE"]),
            Pattern::AllOf(&["OPEN", "TIME"]),
            Pattern::AllOf(&["CREATE", "TIME"]),
            Pattern::AllOf(&["SUBMIT", "TIME"]),
        ],
    },
    ColumnRule {
        canonical: "closed_at",
        patterns: &[
            Pattern::AllOf(&["CLOSE", "DATE"]),
            Pattern::AllOf(&["RESOLVE", "DATE"]),
            Pattern::AllOf(&["COMPLETE", "DATE"]),
            Pattern::AllOf(&["CLOSE", "TIME"]),
            Pattern::AllOf(&["RESOLVE", "TIME"]),
            Pattern::AllOf(&["COMPLETE", "TIME"]),
        ],
    },
    ColumnRule {
        canonical: "neighborhood",
        patterns: &[
            Pattern::Exact("NEIGHBORHOOD"),
            Pattern::Exact("NEIGHBORHOOD_ID"),
            Pattern::AllOf(&["NEIGHBORHOOD", "NAME"]),
            Pattern::AllOf(&["NEIGHBORHOOD"]),
        ],
    },
    ColumnRule {
        canonical: "latitude",
        patterns: &[Pattern::Exact("LATITUDE"), Pattern::Exact("LAT"), Pattern::Exact("GEO_LAT")],
    },
    ColumnRule {
        canonical: "longitude",
        patterns: &[
            Pattern::Exact("LONGITUDE"),
            Pattern::Exact("LON"),
            Pattern::Exact("LNG"),
            Pattern::Exact("GEO_LON"),
        ],
    },
];

/// A cleaned 311 service request.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub case_id: Option<String>,
    pub case_type: Option<String>,
    pub topic: Option<String>,
    pub status: Option<String>,
    pub opened_at: Option<NaiveDateTime>,
    pub closed_at: Option<NaiveDateTime>,
    pub neighborhood: NeighborhoodKey,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub neighborhood_inferred: bool,
    pub categories: Flags<ServiceCategory>,
    pub response_days: Option<f64>,
}

impl ServiceRequest {
    #[cfg(test)]
    pub fn new(neighborhood: NeighborhoodKey, case_type: &str, status: &str) -> Self {
        Self {
            case_id: None,
            case_type: Some(case_type.to_string()),
            topic: None,
            status: Some(status.to_string()),
            opened_at: None,
            closed_at: None,
            neighborhood,
            latitude: None,
            longitude: None,
            neighborhood_inferred: false,
            categories: SERVICE_CATEGORIES.classify([case_type]),
            response_days: None,
        }
    }

    pub fn is(&self, category: ServiceCategory) -> bool {
        self.categories.contains(category)
    }

    pub fn is_pending(&self) -> bool {
        self.status.as_deref().is_some_and(is_pending_status)
    }
}

pub fn is_pending_status(status: &str) -> bool {
    let status = status.trim().to_lowercase();
    PENDING_STATUSES.contains(&status.as_str())
}

/// Fractional days between open and close, when inside `[0, MAX_RESPONSE_DAYS)`.
pub fn response_days(opened: NaiveDateTime, closed: NaiveDateTime) -> Option<f64> {
    let days = (closed - opened).num_seconds() as f64 / 86_400.0;
    (0.0..MAX_RESPONSE_DAYS).contains(&days).then_some(days)
}

/// Cleans 311 requests.
///
/// Rows without a neighborhood label but with coordinates are placed in the
/// neighborhood of the nearest reference point in `locator`, if given.
#[tracing::instrument(skip_all, fields(rows = table.len()))]
pub fn clean_service_requests(
    table: &RawTable,
    locator: Option<&NearestNeighborhood>,
) -> Cleaned<ServiceRequest> {
    let columns = ColumnMap::resolve(&table.headers, SERVICE_COLUMNS);
    let mut metrics = CleanMetrics::new(Source::ServiceRequests, table);
    let mut records = Vec::with_capacity(table.len());
    let mut inferred = 0usize;

    for row in 0..table.len() {
        let get = |name: &str| columns.value(table, row, name);

        let opened_at = timestamp_field(get("opened_at"), "opened_at", &mut metrics);
        let closed_at = timestamp_field(get("closed_at"), "closed_at", &mut metrics);
        let latitude = coordinate_field(get("latitude"), "latitude", &LATITUDE_RANGE, &mut metrics);
        let longitude = coordinate_field(get("longitude"), "longitude", &LONGITUDE_RANGE, &mut metrics);

        let labelled = get("neighborhood").and_then(NeighborhoodKey::parse);
        let (neighborhood, neighborhood_inferred) = match labelled {
            Some(key) => (Some(key), false),
            None => {
                let located = match (locator, latitude, longitude) {
                    (Some(locator), Some(lat), Some(lon)) => locator.nearest(lat, lon).cloned(),
                    _ => None,
                };
                (located, true)
            }
        };
        let Some(neighborhood) = neighborhood else {
            metrics.drop_row(DropReason::MissingNeighborhood);
            continue;
        };
        if neighborhood_inferred {
            inferred += 1;
        }

        let response_days = match (opened_at, closed_at) {
            (Some(opened), Some(closed)) => {
                let days = response_days(opened, closed);
                if days.is_none() {
                    metrics.unparsed("invalid_response_time");
                }
                days
            }
            _ => None,
        };

        let case_type = get("case_type").map(str::to_string);
        let topic = get("topic").map(str::to_string);
        let categories =
            SERVICE_CATEGORIES.classify(topic.iter().chain(case_type.iter()).map(String::as_str));

        records.push(ServiceRequest {
            case_id: get("case_id").map(str::to_string),
            case_type,
            topic,
            status: get("status").map(str::to_string),
            opened_at,
            closed_at,
            neighborhood,
            latitude,
            longitude,
            neighborhood_inferred,
            categories,
            response_days,
        });
    }

    if inferred > 0 {
        tracing::info!(inferred, "Assigned neighborhoods from nearest incident");
    }

    Cleaned::new(records, metrics)
}
