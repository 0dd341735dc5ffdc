use super::columns::{ColumnMap, ColumnRule, Pattern};
use super::keywords::{Category, CategoryTable, Flags};
use super::{CleanMetrics, Cleaned, DropReason, Source, numeric_field, parse_number};
use crate::loader::RawTable;
use crate::neighborhood::NeighborhoodKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepartmentCategory {
    PublicSafety,
    PublicWorks,
}

impl Category for DepartmentCategory {
    const ALL: &'static [Self] = &[DepartmentCategory::PublicSafety, DepartmentCategory::PublicWorks];

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            DepartmentCategory::PublicSafety => "public_safety",
            DepartmentCategory::PublicWorks => "public_works",
        }
    }
}

pub static DEPARTMENT_CATEGORIES: CategoryTable<DepartmentCategory> = CategoryTable::new(&[
    (DepartmentCategory::PublicSafety, &["police", "safety", "fire", "sheriff"]),
    (
        DepartmentCategory::PublicWorks,
        &["public works", "transportation", "infrastructure"],
    ),
]);

static BUDGET_COLUMNS: &[ColumnRule] = &[
    ColumnRule {
        canonical: "department",
        patterns: &[Pattern::Exact("DEPARTMENT"), Pattern::AllOf(&["DEPARTMENT"]), Pattern::AllOf(&["AGENCY"])],
    },
    ColumnRule {
        canonical: "amount",
        patterns: &[Pattern::Exact("AMOUNT"), Pattern::AllOf(&["AMOUNT"])],
    },
    ColumnRule {
        canonical: "year",
        patterns: &[Pattern::Exact("YEAR"), Pattern::Exact("FISCAL_YEAR"), Pattern::AllOf(&["YEAR"])],
    },
    ColumnRule {
        canonical: "neighborhood",
        patterns: &[Pattern::Exact("NEIGHBORHOOD"), Pattern::AllOf(&["NEIGHBORHOOD"])],
    },
];

/// One budget transaction.
#[derive(Debug, Clone)]
pub struct BudgetRecord {
    pub department: Option<String>,
    pub amount: f64,
    pub year: Option<i32>,
    pub neighborhood: Option<NeighborhoodKey>,
    pub categories: Flags<DepartmentCategory>,
}

impl BudgetRecord {
    #[cfg(test)]
    pub fn new(department: &str, amount: f64, neighborhood: Option<NeighborhoodKey>) -> Self {
        Self {
            department: Some(department.to_string()),
            amount,
            year: None,
            neighborhood,
            categories: DEPARTMENT_CATEGORIES.classify([department]),
        }
    }

    pub fn is(&self, category: DepartmentCategory) -> bool {
        self.categories.contains(category)
    }
}

fn parse_year(raw: &str) -> Option<i32> {
    parse_number(raw)
        .filter(|y| y.fract() == 0.0 && (1000.0..=9999.0).contains(y))
        .map(|y| y as i32)
}

/// Cleans budget transactions. Only `amount` is required.
#[tracing::instrument(skip_all, fields(rows = table.len()))]
pub fn clean_budget(table: &RawTable, since_year: Option<i32>) -> Cleaned<BudgetRecord> {
    let columns = ColumnMap::resolve(&table.headers, BUDGET_COLUMNS);
    let mut metrics = CleanMetrics::new(Source::Budget, table);
    let mut records = Vec::with_capacity(table.len());

    for row in 0..table.len() {
        let get = |name: &str| columns.value(table, row, name);

        let Some(amount) = numeric_field(get("amount"), "amount", &mut metrics) else {
            metrics.drop_row(DropReason::MissingAmount);
            continue;
        };

        let year = get("year").and_then(|raw| {
            let year = parse_year(raw);
            if year.is_none() {
                metrics.unparsed("year");
            }
            year
        });
        if let Some(since) = since_year {
            if year.is_none_or(|y| y < since) {
                metrics.drop_row(DropReason::OutOfScope);
                continue;
            }
        }

        let department = get("department").map(str::to_string);
        let categories = DEPARTMENT_CATEGORIES.classify(department.as_deref());

        records.push(BudgetRecord {
            department,
            amount,
            year,
            neighborhood: get("neighborhood").and_then(NeighborhoodKey::parse),
            categories,
        });
    }

    Cleaned::new(records, metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_amount_is_required_and_currency_stripped() {
        let raw = table(
            &["Department", "Amount", "Year"],
            &[
                &["Police Department", "$1,500.25", "2024"],
                &["Parks", "", "2024"],
                &["Parks", "n/a", "2024"],
            ],
        );

        let cleaned = clean_budget(&raw, None);
        assert_eq!(cleaned.records.len(), 1);
        assert_eq!(cleaned.records[0].amount, 1500.25);
        assert_eq!(cleaned.records[0].year, Some(2024));
        assert!(cleaned.records[0].is(DepartmentCategory::PublicSafety));
        assert_eq!(cleaned.metrics.dropped_for(DropReason::MissingAmount), 2);
        assert_eq!(cleaned.metrics.unparsed_fields["amount"], 1);
    }

    #[test]
    fn test_since_year_scope() {
        let raw = table(
            &["Department", "Amount", "Year"],
            &[
                &["Public Works", "10", "2023"],
                &["Public Works", "10", "2024"],
                &["Public Works", "10", ""],
            ],
        );

        let cleaned = clean_budget(&raw, Some(2024));
        assert_eq!(cleaned.records.len(), 1);
        assert!(cleaned.records[0].is(DepartmentCategory::PublicWorks));
        assert_eq!(cleaned.metrics.dropped_for(DropReason::OutOfScope), 2);
    }

    #[test]
    fn test_year_is_optional_without_scope() {
        let raw = table(&["Department", "Amount"], &[&["Fire", "5"]]);
        let cleaned = clean_budget(&raw, None);
        assert_eq!(cleaned.records.len(), 1);
        assert!(cleaned.records[0].year.is_none());
        assert!(cleaned.records[0].neighborhood.is_none());
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2024"), Some(2024));
        assert_eq!(parse_year("2024.0"), Some(2024));
        assert_eq!(parse_year("24.5"), None);
        assert_eq!(parse_year("FY24"), None);
    }
}
