use serde::Serialize;
use std::collections::BTreeSet;

/// One spreadsheet cell after loading.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// CSV fields arrive as text; blank means empty.
    pub fn from_text(s: &str) -> Self {
        if s.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) if s.trim().is_empty() => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(n) => Some(format_number(*n)),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Empty => None,
            Cell::Number(n) if n.is_finite() => Some(*n),
            Cell::Number(_) => None,
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }
}

/// Header row plus data rows of one sheet.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&Cell::Empty)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationRecord {
    pub retailer: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinancialRecord {
    pub retailer: String,
    pub turnover: f64,  // mil EUR
    pub employees: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedRecord {
    pub retailer: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub domain: Option<String>,
    pub turnover: f64,
    pub employees: f64,
}

impl JoinedRecord {
    pub fn new(location: &LocationRecord, financial: &FinancialRecord) -> Self {
        Self {
            retailer: location.retailer.clone(),
            address: location.address.clone(),
            city: location.city.clone(),
            latitude: location.latitude,
            longitude: location.longitude,
            domain: location.domain.clone(),
            turnover: financial.turnover,
            employees: financial.employees,
        }
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub domain: Option<String>,
    pub retailer: String,
    pub store_count: usize,
    pub turnover: f64,
    pub employees: f64,
}

/// Join diagnostics: names that found no partner on the other side.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JoinReport {
    pub unmatched_locations: Vec<String>,
    pub unmatched_financials: Vec<String>,
    /// (location name, financial name) pairs equal after case/whitespace folding.
    pub near_misses: Vec<(String, String)>,
}

/// A filter dimension. `All` is "no filter configured"; `Only` with an
/// empty set is an explicit empty selection and admits nothing.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Selection {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl Selection {
    pub fn only<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Only(values.into_iter().map(Into::into).collect())
    }

    pub fn admits(&self, value: Option<&str>) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(set) => value.is_some_and(|v| set.contains(v)),
        }
    }

    pub fn is_selected(&self, value: &str) -> bool {
        self.admits(Some(value))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filters {
    pub domains: Selection,
    pub retailers: Selection,
}

/// Distinct values offered by the sidebar, in first-seen order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FilterOptions {
    pub domains: Vec<String>,
    pub retailers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub lat: f64,
    pub lon: f64,
    pub color: String,
    pub popup: String,
}

/// Integral values print without a trailing ".0".
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
