use crate::config::{AppConfig, ColumnConfig};
use crate::error::LoadError;
use crate::types::{Cell, FinancialRecord, JoinReport, JoinedRecord, LocationRecord, Table};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// The joined table plus what the presenter needs to know about it.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub records: Vec<JoinedRecord>,
    pub report: JoinReport,
    /// False when no joined row carries a domain.
    pub has_domain: bool,
}

pub fn load_dataset(config: &AppConfig) -> Result<Dataset, LoadError> {
    info!("Loading sources...");

    // 1. Load both tables
    let location_table = load_table(
        &config.input.location_file,
        config.input.location_sheet.as_deref(),
    )?;
    let financial_table = load_table(
        &config.input.financial_file,
        config.input.financial_sheet.as_deref(),
    )?;

    // 2. Extract typed records
    let locations = location_records(&location_table, &config.columns, &config.input.location_file)?;
    let financials = financial_records(&financial_table, &config.columns, &config.input.financial_file)?;
    info!("Loaded {} location rows and {} financial rows", locations.len(), financials.len());

    // 3. Join
    let (records, report) = join(&locations, &financials);
    // No domain column, or one with every cell blank, disables the domain filter.
    let has_domain = records.iter().any(|r| r.domain.is_some());
    info!("Joined {} rows", records.len());

    for (location_name, financial_name) in &report.near_misses {
        warn!(
            "Retailer '{}' (locations) and '{}' (financials) differ only in case or spacing; they were not joined",
            location_name, financial_name
        );
    }
    if !report.unmatched_locations.is_empty() {
        debug!("Retailers without financials: {:?}", report.unmatched_locations);
    }

    Ok(Dataset { records, report, has_domain })
}

/// Reads one sheet (or CSV file) and drops placeholder columns.
pub fn load_table(path: &Path, sheet: Option<&str>) -> Result<Table, LoadError> {
    let extension = path.extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| LoadError::UnsupportedFormat { path: path.to_path_buf() })?;

    let table = match extension.as_str() {
        "csv" => {
            if let Some(sheet) = sheet {
                debug!("Ignoring sheet '{}' for CSV source {:?}", sheet, path);
            }
            load_csv_table(path)?
        }
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => load_workbook_table(path, sheet)?,
        _ => return Err(LoadError::UnsupportedFormat { path: path.to_path_buf() }),
    };

    Ok(drop_unnamed_columns(table))
}

fn load_csv_table(path: &Path) -> Result<Table, LoadError> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| LoadError::SourceUnavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let parse_err = |e: csv::Error| LoadError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let headers = rdr.headers().map_err(parse_err)?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(parse_err)?;
        rows.push(record.iter().map(Cell::from_text).collect());
    }

    Ok(Table { headers, rows })
}

fn load_workbook_table(path: &Path, sheet: Option<&str>) -> Result<Table, LoadError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| LoadError::SourceUnavailable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let sheet_names = workbook.sheet_names();
    let sheet_name = select_sheet(&sheet_names, sheet).ok_or_else(|| LoadError::SheetNotFound {
        path: path.to_path_buf(),
        sheet: sheet.unwrap_or("<first>").to_string(),
        available: sheet_names.join(", "),
    })?;

    let range = workbook.worksheet_range(&sheet_name).map_err(|e| LoadError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header_row) => header_row.iter().map(|c| workbook_cell(c).as_text().unwrap_or_default()).collect(),
        None => Vec::new(),
    };
    let rows = rows.map(|row| row.iter().map(workbook_cell).collect()).collect();

    Ok(Table { headers, rows })
}

/// Picks the requested sheet, or the first one when none is configured.
pub fn select_sheet(available: &[String], requested: Option<&str>) -> Option<String> {
    match requested {
        Some(name) => available.iter().find(|s| s.as_str() == name).cloned(),
        None => available.first().cloned(),
    }
}

fn workbook_cell(data: &Data) -> Cell {
    match data {
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::from_text(s),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::from_text(s),
        Data::Error(_) | Data::Empty => Cell::Empty,
    }
}

/// Blank headers and "Unnamed..." headers are spreadsheet placeholders.
pub fn is_unnamed(header: &str) -> bool {
    let header = header.trim();
    header.is_empty() || header.starts_with("Unnamed")
}

pub fn drop_unnamed_columns(table: Table) -> Table {
    let keep: Vec<usize> = table.headers.iter().enumerate()
        .filter(|(_, h)| !is_unnamed(h))
        .map(|(i, _)| i)
        .collect();

    if keep.len() == table.headers.len() {
        return table;
    }

    let headers = keep.iter().map(|&i| table.headers[i].clone()).collect();
    let rows = table.rows.iter()
        .map(|row| keep.iter().map(|&i| row.get(i).cloned().unwrap_or(Cell::Empty)).collect())
        .collect();

    Table { headers, rows }
}

fn required_column(table: &Table, name: &str, path: &Path) -> Result<usize, LoadError> {
    table.column(name).ok_or_else(|| LoadError::MissingColumn {
        path: path.to_path_buf(),
        column: name.to_string(),
    })
}

pub fn location_records(table: &Table, columns: &ColumnConfig, path: &Path) -> Result<Vec<LocationRecord>, LoadError> {
    let retailer_idx = required_column(table, &columns.location_retailer, path)?;
    let lat_idx = required_column(table, &columns.latitude, path)?;
    let lon_idx = required_column(table, &columns.longitude, path)?;
    let address_idx = table.column(&columns.address);
    let city_idx = table.column(&columns.city);
    let domain_idx = table.column(&columns.domain);

    let optional_text = |row: usize, idx: Option<usize>| idx.and_then(|i| table.cell(row, i).as_text());

    let mut records = Vec::new();
    for row in 0..table.rows.len() {
        let retailer = match table.cell(row, retailer_idx).as_text() {
            Some(name) => name,
            None => continue,
        };

        records.push(LocationRecord {
            retailer,
            address: optional_text(row, address_idx),
            city: optional_text(row, city_idx),
            latitude: table.cell(row, lat_idx).as_f64(),
            longitude: table.cell(row, lon_idx).as_f64(),
            domain: optional_text(row, domain_idx),
        });
    }

    Ok(records)
}

pub fn financial_records(table: &Table, columns: &ColumnConfig, path: &Path) -> Result<Vec<FinancialRecord>, LoadError> {
    let retailer_idx = required_column(table, &columns.financial_retailer, path)?;
    let turnover_idx = required_column(table, &columns.turnover, path)?;
    let employees_idx = required_column(table, &columns.employees, path)?;

    let mut records = Vec::new();
    for row in 0..table.rows.len() {
        let retailer = match table.cell(row, retailer_idx).as_text() {
            Some(name) => name,
            None => continue,
        };

        let turnover = table.cell(row, turnover_idx).as_f64();
        let employees = table.cell(row, employees_idx).as_f64();
        match (turnover, employees) {
            (Some(turnover), Some(employees)) => records.push(FinancialRecord { retailer, turnover, employees }),
            _ => warn!("Skipping financial row for '{}': turnover or employee figure is not numeric", retailer),
        }
    }

    Ok(records)
}

/// Inner join on exact retailer name. Every matching pair is emitted, in
/// location order and then financial order.
pub fn join(locations: &[LocationRecord], financials: &[FinancialRecord]) -> (Vec<JoinedRecord>, JoinReport) {
    let mut by_name: HashMap<&str, Vec<&FinancialRecord>> = HashMap::new();
    for fin in financials {
        by_name.entry(fin.retailer.as_str()).or_default().push(fin);
    }

    let mut joined = Vec::new();
    let mut matched: HashSet<&str> = HashSet::new();
    let mut unmatched_locations = Vec::new();

    for loc in locations {
        match by_name.get(loc.retailer.as_str()) {
            Some(fins) => {
                matched.insert(loc.retailer.as_str());
                joined.extend(fins.iter().map(|fin| JoinedRecord::new(loc, fin)));
            }
            None => {
                if !unmatched_locations.contains(&loc.retailer) {
                    unmatched_locations.push(loc.retailer.clone());
                }
            }
        }
    }

    let mut unmatched_financials: Vec<String> = Vec::new();
    for fin in financials {
        if !matched.contains(fin.retailer.as_str()) && !unmatched_financials.contains(&fin.retailer) {
            unmatched_financials.push(fin.retailer.clone());
        }
    }

    let mut near_misses = Vec::new();
    for loc_name in &unmatched_locations {
        let key = fold_name(loc_name);
        for fin_name in &unmatched_financials {
            if fold_name(fin_name) == key {
                near_misses.push((loc_name.clone(), fin_name.clone()));
            }
        }
    }

    let report = JoinReport { unmatched_locations, unmatched_financials, near_misses };
    (joined, report)
}

/// Case- and whitespace-insensitive form, used only for diagnostics.
fn fold_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Identity of the two source files; any change forces a reload.
#[derive(Debug, Clone, PartialEq)]
struct SourceStamp(Vec<(PathBuf, u64, Option<SystemTime>)>);

impl SourceStamp {
    fn of(paths: &[&Path]) -> Result<Self, LoadError> {
        let mut parts = Vec::new();
        for path in paths {
            let meta = fs::metadata(path).map_err(|e| LoadError::SourceUnavailable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            parts.push((path.to_path_buf(), meta.len(), meta.modified().ok()));
        }
        Ok(SourceStamp(parts))
    }
}

/// Holds the last joined table while the source files are unchanged.
#[derive(Default)]
pub struct DatasetCache {
    slot: Mutex<Option<(SourceStamp, Arc<Dataset>)>>,
}

impl DatasetCache {
    pub fn get_or_load(&self, config: &AppConfig) -> Result<Arc<Dataset>, LoadError> {
        let stamp = SourceStamp::of(&[&config.input.location_file, &config.input.financial_file])?;

        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((cached, dataset)) = slot.as_ref() {
            if *cached == stamp {
                debug!("Using cached dataset");
                return Ok(Arc::clone(dataset));
            }
        }

        let dataset = Arc::new(load_dataset(config)?);
        *slot = Some((stamp, Arc::clone(&dataset)));
        Ok(dataset)
    }
}
