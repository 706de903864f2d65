use crate::assets::LogoResolver;
use crate::config::{AppConfig, MapConfig};
use crate::data::Dataset;
use crate::processing::{aggregate, domain_colors, effective_filters, filter_options, filter_records, map_center, marker_color};
use crate::types::{format_number, FilterOptions, Filters, JoinReport, JoinedRecord, MapMarker, Selection, SummaryRow};
use askama::Template;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

pub const TITLE: &str = "Retailer Locations Map with Logos and Financials";
pub const NO_DATA_MESSAGE: &str = "No retailers have both location and financial data.";
pub const NO_MATCH_MESSAGE: &str = "No data matches your filters.";

/// Summary table column labels, in display order.
pub const SUMMARY_LABELS: [&str; 5] = [
    "Domain",
    "Retailer Name",
    "Number of Stores",
    "Turnover 2023 (mil EUR)",
    "Avg employees number",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardStatus {
    Ok,
    /// The join produced nothing.
    NoData,
    /// Rows exist but the current filters exclude all of them.
    NoMatch,
}

/// Everything one render of the page needs.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub status: DashboardStatus,
    pub location_count: usize,
    pub summary: Vec<SummaryRow>,
    pub center: (f64, f64),
    pub zoom: u8,
    pub markers: Vec<MapMarker>,
    pub options: FilterOptions,
    pub filters: Filters,
    pub has_domain: bool,
    pub report: JoinReport,
}

pub fn build_dashboard(config: &AppConfig, dataset: &Dataset, filters: &Filters, logos: &LogoResolver) -> Dashboard {
    let options = filter_options(&dataset.records);
    let filters = effective_filters(filters, &options);
    let filtered = filter_records(&dataset.records, &filters, dataset.has_domain);
    let summary = aggregate(&filtered);
    debug!("{} of {} rows pass the filters", filtered.len(), dataset.records.len());

    let status = if dataset.records.is_empty() {
        DashboardStatus::NoData
    } else if filtered.is_empty() {
        DashboardStatus::NoMatch
    } else {
        DashboardStatus::Ok
    };

    // Colors follow the unfiltered domain list.
    let colors = domain_colors(&options.domains, &config.map.palette);
    let markers = if status == DashboardStatus::Ok {
        build_markers(&filtered, &colors, logos)
    } else {
        Vec::new()
    };

    Dashboard {
        status,
        location_count: filtered.len(),
        summary,
        center: map_center(&filtered, config.map.default_center),
        zoom: config.map.zoom_start,
        markers,
        options,
        filters,
        has_domain: dataset.has_domain,
        report: dataset.report.clone(),
    }
}

fn build_markers(records: &[&JoinedRecord], colors: &HashMap<String, String>, logos: &LogoResolver) -> Vec<MapMarker> {
    // One lookup per retailer, not per store.
    let mut logo_cache: HashMap<&str, Option<String>> = HashMap::new();
    let mut markers = Vec::new();

    for record in records {
        let Some((lat, lon)) = record.coordinates() else {
            continue;
        };
        let logo = logo_cache
            .entry(record.retailer.as_str())
            .or_insert_with(|| logos.img_tag(&record.retailer));

        markers.push(MapMarker {
            lat,
            lon,
            color: marker_color(colors, record.domain.as_deref()).to_string(),
            popup: popup_html(record, logo.as_deref()),
        });
    }

    markers
}

pub fn popup_html(record: &JoinedRecord, logo: Option<&str>) -> String {
    let text = |v: &Option<String>| escape_html(v.as_deref().unwrap_or(""));
    format!(
        "<b>{}</b><br>\n<i>{}</i><br>\n{}, {}<br>\nTurnover: <b>{}</b> mil EUR<br>\nEmployees: <b>{}</b><br>\n{}",
        escape_html(&record.retailer),
        text(&record.domain),
        text(&record.address),
        text(&record.city),
        format_number(record.turnover),
        format_number(record.employees),
        logo.unwrap_or(""),
    )
}

/// Popups are built here rather than in a template, so they go through
/// askama's HTML escaper directly.
pub fn escape_html(text: &str) -> String {
    askama::MarkupDisplay::new_unsafe(text, askama::Html).to_string()
}

pub struct OptionItem {
    pub value: String,
    pub selected: bool,
}

pub struct SummaryLine {
    pub domain: String,
    pub retailer: String,
    pub stores: usize,
    pub turnover: String,
    pub employees: String,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardPage {
    title: &'static str,
    interactive: bool,
    has_domain: bool,
    domain_options: Vec<OptionItem>,
    retailer_options: Vec<OptionItem>,
    headline: String,
    message: String,
    labels: [&'static str; 5],
    summary: Vec<SummaryLine>,
    near_misses: Vec<String>,
    show_map: bool,
    center_lat: f64,
    center_lon: f64,
    zoom: u8,
    width: u32,
    height: u32,
    markers_json: String,
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorPage<'a> {
    title: &'static str,
    message: &'a str,
}

fn option_items(values: &[String], selection: &Selection) -> Vec<OptionItem> {
    values.iter()
        .map(|v| OptionItem { value: v.clone(), selected: selection.is_selected(v) })
        .collect()
}

/// Renders the dashboard page. `interactive` adds the filter form, which
/// only works when served.
pub fn render_page(dashboard: &Dashboard, map: &MapConfig, interactive: bool) -> anyhow::Result<String> {
    let message = match dashboard.status {
        DashboardStatus::Ok => String::new(),
        DashboardStatus::NoData => NO_DATA_MESSAGE.to_string(),
        DashboardStatus::NoMatch => NO_MATCH_MESSAGE.to_string(),
    };

    let summary = dashboard.summary.iter()
        .map(|row| SummaryLine {
            domain: row.domain.clone().unwrap_or_default(),
            retailer: row.retailer.clone(),
            stores: row.store_count,
            turnover: format_number(row.turnover),
            employees: format_number(row.employees),
        })
        .collect();

    // "</" inside a script block would end it early.
    let markers_json = serde_json::to_string(&dashboard.markers)?.replace("</", "<\\/");

    let page = DashboardPage {
        title: TITLE,
        interactive,
        has_domain: dashboard.has_domain,
        domain_options: option_items(&dashboard.options.domains, &dashboard.filters.domains),
        retailer_options: option_items(&dashboard.options.retailers, &dashboard.filters.retailers),
        headline: format!(
            "Showing {} locations (only retailers with both location and financials data).",
            dashboard.location_count
        ),
        message,
        labels: SUMMARY_LABELS,
        summary,
        near_misses: dashboard.report.near_misses.iter()
            .map(|(loc, fin)| format!("'{}' (locations) vs '{}' (financials)", loc, fin))
            .collect(),
        show_map: dashboard.status == DashboardStatus::Ok,
        center_lat: dashboard.center.0,
        center_lon: dashboard.center.1,
        zoom: dashboard.zoom,
        width: map.width,
        height: map.height,
        markers_json,
    };

    Ok(page.render()?)
}

pub fn render_error_page(message: &str) -> String {
    ErrorPage { title: TITLE, message }
        .render()
        .unwrap_or_else(|_| escape_html(message))
}
