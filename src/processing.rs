use crate::types::{FilterOptions, Filters, JoinedRecord, Selection, SummaryRow};
use std::collections::HashMap;

/// Marker color for rows without a domain, or with one outside the palette map.
pub const FALLBACK_COLOR: &str = "blue";

/// Distinct domains and retailers of the unfiltered table, first-seen order.
pub fn filter_options(records: &[JoinedRecord]) -> FilterOptions {
    let mut options = FilterOptions::default();
    for record in records {
        if let Some(domain) = &record.domain {
            if !options.domains.contains(domain) {
                options.domains.push(domain.clone());
            }
        }
        if !options.retailers.contains(&record.retailer) {
            options.retailers.push(record.retailer.clone());
        }
    }
    options
}

/// A submitted selection that lists every available value is the same as
/// no filter, so rows without a value (null domains) still pass.
pub fn collapse_full_selection(selection: &Selection, available: &[String]) -> Selection {
    match selection {
        Selection::Only(set) if set.len() == available.len() && available.iter().all(|v| set.contains(v)) => Selection::All,
        other => other.clone(),
    }
}

pub fn effective_filters(filters: &Filters, options: &FilterOptions) -> Filters {
    Filters {
        domains: collapse_full_selection(&filters.domains, &options.domains),
        retailers: collapse_full_selection(&filters.retailers, &options.retailers),
    }
}

/// Rows whose domain and retailer are both selected. The domain filter is
/// a no-op when the table carries no domain values at all.
pub fn filter_records<'a>(records: &'a [JoinedRecord], filters: &Filters, has_domain: bool) -> Vec<&'a JoinedRecord> {
    records.iter()
        .filter(|r| !has_domain || filters.domains.admits(r.domain.as_deref()))
        .filter(|r| filters.retailers.admits(Some(r.retailer.as_str())))
        .collect()
}

/// Groups by (domain, retailer). Turnover and employees come from the
/// first row of each group. Sorted by domain, then retailer.
pub fn aggregate(records: &[&JoinedRecord]) -> Vec<SummaryRow> {
    let mut index: HashMap<(Option<&str>, &str), usize> = HashMap::new();
    let mut rows: Vec<SummaryRow> = Vec::new();

    for record in records {
        let key = (record.domain.as_deref(), record.retailer.as_str());
        match index.get(&key) {
            Some(&i) => rows[i].store_count += 1,
            None => {
                index.insert(key, rows.len());
                rows.push(SummaryRow {
                    domain: record.domain.clone(),
                    retailer: record.retailer.clone(),
                    store_count: 1,
                    turnover: record.turnover,
                    employees: record.employees,
                });
            }
        }
    }

    rows.sort_by(|a, b| (&a.domain, &a.retailer).cmp(&(&b.domain, &b.retailer)));
    rows
}

/// Assigns palette colors to domains in the given order, cycling the palette.
/// Callers pass the unfiltered domain list so colors survive filter changes.
pub fn domain_colors(domains: &[String], palette: &[String]) -> HashMap<String, String> {
    if palette.is_empty() {
        return HashMap::new();
    }
    domains.iter()
        .enumerate()
        .map(|(i, domain)| (domain.clone(), palette[i % palette.len()].clone()))
        .collect()
}

pub fn marker_color<'a>(colors: &'a HashMap<String, String>, domain: Option<&str>) -> &'a str {
    domain
        .and_then(|d| colors.get(d))
        .map(String::as_str)
        .unwrap_or(FALLBACK_COLOR)
}

/// Mean of the rows that carry both coordinates; `default` when none do.
pub fn map_center(records: &[&JoinedRecord], default: [f64; 2]) -> (f64, f64) {
    let pairs: Vec<(f64, f64)> = records.iter().filter_map(|r| r.coordinates()).collect();
    if pairs.is_empty() {
        return (default[0], default[1]);
    }
    let n = pairs.len() as f64;
    let lat = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let lon = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    (lat, lon)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::DEFAULT_PALETTE;

    pub(crate) fn record(domain: Option<&str>, retailer: &str, coords: Option<(f64, f64)>, turnover: f64) -> JoinedRecord {
        JoinedRecord {
            retailer: retailer.to_string(),
            address: Some("Str. Lunga 1".to_string()),
            city: Some("Cluj".to_string()),
            latitude: coords.map(|c| c.0),
            longitude: coords.map(|c| c.1),
            domain: domain.map(str::to_string),
            turnover,
            employees: turnover * 10.0,
        }
    }

    fn sample() -> Vec<JoinedRecord> {
        vec![
            record(Some("Food"), "Alpha", Some((44.0, 26.0)), 10.0),
            record(Some("DIY"), "Beta", Some((46.0, 24.0)), 20.0),
            record(Some("Food"), "Alpha", None, 99.0),
            record(None, "Gamma", Some((45.0, 25.0)), 5.0),
        ]
    }

    fn palette() -> Vec<String> {
        DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn options_are_first_seen_and_skip_null_domains() {
        let options = filter_options(&sample());
        assert_eq!(options.domains, vec!["Food", "DIY"]);
        assert_eq!(options.retailers, vec!["Alpha", "Beta", "Gamma"]);
    }

    #[test]
    fn default_selection_keeps_every_row() {
        let records = sample();
        let filtered = filter_records(&records, &Filters::default(), true);
        assert_eq!(filtered.len(), records.len());
    }

    #[test]
    fn full_explicit_selection_keeps_rows_with_domain() {
        let records = sample();
        let options = filter_options(&records);
        let filters = Filters {
            domains: Selection::only(options.domains.clone()),
            retailers: Selection::only(options.retailers.clone()),
        };
        // The null-domain row cannot be selected explicitly.
        assert_eq!(filter_records(&records, &filters, true).len(), 3);
    }

    #[test]
    fn empty_retailer_selection_yields_nothing() {
        let records = sample();
        let filters = Filters {
            domains: Selection::All,
            retailers: Selection::only(Vec::<String>::new()),
        };
        assert!(filter_records(&records, &filters, true).is_empty());
    }

    #[test]
    fn domain_and_retailer_filters_intersect() {
        let records = sample();
        let filters = Filters {
            domains: Selection::only(["Food", "DIY"]),
            retailers: Selection::only(["Beta", "Gamma"]),
        };
        let filtered = filter_records(&records, &filters, true);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].retailer, "Beta");
    }

    #[test]
    fn domain_filter_ignored_without_domain_column() {
        let records = vec![record(None, "Alpha", None, 1.0)];
        let filters = Filters {
            domains: Selection::only(Vec::<String>::new()),
            retailers: Selection::All,
        };
        assert_eq!(filter_records(&records, &filters, false).len(), 1);
    }

    #[test]
    fn aggregate_takes_first_occurrence() {
        let records = vec![
            record(Some("Food"), "Alpha", None, 10.0),
            record(Some("Food"), "Alpha", None, 99.0),
            record(Some("Food"), "Alpha", None, 5.0),
        ];
        let refs: Vec<&JoinedRecord> = records.iter().collect();
        let summary = aggregate(&refs);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].store_count, 3);
        assert_eq!(summary[0].turnover, 10.0);
        assert_eq!(summary[0].employees, 100.0);
    }

    #[test]
    fn aggregate_sorts_by_domain_then_retailer() {
        let records = vec![
            record(Some("Food"), "Zeta", None, 1.0),
            record(Some("DIY"), "Beta", None, 1.0),
            record(Some("Food"), "Alpha", None, 1.0),
            record(Some("DIY"), "Beta", None, 2.0),
        ];
        let refs: Vec<&JoinedRecord> = records.iter().collect();
        let keys: Vec<(Option<String>, String, usize)> = aggregate(&refs)
            .into_iter()
            .map(|r| (r.domain, r.retailer, r.store_count))
            .collect();
        assert_eq!(
            keys,
            vec![
                (Some("DIY".to_string()), "Beta".to_string(), 2),
                (Some("Food".to_string()), "Alpha".to_string(), 1),
                (Some("Food".to_string()), "Zeta".to_string(), 1),
            ]
        );
    }

    #[test]
    fn same_retailer_in_two_domains_is_two_rows() {
        let records = vec![
            record(Some("Food"), "Alpha", None, 1.0),
            record(Some("DIY"), "Alpha", None, 1.0),
        ];
        let refs: Vec<&JoinedRecord> = records.iter().collect();
        assert_eq!(aggregate(&refs).len(), 2);
    }

    #[test]
    fn center_skips_null_coordinates() {
        let records = vec![
            record(Some("Food"), "A", Some((44.0, 26.0)), 1.0),
            record(Some("Food"), "B", Some((46.0, 24.0)), 1.0),
            record(Some("Food"), "C", None, 1.0),
        ];
        let refs: Vec<&JoinedRecord> = records.iter().collect();
        assert_eq!(map_center(&refs, [0.0, 0.0]), (45.0, 25.0));
        assert_eq!(aggregate(&refs).iter().map(|r| r.store_count).sum::<usize>(), 3);
    }

    #[test]
    fn center_ignores_half_coordinates() {
        let mut half = record(Some("Food"), "C", None, 1.0);
        half.latitude = Some(80.0);
        let records = vec![
            record(Some("Food"), "A", Some((44.0, 26.0)), 1.0),
            record(Some("Food"), "B", Some((46.0, 24.0)), 1.0),
            half,
        ];
        let refs: Vec<&JoinedRecord> = records.iter().collect();
        assert_eq!(map_center(&refs, [0.0, 0.0]), (45.0, 25.0));
    }

    #[test]
    fn full_submitted_selection_collapses_to_all() {
        let records = sample();
        let options = filter_options(&records);
        let submitted = Filters {
            domains: Selection::only(["DIY", "Food"]),
            retailers: Selection::only(["Gamma", "Beta", "Alpha"]),
        };
        let filters = effective_filters(&submitted, &options);
        assert_eq!(filters, Filters::default());
        assert_eq!(filter_records(&records, &filters, true).len(), records.len());

        let partial = Filters { domains: Selection::only(["Food"]), retailers: Selection::All };
        assert_eq!(effective_filters(&partial, &options), partial);

        let cleared = Filters { domains: Selection::All, retailers: Selection::only(Vec::<String>::new()) };
        assert_eq!(effective_filters(&cleared, &options), cleared);
    }

    #[test]
    fn center_falls_back_when_all_null() {
        let records = vec![record(Some("Food"), "A", None, 1.0)];
        let refs: Vec<&JoinedRecord> = records.iter().collect();
        assert_eq!(map_center(&refs, [45.9432, 24.9668]), (45.9432, 24.9668));
    }

    #[test]
    fn colors_cycle_and_ignore_filters() {
        let domains: Vec<String> = (0..12).map(|i| format!("D{i}")).collect();
        let colors = domain_colors(&domains, &palette());
        assert_eq!(colors["D0"], "red");
        assert_eq!(colors["D9"], "lightgray");
        assert_eq!(colors["D10"], "red");
        assert_eq!(colors["D11"], "blue");

        // Same unfiltered domain list, same assignment.
        assert_eq!(colors, domain_colors(&domains, &palette()));
        assert_eq!(marker_color(&colors, Some("D2")), "green");
        assert_eq!(marker_color(&colors, None), FALLBACK_COLOR);
        assert_eq!(marker_color(&colors, Some("Other")), FALLBACK_COLOR);
    }
}
