use std::collections::BTreeSet;

use serde::Serialize;

use crate::records::ReportRecord;

/// Option label that lifts a restriction.
pub const ALL: &str = "All";

/// Country or sector restriction chosen by the user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub enum Selection {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl Selection {
    /// Build a selection from multiselect values; picking "All" (or nothing
    /// recognisable as a restriction) means no restriction.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for value in values {
            let value = value.as_ref().trim();
            if value.eq_ignore_ascii_case(ALL) {
                return Selection::All;
            }
            if !value.is_empty() {
                set.insert(value.to_string());
            }
        }
        Selection::Only(set)
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(set) => set.contains(value),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }

    /// Selected values, or `["All"]` when unrestricted.
    pub fn labels(&self) -> Vec<String> {
        match self {
            Selection::All => vec![ALL.to_string()],
            Selection::Only(set) => set.iter().cloned().collect(),
        }
    }
}

/// The three user-facing filters, combined with logical AND.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Filters {
    pub countries: Selection,
    pub sectors: Selection,
    pub company: Option<String>,
}

impl Filters {
    pub fn matches(&self, record: &ReportRecord) -> bool {
        self.matches_region(record)
            && self
                .company
                .as_deref()
                .is_none_or(|company| record.company == company)
    }

    /// Country and sector only; the company picker is built from this.
    pub fn matches_region(&self, record: &ReportRecord) -> bool {
        self.countries.matches(&record.country) && self.sectors.matches(&record.sector)
    }
}

/// Keep the records passing every filter, in input order.
pub fn apply_filters<'a>(records: &'a [ReportRecord], filters: &Filters) -> Vec<&'a ReportRecord> {
    records.iter().filter(|r| filters.matches(r)).collect()
}

/// Sorted distinct countries across the whole dataset.
pub fn country_options(records: &[ReportRecord]) -> Vec<String> {
    distinct(records.iter().map(|r| r.country.as_str()))
}

/// Sorted distinct sectors across the whole dataset.
pub fn sector_options(records: &[ReportRecord]) -> Vec<String> {
    distinct(records.iter().map(|r| r.sector.as_str()))
}

/// Sorted distinct companies left after the country and sector filters.
///
/// The company filter itself is ignored so the choice can change without
/// resetting the other two.
pub fn company_options(records: &[ReportRecord], filters: &Filters) -> Vec<String> {
    distinct(
        records
            .iter()
            .filter(|r| filters.matches_region(r))
            .map(|r| r.company.as_str()),
    )
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::tests::sample_records;

    fn only(values: &[&str]) -> Selection {
        Selection::from_values(values.iter().copied())
    }

    #[test]
    fn all_is_identity() {
        let records = sample_records();
        let filtered = apply_filters(&records, &Filters::default());
        let expected: Vec<&ReportRecord> = records.iter().collect();
        assert_eq!(filtered, expected);
    }

    #[test]
    fn all_anywhere_in_multiselect_lifts_restriction() {
        assert_eq!(only(&["DE", "All"]), Selection::All);
        assert!(only(&["DE"]).matches("DE"));
        assert!(!only(&["DE"]).matches("FR"));
    }

    #[test]
    fn empty_multiselect_matches_nothing() {
        let records = sample_records();
        let filters = Filters {
            countries: only(&[]),
            ..Filters::default()
        };
        assert!(apply_filters(&records, &filters).is_empty());
    }

    #[test]
    fn filters_combine_with_and_and_keep_order() {
        let records = sample_records();
        let filters = Filters {
            countries: only(&["DE", "FR"]),
            sectors: only(&["Energy"]),
            company: None,
        };
        let names: Vec<&str> = apply_filters(&records, &filters)
            .iter()
            .map(|r| r.company.as_str())
            .collect();
        assert_eq!(names, vec!["Acme Corp", "Gamma SA"]);

        let filters = Filters {
            company: Some("Gamma SA".to_string()),
            ..filters
        };
        let names: Vec<&str> = apply_filters(&records, &filters)
            .iter()
            .map(|r| r.company.as_str())
            .collect();
        assert_eq!(names, vec!["Gamma SA"]);
    }

    #[test]
    fn filtering_is_idempotent() {
        let records = sample_records();
        let filters = Filters {
            countries: only(&["DE", "AT"]),
            ..Filters::default()
        };
        let once: Vec<ReportRecord> = apply_filters(&records, &filters)
            .into_iter()
            .cloned()
            .collect();
        let twice: Vec<ReportRecord> = apply_filters(&once, &filters)
            .into_iter()
            .cloned()
            .collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn company_options_ignore_company_filter() {
        let records = sample_records();
        let filters = Filters {
            sectors: only(&["Energy"]),
            company: Some("Acme Corp".to_string()),
            ..Filters::default()
        };
        assert_eq!(
            company_options(&records, &filters),
            vec!["Acme Corp".to_string(), "Gamma SA".to_string()]
        );
        assert_eq!(
            country_options(&records),
            vec!["AT".to_string(), "DE".to_string(), "FR".to_string()]
        );
        assert_eq!(
            sector_options(&records),
            vec!["Energy".to_string(), "Materials".to_string()]
        );
    }
}
