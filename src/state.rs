use serde::Serialize;

use crate::filter::{self, Filters, Selection};
use crate::records::ReportRecord;
use crate::table::{self, TableRow};
use crate::topics::{self, HeatmapOutcome, ScalingMode};

/// Everything the user has chosen on screen.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ViewState {
    pub filters: Filters,
    pub scale_by_pages: bool,
    pub scaling: ScalingMode,
}

/// A user interaction that changes the view.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    SelectCountries(Selection),
    SelectSectors(Selection),
    SelectCompany(Option<String>),
    SetScaleByPages(bool),
    SetScaling(ScalingMode),
    Reset,
}

impl ViewState {
    /// Apply one action.
    ///
    /// Narrowing countries or sectors clears a selected company that is no
    /// longer offered, the way a picker falls back to its placeholder.
    pub fn dispatch(&mut self, action: Action, records: &[ReportRecord]) {
        match action {
            Action::SelectCountries(selection) => {
                self.filters.countries = selection;
                self.drop_unavailable_company(records);
            }
            Action::SelectSectors(selection) => {
                self.filters.sectors = selection;
                self.drop_unavailable_company(records);
            }
            Action::SelectCompany(company) => self.filters.company = company,
            Action::SetScaleByPages(on) => self.scale_by_pages = on,
            Action::SetScaling(mode) => self.scaling = mode,
            Action::Reset => *self = ViewState::default(),
        }
    }

    fn drop_unavailable_company(&mut self, records: &[ReportRecord]) {
        if let Some(company) = &self.filters.company {
            if !filter::company_options(records, &self.filters).contains(company) {
                self.filters.company = None;
            }
        }
    }
}

/// Views derived from the dataset and a [`ViewState`].
#[derive(Clone, Debug)]
pub struct Views {
    /// Size of the whole verified dataset.
    pub total: usize,
    pub rows: Vec<TableRow>,
    pub heatmap: HeatmapOutcome,
    pub options: FilterOptions,
}

/// Choices offered by the three pickers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilterOptions {
    pub countries: Vec<String>,
    pub sectors: Vec<String>,
    pub companies: Vec<String>,
}

pub fn filter_options(records: &[ReportRecord], view: &ViewState) -> FilterOptions {
    FilterOptions {
        countries: filter::country_options(records),
        sectors: filter::sector_options(records),
        companies: filter::company_options(records, &view.filters),
    }
}

/// Recompute every derived view; pure in `records` and `view`.
pub fn derive(records: &[ReportRecord], view: &ViewState) -> Views {
    let filtered = filter::apply_filters(records, &view.filters);
    Views {
        total: records.len(),
        rows: table::table_rows(&filtered),
        heatmap: topics::build_heatmap(&filtered, view.scale_by_pages, view.scaling),
        options: filter_options(records, view),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::tests::sample_records;

    #[test]
    fn default_view_shows_everything() {
        let records = sample_records();
        let views = derive(&records, &ViewState::default());
        assert_eq!(views.total, 3);
        assert_eq!(views.rows.len(), 3);
        assert!(matches!(views.heatmap, HeatmapOutcome::Ready(_)));
        assert_eq!(views.options.companies.len(), 3);
    }

    #[test]
    fn narrowing_region_drops_company_out_of_scope() {
        let records = sample_records();
        let mut view = ViewState::default();
        view.dispatch(Action::SelectCompany(Some("Beta AG".into())), &records);
        view.dispatch(
            Action::SelectSectors(Selection::from_values(["Materials"])),
            &records,
        );
        assert_eq!(view.filters.company.as_deref(), Some("Beta AG"));

        view.dispatch(
            Action::SelectCountries(Selection::from_values(["DE"])),
            &records,
        );
        assert_eq!(view.filters.company, None);
    }

    #[test]
    fn selecting_unanalyzed_company_gives_notice() {
        let records = sample_records();
        let mut view = ViewState::default();
        view.dispatch(Action::SelectCompany(Some("Gamma SA".into())), &records);
        let views = derive(&records, &view);
        assert_eq!(views.rows.len(), 1);
        assert_eq!(views.heatmap, HeatmapOutcome::NotYetAnalyzed);
    }

    #[test]
    fn reset_restores_defaults() {
        let records = sample_records();
        let mut view = ViewState::default();
        view.dispatch(Action::SetScaleByPages(true), &records);
        view.dispatch(Action::SetScaling(ScalingMode::Overall), &records);
        view.dispatch(Action::Reset, &records);
        assert_eq!(view, ViewState::default());
    }
}
