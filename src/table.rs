use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::records::ReportRecord;

lazy_static! {
    static ref LINK_NAME_REGEX: Regex = Regex::new(r"^https://.*#name=(.*)$").unwrap();
}

/// Column labels of the report table, in display order.
pub const TABLE_HEADERS: [&str; 7] = [
    "Company",
    "Country",
    "Sector",
    "Industry",
    "Published",
    "Pages",
    "Auditor",
];

/// One row of the report table as shown to the user.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TableRow {
    /// Link text; recovered from the `#name=` fragment of the link.
    pub company: String,
    pub link: String,
    pub country: String,
    pub sector: String,
    pub industry: String,
    /// Publication date as `DD.MM.YYYY`, or the sheet's text when it is not a date.
    pub published: String,
    pub pages: String,
    pub auditor: String,
}

impl From<&ReportRecord> for TableRow {
    fn from(record: &ReportRecord) -> Self {
        TableRow {
            company: display_name(&record.link).unwrap_or_else(|| record.company.clone()),
            link: record.link.clone(),
            country: record.country.clone(),
            sector: record.sector.clone(),
            industry: record.industry.clone(),
            published: match record.publication_date {
                Some(date) => date.format("%d.%m.%Y").to_string(),
                None => record.published.clone(),
            },
            pages: record.pages_pdf.clone(),
            auditor: record.auditor.clone(),
        }
    }
}

impl TableRow {
    /// Cells in [`TABLE_HEADERS`] order.
    pub fn cells(&self) -> [&str; 7] {
        [
            self.company.as_str(),
            self.country.as_str(),
            self.sector.as_str(),
            self.industry.as_str(),
            self.published.as_str(),
            self.pages.as_str(),
            self.auditor.as_str(),
        ]
    }
}

/// Company name embedded in a report link, if the link carries one.
pub fn display_name(link: &str) -> Option<String> {
    LINK_NAME_REGEX
        .captures(link)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|name| !name.is_empty())
}

pub fn table_rows(records: &[&ReportRecord]) -> Vec<TableRow> {
    records.iter().map(|r| TableRow::from(*r)).collect()
}

/// Render rows as a fixed-width text table for terminal output.
pub fn render_text(rows: &[TableRow]) -> String {
    let mut widths: Vec<usize> = TABLE_HEADERS.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row.cells()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut push_line = |cells: &[&str]| {
        let line: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    };

    push_line(&TABLE_HEADERS);
    for row in rows {
        push_line(&row.cells());
    }
    out
}
