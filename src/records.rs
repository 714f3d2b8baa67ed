use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use log::debug;
use serde::Serialize;

use crate::error::FetchError;

/// Number of non-data lines above the header row in the sheet export.
pub const SKIPPED_HEADER_ROWS: usize = 2;

/// Raw header of the industry classification column, renamed to `industry`.
pub const INDUSTRY_HEADER: &str = "SASB industry \n(SICS® Industries)";

pub const VERIFIED_COLUMN: &str = "verified";
pub const VERIFIED_VALUE: &str = "yes";

/// Lower-case ESRS topic codes that carry reference counts, in sheet order.
pub const TOPIC_CODES: [&str; 10] = ["e1", "e2", "e3", "e4", "e5", "s1", "s2", "s3", "s4", "g1"];

/// Columns every record must carry, in projection order.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    "company",
    "link",
    "country",
    "sector",
    INDUSTRY_HEADER,
    "publication date",
    "pages PDF",
    "auditor",
];

/// Slashed dates follow the sheet export's US convention, month first.
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d.%m.%Y", "%m/%d/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parsed sheet export before any filtering: a header row and the data rows below it.
#[derive(Clone, Debug, Default)]
pub struct RawTable {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
}

impl RawTable {
    /// Position of a column, matching headers with surrounding whitespace ignored.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|header| header == name || header.trim() == name.trim())
    }

    fn require(&self, name: &str) -> Result<usize, FetchError> {
        self.column(name)
            .ok_or_else(|| FetchError::MissingColumn(name.to_string()))
    }
}

/// One verified sustainability report.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportRecord {
    pub company: String,
    pub link: String,
    pub country: String,
    pub sector: String,
    pub industry: String,
    /// Publication date as written in the sheet.
    pub published: String,
    /// `published` read as a date, when it is in a known format.
    pub publication_date: Option<NaiveDate>,
    /// Page count of the sustainability statement as written in the sheet.
    pub pages_pdf: String,
    pub auditor: String,
    /// Reference counts indexed like [`TOPIC_CODES`]; `None` when not measured.
    pub topics: [Option<f64>; TOPIC_CODES.len()],
}

impl ReportRecord {
    /// Page count as a number, if the cell holds one.
    pub fn pages(&self) -> Option<f64> {
        parse_number(&self.pages_pdf)
    }

    /// Reference count for a topic code (case-insensitive).
    pub fn hits(&self, code: &str) -> Option<f64> {
        let code = code.to_ascii_lowercase();
        TOPIC_CODES
            .iter()
            .position(|c| *c == code)
            .and_then(|i| self.topics[i])
    }
}

/// Parse the sheet export: skip the leading non-data rows, take the next row as
/// the header and everything after it as data.
///
/// Quoted fields may span lines (the industry header does), so rows are counted
/// as CSV records rather than physical lines.
pub fn parse_export(text: &str) -> Result<RawTable, FetchError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader.records().skip(SKIPPED_HEADER_ROWS);
    let headers = match records.next() {
        Some(record) => record?,
        None => return Err(FetchError::NotCsv("export has no header row".to_string())),
    };

    let mut rows = Vec::new();
    for record in records {
        rows.push(record?);
    }

    Ok(RawTable { headers, rows })
}

/// Turn the raw export into report records.
///
/// Keeps rows flagged `verified == "yes"`, trims the company name, appends the
/// `#name=<company>` fragment to the link and drops rows with an empty required
/// field. Row order is preserved.
pub fn transform(raw: &RawTable) -> Result<Vec<ReportRecord>, FetchError> {
    let verified = raw.require(VERIFIED_COLUMN)?;
    let mut required = [0usize; REQUIRED_COLUMNS.len()];
    for (slot, name) in required.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = raw.require(name)?;
    }
    let topic_columns: Vec<Option<usize>> =
        TOPIC_CODES.iter().map(|code| raw.column(code)).collect();

    let mut records = Vec::with_capacity(raw.rows.len());
    let mut dropped = 0usize;

    for row in &raw.rows {
        if row.get(verified) != Some(VERIFIED_VALUE) {
            continue;
        }

        let cell = |i: usize| row.get(i).map(str::trim).unwrap_or("");
        let values: Vec<&str> = required.iter().map(|&i| cell(i)).collect();
        if values.iter().any(|v| v.is_empty()) {
            dropped += 1;
            continue;
        }

        let publication_date = parse_date(values[5]);
        if publication_date.is_none() {
            debug!("{:?}: publication date {:?} kept as text", values[0], values[5]);
        }

        let company = values[0].to_string();
        let link = format!("{}#name={}", values[1], company);

        let mut topics = [None; TOPIC_CODES.len()];
        for (slot, column) in topics.iter_mut().zip(&topic_columns) {
            *slot = column
                .and_then(|i| parse_number(cell(i)))
                .filter(|v| *v >= 0.0);
        }

        records.push(ReportRecord {
            company,
            link,
            country: values[2].to_string(),
            sector: values[3].to_string(),
            industry: values[4].to_string(),
            published: values[5].to_string(),
            publication_date,
            pages_pdf: values[6].to_string(),
            auditor: values[7].to_string(),
            topics,
        });
    }

    debug!(
        "transformed {} verified records ({} incomplete rows dropped)",
        records.len(),
        dropped
    );
    Ok(records)
}

/// Read a sheet cell as a date in any of the formats seen in the sheet.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn parse_number(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}
