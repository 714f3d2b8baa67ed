use crate::error::ExportError;
use crate::table::{TABLE_HEADERS, TableRow};

/// Convert table rows to CSV
///
/// The header row uses the table labels, followed by a `Link` column so the
/// report URL survives the export.
///
/// # Arguments
/// * `rows` - Rows of the filtered report table
///
/// # Returns
/// * `Result<String, ExportError>` - CSV content as a string or an error
pub fn to_csv(rows: &[TableRow]) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<&str> = TABLE_HEADERS.to_vec();
    header.push("Link");
    writer.write_record(&header)?;

    for row in rows {
        let mut record: Vec<&str> = row.cells().to_vec();
        record.push(&row.link);
        writer.write_record(&record)?;
    }

    let buffer = writer
        .into_inner()
        .map_err(|e| ExportError::Buffer(e.to_string()))?;
    Ok(String::from_utf8(buffer)?)
}

/// Convert table rows to XLSX format
///
/// Writes one worksheet with the table labels in the first row; the company
/// cell is written as a hyperlink to the report.
///
/// # Arguments
/// * `rows` - Rows of the filtered report table
///
/// # Returns
/// * `Result<Vec<u8>, ExportError>` - XLSX file content as bytes or an error
#[cfg(feature = "web")]
pub fn to_xlsx(rows: &[TableRow]) -> Result<Vec<u8>, ExportError> {
    use rust_xlsxwriter::{Format, Workbook, Worksheet};

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name("CSRD reports")?;

    let bold = Format::new().set_bold();
    for (c, label) in TABLE_HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, c as u16, *label, &bold)?;
    }

    for (r, row) in rows.iter().enumerate() {
        let r = (r + 1) as u32;
        worksheet.write_url_with_text(r, 0, row.link.as_str(), row.company.as_str())?;
        for (c, cell) in row.cells().iter().enumerate().skip(1) {
            worksheet.write_string(r, c as u16, *cell)?;
        }
    }

    workbook.push_worksheet(worksheet);
    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{ReportRecord, tests::sample_records};
    use crate::table::table_rows;

    fn rows() -> Vec<TableRow> {
        let records = sample_records();
        let refs: Vec<&ReportRecord> = records.iter().collect();
        table_rows(&refs)
    }

    #[test]
    fn csv_has_header_and_all_rows() {
        let csv = to_csv(&rows()).unwrap();
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.get(0), Some("Company"));
        assert_eq!(headers.get(7), Some("Link"));
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].get(4), Some("01.02.2025"));
        assert_eq!(records[0].get(7), Some("https://x/y#name=Acme Corp"));
    }

    #[test]
    fn csv_quotes_cells_with_commas() {
        let mut rows = rows();
        rows[0].auditor = "Ernst, Young".to_string();
        let csv = to_csv(&rows).unwrap();
        assert!(csv.contains("\"Ernst, Young\""));
    }

    #[cfg(feature = "web")]
    #[test]
    fn xlsx_is_a_zip_container() {
        let bytes = to_xlsx(&rows()).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}
