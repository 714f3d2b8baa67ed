use thiserror::Error;

/// Failure to obtain or read the report spreadsheet (or the IP lookup).
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("Response is not CSV: {0}")]
    NotCsv(String),

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Expected column {0:?} is missing from the spreadsheet")]
    MissingColumn(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to deliver a click event to the logging webhook.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("Webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Webhook answered with status {0}")]
    Status(u16),

    #[error("Failed to serialize click event: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV export produced invalid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Export buffer error: {0}")]
    Buffer(String),

    #[cfg(feature = "web")]
    #[error("XLSX export failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}
