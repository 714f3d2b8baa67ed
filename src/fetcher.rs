use std::time::Duration;

use log::{debug, info, warn};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::error::FetchError;
use crate::records::{self, RawTable, ReportRecord};

/// Returned when the public IP cannot be determined.
pub const UNKNOWN_IP: &str = "Unknown";

/// Build the HTTP client used for every outbound call.
pub fn http_client(timeout: Duration) -> Result<Client, FetchError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|source| FetchError::Http {
            url: String::new(),
            source,
        })
}

/// Fetch the sheet export and parse it into a raw table.
pub async fn fetch_reports(client: &Client, url: &str) -> Result<RawTable, FetchError> {
    let http = |source| FetchError::Http {
        url: url.to_string(),
        source,
    };

    let response = client.get(url).send().await.map_err(http)?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    // Sheets answers an HTML sign-in page when the export is not public.
    if let Some(content_type) = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    {
        if content_type.contains("text/html") {
            return Err(FetchError::NotCsv(format!(
                "{} returned content type {}",
                url, content_type
            )));
        }
    }

    let body = response.text().await.map_err(http)?;
    debug!("fetched {} bytes from {}", body.len(), url);
    records::parse_export(&body)
}

/// Fetch, parse and transform the sheet in one step.
pub async fn load_records(client: &Client, url: &str) -> Result<Vec<ReportRecord>, FetchError> {
    let raw = fetch_reports(client, url).await?;
    let records = records::transform(&raw)?;
    info!("loaded {} verified reports from {}", records.len(), url);
    Ok(records)
}

/// Read a previously downloaded export from disk.
pub fn load_records_from_file(path: &std::path::Path) -> Result<Vec<ReportRecord>, FetchError> {
    let text = std::fs::read_to_string(path).map_err(|source| FetchError::Io {
        path: path.display().to_string(),
        source,
    })?;
    records::transform(&records::parse_export(&text)?)
}

#[derive(Deserialize)]
struct IpResponse {
    ip: Option<String>,
}

/// Look up the caller's public IP, falling back to `"Unknown"` on any failure.
pub async fn fetch_public_ip(client: &Client, url: &str) -> String {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            debug!("IP lookup failed: {}", e);
            return UNKNOWN_IP.to_string();
        }
    };
    match response.json::<IpResponse>().await {
        Ok(IpResponse { ip: Some(ip) }) if !ip.is_empty() => ip,
        Ok(_) => UNKNOWN_IP.to_string(),
        Err(e) => {
            debug!("IP lookup returned unreadable body: {}", e);
            UNKNOWN_IP.to_string()
        }
    }
}

/// Public IP of this process, looked up at most once.
///
/// The first call to [`PublicIp::get`] performs the lookup; every later call
/// (including concurrent ones) returns the same value. A failed lookup is
/// remembered as `"Unknown"` for the lifetime of the value.
#[derive(Debug)]
pub struct PublicIp {
    client: Client,
    url: String,
    cell: OnceCell<String>,
}

impl PublicIp {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            cell: OnceCell::new(),
        }
    }

    pub async fn get(&self) -> &str {
        self.cell
            .get_or_init(|| async {
                let ip = fetch_public_ip(&self.client, &self.url).await;
                if ip == UNKNOWN_IP {
                    warn!("public IP lookup failed; click events will log {:?}", UNKNOWN_IP);
                }
                ip
            })
            .await
    }

    /// Value if the lookup already happened.
    pub fn cached(&self) -> Option<&str> {
        self.cell.get().map(String::as_str)
    }
}
