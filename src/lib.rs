/*!
# CSRD Report Archive

A browsable archive of CSRD-compliant sustainability reports, built in Rust.

## Overview

The list of reports is crowd-sourced in a public Google Sheet. This crate
fetches the sheet's CSV export, keeps the verified rows, and derives two views
from them: a filterable report table and a heatmap of how often each ESRS
topic (E1–E5, S1–S4, G1) is referenced in each company's sustainability
statement. Clicks on report links are posted to a logging webhook.

## Architecture

Data flows one way:

```text
fetcher ──► records ──► filter ──┬──► table ──────────► page / CLI
                                 └──► topics ──► graph ► page / CLI
click_log ◄── user clicks
```

### Pipeline
- **fetcher**: CSV export download, public IP lookup (looked up once)
- **records**: CSV parsing, verified-row selection, column projection
- **filter**: country/sector/company filters and the picker options
- **topics**: topic reshaping, page scaling, color scales, column order
- **click_log**: click events posted to the webhook, failures become warnings

### Views
- **state**: the user's selections and the actions that change them; every
  derived view is recomputed from the dataset and this state
- **table**: report table rows with `DD.MM.YYYY` dates
- **graph**: SVG heatmap (plotters) and a plain-text rendering for terminals
- **downloader**: CSV and XLSX export of the filtered table

### Front ends
- **app**: axum web server (`website` binary)
- `cli` binary: interactive terminal session

## Configuration

See [`config::Config`]; every setting has an environment variable and a
default. Logging goes through the `log` facade; the binaries install
`env_logger` (`RUST_LOG=debug` for pipeline details).

## REST API Endpoints

- `/` - Report page with filters, table and heatmap
- `/api/records` - Filtered table rows
- `/api/options` - Picker options for the current selection
- `/api/heatmap` - Heatmap cells and color scale, or a not-analyzed notice
- `/heatmap.svg` - Rendered heatmap
- `/api/click` - Log a click on a report link
- `/api/export?format=csv|xlsx` - Download the filtered table
- `/api/refresh` - Fetch the sheet again
*/

pub mod click_log;
pub mod config;
pub mod downloader;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod graph;
pub mod records;
pub mod state;
pub mod table;
pub mod topics;

#[cfg(feature = "web")]
pub mod app;

/// Re-export the pieces most callers need
pub use click_log::{ClickEvent, ClickLogger, ClickOutcome};
pub use config::Config;
pub use error::{ExportError, FetchError, LogError};
pub use filter::{Filters, Selection, apply_filters};
pub use records::{RawTable, ReportRecord};
pub use state::{Action, ViewState, Views};
pub use topics::{Heatmap, HeatmapOutcome, ScalingMode, TopicHit};
