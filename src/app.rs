use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::Query;
use handlebars::Handlebars;
use log::{error, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::click_log::ClickLogger;
use crate::config::{Config, SHEET_EDIT_URL};
use crate::downloader;
use crate::fetcher::{self, PublicIp};
use crate::filter::{Selection, ALL};
use crate::graph::{self, GraphOptions};
use crate::records::ReportRecord;
use crate::state::{self, ViewState};
use crate::table::TABLE_HEADERS;
use crate::topics::{HeatmapOutcome, ScalingMode};

const INDEX_TEMPLATE: &str = include_str!("../templates/index.hbs");

pub const ERROR_BANNER: &str = "Error encountered. Check Google Sheet for updates.";
pub const HEATMAP_ERROR: &str =
    "This is an error. We are working on a fix. In the meantime, check out our Google Sheet!";
pub const NOT_ANALYZED: &str = "We have not analyzed this company yet but will do so very soon!";

/// Loaded reports, or why they could not be loaded.
pub type Dataset = Result<Arc<Vec<ReportRecord>>, String>;

pub struct AppState {
    config: Config,
    client: Client,
    dataset: RwLock<Dataset>,
    logger: ClickLogger,
    templates: Handlebars<'static>,
}

impl AppState {
    pub fn new(config: Config, client: Client, dataset: Dataset) -> Result<Self, Box<dyn std::error::Error>> {
        let ip = Arc::new(PublicIp::new(client.clone(), config.ip_url.clone()));
        let logger = ClickLogger::new(client.clone(), config.webhook_url.clone(), ip);

        let mut templates = Handlebars::new();
        templates.register_template_string("index", INDEX_TEMPLATE)?;

        Ok(AppState {
            config,
            client,
            dataset: RwLock::new(dataset),
            logger,
            templates,
        })
    }

    pub fn dataset(&self) -> Dataset {
        self.dataset
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fetch the sheet again and swap in the new records.
    ///
    /// A failed refresh replaces the dataset with the error so the page shows
    /// the banner instead of stale data.
    pub async fn refresh(&self) -> Dataset {
        let dataset = load_dataset(&self.client, &self.config.sheet_url).await;
        *self
            .dataset
            .write()
            .unwrap_or_else(PoisonError::into_inner) = dataset.clone();
        dataset
    }
}

#[derive(Deserialize)]
struct ClickRequest {
    company: String,
    link: String,
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    message: Option<String>,
}

/// Fetch and transform the sheet, keeping a printable reason on failure.
pub async fn load_dataset(client: &Client, url: &str) -> Dataset {
    match fetcher::load_records(client, url).await {
        Ok(records) => Ok(Arc::new(records)),
        Err(e) => {
            error!("could not load reports from {}: {}", url, e);
            Err(e.to_string())
        }
    }
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let client = fetcher::http_client(config.http_timeout)?;
    let dataset = load_dataset(&client, &config.sheet_url).await;
    let bind = config.bind.clone();

    let app_state = Arc::new(AppState::new(config, client, dataset)?);
    let app = router(app_state);

    let listener = TcpListener::bind(&bind).await?;
    info!("Listening on http://{}", bind);
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/heatmap.svg", get(serve_heatmap_svg))
        .route("/api/records", get(get_records))
        .route("/api/options", get(get_options))
        .route("/api/heatmap", get(get_heatmap))
        .route("/api/click", post(record_click))
        .route("/api/export", get(export_records))
        .route("/api/refresh", post(refresh))
        .nest_service("/static", ServeDir::new("static"))
        .with_state(app_state)
}

/// Filters as they arrive in a page or API query string.
///
/// `country` and `sector` may repeat; an absent key means "All".
#[derive(Debug, Default, Deserialize)]
struct ViewQuery {
    #[serde(default)]
    country: Vec<String>,
    #[serde(default)]
    sector: Vec<String>,
    company: Option<String>,
    scale_by_pages: Option<String>,
    scaling: Option<String>,
}

impl ViewQuery {
    fn into_view(self) -> ViewState {
        let selection = |chosen: Vec<String>| {
            if chosen.is_empty() {
                Selection::All
            } else {
                Selection::from_values(chosen)
            }
        };

        let mut view = ViewState::default();
        view.filters.countries = selection(self.country);
        view.filters.sectors = selection(self.sector);
        view.filters.company = self
            .company
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        view.scale_by_pages = matches!(self.scale_by_pages.as_deref(), Some("true" | "on" | "1"));
        view.scaling = self
            .scaling
            .and_then(|v| v.parse::<ScalingMode>().ok())
            .unwrap_or_default();
        view
    }
}

#[derive(Deserialize)]
struct ExportQuery {
    format: Option<String>,
}

/// Query string that reproduces `view`, used by the export links.
pub fn view_to_query(view: &ViewState) -> String {
    let mut pairs: Vec<String> = Vec::new();
    let mut push = |key: &str, value: &str| {
        pairs.push(format!("{}={}", key, urlencoding::encode(value)));
    };
    if let Selection::Only(set) = &view.filters.countries {
        set.iter().for_each(|c| push("country", c));
    }
    if let Selection::Only(set) = &view.filters.sectors {
        set.iter().for_each(|s| push("sector", s));
    }
    if let Some(company) = &view.filters.company {
        push("company", company);
    }
    if view.scale_by_pages {
        push("scale_by_pages", "true");
    }
    if view.scaling != ScalingMode::default() {
        push("scaling", "overall");
    }
    pairs.join("&")
}

fn option_items(values: &[String], selection: &Selection) -> Vec<serde_json::Value> {
    let mut items = vec![json!({ "value": ALL, "selected": selection.is_all() })];
    items.extend(values.iter().map(|v| {
        json!({ "value": v, "selected": !selection.is_all() && selection.matches(v) })
    }));
    items
}

fn render_index(app_state: &AppState, view: &ViewState) -> Result<String, Box<dyn std::error::Error>> {
    let records = match app_state.dataset() {
        Ok(records) => records,
        Err(_) => {
            let context = json!({ "error": ERROR_BANNER, "sheet_url": SHEET_EDIT_URL });
            return Ok(app_state.templates.render("index", &context)?);
        }
    };

    let views = state::derive(&records, view);
    let (heatmap_svg, heatmap_error) = match &views.heatmap {
        HeatmapOutcome::Ready(heatmap) => {
            match graph::render_heatmap_svg(heatmap, &GraphOptions::default()) {
                Ok(svg) => (Some(svg), None),
                Err(e) => {
                    error!("heatmap rendering failed: {}", e);
                    (None, Some(HEATMAP_ERROR))
                }
            }
        }
        HeatmapOutcome::NotYetAnalyzed => (None, None),
    };

    let companies: Vec<serde_json::Value> = views
        .options
        .companies
        .iter()
        .map(|c| json!({ "value": c, "selected": view.filters.company.as_deref() == Some(c.as_str()) }))
        .collect();

    let context = json!({
        "total": views.total,
        "sheet_url": SHEET_EDIT_URL,
        "countries": option_items(&views.options.countries, &view.filters.countries),
        "sectors": option_items(&views.options.sectors, &view.filters.sectors),
        "companies": companies,
        "scale_by_pages": view.scale_by_pages,
        "within_firm": view.scaling == ScalingMode::WithinFirm,
        "query": view_to_query(view),
        "headers": TABLE_HEADERS,
        "rows": views.rows,
        "heatmap_svg": heatmap_svg,
        "heatmap_error": heatmap_error,
        "not_analyzed": NOT_ANALYZED,
    });
    Ok(app_state.templates.render("index", &context)?)
}

fn unavailable(reason: &str) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(StatusResponse {
            status: "error".to_string(),
            message: Some(format!("{} ({})", ERROR_BANNER, reason)),
        }),
    )
        .into_response()
}

async fn serve_index(State(app_state): State<Arc<AppState>>, Query(query): Query<ViewQuery>) -> Response {
    let view = query.into_view();
    match render_index(&app_state, &view) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("page rendering failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, ERROR_BANNER).into_response()
        }
    }
}

async fn get_records(State(app_state): State<Arc<AppState>>, Query(query): Query<ViewQuery>) -> Response {
    let records = match app_state.dataset() {
        Ok(records) => records,
        Err(reason) => return unavailable(&reason),
    };
    let view = query.into_view();
    Json(state::derive(&records, &view).rows).into_response()
}

async fn get_options(State(app_state): State<Arc<AppState>>, Query(query): Query<ViewQuery>) -> Response {
    let records = match app_state.dataset() {
        Ok(records) => records,
        Err(reason) => return unavailable(&reason),
    };
    let view = query.into_view();
    Json(state::filter_options(&records, &view)).into_response()
}

async fn get_heatmap(State(app_state): State<Arc<AppState>>, Query(query): Query<ViewQuery>) -> Response {
    let records = match app_state.dataset() {
        Ok(records) => records,
        Err(reason) => return unavailable(&reason),
    };
    let view = query.into_view();
    match state::derive(&records, &view).heatmap {
        HeatmapOutcome::Ready(heatmap) => Json(json!({ "status": "ok", "heatmap": heatmap })).into_response(),
        HeatmapOutcome::NotYetAnalyzed => {
            Json(json!({ "status": "not_analyzed", "message": NOT_ANALYZED })).into_response()
        }
    }
}

async fn serve_heatmap_svg(State(app_state): State<Arc<AppState>>, Query(query): Query<ViewQuery>) -> Response {
    let records = match app_state.dataset() {
        Ok(records) => records,
        Err(reason) => return unavailable(&reason),
    };
    let view = query.into_view();
    let heatmap = match state::derive(&records, &view).heatmap {
        HeatmapOutcome::Ready(heatmap) => heatmap,
        HeatmapOutcome::NotYetAnalyzed => return (StatusCode::NOT_FOUND, NOT_ANALYZED).into_response(),
    };
    match graph::render_heatmap_svg(&heatmap, &GraphOptions::default()) {
        Ok(svg) => ([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response(),
        Err(e) => {
            error!("heatmap rendering failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, HEATMAP_ERROR).into_response()
        }
    }
}

async fn record_click(State(app_state): State<Arc<AppState>>, Json(payload): Json<ClickRequest>) -> impl IntoResponse {
    Json(app_state.logger.record_click(&payload.link, &payload.company).await)
}

async fn export_records(
    State(app_state): State<Arc<AppState>>,
    Query(export): Query<ExportQuery>,
    Query(query): Query<ViewQuery>,
) -> Response {
    let records = match app_state.dataset() {
        Ok(records) => records,
        Err(reason) => return unavailable(&reason),
    };
    let rows = state::derive(&records, &query.into_view()).rows;

    let exported = match export.format.as_deref().unwrap_or("csv") {
        "csv" => downloader::to_csv(&rows).map(|csv| {
            (
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                    (header::CONTENT_DISPOSITION, "attachment; filename=\"csrd-reports.csv\""),
                ],
                csv,
            )
                .into_response()
        }),
        "xlsx" => downloader::to_xlsx(&rows).map(|bytes| {
            (
                [
                    (
                        header::CONTENT_TYPE,
                        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                    ),
                    (header::CONTENT_DISPOSITION, "attachment; filename=\"csrd-reports.xlsx\""),
                ],
                bytes,
            )
                .into_response()
        }),
        other => {
            return (
                StatusCode::BAD_REQUEST,
                Json(StatusResponse {
                    status: "error".to_string(),
                    message: Some(format!("Unsupported export format: {}", other)),
                }),
            )
                .into_response();
        }
    };

    exported.unwrap_or_else(|e| {
        error!("export failed: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StatusResponse {
                status: "error".to_string(),
                message: Some(e.to_string()),
            }),
        )
            .into_response()
    })
}

async fn refresh(State(app_state): State<Arc<AppState>>) -> Response {
    match app_state.refresh().await {
        Ok(records) => Json(StatusResponse {
            status: "ok".to_string(),
            message: Some(format!("{} reports loaded", records.len())),
        })
        .into_response(),
        Err(reason) => unavailable(&reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::FromRequestParts;
    use axum::http::Request;

    async fn view_of(query: &str) -> ViewState {
        let (mut parts, _) = Request::builder()
            .uri(format!("/?{}", query))
            .body(())
            .unwrap()
            .into_parts();
        let Query(query) = Query::<ViewQuery>::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        query.into_view()
    }

    #[tokio::test]
    async fn query_round_trips_through_view_state() {
        let view = view_of(
            "country=DE&country=FR&sector=Real+Estate&company=Acme%20Corp&scale_by_pages=true&scaling=overall",
        )
        .await;
        assert_eq!(view.filters.countries, Selection::from_values(["DE", "FR"]));
        assert_eq!(view.filters.sectors, Selection::from_values(["Real Estate"]));
        assert_eq!(view.filters.company.as_deref(), Some("Acme Corp"));
        assert!(view.scale_by_pages);
        assert_eq!(view.scaling, ScalingMode::Overall);

        assert_eq!(view_of(&view_to_query(&view)).await, view);
    }

    #[tokio::test]
    async fn empty_query_is_default_view() {
        assert_eq!(view_of("").await, ViewState::default());
        assert_eq!(view_of("company=&country=All").await, ViewState::default());
        assert_eq!(view_of("scaling=sideways").await, ViewState::default());
    }

    fn render(context: serde_json::Value) -> String {
        let mut templates = Handlebars::new();
        templates.register_template_string("index", INDEX_TEMPLATE).unwrap();
        templates.render("index", &context).unwrap()
    }

    #[test]
    fn page_embeds_rendered_heatmap() {
        let html = render(json!({ "total": 1, "heatmap_svg": "<svg id=\"hm\"></svg>", "not_analyzed": NOT_ANALYZED }));
        assert!(html.contains("<svg id=\"hm\"></svg>"));
        assert!(!html.contains(NOT_ANALYZED));
    }

    #[test]
    fn page_picks_one_heatmap_state() {
        let html = render(json!({ "total": 1, "not_analyzed": NOT_ANALYZED }));
        assert!(html.contains(NOT_ANALYZED));

        let html = render(json!({
            "total": 1,
            "heatmap_error": HEATMAP_ERROR,
            "heatmap_svg": "<svg></svg>",
            "not_analyzed": NOT_ANALYZED,
        }));
        assert!(html.contains(HEATMAP_ERROR));
        assert!(!html.contains("<svg></svg>"));
        assert!(!html.contains(NOT_ANALYZED));
    }
}
