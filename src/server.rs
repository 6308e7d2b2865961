use crate::choropleth::to_feature_collection;
use crate::config::AppConfig;
use crate::dashboard::{self, MapView, ViewRequest};
use crate::data::Dataset;
use crate::detail::{self, CountryDetail};
use crate::error::Notice;
use crate::page;
use crate::selection::{Selection, SelectionEvent};
use crate::session::{session_from_cookie, SessionStore, SESSION_COOKIE};
use crate::svg::Projection;
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

pub struct AppState {
    pub dataset: Arc<Dataset>,
    pub sessions: SessionStore,
    pub config: AppConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    year: Option<i32>,
    indicator: Option<String>,
    view: Option<String>,
    event: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClickParams {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
pub struct DetailParams {
    country: String,
    year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ClickResponse {
    country: Option<String>,
    selection: Selection,
    notice: Option<Notice>,
}

#[derive(Debug, Serialize)]
pub struct DetailResponse {
    detail: Option<CountryDetail>,
    notice: Option<Notice>,
}

impl PageParams {
    fn view_request(&self) -> ViewRequest {
        ViewRequest {
            year: self.year,
            indicator: self.indicator.clone().filter(|i| !i.is_empty()),
            view: MapView::parse(self.view.as_deref()),
        }
    }
}

impl AppState {
    pub fn new(config: AppConfig, dataset: Arc<Dataset>) -> Self {
        Self {
            dataset,
            sessions: SessionStore::with_ttl(Duration::from_secs(config.server.session_ttl_secs)),
            config,
        }
    }

    fn is_known(&self) -> impl Fn(&str) -> bool + '_ {
        move |id| self.dataset.contains_country(id)
    }

    fn projection(&self) -> Projection {
        Projection {
            width: self.config.map.width as f64,
            height: self.config.map.height as f64,
        }
    }

    /// Applies the request's selection event, then renders the page.
    pub fn page(&self, session: &str, params: &PageParams) -> String {
        let event = SelectionEvent::from_params(params.event.as_deref(), params.country.as_deref());
        let (selection, notice) = self.sessions.apply(session, event, self.is_known());

        let mut view = dashboard::run(
            &self.dataset,
            &params.view_request(),
            &selection,
            &self.config.map.default_indicator,
        );
        if let Some(notice) = notice {
            view.notices.insert(0, notice);
        }
        page::render(&view, &self.dataset, self.projection())
    }

    pub fn click(&self, session: &str, lat: f64, lon: f64) -> ClickResponse {
        let country = self.dataset.country_at(lon, lat).map(str::to_string);
        let (selection, notice) = self
            .sessions
            .apply(session, SelectionEvent::Click(country.clone()), self.is_known());
        ClickResponse { country, selection, notice }
    }

    pub fn detail(&self, params: &DetailParams) -> DetailResponse {
        let country = params.country.trim().to_ascii_uppercase();
        let rows = self.dataset.rows_for_country(&country);
        let year = params
            .year
            .or_else(|| self.dataset.year_range().map(|(_, max)| max))
            .unwrap_or_default();

        match detail::build(&rows, &self.dataset.indicators, year) {
            Some(detail) => {
                let notice = (!rows.iter().any(|r| r.year == year))
                    .then(|| Notice::NoDataForSelection { country, year: Some(year) });
                DetailResponse { detail: Some(detail), notice }
            }
            None => DetailResponse {
                detail: None,
                notice: Some(Notice::NoDataForSelection { country, year: None }),
            },
        }
    }

    pub fn map(&self, params: &PageParams) -> FeatureCollection {
        let view = dashboard::run(
            &self.dataset,
            &params.view_request(),
            &Selection::Unselected,
            &self.config.map.default_indicator,
        );
        to_feature_collection(&view.map)
    }
}

/// Existing session id from the request cookies, or a fresh one.
fn session_id(headers: &HeaderMap) -> (String, bool) {
    let existing = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(session_from_cookie);
    match existing {
        Some(id) => (id, false),
        None => (SessionStore::new_session_id(), true),
    }
}

fn with_session_cookie(mut response: Response, id: &str, is_new: bool) -> Response {
    if is_new {
        let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id);
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
    }
    response
}

pub async fn start_server(config: AppConfig, dataset: Arc<Dataset>) -> Result<()> {
    let port = config.server.port;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let tile_service = ServeDir::new(&config.output.tile_dir);

    let state = Arc::new(AppState::new(config, dataset));

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/api/map", get(map_handler))
        .route("/api/click", get(click_handler))
        .route("/api/detail", get(detail_handler))
        .route("/api/selection", get(selection_handler))
        .nest_service("/tiles", tile_service)
        .layer(CorsLayer::permissive())
        .with_state(state);

    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
    headers: HeaderMap,
) -> Response {
    let (session, is_new) = session_id(&headers);
    let html = state.page(&session, &params);
    with_session_cookie(Html(html).into_response(), &session, is_new)
}

async fn map_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Json<FeatureCollection> {
    Json(state.map(&params))
}

async fn click_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ClickParams>,
    headers: HeaderMap,
) -> Response {
    let (session, is_new) = session_id(&headers);
    let body = state.click(&session, params.lat, params.lon);
    with_session_cookie(Json(body).into_response(), &session, is_new)
}

async fn detail_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DetailParams>,
) -> Json<DetailResponse> {
    Json(state.detail(&params))
}

async fn selection_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (session, is_new) = session_id(&headers);
    let selection = state.sessions.selection(&session);
    with_session_cookie(Json(selection).into_response(), &session, is_new)
}
