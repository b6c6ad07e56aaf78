use crate::client::{BackendConfig, HttpBackend, TRAVERSAL_DEPTH, TaxonomyBackend};
use crate::model::{Plant, RawEntry};
use crate::normalize;
use crate::session::{ExplorerSession, RelatedResponse};
use askama::Template;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use cookie::Cookie;
use parking_lot::RwLock;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::info;

type SharedState = Arc<AppState>;
const MAX_SESSION_COUNT: usize = 4096;
const SESSION_COOKIE: &str = "plantarium_session";
const SESSION_ID_LEN: usize = 24;

pub struct AppState {
    backend: Arc<HttpBackend>,
    sessions: SessionRegistry,
    theme: WebTheme,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum WebTheme {
    #[default]
    Tailwind,
    Bootstrap,
}

impl fmt::Display for WebTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebTheme::Tailwind => write!(f, "tailwind"),
            WebTheme::Bootstrap => write!(f, "bootstrap"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Chrome {
    use_tailwind: bool,
    use_bootstrap: bool,
    body_class: &'static str,
    main_class: &'static str,
    card_class: &'static str,
    eyebrow_class: &'static str,
    headline_class: &'static str,
    lede_class: &'static str,
    button_class: &'static str,
    input_class: &'static str,
    list_row_class: &'static str,
    selected_class: &'static str,
    muted_class: &'static str,
}

impl Chrome {
    fn new(theme: WebTheme) -> Self {
        match theme {
            WebTheme::Tailwind => Self {
                use_tailwind: true,
                use_bootstrap: false,
                body_class: "bg-slate-50 text-slate-900",
                main_class: "min-h-screen flex flex-col items-center justify-start py-10 px-4",
                card_class: "max-w-6xl w-full space-y-6",
                eyebrow_class: "uppercase tracking-wide text-sm text-slate-500",
                headline_class: "text-4xl font-extrabold tracking-tight",
                lede_class: "text-lg text-slate-600",
                button_class: "inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold shadow hover:bg-slate-800 transition-colors",
                input_class: "w-full rounded-md border border-slate-300 px-3 py-2 mb-2",
                list_row_class: "border-b border-slate-200 hover:bg-slate-100",
                selected_class: "bg-slate-200",
                muted_class: "text-slate-500",
            },
            WebTheme::Bootstrap => Self {
                use_tailwind: false,
                use_bootstrap: true,
                body_class: "bg-light text-dark",
                main_class: "container py-5",
                card_class: "mx-auto col-lg-11",
                eyebrow_class: "text-uppercase text-muted mb-2",
                headline_class: "display-5 fw-bold",
                lede_class: "lead mb-4",
                button_class: "btn btn-primary px-4 py-2",
                input_class: "form-control mb-2",
                list_row_class: "list-group-item list-group-item-action",
                selected_class: "active",
                muted_class: "text-muted",
            },
        }
    }
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub theme: WebTheme,
    pub backend: BackendConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            theme: WebTheme::default(),
            backend: BackendConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn serve(config: WebConfig) -> Result<(), WebError> {
    let state = Arc::new(AppState {
        backend: Arc::new(HttpBackend::new(config.backend.clone())),
        sessions: SessionRegistry::new(),
        theme: config.theme,
    });
    let router = build_router(state);
    info!(
        %config.addr,
        theme = ?config.theme,
        backend = %config.backend.base_url,
        "Binding HTTP listener"
    );
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/search", get(search_html))
        .route("/related", get(related_html))
        .route("/hierarchy", get(hierarchy_html))
        .route("/api/search", get(api_search))
        .route("/api/related", get(api_related))
        .route("/api/hierarchy", get(api_hierarchy))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Explorer sessions keyed by cookie. The table is capped; the oldest
/// session is dropped once the cap is reached.
struct SessionRegistry {
    inner: RwLock<SessionTable>,
}

#[derive(Default)]
struct SessionTable {
    sessions: HashMap<String, Arc<ExplorerSession<HttpBackend>>>,
    order: VecDeque<String>,
}

impl SessionRegistry {
    fn new() -> Self {
        Self {
            inner: RwLock::new(SessionTable::default()),
        }
    }

    fn get_or_create(
        &self,
        id: &str,
        backend: &Arc<HttpBackend>,
    ) -> Arc<ExplorerSession<HttpBackend>> {
        if let Some(session) = self.inner.read().sessions.get(id) {
            return session.clone();
        }
        let mut guard = self.inner.write();
        if let Some(session) = guard.sessions.get(id) {
            return session.clone();
        }
        while guard.sessions.len() >= MAX_SESSION_COUNT {
            match guard.order.pop_front() {
                Some(evicted) => {
                    guard.sessions.remove(&evicted);
                }
                None => break,
            }
        }
        let session = Arc::new(ExplorerSession::new(backend.clone()));
        guard.sessions.insert(id.to_string(), session.clone());
        guard.order.push_back(id.to_string());
        session
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.read().sessions.len()
    }

    #[cfg(test)]
    fn contains(&self, id: &str) -> bool {
        self.inner.read().sessions.contains_key(id)
    }
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    Cookie::split_parse(raw)
        .flatten()
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

fn new_session_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

fn resolve_session(
    state: &SharedState,
    headers: &HeaderMap,
) -> (Arc<ExplorerSession<HttpBackend>>, String, bool) {
    match session_cookie(headers) {
        Some(id) => {
            let session = state.sessions.get_or_create(&id, &state.backend);
            (session, id, false)
        }
        None => {
            let id = new_session_id();
            let session = state.sessions.get_or_create(&id, &state.backend);
            (session, id, true)
        }
    }
}

fn page_response(
    theme: WebTheme,
    session: &ExplorerSession<HttpBackend>,
    session_id: String,
    is_new: bool,
) -> Response {
    let mut response = Html(render_explorer(theme, session)).into_response();
    if is_new {
        let cookie = Cookie::build((SESSION_COOKIE, session_id))
            .path("/")
            .http_only(true)
            .build();
        if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
    }
    response
}

async fn home(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let (session, id, is_new) = resolve_session(&state, &headers);
    page_response(state.theme, &session, id, is_new)
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    term: Option<String>,
}

async fn search_html(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Response {
    let (session, id, is_new) = resolve_session(&state, &headers);
    if let Some(term) = params.term.as_deref() {
        session.search.search(term).await;
    }
    page_response(state.theme, &session, id, is_new)
}

#[derive(Debug, Deserialize)]
struct DescriptorParams {
    descriptor: Option<String>,
}

async fn related_html(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<DescriptorParams>,
) -> Response {
    let (session, id, is_new) = resolve_session(&state, &headers);
    let Some(descriptor) = params.descriptor.as_deref() else {
        return Html(render_error_page(
            state.theme,
            "Query parameter `descriptor` is required",
        ))
        .into_response();
    };
    match session.result_by_descriptor(descriptor) {
        Some(plant) => {
            session.detail.load_related(plant).await;
            page_response(state.theme, &session, id, is_new)
        }
        None => Html(render_error_page(
            state.theme,
            format!("Unknown descriptor {descriptor:?}"),
        ))
        .into_response(),
    }
}

async fn hierarchy_html(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<DescriptorParams>,
) -> Response {
    let (session, id, is_new) = resolve_session(&state, &headers);
    let Some(descriptor) = params.descriptor.as_deref() else {
        return Html(render_error_page(
            state.theme,
            "Query parameter `descriptor` is required",
        ))
        .into_response();
    };
    match session.synonym_by_descriptor(descriptor) {
        Some(synonym) => {
            session.hierarchy.load_hierarchy(synonym).await;
            page_response(state.theme, &session, id, is_new)
        }
        None => Html(render_error_page(
            state.theme,
            format!("Unknown descriptor {descriptor:?}"),
        ))
        .into_response(),
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "plantarium-web" }))
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn upstream(err: impl fmt::Display) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SearchPayload {
    term: String,
    results: Vec<Plant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RelatedPayload {
    descriptor: String,
    depth: u32,
    result: Vec<RawEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HierarchyPayload {
    descriptor: String,
    depth: u32,
    hierarchy: Vec<Plant>,
}

fn require_param(value: Option<&str>, name: &str) -> Result<String, ApiError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request(format!("Query parameter `{name}` is required")))
}

async fn api_search(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchPayload>, ApiError> {
    let term = require_param(params.term.as_deref(), "term")?;
    let entries = state.backend.search(&term).await.map_err(ApiError::upstream)?;
    let results = normalize::normalize(&entries).map_err(ApiError::upstream)?;
    Ok(Json(SearchPayload { term, results }))
}

async fn api_related(
    State(state): State<SharedState>,
    Query(params): Query<DescriptorParams>,
) -> Result<Json<RelatedPayload>, ApiError> {
    let descriptor = require_param(params.descriptor.as_deref(), "descriptor")?;
    let result = state
        .backend
        .related(&descriptor, TRAVERSAL_DEPTH)
        .await
        .map_err(ApiError::upstream)?;
    Ok(Json(RelatedPayload {
        descriptor,
        depth: TRAVERSAL_DEPTH,
        result,
    }))
}

async fn api_hierarchy(
    State(state): State<SharedState>,
    Query(params): Query<DescriptorParams>,
) -> Result<Json<HierarchyPayload>, ApiError> {
    let descriptor = require_param(params.descriptor.as_deref(), "descriptor")?;
    let entries = state
        .backend
        .hierarchy(&descriptor, TRAVERSAL_DEPTH)
        .await
        .map_err(ApiError::upstream)?;
    let hierarchy =
        normalize::display_order(normalize::normalize(&entries).map_err(ApiError::upstream)?);
    Ok(Json(HierarchyPayload {
        descriptor,
        depth: TRAVERSAL_DEPTH,
        hierarchy,
    }))
}

fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

fn related_path(descriptor: &str) -> String {
    format!("/related?descriptor={}", encode_component(descriptor))
}

fn hierarchy_path(descriptor: &str) -> String {
    format!("/hierarchy?descriptor={}", encode_component(descriptor))
}

#[derive(Debug, Clone)]
struct ResultRow {
    href: String,
    selected: bool,
    caption: String,
    detail: String,
}

#[derive(Debug, Clone)]
struct SynonymRow {
    href: String,
    selected: bool,
    label: String,
    detail: String,
}

#[derive(Debug, Clone)]
struct HierarchyRow {
    label: String,
    scheme: String,
}

fn render_explorer(theme: WebTheme, session: &ExplorerSession<HttpBackend>) -> String {
    let search = session.search.snapshot();
    let detail = session.detail.snapshot();
    let hierarchy = session.hierarchy.snapshot();

    let selected_descriptor = detail
        .selected
        .as_ref()
        .map(|plant| plant.descriptor.clone());
    let results: Vec<ResultRow> = search
        .results
        .iter()
        .flatten()
        .map(|plant| ResultRow {
            href: related_path(&plant.descriptor),
            selected: selected_descriptor.as_deref() == Some(plant.descriptor.as_str()),
            caption: plant.result_caption(),
            detail: plant.result_detail(),
        })
        .collect();

    let selected_synonym = hierarchy
        .selected_synonym
        .as_ref()
        .map(|plant| plant.descriptor.clone());
    let (show_detail, detail_loading, synonyms) = match &detail.response {
        RelatedResponse::Hidden => (false, false, Vec::new()),
        RelatedResponse::Loading => (true, true, Vec::new()),
        RelatedResponse::Loaded(entries) => {
            let rows = entries
                .iter()
                .map(|entry| {
                    let fields = entry.display_fields();
                    SynonymRow {
                        href: hierarchy_path(&fields.descriptor),
                        selected: selected_synonym.as_deref() == Some(fields.descriptor.as_str()),
                        detail: fields.synonym_detail(),
                        label: fields.pref_label,
                    }
                })
                .collect();
            (true, false, rows)
        }
    };

    let header = detail
        .selected
        .as_ref()
        .map(Plant::header_caption)
        .unwrap_or_default();
    let (hierarchy_loaded, hierarchy_rows) = match &hierarchy.chain {
        None => (false, Vec::new()),
        Some(chain) => (
            true,
            chain
                .iter()
                .map(|plant| HierarchyRow {
                    label: plant.pref_label.clone(),
                    scheme: plant.in_scheme.clone(),
                })
                .collect(),
        ),
    };

    let template = ExplorerTemplate {
        chrome: Chrome::new(theme),
        version: env!("CARGO_PKG_VERSION"),
        term: search.term,
        loading: search.loading,
        results,
        show_detail,
        detail_loading,
        header,
        synonyms,
        hierarchy_loaded,
        hierarchy: hierarchy_rows,
    };
    template
        .render()
        .unwrap_or_else(|err| render_error_page(theme, err.to_string()))
}

fn render_error_page(theme: WebTheme, message: impl Into<String>) -> String {
    let template = ErrorTemplate {
        chrome: Chrome::new(theme),
        message: message.into(),
    };
    template
        .render()
        .unwrap_or_else(|err| format!("render failure: {err}"))
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Plantarium • Explorer</title>
    {% if chrome.use_tailwind %}
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    {% endif %}
    {% if chrome.use_bootstrap %}
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">
    {% endif %}
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }}">
        <div>
          <p class="{{ chrome.eyebrow_class }}">Plantarium v{{ version }}</p>
          <h1 class="{{ chrome.headline_class }}">Plant thesaurus explorer</h1>
        </div>
        <div class="flex flex-row gap-8 d-flex align-items-start">
          <aside class="w-96 flex-none col-4">
            <form method="get" action="/search" class="mb-4">
              <input type="text" name="term" value="{{ term }}" placeholder="Search term" class="{{ chrome.input_class }}" />
              <button type="submit" class="{{ chrome.button_class }} w-full">Search</button>
            </form>
            {% if loading %}
            <p class="{{ chrome.muted_class }}">Searching…</p>
            {% endif %}
            {% if results.len() == 0 %}
            <div class="{{ chrome.muted_class }}">
              <p>No results - insert new search term</p>
              <p>Press Search to submit</p>
            </div>
            {% else %}
            <ul class="list-none p-0 m-0 list-group">
              {% for row in results %}
              <li class="{{ chrome.list_row_class }}{% if row.selected %} {{ chrome.selected_class }}{% endif %}">
                <a href="{{ row.href }}" class="block px-3 py-2 text-inherit no-underline">
                  <p class="font-semibold mb-0">{{ row.caption }}</p>
                  <p class="text-sm {{ chrome.muted_class }} mb-0">{{ row.detail }}</p>
                </a>
              </li>
              {% endfor %}
            </ul>
            {% endif %}
          </aside>
          {% if show_detail %}
          <section class="flex-1 col-8">
            <div class="flex flex-row gap-8 d-flex align-items-start">
              <div class="flex-1">
                <h2 class="text-3xl font-bold">Synonyms</h2>
                {% if header.len() > 0 %}
                <p class="{{ chrome.lede_class }}">{{ header }}</p>
                {% endif %}
                {% if detail_loading %}
                <p class="{{ chrome.muted_class }}">Loading synonyms…</p>
                {% else %}
                {% if synonyms.len() == 0 %}
                <p class="{{ chrome.muted_class }}">No synonyms found</p>
                {% else %}
                <ul class="list-none p-0 m-0 list-group">
                  {% for row in synonyms %}
                  <li class="{{ chrome.list_row_class }}{% if row.selected %} {{ chrome.selected_class }}{% endif %}">
                    <a href="{{ row.href }}" class="block px-3 py-2 text-inherit no-underline">
                      <p class="font-semibold mb-0">{{ row.label }}</p>
                      <p class="text-sm {{ chrome.muted_class }} mb-0">{{ row.detail }}</p>
                    </a>
                  </li>
                  {% endfor %}
                </ul>
                {% endif %}
                {% endif %}
              </div>
              <div class="w-72 flex-none col-3">
                <h2 class="text-3xl font-bold">Hierarchy</h2>
                {% if hierarchy_loaded %}
                {% if hierarchy.len() == 0 %}
                <p class="{{ chrome.muted_class }}">No hierarchy entries</p>
                {% else %}
                <ul class="list-none p-0 m-0">
                  {% for row in hierarchy %}
                  <li class="py-1 flex justify-between d-flex justify-content-between">
                    <span class="text-lg mr-4">{{ row.label }}</span>
                    <span class="{{ chrome.muted_class }}">{{ row.scheme }}</span>
                  </li>
                  {% endfor %}
                </ul>
                {% endif %}
                {% else %}
                <p class="{{ chrome.muted_class }}">Click on a synonym to load</p>
                {% endif %}
              </div>
            </div>
          </section>
          {% endif %}
        </div>
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct ExplorerTemplate {
    chrome: Chrome,
    version: &'static str,
    term: String,
    loading: bool,
    results: Vec<ResultRow>,
    show_detail: bool,
    detail_loading: bool,
    header: String,
    synonyms: Vec<SynonymRow>,
    hierarchy_loaded: bool,
    hierarchy: Vec<HierarchyRow>,
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Plantarium • Error</title>
    {% if chrome.use_tailwind %}
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    {% endif %}
    {% if chrome.use_bootstrap %}
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">
    {% endif %}
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }}">
        <h1 class="{{ chrome.headline_class }}">Something went wrong</h1>
        <p class="{{ chrome.lede_class }}">{{ message }}</p>
        <a href="/" class="{{ chrome.button_class }}">Back to the explorer</a>
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct ErrorTemplate {
    chrome: Chrome,
    message: String,
}

#[cfg(all(test, feature = "web"))]
mod tests {
    use super::*;
    use axum::{body, body::Body, http::Request};
    use serde_json::Value;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry_json(descriptor: &str, label: &str) -> Value {
        json!({
            "descriptor": descriptor,
            "attributes": [
                { "schema": "skos:prefLabel", "literal": label },
                { "schema": "skos:inScheme", "literal": "WFO" },
                { "schema": "skos:historyNote", "literal": "2019" },
                { "schema": "skos:definition", "literal": "accepted" }
            ]
        })
    }

    fn test_state(base_url: String) -> SharedState {
        Arc::new(AppState {
            backend: Arc::new(HttpBackend::new(BackendConfig { base_url })),
            sessions: SessionRegistry::new(),
            theme: WebTheme::Tailwind,
        })
    }

    fn test_router(base_url: String) -> Router {
        build_router(test_state(base_url))
    }

    async fn body_text(response: Response) -> String {
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn session_cookie_of(response: &Response) -> String {
        response
            .headers()
            .get(header::SET_COOKIE)
            .expect("session cookie set")
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let router = test_router("http://localhost:1".to_string());
        let response = router
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_success());
        let text = body_text(response).await;
        assert!(text.contains("plantarium-web"));
    }

    #[tokio::test]
    async fn home_shows_search_hint_and_sets_cookie() {
        let router = test_router("http://localhost:1".to_string());
        let response = router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_success());
        assert!(response.headers().contains_key(header::SET_COOKIE));
        let text = body_text(response).await;
        assert!(text.contains("No results - insert new search term"));
        assert!(!text.contains("Synonyms"));
    }

    #[tokio::test]
    async fn search_renders_result_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("term", "rose"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [entry_json("d1", "Rosa canina")]
            })))
            .mount(&server)
            .await;

        let router = test_router(server.uri());
        let response = router
            .oneshot(
                Request::get("/search?term=rose")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_success());
        let text = body_text(response).await;
        assert!(text.contains("Rosa canina (2019)"));
        assert!(text.contains("/related?descriptor=d1"));
    }

    #[tokio::test]
    async fn failed_search_still_renders_the_hint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let router = test_router(server.uri());
        let response = router
            .oneshot(
                Request::get("/search?term=rose")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_success());
        let text = body_text(response).await;
        assert!(text.contains("No results - insert new search term"));
    }

    #[tokio::test]
    async fn related_flow_renders_synonyms_for_the_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [entry_json("d1", "Rosa canina")]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/related"))
            .and(query_param("descriptor", "d1"))
            .and(query_param("depth", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [entry_json("syn1", "Rosa corymbifera")]
            })))
            .mount(&server)
            .await;

        let router = test_router(server.uri());
        let first = router
            .clone()
            .oneshot(
                Request::get("/search?term=rose")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let cookie = session_cookie_of(&first);

        let second = router
            .oneshot(
                Request::get("/related?descriptor=d1")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(second.status().is_success());
        let text = body_text(second).await;
        assert!(text.contains("Synonyms"));
        assert!(text.contains("Rosa canina as WFO | status: accepted [2019]"));
        assert!(text.contains("Rosa corymbifera"));
        assert!(text.contains("/hierarchy?descriptor=syn1"));
        assert!(text.contains("Click on a synonym to load"));
    }

    #[tokio::test]
    async fn hierarchy_flow_renders_the_reversed_walk() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [entry_json("d1", "Rosa canina")]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/related"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [entry_json("syn1", "Rosa corymbifera")]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/hierarchy"))
            .and(query_param("descriptor", "syn1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [entry_json("a", "Alpha"), entry_json("b", "Beta")]
            })))
            .mount(&server)
            .await;

        let router = test_router(server.uri());
        let first = router
            .clone()
            .oneshot(
                Request::get("/search?term=rose")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let cookie = session_cookie_of(&first);

        router
            .clone()
            .oneshot(
                Request::get("/related?descriptor=d1")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let third = router
            .oneshot(
                Request::get("/hierarchy?descriptor=syn1")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(third.status().is_success());
        let text = body_text(third).await;
        let beta = text.find("Beta").expect("walk rendered");
        let alpha = text.find("Alpha").expect("walk rendered");
        assert!(beta < alpha, "hierarchy must render reversed");
    }

    #[tokio::test]
    async fn related_for_unknown_descriptor_renders_error_page() {
        let router = test_router("http://localhost:1".to_string());
        let response = router
            .oneshot(
                Request::get("/related?descriptor=nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_success());
        let text = body_text(response).await;
        assert!(text.contains("Something went wrong"));
        assert!(text.contains("Unknown descriptor"));
    }

    #[tokio::test]
    async fn api_search_returns_normalized_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("term", "rose"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [entry_json("d1", "Rosa canina")]
            })))
            .mount(&server)
            .await;

        let router = test_router(server.uri());
        let response = router
            .oneshot(
                Request::get("/api/search?term=rose")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_success());
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let payload: SearchPayload = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(payload.term, "rose");
        assert_eq!(payload.results[0].pref_label, "Rosa canina");
    }

    #[tokio::test]
    async fn api_search_without_term_is_a_bad_request() {
        let router = test_router("http://localhost:1".to_string());
        let response = router
            .oneshot(Request::get("/api/search").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn api_hierarchy_returns_reversed_chain() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hierarchy"))
            .and(query_param("descriptor", "d1"))
            .and(query_param("depth", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [entry_json("a", "Alpha"), entry_json("b", "Beta")]
            })))
            .mount(&server)
            .await;

        let router = test_router(server.uri());
        let response = router
            .oneshot(
                Request::get("/api/hierarchy?descriptor=d1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_success());
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let payload: HierarchyPayload = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(payload.depth, 2);
        assert_eq!(payload.hierarchy[0].descriptor, "b");
        assert_eq!(payload.hierarchy[1].descriptor, "a");
    }

    #[tokio::test]
    async fn session_registry_caps_and_evicts_oldest() {
        let backend = Arc::new(HttpBackend::new(BackendConfig::default()));
        let registry = SessionRegistry::new();
        for index in 0..(MAX_SESSION_COUNT + 1) {
            registry.get_or_create(&format!("session-{index}"), &backend);
        }
        assert_eq!(registry.len(), MAX_SESSION_COUNT);
        assert!(!registry.contains("session-0"));
        assert!(registry.contains(&format!("session-{MAX_SESSION_COUNT}")));
    }
}
