use axum::{
    extract::{Json, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
    middleware::{self, Next},
    http::{Request, StatusCode},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{info, error, warn};

use assetmap::config::Config;
use assetmap::coord_cache::CoordinateCache;
use assetmap::detail::{DetailState, MapEvent};
use assetmap::engine::{Engine, MapSession};
use assetmap::geocoder::NominatimGeocoder;
use assetmap::models::{CameraRequest, Viewport};
use assetmap::renderer::Marker;
use assetmap::resolver::Resolver;
use assetmap::store::{self, AssetStore};
use assetmap::template_engine::TemplateEngine;

const DEFAULT_VIEWPORT_SIZE: (u32, u32) = (1280, 800);

struct AppState {
    store: AssetStore,
    engine: Mutex<Engine<NominatimGeocoder>>,
    session: Mutex<Option<MapSession>>,
    /// Id of the most recently requested render cycle.
    latest_cycle: AtomicU64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    let config = Config::load()?;
    let thread_count = config.thread_count.unwrap_or_else(num_cpus::get);

    info!("starting server with {} threads", thread_count);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(thread_count)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn log_request_response(
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let method = req.method().to_string();
    info!("incoming request: {} {}", method, path);
    let response = next.run(req).await;
    info!("request result: {} for {} {}", response.status(), method, path);
    response
}

async fn async_main(config: Config) -> anyhow::Result<()> {
    let templates = TemplateEngine::new(&config.templates_dir)?;
    let cache = match CoordinateCache::open(&config.cache_path).await {
        Ok(cache) => cache,
        Err(e) => {
            warn!("coordinate cache unavailable ({}), continuing without persistence", e);
            CoordinateCache::detached()
        }
    };
    let geocoder = NominatimGeocoder::new(&config.geocoder)?;
    let resolver = Resolver::new(geocoder, cache, &config.geocoder);
    let engine = Engine::new(resolver, templates, config.map.clone());

    let state = Arc::new(AppState {
        store: AssetStore::new(config.data_file.clone()),
        engine: Mutex::new(engine),
        session: Mutex::new(None),
        latest_cycle: AtomicU64::new(0),
    });

    let app = Router::new()
        .route("/api/assets", get(get_assets).post(post_assets))
        .route("/api/map/render", post(render_map))
        .route("/api/map/events", post(map_event))
        .route("/api/map/overlay", get(get_overlay))
        .layer(middleware::from_fn(log_request_response))
        .with_state(state);

    info!("listening on {}", config.listen_addr);
    let listener = TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

// --- Handlers ---

async fn get_assets(State(state): State<Arc<AppState>>) -> Response {
    match state.store.load() {
        Ok(Some(doc)) => Json(doc).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Assets file not found"),
        Err(e) => {
            error!("failed to read {}: {}", state.store.path().display(), e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "unable to read assets")
        }
    }
}

async fn post_assets(State(state): State<Arc<AppState>>, body: String) -> Response {
    let doc = match store::validate(&body) {
        Ok(doc) => doc,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    match state.store.save(&doc) {
        Ok(()) => (StatusCode::CREATED, Json(json!({ "message": "Assets saved successfully" }))).into_response(),
        Err(e) => {
            error!("failed to save assets: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "unable to save assets")
        }
    }
}

#[derive(Deserialize, Default)]
struct RenderRequest {
    viewport: Option<Viewport>,
}

#[derive(Serialize)]
struct RenderResponse<'a> {
    cycle: u64,
    title: String,
    markers: &'a [Marker],
    dropped: Vec<String>,
    camera: CameraRequest,
    warning: Option<&'a str>,
}

async fn render_map(State(state): State<Arc<AppState>>, body: String) -> Response {
    let request: RenderRequest = if body.trim().is_empty() {
        RenderRequest::default()
    } else {
        match serde_json::from_str(&body) {
            Ok(r) => r,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("invalid render request: {}", e)),
        }
    };
    let doc = match state.store.load() {
        Ok(Some(doc)) => doc,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Assets file not found"),
        Err(e) => {
            error!("failed to read assets: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "unable to read assets");
        }
    };

    let cycle = state.latest_cycle.fetch_add(1, Ordering::SeqCst) + 1;
    let session = {
        let mut engine = state.engine.lock().await;
        let (w, h) = DEFAULT_VIEWPORT_SIZE;
        let viewport = request.viewport.unwrap_or_else(|| engine.default_viewport(w, h));
        engine.render_cycle(cycle, doc.assets, viewport).await
    };

    if state.latest_cycle.load(Ordering::SeqCst) != cycle {
        info!("discarding stale cycle {}", cycle);
        return error_response(StatusCode::CONFLICT, "superseded by a newer reload");
    }

    let mut slot = state.session.lock().await;
    let session = slot.insert(session);
    Json(RenderResponse {
        cycle,
        title: doc.title,
        markers: &session.markers.markers,
        dropped: session.dropped_names(),
        camera: session.camera,
        warning: session.warning.as_deref(),
    })
    .into_response()
}

#[derive(Deserialize)]
struct EventRequest {
    event: MapEvent,
    viewport: Option<Viewport>,
}

async fn map_event(State(state): State<Arc<AppState>>, Json(request): Json<EventRequest>) -> Response {
    let mut slot = state.session.lock().await;
    let Some(session) = slot.as_mut() else {
        return error_response(StatusCode::CONFLICT, "no map has been rendered yet");
    };
    let outcome = session.dispatch(request.event, request.viewport);
    if let DetailState::Expanded(cluster) = outcome.state {
        info!("cycle {}: cluster {} expanded", session.cycle, cluster);
    }
    Json(outcome).into_response()
}

async fn get_overlay(State(state): State<Arc<AppState>>) -> Response {
    let slot = state.session.lock().await;
    Json(slot.as_ref().and_then(MapSession::overlay_view)).into_response()
}
