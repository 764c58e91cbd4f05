pub mod cache;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod geo;
pub mod graph;
pub mod models;
pub mod playback;

use std::{sync::Arc, time::Instant};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};

use crate::cache::GraphCache;
use crate::config::DEFAULT_MAX_CUSTOM_NODES;
use crate::engine::{RouteEngine, RouteTrace, check_endpoints, find_route};
use crate::error::{AppError, api_error};
use crate::graph::GraphBuilder;
use crate::models::{
    ApiError, Coordinate, CustomRouteRequest, GeoNode, GraphMode, NearbyNode, NearbyQuery, RouteRequest,
    RouteResponse,
};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RouteEngine>,
    pub cache: Arc<GraphCache>,
    pub builder: GraphBuilder,
    pub max_custom_nodes: usize,
}

impl AppState {
    pub fn new(engine: RouteEngine, builder: GraphBuilder, cache_capacity: usize) -> Self {
        Self {
            engine: Arc::new(engine),
            cache: Arc::new(GraphCache::new(cache_capacity)),
            builder,
            max_custom_nodes: DEFAULT_MAX_CUSTOM_NODES,
        }
    }

    pub fn with_max_custom_nodes(mut self, max_custom_nodes: usize) -> Self {
        self.max_custom_nodes = max_custom_nodes;
        self
    }
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/nodes", get(nodes_handler))
        .route("/api/nodes/nearby", get(nearby_handler))
        .route("/api/route", post(route_handler))
        .route("/api/route/custom", post(custom_route_handler))
        .layer(cors)
        .with_state(state)
}

async fn nodes_handler(State(state): State<AppState>) -> Json<Vec<GeoNode>> {
    Json(state.engine.graph().nodes().cloned().collect())
}

async fn nearby_handler(
    State(state): State<AppState>,
    Query(query): Query<NearbyQuery>,
) -> Json<Vec<NearbyNode>> {
    let center = Coordinate {
        lat: query.lat,
        lon: query.lon,
    };
    Json(state.engine.nearby_nodes(center, query.radius_m, query.limit))
}

async fn route_handler(
    State(state): State<AppState>,
    Json(req): Json<RouteRequest>,
) -> ApiResult<RouteResponse> {
    let started = Instant::now();
    let trace = state
        .engine
        .find_route(req.source, req.target)
        .map_err(api_error)?;

    Ok(Json(to_response(trace, state.engine.graph().mode(), started)))
}

async fn custom_route_handler(
    State(state): State<AppState>,
    Json(req): Json<CustomRouteRequest>,
) -> ApiResult<RouteResponse> {
    let started = Instant::now();
    if req.nodes.len() > state.max_custom_nodes {
        return Err(api_error(AppError::TooManyNodes {
            count: req.nodes.len(),
            max: state.max_custom_nodes,
        }));
    }
    check_endpoints(&req.nodes, req.source, req.target).map_err(api_error)?;

    let graph = state
        .cache
        .get_or_build(&req.nodes, req.edges.as_deref(), &state.builder);
    let trace = find_route(&graph, req.source, req.target).map_err(api_error)?;

    Ok(Json(to_response(trace, graph.mode(), started)))
}

fn to_response(trace: RouteTrace, mode: GraphMode, started: Instant) -> RouteResponse {
    let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
    tracing::info!(
        "route computed in {:.2} ms: {} nodes, {:.1} m, {} steps ({:?})",
        elapsed_ms,
        trace.route.len(),
        trace.total_distance_m,
        trace.steps.len(),
        mode
    );

    RouteResponse {
        route: trace.route,
        steps: trace.steps,
        total_distance_meters: trace.total_distance_m,
        nodes_explored: trace.nodes_explored,
        elapsed_ms,
        mode,
    }
}
