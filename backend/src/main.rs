use pathlab_backend::{
    AppState, config::AppConfig, create_router, dataset::Dataset, engine::RouteEngine,
    error::AppError, graph::GraphBuilder,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pathlab_backend=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let builder = GraphBuilder::new(config.graph);

    let dataset = Dataset::read_from_path(&config.dataset_path)?;
    let engine = RouteEngine::from_dataset(&dataset, &builder);
    tracing::info!(
        "loaded dataset from {}: {} nodes, {} edges ({:?})",
        config.dataset_path.display(),
        engine.graph().node_count(),
        engine.graph().edge_count(),
        engine.graph().mode()
    );

    let state = AppState::new(engine, builder, config.graph_cache_capacity)
        .with_max_custom_nodes(config.max_custom_nodes);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("starting backend on http://{}", config.bind_addr);
    tracing::info!("API endpoints:");
    tracing::info!("  GET  /api/nodes - Dataset nodes");
    tracing::info!("  GET  /api/nodes/nearby - Nodes around a coordinate");
    tracing::info!("  POST /api/route - Traced route on the loaded dataset");
    tracing::info!("  POST /api/route/custom - Traced route on a posted graph");
    axum::serve(listener, app).await?;

    Ok(())
}
