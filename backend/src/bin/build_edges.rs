use std::path::PathBuf;

use clap::Parser;
use pathlab_backend::{
    dataset::Dataset,
    graph::{DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_CONNECTION_RADIUS_M, GraphBuilder, GraphBuilderConfig},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Precompute proximity edges for a node-only dataset"
)]
struct Args {
    /// Dataset to read (bare node array or {nodes, edges}); existing edges are replaced
    #[arg(long)]
    input: PathBuf,

    /// Output path for the JSON dataset; a .json.zst copy is written beside it
    #[arg(long)]
    output: PathBuf,

    /// Maximum distance between connected nodes, in meters
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTION_RADIUS_M)]
    radius_m: f64,

    /// Maximum neighbors per node (at most one per quadrant)
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    max_connections: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    tracing::info!("deriving edges for {:?} into {:?}", args.input, args.output);

    let mut dataset = Dataset::read_from_path(&args.input)?;
    if dataset.has_edges() {
        tracing::warn!("input already has street edges, replacing them");
    }

    let builder = GraphBuilder::new(GraphBuilderConfig {
        max_connection_radius_m: args.radius_m,
        max_connections: args.max_connections,
    });
    let edges = builder.derive_edges(&dataset.nodes);
    tracing::info!("dataset nodes={} edges={}", dataset.nodes.len(), edges.len());

    dataset.edges = Some(edges);
    dataset.write_to_path(&args.output)?;
    tracing::info!("dataset written to {:?}", args.output);

    Ok(())
}
