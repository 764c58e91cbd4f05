use std::{path::PathBuf, time::Instant};

use clap::Parser;
use pathlab_backend::{
    dataset::Dataset,
    engine::compute_route,
    geo::path_length_m,
    graph::{DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_CONNECTION_RADIUS_M, GraphBuilderConfig},
    models::{GraphMode, NodeId, RouteResponse},
    playback::PlaybackDriver,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Run a traced shortest-path search over a dataset and replay its steps"
)]
struct Args {
    #[arg(long, default_value = "backend/data/sample_dataset.json")]
    dataset: PathBuf,

    #[arg(long)]
    source: NodeId,

    #[arg(long)]
    target: NodeId,

    /// Print the full route response as JSON instead of replaying it
    #[arg(long)]
    json: bool,

    /// Delay between replayed steps, in milliseconds
    #[arg(long, default_value_t = 200)]
    speed_ms: u64,

    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTION_RADIUS_M)]
    radius_m: f64,

    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    max_connections: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let dataset = Dataset::read_from_path(&args.dataset)?;
    let config = GraphBuilderConfig {
        max_connection_radius_m: args.radius_m,
        max_connections: args.max_connections,
    };
    let mode = if dataset.has_edges() {
        GraphMode::Streets
    } else {
        GraphMode::Proximity
    };

    let started = Instant::now();
    let trace = compute_route(&dataset.nodes, dataset.edges(), args.source, args.target, &config)?;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;

    if args.json {
        let response = RouteResponse {
            route: trace.route,
            steps: trace.steps,
            total_distance_meters: trace.total_distance_m,
            nodes_explored: trace.nodes_explored,
            elapsed_ms,
            mode,
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let driver = PlaybackDriver::spawn(trace.steps.clone(), args.speed_ms);
    let mut updates = driver.subscribe();
    driver.play()?;
    updates.changed().await?;

    let mut printed: Option<usize> = None;
    loop {
        let snapshot = updates.borrow_and_update().clone();
        if printed != Some(snapshot.current_index) {
            if let Some(step) = &snapshot.current_step {
                println!(
                    "[{:>3}/{}] {:<12} {}",
                    step.step,
                    snapshot.len,
                    format!("{:?}", step.action),
                    step.description
                );
            }
            printed = Some(snapshot.current_index);
        }
        if !snapshot.is_playing {
            break;
        }
        if updates.changed().await.is_err() {
            break;
        }
    }
    driver.shutdown().await?;

    if trace.route.is_empty() {
        println!("no route from {} to {} ({:?} graph)", args.source, args.target, mode);
    } else {
        let path: Vec<String> = trace.route.iter().map(|node| node.id.to_string()).collect();
        println!(
            "route {} | {:.1} m ({:.1} m straight-line) | {} nodes explored | {} steps | {:.2} ms ({:?} graph)",
            path.join(" -> "),
            trace.total_distance_m,
            path_length_m(&trace.route),
            trace.nodes_explored,
            trace.steps.len(),
            elapsed_ms,
            mode
        );
    }

    Ok(())
}
