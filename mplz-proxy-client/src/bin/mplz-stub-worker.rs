// Stand-in for the mplz worker. Acknowledges load and analyze without
// simulating anything, so the proxy can be exercised end to end.

use axum::{routing::post, Json, Router};
use clap::Parser;
use mplz_proxy_core::{AnalyzeRequest, ANALYZE_PATH, LOAD_PATH};
use tracing::info;

#[derive(Parser)]
#[command(name = "mplz-stub-worker")]
#[command(about = "Stand-in mplz worker answering /load and /analyze", long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(long, default_value = "5391")]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let app = Router::new()
        .route(LOAD_PATH, post(load))
        .route(ANALYZE_PATH, post(analyze));

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", args.port)).await?;
    info!("Stub worker listening on http://127.0.0.1:{}", args.port);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn load(file_name: String) -> String {
    info!(file_name = %file_name, "Load requested");
    format!("Loaded {}", file_name)
}

async fn analyze(Json(request): Json<AnalyzeRequest>) -> String {
    info!(
        file_name = %request.file_name,
        iteration = request.iteration,
        simulation_turn = request.simulation_turn,
        "Analyze requested"
    );
    format!(
        "Analyzed {} ({} iterations, {} turns)",
        request.file_name, request.iteration, request.simulation_turn
    )
}
