mod cli;
mod config;
mod pipeline;
mod run_artifacts;
mod run_context;
mod video;

use anyhow::Result;
use cli::Args;
use config::PipelineConfig;
use pipeline::orchestrator::run_pipeline;
use pipeline::runner::ModelRunner;

fn main() -> Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args = Args::parse_args();
    let cwd = std::env::current_dir()?;
    let config = PipelineConfig::from_args(&args, &cwd)?;

    // Load the model before the output tree is wiped so a bad model path
    // leaves previous results untouched.
    let mut detector = ModelRunner::new(&config.model_path, config.min_confidence)?;

    let summary = run_pipeline(&config, &mut detector)?;
    tracing::info!(
        "Finished: {} video(s), {} frame(s) sampled, {} detector call(s)",
        summary.videos.len(),
        summary.total_frames_written(),
        summary.detector_invocations
    );

    Ok(())
}
