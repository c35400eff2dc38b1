//! Render one product from three angles with anchor-consistent views.
//!
//! Requires a Gemini API key in `GEMINI_API_KEY`. Images are saved to
//! `shots.db` and survive restarts.
//!
//! ```sh
//! GEMINI_API_KEY=... cargo run --example generate_angles
//! ```

use shotforge::{
    Angle, Background, EngineConfig, EnvCredentials, GeminiClient, GenerationConfig,
    GenerationOrchestrator, ImageStyle, RunInputs, SqliteStore,
};
use std::path::Path;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    shotforge::logging::init_logging(Some("info"))?;

    let config = EngineConfig::builder().with_concurrency(5).build();
    let engine = GenerationOrchestrator::new(
        config.clone(),
        GeminiClient::from_config(&config),
        SqliteStore::open(Path::new("shots.db"))?,
        EnvCredentials::new(),
    );
    let loaded = engine.load_history().await?;
    println!("History: {} images", loaded);

    let mut gen = GenerationConfig::default()
        .with_prompt("a vintage rangefinder camera with brass dials")
        .with_angles(&[Angle::Front, Angle::LeftSide, Angle::Isometric]);
    gen.style = ImageStyle::Claymation;
    gen.background = Background::White;

    // Front renders first; the other angles reuse its image and seed.
    let summary = engine.start_run(&gen, RunInputs::default()).await?;
    println!(
        "Launched {} requests, {} failed, {} new images",
        summary.report.launched, summary.report.failed, summary.images_created
    );

    for image in engine.session().images().iter().take(summary.images_created) {
        println!("  [{}] {} ({})", image.angle, image.id, image.resolution);
    }
    if let Some(error) = engine.session().error() {
        eprintln!("Error: {}", error);
    }

    Ok(())
}
