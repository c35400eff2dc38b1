//! Edit every saved image with one instruction, then upscale the results.
//!
//! Run `generate_angles` first so `shots.db` has something to work on.
//!
//! ```sh
//! GEMINI_API_KEY=... cargo run --example batch_edit
//! ```

use shotforge::{
    EngineConfig, EnvCredentials, GeminiClient, GenerationConfig, GenerationOrchestrator,
    Resolution, RunInputs, SqliteStore,
};
use std::path::Path;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    shotforge::logging::init_logging(None)?;

    let config = EngineConfig::default();
    let engine = GenerationOrchestrator::new(
        config.clone(),
        GeminiClient::from_config(&config),
        SqliteStore::open(Path::new("shots.db"))?,
        EnvCredentials::new(),
    );
    if engine.load_history().await? == 0 {
        eprintln!("No saved images, run the generate_angles example first");
        return Ok(());
    }

    // A non-empty selection turns the next run into a batch edit.
    let selected = engine.toggle_select_all()?;
    println!("Editing {} images", selected);
    let gen = GenerationConfig::default().with_prompt("make the body matte black");
    let edit = engine.start_run(&gen, RunInputs::default()).await?;
    println!("Batch edit created {} images", edit.images_created);

    // Select only the fresh edits and re-render them at 2k.
    for image in engine.session().images().iter().take(edit.images_created) {
        engine.toggle_selection(&image.id)?;
    }
    let upscale = engine.upscale_selected(&gen, Resolution::TwoK).await?;
    println!("Upscaled {} images to {}", upscale.images_created, Resolution::TwoK);

    for entry in engine.session().logs().iter().rev() {
        println!("{:?} {}", entry.level, entry.message);
    }

    Ok(())
}
