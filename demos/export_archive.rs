//! Export the saved history as a ZIP file, and to Google Drive when a
//! token is available.
//!
//! ```sh
//! cargo run --example export_archive
//! DRIVE_TOKEN=ya29... cargo run --example export_archive
//! ```

use shotforge::{
    DriveClient, EngineConfig, EnvCredentials, GeminiClient, GenerationOrchestrator, SqliteStore,
};
use std::path::Path;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::default();
    let engine = GenerationOrchestrator::new(
        config.clone(),
        GeminiClient::from_config(&config),
        SqliteStore::open(Path::new("shots.db"))?,
        EnvCredentials::new(),
    );
    engine.load_history().await?;

    match engine.export_zip(Path::new(".")).await? {
        Some(path) => println!("Wrote {}", path.display()),
        None => {
            println!("Nothing to export");
            return Ok(());
        }
    }

    let Ok(token) = std::env::var("DRIVE_TOKEN") else {
        println!("Set DRIVE_TOKEN to also upload to Google Drive");
        return Ok(());
    };

    let drive = DriveClient::new(token);
    let report = engine
        .export_history(&drive, None, |done, total| println!("Uploaded {}/{}", done, total))
        .await?;
    println!("Drive folder {}: {} images", report.folder_id, report.uploaded);

    Ok(())
}
