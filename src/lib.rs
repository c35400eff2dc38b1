//! # shotforge
//!
//! Multi-angle product-photo generation engine for remote image models.
//!
//! Turns one generation request into a set of consistent product shots:
//! several camera angles, styles, resolutions and batch repetitions, each
//! rendered by a remote image backend under a bounded concurrency limit.
//!
//! ## Features
//!
//! - **Anchor-consistent angles**: text-only runs render the first angle,
//!   then derive every other angle from it with the same seed
//! - **Three run modes**: new generation, batch edit of selected images,
//!   batch upscale to 2k/4k
//! - **Bounded concurrency**: sliding window of at most N requests, with
//!   cooperative cancellation at every task boundary
//! - **Deterministic prompts**: 20 rendering styles, background keying,
//!   border rules and color palettes compiled into one instruction
//! - **Credential lifecycle**: rejected keys are detected and re-acquired
//!   before the next run
//! - **Pluggable collaborators**: [`ImageBackend`], [`ImageStore`],
//!   [`CredentialProvider`], [`ArchiveUploader`] with Gemini, SQLite and
//!   Google Drive reference implementations
//! - **History export**: upload to a Drive folder or pack into a ZIP archive
//!
//! ## Quick Start
//!
//! ```no_run
//! use shotforge::{
//!     Angle, EngineConfig, EnvCredentials, GeminiClient, GenerationConfig,
//!     GenerationOrchestrator, ImageStyle, RunInputs, SqliteStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> shotforge::Result<()> {
//!     shotforge::logging::init_logging(Some("info"))?;
//!
//!     let config = EngineConfig::builder().with_concurrency(5).build();
//!     let engine = GenerationOrchestrator::new(
//!         config.clone(),
//!         GeminiClient::from_config(&config),
//!         SqliteStore::open(std::path::Path::new("shots.db"))?,
//!         EnvCredentials::new(),
//!     );
//!     engine.load_history().await?;
//!
//!     let mut gen = GenerationConfig::default()
//!         .with_prompt("a vintage film camera")
//!         .with_angles(&[Angle::Front, Angle::LeftSide, Angle::Isometric]);
//!     gen.style = ImageStyle::Claymation;
//!
//!     let summary = engine.start_run(&gen, RunInputs::default()).await?;
//!     println!("created {} images", summary.images_created);
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod config;
pub mod credentials;
#[cfg(feature = "sqlite")]
pub mod db;
pub mod error;
pub mod executor;
pub mod gemini;
pub mod limiter;
pub mod logging;
pub mod orchestrator;
pub mod palette;
pub mod plan;
pub mod prompt;
pub mod session;
pub mod store;
pub mod types;

pub use archive::{
    archive_images, default_folder_name, safe_filename, zip_archive_name, zip_images,
    ArchiveReport, ArchiveUploader, DriveClient,
};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use credentials::{EnvCredentials, StaticCredentials};
pub use error::{Result, StudioError};
pub use executor::{BackendRequest, ImageJob, ImagePayload, ImageRequestExecutor};
pub use gemini::GeminiClient;
pub use limiter::{CancellationFlag, ConcurrencyLimiter, LimiterReport};
pub use orchestrator::{CredentialState, GenerationOrchestrator, RunInputs, RunMode, RunSummary};
pub use palette::{default_palettes, extract_palette, ColorPalette, PaletteBook};
pub use plan::{TaskRole, TaskSpec};
pub use prompt::{BuiltPrompt, ProductPrompt};
pub use session::{LogEntry, LogLevel, RunState, SessionState};
#[cfg(feature = "sqlite")]
pub use store::SqliteStore;
pub use store::{ImageStore, MemoryStore};
pub use types::{
    Angle, AspectRatio, Background, GeneratedImage, GenerationConfig, ImageModel, ImageStyle,
    Resolution,
};

use std::future::Future;

/// The remote image-generation call.
///
/// Implementations send one request and return the first image of the
/// response as a data URL, or `None` when the response held no image.
///
/// # Example
///
/// ```
/// use shotforge::{BackendRequest, ImageBackend, Result};
///
/// struct Placeholder;
///
/// impl ImageBackend for Placeholder {
///     async fn generate(&self, _request: &BackendRequest) -> Result<Option<String>> {
///         Ok(Some("data:image/png;base64,iVBORw0KGgo=".to_string()))
///     }
/// }
/// ```
pub trait ImageBackend: Send + Sync {
    fn generate(
        &self,
        request: &BackendRequest,
    ) -> impl Future<Output = Result<Option<String>>> + Send;
}

/// Source of the API key used for backend requests.
///
/// The engine never assumes a credential exists: after
/// [`request_credential`](Self::request_credential) it polls
/// [`has_credential`](Self::has_credential) until confirmation or timeout.
pub trait CredentialProvider: Send + Sync {
    /// Whether a usable credential is currently available.
    fn has_credential(&self) -> impl Future<Output = bool> + Send;

    /// Ask the host to obtain a credential (e.g. open a key picker).
    fn request_credential(&self) -> impl Future<Output = Result<()>> + Send;

    /// The current token, if any.
    fn token(&self) -> Option<String>;
}
