use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::archive::{
    archive_images, default_folder_name, zip_archive_name, zip_images, ArchiveReport,
    ArchiveUploader,
};
use crate::config::EngineConfig;
use crate::error::{Result, StudioError};
use crate::executor::{ImageJob, ImageRequestExecutor};
use crate::limiter::{ConcurrencyLimiter, LimiterReport};
use crate::palette::{ColorPalette, PaletteBook};
use crate::plan::{self, TaskSpec};
use crate::prompt::ProductPrompt;
use crate::session::{LogLevel, SessionState};
use crate::store::ImageStore;
use crate::types::{GeneratedImage, GenerationConfig, Resolution};
use crate::{CredentialProvider, ImageBackend};

const PERMISSION_DENIED_MESSAGE: &str = "Permission denied. Select valid API Key.";
const MANUAL_KEY_MESSAGE: &str = "API Key Error. Check your manual key in settings.";

/// What the engine currently believes about the provider's credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialState {
    #[default]
    Unknown,
    Valid,
    /// Rejected by the backend; must be re-acquired before the next run.
    Invalid,
}

/// Which pipeline a run went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    NewGeneration,
    BatchEdit,
    BatchUpscale,
    SingleEdit,
}

/// Extra inputs for [`GenerationOrchestrator::start_run`].
#[derive(Debug, Clone, Default)]
pub struct RunInputs {
    /// Imported multi-line prompt batch. Wins over the config prompt when non-empty.
    pub batch_prompts: Vec<String>,
    /// Uploaded reference image as a data URL.
    pub uploaded_image: Option<String>,
}

/// Outcome of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub mode: RunMode,
    /// Tasks planned up front (derived follow-ups not included).
    pub planned: usize,
    pub report: LimiterReport,
    /// New history entries created by this run.
    pub images_created: usize,
    pub cancelled: bool,
}

/// Per-run values shared by every task of the run.
struct RunContext {
    config: GenerationConfig,
    palette: Option<ColorPalette>,
    api_key: String,
    manual_key: bool,
    created: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Top-level generation state machine.
///
/// Owns the backend, the image store and the credential provider, and
/// drives every run through prompt construction, bounded-concurrency
/// execution and persistence. Share it behind an `Arc` so a host can call
/// [`stop_run`](Self::stop_run) while a run is in progress.
///
/// # Example
/// ```no_run
/// use shotforge::{
///     EngineConfig, EnvCredentials, GeminiClient, GenerationConfig,
///     GenerationOrchestrator, MemoryStore, RunInputs,
/// };
///
/// # async fn example() -> shotforge::Result<()> {
/// let config = EngineConfig::default();
/// let engine = GenerationOrchestrator::new(
///     config.clone(),
///     GeminiClient::from_config(&config),
///     MemoryStore::new(),
///     EnvCredentials::new(),
/// );
///
/// let gen = GenerationConfig::default().with_prompt("a brass pocket watch");
/// let summary = engine.start_run(&gen, RunInputs::default()).await?;
/// println!("{} images", summary.images_created);
/// # Ok(())
/// # }
/// ```
pub struct GenerationOrchestrator<B, S, C> {
    config: EngineConfig,
    executor: ImageRequestExecutor<B>,
    store: S,
    credentials: C,
    session: SessionState,
    palettes: Mutex<PaletteBook>,
    credential_state: Mutex<CredentialState>,
}

impl<B, S, C> GenerationOrchestrator<B, S, C>
where
    B: ImageBackend,
    S: ImageStore,
    C: CredentialProvider,
{
    pub fn new(config: EngineConfig, backend: B, store: S, credentials: C) -> Self {
        Self {
            config,
            executor: ImageRequestExecutor::new(backend),
            store,
            credentials,
            session: SessionState::new(),
            palettes: Mutex::new(PaletteBook::new()),
            credential_state: Mutex::new(CredentialState::Unknown),
        }
    }

    /// Start with previously saved custom palettes.
    pub fn with_palettes(self, palettes: PaletteBook) -> Self {
        *lock(&self.palettes) = palettes;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn backend(&self) -> &B {
        self.executor.backend()
    }

    pub fn credential_state(&self) -> CredentialState {
        *lock(&self.credential_state)
    }

    // ── Runs ────────────────────────────────────────────────────────

    /// Start a run from the current selection and settings.
    ///
    /// A non-empty selection means a batch edit; otherwise a new generation
    /// from the batch prompts or the config prompt. Fails with
    /// [`StudioError::Busy`] if a run is already active.
    pub async fn start_run(&self, gen: &GenerationConfig, inputs: RunInputs) -> Result<RunSummary> {
        self.session.begin_run()?;
        self.session.clear_error();
        let result = self.start_run_inner(gen, inputs).await;
        self.end_run(result)
    }

    async fn start_run_inner(&self, gen: &GenerationConfig, inputs: RunInputs) -> Result<RunSummary> {
        let selected = self.session.selected_images();

        if !selected.is_empty() {
            let tasks = plan::plan_batch_edit(&selected, &gen.prompt, &mut rand::rng());
            let ctx = self.prepare(gen).await?;
            self.session.log(
                LogLevel::Info,
                format!("Batch Edit: {} images.", tasks.len()),
            );
            let summary = self.run_tasks(RunMode::BatchEdit, &ctx, tasks).await;
            self.session.clear_selection();
            self.session.log(LogLevel::Success, "Batch Edit Finished.");
            return Ok(summary);
        }

        let prompts = plan::resolve_prompts(&gen.prompt, &inputs.batch_prompts);
        let tasks = plan::plan_new_generation(
            gen,
            &prompts,
            inputs.uploaded_image.as_deref(),
            &mut rand::rng(),
        )?;
        let ctx = self.prepare(gen).await?;
        self.session.log(
            LogLevel::Info,
            format!(
                "Queueing {} tasks ({} concurrent)...",
                tasks.len(),
                self.config.concurrency
            ),
        );
        let summary = self.run_tasks(RunMode::NewGeneration, &ctx, tasks).await;
        self.session.log(LogLevel::Info, "Finished.");
        Ok(summary)
    }

    /// Re-render every selected image at `target` resolution.
    pub async fn upscale_selected(
        &self,
        gen: &GenerationConfig,
        target: Resolution,
    ) -> Result<RunSummary> {
        self.session.begin_run()?;
        self.session.clear_error();
        let result = self.upscale_inner(gen, target).await;
        self.end_run(result)
    }

    async fn upscale_inner(&self, gen: &GenerationConfig, target: Resolution) -> Result<RunSummary> {
        let selected = self.session.selected_images();
        if selected.is_empty() {
            return Err(StudioError::NothingSelected);
        }
        let tasks = plan::plan_batch_upscale(&selected, target, &mut rand::rng());
        let ctx = self.prepare(gen).await?;
        self.session.log(
            LogLevel::Info,
            format!("Upscaling {} images to {}...", tasks.len(), target),
        );
        let summary = self.run_tasks(RunMode::BatchUpscale, &ctx, tasks).await;
        self.session.clear_selection();
        self.session.log(LogLevel::Success, "Batch Upscale Finished.");
        Ok(summary)
    }

    /// Edit one image with a new prompt, keeping its angle and resolution.
    ///
    /// Runs a single task directly. Returns the new image, `None` when the
    /// backend produced nothing, or the classified request failure.
    pub async fn edit_single(
        &self,
        gen: &GenerationConfig,
        image_id: &str,
        new_prompt: &str,
    ) -> Result<Option<GeneratedImage>> {
        self.session.begin_run()?;
        self.session.clear_error();
        let result = self.edit_single_inner(gen, image_id, new_prompt).await;
        self.end_run(result)
    }

    async fn edit_single_inner(
        &self,
        gen: &GenerationConfig,
        image_id: &str,
        new_prompt: &str,
    ) -> Result<Option<GeneratedImage>> {
        let original = self
            .session
            .find_image(image_id)
            .ok_or_else(|| StudioError::ImageNotFound(image_id.to_string()))?;
        let new_prompt = new_prompt.trim();
        if new_prompt.is_empty() {
            return Err(StudioError::NoPrompt);
        }

        let task = plan::edit_task(
            &original,
            new_prompt.to_string(),
            original.resolution,
            &mut rand::rng(),
        );
        let ctx = self.prepare(gen).await?;
        self.execute_task(&ctx, &task).await
    }

    /// Ask the active run to stop. In-flight requests finish; nothing new
    /// launches. Returns false when no run is active.
    pub fn stop_run(&self) -> bool {
        let stopped = self.session.request_stop();
        if stopped {
            self.session.log(LogLevel::Warning, "Stopping...");
        }
        stopped
    }

    fn end_run<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(StudioError::Cancelled) = &result {
            self.session.log(LogLevel::Warning, "Stopped before any task started.");
        } else if let Err(e) = &result {
            if self.session.error().is_none() {
                self.session.set_error(e.to_string());
            }
            self.session.log(LogLevel::Error, e.to_string());
        }
        self.session.finish_run();
        result
    }

    /// Resolve the credential and the selected palette for a run.
    async fn prepare(&self, gen: &GenerationConfig) -> Result<RunContext> {
        let (api_key, manual_key) = self.ensure_credential().await?;
        let palette = gen
            .selected_palette_id
            .as_deref()
            .and_then(|id| lock(&self.palettes).get(id));
        Ok(RunContext {
            config: gen.clone(),
            palette,
            api_key,
            manual_key,
            created: AtomicUsize::new(0),
        })
    }

    /// The key to use for this run: the manual key if configured, otherwise
    /// the provider's token, requesting one and waiting for confirmation
    /// when it is missing or was rejected.
    async fn ensure_credential(&self) -> Result<(String, bool)> {
        if let Some(key) = self.config.manual_key() {
            return Ok((key.to_string(), true));
        }

        if self.credential_state() != CredentialState::Invalid && self.credentials.has_credential().await {
            if let Some(token) = self.credentials.token() {
                *lock(&self.credential_state) = CredentialState::Valid;
                return Ok((token, false));
            }
        }

        self.session.log(LogLevel::Info, "Requesting API key...");
        self.credentials.request_credential().await?;

        let confirmed = tokio::time::timeout(self.config.credential_timeout, async {
            loop {
                if self.session.is_cancelled() {
                    return Err(StudioError::Cancelled);
                }
                if self.credentials.has_credential().await {
                    if let Some(token) = self.credentials.token() {
                        return Ok(token);
                    }
                }
                tokio::time::sleep(self.config.credential_poll_interval.max(Duration::from_millis(1))).await;
            }
        })
        .await;

        match confirmed {
            Ok(Ok(token)) => {
                *lock(&self.credential_state) = CredentialState::Valid;
                Ok((token, false))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(timeout = ?self.config.credential_timeout, "credential not confirmed");
                Err(StudioError::NoCredential)
            }
        }
    }

    async fn run_tasks(&self, mode: RunMode, ctx: &RunContext, tasks: Vec<TaskSpec>) -> RunSummary {
        let planned = tasks.len();
        tracing::info!(?mode, planned, "run started");

        let limiter = ConcurrencyLimiter::new(
            self.config.concurrency,
            self.session.cancel_flag().clone(),
        );
        let report = limiter.run(tasks, |task| self.run_task(ctx, task)).await;
        let cancelled = self.session.is_cancelled();

        let summary = RunSummary {
            mode,
            planned,
            report,
            images_created: ctx.created.load(Ordering::SeqCst),
            cancelled,
        };
        tracing::info!(
            ?mode,
            launched = report.launched,
            failed = report.failed,
            skipped = report.skipped,
            created = summary.images_created,
            cancelled,
            "run finished"
        );
        summary
    }

    /// Limiter worker: run one task and hand back derived follow-ups when
    /// it was a successful anchor.
    async fn run_task(&self, ctx: &RunContext, task: TaskSpec) -> Result<Vec<TaskSpec>> {
        if self.session.is_cancelled() {
            return Ok(Vec::new());
        }

        match self.execute_task(ctx, &task).await? {
            Some(image) if task.is_anchor() => {
                if self.session.is_cancelled() {
                    return Ok(Vec::new());
                }
                Ok(task.derived_from(&image.image_data))
            }
            Some(_) => Ok(Vec::new()),
            None => {
                if task.is_anchor() {
                    self.session.log(
                        LogLevel::Warning,
                        format!("Anchor [{}] produced no image; skipping its other angles.", task.angle),
                    );
                }
                Ok(Vec::new())
            }
        }
    }

    /// Build the prompt, call the backend and record the result.
    async fn execute_task(&self, ctx: &RunContext, task: &TaskSpec) -> Result<Option<GeneratedImage>> {
        let gen = &ctx.config;
        self.session.log(
            LogLevel::Info,
            if task.editing {
                "Editing/Scaling...".to_string()
            } else {
                format!("Generating [{}]...", task.angle)
            },
        );

        let built = ProductPrompt::new(task.prompt.clone(), task.angle)
            .reference(task.reference.is_some())
            .editing(task.editing)
            .background(gen.background)
            .style(gen.style)
            .border(gen.use_border)
            .palette(ctx.palette.as_ref())
            .build();

        let job = ImageJob {
            model: gen.model,
            text: built.text,
            aspect_ratio: gen.aspect_ratio,
            seed: task.seed,
            resolution: task.resolution,
            api_key: Some(ctx.api_key.clone()),
            reference: task.reference.clone(),
        };

        let payload = match self.executor.execute(job).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                self.session.log(
                    LogLevel::Warning,
                    format!("No image returned for [{}].", task.angle),
                );
                return Ok(None);
            }
            Err(e) => {
                let e = self.handle_failure(ctx, e);
                return Err(e);
            }
        };

        let image = GeneratedImage::new(
            payload.image_data,
            task.angle,
            task.prompt.clone(),
            task.resolution,
        );
        if let Err(e) = self.store.persist(&image).await {
            self.session.log(
                LogLevel::Warning,
                format!("Could not save image {}: {}", image.id, e),
            );
        }
        self.session.add_image(image.clone());
        ctx.created.fetch_add(1, Ordering::SeqCst);
        self.session.log(
            LogLevel::Success,
            format!("Generated [{}] with {}.", task.angle, payload.backend_used),
        );
        Ok(Some(image))
    }

    /// Log a task failure and update credential state for key rejections.
    fn handle_failure(&self, ctx: &RunContext, err: StudioError) -> StudioError {
        self.session
            .log(LogLevel::Error, format!("Generation failed: {}", err));

        if !err.is_credential_error() {
            return err;
        }
        if ctx.manual_key {
            self.session.set_error(MANUAL_KEY_MESSAGE);
            return match err {
                StudioError::PermissionDenied(detail) | StudioError::ManualKeyInvalid(detail) => {
                    StudioError::ManualKeyInvalid(detail)
                }
                other => StudioError::ManualKeyInvalid(other.to_string()),
            };
        }
        *lock(&self.credential_state) = CredentialState::Invalid;
        self.session.set_error(PERMISSION_DENIED_MESSAGE);
        err
    }

    // ── Selection ───────────────────────────────────────────────────

    pub fn toggle_selection(&self, image_id: &str) -> Result<bool> {
        self.session.toggle_selection(image_id)
    }

    pub fn toggle_select_all(&self) -> Result<usize> {
        self.session.toggle_select_all()
    }

    // ── History ─────────────────────────────────────────────────────

    /// Replace the in-memory history with the store's contents.
    pub async fn load_history(&self) -> Result<usize> {
        let images = self.store.list_all().await?;
        let count = images.len();
        self.session.replace_images(images);
        self.session
            .log(LogLevel::Info, format!("Loaded {} images from storage.", count));
        Ok(count)
    }

    pub async fn delete_image(&self, image_id: &str) -> Result<()> {
        if self.session.find_image(image_id).is_none() {
            return Err(StudioError::ImageNotFound(image_id.to_string()));
        }
        self.store.delete_one(image_id).await?;
        self.session.remove_image(image_id);
        Ok(())
    }

    /// Delete every image from the store and the session.
    pub async fn clear_history(&self) -> Result<()> {
        if !self.session.is_idle() {
            return Err(StudioError::Busy);
        }
        self.store.clear_all().await?;
        self.session.clear_images();
        self.session.log(LogLevel::Warning, "History cleared.");
        Ok(())
    }

    /// Upload the whole history to `uploader`, newest first. Without a
    /// `folder_name` the folder is named after the current time.
    pub async fn export_history<U, P>(
        &self,
        uploader: &U,
        folder_name: Option<&str>,
        progress: P,
    ) -> Result<ArchiveReport>
    where
        U: ArchiveUploader,
        P: FnMut(usize, usize),
    {
        let images = self.session.images();
        let folder_name = folder_name.map_or_else(default_folder_name, str::to_string);
        match archive_images(uploader, &images, &folder_name, progress).await {
            Ok(report) => {
                self.session.log(
                    LogLevel::Success,
                    format!("Exported {} images.", report.uploaded),
                );
                Ok(report)
            }
            Err(e) => {
                self.session.set_error(format!("Export Error: {}", e));
                self.session.log(LogLevel::Error, format!("Export failed: {}", e));
                Err(e)
            }
        }
    }

    /// Write the whole history, newest first, to a ZIP file in `dir`.
    ///
    /// Returns the path of the written archive, or `None` when there is
    /// nothing to export.
    pub async fn export_zip(&self, dir: &Path) -> Result<Option<PathBuf>> {
        let images = self.session.images();
        if images.is_empty() {
            return Ok(None);
        }
        self.session
            .log(LogLevel::Info, format!("Zipping {} images...", images.len()));

        let path = dir.join(zip_archive_name());
        let written = match zip_images(&images) {
            Ok(bytes) => tokio::fs::write(&path, bytes).await.map_err(StudioError::from),
            Err(e) => Err(e),
        };

        match written {
            Ok(()) => {
                self.session
                    .log(LogLevel::Success, format!("Saved {}", path.display()));
                Ok(Some(path))
            }
            Err(e) => {
                self.session.log(LogLevel::Error, format!("ZIP failed: {}", e));
                Err(e)
            }
        }
    }

    // ── Palettes ────────────────────────────────────────────────────

    /// Built-in and custom palettes.
    pub fn palettes(&self) -> Vec<ColorPalette> {
        lock(&self.palettes).all()
    }

    pub fn custom_palettes(&self) -> Vec<ColorPalette> {
        lock(&self.palettes).custom().to_vec()
    }

    /// Derive a palette from an encoded image and add it.
    pub fn add_palette_from_image(&self, bytes: &[u8]) -> Result<ColorPalette> {
        let palette = lock(&self.palettes).add_from_image(bytes)?;
        self.session.log(
            LogLevel::Success,
            format!("Extracted palette with {} colors.", palette.colors.len()),
        );
        Ok(palette)
    }

    /// Remove a custom palette, clearing `gen.selected_palette_id` if it
    /// pointed at it.
    pub fn delete_palette(&self, id: &str, gen: &mut GenerationConfig) -> Result<ColorPalette> {
        lock(&self.palettes).delete(id, gen)
    }
}
