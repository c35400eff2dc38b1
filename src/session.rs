use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};
use crate::limiter::CancellationFlag;
use crate::types::GeneratedImage;

/// Log entries kept per session; older entries are dropped first.
pub const LOG_CAPACITY: usize = 500;

/// Severity of a session log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Error,
    Warning,
}

/// One user-facing log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub level: LogLevel,
}

/// Lifecycle of a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Cancelling,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mutable state shared by the orchestrator and its host.
///
/// Every accessor takes a short lock and never holds it across an await.
#[derive(Debug, Default)]
pub struct SessionState {
    cancel: CancellationFlag,
    run_state: Mutex<RunState>,
    selection: Mutex<HashSet<String>>,
    images: Mutex<Vec<GeneratedImage>>,
    log: Mutex<VecDeque<LogEntry>>,
    error: Mutex<Option<String>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cancellation flag shared with the limiter.
    pub fn cancel_flag(&self) -> &CancellationFlag {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    // ── Run state ───────────────────────────────────────────────────

    pub fn run_state(&self) -> RunState {
        *lock(&self.run_state)
    }

    pub fn is_idle(&self) -> bool {
        self.run_state() == RunState::Idle
    }

    /// Move `Idle -> Running` and clear the cancellation flag.
    pub fn begin_run(&self) -> Result<()> {
        let mut state = lock(&self.run_state);
        if *state != RunState::Idle {
            return Err(StudioError::Busy);
        }
        *state = RunState::Running;
        self.cancel.reset();
        Ok(())
    }

    /// Move `Running -> Cancelling` and raise the flag. Returns false when no run is active.
    pub fn request_stop(&self) -> bool {
        let mut state = lock(&self.run_state);
        if *state != RunState::Running {
            return false;
        }
        *state = RunState::Cancelling;
        self.cancel.cancel();
        true
    }

    /// Return to `Idle` and clear the cancellation flag.
    pub fn finish_run(&self) {
        *lock(&self.run_state) = RunState::Idle;
        self.cancel.reset();
    }

    // ── Log ─────────────────────────────────────────────────────────

    /// Record a log entry (newest first) and mirror it to `tracing`.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info | LogLevel::Success => tracing::info!(target: "shotforge::session", "{}", message),
            LogLevel::Warning => tracing::warn!(target: "shotforge::session", "{}", message),
            LogLevel::Error => tracing::error!(target: "shotforge::session", "{}", message),
        }
        let mut log = lock(&self.log);
        log.push_front(LogEntry {
            timestamp: Utc::now(),
            message,
            level,
        });
        log.truncate(LOG_CAPACITY);
    }

    /// Snapshot of the log, newest first.
    pub fn logs(&self) -> Vec<LogEntry> {
        lock(&self.log).iter().cloned().collect()
    }

    pub fn clear_logs(&self) {
        lock(&self.log).clear();
    }

    // ── Inline error ────────────────────────────────────────────────

    pub fn set_error(&self, message: impl Into<String>) {
        *lock(&self.error) = Some(message.into());
    }

    pub fn clear_error(&self) {
        *lock(&self.error) = None;
    }

    /// The blocking error currently shown to the user, if any.
    pub fn error(&self) -> Option<String> {
        lock(&self.error).clone()
    }

    // ── Images ──────────────────────────────────────────────────────

    /// All images, newest first.
    pub fn images(&self) -> Vec<GeneratedImage> {
        lock(&self.images).clone()
    }

    pub fn image_count(&self) -> usize {
        lock(&self.images).len()
    }

    pub fn find_image(&self, id: &str) -> Option<GeneratedImage> {
        lock(&self.images).iter().find(|i| i.id == id).cloned()
    }

    pub fn add_image(&self, image: GeneratedImage) {
        let mut images = lock(&self.images);
        let pos = images
            .iter()
            .position(|i| i.timestamp <= image.timestamp)
            .unwrap_or(images.len());
        images.insert(pos, image);
    }

    /// Replace the whole collection, e.g. after loading from storage.
    pub fn replace_images(&self, mut images: Vec<GeneratedImage>) {
        images.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let known: HashSet<String> = images.iter().map(|i| i.id.clone()).collect();
        *lock(&self.images) = images;
        lock(&self.selection).retain(|id| known.contains(id));
    }

    /// Remove one image and drop it from the selection. Returns false if absent.
    pub fn remove_image(&self, id: &str) -> bool {
        let removed = {
            let mut images = lock(&self.images);
            let before = images.len();
            images.retain(|i| i.id != id);
            images.len() != before
        };
        lock(&self.selection).remove(id);
        removed
    }

    pub fn clear_images(&self) {
        lock(&self.images).clear();
        lock(&self.selection).clear();
    }

    // ── Selection ───────────────────────────────────────────────────

    /// Flip selection of one image. Rejected while a run is active.
    /// Returns whether the image is now selected.
    pub fn toggle_selection(&self, id: &str) -> Result<bool> {
        if !self.is_idle() {
            return Err(StudioError::Busy);
        }
        if self.find_image(id).is_none() {
            return Err(StudioError::ImageNotFound(id.to_string()));
        }
        let mut selection = lock(&self.selection);
        if selection.remove(id) {
            Ok(false)
        } else {
            selection.insert(id.to_string());
            Ok(true)
        }
    }

    /// Select every image, or clear the selection when all are already selected.
    /// Returns the number of selected images afterwards.
    pub fn toggle_select_all(&self) -> Result<usize> {
        if !self.is_idle() {
            return Err(StudioError::Busy);
        }
        let ids: HashSet<String> = lock(&self.images).iter().map(|i| i.id.clone()).collect();
        let mut selection = lock(&self.selection);
        if !ids.is_empty() && *selection == ids {
            selection.clear();
        } else {
            *selection = ids;
        }
        Ok(selection.len())
    }

    pub fn is_selected(&self, id: &str) -> bool {
        lock(&self.selection).contains(id)
    }

    pub fn selection_len(&self) -> usize {
        lock(&self.selection).len()
    }

    /// Selected images in display order (newest first).
    pub fn selected_images(&self) -> Vec<GeneratedImage> {
        let selection = lock(&self.selection).clone();
        lock(&self.images)
            .iter()
            .filter(|i| selection.contains(&i.id))
            .cloned()
            .collect()
    }

    pub fn clear_selection(&self) {
        lock(&self.selection).clear();
    }
}
