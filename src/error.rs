use thiserror::Error;

/// Errors produced by the generation engine and its collaborators.
#[derive(Error, Debug)]
pub enum StudioError {
    /// No API key is available; raised before any network attempt.
    #[error("No API Key provided.")]
    NoCredential,

    /// The backend rejected the credential (not found / forbidden / no key).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A manually configured key was rejected by the backend.
    #[error("API Key Error. Check your manual key in settings. ({0})")]
    ManualKeyInvalid(String),

    /// Network or backend failure not related to credentials.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The backend returned a non-success HTTP status.
    #[error("Backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Network-level request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },

    /// The response was missing expected fields.
    #[error("{0}")]
    InvalidResponse(String),

    #[error("Select at least one angle.")]
    NoAngleSelected,

    #[error("No prompt to generate from")]
    NoPrompt,

    #[error("No images selected")]
    NothingSelected,

    /// A run is already in progress.
    #[error("A generation run is already in progress")]
    Busy,

    /// The run was stopped before any task started.
    #[error("Generation stopped")]
    Cancelled,

    #[error("Image not found: {0}")]
    ImageNotFound(String),

    #[error("Palette not found: {0}")]
    PaletteNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl StudioError {
    /// True for the credential failures that should invalidate cached key state.
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            StudioError::NoCredential
                | StudioError::PermissionDenied(_)
                | StudioError::ManualKeyInvalid(_)
        )
    }
}

impl From<anyhow::Error> for StudioError {
    fn from(err: anyhow::Error) -> Self {
        StudioError::Other(format!("{:#}", err))
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, StudioError>;
