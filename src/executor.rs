use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{Result, StudioError};
use crate::types::{AspectRatio, ImageModel, Resolution};
use crate::ImageBackend;

/// Error text fragments that mean the credential was rejected.
const CREDENTIAL_MARKERS: &[&str] = &[
    "Requested entity was not found",
    "403",
    "PERMISSION_DENIED",
    "No API Key provided",
];

/// Everything a backend needs for one image request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRequest {
    pub model: ImageModel,
    pub text: String,
    pub aspect_ratio: AspectRatio,
    pub seed: u64,
    /// `"2K"` / `"4K"` for high-resolution tiers, absent for 1k.
    pub image_size: Option<&'static str>,
    /// Reference image as a data URL.
    pub reference: Option<String>,
    pub api_key: String,
}

/// Inputs for [`ImageRequestExecutor::execute`].
#[derive(Debug, Clone)]
pub struct ImageJob {
    pub model: ImageModel,
    pub text: String,
    pub aspect_ratio: AspectRatio,
    pub seed: u64,
    pub resolution: Resolution,
    pub api_key: Option<String>,
    pub reference: Option<String>,
}

/// A successful image response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// `data:<mime>;base64,<payload>`
    pub image_data: String,
    /// The model that actually served the request.
    pub backend_used: ImageModel,
}

/// Pick the model for a resolution tier. 2k and 4k always use Pro.
pub fn model_for(requested: ImageModel, resolution: Resolution) -> ImageModel {
    match resolution {
        Resolution::OneK => requested,
        Resolution::TwoK | Resolution::FourK => ImageModel::Pro,
    }
}

/// Reclassify a backend failure. Credential rejections become
/// [`StudioError::PermissionDenied`]; everything else passes through.
pub fn classify_failure(err: StudioError) -> StudioError {
    match err {
        StudioError::NoCredential
        | StudioError::PermissionDenied(_)
        | StudioError::ManualKeyInvalid(_) => err,
        StudioError::Http { status, body } if status == 403 || status == 404 => {
            StudioError::PermissionDenied(body)
        }
        other => {
            let text = other.to_string();
            if CREDENTIAL_MARKERS.iter().any(|m| text.contains(m)) {
                StudioError::PermissionDenied(text)
            } else {
                other
            }
        }
    }
}

/// Wraps one backend call with model selection, credential checks and
/// failure classification.
#[derive(Debug, Clone)]
pub struct ImageRequestExecutor<B> {
    backend: B,
}

impl<B: ImageBackend> ImageRequestExecutor<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run one request.
    ///
    /// Returns `Ok(None)` when the backend answered without an image.
    /// A missing or blank key fails with [`StudioError::NoCredential`]
    /// before the backend is contacted.
    pub async fn execute(&self, job: ImageJob) -> Result<Option<ImagePayload>> {
        let api_key = job
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(StudioError::NoCredential)?;

        let model = model_for(job.model, job.resolution);
        if model != job.model {
            tracing::debug!(requested = %job.model, used = %model, resolution = %job.resolution, "forcing high-resolution model");
        }

        let request = BackendRequest {
            model,
            text: job.text,
            aspect_ratio: job.aspect_ratio,
            seed: job.seed,
            image_size: job.resolution.image_size(),
            reference: job.reference,
            api_key,
        };

        let image = self
            .backend
            .generate(&request)
            .await
            .map_err(classify_failure)?;

        Ok(image.map(|image_data| ImagePayload {
            image_data,
            backend_used: model,
        }))
    }
}

/// Split a data URL into `(mime, base64 payload)`.
///
/// A bare base64 string is treated as PNG.
pub fn split_data_url(url: &str) -> (String, String) {
    if let Some(rest) = url.strip_prefix("data:") {
        if let Some((header, data)) = rest.split_once(',') {
            let mime = header.split(';').next().unwrap_or("image/png");
            let mime = if mime.is_empty() { "image/png" } else { mime };
            return (mime.to_string(), data.to_string());
        }
    }
    ("image/png".to_string(), url.to_string())
}

pub fn to_data_url(mime: &str, data: &str) -> String {
    format!("data:{};base64,{}", mime, data)
}

/// Decode a data URL (or bare base64) to raw bytes.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let (_, data) = split_data_url(url);
    STANDARD
        .decode(data.trim())
        .map_err(|e| StudioError::InvalidResponse(format!("Invalid base64 image data: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_override_for_high_res() {
        assert_eq!(model_for(ImageModel::Flash, Resolution::OneK), ImageModel::Flash);
        assert_eq!(model_for(ImageModel::Flash, Resolution::TwoK), ImageModel::Pro);
        assert_eq!(model_for(ImageModel::Flash, Resolution::FourK), ImageModel::Pro);
        assert_eq!(model_for(ImageModel::Pro, Resolution::OneK), ImageModel::Pro);
    }

    #[test]
    fn test_classify_http_status() {
        let err = classify_failure(StudioError::Http {
            status: 403,
            body: "forbidden".into(),
        });
        assert!(matches!(err, StudioError::PermissionDenied(ref b) if b == "forbidden"));

        let err = classify_failure(StudioError::Http {
            status: 404,
            body: "gone".into(),
        });
        assert!(matches!(err, StudioError::PermissionDenied(_)));

        let err = classify_failure(StudioError::Http {
            status: 500,
            body: "oops".into(),
        });
        assert!(matches!(err, StudioError::Http { status: 500, .. }));
    }

    #[test]
    fn test_classify_markers() {
        for text in [
            "Requested entity was not found.",
            "got 403 from upstream",
            "status: PERMISSION_DENIED",
            "No API Key provided",
        ] {
            let err = classify_failure(StudioError::RequestFailed(text.into()));
            assert!(matches!(err, StudioError::PermissionDenied(_)), "{text}");
        }

        let err = classify_failure(StudioError::RequestFailed("timeout".into()));
        assert!(matches!(err, StudioError::RequestFailed(_)));
    }

    #[test]
    fn test_split_data_url() {
        assert_eq!(
            split_data_url("data:image/jpeg;base64,QUJD"),
            ("image/jpeg".to_string(), "QUJD".to_string())
        );
        assert_eq!(
            split_data_url("QUJD"),
            ("image/png".to_string(), "QUJD".to_string())
        );
    }

    #[test]
    fn test_decode_data_url() {
        assert_eq!(decode_data_url("data:image/png;base64,QUJD").unwrap(), b"ABC");
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
    }
}
