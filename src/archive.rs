use std::future::Future;
use std::io::{Cursor, Write};
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Result, StudioError};
use crate::executor::{decode_data_url, split_data_url};
use crate::types::{Angle, GeneratedImage, Resolution};

const DRIVE_API: &str = "https://www.googleapis.com";
const MULTIPART_BOUNDARY: &str = "-------314159265358979323846";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
/// Slug used when the prompt is blank.
const FALLBACK_SLUG: &str = "sony-macro";
const SLUG_WORDS: usize = 6;
/// Folder every entry of a ZIP download is placed in.
pub const ZIP_FOLDER: &str = "sony-macro-collection";

/// Remote object storage that can hold a folder of images.
pub trait ArchiveUploader: Send + Sync {
    /// Obtain a bearer token for the following calls.
    fn acquire_access_token(&self) -> impl Future<Output = Result<String>> + Send;

    /// Create a folder and return its id.
    fn create_folder(&self, name: &str, token: &str) -> impl Future<Output = Result<String>> + Send;

    /// Upload one image (data URL) into `folder_id`.
    fn upload_image(
        &self,
        image_data: &str,
        filename: &str,
        folder_id: &str,
        token: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Filesystem-safe name for an exported image:
/// `<first six prompt words>-<angle>-<resolution>-<id>.png`.
///
/// ```
/// use shotforge::{safe_filename, Angle, Resolution};
///
/// let name = safe_filename("A shiny, red (vintage) camera on a table top", Resolution::TwoK, Angle::TopDown, "abc");
/// assert_eq!(name, "a-shiny-red-vintage-camera-on-top-down-2k-abc.png");
/// ```
pub fn safe_filename(prompt: &str, resolution: Resolution, angle: Angle, id: &str) -> String {
    let short = prompt
        .split_whitespace()
        .take(SLUG_WORDS)
        .collect::<Vec<_>>()
        .join(" ");

    let cleaned: String = short
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();
    let slug = cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();
    let slug = if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    };

    let angle = angle
        .label()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();

    format!("{}-{}-{}-{}.png", slug, angle, resolution, id)
}

/// Default export folder name, stamped with the current UTC time.
pub fn default_folder_name() -> String {
    format!("Shotforge - {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"))
}

/// Result of a finished export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReport {
    pub folder_id: String,
    pub uploaded: usize,
}

/// Upload every image, one at a time, into a fresh folder.
///
/// `progress` receives `(completed, total)` after each upload. The first
/// failure stops the export and is returned.
pub async fn archive_images<U, P>(
    uploader: &U,
    images: &[GeneratedImage],
    folder_name: &str,
    mut progress: P,
) -> Result<ArchiveReport>
where
    U: ArchiveUploader,
    P: FnMut(usize, usize),
{
    let token = uploader.acquire_access_token().await?;
    let folder_id = uploader.create_folder(folder_name, &token).await?;
    tracing::info!(folder = %folder_name, count = images.len(), "exporting images");

    let total = images.len();
    for (i, image) in images.iter().enumerate() {
        let filename = safe_filename(&image.prompt, image.resolution, image.angle, &image.id);
        uploader
            .upload_image(&image.image_data, &filename, &folder_id, &token)
            .await?;
        progress(i + 1, total);
    }

    Ok(ArchiveReport {
        folder_id,
        uploaded: total,
    })
}

/// File name for a ZIP download, stamped with the current time in milliseconds.
pub fn zip_archive_name() -> String {
    format!("sony-macro-archive-{}.zip", chrono::Utc::now().timestamp_millis())
}

/// Pack every image into an in-memory ZIP under [`ZIP_FOLDER`].
///
/// Entries are named with [`safe_filename`], using the image's position in
/// `images` as the suffix.
pub fn zip_images(images: &[GeneratedImage]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.add_directory(format!("{}/", ZIP_FOLDER), options)?;
    for (index, image) in images.iter().enumerate() {
        let bytes = decode_data_url(&image.image_data)?;
        let name = safe_filename(&image.prompt, image.resolution, image.angle, &index.to_string());
        writer.start_file(format!("{}/{}", ZIP_FOLDER, name), options)?;
        writer.write_all(&bytes)?;
    }

    let archive = writer.finish()?.into_inner();
    tracing::debug!(entries = images.len(), bytes = archive.len(), "zip built");
    Ok(archive)
}

/// Google Drive v3 uploader. Holds a token obtained by the host.
#[derive(Debug, Clone)]
pub struct DriveClient {
    http: Client,
    endpoint: String,
    access_token: String,
}

impl DriveClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: DRIVE_API.to_string(),
            access_token: access_token.into(),
        }
    }

    /// Point at a different API host (useful for tests and proxies).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `multipart/related` body: JSON metadata part, then the base64 image part.
    pub fn multipart_body(image_data: &str, filename: &str, folder_id: &str) -> String {
        let (mime, data) = split_data_url(image_data);
        let metadata = json!({
            "name": filename,
            "mimeType": mime,
            "parents": [folder_id],
        });
        let delimiter = format!("\r\n--{}\r\n", MULTIPART_BOUNDARY);
        let close = format!("\r\n--{}--", MULTIPART_BOUNDARY);

        format!(
            "{delimiter}Content-Type: application/json\r\n\r\n{metadata}{delimiter}Content-Type: {mime}\r\nContent-Transfer-Encoding: base64\r\n\r\n{data}{close}"
        )
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(StudioError::Http { status, body })
    }
}

impl ArchiveUploader for DriveClient {
    async fn acquire_access_token(&self) -> Result<String> {
        if self.access_token.trim().is_empty() {
            return Err(StudioError::NoCredential);
        }
        Ok(self.access_token.clone())
    }

    async fn create_folder(&self, name: &str, token: &str) -> Result<String> {
        let url = format!("{}/drive/v3/files", self.endpoint);
        let resp = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(30))
            .bearer_auth(token)
            .json(&json!({ "name": name, "mimeType": FOLDER_MIME }))
            .send()
            .await
            .map_err(|e| StudioError::Network {
                context: "Failed to create Drive folder".into(),
                source: e,
            })?;

        let json: Value = Self::check(resp)
            .await?
            .json()
            .await
            .map_err(|e| StudioError::Network {
                context: "Failed to parse Drive folder response".into(),
                source: e,
            })?;

        json.get("id")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| StudioError::InvalidResponse("Drive folder response missing id".into()))
    }

    async fn upload_image(
        &self,
        image_data: &str,
        filename: &str,
        folder_id: &str,
        token: &str,
    ) -> Result<()> {
        let url = format!("{}/upload/drive/v3/files?uploadType=multipart", self.endpoint);
        let body = Self::multipart_body(image_data, filename, folder_id);

        let resp = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(120))
            .bearer_auth(token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary=\"{}\"", MULTIPART_BOUNDARY),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| StudioError::Network {
                context: format!("Failed to upload {}", filename),
                source: e,
            })?;

        Self::check(resp).await?;
        tracing::debug!(%filename, "uploaded");
        Ok(())
    }
}
