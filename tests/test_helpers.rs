#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shotforge::*;

type Responder = dyn Fn(usize, &BackendRequest) -> Result<Option<String>> + Send + Sync;

/// Backend double that records every request and tracks concurrency.
pub struct MockBackend {
    requests: Mutex<Vec<BackendRequest>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
    responder: Box<Responder>,
}

impl MockBackend {
    /// Answers every call with a distinct image after `delay`.
    pub fn new(delay: Duration) -> Self {
        Self::with_responder(delay, |n, _| Ok(Some(image_for(n))))
    }

    /// `responder` receives the zero-based call index and the request.
    pub fn with_responder(
        delay: Duration,
        responder: impl Fn(usize, &BackendRequest) -> Result<Option<String>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay,
            responder: Box::new(responder),
        }
    }

    pub fn requests(&self) -> Vec<BackendRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ImageBackend for MockBackend {
    async fn generate(&self, request: &BackendRequest) -> Result<Option<String>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        (self.responder)(n, request)
    }
}

/// The image the default responder returns for call `n`.
pub fn image_for(n: usize) -> String {
    format!("data:image/png;base64,aW1n{}", n)
}

/// Credential provider that can start empty and grant a token on request.
pub struct MockCredentials {
    token: Mutex<Option<String>>,
    grant: Option<String>,
    requests: AtomicUsize,
}

impl MockCredentials {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
            grant: None,
            requests: AtomicUsize::new(0),
        }
    }

    /// No token until `request_credential` is called, then `granted`.
    pub fn granting(granted: &str) -> Self {
        Self {
            token: Mutex::new(None),
            grant: Some(granted.to_string()),
            requests: AtomicUsize::new(0),
        }
    }

    /// Never produces a token.
    pub fn never() -> Self {
        Self {
            token: Mutex::new(None),
            grant: None,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl CredentialProvider for MockCredentials {
    async fn has_credential(&self) -> bool {
        self.token().is_some()
    }

    async fn request_credential(&self) -> Result<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(granted) = &self.grant {
            *self.token.lock().unwrap() = Some(granted.clone());
        }
        Ok(())
    }

    fn token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }
}

/// Store whose writes always fail.
#[derive(Default)]
pub struct FailingStore;

impl ImageStore for FailingStore {
    async fn persist(&self, _image: &GeneratedImage) -> Result<()> {
        Err(StudioError::Storage("disk full".into()))
    }

    async fn list_all(&self) -> Result<Vec<GeneratedImage>> {
        Ok(Vec::new())
    }

    async fn delete_one(&self, _id: &str) -> Result<()> {
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        Ok(())
    }
}

/// Uploader that records calls and can fail on the n-th upload.
#[derive(Default)]
pub struct MockUploader {
    pub folders: Mutex<Vec<String>>,
    pub uploads: Mutex<Vec<(String, String)>>,
    pub fail_on: Option<usize>,
}

impl ArchiveUploader for MockUploader {
    async fn acquire_access_token(&self) -> Result<String> {
        Ok("drive-token".into())
    }

    async fn create_folder(&self, name: &str, token: &str) -> Result<String> {
        assert_eq!(token, "drive-token");
        self.folders.lock().unwrap().push(name.to_string());
        Ok("folder-1".into())
    }

    async fn upload_image(
        &self,
        _image_data: &str,
        filename: &str,
        folder_id: &str,
        _token: &str,
    ) -> Result<()> {
        let mut uploads = self.uploads.lock().unwrap();
        if self.fail_on == Some(uploads.len()) {
            return Err(StudioError::Http {
                status: 500,
                body: "upload rejected".into(),
            });
        }
        uploads.push((filename.to_string(), folder_id.to_string()));
        Ok(())
    }
}

pub type TestEngine = GenerationOrchestrator<MockBackend, MemoryStore, MockCredentials>;

/// Engine with a memory store, a valid token and the default limit of 5.
pub fn engine(backend: MockBackend) -> Arc<TestEngine> {
    engine_with(EngineConfig::default(), backend, MockCredentials::with_token("test-key"))
}

pub fn engine_with(
    config: EngineConfig,
    backend: MockBackend,
    credentials: MockCredentials,
) -> Arc<TestEngine> {
    Arc::new(GenerationOrchestrator::new(
        config,
        backend,
        MemoryStore::new(),
        credentials,
    ))
}

pub fn history_image(
    id: &str,
    prompt: &str,
    angle: Angle,
    resolution: Resolution,
    timestamp: i64,
) -> GeneratedImage {
    GeneratedImage {
        id: id.to_string(),
        image_data: format!("data:image/png;base64,b3JpZw{}", id),
        angle,
        prompt: prompt.to_string(),
        timestamp,
        resolution,
    }
}

/// Put images into the engine's store and load them into the session.
pub async fn seed_history(engine: &TestEngine, images: &[GeneratedImage]) {
    for image in images {
        engine.store().persist(image).await.unwrap();
    }
    engine.load_history().await.unwrap();
}
