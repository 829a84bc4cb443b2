use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::info;

use crate::analysis::{gemini::GeminiAnalyzer, FoodAnalyzer};
use crate::capture::camera::{CameraSource, CommandCamera, NoCamera};
use crate::config::AppConfig;
use crate::flow::machine::{EventKind, FlowError, Session};
use crate::profile::repo::{FileProfileStore, ProfileStore};

/// Held from the start of a capture until the session has moved to Loading.
/// Only one capture can hold it, so at most one camera stream is ever open.
pub type CaptureClaim = OwnedMutexGuard<()>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub profiles: Arc<dyn ProfileStore>,
    pub analyzer: Arc<dyn FoodAnalyzer>,
    pub camera: Arc<dyn CameraSource>,
    session: Arc<Mutex<Session>>,
    capture_slot: Arc<AsyncMutex<()>>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let profiles = Arc::new(FileProfileStore::new(&config.data_dir)) as Arc<dyn ProfileStore>;
        let analyzer = Arc::new(GeminiAnalyzer::new(&config.gemini)) as Arc<dyn FoodAnalyzer>;
        let camera = match config
            .camera
            .command
            .as_deref()
            .and_then(CommandCamera::from_command_line)
        {
            Some(cam) => Arc::new(cam) as Arc<dyn CameraSource>,
            None => {
                info!("CAMERA_COMMAND not set; only file uploads are available");
                Arc::new(NoCamera) as Arc<dyn CameraSource>
            }
        };

        Self::from_parts(config, profiles, analyzer, camera).await
    }

    /// Reads the stored profile once and picks the starting screen from it.
    pub async fn from_parts(
        config: Arc<AppConfig>,
        profiles: Arc<dyn ProfileStore>,
        analyzer: Arc<dyn FoodAnalyzer>,
        camera: Arc<dyn CameraSource>,
    ) -> anyhow::Result<Self> {
        let stored = profiles.load().await?;
        let session = Session::start(stored);
        info!(screen = ?session.screen(), "session started");
        Ok(Self {
            config,
            profiles,
            analyzer,
            camera,
            session: Arc::new(Mutex::new(session)),
            capture_slot: Arc::new(AsyncMutex::new(())),
        })
    }

    /// Never hold the guard across an `.await`.
    pub fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserves the capture slot before any device or body is touched.
    /// A capture already in flight, or a session in Loading, is `Busy`.
    pub fn claim_capture(&self) -> Result<CaptureClaim, FlowError> {
        let claim = self
            .capture_slot
            .clone()
            .try_lock_owned()
            .map_err(|_| FlowError::Busy)?;
        self.session().check(EventKind::CaptureStarted)?;
        Ok(claim)
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::analysis::dto::{AnalysisResult, Macros};
    use crate::analysis::AnalysisError;
    use crate::capture::payload::ImagePayload;
    use crate::config::{CameraConfig, GeminiConfig};
    use crate::profile::dto::UserProfile;

    pub fn test_config() -> Arc<AppConfig> {
        Arc::new(AppConfig {
            data_dir: PathBuf::from("unused"),
            gemini: GeminiConfig {
                api_key: "test".into(),
                model: "test-model".into(),
                base_url: "http://127.0.0.1:9".into(),
                temperature: 0.3,
            },
            camera: CameraConfig {
                command: None,
                jpeg_quality: 80,
            },
        })
    }

    pub fn salad() -> AnalysisResult {
        AnalysisResult {
            food_name: "سلطة خضار".into(),
            calories: 180.0,
            macros: Macros {
                protein: "5g".into(),
                carbs: "20g".into(),
                fats: "8g".into(),
            },
            advice: "...".into(),
        }
    }

    /// Analyzer with a canned answer. Optionally waits for `gate` before answering.
    #[derive(Default)]
    pub struct FakeAnalyzer {
        pub fail: bool,
        pub calls: AtomicUsize,
        pub seen_mime: Mutex<Vec<String>>,
        pub gate: Option<Arc<Notify>>,
    }

    impl FakeAnalyzer {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn gated(gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::default()
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FoodAnalyzer for FakeAnalyzer {
        async fn analyze(
            &self,
            image: &ImagePayload,
            _profile: &UserProfile,
        ) -> Result<AnalysisResult, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_mime.lock().unwrap().push(image.mime_type.clone());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                Err(AnalysisError::AnalysisFailed("connection refused".into()))
            } else {
                Ok(salad())
            }
        }
    }
}
