pub mod dto;
pub mod gemini;
pub mod prompt;
pub mod schema;

use async_trait::async_trait;

use crate::capture::payload::ImagePayload;
use crate::profile::dto::UserProfile;
use dto::AnalysisResult;

/// Shown to the user for every analysis failure, whatever the cause.
pub const ANALYSIS_FAILED_NOTICE: &str =
    "عذراً، حدث خطأ أثناء الاتصال بالذكاء الاصطناعي. يرجى المحاولة مرة أخرى.";

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("model returned no content")]
    EmptyResponse,
    #[error("model response does not match the schema: {0}")]
    MalformedResponse(String),
    #[error("analysis call failed: {0}")]
    AnalysisFailed(String),
}

impl AnalysisError {
    /// Network, auth, quota and parse problems all read the same to the user.
    pub fn user_message(&self) -> &'static str {
        ANALYSIS_FAILED_NOTICE
    }
}

/// One image plus one profile in, one estimate out. Exactly one remote call, no retries.
#[async_trait]
pub trait FoodAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        image: &ImagePayload,
        profile: &UserProfile,
    ) -> Result<AnalysisResult, AnalysisError>;
}
