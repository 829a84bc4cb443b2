use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use super::dto::AnalysisResult;
use super::{prompt, schema, AnalysisError, FoodAnalyzer};
use crate::capture::payload::ImagePayload;
use crate::config::GeminiConfig;
use crate::profile::dto::UserProfile;

const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

lazy_static! {
    static ref DATA_HEADER_RE: Regex = Regex::new(r"^data:(image/[\w.+-]+);base64,").unwrap();
}

#[derive(Debug, Clone)]
pub struct GeminiAnalyzer {
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    client: Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
    temperature: f32,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiAnalyzer {
    pub fn new(config: &GeminiConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            client: Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_request(&self, image: &ImagePayload, profile: &UserProfile) -> GenerateRequest {
        let (mime_type, data) = normalize_image(image);
        GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData { mime_type, data },
                    },
                    Part::Text {
                        text: prompt::build_prompt(profile),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema::response_schema(),
                temperature: self.temperature,
            },
        }
    }

    async fn call(&self, request: &GenerateRequest) -> Result<String, AnalysisError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "gemini request failed");
                AnalysisError::AnalysisFailed(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "gemini returned an error status");
            return Err(AnalysisError::AnalysisFailed(format!("status {status}")));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            error!(error = %e, "gemini response envelope unreadable");
            AnalysisError::AnalysisFailed(e.to_string())
        })?;
        response_text(body)
    }
}

#[async_trait]
impl FoodAnalyzer for GeminiAnalyzer {
    #[instrument(skip_all, fields(capture_id = %image.id, model = %self.model))]
    async fn analyze(
        &self,
        image: &ImagePayload,
        profile: &UserProfile,
    ) -> Result<AnalysisResult, AnalysisError> {
        let request = self.build_request(image, profile);
        let text = self.call(&request).await?;
        let result = parse_result(&text)?;
        debug!(food = %result.food_name, calories = result.calories, "analysis parsed");
        Ok(result)
    }
}

/// Picks the MIME type and the bare base64 body to send.
/// A leftover data-URL header wins, then a declared image type, then JPEG.
pub fn normalize_image(image: &ImagePayload) -> (String, String) {
    if let Some(caps) = DATA_HEADER_RE.captures(&image.data) {
        let header_len = caps.get(0).map(|m| m.end()).unwrap_or(0);
        let mime = caps
            .get(1)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| DEFAULT_IMAGE_MIME.into());
        return (mime, image.data[header_len..].to_string());
    }
    let mime = if image.mime_type.starts_with("image/") {
        image.mime_type.clone()
    } else {
        DEFAULT_IMAGE_MIME.into()
    };
    (mime, image.data.clone())
}

fn response_text(body: GenerateResponse) -> Result<String, AnalysisError> {
    let text: String = body
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }
    Ok(text)
}

/// Validates model output against the declared schema before it becomes a result.
pub fn parse_result(text: &str) -> Result<AnalysisResult, AnalysisError> {
    let value: serde_json::Value = serde_json::from_str(text.trim())
        .map_err(|e| AnalysisError::MalformedResponse(format!("not JSON: {e}")))?;
    schema::validate(&value, &schema::response_schema())
        .map_err(AnalysisError::MalformedResponse)?;
    serde_json::from_value(value).map_err(|e| AnalysisError::MalformedResponse(e.to_string()))
}
