//! Gemini `generateContent` client behind the categorizer's `ModelClient`.

use anyhow::{Context, Result};
use cuentas_finance::{GenerationConfig, ModelClient, ModelResponse};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ModelSection;
use crate::retry::{HttpStatusError, RetryPolicy};

const MAX_ERROR_BODY: usize = 300;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationParams,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationParams {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(section: &ModelSection, api_key: String, retry: RetryPolicy) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(section.timeout())
            .build()
            .context("build http client")?;

        info!(model = %section.model, "initialized Gemini client");
        Ok(Self {
            http,
            base_url: section.base_url.trim_end_matches('/').to_string(),
            model: normalize_model(&section.model),
            api_key,
            retry,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    fn generate_once(&self, prompt: &str, config: &GenerationConfig) -> Result<ModelResponse> {
        // main runs under #[tokio::main]; a nested block_on would panic there
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            tokio::task::block_in_place(|| handle.block_on(self.generate_async(prompt, config)))
        } else {
            let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
            rt.block_on(self.generate_async(prompt, config))
        }
    }

    async fn generate_async(&self, prompt: &str, config: &GenerationConfig) -> Result<ModelResponse> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationParams {
                temperature: config.temperature,
                max_output_tokens: config.max_output_tokens,
            },
        };

        let resp = self
            .http
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .context("gemini request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            return Err(HttpStatusError {
                status: status.as_u16(),
                body: truncate(&txt, MAX_ERROR_BODY),
            })
            .context("gemini error");
        }

        let out: GenerateContentResponse = resp.json().await.context("parse gemini response")?;
        let response = response_from(out);
        debug!(blocked = response.text.is_none(), "gemini answered");
        Ok(response)
    }
}

impl ModelClient for GeminiClient {
    fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<ModelResponse> {
        self.retry
            .run(|| self.generate_once(prompt, config))
            .into_result()
    }
}

/// `models/gemini-x` and `gemini-x` name the same model.
pub fn normalize_model(model: &str) -> String {
    model.trim().strip_prefix("models/").unwrap_or(model.trim()).to_string()
}

/// First candidate's text parts, concatenated. No candidate means the
/// prompt was blocked.
fn response_from(out: GenerateContentResponse) -> ModelResponse {
    let Some(candidate) = out.candidates.and_then(|c| c.into_iter().next()) else {
        return ModelResponse::blocked();
    };
    let text = candidate
        .content
        .and_then(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.text)
        .collect::<String>();
    if text.is_empty() {
        ModelResponse::blocked()
    } else {
        ModelResponse::with_text(text)
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
