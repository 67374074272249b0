//! Reasoning-service client: the single external collaborator boundary.
//!
//! Sends {current frame, reference material, instruction, language, hazard
//! zones} to a multimodal provider and parses the structured verdict. Also
//! hosts the digitization operation that turns reference material into an
//! ordered procedure step list.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::prompts::{
    build_analysis_prompt, build_digitize_prompt, step_list_json_schema, verdict_json_schema,
};
use super::types::{AnalysisRequest, BoxOrder, ReferenceMaterial, Severity, Verdict, VerdictStatus};
use crate::overlay::NormalizedBox;
use crate::session::ProcedureStep;

/// The request/response contract with the reasoning service.
///
/// One call is idempotent and fallible; rate limiting and single-flight are
/// the scheduler's concern, not the client's.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    /// Analyze one frame against the reference. Any transport or parse
    /// failure is an `Err`; callers must not crash or mutate state on it.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Verdict, String>;

    /// Digitize reference material into an ordered step list.
    async fn digitize(
        &self,
        reference: &ReferenceMaterial,
        language: &str,
    ) -> Result<Vec<ProcedureStep>, String>;
}

/// HTTP client for hosted multimodal providers.
pub struct HttpReasoningClient {
    provider: String,
    model: String,
    api_key: String,
    box_order: BoxOrder,
    client: reqwest::Client,
}

impl HttpReasoningClient {
    /// Create a client for the given provider.
    ///
    /// # Arguments
    /// * `provider` - "claude", "openai", or "openrouter"
    /// * `model` - Model identifier (e.g., "claude-sonnet-4-20250514", "gpt-4o")
    /// * `api_key` - API key, supplied by the embedding application
    /// * `timeout` - Per-request timeout
    pub fn new(
        provider: &str,
        model: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            provider: provider.to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            box_order: BoxOrder::TopLeftXywh,
            client,
        })
    }

    /// Override the raw box ordering for endpoint variants that return
    /// `[ymin, xmin, ymax, xmax]` instead of `[x, y, width, height]`.
    pub fn with_box_order(mut self, order: BoxOrder) -> Self {
        self.box_order = order;
        self
    }

    /// Dispatch a prompt with attached images to the configured provider and
    /// return the raw response text.
    async fn call_provider(&self, images: &[&str], prompt: &str) -> Result<String, String> {
        match self.provider.as_str() {
            "claude" => self.call_claude(images, prompt).await,
            "openai" => self.call_openai_style("https://api.openai.com/v1/chat/completions", images, prompt).await,
            "openrouter" => self.call_openai_style("https://openrouter.ai/api/v1/chat/completions", images, prompt).await,
            _ => {
                let msg = format!(
                    "Unsupported AI provider: '{}'. Supported: claude, openai, openrouter",
                    self.provider
                );
                error!("{}", msg);
                Err(msg)
            }
        }
    }

    /// Call the Anthropic Claude API with image content blocks.
    async fn call_claude(&self, images: &[&str], prompt: &str) -> Result<String, String> {
        let mut content = Vec::new();
        for data in images {
            content.push(serde_json::json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": super::frame::frame_media_type(),
                    "data": data
                }
            }));
        }
        content.push(serde_json::json!({ "type": "text", "text": prompt }));

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 1024,
            "system": "You are a procedure supervision assistant. Always respond with valid JSON only, no markdown formatting or code blocks.",
            "messages": [
                {"role": "user", "content": content}
            ]
        });

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let msg = if e.is_timeout() {
                    "Reasoning API timeout for provider 'claude'".to_string()
                } else {
                    format!("Reasoning API request failed for claude: {}", e)
                };
                error!("{}", msg);
                msg
            })?;

        let body_text = handle_api_response(response, "claude").await?;

        // Anthropic wrapper: { "content": [{"type": "text", "text": "..."}] }
        let resp_json: serde_json::Value = serde_json::from_str(&body_text)
            .map_err(|e| format!("Failed to parse Claude API response wrapper: {}", e))?;

        resp_json["content"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| "No text content in Claude API response".to_string())
    }

    /// Call an OpenAI-compatible chat completions endpoint with image URLs.
    async fn call_openai_style(
        &self,
        url: &str,
        images: &[&str],
        prompt: &str,
    ) -> Result<String, String> {
        let mut content = Vec::new();
        for data in images {
            content.push(serde_json::json!({
                "type": "image_url",
                "image_url": {
                    "url": format!("data:{};base64,{}", super::frame::frame_media_type(), data)
                }
            }));
        }
        content.push(serde_json::json!({ "type": "text", "text": prompt }));

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 1024,
            "messages": [
                {"role": "system", "content": "You are a procedure supervision assistant. Always respond with valid JSON only, no markdown formatting or code blocks."},
                {"role": "user", "content": content}
            ],
            "response_format": { "type": "json_object" }
        });

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let msg = if e.is_timeout() {
                    format!("Reasoning API timeout for provider '{}'", self.provider)
                } else {
                    format!("Reasoning API request failed for {}: {}", self.provider, e)
                };
                error!("{}", msg);
                msg
            })?;

        let body_text = handle_api_response(response, &self.provider).await?;

        // OpenAI wrapper: { "choices": [{"message": {"content": "..."}}] }
        let resp_json: serde_json::Value = serde_json::from_str(&body_text)
            .map_err(|e| format!("Failed to parse {} API response wrapper: {}", self.provider, e))?;

        resp_json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| format!("No content in {} API response", self.provider))
    }
}

#[async_trait]
impl ReasoningClient for HttpReasoningClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Verdict, String> {
        let mut prompt =
            build_analysis_prompt(&request.instruction, &request.language, &request.hazard_zones);

        let mut images = vec![request.frame_base64.as_str()];
        match &request.reference {
            Some(ReferenceMaterial::Image { base64 }) => images.push(base64.as_str()),
            Some(ReferenceMaterial::Document { text })
            | Some(ReferenceMaterial::Text { text }) => {
                prompt.push_str("\n\nReference procedure:\n");
                prompt.push_str(text);
            }
            None => {}
        }

        prompt.push_str("\n\nRespond with a single JSON object matching this schema:\n");
        prompt.push_str(&verdict_json_schema().to_string());

        info!(
            "Requesting analysis from '{}' ({}): instruction '{}'",
            self.provider, self.model, request.instruction
        );

        let response_text = self.call_provider(&images, &prompt).await?;
        let response_text = strip_markdown_json(&response_text);
        let response_json: serde_json::Value = serde_json::from_str(&response_text).map_err(|e| {
            let truncated = truncate(&response_text, 500);
            let msg = format!(
                "Failed to parse verdict as JSON: {}. Raw response (first 500 chars): {}",
                e, truncated
            );
            error!("{}", msg);
            msg
        })?;

        map_response_to_verdict(&response_json, self.box_order)
    }

    async fn digitize(
        &self,
        reference: &ReferenceMaterial,
        language: &str,
    ) -> Result<Vec<ProcedureStep>, String> {
        let mut prompt = build_digitize_prompt(language);
        let mut images = Vec::new();
        match reference {
            ReferenceMaterial::Image { base64 } => images.push(base64.as_str()),
            ReferenceMaterial::Document { text } | ReferenceMaterial::Text { text } => {
                prompt.push_str("\n\nReference material:\n");
                prompt.push_str(text);
            }
        }

        prompt.push_str("\n\nRespond with a single JSON object matching this schema:\n");
        prompt.push_str(&step_list_json_schema().to_string());

        info!("Digitizing reference via '{}' ({})", self.provider, self.model);

        let response_text = self.call_provider(&images, &prompt).await?;
        let response_text = strip_markdown_json(&response_text);
        let response_json: serde_json::Value = serde_json::from_str(&response_text)
            .map_err(|e| format!("Failed to parse step list as JSON: {}", e))?;

        let steps = parse_step_list(&response_json)?;
        info!("Digitized {} procedure steps", steps.len());
        Ok(steps)
    }
}

/// Map the raw verdict JSON to the canonical `Verdict`.
///
/// Geometry is adapted from the endpoint's box ordering here and nowhere else;
/// malformed or absent geometry degrades to no box instead of an error.
pub(crate) fn map_response_to_verdict(
    json: &serde_json::Value,
    box_order: BoxOrder,
) -> Result<Verdict, String> {
    let status = match json["status"].as_str() {
        Some("MATCH") => VerdictStatus::Match,
        Some("DRIFT") => VerdictStatus::Drift,
        other => {
            return Err(format!(
                "Verdict is missing a valid 'status' field (got {:?})",
                other
            ))
        }
    };

    let severity = match json["severity"].as_str() {
        Some("LOW") => Severity::Low,
        Some("MEDIUM") => Severity::Medium,
        Some("CRITICAL") => Severity::Critical,
        other => {
            // Convention: LOW accompanies MATCH; an unlabeled drift is worth flagging
            let fallback = if status == VerdictStatus::Drift {
                Severity::Medium
            } else {
                Severity::Low
            };
            warn!(
                "Verdict severity missing or unknown ({:?}), defaulting to {}",
                other, fallback
            );
            fallback
        }
    };

    let anomaly_box = json["anomaly_box"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .map(|v| v.as_f64().unwrap_or(f64::NAN))
                .collect::<Vec<f64>>()
        })
        .and_then(|values| match box_order {
            BoxOrder::TopLeftXywh => NormalizedBox::from_xywh(&values),
            BoxOrder::CornersYxyx => NormalizedBox::from_corners(&values),
        });

    let message = json["message"].as_str().unwrap_or_default().to_string();

    Ok(Verdict {
        status,
        severity,
        anomaly_box,
        message,
    })
}

/// Parse the digitization response into procedure steps with 1-based ids.
fn parse_step_list(json: &serde_json::Value) -> Result<Vec<ProcedureStep>, String> {
    let raw_steps = json["steps"]
        .as_array()
        .ok_or("Digitization response is missing the 'steps' array")?;

    let mut steps = Vec::with_capacity(raw_steps.len());
    for (i, raw) in raw_steps.iter().enumerate() {
        let text = raw["text"]
            .as_str()
            .ok_or_else(|| format!("Step {} is missing 'text'", i + 1))?
            .to_string();
        let target_timestamp = raw["target_timestamp"].as_f64().filter(|t| *t >= 0.0);
        let tools = raw["tools"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        steps.push(ProcedureStep {
            id: i + 1,
            text,
            completed: false,
            target_timestamp,
            tools,
        });
    }
    Ok(steps)
}

/// Strip markdown code fences from a response if present.
/// Some providers wrap JSON in ```json ... ``` despite instructions.
fn strip_markdown_json(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        let after_open = match trimmed.find('\n') {
            Some(pos) => &trimmed[pos + 1..],
            None => trimmed,
        };
        let cleaned = after_open.trim_end();
        if let Some(stripped) = cleaned.strip_suffix("```") {
            stripped.trim().to_string()
        } else {
            cleaned.to_string()
        }
    } else {
        trimmed.to_string()
    }
}

/// Check status and extract the body text of a provider response.
async fn handle_api_response(
    response: reqwest::Response,
    provider: &str,
) -> Result<String, String> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read body>".to_string());
        let msg = format!(
            "Reasoning API error: {} from {} - {}",
            status,
            provider,
            truncate(&body, 1024)
        );
        error!("{}", msg);
        return Err(msg);
    }
    response
        .text()
        .await
        .map_err(|e| format!("Failed to read API response body from {}: {}", provider, e))
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
