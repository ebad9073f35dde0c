//! Proxy to the Gemini `generateContent` endpoint with the server-held key.

use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::HubConfig;
use crate::error::{HubError, HubResult};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub prompt: String,
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CustomRequest {
    #[serde(default)]
    pub body: Value,
    pub model: Option<String>,
}

/// Maps known misspellings to the real model id; blank input uses `default`.
pub fn normalize_model(raw: Option<&str>, default: &str) -> String {
    match raw.map(str::trim).filter(|m| !m.is_empty()) {
        None => default.to_string(),
        Some("gemini-flash-2.5") | Some("gemini-falsh-2.5") => "gemini-2.5-flash".to_string(),
        Some(model) => model.to_string(),
    }
}

fn api_key(config: &HubConfig) -> HubResult<&str> {
    config
        .gemini_api_key
        .as_deref()
        .ok_or_else(|| HubError::Config("Gemini API key not configured".to_string()))
}

pub async fn generate(http: &reqwest::Client, key: &str, model: &str, body: &Value) -> HubResult<Value> {
    let url = format!("{}/{}:generateContent", GEMINI_BASE_URL, model);
    let resp = http
        .post(url)
        .query(&[("key", key)])
        .header(CONTENT_TYPE, "application/json")
        .json(body)
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let detail = resp.text().await.unwrap_or_default();
        tracing::error!("Gemini API returned {} for model {}", status, model);
        return Err(HubError::Upstream {
            status: status.as_u16(),
            message: format!("Gemini API error: {}", detail),
        });
    }
    Ok(resp.json::<Value>().await?)
}

pub async fn prompt(http: &reqwest::Client, config: &HubConfig, request: PromptRequest) -> HubResult<Value> {
    if request.prompt.trim().is_empty() {
        return Err(HubError::bad_request("Prompt is required"));
    }
    let key = api_key(config)?;
    let model = normalize_model(request.model.as_deref(), &config.gemini_default_model);
    let body = json!({ "contents": [{ "parts": [{ "text": request.prompt }] }] });
    generate(http, key, &model, &body).await
}

pub async fn custom(http: &reqwest::Client, config: &HubConfig, request: CustomRequest) -> HubResult<Value> {
    if request.body.is_null() {
        return Err(HubError::bad_request("Request body is required"));
    }
    let key = api_key(config)?;
    let model = normalize_model(request.model.as_deref(), &config.gemini_default_model);
    generate(http, key, &model, &request.body).await
}
