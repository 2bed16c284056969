//! Generative advisory backend
//!
//! Delegates the verdict to an external language model over HTTP
//! (Ollama-style `/api/generate` with `format: "json"`). The model is
//! instructed to answer with a single JSON object matching
//! [`AdvisoryVerdict`]; anything else - timeout, transport error, non-JSON
//! output, unknown alert level - is a [`BackendError`] and the engine falls
//! back to the rule table.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::types::{AdvisoryVerdict, AlertLevel};

/// System instruction sent with every generation request.
const SYSTEM_PROMPT: &str = "You are an AI advisor for vehicle fleets (EcoFleet AI Advisor).\n\
Analyze the telemetry data and give the driver one short, actionable piece of advice.\n\
Respond with a single JSON object: {\"advice\": \"...\", \"alert_level\": \"...\"}.\n\
Rules for alert_level:\n\
- INFO: normal, optimal driving, no problems\n\
- WARN: behaviour to correct (revs too high, idling with the engine on, fuel getting low)\n\
- CRITICAL: dangerous situation (very high speed, fuel nearly empty)";

/// Errors from the generative backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend timed out after {0}s")]
    Timeout(u64),

    #[error("backend returned malformed output: {0}")]
    Malformed(String),
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: String,
    stream: bool,
    format: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Raw model output before alert-level validation.
#[derive(Deserialize)]
struct RawVerdict {
    #[serde(default)]
    advice: String,
    #[serde(default)]
    alert_level: String,
}

/// HTTP client for the advisory model endpoint.
pub struct GenerativeBackend {
    http: reqwest::Client,
    base_url: String,
    model: String,
    timeout_secs: u64,
}

impl GenerativeBackend {
    /// Create a backend client for the given endpoint.
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout_secs,
        })
    }

    /// Ask the model for a verdict on one reading.
    pub async fn generate(
        &self,
        speed: f64,
        rpm: u32,
        fuel_level: f64,
    ) -> Result<AdvisoryVerdict, BackendError> {
        let prompt = format!(
            "Telemetry data:\n- Speed: {speed} km/h\n- RPM: {rpm}\n- Fuel level: {fuel_level}%"
        );
        let body = GenerateRequest {
            model: &self.model,
            system: SYSTEM_PROMPT,
            prompt,
            stream: false,
            format: "json",
        };

        // The request/response round trip is bounded as a whole; the client
        // timeout alone would not cover a slow body read.
        let call = async {
            let resp = self
                .http
                .post(format!("{}/api/generate", self.base_url))
                .json(&body)
                .send()
                .await?
                .error_for_status()?;
            resp.json::<GenerateResponse>().await
        };
        let generated = tokio::time::timeout(Duration::from_secs(self.timeout_secs), call)
            .await
            .map_err(|_| BackendError::Timeout(self.timeout_secs))??;

        let raw: RawVerdict = serde_json::from_str(&generated.response)
            .map_err(|e| BackendError::Malformed(e.to_string()))?;

        if raw.advice.trim().is_empty() {
            return Err(BackendError::Malformed("empty advice".to_string()));
        }
        let alert_level = AlertLevel::parse_loose(&raw.alert_level).ok_or_else(|| {
            BackendError::Malformed(format!("unknown alert level {:?}", raw.alert_level))
        })?;

        debug!(advice = %raw.advice, level = %alert_level, "Model verdict");
        Ok(AdvisoryVerdict {
            advice: raw.advice,
            alert_level,
        })
    }
}
