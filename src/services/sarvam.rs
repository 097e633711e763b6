//! Sarvam AI speech APIs: transcription, translation and synthesis.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::{Client, StatusCode, multipart};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Synthesizer, Transcriber, Transcription, Translator, Voice};
use crate::error::{DubError, Result};

/// Configuration for the Sarvam API client
#[derive(Debug, Clone)]
pub struct SarvamConfig {
    /// API key (from SARVAM_API_KEY env var)
    pub api_key: String,
    pub base_url: String,
    pub stt_model: String,
    pub tts_model: String,
    /// Sample rate requested from text-to-speech
    pub tts_sample_rate: u32,
    /// HTTP request timeout
    pub timeout: Duration,
}

impl SarvamConfig {
    /// Create config from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("SARVAM_API_KEY")
            .context("SARVAM_API_KEY environment variable not set")?;
        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("SARVAM_BASE_URL") {
            config.base_url = url;
        }
        Ok(config)
    }

    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: "https://api.sarvam.ai".to_string(),
            stt_model: "saarika:v2.5".to_string(),
            tts_model: "bulbul:v2".to_string(),
            tts_sample_rate: 22_050,
            timeout: Duration::from_secs(90),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

pub struct SarvamClient {
    client: Client,
    config: SarvamConfig,
}

impl SarvamClient {
    pub fn new(config: SarvamConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, config }
    }

    fn transport_error(&self, service: &'static str, error: reqwest::Error) -> DubError {
        if error.is_timeout() {
            DubError::CollaboratorTimeout {
                service,
                after: self.config.timeout,
            }
        } else {
            request_error(service, error)
        }
    }

    async fn check(service: &'static str, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(service, status, &body))
    }
}

/// Map an HTTP failure onto the collaborator error taxonomy
pub fn status_error(service: &'static str, status: StatusCode, body: &str) -> DubError {
    let message = format!("{} - {}", status, body.trim());
    match status.as_u16() {
        408 | 429 => DubError::unavailable(service, message),
        s if s >= 500 => DubError::unavailable(service, message),
        _ => DubError::rejected(service, message),
    }
}

fn request_error(service: &'static str, error: reqwest::Error) -> DubError {
    if error.is_decode() {
        DubError::rejected(service, format!("malformed response: {}", error))
    } else {
        DubError::unavailable(service, error.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct SttResponse {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    language_code: Option<String>,
    #[serde(default)]
    language_probability: Option<f64>,
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    input: &'a str,
    source_language_code: &'a str,
    target_language_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translated_text: String,
}

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    inputs: Vec<&'a str>,
    target_language_code: &'a str,
    speaker: &'a str,
    model: &'a str,
    speech_sample_rate: u32,
}

#[derive(Debug, Deserialize)]
struct TtsResponse {
    #[serde(default)]
    audios: Vec<String>,
}

#[async_trait]
impl Transcriber for SarvamClient {
    async fn transcribe(&self, audio: &Path, language_hint: Option<&str>) -> Result<Transcription> {
        const SERVICE: &str = "sarvam.stt";

        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "chunk.wav".to_string());
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/wav")
            .map_err(|e| self.transport_error(SERVICE, e))?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("model", self.config.stt_model.clone())
            .text("language_code", language_hint.unwrap_or("unknown").to_string());

        let response = self
            .client
            .post(self.config.endpoint("speech-to-text"))
            .header("api-subscription-key", &self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(SERVICE, e))?;
        let response: SttResponse = Self::check(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| self.transport_error(SERVICE, e))?;

        debug!(
            "Transcribed {}: {} chars ({:?})",
            audio.display(),
            response.transcript.len(),
            response.language_code
        );
        Ok(Transcription {
            text: response.transcript.trim().to_string(),
            language: response.language_code,
            confidence: response.language_probability.unwrap_or(1.0),
        })
    }
}

#[async_trait]
impl Translator for SarvamClient {
    async fn translate(&self, text: &str, source: Option<&str>, target: &str) -> Result<String> {
        const SERVICE: &str = "sarvam.translate";

        let request = TranslateRequest {
            input: text,
            source_language_code: source.unwrap_or("auto"),
            target_language_code: target,
        };
        let response = self
            .client
            .post(self.config.endpoint("translate"))
            .header("api-subscription-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(SERVICE, e))?;
        let response: TranslateResponse = Self::check(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| self.transport_error(SERVICE, e))?;
        Ok(response.translated_text)
    }
}

#[async_trait]
impl Synthesizer for SarvamClient {
    async fn synthesize(&self, text: &str, voice: &Voice, out: &Path) -> Result<PathBuf> {
        const SERVICE: &str = "sarvam.tts";

        let request = TtsRequest {
            inputs: vec![text],
            target_language_code: &voice.language,
            speaker: &voice.name,
            model: &self.config.tts_model,
            speech_sample_rate: self.config.tts_sample_rate,
        };
        let response = self
            .client
            .post(self.config.endpoint("text-to-speech"))
            .header("api-subscription-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(SERVICE, e))?;
        let response: TtsResponse = Self::check(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| self.transport_error(SERVICE, e))?;

        let encoded = response
            .audios
            .first()
            .ok_or_else(|| DubError::rejected(SERVICE, "response carried no audio"))?;
        let audio = BASE64
            .decode(encoded)
            .map_err(|e| DubError::rejected(SERVICE, format!("invalid base64 audio: {}", e)))?;
        tokio::fs::write(out, audio).await?;
        Ok(out.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        for code in [408, 429, 500, 502, 503] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(status_error("tts", status, "").is_retryable(), "{}", code);
        }
        for code in [400, 401, 403, 404, 422] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(
                matches!(status_error("tts", status, "nope"), DubError::CollaboratorRejected { .. }),
                "{}",
                code
            );
        }
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let mut config = SarvamConfig::new("key".to_string());
        config.base_url = "http://localhost:9000/".to_string();
        assert_eq!(config.endpoint("translate"), "http://localhost:9000/translate");
    }

    #[test]
    fn test_tts_response_parsing() {
        let json = r#"{"request_id": "r1", "audios": ["UklGRg=="]}"#;
        let response: TtsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(BASE64.decode(&response.audios[0]).unwrap(), b"RIFF");
    }

    #[test]
    fn test_stt_response_tolerates_missing_language() {
        let response: SttResponse = serde_json::from_str(r#"{"transcript": " hello "}"#).unwrap();
        assert_eq!(response.transcript, " hello ");
        assert!(response.language_code.is_none());
    }
}
