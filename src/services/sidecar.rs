//! Model sidecar for diarization, overlap separation and gender
//! classification.
//!
//! Each call spawns the sidecar command, writes one JSON request
//! `{"command": ..., "args": {...}}` to stdin and reads one envelope
//! `{"success": bool, "result": ..., "error": ...}` from stdout.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{Diarizer, GenderClassifier, GenderEstimate, OverlapSeparator};
use crate::error::{DubError, Result};
use crate::io::parse_turns_value;
use crate::models::{Gender, SpeakerTurn};

const SERVICE: &str = "sidecar";

#[derive(Debug, Clone)]
pub struct ModelSidecar {
    program: PathBuf,
    args: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    result: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SeparationResult {
    stems: Vec<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ClassificationResult {
    #[serde(default)]
    gender: String,
    #[serde(default)]
    confidence: f64,
}

impl ModelSidecar {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace-separated command line such as
    /// `python3 -m autodub_models`
    pub fn from_command_line(command: &str) -> anyhow::Result<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next().context("empty sidecar command")?;
        Ok(Self::new(program, parts.map(str::to_string).collect()))
    }

    /// Command from `AUTODUB_SIDECAR`
    pub fn from_env() -> anyhow::Result<Self> {
        let command = std::env::var("AUTODUB_SIDECAR")
            .context("AUTODUB_SIDECAR environment variable not set")?;
        Self::from_command_line(&command)
    }

    async fn run_command(&self, command: &str, args: serde_json::Value) -> Result<serde_json::Value> {
        let request = serde_json::json!({
            "command": command,
            "args": args,
        });
        debug!("sidecar {} {}", command, request["args"]);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DubError::unavailable(SERVICE, format!("failed to spawn: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(request.to_string().as_bytes())
                .await
                .map_err(|e| DubError::unavailable(SERVICE, format!("failed to write request: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| DubError::unavailable(SERVICE, format!("failed to wait: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DubError::unavailable(
                SERVICE,
                format!("{} exited with {}: {}", command, output.status, stderr.trim()),
            ));
        }

        parse_envelope(&output.stdout)
    }
}

/// Unwrap a sidecar response envelope
fn parse_envelope(stdout: &[u8]) -> Result<serde_json::Value> {
    let envelope: Envelope = serde_json::from_slice(stdout).map_err(|e| {
        DubError::rejected(
            SERVICE,
            format!("unparseable response: {} - {}", e, String::from_utf8_lossy(stdout).trim()),
        )
    })?;
    if envelope.success {
        Ok(envelope.result)
    } else {
        Err(DubError::rejected(
            SERVICE,
            envelope.error.unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }
}

fn path_value(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[async_trait]
impl Diarizer for ModelSidecar {
    async fn diarize(&self, audio: &Path) -> Result<Vec<SpeakerTurn>> {
        let result = self
            .run_command("diarize", serde_json::json!({ "audio_path": path_value(audio) }))
            .await?;
        parse_turns_value(result)
    }
}

#[async_trait]
impl OverlapSeparator for ModelSidecar {
    async fn separate(&self, audio: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let result = self
            .run_command(
                "separate",
                serde_json::json!({
                    "audio_path": path_value(audio),
                    "output_dir": path_value(out_dir),
                }),
            )
            .await?;
        let separation: SeparationResult = serde_json::from_value(result)?;
        Ok(separation.stems)
    }
}

#[async_trait]
impl GenderClassifier for ModelSidecar {
    async fn classify(&self, audio: &Path) -> Result<GenderEstimate> {
        let result = self
            .run_command("classify_gender", serde_json::json!({ "audio_path": path_value(audio) }))
            .await?;
        let classification: ClassificationResult = serde_json::from_value(result)?;
        let gender = classification.gender.parse().unwrap_or(Gender::Unknown);
        Ok(GenderEstimate {
            gender,
            confidence: classification.confidence.clamp(0.0, 1.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_success() {
        let result = parse_envelope(br#"{"success": true, "result": {"stems": ["a.wav"]}}"#).unwrap();
        assert_eq!(result["stems"][0], "a.wav");
    }

    #[test]
    fn test_envelope_failure_is_rejected() {
        let err = parse_envelope(br#"{"success": false, "error": "model not loaded"}"#).unwrap_err();
        assert!(matches!(err, DubError::CollaboratorRejected { .. }));
        assert!(err.to_string().contains("model not loaded"));

        assert!(parse_envelope(b"Traceback (most recent call last)").is_err());
    }

    #[test]
    fn test_from_command_line() {
        let sidecar = ModelSidecar::from_command_line("python3 -m autodub_models").unwrap();
        assert_eq!(sidecar.program, PathBuf::from("python3"));
        assert_eq!(sidecar.args, vec!["-m", "autodub_models"]);
        assert!(ModelSidecar::from_command_line("   ").is_err());
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let sidecar = ModelSidecar::new("/nonexistent/sidecar", vec![]);
        let err = sidecar.diarize(Path::new("audio.wav")).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
