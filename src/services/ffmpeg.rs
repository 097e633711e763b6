//! [`MediaTool`] backed by the ffmpeg and ffprobe binaries.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{Layer, MediaTool};
use crate::error::{DubError, Result};
use crate::models::ms_to_seconds;

/// Every intermediate artifact is 16-bit PCM mono at this rate so that
/// concatenation can copy streams without re-encoding.
const SAMPLE_RATE: &str = "16000";

pub struct FfmpegTool {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
}

impl FfmpegTool {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Binaries from `FFMPEG` / `FFPROBE`, falling back to `PATH`
    pub fn from_env() -> Self {
        let ffmpeg = std::env::var("FFMPEG").unwrap_or_else(|_| "ffmpeg".to_string());
        let ffprobe = std::env::var("FFPROBE").unwrap_or_else(|_| "ffprobe".to_string());
        Self::new(ffmpeg, ffprobe)
    }

    /// Run ffmpeg with the common prefix; returns captured stderr
    async fn ffmpeg(&self, operation: &'static str, args: Vec<String>) -> Result<String> {
        let mut full = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
        ];
        full.extend(args);
        let (_, stderr) = run_tool(&self.ffmpeg_path, operation, &full).await?;
        Ok(stderr)
    }
}

/// Returns (stdout, stderr) of a successful run
async fn run_tool(
    program: &Path,
    operation: &'static str,
    args: &[String],
) -> Result<(String, String)> {
    debug!("{} {}", program.display(), args.join(" "));

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| DubError::MediaTool {
            operation,
            exit_code: None,
            stderr: format!("failed to spawn {}: {}", program.display(), e),
        })?;

    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    if !output.status.success() {
        return Err(DubError::MediaTool {
            operation,
            exit_code: output.status.code(),
            stderr: tail(&stderr, 2_000),
        });
    }

    Ok((String::from_utf8_lossy(&output.stdout).to_string(), stderr))
}

fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.trim().to_string();
    }
    text.chars().skip(count - max_chars).collect::<String>().trim().to_string()
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn seconds_arg(ms: u64) -> String {
    format!("{:.3}", ms_to_seconds(ms))
}

fn pcm_output(out: &Path) -> Vec<String> {
    vec![
        "-ar".to_string(),
        SAMPLE_RATE.to_string(),
        "-ac".to_string(),
        "1".to_string(),
        "-c:a".to_string(),
        "pcm_s16le".to_string(),
        path_arg(out),
    ]
}

/// Filter graph applying each tempo factor in sequence
pub fn atempo_filter(factors: &[f64]) -> String {
    factors
        .iter()
        .map(|f| format!("atempo={:.4}", f))
        .collect::<Vec<_>>()
        .join(",")
}

/// Extract `mean_volume` from volumedetect output
pub fn parse_mean_volume(stderr: &str) -> Option<f64> {
    stderr.lines().find_map(|line| {
        let (_, rest) = line.split_once("mean_volume:")?;
        let value = rest.trim().trim_end_matches("dB").trim();
        if value == "-inf" {
            return Some(f64::NEG_INFINITY);
        }
        value.parse().ok()
    })
}

/// Filter graph delaying input `i` by `offsets[i - 1]` and mixing all inputs
/// without level normalization, at the length of input 0
pub fn overlay_filter(offsets: &[u64]) -> String {
    let mut graph = String::new();
    let mut labels = String::from("[0:a]");
    for (i, offset) in offsets.iter().enumerate() {
        let input = i + 1;
        graph.push_str(&format!("[{}:a]adelay={}:all=1[d{}];", input, offset, input));
        labels.push_str(&format!("[d{}]", input));
    }
    graph.push_str(&format!(
        "{}amix=inputs={}:duration=first:dropout_transition=0:normalize=0[mix]",
        labels,
        offsets.len() + 1
    ));
    graph
}

/// Concat demuxer list; single quotes in paths are escaped the way ffmpeg expects
pub fn concat_list(parts: &[PathBuf]) -> String {
    parts
        .iter()
        .map(|p| {
            let absolute = std::path::absolute(p).unwrap_or_else(|_| p.clone());
            format!("file '{}'\n", absolute.to_string_lossy().replace('\'', "'\\''"))
        })
        .collect()
}

#[async_trait]
impl MediaTool for FfmpegTool {
    async fn extract_audio(&self, video: &Path, out: &Path) -> Result<PathBuf> {
        let mut args = vec!["-i".to_string(), path_arg(video), "-vn".to_string()];
        args.extend(pcm_output(out));
        self.ffmpeg("extract_audio", args).await?;
        Ok(out.to_path_buf())
    }

    async fn cut(&self, audio: &Path, start_ms: u64, end_ms: u64, out: &Path) -> Result<PathBuf> {
        if end_ms <= start_ms {
            return Err(DubError::invalid(format!(
                "cannot cut empty range {}ms - {}ms",
                start_ms, end_ms
            )));
        }
        let mut args = vec![
            "-ss".to_string(),
            seconds_arg(start_ms),
            "-i".to_string(),
            path_arg(audio),
            "-t".to_string(),
            seconds_arg(end_ms - start_ms),
            "-vn".to_string(),
        ];
        args.extend(pcm_output(out));
        self.ffmpeg("cut", args).await?;
        Ok(out.to_path_buf())
    }

    async fn concat(&self, parts: &[PathBuf], out: &Path) -> Result<PathBuf> {
        if parts.is_empty() {
            return Err(DubError::invalid("nothing to concatenate"));
        }
        let list_path = out.with_extension("concat.txt");
        tokio::fs::write(&list_path, concat_list(parts)).await?;

        let args = vec![
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            path_arg(&list_path),
            "-c".to_string(),
            "copy".to_string(),
            path_arg(out),
        ];
        let result = self.ffmpeg("concat", args).await;
        let _ = tokio::fs::remove_file(&list_path).await;
        result?;
        Ok(out.to_path_buf())
    }

    async fn generate_silence(&self, duration_ms: u64, out: &Path) -> Result<PathBuf> {
        let mut args = vec![
            "-f".to_string(),
            "lavfi".to_string(),
            "-i".to_string(),
            format!("anullsrc=r={}:cl=mono", SAMPLE_RATE),
            "-t".to_string(),
            seconds_arg(duration_ms),
        ];
        args.extend(pcm_output(out));
        self.ffmpeg("generate_silence", args).await?;
        Ok(out.to_path_buf())
    }

    async fn mux(&self, video: &Path, audio: &Path, out: &Path) -> Result<PathBuf> {
        let args = vec![
            "-i".to_string(),
            path_arg(video),
            "-i".to_string(),
            path_arg(audio),
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "1:a:0".to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "192k".to_string(),
            "-shortest".to_string(),
            path_arg(out),
        ];
        self.ffmpeg("mux", args).await?;
        Ok(out.to_path_buf())
    }

    async fn probe_duration(&self, media: &Path) -> Result<u64> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            path_arg(media),
        ];
        let (stdout, _) = run_tool(&self.ffprobe_path, "probe_duration", &args).await?;
        let seconds: f64 = stdout.trim().parse().map_err(|_| DubError::MediaTool {
            operation: "probe_duration",
            exit_code: Some(0),
            stderr: format!("unparseable duration {:?}", stdout.trim()),
        })?;
        Ok(crate::models::seconds_to_ms(seconds))
    }

    async fn mean_volume(&self, audio: &Path) -> Result<f64> {
        let args = vec![
            "-i".to_string(),
            path_arg(audio),
            "-af".to_string(),
            "volumedetect".to_string(),
            "-f".to_string(),
            "null".to_string(),
            "-".to_string(),
        ];
        let stderr = self.ffmpeg("mean_volume", args).await?;
        parse_mean_volume(&stderr).ok_or_else(|| DubError::MediaTool {
            operation: "mean_volume",
            exit_code: Some(0),
            stderr: "volumedetect reported no mean_volume".to_string(),
        })
    }

    async fn time_stretch(&self, audio: &Path, factors: &[f64], out: &Path) -> Result<PathBuf> {
        let mut args = vec!["-i".to_string(), path_arg(audio)];
        if !factors.is_empty() {
            args.push("-filter:a".to_string());
            args.push(atempo_filter(factors));
        }
        args.extend(pcm_output(out));
        self.ffmpeg("time_stretch", args).await?;
        Ok(out.to_path_buf())
    }

    async fn fit(&self, audio: &Path, duration_ms: u64, out: &Path) -> Result<PathBuf> {
        let mut args = vec![
            "-i".to_string(),
            path_arg(audio),
            "-af".to_string(),
            "apad".to_string(),
            "-t".to_string(),
            seconds_arg(duration_ms),
        ];
        args.extend(pcm_output(out));
        self.ffmpeg("fit", args).await?;
        Ok(out.to_path_buf())
    }

    async fn overlay(&self, base: &Path, layers: &[Layer], out: &Path) -> Result<PathBuf> {
        let mut args = vec!["-i".to_string(), path_arg(base)];
        for layer in layers {
            args.push("-i".to_string());
            args.push(path_arg(&layer.path));
        }
        let offsets: Vec<u64> = layers.iter().map(|l| l.offset_ms).collect();
        args.extend([
            "-filter_complex".to_string(),
            overlay_filter(&offsets),
            "-map".to_string(),
            "[mix]".to_string(),
        ]);
        args.extend(pcm_output(out));
        self.ffmpeg("overlay", args).await?;
        Ok(out.to_path_buf())
    }
}
