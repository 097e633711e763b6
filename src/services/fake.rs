//! In-memory collaborators for tests.
//!
//! Media artifacts are virtual: the fake media tool tracks the duration of
//! every path it "writes" and answers probes from that table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{
    Collaborators, Diarizer, GenderClassifier, GenderEstimate, Layer, MediaTool,
    OverlapSeparator, Services, Synthesizer, Transcriber, Transcription, Translator, Voice,
};
use crate::config::RetryPolicy;
use crate::error::{DubError, Result};
use crate::models::{Gender, SpeakerTurn};

/// Two quick attempts, so injected failures surface without slowing tests
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(2),
        call_timeout: Duration::from_secs(5),
    }
}

fn matches(path: &Path, needle: &str) -> bool {
    needle.is_empty() || path.to_string_lossy().contains(needle)
}

#[derive(Default)]
pub struct FakeMedia {
    source_ms: AtomicU64,
    durations: Mutex<HashMap<PathBuf, u64>>,
    volumes: Mutex<Vec<(String, f64)>>,
    failures: Mutex<Vec<(&'static str, String)>>,
    calls: Mutex<Vec<&'static str>>,
}

impl FakeMedia {
    pub fn new(source_ms: u64) -> Self {
        let media = Self::default();
        media.source_ms.store(source_ms, Ordering::SeqCst);
        media
    }

    /// Fail `operation` whenever one of its paths contains `needle`
    pub fn fail(&self, operation: &'static str, needle: &str) {
        self.failures.lock().unwrap().push((operation, needle.to_string()));
    }

    /// Report `db` as the mean volume of paths containing `needle`
    pub fn set_volume(&self, needle: &str, db: f64) {
        self.volumes.lock().unwrap().push((needle.to_string(), db));
    }

    pub fn register(&self, path: &Path, duration_ms: u64) {
        self.durations
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), duration_ms);
    }

    pub fn duration_of(&self, path: &Path) -> Option<u64> {
        self.durations.lock().unwrap().get(path).copied()
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|op| **op == operation)
            .count()
    }

    fn enter(&self, operation: &'static str, paths: &[&Path]) -> Result<()> {
        self.calls.lock().unwrap().push(operation);
        let failures = self.failures.lock().unwrap();
        let failing = failures
            .iter()
            .any(|(op, needle)| *op == operation && paths.iter().any(|p| matches(p, needle)));
        if failing {
            return Err(DubError::MediaTool {
                operation,
                exit_code: Some(1),
                stderr: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn require(&self, operation: &'static str, path: &Path) -> Result<u64> {
        self.duration_of(path).ok_or_else(|| DubError::MediaTool {
            operation,
            exit_code: Some(1),
            stderr: format!("{}: No such file or directory", path.display()),
        })
    }

    fn write(&self, out: &Path, duration_ms: u64) -> Result<PathBuf> {
        self.register(out, duration_ms);
        Ok(out.to_path_buf())
    }
}

#[async_trait]
impl MediaTool for FakeMedia {
    async fn extract_audio(&self, video: &Path, out: &Path) -> Result<PathBuf> {
        self.enter("extract_audio", &[video, out])?;
        self.write(out, self.source_ms.load(Ordering::SeqCst))
    }

    async fn cut(&self, audio: &Path, start_ms: u64, end_ms: u64, out: &Path) -> Result<PathBuf> {
        self.enter("cut", &[audio, out])?;
        let available = self.require("cut", audio)?;
        let end_ms = end_ms.min(available);
        if end_ms <= start_ms {
            return Err(DubError::invalid("cut outside of input"));
        }
        self.write(out, end_ms - start_ms)
    }

    async fn concat(&self, parts: &[PathBuf], out: &Path) -> Result<PathBuf> {
        let mut paths: Vec<&Path> = parts.iter().map(PathBuf::as_path).collect();
        paths.push(out);
        self.enter("concat", &paths)?;
        let mut total = 0;
        for part in parts {
            total += self.require("concat", part)?;
        }
        self.write(out, total)
    }

    async fn generate_silence(&self, duration_ms: u64, out: &Path) -> Result<PathBuf> {
        self.enter("generate_silence", &[out])?;
        self.write(out, duration_ms)
    }

    async fn mux(&self, video: &Path, audio: &Path, out: &Path) -> Result<PathBuf> {
        self.enter("mux", &[video, audio, out])?;
        let audio_ms = self.require("mux", audio)?;
        let video_ms = self.source_ms.load(Ordering::SeqCst);
        self.write(out, audio_ms.min(video_ms))
    }

    async fn probe_duration(&self, media: &Path) -> Result<u64> {
        self.enter("probe_duration", &[media])?;
        match self.duration_of(media) {
            Some(ms) => Ok(ms),
            None => Ok(self.source_ms.load(Ordering::SeqCst)),
        }
    }

    async fn mean_volume(&self, audio: &Path) -> Result<f64> {
        self.enter("mean_volume", &[audio])?;
        let volumes = self.volumes.lock().unwrap();
        Ok(volumes
            .iter()
            .find(|(needle, _)| matches(audio, needle))
            .map(|(_, db)| *db)
            .unwrap_or(-20.0))
    }

    async fn time_stretch(&self, audio: &Path, factors: &[f64], out: &Path) -> Result<PathBuf> {
        self.enter("time_stretch", &[audio, out])?;
        let input = self.require("time_stretch", audio)?;
        let speed: f64 = factors.iter().product();
        self.write(out, (input as f64 / speed).round() as u64)
    }

    async fn fit(&self, audio: &Path, duration_ms: u64, out: &Path) -> Result<PathBuf> {
        self.enter("fit", &[audio, out])?;
        self.require("fit", audio)?;
        self.write(out, duration_ms)
    }

    async fn overlay(&self, base: &Path, layers: &[Layer], out: &Path) -> Result<PathBuf> {
        let mut paths: Vec<&Path> = layers.iter().map(|l| l.path.as_path()).collect();
        paths.extend([base, out]);
        self.enter("overlay", &paths)?;
        let duration = self.require("overlay", base)?;
        for layer in layers {
            self.require("overlay", &layer.path)?;
        }
        self.write(out, duration)
    }
}

pub struct FakeDiarizer {
    pub turns: Mutex<Vec<SpeakerTurn>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl Diarizer for FakeDiarizer {
    async fn diarize(&self, _audio: &Path) -> Result<Vec<SpeakerTurn>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DubError::unavailable("sidecar", "diarization model crashed"));
        }
        Ok(self.turns.lock().unwrap().clone())
    }
}

pub struct FakeSeparator {
    media: Arc<FakeMedia>,
    pub stems: AtomicUsize,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl OverlapSeparator for FakeSeparator {
    async fn separate(&self, audio: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(DubError::rejected("sidecar", "separation model missing"));
        }
        let duration = self.media.require("separate", audio)?;
        let stems = (0..self.stems.load(Ordering::SeqCst))
            .map(|i| {
                let stem = out_dir.join(format!("stem_{}.wav", i));
                self.media.register(&stem, duration);
                stem
            })
            .collect();
        Ok(stems)
    }
}

pub struct FakeClassifier {
    /// Answer for paths containing the key
    pub answers: Mutex<Vec<(String, GenderEstimate)>>,
    pub default: Mutex<GenderEstimate>,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeClassifier {
    pub fn answer(&self, needle: &str, gender: Gender, confidence: f64) {
        self.answers
            .lock()
            .unwrap()
            .push((needle.to_string(), GenderEstimate { gender, confidence }));
    }
}

#[async_trait]
impl GenderClassifier for FakeClassifier {
    async fn classify(&self, audio: &Path) -> Result<GenderEstimate> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(DubError::rejected("sidecar", "classifier unavailable"));
        }
        let answers = self.answers.lock().unwrap();
        Ok(answers
            .iter()
            .find(|(needle, _)| matches(audio, needle))
            .map(|(_, estimate)| *estimate)
            .unwrap_or(*self.default.lock().unwrap()))
    }
}

pub struct FakeTranscriber {
    pub answers: Mutex<Vec<(String, Transcription)>>,
    pub default: Mutex<Transcription>,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeTranscriber {
    pub fn answer(&self, needle: &str, text: &str, language: Option<&str>) {
        self.answers.lock().unwrap().push((
            needle.to_string(),
            Transcription {
                text: text.to_string(),
                language: language.map(str::to_string),
                confidence: 0.9,
            },
        ));
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio: &Path, _language_hint: Option<&str>) -> Result<Transcription> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(DubError::unavailable("stt", "503 Service Unavailable"));
        }
        let answers = self.answers.lock().unwrap();
        Ok(answers
            .iter()
            .find(|(needle, _)| matches(audio, needle))
            .map(|(_, t)| t.clone())
            .unwrap_or_else(|| self.default.lock().unwrap().clone()))
    }
}

/// Translates by upper-casing, so tests can tell translated text apart
#[derive(Default)]
pub struct FakeTranslator {
    pub received: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(&self, text: &str, _source: Option<&str>, _target: &str) -> Result<String> {
        self.received.lock().unwrap().push(text.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(DubError::unavailable("translate", "502 Bad Gateway"));
        }
        Ok(text.to_uppercase())
    }
}

/// Produces audio lasting `ms_per_word` per word of input
pub struct FakeSynthesizer {
    media: Arc<FakeMedia>,
    pub ms_per_word: AtomicU64,
    pub fail: AtomicBool,
    /// Output paths containing one of these fail
    pub failing_outputs: Mutex<Vec<String>>,
    /// Output paths containing one of these panic
    pub panicking_outputs: Mutex<Vec<String>>,
    pub requests: Mutex<Vec<(String, Voice)>>,
}

impl FakeSynthesizer {
    pub fn fail_on(&self, needle: &str) {
        self.failing_outputs.lock().unwrap().push(needle.to_string());
    }

    pub fn panic_on(&self, needle: &str) {
        self.panicking_outputs.lock().unwrap().push(needle.to_string());
    }
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str, voice: &Voice, out: &Path) -> Result<PathBuf> {
        self.requests
            .lock()
            .unwrap()
            .push((text.to_string(), voice.clone()));
        let crashes = self.panicking_outputs.lock().unwrap().iter().any(|n| matches(out, n));
        if crashes {
            panic!("synthesizer crashed on {}", out.display());
        }
        let targeted = self.failing_outputs.lock().unwrap().iter().any(|n| matches(out, n));
        if targeted || self.fail.load(Ordering::SeqCst) {
            return Err(DubError::unavailable("tts", "429 Too Many Requests"));
        }
        let words = text.split_whitespace().count().max(1) as u64;
        self.media
            .write(out, words * self.ms_per_word.load(Ordering::SeqCst))
    }
}

/// All fakes wired together, sharing one virtual media table
pub struct FakeBackends {
    pub media: Arc<FakeMedia>,
    pub diarizer: Arc<FakeDiarizer>,
    pub separator: Arc<FakeSeparator>,
    pub classifier: Arc<FakeClassifier>,
    pub transcriber: Arc<FakeTranscriber>,
    pub translator: Arc<FakeTranslator>,
    pub synthesizer: Arc<FakeSynthesizer>,
}

impl FakeBackends {
    /// Source of `source_ms` with the given diarization; every chunk is
    /// heard as female English speech and synthesized at 300ms per word.
    pub fn new(source_ms: u64, turns: Vec<SpeakerTurn>) -> Self {
        let media = Arc::new(FakeMedia::new(source_ms));
        Self {
            diarizer: Arc::new(FakeDiarizer {
                turns: Mutex::new(turns),
                fail: AtomicBool::new(false),
            }),
            separator: Arc::new(FakeSeparator {
                media: media.clone(),
                stems: AtomicUsize::new(2),
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }),
            classifier: Arc::new(FakeClassifier {
                answers: Mutex::new(Vec::new()),
                default: Mutex::new(GenderEstimate {
                    gender: Gender::Female,
                    confidence: 0.9,
                }),
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }),
            transcriber: Arc::new(FakeTranscriber {
                answers: Mutex::new(Vec::new()),
                default: Mutex::new(Transcription {
                    text: "hello there my friend".to_string(),
                    language: Some("en-IN".to_string()),
                    confidence: 0.9,
                }),
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }),
            translator: Arc::new(FakeTranslator::default()),
            synthesizer: Arc::new(FakeSynthesizer {
                media: media.clone(),
                ms_per_word: AtomicU64::new(300),
                fail: AtomicBool::new(false),
                failing_outputs: Mutex::new(Vec::new()),
                panicking_outputs: Mutex::new(Vec::new()),
                requests: Mutex::new(Vec::new()),
            }),
            media,
        }
    }

    pub fn services(&self) -> Services {
        Services::new(
            Collaborators {
                media: self.media.clone(),
                diarizer: self.diarizer.clone(),
                separator: self.separator.clone(),
                classifier: self.classifier.clone(),
                transcriber: self.transcriber.clone(),
                translator: self.translator.clone(),
                synthesizer: self.synthesizer.clone(),
            },
            fast_retry(),
        )
    }
}
