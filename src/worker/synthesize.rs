use std::path::PathBuf;

use tracing::{debug, warn};

use crate::config::WorkerConfig;
use crate::models::{Chunk, Gender};
use crate::services::{Services, Voice};
use crate::workspace::JobWorkspace;

/// Whether the text has anything a voice could say
pub fn speakable(text: &str) -> bool {
    text.chars().any(|c| c.is_alphanumeric())
}

/// Relative mismatch between produced and target duration exceeds `tolerance`
pub fn needs_stretch(produced_ms: u64, target_ms: u64, tolerance: f64) -> bool {
    if target_ms == 0 || produced_ms == 0 {
        return false;
    }
    let diff = produced_ms.abs_diff(target_ms) as f64;
    diff / target_ms as f64 > tolerance
}

/// Decompose a speed ratio into factors that each lie in `[min, max]`.
///
/// The product of the returned factors equals `ratio`. An empty chain means
/// no stretch is needed.
pub fn tempo_chain(ratio: f64, min: f64, max: f64) -> Vec<f64> {
    if !ratio.is_finite() || ratio <= 0.0 {
        return Vec::new();
    }
    if min >= 1.0 || max <= 1.0 {
        return vec![ratio.clamp(min, max)];
    }

    let mut chain = Vec::new();
    let mut remaining = ratio;
    while remaining > max {
        chain.push(max);
        remaining /= max;
    }
    while remaining < min {
        chain.push(min);
        remaining /= min;
    }
    if (remaining - 1.0).abs() > 1e-3 {
        chain.push(remaining);
    }
    chain
}

/// Synthesize `text` with the voice for `gender` and stretch it towards the
/// chunk duration.
///
/// Returns `None` when there is nothing to say or synthesis failed; the
/// reassembler renders those spans as silence.
pub async fn synthesize_chunk(
    services: &Services,
    workspace: &JobWorkspace,
    config: &WorkerConfig,
    chunk: &Chunk,
    text: &str,
    gender: Gender,
    language: &str,
) -> Option<PathBuf> {
    if !speakable(text) {
        debug!("{}: nothing to synthesize", chunk.chunk_id);
        return None;
    }

    let voice = Voice {
        name: config.voices.voice_for(gender).to_string(),
        language: language.to_string(),
    };
    let raw = match services
        .synthesize(text, &voice, &workspace.tts_audio(&chunk.chunk_id))
        .await
    {
        Ok(path) => path,
        Err(e) => {
            warn!("{}: synthesis failed: {}", chunk.chunk_id, e);
            return None;
        }
    };

    let target_ms = chunk.duration_ms();
    let produced_ms = match services.probe_duration(&raw).await {
        Ok(ms) => ms,
        Err(e) => {
            warn!("{}: could not measure synthesized audio: {}", chunk.chunk_id, e);
            return Some(raw);
        }
    };
    if !needs_stretch(produced_ms, target_ms, config.stretch_tolerance) {
        return Some(raw);
    }

    let ratio = produced_ms as f64 / target_ms as f64;
    let chain = tempo_chain(ratio, config.min_stretch_factor, config.max_stretch_factor);
    if chain.is_empty() {
        return Some(raw);
    }
    debug!(
        "{}: stretching {}ms to {}ms via {:?}",
        chunk.chunk_id, produced_ms, target_ms, chain
    );
    match services
        .time_stretch(&raw, &chain, &workspace.stretched_audio(&chunk.chunk_id))
        .await
    {
        Ok(path) => Some(path),
        Err(e) => {
            warn!("{}: time stretch failed, keeping raw audio: {}", chunk.chunk_id, e);
            Some(raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(chain: &[f64]) -> f64 {
        chain.iter().product()
    }

    #[test]
    fn test_tempo_chain_within_bounds() {
        for ratio in [0.1, 0.3, 0.5, 0.8, 1.3, 2.0, 3.5, 9.0] {
            let chain = tempo_chain(ratio, 0.5, 2.0);
            assert!(!chain.is_empty(), "{}", ratio);
            assert!(chain.iter().all(|f| (0.5..=2.0).contains(f)), "{:?}", chain);
            assert!((product(&chain) - ratio).abs() < 1e-9, "{} vs {:?}", ratio, chain);
        }
    }

    #[test]
    fn test_tempo_chain_examples() {
        assert_eq!(tempo_chain(3.0, 0.5, 2.0), vec![2.0, 1.5]);
        assert_eq!(tempo_chain(0.25, 0.5, 2.0), vec![0.5, 0.5]);
        assert!(tempo_chain(1.0, 0.5, 2.0).is_empty());
        assert!(tempo_chain(f64::NAN, 0.5, 2.0).is_empty());
    }

    #[test]
    fn test_needs_stretch() {
        assert!(!needs_stretch(5_100, 5_000, 0.05));
        assert!(needs_stretch(6_000, 5_000, 0.05));
        assert!(needs_stretch(3_000, 5_000, 0.05));
        assert!(!needs_stretch(3_000, 0, 0.05));
    }

    #[test]
    fn test_speakable() {
        assert!(speakable("नमस्ते"));
        assert!(speakable("42"));
        assert!(!speakable("..."));
        assert!(!speakable(""));
    }
}
