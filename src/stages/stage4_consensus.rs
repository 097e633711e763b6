//! Speaker consistency aggregation.
//!
//! Every segment long enough to judge casts one gender vote for its speaker.
//! The per-speaker majority becomes the canonical gender that all of that
//! speaker's chunks are voiced with.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::config::ConsensusConfig;
use crate::models::{Gender, GenderVote, Segment, SpeakerProfile, SpeakerVoice};
use crate::services::Services;

/// Winning gender with its mean confidence and valid vote count
#[derive(Debug, Clone, PartialEq)]
pub struct Consensus {
    pub gender: Gender,
    pub confidence: f64,
    pub votes: usize,
}

/// Majority gender among valid votes.
///
/// A vote is valid when it names a known gender and was computed on at least
/// `min_vote_ms` of audio. Ties go to the higher mean confidence, then to
/// the gender that sorts first.
pub fn canonical_gender(votes: &[GenderVote], min_vote_ms: u64) -> Option<Consensus> {
    let mut tally: BTreeMap<Gender, (usize, f64)> = BTreeMap::new();
    for vote in votes
        .iter()
        .filter(|v| v.gender.is_known() && v.audio_ms >= min_vote_ms)
    {
        let entry = tally.entry(vote.gender).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += vote.confidence;
    }

    tally
        .into_iter()
        .map(|(gender, (count, total))| Consensus {
            gender,
            confidence: total / count as f64,
            votes: count,
        })
        .reduce(|best, next| {
            let better = next.votes > best.votes
                || (next.votes == best.votes && next.confidence > best.confidence);
            if better { next } else { best }
        })
}

/// Commit a canonical gender for every speaker; speakers without a valid
/// vote get `fallback`.
pub fn build_profile(
    speakers: &[String],
    votes: &BTreeMap<String, Vec<GenderVote>>,
    min_vote_ms: u64,
    fallback: Gender,
) -> SpeakerProfile {
    let mut profile = SpeakerProfile::default();
    for speaker in speakers {
        let speaker_votes = votes.get(speaker).map(Vec::as_slice).unwrap_or(&[]);
        let voice = match canonical_gender(speaker_votes, min_vote_ms) {
            Some(consensus) => SpeakerVoice {
                canonical_gender: consensus.gender,
                confidence: consensus.confidence,
                votes: consensus.votes,
            },
            None => SpeakerVoice {
                canonical_gender: fallback,
                confidence: 0.0,
                votes: 0,
            },
        };
        profile.speakers.insert(speaker.clone(), voice);
    }
    profile
}

/// Classify every segment long enough to vote
pub async fn collect_votes(
    services: &Services,
    segments: &[Segment],
    min_vote_ms: u64,
) -> BTreeMap<String, Vec<GenderVote>> {
    let mut votes: BTreeMap<String, Vec<GenderVote>> = BTreeMap::new();
    for segment in segments {
        if segment.duration_ms() < min_vote_ms {
            continue;
        }
        match services.classify(&segment.audio_path).await {
            Ok(estimate) => {
                debug!(
                    "{} ({}): {} {:.2}",
                    segment.segment_id, segment.speaker, estimate.gender, estimate.confidence
                );
                votes.entry(segment.speaker.clone()).or_default().push(GenderVote {
                    gender: estimate.gender,
                    confidence: estimate.confidence,
                    audio_ms: segment.duration_ms(),
                });
            }
            Err(e) => warn!("Vote for {} lost: {}", segment.segment_id, e),
        }
    }
    votes
}

/// Execute Stage 4: build the speaker profile
pub async fn execute_consensus(
    services: &Services,
    speakers: &[String],
    segments: &[Segment],
    config: &ConsensusConfig,
    fallback: Gender,
) -> SpeakerProfile {
    info!("Stage 4: Aggregating gender for {} speakers", speakers.len());
    let votes = collect_votes(services, segments, config.min_vote_ms).await;
    let profile = build_profile(speakers, &votes, config.min_vote_ms, fallback);

    for (speaker, voice) in &profile.speakers {
        info!(
            "Stage 4: {} -> {} ({} votes, {:.2})",
            speaker, voice.canonical_gender, voice.votes, voice.confidence
        );
    }
    profile
}
