use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use autodub::models::chunk_spans;
use autodub::{
    Collaborators, DubConfig, FfmpegTool, Gender, JobRegistry, JobRequest, JobStatus,
    ModelSidecar, Pipeline, SarvamClient, SarvamConfig, SegmentConfig, Services, Stage,
    analyze_turns, format_timestamp, load_turns_file, plan_segments,
};

#[derive(Parser)]
#[command(name = "autodub")]
#[command(author, version, about = "Automatic video dubbing pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dub a video into the target language
    Dub {
        /// Source video
        #[arg(short, long)]
        input: PathBuf,

        /// Target language code (e.g. hi-IN)
        #[arg(short, long)]
        target: String,

        /// Source language hint for transcription
        #[arg(short, long)]
        source: Option<String>,

        /// Voice gender for speakers the classifier cannot decide on
        #[arg(long)]
        gender: Option<Gender>,

        /// Output video (defaults to the job work directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Root directory for job artifacts
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Chunk length in milliseconds
        #[arg(long)]
        chunk_ms: Option<u64>,

        /// Maximum number of chunks processed at once
        #[arg(long)]
        max_concurrency: Option<usize>,

        /// Model sidecar command line (overrides AUTODUB_SIDECAR)
        #[arg(long)]
        sidecar: Option<String>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show segmentation and chunking for a diarization file without dubbing
    Plan {
        /// Diarization turns (JSON)
        #[arg(short, long)]
        turns: PathBuf,

        /// Source duration in milliseconds (defaults to the last turn end)
        #[arg(long)]
        duration_ms: Option<u64>,

        /// Chunk length in milliseconds
        #[arg(long, default_value = "5000")]
        chunk_ms: u64,

        /// Padding around each turn in milliseconds
        #[arg(long, default_value = "100")]
        padding_ms: u64,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

struct DubArgs {
    input: PathBuf,
    target: String,
    source: Option<String>,
    gender: Option<Gender>,
    output: Option<PathBuf>,
    work_dir: Option<PathBuf>,
    chunk_ms: Option<u64>,
    max_concurrency: Option<usize>,
    sidecar: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Dub {
            input,
            target,
            source,
            gender,
            output,
            work_dir,
            chunk_ms,
            max_concurrency,
            sidecar,
            verbose,
        } => {
            setup_logging(verbose);
            dub(DubArgs {
                input,
                target,
                source,
                gender,
                output,
                work_dir,
                chunk_ms,
                max_concurrency,
                sidecar,
            })
            .await
        }
        Commands::Plan {
            turns,
            duration_ms,
            chunk_ms,
            padding_ms,
            verbose,
        } => {
            setup_logging(verbose);
            plan(turns, duration_ms, chunk_ms, padding_ms)
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

/// Wire the production collaborators
fn build_services(sidecar: Option<&str>, config: &DubConfig) -> Result<Services> {
    let sidecar = Arc::new(match sidecar {
        Some(command) => ModelSidecar::from_command_line(command)?,
        None => ModelSidecar::from_env()?,
    });
    let sarvam = Arc::new(SarvamClient::new(
        SarvamConfig::from_env().context("Speech API is not configured")?,
    ));

    let collaborators = Collaborators {
        media: Arc::new(FfmpegTool::from_env()),
        diarizer: sidecar.clone(),
        separator: sidecar.clone(),
        classifier: sidecar,
        transcriber: sarvam.clone(),
        translator: sarvam.clone(),
        synthesizer: sarvam,
    };
    Ok(Services::new(collaborators, config.retry.clone()))
}

async fn dub(args: DubArgs) -> Result<()> {
    let mut config = DubConfig::from_env();
    if let Some(dir) = args.work_dir {
        config.work_dir = dir;
    }
    if let Some(ms) = args.chunk_ms {
        config.segment.chunk_ms = ms.max(1);
    }
    if let Some(n) = args.max_concurrency {
        config.max_concurrent_chunks = n.max(1);
    }

    let services = build_services(args.sidecar.as_deref(), &config)?;
    let registry = JobRegistry::new(Pipeline::new(Arc::new(services), config));

    let mut request = JobRequest::new(args.input, args.target);
    request.source_language = args.source;
    request.gender_hint = args.gender;
    request.output = args.output;
    let id = registry.submit(request).context("Job rejected")?;
    let mut updates = registry
        .subscribe(id)
        .context("Submitted job is not tracked")?;

    let mut current: Option<Stage> = None;
    let status = loop {
        let status = updates.borrow_and_update().clone();
        if let JobStatus::Running { stage } = &status {
            if current != Some(*stage) {
                info!("Job {}: {}", id, stage);
                current = Some(*stage);
            }
        }
        if status.is_terminal() {
            break status;
        }
        tokio::select! {
            changed = updates.changed() => changed.context("Job tracking stopped")?,
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cancelling job {}", id);
                registry.cancel(id);
            }
        }
    };

    match status {
        JobStatus::Complete { output, quality } => {
            info!("Output written to {:?}", output);
            info!(
                "Complete: {} chunks ({} pauses), {} degraded ({} silent, {} untranslated, {} truncated), {} segments dropped, {} silenced, {} overlaps mixed, {} lost",
                quality.total_chunks,
                quality.pauses,
                quality.degraded_chunks,
                quality.null_audio,
                quality.kept_original,
                quality.truncated,
                quality.dropped_segments,
                quality.silenced_segments,
                quality.overlaid_segments,
                quality.lost_overlaps
            );
            Ok(())
        }
        JobStatus::Failed { stage, cause } => bail!("Job {} failed at {}: {}", id, stage, cause),
        JobStatus::Cancelled => bail!("Job {} cancelled", id),
        other => bail!("Job {} ended in unexpected state {}", id, other.label()),
    }
}

fn plan(turns_path: PathBuf, duration_ms: Option<u64>, chunk_ms: u64, padding_ms: u64) -> Result<()> {
    info!("Loading turns from {:?}", turns_path);
    let turns = load_turns_file(&turns_path).context("Failed to parse diarization turns")?;
    let diarized = analyze_turns(turns);
    let duration_ms =
        duration_ms.unwrap_or_else(|| diarized.turns.iter().map(|t| t.end_ms).max().unwrap_or(0));
    let config = SegmentConfig {
        padding_ms,
        chunk_ms: chunk_ms.max(1),
        ..SegmentConfig::default()
    };
    let segments = plan_segments(&diarized.turns, duration_ms, &config);

    println!("Diarization Plan");
    println!("================");
    println!("Turns: {}", diarized.turns.len());
    println!("Speakers: {:?}", diarized.speakers);
    println!("Duration: {:.1}s", duration_ms as f64 / 1000.0);
    println!();

    println!("Overlap Regions");
    println!("---------------");
    if diarized.overlap_regions.is_empty() {
        println!("(none, separation will be skipped)");
    }
    for region in &diarized.overlap_regions {
        println!(
            "[{} - {}] {}ms",
            format_timestamp(region.start_ms),
            format_timestamp(region.end_ms),
            region.duration_ms()
        );
    }
    println!();

    println!("Segments");
    println!("--------");
    let mut total_chunks = 0;
    for segment in &segments {
        let spans = chunk_spans(segment.start_ms, segment.end_ms, config.chunk_ms);
        total_chunks += spans.len();
        let lengths: Vec<String> = spans.iter().map(|(s, e)| (e - s).to_string()).collect();
        println!(
            "{} {} [{} - {}] {} chunks ({}ms){}",
            segment.segment_id,
            segment.speaker,
            format_timestamp(segment.start_ms),
            format_timestamp(segment.end_ms),
            spans.len(),
            lengths.join(" + "),
            if segment.overlap { " overlap" } else { "" }
        );
    }
    println!();
    println!(
        "{} segments ({} turns skipped), {} chunks",
        segments.len(),
        diarized.turns.len() - segments.len(),
        total_chunks
    );

    Ok(())
}
