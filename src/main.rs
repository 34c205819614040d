//! Консольная утилита narration-sync
//!
//! Использование:
//!
//! ```text
//! narration-sync <segments.json> <output_dir> [config.json]
//! ```
//!
//! `segments.json` - массив объектов `{"id": "...", "text": "...", "start": 1.5, "end": 4.0}`
//! (поле `id` необязательно). В `output_dir` записываются подогнанные
//! фрагменты `<id>.mp3` и отчёт `report.json`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use narration_sync::config::NarrationSyncConfig;
use narration_sync::notification::{
    CallbackProgressObserver, CompositeProgressObserver, LogProgressObserver,
    MemoryProgressObserver,
};
use narration_sync::pipeline::{OutcomeSummary, PipelineOutcome};
use narration_sync::progress::{progress_channel, spawn_observer, ProgressInfo, ProgressUpdate};
use narration_sync::segment::Segment;
use narration_sync::utils::ffmpeg;
use narration_sync::NarrationSync;

/// Сегмент во входном файле
#[derive(Debug, Deserialize)]
struct InputSegment {
    #[serde(default)]
    id: Option<String>,
    text: String,
    start: f64,
    end: f64,
}

impl From<InputSegment> for Segment {
    fn from(input: InputSegment) -> Self {
        match input.id {
            Some(id) => Segment::with_id(id, input.text, input.start, input.end),
            None => Segment::new(input.text, input.start, input.end),
        }
    }
}

/// Отчёт о запуске
#[derive(Debug, Serialize)]
struct Report<'a> {
    summary: OutcomeSummary,
    segments: &'a [Segment],
    progress: Vec<ProgressInfo>,
}

fn load_segments(path: &Path) -> Result<Vec<Segment>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read segments from {}", path.display()))?;
    let input: Vec<InputSegment> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse segments from {}", path.display()))?;
    Ok(input.into_iter().map(Segment::from).collect())
}

fn load_config(path: Option<&Path>) -> Result<NarrationSyncConfig> {
    let config = match path {
        Some(path) => NarrationSyncConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => NarrationSyncConfig::default(),
    };
    Ok(config.with_env_overrides())
}

async fn write_outputs(
    outcome: &PipelineOutcome,
    progress: Vec<ProgressInfo>,
    output_dir: &Path,
) -> Result<()> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    for segment in outcome.assemblable() {
        let Some(audio) = &segment.fitted_audio else {
            log::warn!("Segment {} has no fitted audio, skipping", segment.id);
            continue;
        };
        let path = output_dir.join(format!("{}.mp3", segment.id));
        tokio::fs::write(&path, audio)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let report = Report {
        summary: outcome.summary(),
        segments: &outcome.segments,
        progress,
    };
    let report_path = output_dir.join("report.json");
    tokio::fs::write(&report_path, serde_json::to_vec_pretty(&report)?)
        .await
        .with_context(|| format!("Failed to write {}", report_path.display()))?;
    log::info!("Report written to {}", report_path.display());
    Ok(())
}

/// Лог, строка процента в stderr и история для отчёта
fn cli_observer(timeline: MemoryProgressObserver) -> CompositeProgressObserver {
    let mut observers = CompositeProgressObserver::new();
    observers.add_observer(Box::new(LogProgressObserver::with_prefix("[narration] ")));
    observers.add_observer(Box::new(timeline));
    observers.add_observer(Box::new(CallbackProgressObserver::new(
        |info: ProgressInfo| match info.update {
            ProgressUpdate::Overall { percent, .. } => eprint!("\r{:5.1}%", percent),
            ProgressUpdate::Finished => eprintln!(),
            ProgressUpdate::Batch { .. } => {}
        },
    )));
    observers
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        bail!("Usage: {} <segments.json> <output_dir> [config.json]", args[0]);
    }
    let segments_path = PathBuf::from(&args[1]);
    let output_dir = PathBuf::from(&args[2]);
    let config_path = args.get(3).map(PathBuf::from);

    if !ffmpeg::check_ffmpeg_installed().await {
        bail!("ffmpeg is not installed or not in PATH");
    }
    if let Some(version) = ffmpeg::get_ffmpeg_version().await {
        log::debug!("Using {}", version);
    }

    let config = load_config(config_path.as_deref())?;
    let segments = load_segments(&segments_path)?;
    let narration = NarrationSync::new(config)?;

    let timeline = MemoryProgressObserver::new();
    let (tx, rx) = progress_channel();
    let observer = spawn_observer(rx, Arc::new(cli_observer(timeline.clone())));

    let outcome = narration.process(segments, Some(&tx)).await;
    drop(tx);
    observer.await.context("Progress observer task failed")?;
    let outcome = outcome?;

    write_outputs(&outcome, timeline.history(), &output_dir).await?;

    let summary = outcome.summary();
    println!(
        "Done: {} fitted, {} forced, {} failed of {}",
        summary.fitted, summary.forced_fit, summary.failed, summary.total
    );
    for segment in outcome.failed() {
        println!(
            "  {}: {}",
            segment.id,
            segment.last_error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
