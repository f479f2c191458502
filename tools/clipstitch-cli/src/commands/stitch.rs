//! Stitch clips and an optional soundtrack into one MP4.

use std::io::Write;
use std::path::PathBuf;

use clipstitch_common::config::AppConfig;
use clipstitch_engine::{stitch_videos, StitchRequest, StitchSettings};
use clipstitch_gst::GstBackend;
use clipstitch_model::{AudioProcessingOptions, MediaBlob, StitchProgress, StitchStatus};

use super::load_clips;

/// Soundtrack placement flags.
pub struct AudioArgs {
    pub offset: f64,
    pub fade_in: f64,
    pub fade_out: f64,
}

pub async fn run(
    config: &AppConfig,
    clips: Vec<PathBuf>,
    audio: Option<PathBuf>,
    audio_args: AudioArgs,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let output = output.unwrap_or_else(default_output_path);
    let settings = StitchSettings::from_defaults(&config.stitch);

    let mut request = StitchRequest::new(load_clips(&clips)?);
    if let Some(audio_path) = audio {
        let blob = MediaBlob::from_path(&audio_path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", audio_path.display()))?;
        request = request.with_audio(
            blob,
            AudioProcessingOptions {
                offset_secs: audio_args.offset,
                fade_in_secs: audio_args.fade_in.max(0.0),
                fade_out_secs: audio_args.fade_out.max(0.0),
            },
        );
    }

    println!("Stitching {} clip(s)", request.clips.len());
    println!("  Frame rate: {} fps", settings.frame_rate.fps());
    println!("  Output: {}", output.display());
    println!();

    let backend = GstBackend::new()?;
    let report: &(dyn Fn(StitchProgress) + Send + Sync) = &|p| print_progress(&p);
    let result = stitch_videos(&backend, &request, &settings, Some(report)).await?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&output, &result.bytes)?;

    println!();
    println!(
        "Wrote {} ({:.1} MB)",
        output.display(),
        result.len() as f64 / 1_048_576.0
    );
    Ok(())
}

fn print_progress(progress: &StitchProgress) {
    match progress.status {
        StitchStatus::Processing => {
            let clip = match (progress.current_clip_index, progress.total_clips) {
                (Some(i), Some(n)) => format!(" [clip {}/{n}]", i + 1),
                _ => String::new(),
            };
            print!(
                "\r  Progress: {:5.1}%{clip} {:<40}",
                progress.progress, progress.message
            );
            let _ = std::io::stdout().flush();
        }
        StitchStatus::Complete => println!("\r  Progress: 100.0% {:<40}", progress.message),
        StitchStatus::Error => println!(
            "\n  Failed: {}",
            progress.error.as_deref().unwrap_or(&progress.message)
        ),
        StitchStatus::Idle => {}
    }
}

fn default_output_path() -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    PathBuf::from(format!("stitched-{stamp}.mp4"))
}
