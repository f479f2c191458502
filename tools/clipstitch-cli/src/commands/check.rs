//! Check encoder availability and, given clips, whether their output is encodable.

use std::path::PathBuf;

use clipstitch_common::config::AppConfig;
use clipstitch_engine::{check_device_support, StitchSettings};
use clipstitch_gst::{capability, GstBackend};

use super::load_clips;

pub async fn run(config: &AppConfig, clips: Vec<PathBuf>) -> anyhow::Result<()> {
    println!("ClipStitch System Check");
    println!("{}", "=".repeat(50));

    let backend = GstBackend::new()?;
    println!("[OK] GStreamer initialized");

    for (name, available) in capability::element_report() {
        if available {
            println!("[OK] Element: {name}");
        } else {
            println!("[--] Element: {name} (not installed)");
        }
    }

    if clips.is_empty() {
        println!();
        println!("Pass clips to check a specific output configuration.");
        return Ok(());
    }

    let settings = StitchSettings::from_defaults(&config.stitch);
    let blobs = load_clips(&clips)?;
    println!();
    match check_device_support(&backend, &blobs, &settings).await {
        Ok(report) => {
            let p = &report.params;
            println!(
                "[OK] Output: {}x{} @ {} fps, {} kbps, {}, rotation {} deg",
                p.width,
                p.height,
                p.frame_rate,
                p.bitrate / 1000,
                p.codec_profile.codec_string(),
                p.rotation.degrees()
            );
            println!(
                "     Probed {}/{} clips, {:.1}s total",
                report.metadata.probed_clips(),
                blobs.len(),
                report.metadata.total_duration_secs
            );
            println!();
            println!("This device can stitch these clips.");
            Ok(())
        }
        Err(e) => {
            println!("[FAIL] {e}");
            println!();
            println!("This device cannot stitch these clips.");
            Err(e.into())
        }
    }
}
