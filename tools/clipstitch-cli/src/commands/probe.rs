//! Show clip metadata as JSON.

use std::path::PathBuf;

use clipstitch_common::config::AppConfig;
use clipstitch_engine::probe::probe_clips;
use clipstitch_engine::{MediaProbe, StitchSettings};
use clipstitch_gst::GstBackend;
use serde_json::json;

use super::load_clips;

pub async fn run(config: &AppConfig, clips: Vec<PathBuf>) -> anyhow::Result<()> {
    let blobs = load_clips(&clips)?;
    let settings = StitchSettings::from_defaults(&config.stitch);
    let backend = GstBackend::new()?;

    let mut per_clip = Vec::with_capacity(blobs.len());
    for (path, blob) in clips.iter().zip(&blobs) {
        let entry = match backend.probe(blob).await {
            Ok(meta) => json!({ "path": path, "metadata": meta }),
            Err(e) => json!({ "path": path, "error": e.to_string() }),
        };
        per_clip.push(entry);
    }

    let aggregate = probe_clips(&backend, &blobs, &settings).await?;
    let report = json!({ "clips": per_clip, "aggregate": aggregate });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
