//! Shared GStreamer plumbing: init, launch strings, bus waits, temp files.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use clipstitch_common::error::{StitchError, StitchResult};
use clipstitch_model::MediaBlob;
use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;

/// How long to wait for a pipeline to preroll or drain.
pub(crate) const PIPELINE_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn init_gstreamer() -> StitchResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    let init_res = GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string()));
    match init_res {
        Ok(()) => Ok(()),
        Err(e) => Err(StitchError::backend(format!(
            "Failed to initialize GStreamer: {e}"
        ))),
    }
}

/// Parse a launch description into a pipeline.
pub(crate) fn launch(name: &str, description: &str) -> StitchResult<gst::Pipeline> {
    init_gstreamer()?;
    tracing::debug!(pipeline = name, launch = description, "Building pipeline");

    let element = gst::parse::launch(description)
        .map_err(|e| StitchError::backend(format!("Failed to build {name} pipeline: {e}")))?;
    element
        .dynamic_cast::<gst::Pipeline>()
        .map_err(|_| StitchError::backend(format!("{name} launch did not produce a pipeline")))
}

pub(crate) fn element(pipeline: &gst::Pipeline, name: &str) -> StitchResult<gst::Element> {
    pipeline
        .by_name(name)
        .ok_or_else(|| StitchError::backend(format!("Pipeline has no element named {name}")))
}

pub(crate) fn app_sink(pipeline: &gst::Pipeline, name: &str) -> StitchResult<gst_app::AppSink> {
    element(pipeline, name)?
        .downcast::<gst_app::AppSink>()
        .map_err(|_| StitchError::backend(format!("{name} is not an appsink")))
}

pub(crate) fn app_src(pipeline: &gst::Pipeline, name: &str) -> StitchResult<gst_app::AppSrc> {
    element(pipeline, name)?
        .downcast::<gst_app::AppSrc>()
        .map_err(|_| StitchError::backend(format!("{name} is not an appsrc")))
}

pub(crate) fn set_state(pipeline: &gst::Pipeline, state: gst::State) -> StitchResult<()> {
    pipeline
        .set_state(state)
        .map(|_| ())
        .map_err(|e| StitchError::backend(format!("Failed to set pipeline to {state:?}: {e:?}")))
}

/// Stop a pipeline, logging instead of failing.
pub(crate) fn shutdown(pipeline: &gst::Pipeline, name: &str) {
    if let Err(e) = pipeline.set_state(gst::State::Null) {
        tracing::warn!(pipeline = name, error = ?e, "Failed to stop pipeline");
    }
}

/// Terminate a dynamic pad in a fakesink so it never blocks preroll.
pub(crate) fn discard_pad(pipeline: &gst::Pipeline, pad: &gst::Pad) {
    let sink = match gst::ElementFactory::make("fakesink")
        .property("sync", false)
        .build()
    {
        Ok(sink) => sink,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create fakesink");
            return;
        }
    };
    if pipeline.add(&sink).is_err() {
        return;
    }
    let _ = sink.sync_state_with_parent();
    if let Some(sink_pad) = sink.static_pad("sink") {
        if let Err(e) = pad.link(&sink_pad) {
            tracing::debug!(error = ?e, "Failed to link pad to fakesink");
        }
    }
}

/// Media type name of a pad's caps, e.g. `video/x-raw`.
pub(crate) fn pad_media_type(pad: &gst::Pad) -> Option<String> {
    let caps = pad.current_caps().unwrap_or_else(|| pad.query_caps(None));
    caps.structure(0).map(|s| s.name().to_string())
}

/// Where a newly exposed decoder pad goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PadRoute {
    /// Feed the processing branch.
    Branch,
    /// Any other stream, or a second stream of the wanted kind.
    Discard,
}

/// Route the first pad of the wanted media kind into the branch, whatever
/// order the demuxer exposes streams in.
pub(crate) fn route_pad(media_type: &str, wanted_prefix: &str, branch_linked: bool) -> PadRoute {
    if media_type.starts_with(wanted_prefix) && !branch_linked {
        PadRoute::Branch
    } else {
        PadRoute::Discard
    }
}

/// Link `decoder`'s first `wanted_prefix` pad to the sink pad of `branch`
/// as pads appear. Every other pad ends in a fakesink. `decoder` must be a
/// `decodebin`.
pub(crate) fn link_first_pad(
    pipeline: &gst::Pipeline,
    decoder: &str,
    branch: &str,
    wanted_prefix: &'static str,
) -> StitchResult<()> {
    let decoder = element(pipeline, decoder)?;
    let branch_pad = element(pipeline, branch)?
        .static_pad("sink")
        .ok_or_else(|| StitchError::backend(format!("{branch} has no sink pad")))?;
    let pipeline_weak = pipeline.downgrade();
    let branch_linked = Arc::new(Mutex::new(false));

    // Without a matching stream the branch would wait forever; end it instead.
    let idle_pad = branch_pad.clone();
    let idle_linked = branch_linked.clone();
    decoder.connect_no_more_pads(move |_dec| {
        if idle_linked.lock().map(|linked| !*linked).unwrap_or(false) {
            tracing::debug!(wanted = wanted_prefix, "Decoder exposed no matching stream");
            let _ = idle_pad.send_event(gst::event::Eos::new());
        }
    });

    decoder.connect_pad_added(move |_dec, pad| {
        let Some(pipeline) = pipeline_weak.upgrade() else {
            return;
        };
        let media_type = pad_media_type(pad).unwrap_or_default();
        let Ok(mut linked) = branch_linked.lock() else {
            return;
        };
        match route_pad(&media_type, wanted_prefix, *linked) {
            PadRoute::Branch => match pad.link(&branch_pad) {
                Ok(_) => *linked = true,
                Err(e) => {
                    tracing::warn!(error = ?e, media_type = %media_type, "Failed to link decoder pad")
                }
            },
            PadRoute::Discard => {
                tracing::debug!(media_type = %media_type, "Discarding decoder pad");
                discard_pad(&pipeline, pad);
            }
        }
    });
    Ok(())
}

/// Outcome of waiting on a pipeline bus.
#[derive(Debug)]
pub(crate) enum BusOutcome {
    /// One of the awaited message types arrived.
    Reached(gst::Message),
    /// The pipeline posted an error.
    Failed(String),
    TimedOut,
}

/// Block until one of `types` (or an error) is posted, or `timeout` passes.
///
/// `on_message` sees every other message, e.g. to collect tags.
pub(crate) fn wait_for(
    pipeline: &gst::Pipeline,
    types: &[gst::MessageType],
    timeout: Duration,
    mut on_message: impl FnMut(&gst::Message),
) -> BusOutcome {
    let Some(bus) = pipeline.bus() else {
        return BusOutcome::Failed("pipeline has no bus".to_string());
    };

    let start = std::time::Instant::now();
    loop {
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return BusOutcome::TimedOut;
        }
        let remaining = gst::ClockTime::from_nseconds((timeout - elapsed).as_nanos() as u64);
        let Some(msg) = bus.timed_pop(remaining) else {
            return BusOutcome::TimedOut;
        };

        if let gst::MessageView::Error(e) = msg.view() {
            let source = e
                .src()
                .map(|s| s.path_string().to_string())
                .unwrap_or_else(|| "pipeline".to_string());
            return BusOutcome::Failed(format!("{source}: {}", e.error()));
        }
        if types.contains(&msg.type_()) {
            return BusOutcome::Reached(msg);
        }
        on_message(&msg);
    }
}

/// First error already posted on the bus, if any.
pub(crate) fn pending_error(pipeline: &gst::Pipeline) -> Option<String> {
    let bus = pipeline.bus()?;
    let msg = bus.pop_filtered(&[gst::MessageType::Error])?;
    match msg.view() {
        gst::MessageView::Error(e) => Some(e.error().to_string()),
        _ => None,
    }
}

pub(crate) fn escape_path(path: &Path) -> String {
    path.to_string_lossy().replace('"', "\\\"")
}

/// A uniquely named file in the temp dir, removed on drop.
#[derive(Debug)]
pub(crate) struct TempMedia {
    path: PathBuf,
}

impl TempMedia {
    /// A fresh path with nothing written to it yet.
    pub(crate) fn reserve(kind: &str, extension: &str) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "clipstitch-{}-{kind}-{n}.{extension}",
            std::process::id()
        ));
        Self { path }
    }

    /// Write a blob to a fresh temp file so file-based elements can read it.
    pub(crate) fn materialize(blob: &MediaBlob, kind: &str) -> StitchResult<Self> {
        let file = Self::reserve(kind, "bin");
        std::fs::write(&file.path, blob.bytes())?;
        tracing::trace!(path = %file.path.display(), blob = %blob.label(), "Materialized blob");
        Ok(file)
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempMedia {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove temp file")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_pad_exposed_before_video_is_discarded() {
        assert_eq!(route_pad("audio/x-raw", "video/", false), PadRoute::Discard);
        assert_eq!(route_pad("video/x-raw", "video/", false), PadRoute::Branch);
        assert_eq!(route_pad("video/x-raw", "video/", true), PadRoute::Discard);
        assert_eq!(route_pad("", "video/", false), PadRoute::Discard);
    }

    #[test]
    fn test_soundtrack_from_video_file_takes_audio_pad() {
        assert_eq!(route_pad("video/x-raw", "audio/", false), PadRoute::Discard);
        assert_eq!(route_pad("audio/x-raw", "audio/", false), PadRoute::Branch);
    }

    #[test]
    fn test_escape_path_quotes() {
        assert_eq!(escape_path(Path::new("/tmp/a\"b.mp4")), "/tmp/a\\\"b.mp4");
    }

    #[test]
    fn test_temp_media_is_unique_and_removed() {
        let blob = MediaBlob::new(vec![1u8, 2, 3]);
        let a = TempMedia::materialize(&blob, "clip").unwrap();
        let b = TempMedia::materialize(&blob, "clip").unwrap();
        assert_ne!(a.path(), b.path());
        assert_eq!(std::fs::read(a.path()).unwrap(), vec![1, 2, 3]);

        let path = a.path().to_path_buf();
        drop(a);
        assert!(!path.exists());
    }
}
