pub mod check;
pub mod probe;
pub mod stitch;

use std::path::PathBuf;

use clipstitch_model::MediaBlob;

/// Read every path into a named blob.
pub fn load_clips(paths: &[PathBuf]) -> anyhow::Result<Vec<MediaBlob>> {
    paths
        .iter()
        .map(|path| {
            MediaBlob::from_path(path)
                .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))
        })
        .collect()
}
