//! Trimming and WAV export of the main buffer.
//!
//! Trim is sample-accurate: selection bounds are rounded to the nearest
//! frame and the kept range is copied into a fresh buffer. Export renders the
//! main buffer through the same clip source used for real-time playback
//! (unity gain, no fade) and encodes the result as 16-bit PCM WAV.

use crate::audio::buffer::SampleBuffer;
use crate::audio::playback::{Clip, ClipSource};
use crate::audio::store::BufferStore;
use crate::audio::wav::encode_wav;
use crate::error::{EditError, ExportError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Samples pulled from the renderer between progress reports.
const RENDER_BUFFER_SIZE: usize = 4096;

/// Replaces the main buffer with the selected range.
///
/// The playhead is rewound and the selection cleared. A zero-length
/// selection produces an empty buffer.
///
/// # Errors
///
/// Returns [`EditError::NoSelection`] if nothing is selected; the store is
/// left untouched.
pub fn trim(store: &mut BufferStore) -> Result<(), EditError> {
    let selection = store.selection().ok_or(EditError::NoSelection)?;
    let main = store.main().ok_or(EditError::NoBuffer)?;

    let start = main.frame_at(selection.start);
    let end = main.frame_at(selection.end);
    let trimmed = main.slice(start, end);

    tracing::info!(
        start_frame = start,
        end_frame = end,
        duration = trimmed.duration(),
        "trimmed main buffer"
    );
    store.replace_main(trimmed);
    Ok(())
}

/// Renders `buffer` offline at unity gain.
///
/// # Arguments
///
/// * `buffer` - The buffer to render
/// * `progress_callback` - Optional callback for progress updates (0.0 to 1.0)
pub fn render_offline<F>(buffer: &Arc<SampleBuffer>, mut progress_callback: Option<F>) -> SampleBuffer
where
    F: FnMut(f32),
{
    let channel_count = buffer.channel_count();
    let total_samples = buffer.frames() * channel_count;
    let clip = Clip::frames(Arc::clone(buffer), 0, buffer.frames(), 1.0, Duration::ZERO);
    let mut source = ClipSource::new(clip);

    let mut samples = Vec::with_capacity(total_samples);
    loop {
        let before = samples.len();
        samples.extend(source.by_ref().take(RENDER_BUFFER_SIZE));
        if let Some(ref mut callback) = progress_callback {
            if total_samples > 0 {
                callback(samples.len() as f32 / total_samples as f32);
            }
        }
        if samples.len() - before < RENDER_BUFFER_SIZE {
            break;
        }
    }

    SampleBuffer::from_interleaved(buffer.sample_rate(), channel_count, &samples)
}

/// Name of the exported file for a recording.
pub fn export_filename(loaded: Option<&str>) -> String {
    format!("edited_{}.wav", loaded.unwrap_or("audio"))
}

/// Receives finished exports.
pub trait ExportSink {
    /// Stores `bytes` under `filename`, returning where they went.
    fn save(&mut self, filename: &str, bytes: &[u8]) -> Result<PathBuf, ExportError>;
}

/// Writes exports into a directory.
pub struct DownloadDir {
    dir: PathBuf,
}

impl DownloadDir {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl ExportSink for DownloadDir {
    fn save(&mut self, filename: &str, bytes: &[u8]) -> Result<PathBuf, ExportError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(filename);
        std::fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// A completed export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub filename: String,
    pub path: PathBuf,
    pub size: usize,
}

/// Renders, encodes and hands the main buffer to `sink`.
///
/// Once the sink has stored the file, `notify` receives the same bytes and
/// filename.
///
/// # Errors
///
/// Returns [`ExportError::NoBuffer`] when nothing is loaded, or the sink's
/// error if the bytes could not be stored. `notify` is not called on error.
pub fn export<F>(
    store: &BufferStore,
    sink: &mut dyn ExportSink,
    notify: Option<F>,
) -> Result<ExportedFile, ExportError>
where
    F: FnMut(&[u8], &str),
{
    let main = store.main().ok_or(ExportError::NoBuffer)?;
    let rendered = render_offline(main, None::<fn(f32)>);
    let bytes = encode_wav(&rendered);
    let filename = export_filename(store.main_name());

    let path = sink.save(&filename, &bytes)?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "exported audio");
    if let Some(mut notify) = notify {
        notify(&bytes, &filename);
    }
    Ok(ExportedFile {
        filename,
        path,
        size: bytes.len(),
    })
}
