//! Frame sources feeding the pump.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::SourceError;
use crate::frame::Frame;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// How a source ends.
///
/// A file-backed source running out of frames is a normal end of stream; a
/// live source that stops producing frames has lost its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Live,
}

/// A sequential producer of frames.
pub trait FrameSource: Send {
    /// The next frame, or `None` once the stream is exhausted.
    fn read(&mut self) -> Result<Option<Frame>, SourceError>;

    /// Nominal frames per second, if the source knows it.
    fn nominal_rate(&self) -> Option<f64>;

    fn kind(&self) -> SourceKind;

    /// Drop any held resources. Reads after a release end the stream.
    fn release(&mut self) {}
}

/// Frames decoded one by one from the images of a directory, in file name
/// order.
#[derive(Debug)]
pub struct ImageSequenceSource {
    pending: VecDeque<PathBuf>,
    rate: Option<f64>,
}

impl ImageSequenceSource {
    /// Collect every PNG or JPEG file directly inside `dir`.
    pub fn open(dir: &Path) -> Result<Self, SourceError> {
        let io_err = |source: std::io::Error| SourceError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    IMAGE_EXTENSIONS
                        .iter()
                        .any(|known| ext.eq_ignore_ascii_case(known))
                });
            if is_image && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        debug!(dir = %dir.display(), frames = paths.len(), "image sequence opened");

        Ok(Self {
            pending: paths.into(),
            rate: None,
        })
    }

    pub fn with_rate(mut self, fps: f64) -> Self {
        self.rate = Some(fps);
        self
    }

    /// Frames not yet read.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl FrameSource for ImageSequenceSource {
    fn read(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };
        let image = image::open(&path).map_err(|source| SourceError::Decode {
            path: path.clone(),
            source,
        })?;
        Ok(Some(Frame::from_image(&image)?))
    }

    fn nominal_rate(&self) -> Option<f64> {
        self.rate
    }

    fn kind(&self) -> SourceKind {
        SourceKind::File
    }

    fn release(&mut self) {
        self.pending.clear();
    }
}

/// Frames replayed from memory, behaving as either kind of source.
///
/// An exhausted live replay reports [`SourceError::Disconnected`].
#[derive(Debug)]
pub struct ReplaySource {
    frames: VecDeque<Frame>,
    kind: SourceKind,
    rate: Option<f64>,
}

impl ReplaySource {
    pub fn file(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self::new(frames, SourceKind::File)
    }

    pub fn live(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self::new(frames, SourceKind::Live)
    }

    fn new(frames: impl IntoIterator<Item = Frame>, kind: SourceKind) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            kind,
            rate: None,
        }
    }

    pub fn with_rate(mut self, fps: f64) -> Self {
        self.rate = Some(fps);
        self
    }
}

impl FrameSource for ReplaySource {
    fn read(&mut self) -> Result<Option<Frame>, SourceError> {
        match (self.frames.pop_front(), self.kind) {
            (Some(frame), _) => Ok(Some(frame)),
            (None, SourceKind::File) => Ok(None),
            (None, SourceKind::Live) => Err(SourceError::Disconnected),
        }
    }

    fn nominal_rate(&self) -> Option<f64> {
        self.rate
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn release(&mut self) {
        self.frames.clear();
    }
}
