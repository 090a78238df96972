use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterDiag {
    pub exe: String,
    pub version: Option<String>,
    pub dpi: u32,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum RasterizeError {
    #[error("failed to launch {exe}: {source}")]
    Spawn {
        exe: String,
        #[source]
        source: std::io::Error,
    },
    #[error("rasterizer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("rasterizer exceeded timeout ({0:?})")]
    Timeout(Duration),
    #[error("no pages were rendered")]
    NoPages,
    #[error("decoding rendered page {page}: {source}")]
    Decode {
        page: u32,
        #[source]
        source: image::ImageError,
    },
    #[error("scratch I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl RasterizeError {
    /// Stable machine-readable name used in skip records.
    pub fn kind(&self) -> &'static str {
        match self {
            RasterizeError::Spawn { .. } => "spawn",
            RasterizeError::Failed { .. } => "failed",
            RasterizeError::Timeout(_) => "timeout",
            RasterizeError::NoPages => "no_pages",
            RasterizeError::Decode { .. } => "decode",
            RasterizeError::Io(_) => "io",
        }
    }
}

enum PageSource {
    File(PathBuf),
    Memory(RgbImage),
}

/// Rendered pages of one document. File-backed pages are decoded on demand so
/// only one page image is held at a time.
pub struct RasterizedDocument {
    pages: Vec<PageSource>,
    _scratch: Option<ScratchDir>,
}

impl RasterizedDocument {
    pub fn from_images(images: Vec<RgbImage>) -> Self {
        Self {
            pages: images.into_iter().map(PageSource::Memory).collect(),
            _scratch: None,
        }
    }

    pub(crate) fn from_files(files: Vec<PathBuf>, scratch: ScratchDir) -> Self {
        Self {
            pages: files.into_iter().map(PageSource::File).collect(),
            _scratch: Some(scratch),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// `index` is 0-based.
    pub fn load_page(&self, index: usize) -> Result<RgbImage, RasterizeError> {
        let page = index as u32 + 1;
        match self.pages.get(index) {
            Some(PageSource::Memory(img)) => Ok(img.clone()),
            Some(PageSource::File(path)) => image::open(path)
                .map(|img| img.to_rgb8())
                .map_err(|source| RasterizeError::Decode { page, source }),
            None => Err(RasterizeError::NoPages),
        }
    }
}

/// Removes the per-document scratch directory on drop unless asked to keep it.
pub(crate) struct ScratchDir {
    path: PathBuf,
    keep: bool,
}

impl ScratchDir {
    pub(crate) fn new(path: PathBuf, keep: bool) -> Self {
        Self { path, keep }
    }

    pub(crate) fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if !self.keep {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }
}
